//! Finding foreign packages with a newer version in the index.

use std::cmp::Ordering;

use crate::alpm::{vercmp, PackageDatabase};
use crate::aur::SourceIndex;
use crate::error::Result;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpgradePlan {
    /// `(name, installed, latest)` for every outdated package.
    pub outdated: Vec<(String, String, String)>,
    /// Foreign packages the index does not know, e.g. locally built ones.
    pub unknown: Vec<String>,
}

impl UpgradePlan {
    pub fn names(&self) -> Vec<String> {
        self.outdated.iter().map(|(name, _, _)| name.clone()).collect()
    }
}

pub fn find_upgrades(db: &dyn PackageDatabase, index: &dyn SourceIndex) -> Result<UpgradePlan> {
    let foreign = db.list_foreign();
    let names: Vec<String> = foreign.keys().cloned().collect();
    if names.is_empty() {
        return Ok(UpgradePlan::default());
    }
    let infos = index.info(&names)?;

    let mut plan = UpgradePlan::default();
    for (name, installed) in &foreign {
        match infos.iter().find(|info| &info.name == name) {
            Some(info) if vercmp(&info.version, installed) == Ordering::Greater => {
                tracing::debug!("{}: {} -> {}", name, installed, info.version);
                plan.outdated
                    .push((name.clone(), installed.clone(), info.version.clone()));
            }
            Some(_) => {}
            None => plan.unknown.push(name.clone()),
        }
    }
    Ok(plan)
}
