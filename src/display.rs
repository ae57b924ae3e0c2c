//! Text rendering for `-Ss` and `-Si`.

use chrono::{DateTime, Utc};

use crate::aur::{PackageInfo, SearchResult};

/// One block per result, sorted by name:
///
/// ```text
/// aur/yay 12.3.5-1
///     Yet another yogurt
/// ```
pub fn render_search(results: &[SearchResult]) -> String {
    let mut sorted: Vec<&SearchResult> = results.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut out = String::new();
    for result in sorted {
        out.push_str(&format!("aur/{} {}", result.name, result.version));
        if result.out_of_date.is_some() {
            out.push_str(" (out of date)");
        }
        out.push('\n');
        if let Some(description) = &result.description {
            out.push_str(&format!("    {}\n", description));
        }
    }
    out
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.join("  ")
    }
}

fn date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// The `-Si` table for one package.
pub fn render_info(info: &PackageInfo, aur_url: &str) -> String {
    let rows: Vec<(&str, String)> = vec![
        ("Source", "AUR".to_string()),
        ("Name", info.name.clone()),
        ("Version", info.version.clone()),
        ("Description", info.description.clone().unwrap_or_else(|| "None".into())),
        ("URL", info.url.clone().unwrap_or_else(|| "None".into())),
        ("AUR-URL", format!("{}/packages/{}", aur_url, info.name)),
        ("Licenses", list(&info.license)),
        ("Groups", list(&info.groups)),
        ("Provides", list(&info.provides)),
        ("Depends On", list(&info.depends)),
        ("Optional Deps", list(&info.opt_depends)),
        ("Make Deps", list(&info.make_depends)),
        ("Check Deps", list(&info.check_depends)),
        ("Conflicts With", list(&info.conflicts)),
        ("Replaces", list(&info.replaces)),
        ("Maintainer", info.maintainer.clone().unwrap_or_else(|| "None".into())),
        ("First Submission", date(info.first_submitted)),
        ("Last Modified", date(info.last_modified)),
        ("Number of Votes", info.num_votes.to_string()),
        ("Popularity", format!("{:.2}", info.popularity)),
        (
            "Flagged out of Date",
            info.out_of_date.map(date).unwrap_or_else(|| "No".into()),
        ),
    ];
    rows.iter()
        .map(|(key, value)| format!("{:<21}:  {}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `<package>: <optional dependency>` lines, used after installs.
pub fn render_optional(package: &str, optional: &[String]) -> Vec<String> {
    optional
        .iter()
        .map(|opt| format!("{}: {}", package, opt))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yay() -> PackageInfo {
        PackageInfo {
            name: "yay".into(),
            version: "12.3.5-1".into(),
            package_base: "yay".into(),
            description: Some("Yet another yogurt. Pacman wrapper and AUR helper written in go.".into()),
            url: Some("https://github.com/Jguer/yay".into()),
            depends: vec!["pacman>6.1".into(), "git".into()],
            make_depends: vec!["go>=1.21".into()],
            opt_depends: vec!["sudo: privilege elevation".into()],
            license: vec!["GPL-3.0-or-later".into()],
            maintainer: Some("jguer".into()),
            num_votes: 2100,
            popularity: 31.456,
            first_submitted: 1_475_688_004,
            last_modified: 1_710_000_000,
            ..PackageInfo::default()
        }
    }

    #[test]
    fn test_render_info() {
        insta::assert_snapshot!(render_info(&yay(), "https://aur.archlinux.org"), @r###"
        Source               :  AUR
        Name                 :  yay
        Version              :  12.3.5-1
        Description          :  Yet another yogurt. Pacman wrapper and AUR helper written in go.
        URL                  :  https://github.com/Jguer/yay
        AUR-URL              :  https://aur.archlinux.org/packages/yay
        Licenses             :  GPL-3.0-or-later
        Groups               :  None
        Provides             :  None
        Depends On           :  pacman>6.1  git
        Optional Deps        :  sudo: privilege elevation
        Make Deps            :  go>=1.21
        Check Deps           :  None
        Conflicts With       :  None
        Replaces             :  None
        Maintainer           :  jguer
        First Submission     :  2016-10-05 17:20 UTC
        Last Modified        :  2024-03-09 16:00 UTC
        Number of Votes      :  2100
        Popularity           :  31.46
        Flagged out of Date  :  No
        "###);
    }

    #[test]
    fn test_render_search_sorted() {
        let results = vec![
            SearchResult {
                name: "paru".into(),
                version: "2.0.3-1".into(),
                description: Some("Feature packed AUR helper".into()),
                out_of_date: None,
            },
            SearchResult {
                name: "aura".into(),
                version: "3.2-1".into(),
                description: None,
                out_of_date: Some(1_700_000_000),
            },
        ];
        assert_eq!(
            render_search(&results),
            "aur/aura 3.2-1 (out of date)\naur/paru 2.0.3-1\n    Feature packed AUR helper\n"
        );
    }

    #[test]
    fn test_render_optional() {
        assert_eq!(
            render_optional("yay", &["sudo: privilege elevation".to_string()]),
            vec!["yay: sudo: privilege elevation"]
        );
    }
}
