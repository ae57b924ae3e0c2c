use blinky::config::Overrides;
use blinky::display::render_search;
use blinky::{Error, SearchResult, SourceIndex};

use super::{fail, load_config, open_index};

pub fn cmd_search(terms: &[String], overrides: &Overrides) {
    let config = load_config(overrides);
    let index = open_index(&config);
    let results = search(&index, terms).unwrap_or_else(|e| fail(e));
    print!("{}", render_search(&results));
}

/// The index takes a single term, so it is asked for the longest one and
/// the rest filter the answer, like `pacman -Ss a b`.
fn search(index: &dyn SourceIndex, terms: &[String]) -> Result<Vec<SearchResult>, Error> {
    let Some(longest) = terms.iter().max_by_key(|t| t.len()) else {
        return Ok(Vec::new());
    };
    let mut results = index.search(longest)?;
    results.retain(|r| terms.iter().all(|term| matches(r, term)));
    Ok(results)
}

fn matches(result: &SearchResult, term: &str) -> bool {
    let term = term.to_lowercase();
    result.name.to_lowercase().contains(&term)
        || result
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&term))
}
