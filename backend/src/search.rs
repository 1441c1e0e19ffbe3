use shared::SearchResult;

const NAVIGATION: [(&str, &str, &str); 5] = [
    ("nav-1", "Home", "/"),
    ("nav-2", "Report Waste", "/report"),
    ("nav-3", "Collect Waste", "/collect"),
    ("nav-4", "Rewards", "/rewards"),
    ("nav-5", "Leaderboard", "/leaderboard"),
];

/// Navigation entries whose title contains `query`, ignoring case.
pub fn search_navigation(query: &str) -> Vec<SearchResult> {
    let query = query.trim().to_lowercase();
    NAVIGATION
        .iter()
        .filter(|(_, title, _)| title.to_lowercase().contains(&query))
        .map(|(id, title, url)| SearchResult {
            id: id.to_string(),
            title: title.to_string(),
            kind: "navigation".to_string(),
            url: url.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_lists_everything() {
        assert_eq!(search_navigation("").len(), NAVIGATION.len());
    }

    #[test]
    fn matches_substrings_case_insensitively() {
        let titles: Vec<_> = search_navigation("WASTE")
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Report Waste", "Collect Waste"]);
    }

    #[test]
    fn unknown_query_finds_nothing() {
        assert!(search_navigation("settings").is_empty());
    }
}
