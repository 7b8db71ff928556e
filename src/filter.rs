/// Tab selection: decides which open tabs enter a merge and which get closed
use std::collections::HashSet;

use log::debug;

use crate::directive::Directive;
use crate::settings::Settings;
use crate::tab_data::{Group, SavedTab, TabId, TabInfo};

/// Title of the extension's own page; that tab never takes part in a merge
pub const EXTENSION_TITLE: &str = "TabMerger";

/// Browser pages that are never worth saving
pub const SYSTEM_TITLES: [&str; 3] = ["New Tab", "Extensions", "Add-ons Manager"];

/// Minimal projection of an open tab selected for merging
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTab {
    pub id: TabId,
    pub title: String,
    pub url: String,
    pub pinned: Option<bool>,
    pub fav_icon_url: Option<String>,
}

impl BatchTab {
    fn project(tab: &TabInfo, keep_pinned: bool) -> BatchTab {
        BatchTab {
            id: tab.id,
            title: tab.title.clone(),
            url: tab.url.clone(),
            pinned: keep_pinned.then_some(tab.pinned),
            fav_icon_url: tab.fav_icon_url.clone(),
        }
    }

    pub fn to_saved(&self) -> SavedTab {
        SavedTab {
            title: self.title.clone(),
            url: self.url.clone(),
            pinned: self.pinned,
            fav_icon_url: self.fav_icon_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome {
    pub merge_batch: Vec<BatchTab>,
    /// Tabs already saved in some group, or system pages
    pub represented: Vec<TabId>,
    /// Later occurrences of a url already in the batch
    pub duplicates: Vec<TabId>,
}

impl FilterOutcome {
    pub fn close_set(&self) -> Vec<TabId> {
        self.represented
            .iter()
            .chain(self.duplicates.iter())
            .copied()
            .collect()
    }

    pub fn saved_tabs(&self) -> Vec<SavedTab> {
        self.merge_batch.iter().map(BatchTab::to_saved).collect()
    }

    pub fn batch_ids(&self) -> Vec<TabId> {
        self.merge_batch.iter().map(|tab| tab.id).collect()
    }
}

/// Resolve a merge directive against the open tabs.
///
/// Order of evaluation, for each tab in its original order:
/// 1. the extension page and tabs the directive does not select are skipped
/// 2. blacklisted urls are skipped (left open, never closed)
/// 3. system pages and urls already saved in a group go to `represented`;
///    titles are matched only against `SYSTEM_TITLES`, never saved tabs
/// 4. a url already taken by an earlier tab goes to `duplicates`
/// 5. everything else lands in the batch
pub fn filter_tabs(
    directive: Directive,
    origin: &TabInfo,
    open_tabs: &[TabInfo],
    settings: &Settings,
    persisted: &[Group],
) -> FilterOutcome {
    let blacklist = settings.blacklist_entries();
    let saved_urls: HashSet<&str> = persisted
        .iter()
        .flat_map(|group| group.tabs.iter())
        .map(|tab| tab.url.as_str())
        .collect();

    let mut seen_urls = HashSet::new();
    let mut outcome = FilterOutcome::default();

    let selected = open_tabs
        .iter()
        .filter(|tab| tab.title != EXTENSION_TITLE)
        .filter(|tab| directive.keeps(tab.index, origin.index));

    for tab in selected {
        if blacklist.contains(&tab.url.to_lowercase()) {
            continue;
        }

        if SYSTEM_TITLES.contains(&tab.title.as_str()) || saved_urls.contains(tab.url.as_str()) {
            outcome.represented.push(tab.id);
        } else if !seen_urls.insert(tab.url.as_str()) {
            outcome.duplicates.push(tab.id);
        } else {
            outcome.merge_batch.push(BatchTab::project(tab, settings.pin));
        }
    }

    debug!(
        "filter {:?}: {} to merge, {} represented, {} duplicates",
        directive,
        outcome.merge_batch.len(),
        outcome.represented.len(),
        outcome.duplicates.len()
    );

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_tab(id: i32, url: &str, title: &str) -> TabInfo {
        TabInfo {
            id,
            index: id,
            url: url.to_string(),
            title: title.to_string(),
            pinned: false,
            fav_icon_url: None,
        }
    }

    fn create_test_group(id: &str, urls: &[&str]) -> Group {
        Group {
            id: id.to_string(),
            title: "Title".to_string(),
            color: "#dedede".to_string(),
            created: 0.0,
            starred: false,
            locked: false,
            hidden: false,
            tabs: urls
                .iter()
                .map(|url| SavedTab {
                    title: "saved".to_string(),
                    url: url.to_string(),
                    pinned: None,
                    fav_icon_url: None,
                })
                .collect(),
        }
    }

    fn five_tabs() -> Vec<TabInfo> {
        (0..5)
            .map(|i| create_test_tab(i, &format!("https://site{}.com/", i), &format!("Site {}", i)))
            .collect()
    }

    #[test]
    fn test_right_keeps_original_order() {
        let tabs = five_tabs();
        let outcome = filter_tabs(Directive::Right, &tabs[1], &tabs, &Settings::default(), &[]);

        assert_eq!(outcome.batch_ids(), vec![2, 3, 4]);
        assert!(outcome.close_set().is_empty());
    }

    #[test]
    fn test_directives_select_by_index() {
        let tabs = five_tabs();
        let settings = Settings::default();
        let ids = |d| filter_tabs(d, &tabs[2], &tabs, &settings, &[]).batch_ids();

        assert_eq!(ids(Directive::All), vec![0, 1, 2, 3, 4]);
        assert_eq!(ids(Directive::Left), vec![0, 1]);
        assert_eq!(ids(Directive::Excluding), vec![0, 1, 3, 4]);
        assert_eq!(ids(Directive::Only), vec![2]);
    }

    #[test]
    fn test_duplicates_go_to_close_set() {
        let tabs = vec![
            create_test_tab(1, "https://www.jkl.com/", "JKL"),
            create_test_tab(2, "https://github.com/", "GitHub"),
            create_test_tab(3, "https://www.jkl.com/", "JKL again"),
        ];

        let outcome = filter_tabs(Directive::All, &tabs[0], &tabs, &Settings::default(), &[]);

        let jkl: Vec<_> = outcome
            .merge_batch
            .iter()
            .filter(|tab| tab.url == "https://www.jkl.com/")
            .collect();
        assert_eq!(jkl.len(), 1);
        assert_eq!(jkl[0].id, 1);
        assert_eq!(outcome.duplicates, vec![3]);
        assert_eq!(outcome.close_set(), vec![3]);
    }

    #[test]
    fn test_blacklisted_tab_is_left_alone() {
        let tabs = vec![
            create_test_tab(1, "https://www.abc.com/", "ABC"),
            create_test_tab(2, "https://www.def.com/", "DEF"),
        ];
        let settings = Settings {
            blacklist: "https://WWW.ABC.COM/".to_string(),
            ..Settings::default()
        };

        let outcome = filter_tabs(Directive::All, &tabs[0], &tabs, &settings, &[]);

        assert_eq!(outcome.batch_ids(), vec![2]);
        assert!(!outcome.close_set().contains(&1));
    }

    #[test]
    fn test_blacklist_wins_over_saved_urls() {
        let tabs = vec![create_test_tab(1, "https://www.abc.com/", "ABC")];
        let groups = vec![create_test_group("group-0", &["https://www.abc.com/"])];
        let settings = Settings {
            blacklist: "https://www.abc.com/".to_string(),
            ..Settings::default()
        };

        let outcome = filter_tabs(Directive::All, &tabs[0], &tabs, &settings, &groups);

        assert_eq!(outcome, FilterOutcome::default());
    }

    #[test]
    fn test_saved_urls_and_system_pages_are_represented() {
        let tabs = vec![
            create_test_tab(1, "https://saved.com/", "Saved"),
            create_test_tab(2, "chrome://newtab/", "New Tab"),
            create_test_tab(3, "chrome://extensions/", "Extensions"),
            create_test_tab(4, "https://fresh.com/", "Fresh"),
        ];
        let groups = vec![create_test_group("group-3", &["https://saved.com/"])];

        let outcome = filter_tabs(Directive::All, &tabs[0], &tabs, &Settings::default(), &groups);

        assert_eq!(outcome.represented, vec![1, 2, 3]);
        assert_eq!(outcome.batch_ids(), vec![4]);
    }

    #[test]
    fn test_extension_page_is_never_touched() {
        let tabs = vec![
            create_test_tab(0, "chrome-extension://abc/index.html", EXTENSION_TITLE),
            create_test_tab(1, "https://a.com/", "A"),
        ];

        let outcome = filter_tabs(Directive::All, &tabs[1], &tabs, &Settings::default(), &[]);

        assert_eq!(outcome.batch_ids(), vec![1]);
        assert!(outcome.close_set().is_empty());
    }

    #[test]
    fn test_pinned_projection_follows_settings() {
        let mut tabs = five_tabs();
        tabs[0].pinned = true;

        let with_pin = filter_tabs(Directive::Only, &tabs[0], &tabs, &Settings::default(), &[]);
        assert_eq!(with_pin.merge_batch[0].pinned, Some(true));

        let settings = Settings {
            pin: false,
            ..Settings::default()
        };
        let without_pin = filter_tabs(Directive::Only, &tabs[0], &tabs, &settings, &[]);
        assert_eq!(without_pin.merge_batch[0].pinned, None);
    }

    #[test]
    fn test_filter_is_deterministic() {
        let mut tabs = five_tabs();
        tabs.push(create_test_tab(5, "https://site1.com/", "dup"));
        tabs.push(create_test_tab(6, "chrome://newtab/", "New Tab"));
        let groups = vec![create_test_group("group-0", &["https://site3.com/"])];
        let settings = Settings {
            blacklist: "https://site4.com/".to_string(),
            ..Settings::default()
        };

        let first = filter_tabs(Directive::Excluding, &tabs[0], &tabs, &settings, &groups);
        let second = filter_tabs(Directive::Excluding, &tabs[0], &tabs, &settings, &groups);

        assert_eq!(first, second);
        assert_eq!(first.batch_ids(), vec![1, 2]);
        assert_eq!(first.represented, vec![3, 6]);
        assert_eq!(first.duplicates, vec![5]);
    }
}
