/// User settings, persisted as the `settings` storage item
use std::collections::HashSet;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_HISTORY_DEPTH;
use crate::tab_data::GroupTemplate;

const HOUR_MS: f64 = 60.0 * 60.0 * 1000.0;

/// What happens to a group after its tabs are reopened
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RestoreMode {
    #[default]
    Keep,
    Remove,
}

/// Whether the extension page is brought forward after a merge
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    With,
    #[default]
    Without,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub blacklist: String,
    pub color: String,
    pub title: String,
    pub restore: RestoreMode,
    pub open: OpenMode,
    pub pin: bool,
    pub merge: bool,
    /// Hours between automatic backups, 0 disables them
    pub period_backup: u32,
    pub history_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            blacklist: String::new(),
            color: "#dedede".to_string(),
            title: "Title".to_string(),
            restore: RestoreMode::Keep,
            open: OpenMode::Without,
            pin: true,
            merge: true,
            period_backup: 0,
            history_depth: DEFAULT_HISTORY_DEPTH,
        }
    }
}

impl Settings {
    /// Parse the comma-separated blacklist into lowercased URLs.
    /// Entries that are not absolute URLs are ignored.
    pub fn blacklist_entries(&self) -> HashSet<String> {
        self.blacklist
            .split(',')
            .map(|entry| entry.trim().to_lowercase())
            .filter(|entry| !entry.is_empty())
            .filter(|entry| match url::Url::parse(entry) {
                Ok(_) => true,
                Err(e) => {
                    warn!("Ignoring malformed blacklist entry {:?}: {}", entry, e);
                    false
                }
            })
            .collect()
    }

    pub fn template(&self, now: f64) -> GroupTemplate {
        GroupTemplate {
            title: self.title.clone(),
            color: self.color.clone(),
            created: now,
        }
    }

    pub fn backup_due(&self, last_backup: Option<f64>, now: f64) -> bool {
        if self.period_backup == 0 {
            return false;
        }

        match last_backup {
            Some(last) => now - last >= f64::from(self.period_backup) * HOUR_MS,
            None => true,
        }
    }
}
