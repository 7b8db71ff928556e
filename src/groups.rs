/// The in-memory group collection and the mutations that can be replayed on it
use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tab_data::{Group, GroupPatch, GroupTemplate, SavedTab};

/// Target of a merge when the caller names no group
pub const UNGROUPED_ID: &str = "group-0";

static GROUP_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^group-(\d+)$").expect("group key pattern is valid"));

/// Numeric suffix of a `group-{n}` key
pub fn group_ordinal(key: &str) -> Option<u64> {
    GROUP_KEY
        .captures(key)
        .and_then(|caps| caps.get(1))
        .and_then(|n| n.as_str().parse().ok())
}

pub fn group_key(ordinal: u64) -> String {
    format!("group-{}", ordinal)
}

/// Compare group keys by numeric suffix. Keys without one sort last.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (group_ordinal(a), group_ordinal(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Sort group keys so that `group-2` precedes `group-10`
pub fn sort_by_key(keys: &mut [String]) {
    keys.sort_by(|a, b| compare_keys(a, b));
}

/// A replayable mutation of the group collection.
///
/// Everything an action needs is captured when it is created (templates
/// carry the creation time and settings-derived defaults), so applying the
/// same action to the same collection always gives the same result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Merge {
        into: String,
        tabs: Vec<SavedTab>,
        template: GroupTemplate,
    },
    CreateGroup {
        template: GroupTemplate,
    },
    DeleteGroup {
        id: String,
        template: GroupTemplate,
    },
    DeleteUnlocked {
        template: GroupTemplate,
    },
    DeleteTab {
        group_id: String,
        index: usize,
    },
    UpdateGroup {
        id: String,
        patch: GroupPatch,
    },
    MoveTab {
        from: String,
        from_index: usize,
        to: String,
        to_index: usize,
    },
    Import {
        groups: Vec<Group>,
    },
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Merge { .. } => "merge",
            Action::CreateGroup { .. } => "create group",
            Action::DeleteGroup { .. } => "delete group",
            Action::DeleteUnlocked { .. } => "delete unlocked groups",
            Action::DeleteTab { .. } => "delete tab",
            Action::UpdateGroup { .. } => "update group",
            Action::MoveTab { .. } => "move tab",
            Action::Import { .. } => "import",
        }
    }
}

/// Groups ordered by the numeric suffix of their ids
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct GroupSet {
    groups: Vec<Group>,
}

impl GroupSet {
    pub fn new() -> Self {
        GroupSet { groups: Vec::new() }
    }

    pub fn from_groups(mut groups: Vec<Group>) -> Self {
        groups.sort_by(|a, b| compare_keys(&a.id, &b.id));
        GroupSet { groups }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<Group> {
        self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn ids(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Group> {
        self.groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| Error::GroupNotFound(id.to_string()))
    }

    pub fn total_tabs(&self) -> usize {
        self.groups.iter().map(|g| g.tabs.len()).sum()
    }

    /// Key for a new group: one past the highest ordinal in use
    pub fn next_id(&self) -> String {
        let next = self
            .groups
            .iter()
            .filter_map(|g| group_ordinal(&g.id))
            .max()
            .map_or(0, |n| n + 1);
        group_key(next)
    }

    fn insert(&mut self, group: Group) {
        let at = self
            .groups
            .partition_point(|g| compare_keys(&g.id, &group.id) == Ordering::Less);
        self.groups.insert(at, group);
    }

    /// Keep at least one group around
    fn ensure_one(&mut self, template: &GroupTemplate) {
        if self.groups.is_empty() {
            let id = self.next_id();
            self.groups.push(Group::from_template(id, template));
        }
    }

    fn unlocked(&mut self, id: &str) -> Result<&mut Group> {
        let group = self.get_mut(id)?;
        if group.locked {
            return Err(Error::GroupLocked(id.to_string()));
        }
        Ok(group)
    }

    pub fn apply(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Merge { into, tabs, template } => {
                if self.get(into).is_none() {
                    let id = if group_ordinal(into).is_some() {
                        into.clone()
                    } else {
                        self.next_id()
                    };
                    let mut group = Group::from_template(id, template);
                    group.tabs.extend(tabs.iter().cloned());
                    self.insert(group);
                } else {
                    self.get_mut(into)?.tabs.extend(tabs.iter().cloned());
                }
            }
            Action::CreateGroup { template } => {
                let id = self.next_id();
                self.insert(Group::from_template(id, template));
            }
            Action::DeleteGroup { id, template } => {
                self.unlocked(id)?;
                self.groups.retain(|g| g.id != *id);
                self.ensure_one(template);
            }
            Action::DeleteUnlocked { template } => {
                self.groups.retain(|g| g.locked);
                self.ensure_one(template);
            }
            Action::DeleteTab { group_id, index } => {
                let group = self.unlocked(group_id)?;
                if *index >= group.tabs.len() {
                    return Err(Error::TabNotFound {
                        group_id: group_id.clone(),
                        index: *index,
                    });
                }
                group.tabs.remove(*index);
            }
            Action::UpdateGroup { id, patch } => {
                patch.apply_to(self.get_mut(id)?);
            }
            Action::MoveTab {
                from,
                from_index,
                to,
                to_index,
            } => {
                self.unlocked(to)?;
                let source = self.unlocked(from)?;
                if *from_index >= source.tabs.len() {
                    return Err(Error::TabNotFound {
                        group_id: from.clone(),
                        index: *from_index,
                    });
                }
                let tab = source.tabs.remove(*from_index);
                let target = self.get_mut(to)?;
                let at = (*to_index).min(target.tabs.len());
                target.tabs.insert(at, tab);
            }
            Action::Import { groups } => {
                for group in groups {
                    let id = self.next_id();
                    self.groups.push(Group {
                        id,
                        ..group.clone()
                    });
                }
            }
        }
        Ok(())
    }

    /// Find groups matching a search query.
    ///
    /// A query starting with `#` matches group titles; anything else matches
    /// tab titles and urls, and only the matching tabs are kept.
    pub fn search(&self, query: &str) -> Vec<Group> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.groups.clone();
        }

        if let Some(title_query) = query.strip_prefix('#') {
            return self
                .groups
                .iter()
                .filter(|g| g.title.to_lowercase().contains(title_query))
                .cloned()
                .collect();
        }

        self.groups
            .iter()
            .filter_map(|group| {
                let tabs: Vec<SavedTab> = group
                    .tabs
                    .iter()
                    .filter(|tab| {
                        tab.title.to_lowercase().contains(&query)
                            || tab.url.to_lowercase().contains(&query)
                    })
                    .cloned()
                    .collect();

                if tabs.is_empty() {
                    None
                } else {
                    Some(Group {
                        tabs,
                        ..group.clone()
                    })
                }
            })
            .collect()
    }
}
