/// Data structures for Tab Merger
use serde::{Deserialize, Serialize};

pub type TabId = i32;

/// Information about an open browser tab
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: TabId,
    pub index: i32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
}

impl TabInfo {
    pub fn new(id: TabId, index: i32, url: String, title: String, pinned: bool) -> TabInfo {
        TabInfo {
            id,
            index,
            url,
            title,
            pinned,
            fav_icon_url: None,
        }
    }
}

/// A tab persisted inside a group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedTab {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(default, rename = "favIconUrl", skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
}

/// Title, color and creation time used whenever a group has to be created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupTemplate {
    pub title: String,
    pub color: String,
    pub created: f64,
}

/// A named, colored collection of saved tabs, persisted as one storage item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub color: String,
    pub created: f64,
    #[serde(default)]
    pub starred: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub tabs: Vec<SavedTab>,
}

impl Group {
    pub fn from_template(id: String, template: &GroupTemplate) -> Group {
        Group {
            id,
            title: template.title.clone(),
            color: template.color.clone(),
            created: template.created,
            starred: false,
            locked: false,
            hidden: false,
            tabs: Vec::new(),
        }
    }

    /// Field-by-field comparison used to decide whether a persisted item
    /// needs rewriting. Tabs are compared in their serialized form.
    pub fn same_content(&self, other: &Group) -> bool {
        self.title == other.title
            && self.color == other.color
            && self.created == other.created
            && self.starred == other.starred
            && self.locked == other.locked
            && self.hidden == other.hidden
            && serialized_tabs(&self.tabs) == serialized_tabs(&other.tabs)
    }
}

fn serialized_tabs(tabs: &[SavedTab]) -> Option<String> {
    serde_json::to_string(tabs).ok()
}

/// Partial update of a group's presentation flags
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroupPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

impl GroupPatch {
    pub fn apply_to(&self, group: &mut Group) {
        if let Some(title) = &self.title {
            group.title = title.clone();
        }
        if let Some(color) = &self.color {
            group.color = color.clone();
        }
        if let Some(starred) = self.starred {
            group.starred = starred;
        }
        if let Some(locked) = self.locked {
            group.locked = locked;
        }
        if let Some(hidden) = self.hidden {
            group.hidden = hidden;
        }
    }
}

/// Merge result handed to the foreground page through the local store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub into_group: String,
    pub merged_tabs: Vec<SavedTab>,
}

/// JSON document produced by export and accepted by import
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Backup {
    pub exported: f64,
    pub groups: Vec<Group>,
}
