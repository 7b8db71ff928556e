/// Group persistence on top of a quota-limited key-value backend
///
/// Every group is its own storage item keyed `group-{n}`, next to a single
/// `settings` item. Writes are computed per group against the value that is
/// persisted at the moment of writing, so unchanged groups cost nothing
/// against the backend's write-rate limit.
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::groups::{Action, GroupSet, UNGROUPED_ID, group_ordinal};
use crate::settings::Settings;
use crate::tab_data::{Group, SavedTab};

pub const SETTINGS_KEY: &str = "settings";

/// Per-item size ceiling of the sync backend
pub const MAX_ITEM_BYTES: usize = 8192;

/// Awaitable key-value capability
#[async_trait(?Send)]
pub trait KeyValueStore {
    /// Read the given keys, or everything when `keys` is `None`. Missing
    /// keys are absent from the result.
    async fn read(&self, keys: Option<&[String]>) -> Result<Map<String, Value>>;
    async fn write(&self, items: Map<String, Value>) -> Result<()>;
    async fn remove(&self, keys: &[String]) -> Result<()>;
}

/// A mutation that reached the backend
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub action: Action,
    pub before: GroupSet,
    pub after: GroupSet,
}

pub struct GroupStore<S> {
    backend: S,
}

impl<S: KeyValueStore> GroupStore<S> {
    pub fn new(backend: S) -> Self {
        GroupStore { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub async fn read_all(&self) -> Result<GroupSet> {
        let items = self.backend.read(None).await?;
        Ok(GroupSet::from_groups(parse_groups(items)))
    }

    pub async fn read_settings(&self) -> Result<Settings> {
        let keys = [SETTINGS_KEY.to_string()];
        let mut items = self.backend.read(Some(&keys)).await?;

        Ok(match items.remove(SETTINGS_KEY) {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("Stored settings are malformed, using defaults: {}", e);
                Settings::default()
            }),
            None => Settings::default(),
        })
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let mut items = Map::new();
        items.insert(SETTINGS_KEY.to_string(), serde_json::to_value(settings)?);
        self.backend.write(items).await
    }

    /// Install-time setup: default settings and a first group
    pub async fn ensure_initialized(&self, now: f64) -> Result<GroupSet> {
        let keys = [SETTINGS_KEY.to_string()];
        if self.backend.read(Some(&keys)).await?.is_empty() {
            self.save_settings(&Settings::default()).await?;
        }

        let groups = self.read_all().await?;
        if !groups.is_empty() {
            return Ok(groups);
        }

        let settings = self.read_settings().await?;
        let mut initial = GroupSet::new();
        initial.apply(&Action::CreateGroup {
            template: settings.template(now),
        })?;
        self.commit(&groups, &initial).await?;
        Ok(initial)
    }

    /// Read the current collection, apply the action, persist the difference
    pub async fn apply(&self, action: Action) -> Result<Applied> {
        let before = self.read_all().await?;
        let mut after = before.clone();
        after.apply(&action)?;

        let written = self.commit(&before, &after).await?;
        debug!("{}: {} item(s) written", action.label(), written);

        Ok(Applied {
            action,
            before,
            after,
        })
    }

    /// Append a merge batch to a group. An empty batch is a no-op and issues
    /// no write.
    pub async fn apply_merge(
        &self,
        group_id: Option<&str>,
        batch: Vec<SavedTab>,
        settings: &Settings,
        now: f64,
    ) -> Result<Option<Applied>> {
        if batch.is_empty() {
            return Ok(None);
        }

        let into = group_id.unwrap_or(UNGROUPED_ID).to_string();
        if group_ordinal(&into).is_none() {
            return Err(Error::Validation(format!("{:?} is not a group key", into)));
        }
        if group_id.is_some() && !settings.merge {
            let keys = [into.clone()];
            if self.backend.read(Some(&keys)).await?.is_empty() {
                return Err(Error::GroupNotFound(into));
            }
        }

        let action = Action::Merge {
            into,
            tabs: batch,
            template: settings.template(now),
        };
        self.apply(action).await.map(Some)
    }

    /// Remove every unlocked group, keeping at least one group
    pub async fn delete_unlocked(&self, settings: &Settings, now: f64) -> Result<Applied> {
        self.apply(Action::DeleteUnlocked {
            template: settings.template(now),
        })
        .await
    }

    /// Overwrite the persisted collection with a snapshot, writing only the
    /// groups that differ
    pub async fn replace_all(&self, snapshot: &GroupSet) -> Result<()> {
        let before = self.read_all().await?;
        self.commit(&before, snapshot).await?;
        Ok(())
    }

    /// Persist `after`, given that `before` was read at the start of the
    /// operation. Returns the number of items written.
    async fn commit(&self, before: &GroupSet, after: &GroupSet) -> Result<usize> {
        let mut keys = before.ids();
        keys.extend(after.ids().into_iter().filter(|id| before.get(id).is_none()));
        let latest = parse_groups(self.backend.read(Some(&keys)).await?);

        let mut changed = Map::new();
        for group in after.groups() {
            let persisted = latest.iter().find(|g| g.id == group.id);
            if persisted.is_some_and(|p| p.same_content(group)) {
                continue;
            }

            if let Some(p) = persisted {
                let seen = before.get(&group.id);
                if !seen.is_some_and(|s| s.same_content(p)) {
                    warn!("{} changed underneath us, overwriting", group.id);
                }
            }

            let value = serde_json::to_value(group)?;
            let size = serde_json::to_string(&value)?.len() + group.id.len();
            if size > MAX_ITEM_BYTES {
                return Err(Error::StorageQuota(format!(
                    "{} is {} bytes, over the {} byte item limit",
                    group.id, size, MAX_ITEM_BYTES
                )));
            }
            changed.insert(group.id.clone(), value);
        }

        let dropped: Vec<String> = latest
            .iter()
            .filter(|g| after.get(&g.id).is_none())
            .map(|g| g.id.clone())
            .collect();

        // Writes go first: if the remove fails, stale groups linger but no
        // group is ever missing.
        let written = changed.len();
        if !changed.is_empty() {
            self.backend.write(changed).await?;
        }
        if !dropped.is_empty() {
            if let Err(e) = self.backend.remove(&dropped).await {
                warn!(
                    "{} item(s) written but {} stale group(s) could not be removed: {}",
                    written,
                    dropped.len(),
                    e
                );
                return Err(e);
            }
        }
        Ok(written)
    }
}

/// Decode every `group-{n}` item, skipping ones that do not parse
fn parse_groups(items: Map<String, Value>) -> Vec<Group> {
    items
        .into_iter()
        .filter(|(key, _)| group_ordinal(key).is_some())
        .filter_map(|(key, value)| match serde_json::from_value::<Group>(value) {
            Ok(mut group) => {
                group.id = key;
                Some(group)
            }
            Err(e) => {
                warn!("Skipping malformed item {}: {}", key, e);
                None
            }
        })
        .collect()
}
