/// Event handling: runs each merge or group edit as one serialized task
///
/// Every mutating operation takes the history gate first, so at most one
/// operation reads and writes the group store at a time. Waiting operations
/// are admitted in arrival order.
use futures::lock::Mutex;
use log::{info, warn};
use serde::Serialize;
use serde_json::Map;

use crate::directive::{MergeRequest, Trigger};
use crate::error::{Error, Result};
use crate::filter::{EXTENSION_TITLE, filter_tabs};
use crate::groups::{Action, GroupSet, UNGROUPED_ID};
use crate::history::{History, RecordOutcome};
use crate::settings::{OpenMode, RestoreMode, Settings};
use crate::storage::{Applied, GroupStore, KeyValueStore};
use crate::tab_data::{Backup, Group, GroupPatch, TabId, TabInfo, Transfer};
use crate::tabs::{CreateOptions, TabController, UpdateOptions, close_quietly, create_quietly};

/// Local-store key of the persisted undo log
pub const HISTORY_KEY: &str = "history";

/// Local-store key of the merge result waiting for the foreground page
pub const TRANSFER_KEY: &str = "transfer";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub into_group: Option<String>,
    pub merged: usize,
    pub represented: Vec<TabId>,
    pub duplicates: Vec<TabId>,
    pub history_limit_reached: bool,
}

/// Collection after a successful edit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    pub groups: Vec<Group>,
    pub history_limit_reached: bool,
}

pub struct TabMerger<S, L, T> {
    store: GroupStore<S>,
    local: L,
    tabs: T,
    extension_url: String,
    history: Mutex<Option<History>>,
}

impl<S: KeyValueStore, L: KeyValueStore, T: TabController> TabMerger<S, L, T> {
    pub fn new(sync: S, local: L, tabs: T, extension_url: impl Into<String>) -> Self {
        TabMerger {
            store: GroupStore::new(sync),
            local,
            tabs,
            extension_url: extension_url.into(),
            history: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &GroupStore<S> {
        &self.store
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn tabs(&self) -> &T {
        &self.tabs
    }

    pub async fn initialize(&self, now: f64) -> Result<Vec<Group>> {
        let _gate = self.history.lock().await;
        Ok(self.store.ensure_initialized(now).await?.into_groups())
    }

    pub async fn merge(
        &self,
        trigger: &Trigger,
        origin: &TabInfo,
        into: Option<&str>,
        now: f64,
    ) -> Result<MergeReport> {
        let request = trigger.resolve()?;
        self.merge_request(request, origin, into, now).await
    }

    /// Query tabs, filter them, save the batch, then close what is now
    /// saved. Nothing is closed unless the save went through.
    pub async fn merge_request(
        &self,
        request: MergeRequest,
        origin: &TabInfo,
        into: Option<&str>,
        now: f64,
    ) -> Result<MergeReport> {
        let mut slot = self.history.lock().await;

        let open_tabs = self.tabs.query(request.scope).await?;
        let settings = self.store.read_settings().await?;
        let groups = self.store.read_all().await?;
        let outcome = filter_tabs(request.directive, origin, &open_tabs, &settings, groups.groups());

        let mut report = MergeReport {
            represented: outcome.represented.clone(),
            duplicates: outcome.duplicates.clone(),
            ..MergeReport::default()
        };

        let merged_tabs = outcome.saved_tabs();
        if let Some(applied) = self
            .store
            .apply_merge(into, merged_tabs.clone(), &settings, now)
            .await?
        {
            let into_group = into.unwrap_or(UNGROUPED_ID).to_string();
            info!("Merged {} tab(s) into {}", merged_tabs.len(), into_group);

            let recorded = self.record(&mut slot, &settings, applied).await;
            report.history_limit_reached = recorded.limit_reached();
            report.merged = merged_tabs.len();
            report.into_group = Some(into_group.clone());

            self.write_transfer(&Transfer {
                into_group,
                merged_tabs,
            })
            .await;

            if settings.open == OpenMode::With {
                self.show_extension(&open_tabs).await;
            }
        }

        let mut closed = close_quietly(&self.tabs, &outcome.represented).await;
        closed |= close_quietly(&self.tabs, &outcome.duplicates).await;
        if report.merged > 0 {
            closed |= close_quietly(&self.tabs, &outcome.batch_ids()).await;
        }
        if closed {
            self.tabs.settle().await;
        }

        Ok(report)
    }

    pub async fn read_groups(&self) -> Result<Vec<Group>> {
        Ok(self.store.read_all().await?.into_groups())
    }

    pub async fn search_groups(&self, query: &str) -> Result<Vec<Group>> {
        Ok(self.store.read_all().await?.search(query))
    }

    pub async fn delete_unlocked(&self, now: f64) -> Result<Mutation> {
        let mut slot = self.history.lock().await;
        let settings = self.store.read_settings().await?;
        let applied = self.store.delete_unlocked(&settings, now).await?;
        self.finish(&mut slot, &settings, applied).await
    }

    pub async fn create_group(&self, now: f64) -> Result<Mutation> {
        self.mutate(|settings| Action::CreateGroup {
            template: settings.template(now),
        })
        .await
    }

    pub async fn delete_group(&self, id: &str, now: f64) -> Result<Mutation> {
        self.mutate(|settings| Action::DeleteGroup {
            id: id.to_string(),
            template: settings.template(now),
        })
        .await
    }

    pub async fn delete_tab(&self, group_id: &str, index: usize) -> Result<Mutation> {
        self.mutate(|_| Action::DeleteTab {
            group_id: group_id.to_string(),
            index,
        })
        .await
    }

    pub async fn update_group(&self, id: &str, patch: GroupPatch) -> Result<Mutation> {
        self.mutate(|_| Action::UpdateGroup {
            id: id.to_string(),
            patch,
        })
        .await
    }

    pub async fn move_tab(&self, from: &str, from_index: usize, to: &str, to_index: usize) -> Result<Mutation> {
        self.mutate(|_| Action::MoveTab {
            from: from.to_string(),
            from_index,
            to: to.to_string(),
            to_index,
        })
        .await
    }

    /// Add the groups of an exported backup (or a bare group array) next
    /// to the existing ones
    pub async fn import_groups(&self, json: &str) -> Result<Mutation> {
        let groups = match serde_json::from_str::<Backup>(json) {
            Ok(backup) => backup.groups,
            Err(_) => serde_json::from_str::<Vec<Group>>(json)?,
        };
        if groups.is_empty() {
            return Err(Error::Validation("backup contains no groups".to_string()));
        }

        self.mutate(|_| Action::Import { groups }).await
    }

    pub async fn export_groups(&self, now: f64) -> Result<String> {
        let backup = Backup {
            exported: now,
            groups: self.read_groups().await?,
        };
        Ok(serde_json::to_string_pretty(&backup)?)
    }

    /// Produce a backup when the configured period has passed
    pub async fn backup_if_due(&self, last_backup: Option<f64>, now: f64) -> Result<Option<String>> {
        let settings = self.store.read_settings().await?;
        if !settings.backup_due(last_backup, now) {
            return Ok(None);
        }
        self.export_groups(now).await.map(Some)
    }

    /// Reopen a group's tabs; with `restore = remove` the group is deleted
    /// afterwards unless it is locked. Returns the number of tabs opened.
    pub async fn restore_group(&self, id: &str, now: f64) -> Result<usize> {
        let mut slot = self.history.lock().await;
        let settings = self.store.read_settings().await?;
        let groups = self.store.read_all().await?;
        let group = groups
            .get(id)
            .cloned()
            .ok_or_else(|| Error::GroupNotFound(id.to_string()))?;

        for tab in &group.tabs {
            let opts = CreateOptions {
                active: false,
                pinned: tab.pinned.unwrap_or(false),
            };
            create_quietly(&self.tabs, &tab.url, opts).await;
        }

        if settings.restore == RestoreMode::Remove && !group.locked {
            let applied = self
                .store
                .apply(Action::DeleteGroup {
                    id: id.to_string(),
                    template: settings.template(now),
                })
                .await?;
            self.finish(&mut slot, &settings, applied).await?;
        }

        Ok(group.tabs.len())
    }

    pub async fn undo(&self) -> Result<Option<Vec<Group>>> {
        self.step(History::undo).await
    }

    pub async fn redo(&self) -> Result<Option<Vec<Group>>> {
        self.step(History::redo).await
    }

    /// Hand the last merge result to the foreground page, once
    pub async fn take_transfer(&self) -> Result<Option<Transfer>> {
        let keys = [TRANSFER_KEY.to_string()];
        let mut items = self.local.read(Some(&keys)).await?;
        let Some(value) = items.remove(TRANSFER_KEY) else {
            return Ok(None);
        };

        self.local.remove(&keys).await?;
        Ok(Some(serde_json::from_value(value)?))
    }

    async fn mutate(&self, build: impl FnOnce(&Settings) -> Action) -> Result<Mutation> {
        let mut slot = self.history.lock().await;
        let settings = self.store.read_settings().await?;
        let applied = self.store.apply(build(&settings)).await?;
        self.finish(&mut slot, &settings, applied).await
    }

    async fn finish(&self, slot: &mut Option<History>, settings: &Settings, applied: Applied) -> Result<Mutation> {
        let groups = applied.after.clone().into_groups();
        let recorded = self.record(slot, settings, applied).await;
        Ok(Mutation {
            groups,
            history_limit_reached: recorded.limit_reached(),
        })
    }

    /// Record a committed action. The store write already happened, so a
    /// history that cannot be loaded is replaced rather than failing the call.
    async fn record(&self, slot: &mut Option<History>, settings: &Settings, applied: Applied) -> RecordOutcome {
        let history = match slot.take() {
            Some(history) => history,
            None => self
                .load_history(settings, &applied.before)
                .await
                .unwrap_or_else(|e| {
                    warn!("Failed to load undo history, starting a new one: {}", e);
                    History::new(applied.before.clone(), settings.history_depth)
                }),
        };
        let history = slot.insert(history);
        if history.current() != applied.before {
            warn!("Undo history no longer matches stored groups, starting a new one");
            *history = History::new(applied.before.clone(), settings.history_depth);
        }

        let outcome = history.record(applied.action);
        self.persist_history(history).await;
        outcome
    }

    /// Walk the history and write the resulting snapshot. When the stored
    /// groups are not what the history expects, nothing is written and the
    /// history restarts from the stored groups.
    async fn step(&self, walk: fn(&mut History) -> Option<GroupSet>) -> Result<Option<Vec<Group>>> {
        let mut slot = self.history.lock().await;
        let settings = self.store.read_settings().await?;
        let baseline = self.store.read_all().await?;
        let history = match slot.take() {
            Some(history) => history,
            None => self.load_history(&settings, &baseline).await?,
        };
        let history = slot.insert(history);

        if history.current() != baseline {
            warn!("Undo history no longer matches stored groups, starting a new one");
            *history = History::new(baseline, settings.history_depth);
            self.persist_history(history).await;
            return Ok(None);
        }

        let mut next = history.clone();
        let Some(snapshot) = walk(&mut next) else {
            return Ok(None);
        };

        self.store.replace_all(&snapshot).await?;
        *history = next;
        self.persist_history(history).await;
        Ok(Some(snapshot.into_groups()))
    }

    /// Undo history from the local store, or a fresh one on `baseline`
    async fn load_history(&self, settings: &Settings, baseline: &GroupSet) -> Result<History> {
        let keys = [HISTORY_KEY.to_string()];
        let stored = self.local.read(Some(&keys)).await?.remove(HISTORY_KEY);
        Ok(match stored.map(serde_json::from_value::<History>) {
            Some(Ok(history)) => history,
            Some(Err(e)) => {
                warn!("Discarding unreadable undo history: {}", e);
                History::new(baseline.clone(), settings.history_depth)
            }
            None => History::new(baseline.clone(), settings.history_depth),
        })
    }

    async fn persist_history(&self, history: &History) {
        let value = match serde_json::to_value(history) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize undo history: {}", e);
                return;
            }
        };

        let mut items = Map::new();
        items.insert(HISTORY_KEY.to_string(), value);
        if let Err(e) = self.local.write(items).await {
            warn!("Failed to save undo history: {}", e);
        }
    }

    async fn write_transfer(&self, transfer: &Transfer) {
        let mut items = Map::new();
        match serde_json::to_value(transfer) {
            Ok(value) => {
                items.insert(TRANSFER_KEY.to_string(), value);
            }
            Err(e) => {
                warn!("Failed to serialize merge transfer: {}", e);
                return;
            }
        }
        if let Err(e) = self.local.write(items).await {
            warn!("Failed to hand merge result to the page: {}", e);
        }
    }

    /// Focus the extension page, opening it if needed
    async fn show_extension(&self, open_tabs: &[TabInfo]) {
        match open_tabs.iter().find(|tab| tab.title == EXTENSION_TITLE) {
            Some(tab) => {
                let opts = UpdateOptions {
                    active: Some(true),
                    pinned: None,
                };
                if let Err(e) = self.tabs.update(tab.id, opts).await {
                    warn!("Failed to focus the extension page: {}", e);
                }
            }
            None => {
                let opts = CreateOptions {
                    active: true,
                    pinned: false,
                };
                create_quietly(&self.tabs, &self.extension_url, opts).await;
            }
        }
    }
}
