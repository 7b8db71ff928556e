/// In-memory doubles for the storage and tab capabilities
use std::cell::{Cell, RefCell};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::directive::TabScope;
use crate::error::{Error, Result};
use crate::storage::KeyValueStore;
use crate::tab_data::{Group, SavedTab, TabId, TabInfo};
use crate::tabs::{CreateOptions, TabController, UpdateOptions};

pub fn create_test_group(id: &str, urls: &[&str]) -> Group {
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
                title: url.to_string(),
                url: url.to_string(),
                pinned: None,
                fav_icon_url: None,
            })
            .collect(),
    }
}

pub fn create_test_tab(id: TabId, url: &str, title: &str) -> TabInfo {
    TabInfo::new(id, id, url.to_string(), title.to_string(), false)
}

#[derive(Default)]
pub struct MemoryStore {
    items: RefCell<Map<String, Value>>,
    reads: Cell<usize>,
    writes: Cell<usize>,
    removes: Cell<usize>,
    last_written: RefCell<Vec<String>>,
    read_error: RefCell<Option<String>>,
    write_error: RefCell<Option<String>>,
    remove_error: RefCell<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.items.borrow_mut().insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.items.borrow().get(key).cloned()
    }

    pub fn read_calls(&self) -> usize {
        self.reads.get()
    }

    pub fn write_calls(&self) -> usize {
        self.writes.get()
    }

    pub fn remove_calls(&self) -> usize {
        self.removes.get()
    }

    pub fn last_written_keys(&self) -> Vec<String> {
        self.last_written.borrow().clone()
    }

    pub fn fail_reads(&self, message: &str) {
        *self.read_error.borrow_mut() = Some(message.to_string());
    }

    pub fn fail_writes(&self, message: &str) {
        *self.write_error.borrow_mut() = Some(message.to_string());
    }

    pub fn fail_removes(&self, message: &str) {
        *self.remove_error.borrow_mut() = Some(message.to_string());
    }
}

#[async_trait(?Send)]
impl KeyValueStore for MemoryStore {
    async fn read(&self, keys: Option<&[String]>) -> Result<Map<String, Value>> {
        self.reads.set(self.reads.get() + 1);
        if let Some(message) = self.read_error.borrow().clone() {
            return Err(Error::from_storage_message(message));
        }
        let items = self.items.borrow();
        Ok(match keys {
            Some(keys) => keys
                .iter()
                .filter_map(|key| items.get(key).map(|v| (key.clone(), v.clone())))
                .collect(),
            None => items.clone(),
        })
    }

    async fn write(&self, items: Map<String, Value>) -> Result<()> {
        if let Some(message) = self.write_error.borrow().clone() {
            return Err(Error::from_storage_message(message));
        }
        self.writes.set(self.writes.get() + 1);
        *self.last_written.borrow_mut() = items.keys().cloned().collect();
        self.items.borrow_mut().extend(items);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        self.removes.set(self.removes.get() + 1);
        if let Some(message) = self.remove_error.borrow().clone() {
            return Err(Error::from_storage_message(message));
        }
        let mut items = self.items.borrow_mut();
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTabs {
    pub open: RefCell<Vec<TabInfo>>,
    pub closed: RefCell<Vec<Vec<TabId>>>,
    pub created: RefCell<Vec<(String, CreateOptions)>>,
    pub updated: RefCell<Vec<(TabId, UpdateOptions)>>,
    pub scopes: RefCell<Vec<TabScope>>,
    pub settled: Cell<usize>,
    pub fail_close: Cell<bool>,
}

impl FakeTabs {
    pub fn with_tabs(tabs: Vec<TabInfo>) -> Self {
        FakeTabs {
            open: RefCell::new(tabs),
            ..FakeTabs::default()
        }
    }

    pub fn closed_ids(&self) -> Vec<TabId> {
        self.closed.borrow().iter().flatten().copied().collect()
    }
}

#[async_trait(?Send)]
impl TabController for FakeTabs {
    async fn query(&self, scope: TabScope) -> Result<Vec<TabInfo>> {
        self.scopes.borrow_mut().push(scope);
        Ok(self.open.borrow().clone())
    }

    async fn close(&self, ids: &[TabId]) -> Result<()> {
        self.closed.borrow_mut().push(ids.to_vec());
        if self.fail_close.get() {
            return Err(Error::Bridge("No tab with id".to_string()));
        }
        self.open.borrow_mut().retain(|tab| !ids.contains(&tab.id));
        Ok(())
    }

    async fn create(&self, url: &str, opts: CreateOptions) -> Result<()> {
        self.created.borrow_mut().push((url.to_string(), opts));
        Ok(())
    }

    async fn update(&self, id: TabId, opts: UpdateOptions) -> Result<()> {
        self.updated.borrow_mut().push((id, opts));
        Ok(())
    }

    async fn settle(&self) {
        self.settled.set(self.settled.get() + 1);
    }
}
