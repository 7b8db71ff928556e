/// Browser implementations of the storage and tab capabilities
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;

use crate::directive::TabScope;
use crate::error::{self, Error};
use crate::merger::TabMerger;
use crate::storage::KeyValueStore;
use crate::tab_data::{TabId, TabInfo};
use crate::tabs::{CreateOptions, TAB_SETTLE_DELAY_MS, TabController, UpdateOptions};

// Import JS bridge functions
#[wasm_bindgen(module = "/bridge.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn storageGet(area: &str, keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn storageSet(area: &str, items: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn storageRemove(area: &str, keys: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn queryTabs(all_windows: bool) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn closeTabs(tab_ids: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn createTab(url: &str, opts: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn updateTab(tab_id: i32, opts: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn sleep(ms: u32) -> Result<(), JsValue>;

    fn extensionUrl() -> String;
}

pub type BrowserMerger = TabMerger<ChromeStorage, ChromeStorage, ChromeTabs>;

/// The merger wired to `chrome.storage.sync` for groups and settings and
/// `chrome.storage.local` for history and merge transfers
pub fn browser_merger() -> BrowserMerger {
    TabMerger::new(
        ChromeStorage::new(StorageArea::Sync),
        ChromeStorage::new(StorageArea::Local),
        ChromeTabs,
        extensionUrl(),
    )
}

/// Serialize into plain JS objects (not `Map`s)
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> error::Result<JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| Error::Bridge(format!("Failed to serialize: {:?}", e)))
}

pub fn from_js<T: DeserializeOwned>(value: JsValue) -> error::Result<T> {
    serde_wasm_bindgen::from_value(value).map_err(|e| Error::Bridge(format!("Failed to parse: {:?}", e)))
}

fn js_message(e: JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageArea {
    /// Quota- and write-rate-limited, synced across devices
    Sync,
    Local,
}

impl StorageArea {
    fn as_str(self) -> &'static str {
        match self {
            StorageArea::Sync => "sync",
            StorageArea::Local => "local",
        }
    }
}

pub struct ChromeStorage {
    area: StorageArea,
}

impl ChromeStorage {
    pub fn new(area: StorageArea) -> Self {
        ChromeStorage { area }
    }
}

#[async_trait(?Send)]
impl KeyValueStore for ChromeStorage {
    async fn read(&self, keys: Option<&[String]>) -> error::Result<Map<String, Value>> {
        let keys = match keys {
            Some(keys) => to_js(keys)?,
            None => JsValue::NULL,
        };
        let items = storageGet(self.area.as_str(), keys)
            .await
            .map_err(|e| Error::from_storage_message(js_message(e)))?;
        from_js(items)
    }

    async fn write(&self, items: Map<String, Value>) -> error::Result<()> {
        storageSet(self.area.as_str(), to_js(&items)?)
            .await
            .map_err(|e| Error::from_storage_message(js_message(e)))
    }

    async fn remove(&self, keys: &[String]) -> error::Result<()> {
        storageRemove(self.area.as_str(), to_js(keys)?)
            .await
            .map_err(|e| Error::from_storage_message(js_message(e)))
    }
}

pub struct ChromeTabs;

#[async_trait(?Send)]
impl TabController for ChromeTabs {
    async fn query(&self, scope: TabScope) -> error::Result<Vec<TabInfo>> {
        let tabs = queryTabs(scope == TabScope::AllWindows)
            .await
            .map_err(|e| Error::Bridge(format!("Failed to get tabs: {}", js_message(e))))?;
        from_js(tabs)
    }

    async fn close(&self, ids: &[TabId]) -> error::Result<()> {
        closeTabs(to_js(ids)?)
            .await
            .map_err(|e| Error::Bridge(format!("Close failed: {}", js_message(e))))
    }

    async fn create(&self, url: &str, opts: CreateOptions) -> error::Result<()> {
        createTab(url, to_js(&opts)?)
            .await
            .map_err(|e| Error::Bridge(format!("Create failed: {}", js_message(e))))
    }

    async fn update(&self, id: TabId, opts: UpdateOptions) -> error::Result<()> {
        updateTab(id, to_js(&opts)?)
            .await
            .map_err(|e| Error::Bridge(format!("Update failed: {}", js_message(e))))
    }

    async fn settle(&self) {
        let _ = sleep(TAB_SETTLE_DELAY_MS).await;
    }
}
