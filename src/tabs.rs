/// Tab controller capability: the browser's open tabs
use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::directive::TabScope;
use crate::error::Result;
use crate::tab_data::{TabId, TabInfo};

/// Pause after closing tabs so the browser's tab list catches up
pub const TAB_SETTLE_DELAY_MS: u32 = 100;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateOptions {
    pub active: bool,
    pub pinned: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
}

#[async_trait(?Send)]
pub trait TabController {
    async fn query(&self, scope: TabScope) -> Result<Vec<TabInfo>>;
    async fn close(&self, ids: &[TabId]) -> Result<()>;
    async fn create(&self, url: &str, opts: CreateOptions) -> Result<()>;
    async fn update(&self, id: TabId, opts: UpdateOptions) -> Result<()>;
    /// Wait for the host to finish applying earlier requests
    async fn settle(&self);
}

/// Close tabs without letting a failure reach the caller. Returns whether a
/// close request was issued.
pub async fn close_quietly<T: TabController + ?Sized>(tabs: &T, ids: &[TabId]) -> bool {
    if ids.is_empty() {
        return false;
    }

    if let Err(e) = tabs.close(ids).await {
        warn!("Failed to close {} tab(s): {}", ids.len(), e);
    }
    true
}

pub async fn create_quietly<T: TabController + ?Sized>(tabs: &T, url: &str, opts: CreateOptions) {
    if let Err(e) = tabs.create(url, opts).await {
        warn!("Failed to open {}: {}", url, e);
    }
}
