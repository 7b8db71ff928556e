/// Tab Merger - Chrome Extension core for saving open tabs into groups
/// Built with Rust + WASM

mod bridge;
pub mod directive;
pub mod error;
pub mod filter;
pub mod groups;
pub mod history;
pub mod merger;
pub mod settings;
pub mod storage;
pub mod tab_data;
pub mod tabs;

#[cfg(test)]
mod testing;

use std::rc::Rc;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::bridge::{BrowserMerger, from_js, to_js};
use crate::directive::{Directive, MergeRequest, Trigger};
use crate::tab_data::{GroupPatch, TabInfo};

pub use crate::error::{Error, Result};
pub use crate::merger::TabMerger;

thread_local! {
    static MERGER: Rc<BrowserMerger> = Rc::new(bridge::browser_merger());
}

fn instance() -> Rc<BrowserMerger> {
    MERGER.with(Rc::clone)
}

fn respond<T: Serialize>(result: Result<T>) -> std::result::Result<JsValue, JsValue> {
    result
        .and_then(|value| to_js(&value))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// Install-time setup
#[wasm_bindgen]
pub async fn initialize() -> std::result::Result<JsValue, JsValue> {
    respond(instance().initialize(js_sys::Date::now()).await)
}

/// Keyboard shortcut handler
#[wasm_bindgen]
pub async fn merge_from_command(command: String, origin: JsValue) -> std::result::Result<JsValue, JsValue> {
    let trigger = Trigger::Shortcut { command };
    respond(merge_trigger(trigger, origin, None).await)
}

/// Context-menu handler
#[wasm_bindgen]
pub async fn merge_from_menu(
    menu_item_id: String,
    origin: JsValue,
    group_id: Option<String>,
) -> std::result::Result<JsValue, JsValue> {
    let trigger = Trigger::MenuClick { menu_item_id };
    respond(merge_trigger(trigger, origin, group_id).await)
}

/// Merge button inside the extension page
#[wasm_bindgen]
pub async fn merge_into(
    directive: String,
    group_id: Option<String>,
    origin: JsValue,
) -> std::result::Result<JsValue, JsValue> {
    respond(merge_directive(&directive, origin, group_id).await)
}

async fn merge_directive(directive: &str, origin: JsValue, group_id: Option<String>) -> Result<merger::MergeReport> {
    let directive = Directive::parse(directive)
        .ok_or_else(|| Error::Validation(format!("unknown directive {:?}", directive)))?;
    let origin: TabInfo = from_js(origin)?;
    instance()
        .merge_request(MergeRequest::new(directive), &origin, group_id.as_deref(), js_sys::Date::now())
        .await
}

async fn merge_trigger(trigger: Trigger, origin: JsValue, group_id: Option<String>) -> Result<merger::MergeReport> {
    let origin: TabInfo = from_js(origin)?;
    instance()
        .merge(&trigger, &origin, group_id.as_deref(), js_sys::Date::now())
        .await
}

#[wasm_bindgen]
pub async fn undo() -> std::result::Result<JsValue, JsValue> {
    respond(instance().undo().await)
}

#[wasm_bindgen]
pub async fn redo() -> std::result::Result<JsValue, JsValue> {
    respond(instance().redo().await)
}

#[wasm_bindgen]
pub async fn read_groups() -> std::result::Result<JsValue, JsValue> {
    respond(instance().read_groups().await)
}

#[wasm_bindgen]
pub async fn search_groups(query: String) -> std::result::Result<JsValue, JsValue> {
    respond(instance().search_groups(&query).await)
}

#[wasm_bindgen]
pub async fn create_group() -> std::result::Result<JsValue, JsValue> {
    respond(instance().create_group(js_sys::Date::now()).await)
}

#[wasm_bindgen]
pub async fn delete_unlocked() -> std::result::Result<JsValue, JsValue> {
    respond(instance().delete_unlocked(js_sys::Date::now()).await)
}

#[wasm_bindgen]
pub async fn delete_group(id: String) -> std::result::Result<JsValue, JsValue> {
    respond(instance().delete_group(&id, js_sys::Date::now()).await)
}

#[wasm_bindgen]
pub async fn delete_tab(group_id: String, index: usize) -> std::result::Result<JsValue, JsValue> {
    respond(instance().delete_tab(&group_id, index).await)
}

#[wasm_bindgen]
pub async fn update_group(id: String, patch: JsValue) -> std::result::Result<JsValue, JsValue> {
    let patch: Result<GroupPatch> = from_js(patch);
    match patch {
        Ok(patch) => respond(instance().update_group(&id, patch).await),
        Err(e) => respond::<()>(Err(e)),
    }
}

#[wasm_bindgen]
pub async fn move_tab(
    from: String,
    from_index: usize,
    to: String,
    to_index: usize,
) -> std::result::Result<JsValue, JsValue> {
    respond(instance().move_tab(&from, from_index, &to, to_index).await)
}

#[wasm_bindgen]
pub async fn restore_group(id: String) -> std::result::Result<JsValue, JsValue> {
    respond(instance().restore_group(&id, js_sys::Date::now()).await)
}

#[wasm_bindgen]
pub async fn export_groups() -> std::result::Result<JsValue, JsValue> {
    respond(instance().export_groups(js_sys::Date::now()).await)
}

#[wasm_bindgen]
pub async fn import_groups(json: String) -> std::result::Result<JsValue, JsValue> {
    respond(instance().import_groups(&json).await)
}

/// Periodic backup check; resolves to the backup JSON or null
#[wasm_bindgen]
pub async fn backup_if_due(last_backup: Option<f64>) -> std::result::Result<JsValue, JsValue> {
    respond(instance().backup_if_due(last_backup, js_sys::Date::now()).await)
}

#[wasm_bindgen]
pub async fn take_transfer() -> std::result::Result<JsValue, JsValue> {
    respond(instance().take_transfer().await)
}

/// Order group keys by numeric suffix
#[wasm_bindgen]
pub fn sort_group_keys(mut keys: Vec<String>) -> Vec<String> {
    groups::sort_by_key(&mut keys);
    keys
}
