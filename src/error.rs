/// Error taxonomy for Tab Merger
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage quota exceeded: {0}")]
    StorageQuota(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Group is locked: {0}")]
    GroupLocked(String),

    #[error("Tab {index} not found in {group_id}")]
    TabNotFound { group_id: String, index: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bridge error: {0}")]
    Bridge(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classify a rejected storage call. The browser reports quota and
    /// write-rate violations only through the message text.
    pub fn from_storage_message(message: String) -> Error {
        let lower = message.to_lowercase();
        if lower.contains("quota") || lower.contains("max_write_operations") {
            Error::StorageQuota(message)
        } else {
            Error::Storage(message)
        }
    }
}
