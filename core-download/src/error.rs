use core_library::LibraryError;
use thiserror::Error;

/// Message carried by [`DownloadError::Transfer`] when a run was aborted.
pub const ABORTED: &str = "transfer aborted";

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("No audio source URL for item {item_id}")]
    MissingSourceUrl { item_id: String },

    #[error("Item id {item_id:?} cannot name a directory")]
    InvalidItemId { item_id: String },

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Filesystem error: {0}")]
    Filesystem(String),

    #[error("Catalog commit failed: {0}")]
    Catalog(#[from] LibraryError),

    #[error("Pipeline task ended unexpectedly: {0}")]
    Interrupted(String),
}

impl DownloadError {
    pub fn aborted() -> Self {
        Self::Transfer(ABORTED.to_string())
    }

    /// True for the error produced when a run's control was aborted.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Transfer(message) if message == ABORTED)
    }

    /// Whether a retry of the whole run can be expected to help.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::MissingSourceUrl { .. } | Self::InvalidItemId { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
