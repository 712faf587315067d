//! # Track Downloads
//!
//! Turns queued remote songs into catalog entities on local disk.
//!
//! - [`store`]: the shared queue table every layer reads and writes
//! - [`orchestrator`]: dispatches pending items under a concurrency limit and
//!   bridges pause, resume and removal into running pipelines
//! - [`manager`]: the per-item pipeline (audio, cover, lyrics, commit) with
//!   rollback on failure
//! - [`transfer`]: pausable, resumable HTTP transfers
//!
//! ```text
//! QueueStore --watch--> QueueOrchestrator --spawn--> DownloadManager
//!      ^                        |                        |
//!      +------ progress --------+------ settlement ------+
//! ```

pub mod assets;
pub mod error;
pub mod manager;
pub mod orchestrator;
pub mod queue;
pub mod store;
pub mod transfer;

pub use assets::{validate_item_id, ItemLayout, StagedAssets, StagedLyrics};
pub use error::{DownloadError, Result};
pub use manager::{DownloadConfig, DownloadManager};
pub use orchestrator::{OrchestratorConfig, OrchestratorHandle, QueueOrchestrator};
pub use queue::{
    AudioSource, PlacementHint, QueueItem, QueueItemUpdate, QueueStats, QueueStatus, SongSnapshot,
};
pub use store::{QueueSnapshot, QueueStore};
pub use transfer::{ResumableTransfer, TransferControl};
