//! Feature façade for the tunevault workspace.
//!
//! Hosts depend on `tunevault-workspace` and pick features instead of wiring
//! each member crate by hand:
//!
//! - `desktop-shims`: the [`service`] façade with reqwest/tokio bridges
//! - `lyrics`: remote lyrics providers and the race engine in [`metadata`]
//! - `downloads`: direct access to the queue and pipeline in [`download`]

#[cfg(feature = "desktop-shims")]
pub use core_service as service;

#[cfg(feature = "lyrics")]
pub use core_metadata as metadata;

#[cfg(feature = "downloads")]
pub use core_download as download;
