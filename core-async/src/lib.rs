//! Async runtime abstraction layer for tunevault.
//!
//! Every `core-*` and `bridge-*` crate goes through this crate instead of
//! depending on Tokio directly, so the executor surface the download pipeline
//! relies on stays in one place.
//!
//! # Modules
//!
//! - `task`: task spawning and join handles
//! - `time`: sleep, timeouts, instants
//! - `sync`: locks, channels, `watch` snapshots and `CancellationToken`
//! - `io`: async read/write traits used by the bridge layer
//! - `runtime`: handle lookup and a blocking entry point for sync contexts
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod io;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

/// Waits on multiple branches, returning when the first completes.
pub use tokio::select;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
