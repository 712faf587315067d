//! Synchronization primitives.
//!
//! Re-exports the async-aware Tokio primitives plus the cooperative
//! cancellation token from `tokio-util`.
//!
//! The queue store is built on [`watch`]: a single-value channel whose
//! `send_if_modified` gives replace-on-write semantics against the current
//! value, and whose receivers observe every committed snapshot.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{watch, CancellationToken};
//!
//! let (tx, rx) = watch::channel(1u32);
//! tx.send_if_modified(|current| {
//!     *current += 1;
//!     true
//! });
//! assert_eq!(*rx.borrow(), 2);
//!
//! let token = CancellationToken::new();
//! token.cancel();
//! assert!(token.is_cancelled());
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore, SemaphorePermit,
};

pub use tokio_util::sync::CancellationToken;
