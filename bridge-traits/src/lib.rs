//! # Host Bridge Traits
//!
//! Capability traits the download core needs from its host.
//!
//! The core never talks to the network or the disk directly. Every pipeline
//! receives these capabilities as trait objects so that desktop builds can use
//! `bridge-desktop` while tests plug in in-memory fakes.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - metadata requests plus ranged byte
//!   streams for resumable asset transfers
//! - [`FileSystemAccess`](storage::FileSystemAccess) - item directory
//!   management and append-mode writers
//! - [`LoggerSink`](log::LoggerSink) - forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it and keep the offending URL or path in
//! the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; the orchestrator shares them across
//! concurrently running pipelines.

pub mod error;
pub mod http;
pub mod storage;
pub mod log;

pub use error::BridgeError;

pub use http::{ByteRange, ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::{FileMetadata, FileSystemAccess};
pub use log::{LogEntry, LogLevel, LoggerSink};
