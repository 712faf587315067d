//! # Library Catalog Module
//!
//! Owns the song catalog that downloads are committed into.
//!
//! ## Overview
//!
//! - [`models`]: the committed [`SongEntity`](models::SongEntity) and its
//!   parsed [`LyricLine`](models::LyricLine)s
//! - [`catalog`]: the [`Catalog`](catalog::Catalog) boundary the queue
//!   orchestrator commits through, and its SQLite implementation
//! - [`db`]: connection pool creation and embedded migrations

pub mod catalog;
pub mod db;
pub mod error;
pub mod models;

pub use catalog::{Catalog, SqliteCatalog};
pub use error::{LibraryError, Result};
pub use models::{CollectionEntry, LyricLine, SongEntity};
