//! # Core Runtime Module
//!
//! Foundational infrastructure shared by the download core:
//! - Logging and tracing ([`logging`])
//! - Configuration ([`config`])
//! - Event bus ([`events`])

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
