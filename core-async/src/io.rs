//! Async I/O traits re-exported from Tokio.
//!
//! The bridge layer hands out boxed `AsyncWrite` sinks for streamed asset
//! transfers; downstream crates import the traits from here.

pub use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite,
    AsyncWriteExt, BufReader, BufWriter,
};
