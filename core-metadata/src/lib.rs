//! # Lyrics Metadata
//!
//! Everything the download pipeline needs to find lyrics for a track:
//!
//! - [`lyrics`]: query/candidate types and the [`LyricsProvider`] trait
//! - [`providers`]: LRCLib (exact and search), Musixmatch and lyrics.ovh
//!   adapters over the host [`HttpClient`](bridge_traits::HttpClient)
//! - [`scoring`]: 0-100 match scoring of candidates
//! - [`race`]: the concurrent, deadline-bounded [`LyricsRaceEngine`]
//! - [`lrc`]: LRC parsing into catalog [`LyricLine`](core_library::LyricLine)s

pub mod error;
pub mod lrc;
pub mod lyrics;
#[cfg(feature = "lyrics")]
pub mod providers;
pub mod race;
pub mod scoring;

pub use error::{MetadataError, Result};
pub use lrc::{parse_lrc, strip_timestamps};
pub use lyrics::{CandidateMetadata, LyricsCandidate, LyricsProvider, LyricsQuery, LyricsSource};
#[cfg(feature = "lyrics")]
pub use providers::default_providers;
pub use race::{LyricsRaceEngine, RaceConfig, RaceOutcome};
pub use scoring::ScoredCandidate;
