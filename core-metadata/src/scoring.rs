//! Candidate match scoring.
//!
//! Each candidate gets a 0-100 score built from four parts:
//!
//! | part | max | rule |
//! |---|---|---|
//! | title | 30 | Jaro-Winkler on normalized titles; half credit when the provider reports no title |
//! | sync | 20 | synced lyrics |
//! | reference | 40 | word-set Jaccard against reference lyrics; 0 without a reference |
//! | duration | 10 | full within 2 s, linear down to 0 at 10 s |

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::lrc::strip_timestamps;
use crate::lyrics::{LyricsCandidate, LyricsQuery};

pub const TITLE_WEIGHT: f64 = 30.0;
pub const SYNC_WEIGHT: f64 = 20.0;
pub const REFERENCE_WEIGHT: f64 = 40.0;
pub const DURATION_WEIGHT: f64 = 10.0;
pub const MAX_SCORE: f64 = 100.0;

/// Full duration credit at or below this difference.
pub const DURATION_EXACT_SECS: u32 = 2;
/// No duration credit above this difference.
pub const DURATION_TOLERANCE_SECS: u32 = 10;

/// A candidate with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: LyricsCandidate,
    /// 0 to 100
    pub match_score: f64,
    /// Short breakdown, e.g. `title 28.4, synced, duration 10.0`
    pub match_reason: String,
}

/// Score `candidate` against `query`.
pub fn score_candidate(query: &LyricsQuery, candidate: LyricsCandidate) -> ScoredCandidate {
    let mut reasons = Vec::new();

    let title = match candidate.metadata.title.as_deref() {
        Some(matched) => TITLE_WEIGHT * title_similarity(&query.title, matched),
        None => TITLE_WEIGHT / 2.0,
    };
    reasons.push(format!("title {:.1}", title));

    let sync = if candidate.is_synced {
        reasons.push("synced".to_string());
        SYNC_WEIGHT
    } else {
        reasons.push("plain".to_string());
        0.0
    };

    let reference = match query.reference_lyrics.as_deref() {
        Some(reference) => {
            let value = REFERENCE_WEIGHT * lyrics_similarity(reference, &candidate.text);
            reasons.push(format!("reference {:.1}", value));
            value
        }
        None => 0.0,
    };

    let duration = match (query.duration_secs, candidate.metadata.duration_secs) {
        (Some(want), Some(have)) => {
            let value = duration_score(want, have);
            reasons.push(format!("duration {:.1}", value));
            value
        }
        _ => 0.0,
    };

    let match_score = (title + sync + reference + duration).clamp(0.0, MAX_SCORE);

    ScoredCandidate {
        candidate,
        match_score,
        match_reason: reasons.join(", "),
    }
}

/// Duration credit in `[0, DURATION_WEIGHT]`.
pub fn duration_score(want_secs: u32, have_secs: u32) -> f64 {
    let diff = want_secs.abs_diff(have_secs);
    if diff <= DURATION_EXACT_SECS {
        DURATION_WEIGHT
    } else if diff >= DURATION_TOLERANCE_SECS {
        0.0
    } else {
        let span = f64::from(DURATION_TOLERANCE_SECS - DURATION_EXACT_SECS);
        DURATION_WEIGHT * f64::from(DURATION_TOLERANCE_SECS - diff) / span
    }
}

/// Jaro-Winkler similarity of normalized titles, in `[0, 1]`.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (normalize_title(a), normalize_title(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::jaro_winkler(&a, &b)
}

/// Jaccard index of the word sets of two lyrics texts, in `[0, 1]`.
/// Time tags are ignored.
pub fn lyrics_similarity(a: &str, b: &str) -> f64 {
    let a = word_set(&strip_timestamps(a));
    let b = word_set(&strip_timestamps(b));

    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Lowercase, drop bracketed suffixes like `(Remastered 2011)`, keep
/// alphanumerics and collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut depth = 0usize;

    for c in title.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            c if c.is_alphanumeric() => out.extend(c.to_lowercase()),
            _ => out.push(' '),
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn word_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}
