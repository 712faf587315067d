//! # Lyrics Race Engine
//!
//! Fans one query out to every provider at once and ranks whatever comes
//! back before the deadline.
//!
//! - Each provider runs in its own task. Errors and panics count as "no
//!   result" and never fail the race.
//! - When the deadline passes with at least one result, those results are
//!   returned. Slow providers are left to finish on their own; their answers
//!   are discarded.
//! - When the deadline passes with nothing, the engine keeps waiting for every
//!   provider to settle (`settle_on_empty`), or returns empty straight away.
//! - Survivors are scored by [`score_candidate`] and ranked descending, synced
//!   before plain on equal scores.

use std::sync::Arc;
use std::time::Duration;

use core_async::sync::mpsc;
use core_async::time::Instant;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, LyricsEvent};
use core_runtime::logging::redact_url_secrets;
use tracing::{debug, info, instrument, warn};

use crate::lyrics::{LyricsCandidate, LyricsProvider, LyricsQuery, LyricsSource};
use crate::scoring::{score_candidate, ScoredCandidate};

/// Default race deadline
pub const DEFAULT_RACE_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct RaceConfig {
    /// How long to wait before settling for the results collected so far
    pub deadline: Duration,
    /// Keep waiting for full settlement when nothing arrived by the deadline
    pub settle_on_empty: bool,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_RACE_DEADLINE,
            settle_on_empty: true,
        }
    }
}

impl RaceConfig {
    pub fn from_core_config(config: &CoreConfig) -> Self {
        Self {
            deadline: config.lyrics_deadline,
            settle_on_empty: config.settle_on_empty_race,
        }
    }
}

/// Ranked race result.
#[derive(Debug, Clone, Default)]
pub struct RaceOutcome {
    /// Scored candidates, best first
    pub ranked: Vec<ScoredCandidate>,
    pub elapsed: Duration,
    /// True when the deadline cut off at least one provider
    pub timed_out: bool,
}

impl RaceOutcome {
    /// Highest scored candidate, synced winning ties.
    pub fn best(&self) -> Option<&ScoredCandidate> {
        let top = self.ranked.first()?;
        self.ranked
            .iter()
            .take_while(|c| c.match_score == top.match_score)
            .find(|c| c.candidate.is_synced)
            .or(Some(top))
    }

    pub fn into_best(self) -> Option<ScoredCandidate> {
        self.best().cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }
}

pub struct LyricsRaceEngine {
    providers: Vec<Arc<dyn LyricsProvider>>,
    config: RaceConfig,
    events: Option<EventBus>,
}

impl LyricsRaceEngine {
    pub fn new(providers: Vec<Arc<dyn LyricsProvider>>, config: RaceConfig) -> Self {
        Self {
            providers,
            config,
            events: None,
        }
    }

    /// Publish a [`LyricsEvent::RaceFinished`] after every race.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Run a race that is not tied to a queue item.
    pub async fn race(&self, query: &LyricsQuery) -> RaceOutcome {
        self.run(None, query).await
    }

    /// Run a race on behalf of queue item `item_id`.
    pub async fn race_for(&self, item_id: &str, query: &LyricsQuery) -> RaceOutcome {
        self.run(Some(item_id), query).await
    }

    #[instrument(skip(self, query), fields(title = %query.title, artist = %query.artist))]
    async fn run(&self, item_id: Option<&str>, query: &LyricsQuery) -> RaceOutcome {
        let started = Instant::now();

        if let Err(e) = query.validate() {
            warn!(error = %e, "Skipping lyrics race");
            return RaceOutcome::default();
        }

        let (candidates, timed_out) = self.collect(query).await;

        let mut ranked: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|candidate| score_candidate(query, candidate))
            .collect();
        ranked.sort_by(|a, b| {
            b.match_score
                .total_cmp(&a.match_score)
                .then_with(|| b.candidate.is_synced.cmp(&a.candidate.is_synced))
        });

        let outcome = RaceOutcome {
            ranked,
            elapsed: started.elapsed(),
            timed_out,
        };

        let best_source = outcome.best().map(|c| c.candidate.source.as_str().to_string());
        info!(
            candidates = outcome.len(),
            best = best_source.as_deref().unwrap_or("none"),
            timed_out,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Lyrics race finished"
        );

        if let Some(events) = &self.events {
            let _ = events.emit(CoreEvent::Lyrics(LyricsEvent::RaceFinished {
                item_id: item_id.map(str::to_string),
                candidates: outcome.len(),
                best_source,
                elapsed_ms: outcome.elapsed.as_millis() as u64,
            }));
        }

        outcome
    }

    /// Gather provider answers until the deadline or full settlement.
    async fn collect(&self, query: &LyricsQuery) -> (Vec<LyricsCandidate>, bool) {
        let (tx, mut rx) = mpsc::unbounded_channel::<(LyricsSource, Option<LyricsCandidate>)>();

        for provider in &self.providers {
            let provider = Arc::clone(provider);
            let query = query.clone();
            let tx = tx.clone();
            core_async::spawn(async move {
                let source = provider.source();
                let result = match provider.fetch(&query).await {
                    Ok(found) => found,
                    Err(e) => {
                        warn!(
                            source = %source,
                            error = %redact_url_secrets(&e.to_string()),
                            "Lyrics provider failed"
                        );
                        None
                    }
                };
                // The race may already be over; a closed channel is fine.
                let _ = tx.send((source, result));
            });
        }
        drop(tx);

        let mut candidates = Vec::new();
        let mut pending = self.providers.len();
        let mut deadline_passed = false;
        let mut cut_off = false;
        let mut deadline = Box::pin(core_async::time::sleep(self.config.deadline));

        loop {
            core_async::select! {
                message = rx.recv() => match message {
                    Some((source, found)) => {
                        pending = pending.saturating_sub(1);
                        match found {
                            Some(candidate) => {
                                debug!(source = %source, synced = candidate.is_synced, "Lyrics candidate received");
                                candidates.push(candidate);
                            }
                            None => debug!(source = %source, "No lyrics from provider"),
                        }
                    }
                    // Every sender dropped: all providers settled, panicked ones included.
                    None => break,
                },
                _ = &mut deadline, if !deadline_passed => {
                    deadline_passed = true;
                    if !candidates.is_empty() || !self.config.settle_on_empty {
                        cut_off = pending > 0;
                        break;
                    }
                    debug!(pending, "Race deadline passed without results, waiting for settlement");
                }
            }
        }

        (candidates, cut_off)
    }
}
