//! # Queue Store
//!
//! The single shared table of queue items and the only source of truth for
//! their status and progress.
//!
//! The table lives in a `watch` channel as an `Arc<Vec<QueueItem>>`. Every
//! mutation builds a new vector from the *current* snapshot inside
//! `send_if_modified`, so concurrent writers never lose each other's updates
//! and readers always see a complete, immutable table. Subscribers are only
//! woken when something actually changed.
//!
//! ```text
//! pending --dispatch--> downloading --success--> completed
//! downloading --pause--> paused --resume--> pending
//! downloading --failure--> failed --retry--> pending
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use core_async::sync::watch;
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use tracing::{debug, warn};

use crate::assets::validate_item_id;
use crate::queue::{PlacementHint, QueueItem, QueueItemUpdate, QueueStats, QueueStatus};

pub type QueueSnapshot = Arc<Vec<QueueItem>>;

#[derive(Clone)]
pub struct QueueStore {
    state: Arc<watch::Sender<QueueSnapshot>>,
    tickets: Arc<AtomicU64>,
    events: Option<EventBus>,
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            state: Arc::new(state),
            tickets: Arc::new(AtomicU64::new(0)),
            events: None,
        }
    }

    /// Emit [`DownloadEvent::Queued`] for every accepted item.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.state.borrow().clone()
    }

    pub fn get(&self, id: &str) -> Option<QueueItem> {
        self.state.borrow().iter().find(|item| item.id == id).cloned()
    }

    /// Change notifications; the receiver starts at the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<QueueSnapshot> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats::from_items(self.state.borrow().iter())
    }

    /// Append items in order. Ids already in the table, repeated within the
    /// batch, or unusable as a directory name are dropped. Returns the ids
    /// that were accepted.
    ///
    /// A placement hint fills in the collection of items that carry none; with
    /// an explicit sort order the accepted items get consecutive positions.
    pub fn enqueue(&self, items: Vec<QueueItem>, placement: Option<PlacementHint>) -> Vec<String> {
        let mut accepted = Vec::new();

        self.state.send_if_modified(|current| {
            let mut seen: HashSet<String> = current.iter().map(|i| i.id.clone()).collect();
            let mut next = (**current).clone();

            for mut item in items {
                if let Err(e) = validate_item_id(&item.id) {
                    warn!(error = %e, "Enqueue rejected");
                    continue;
                }
                if !seen.insert(item.id.clone()) {
                    debug!(item_id = %item.id, "Duplicate enqueue ignored");
                    continue;
                }

                if let Some(hint) = &placement {
                    if item.target_collection_id.is_none() {
                        item.target_collection_id = Some(hint.collection_id.clone());
                        item.sort_order = hint.sort_order.map(|base| base + accepted.len() as i64);
                    }
                }

                item.ticket = self.tickets.fetch_add(1, Ordering::Relaxed) + 1;
                accepted.push(item.clone());
                next.push(item);
            }

            if accepted.is_empty() {
                return false;
            }
            *current = Arc::new(next);
            true
        });

        if let Some(events) = &self.events {
            for item in &accepted {
                let _ = events.emit(CoreEvent::Download(DownloadEvent::Queued {
                    item_id: item.id.clone(),
                    title: item.song.title.clone(),
                }));
            }
        }

        accepted.into_iter().map(|item| item.id).collect()
    }

    /// Apply a partial update. Returns false when the item is missing or the
    /// update changed nothing.
    pub fn mutate(&self, id: &str, update: QueueItemUpdate) -> bool {
        self.modify(id, |item| update.apply(item))
    }

    /// Apply `update` only while the item is in status `from`.
    pub fn transition(&self, id: &str, from: QueueStatus, update: QueueItemUpdate) -> bool {
        self.modify(id, |item| item.status == from && update.apply(item))
    }

    pub fn remove(&self, id: &str) -> bool {
        self.state.send_if_modified(|current| {
            if !current.iter().any(|item| item.id == id) {
                return false;
            }
            *current = Arc::new(current.iter().filter(|i| i.id != id).cloned().collect());
            true
        })
    }

    /// Drop every item in terminal `status`. Non-terminal statuses are
    /// ignored. Returns how many items were removed.
    pub fn clear_terminal(&self, status: QueueStatus) -> usize {
        if !status.is_terminal() {
            return 0;
        }

        let mut removed = 0;
        self.state.send_if_modified(|current| {
            let next: Vec<QueueItem> = current
                .iter()
                .filter(|item| item.status != status)
                .cloned()
                .collect();
            removed = current.len() - next.len();
            if removed == 0 {
                return false;
            }
            *current = Arc::new(next);
            true
        });
        removed
    }

    pub fn clear_completed(&self) -> usize {
        self.clear_terminal(QueueStatus::Completed)
    }

    /// `downloading -> paused`. Progress is kept.
    pub fn pause(&self, id: &str) -> bool {
        self.transition(
            id,
            QueueStatus::Downloading,
            QueueItemUpdate::default()
                .status(QueueStatus::Paused)
                .stage("Paused"),
        )
    }

    /// `paused -> pending`. Progress is kept.
    pub fn resume(&self, id: &str) -> bool {
        self.transition(
            id,
            QueueStatus::Paused,
            QueueItemUpdate::default()
                .status(QueueStatus::Pending)
                .stage("Resuming"),
        )
    }

    /// `failed -> pending`, progress back to 0 and error cleared.
    pub fn retry(&self, id: &str) -> bool {
        self.modify(id, |item| {
            if item.status != QueueStatus::Failed {
                return false;
            }
            item.status = QueueStatus::Pending;
            item.progress = 0.0;
            item.error = None;
            item.stage_label = "Queued".to_string();
            true
        })
    }

    fn modify(&self, id: &str, f: impl FnOnce(&mut QueueItem) -> bool) -> bool {
        self.state.send_if_modified(|current| {
            let Some(index) = current.iter().position(|item| item.id == id) else {
                return false;
            };

            let mut item = current[index].clone();
            if !f(&mut item) {
                return false;
            }

            let mut next = (**current).clone();
            next[index] = item;
            *current = Arc::new(next);
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::SongSnapshot;

    fn item(id: &str) -> QueueItem {
        QueueItem::new(id, SongSnapshot::new(format!("Song {}", id), "Artist"))
    }

    fn set_status(store: &QueueStore, id: &str, status: QueueStatus) {
        assert!(store.mutate(id, QueueItemUpdate::default().status(status)));
    }

    #[test]
    fn test_duplicate_enqueue_is_noop() {
        let store = QueueStore::new();
        assert_eq!(store.enqueue(vec![item("a"), item("b")], None), vec!["a", "b"]);

        let mut rx = store.subscribe();
        rx.borrow_and_update();

        assert!(store.enqueue(vec![item("a"), item("b")], None).is_empty());
        assert_eq!(store.snapshot().len(), 2);
        assert!(!rx.has_changed().unwrap());

        assert_eq!(store.enqueue(vec![item("c"), item("c")], None), vec!["c"]);
        assert_eq!(store.snapshot().len(), 3);
    }

    #[test]
    fn test_reenqueue_gets_a_new_ticket() {
        let store = QueueStore::new();
        store.enqueue(vec![item("a")], None);
        let first = store.get("a").unwrap().ticket;
        assert!(first > 0);

        store.remove("a");
        store.enqueue(vec![item("a")], None);
        assert!(store.get("a").unwrap().ticket > first);
    }

    #[test]
    fn test_enqueue_rejects_ids_that_are_not_directory_names() {
        let store = QueueStore::new();
        let accepted = store.enqueue(
            vec![item(""), item(".."), item("a/b"), item("ok")],
            None,
        );

        assert_eq!(accepted, vec!["ok"]);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_enqueue_applies_placement_hint() {
        let store = QueueStore::new();
        let own = item("own").placed_in("elsewhere", Some(1));
        store.enqueue(
            vec![item("a"), own, item("b")],
            Some(PlacementHint::at("mix", 10)),
        );

        let a = store.get("a").unwrap();
        let b = store.get("b").unwrap();
        assert_eq!(a.target_collection_id.as_deref(), Some("mix"));
        assert_eq!(a.sort_order, Some(10));
        assert_eq!(b.sort_order, Some(12));
        assert_eq!(
            store.get("own").unwrap().target_collection_id.as_deref(),
            Some("elsewhere")
        );
    }

    #[test]
    fn test_mutation_replaces_snapshot() {
        let store = QueueStore::new();
        store.enqueue(vec![item("a")], None);
        let before = store.snapshot();

        store.mutate("a", QueueItemUpdate::default().progress(0.4));

        assert_eq!(before[0].progress, 0.0);
        assert_eq!(store.snapshot()[0].progress, 0.4);
        assert!(!store.mutate("missing", QueueItemUpdate::default().progress(0.4)));
    }

    #[test]
    fn test_pause_resume_cycle() {
        let store = QueueStore::new();
        store.enqueue(vec![item("a")], None);

        // Only a downloading item can pause
        assert!(!store.pause("a"));

        set_status(&store, "a", QueueStatus::Downloading);
        store.mutate("a", QueueItemUpdate::default().progress(0.4));
        assert!(store.pause("a"));
        assert_eq!(store.get("a").unwrap().status, QueueStatus::Paused);

        assert!(store.resume("a"));
        let a = store.get("a").unwrap();
        assert_eq!(a.status, QueueStatus::Pending);
        assert_eq!(a.progress, 0.4);
        assert!(!store.resume("a"));
    }

    #[test]
    fn test_retry_resets_progress() {
        let store = QueueStore::new();
        store.enqueue(vec![item("a")], None);
        store.mutate(
            "a",
            QueueItemUpdate::default()
                .status(QueueStatus::Failed)
                .progress(0.7)
                .error("network down"),
        );

        assert!(store.retry("a"));
        let a = store.get("a").unwrap();
        assert_eq!(a.status, QueueStatus::Pending);
        assert_eq!(a.progress, 0.0);
        assert!(a.error.is_none());
        assert!(!store.retry("a"));
    }

    #[test]
    fn test_clear_terminal_only_removes_requested_status() {
        let store = QueueStore::new();
        store.enqueue(vec![item("a"), item("b"), item("c")], None);
        set_status(&store, "a", QueueStatus::Completed);
        set_status(&store, "b", QueueStatus::Failed);

        assert_eq!(store.clear_terminal(QueueStatus::Pending), 0);
        assert_eq!(store.clear_completed(), 1);
        let ids: Vec<_> = store.snapshot().iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(store.stats().failed, 1);
    }

    #[test]
    fn test_remove() {
        let store = QueueStore::new();
        store.enqueue(vec![item("a"), item("b")], None);
        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.get("a").is_none());
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_emits_queued_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let store = QueueStore::new().with_events(bus);

        store.enqueue(vec![item("a"), item("a")], None);

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            CoreEvent::Download(DownloadEvent::Queued {
                item_id: "a".to_string(),
                title: "Song a".to_string(),
            })
        );
        assert!(rx.try_recv().is_err());
    }
}
