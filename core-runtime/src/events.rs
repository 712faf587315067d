//! Push notifications from the download core.
//!
//! The queue store snapshot is authoritative; the bus carries a log of what
//! happened to each item so observers do not have to diff snapshots. Emitting
//! with nobody subscribed returns `SendError`, which producers ignore.
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(32);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Download(DownloadEvent::Started {
//!     item_id: "song-1".to_string(),
//! }))
//! .ok();
//!
//! assert_eq!(rx.recv().await.unwrap().item_id(), Some("song-1"));
//! # }
//! ```

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Channel capacity used by the service. Progress is chatty; a subscriber
/// more than this many events behind gets `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Download(DownloadEvent),
    Lyrics(LyricsEvent),
}

impl CoreEvent {
    pub fn item_id(&self) -> Option<&str> {
        match self {
            Self::Download(event) => Some(event.item_id()),
            Self::Lyrics(LyricsEvent::RaceFinished { item_id, .. }) => item_id.as_deref(),
        }
    }

    /// `Completed`, `Failed` or `Removed`: nothing further follows for the
    /// item until it is re-queued or retried.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Download(
                DownloadEvent::Completed { .. }
                    | DownloadEvent::Failed { .. }
                    | DownloadEvent::Removed { .. }
            )
        )
    }
}

/// Queue item lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    Queued { item_id: String, title: String },
    /// Dispatched to a pipeline.
    Started { item_id: String },
    /// Composite progress in `[0, 1]` with the current stage label.
    Progress {
        item_id: String,
        progress: f64,
        stage: String,
    },
    Paused { item_id: String },
    Resumed { item_id: String },
    /// Song committed to the catalog.
    Completed { item_id: String },
    /// Run failed; staged files were rolled back.
    Failed { item_id: String, message: String },
    /// Removed while a run held it; the run was aborted.
    Removed { item_id: String },
}

impl DownloadEvent {
    pub fn item_id(&self) -> &str {
        match self {
            Self::Queued { item_id, .. }
            | Self::Started { item_id }
            | Self::Progress { item_id, .. }
            | Self::Paused { item_id }
            | Self::Resumed { item_id }
            | Self::Completed { item_id }
            | Self::Failed { item_id, .. }
            | Self::Removed { item_id } => item_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum LyricsEvent {
    /// A race settled, by deadline or because every provider answered.
    RaceFinished {
        item_id: Option<String>,
        candidates: usize,
        best_source: Option<String>,
        elapsed_ms: u64,
    },
}

/// Broadcast handle; clones share one channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscribers got the event.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to one item's events only.
    pub fn watch_item(&self, item_id: impl Into<String>) -> EventStream {
        EventStream::new(self.subscribe()).for_item(item_id)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

/// Receiver that skips events failing its predicates.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    item_id: Option<String>,
    terminal_only: bool,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            item_id: None,
            terminal_only: false,
        }
    }

    pub fn for_item(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn terminal_only(mut self) -> Self {
        self.terminal_only = true;
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        if self.terminal_only && !event.is_terminal() {
            return false;
        }
        match &self.item_id {
            Some(wanted) => event.item_id() == Some(wanted.as_str()),
            None => true,
        }
    }

    /// Next matching event. Lag and closure are reported as-is.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Next matching event already buffered, or `None` when there is none.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        use broadcast::error::TryRecvError;

        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn download(event: DownloadEvent) -> CoreEvent {
        CoreEvent::Download(event)
    }

    fn started(id: &str) -> CoreEvent {
        download(DownloadEvent::Started {
            item_id: id.to_string(),
        })
    }

    #[test]
    fn test_emit_without_subscribers_is_err() {
        assert!(EventBus::new(4).emit(started("a")).is_err());
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_event() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.clone().subscribe();

        assert_eq!(bus.emit(started("a")).unwrap(), 2);
        assert_eq!(first.recv().await.unwrap(), started("a"));
        assert_eq!(second.recv().await.unwrap(), started("a"));
    }

    #[tokio::test]
    async fn test_watch_item_skips_other_items() {
        let bus = EventBus::new(8);
        let mut stream = bus.watch_item("b");

        bus.emit(started("a")).ok();
        bus.emit(started("b")).ok();

        assert_eq!(stream.recv().await.unwrap(), started("b"));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_terminal_only_stream() {
        let bus = EventBus::new(8);
        let mut stream = EventStream::new(bus.subscribe()).terminal_only();

        bus.emit(started("a")).ok();
        bus.emit(download(DownloadEvent::Progress {
            item_id: "a".to_string(),
            progress: 0.5,
            stage: "Downloading audio".to_string(),
        }))
        .ok();
        let failed = download(DownloadEvent::Failed {
            item_id: "a".to_string(),
            message: "HTTP 404".to_string(),
        });
        bus.emit(failed.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), failed);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for n in 0..5 {
            bus.emit(started(&n.to_string())).ok();
        }
        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
    }

    #[test]
    fn test_race_event_without_item() {
        let event = CoreEvent::Lyrics(LyricsEvent::RaceFinished {
            item_id: None,
            candidates: 0,
            best_source: None,
            elapsed_ms: 5_000,
        });
        assert_eq!(event.item_id(), None);
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_wire_shape() {
        let event = download(DownloadEvent::Completed {
            item_id: "song-123".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "Download");
        assert_eq!(json["payload"]["event"], "Completed");
        assert_eq!(json["payload"]["item_id"], "song-123");
        assert_eq!(serde_json::from_value::<CoreEvent>(json).unwrap(), event);
    }
}
