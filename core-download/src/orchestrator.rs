//! # Queue Orchestrator
//!
//! Watches the [`QueueStore`] and keeps the set of running pipelines in line
//! with it.
//!
//! Every change to the table triggers one reconcile pass:
//!
//! 1. Runs whose item disappeared, was replaced by a re-enqueue of the same
//!    id, or left `pending`/`downloading`/`paused` are aborted and move to the
//!    draining set. Their pipeline rolls the item directory back.
//! 2. `paused` items with a run get their transfer paused; `pending` items
//!    that still hold a run are resumed and moved back to `downloading`.
//! 3. `pending` items without a run are dispatched in queue order while
//!    fewer than `max_concurrent` runs are active. An id still draining is
//!    held back until the aborted run has settled, so the old rollback can
//!    never land on the new run's directory.
//!
//! Each run carries a generation number. Progress reports and settlements
//! from a run whose generation is no longer registered for the item are
//! dropped, so a removed item never reappears or gets committed. A stale
//! run that had already finished gets its directory rolled back when its
//! settlement arrives.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use core_async::sync::{mpsc, CancellationToken};
use core_async::task::JoinHandle;
use core_library::{Catalog, SongEntity};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use tracing::{debug, error, info, warn};

use crate::error::{DownloadError, Result};
use crate::manager::DownloadManager;
use crate::queue::{QueueItem, QueueItemUpdate, QueueStatus};
use crate::store::{QueueSnapshot, QueueStore};
use crate::transfer::TransferControl;

pub const STAGE_STARTING: &str = "Starting";
pub const STAGE_RESUMED: &str = "Downloading";
pub const STAGE_COMPLETED: &str = "Completed";
pub const STAGE_FAILED: &str = "Failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Upper bound on concurrently running pipelines; at least 1
    pub max_concurrent: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_concurrent: 1 }
    }
}

impl OrchestratorConfig {
    pub fn from_core_config(config: &CoreConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent_downloads.max(1),
        }
    }
}

struct ActiveRun {
    generation: u64,
    ticket: u64,
    control: TransferControl,
    paused: bool,
}

struct Settlement {
    item_id: String,
    generation: u64,
    result: Result<SongEntity>,
}

/// Events gathered under the lock and emitted once it is released.
#[derive(Default)]
struct PassOutcome {
    removed: Vec<String>,
    paused: Vec<String>,
    resumed: Vec<String>,
    started: Vec<(QueueItem, u64, TransferControl)>,
}

struct Inner {
    store: QueueStore,
    manager: Arc<DownloadManager>,
    catalog: Arc<dyn Catalog>,
    events: EventBus,
    config: OrchestratorConfig,
    active: Mutex<HashMap<String, ActiveRun>>,
    /// Aborted runs whose settlement has not arrived yet, by item id
    draining: Mutex<HashMap<String, u64>>,
    generation: AtomicU64,
    completions: mpsc::UnboundedSender<Settlement>,
    shutdown: CancellationToken,
}

pub struct QueueOrchestrator {
    inner: Arc<Inner>,
    completions: mpsc::UnboundedReceiver<Settlement>,
}

impl QueueOrchestrator {
    pub fn new(
        store: QueueStore,
        manager: Arc<DownloadManager>,
        catalog: Arc<dyn Catalog>,
        events: EventBus,
        config: OrchestratorConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                store,
                manager,
                catalog,
                events,
                config: OrchestratorConfig {
                    max_concurrent: config.max_concurrent.max(1),
                },
                active: Mutex::new(HashMap::new()),
                draining: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                completions: tx,
                shutdown: CancellationToken::new(),
            }),
            completions: rx,
        }
    }

    /// Spawn the reconcile loop.
    pub fn start(self) -> OrchestratorHandle {
        let inner = Arc::clone(&self.inner);
        info!(
            max_concurrent = inner.config.max_concurrent,
            "Starting queue orchestrator"
        );
        let task = core_async::spawn(run_loop(Arc::clone(&inner), self.completions));
        OrchestratorHandle { inner, task }
    }
}

pub struct OrchestratorHandle {
    inner: Arc<Inner>,
    task: JoinHandle<()>,
}

impl OrchestratorHandle {
    pub fn store(&self) -> &QueueStore {
        &self.inner.store
    }

    /// Number of runs currently registered, paused ones included.
    pub fn active_count(&self) -> usize {
        self.inner.lock_active().len()
    }

    pub fn is_active(&self, item_id: &str) -> bool {
        self.inner.lock_active().contains_key(item_id)
    }

    /// Stop the loop and abort every active run.
    ///
    /// Aborted runs roll their directories back in the background; their
    /// items keep whatever status they had.
    pub async fn shutdown(self) {
        self.inner.shutdown.cancel();
        {
            let mut active = self.inner.lock_active();
            for (item_id, run) in active.drain() {
                debug!(item_id = %item_id, "Aborting run on shutdown");
                run.control.abort();
            }
        }
        if let Err(e) = self.task.await {
            warn!(error = %e, "Orchestrator loop ended abnormally");
        }
        info!("Queue orchestrator stopped");
    }
}

async fn run_loop(inner: Arc<Inner>, mut completions: mpsc::UnboundedReceiver<Settlement>) {
    let mut store_rx = inner.store.subscribe();

    loop {
        let snapshot = store_rx.borrow_and_update().clone();
        inner.reconcile(&snapshot);

        core_async::select! {
            _ = inner.shutdown.cancelled() => break,
            changed = store_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            Some(settlement) = completions.recv() => inner.settle(settlement).await,
        }
    }

    debug!("Orchestrator loop exited");
}

impl Inner {
    fn lock_active(&self) -> MutexGuard<'_, HashMap<String, ActiveRun>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock order: `active` before `draining`.
    fn lock_draining(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.draining.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: DownloadEvent) {
        let _ = self.events.emit(CoreEvent::Download(event));
    }

    fn reconcile(self: &Arc<Self>, snapshot: &QueueSnapshot) {
        let mut pass = PassOutcome::default();

        {
            let mut active = self.lock_active();
            let mut draining = self.lock_draining();

            active.retain(|item_id, run| {
                let keep = match snapshot.iter().find(|item| &item.id == item_id) {
                    Some(item) if item.ticket != run.ticket => {
                        pass.removed.push(item_id.clone());
                        false
                    }
                    Some(item) if item.status.holds_run() => true,
                    Some(item) => {
                        warn!(item_id = %item_id, status = %item.status, "Run no longer owned, aborting");
                        false
                    }
                    None => {
                        pass.removed.push(item_id.clone());
                        false
                    }
                };
                if !keep {
                    run.control.abort();
                    draining.insert(item_id.clone(), run.generation);
                }
                keep
            });

            for item in snapshot.iter() {
                let Some(run) = active.get_mut(&item.id) else {
                    continue;
                };
                match item.status {
                    QueueStatus::Paused if !run.paused => {
                        run.control.pause();
                        run.paused = true;
                        pass.paused.push(item.id.clone());
                    }
                    QueueStatus::Pending => {
                        run.control.resume();
                        run.paused = false;
                        self.store.transition(
                            &item.id,
                            QueueStatus::Pending,
                            QueueItemUpdate::default()
                                .status(QueueStatus::Downloading)
                                .stage(STAGE_RESUMED),
                        );
                        pass.resumed.push(item.id.clone());
                    }
                    _ => {}
                }
            }

            for item in snapshot.iter() {
                if active.len() >= self.config.max_concurrent {
                    break;
                }
                if item.status != QueueStatus::Pending || active.contains_key(&item.id) {
                    continue;
                }
                if draining.contains_key(&item.id) {
                    debug!(item_id = %item.id, "Previous run still draining");
                    continue;
                }

                let claimed = self.store.transition(
                    &item.id,
                    QueueStatus::Pending,
                    QueueItemUpdate::default()
                        .status(QueueStatus::Downloading)
                        .stage(STAGE_STARTING),
                );
                if !claimed {
                    continue;
                }

                let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                let control = TransferControl::new();
                active.insert(
                    item.id.clone(),
                    ActiveRun {
                        generation,
                        ticket: item.ticket,
                        control: control.clone(),
                        paused: false,
                    },
                );
                pass.started.push((item.clone(), generation, control));
            }
        }

        for item_id in pass.removed {
            info!(item_id = %item_id, "Item removed, run aborted");
            self.emit(DownloadEvent::Removed { item_id });
        }
        for item_id in pass.paused {
            info!(item_id = %item_id, "Run paused");
            self.emit(DownloadEvent::Paused { item_id });
        }
        for item_id in pass.resumed {
            info!(item_id = %item_id, "Run resumed");
            self.emit(DownloadEvent::Resumed { item_id });
        }
        for (item, generation, control) in pass.started {
            info!(item_id = %item.id, generation, "Dispatching download");
            self.emit(DownloadEvent::Started {
                item_id: item.id.clone(),
            });
            self.spawn_run(item, generation, control);
        }
    }

    fn spawn_run(self: &Arc<Self>, item: QueueItem, generation: u64, control: TransferControl) {
        let inner = Arc::clone(self);

        core_async::spawn(async move {
            let item_id = item.id.clone();

            // Inner task so a panicking pipeline still settles its slot
            let worker = {
                let inner = Arc::clone(&inner);
                core_async::spawn(async move {
                    let report = |progress: f64, stage: &str| {
                        inner.report_progress(&item.id, generation, progress, stage)
                    };
                    inner.manager.run(&item, &control, &report).await
                })
            };

            let result = match worker.await {
                Ok(result) => result,
                Err(e) => Err(DownloadError::Interrupted(e.to_string())),
            };

            let _ = inner.completions.send(Settlement {
                item_id,
                generation,
                result,
            });
        });
    }

    fn is_current(&self, item_id: &str, generation: u64) -> bool {
        self.lock_active()
            .get(item_id)
            .is_some_and(|run| run.generation == generation)
    }

    fn report_progress(&self, item_id: &str, generation: u64, progress: f64, stage: &str) {
        if !self.is_current(item_id, generation) {
            return;
        }
        let update = QueueItemUpdate::default().progress(progress).stage(stage);
        if self.store.mutate(item_id, update) {
            self.emit(DownloadEvent::Progress {
                item_id: item_id.to_string(),
                progress,
                stage: stage.to_string(),
            });
        }
    }

    /// Drop the run if `generation` is still the registered one.
    fn release(&self, item_id: &str, generation: u64) -> bool {
        let mut active = self.lock_active();
        let current = active
            .get(item_id)
            .is_some_and(|run| run.generation == generation);
        if current {
            active.remove(item_id);
        }
        current
    }

    async fn settle(&self, settlement: Settlement) {
        let Settlement {
            item_id,
            generation,
            result,
        } = settlement;

        if !self.release(&item_id, generation) {
            self.settle_stale(&item_id, generation, &result).await;
            return;
        }

        match result {
            Ok(entity) => {
                let Some(item) = self.store.get(&item_id) else {
                    info!(item_id = %item_id, "Item removed before commit");
                    self.manager.rollback(&item_id).await;
                    self.emit(DownloadEvent::Removed { item_id });
                    return;
                };

                match self.commit(&item, &entity).await {
                    Ok(()) => {
                        self.store.mutate(
                            &item_id,
                            QueueItemUpdate::default()
                                .status(QueueStatus::Completed)
                                .progress(1.0)
                                .stage(STAGE_COMPLETED),
                        );
                        info!(item_id = %item_id, title = %entity.title, "Download completed");
                        self.emit(DownloadEvent::Completed { item_id });
                    }
                    Err(e) => {
                        self.manager.rollback(&item_id).await;
                        self.fail(item_id, &e);
                    }
                }
            }
            Err(e) => {
                if matches!(e, DownloadError::Interrupted(_)) {
                    self.manager.rollback(&item_id).await;
                }
                self.fail(item_id, &e);
            }
        }
    }

    /// Finish an aborted run. Its pipeline already rolled back on abort; a
    /// run that completed or panicked first still owns its directory.
    async fn settle_stale(&self, item_id: &str, generation: u64, result: &Result<SongEntity>) {
        let draining = self.lock_draining().get(item_id) == Some(&generation);
        if !draining {
            debug!(item_id, generation, "Stale settlement dropped");
            return;
        }

        if matches!(result, Ok(_) | Err(DownloadError::Interrupted(_))) {
            info!(item_id, generation, "Rolling back run that finished after removal");
            self.manager.rollback(item_id).await;
        }

        let mut draining = self.lock_draining();
        if draining.get(item_id) == Some(&generation) {
            draining.remove(item_id);
        }
        debug!(item_id, generation, "Run drained");
    }

    async fn commit(&self, item: &QueueItem, entity: &SongEntity) -> Result<()> {
        self.catalog.add_entity(entity).await?;
        if let Some(collection_id) = &item.target_collection_id {
            self.catalog
                .place_in_collection(collection_id, &entity.id, item.sort_order)
                .await?;
        }
        Ok(())
    }

    fn fail(&self, item_id: String, e: &DownloadError) {
        let message = e.to_string();
        let marked = self.store.mutate(
            &item_id,
            QueueItemUpdate::default()
                .status(QueueStatus::Failed)
                .stage(STAGE_FAILED)
                .error(message.clone()),
        );
        if !marked {
            debug!(item_id = %item_id, error = %message, "Failure of an item no longer queued");
            return;
        }
        error!(item_id = %item_id, error = %message, "Download failed");
        self.emit(DownloadEvent::Failed { item_id, message });
    }
}
