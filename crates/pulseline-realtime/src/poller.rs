//! Change-detection poller
//!
//! Fallback for collections without push support: fetch the collection on a
//! fixed interval, diff it against the previous snapshot by entity id and
//! status, and synthesize stream events for whatever changed. Synthesized
//! events go through the same dispatcher as pushed frames, so downstream
//! handlers never know which transport produced them.
//!
//! The first poll after `start()` only establishes the baseline - without
//! that, every entity created before polling began would be misreported as
//! new. The snapshot is replaced after the diff and before delivery, so a
//! failing handler can never make drift compound across cycles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tracing::{debug, trace};

use pulseline_core::event::StreamEvent;
use pulseline_core::snapshot::{EntityProjection, EntityRecord};
use pulseline_core::traits::SnapshotSource;
use pulseline_core::Result;

use crate::dispatcher::EventDispatcher;

/// Maps a newly-appeared entity to a synthesized event
pub type CreatedMapper = dyn Fn(&EntityRecord) -> Option<StreamEvent> + Send + Sync;

/// Maps a status change to a synthesized event; receives the prior status
pub type ChangedMapper = dyn Fn(&EntityRecord, Option<&str>) -> Option<StreamEvent> + Send + Sync;

/// Polling configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Interval between snapshot fetches
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

impl PollerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the poll interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

struct PollerCore {
    name: String,
    source: Arc<dyn SnapshotSource>,
    dispatcher: Arc<EventDispatcher>,
    on_created: Option<Arc<CreatedMapper>>,
    on_changed: Option<Arc<ChangedMapper>>,
    snapshot: RwLock<Option<HashMap<i64, EntityProjection>>>,
}

impl PollerCore {
    async fn poll_once(&self) -> Result<()> {
        // A fetch failure leaves the previous snapshot untouched; diffing
        // against a half-fetched snapshot would synthesize false creations
        // after recovery.
        let records = self.source.fetch().await?;

        let current: HashMap<i64, EntityProjection> =
            records.iter().map(|r| (r.id, r.projection())).collect();

        let mut events = Vec::new();
        {
            let mut snapshot = self.snapshot.write().await;
            match snapshot.as_ref() {
                None => {
                    trace!(
                        collection = %self.name,
                        entities = records.len(),
                        "established baseline snapshot"
                    );
                }
                Some(previous) => {
                    for record in &records {
                        match previous.get(&record.id) {
                            None => {
                                if let Some(mapper) = self.on_created.as_deref() {
                                    events.extend(mapper(record));
                                }
                            }
                            Some(prior) if prior.status != record.status => {
                                if let Some(mapper) = self.on_changed.as_deref() {
                                    events.extend(mapper(record, prior.status.as_deref()));
                                }
                            }
                            Some(_) => {}
                        }
                    }
                }
            }
            // Replaced unconditionally once the diff is computed, before any
            // delivery, so a failing callback cannot re-report next cycle.
            *snapshot = Some(current);
        }

        for event in events {
            self.dispatcher.dispatch_event(event).await;
        }
        Ok(())
    }
}

/// Periodically diffs one polled collection into synthesized stream events
pub struct ChangePoller {
    core: Arc<PollerCore>,
    config: PollerConfig,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

impl ChangePoller {
    /// Create a poller for one watched collection
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn SnapshotSource>,
        dispatcher: Arc<EventDispatcher>,
        config: PollerConfig,
    ) -> Self {
        Self {
            core: Arc::new(PollerCore {
                name: name.into(),
                source,
                dispatcher,
                on_created: None,
                on_changed: None,
                snapshot: RwLock::new(None),
            }),
            config,
            shutdown: Mutex::new(None),
        }
    }

    /// Synthesize an event for each newly-appeared entity
    pub fn on_created(
        mut self,
        mapper: impl Fn(&EntityRecord) -> Option<StreamEvent> + Send + Sync + 'static,
    ) -> Self {
        if let Some(core) = Arc::get_mut(&mut self.core) {
            core.on_created = Some(Arc::new(mapper));
        }
        self
    }

    /// Synthesize an event for each entity whose status changed
    pub fn on_changed(
        mut self,
        mapper: impl Fn(&EntityRecord, Option<&str>) -> Option<StreamEvent> + Send + Sync + 'static,
    ) -> Self {
        if let Some(core) = Arc::get_mut(&mut self.core) {
            core.on_changed = Some(Arc::new(mapper));
        }
        self
    }

    /// Run one poll cycle immediately (exposed for deterministic tests)
    pub async fn poll_once(&self) -> Result<()> {
        self.core.poll_once().await
    }

    /// Spawn the interval loop; a no-op while already running
    pub fn start(&self) {
        let mut guard = self.shutdown.lock().expect("shutdown lock");
        if guard.is_some() {
            return;
        }
        let (tx, mut rx) = watch::channel(false);
        *guard = Some(tx);

        let core = Arc::clone(&self.core);
        let interval = self.config.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = core.poll_once().await {
                            debug!(collection = %core.name, error = %err, "snapshot poll failed");
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            debug!(collection = %core.name, "poller stopped");
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Stop the interval loop and discard the snapshot
    ///
    /// A later `start()` begins from a fresh, empty baseline.
    pub async fn stop(&self) {
        if let Some(tx) = self.shutdown.lock().expect("shutdown lock").take() {
            let _ = tx.send(true);
        }
        *self.core.snapshot.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulseline_core::event::{kinds, BookingPayload, LessonStatusPayload};
    use pulseline_core::memory::{CollectingHandler, ScriptedSnapshotSource};

    fn booking_poller(
        source: Arc<ScriptedSnapshotSource>,
        dispatcher: Arc<EventDispatcher>,
    ) -> ChangePoller {
        ChangePoller::new("bookings", source, dispatcher, PollerConfig::default())
            .on_created(|record| {
                Some(StreamEvent::BookingCreated(BookingPayload {
                    booking_id: record.id,
                    lesson_id: None,
                    student_name: None,
                }))
            })
            .on_changed(|record, _prior| {
                Some(StreamEvent::LessonStatusChanged(LessonStatusPayload {
                    lesson_id: record.id,
                    status: record.status.clone().unwrap_or_default(),
                    title: None,
                }))
            })
    }

    async fn collecting_dispatcher() -> (Arc<EventDispatcher>, Arc<CollectingHandler>) {
        let dispatcher = Arc::new(EventDispatcher::new());
        let handler = Arc::new(CollectingHandler::new());
        dispatcher.on(kinds::BOOKING_CREATED, handler.clone()).await;
        dispatcher
            .on(kinds::LESSON_STATUS_CHANGED, handler.clone())
            .await;
        (dispatcher, handler)
    }

    #[tokio::test]
    async fn test_first_cycle_only_establishes_baseline() {
        let source = Arc::new(ScriptedSnapshotSource::new());
        source.push_batch(vec![
            EntityRecord::new(1, Some("open")),
            EntityRecord::new(2, Some("open")),
        ]);
        let (dispatcher, handler) = collecting_dispatcher().await;
        let poller = booking_poller(source, dispatcher);

        poller.poll_once().await.unwrap();
        assert!(handler.is_empty().await);
    }

    #[tokio::test]
    async fn test_second_cycle_reports_new_entities() {
        let source = Arc::new(ScriptedSnapshotSource::new());
        source.push_batch(vec![
            EntityRecord::new(1, Some("open")),
            EntityRecord::new(2, Some("open")),
        ]);
        source.push_batch(vec![
            EntityRecord::new(1, Some("open")),
            EntityRecord::new(2, Some("open")),
            EntityRecord::new(3, Some("open")),
        ]);
        let (dispatcher, handler) = collecting_dispatcher().await;
        let poller = booking_poller(source, dispatcher);

        poller.poll_once().await.unwrap();
        poller.poll_once().await.unwrap();

        let events = handler.events().await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::BookingCreated(p) => assert_eq!(p.booking_id, 3),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_changes_are_reported_once() {
        let source = Arc::new(ScriptedSnapshotSource::new());
        source.push_batch(vec![EntityRecord::new(1, Some("requested"))]);
        source.push_batch(vec![EntityRecord::new(1, Some("confirmed"))]);
        source.push_batch(vec![EntityRecord::new(1, Some("confirmed"))]);
        let (dispatcher, handler) = collecting_dispatcher().await;
        let poller = booking_poller(source, dispatcher);

        poller.poll_once().await.unwrap();
        poller.poll_once().await.unwrap();
        poller.poll_once().await.unwrap();

        let events = handler.events().await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::LessonStatusChanged(p) => {
                assert_eq!(p.lesson_id, 1);
                assert_eq!(p.status, "confirmed");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_error_keeps_previous_baseline() {
        let source = Arc::new(ScriptedSnapshotSource::new());
        source.push_batch(vec![EntityRecord::new(1, Some("open"))]);
        source.push_error("gateway timeout");
        source.push_batch(vec![
            EntityRecord::new(1, Some("open")),
            EntityRecord::new(2, Some("open")),
        ]);
        let (dispatcher, handler) = collecting_dispatcher().await;
        let poller = booking_poller(source, dispatcher);

        poller.poll_once().await.unwrap();
        assert!(poller.poll_once().await.is_err());
        poller.poll_once().await.unwrap();

        // The failed cycle did not disturb the baseline: only entity 2 is new.
        let events = handler.events().await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::BookingCreated(p) => assert_eq!(p.booking_id, 2),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_discards_the_baseline() {
        let source = Arc::new(ScriptedSnapshotSource::new());
        source.push_batch(vec![EntityRecord::new(1, Some("open"))]);
        source.push_batch(vec![EntityRecord::new(1, Some("open"))]);
        let (dispatcher, handler) = collecting_dispatcher().await;
        let poller = booking_poller(source, dispatcher);

        poller.poll_once().await.unwrap();
        poller.stop().await;

        // After stop() the next cycle re-baselines instead of diffing.
        poller.poll_once().await.unwrap();
        assert!(handler.is_empty().await);
    }

    #[tokio::test]
    async fn test_interval_loop_runs_and_stops() {
        let source = Arc::new(ScriptedSnapshotSource::new());
        source.push_batch(vec![EntityRecord::new(1, Some("open"))]);
        let (dispatcher, _handler) = collecting_dispatcher().await;
        let poller = ChangePoller::new(
            "bookings",
            source.clone(),
            dispatcher,
            PollerConfig::new().with_interval(Duration::from_millis(10)),
        );

        poller.start();
        // Starting twice is a no-op rather than a second loop.
        poller.start();

        tokio::time::sleep(Duration::from_millis(60)).await;
        poller.stop().await;

        // Let any tick already racing the shutdown drain before sampling.
        tokio::time::sleep(Duration::from_millis(25)).await;
        let fetched = source.fetch_count();
        assert!(fetched >= 2, "expected repeated fetches, got {fetched}");

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(source.fetch_count(), fetched, "poller kept running after stop");
    }
}
