//! Deduplicated, capped, persisted notification log
//!
//! Merges stream-pushed and REST-fetched notifications into one newest-first
//! log, scoped to exactly one authenticated user at a time. The same
//! server-side notification may arrive over both transports; the known-id
//! set guarantees at most one insertion no matter which got there first.
//!
//! The reconciliation fetch is assumed to return the full unread set; if the
//! backend ever truncates it, notifications created during a long suspension
//! and already pushed off the truncation horizon would not reach the log.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};
use tracing::{debug, trace, warn};

use pulseline_core::event::StreamEvent;
use pulseline_core::notification::{
    remote_log_id, Notification, NotificationCategory, NotificationOrigin, RemoteNotification,
};
use pulseline_core::signal::Signal;
use pulseline_core::traits::{EventHandler, KeyValueStore, NotificationApi};
use pulseline_core::Result;

/// Upper bound on the log length; the oldest entries are evicted past it
pub const MAX_NOTIFICATIONS: usize = 50;

const STORAGE_PREFIX: &str = "pulseline.notifications";

fn storage_key(user_id: i64) -> String {
    format!("{STORAGE_PREFIX}.{user_id}")
}

#[derive(Default)]
struct StoreState {
    user_id: Option<i64>,
    /// Newest first
    log: Vec<Notification>,
    /// Ids of every remote notification ever ingested for this user
    known_ids: HashSet<String>,
}

/// The per-user notification log
///
/// All mutation goes through an internal lock that is never held across an
/// await, so a subscriber callback can re-enter the store without deadlock
/// or torn iteration.
pub struct NotificationStore {
    state: RwLock<StoreState>,
    feed: Signal<Vec<Notification>>,
    kv: Arc<dyn KeyValueStore>,
    api: Arc<dyn NotificationApi>,
}

impl NotificationStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, api: Arc<dyn NotificationApi>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            feed: Signal::new(Vec::new()),
            kv,
            api,
        }
    }

    /// Switch the store to `user_id`
    ///
    /// Loads the persisted log for that user and triggers a reconciliation
    /// fetch. Calling it again for the already-active user is a no-op; a
    /// logout/login cycle for the same id counts as fresh because logout
    /// unsets the active user.
    pub async fn initialize_for_user(&self, user_id: i64) {
        {
            let state = self.state.read().await;
            if state.user_id == Some(user_id) {
                trace!(user_id, "store already initialized for user");
                return;
            }
        }

        let loaded = self.load_log(user_id).await;
        {
            let mut state = self.state.write().await;
            state.user_id = Some(user_id);
            state.known_ids = loaded
                .iter()
                .filter(|n| n.origin == NotificationOrigin::Remote)
                .map(|n| n.id.clone())
                .collect();
            state.log = loaded;
            self.feed.set(state.log.clone());
        }
        debug!(user_id, "notification store initialized");

        self.reconcile().await;
    }

    /// Wipe in-memory state and unset the active user
    ///
    /// Persisted logs are kept: other users sharing the device keep theirs,
    /// and the same user gets their log back on the next login.
    pub async fn clear_on_logout(&self) {
        let mut state = self.state.write().await;
        *state = StoreState::default();
        self.feed.set(Vec::new());
        debug!("notification store cleared on logout");
    }

    /// Ingest one backend notification
    ///
    /// Idempotent under at-least-once delivery: an id seen before (via
    /// either transport) is dropped. Entries already read on the server are
    /// registered for dedup but not inserted - the log holds only pending
    /// items.
    pub async fn add_from_remote(&self, remote: RemoteNotification) {
        let persist_as = {
            let mut state = self.state.write().await;
            let Some(user_id) = state.user_id else {
                trace!("ignoring notification without an active user");
                return;
            };
            let id = remote_log_id(remote.id);
            if !state.known_ids.insert(id) {
                trace!(source_id = remote.id, "dropping duplicate notification");
                return;
            }
            if remote.is_read {
                return;
            }
            state.log.insert(0, Notification::from_remote(&remote));
            state.log.truncate(MAX_NOTIFICATIONS);
            (user_id, state.log.clone())
        };

        self.feed.set(persist_as.1.clone());
        self.persist(persist_as.0, &persist_as.1).await;
    }

    /// Insert a locally-originated notification (e.g. from a snapshot diff)
    pub async fn add_local(
        &self,
        category: NotificationCategory,
        title: impl Into<String>,
        message: impl Into<String>,
        link: Option<String>,
    ) {
        let persist_as = {
            let mut state = self.state.write().await;
            let Some(user_id) = state.user_id else {
                trace!("ignoring local notification without an active user");
                return;
            };
            state
                .log
                .insert(0, Notification::local(category, title, message, link));
            state.log.truncate(MAX_NOTIFICATIONS);
            (user_id, state.log.clone())
        };

        self.feed.set(persist_as.1.clone());
        self.persist(persist_as.0, &persist_as.1).await;
    }

    /// Fetch the server's unread set and ingest anything not yet known
    ///
    /// This closes the gap left by connection downtime. Safe to call at any
    /// time: ingestion is idempotent and order-independent with respect to
    /// already-known ids. Fetch failures are absorbed.
    pub async fn reconcile(&self) {
        if self.state.read().await.user_id.is_none() {
            return;
        }
        match self.api.fetch_unread().await {
            Ok(unread) => {
                trace!(count = unread.len(), "reconciling unread notifications");
                for remote in unread {
                    self.add_from_remote(remote).await;
                }
            }
            Err(err) => debug!(error = %err, "reconciliation fetch failed"),
        }
    }

    /// Remove one notification from the log
    ///
    /// Remote-origin entries also get a best-effort mark-as-read call; its
    /// failure is logged and never blocks the local removal. Read entries
    /// are deleted rather than flagged - the log holds only pending items.
    pub async fn mark_read(&self, id: &str) {
        let removed = {
            let mut state = self.state.write().await;
            let Some(user_id) = state.user_id else {
                return;
            };
            let Some(position) = state.log.iter().position(|n| n.id == id) else {
                trace!(id, "mark_read for unknown notification");
                return;
            };
            let entry = state.log.remove(position);
            (user_id, entry, state.log.clone())
        };
        let (user_id, entry, log) = removed;

        if entry.origin == NotificationOrigin::Remote {
            if let Some(source_id) = entry.source_id {
                let api = Arc::clone(&self.api);
                tokio::spawn(async move {
                    if let Err(err) = api.mark_read(source_id).await {
                        debug!(source_id, error = %err, "mark-read call failed");
                    }
                });
            }
        }

        self.feed.set(log.clone());
        self.persist(user_id, &log).await;
    }

    /// Clear the log, with a best-effort server-side mark-all call
    pub async fn mark_all_read(&self) {
        let cleared = {
            let mut state = self.state.write().await;
            let Some(user_id) = state.user_id else {
                return;
            };
            state.log.clear();
            user_id
        };

        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            if let Err(err) = api.mark_all_read().await {
                debug!(error = %err, "mark-all-read call failed");
            }
        });

        self.feed.set(Vec::new());
        self.persist(cleared, &[]).await;
    }

    /// Current log, newest first
    pub fn notifications(&self) -> Vec<Notification> {
        self.feed.get()
    }

    /// Number of pending notifications
    pub fn unread_count(&self) -> usize {
        self.feed.get().len()
    }

    /// Subscribe to log changes
    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.feed.subscribe()
    }

    /// The currently-active user, if any
    pub async fn active_user(&self) -> Option<i64> {
        self.state.read().await.user_id
    }

    async fn load_log(&self, user_id: i64) -> Vec<Notification> {
        match self.kv.get(&storage_key(user_id)).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Notification>>(&raw) {
                Ok(mut log) => {
                    log.truncate(MAX_NOTIFICATIONS);
                    log
                }
                Err(err) => {
                    warn!(user_id, error = %err, "persisted log is unreadable; starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(user_id, error = %err, "failed to load persisted log");
                Vec::new()
            }
        }
    }

    async fn persist(&self, user_id: i64, log: &[Notification]) {
        let raw = match serde_json::to_string(log) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(user_id, error = %err, "failed to serialize notification log");
                return;
            }
        };
        if let Err(err) = self.kv.set(&storage_key(user_id), &raw).await {
            // In-memory state stays authoritative for the session.
            warn!(user_id, error = %err, "failed to persist notification log");
        }
    }
}

#[async_trait]
impl EventHandler for NotificationStore {
    async fn handle(&self, event: StreamEvent) -> Result<()> {
        if let StreamEvent::Notification(remote) = event {
            self.add_from_remote(remote).await;
        }
        Ok(())
    }
}
