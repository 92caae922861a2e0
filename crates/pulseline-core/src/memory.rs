// In-memory implementations for examples and testing
//
// These implementations keep all data in memory, making them perfect for:
// - Unit tests of the state machines and dedup logic
// - Integration tests that script connection lifecycles
// - Standalone examples that don't need a backend

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::connection::StreamRole;
use crate::error::{RealtimeError, Result};
use crate::event::{StreamEvent, StreamFrame};
use crate::notification::RemoteNotification;
use crate::snapshot::EntityRecord;
use crate::traits::{
    EventHandler, FrameStream, KeyValueStore, NotificationApi, SnapshotSource, StreamTransport,
};

// ============================================================================
// InMemoryKeyValueStore - persisted state without a filesystem
// ============================================================================

/// In-memory key-value store
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl InMemoryKeyValueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (storage-failure tests)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when no keys are stored
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RealtimeError::storage("simulated write failure"));
        }
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// ============================================================================
// MockNotificationApi - scripted REST surface
// ============================================================================

/// Mock notification API with a seedable unread set
///
/// Records mark-read calls so tests can assert on the best-effort server
/// traffic without a real backend.
#[derive(Debug, Default)]
pub struct MockNotificationApi {
    unread: RwLock<Vec<RemoteNotification>>,
    marked: RwLock<Vec<i64>>,
    mark_all_calls: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_marks: AtomicBool,
}

impl MockNotificationApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the unread set returned by `fetch_unread`
    pub async fn seed_unread(&self, notifications: Vec<RemoteNotification>) {
        *self.unread.write().await = notifications;
    }

    /// Make `fetch_unread` fail
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make mark-read calls fail
    pub fn set_fail_marks(&self, fail: bool) {
        self.fail_marks.store(fail, Ordering::SeqCst);
    }

    /// Ids passed to `mark_read` so far
    pub async fn marked(&self) -> Vec<i64> {
        self.marked.read().await.clone()
    }

    /// Number of `mark_all_read` calls so far
    pub fn mark_all_calls(&self) -> usize {
        self.mark_all_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationApi for MockNotificationApi {
    async fn fetch_unread(&self) -> Result<Vec<RemoteNotification>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RealtimeError::api("simulated fetch failure"));
        }
        Ok(self.unread.read().await.clone())
    }

    async fn mark_read(&self, id: i64) -> Result<()> {
        if self.fail_marks.load(Ordering::SeqCst) {
            return Err(RealtimeError::api("simulated mark failure"));
        }
        self.marked.write().await.push(id);
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<()> {
        if self.fail_marks.load(Ordering::SeqCst) {
            return Err(RealtimeError::api("simulated mark failure"));
        }
        self.mark_all_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// ScriptedSnapshotSource - polled collection with scripted cycles
// ============================================================================

enum ScriptedFetch {
    Batch(Vec<EntityRecord>),
    Error(String),
}

/// Snapshot source that returns pre-scripted batches in order
///
/// Once the script runs out, the last successful batch keeps repeating so an
/// interval-driven poller can idle without erroring.
#[derive(Default)]
pub struct ScriptedSnapshotSource {
    script: Mutex<VecDeque<ScriptedFetch>>,
    last_batch: Mutex<Option<Vec<EntityRecord>>>,
    fetches: AtomicUsize,
}

impl ScriptedSnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful fetch result
    pub fn push_batch(&self, records: Vec<EntityRecord>) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(ScriptedFetch::Batch(records));
    }

    /// Queue a failed fetch
    pub fn push_error(&self, message: impl Into<String>) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(ScriptedFetch::Error(message.into()));
    }

    /// Number of fetches performed so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSnapshotSource {
    async fn fetch(&self) -> Result<Vec<EntityRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().expect("script lock").pop_front();
        match next {
            Some(ScriptedFetch::Batch(records)) => {
                *self.last_batch.lock().expect("batch lock") = Some(records.clone());
                Ok(records)
            }
            Some(ScriptedFetch::Error(message)) => Err(RealtimeError::api(message)),
            None => self
                .last_batch
                .lock()
                .expect("batch lock")
                .clone()
                .ok_or_else(|| RealtimeError::api("no snapshot scripted")),
        }
    }
}

// ============================================================================
// ScriptedTransport - connection lifecycles without a network
// ============================================================================

enum OpenScript {
    Fail(String),
    Frames(mpsc::UnboundedReceiver<Result<StreamFrame>>),
}

/// Feeds frames into one scripted connection
///
/// Dropping the feeder closes the stream, which the connection manager
/// observes as a transport-level close.
pub struct FrameFeeder {
    tx: mpsc::UnboundedSender<Result<StreamFrame>>,
}

impl FrameFeeder {
    /// Push one frame to the connected client
    pub fn frame(&self, kind: &str, data: &str) {
        let _ = self.tx.send(Ok(StreamFrame::new(kind, data)));
    }

    /// Push a transport error, which also ends the stream
    pub fn error(&self, message: impl Into<String>) {
        let _ = self.tx.send(Err(RealtimeError::transport(message)));
    }
}

/// Transport whose connections are scripted ahead of time
///
/// Each `open` consumes the next script entry; an exhausted script fails the
/// attempt. Tests assert on `open_count` to pin down exactly how many
/// connection attempts were made.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<OpenScript>>,
    opens: AtomicUsize,
    roles: Mutex<Vec<StreamRole>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failed connection attempt
    pub fn push_failure(&self, message: impl Into<String>) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(OpenScript::Fail(message.into()));
    }

    /// Queue a successful connection; the returned feeder drives its frames
    pub fn push_connection(&self) -> FrameFeeder {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script
            .lock()
            .expect("script lock")
            .push_back(OpenScript::Frames(rx));
        FrameFeeder { tx }
    }

    /// Number of `open` calls so far
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Roles passed to `open` so far
    pub fn roles(&self) -> Vec<StreamRole> {
        self.roles.lock().expect("roles lock").clone()
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn open(&self, role: StreamRole) -> Result<FrameStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.roles.lock().expect("roles lock").push(role);
        let next = self.script.lock().expect("script lock").pop_front();
        match next {
            Some(OpenScript::Frames(rx)) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            Some(OpenScript::Fail(message)) => Err(RealtimeError::transport(message)),
            None => Err(RealtimeError::transport("no scripted connection")),
        }
    }
}

// ============================================================================
// CollectingHandler - records dispatched events
// ============================================================================

/// Event handler that collects everything it receives
#[derive(Debug, Default)]
pub struct CollectingHandler {
    events: RwLock<Vec<StreamEvent>>,
    fail: AtomicBool,
}

impl CollectingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `handle` return an error (absorption tests)
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Everything handled so far, in arrival order
    pub async fn events(&self) -> Vec<StreamEvent> {
        self.events.read().await.clone()
    }

    /// Number of handled events
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// True when nothing has been handled yet
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl EventHandler for CollectingHandler {
    async fn handle(&self, event: StreamEvent) -> Result<()> {
        self.events.write().await.push(event);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RealtimeError::api("simulated handler failure"));
        }
        Ok(())
    }
}
