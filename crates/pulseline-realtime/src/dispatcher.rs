//! Event dispatcher
//!
//! Parses raw stream frames into typed events and routes them to the
//! handlers registered for each kind. Dispatch is awaited inline by the
//! caller, so frames are handled strictly in arrival order - downstream
//! dedup depends on seeing a creation before any later update for the same
//! id.
//!
//! The change-detection poller feeds its synthesized events through
//! `dispatch_event`, so handlers never know which transport produced an
//! event.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{trace, warn};

use pulseline_core::event::{StreamEvent, StreamFrame};
use pulseline_core::traits::EventHandler;

/// Routes typed stream events to per-kind handlers
///
/// A malformed frame is logged and dropped - it must never tear down the
/// connection. Unknown kinds are ignored silently so server-added event
/// types do not break older clients. Handler errors are logged and absorbed.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind
    pub async fn on(&self, kind: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .await
            .entry(kind.into())
            .or_default()
            .push(handler);
    }

    /// Parse a raw frame and route the resulting event
    pub async fn dispatch(&self, frame: StreamFrame) {
        match StreamEvent::parse(&frame) {
            Ok(Some(event)) => self.dispatch_event(event).await,
            Ok(None) => {
                trace!(kind = %frame.kind, "ignoring unknown stream event kind");
            }
            Err(err) => {
                warn!(kind = %frame.kind, error = %err, "dropping malformed stream frame");
            }
        }
    }

    /// Route an already-typed event
    ///
    /// Used directly by the change-detection poller for synthesized events.
    pub async fn dispatch_event(&self, event: StreamEvent) {
        let handlers = {
            let registry = self.handlers.read().await;
            registry.get(event.kind()).cloned().unwrap_or_default()
        };

        if handlers.is_empty() {
            trace!(kind = %event.kind(), "no handler registered for event kind");
            return;
        }

        for handler in handlers {
            if let Err(err) = handler.handle(event.clone()).await {
                warn!(kind = %event.kind(), error = %err, "event handler failed");
            }
        }
    }
}
