// End-to-end wiring of the realtime feed
//
// Connects the SSE stream, the notification store, and a change-detection
// poller against a live backend. Run with:
//
//   PULSELINE_API_URL=http://localhost:8080 \
//   PULSELINE_USER_ID=1 \
//   cargo run --example feed

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pulseline_core::connection::StreamRole;
use pulseline_core::event::kinds;
use pulseline_realtime::{
    ChangePoller, ConnectionManager, EventDispatcher, ManagerConfig, ManagerEvent, PollerConfig,
    SseTransport,
};
use pulseline_store::{ApiConfig, FileKeyValueStore, HttpNotificationApi, NotificationStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulseline_realtime=debug,pulseline_store=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api_config = ApiConfig::from_env()?;
    let user_id: i64 = std::env::var("PULSELINE_USER_ID")
        .unwrap_or_else(|_| "1".into())
        .parse()?;

    // The auth signal lives outside this subsystem; the example assumes the
    // cookie session for `user_id` is already established.
    let kv = Arc::new(FileKeyValueStore::new(".pulseline"));
    let api = Arc::new(HttpNotificationApi::new(api_config.clone())?);
    let store = Arc::new(NotificationStore::new(kv, api));
    store.initialize_for_user(user_id).await;

    let dispatcher = Arc::new(EventDispatcher::new());
    dispatcher.on(kinds::NOTIFICATION, store.clone()).await;

    let transport = Arc::new(SseTransport::new(&api_config.base_url)?);
    let manager = ConnectionManager::new(transport, dispatcher.clone(), ManagerConfig::default());

    // Every restored connection closes the downtime gap with a reconcile.
    let mut events = manager.subscribe();
    let reconciler = store.clone();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if event == ManagerEvent::Restored {
                reconciler.reconcile().await;
            }
        }
    });

    // Open bookings have no push support; poll and diff them instead.
    let bookings = Arc::new(pulseline_store::HttpSnapshotSource::new(
        &api_config,
        "/api/bookings/open",
    )?);
    let poller = ChangePoller::new(
        "bookings",
        bookings,
        dispatcher.clone(),
        PollerConfig::default(),
    )
    .on_created(|record| {
        Some(pulseline_core::event::StreamEvent::BookingCreated(
            pulseline_core::event::BookingPayload {
                booking_id: record.id,
                lesson_id: None,
                student_name: None,
            },
        ))
    });
    poller.start();

    manager.connect(StreamRole::Tutor);

    let mut feed = store.subscribe();
    tokio::spawn(async move {
        while feed.changed().await.is_ok() {
            let log = feed.borrow().clone();
            tracing::info!(unread = log.len(), "notification feed changed");
        }
    });

    tracing::info!("feed running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    poller.stop().await;
    manager.disconnect();
    store.clear_on_logout().await;
    Ok(())
}
