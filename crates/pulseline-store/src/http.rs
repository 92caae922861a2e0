//! HTTP backends for the core REST seams
//!
//! The reconciliation, mark-read, and snapshot endpoints all live under one
//! API base URL. Credentials ride the client's cookie jar; no auth headers
//! are attached here.

use async_trait::async_trait;
use reqwest::{Client, Response};

use pulseline_core::error::{RealtimeError, Result};
use pulseline_core::notification::RemoteNotification;
use pulseline_core::snapshot::EntityRecord;
use pulseline_core::traits::{NotificationApi, SnapshotSource};

/// API endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Read the base URL from the `PULSELINE_API_URL` environment variable
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("PULSELINE_API_URL")
            .map_err(|_| RealtimeError::config("PULSELINE_API_URL environment variable not set"))?;
        Ok(Self::new(base_url))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn cookie_client() -> Result<Client> {
    Client::builder()
        .cookie_store(true)
        .build()
        .map_err(|e| RealtimeError::config(format!("failed to build HTTP client: {e}")))
}

async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        return Err(RealtimeError::api(format!("{what} returned {status}")));
    }
    Ok(response)
}

/// REST client for the notification endpoints
pub struct HttpNotificationApi {
    client: Client,
    config: ApiConfig,
}

impl HttpNotificationApi {
    pub fn new(config: ApiConfig) -> Result<Self> {
        Ok(Self {
            client: cookie_client()?,
            config,
        })
    }

    /// Reuse an existing client (shared cookie jar with the stream transport)
    pub fn with_client(client: Client, config: ApiConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn fetch_unread(&self) -> Result<Vec<RemoteNotification>> {
        let response = self
            .client
            .get(self.config.endpoint("/api/notifications/unread"))
            .send()
            .await
            .map_err(|e| RealtimeError::api(format!("unread fetch failed: {e}")))?;
        check_status(response, "unread fetch")
            .await?
            .json()
            .await
            .map_err(|e| RealtimeError::api(format!("unread fetch returned bad JSON: {e}")))
    }

    async fn mark_read(&self, id: i64) -> Result<()> {
        let response = self
            .client
            .patch(self.config.endpoint(&format!("/api/notifications/{id}/read")))
            .send()
            .await
            .map_err(|e| RealtimeError::api(format!("mark-read failed: {e}")))?;
        check_status(response, "mark-read").await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<()> {
        let response = self
            .client
            .patch(self.config.endpoint("/api/notifications/read-all"))
            .send()
            .await
            .map_err(|e| RealtimeError::api(format!("mark-all-read failed: {e}")))?;
        check_status(response, "mark-all-read").await?;
        Ok(())
    }
}

/// Snapshot fetcher for one polled collection
pub struct HttpSnapshotSource {
    client: Client,
    url: String,
}

impl HttpSnapshotSource {
    /// Create a source for a collection endpoint, e.g. `/api/bookings/open`
    pub fn new(config: &ApiConfig, path: &str) -> Result<Self> {
        Ok(Self {
            client: cookie_client()?,
            url: config.endpoint(path),
        })
    }

    pub fn with_client(client: Client, config: &ApiConfig, path: &str) -> Self {
        Self {
            client,
            url: config.endpoint(path),
        }
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> Result<Vec<EntityRecord>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RealtimeError::api(format!("snapshot fetch failed: {e}")))?;
        check_status(response, "snapshot fetch")
            .await?
            .json()
            .await
            .map_err(|e| RealtimeError::api(format!("snapshot fetch returned bad JSON: {e}")))
    }
}
