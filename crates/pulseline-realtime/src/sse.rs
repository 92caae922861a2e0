//! SSE stream transport
//!
//! Opens the backend's server-sent event endpoint and exposes it as a
//! stream of labeled frames. Credentials ride the client's cookie jar; this
//! subsystem never attaches auth headers itself.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;

use pulseline_core::connection::StreamRole;
use pulseline_core::error::{RealtimeError, Result};
use pulseline_core::event::StreamFrame;
use pulseline_core::traits::{FrameStream, StreamTransport};

const STREAM_PATH: &str = "/api/events/stream";

/// Server-sent events transport over HTTP
pub struct SseTransport {
    client: Client,
    stream_url: String,
}

impl SseTransport {
    /// Create a transport for the given API base URL
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| RealtimeError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a transport reusing an existing client (shared cookie jar)
    pub fn with_client(client: Client, base_url: impl AsRef<str>) -> Self {
        let stream_url = format!("{}{}", base_url.as_ref().trim_end_matches('/'), STREAM_PATH);
        Self { client, stream_url }
    }

    /// Create a transport from the `PULSELINE_API_URL` environment variable
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("PULSELINE_API_URL")
            .map_err(|_| RealtimeError::config("PULSELINE_API_URL environment variable not set"))?;
        Self::new(base_url)
    }

    /// The resolved stream endpoint
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }
}

#[async_trait]
impl StreamTransport for SseTransport {
    async fn open(&self, role: StreamRole) -> Result<FrameStream> {
        let response = self
            .client
            .get(&self.stream_url)
            .query(&[("role", role.as_str())])
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| RealtimeError::transport(format!("failed to open stream: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(RealtimeError::transport(format!(
                "stream endpoint returned {status}"
            )));
        }

        let frames = response
            .bytes_stream()
            .eventsource()
            .map(|result| match result {
                Ok(event) => Ok(StreamFrame::new(event.event, event.data)),
                Err(e) => Err(RealtimeError::transport(format!("stream error: {e}"))),
            });

        Ok(Box::pin(frames))
    }
}
