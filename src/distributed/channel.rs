//! Remote state channel
//!
//! A one-shot publish/observe mailbox for the before-suite record. The producer
//! publishes exactly once; followers observe as often as they like.
//!
//! Two implementations are provided:
//!
//! - [`HttpStateChannel`]: JSON over HTTP against the sync host
//! - [`MemoryStateChannel`]: in-process mailbox for tests and single-process fleets

use crate::distributed::protocol::{RemoteState, BEFORE_SUITE_STATE_PATH};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Per-request timeout for the HTTP client
///
/// Bounds a single GET/POST. The overall wait is bounded by the setup deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error observing the before-suite record
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Request failed or the sync host answered with a non-200 status
    #[error("failed to fetch state")]
    Fetch { reason: String },

    /// Response body could not be read
    #[error("failed to read state")]
    Read { reason: String },

    /// Response body was not a valid record
    #[error("failed to decode state")]
    Decode { reason: String },
}

impl TransportError {
    /// Underlying cause, for logs
    pub fn reason(&self) -> &str {
        match self {
            TransportError::Fetch { reason }
            | TransportError::Read { reason }
            | TransportError::Decode { reason } => reason,
        }
    }
}

/// Publish/observe channel for the before-suite record
#[async_trait]
pub trait StateChannel: Send + Sync {
    /// Publish the producer's record
    ///
    /// Fire-and-forget: failures are logged and otherwise ignored, since the
    /// producer already knows its own outcome.
    async fn publish(&self, state: &RemoteState);

    /// Fetch the current record
    async fn observe(&self) -> Result<RemoteState, TransportError>;
}

/// HTTP implementation talking to `<sync_host>/BeforeSuiteState`
#[derive(Debug, Clone)]
pub struct HttpStateChannel {
    client: Client,
    url: String,
}

impl HttpStateChannel {
    /// Create a channel for the given sync host base URL
    pub fn new(sync_host: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self::with_client(client, sync_host))
    }

    /// Create a channel reusing an existing client
    pub fn with_client(client: Client, sync_host: &str) -> Self {
        let url = format!("{}{}", sync_host.trim_end_matches('/'), BEFORE_SUITE_STATE_PATH);
        Self { client, url }
    }

    /// Full URL of the state endpoint
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StateChannel for HttpStateChannel {
    async fn publish(&self, state: &RemoteState) {
        let body = match state.to_json() {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to encode before-suite state");
                return;
            }
        };

        let result = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                debug!(url = %self.url, state = %state.state, "Published before-suite state");
            }
            Ok(resp) => {
                warn!(url = %self.url, status = %resp.status(), "Sync host rejected before-suite state");
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Failed to publish before-suite state");
            }
        }
    }

    async fn observe(&self) -> Result<RemoteState, TransportError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| TransportError::Fetch {
                reason: e.to_string(),
            })?;

        if resp.status() != StatusCode::OK {
            return Err(TransportError::Fetch {
                reason: format!("unexpected status {}", resp.status()),
            });
        }

        let body = resp.bytes().await.map_err(|e| TransportError::Read {
            reason: e.to_string(),
        })?;

        RemoteState::from_json(&body).map_err(|e| TransportError::Decode {
            reason: e.to_string(),
        })
    }
}

/// In-process state channel
///
/// Clones share the same mailbox, so one instance can be handed to every
/// simulated node of a fleet. Until the first publish, observers see
/// [`RemoteState::pending`], as they would from a fresh relay.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateChannel {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    state: Option<RemoteState>,
    publish_count: usize,
    observe_count: usize,
    observe_failure: Option<TransportError>,
}

impl MemoryStateChannel {
    /// Create an empty mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent observation fail with `error`
    pub fn fail_observations_with(&self, error: TransportError) {
        self.lock().observe_failure = Some(error);
    }

    /// Overwrite the stored record without counting it as a publish
    ///
    /// Stands in for an external writer such as a liveness monitor.
    pub fn set_state(&self, state: RemoteState) {
        self.lock().state = Some(state);
    }

    /// Last published record, if any
    pub fn published(&self) -> Option<RemoteState> {
        self.lock().state.clone()
    }

    /// Number of publish calls
    pub fn publish_count(&self) -> usize {
        self.lock().publish_count
    }

    /// Number of observe calls
    pub fn observe_count(&self) -> usize {
        self.lock().observe_count
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StateChannel for MemoryStateChannel {
    async fn publish(&self, state: &RemoteState) {
        let mut inner = self.lock();
        inner.state = Some(state.clone());
        inner.publish_count += 1;
    }

    async fn observe(&self) -> Result<RemoteState, TransportError> {
        let mut inner = self.lock();
        inner.observe_count += 1;

        if let Some(ref error) = inner.observe_failure {
            return Err(error.clone());
        }

        Ok(inner.state.clone().unwrap_or_default())
    }
}
