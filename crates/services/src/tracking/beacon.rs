use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lms_core::model::{ProgressWrite, SessionId, SessionToken};
use reqwest::{Client, Url};
use serde::Serialize;
use storage::repository::{ViewingSessionRepository, WriteOutcome};
use tokio::runtime::Handle;
use tracing::{debug, warn};

const BEACON_TIMEOUT: Duration = Duration::from_secs(5);

/// Body of an unload-time delivery: the last pending progress, if any, plus
/// the moment the page was last seen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BeaconPayload {
    pub session_id: SessionId,
    pub session_token: SessionToken,
    pub progress: Option<ProgressWrite>,
    pub seen_at: DateTime<Utc>,
}

/// Fire-and-forget delivery that must not depend on the tracker staying alive.
///
/// Implementations return immediately; delivery runs detached and is never retried.
pub trait Beacon: Send + Sync {
    fn send(&self, payload: BeaconPayload);
}

/// Writes beacons straight to the session store on a detached task.
pub struct StoreBeacon {
    sessions: Arc<dyn ViewingSessionRepository>,
}

impl StoreBeacon {
    #[must_use]
    pub fn new(sessions: Arc<dyn ViewingSessionRepository>) -> Self {
        Self { sessions }
    }
}

impl Beacon for StoreBeacon {
    fn send(&self, payload: BeaconPayload) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(session_id = %payload.session_id, "no async runtime; beacon dropped");
            return;
        };
        let sessions = Arc::clone(&self.sessions);
        runtime.spawn(async move {
            deliver_to_store(sessions.as_ref(), payload).await;
        });
    }
}

async fn deliver_to_store(sessions: &dyn ViewingSessionRepository, payload: BeaconPayload) {
    let id = payload.session_id;
    if let Some(write) = payload.progress {
        match sessions.apply_progress(id, &write).await {
            Ok(WriteOutcome::Applied(session)) => {
                debug!(session_id = %id, percent = session.progress_percent(), "beacon progress stored");
            }
            Ok(WriteOutcome::Rejected(reason)) => {
                debug!(session_id = %id, reason = reason.as_str(), "beacon progress rejected");
            }
            Err(err) => warn!(session_id = %id, error = %err, "beacon progress write failed"),
        }
    }
    match sessions
        .mark_seen(id, payload.session_token, payload.seen_at)
        .await
    {
        Ok(stamped) => debug!(session_id = %id, stamped, "beacon end_time stamp"),
        Err(err) => warn!(session_id = %id, error = %err, "beacon end_time stamp failed"),
    }
}

/// POSTs beacons as JSON to a progress endpoint.
#[derive(Clone)]
pub struct HttpBeacon {
    client: Client,
    endpoint: Url,
}

impl HttpBeacon {
    /// Build a keep-alive client with a short request timeout.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be constructed.
    pub fn new(endpoint: Url) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(BEACON_TIMEOUT).build()?;
        Ok(Self { client, endpoint })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Beacon for HttpBeacon {
    fn send(&self, payload: BeaconPayload) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(session_id = %payload.session_id, "no async runtime; beacon dropped");
            return;
        };
        let request = self.client.post(self.endpoint.clone()).json(&payload);
        let id = payload.session_id;
        runtime.spawn(async move {
            match request.send().await {
                Ok(response) => {
                    debug!(session_id = %id, status = %response.status(), "beacon delivered");
                }
                Err(err) => debug!(session_id = %id, error = %err, "beacon delivery failed"),
            }
        });
    }
}
