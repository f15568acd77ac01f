use std::sync::Arc;

use lms_core::model::{ProgressWrite, SessionId};
use storage::repository::{StorageError, ViewingSessionRepository, WriteOutcome};
use tracing::debug;

use super::events::FlushTrigger;
use crate::config::RetryPolicy;

/// Applies progress writes through the conditional store update, retrying
/// connection failures per `RetryPolicy`.
#[derive(Clone)]
pub(crate) struct Persister {
    sessions: Arc<dyn ViewingSessionRepository>,
    retry: RetryPolicy,
}

impl Persister {
    pub fn new(sessions: Arc<dyn ViewingSessionRepository>, retry: RetryPolicy) -> Self {
        Self { sessions, retry }
    }

    pub async fn write(
        &self,
        id: SessionId,
        write: &ProgressWrite,
        trigger: FlushTrigger,
    ) -> Result<WriteOutcome, StorageError> {
        let mut attempt = 0;
        loop {
            match self.sessions.apply_progress(id, write).await {
                Err(StorageError::Connection(reason)) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.backoff(attempt);
                    debug!(
                        session_id = %id,
                        trigger = trigger.as_str(),
                        attempt,
                        ?delay,
                        %reason,
                        "retrying progress write"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
