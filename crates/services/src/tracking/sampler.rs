use lms_core::model::{CompletionThreshold, ProgressSample, SessionId, ViewingSession, WatchStatus};

/// Why a player sample was not queued for persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRejection {
    /// The session has not been opened yet; the sample is dropped, not queued.
    NoSession,
    /// The tracker was torn down.
    Disposed,
    /// Completed sessions ignore all further samples.
    Completed,
    /// Another page load claimed the session.
    Superseded,
    /// Non-finite position or unusable duration.
    InvalidSample,
    /// Under one second or under one percent.
    BelowFloor,
    /// Lower than the last persisted progress or position.
    Regressed,
}

impl SampleRejection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoSession => "no_session",
            Self::Disposed => "disposed",
            Self::Completed => "completed",
            Self::Superseded => "superseded",
            Self::InvalidSample => "invalid_sample",
            Self::BelowFloor => "below_floor",
            Self::Regressed => "regressed",
        }
    }
}

/// Result of handing a sample to the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleDecision {
    Accepted { percent: f64 },
    Rejected(SampleRejection),
}

impl SampleDecision {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// The tracker's view of the persisted row it writes to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SessionSnapshot {
    pub id: SessionId,
    pub status: WatchStatus,
    pub persisted_percent: f64,
    pub persisted_position: u32,
    pub threshold: CompletionThreshold,
    pub superseded: bool,
}

impl SessionSnapshot {
    pub fn from_session(session: &ViewingSession, threshold: CompletionThreshold) -> Self {
        Self {
            id: session.id(),
            status: session.status(),
            persisted_percent: session.progress_percent(),
            persisted_position: session.current_position_seconds(),
            threshold,
            superseded: false,
        }
    }

    /// Fold a row returned by the store into the snapshot without ever moving backwards.
    pub fn absorb(&mut self, session: &ViewingSession) {
        self.persisted_percent = self.persisted_percent.max(session.progress_percent());
        self.persisted_position = self
            .persisted_position
            .max(session.current_position_seconds());
        if self.status.can_transition_to(session.status()) {
            self.status = session.status();
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }
}

/// Filter applied to every sample, both when it arrives and again when it is flushed.
///
/// Order matters: a completed session rejects everything, then the zero floor,
/// then the monotonicity guard on both percent and whole-second position.
pub(crate) fn screen(
    snapshot: &SessionSnapshot,
    sample: &ProgressSample,
) -> Result<(), SampleRejection> {
    if snapshot.is_completed() {
        return Err(SampleRejection::Completed);
    }
    if snapshot.superseded {
        return Err(SampleRejection::Superseded);
    }
    if sample.is_below_floor() {
        return Err(SampleRejection::BelowFloor);
    }
    if sample.percent() < snapshot.persisted_percent
        || sample.whole_position_seconds() < snapshot.persisted_position
    {
        return Err(SampleRejection::Regressed);
    }
    Ok(())
}
