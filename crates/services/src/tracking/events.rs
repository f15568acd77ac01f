use chrono::{DateTime, Utc};
use lms_core::model::{CourseCompletion, SessionId, VideoId, WatchStatus, WriteRejection};

use super::sampler::SampleRejection;

/// What caused a flush of the pending sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushTrigger {
    Debounce,
    SafetyNet,
    PageHidden,
    BeforeUnload,
    Teardown,
    PlayerCompleted,
}

impl FlushTrigger {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debounce => "debounce",
            Self::SafetyNet => "safety_net",
            Self::PageHidden => "page_hidden",
            Self::BeforeUnload => "before_unload",
            Self::Teardown => "teardown",
            Self::PlayerCompleted => "player_completed",
        }
    }
}

/// Result of one flush attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlushOutcome {
    Persisted { percent: f64, status: WatchStatus },
    /// The store refused the conditional update.
    Rejected(WriteRejection),
    /// The pending sample no longer passes the sampler filter.
    Dropped(SampleRejection),
    NothingPending,
    /// Handed to the beacon; delivery is not observed.
    Beaconed,
    /// Store error after retries; logged and swallowed.
    Failed,
}

/// Notifications published by a tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    ProgressSaved {
        session_id: SessionId,
        percent: f64,
        trigger: FlushTrigger,
    },
    SessionCompleted {
        session_id: SessionId,
        video_id: VideoId,
        completed_at: DateTime<Utc>,
    },
    /// Every required video of the course is complete. The only event meant for the learner.
    CourseCompleted(CourseCompletion),
    /// Another page load took over the session; this tracker stops writing.
    Superseded { session_id: SessionId },
}
