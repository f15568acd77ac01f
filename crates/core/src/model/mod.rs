mod course;
mod ids;
mod progress;
mod viewing_session;

pub use ids::{CourseId, ParseIdError, SessionId, SessionToken, UserId, VideoId};

pub use course::{Course, CourseCompletion, CourseError, Video};
pub use progress::{
    CompletionThreshold, DEFAULT_COMPLETION_PERCENT, MIN_TRACKED_PERCENT,
    MIN_TRACKED_POSITION_SECONDS, ProgressSample, SampleError, ThresholdError, watched_seconds,
};
pub use viewing_session::{
    NewViewingSession, ProgressWrite, SessionError, ViewingSession, WatchStatus, WriteRejection,
};
