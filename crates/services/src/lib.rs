#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod course_completion;
pub mod error;
pub mod tracking;

pub use lms_core::Clock;

pub use app_services::AppServices;
pub use config::{RetryPolicy, TrackerConfig};
pub use course_completion::{CourseCompletionChecker, CourseCompletionService, CourseCompletionStatus};
pub use error::{AppServicesError, ConfigError, CourseCompletionError, TrackerError};
pub use tracking::{
    Beacon, BeaconPayload, FlushOutcome, FlushTrigger, HttpBeacon, OpenedSession, SampleDecision,
    SampleRejection, StoreBeacon, TrackerDeps, TrackerEvent, WatchContext, WatchTracker,
};
