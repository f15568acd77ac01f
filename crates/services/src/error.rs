//! Shared error types for the services crate.

use thiserror::Error;

use lms_core::model::CourseError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while opening a watch session.
///
/// Everything after `open` is best-effort and never surfaces as an error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrackerError {
    #[error("tracker already opened a session")]
    AlreadyOpen,
    #[error("tracker has been torn down")]
    Disposed,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CourseCompletionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CourseCompletionError {
    #[error("course has no required videos")]
    NoRequiredVideos,
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Invalid configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid value for {key}: {raw}")]
    InvalidValue { key: &'static str, raw: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
