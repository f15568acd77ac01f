use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{CourseId, SessionId, SessionToken, UserId, VideoId};
use crate::model::progress::{CompletionThreshold, ProgressSample};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("progress percent out of range: {0}")]
    InvalidPercent(f64),

    #[error("completed session is missing completed_at")]
    MissingCompletedAt,

    #[error("completed_at is set on a session that is not completed")]
    UnexpectedCompletedAt,

    #[error("invalid watch status: {0}")]
    InvalidStatus(String),
}

/// Why a store refused a progress write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRejection {
    /// The session has been claimed by another page load.
    TokenMismatch,
    /// Completed sessions are read-only.
    AlreadyCompleted,
    /// The write would lower persisted progress.
    Regressed,
}

impl WriteRejection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TokenMismatch => "token_mismatch",
            Self::AlreadyCompleted => "already_completed",
            Self::Regressed => "regressed",
        }
    }
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Forward-only lifecycle of a viewing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl WatchStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// Status transitions only move forward; staying put is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: WatchStatus) -> bool {
        next >= self
    }

    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchStatus {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(SessionError::InvalidStatus(other.to_owned())),
        }
    }
}

//
// ─── WRITES ────────────────────────────────────────────────────────────────────
//

/// Insert shape for a new viewing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewViewingSession {
    pub user_id: UserId,
    pub video_id: VideoId,
    pub course_id: CourseId,
    pub session_token: SessionToken,
}

/// A fully derived progress update ready to be applied conditionally by a store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressWrite {
    pub session_token: SessionToken,
    pub position_seconds: u32,
    pub progress_percent: f64,
    pub total_watched_seconds: u32,
    pub status: WatchStatus,
    pub written_at: DateTime<Utc>,
}

impl ProgressWrite {
    /// Derive the persisted fields for a sample.
    #[must_use]
    pub fn from_sample(
        session_token: SessionToken,
        sample: &ProgressSample,
        threshold: CompletionThreshold,
        now: DateTime<Utc>,
    ) -> Self {
        let status = if threshold.is_reached(sample.percent()) {
            WatchStatus::Completed
        } else {
            WatchStatus::InProgress
        };
        Self {
            session_token,
            position_seconds: sample.whole_position_seconds(),
            progress_percent: sample.percent(),
            total_watched_seconds: sample.watched_seconds(),
            status,
            written_at: now,
        }
    }

    #[must_use]
    pub fn completes(&self) -> bool {
        self.status.is_completed()
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One persisted watch attempt of a user on a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewingSession {
    id: SessionId,
    session_token: SessionToken,
    user_id: UserId,
    video_id: VideoId,
    course_id: CourseId,
    current_position_seconds: u32,
    progress_percent: f64,
    total_watched_seconds: u32,
    status: WatchStatus,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    last_updated: DateTime<Utc>,
}

impl ViewingSession {
    /// A freshly inserted row: zeroed progress, `in_progress`.
    #[must_use]
    pub fn created(id: SessionId, new: NewViewingSession, now: DateTime<Utc>) -> Self {
        Self {
            id,
            session_token: new.session_token,
            user_id: new.user_id,
            video_id: new.video_id,
            course_id: new.course_id,
            current_position_seconds: 0,
            progress_percent: 0.0,
            total_watched_seconds: 0,
            status: WatchStatus::InProgress,
            start_time: None,
            end_time: None,
            completed_at: None,
            last_updated: now,
        }
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the percentage is out of range or `completed_at`
    /// disagrees with the status.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionId,
        session_token: SessionToken,
        user_id: UserId,
        video_id: VideoId,
        course_id: CourseId,
        current_position_seconds: u32,
        progress_percent: f64,
        total_watched_seconds: u32,
        status: WatchStatus,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
        last_updated: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if !(0.0..=100.0).contains(&progress_percent) {
            return Err(SessionError::InvalidPercent(progress_percent));
        }
        match (status.is_completed(), completed_at.is_some()) {
            (true, false) => return Err(SessionError::MissingCompletedAt),
            (false, true) => return Err(SessionError::UnexpectedCompletedAt),
            _ => {}
        }

        Ok(Self {
            id,
            session_token,
            user_id,
            video_id,
            course_id,
            current_position_seconds,
            progress_percent,
            total_watched_seconds,
            status,
            start_time,
            end_time,
            completed_at,
            last_updated,
        })
    }

    /// Check whether a store should accept `write`.
    ///
    /// # Errors
    ///
    /// Returns the `WriteRejection` reason when the write must affect zero rows.
    pub fn check_write(&self, write: &ProgressWrite) -> Result<(), WriteRejection> {
        if self.session_token != write.session_token {
            return Err(WriteRejection::TokenMismatch);
        }
        if self.status.is_completed() {
            return Err(WriteRejection::AlreadyCompleted);
        }
        if write.progress_percent < self.progress_percent
            || write.position_seconds < self.current_position_seconds
        {
            return Err(WriteRejection::Regressed);
        }
        Ok(())
    }

    /// Apply a progress write after the same checks a conditional update performs.
    ///
    /// # Errors
    ///
    /// Returns the `WriteRejection` reason and leaves the session untouched.
    pub fn apply_write(&mut self, write: &ProgressWrite) -> Result<(), WriteRejection> {
        self.check_write(write)?;

        self.current_position_seconds = write.position_seconds;
        self.progress_percent = write.progress_percent;
        self.total_watched_seconds = write.total_watched_seconds;
        if self.status.can_transition_to(write.status) {
            self.status = write.status;
        }
        if self.status.is_completed() && self.completed_at.is_none() {
            self.completed_at = Some(write.written_at);
        }
        self.start_time.get_or_insert(write.written_at);
        self.end_time = Some(write.written_at);
        self.last_updated = write.written_at;
        Ok(())
    }

    /// Hand the session over to a new page load.
    pub fn claim(&mut self, token: SessionToken, now: DateTime<Utc>) {
        self.session_token = token;
        self.last_updated = now;
    }

    /// Stamp `start_time` unless it is already set. Returns whether it changed.
    pub fn mark_started(&mut self, at: DateTime<Utc>) -> bool {
        if self.start_time.is_some() {
            return false;
        }
        self.start_time = Some(at);
        true
    }

    /// Stamp `end_time` as a last-seen marker.
    pub fn mark_seen(&mut self, at: DateTime<Utc>) {
        self.end_time = Some(at);
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn session_token(&self) -> SessionToken {
        self.session_token
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn video_id(&self) -> VideoId {
        self.video_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn current_position_seconds(&self) -> u32 {
        self.current_position_seconds
    }

    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        self.progress_percent
    }

    #[must_use]
    pub fn total_watched_seconds(&self) -> u32 {
        self.total_watched_seconds
    }

    #[must_use]
    pub fn status(&self) -> WatchStatus {
        self.status
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    #[must_use]
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
