use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, UserId, VideoId};
use crate::model::progress::CompletionThreshold;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("title cannot be empty")]
    EmptyTitle,

    #[error("video duration must be finite and > 0, got {0}")]
    InvalidDuration(f64),

    #[error("certificate code cannot be empty")]
    EmptyCertificateCode,
}

fn normalize_title(title: impl Into<String>) -> Result<String, CourseError> {
    let title = title.into().trim().to_owned();
    if title.is_empty() {
        return Err(CourseError::EmptyTitle);
    }
    Ok(title)
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    id: CourseId,
    title: String,
    completion_threshold: CompletionThreshold,
}

impl Course {
    /// # Errors
    ///
    /// Returns `CourseError::EmptyTitle` for a blank title.
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        completion_threshold: CompletionThreshold,
    ) -> Result<Self, CourseError> {
        Ok(Self {
            id,
            title: normalize_title(title)?,
            completion_threshold,
        })
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The single completion threshold used for every video of this course.
    #[must_use]
    pub fn completion_threshold(&self) -> CompletionThreshold {
        self.completion_threshold
    }
}

//
// ─── VIDEO ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    id: VideoId,
    course_id: CourseId,
    title: String,
    duration_seconds: f64,
    required: bool,
    position: u32,
}

impl Video {
    /// # Errors
    ///
    /// Returns `CourseError` for a blank title or a non-positive duration.
    pub fn new(
        id: VideoId,
        course_id: CourseId,
        title: impl Into<String>,
        duration_seconds: f64,
        position: u32,
    ) -> Result<Self, CourseError> {
        if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return Err(CourseError::InvalidDuration(duration_seconds));
        }
        Ok(Self {
            id,
            course_id,
            title: normalize_title(title)?,
            duration_seconds,
            required: true,
            position,
        })
    }

    /// Optional videos do not count towards course completion.
    #[must_use]
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn id(&self) -> VideoId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }
}

//
// ─── COMPLETION ────────────────────────────────────────────────────────────────
//

/// Record that a user finished every required video of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseCompletion {
    user_id: UserId,
    course_id: CourseId,
    completed_at: DateTime<Utc>,
    certificate_code: String,
}

impl CourseCompletion {
    /// # Errors
    ///
    /// Returns `CourseError::EmptyCertificateCode` for a blank code.
    pub fn new(
        user_id: UserId,
        course_id: CourseId,
        completed_at: DateTime<Utc>,
        certificate_code: impl Into<String>,
    ) -> Result<Self, CourseError> {
        let certificate_code = certificate_code.into();
        if certificate_code.trim().is_empty() {
            return Err(CourseError::EmptyCertificateCode);
        }
        Ok(Self {
            user_id,
            course_id,
            completed_at,
            certificate_code,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn certificate_code(&self) -> &str {
        &self.certificate_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn course_title_is_trimmed_and_required() {
        let course = Course::new(CourseId::new(1), "  Rust 101 ", CompletionThreshold::default())
            .unwrap();
        assert_eq!(course.title(), "Rust 101");
        assert_eq!(
            Course::new(CourseId::new(1), "   ", CompletionThreshold::default()).unwrap_err(),
            CourseError::EmptyTitle
        );
    }

    #[test]
    fn video_requires_positive_duration() {
        let err = Video::new(VideoId::new(1), CourseId::new(1), "Intro", 0.0, 0).unwrap_err();
        assert_eq!(err, CourseError::InvalidDuration(0.0));

        let video = Video::new(VideoId::new(1), CourseId::new(1), "Intro", 600.0, 0)
            .unwrap()
            .with_required(false);
        assert!(!video.is_required());
    }

    #[test]
    fn completion_needs_certificate_code() {
        assert!(CourseCompletion::new(UserId::new(1), CourseId::new(1), fixed_now(), " ").is_err());
    }
}
