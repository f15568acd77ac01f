use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Samples below this playback offset are never persisted.
pub const MIN_TRACKED_POSITION_SECONDS: f64 = 1.0;

/// Samples below this percentage are never persisted.
pub const MIN_TRACKED_PERCENT: f64 = 1.0;

/// Percentage at which a session counts as completed when no course override exists.
pub const DEFAULT_COMPLETION_PERCENT: f64 = 98.0;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SampleError {
    #[error("video duration must be finite and > 0, got {0}")]
    InvalidDuration(f64),

    #[error("playback position must be finite, got {0}")]
    InvalidPosition(f64),
}

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ThresholdError {
    #[error("completion threshold must be in [1, 100], got {0}")]
    OutOfRange(f64),
}

//
// ─── PROGRESS SAMPLE ───────────────────────────────────────────────────────────
//

/// A normalized playback position report from the player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    position_seconds: f64,
    duration_seconds: f64,
    percent: f64,
}

impl ProgressSample {
    /// Normalize a raw `(position, duration)` pair.
    ///
    /// The percentage is computed as `position * 100 / duration` and clamped to `[0, 100]`.
    ///
    /// # Errors
    ///
    /// Returns `SampleError` if the duration is not a positive finite number or the
    /// position is not finite.
    pub fn new(position_seconds: f64, duration_seconds: f64) -> Result<Self, SampleError> {
        if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return Err(SampleError::InvalidDuration(duration_seconds));
        }
        if !position_seconds.is_finite() {
            return Err(SampleError::InvalidPosition(position_seconds));
        }

        let percent = (position_seconds * 100.0 / duration_seconds).clamp(0.0, 100.0);
        Ok(Self {
            position_seconds,
            duration_seconds,
            percent,
        })
    }

    #[must_use]
    pub fn position_seconds(&self) -> f64 {
        self.position_seconds
    }

    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    #[must_use]
    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Whole playback seconds, bounded by the video duration.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn whole_position_seconds(&self) -> u32 {
        self.position_seconds
            .min(self.duration_seconds)
            .max(0.0)
            .floor() as u32
    }

    /// True when the sample is too close to the start to be worth persisting.
    #[must_use]
    pub fn is_below_floor(&self) -> bool {
        self.position_seconds < MIN_TRACKED_POSITION_SECONDS || self.percent < MIN_TRACKED_PERCENT
    }

    #[must_use]
    pub fn watched_seconds(&self) -> u32 {
        watched_seconds(self.duration_seconds, self.percent)
    }
}

/// `min(floor(duration * percent / 100), floor(duration))`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn watched_seconds(duration_seconds: f64, percent: f64) -> u32 {
    let whole = duration_seconds.max(0.0).floor();
    let watched = (duration_seconds * percent / 100.0).floor();
    watched.min(whole).max(0.0) as u32
}

//
// ─── COMPLETION THRESHOLD ──────────────────────────────────────────────────────
//

/// Percentage at or above which a viewing session is complete.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct CompletionThreshold(f64);

impl CompletionThreshold {
    /// # Errors
    ///
    /// Returns `ThresholdError::OutOfRange` unless `1 <= percent <= 100`.
    pub fn new(percent: f64) -> Result<Self, ThresholdError> {
        if !(MIN_TRACKED_PERCENT..=100.0).contains(&percent) {
            return Err(ThresholdError::OutOfRange(percent));
        }
        Ok(Self(percent))
    }

    #[must_use]
    pub fn percent(&self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn is_reached(&self, percent: f64) -> bool {
        percent >= self.0
    }
}

impl Default for CompletionThreshold {
    fn default() -> Self {
        Self(DEFAULT_COMPLETION_PERCENT)
    }
}

impl TryFrom<f64> for CompletionThreshold {
    type Error = ThresholdError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CompletionThreshold> for f64 {
    fn from(value: CompletionThreshold) -> Self {
        value.0
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
