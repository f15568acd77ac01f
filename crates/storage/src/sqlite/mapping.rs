use lms_core::model::{
    CompletionThreshold, Course, CourseCompletion, CourseId, SessionId, SessionToken, UserId,
    Video, VideoId, ViewingSession, WatchStatus,
};
use sqlx::Row;

use crate::repository::StorageError;

/// Column list shared by every query that maps into `ViewingSession`.
pub(crate) const SESSION_COLUMNS: &str = "id, session_token, user_id, video_id, course_id, \
     current_position_seconds, progress_percent, total_watched_seconds, status, \
     start_time, end_time, completed_at, last_updated";

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<ViewingSession, StorageError> {
    let token: String = row.try_get("session_token").map_err(ser)?;
    let session_token: SessionToken = token.parse().map_err(ser)?;
    let status: String = row.try_get("status").map_err(ser)?;
    let status: WatchStatus = status.parse().map_err(ser)?;

    ViewingSession::from_persisted(
        SessionId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        session_token,
        UserId::new(i64_to_u64("user_id", row.try_get("user_id").map_err(ser)?)?),
        VideoId::new(i64_to_u64("video_id", row.try_get("video_id").map_err(ser)?)?),
        CourseId::new(i64_to_u64("course_id", row.try_get("course_id").map_err(ser)?)?),
        u32_from_i64(
            "current_position_seconds",
            row.try_get("current_position_seconds").map_err(ser)?,
        )?,
        row.try_get("progress_percent").map_err(ser)?,
        u32_from_i64(
            "total_watched_seconds",
            row.try_get("total_watched_seconds").map_err(ser)?,
        )?,
        status,
        row.try_get("start_time").map_err(ser)?,
        row.try_get("end_time").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
        row.try_get("last_updated").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_course_row(row: &sqlx::sqlite::SqliteRow) -> Result<Course, StorageError> {
    let threshold =
        CompletionThreshold::new(row.try_get("completion_threshold").map_err(ser)?).map_err(ser)?;
    Course::new(
        CourseId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        row.try_get::<String, _>("title").map_err(ser)?,
        threshold,
    )
    .map_err(ser)
}

pub(crate) fn map_video_row(row: &sqlx::sqlite::SqliteRow) -> Result<Video, StorageError> {
    let required: bool = row.try_get("required").map_err(ser)?;
    let video = Video::new(
        VideoId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        CourseId::new(i64_to_u64("course_id", row.try_get("course_id").map_err(ser)?)?),
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get("duration_seconds").map_err(ser)?,
        u32_from_i64("position", row.try_get("position").map_err(ser)?)?,
    )
    .map_err(ser)?;
    Ok(video.with_required(required))
}

pub(crate) fn map_completion_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<CourseCompletion, StorageError> {
    CourseCompletion::new(
        UserId::new(i64_to_u64("user_id", row.try_get("user_id").map_err(ser)?)?),
        CourseId::new(i64_to_u64("course_id", row.try_get("course_id").map_err(ser)?)?),
        row.try_get("completed_at").map_err(ser)?,
        row.try_get::<String, _>("certificate_code").map_err(ser)?,
    )
    .map_err(ser)
}
