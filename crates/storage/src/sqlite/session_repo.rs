use chrono::{DateTime, Utc};
use lms_core::model::{
    CourseId, NewViewingSession, ProgressWrite, SessionId, SessionToken, UserId, VideoId,
    ViewingSession, WriteRejection,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{SESSION_COLUMNS, conn, id_to_i64, map_session_row, ser};
use crate::repository::{StorageError, ViewingSessionRepository, WriteOutcome};

fn insert_error(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => conn(e),
    }
}

impl SqliteRepository {
    async fn fetch_session(&self, id: SessionId) -> Result<Option<ViewingSession>, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM viewing_sessions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_to_i64("id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.as_ref().map(map_session_row).transpose()
    }
}

#[async_trait::async_trait]
impl ViewingSessionRepository for SqliteRepository {
    async fn create_session(
        &self,
        new: NewViewingSession,
        now: DateTime<Utc>,
    ) -> Result<ViewingSession, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO viewing_sessions (
                    session_token, user_id, video_id, course_id,
                    current_position_seconds, progress_percent, total_watched_seconds,
                    status, last_updated
                )
                VALUES (?1, ?2, ?3, ?4, 0, 0, 0, 'in_progress', ?5)
            ",
        )
        .bind(new.session_token.to_string())
        .bind(id_to_i64("user_id", new.user_id.value())?)
        .bind(id_to_i64("video_id", new.video_id.value())?)
        .bind(id_to_i64("course_id", new.course_id.value())?)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(insert_error)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("negative rowid".into()))?;
        Ok(ViewingSession::created(SessionId::new(id), new, now))
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<ViewingSession>, StorageError> {
        self.fetch_session(id).await
    }

    async fn find_latest_session(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<ViewingSession>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM viewing_sessions \
             WHERE user_id = ?1 AND video_id = ?2 \
             ORDER BY last_updated DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(id_to_i64("user_id", user_id.value())?)
            .bind(id_to_i64("video_id", video_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.as_ref().map(map_session_row).transpose()
    }

    async fn find_completed_session(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<ViewingSession>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM viewing_sessions \
             WHERE user_id = ?1 AND video_id = ?2 AND status = 'completed' \
             ORDER BY completed_at DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(id_to_i64("user_id", user_id.value())?)
            .bind(id_to_i64("video_id", video_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.as_ref().map(map_session_row).transpose()
    }

    async fn apply_progress(
        &self,
        id: SessionId,
        write: &ProgressWrite,
    ) -> Result<WriteOutcome, StorageError> {
        // The monotonicity guard lives in the WHERE clause so that a late,
        // reordered write can never lower what another write already stored.
        let sql = format!(
            r"
                UPDATE viewing_sessions SET
                    current_position_seconds = ?1,
                    progress_percent = ?2,
                    total_watched_seconds = ?3,
                    status = ?4,
                    completed_at = CASE WHEN ?4 = 'completed' THEN ?5 ELSE completed_at END,
                    start_time = COALESCE(start_time, ?5),
                    end_time = ?5,
                    last_updated = ?5
                WHERE id = ?6
                  AND session_token = ?7
                  AND status != 'completed'
                  AND progress_percent <= ?2
                  AND current_position_seconds <= ?1
                RETURNING {SESSION_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(i64::from(write.position_seconds))
            .bind(write.progress_percent)
            .bind(i64::from(write.total_watched_seconds))
            .bind(write.status.as_str())
            .bind(write.written_at)
            .bind(id_to_i64("id", id.value())?)
            .bind(write.session_token.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        if let Some(row) = row {
            return Ok(WriteOutcome::Applied(map_session_row(&row)?));
        }

        let current = self.fetch_session(id).await?.ok_or(StorageError::NotFound)?;
        let reason = current
            .check_write(write)
            .err()
            .unwrap_or(WriteRejection::Regressed);
        Ok(WriteOutcome::Rejected(reason))
    }

    async fn claim_session(
        &self,
        id: SessionId,
        token: SessionToken,
        now: DateTime<Utc>,
    ) -> Result<ViewingSession, StorageError> {
        let sql = format!(
            "UPDATE viewing_sessions SET session_token = ?1, last_updated = ?2 \
             WHERE id = ?3 AND status != 'completed' \
             RETURNING {SESSION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(token.to_string())
            .bind(now)
            .bind(id_to_i64("id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        match row {
            Some(row) => map_session_row(&row),
            None => match self.fetch_session(id).await? {
                Some(_) => Err(StorageError::Conflict),
                None => Err(StorageError::NotFound),
            },
        }
    }

    async fn mark_started(
        &self,
        id: SessionId,
        token: SessionToken,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
                UPDATE viewing_sessions SET start_time = ?1
                WHERE id = ?2 AND session_token = ?3
                  AND status != 'completed' AND start_time IS NULL
            ",
        )
        .bind(at)
        .bind(id_to_i64("id", id.value())?)
        .bind(token.to_string())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(res.rows_affected() > 0)
    }

    async fn mark_seen(
        &self,
        id: SessionId,
        token: SessionToken,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
                UPDATE viewing_sessions SET end_time = ?1
                WHERE id = ?2 AND session_token = ?3 AND status != 'completed'
            ",
        )
        .bind(at)
        .bind(id_to_i64("id", id.value())?)
        .bind(token.to_string())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(res.rows_affected() > 0)
    }

    async fn completed_video_ids(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<VideoId>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT DISTINCT video_id FROM viewing_sessions
                WHERE user_id = ?1 AND course_id = ?2 AND status = 'completed'
                ORDER BY video_id ASC
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| {
                let raw: i64 = row.try_get("video_id").map_err(ser)?;
                u64::try_from(raw)
                    .map(VideoId::new)
                    .map_err(|_| StorageError::Serialization(format!("invalid video_id: {raw}")))
            })
            .collect()
    }
}
