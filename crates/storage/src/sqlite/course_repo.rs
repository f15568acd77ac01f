use lms_core::model::{Course, CourseCompletion, CourseId, UserId, Video, VideoId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_completion_row, map_course_row, map_video_row};
use crate::repository::{CourseCompletionRepository, CourseRepository, StorageError};

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO courses (id, title, completion_threshold)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    completion_threshold = excluded.completion_threshold
            ",
        )
        .bind(id_to_i64("course_id", course.id().value())?)
        .bind(course.title())
        .bind(course.completion_threshold().percent())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query("SELECT id, title, completion_threshold FROM courses WHERE id = ?1")
            .bind(id_to_i64("course_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.as_ref().map(map_course_row).transpose()
    }

    async fn upsert_video(&self, video: &Video) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO videos (id, course_id, title, duration_seconds, required, position)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    course_id = excluded.course_id,
                    title = excluded.title,
                    duration_seconds = excluded.duration_seconds,
                    required = excluded.required,
                    position = excluded.position
            ",
        )
        .bind(id_to_i64("video_id", video.id().value())?)
        .bind(id_to_i64("course_id", video.course_id().value())?)
        .bind(video.title())
        .bind(video.duration_seconds())
        .bind(video.is_required())
        .bind(i64::from(video.position()))
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            _ => conn(e),
        })?;
        Ok(())
    }

    async fn get_video(&self, id: VideoId) -> Result<Option<Video>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, course_id, title, duration_seconds, required, position
                FROM videos WHERE id = ?1
            ",
        )
        .bind(id_to_i64("video_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        row.as_ref().map(map_video_row).transpose()
    }

    async fn list_videos(&self, course_id: CourseId) -> Result<Vec<Video>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, course_id, title, duration_seconds, required, position
                FROM videos
                WHERE course_id = ?1
                ORDER BY position ASC, id ASC
            ",
        )
        .bind(id_to_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        rows.iter().map(map_video_row).collect()
    }
}

#[async_trait::async_trait]
impl CourseCompletionRepository for SqliteRepository {
    async fn record_completion(&self, completion: &CourseCompletion) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO course_completions (user_id, course_id, completed_at, certificate_code)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(user_id, course_id) DO NOTHING
            ",
        )
        .bind(id_to_i64("user_id", completion.user_id().value())?)
        .bind(id_to_i64("course_id", completion.course_id().value())?)
        .bind(completion.completed_at())
        .bind(completion.certificate_code())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(res.rows_affected() > 0)
    }

    async fn get_completion(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseCompletion>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT user_id, course_id, completed_at, certificate_code
                FROM course_completions
                WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        row.as_ref().map(map_completion_row).transpose()
    }
}
