use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Statements of schema version 1, applied in one transaction.
const V1_SCHEMA: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            completion_threshold REAL NOT NULL
                CHECK (completion_threshold >= 1 AND completion_threshold <= 100)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS videos (
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            duration_seconds REAL NOT NULL CHECK (duration_seconds > 0),
            required INTEGER NOT NULL DEFAULT 1,
            position INTEGER NOT NULL CHECK (position >= 0),
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    // Sessions reference catalog ids without foreign keys: the tracker may run
    // against videos that are served from elsewhere.
    r"
        CREATE TABLE IF NOT EXISTS viewing_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_token TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            video_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            current_position_seconds INTEGER NOT NULL DEFAULT 0
                CHECK (current_position_seconds >= 0),
            progress_percent REAL NOT NULL DEFAULT 0
                CHECK (progress_percent >= 0 AND progress_percent <= 100),
            total_watched_seconds INTEGER NOT NULL DEFAULT 0
                CHECK (total_watched_seconds >= 0),
            status TEXT NOT NULL
                CHECK (status IN ('not_started', 'in_progress', 'completed')),
            start_time TEXT,
            end_time TEXT,
            completed_at TEXT,
            last_updated TEXT NOT NULL
        );
    ",
    // One canonical unfinished session per (user, video).
    r"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_viewing_sessions_active
            ON viewing_sessions (user_id, video_id)
            WHERE status != 'completed';
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_viewing_sessions_user_video_updated
            ON viewing_sessions (user_id, video_id, last_updated);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_viewing_sessions_user_course_status
            ON viewing_sessions (user_id, course_id, status);
    ",
    r"
        CREATE TABLE IF NOT EXISTS course_completions (
            user_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            completed_at TEXT NOT NULL,
            certificate_code TEXT NOT NULL,
            PRIMARY KEY (user_id, course_id)
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_videos_course_position
            ON videos (course_id, position);
    ",
];

/// Runs pending schema migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in V1_SCHEMA {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
