use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lms_core::model::{
    Course, CourseCompletion, CourseId, NewViewingSession, ProgressWrite, SessionId, SessionToken,
    UserId, Video, VideoId, ViewingSession, WriteRejection,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result of a conditional progress update.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The row was updated; carries the row as persisted after the write.
    Applied(ViewingSession),
    /// Zero rows affected.
    Rejected(WriteRejection),
}

impl WriteOutcome {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Repository contract for viewing sessions.
///
/// Every mutating call carries the caller's `SessionToken`; rows claimed by a
/// different token are left untouched, as are completed rows.
#[async_trait]
pub trait ViewingSessionRepository: Send + Sync {
    /// Insert a zeroed `in_progress` session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn create_session(
        &self,
        new: NewViewingSession,
        now: DateTime<Utc>,
    ) -> Result<ViewingSession, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_session(&self, id: SessionId) -> Result<Option<ViewingSession>, StorageError>;

    /// Most recently updated session of any status for `(user, video)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_latest_session(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<ViewingSession>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_completed_session(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<ViewingSession>, StorageError>;

    /// Apply `write` only if the token matches, the row is not completed and
    /// neither progress nor position would decrease.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row no longer exists.
    async fn apply_progress(
        &self,
        id: SessionId,
        write: &ProgressWrite,
    ) -> Result<WriteOutcome, StorageError>;

    /// Hand an unfinished session to a new page load.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing and `StorageError::Conflict`
    /// if the session is already completed.
    async fn claim_session(
        &self,
        id: SessionId,
        token: SessionToken,
        now: DateTime<Utc>,
    ) -> Result<ViewingSession, StorageError>;

    /// Set `start_time` if it is still unset. Returns whether a row changed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn mark_started(
        &self,
        id: SessionId,
        token: SessionToken,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Stamp `end_time` as a last-seen marker. Returns whether a row changed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn mark_seen(
        &self,
        id: SessionId,
        token: SessionToken,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Videos of `course_id` that `user_id` has a completed session for.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn completed_video_ids(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<VideoId>, StorageError>;
}

/// Repository contract for the course catalog.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the video cannot be stored.
    async fn upsert_video(&self, video: &Video) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_video(&self, id: VideoId) -> Result<Option<Video>, StorageError>;

    /// Videos of a course ordered by position.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_videos(&self, course_id: CourseId) -> Result<Vec<Video>, StorageError>;
}

#[async_trait]
pub trait CourseCompletionRepository: Send + Sync {
    /// Insert unless a completion already exists. Returns whether it was inserted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the completion cannot be stored.
    async fn record_completion(&self, completion: &CourseCompletion) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_completion(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseCompletion>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct SessionTable {
    next_id: u64,
    rows: BTreeMap<SessionId, ViewingSession>,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Applies the same conditional-update rules as the `SQLite` adapter and, like its
/// partial unique index, allows one unfinished row per `(user, video)`.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<SessionTable>>,
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    videos: Arc<Mutex<HashMap<VideoId, Video>>>,
    completions: Arc<Mutex<HashMap<(UserId, CourseId), CourseCompletion>>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of session rows ever created for `(user, video)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn session_count(&self, user_id: UserId, video_id: VideoId) -> Result<usize, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        Ok(guard
            .rows
            .values()
            .filter(|s| s.user_id() == user_id && s.video_id() == video_id)
            .count())
    }
}

#[async_trait]
impl ViewingSessionRepository for InMemoryRepository {
    async fn create_session(
        &self,
        new: NewViewingSession,
        now: DateTime<Utc>,
    ) -> Result<ViewingSession, StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        let active_exists = guard.rows.values().any(|s| {
            s.user_id() == new.user_id && s.video_id() == new.video_id && !s.is_completed()
        });
        if active_exists {
            return Err(StorageError::Conflict);
        }
        guard.next_id += 1;
        let id = SessionId::new(guard.next_id);
        let session = ViewingSession::created(id, new, now);
        guard.rows.insert(id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<ViewingSession>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        Ok(guard.rows.get(&id).cloned())
    }

    async fn find_latest_session(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<ViewingSession>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        Ok(guard
            .rows
            .values()
            .filter(|s| s.user_id() == user_id && s.video_id() == video_id)
            .max_by_key(|s| (s.last_updated(), s.id()))
            .cloned())
    }

    async fn find_completed_session(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<ViewingSession>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        Ok(guard
            .rows
            .values()
            .filter(|s| s.user_id() == user_id && s.video_id() == video_id && s.is_completed())
            .max_by_key(|s| (s.completed_at(), s.id()))
            .cloned())
    }

    async fn apply_progress(
        &self,
        id: SessionId,
        write: &ProgressWrite,
    ) -> Result<WriteOutcome, StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        let session = guard.rows.get_mut(&id).ok_or(StorageError::NotFound)?;
        match session.apply_write(write) {
            Ok(()) => Ok(WriteOutcome::Applied(session.clone())),
            Err(reason) => Ok(WriteOutcome::Rejected(reason)),
        }
    }

    async fn claim_session(
        &self,
        id: SessionId,
        token: SessionToken,
        now: DateTime<Utc>,
    ) -> Result<ViewingSession, StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        let session = guard.rows.get_mut(&id).ok_or(StorageError::NotFound)?;
        if session.is_completed() {
            return Err(StorageError::Conflict);
        }
        session.claim(token, now);
        Ok(session.clone())
    }

    async fn mark_started(
        &self,
        id: SessionId,
        token: SessionToken,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        match guard.rows.get_mut(&id) {
            Some(s) if s.session_token() == token && !s.is_completed() => Ok(s.mark_started(at)),
            _ => Ok(false),
        }
    }

    async fn mark_seen(
        &self,
        id: SessionId,
        token: SessionToken,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        match guard.rows.get_mut(&id) {
            Some(s) if s.session_token() == token && !s.is_completed() => {
                s.mark_seen(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn completed_video_ids(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<VideoId>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        let mut ids: Vec<VideoId> = guard
            .rows
            .values()
            .filter(|s| s.user_id() == user_id && s.course_id() == course_id && s.is_completed())
            .map(ViewingSession::video_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self.courses.lock().map_err(poisoned)?;
        guard.insert(course.id(), course.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let guard = self.courses.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn upsert_video(&self, video: &Video) -> Result<(), StorageError> {
        let mut guard = self.videos.lock().map_err(poisoned)?;
        guard.insert(video.id(), video.clone());
        Ok(())
    }

    async fn get_video(&self, id: VideoId) -> Result<Option<Video>, StorageError> {
        let guard = self.videos.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_videos(&self, course_id: CourseId) -> Result<Vec<Video>, StorageError> {
        let guard = self.videos.lock().map_err(poisoned)?;
        let mut videos: Vec<Video> = guard
            .values()
            .filter(|v| v.course_id() == course_id)
            .cloned()
            .collect();
        videos.sort_by_key(|v| (v.position(), v.id()));
        Ok(videos)
    }
}

#[async_trait]
impl CourseCompletionRepository for InMemoryRepository {
    async fn record_completion(&self, completion: &CourseCompletion) -> Result<bool, StorageError> {
        let mut guard = self.completions.lock().map_err(poisoned)?;
        let key = (completion.user_id(), completion.course_id());
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, completion.clone());
        Ok(true)
    }

    async fn get_completion(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseCompletion>, StorageError> {
        let guard = self.completions.lock().map_err(poisoned)?;
        Ok(guard.get(&(user_id, course_id)).cloned())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn ViewingSessionRepository>,
    pub courses: Arc<dyn CourseRepository>,
    pub completions: Arc<dyn CourseCompletionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Share one repository value across all three contracts.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: ViewingSessionRepository + CourseRepository + CourseCompletionRepository + Clone + 'static,
    {
        let sessions: Arc<dyn ViewingSessionRepository> = Arc::new(repo.clone());
        let courses: Arc<dyn CourseRepository> = Arc::new(repo.clone());
        let completions: Arc<dyn CourseCompletionRepository> = Arc::new(repo);
        Self {
            sessions,
            courses,
            completions,
        }
    }
}
