use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use lms_core::model::{CourseCompletion, CourseId, UserId, VideoId};
use lms_core::time::Clock;
use rand::Rng;
use rand::distr::Alphanumeric;
use storage::repository::{CourseCompletionRepository, CourseRepository, ViewingSessionRepository};
use tracing::info;

use crate::error::CourseCompletionError;

const CERTIFICATE_CODE_LEN: usize = 12;

/// Answer of a course completion check.
#[derive(Debug, Clone, PartialEq)]
pub enum CourseCompletionStatus {
    Completed {
        completion: CourseCompletion,
        /// `false` when the completion was already on record.
        newly_recorded: bool,
    },
    Incomplete {
        remaining: Vec<VideoId>,
    },
}

impl CourseCompletionStatus {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Decides whether every required video of a course has been completed.
#[async_trait]
pub trait CourseCompletionChecker: Send + Sync {
    /// # Errors
    ///
    /// Returns `CourseCompletionError` if the catalog or session store cannot be read.
    async fn check(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CourseCompletionStatus, CourseCompletionError>;
}

/// Repository-backed completion check that records a `CourseCompletion` once.
pub struct CourseCompletionService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    sessions: Arc<dyn ViewingSessionRepository>,
    completions: Arc<dyn CourseCompletionRepository>,
}

impl CourseCompletionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        sessions: Arc<dyn ViewingSessionRepository>,
        completions: Arc<dyn CourseCompletionRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            sessions,
            completions,
        }
    }
}

#[async_trait]
impl CourseCompletionChecker for CourseCompletionService {
    async fn check(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CourseCompletionStatus, CourseCompletionError> {
        if let Some(existing) = self.completions.get_completion(user_id, course_id).await? {
            return Ok(CourseCompletionStatus::Completed {
                completion: existing,
                newly_recorded: false,
            });
        }

        let required: Vec<VideoId> = self
            .courses
            .list_videos(course_id)
            .await?
            .iter()
            .filter(|video| video.is_required())
            .map(|video| video.id())
            .collect();
        if required.is_empty() {
            return Err(CourseCompletionError::NoRequiredVideos);
        }

        let done: HashSet<VideoId> = self
            .sessions
            .completed_video_ids(user_id, course_id)
            .await?
            .into_iter()
            .collect();
        let remaining: Vec<VideoId> = required
            .into_iter()
            .filter(|id| !done.contains(id))
            .collect();
        if !remaining.is_empty() {
            return Ok(CourseCompletionStatus::Incomplete { remaining });
        }

        let completion =
            CourseCompletion::new(user_id, course_id, self.clock.now(), certificate_code())?;
        if self.completions.record_completion(&completion).await? {
            info!(
                user_id = %user_id,
                course_id = %course_id,
                certificate = completion.certificate_code(),
                "course completed"
            );
            return Ok(CourseCompletionStatus::Completed {
                completion,
                newly_recorded: true,
            });
        }

        // Lost a race with a concurrent check; report the stored record.
        let stored = self
            .completions
            .get_completion(user_id, course_id)
            .await?
            .unwrap_or(completion);
        Ok(CourseCompletionStatus::Completed {
            completion: stored,
            newly_recorded: false,
        })
    }
}

fn certificate_code() -> String {
    let code: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CERTIFICATE_CODE_LEN)
        .map(char::from)
        .collect();
    format!("CERT-{}", code.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_core::model::{
        CompletionThreshold, Course, NewViewingSession, ProgressSample, ProgressWrite,
        SessionToken, Video,
    };
    use lms_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    async fn seed(repo: &InMemoryRepository) {
        let course = Course::new(CourseId::new(1), "Rust", CompletionThreshold::default()).unwrap();
        repo.upsert_course(&course).await.unwrap();
        for (id, required) in [(1, true), (2, true), (3, false)] {
            let video = Video::new(VideoId::new(id), course.id(), format!("v{id}"), 100.0, 0)
                .unwrap()
                .with_required(required);
            repo.upsert_video(&video).await.unwrap();
        }
    }

    async fn complete_video(repo: &InMemoryRepository, video: u64) {
        let token = SessionToken::generate();
        let session = repo
            .create_session(
                NewViewingSession {
                    user_id: UserId::new(9),
                    video_id: VideoId::new(video),
                    course_id: CourseId::new(1),
                    session_token: token,
                },
                fixed_now(),
            )
            .await
            .unwrap();
        let sample = ProgressSample::new(100.0, 100.0).unwrap();
        let write =
            ProgressWrite::from_sample(token, &sample, CompletionThreshold::default(), fixed_now());
        assert!(repo.apply_progress(session.id(), &write).await.unwrap().is_applied());
    }

    fn service(repo: &InMemoryRepository) -> CourseCompletionService {
        CourseCompletionService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    #[tokio::test]
    async fn reports_remaining_required_videos() {
        let repo = InMemoryRepository::new();
        seed(&repo).await;
        complete_video(&repo, 1).await;

        let status = service(&repo)
            .check(UserId::new(9), CourseId::new(1))
            .await
            .unwrap();
        assert_eq!(
            status,
            CourseCompletionStatus::Incomplete {
                remaining: vec![VideoId::new(2)]
            }
        );
    }

    #[tokio::test]
    async fn optional_videos_are_not_required_and_completion_is_recorded_once() {
        let repo = InMemoryRepository::new();
        seed(&repo).await;
        complete_video(&repo, 1).await;
        complete_video(&repo, 2).await;
        let service = service(&repo);

        let first = service.check(UserId::new(9), CourseId::new(1)).await.unwrap();
        let CourseCompletionStatus::Completed {
            completion,
            newly_recorded,
        } = first
        else {
            panic!("expected completion");
        };
        assert!(newly_recorded);
        assert!(completion.certificate_code().starts_with("CERT-"));
        assert_eq!(completion.completed_at(), fixed_now());

        let second = service.check(UserId::new(9), CourseId::new(1)).await.unwrap();
        assert_eq!(
            second,
            CourseCompletionStatus::Completed {
                completion,
                newly_recorded: false
            }
        );
    }

    #[tokio::test]
    async fn course_without_required_videos_is_an_error() {
        let repo = InMemoryRepository::new();
        let err = service(&repo)
            .check(UserId::new(9), CourseId::new(2))
            .await
            .unwrap_err();
        assert!(matches!(err, CourseCompletionError::NoRequiredVideos));
    }
}
