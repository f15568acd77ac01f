use lms_core::model::{CompletionThreshold, Course, CourseId, UserId, Video, VideoId, WatchStatus};
use services::{AppServices, Clock, FlushOutcome, OpenedSession, TrackerConfig, WatchContext};
use storage::repository::{CourseRepository, ViewingSessionRepository};

fn context() -> WatchContext {
    WatchContext {
        user_id: UserId::new(3),
        video_id: VideoId::new(1001),
        course_id: CourseId::new(1),
    }
}

async fn services(name: &str) -> AppServices {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let services = AppServices::new_sqlite(&url, Clock::system(), TrackerConfig::default())
        .await
        .unwrap();
    let course = Course::new(
        CourseId::new(1),
        "Getting Started",
        CompletionThreshold::new(95.0).unwrap(),
    )
    .unwrap();
    let courses = &services.storage().courses;
    courses.upsert_course(&course).await.unwrap();
    let video = Video::new(VideoId::new(1001), course.id(), "Lesson 1", 200.0, 0).unwrap();
    courses.upsert_video(&video).await.unwrap();
    services
}

#[tokio::test]
async fn sqlite_tracker_resumes_and_completes_with_course_threshold() {
    let services = services("memdb_tracking_flow").await;

    let (first, opened) = services.open_tracker(context()).await.unwrap();
    assert!(matches!(opened, OpenedSession::Created { .. }));
    assert!(first.on_play_started().await);
    first.record_progress(50.0, 200.0);
    assert_eq!(
        first.teardown().await,
        FlushOutcome::Persisted {
            percent: 25.0,
            status: WatchStatus::InProgress
        }
    );

    let (second, resumed) = services.open_tracker(context()).await.unwrap();
    assert_eq!(resumed.session_id(), opened.session_id());
    assert_eq!(resumed.resume_position(), 50);

    // 95% of a 200s video is the course's own threshold.
    second.record_progress(190.0, 200.0);
    assert_eq!(
        second.teardown().await,
        FlushOutcome::Persisted {
            percent: 95.0,
            status: WatchStatus::Completed
        }
    );

    let stored = services
        .storage()
        .sessions
        .get_session(opened.session_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status(), WatchStatus::Completed);
    assert_eq!(stored.total_watched_seconds(), 190);
    assert!(stored.completed_at().is_some());
    assert!(stored.start_time() <= stored.completed_at());

    let (_third, reopened) = services.open_tracker(context()).await.unwrap();
    assert!(matches!(reopened, OpenedSession::AlreadyCompleted { .. }));
    assert_eq!(reopened.resume_position(), 0);
}
