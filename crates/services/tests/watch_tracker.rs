use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lms_core::model::{
    CompletionThreshold, Course, CourseId, NewViewingSession, ProgressSample, ProgressWrite,
    SessionId, SessionToken, UserId, Video, VideoId, ViewingSession, WatchStatus, WriteRejection,
};
use lms_core::time::fixed_now;
use services::{
    Clock, CourseCompletionService, FlushOutcome, FlushTrigger, OpenedSession, RetryPolicy,
    SampleDecision, SampleRejection, StoreBeacon, TrackerConfig, TrackerDeps, TrackerEvent,
    WatchContext, WatchTracker,
};
use storage::repository::{
    CourseRepository, InMemoryRepository, Storage, StorageError, ViewingSessionRepository,
    WriteOutcome,
};
use tokio::sync::broadcast;

const DURATION: f64 = 600.0;

fn context() -> WatchContext {
    WatchContext {
        user_id: UserId::new(7),
        video_id: VideoId::new(10),
        course_id: CourseId::new(1),
    }
}

struct Harness {
    repo: InMemoryRepository,
    clock: Clock,
    config: TrackerConfig,
}

impl Harness {
    async fn new() -> Self {
        let repo = InMemoryRepository::new();
        let course = Course::new(CourseId::new(1), "Rust basics", CompletionThreshold::default())
            .unwrap();
        repo.upsert_course(&course).await.unwrap();
        let video = Video::new(VideoId::new(10), course.id(), "Ownership", DURATION, 0).unwrap();
        repo.upsert_video(&video).await.unwrap();
        Self {
            repo,
            clock: Clock::manual(fixed_now()),
            config: TrackerConfig::default(),
        }
    }

    fn deps_with(&self, sessions: Arc<dyn ViewingSessionRepository>) -> TrackerDeps {
        let storage = Storage::from_repository(self.repo.clone());
        let checker = Arc::new(CourseCompletionService::new(
            self.clock.clone(),
            Arc::clone(&storage.courses),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.completions),
        ));
        TrackerDeps {
            beacon: Arc::new(StoreBeacon::new(Arc::clone(&sessions))),
            sessions,
            courses: storage.courses,
            completion_checker: checker,
            clock: self.clock.clone(),
            config: self.config.clone(),
        }
    }

    fn deps(&self) -> TrackerDeps {
        self.deps_with(Arc::new(self.repo.clone()))
    }

    async fn open(&self) -> (WatchTracker, OpenedSession) {
        WatchTracker::start(self.deps(), context()).await.unwrap()
    }

    async fn row(&self, id: SessionId) -> ViewingSession {
        self.repo.get_session(id).await.unwrap().unwrap()
    }

    fn advance_clock(&self, secs: i64) -> DateTime<Utc> {
        let mut clock = self.clock.clone();
        clock.advance(chrono::Duration::seconds(secs));
        clock.now()
    }

    fn rows(&self) -> usize {
        let ctx = context();
        self.repo.session_count(ctx.user_id, ctx.video_id).unwrap()
    }
}

fn drain(rx: &mut broadcast::Receiver<TrackerEvent>) -> Vec<TrackerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn assert_percent(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}%, got {actual}%"
    );
}

// ─── Scenarios ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn progress_under_one_percent_is_never_persisted() {
    let h = Harness::new().await;
    let (tracker, opened) = h.open().await;
    assert!(matches!(opened, OpenedSession::Created { .. }));

    for _ in 0..8 {
        assert_eq!(
            tracker.record_progress(5.6, DURATION),
            SampleDecision::Rejected(SampleRejection::BelowFloor)
        );
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    tokio::time::sleep(Duration::from_secs(6)).await;

    let row = h.row(opened.session_id()).await;
    assert_eq!(row.current_position_seconds(), 0);
    assert_percent(row.progress_percent(), 0.0);
    assert_eq!(row.status(), WatchStatus::InProgress);
    assert!(!tracker.has_pending());
}

#[tokio::test(start_paused = true)]
async fn debounced_write_then_regression_then_completion() {
    let h = Harness::new().await;
    let (tracker, opened) = h.open().await;
    let id = opened.session_id();
    let mut events = tracker.subscribe();

    // One write after the quiet period, with derived fields.
    assert_eq!(
        tracker.record_progress(30.0, DURATION),
        SampleDecision::Accepted { percent: 5.0 }
    );
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_percent(h.row(id).await.progress_percent(), 0.0);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let row = h.row(id).await;
    assert_percent(row.progress_percent(), 5.0);
    assert_eq!(row.current_position_seconds(), 30);
    assert_eq!(row.total_watched_seconds(), 30);
    assert_eq!(row.status(), WatchStatus::InProgress);
    assert_eq!(
        drain(&mut events),
        vec![TrackerEvent::ProgressSaved {
            session_id: id,
            percent: 5.0,
            trigger: FlushTrigger::Debounce,
        }]
    );

    // A lower sample is rejected and nothing changes.
    assert_eq!(
        tracker.record_progress(20.0, DURATION),
        SampleDecision::Rejected(SampleRejection::Regressed)
    );
    tokio::time::sleep(Duration::from_secs(1)).await;
    let row = h.row(id).await;
    assert_percent(row.progress_percent(), 5.0);
    assert_eq!(row.current_position_seconds(), 30);

    // Reaching the threshold completes the session and schedules the course check.
    let completed_at = h.advance_clock(60);
    assert!(tracker.record_progress(588.0, DURATION).is_accepted());
    tokio::time::sleep(Duration::from_millis(600)).await;
    let row = h.row(id).await;
    assert_eq!(row.status(), WatchStatus::Completed);
    assert_eq!(row.completed_at(), Some(completed_at));
    assert_eq!(row.total_watched_seconds(), 588);
    assert_eq!(tracker.status(), Some(WatchStatus::Completed));

    let completed_seen = tokio::time::Instant::now();
    let course_event = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(TrackerEvent::CourseCompleted(completion)) => return completion,
                Ok(_) => {}
                Err(err) => panic!("event stream closed: {err}"),
            }
        }
    })
    .await
    .expect("course completion event");
    assert!(completed_seen.elapsed() >= Duration::from_millis(1_400));
    assert_eq!(course_event.course_id(), CourseId::new(1));
    assert_eq!(course_event.user_id(), UserId::new(7));

    // Completed sessions ignore every further sample.
    assert_eq!(
        tracker.record_progress(600.0, DURATION),
        SampleDecision::Rejected(SampleRejection::Completed)
    );
    assert_eq!(
        tracker.on_page_hidden(),
        FlushOutcome::Dropped(SampleRejection::Completed)
    );
}

#[tokio::test(start_paused = true)]
async fn reopening_a_completed_video_creates_no_row() {
    let h = Harness::new().await;
    let (first, opened) = h.open().await;
    first.record_progress(600.0, DURATION);
    assert!(matches!(
        first.teardown().await,
        FlushOutcome::Persisted {
            status: WatchStatus::Completed,
            ..
        }
    ));
    let before = h.row(opened.session_id()).await;

    let (second, reopened) = h.open().await;
    assert_eq!(
        reopened,
        OpenedSession::AlreadyCompleted {
            session_id: opened.session_id()
        }
    );
    assert_eq!(reopened.resume_position(), 0);
    assert_eq!(h.rows(), 1);

    assert_eq!(
        second.record_progress(120.0, DURATION),
        SampleDecision::Rejected(SampleRejection::Completed)
    );
    assert!(!second.on_play_started().await);
    assert_eq!(second.teardown().await, FlushOutcome::NothingPending);
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(h.row(opened.session_id()).await, before);
}

#[tokio::test(start_paused = true)]
async fn page_hidden_flushes_pending_sample_immediately() {
    let h = Harness::new().await;
    let (tracker, opened) = h.open().await;
    let id = opened.session_id();

    assert!(tracker.record_progress(360.0, DURATION).is_accepted());
    let hidden_at = h.advance_clock(3);
    assert_eq!(tracker.on_page_hidden(), FlushOutcome::Beaconed);
    assert!(!tracker.has_pending());
    settle().await;

    let row = h.row(id).await;
    assert_percent(row.progress_percent(), 60.0);
    assert_eq!(row.current_position_seconds(), 360);
    assert_eq!(row.total_watched_seconds(), 360);
    assert_eq!(row.end_time(), Some(hidden_at));
}

#[tokio::test(start_paused = true)]
async fn page_hidden_without_pending_sample_still_stamps_end_time() {
    let h = Harness::new().await;
    let (tracker, opened) = h.open().await;

    let unload_at = h.advance_clock(42);
    assert_eq!(tracker.on_before_unload(), FlushOutcome::Beaconed);
    // The beacon does not need the tracker to stay alive.
    drop(tracker);
    settle().await;

    let row = h.row(opened.session_id()).await;
    assert_eq!(row.end_time(), Some(unload_at));
    assert_percent(row.progress_percent(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn completing_beacon_finishes_the_session_locally() {
    let h = Harness::new().await;
    let (tracker, opened) = h.open().await;
    let id = opened.session_id();
    let mut events = tracker.subscribe();

    assert!(tracker.record_progress(590.0, DURATION).is_accepted());
    let hidden_at = h.advance_clock(1);
    assert_eq!(tracker.on_page_hidden(), FlushOutcome::Beaconed);

    assert_eq!(tracker.status(), Some(WatchStatus::Completed));
    assert_eq!(
        tracker.record_progress(595.0, DURATION),
        SampleDecision::Rejected(SampleRejection::Completed)
    );
    match drain(&mut events).as_slice() {
        [TrackerEvent::SessionCompleted {
            session_id,
            video_id,
            completed_at,
        }] => {
            assert_eq!(*session_id, id);
            assert_eq!(*video_id, VideoId::new(10));
            assert_eq!(*completed_at, hidden_at);
        }
        other => panic!("unexpected events: {other:?}"),
    }

    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(h.row(id).await.status(), WatchStatus::Completed);
    let later = drain(&mut events);
    assert!(later.iter().any(|e| matches!(e, TrackerEvent::CourseCompleted(_))));
    // The safety net stopped with the completing beacon.
    assert!(!later.iter().any(|e| matches!(e, TrackerEvent::ProgressSaved { .. })));
}

// ─── Properties ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn persisted_progress_never_decreases() {
    let h = Harness::new().await;
    let (tracker, opened) = h.open().await;
    let id = opened.session_id();

    let mut last = 0.0;
    for position in [30.0, 12.0, 45.0, 44.0, 90.0, 3.0, 91.5, 60.0] {
        tracker.record_progress(position, DURATION);
        tokio::time::sleep(Duration::from_millis(600)).await;
        let percent = h.row(id).await.progress_percent();
        assert!(percent >= last, "progress went from {last} to {percent}");
        last = percent;
    }
    assert_eq!(h.row(id).await.current_position_seconds(), 91);
}

#[tokio::test(start_paused = true)]
async fn resume_reuses_the_unfinished_row() {
    let h = Harness::new().await;
    let (first, opened) = h.open().await;
    first.record_progress(120.0, DURATION);
    assert!(matches!(first.teardown().await, FlushOutcome::Persisted { .. }));

    let (second, resumed) = h.open().await;
    assert_eq!(
        resumed,
        OpenedSession::Resumed {
            session_id: opened.session_id(),
            position_seconds: 120,
            percent: 20.0,
        }
    );
    assert_eq!(resumed.resume_position(), 120);
    assert_eq!(h.rows(), 1);

    // Early samples after a reload do not reset progress.
    assert_eq!(
        second.record_progress(60.0, DURATION),
        SampleDecision::Rejected(SampleRejection::Regressed)
    );
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.row(opened.session_id()).await.current_position_seconds(), 120);
    assert_eq!(h.row(opened.session_id()).await.session_token(), second.token());
}

#[tokio::test(start_paused = true)]
async fn stale_tab_is_superseded_by_a_newer_page_load() {
    let h = Harness::new().await;
    let (old_tab, opened) = h.open().await;
    let (new_tab, _) = h.open().await;
    let mut old_events = old_tab.subscribe();

    old_tab.record_progress(300.0, DURATION);
    assert_eq!(
        old_tab.flush_now(FlushTrigger::SafetyNet).await,
        FlushOutcome::Rejected(WriteRejection::TokenMismatch)
    );
    assert_eq!(
        drain(&mut old_events),
        vec![TrackerEvent::Superseded {
            session_id: opened.session_id()
        }]
    );
    assert_eq!(
        old_tab.record_progress(310.0, DURATION),
        SampleDecision::Rejected(SampleRejection::Superseded)
    );

    new_tab.record_progress(60.0, DURATION);
    assert!(matches!(
        new_tab.flush_now(FlushTrigger::PlayerCompleted).await,
        FlushOutcome::Persisted { .. }
    ));
    assert_eq!(h.row(opened.session_id()).await.current_position_seconds(), 60);
    assert_eq!(h.rows(), 1);
}

#[tokio::test(start_paused = true)]
async fn samples_before_open_are_dropped() {
    let h = Harness::new().await;
    let tracker = WatchTracker::new(h.deps(), context());
    assert_eq!(
        tracker.record_progress(30.0, DURATION),
        SampleDecision::Rejected(SampleRejection::NoSession)
    );
    assert_eq!(
        tracker.record_progress(30.0, 0.0),
        SampleDecision::Rejected(SampleRejection::InvalidSample)
    );
    assert_eq!(tracker.on_page_hidden(), FlushOutcome::Dropped(SampleRejection::NoSession));

    tracker.open().await.unwrap();
    assert!(tracker.record_progress(30.0, DURATION).is_accepted());
    assert!(tracker.open().await.is_err());
}

// ─── Timers & lifecycle ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn safety_net_writes_during_uninterrupted_playback() {
    let h = Harness::new().await;
    let (tracker, opened) = h.open().await;
    let mut events = tracker.subscribe();

    // Samples every 250ms keep resetting the 500ms debounce.
    for step in 0..22_u32 {
        let position = 10.0 + f64::from(step) * 0.25;
        assert!(tracker.record_progress(position, DURATION).is_accepted());
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    let saved: Vec<FlushTrigger> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            TrackerEvent::ProgressSaved { trigger, .. } => Some(trigger),
            _ => None,
        })
        .collect();
    assert_eq!(saved, vec![FlushTrigger::SafetyNet]);
    assert!(h.row(opened.session_id()).await.current_position_seconds() >= 10);
}

#[tokio::test(start_paused = true)]
async fn teardown_writes_pending_sample_and_disposes() {
    let h = Harness::new().await;
    let (tracker, opened) = h.open().await;

    tracker.record_progress(90.0, DURATION);
    assert_eq!(
        tracker.teardown().await,
        FlushOutcome::Persisted {
            percent: 15.0,
            status: WatchStatus::InProgress
        }
    );
    assert!(tracker.is_disposed());
    assert_eq!(
        tracker.record_progress(120.0, DURATION),
        SampleDecision::Rejected(SampleRejection::Disposed)
    );
    assert_eq!(
        tracker.teardown().await,
        FlushOutcome::Dropped(SampleRejection::Disposed)
    );
    tokio::time::sleep(Duration::from_secs(10)).await;

    let row = h.row(opened.session_id()).await;
    assert_eq!(row.current_position_seconds(), 90);
    assert_eq!(row.total_watched_seconds(), 90);
}

#[tokio::test(start_paused = true)]
async fn play_started_stamps_start_time_once() {
    let h = Harness::new().await;
    let (tracker, opened) = h.open().await;

    let started_at = h.advance_clock(5);
    assert!(tracker.on_play_started().await);
    h.advance_clock(5);
    assert!(!tracker.on_play_started().await);

    tracker.record_progress(30.0, DURATION);
    tracker.teardown().await;
    assert_eq!(h.row(opened.session_id()).await.start_time(), Some(started_at));
}

// ─── Retry ─────────────────────────────────────────────────────────────────────

/// Something another page load does between this tracker's lookup and its write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Race {
    /// A rival tab inserts the active row just before our insert.
    InsertBeforeCreate,
    /// The row reaches completion just before our claim.
    CompleteBeforeClaim,
}

/// Session store whose progress writes fail a fixed number of times and
/// which can stage one race against the tracker.
struct FlakySessions {
    inner: InMemoryRepository,
    failures_left: AtomicU32,
    race: Mutex<Option<Race>>,
}

impl FlakySessions {
    fn take_race(&self, race: Race) -> bool {
        let mut slot = self.race.lock().unwrap();
        if *slot == Some(race) {
            *slot = None;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl ViewingSessionRepository for FlakySessions {
    async fn create_session(
        &self,
        new: NewViewingSession,
        now: DateTime<Utc>,
    ) -> Result<ViewingSession, StorageError> {
        if self.take_race(Race::InsertBeforeCreate) {
            let rival = NewViewingSession {
                session_token: SessionToken::generate(),
                ..new
            };
            self.inner.create_session(rival, now).await?;
        }
        self.inner.create_session(new, now).await
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<ViewingSession>, StorageError> {
        self.inner.get_session(id).await
    }

    async fn find_latest_session(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<ViewingSession>, StorageError> {
        self.inner.find_latest_session(user_id, video_id).await
    }

    async fn find_completed_session(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<ViewingSession>, StorageError> {
        self.inner.find_completed_session(user_id, video_id).await
    }

    async fn apply_progress(
        &self,
        id: SessionId,
        write: &ProgressWrite,
    ) -> Result<WriteOutcome, StorageError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StorageError::Connection("connection reset".into()));
        }
        self.inner.apply_progress(id, write).await
    }

    async fn claim_session(
        &self,
        id: SessionId,
        token: SessionToken,
        now: DateTime<Utc>,
    ) -> Result<ViewingSession, StorageError> {
        if self.take_race(Race::CompleteBeforeClaim) {
            if let Some(row) = self.inner.get_session(id).await? {
                let sample = ProgressSample::new(DURATION, DURATION).unwrap();
                let write = ProgressWrite::from_sample(
                    row.session_token(),
                    &sample,
                    CompletionThreshold::default(),
                    now,
                );
                self.inner.apply_progress(id, &write).await?;
            }
        }
        self.inner.claim_session(id, token, now).await
    }

    async fn mark_started(
        &self,
        id: SessionId,
        token: SessionToken,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        self.inner.mark_started(id, token, at).await
    }

    async fn mark_seen(
        &self,
        id: SessionId,
        token: SessionToken,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        self.inner.mark_seen(id, token, at).await
    }

    async fn completed_video_ids(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<VideoId>, StorageError> {
        self.inner.completed_video_ids(user_id, course_id).await
    }
}

fn flaky(h: &Harness, failures: u32) -> Arc<dyn ViewingSessionRepository> {
    Arc::new(FlakySessions {
        inner: h.repo.clone(),
        failures_left: AtomicU32::new(failures),
        race: Mutex::new(None),
    })
}

fn racing(h: &Harness, race: Race) -> Arc<dyn ViewingSessionRepository> {
    Arc::new(FlakySessions {
        inner: h.repo.clone(),
        failures_left: AtomicU32::new(0),
        race: Mutex::new(Some(race)),
    })
}

#[tokio::test(start_paused = true)]
async fn transient_write_failure_is_retried_once() {
    let mut h = Harness::new().await;
    h.config.retry = RetryPolicy {
        max_retries: 1,
        base_backoff: Duration::from_millis(100),
    };
    let (tracker, opened) = WatchTracker::start(h.deps_with(flaky(&h, 1)), context())
        .await
        .unwrap();

    tracker.record_progress(120.0, DURATION);
    assert!(matches!(
        tracker.on_player_completed().await,
        FlushOutcome::Persisted { .. }
    ));
    assert_eq!(h.row(opened.session_id()).await.current_position_seconds(), 120);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_keep_the_sample_pending() {
    let mut h = Harness::new().await;
    h.config.retry = RetryPolicy {
        max_retries: 1,
        base_backoff: Duration::from_millis(100),
    };
    let (tracker, opened) = WatchTracker::start(h.deps_with(flaky(&h, 2)), context())
        .await
        .unwrap();

    tracker.record_progress(120.0, DURATION);
    assert_eq!(
        tracker.flush_now(FlushTrigger::PlayerCompleted).await,
        FlushOutcome::Failed
    );
    assert!(tracker.has_pending());
    assert_percent(h.row(opened.session_id()).await.progress_percent(), 0.0);

    // The next flush carries the same sample through.
    assert!(matches!(
        tracker.teardown().await,
        FlushOutcome::Persisted { .. }
    ));
    assert_eq!(h.row(opened.session_id()).await.current_position_seconds(), 120);
}

// ─── Races ─────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn losing_the_insert_race_claims_the_rival_row() {
    let h = Harness::new().await;
    let (tracker, opened) =
        WatchTracker::start(h.deps_with(racing(&h, Race::InsertBeforeCreate)), context())
            .await
            .unwrap();

    assert!(matches!(
        opened,
        OpenedSession::Resumed {
            position_seconds: 0,
            ..
        }
    ));
    assert_eq!(h.rows(), 1);
    assert_eq!(h.row(opened.session_id()).await.session_token(), tracker.token());

    tracker.record_progress(120.0, DURATION);
    assert!(matches!(
        tracker.teardown().await,
        FlushOutcome::Persisted { .. }
    ));
    assert_eq!(h.row(opened.session_id()).await.current_position_seconds(), 120);
}

#[tokio::test(start_paused = true)]
async fn row_completed_before_claim_opens_read_only() {
    let h = Harness::new().await;
    let ctx = context();
    let rival = SessionToken::generate();
    let existing = h
        .repo
        .create_session(
            NewViewingSession {
                user_id: ctx.user_id,
                video_id: ctx.video_id,
                course_id: ctx.course_id,
                session_token: rival,
            },
            fixed_now(),
        )
        .await
        .unwrap();
    let sample = ProgressSample::new(60.0, DURATION).unwrap();
    let write = ProgressWrite::from_sample(rival, &sample, CompletionThreshold::default(), fixed_now());
    assert!(h.repo.apply_progress(existing.id(), &write).await.unwrap().is_applied());

    let (tracker, opened) =
        WatchTracker::start(h.deps_with(racing(&h, Race::CompleteBeforeClaim)), context())
            .await
            .unwrap();

    assert_eq!(
        opened,
        OpenedSession::AlreadyCompleted {
            session_id: existing.id()
        }
    );
    assert_eq!(opened.resume_position(), 0);
    assert_eq!(tracker.status(), Some(WatchStatus::Completed));
    assert_eq!(
        tracker.record_progress(120.0, DURATION),
        SampleDecision::Rejected(SampleRejection::Completed)
    );
    assert_eq!(h.rows(), 1);
    assert_eq!(h.row(existing.id()).await.session_token(), rival);
}
