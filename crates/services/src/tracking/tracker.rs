use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use lms_core::model::{
    CompletionThreshold, CourseId, NewViewingSession, ProgressSample, ProgressWrite, SessionId,
    SessionToken, UserId, VideoId, ViewingSession, WatchStatus, WriteRejection,
};
use lms_core::time::Clock;
use storage::repository::{
    CourseRepository, StorageError, ViewingSessionRepository, WriteOutcome,
};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use super::beacon::{Beacon, BeaconPayload};
use super::events::{FlushOutcome, FlushTrigger, TrackerEvent};
use super::persister::Persister;
use super::sampler::{SampleDecision, SampleRejection, SessionSnapshot, screen};
use crate::config::TrackerConfig;
use crate::course_completion::{CourseCompletionChecker, CourseCompletionStatus};
use crate::error::TrackerError;

const EVENT_CAPACITY: usize = 64;

/// Collaborators shared by every tracker of an app instance.
#[derive(Clone)]
pub struct TrackerDeps {
    pub sessions: Arc<dyn ViewingSessionRepository>,
    pub courses: Arc<dyn CourseRepository>,
    pub completion_checker: Arc<dyn CourseCompletionChecker>,
    pub beacon: Arc<dyn Beacon>,
    pub clock: Clock,
    pub config: TrackerConfig,
}

/// Who is watching what.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchContext {
    pub user_id: UserId,
    pub video_id: VideoId,
    pub course_id: CourseId,
}

/// How `open` resolved the session row for this page load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpenedSession {
    /// No unfinished row existed; a fresh one was inserted.
    Created { session_id: SessionId },
    /// An unfinished row was claimed by this tracker's token.
    Resumed {
        session_id: SessionId,
        position_seconds: u32,
        percent: f64,
    },
    /// The video is already complete; the row is read-only and playback restarts at 0.
    AlreadyCompleted { session_id: SessionId },
}

impl OpenedSession {
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        match *self {
            Self::Created { session_id }
            | Self::Resumed { session_id, .. }
            | Self::AlreadyCompleted { session_id } => session_id,
        }
    }

    /// Where the player should start.
    #[must_use]
    pub fn resume_position(&self) -> u32 {
        match *self {
            Self::Resumed {
                position_seconds, ..
            } => position_seconds,
            Self::Created { .. } | Self::AlreadyCompleted { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingSample {
    seq: u64,
    sample: ProgressSample,
}

#[derive(Default)]
struct TrackerState {
    snapshot: Option<SessionSnapshot>,
    pending: Option<PendingSample>,
    next_seq: u64,
    debounce: Option<(u64, JoinHandle<()>)>,
    safety_net: Option<JoinHandle<()>>,
    completion_check_scheduled: bool,
    disposed: bool,
}

impl TrackerState {
    fn abort_timers(&mut self) {
        if let Some((_, handle)) = self.debounce.take() {
            handle.abort();
        }
        if let Some(handle) = self.safety_net.take() {
            handle.abort();
        }
    }

    fn clear_pending_up_to(&mut self, seq: u64) {
        if self.pending.is_some_and(|p| p.seq <= seq) {
            self.pending = None;
        }
    }
}

struct PreparedWrite {
    session_id: SessionId,
    seq: u64,
    write: ProgressWrite,
}

struct Inner {
    deps: TrackerDeps,
    context: WatchContext,
    token: SessionToken,
    persister: Persister,
    state: Mutex<TrackerState>,
    events: broadcast::Sender<TrackerEvent>,
}

/// Progress tracking for one page view of one video.
///
/// Player samples are filtered and debounced; the latest accepted sample is
/// written through a conditional store update by the debounce timer, the
/// periodic safety net, or an explicit flush trigger. Nothing after `open`
/// ever returns an error to the caller: failures are logged and dropped.
///
/// Dropping the tracker cancels its timers without flushing; call
/// [`WatchTracker::teardown`] first to keep the last sample.
pub struct WatchTracker {
    inner: Arc<Inner>,
}

impl WatchTracker {
    #[must_use]
    pub fn new(deps: TrackerDeps, context: WatchContext) -> Self {
        let persister = Persister::new(Arc::clone(&deps.sessions), deps.config.retry);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                deps,
                context,
                token: SessionToken::generate(),
                persister,
                state: Mutex::new(TrackerState::default()),
                events,
            }),
        }
    }

    /// Create and open a tracker in one step.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError` if the session row cannot be looked up or created.
    pub async fn start(
        deps: TrackerDeps,
        context: WatchContext,
    ) -> Result<(Self, OpenedSession), TrackerError> {
        let tracker = Self::new(deps, context);
        let opened = tracker.open().await?;
        Ok((tracker, opened))
    }

    /// Resolve the session row: an existing completed row wins, then an
    /// unfinished row is claimed, otherwise a new row is created.
    ///
    /// Starts the safety-net timer unless the session is already completed.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::AlreadyOpen` or `TrackerError::Disposed` on misuse,
    /// and `TrackerError::Storage` if the store cannot be reached.
    pub async fn open(&self) -> Result<OpenedSession, TrackerError> {
        {
            let state = self.inner.lock();
            if state.disposed {
                return Err(TrackerError::Disposed);
            }
            if state.snapshot.is_some() {
                return Err(TrackerError::AlreadyOpen);
            }
        }

        let threshold = self.inner.resolve_threshold().await;
        let (session, opened) = self.inner.resolve_session().await?;
        let snapshot = SessionSnapshot::from_session(&session, threshold);

        {
            let mut state = self.inner.lock();
            state.snapshot = Some(snapshot);
            if !snapshot.is_completed() {
                state.safety_net = Inner::spawn_safety_net(&self.inner);
            }
        }

        info!(
            session_id = %opened.session_id(),
            video_id = %self.inner.context.video_id,
            user_id = %self.inner.context.user_id,
            status = snapshot.status.as_str(),
            resume_at = opened.resume_position(),
            threshold = threshold.percent(),
            "watch session opened"
        );
        Ok(opened)
    }

    /// Offer a player position sample.
    ///
    /// Accepted samples replace any pending one and restart the debounce timer.
    /// Must be called from within a tokio runtime for the debounce to run;
    /// otherwise the sample waits for the next safety-net tick or flush.
    pub fn record_progress(&self, position_seconds: f64, duration_seconds: f64) -> SampleDecision {
        let sample = match ProgressSample::new(position_seconds, duration_seconds) {
            Ok(sample) => sample,
            Err(err) => {
                trace!(error = %err, "invalid progress sample");
                return SampleDecision::Rejected(SampleRejection::InvalidSample);
            }
        };

        let mut state = self.inner.lock();
        if state.disposed {
            return SampleDecision::Rejected(SampleRejection::Disposed);
        }
        let Some(snapshot) = state.snapshot else {
            trace!("sample before session open dropped");
            return SampleDecision::Rejected(SampleRejection::NoSession);
        };
        if let Err(reason) = screen(&snapshot, &sample) {
            trace!(
                session_id = %snapshot.id,
                percent = sample.percent(),
                reason = reason.as_str(),
                "sample rejected"
            );
            return SampleDecision::Rejected(reason);
        }

        state.next_seq += 1;
        let seq = state.next_seq;
        state.pending = Some(PendingSample { seq, sample });
        if let Some((_, handle)) = state.debounce.take() {
            handle.abort();
        }
        match Handle::try_current() {
            Ok(runtime) => {
                let inner = Arc::clone(&self.inner);
                let delay = self.inner.deps.config.debounce;
                let task = runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.fire_debounce(seq).await;
                });
                state.debounce = Some((seq, task));
            }
            Err(_) => warn!(session_id = %snapshot.id, "no async runtime; debounce not scheduled"),
        }

        SampleDecision::Accepted {
            percent: sample.percent(),
        }
    }

    /// Flush the pending sample immediately, bypassing the debounce.
    ///
    /// Page-hidden and before-unload go through the beacon and return without
    /// waiting for delivery; every other trigger awaits the store write.
    pub async fn flush_now(&self, trigger: FlushTrigger) -> FlushOutcome {
        match trigger {
            FlushTrigger::PageHidden | FlushTrigger::BeforeUnload => {
                self.inner.beacon_flush(trigger)
            }
            FlushTrigger::Debounce
            | FlushTrigger::SafetyNet
            | FlushTrigger::Teardown
            | FlushTrigger::PlayerCompleted => self.inner.write_pending(trigger).await,
        }
    }

    /// The page became hidden: beacon the pending sample and stamp `end_time`.
    pub fn on_page_hidden(&self) -> FlushOutcome {
        self.inner.beacon_flush(FlushTrigger::PageHidden)
    }

    /// The page is about to unload: same delivery as [`Self::on_page_hidden`].
    pub fn on_before_unload(&self) -> FlushOutcome {
        self.inner.beacon_flush(FlushTrigger::BeforeUnload)
    }

    /// In-app navigation away from the player: cancel the timers, write the
    /// pending sample and dispose the tracker. Idempotent.
    pub async fn teardown(&self) -> FlushOutcome {
        {
            let mut state = self.inner.lock();
            if state.disposed {
                return FlushOutcome::Dropped(SampleRejection::Disposed);
            }
            state.abort_timers();
        }

        let outcome = self.inner.write_pending(FlushTrigger::Teardown).await;

        let mut state = self.inner.lock();
        state.disposed = true;
        state.pending = None;
        state.abort_timers();
        debug!(?outcome, "watch tracker torn down");
        outcome
    }

    /// Player hook: playback actually started. Stamps `start_time` once.
    pub async fn on_play_started(&self) -> bool {
        let Some(snapshot) = self.inner.active_snapshot() else {
            return false;
        };
        let now = self.inner.deps.clock.now();
        match self
            .inner
            .deps
            .sessions
            .mark_started(snapshot.id, self.inner.token, now)
            .await
        {
            Ok(stamped) => {
                debug!(session_id = %snapshot.id, stamped, "play started");
                stamped
            }
            Err(err) => {
                warn!(session_id = %snapshot.id, error = %err, "failed to stamp start_time");
                false
            }
        }
    }

    /// Player hook: intrinsic playback completion. Only forces a flush;
    /// completion itself is decided by the course threshold.
    pub async fn on_player_completed(&self) -> FlushOutcome {
        self.flush_now(FlushTrigger::PlayerCompleted).await
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.inner.events.subscribe()
    }

    #[must_use]
    pub fn token(&self) -> SessionToken {
        self.inner.token
    }

    #[must_use]
    pub fn context(&self) -> WatchContext {
        self.inner.context
    }

    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.lock().snapshot.map(|s| s.id)
    }

    #[must_use]
    pub fn status(&self) -> Option<WatchStatus> {
        self.inner.lock().snapshot.map(|s| s.status)
    }

    /// Highest progress this tracker has seen confirmed by the store.
    #[must_use]
    pub fn persisted_percent(&self) -> Option<f64> {
        self.inner.lock().snapshot.map(|s| s.persisted_percent)
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.inner.lock().pending.is_some()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }
}

impl Drop for WatchTracker {
    fn drop(&mut self) {
        self.inner.lock().abort_timers();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TrackerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn active_snapshot(&self) -> Option<SessionSnapshot> {
        let state = self.lock();
        if state.disposed {
            return None;
        }
        state
            .snapshot
            .filter(|s| !s.is_completed() && !s.superseded)
    }

    async fn resolve_threshold(&self) -> CompletionThreshold {
        let course_id = self.context.course_id;
        match self.deps.courses.get_course(course_id).await {
            Ok(Some(course)) => course.completion_threshold(),
            Ok(None) => self.deps.config.default_threshold,
            Err(err) => {
                warn!(course_id = %course_id, error = %err, "course lookup failed; using default threshold");
                self.deps.config.default_threshold
            }
        }
    }

    async fn resolve_session(&self) -> Result<(ViewingSession, OpenedSession), TrackerError> {
        let WatchContext {
            user_id, video_id, ..
        } = self.context;
        let sessions = &self.deps.sessions;

        if let Some(done) = sessions.find_completed_session(user_id, video_id).await? {
            let opened = OpenedSession::AlreadyCompleted {
                session_id: done.id(),
            };
            return Ok((done, opened));
        }

        if let Some(existing) = sessions.find_latest_session(user_id, video_id).await? {
            if !existing.is_completed() {
                return self.claim(existing.id()).await;
            }
        }

        let new = NewViewingSession {
            user_id,
            video_id,
            course_id: self.context.course_id,
            session_token: self.token,
        };
        match sessions.create_session(new, self.deps.clock.now()).await {
            Ok(created) => {
                let opened = OpenedSession::Created {
                    session_id: created.id(),
                };
                Ok((created, opened))
            }
            Err(StorageError::Conflict) => {
                // Another page load inserted the active row first.
                let existing = sessions
                    .find_latest_session(user_id, video_id)
                    .await?
                    .ok_or(StorageError::Conflict)?;
                self.claim(existing.id()).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn claim(&self, id: SessionId) -> Result<(ViewingSession, OpenedSession), TrackerError> {
        match self
            .deps
            .sessions
            .claim_session(id, self.token, self.deps.clock.now())
            .await
        {
            Ok(session) => {
                let opened = OpenedSession::Resumed {
                    session_id: session.id(),
                    position_seconds: session.current_position_seconds(),
                    percent: session.progress_percent(),
                };
                Ok((session, opened))
            }
            Err(StorageError::Conflict) => {
                // Completed between lookup and claim.
                let done = self
                    .deps
                    .sessions
                    .get_session(id)
                    .await?
                    .ok_or(StorageError::NotFound)?;
                let opened = OpenedSession::AlreadyCompleted {
                    session_id: done.id(),
                };
                Ok((done, opened))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn spawn_safety_net(inner: &Arc<Self>) -> Option<JoinHandle<()>> {
        let runtime = Handle::try_current().ok()?;
        let weak: Weak<Self> = Arc::downgrade(inner);
        let period = inner.deps.config.safety_net_interval;
        Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if inner.active_snapshot().is_none() {
                    break;
                }
                let has_pending = inner.lock().pending.is_some();
                if has_pending {
                    inner.write_pending(FlushTrigger::SafetyNet).await;
                }
            }
        }))
    }

    async fn fire_debounce(&self, seq: u64) {
        {
            let mut state = self.lock();
            let current = state.debounce.as_ref().is_some_and(|(s, _)| *s == seq);
            if !current {
                return;
            }
            state.debounce = None;
        }
        self.write_pending(FlushTrigger::Debounce).await;
    }

    /// Re-screen the pending sample against the latest snapshot and derive the write.
    fn prepare(&self, trigger: FlushTrigger) -> Result<PreparedWrite, FlushOutcome> {
        let mut state = self.lock();
        if state.disposed {
            return Err(FlushOutcome::Dropped(SampleRejection::Disposed));
        }
        let Some(snapshot) = state.snapshot else {
            return Err(FlushOutcome::Dropped(SampleRejection::NoSession));
        };
        let Some(pending) = state.pending else {
            return Err(FlushOutcome::NothingPending);
        };
        if let Err(reason) = screen(&snapshot, &pending.sample) {
            state.pending = None;
            debug!(
                session_id = %snapshot.id,
                trigger = trigger.as_str(),
                reason = reason.as_str(),
                "pending sample dropped at flush"
            );
            return Err(FlushOutcome::Dropped(reason));
        }
        let write = ProgressWrite::from_sample(
            self.token,
            &pending.sample,
            snapshot.threshold,
            self.deps.clock.now(),
        );
        Ok(PreparedWrite {
            session_id: snapshot.id,
            seq: pending.seq,
            write,
        })
    }

    async fn write_pending(&self, trigger: FlushTrigger) -> FlushOutcome {
        let prepared = match self.prepare(trigger) {
            Ok(prepared) => prepared,
            Err(outcome) => return outcome,
        };
        let id = prepared.session_id;

        match self.persister.write(id, &prepared.write, trigger).await {
            Ok(WriteOutcome::Applied(session)) => self.on_applied(&prepared, &session, trigger),
            Ok(WriteOutcome::Rejected(reason)) => {
                self.on_rejected(&prepared, reason, trigger).await;
                FlushOutcome::Rejected(reason)
            }
            Err(StorageError::NotFound) => {
                warn!(session_id = %id, trigger = trigger.as_str(), "session row missing; sample dropped");
                self.lock().clear_pending_up_to(prepared.seq);
                FlushOutcome::Failed
            }
            Err(err) => {
                warn!(
                    session_id = %id,
                    trigger = trigger.as_str(),
                    percent = prepared.write.progress_percent,
                    error = %err,
                    "progress write failed"
                );
                FlushOutcome::Failed
            }
        }
    }

    fn on_applied(
        &self,
        prepared: &PreparedWrite,
        session: &ViewingSession,
        trigger: FlushTrigger,
    ) -> FlushOutcome {
        let (newly_completed, schedule_check) = {
            let mut state = self.lock();
            state.clear_pending_up_to(prepared.seq);
            let mut newly_completed = false;
            if let Some(snapshot) = state.snapshot.as_mut() {
                let was_completed = snapshot.is_completed();
                snapshot.absorb(session);
                newly_completed = !was_completed && snapshot.is_completed();
            }
            if newly_completed {
                state.pending = None;
                if let Some((_, handle)) = state.debounce.take() {
                    handle.abort();
                }
            }
            let schedule_check = newly_completed && !state.completion_check_scheduled;
            if schedule_check {
                state.completion_check_scheduled = true;
            }
            (newly_completed, schedule_check)
        };

        debug!(
            session_id = %session.id(),
            trigger = trigger.as_str(),
            percent = session.progress_percent(),
            position = session.current_position_seconds(),
            "progress saved"
        );
        self.emit(TrackerEvent::ProgressSaved {
            session_id: session.id(),
            percent: session.progress_percent(),
            trigger,
        });

        if newly_completed {
            let completed_at = session.completed_at().unwrap_or(prepared.write.written_at);
            info!(
                session_id = %session.id(),
                video_id = %session.video_id(),
                %completed_at,
                "video completed"
            );
            self.emit(TrackerEvent::SessionCompleted {
                session_id: session.id(),
                video_id: session.video_id(),
                completed_at,
            });
        }
        if schedule_check {
            self.schedule_completion_check();
        }

        FlushOutcome::Persisted {
            percent: session.progress_percent(),
            status: session.status(),
        }
    }

    async fn on_rejected(&self, prepared: &PreparedWrite, reason: WriteRejection, trigger: FlushTrigger) {
        let id = prepared.session_id;
        match reason {
            WriteRejection::TokenMismatch => {
                warn!(session_id = %id, trigger = trigger.as_str(), "session claimed by another page load; tracking stopped");
                {
                    let mut state = self.lock();
                    state.pending = None;
                    if let Some(snapshot) = state.snapshot.as_mut() {
                        snapshot.superseded = true;
                    }
                }
                self.emit(TrackerEvent::Superseded { session_id: id });
            }
            WriteRejection::AlreadyCompleted => {
                debug!(session_id = %id, trigger = trigger.as_str(), "session already completed; write dropped");
                let mut state = self.lock();
                state.pending = None;
                if let Some(snapshot) = state.snapshot.as_mut() {
                    snapshot.status = WatchStatus::Completed;
                }
            }
            WriteRejection::Regressed => {
                debug!(
                    session_id = %id,
                    trigger = trigger.as_str(),
                    percent = prepared.write.progress_percent,
                    "store holds equal or greater progress; write dropped"
                );
                self.lock().clear_pending_up_to(prepared.seq);
                self.refresh_snapshot(id).await;
            }
        }
    }

    /// Pull the persisted row so later samples are screened against it.
    async fn refresh_snapshot(&self, id: SessionId) {
        match self.deps.sessions.get_session(id).await {
            Ok(Some(session)) => {
                if let Some(snapshot) = self.lock().snapshot.as_mut() {
                    snapshot.absorb(&session);
                }
            }
            Ok(None) => {}
            Err(err) => debug!(session_id = %id, error = %err, "snapshot refresh failed"),
        }
    }

    /// Page-hidden / before-unload path: hand the pending write and an
    /// `end_time` stamp to the beacon without waiting.
    fn beacon_flush(&self, trigger: FlushTrigger) -> FlushOutcome {
        let now = self.deps.clock.now();
        let (payload, completes, schedule_check) = {
            let mut state = self.lock();
            if state.disposed {
                return FlushOutcome::Dropped(SampleRejection::Disposed);
            }
            let Some(snapshot) = state.snapshot else {
                return FlushOutcome::Dropped(SampleRejection::NoSession);
            };
            if snapshot.is_completed() {
                return FlushOutcome::Dropped(SampleRejection::Completed);
            }
            if snapshot.superseded {
                return FlushOutcome::Dropped(SampleRejection::Superseded);
            }
            if let Some((_, handle)) = state.debounce.take() {
                handle.abort();
            }
            let progress = state
                .pending
                .take()
                .filter(|p| screen(&snapshot, &p.sample).is_ok())
                .map(|p| ProgressWrite::from_sample(self.token, &p.sample, snapshot.threshold, now));
            let completes = progress.is_some_and(|w| w.completes());
            if completes {
                // Nothing after a completing beacon can be written, so stop tracking now.
                if let Some(snapshot) = state.snapshot.as_mut() {
                    snapshot.status = WatchStatus::Completed;
                }
                if let Some(handle) = state.safety_net.take() {
                    handle.abort();
                }
            }
            let schedule_check = completes && !state.completion_check_scheduled;
            if schedule_check {
                state.completion_check_scheduled = true;
            }
            let payload = BeaconPayload {
                session_id: snapshot.id,
                session_token: self.token,
                progress,
                seen_at: now,
            };
            (payload, completes, schedule_check)
        };

        debug!(
            session_id = %payload.session_id,
            trigger = trigger.as_str(),
            percent = payload.progress.map(|w| w.progress_percent),
            "beacon flush"
        );
        self.deps.beacon.send(payload);
        if completes {
            info!(
                session_id = %payload.session_id,
                video_id = %self.context.video_id,
                completed_at = %now,
                "video completed"
            );
            self.emit(TrackerEvent::SessionCompleted {
                session_id: payload.session_id,
                video_id: self.context.video_id,
                completed_at: now,
            });
        }
        if schedule_check {
            self.schedule_completion_check();
        }
        FlushOutcome::Beaconed
    }

    /// One-shot course check, detached so it outlives the tracker.
    fn schedule_completion_check(&self) {
        let Ok(runtime) = Handle::try_current() else {
            warn!("no async runtime; course completion check skipped");
            return;
        };
        let checker = Arc::clone(&self.deps.completion_checker);
        let events = self.events.clone();
        let delay = self.deps.config.completion_check_delay;
        let WatchContext {
            user_id, course_id, ..
        } = self.context;

        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            match checker.check(user_id, course_id).await {
                Ok(CourseCompletionStatus::Completed {
                    completion,
                    newly_recorded: true,
                }) => {
                    info!(
                        user_id = %user_id,
                        course_id = %course_id,
                        "course completion recorded"
                    );
                    let _ = events.send(TrackerEvent::CourseCompleted(completion));
                }
                Ok(CourseCompletionStatus::Completed { .. }) => {
                    debug!(course_id = %course_id, "course completion already on record");
                }
                Ok(CourseCompletionStatus::Incomplete { remaining }) => {
                    debug!(
                        course_id = %course_id,
                        remaining = remaining.len(),
                        "course not complete yet"
                    );
                }
                Err(err) => {
                    warn!(course_id = %course_id, error = %err, "course completion check failed");
                }
            }
        });
    }
}
