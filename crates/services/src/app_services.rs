use std::sync::Arc;

use storage::repository::Storage;
use tracing::info;

use crate::Clock;
use crate::config::TrackerConfig;
use crate::course_completion::{CourseCompletionChecker, CourseCompletionService};
use crate::error::{AppServicesError, TrackerError};
use crate::tracking::{
    Beacon, HttpBeacon, OpenedSession, StoreBeacon, TrackerDeps, WatchContext, WatchTracker,
};

/// Assembles the tracker collaborators over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    deps: TrackerDeps,
    completion: Arc<CourseCompletionService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or the beacon client fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: TrackerConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, clock, config)
    }

    /// Build services over an existing storage aggregate.
    ///
    /// Beacons go to `config.beacon_url` when set, otherwise straight to the store.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Http` if the beacon client cannot be built.
    pub fn from_storage(
        storage: Storage,
        clock: Clock,
        config: TrackerConfig,
    ) -> Result<Self, AppServicesError> {
        let beacon: Arc<dyn Beacon> = match &config.beacon_url {
            Some(url) => {
                info!(endpoint = %url, "using http beacon");
                Arc::new(HttpBeacon::new(url.clone())?)
            }
            None => Arc::new(StoreBeacon::new(Arc::clone(&storage.sessions))),
        };
        let completion = Arc::new(CourseCompletionService::new(
            clock.clone(),
            Arc::clone(&storage.courses),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.completions),
        ));
        let completion_checker: Arc<dyn CourseCompletionChecker> = completion.clone();
        let deps = TrackerDeps {
            sessions: Arc::clone(&storage.sessions),
            courses: Arc::clone(&storage.courses),
            completion_checker,
            beacon,
            clock,
            config,
        };

        Ok(Self {
            storage,
            deps,
            completion,
        })
    }

    /// Open a tracker for one page view.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError` if the session row cannot be resolved.
    pub async fn open_tracker(
        &self,
        context: WatchContext,
    ) -> Result<(WatchTracker, OpenedSession), TrackerError> {
        WatchTracker::start(self.deps.clone(), context).await
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn tracker_deps(&self) -> TrackerDeps {
        self.deps.clone()
    }

    #[must_use]
    pub fn course_completion(&self) -> Arc<CourseCompletionService> {
        Arc::clone(&self.completion)
    }
}
