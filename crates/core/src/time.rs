use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, PoisonError};

/// Source of wall-clock timestamps for persisted session fields.
///
/// Timers are driven by the async runtime; this only decides what gets written
/// into `start_time`, `end_time`, `completed_at` and `last_updated`.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
    /// Shared, manually advanced time. Clones observe the same instant.
    Manual(Arc<Mutex<DateTime<Utc>>>),
}

impl Clock {
    #[must_use]
    pub fn system() -> Self {
        Self::System
    }

    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn manual(start: DateTime<Utc>) -> Self {
        Self::Manual(Arc::new(Mutex::new(start)))
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
            Clock::Manual(shared) => *shared.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Move a fixed or manual clock forward. No effect on the system clock.
    pub fn advance(&mut self, delta: Duration) {
        match self {
            Clock::System => {}
            Clock::Fixed(t) => *t += delta,
            Clock::Manual(shared) => {
                *shared.lock().unwrap_or_else(PoisonError::into_inner) += delta;
            }
        }
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self, Clock::System)
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let mut clock = Clock::manual(fixed_now());
        let observer = clock.clone();
        clock.advance(Duration::seconds(5));
        assert_eq!(observer.now(), fixed_now() + Duration::seconds(5));
    }

    #[test]
    fn fixed_clock_advances_only_itself() {
        let mut clock = Clock::fixed(fixed_now());
        let copy = clock.clone();
        clock.advance(Duration::seconds(1));
        assert_eq!(copy.now(), fixed_now());
        assert_eq!(clock.now(), fixed_now() + Duration::seconds(1));
    }

    #[test]
    fn system_clock_ignores_advance() {
        let mut clock = Clock::system();
        clock.advance(Duration::days(365));
        assert!(clock.is_system());
        assert!(clock.now() < Utc::now() + Duration::days(1));
    }
}
