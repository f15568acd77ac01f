//! Watch-session progress tracking: sampling, debounced persistence and flush triggers.

mod beacon;
mod events;
mod persister;
mod sampler;
mod tracker;

pub use beacon::{Beacon, BeaconPayload, HttpBeacon, StoreBeacon};
pub use events::{FlushOutcome, FlushTrigger, TrackerEvent};
pub use sampler::{SampleDecision, SampleRejection};
pub use tracker::{OpenedSession, TrackerDeps, WatchContext, WatchTracker};
