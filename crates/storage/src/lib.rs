#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    CourseCompletionRepository, CourseRepository, InMemoryRepository, Storage, StorageError,
    ViewingSessionRepository, WriteOutcome,
};
