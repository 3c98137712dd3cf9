pub mod clock;
pub mod config;
pub mod helpers;
pub mod model;
pub mod scheduler;
pub mod store;

use miette::Diagnostic;
use model::{CardId, GroupId};
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Library(#[from] LibraryError),
    #[error("Io Error: {description}, {source}")]
    Io {
        description: String,
        source: std::io::Error,
    },
}

/// Library-internal error kinds. `Clone` so that a scheduler can surface the
/// same cause from a bulk operation and from the single-card path that
/// produced it, unlike the top-level [`Error`].
#[derive(Clone, Debug, Diagnostic, Error)]
pub enum LibraryError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreErrorKind),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Scheduler(#[from] SchedulerErrorKind),
    #[error("{0}")]
    InvalidConfig(String),
}

#[derive(Clone, Debug, Diagnostic, Error)]
pub enum StoreErrorKind {
    #[error("No card with id `{0}` was found.")]
    CardNotFound(CardId),
    #[error("No group with id `{0}` was found.")]
    GroupNotFound(GroupId),
    #[error("Store backend returned an error: {0}")]
    Backend(String),
}

#[derive(Clone, Debug, Diagnostic, Error)]
pub enum SchedulerErrorKind {
    #[error("Invalid grade. Received `{0}`.")]
    InvalidGrade(u32),
    #[error("Card `{0}` is not in the cram queue.")]
    NotCramming(CardId),
    #[error("Group `{0}` has no configuration.")]
    NoConfig(GroupId),
}
