//! Error taxonomy for the node composition and supervision engine.
//!
//! Kinds mirror the original Python exception hierarchy
//! (`ArgsNotCorrect`, `CommandNotFound`, `CommandRunFailed`) plus two kinds
//! the distillation names but the original expressed ad hoc
//! (`Unsupported`, `Internal`). Every variant carries a single
//! human-readable message; callers are expected to prefix it with a
//! `[component:name]` tag the way the original's `logger` calls do.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A descriptor value fails an invariant, or a referenced asset is missing.
    #[error("{0}")]
    ArgsIncorrect(String),

    /// A required external binary is absent from `PATH`/the given location.
    #[error("command not found: {0}")]
    CommandNotFound(String),

    /// A synchronous child returned non-zero, or a spawned child died
    /// within the liveness window.
    #[error("command failed: {0}")]
    CommandFailed(String),

    /// A descriptor names an option the engine does not implement.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Internal invariant violation: empty option list at render time,
    /// corrupt NUMA control output, etc.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wraps lower-level I/O failures (file staging, pid file access, ...).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
