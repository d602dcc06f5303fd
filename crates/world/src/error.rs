//! Error taxonomy for world storage and persistence.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the world crate.
///
/// Unreachable pathfinding goals are not errors; they come back as an empty path.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Malformed region or save payload. Callers on the hot path treat this as "absent".
    #[error("corrupt world data: {context}")]
    DataCorruption {
        /// What was being decoded when the corruption was detected.
        context: String,
    },
    /// No save file exists yet; the expected first-run condition.
    #[error("no save found at {}", path.display())]
    MissingSave {
        /// Location that was checked.
        path: PathBuf,
    },
    /// A coordinate that cannot map onto a chunk (non-finite, chunk production
    /// failed, or a region-local slot outside the region).
    #[error("invalid coordinate ({x}, {y})")]
    InvalidCoordinate {
        /// World-space or region-local X.
        x: f32,
        /// World-space or region-local Y.
        y: f32,
    },
    /// Underlying storage failure.
    #[error("{context}: {source}")]
    Io {
        /// Operation that failed.
        context: String,
        /// Source I/O error.
        #[source]
        source: io::Error,
    },
}

impl WorldError {
    pub(crate) fn corrupt(context: impl Into<String>) -> Self {
        Self::DataCorruption {
            context: context.into(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// True for errors that mean "the data is unusable" rather than "the disk failed".
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::DataCorruption { .. })
    }
}

/// Convenience alias used throughout the crate.
pub type WorldResult<T> = Result<T, WorldError>;

/// Attach context to raw I/O results.
pub(crate) trait IoContext<T> {
    fn io_context<F, S>(self, f: F) -> WorldResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F, S>(self, f: F) -> WorldResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|err| WorldError::io(f(), err))
    }
}
