//! Error types for geoctx crates.

use thiserror::Error;

/// Errors raised by context configuration calls.
///
/// Every `set_*` failure leaves the previous configuration unchanged;
/// there is no partial mutation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The given database path could not be opened as a valid authority
    /// database.
    #[error("authority database unavailable: {0}")]
    DatabaseUnavailable(String),

    /// No primary database path was given and none of the search paths
    /// supplied a default database.
    #[error("no authority database found in search paths")]
    NoDatabase,

    /// Network access was requested on a build without network support.
    #[error("network support not compiled in")]
    NetworkUnavailable,
}

/// Errors raised by authority database queries.
#[derive(Debug, Error)]
pub enum LookupError {
    /// No matching authority record. A normal outcome callers handle.
    #[error("no authority record for {0}")]
    NotFound(String),

    /// I/O or corruption error from the underlying store. Never a
    /// silent partial result.
    #[error("authority database error: {0}")]
    DatabaseError(String),
}

/// Errors raised while locating or fetching grid files.
#[derive(Debug, Error)]
pub enum GridError {
    /// Grid absent from local search paths and from the network
    /// endpoint (or the fetched copy failed its integrity check).
    #[error("grid not found: {0}")]
    NotFound(String),

    /// Grid absent locally and network access is disabled for this
    /// context.
    #[error("grid {0} not available locally and network is disabled")]
    NetworkDisabled(String),

    /// Network fetch exceeded the caller-supplied timeout. No partial
    /// file is left in a usable state.
    #[error("timed out fetching grid {0}")]
    Timeout(String),
}

/// Errors raised while binding or preparing a pipeline.
///
/// These mean the selected operation cannot be used as-is; callers
/// should pick another candidate from the ranked list.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Consecutive steps do not chain (axis/unit spaces disagree), or
    /// an inverse application was requested for a non-reversible
    /// operation.
    #[error("pipeline steps are incompatible: {0}")]
    Incompatible(String),

    /// A grid-dependent step could not be resolved. Names the first
    /// unresolvable grid.
    #[error("required grid missing: {0}")]
    MissingGrid(String),
}

impl From<GridError> for PipelineError {
    fn from(err: GridError) -> Self {
        match err {
            GridError::NotFound(name)
            | GridError::NetworkDisabled(name)
            | GridError::Timeout(name) => PipelineError::MissingGrid(name),
        }
    }
}

/// Result alias for configuration calls.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result alias for authority lookups.
pub type LookupResult<T> = Result<T, LookupError>;

/// Result alias for grid resolution.
pub type GridResult<T> = Result<T, GridError>;

/// Result alias for pipeline construction.
pub type PipelineResult<T> = Result<T, PipelineError>;
