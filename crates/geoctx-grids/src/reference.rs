//! Resolved grid references.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Where a grid file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridOrigin {
    /// Found on a configured search path.
    Local,
    /// Fetched from the network endpoint into the user-writable
    /// directory.
    Network,
}

/// A grid resolved to a local file.
///
/// Created on first lookup and cached for the resolver's lifetime;
/// later configuration changes (including disabling the network) do
/// not invalidate it.
#[derive(Debug, Clone, PartialEq)]
pub struct GridReference {
    pub name: String,
    /// Local path of the usable grid file.
    pub path: PathBuf,
    pub origin: GridOrigin,
    /// Expected byte size, when the authority database registers one.
    pub expected_size: Option<u64>,
    /// Expected CRC-32, when registered.
    pub expected_crc32: Option<u32>,
    pub resolved_at: DateTime<Utc>,
}
