//! Grid resolution: local search paths first, then the network.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use geoctx_common::error::{GridError, GridResult};

use crate::format::ShiftGrid;
use crate::reference::{GridOrigin, GridReference};

/// Candidate file names for a grid, in probe order.
#[cfg(feature = "compressed-grids")]
const EXTENSIONS: [&str; 3] = ["", ".json", ".json.gz"];
#[cfg(not(feature = "compressed-grids"))]
const EXTENSIONS: [&str; 2] = ["", ".json"];

/// Everything the resolver needs to know from the context
/// configuration, snapshotted per call so resolution never observes a
/// half-updated config.
#[derive(Debug, Clone, Default)]
pub struct GridSources {
    /// Local directories, probed in order.
    pub search_paths: Vec<PathBuf>,
    /// Destination for network fetches and final local fallback probe.
    pub user_writable_dir: Option<PathBuf>,
    pub network_enabled: bool,
    /// Base URL grids are fetched from.
    pub endpoint: String,
    /// Extra PEM bundle trusted for fetches.
    pub ca_bundle: Option<PathBuf>,
}

/// Expected integrity of a fetched grid file, from the authority
/// database's grid table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridIntegrity {
    pub remote_path: Option<String>,
    pub size_bytes: Option<u64>,
    pub crc32: Option<u32>,
}

/// Locates grid files and caches the results for its lifetime.
///
/// References and parsed grids are never evicted; a context drops the
/// whole resolver on teardown. Both caches are behind async locks so a
/// resolver shared within a context's tasks stays consistent, but a
/// resolver is still meant to be used by one logical session.
#[derive(Default)]
pub struct GridResolver {
    references: Arc<RwLock<HashMap<String, GridReference>>>,
    grids: Arc<RwLock<HashMap<String, Arc<ShiftGrid>>>>,
}

impl GridResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached reference for a grid, if it was already resolved.
    pub async fn cached(&self, name: &str) -> Option<GridReference> {
        self.references.read().await.get(name).cloned()
    }

    /// Whether the grid is locatable without a network fetch: already
    /// cached, or present on a local search path. Used by the operation
    /// factory to annotate candidates.
    pub async fn is_locally_available(&self, sources: &GridSources, name: &str) -> bool {
        if self.references.read().await.contains_key(name) {
            return true;
        }
        probe_local(sources, name).is_some()
    }

    /// Resolve a grid to a local file.
    ///
    /// Local search paths are probed in configuration order, then the
    /// user-writable directory. When the grid is absent locally the
    /// resolver fetches it from the endpoint if the context allows
    /// network access. `timeout` bounds the network fetch only; on
    /// expiry no partial file is left in a usable state and the cache
    /// is untouched (same for a dropped/cancelled call).
    pub async fn locate(
        &self,
        sources: &GridSources,
        name: &str,
        integrity: Option<&GridIntegrity>,
        timeout: Option<Duration>,
    ) -> GridResult<GridReference> {
        if let Some(cached) = self.cached(name).await {
            debug!(grid = %name, "grid reference cache hit");
            return Ok(cached);
        }

        if let Some(path) = probe_local(sources, name) {
            let reference = self
                .insert_reference(name, path, GridOrigin::Local, integrity)
                .await;
            info!(grid = %name, path = %reference.path.display(), "grid found locally");
            return Ok(reference);
        }

        if !sources.network_enabled {
            return Err(GridError::NetworkDisabled(name.to_string()));
        }

        self.locate_via_network(sources, name, integrity, timeout)
            .await
    }

    #[cfg(feature = "network")]
    async fn locate_via_network(
        &self,
        sources: &GridSources,
        name: &str,
        integrity: Option<&GridIntegrity>,
        timeout: Option<Duration>,
    ) -> GridResult<GridReference> {
        let path = crate::fetch::fetch_grid(sources, name, integrity, timeout).await?;
        let reference = self
            .insert_reference(name, path, GridOrigin::Network, integrity)
            .await;
        info!(grid = %name, path = %reference.path.display(), "grid fetched");
        Ok(reference)
    }

    // Configuration refuses to enable the network on such a build, so
    // this is only reachable through a hand-built GridSources.
    #[cfg(not(feature = "network"))]
    async fn locate_via_network(
        &self,
        _sources: &GridSources,
        name: &str,
        _integrity: Option<&GridIntegrity>,
        _timeout: Option<Duration>,
    ) -> GridResult<GridReference> {
        Err(GridError::NetworkDisabled(name.to_string()))
    }

    /// Resolve and parse a grid, caching the parsed form.
    pub async fn load(
        &self,
        sources: &GridSources,
        name: &str,
        integrity: Option<&GridIntegrity>,
        timeout: Option<Duration>,
    ) -> GridResult<Arc<ShiftGrid>> {
        if let Some(grid) = self.grids.read().await.get(name) {
            return Ok(Arc::clone(grid));
        }

        let reference = self.locate(sources, name, integrity, timeout).await?;
        let grid = Arc::new(ShiftGrid::load(&reference.path)?);

        self.grids
            .write()
            .await
            .insert(name.to_string(), Arc::clone(&grid));

        Ok(grid)
    }

    async fn insert_reference(
        &self,
        name: &str,
        path: PathBuf,
        origin: GridOrigin,
        integrity: Option<&GridIntegrity>,
    ) -> GridReference {
        let reference = GridReference {
            name: name.to_string(),
            path,
            origin,
            expected_size: integrity.and_then(|i| i.size_bytes),
            expected_crc32: integrity.and_then(|i| i.crc32),
            resolved_at: Utc::now(),
        };

        self.references
            .write()
            .await
            .insert(name.to_string(), reference.clone());

        reference
    }
}

/// Probe the local directories for a usable grid file.
fn probe_local(sources: &GridSources, name: &str) -> Option<PathBuf> {
    let dirs = sources
        .search_paths
        .iter()
        .map(PathBuf::as_path)
        .chain(sources.user_writable_dir.as_deref());

    for dir in dirs {
        if let Some(path) = probe_dir(dir, name) {
            return Some(path);
        }
    }

    None
}

fn probe_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    for ext in EXTENSIONS {
        let candidate = dir.join(format!("{}{}", name, ext));
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}
