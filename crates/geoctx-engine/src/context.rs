//! The transformation context.
//!
//! A `Context` bundles one configuration store, at most one open
//! authority database and one grid resolver. It is the unit of
//! isolation: contexts share nothing, and one context serves one
//! logical user at a time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use geoctx_authority::AuthorityDatabase;
use geoctx_common::error::{ConfigError, ConfigResult, LookupResult, PipelineResult};
use geoctx_common::{CandidateOperation, CrsHandle};
use geoctx_grids::{GridIntegrity, GridResolver};

use crate::config::{ConfigStore, LogLevel};
use crate::factory::{OperationFactory, ResolveConstraint};
use crate::pipeline::{BoundPipeline, ReadyPipeline};

/// File name probed on the search paths when no explicit database path
/// is configured.
const DEFAULT_DB_NAME: &str = "geoctx.db";

pub struct Context {
    config: ConfigStore,
    authority: Option<AuthorityDatabase>,
    resolver: GridResolver,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A context with default configuration and no database.
    pub fn new() -> Self {
        Self {
            config: ConfigStore::new(),
            authority: None,
            resolver: GridResolver::new(),
        }
    }

    /// Crate version string.
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Whether this build can fetch grids over the network.
    pub fn has_network() -> bool {
        cfg!(feature = "network")
    }

    /// Whether this build reads gzip-compressed grid files.
    pub fn has_compressed_grids() -> bool {
        cfg!(feature = "compressed-grids")
    }

    pub fn set_search_paths(&mut self, paths: Vec<PathBuf>) {
        self.config.set_search_paths(paths);
    }

    pub fn set_ca_bundle_path(&mut self, path: Option<PathBuf>) {
        self.config.set_ca_bundle_path(path);
    }

    pub fn set_network_enabled(&mut self, enabled: bool) -> ConfigResult<()> {
        self.config.set_network_enabled(enabled)
    }

    pub fn set_network_endpoint(&mut self, endpoint: &str) {
        self.config.set_network_endpoint(endpoint);
    }

    /// Record the desired diagnostic level for this context.
    ///
    /// Advisory: `tracing` emission is gated by the process-wide
    /// subscriber (see [`init_logging`](crate::logging::init_logging)),
    /// not per context.
    pub fn set_log_level(&mut self, level: LogLevel) {
        self.config.set_log_level(level);
    }

    pub fn log_level(&self) -> LogLevel {
        self.config.log_level()
    }

    pub fn user_writable_directory(&mut self) -> PathBuf {
        self.config.user_writable_directory().to_path_buf()
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Open an authority database and make it this context's active one.
    ///
    /// `primary = None` searches the configured search paths, then the
    /// user-writable directory, for `geoctx.db`; nothing found is
    /// `ConfigError::NoDatabase`. The new database is opened and schema
    /// checked before the old one is dropped, so a failed call leaves
    /// the previously active database untouched.
    pub async fn set_database_path(
        &mut self,
        primary: Option<&Path>,
        aux: &[PathBuf],
    ) -> ConfigResult<()> {
        let primary = match primary {
            Some(path) => path.to_path_buf(),
            None => self.default_database_path().ok_or(ConfigError::NoDatabase)?,
        };

        let db = AuthorityDatabase::open(&primary, aux)
            .await
            .map_err(|e| ConfigError::DatabaseUnavailable(e.to_string()))?;

        info!(path = %primary.display(), "authority database configured");
        self.authority = Some(db);
        Ok(())
    }

    fn default_database_path(&mut self) -> Option<PathBuf> {
        for dir in self.config.search_paths() {
            let candidate = dir.join(DEFAULT_DB_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        let candidate = self.config.user_writable_directory().join(DEFAULT_DB_NAME);
        candidate.is_file().then_some(candidate)
    }

    /// The active authority database, if one is configured.
    pub fn database(&self) -> Option<&AuthorityDatabase> {
        self.authority.as_ref()
    }

    pub fn resolver(&self) -> &GridResolver {
        &self.resolver
    }

    /// Look up a CRS by `AUTH:CODE` in the active database.
    pub async fn find_crs(&self, id: &str) -> ConfigResult<LookupResult<CrsHandle>> {
        let db = self.authority.as_ref().ok_or(ConfigError::NoDatabase)?;
        Ok(db.find_crs(id).await)
    }

    /// Ranked candidate operations from `source` to `target`.
    pub async fn resolve_operations(
        &mut self,
        source: &CrsHandle,
        target: &CrsHandle,
        constraint: &ResolveConstraint,
    ) -> ConfigResult<LookupResult<Vec<CandidateOperation>>> {
        let sources = self.config.grid_sources();
        let db = self.authority.as_ref().ok_or(ConfigError::NoDatabase)?;

        let factory = OperationFactory::new(db, &self.resolver, sources);
        Ok(factory.resolve(source, target, constraint).await)
    }

    /// Prepare a bound pipeline, consulting the authority database for
    /// grid integrity expectations when one is configured.
    ///
    /// `timeout` bounds each network fetch. Dropping the returned future
    /// leaves the resolver cache unchanged.
    pub async fn prepare(
        &mut self,
        bound: BoundPipeline,
        timeout: Option<Duration>,
    ) -> PipelineResult<ReadyPipeline> {
        let sources = self.config.grid_sources();
        let integrity = self.grid_integrity(bound.operation()).await;

        bound
            .prepare_with_integrity(&self.resolver, &sources, &integrity, timeout)
            .await
    }

    /// Integrity expectations for every grid the operation needs.
    /// Missing metadata (or no database at all) just means the fetch is
    /// unverified; a lookup failure here never blocks preparation.
    async fn grid_integrity(&self, op: &CandidateOperation) -> HashMap<String, GridIntegrity> {
        let mut integrity = HashMap::new();

        let Some(db) = self.authority.as_ref() else {
            return integrity;
        };

        for name in op.required_grids() {
            match db.grid_metadata(name).await {
                Ok(Some(meta)) => {
                    integrity.insert(
                        name.to_string(),
                        GridIntegrity {
                            remote_path: meta.remote_path,
                            size_bytes: meta.size_bytes,
                            crc32: meta.crc32,
                        },
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(grid = %name, error = %e, "grid metadata lookup failed");
                }
            }
        }

        integrity
    }
}
