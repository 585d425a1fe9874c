//! Per-context configuration.
//!
//! A `ConfigStore` holds everything a context needs to locate grids and
//! databases: search paths, network policy, the grid endpoint, an
//! optional CA bundle and the diagnostic log level. Setters validate up
//! front; a rejected call leaves the store unchanged.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::Level;

use geoctx_common::error::{ConfigError, ConfigResult};
use geoctx_grids::GridSources;

/// Default endpoint grid files are fetched from.
pub const DEFAULT_ENDPOINT: &str = "https://grids.geoctx.org";

/// Environment variable overriding the user-writable directory.
pub const USER_WRITABLE_DIR_ENV: &str = "GEOCTX_USER_WRITABLE_DIRECTORY";

/// Diagnostic verbosity of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Suppress diagnostics entirely.
    None,
    #[default]
    Error,
    Debug,
    Trace,
}

impl LogLevel {
    /// The `tracing` level this maps onto, `None` when suppressed.
    pub fn as_level(&self) -> Option<Level> {
        match self {
            LogLevel::None => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::None => "none",
            LogLevel::Error => "error",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration state of one context.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    search_paths: Vec<PathBuf>,
    ca_bundle: Option<PathBuf>,
    network_enabled: bool,
    endpoint: String,
    log_level: LogLevel,
    /// Resolved on first use and then fixed for the context's lifetime.
    user_writable_dir: Option<PathBuf>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            ca_bundle: None,
            network_enabled: cfg!(feature = "network"),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            log_level: LogLevel::default(),
            user_writable_dir: None,
        }
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the grid/database search paths. An empty list means only
    /// the user-writable directory is probed.
    pub fn set_search_paths(&mut self, paths: Vec<PathBuf>) {
        self.search_paths = paths;
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Store a PEM bundle path for grid fetches. Not validated here;
    /// an unreadable bundle fails the fetch that uses it.
    pub fn set_ca_bundle_path(&mut self, path: Option<PathBuf>) {
        self.ca_bundle = path;
    }

    pub fn ca_bundle_path(&self) -> Option<&Path> {
        self.ca_bundle.as_deref()
    }

    /// Enable or disable network grid fetches. Enabling fails on builds
    /// without network support.
    pub fn set_network_enabled(&mut self, enabled: bool) -> ConfigResult<()> {
        if enabled && !cfg!(feature = "network") {
            return Err(ConfigError::NetworkUnavailable);
        }
        self.network_enabled = enabled;
        Ok(())
    }

    pub fn network_enabled(&self) -> bool {
        self.network_enabled
    }

    pub fn set_network_endpoint(&mut self, endpoint: &str) {
        self.endpoint = endpoint.to_string();
    }

    pub fn network_endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    /// The directory fetched grids land in, also the last local probe
    /// location. Resolved from the environment on first call and cached;
    /// later environment changes are ignored.
    pub fn user_writable_directory(&mut self) -> &Path {
        if self.user_writable_dir.is_none() {
            let dir = resolve_user_writable_dir();
            self.user_writable_dir = Some(dir);
        }
        self.user_writable_dir.as_deref().unwrap_or(Path::new("."))
    }

    /// Snapshot of everything the grid resolver reads, taken per call so
    /// resolution never observes a half-updated configuration.
    pub fn grid_sources(&mut self) -> GridSources {
        let uwd = self.user_writable_directory().to_path_buf();
        GridSources {
            search_paths: self.search_paths.clone(),
            user_writable_dir: Some(uwd),
            network_enabled: self.network_enabled,
            endpoint: self.endpoint.clone(),
            ca_bundle: self.ca_bundle.clone(),
        }
    }
}

fn resolve_user_writable_dir() -> PathBuf {
    if let Ok(val) = std::env::var(USER_WRITABLE_DIR_ENV) {
        if !val.is_empty() {
            return PathBuf::from(val);
        }
    }

    if let Ok(val) = std::env::var("XDG_DATA_HOME") {
        if !val.is_empty() {
            return PathBuf::from(val).join("geoctx");
        }
    }

    if let Ok(val) = std::env::var("HOME") {
        if !val.is_empty() {
            return PathBuf::from(val).join(".local/share/geoctx");
        }
    }

    std::env::temp_dir().join("geoctx")
}
