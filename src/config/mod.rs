//! Configuration management.
//!
//! Everything lives under `~/.pyissues/` unless overridden:
//! - **Metadata**: `meta.json`, the `id → status` snapshot
//! - **Archive**: `issues.json.gz`, the compressed issue container
//! - **Settings**: `config.json`, optional tracker and retry settings

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::remote::{DEFAULT_BASE_URL, DEFAULT_LIST_TIMEOUT};
use crate::sync::{DEFAULT_CONCURRENCY, RetryPolicy, resolve_concurrency};

const DATA_DIR_NAME: &str = ".pyissues";
const META_FILE: &str = "meta.json";
const ARCHIVE_FILE: &str = "issues.json.gz";
const SETTINGS_FILE: &str = "config.json";

/// Optional settings file contents. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tracker root url.
    pub base_url: String,
    /// Worker count; `0` means every available core.
    pub threads: Option<usize>,
    /// Timeout for the issue list request, in seconds.
    pub list_timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            threads: None,
            list_timeout_secs: DEFAULT_LIST_TIMEOUT.as_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file exists but cannot be parsed, or
    /// holds a retry policy that would never give up on an item.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let settings: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        settings.validate().map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        Ok(settings)
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero list timeout or an invalid retry
    /// policy.
    pub fn validate(&self) -> Result<()> {
        if self.list_timeout_secs == 0 {
            return Err(Error::Config("list_timeout_secs must be positive".into()));
        }
        self.retry.validate()
    }

    #[must_use]
    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    /// Worker count from the flag, then the settings file, then the default.
    #[must_use]
    pub fn threads(&self, flag: Option<usize>) -> usize {
        resolve_concurrency(flag.or(self.threads).unwrap_or(DEFAULT_CONCURRENCY))
    }

    /// Tracker root from the flag (or `PYISSUES_BASE_URL`), then the
    /// settings file.
    #[must_use]
    pub fn base_url<'a>(&'a self, flag: Option<&'a str>) -> &'a str {
        flag.filter(|url| !url.trim().is_empty())
            .unwrap_or(&self.base_url)
    }
}

/// The global data directory, `~/.pyissues/`.
#[must_use]
pub fn global_data_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(DATA_DIR_NAME))
}

fn resolve_file(explicit: Option<&Path>, env_var: &str, file_name: &str) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    global_data_dir()
        .map(|dir| dir.join(file_name))
        .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))
}

/// Resolve the metadata file path.
///
/// Priority:
/// 1. `explicit_path` (the `--meta` flag)
/// 2. `PYISSUES_META` environment variable
/// 3. `~/.pyissues/meta.json`
///
/// # Errors
///
/// Returns [`Error::Config`] if no home directory can be found.
pub fn resolve_meta_path(explicit_path: Option<&Path>) -> Result<PathBuf> {
    resolve_file(explicit_path, "PYISSUES_META", META_FILE)
}

/// Resolve the archive file path.
///
/// Priority:
/// 1. `explicit_path` (the `--data` flag)
/// 2. `PYISSUES_DATA` environment variable
/// 3. `~/.pyissues/issues.json.gz`
///
/// # Errors
///
/// Returns [`Error::Config`] if no home directory can be found.
pub fn resolve_data_path(explicit_path: Option<&Path>) -> Result<PathBuf> {
    resolve_file(explicit_path, "PYISSUES_DATA", ARCHIVE_FILE)
}

/// Resolve the settings file path (`PYISSUES_CONFIG` or
/// `~/.pyissues/config.json`).
///
/// # Errors
///
/// Returns [`Error::Config`] if no home directory can be found.
pub fn resolve_settings_path() -> Result<PathBuf> {
    resolve_file(None, "PYISSUES_CONFIG", SETTINGS_FILE)
}

/// Load the settings file from its resolved location.
///
/// # Errors
///
/// Returns an error if the path cannot be resolved or the file is invalid.
pub fn load_settings() -> Result<Settings> {
    Settings::load(&resolve_settings_path()?)
}
