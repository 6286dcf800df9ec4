//! Profile configuration for the submit and status tools.
//!
//! Values are merged from an optional user-level file
//! (`~/.config/uge-profile/config.toml`) and a local `uge-profile.toml` in
//! the working directory, with the local file taking priority. Both tools
//! receive the loaded configuration by value; nothing reads it from global
//! state afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// How to treat an `EXIT_STATUS` marker with an unrecognized code when the
/// status engine falls back to reading the job's output log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogStatusPolicy {
    /// Keep reporting the job as running; the log may still be in flight.
    #[default]
    AssumeRunning,
    /// Fail the status query so the unrecognized marker is investigated.
    Error,
}

/// Configuration for both profile tools
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Threads requested when the job metadata does not specify any
    pub default_threads: u32,

    /// Memory in MB requested when the job metadata does not specify any
    pub default_mem_mb: u64,

    /// Directory that per-rule scheduler logs are written under
    pub log_dir: PathBuf,

    /// Queue submitted to when the job metadata does not specify one
    /// (empty disables the `-q` flag)
    pub default_queue: String,

    /// Write diagnostics about retried and demoted status queries to stderr
    pub log_status_checks: bool,

    /// Seconds to wait before consulting `qacct`, whose accounting records
    /// lag behind live status by a bounded delay
    pub latency_wait_secs: u64,

    /// Maximum number of `qstat` attempts per status query
    pub max_status_checks: u32,

    /// Seconds to sleep between `qstat` attempts
    pub wait_between_tries_secs: f64,

    /// Policy for an unrecognized `EXIT_STATUS` code in the job log
    pub on_unknown_log_status: LogStatusPolicy,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            default_threads: 1,
            default_mem_mb: 1000,
            log_dir: PathBuf::from("logs/cluster"),
            default_queue: String::new(),
            log_status_checks: false,
            latency_wait_secs: 45,
            max_status_checks: 3,
            wait_between_tries_secs: 5.0,
            on_unknown_log_status: LogStatusPolicy::AssumeRunning,
        }
    }
}

/// Locations a profile configuration file may live at, lowest priority first.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Per-user configuration file
    pub user: Option<PathBuf>,
    /// Configuration file in the working directory
    pub local: PathBuf,
}

impl ConfigPaths {
    pub fn new() -> Self {
        let user = env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".config/uge-profile/config.toml"));
        Self {
            user,
            local: PathBuf::from("uge-profile.toml"),
        }
    }

    /// Paths that exist on disk, lowest priority first.
    pub fn existing_paths(&self) -> Vec<&PathBuf> {
        self.user
            .iter()
            .chain(std::iter::once(&self.local))
            .filter(|p| p.exists())
            .collect()
    }
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileConfig {
    /// Load configuration from the standard paths and validate it.
    pub fn load() -> Result<Self> {
        let paths = ConfigPaths::new();
        let files: Vec<PathBuf> = paths.existing_paths().into_iter().cloned().collect();
        let config = Self::load_from_files(&files)?;
        if let Err(errors) = config.validate() {
            anyhow::bail!("invalid profile configuration: {}", errors.join("; "));
        }
        Ok(config)
    }

    /// Load configuration by merging the given files in order; later files
    /// override earlier ones key by key. Missing files are skipped and an
    /// empty list yields the defaults.
    pub fn load_from_files(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = toml::Value::Table(toml::value::Table::new());
        for path in paths {
            let Ok(contents) = fs::read_to_string(path) else {
                continue;
            };
            let value: toml::Value = toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            merge_toml(&mut merged, value);
        }
        merged
            .try_into()
            .context("invalid profile configuration values")
    }

    /// Check the configuration for values the tools cannot work with.
    /// Returns every problem found rather than stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.default_threads == 0 {
            errors.push("default_threads must be at least 1".to_string());
        }
        if self.default_mem_mb == 0 {
            errors.push("default_mem_mb must be at least 1".to_string());
        }
        if self.max_status_checks == 0 {
            errors.push("max_status_checks must be at least 1".to_string());
        }
        if !self.wait_between_tries_secs.is_finite() || self.wait_between_tries_secs < 0.0 {
            errors.push("wait_between_tries_secs must be a non-negative number".to_string());
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize configuration")
    }

    /// Render a commented default configuration file.
    pub fn generate_default_config() -> String {
        let body = Self::default().to_toml().unwrap_or_default();
        format!("# uge-profile configuration\n{}", body)
    }
}

fn merge_toml(base: &mut toml::Value, other: toml::Value) {
    match (base, other) {
        (toml::Value::Table(base_table), toml::Value::Table(other_table)) => {
            for (key, value) in other_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base_slot, other) => *base_slot = other,
    }
}
