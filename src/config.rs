//! Grader configuration.
//!
//! Settings come from an optional YAML file; command-line flags override
//! whatever the file says. Every field has a default, so an empty file (or no
//! file) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::runtime::MAX_EVAL_NESTING;

pub const DEFAULT_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1_000;
/// Every call nests at least one expression, so deeper limits are unreachable.
pub const MAX_CALL_DEPTH: usize = MAX_EVAL_NESTING;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraderConfig {
    /// Per-case time budget.
    pub timeout_ms: u64,
    /// Candidate call depth before a `recursion-error` is raised.
    pub max_call_depth: usize,
    /// Parallel workers for batch grading.
    pub workers: usize,
    /// Suite file; the built-in suite when absent.
    pub suite: Option<PathBuf>,
    /// File extensions treated as submissions during discovery.
    pub extensions: Vec<String>,
    pub color: ColorMode,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            workers: default_workers(),
            suite: None,
            extensions: vec!["calc".to_string()],
            color: ColorMode::Auto,
        }
    }
}

fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

impl GraderConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&text, path)?;
        tracing::debug!(path = %path.display(), ?config, "loaded configuration");
        Ok(config)
    }

    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text).map_err(|source| ConfigError::Format {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// The file at `path` if given, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(invalid("timeout_ms", "must be at least 1 millisecond"));
        }
        if self.max_call_depth == 0 {
            return Err(invalid("max_call_depth", "must be at least 1"));
        }
        if self.max_call_depth > MAX_CALL_DEPTH {
            let reason = format!("must be at most {}", MAX_CALL_DEPTH);
            return Err(invalid("max_call_depth", &reason));
        }
        if self.workers == 0 {
            return Err(invalid("workers", "must be at least 1"));
        }
        if self.extensions.is_empty() {
            return Err(invalid("extensions", "at least one extension is required"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether `path` has one of the configured submission extensions.
    pub fn is_submission(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.trim_start_matches('.') == ext))
    }

    pub fn use_color(&self) -> bool {
        match self.color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => atty::is(atty::Stream::Stdout),
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
