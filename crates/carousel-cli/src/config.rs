//! Configuration file
//!
//! Looked up in order: `--file`, `$CAROUSEL_CONFIG`, `./carousel.yaml`.
//! A missing default file means all defaults; a missing explicit file is an
//! error. Command line flags override file values.

use crate::cli::TransitionArgs;
use anyhow::Context;
use carousel_core::{RetryPolicy, StepOptions, TransitionConfig};
use carousel_terraform::BinaryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "CAROUSEL_CONFIG";

/// File looked for in the current directory
pub const DEFAULT_CONFIG_FILE: &str = "carousel.yaml";

/// Whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarouselConfig {
    /// Terraform workspace; empty keeps the current one
    pub workspace: String,
    /// How to run terraform
    pub binary: BinaryConfig,
    /// Step scheduling
    pub rollout: RolloutConfig,
    /// Host validation
    pub validator: ValidatorConfig,
    /// Step re-application
    pub retry: RetryConfig,
}

/// Step scheduling settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Maximum nodes changed per step
    pub batch_size: usize,
    /// Skip band
    pub skip_first_n: usize,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            skip_first_n: 0,
        }
    }
}

/// Host validation settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Program run for every new host; none accepts all hosts
    pub command: Option<String>,
    /// Arguments placed before the hostname
    pub args: Vec<String>,
}

/// Step re-application settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Applications per step before giving up; none retries forever
    pub max_attempts: Option<u32>,
    /// Pause between applications
    pub backoff_ms: u64,
}

/// Pick the configuration file to read
///
/// Returns the path and whether it was asked for explicitly.
#[must_use]
pub fn resolve_path(explicit: Option<&Path>, env: Option<String>) -> (PathBuf, bool) {
    if let Some(path) = explicit {
        return (path.to_path_buf(), true);
    }
    match env.filter(|value| !value.trim().is_empty()) {
        Some(value) => (PathBuf::from(value), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    }
}

impl CarouselConfig {
    /// Parse YAML text
    ///
    /// # Errors
    /// Malformed YAML or unknown values
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("failed to parse configuration")
    }

    /// Load from `explicit`, `$CAROUSEL_CONFIG` or `./carousel.yaml`
    ///
    /// # Errors
    /// An explicitly named file that cannot be read, or malformed content
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let (path, required) = resolve_path(explicit, std::env::var(CONFIG_ENV).ok());
        Self::load_from(&path, required)
    }

    /// Load from `path`; a missing optional file gives defaults
    ///
    /// # Errors
    /// Unreadable required file, or malformed content
    pub fn load_from(path: &Path, required: bool) -> anyhow::Result<Self> {
        if !required && !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let config = Self::from_yaml(&text).with_context(|| format!("in {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Apply command line overrides
    pub fn apply_overrides(&mut self, args: &TransitionArgs) {
        if let Some(size) = args.batch_size {
            self.rollout.batch_size = size;
        }
        if let Some(n) = args.skip_first_n {
            self.rollout.skip_first_n = n;
        }
        if let Some(command) = &args.validator {
            self.validator.command = Some(command.clone());
            self.validator.args.clear();
        }
        if args.max_attempts.is_some() {
            self.retry.max_attempts = args.max_attempts;
        }
    }

    /// Scheduler options
    #[must_use]
    pub fn step_options(&self) -> StepOptions {
        StepOptions::new()
            .with_batch_size(self.rollout.batch_size)
            .with_skip_first_n(self.rollout.skip_first_n)
    }

    /// Executor configuration
    #[must_use]
    pub fn transition_config(&self, dry_run: bool) -> TransitionConfig {
        let mut retry = RetryPolicy::unbounded().with_backoff(Duration::from_millis(self.retry.backoff_ms));
        if let Some(max) = self.retry.max_attempts {
            retry = retry.with_max_attempts(max);
        }
        TransitionConfig { dry_run, retry }
    }
}
