//! Versioning and conflict-resolution configuration.
//!
//! Every field has a default so an empty JSON object is a valid config.
//! Unknown fields are rejected to catch typos early.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

const DEFAULT_DELTA_RATIO: f64 = 0.5;
const DEFAULT_MAX_CHAIN_DEPTH: usize = 10;
const DEFAULT_DEVICE_LABEL: &str = "local";

/// Tuning knobs for the version store and the resolution executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VersioningConfig {
    /// A delta is stored only when its encoded size is below
    /// `delta_ratio` times the size of the full content.
    #[serde(default = "default_delta_ratio")]
    pub delta_ratio: f64,
    /// Maximum number of deltas between any version and its full snapshot.
    #[serde(default = "default_max_chain_depth")]
    pub max_chain_depth: usize,
    /// Require a field choice for every conflicting field before a merge commits.
    #[serde(default = "default_true")]
    pub require_full_merge_coverage: bool,
    /// Label recorded as `changed_by` on versions made by this device.
    #[serde(default = "default_device_label")]
    pub device_label: String,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            delta_ratio: DEFAULT_DELTA_RATIO,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            require_full_merge_coverage: true,
            device_label: DEFAULT_DEVICE_LABEL.to_string(),
        }
    }
}

impl VersioningConfig {
    /// Set the device label
    #[must_use]
    pub fn with_device_label(mut self, label: impl Into<String>) -> Self {
        self.device_label = label.into();
        self
    }

    /// Set the maximum delta chain depth
    #[must_use]
    pub const fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    /// Parse and validate a config from a JSON payload.
    pub fn from_json(payload: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(payload)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Reject values the version store cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.delta_ratio > 0.0 && self.delta_ratio <= 1.0) {
            return Err(Error::InvalidInput(format!(
                "delta_ratio must be in (0, 1], got {}",
                self.delta_ratio
            )));
        }
        if self.max_chain_depth == 0 {
            return Err(Error::InvalidInput(
                "max_chain_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.device_label = normalize_text_option(Some(std::mem::take(&mut self.device_label)))
            .unwrap_or_else(|| DEFAULT_DEVICE_LABEL.to_string());
    }
}

const fn default_delta_ratio() -> f64 {
    DEFAULT_DELTA_RATIO
}

const fn default_max_chain_depth() -> usize {
    DEFAULT_MAX_CHAIN_DEPTH
}

const fn default_true() -> bool {
    true
}

fn default_device_label() -> String {
    DEFAULT_DEVICE_LABEL.to_string()
}
