// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Kernel configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! num_threads = 4
//! rows_per_task = 32
//! enable_profiling = true
//! ```
//!
//! Epsilon is deliberately absent: it is an argument of every call.

use crate::LayerNormError;
use std::path::Path;

/// Configuration for a [`crate::LayerNorm`] instance.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayerNormConfig {
    /// Number of worker threads. `None` runs on the global rayon pool.
    pub num_threads: Option<usize>,
    /// Rows processed by one task. Also the granularity of the private
    /// partial sums combined for the parameter gradients.
    #[serde(default = "default_rows_per_task")]
    pub rows_per_task: usize,
    /// Whether to time each call and log it at debug level.
    #[serde(default = "default_true")]
    pub enable_profiling: bool,
}

fn default_rows_per_task() -> usize {
    32
}

fn default_true() -> bool {
    true
}

impl LayerNormConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, LayerNormError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LayerNormError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, LayerNormError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| LayerNormError::Config(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, LayerNormError> {
        toml::to_string_pretty(self)
            .map_err(|e| LayerNormError::Config(format!("TOML serialise error: {e}")))
    }

    /// Rejects values the kernels cannot work with.
    pub fn validate(&self) -> Result<(), LayerNormError> {
        if self.rows_per_task == 0 {
            return Err(LayerNormError::Config(
                "rows_per_task must be at least 1".to_string(),
            ));
        }
        if self.num_threads == Some(0) {
            return Err(LayerNormError::Config(
                "num_threads must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolves the number of worker threads: `num_threads`, or the size
    /// of the global rayon pool when unset.
    pub fn resolve_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(rayon::current_num_threads)
    }
}

impl Default for LayerNormConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            rows_per_task: default_rows_per_task(),
            enable_profiling: true,
        }
    }
}
