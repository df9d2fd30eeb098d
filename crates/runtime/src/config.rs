// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! memory_budget = "64M"
//! enable_profiling = true
//! zero_arenas_on_execute = false
//! disabled_backends = ["npu"]
//! ```

use memory_manager::MemoryBudget;
use std::path::Path;

use crate::RuntimeError;

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// Upper bound on arena bytes across all live contexts (e.g. `"512K"`).
    #[serde(default)]
    pub memory_budget: MemoryBudget,
    /// Whether to record per-instruction timings.
    #[serde(default = "default_true")]
    pub enable_profiling: bool,
    /// Zero every arena before each run.
    #[serde(default)]
    pub zero_arenas_on_execute: bool,
    /// Backend ids hidden from programs loaded by this runtime.
    #[serde(default)]
    pub disabled_backends: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        toml::from_str(toml_str)
            .map_err(|e| RuntimeError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::Config(format!("TOML serialise error: {e}")))
    }

    pub fn is_backend_disabled(&self, backend_id: &str) -> bool {
        self.disabled_backends.iter().any(|id| id == backend_id)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            memory_budget: MemoryBudget::default(),
            enable_profiling: true,
            zero_arenas_on_execute: false,
            disabled_backends: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = RuntimeConfig::default();
        assert_eq!(c.memory_budget, MemoryBudget::from_mb(64));
        assert!(c.enable_profiling);
        assert!(!c.zero_arenas_on_execute);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
memory_budget = "512K"
enable_profiling = false
zero_arenas_on_execute = true
disabled_backends = ["npu", "gpu"]
"#;
        let c = RuntimeConfig::from_toml(toml).unwrap();
        assert_eq!(c.memory_budget.as_bytes(), 512 * 1024);
        assert!(!c.enable_profiling);
        assert!(c.zero_arenas_on_execute);
        assert!(c.is_backend_disabled("npu"));
        assert!(!c.is_backend_disabled("portable"));
    }

    #[test]
    fn test_missing_fields_default() {
        let c = RuntimeConfig::from_toml("").unwrap();
        assert_eq!(c, RuntimeConfig::default());
    }

    #[test]
    fn test_bad_budget_rejected() {
        let err = RuntimeConfig::from_toml(r#"memory_budget = "lots""#).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = RuntimeConfig {
            memory_budget: MemoryBudget::from_kb(256),
            disabled_backends: vec!["npu".into()],
            ..Default::default()
        };
        let toml = c.to_toml().unwrap();
        assert_eq!(RuntimeConfig::from_toml(&toml).unwrap(), c);
    }

    #[test]
    fn test_from_missing_file() {
        let err = RuntimeConfig::from_file(Path::new("/nonexistent/edge-exec.toml")).unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }
}
