// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Compiler configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory
pub const CONFIG_FILE: &str = "polyframe-compile.toml";

/// Which compiler artifact to drive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backend {
    /// WASI build of OpenSCAD, instantiated per request
    Wasm { module: PathBuf },
    /// Native executable, spawned per request
    Process { executable: PathBuf },
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Process {
            executable: PathBuf::from("openscad"),
        }
    }
}

/// Compilation pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Experimental features passed as `--enable=<name>` (e.g. manifold, fast-csg, lazy-union)
    pub features: Vec<String>,
    /// Value of `--export-format`
    pub export_format: String,
    /// Font files mounted into the sandbox, first readable one wins
    pub fonts: Vec<PathBuf>,
    /// Debounce window for parameter edits, in milliseconds
    pub debounce_ms: u64,
    /// Extra stderr substrings treated as harmless
    pub benign_stderr: Vec<String>,
    /// Compiler artifact
    pub backend: Backend,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            features: Vec::new(),
            export_format: "binstl".to_string(),
            fonts: Vec::new(),
            debounce_ms: 400,
            benign_stderr: Vec::new(),
            backend: Backend::default(),
        }
    }
}

impl CompilerConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: CompilerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if PathBuf::from(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(module) = var("POLYFRAME_OPENSCAD_WASM") {
            self.backend = Backend::Wasm {
                module: PathBuf::from(module),
            };
        } else if let Some(executable) = var("OPENSCAD_PATH") {
            self.backend = Backend::Process {
                executable: PathBuf::from(executable),
            };
        }

        if let Some(font) = var("POLYFRAME_FONT") {
            self.fonts.insert(0, PathBuf::from(font));
        }

        if let Some(debounce) = var("POLYFRAME_DEBOUNCE_MS") {
            self.debounce_ms = debounce
                .trim()
                .parse()
                .with_context(|| format!("Invalid POLYFRAME_DEBOUNCE_MS: {debounce}"))?;
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.export_format, "binstl");
        assert_eq!(config.debounce(), Duration::from_millis(400));
        assert!(config.features.is_empty());
    }

    #[test]
    fn test_roundtrip_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(CONFIG_FILE);

        let config = CompilerConfig {
            backend: Backend::Wasm {
                module: PathBuf::from("assets/openscad.wasm"),
            },
            features: vec!["manifold".into()],
            ..CompilerConfig::default()
        };
        config.save(&path)?;

        let loaded = CompilerConfig::from_file(&path)?;
        assert_eq!(loaded.backend, config.backend);
        assert_eq!(loaded.features, vec!["manifold".to_string()]);
        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let config: CompilerConfig = toml::from_str("debounce_ms = 50\n")?;
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.export_format, "binstl");
        Ok(())
    }

    #[test]
    fn test_env_overrides() -> Result<()> {
        let vars: HashMap<&str, &str> = [
            ("POLYFRAME_OPENSCAD_WASM", "/opt/openscad.wasm"),
            ("POLYFRAME_FONT", "/usr/share/fonts/arial.ttf"),
            ("POLYFRAME_DEBOUNCE_MS", "250"),
        ]
        .into_iter()
        .collect();

        let mut config = CompilerConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()))?;

        assert_eq!(
            config.backend,
            Backend::Wasm {
                module: PathBuf::from("/opt/openscad.wasm")
            }
        );
        assert_eq!(config.fonts, vec![PathBuf::from("/usr/share/fonts/arial.ttf")]);
        assert_eq!(config.debounce_ms, 250);
        Ok(())
    }

    #[test]
    fn test_invalid_debounce_is_error() {
        let mut config = CompilerConfig::default();
        let result = config.apply_env(|key| (key == "POLYFRAME_DEBOUNCE_MS").then(|| "soon".into()));
        assert!(result.is_err());
    }
}
