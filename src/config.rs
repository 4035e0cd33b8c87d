//! Embug Harness Configuration
//!
//! Handles parsing of `embug.toml` configuration files. Every key is optional;
//! command-line flags override whatever the file sets.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::bindings::{ProbeNames, EMBUG_A, EMBUG_B};

/// Name of the configuration file looked up from the working directory.
pub const CONFIG_FILE: &str = "embug.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching embug.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EmbugConfig {
    /// Which libraries to load and from where
    #[serde(default)]
    pub libraries: LibrariesConfig,

    /// How the harness runs
    #[serde(default)]
    pub harness: HarnessConfig,
}

impl EmbugConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: EmbugConfig = toml::from_str(&content)?;
        config.resolve_relative_to(path.parent().unwrap_or(Path::new(".")));
        Ok(config)
    }

    /// Load configuration from the current directory or parents.
    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(ConfigError::Io)?;
        Self::find_and_load(&cwd)
    }

    /// Find and load configuration by searching up from the given directory.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                log::debug!("using config {}", config_path.display());
                return Self::load(&config_path);
            }
            if !dir.pop() {
                // Reached root without finding config
                return Ok(Self::default());
            }
        }
    }

    /// Relative library paths in the file are relative to the file itself.
    fn resolve_relative_to(&mut self, base: &Path) {
        if let Some(dir) = &self.libraries.dir {
            if dir.is_relative() {
                self.libraries.dir = Some(base.join(dir));
            }
        }
        if let Some(event_loop) = &self.libraries.event_loop {
            if event_loop.is_relative() && event_loop.components().count() > 1 {
                self.libraries.event_loop = Some(base.join(event_loop));
            }
        }
    }

    /// Probe library names.
    pub fn probe_names(&self) -> ProbeNames {
        ProbeNames {
            a: self.libraries.a.clone(),
            b: self.libraries.b.clone(),
        }
    }
}

/// Library locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibrariesConfig {
    /// Base directory holding `lib<name>/` subdirectories.
    /// Defaults to the executable's directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Name of binding A
    #[serde(default = "default_a")]
    pub a: String,

    /// Name of binding B
    #[serde(default = "default_b")]
    pub b: String,

    /// Event-loop library loaded by the `em` step (path or soname)
    #[serde(default)]
    pub event_loop: Option<PathBuf>,
}

fn default_a() -> String {
    EMBUG_A.to_string()
}

fn default_b() -> String {
    EMBUG_B.to_string()
}

impl Default for LibrariesConfig {
    fn default() -> Self {
        Self {
            dir: None,
            a: default_a(),
            b: default_b(),
            event_loop: None,
        }
    }
}

/// Harness settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessConfig {
    /// Scenario name or step list, e.g. `a-b-em`
    #[serde(default = "default_scenario")]
    pub scenario: String,

    /// Inputs passed to every call
    #[serde(default = "default_probes")]
    pub probes: Vec<i32>,

    /// Run the scenario in a child process
    #[serde(default)]
    pub isolate: bool,
}

fn default_scenario() -> String {
    "a-b-em".to_string()
}

fn default_probes() -> Vec<i32> {
    vec![5, -1]
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            scenario: default_scenario(),
            probes: default_probes(),
            isolate: false,
        }
    }
}
