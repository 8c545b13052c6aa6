//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.cadastats.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".cadastats.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Loader settings.
    #[serde(default)]
    pub loader: LoaderSettings,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Base URL or directory holding the JSON extracts.
    #[serde(default = "default_source")]
    pub source: String,

    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// File holding the font-size preference.
    #[serde(default = "default_preferences_file")]
    pub preferences_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            output: default_output(),
            verbose: false,
            preferences_file: default_preferences_file(),
        }
    }
}

fn default_source() -> String {
    "data".to_string()
}

fn default_output() -> String {
    "cadastats_report.md".to_string()
}

fn default_preferences_file() -> String {
    ".cadastats-prefs.json".to_string()
}

/// Data loader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderSettings {
    /// Attempts per resource before serving fallback data.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Backoff unit in milliseconds (attempt n waits n * base_delay_ms).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Overall deadline per resource, retries included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_seconds: Option<u64>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            base_delay_ms: default_base_delay_ms(),
            timeout_seconds: default_timeout(),
            deadline_seconds: None,
        }
    }
}

fn default_retries() -> usize {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_timeout() -> u64 {
    30
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Rows kept in ranking tables.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Include chart data tables.
    #[serde(default = "default_true")]
    pub include_charts: bool,

    /// Include commune map markers.
    #[serde(default = "default_true")]
    pub include_map: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            include_charts: true,
            include_map: true,
        }
    }
}

fn default_top_n() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref source) = args.source {
            self.general.source = source.clone();
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(retries) = args.retries {
            self.loader.retries = retries;
        }
        if let Some(timeout) = args.timeout {
            self.loader.timeout_seconds = timeout;
        }
        if let Some(deadline) = args.deadline {
            self.loader.deadline_seconds = Some(deadline);
        }
        if let Some(top) = args.top {
            self.report.top_n = top;
        }
        if args.no_map {
            self.report.include_map = false;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
