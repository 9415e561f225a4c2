//! Configuration loading for linefit.
//!
//! Two kinds of configuration live here:
//!
//! - [`ResolverSettings`]: how the resolver behaves, loaded from
//!   `~/.linefit/config.toml` with environment variable overrides.
//! - [`ConfigDocument`]: the observation configuration file (INI format)
//!   whose `*_line_fitting` sections are the recipes being resolved.

mod document;

pub use document::{ConfigDocument, DocumentSection, LineFittingSet, RawEntry};

use linefit_core::LineIdentifier;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Resolver behaviour settings.
///
/// Maps directly to `~/.linefit/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Section whose entries every line-fitting section inherits
    #[serde(default = "default_section")]
    pub default_section: String,

    /// Suffix identifying line-fitting sections
    #[serde(default = "default_section_suffix")]
    pub section_suffix: String,

    /// Resolve the defaults section as a model of its own
    #[serde(default)]
    pub include_default_section: bool,

    /// Lines measured from an external band table that ties may lean on
    /// without being declared in the recipe
    #[serde(default)]
    pub known_lines: Vec<String>,

    /// Species rendered as recombination lines in transition labels
    #[serde(default = "default_recombination_species")]
    pub recombination_species: Vec<String>,

    /// Emitted model format
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Parallel resolution workers (0 = one per available CPU)
    #[serde(default)]
    pub workers: usize,
}

fn default_section() -> String {
    "default_line_fitting".into()
}
fn default_section_suffix() -> String {
    "_line_fitting".into()
}
fn default_recombination_species() -> Vec<String> {
    linefit_core::RECOMBINATION_SPECIES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Serialization format for emitted models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Toml,
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "toml" => Ok(OutputFormat::Toml),
            other => Err(ConfigError::ValidationError(format!(
                "unknown output format '{other}' (expected json or toml)"
            ))),
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            default_section: default_section(),
            section_suffix: default_section_suffix(),
            include_default_section: false,
            known_lines: vec![],
            recombination_species: default_recombination_species(),
            output_format: OutputFormat::default(),
            workers: 0,
        }
    }
}

impl ResolverSettings {
    /// Load settings from the default path (~/.linefit/config.toml).
    ///
    /// Environment variables override the file:
    /// - `LINEFIT_DEFAULT_SECTION`
    /// - `LINEFIT_OUTPUT_FORMAT`
    /// - `LINEFIT_WORKERS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_from(&config_path)
    }

    /// Load settings from a specific file path, then apply environment
    /// overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            tracing::debug!("No settings file found at {}, using defaults", path.display());
            Self::default()
        };

        settings.apply_env(|name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(section) = var("LINEFIT_DEFAULT_SECTION") {
            self.default_section = section;
        }
        if let Some(format) = var("LINEFIT_OUTPUT_FORMAT") {
            self.output_format = format.parse()?;
        }
        if let Some(workers) = var("LINEFIT_WORKERS") {
            self.workers = workers.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("LINEFIT_WORKERS must be an integer, got '{workers}'"))
            })?;
        }
        Ok(())
    }

    /// Get the settings directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".linefit")
    }

    /// Validate the settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.section_suffix.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "section_suffix cannot be empty".into(),
            ));
        }
        if self.default_section.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "default_section cannot be empty".into(),
            ));
        }
        for label in &self.known_lines {
            LineIdentifier::parse(label).map_err(|e| {
                ConfigError::ValidationError(format!("known_lines: {e}"))
            })?;
        }
        Ok(())
    }

    /// Parsed `known_lines`.
    pub fn known_line_ids(&self) -> Vec<LineIdentifier> {
        self.known_lines
            .iter()
            .filter_map(|l| LineIdentifier::parse(l).ok())
            .collect()
    }

    /// Worker count with `0` resolved to the available parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        }
    }

    /// Generate a default settings TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration syntax error on line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("Section '{name}' declared twice (line {line})")]
    DuplicateSection { name: String, line: usize },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
