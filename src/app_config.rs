use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::Path;

use crate::subtitle_processor::SubtitleFormat;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Allowed disagreement between a track's duration and its mapped
    /// segment's duration before an anomaly is flagged, in seconds.
    /// Trailing silent frames are common, so a few seconds by default.
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: f64,

    /// Playlists shorter than this never qualify as main-playback candidates
    #[serde(default = "default_min_main_duration_secs")]
    pub min_main_duration_secs: u64,

    /// Upper bound on any single file read; disc-image access can stall
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,

    /// Forced output format; when unset the output follows the input tracks
    #[serde(default)]
    pub output_format: Option<OutputFormat>,

    /// Label prefix for derived chapters ("Chapter 01", "Chapter 02", ...)
    #[serde(default = "default_chapter_label_prefix")]
    pub chapter_label_prefix: String,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_tolerance_secs() -> f64 {
    5.0
}

fn default_min_main_duration_secs() -> u64 {
    300
}

fn default_io_timeout_secs() -> u64 {
    30
}

fn default_chapter_label_prefix() -> String {
    "Chapter".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tolerance_secs: default_tolerance_secs(),
            min_main_duration_secs: default_min_main_duration_secs(),
            io_timeout_secs: default_io_timeout_secs(),
            output_format: None,
            chapter_label_prefix: default_chapter_label_prefix(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file if it exists, otherwise fall back to defaults
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance_secs.is_finite() || self.tolerance_secs < 0.0 {
            return Err(anyhow!(
                "tolerance_secs must be a non-negative number, got {}",
                self.tolerance_secs
            ));
        }
        if self.io_timeout_secs == 0 {
            return Err(anyhow!("io_timeout_secs must be positive"));
        }
        if self.chapter_label_prefix.trim().is_empty() {
            return Err(anyhow!("chapter_label_prefix must not be empty"));
        }
        Ok(())
    }

    /// Anomaly tolerance in milliseconds
    pub fn tolerance_ms(&self) -> u64 {
        (self.tolerance_secs * 1_000.0).round() as u64
    }
}

/// Output subtitle format selection
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    // @format: SubRip
    Srt,
    // @format: Advanced SubStation Alpha
    Ass,
}

impl OutputFormat {
    /// The internal format this selection renders as
    pub fn as_subtitle_format(&self) -> SubtitleFormat {
        match self {
            Self::Srt => SubtitleFormat::Srt,
            Self::Ass => SubtitleFormat::Ass,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Srt => write!(f, "srt"),
            Self::Ass => write!(f, "ass"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "srt" => Ok(Self::Srt),
            "ass" => Ok(Self::Ass),
            _ => Err(anyhow!("Invalid output format: {}", s)),
        }
    }
}

/// Log level configuration
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    #[default]
    Info,
    /// Debug level
    Debug,
    /// Trace level
    Trace,
}

impl LogLevel {
    /// Convert to the log crate's level filter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}
