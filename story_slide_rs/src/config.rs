//! Handles application configuration loading and management.
//!
//! This module defines the `AppConfig` struct which holds the story list location,
//! the per-render video duration override, the host's fallback timing, screen
//! dimensions used for layout clamping, prefetch tuning and loader colours.
//! `load_config` reads these settings from the `[settings]` section of an INI file.

use configparser::ini::Ini;
use super::errors::ConfigError;
use log::{info, debug, error};
use std::time::Duration;

const SECTION: &str = "settings";

pub const DEFAULT_DURATION_MS: u64 = 5000;
pub const DEFAULT_SCREEN_WIDTH: f32 = 1080.0;
pub const DEFAULT_SCREEN_HEIGHT: f32 = 1920.0;
pub const DEFAULT_PREFETCH_TIMEOUT_SECS: u64 = 10;

/// Holds the application's configuration parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    /// Path to the JSON file holding the ordered story list.
    pub stories_path: String,
    /// Display duration for video stories. When set it wins over the story's own
    /// duration and what the player reports; when unset videos use those instead.
    pub video_duration: Option<Duration>,
    /// Timing the host falls back to when no duration can be resolved.
    pub default_duration: Duration,
    pub screen_width: f32,
    pub screen_height: f32,
    pub prefetch_timeout: Duration,
    pub loader_color: Option<String>,
    pub loader_background_color: Option<String>,
}

impl AppConfig {
    /// Builds a configuration with defaults for everything except the story list path.
    pub fn with_stories_path(stories_path: impl Into<String>) -> Self {
        Self {
            stories_path: stories_path.into(),
            video_duration: None,
            default_duration: Duration::from_millis(DEFAULT_DURATION_MS),
            screen_width: DEFAULT_SCREEN_WIDTH,
            screen_height: DEFAULT_SCREEN_HEIGHT,
            prefetch_timeout: Duration::from_secs(DEFAULT_PREFETCH_TIMEOUT_SECS),
            loader_color: None,
            loader_background_color: None,
        }
    }
}

/// Loads application configuration from the specified INI file path.
///
/// # Errors
/// Returns `ConfigError` if the file cannot be read, is malformed,
/// if `stories_path` is missing, or if a numeric key holds a non-numeric value.
#[must_use = "loading configuration can fail, the Result must be handled"]
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Attempting to load config from: {}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| {
        error!("Error reading config file '{}': {}", path, e);
        ConfigError::Io(e)
    })?;
    let config = parse_config(&contents)?;
    info!("Configuration loaded successfully from {}: {:?}", path, config);
    Ok(config)
}

/// Parses configuration from INI text. Split from `load_config` so the
/// parsing rules can be exercised without touching the filesystem.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let mut config_parser = Ini::new();
    config_parser.read(contents.to_string()).map_err(|e| {
        error!("Error parsing config: {}", e);
        ConfigError::Parse(e)
    })?;

    let get_optional = |key_name: &str| {
        config_parser.get(SECTION, key_name).filter(|v| !v.trim().is_empty())
    };

    let get_u64 = |key_name: &str| -> Result<Option<u64>, ConfigError> {
        match get_optional(key_name) {
            Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|e| {
                error!("Invalid integer '{}' for key '{}': {}", raw, key_name, e);
                ConfigError::InvalidValue { key: key_name.to_string(), message: e.to_string() }
            }),
            None => Ok(None),
        }
    };

    let get_f32 = |key_name: &str| -> Result<Option<f32>, ConfigError> {
        match get_optional(key_name) {
            Some(raw) => raw.trim().parse::<f32>().map(Some).map_err(|e| {
                error!("Invalid number '{}' for key '{}': {}", raw, key_name, e);
                ConfigError::InvalidValue { key: key_name.to_string(), message: e.to_string() }
            }),
            None => Ok(None),
        }
    };

    let stories_path = get_optional("stories_path").ok_or_else(|| {
        error!("Missing configuration key 'stories_path' in section '[{}]'", SECTION);
        ConfigError::MissingKey("stories_path".to_string())
    })?;
    debug!("Loaded config value for key 'stories_path': {}", stories_path);

    let mut config = AppConfig::with_stories_path(stories_path);
    config.video_duration = get_u64("video_duration_ms")?.map(Duration::from_millis);
    if let Some(ms) = get_u64("default_duration_ms")? {
        config.default_duration = Duration::from_millis(ms);
    }
    if let Some(width) = get_f32("screen_width")? {
        config.screen_width = width;
    }
    if let Some(height) = get_f32("screen_height")? {
        config.screen_height = height;
    }
    if let Some(secs) = get_u64("prefetch_timeout_secs")? {
        config.prefetch_timeout = Duration::from_secs(secs);
    }
    config.loader_color = get_optional("loader_color");
    config.loader_background_color = get_optional("loader_background_color");
    debug!("Parsed configuration: {:?}", config);
    Ok(config)
}
