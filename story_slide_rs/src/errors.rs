//! Defines the custom error types used throughout the `story_slide_rs` crate.
//!
//! The slide controller itself never fails: unknown identifiers are ignored and
//! prefetch failures are swallowed. Errors only arise at the edges, while loading
//! configuration, reading the story list, or loading media in the reference loader.
//! Each error type implements `Debug`, `Display`, and `std::error::Error`, and
//! provides `From` implementations for the underlying error types.

use std::error::Error as StdError;
use std::fmt;

// --- ConfigError ---
/// Errors related to configuration loading and parsing.
#[must_use = "a configuration error should be handled or propagated"]
#[derive(Debug)]
pub enum ConfigError {
    /// An I/O error occurred while trying to read the configuration file.
    Io(std::io::Error),
    /// An error occurred while parsing the configuration file content.
    Parse(String),
    /// A required configuration key was missing from the file.
    MissingKey(String),
    /// A key was present but its value could not be interpreted.
    InvalidValue { key: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "Configuration parse error: {}", e),
            ConfigError::MissingKey(key) => write!(f, "Missing configuration key: '{}'", key),
            ConfigError::InvalidValue { key, message } => {
                write!(f, "Invalid value for configuration key '{}': {}", key, message)
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

// --- StoryError ---
/// Errors related to building the ordered story list.
#[must_use = "a story list error should be handled or propagated"]
#[derive(Debug)]
pub enum StoryError {
    /// The story list file could not be read.
    Io(std::io::Error),
    /// The story list JSON could not be deserialized.
    Json(serde_json::Error),
    /// Two stories in the same list share an identifier.
    DuplicateId(String),
}

impl fmt::Display for StoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoryError::Io(e) => write!(f, "Story list I/O error: {}", e),
            StoryError::Json(e) => write!(f, "Story list JSON error: {}", e),
            StoryError::DuplicateId(id) => write!(f, "Duplicate story id in list: '{}'", id),
        }
    }
}

impl StdError for StoryError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StoryError::Io(e) => Some(e),
            StoryError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoryError {
    fn from(err: std::io::Error) -> Self { StoryError::Io(err) }
}
impl From<serde_json::Error> for StoryError {
    fn from(err: serde_json::Error) -> Self { StoryError::Json(err) }
}

// --- MediaError ---
/// Errors related to fetching and decoding story media.
#[must_use = "a media error should be handled or propagated"]
#[derive(Debug)]
pub enum MediaError {
    /// An error occurred during the download of media content.
    Download(reqwest::Error),
    /// An error occurred while decoding an image via the `image` crate.
    Image(image::ImageError),
    /// The source locator is not a fetchable URL.
    InvalidLocator(String),
    /// A generic media-related error.
    Generic(String),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::Download(e) => write!(f, "Media download error: {}", e),
            MediaError::Image(e) => write!(f, "Image processing error: {}", e),
            MediaError::InvalidLocator(s) => write!(f, "Invalid media locator: {}", s),
            MediaError::Generic(s) => write!(f, "Media error: {}", s),
        }
    }
}

impl StdError for MediaError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            MediaError::Download(e) => Some(e),
            MediaError::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for MediaError {
    fn from(err: reqwest::Error) -> Self { MediaError::Download(err) }
}
impl From<image::ImageError> for MediaError {
    fn from(err: image::ImageError) -> Self { MediaError::Image(err) }
}
impl From<url::ParseError> for MediaError {
    fn from(err: url::ParseError) -> Self { MediaError::InvalidLocator(err.to_string()) }
}

// --- AppError (Top-level error enum) ---
/// A top-level error type for the host binary.
#[must_use = "an application error should be handled or propagated"]
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Story(StoryError),
    Media(MediaError),
    Generic(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "Application Configuration Error: {}", e),
            AppError::Story(e) => write!(f, "Application Story List Error: {}", e),
            AppError::Media(e) => write!(f, "Application Media Error: {}", e),
            AppError::Generic(s) => write!(f, "Application Error: {}", s),
        }
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::Story(e) => Some(e),
            AppError::Media(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self { AppError::Config(err) }
}
impl From<StoryError> for AppError {
    fn from(err: StoryError) -> Self { AppError::Story(err) }
}
impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self { AppError::Media(err) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_names_the_key() {
        let err = ConfigError::MissingKey("stories_path".to_string());
        assert_eq!(err.to_string(), "Missing configuration key: 'stories_path'");
    }

    #[test]
    fn app_error_keeps_the_source_chain() {
        let err: AppError = StoryError::DuplicateId("s1".to_string()).into();
        assert!(err.to_string().contains("Duplicate story id in list: 's1'"));
        assert!(err.source().is_some());
    }
}
