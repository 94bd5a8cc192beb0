//! Defines the core data structures used by the story slide.
//!
//! This includes the story items and ordered story list supplied by the host,
//! the media currently mounted in the slide, and the loader overlay styling.
//! Story items are typically deserialized from the host's JSON story list.

use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use log::{debug, info, trace};

use super::errors::StoryError;

/// Loader palette used when no loader colour is configured.
pub const DEFAULT_LOADER_COLORS: [&str; 6] = ["#F7B801", "#F18701", "#F35B04", "#F5301E", "#C81D4E", "#8F1D4E"];

/// Identifier of a story. JSON ids may be strings or numbers; both are kept as text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(from = "RawStoryId")]
pub struct StoryId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStoryId {
    Text(String),
    Number(i64),
}

impl From<RawStoryId> for StoryId {
    fn from(raw: RawStoryId) -> Self {
        match raw {
            RawStoryId::Text(s) => StoryId(s),
            RawStoryId::Number(n) => StoryId(n.to_string()),
        }
    }
}

impl StoryId {
    pub fn new(id: impl Into<String>) -> Self {
        StoryId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoryId {
    fn from(id: &str) -> Self {
        StoryId(id.to_string())
    }
}

/// Kind of media a story shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Image,
    Video,
}

/// Opaque asset reference of a story.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StorySource {
    /// A remote asset with an optional set of request headers.
    Remote {
        uri: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    /// An asset bundled with the host, referenced by number. It has no fetchable locator.
    Bundled(u64),
}

impl StorySource {
    pub fn remote(uri: impl Into<String>) -> Self {
        StorySource::Remote { uri: uri.into(), headers: HashMap::new() }
    }

    /// Returns the locator that can be handed to the asset cache, if any.
    /// Bundled assets and remote sources with an empty uri have none.
    pub fn locator(&self) -> Option<&str> {
        match self {
            StorySource::Remote { uri, .. } if !uri.trim().is_empty() => Some(uri.as_str()),
            _ => None,
        }
    }

    /// Request headers to send when fetching this source. `None` for bundled
    /// assets and remote sources without headers.
    pub fn headers(&self) -> Option<&HashMap<String, String>> {
        match self {
            StorySource::Remote { headers, .. } if !headers.is_empty() => Some(headers),
            _ => None,
        }
    }
}

/// A single story in the host's list. Read-only to the slide.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct StoryItem {
    pub id: StoryId,
    #[serde(rename = "mediaType", default)]
    pub media_type: MediaType,
    pub source: StorySource,
    /// Display time of the story. Wins over what the media reports; for videos a
    /// configured override wins over it. Negative values are treated as absent.
    #[serde(rename = "animationDuration", default, deserialize_with = "deserialize_millis")]
    pub animation_duration: Option<Duration>,
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    // Negative or non-finite durations are treated as absent.
    let Some(ms) = Option::<f64>::deserialize(deserializer)?.filter(|ms| ms.is_finite() && *ms >= 0.0) else {
        return Ok(None);
    };
    Duration::try_from_secs_f64(ms / 1000.0)
        .map(Some)
        .map_err(|e| serde::de::Error::custom(format!("animationDuration {} ms out of range: {}", ms, e)))
}

impl StoryItem {
    pub fn is_video(&self) -> bool {
        self.media_type == MediaType::Video
    }
}

/// Ordered story list; insertion order is presentation order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoryList {
    items: Vec<StoryItem>,
}

impl StoryList {
    /// Builds a list, rejecting duplicate identifiers.
    pub fn new(items: Vec<StoryItem>) -> Result<Self, StoryError> {
        let mut seen = HashSet::new();
        for item in &items {
            if !seen.insert(&item.id) {
                return Err(StoryError::DuplicateId(item.id.to_string()));
            }
        }
        debug!("Built story list with {} item(s).", items.len());
        Ok(Self { items })
    }

    pub fn from_json_str(json: &str) -> Result<Self, StoryError> {
        let items: Vec<StoryItem> = serde_json::from_str(json)?;
        Self::new(items)
    }

    #[must_use = "loading the story list can fail; the Result must be handled"]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoryError> {
        let path = path.as_ref();
        info!("Loading story list from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Finds a story by identifier, returning its position as well.
    pub fn find(&self, id: &StoryId) -> Option<(usize, &StoryItem)> {
        let found = self.items.iter().enumerate().find(|(_, item)| &item.id == id);
        trace!("Looking up story '{}': found={}", id, found.is_some());
        found
    }

    /// The story presented right after the one at `index`.
    pub fn successor(&self, index: usize) -> Option<&StoryItem> {
        self.items.get(index + 1)
    }

    pub fn items(&self) -> &[StoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// What the slide currently has instantiated in its media pane.
/// Replaced wholesale, never mutated in place.
#[derive(Clone, Debug, PartialEq)]
pub struct MountedMedia {
    pub item: StoryItem,
    pub is_video: bool,
    /// Bumped on every replacement; load reports carry it so stale ones can be told apart.
    pub generation: u64,
}

impl MountedMedia {
    pub fn new(item: StoryItem, generation: u64) -> Self {
        let is_video = item.is_video();
        Self { item, is_video, generation }
    }
}

/// Colours of the loading overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct LoaderStyle {
    pub colors: Vec<String>,
    /// `None` means transparent.
    pub background: Option<String>,
}

impl LoaderStyle {
    pub fn new(loader_color: Option<&str>, background: Option<&str>) -> Self {
        let colors = match loader_color {
            Some(color) => vec![color.to_string()],
            None => DEFAULT_LOADER_COLORS.iter().map(|c| c.to_string()).collect(),
        };
        Self { colors, background: background.map(str::to_string) }
    }
}
