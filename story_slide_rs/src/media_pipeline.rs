//! The boundary between the slide and the media pane that actually loads content.
//!
//! This module is responsible for:
//! - `ReadyReporter`, the one-shot handle a media pane uses to report that the
//!   mounted media finished loading, and to forward layout measurements.
//! - Layout helpers mirroring how image stories are laid out on screen.
//! - `MediaLoader`, a headless media pane used by the host binary: it downloads
//!   and decodes images, checks that videos are reachable, and tears down
//!   superseded loads.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use log::{debug, error, info, trace};

use super::config::AppConfig;
use super::controller::SlideEvent;
use super::errors::MediaError;
use super::model::MountedMedia;
use super::prefetch::{download, header_map, parse_locator, HttpAssetCache};

/// Image stories are drawn at the screen width with this aspect ratio.
pub const IMAGE_ASPECT_RATIO: f32 = 0.5626;

/// Image layout heights never exceed the screen.
pub fn clamp_layout_height(measured: f32, screen_height: f32) -> f32 {
    measured.min(screen_height)
}

pub fn image_layout_height(screen_width: f32, aspect_ratio: f32) -> f32 {
    screen_width / aspect_ratio
}

/// Videos fill the media pane, so their layout is the full screen height.
/// Not clamped: only image layouts are.
pub fn video_layout_height(screen_height: f32) -> f32 {
    screen_height
}

/// Reports completion for exactly one mounted media.
#[derive(Debug)]
pub struct ReadyReporter {
    generation: u64,
    events: mpsc::UnboundedSender<SlideEvent>,
}

impl ReadyReporter {
    pub fn new(generation: u64, events: mpsc::UnboundedSender<SlideEvent>) -> Self {
        Self { generation, events }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reports a successful load. Consumes the reporter: one report per load.
    pub fn ready(self, reported: Option<Duration>) {
        trace!("Media generation {} ready (reported: {:?}).", self.generation, reported);
        if self.events.send(SlideEvent::MediaReady { generation: self.generation, reported }).is_err() {
            trace!("Slide controller gone; ready report for generation {} dropped.", self.generation);
        }
    }

    pub fn layout(&self, height: f32) {
        if self.events.send(SlideEvent::Layout { generation: self.generation, height }).is_err() {
            trace!("Slide controller gone; layout for generation {} dropped.", self.generation);
        }
    }
}

/// What a successful load produced.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedMedia {
    pub layout_height: f32,
    /// Pixel size of decoded images; `None` for videos, which are never decoded here.
    pub dimensions: Option<(u32, u32)>,
}

/// Headless media pane: loads whatever the slide mounts.
pub struct MediaLoader {
    cache: HttpAssetCache,
    screen_width: f32,
    screen_height: f32,
    current: Option<JoinHandle<()>>,
}

impl MediaLoader {
    pub fn new(cache: HttpAssetCache, config: &AppConfig) -> Self {
        Self {
            cache,
            screen_width: config.screen_width,
            screen_height: config.screen_height,
            current: None,
        }
    }

    /// Starts loading `mounted`, tearing down the previous load first so its
    /// completion can never be reported.
    pub fn load(&mut self, mounted: MountedMedia, reporter: ReadyReporter) {
        if let Some(previous) = self.current.take() {
            if !previous.is_finished() {
                debug!("Aborting superseded media load.");
            }
            previous.abort();
        }
        info!("Loading media for story '{}' (video: {}).", mounted.item.id, mounted.is_video);
        let cache = self.cache.clone();
        let (screen_width, screen_height) = (self.screen_width, self.screen_height);
        self.current = Some(tokio::spawn(async move {
            match load_media(&cache, &mounted, screen_width, screen_height).await {
                Ok(loaded) => {
                    debug!("Loaded story '{}': {:?}", mounted.item.id, loaded);
                    reporter.layout(loaded.layout_height);
                    reporter.ready(None);
                }
                Err(e) => {
                    // No report: the slide keeps showing its loader.
                    error!("Failed to load media for story '{}': {}", mounted.item.id, e);
                }
            }
        }));
    }

    /// Follows the slide's mounted media until the slide stops.
    pub async fn follow(
        mut self,
        mut mounted: watch::Receiver<Option<MountedMedia>>,
        events: mpsc::UnboundedSender<SlideEvent>,
    ) {
        loop {
            let current = mounted.borrow_and_update().clone();
            if let Some(media) = current {
                let reporter = ReadyReporter::new(media.generation, events.clone());
                self.load(media, reporter);
            }
            if mounted.changed().await.is_err() {
                debug!("Slide stopped; media loader exiting.");
                break;
            }
        }
        if let Some(task) = self.current.take() {
            task.abort();
        }
    }
}

/// Loads one mounted media in full.
#[must_use = "loading media can fail; the Result must be handled"]
pub async fn load_media(
    cache: &HttpAssetCache,
    mounted: &MountedMedia,
    screen_width: f32,
    screen_height: f32,
) -> Result<LoadedMedia, MediaError> {
    let locator = mounted.item.source.locator().ok_or_else(|| {
        MediaError::InvalidLocator(format!("story '{}' has no fetchable source", mounted.item.id))
    })?;
    let url = parse_locator(locator)?;
    let headers = header_map(mounted.item.source.headers());

    if mounted.is_video {
        trace!("Checking video source: {}", locator);
        cache.client().get(url).headers(headers).send().await?.error_for_status()?;
        return Ok(LoadedMedia { layout_height: video_layout_height(screen_height), dimensions: None });
    }

    let bytes = match cache.take(locator) {
        Some(bytes) => {
            debug!("Using prefetched bytes for: {}", locator);
            bytes
        }
        None => Arc::new(download(cache.client(), url, headers).await?),
    };
    trace!("Decoding image: {}", locator);
    let img = image::load_from_memory(&bytes)?;
    let layout_height = clamp_layout_height(image_layout_height(screen_width, IMAGE_ASPECT_RATIO), screen_height);
    Ok(LoadedMedia { layout_height, dimensions: Some((img.width(), img.height())) })
}
