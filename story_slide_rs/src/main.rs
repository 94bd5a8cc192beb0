use std::sync::Arc;
use std::time::Duration;
use log::{info, warn, debug, trace};
use tokio::sync::{mpsc, watch};

use story_slide_rs::config;
use story_slide_rs::duration::effective_duration;
use story_slide_rs::errors::AppError;
use story_slide_rs::media_pipeline::MediaLoader;
use story_slide_rs::prefetch::HttpAssetCache;
use story_slide_rs::{HostNotification, HostSignals, MountedMedia, SlideController, SlideOptions, StoryId, StoryList};

// --- Constants ---
const DEFAULT_CONFIG_PATH: &str = "/etc/story_slide.conf";
/// How long the host waits for a story to load before moving on.
const LOAD_TIMEOUT_SECONDS: u64 = 30;

/// Waits until the slide has mounted story `id`.
/// Returns false when the slide stopped first.
async fn await_mount(mounted: &mut watch::Receiver<Option<MountedMedia>>, id: &StoryId) -> bool {
    mounted
        .wait_for(|media| media.as_ref().is_some_and(|m| &m.item.id == id))
        .await
        .is_ok()
}

/// Discards notifications already queued. Called once the next story is
/// mounted: anything queued by then belongs to an earlier story.
fn drain_stale(notifications: &mut mpsc::UnboundedReceiver<HostNotification>) -> usize {
    let mut dropped = 0;
    while let Ok(notification) = notifications.try_recv() {
        trace!("Dropping stale notification: {:?}", notification);
        dropped += 1;
    }
    dropped
}

/// Waits for the next ready notification, logging layout reports on the way.
/// Returns `None` when the slide has stopped.
async fn wait_for_load(notifications: &mut mpsc::UnboundedReceiver<HostNotification>) -> Option<Option<Duration>> {
    while let Some(notification) = notifications.recv().await {
        match notification {
            HostNotification::Loaded(duration) => return Some(duration),
            HostNotification::Layout(height) => debug!("Media layout height: {}", height),
        }
    }
    None
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    env_logger::init();
    info!("Starting story_slide_rs...");

    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = config::load_config(&config_path)?;
    let stories = Arc::new(StoryList::from_json_file(&config.stories_path)?);
    if stories.is_empty() {
        warn!("Story list at {} is empty, nothing to show.", config.stories_path);
        return Ok(());
    }

    let cache = HttpAssetCache::new(config.prefetch_timeout)?;
    let signals = HostSignals::new(None, true, false);
    let (host_tx, mut host_rx) = mpsc::unbounded_channel();

    let options = SlideOptions::from_config(&config).with_default_story(stories.items().first().cloned());
    let handle = SlideController::spawn(
        options,
        stories.clone(),
        signals.subscribe(),
        Arc::new(host_tx),
        Arc::new(cache.clone()),
    );
    debug!("Loader colours: {:?}", handle.loader_style());
    let loader = MediaLoader::new(cache.clone(), &config);
    tokio::spawn(loader.follow(handle.mounted(), handle.event_sender()));
    let mut mounted = handle.mounted();

    // Minimal host: show every story once, advancing when its time is up.
    for story in stories.items() {
        info!("Activating story '{}'.", story.id);
        signals.set_active_story(Some(story.id.clone()));
        let wait = async {
            if !await_mount(&mut mounted, &story.id).await {
                return None;
            }
            let dropped = drain_stale(&mut host_rx);
            if dropped > 0 {
                debug!("Dropped {} notification(s) from earlier stories.", dropped);
            }
            wait_for_load(&mut host_rx).await
        };
        match tokio::time::timeout(Duration::from_secs(LOAD_TIMEOUT_SECONDS), wait).await {
            Ok(Some(resolved)) => {
                let shown_for = effective_duration(resolved, config.default_duration);
                info!("Story '{}' ready, showing for {:?}.", story.id, shown_for);
                tokio::time::sleep(shown_for).await;
            }
            Ok(None) => {
                warn!("Slide stopped unexpectedly.");
                break;
            }
            Err(_) => warn!("Story '{}' did not load within {}s, skipping.", story.id, LOAD_TIMEOUT_SECONDS),
        }
    }

    signals.set_active(false);
    handle.shutdown().await;
    cache.clear();
    info!("All stories shown, exiting.");
    Ok(())
}
