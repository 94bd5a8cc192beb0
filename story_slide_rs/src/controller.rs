//! Runs one slide: a single task that owns the slide state and reacts to the host.
//!
//! The host mutates its signals from anywhere; media panes report completion
//! from their own tasks. Everything is funneled into the controller task, which
//! is the only place `SlideState` is touched. Effects returned by the reducer are
//! executed there too: host callbacks, publishing the mounted media, and
//! dispatching prefetches.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use log::{debug, info, trace, warn};

use super::config::AppConfig;
use super::media_pipeline::ReadyReporter;
use super::model::{LoaderStyle, MountedMedia, StoryId, StoryItem, StoryList};
use super::pause::suspend_playback;
use super::prefetch::{AssetCache, Prefetcher};
use super::signals::{ActivationGuard, EdgeGuard, SignalReceivers};
use super::state_manager::{Effect, SlideState};

/// Callbacks the slide invokes on its host.
pub trait SlideHost: Send + Sync {
    /// The mounted media is ready; `None` means "use your default timing".
    fn on_load(&self, duration: Option<Duration>);
    /// Layout measurement forwarded from the media pane.
    fn on_layout(&self, height: f32);
}

/// Host callbacks delivered as messages, for hosts that prefer a channel.
#[derive(Clone, Debug, PartialEq)]
pub enum HostNotification {
    Loaded(Option<Duration>),
    Layout(f32),
}

impl SlideHost for mpsc::UnboundedSender<HostNotification> {
    fn on_load(&self, duration: Option<Duration>) {
        if self.send(HostNotification::Loaded(duration)).is_err() {
            trace!("Host notification receiver dropped; load notification discarded.");
        }
    }

    fn on_layout(&self, height: f32) {
        if self.send(HostNotification::Layout(height)).is_err() {
            trace!("Host notification receiver dropped; layout discarded.");
        }
    }
}

/// Messages processed by the controller task besides signal changes.
#[derive(Debug)]
pub enum SlideEvent {
    MediaReady { generation: u64, reported: Option<Duration> },
    Layout { generation: u64, height: f32 },
    SetStories(Arc<StoryList>),
    Shutdown,
}

/// Per-slide settings.
#[derive(Clone, Debug, Default)]
pub struct SlideOptions {
    /// Story mounted before the host selects anything.
    pub default_story: Option<StoryItem>,
    pub video_duration: Option<Duration>,
    pub loader_style: Option<LoaderStyle>,
}

impl SlideOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_story: None,
            video_duration: config.video_duration,
            loader_style: Some(LoaderStyle::new(
                config.loader_color.as_deref(),
                config.loader_background_color.as_deref(),
            )),
        }
    }

    pub fn with_default_story(mut self, story: Option<StoryItem>) -> Self {
        self.default_story = story;
        self
    }
}

/// Handle to a running slide.
pub struct SlideHandle {
    events: mpsc::UnboundedSender<SlideEvent>,
    mounted: watch::Receiver<Option<MountedMedia>>,
    loading: watch::Receiver<bool>,
    suspend: watch::Receiver<bool>,
    loader_style: LoaderStyle,
    task: JoinHandle<()>,
}

impl SlideHandle {
    /// Media currently mounted in the slide; changes on every replacement.
    pub fn mounted(&self) -> watch::Receiver<Option<MountedMedia>> {
        self.mounted.clone()
    }

    /// Loading flag; the loader overlay is visible while it is true.
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.clone()
    }

    /// Whether media playback must be suspended.
    pub fn suspend(&self) -> watch::Receiver<bool> {
        self.suspend.clone()
    }

    pub fn loader_style(&self) -> &LoaderStyle {
        &self.loader_style
    }

    pub fn event_sender(&self) -> mpsc::UnboundedSender<SlideEvent> {
        self.events.clone()
    }

    /// Creates the completion reporter for a mounted media.
    pub fn reporter_for(&self, mounted: &MountedMedia) -> ReadyReporter {
        ReadyReporter::new(mounted.generation, self.events.clone())
    }

    /// Supplies a fresh story list for subsequent lookups.
    pub fn set_stories(&self, stories: Arc<StoryList>) {
        if self.events.send(SlideEvent::SetStories(stories)).is_err() {
            warn!("Slide controller has stopped; story list update ignored.");
        }
    }

    /// Stops the controller task and waits for it to finish.
    pub async fn shutdown(self) {
        let _ = self.events.send(SlideEvent::Shutdown);
        if let Err(e) = self.task.await {
            warn!("Slide controller task ended abnormally: {}", e);
        }
    }
}

pub struct SlideController {
    state: SlideState,
    stories: Arc<StoryList>,
    signals: SignalReceivers,
    events: mpsc::UnboundedReceiver<SlideEvent>,
    host: Arc<dyn SlideHost>,
    prefetcher: Prefetcher,
    mounted_tx: watch::Sender<Option<MountedMedia>>,
    loading_tx: watch::Sender<bool>,
    suspend_tx: watch::Sender<bool>,
    story_guard: EdgeGuard<Option<StoryId>>,
    activation_guard: ActivationGuard,
    is_active: bool,
    is_paused: bool,
}

impl SlideController {
    /// Spawns the controller task on the current tokio runtime.
    pub fn spawn(
        options: SlideOptions,
        stories: Arc<StoryList>,
        signals: SignalReceivers,
        host: Arc<dyn SlideHost>,
        cache: Arc<dyn AssetCache>,
    ) -> SlideHandle {
        let state = SlideState::new(options.default_story, options.video_duration);
        let is_active = *signals.is_active.borrow();
        let is_paused = *signals.paused.borrow();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (mounted_tx, mounted_rx) = watch::channel(state.mounted().cloned());
        let (loading_tx, loading_rx) = watch::channel(state.is_loading());
        let (suspend_tx, suspend_rx) = watch::channel(suspend_playback(is_paused, is_active));

        let controller = SlideController {
            state,
            stories,
            signals,
            events: events_rx,
            host,
            prefetcher: Prefetcher::new(cache),
            mounted_tx,
            loading_tx,
            suspend_tx,
            story_guard: EdgeGuard::new(),
            activation_guard: ActivationGuard::new(),
            is_active,
            is_paused,
        };
        debug!("Spawning slide controller task.");
        let task = tokio::spawn(controller.run());

        SlideHandle {
            events: events_tx,
            mounted: mounted_rx,
            loading: loading_rx,
            suspend: suspend_rx,
            loader_style: options.loader_style.unwrap_or_else(|| LoaderStyle::new(None, None)),
            task,
        }
    }

    async fn run(mut self) {
        info!("Slide controller started with {} story item(s).", self.stories.len());
        // The signals' current values count as the first observation.
        self.observe_active_story();
        self.observe_is_active();
        self.observe_paused();

        loop {
            tokio::select! {
                changed = self.signals.active_story.changed() => {
                    if changed.is_err() {
                        debug!("Host dropped the active story signal.");
                        break;
                    }
                    self.observe_active_story();
                }
                changed = self.signals.is_active.changed() => {
                    if changed.is_err() {
                        debug!("Host dropped the activation signal.");
                        break;
                    }
                    self.observe_is_active();
                }
                changed = self.signals.paused.changed() => {
                    if changed.is_err() {
                        debug!("Host dropped the pause signal.");
                        break;
                    }
                    self.observe_paused();
                }
                event = self.events.recv() => match event {
                    Some(SlideEvent::Shutdown) | None => break,
                    Some(event) => self.handle_event(event),
                },
            }
        }
        info!("Slide controller stopped.");
    }

    fn observe_active_story(&mut self) {
        let active_story = self.signals.active_story.borrow_and_update().clone();
        if self.story_guard.observe(active_story.clone()) {
            debug!("Active story changed to {:?}.", active_story);
            self.synchronize(active_story.as_ref());
        }
    }

    fn observe_is_active(&mut self) {
        let is_active = *self.signals.is_active.borrow_and_update();
        self.is_active = is_active;
        self.publish_suspend();
        if self.activation_guard.observe(is_active) {
            debug!("Slide activated.");
            let active_story = self.signals.active_story.borrow().clone();
            self.synchronize(active_story.as_ref());
        } else if !is_active {
            // Deactivation does not re-run synchronization; a load still in
            // flight completes silently and is announced on reactivation.
            trace!("Slide inactive (loading: {}).", self.state.is_loading());
        }
    }

    fn observe_paused(&mut self) {
        self.is_paused = *self.signals.paused.borrow_and_update();
        self.publish_suspend();
    }

    fn synchronize(&mut self, active_story: Option<&StoryId>) {
        let effects = self.state.on_activation_or_identifier_change(active_story, &self.stories);
        self.publish_loading();
        self.apply(effects);
    }

    fn handle_event(&mut self, event: SlideEvent) {
        match event {
            SlideEvent::MediaReady { generation, reported } => {
                let effects = self.state.on_media_ready(generation, reported, self.is_active);
                self.publish_loading();
                self.apply(effects);
            }
            SlideEvent::Layout { generation, height } => {
                if self.state.mounted().is_some_and(|m| m.generation == generation) {
                    self.host.on_layout(height);
                } else {
                    trace!("Dropping layout from replaced media (generation {}).", generation);
                }
            }
            SlideEvent::SetStories(stories) => {
                debug!("Story list replaced ({} item(s)).", stories.len());
                self.stories = stories;
            }
            SlideEvent::Shutdown => {}
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::NotifyReady(duration) => self.host.on_load(duration),
                Effect::Mount(mounted) => {
                    self.mounted_tx.send_replace(Some(mounted));
                }
                Effect::Prefetch(locator) => self.prefetcher.dispatch(&locator),
            }
        }
    }

    fn publish_loading(&self) {
        let loading = self.state.is_loading();
        self.loading_tx.send_if_modified(|current| {
            let changed = *current != loading;
            *current = loading;
            changed
        });
    }

    fn publish_suspend(&self) {
        let suspend = suspend_playback(self.is_paused, self.is_active);
        self.suspend_tx.send_if_modified(|current| {
            let changed = *current != suspend;
            *current = suspend;
            changed
        });
    }
}
