//! Owns the slide's media state and the reducer that keeps it in sync with the host.
//!
//! `SlideState` holds what is currently mounted, the loading flag and the last
//! resolved duration. Its methods are synchronous and never perform side effects
//! themselves: they return the `Effect`s the runtime must carry out (notify the
//! host, mount new media, prefetch an asset). All calls happen on the single
//! controller task, so no locking is involved.

use std::time::Duration;
use log::{debug, info, trace};

use super::duration::resolve_duration;
use super::model::{MountedMedia, StoryId, StoryItem, StoryList};

/// A side effect requested by the reducer.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Tell the host the mounted media is ready, with its resolved duration.
    NotifyReady(Option<Duration>),
    /// Hand fresh media to the media pane.
    Mount(MountedMedia),
    /// Warm the asset cache for this locator.
    Prefetch(String),
}

#[derive(Debug)]
pub struct SlideState {
    mounted: Option<MountedMedia>,
    loading: bool,
    resolved_duration: Option<Duration>,
    generation: u64,
    video_duration: Option<Duration>,
}

impl SlideState {
    /// Creates the state at mount time from the caller-supplied default story.
    pub fn new(default_story: Option<StoryItem>, video_duration: Option<Duration>) -> Self {
        debug!("Initializing SlideState with default story: {:?}", default_story.as_ref().map(|s| &s.id));
        Self {
            mounted: default_story.map(|item| MountedMedia::new(item, 0)),
            loading: true,
            resolved_duration: None,
            generation: 0,
            video_duration,
        }
    }

    pub fn mounted(&self) -> Option<&MountedMedia> {
        self.mounted.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn resolved_duration(&self) -> Option<Duration> {
        self.resolved_duration
    }

    /// Reacts to a new active identifier or to the slide becoming active.
    ///
    /// Re-activating the story that is already mounted and loaded re-announces
    /// readiness instead of reloading. A different story replaces the mounted
    /// media and resets loading. Either way the next story is prefetched when
    /// it is an image with a fetchable source.
    pub fn on_activation_or_identifier_change(
        &mut self,
        active_story: Option<&StoryId>,
        stories: &StoryList,
    ) -> Vec<Effect> {
        let Some(active_id) = active_story else {
            trace!("No active story selected yet.");
            return Vec::new();
        };
        let Some((index, story)) = stories.find(active_id) else {
            debug!("Active story '{}' is not in the story list, ignoring.", active_id);
            return Vec::new();
        };

        let mut effects = Vec::new();
        let already_mounted = self.mounted.as_ref().is_some_and(|m| m.item.id == story.id);
        if already_mounted {
            if self.loading {
                trace!("Story '{}' is still loading; its completion will notify.", story.id);
            } else {
                debug!("Story '{}' already loaded, re-announcing ready with {:?}.", story.id, self.resolved_duration);
                effects.push(Effect::NotifyReady(self.resolved_duration));
            }
        } else {
            self.generation += 1;
            let mounted = MountedMedia::new(story.clone(), self.generation);
            info!(
                "Mounting story '{}' (video: {}, generation: {}).",
                story.id, mounted.is_video, mounted.generation
            );
            self.loading = true;
            self.resolved_duration = None;
            self.mounted = Some(mounted.clone());
            effects.push(Effect::Mount(mounted));
        }

        if let Some(next) = stories.successor(index) {
            match next.source.locator() {
                Some(locator) if !next.is_video() => {
                    trace!("Prefetching next story '{}' from {}.", next.id, locator);
                    effects.push(Effect::Prefetch(locator.to_string()));
                }
                _ => trace!("Next story '{}' is not prefetchable.", next.id),
            }
        }
        effects
    }

    /// Handles the media pane reporting that the mounted media finished loading.
    ///
    /// Reports for a generation other than the mounted one come from media that
    /// has since been replaced and are dropped. When the slide is inactive the
    /// ready notification is held back until it is activated again.
    pub fn on_media_ready(&mut self, generation: u64, reported: Option<Duration>, is_active: bool) -> Vec<Effect> {
        let Some(mounted) = self.mounted.as_ref() else {
            debug!("Media ready reported with nothing mounted, ignoring.");
            return Vec::new();
        };
        if mounted.generation != generation {
            debug!(
                "Dropping stale ready report (generation {}, mounted generation {}).",
                generation, mounted.generation
            );
            return Vec::new();
        }

        self.resolved_duration = resolve_duration(&mounted.item, reported, self.video_duration);
        self.loading = false;
        info!("Story '{}' loaded, duration {:?}.", mounted.item.id, self.resolved_duration);

        if is_active {
            vec![Effect::NotifyReady(self.resolved_duration)]
        } else {
            debug!("Slide inactive; ready notification for '{}' deferred.", mounted.item.id);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MediaType, StorySource};

    fn item(id: &str, media_type: MediaType, uri: Option<&str>, animation_ms: Option<u64>) -> StoryItem {
        StoryItem {
            id: StoryId::new(id),
            media_type,
            source: match uri {
                Some(uri) => StorySource::remote(uri),
                None => StorySource::Bundled(1),
            },
            animation_duration: animation_ms.map(Duration::from_millis),
        }
    }

    fn list() -> StoryList {
        StoryList::new(vec![
            item("a", MediaType::Image, Some("https://cdn.example/a.jpg"), Some(3000)),
            item("b", MediaType::Image, Some("https://cdn.example/b.jpg"), None),
            item("c", MediaType::Video, Some("https://cdn.example/c.mp4"), None),
            item("d", MediaType::Image, None, None),
            item("e", MediaType::Image, Some("https://cdn.example/e.jpg"), None),
        ])
        .unwrap()
    }

    fn id(s: &str) -> StoryId {
        StoryId::new(s)
    }

    fn mount_effect(effects: &[Effect]) -> Option<&MountedMedia> {
        effects.iter().find_map(|e| match e {
            Effect::Mount(m) => Some(m),
            _ => None,
        })
    }

    #[test]
    fn new_state_is_loading_with_default_story() {
        let stories = list();
        let state = SlideState::new(Some(stories.items()[0].clone()), None);
        assert!(state.is_loading());
        assert_eq!(state.mounted().map(|m| m.item.id.clone()), Some(id("a")));
        assert_eq!(state.resolved_duration(), None);
    }

    #[test]
    fn unset_identifier_is_a_no_op() {
        let mut state = SlideState::new(None, None);
        assert!(state.on_activation_or_identifier_change(None, &list()).is_empty());
        assert!(state.mounted().is_none());
    }

    #[test]
    fn unknown_identifier_changes_nothing() {
        let stories = list();
        let mut state = SlideState::new(None, None);
        state.on_activation_or_identifier_change(Some(&id("a")), &stories);
        let generation = state.mounted().unwrap().generation;
        state.on_media_ready(generation, None, true);
        let before = (state.mounted().cloned(), state.is_loading(), state.resolved_duration());

        let effects = state.on_activation_or_identifier_change(Some(&id("zz")), &stories);

        assert!(effects.is_empty());
        assert_eq!((state.mounted().cloned(), state.is_loading(), state.resolved_duration()), before);
    }

    #[test]
    fn replacement_resets_loading_before_any_load() {
        let stories = list();
        let mut state = SlideState::new(None, None);
        state.on_activation_or_identifier_change(Some(&id("a")), &stories);
        let first = state.mounted().unwrap().generation;
        state.on_media_ready(first, None, true);
        assert!(!state.is_loading());

        let effects = state.on_activation_or_identifier_change(Some(&id("b")), &stories);

        assert!(state.is_loading());
        let mounted = mount_effect(&effects).expect("mount effect");
        assert_eq!(mounted.item.id, id("b"));
        assert!(!mounted.is_video);
        assert!(mounted.generation > first);
        assert_eq!(state.mounted(), Some(mounted));
    }

    #[test]
    fn replacement_clears_resolved_duration() {
        let stories = list();
        let mut state = SlideState::new(None, None);
        state.on_activation_or_identifier_change(Some(&id("a")), &stories);
        state.on_media_ready(state.mounted().unwrap().generation, None, true);
        assert_eq!(state.resolved_duration(), Some(Duration::from_millis(3000)));

        state.on_activation_or_identifier_change(Some(&id("b")), &stories);
        assert_eq!(state.resolved_duration(), None);
    }

    #[test]
    fn reactivating_loaded_story_renotifies_without_remount() {
        let stories = list();
        let mut state = SlideState::new(None, None);
        state.on_activation_or_identifier_change(Some(&id("a")), &stories);
        let mounted = state.mounted().cloned().unwrap();
        assert_eq!(
            state.on_media_ready(mounted.generation, None, true),
            vec![Effect::NotifyReady(Some(Duration::from_millis(3000)))]
        );

        let effects = state.on_activation_or_identifier_change(Some(&id("a")), &stories);

        assert_eq!(effects[0], Effect::NotifyReady(Some(Duration::from_millis(3000))));
        assert!(mount_effect(&effects).is_none());
        assert!(!state.is_loading());
        assert_eq!(state.mounted(), Some(&mounted));
    }

    #[test]
    fn reactivating_story_still_loading_waits_for_completion() {
        let stories = list();
        let mut state = SlideState::new(None, None);
        state.on_activation_or_identifier_change(Some(&id("a")), &stories);

        let effects = state.on_activation_or_identifier_change(Some(&id("a")), &stories);

        assert!(!effects.iter().any(|e| matches!(e, Effect::NotifyReady(_) | Effect::Mount(_))));
        assert!(state.is_loading());
    }

    #[test]
    fn default_story_activation_does_not_remount() {
        let stories = list();
        let mut state = SlideState::new(Some(stories.items()[0].clone()), None);
        let effects = state.on_activation_or_identifier_change(Some(&id("a")), &stories);
        assert!(mount_effect(&effects).is_none());
        assert_eq!(state.mounted().unwrap().generation, 0);
    }

    #[test]
    fn ready_while_inactive_is_deferred_until_reactivation() {
        let stories = list();
        let mut state = SlideState::new(None, None);
        state.on_activation_or_identifier_change(Some(&id("b")), &stories);
        let generation = state.mounted().unwrap().generation;

        let effects = state.on_media_ready(generation, Some(Duration::from_millis(1200)), false);
        assert!(effects.is_empty());
        assert!(!state.is_loading());

        let effects = state.on_activation_or_identifier_change(Some(&id("b")), &stories);
        assert_eq!(effects[0], Effect::NotifyReady(Some(Duration::from_millis(1200))));
    }

    #[test]
    fn stale_ready_report_is_dropped() {
        let stories = list();
        let mut state = SlideState::new(None, None);
        state.on_activation_or_identifier_change(Some(&id("a")), &stories);
        let stale = state.mounted().unwrap().generation;
        state.on_activation_or_identifier_change(Some(&id("b")), &stories);

        let effects = state.on_media_ready(stale, Some(Duration::from_secs(9)), true);

        assert!(effects.is_empty());
        assert!(state.is_loading());
        assert_eq!(state.resolved_duration(), None);
    }

    #[test]
    fn video_ready_uses_configured_override() {
        let stories = list();
        let mut state = SlideState::new(None, Some(Duration::from_secs(15)));
        let effects = state.on_activation_or_identifier_change(Some(&id("c")), &stories);
        assert!(mount_effect(&effects).unwrap().is_video);

        let generation = state.mounted().unwrap().generation;
        let effects = state.on_media_ready(generation, Some(Duration::from_secs(42)), true);
        assert_eq!(effects, vec![Effect::NotifyReady(Some(Duration::from_secs(15)))]);
    }

    #[test]
    fn video_ready_without_override_uses_reported() {
        let stories = list();
        let mut state = SlideState::new(None, None);
        state.on_activation_or_identifier_change(Some(&id("c")), &stories);

        let generation = state.mounted().unwrap().generation;
        let effects = state.on_media_ready(generation, Some(Duration::from_secs(42)), true);
        assert_eq!(effects, vec![Effect::NotifyReady(Some(Duration::from_secs(42)))]);
    }

    #[test]
    fn video_animation_duration_applies_without_override() {
        let stories = StoryList::new(vec![item("v", MediaType::Video, Some("https://cdn.example/v.mp4"), Some(6000))]).unwrap();
        let mut state = SlideState::new(None, None);
        state.on_activation_or_identifier_change(Some(&id("v")), &stories);

        let generation = state.mounted().unwrap().generation;
        let effects = state.on_media_ready(generation, Some(Duration::from_secs(42)), true);
        assert_eq!(effects, vec![Effect::NotifyReady(Some(Duration::from_millis(6000)))]);
    }

    #[test]
    fn prefetches_next_image_with_locator() {
        let stories = list();
        let mut state = SlideState::new(None, None);
        let effects = state.on_activation_or_identifier_change(Some(&id("a")), &stories);
        assert!(effects.contains(&Effect::Prefetch("https://cdn.example/b.jpg".to_string())));
    }

    #[test]
    fn prefetch_skipped_for_video_successor() {
        let stories = list();
        let mut state = SlideState::new(None, None);
        let effects = state.on_activation_or_identifier_change(Some(&id("b")), &stories);
        assert!(!effects.iter().any(|e| matches!(e, Effect::Prefetch(_))));
    }

    #[test]
    fn prefetch_skipped_without_locator_or_successor() {
        let stories = list();
        let mut state = SlideState::new(None, None);
        let effects = state.on_activation_or_identifier_change(Some(&id("c")), &stories);
        assert!(!effects.iter().any(|e| matches!(e, Effect::Prefetch(_))));

        let effects = state.on_activation_or_identifier_change(Some(&id("e")), &stories);
        assert!(!effects.iter().any(|e| matches!(e, Effect::Prefetch(_))));
    }

    #[test]
    fn prefetch_issued_even_when_story_already_mounted() {
        let stories = list();
        let mut state = SlideState::new(None, None);
        state.on_activation_or_identifier_change(Some(&id("a")), &stories);
        let effects = state.on_activation_or_identifier_change(Some(&id("a")), &stories);
        assert_eq!(effects, vec![Effect::Prefetch("https://cdn.example/b.jpg".to_string())]);
    }
}
