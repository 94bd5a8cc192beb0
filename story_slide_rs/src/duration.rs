//! Resolves how long the mounted media should be displayed.
//!
//! Precedence, highest first: the configured video duration for video stories,
//! the story's own `animation_duration`, then whatever the media reported when it
//! finished loading. `None` means "use the host's default timing".

use std::time::Duration;
use log::trace;

use super::model::StoryItem;

/// Computes the authoritative duration for `mounted`.
///
/// For a video story a configured override wins over everything else. Without
/// one, videos fall through the same chain as images.
pub fn resolve_duration(
    mounted: &StoryItem,
    reported: Option<Duration>,
    video_duration_override: Option<Duration>,
) -> Option<Duration> {
    let video_override = if mounted.is_video() { video_duration_override } else { None };
    let resolved = video_override.or(mounted.animation_duration).or(reported);
    trace!(
        "Resolved duration for story '{}' (video: {}): {:?} (reported: {:?}, override: {:?})",
        mounted.id, mounted.is_video(), resolved, reported, video_duration_override
    );
    resolved
}

/// Maps an unresolved duration to the host's default timing.
pub fn effective_duration(resolved: Option<Duration>, default: Duration) -> Duration {
    resolved.unwrap_or(default)
}
