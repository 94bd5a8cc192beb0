//! Derives whether media playback is suspended.

/// A slide never plays while backgrounded, even if the host did not pause it.
pub fn suspend_playback(is_paused: bool, is_active: bool) -> bool {
    is_paused || !is_active
}
