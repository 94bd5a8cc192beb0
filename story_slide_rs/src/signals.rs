//! Host-owned signals and the edge guards used to react to them.
//!
//! The host mutates the active story, the activation flag and the pause flag
//! from its own tasks. Each signal travels on a `tokio::sync::watch` channel;
//! the slide controller keeps the last value it observed for every signal and
//! only reacts when a delivered value actually differs from it.

use tokio::sync::watch;
use log::trace;

use super::model::StoryId;

/// Sending side of the three signals, held by the host.
#[derive(Debug)]
pub struct HostSignals {
    active_story: watch::Sender<Option<StoryId>>,
    is_active: watch::Sender<bool>,
    paused: watch::Sender<bool>,
}

/// Receiving side of the signals, handed to one slide controller.
#[derive(Debug, Clone)]
pub struct SignalReceivers {
    pub active_story: watch::Receiver<Option<StoryId>>,
    pub is_active: watch::Receiver<bool>,
    pub paused: watch::Receiver<bool>,
}

impl HostSignals {
    pub fn new(active_story: Option<StoryId>, is_active: bool, paused: bool) -> Self {
        let (active_story, _) = watch::channel(active_story);
        let (is_active, _) = watch::channel(is_active);
        let (paused, _) = watch::channel(paused);
        Self { active_story, is_active, paused }
    }

    pub fn subscribe(&self) -> SignalReceivers {
        SignalReceivers {
            active_story: self.active_story.subscribe(),
            is_active: self.is_active.subscribe(),
            paused: self.paused.subscribe(),
        }
    }

    pub fn set_active_story(&self, id: Option<StoryId>) {
        trace!("Host sets active story: {:?}", id);
        self.active_story.send_replace(id);
    }

    pub fn set_active(&self, is_active: bool) {
        trace!("Host sets slide active: {}", is_active);
        self.is_active.send_replace(is_active);
    }

    pub fn set_paused(&self, paused: bool) {
        trace!("Host sets paused: {}", paused);
        self.paused.send_replace(paused);
    }

    pub fn active_story(&self) -> Option<StoryId> {
        self.active_story.borrow().clone()
    }
}

/// Fires when the observed value differs from the previously observed one.
/// The first observation always fires.
#[derive(Debug, Clone)]
pub struct EdgeGuard<T> {
    last_seen: Option<T>,
}

impl<T: PartialEq> EdgeGuard<T> {
    pub fn new() -> Self {
        Self { last_seen: None }
    }

    pub fn observe(&mut self, value: T) -> bool {
        if self.last_seen.as_ref() == Some(&value) {
            return false;
        }
        self.last_seen = Some(value);
        true
    }
}

impl<T: PartialEq> Default for EdgeGuard<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Edge guard for the activation flag: fires only when the value changed
/// and the new value is `true`. Deactivation updates the last-seen value
/// but never fires.
#[derive(Debug, Clone, Default)]
pub struct ActivationGuard {
    edge: EdgeGuard<bool>,
}

impl ActivationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, is_active: bool) -> bool {
        self.edge.observe(is_active) && is_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_guard_suppresses_repeats() {
        let mut guard = EdgeGuard::new();
        assert!(guard.observe(Some(StoryId::new("a"))));
        assert!(!guard.observe(Some(StoryId::new("a"))));
        assert!(guard.observe(Some(StoryId::new("b"))));
        assert!(guard.observe(None));
        assert!(!guard.observe(None));
    }

    #[test]
    fn activation_guard_fires_on_rising_edge_only() {
        let mut guard = ActivationGuard::new();
        assert!(guard.observe(true));
        assert!(!guard.observe(true));
        assert!(!guard.observe(false));
        assert!(!guard.observe(false));
        assert!(guard.observe(true));
    }

    #[test]
    fn initial_inactive_does_not_fire() {
        let mut guard = ActivationGuard::new();
        assert!(!guard.observe(false));
        assert!(guard.observe(true));
    }

    #[test]
    fn receivers_see_host_updates() {
        let signals = HostSignals::new(None, false, false);
        let receivers = signals.subscribe();
        signals.set_active_story(Some(StoryId::new("x")));
        signals.set_active(true);
        signals.set_paused(true);
        assert_eq!(*receivers.active_story.borrow(), Some(StoryId::new("x")));
        assert!(*receivers.is_active.borrow());
        assert!(*receivers.paused.borrow());
        assert_eq!(signals.active_story(), Some(StoryId::new("x")));
    }
}
