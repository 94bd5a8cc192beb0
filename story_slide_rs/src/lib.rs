//! Drives one slide of a story viewer.
//!
//! A slide mounts the media of whichever story the host marks as active, shows
//! a loader until that media is ready, tells the host how long to display it,
//! prefetches the next image, and suspends playback while paused or in the
//! background. `controller::SlideController` is the entry point; the other
//! modules are the pieces it is built from.

pub mod config;
pub mod controller;
pub mod duration;
pub mod errors;
pub mod media_pipeline;
pub mod model;
pub mod pause;
pub mod prefetch;
pub mod signals;
pub mod state_manager;

pub use controller::{HostNotification, SlideController, SlideEvent, SlideHandle, SlideHost, SlideOptions};
pub use model::{MediaType, MountedMedia, StoryId, StoryItem, StoryList, StorySource};
pub use signals::HostSignals;
