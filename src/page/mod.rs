//! Host document and playback surface abstraction.
//!
//! The controller never touches a browser directly. It sees the page
//! through two narrow traits:
//!
//! - [`Document`]: structural queries, the active video surface and
//!   class-attribute mutation streams
//! - [`PlaybackSurface`]: the video output itself (rate, position, volume)
//!   plus a progress broadcast that stands in for `timeupdate`
//!
//! [`LivePage`] and [`SimulatedSurface`] are in-memory implementations
//! driven by HTML snapshots. They back the `replay` command and the tests.

pub mod live;
pub mod surface;

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;

pub use live::LivePage;
pub use surface::SimulatedSurface;

/// Identity of a playback surface instance.
///
/// Two handles with the same id refer to the same underlying element. A
/// replaced element always gets a fresh id, even if it reuses the DOM id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Snapshot of the first element matching a selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementInfo {
    /// Concatenated text content.
    pub text: String,
    /// Entries of the `class` attribute.
    pub classes: Vec<String>,
}

impl ElementInfo {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// A `class` attribute change on an observed element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Selector the observer was installed with.
    pub selector: String,
    /// Class list after the change.
    pub classes: Vec<String>,
}

impl MutationRecord {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// One playback-progress notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Play position in seconds at the time of the tick.
    pub position: f64,
}

/// The video output element of a page.
///
/// Handles may outlive the element they point at. Callers check
/// [`is_connected`](Self::is_connected) before mutating; writes to a
/// disconnected surface are ignored by implementations.
pub trait PlaybackSurface: Send + Sync {
    fn id(&self) -> SurfaceId;

    /// `false` once the element has been removed from its document.
    fn is_connected(&self) -> bool;

    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64);

    /// Play position in seconds.
    fn current_time(&self) -> f64;
    fn set_current_time(&self, seconds: f64);

    /// Volume in `0.0..=1.0`.
    fn volume(&self) -> f64;
    fn set_volume(&self, volume: f64);

    /// Host-provided "ad is playing" flag, if the page exposes one.
    fn ad_hint(&self) -> Option<bool> {
        None
    }

    /// Subscribe to progress ticks.
    fn subscribe_progress(&self) -> broadcast::Receiver<Progress>;
}

/// A live, mutating document.
pub trait Document: Send + Sync {
    /// Host name of the page (e.g. `www.netflix.com`).
    fn origin(&self) -> String;

    /// Look up the first element matching a CSS selector.
    ///
    /// Invalid selectors behave like a miss.
    fn query(&self, selector: &str) -> Option<ElementInfo>;

    /// Locate the active video surface, if any.
    fn find_surface(&self) -> Option<Arc<dyn PlaybackSurface>>;

    /// Observe `class` changes on the first element matching `selector`.
    ///
    /// Returns `None` when no such element exists right now.
    fn observe(&self, selector: &str) -> Option<broadcast::Receiver<MutationRecord>>;
}
