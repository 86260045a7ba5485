//! Host attachment policy.
//!
//! Decides which tabs get a controller. A tab qualifies once its navigation
//! has completed on an allow-listed streaming domain, and only once per
//! tab until the tab is closed.

use std::collections::HashSet;

use tracing::debug;

use crate::provider::Provider;

/// Domains a controller is attached to.
pub const STREAMING_DOMAINS: &[&str] = &[
    "hulu.com",
    "disneyplus.com",
    "netflix.com",
    "amazon.com",
    "primevideo.com",
    "crunchyroll.com",
    "max.com",
];

/// Browser tab identifier.
pub type TabId = u32;

/// Navigation state reported for a tab update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationStatus {
    Loading,
    Complete,
}

/// Outcome of an attach check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachDecision {
    /// Attach a controller; `None` means the page is allow-listed but has
    /// no ad strategy, so the controller will stay idle.
    Attach(Option<Provider>),
    /// Tab already has a controller.
    AlreadyAttached,
    /// Not a streaming page, internal page, or still loading.
    Skip,
}

/// Tracks which tabs already have a controller.
#[derive(Debug, Default)]
pub struct AttachRegistry {
    attached: HashSet<TabId>,
}

impl AttachRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `url` in `tab` should get a controller now.
    ///
    /// A positive decision marks the tab attached.
    pub fn should_attach(
        &mut self,
        tab: TabId,
        url: &str,
        status: NavigationStatus,
    ) -> AttachDecision {
        if status != NavigationStatus::Complete || !is_streaming_url(url) {
            return AttachDecision::Skip;
        }
        if !self.attached.insert(tab) {
            return AttachDecision::AlreadyAttached;
        }
        let provider = Provider::from_url(url);
        debug!("Attaching to tab {tab} ({url}), provider {provider:?}");
        AttachDecision::Attach(provider)
    }

    /// Forget a closed tab.
    pub fn detach(&mut self, tab: TabId) -> bool {
        self.attached.remove(&tab)
    }

    pub fn is_attached(&self, tab: TabId) -> bool {
        self.attached.contains(&tab)
    }
}

/// Whether a URL is an allow-listed streaming page.
pub fn is_streaming_url(url: &str) -> bool {
    if url.starts_with("chrome://") {
        return false;
    }
    STREAMING_DOMAINS.iter().any(|domain| url.contains(domain))
}
