//! Site-specific ad detection.
//!
//! # Architecture
//!
//! - [`AdStrategy`]: one implementation per [`Provider`], detect plus the
//!   correction a positive detection calls for
//! - [`Trigger`]: what woke the controller up (a progress tick or a pushed
//!   mutation), so dispatch does not care which reactivity model fired
//! - [`for_provider`]: static dispatch table, resolved once per page
//!
//! Strategies are stateless. Anything that must survive between checks
//! (latches, pending timers, the Hulu ad phase) lives in the controller.

pub mod disneyplus;
pub mod hulu;
pub mod netflix;
pub mod primevideo;

use std::time::Duration;

use crate::config::ControllerConfig;
use crate::page::{Document, MutationRecord};
use crate::provider::Provider;

pub use disneyplus::DisneyPlusStrategy;
pub use hulu::HuluStrategy;
pub use netflix::NetflixStrategy;
pub use primevideo::PrimeVideoStrategy;

/// Result of running one detection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetectionSignal {
    pub is_ad_playing: bool,
    /// Remaining ad length when the page shows it.
    pub remaining_seconds: Option<u64>,
}

impl DetectionSignal {
    pub const NONE: Self = Self {
        is_ad_playing: false,
        remaining_seconds: None,
    };

    pub fn ad(remaining_seconds: Option<u64>) -> Self {
        Self {
            is_ad_playing: true,
            remaining_seconds,
        }
    }
}

/// Playback mutation requested by a strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Play at `rate` for a fixed wall-clock `window`, then restore 1x.
    FastForward { rate: f64, window: Duration },
    /// Move the play position forward.
    Jump { seconds: u64 },
    /// Enter accelerated playback until told otherwise.
    Accelerate { rate: f64, volume: f64 },
    /// Return to normal rate and full volume.
    Restore,
}

/// Reactivity model a strategy listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Checked on every playback-progress tick.
    Poll,
    /// Driven by pushed structural mutations.
    Mutation,
}

/// A reason to run detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Playback progressed.
    Poll,
    /// An observed element changed.
    Mutation(MutationRecord),
}

impl Trigger {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::Poll => TriggerKind::Poll,
            Trigger::Mutation(_) => TriggerKind::Mutation,
        }
    }
}

/// Provider-specific detection heuristic.
pub trait AdStrategy: Send + Sync {
    fn provider(&self) -> Provider;

    /// Which trigger drives detection.
    fn trigger(&self) -> TriggerKind {
        TriggerKind::Poll
    }

    /// Selector of the element a mutation-driven strategy observes.
    fn observe_selector(&self) -> Option<&'static str> {
        None
    }

    /// Whether a successful correction counts as a blocked ad.
    fn counts_blocks(&self) -> bool {
        true
    }

    /// Inspect the page.
    fn detect(&self, page: &dyn Document, trigger: &Trigger) -> DetectionSignal;

    /// Correction for a signal, `None` when nothing should change.
    fn correction(&self, signal: &DetectionSignal) -> Option<Correction>;
}

/// Build the strategy for a provider.
pub fn for_provider(provider: Provider, config: &ControllerConfig) -> Box<dyn AdStrategy> {
    match provider {
        Provider::Netflix => Box::new(NetflixStrategy::new(
            config.fast_forward_rate,
            config.fast_forward_window(),
        )),
        Provider::PrimeVideo => Box::new(PrimeVideoStrategy),
        Provider::Hulu => Box::new(HuluStrategy::new(config.fast_forward_rate)),
        Provider::DisneyPlus => Box::new(DisneyPlusStrategy),
    }
}

/// Jump correction shared by the countdown-driven strategies.
fn jump_for(signal: &DetectionSignal) -> Option<Correction> {
    match signal.remaining_seconds {
        Some(seconds) if signal.is_ad_playing && seconds > 0 => Some(Correction::Jump { seconds }),
        _ => None,
    }
}
