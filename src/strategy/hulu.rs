//! Hulu: the timeline playhead gains an ad class while an ad plays.
//!
//! Detection is push driven. The controller observes the playhead's
//! `class` attribute and feeds every change through here. Entering an ad
//! accelerates and mutes; leaving it restores normal playback.
//!
//! Unlike the other strategies this one never counts a blocked ad.

use super::{AdStrategy, Correction, DetectionSignal, Trigger, TriggerKind};
use crate::page::Document;
use crate::provider::Provider;

const PLAYHEAD: &str = ".Timeline__playhead";
const AD_CLASS: &str = "Timeline__playhead--ad";

pub struct HuluStrategy {
    rate: f64,
}

impl HuluStrategy {
    #[must_use]
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl AdStrategy for HuluStrategy {
    fn provider(&self) -> Provider {
        Provider::Hulu
    }

    fn trigger(&self) -> TriggerKind {
        TriggerKind::Mutation
    }

    fn observe_selector(&self) -> Option<&'static str> {
        Some(PLAYHEAD)
    }

    fn counts_blocks(&self) -> bool {
        false
    }

    fn detect(&self, _page: &dyn Document, trigger: &Trigger) -> DetectionSignal {
        match trigger {
            Trigger::Mutation(record) if record.has_class(AD_CLASS) => DetectionSignal::ad(None),
            _ => DetectionSignal::NONE,
        }
    }

    fn correction(&self, signal: &DetectionSignal) -> Option<Correction> {
        if signal.is_ad_playing {
            Some(Correction::Accelerate {
                rate: self.rate,
                volume: 0.0,
            })
        } else {
            Some(Correction::Restore)
        }
    }
}
