//! Prime Video: the player overlays a countdown while an ad runs.

use super::{jump_for, AdStrategy, Correction, DetectionSignal, Trigger};
use crate::ad_time::parse_ad_time;
use crate::page::Document;
use crate::provider::Provider;

const AD_TIMER: &str = ".atvwebplayersdk-ad-timer-text";

pub struct PrimeVideoStrategy;

impl AdStrategy for PrimeVideoStrategy {
    fn provider(&self) -> Provider {
        Provider::PrimeVideo
    }

    fn detect(&self, page: &dyn Document, _trigger: &Trigger) -> DetectionSignal {
        match page.query(AD_TIMER) {
            Some(timer) => DetectionSignal::ad(Some(parse_ad_time(&timer.text))),
            None => DetectionSignal::NONE,
        }
    }

    fn correction(&self, signal: &DetectionSignal) -> Option<Correction> {
        jump_for(signal)
    }
}
