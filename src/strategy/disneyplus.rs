//! Disney+: interstitial badge and countdown, both required.
//!
//! Requiring the badge keeps unrelated timer-like text from triggering a
//! jump.

use super::{jump_for, AdStrategy, Correction, DetectionSignal, Trigger};
use crate::ad_time::parse_ad_time;
use crate::page::Document;
use crate::provider::Provider;

const AD_BADGE: &str = ".overlay_interstitials__badge";
const AD_TIMER: &str = ".overlay_interstitials__content_time_display";

pub struct DisneyPlusStrategy;

impl AdStrategy for DisneyPlusStrategy {
    fn provider(&self) -> Provider {
        Provider::DisneyPlus
    }

    fn detect(&self, page: &dyn Document, _trigger: &Trigger) -> DetectionSignal {
        if page.query(AD_BADGE).is_none() {
            return DetectionSignal::NONE;
        }
        match page.query(AD_TIMER) {
            Some(timer) => DetectionSignal::ad(Some(parse_ad_time(&timer.text))),
            None => DetectionSignal::NONE,
        }
    }

    fn correction(&self, signal: &DetectionSignal) -> Option<Correction> {
        jump_for(signal)
    }
}
