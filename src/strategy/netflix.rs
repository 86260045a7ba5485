//! Netflix: ad-break marker plus a blind fast-forward window.
//!
//! The page does not expose the remaining ad length, so a marker sighting
//! plays the video at a high rate for a fixed wall-clock window. Short ads
//! are covered entirely; long ones may leave a tail.

use std::time::Duration;

use super::{AdStrategy, Correction, DetectionSignal, Trigger};
use crate::page::Document;
use crate::provider::Provider;

const AD_MARKER: &str = ".ad-break-indicator";

pub struct NetflixStrategy {
    rate: f64,
    window: Duration,
}

impl NetflixStrategy {
    #[must_use]
    pub fn new(rate: f64, window: Duration) -> Self {
        Self { rate, window }
    }
}

impl AdStrategy for NetflixStrategy {
    fn provider(&self) -> Provider {
        Provider::Netflix
    }

    fn detect(&self, page: &dyn Document, _trigger: &Trigger) -> DetectionSignal {
        if page.query(AD_MARKER).is_some() {
            DetectionSignal::ad(None)
        } else {
            DetectionSignal::NONE
        }
    }

    fn correction(&self, signal: &DetectionSignal) -> Option<Correction> {
        signal.is_ad_playing.then_some(Correction::FastForward {
            rate: self.rate,
            window: self.window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::LivePage;

    fn strategy() -> NetflixStrategy {
        NetflixStrategy::new(16.0, Duration::from_secs(3))
    }

    #[test]
    fn detects_marker() {
        let page = LivePage::new(
            "www.netflix.com",
            r#"<video id="v"></video><div class="ad-break-indicator">Ad</div>"#,
        );
        let signal = strategy().detect(&page, &Trigger::Poll);
        assert!(signal.is_ad_playing);
        assert_eq!(signal.remaining_seconds, None);
        assert_eq!(
            strategy().correction(&signal),
            Some(Correction::FastForward {
                rate: 16.0,
                window: Duration::from_secs(3)
            })
        );
    }

    #[test]
    fn no_marker_no_correction() {
        let page = LivePage::new("www.netflix.com", r#"<video id="v"></video>"#);
        let signal = strategy().detect(&page, &Trigger::Poll);
        assert_eq!(signal, DetectionSignal::NONE);
        assert_eq!(strategy().correction(&signal), None);
    }
}
