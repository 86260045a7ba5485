//! Scenario replay.
//!
//! Drives a real [`Controller`] against a [`LivePage`] whose markup changes
//! on a timeline, so strategies can be exercised without a browser.
//!
//! ```toml
//! url = "https://www.primevideo.com/detail/x"
//! tick_ms = 250
//! duration_ms = 6000
//!
//! [[frames]]
//! at_ms = 0
//! html = '<video id="v"></video>'
//!
//! [[frames]]
//! at_ms = 2000
//! html = '<video id="v"></video><span class="atvwebplayersdk-ad-timer-text">0:30</span>'
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::config::{ControllerConfig, Settings, StaticSettings};
use crate::controller::{AdPhase, Controller};
use crate::error::{AdSkipError, Result};
use crate::page::{LivePage, PlaybackSurface};
use crate::provider::Provider;
use crate::stats::{ChannelSink, Statistics, StatsAggregator, StatsReporter};

fn default_tick_ms() -> u64 {
    250
}

/// One markup change.
#[derive(Debug, Clone, Deserialize)]
pub struct Frame {
    /// Offset from scenario start.
    pub at_ms: u64,
    pub html: String,
}

/// A scripted page session.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub url: String,
    /// Playback progress cadence.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    pub duration_ms: u64,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub frames: Vec<Frame>,
}

impl Scenario {
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut scenario: Self = toml::from_str(content)?;
        if scenario.tick_ms == 0 {
            return Err(AdSkipError::Scenario("tick_ms must be positive".into()));
        }
        scenario.frames.sort_by_key(|f| f.at_ms);
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Host part of the scenario URL.
    pub fn origin(&self) -> Result<String> {
        let url = url::Url::parse(&self.url)
            .map_err(|e| AdSkipError::Scenario(format!("bad url {}: {e}", self.url)))?;
        url.host_str()
            .map(str::to_string)
            .ok_or_else(|| AdSkipError::Scenario(format!("url has no host: {}", self.url)))
    }
}

/// Final state of a replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub provider: Provider,
    /// Play position of the last active surface.
    pub position: f64,
    pub playback_rate: f64,
    pub volume: f64,
    pub phase: AdPhase,
    /// Surface switches observed by the controller.
    pub surfaces_tracked: usize,
    /// Controller-local tally.
    pub statistics: Statistics,
    /// Total received by the aggregator.
    pub aggregated: Statistics,
}

/// Run a scenario on the tokio clock and report the outcome.
///
/// Under a normal runtime this takes `duration_ms` plus one fast-forward
/// window of wall-clock time. Paused-time tests replay instantly.
///
/// `aggregator` receives every emitted increment; pass a file-backed one
/// to fold the run into persisted totals.
pub async fn run_scenario(
    scenario: &Scenario,
    aggregator: &mut StatsAggregator,
) -> Result<ReplayReport> {
    let origin = scenario.origin()?;
    let first_html = scenario.frames.first().filter(|f| f.at_ms == 0);
    let page = Arc::new(LivePage::new(
        origin,
        first_html.map_or("", |f| f.html.as_str()),
    ));

    let (sink, rx) = ChannelSink::channel();
    let controller = Controller::for_page(
        page.clone(),
        scenario.controller.clone(),
        StatsReporter::new(Arc::new(sink)),
    )?;
    let before = aggregator.totals();
    controller.start(&StaticSettings(scenario.settings)).await;

    let tick = Duration::from_millis(scenario.tick_ms);
    let mut pending = scenario
        .frames
        .iter()
        .skip(usize::from(first_html.is_some()))
        .peekable();
    let mut tracked = Vec::new();
    let mut elapsed = 0;

    while elapsed < scenario.duration_ms {
        tokio::time::sleep(tick).await;
        elapsed += scenario.tick_ms;

        while let Some(frame) = pending.next_if(|f| f.at_ms <= elapsed) {
            debug!("Frame at {}ms", frame.at_ms);
            page.set_html(&frame.html);
        }
        if let Some(surface) = page.active_surface() {
            surface.advance(tick);
        }
        // Let listeners react before the next frame lands.
        tokio::task::yield_now().await;

        if let Some(id) = controller.tracked_surface() {
            if tracked.last() != Some(&id) {
                tracked.push(id);
            }
        }
    }

    // Let in-flight restores land before tearing down.
    tokio::time::sleep(scenario.controller.fast_forward_window()).await;
    let statistics = controller.statistics();
    let phase = controller.phase();
    let provider = controller.provider();
    controller.stop();
    drop(controller);
    aggregator.run(rx).await;

    let surface = page.active_surface();
    let after = aggregator.totals();
    Ok(ReplayReport {
        provider,
        position: surface.as_ref().map_or(0.0, |s| s.current_time()),
        playback_rate: surface.as_ref().map_or(1.0, |s| s.playback_rate()),
        volume: surface.as_ref().map_or(1.0, |s| s.volume()),
        phase,
        surfaces_tracked: tracked.len(),
        statistics,
        aggregated: Statistics {
            ads_blocked: after.ads_blocked - before.ads_blocked,
            time_saved: after.time_saved - before.time_saved,
        },
    })
}
