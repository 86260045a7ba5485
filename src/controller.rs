//! Per-page playback controller.
//!
//! A [`Controller`] owns everything that happens on one page:
//!
//! - a fixed-cadence poll that (re)acquires the active video surface,
//!   because SPA navigation swaps the element without any usable event
//! - a progress listener on the tracked surface, replaced on every switch
//! - for push-driven providers, a single mutation observer installed on a
//!   stable anchor and kept across surface switches
//! - the correction state: the per-ad-break latch, a pending fast-forward
//!   restore, the Hulu ad phase, and the local statistics tally
//!
//! All background tasks hold a weak handle, so dropping the controller or
//! calling [`Controller::stop`] turns any late timer into a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::config::{ControllerConfig, Settings, SettingsStore};
use crate::error::{AdSkipError, Result};
use crate::page::{Document, MutationRecord, PlaybackSurface, Progress, SurfaceId};
use crate::provider::Provider;
use crate::stats::{Statistics, StatsReporter};
use crate::strategy::{self, AdStrategy, Correction, DetectionSignal, Trigger, TriggerKind};

/// Coarse lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStatus {
    /// No surface acquired yet.
    Idle,
    /// A surface is tracked and observed.
    Tracking,
    /// [`Controller::stop`] was called.
    Stopped,
}

/// Sub-state of mutation-driven strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdPhase {
    #[default]
    Normal,
    AdActive,
}

struct PendingRestore {
    surface: SurfaceId,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    surface: Option<Arc<dyn PlaybackSurface>>,
    poll_task: Option<JoinHandle<()>>,
    progress_task: Option<JoinHandle<()>>,
    mutation_task: Option<JoinHandle<()>>,
    restore: Option<PendingRestore>,
    /// Set once the current ad break has been corrected.
    ad_latched: bool,
    phase: AdPhase,
    stats: Statistics,
}

impl State {
    fn abort_tasks(&mut self) {
        for task in [
            self.poll_task.take(),
            self.progress_task.take(),
            self.mutation_task.take(),
            self.restore.take().map(|r| r.handle),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}

struct Inner {
    page: Arc<dyn Document>,
    strategy: Box<dyn AdStrategy>,
    config: ControllerConfig,
    settings: RwLock<Settings>,
    reporter: StatsReporter,
    stopped: AtomicBool,
    state: Mutex<State>,
}

/// Ad-skipping controller for one page.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

impl Controller {
    /// Create a controller for a known provider.
    pub fn new(
        page: Arc<dyn Document>,
        provider: Provider,
        config: ControllerConfig,
        reporter: StatsReporter,
    ) -> Self {
        let strategy = strategy::for_provider(provider, &config);
        Self::with_strategy(page, strategy, config, reporter)
    }

    /// Create a controller, resolving the provider from the page origin.
    pub fn for_page(
        page: Arc<dyn Document>,
        config: ControllerConfig,
        reporter: StatsReporter,
    ) -> Result<Self> {
        let origin = page.origin();
        let provider =
            Provider::from_origin(&origin).ok_or(AdSkipError::UnsupportedOrigin(origin))?;
        Ok(Self::new(page, provider, config, reporter))
    }

    pub fn with_strategy(
        page: Arc<dyn Document>,
        strategy: Box<dyn AdStrategy>,
        config: ControllerConfig,
        reporter: StatsReporter,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                page,
                strategy,
                config,
                settings: RwLock::new(Settings::default()),
                reporter,
                stopped: AtomicBool::new(false),
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Load settings and begin polling for the video surface.
    ///
    /// A failing settings store is logged and the defaults are kept.
    /// Calling `start` twice, or after `stop`, does nothing.
    pub async fn start(&self, store: &dyn SettingsStore) {
        match store.load().await {
            Ok(settings) => self.set_settings(settings),
            Err(e) => warn!("Settings unavailable, keeping defaults: {e}"),
        }

        let inner = &self.inner;
        if inner.is_stopped() {
            return;
        }
        let mut state = inner.lock();
        if state.poll_task.is_some() {
            return;
        }
        state.poll_task = Some(inner.spawn_poll_loop());
        info!(
            "Controller started for {} (poll every {:?})",
            inner.strategy.provider(),
            inner.config.poll_interval()
        );
    }

    /// Cancel polling, listeners and pending restores.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.lock().abort_tasks();
        debug!("Controller for {} stopped", self.inner.strategy.provider());
    }

    /// Run one acquisition pass.
    pub fn refresh_surface(&self) {
        self.inner.refresh_surface();
    }

    /// Run detection and correction for one trigger.
    pub fn dispatch(&self, trigger: &Trigger) {
        self.inner.dispatch(trigger);
    }

    pub fn provider(&self) -> Provider {
        self.inner.strategy.provider()
    }

    pub fn status(&self) -> ControllerStatus {
        if self.inner.is_stopped() {
            ControllerStatus::Stopped
        } else if self.inner.lock().surface.is_some() {
            ControllerStatus::Tracking
        } else {
            ControllerStatus::Idle
        }
    }

    /// Id of the tracked surface.
    pub fn tracked_surface(&self) -> Option<SurfaceId> {
        self.inner.lock().surface.as_ref().map(|s| s.id())
    }

    /// Local tally since this controller was created.
    pub fn statistics(&self) -> Statistics {
        self.inner.lock().stats
    }

    pub fn phase(&self) -> AdPhase {
        self.inner.lock().phase
    }

    pub fn is_restore_pending(&self) -> bool {
        self.inner
            .lock()
            .restore
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    pub fn is_observing_mutations(&self) -> bool {
        self.inner
            .lock()
            .mutation_task
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    pub fn settings(&self) -> Settings {
        *self
            .inner
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_settings(&self, settings: Settings) {
        *self
            .inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = settings;
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("provider", &self.provider())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn skip_ads(&self) -> bool {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .skip_ads
    }

    fn spawn_poll_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let period = self.config.poll_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.refresh_surface();
            }
        })
    }

    fn refresh_surface(self: &Arc<Self>) {
        if self.is_stopped() {
            return;
        }
        let Some(found) = self.page.find_surface() else {
            trace!("No video surface this tick");
            return;
        };

        {
            let mut state = self.lock();
            if state.surface.as_ref().is_some_and(|s| s.id() == found.id()) {
                return;
            }
            let previous = state.surface.as_ref().map(|s| s.id());
            if let Some(task) = state.progress_task.take() {
                task.abort();
            }
            state.progress_task = Some(self.spawn_progress_listener(found.subscribe_progress()));
            state.ad_latched = false;
            match previous {
                Some(previous) => info!("Video surface replaced: {previous} -> {}", found.id()),
                None => info!("Tracking video surface {}", found.id()),
            }
            state.surface = Some(found);
        }

        if self.strategy.trigger() == TriggerKind::Mutation {
            self.ensure_mutation_observer();
        }
    }

    fn spawn_progress_listener(
        self: &Arc<Self>,
        mut rx: broadcast::Receiver<Progress>,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        trace!("Progress listener lagged by {skipped} ticks");
                    }
                    Err(RecvError::Closed) => break,
                }
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.dispatch(&Trigger::Poll);
            }
        })
    }

    /// Install the mutation observer once its anchor exists.
    fn ensure_mutation_observer(self: &Arc<Self>) {
        let Some(selector) = self.strategy.observe_selector() else {
            return;
        };
        let mut state = self.lock();
        if state
            .mutation_task
            .as_ref()
            .is_some_and(|t| !t.is_finished())
        {
            return;
        }
        let Some(rx) = self.page.observe(selector) else {
            trace!("Anchor {selector} not present yet");
            return;
        };
        state.mutation_task = Some(spawn_mutation_listener(Arc::downgrade(self), rx));
        info!("Observing {selector} for {} ad breaks", self.strategy.provider());
    }

    fn dispatch(self: &Arc<Self>, trigger: &Trigger) {
        if self.is_stopped() || !self.skip_ads() {
            return;
        }
        if trigger.kind() != self.strategy.trigger() {
            // Progress still drives observer installation for push-driven strategies.
            if *trigger == Trigger::Poll {
                self.ensure_mutation_observer();
            }
            return;
        }

        let surface = self.lock().surface.clone();
        let Some(surface) = surface.filter(|s| s.is_connected()) else {
            debug!("No live surface, skipping detection");
            return;
        };

        let signal = self.strategy.detect(self.page.as_ref(), trigger);
        if let Some(hint) = surface.ad_hint() {
            if hint != signal.is_ad_playing {
                debug!(
                    "Page ad hint ({hint}) disagrees with {} detection",
                    self.strategy.provider()
                );
            }
        }
        self.apply(&surface, signal);
    }

    fn apply(self: &Arc<Self>, surface: &Arc<dyn PlaybackSurface>, signal: DetectionSignal) {
        let mut state = self.lock();
        let still_tracked = state
            .surface
            .as_ref()
            .is_some_and(|s| s.id() == surface.id() && s.is_connected());
        if !still_tracked {
            debug!("{} replaced during detection, dropping correction", surface.id());
            return;
        }
        let Some(correction) = self.strategy.correction(&signal) else {
            if !signal.is_ad_playing && state.ad_latched {
                debug!("Ad break over on {}", surface.id());
                state.ad_latched = false;
            }
            return;
        };

        match correction {
            Correction::Jump { seconds } => self.jump(&mut state, surface, seconds),
            Correction::FastForward { rate, window } => {
                self.fast_forward(&mut state, surface, rate, window);
            }
            Correction::Accelerate { rate, volume } => {
                surface.set_playback_rate(rate);
                surface.set_volume(volume);
                if state.phase == AdPhase::Normal {
                    info!("Ad started on {}, playing at {rate}x muted", surface.id());
                    state.phase = AdPhase::AdActive;
                }
            }
            Correction::Restore => {
                if state.phase == AdPhase::AdActive {
                    surface.set_playback_rate(1.0);
                    surface.set_volume(1.0);
                    state.phase = AdPhase::Normal;
                    info!("Ad ended on {}, playback restored", surface.id());
                }
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn jump(&self, state: &mut State, surface: &Arc<dyn PlaybackSurface>, seconds: u64) {
        if state.ad_latched {
            trace!("Ad break already skipped");
            return;
        }
        let from = surface.current_time();
        surface.set_current_time(from + seconds as f64);
        state.ad_latched = true;
        info!(
            "Skipped {seconds}s {} ad on {}",
            self.strategy.provider(),
            surface.id()
        );
        self.record(state, seconds);
    }

    fn fast_forward(
        self: &Arc<Self>,
        state: &mut State,
        surface: &Arc<dyn PlaybackSurface>,
        rate: f64,
        window: Duration,
    ) {
        if state.ad_latched {
            trace!("Ad break already fast-forwarded");
            return;
        }
        if state.restore.as_ref().is_some_and(|r| r.surface == surface.id()) {
            trace!("Fast-forward already in flight");
            return;
        }
        surface.set_playback_rate(rate);
        state.ad_latched = true;
        let id = surface.id();
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(inner) = weak.upgrade() {
                inner.finish_fast_forward(id, rate, window);
            }
        });
        state.restore = Some(PendingRestore {
            surface: id,
            handle,
        });
        info!("Ad marker on {id}, playing at {rate}x for {window:?}");
    }

    fn finish_fast_forward(&self, id: SurfaceId, rate: f64, window: Duration) {
        let mut state = self.lock();
        if state.restore.as_ref().is_some_and(|r| r.surface == id) {
            state.restore = None;
        }
        if self.is_stopped() {
            return;
        }
        let tracked = state
            .surface
            .as_ref()
            .filter(|s| s.id() == id && s.is_connected())
            .cloned();
        let Some(surface) = tracked else {
            debug!("{id} no longer tracked, dropping rate restore");
            return;
        };
        surface.set_playback_rate(1.0);
        self.record(&mut state, fast_forward_savings(rate, window));
    }

    /// Count one blocked ad and forward the increment.
    fn record(&self, state: &mut State, time_saved: u64) {
        if !self.strategy.counts_blocks() {
            return;
        }
        state.stats.add(Statistics {
            ads_blocked: 1,
            time_saved,
        });
        self.reporter.emit(1, time_saved);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .abort_tasks();
    }
}

fn spawn_mutation_listener(
    weak: Weak<Inner>,
    mut rx: broadcast::Receiver<MutationRecord>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let record = match rx.recv().await {
                Ok(record) => record,
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Mutation observer lagged by {skipped} records");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let Some(inner) = weak.upgrade() else {
                break;
            };
            inner.dispatch(&Trigger::Mutation(record));
        }
    })
}

/// Wall-clock seconds saved by playing `window` at `rate`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn fast_forward_savings(rate: f64, window: Duration) -> u64 {
    (window.as_secs_f64() * (rate - 1.0)).max(0.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticSettings;
    use crate::page::LivePage;
    use crate::stats::{ChannelSink, StatsMessage};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    const NETFLIX_AD: &str =
        r#"<video id="v"></video><div class="ad-break-indicator">Ad</div>"#;
    const NETFLIX_PLAIN: &str = r#"<video id="v"></video>"#;

    fn controller_for(
        page: &Arc<LivePage>,
        provider: Provider,
    ) -> (Controller, mpsc::UnboundedReceiver<StatsMessage>) {
        let (sink, rx) = ChannelSink::channel();
        let controller = Controller::new(
            page.clone(),
            provider,
            ControllerConfig::default(),
            StatsReporter::new(Arc::new(sink)),
        );
        (controller, rx)
    }

    fn prime_page(label: &str) -> String {
        format!(
            r#"<video id="v"></video><span class="atvwebplayersdk-ad-timer-text">{label}</span>"#
        )
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
    }

    #[test]
    fn savings_for_default_window() {
        assert_eq!(fast_forward_savings(16.0, Duration::from_secs(3)), 45);
        assert_eq!(fast_forward_savings(1.0, Duration::from_secs(3)), 0);
        assert_eq!(fast_forward_savings(0.5, Duration::from_secs(3)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fast_forward_window_restores_and_counts_once() {
        let page = Arc::new(LivePage::new("www.netflix.com", NETFLIX_AD));
        let (controller, mut rx) = controller_for(&page, Provider::Netflix);
        controller.refresh_surface();
        let surface = page.active_surface().unwrap();

        controller.dispatch(&Trigger::Poll);
        assert_close(surface.playback_rate(), 16.0);
        assert!(controller.is_restore_pending());

        tokio::time::sleep(Duration::from_millis(2900)).await;
        controller.dispatch(&Trigger::Poll);
        assert_close(surface.playback_rate(), 16.0);
        assert_eq!(controller.statistics().ads_blocked, 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_close(surface.playback_rate(), 1.0);
        assert_eq!(
            controller.statistics(),
            Statistics {
                ads_blocked: 1,
                time_saved: 45
            }
        );

        // Marker still showing: same ad break, nothing new.
        controller.dispatch(&Trigger::Poll);
        assert_close(surface.playback_rate(), 1.0);
        assert!(!controller.is_restore_pending());

        // Marker gone, then a new break.
        page.set_html(NETFLIX_PLAIN);
        controller.dispatch(&Trigger::Poll);
        page.set_html(NETFLIX_AD);
        controller.dispatch(&Trigger::Poll);
        assert_close(surface.playback_rate(), 16.0);
        tokio::time::sleep(Duration::from_millis(3050)).await;
        assert_close(surface.playback_rate(), 1.0);
        assert_eq!(controller.statistics().ads_blocked, 2);

        let expected = StatsMessage::UpdateStats(Statistics {
            ads_blocked: 1,
            time_saved: 45,
        });
        assert_eq!(rx.try_recv().unwrap(), expected);
        assert_eq!(rx.try_recv().unwrap(), expected);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_restore_leaves_new_window_running() {
        let page = Arc::new(LivePage::new("www.netflix.com", NETFLIX_AD));
        let (controller, _rx) = controller_for(&page, Provider::Netflix);
        controller.refresh_surface();
        controller.dispatch(&Trigger::Poll);
        let old = page.active_surface().unwrap();
        assert_close(old.playback_rate(), 16.0);

        page.set_html(r#"<video id="next"></video>"#);
        controller.refresh_surface();
        let new = page.active_surface().unwrap();
        assert_eq!(controller.tracked_surface(), Some(new.id()));

        // New surface starts its own window halfway through the old one.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        page.set_html(r#"<video id="next"></video><div class="ad-break-indicator">Ad</div>"#);
        controller.dispatch(&Trigger::Poll);
        assert_close(new.playback_rate(), 16.0);

        // Old timer has fired, new one has not.
        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert!(!old.is_connected());
        assert_close(new.playback_rate(), 16.0);
        assert_eq!(controller.statistics().ads_blocked, 0);
        assert!(controller.is_restore_pending());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_close(new.playback_rate(), 1.0);
        assert_eq!(
            controller.statistics(),
            Statistics {
                ads_blocked: 1,
                time_saved: 45
            }
        );
    }

    /// Delegates to a [`LivePage`], swapping the player on the first query.
    struct SwapDuringDetect {
        page: Arc<LivePage>,
        next_html: String,
        controller: Mutex<Option<Controller>>,
    }

    impl Document for SwapDuringDetect {
        fn origin(&self) -> String {
            self.page.origin()
        }

        fn query(&self, selector: &str) -> Option<crate::page::ElementInfo> {
            let pending = self.controller.lock().unwrap().take();
            if let Some(controller) = pending {
                self.page.set_html(&self.next_html);
                controller.refresh_surface();
            }
            self.page.query(selector)
        }

        fn find_surface(&self) -> Option<Arc<dyn PlaybackSurface>> {
            self.page.find_surface()
        }

        fn observe(&self, selector: &str) -> Option<broadcast::Receiver<MutationRecord>> {
            self.page.observe(selector)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn surface_swap_during_detection_drops_correction() {
        let page = Arc::new(LivePage::new(
            "www.netflix.com",
            r#"<video id="a"></video><div class="ad-break-indicator">Ad</div>"#,
        ));
        let swapping = Arc::new(SwapDuringDetect {
            page: page.clone(),
            next_html: r#"<video id="b"></video><div class="ad-break-indicator">Ad</div>"#
                .to_string(),
            controller: Mutex::new(None),
        });
        let controller = Controller::new(
            swapping.clone(),
            Provider::Netflix,
            ControllerConfig::default(),
            StatsReporter::new(Arc::new(crate::stats::NullSink)),
        );
        controller.refresh_surface();
        let a = page.active_surface().unwrap();
        *swapping.controller.lock().unwrap() = Some(controller.clone());

        // Detection sees the marker, but the tracked surface changed meanwhile.
        controller.dispatch(&Trigger::Poll);
        let b = page.active_surface().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(controller.tracked_surface(), Some(b.id()));
        assert_close(a.playback_rate(), 1.0);
        assert!(!controller.is_restore_pending());

        // The ad on the new surface is still a fresh break.
        controller.dispatch(&Trigger::Poll);
        assert_close(b.playback_rate(), 16.0);

        tokio::time::sleep(Duration::from_millis(3050)).await;
        assert_close(b.playback_rate(), 1.0);
        assert_eq!(controller.statistics().ads_blocked, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_pending_restore() {
        let page = Arc::new(LivePage::new("www.netflix.com", NETFLIX_AD));
        let (controller, mut rx) = controller_for(&page, Provider::Netflix);
        controller.refresh_surface();
        controller.dispatch(&Trigger::Poll);
        controller.stop();

        tokio::time::sleep(Duration::from_secs(5)).await;
        let surface = page.active_surface().unwrap();
        assert_close(surface.playback_rate(), 16.0);
        assert_eq!(controller.statistics().ads_blocked, 0);
        assert_eq!(controller.status(), ControllerStatus::Stopped);
        assert!(rx.try_recv().is_err());

        // Stopped controllers ignore further triggers.
        page.set_html(NETFLIX_PLAIN);
        controller.dispatch(&Trigger::Poll);
        page.set_html(NETFLIX_AD);
        controller.dispatch(&Trigger::Poll);
        assert!(!controller.is_restore_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_jumps_exactly_once() {
        let page = Arc::new(LivePage::new("www.primevideo.com", &prime_page("1:30")));
        let (controller, mut rx) = controller_for(&page, Provider::PrimeVideo);
        controller.refresh_surface();
        let surface = page.active_surface().unwrap();
        surface.set_current_time(10.0);

        controller.dispatch(&Trigger::Poll);
        assert_close(surface.current_time(), 100.0);
        assert_eq!(
            controller.statistics(),
            Statistics {
                ads_blocked: 1,
                time_saved: 90
            }
        );

        // Label lingers for a tick: no second jump.
        page.set_html(&prime_page("1:29"));
        controller.dispatch(&Trigger::Poll);
        assert_close(surface.current_time(), 100.0);

        assert_eq!(
            rx.try_recv().unwrap(),
            StatsMessage::UpdateStats(Statistics {
                ads_blocked: 1,
                time_saved: 90
            })
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_or_garbage_countdown_does_nothing() {
        for label in ["0:00", "Advertisement", ""] {
            let page = Arc::new(LivePage::new("www.primevideo.com", &prime_page(label)));
            let (controller, mut rx) = controller_for(&page, Provider::PrimeVideo);
            controller.refresh_surface();
            controller.dispatch(&Trigger::Poll);

            let surface = page.active_surface().unwrap();
            assert_close(surface.current_time(), 0.0);
            assert_eq!(controller.statistics(), Statistics::default(), "{label:?}");
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn disney_needs_badge_and_timer() {
        let badge = r#"<div class="overlay_interstitials__badge">Ad</div>"#;
        let timer = r#"<span class="overlay_interstitials__content_time_display">0:30</span>"#;
        let page = Arc::new(LivePage::new(
            "www.disneyplus.com",
            &format!(r#"<video id="v"></video>{badge}"#),
        ));
        let (controller, _rx) = controller_for(&page, Provider::DisneyPlus);
        controller.refresh_surface();
        let surface = page.active_surface().unwrap();

        controller.dispatch(&Trigger::Poll);
        page.set_html(&format!(r#"<video id="v"></video>{timer}"#));
        controller.dispatch(&Trigger::Poll);
        assert_close(surface.current_time(), 0.0);
        assert_eq!(controller.statistics().ads_blocked, 0);

        page.set_html(&format!(r#"<video id="v"></video>{badge}{timer}"#));
        controller.dispatch(&Trigger::Poll);
        assert_close(surface.current_time(), 30.0);
        assert_eq!(controller.statistics().ads_blocked, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hulu_mutations_toggle_playback_without_counting() {
        let plain = r#"<video id="v"></video><div class="Timeline__playhead"></div>"#;
        let ad = r#"<video id="v"></video><div class="Timeline__playhead Timeline__playhead--ad"></div>"#;
        let page = Arc::new(LivePage::new("www.hulu.com", plain));
        let (controller, mut rx) = controller_for(&page, Provider::Hulu);
        controller.refresh_surface();
        assert!(controller.is_observing_mutations());
        let surface = page.active_surface().unwrap();

        page.set_html(ad);
        settle().await;
        assert_close(surface.playback_rate(), 16.0);
        assert_close(surface.volume(), 0.0);
        assert_eq!(controller.phase(), AdPhase::AdActive);

        // A repeated entry does not count either.
        controller.dispatch(&Trigger::Mutation(MutationRecord {
            selector: ".Timeline__playhead".into(),
            classes: vec!["Timeline__playhead".into(), "Timeline__playhead--ad".into()],
        }));
        assert_eq!(controller.statistics(), Statistics::default());

        page.set_html(plain);
        settle().await;
        assert_close(surface.playback_rate(), 1.0);
        assert_close(surface.volume(), 1.0);
        assert_eq!(controller.phase(), AdPhase::Normal);
        assert_eq!(controller.statistics(), Statistics::default());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn hulu_observer_is_installed_once() {
        let html = r#"<video id="a"></video><div class="Timeline__playhead"></div>"#;
        let page = Arc::new(LivePage::new("www.hulu.com", html));
        let (controller, _rx) = controller_for(&page, Provider::Hulu);

        controller.refresh_surface();
        for _ in 0..5 {
            controller.dispatch(&Trigger::Poll);
        }
        page.set_html(r#"<video id="b"></video><div class="Timeline__playhead"></div>"#);
        controller.refresh_surface();
        settle().await;

        assert_eq!(page.observer_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hulu_observer_waits_for_anchor() {
        let page = Arc::new(LivePage::new("www.hulu.com", r#"<video id="v"></video>"#));
        let (controller, _rx) = controller_for(&page, Provider::Hulu);
        controller.refresh_surface();
        assert!(!controller.is_observing_mutations());

        page.set_html(r#"<video id="v"></video><div class="Timeline__playhead"></div>"#);
        controller.dispatch(&Trigger::Poll);
        assert!(controller.is_observing_mutations());
    }

    #[tokio::test(start_paused = true)]
    async fn reacquisition_does_not_leak_listeners() {
        let page = Arc::new(LivePage::new("www.primevideo.com", r#"<video id="v0"></video>"#));
        let (controller, _rx) = controller_for(&page, Provider::PrimeVideo);
        controller.refresh_surface();

        let mut seen = vec![page.active_surface().unwrap()];
        for i in 1..=5 {
            page.set_html(&format!(r#"<video id="v{i}"></video>"#));
            controller.refresh_surface();
            // Same surface again: no new listener.
            controller.refresh_surface();
            seen.push(page.active_surface().unwrap());
        }
        settle().await;

        let (current, old) = seen.split_last().unwrap();
        assert_eq!(controller.tracked_surface(), Some(current.id()));
        assert_eq!(current.listener_count(), 1);
        for surface in old {
            assert_eq!(surface.listener_count(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poll_loop_follows_spa_navigation() {
        let page = Arc::new(LivePage::new("www.primevideo.com", "<p>loading</p>"));
        let (controller, _rx) = controller_for(&page, Provider::PrimeVideo);
        controller.start(&StaticSettings::default()).await;
        settle().await;
        assert_eq!(controller.status(), ControllerStatus::Idle);

        page.set_html(r#"<video id="first"></video>"#);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let first = page.active_surface().unwrap();
        assert_eq!(controller.tracked_surface(), Some(first.id()));
        assert_eq!(controller.status(), ControllerStatus::Tracking);

        // Transient absence keeps the old reference.
        page.set_html("<p>navigating</p>");
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(controller.tracked_surface(), Some(first.id()));

        page.set_html(r#"<video id="second"></video>"#);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let second = page.active_surface().unwrap();
        assert_eq!(controller.tracked_surface(), Some(second.id()));
        assert_eq!(second.listener_count(), 1);

        controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn progress_ticks_drive_detection() {
        let page = Arc::new(LivePage::new("www.primevideo.com", &prime_page("0:45")));
        let (controller, _rx) = controller_for(&page, Provider::PrimeVideo);
        controller.start(&StaticSettings::default()).await;
        settle().await;

        let surface = page.active_surface().unwrap();
        surface.advance(Duration::from_secs(1));
        settle().await;
        assert_close(surface.current_time(), 46.0);
        assert_eq!(controller.statistics().ads_blocked, 1);
        controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_skip_ads_leaves_playback_alone() {
        let page = Arc::new(LivePage::new("www.primevideo.com", &prime_page("1:00")));
        let (controller, _rx) = controller_for(&page, Provider::PrimeVideo);
        controller
            .start(&StaticSettings(Settings {
                skip_ads: false,
                ..Settings::default()
            }))
            .await;
        settle().await;

        controller.dispatch(&Trigger::Poll);
        let surface = page.active_surface().unwrap();
        assert_close(surface.current_time(), 0.0);
        assert_eq!(controller.statistics().ads_blocked, 0);
        controller.stop();
    }

    struct FailingStore;

    #[async_trait]
    impl SettingsStore for FailingStore {
        async fn load(&self) -> Result<Settings> {
            Err(AdSkipError::Io(std::io::Error::other("store offline")))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn settings_failure_keeps_defaults() {
        let page = Arc::new(LivePage::new("www.primevideo.com", &prime_page("0:10")));
        let (controller, _rx) = controller_for(&page, Provider::PrimeVideo);
        controller.start(&FailingStore).await;
        assert_eq!(controller.settings(), Settings::default());
        controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn dead_surface_is_not_corrected() {
        let page = Arc::new(LivePage::new("www.primevideo.com", &prime_page("0:30")));
        let (controller, _rx) = controller_for(&page, Provider::PrimeVideo);
        controller.refresh_surface();
        let surface = page.active_surface().unwrap();
        surface.disconnect();

        controller.dispatch(&Trigger::Poll);
        assert_eq!(controller.statistics().ads_blocked, 0);
    }

    #[test]
    fn unsupported_origin_is_rejected() {
        let page = Arc::new(LivePage::new("www.crunchyroll.com", ""));
        let result = Controller::for_page(
            page,
            ControllerConfig::default(),
            StatsReporter::new(Arc::new(crate::stats::NullSink)),
        );
        assert!(matches!(result, Err(AdSkipError::UnsupportedOrigin(_))));
    }

    #[test]
    fn for_page_resolves_provider() {
        let page = Arc::new(LivePage::new("WWW.HULU.COM", ""));
        let controller = Controller::for_page(
            page,
            ControllerConfig::default(),
            StatsReporter::new(Arc::new(crate::stats::NullSink)),
        )
        .unwrap();
        assert_eq!(controller.provider(), Provider::Hulu);
        assert_eq!(controller.status(), ControllerStatus::Idle);
    }
}
