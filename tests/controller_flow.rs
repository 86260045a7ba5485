//! End-to-end controller flows through the public API.
//!
//! Each test attaches a controller the way a host would, drives the page
//! only through markup changes and playback progress, and checks the
//! surface plus the aggregated statistics.

use std::sync::Arc;
use std::time::Duration;

use adskip::{
    AttachDecision, AttachRegistry, ChannelSink, Controller, ControllerConfig, ControllerStatus,
    LivePage, NavigationStatus, PlaybackSurface, Provider, StaticSettings, Statistics,
    StatsAggregator, StatsMessage, StatsReporter,
};
use tokio::sync::mpsc;

type Attached = (
    Arc<LivePage>,
    Controller,
    StatsAggregator,
    mpsc::UnboundedReceiver<StatsMessage>,
);

/// Attach like a host would and start a controller for `url`.
async fn attach(url: &str, origin: &str, html: &str) -> Attached {
    let mut registry = AttachRegistry::new();
    let decision = registry.should_attach(1, url, NavigationStatus::Complete);
    assert!(matches!(decision, AttachDecision::Attach(Some(_))), "{decision:?}");

    let page = Arc::new(LivePage::new(origin, html));
    let (sink, rx) = ChannelSink::channel();
    let controller = Controller::for_page(
        page.clone(),
        ControllerConfig::default(),
        StatsReporter::new(Arc::new(sink)),
    )
    .unwrap();
    controller.start(&StaticSettings::default()).await;
    // First poll tick fires immediately.
    tokio::time::sleep(Duration::from_millis(1)).await;
    (page, controller, StatsAggregator::new(), rx)
}

/// Play the active surface for `ticks` quarter-second steps.
async fn play(page: &LivePage, ticks: u32) {
    for _ in 0..ticks {
        if let Some(surface) = page.active_surface() {
            surface.advance(Duration::from_millis(250));
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn netflix_marker_fast_forwards_through_progress() {
    let (page, controller, mut aggregator, rx) = attach(
        "https://www.netflix.com/watch/80100172",
        "www.netflix.com",
        r#"<video id="player"></video>"#,
    )
    .await;
    assert_eq!(controller.provider(), Provider::Netflix);
    assert_eq!(controller.status(), ControllerStatus::Tracking);

    page.set_html(r#"<video id="player"></video><div class="ad-break-indicator"></div>"#);
    play(&page, 1).await;
    let surface = page.active_surface().unwrap();
    assert!((surface.playback_rate() - 16.0).abs() < f64::EPSILON);

    // Marker stays for the whole window; still a single block.
    play(&page, 16).await;
    assert!((surface.playback_rate() - 1.0).abs() < f64::EPSILON);

    controller.stop();
    drop(controller);
    aggregator.run(rx).await;
    assert_eq!(
        aggregator.totals(),
        Statistics {
            ads_blocked: 1,
            time_saved: 45
        }
    );
}

#[tokio::test(start_paused = true)]
async fn hulu_playhead_class_drives_playback() {
    let plain = r#"<video id="v"></video><div class="Timeline__playhead"></div>"#;
    let ad = r#"<video id="v"></video><div class="Timeline__playhead Timeline__playhead--ad"></div>"#;
    let (page, controller, mut aggregator, rx) =
        attach("https://www.hulu.com/watch/1", "www.hulu.com", plain).await;
    assert!(controller.is_observing_mutations());

    page.set_html(ad);
    play(&page, 1).await;
    let surface = page.active_surface().unwrap();
    assert!((surface.playback_rate() - 16.0).abs() < f64::EPSILON);
    assert!(surface.volume().abs() < f64::EPSILON);

    page.set_html(plain);
    play(&page, 1).await;
    assert!((surface.playback_rate() - 1.0).abs() < f64::EPSILON);
    assert!((surface.volume() - 1.0).abs() < f64::EPSILON);

    controller.stop();
    drop(controller);
    aggregator.run(rx).await;
    assert_eq!(aggregator.totals(), Statistics::default());
}

#[tokio::test(start_paused = true)]
async fn disney_spa_navigation_then_ad() {
    let (page, controller, mut aggregator, rx) = attach(
        "https://www.disneyplus.com/video/abc",
        "www.disneyplus.com",
        r#"<video id="episode-1"></video>"#,
    )
    .await;
    let first = controller.tracked_surface().unwrap();

    // Next episode: the player element is replaced.
    page.set_html(r#"<video id="episode-2"></video>"#);
    play(&page, 5).await;
    let second = page.active_surface().unwrap();
    assert_ne!(first, second.id());
    assert_eq!(controller.tracked_surface(), Some(second.id()));
    assert_eq!(second.listener_count(), 1);

    let before = second.current_time();
    page.set_html(
        r#"<video id="episode-2"></video>
           <div class="overlay_interstitials__badge">Ad</div>
           <span class="overlay_interstitials__content_time_display">1:30</span>"#,
    );
    play(&page, 1).await;
    assert!((second.current_time() - (before + 0.25 + 90.0)).abs() < 1e-9);

    controller.stop();
    drop(controller);
    aggregator.run(rx).await;
    assert_eq!(
        aggregator.totals(),
        Statistics {
            ads_blocked: 1,
            time_saved: 90
        }
    );
}
