//! `adskip` - ad-break detection and playback correction for streaming pages
//!
//! # Features
//!
//! - **Site strategies**: bespoke heuristics for Netflix, Prime Video, Hulu
//!   and Disney+, selected once from the page origin
//! - **Playback control**: position jumps, timed fast-forward, accelerate
//!   and mute, with one correction per ad break
//! - **Surface tracking**: follows the video element across SPA navigation
//! - **Statistics**: ads blocked and time saved, forwarded as increments
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use adskip::{Controller, ControllerConfig, LivePage, NullSink, StaticSettings, StatsReporter};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let page = Arc::new(LivePage::new("www.netflix.com", r#"<video id="v"></video>"#));
//!     let controller = Controller::for_page(
//!         page,
//!         ControllerConfig::default(),
//!         StatsReporter::new(Arc::new(NullSink)),
//!     )?;
//!     controller.start(&StaticSettings::default()).await;
//!     // ... page mutates, the controller corrects ...
//!     controller.stop();
//!     Ok(())
//! }
//! ```

pub mod ad_time;
pub mod attach;
pub mod config;
pub mod controller;
pub mod error;
pub mod page;
pub mod provider;
pub mod replay;
pub mod stats;
pub mod strategy;

pub use ad_time::parse_ad_time;
pub use attach::{AttachDecision, AttachRegistry, NavigationStatus};
pub use config::{
    AppConfig, ControllerConfig, FileSettingsStore, Settings, SettingsStore, StaticSettings,
};
pub use controller::{AdPhase, Controller, ControllerStatus};
pub use error::{AdSkipError, Result};
pub use page::{Document, LivePage, PlaybackSurface, SimulatedSurface, SurfaceId};
pub use provider::Provider;
pub use replay::{run_scenario, ReplayReport, Scenario};
pub use stats::{
    ChannelSink, NullSink, Statistics, StatsAggregator, StatsMessage, StatsReporter, StatsSink,
};
pub use strategy::{AdStrategy, Correction, DetectionSignal, Trigger, TriggerKind};

/// Version of adskip
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
