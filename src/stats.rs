//! Ad-block statistics.
//!
//! Each controller owns a local [`Statistics`] tally and forwards every
//! change as an increment through a [`StatsReporter`]. The receiving end,
//! a [`StatsAggregator`], adds increments to a running total that can be
//! persisted as JSON.
//!
//! # Message format
//!
//! ```json
//! {"type": "UPDATE_STATS", "adsBlocked": 1, "timeSaved": 90}
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{AdSkipError, Result};

/// Ads blocked and seconds saved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    #[serde(default)]
    pub ads_blocked: u64,
    /// Seconds.
    #[serde(default)]
    pub time_saved: u64,
}

impl Statistics {
    pub fn add(&mut self, delta: Statistics) {
        self.ads_blocked = self.ads_blocked.saturating_add(delta.ads_blocked);
        self.time_saved = self.time_saved.saturating_add(delta.time_saved);
    }

    pub fn is_empty(&self) -> bool {
        self.ads_blocked == 0 && self.time_saved == 0
    }
}

/// Wire message sent to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StatsMessage {
    #[serde(rename = "UPDATE_STATS")]
    UpdateStats(Statistics),
}

impl StatsMessage {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One-way destination for statistics increments.
pub trait StatsSink: Send + Sync {
    fn send(&self, message: StatsMessage) -> Result<()>;
}

/// Forwards messages over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StatsMessage>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<StatsMessage>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatsMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatsSink for ChannelSink {
    fn send(&self, message: StatsMessage) -> Result<()> {
        self.tx.send(message).map_err(|_| AdSkipError::SinkClosed)
    }
}

/// Drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StatsSink for NullSink {
    fn send(&self, _message: StatsMessage) -> Result<()> {
        Ok(())
    }
}

/// Fire-and-forget emitter.
#[derive(Clone)]
pub struct StatsReporter {
    sink: Arc<dyn StatsSink>,
}

impl StatsReporter {
    pub fn new(sink: Arc<dyn StatsSink>) -> Self {
        Self { sink }
    }

    /// Send an increment. Delivery failures are logged and dropped.
    pub fn emit(&self, ads_blocked: u64, time_saved: u64) {
        let delta = Statistics {
            ads_blocked,
            time_saved,
        };
        if delta.is_empty() {
            return;
        }
        if let Err(e) = self.sink.send(StatsMessage::UpdateStats(delta)) {
            warn!("Dropping statistics update {delta:?}: {e}");
        }
    }
}

impl std::fmt::Debug for StatsReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsReporter").finish_non_exhaustive()
    }
}

/// On-disk form of the aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsFile {
    pub statistics: Statistics,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Authoritative running total.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    totals: Statistics,
    updated_at: Option<DateTime<Utc>>,
    path: Option<PathBuf>,
}

impl StatsAggregator {
    /// In-memory aggregate starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate backed by a JSON file; loads the existing total if present.
    pub fn with_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = if path.exists() {
            serde_json::from_str::<StatsFile>(&std::fs::read_to_string(&path)?)?
        } else {
            StatsFile::default()
        };
        Ok(Self {
            totals: file.statistics,
            updated_at: file.updated_at,
            path: Some(path),
        })
    }

    /// Default location under the user data directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("adskip")
            .join("stats.json")
    }

    pub fn totals(&self) -> Statistics {
        self.totals
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Add an increment to the total.
    pub fn apply(&mut self, message: &StatsMessage) {
        let StatsMessage::UpdateStats(delta) = message;
        self.totals.add(*delta);
        self.updated_at = Some(Utc::now());
        debug!("Statistics now {:?}", self.totals);
    }

    /// Write the total back to its file, if any.
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = StatsFile {
            statistics: self.totals,
            updated_at: self.updated_at,
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    /// Apply messages until every sender is gone, persisting after each.
    pub async fn run(&mut self, mut rx: mpsc::UnboundedReceiver<StatsMessage>) {
        while let Some(message) = rx.recv().await {
            self.apply(&message);
            if let Err(e) = self.persist() {
                warn!("Failed to persist statistics: {e}");
            }
        }
    }
}
