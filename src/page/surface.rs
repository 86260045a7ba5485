//! In-memory playback surface.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::broadcast;

use super::{PlaybackSurface, Progress, SurfaceId};

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Progress events buffered per subscriber before it starts lagging.
const PROGRESS_CAPACITY: usize = 64;

#[derive(Debug)]
struct SurfaceState {
    rate: f64,
    position: f64,
    volume: f64,
    connected: bool,
    ad_hint: Option<bool>,
}

/// A video surface whose clock is advanced explicitly.
///
/// Each [`advance`](Self::advance) moves the play position by
/// `elapsed * rate` and broadcasts one [`Progress`] tick.
#[derive(Debug)]
pub struct SimulatedSurface {
    id: SurfaceId,
    state: Mutex<SurfaceState>,
    progress: broadcast::Sender<Progress>,
}

impl SimulatedSurface {
    #[must_use]
    pub fn new() -> Self {
        let (progress, _) = broadcast::channel(PROGRESS_CAPACITY);
        Self {
            id: SurfaceId(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed)),
            state: Mutex::new(SurfaceState {
                rate: 1.0,
                position: 0.0,
                volume: 1.0,
                connected: true,
                ad_hint: None,
            }),
            progress,
        }
    }

    /// Play for `elapsed` wall-clock time and emit a progress tick.
    ///
    /// A disconnected surface neither moves nor ticks.
    pub fn advance(&self, elapsed: Duration) {
        let position = {
            let mut state = self.lock();
            if !state.connected {
                return;
            }
            state.position += elapsed.as_secs_f64() * state.rate;
            state.position
        };
        // No subscribers is fine: nobody is tracking this surface yet.
        let _ = self.progress.send(Progress { position });
    }

    /// Mark the element as removed from its document.
    pub fn disconnect(&self) {
        self.lock().connected = false;
    }

    pub fn set_ad_hint(&self, hint: Option<bool>) {
        self.lock().ad_hint = hint;
    }

    /// Number of live progress subscriptions.
    pub fn listener_count(&self) -> usize {
        self.progress.receiver_count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SurfaceState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for SimulatedSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSurface for SimulatedSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn playback_rate(&self) -> f64 {
        self.lock().rate
    }

    fn set_playback_rate(&self, rate: f64) {
        let mut state = self.lock();
        if state.connected {
            state.rate = rate;
        }
    }

    fn current_time(&self) -> f64 {
        self.lock().position
    }

    fn set_current_time(&self, seconds: f64) {
        let mut state = self.lock();
        if state.connected {
            state.position = seconds.max(0.0);
        }
    }

    fn volume(&self) -> f64 {
        self.lock().volume
    }

    fn set_volume(&self, volume: f64) {
        let mut state = self.lock();
        if state.connected {
            state.volume = volume.clamp(0.0, 1.0);
        }
    }

    fn ad_hint(&self) -> Option<bool> {
        self.lock().ad_hint
    }

    fn subscribe_progress(&self) -> broadcast::Receiver<Progress> {
        self.progress.subscribe()
    }
}
