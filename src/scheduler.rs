//! Update scheduler: one logical timer per refreshable playlist.
//!
//! Each playlist that can change over time (a DASH MPD with `@minimumUpdatePeriod`, every HLS
//! live media playlist) gets exactly one [`PlaylistTimer`]. Rescheduling coalesces: calling
//! `schedule` while a tick is already pending replaces the pending delay rather than stacking a
//! second timer, and cancellation is immediate, propagated through the same
//! [`CancellationToken`] the fetch facade uses so an in-flight refresh aborts rather than racing
//! a cancelled scheduler.

use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One tick of a scheduled playlist refresh.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    pub scheduled_at: Instant,
}

/// Owns the single timer task for one playlist. Dropping or cancelling stops delivery of further
/// ticks; the task backing the timer exits as soon as its `CancellationToken` fires or this
/// handle is dropped.
pub struct PlaylistTimer {
    cancellation_token: CancellationToken,
    /// Guards re-arming so that `schedule` calls racing each other still only ever have one
    /// timer task alive at a time.
    state: Mutex<TimerState>,
}

struct TimerState {
    generation: u64,
    ticks_tx: mpsc::Sender<Tick>,
}

impl PlaylistTimer {
    pub fn new(parent_cancellation: &CancellationToken) -> (Self, mpsc::Receiver<Tick>) {
        let (ticks_tx, ticks_rx) = mpsc::channel(1);
        let timer = PlaylistTimer {
            cancellation_token: parent_cancellation.child_token(),
            state: Mutex::new(TimerState { generation: 0, ticks_tx }),
        };
        (timer, ticks_rx)
    }

    /// Schedule (or reschedule) the next tick `delay` from now. If a tick is already pending, its
    /// delay is replaced: only the most recently requested delay ever fires, matching the "one
    /// timer per playlist" invariant (no tick pile-up across successive `@minimumUpdatePeriod`
    /// updates that shrink the interval).
    pub async fn schedule(self: &std::sync::Arc<Self>, delay: Duration) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        let generation = state.generation;
        let tx = state.ticks_tx.clone();
        let token = self.cancellation_token.clone();
        let this = std::sync::Arc::clone(self);

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let current_generation = this.state.lock().await.generation;
                    if current_generation == generation {
                        let _ = tx.send(Tick { scheduled_at: Instant::now() }).await;
                    }
                }
            }
        });
    }

    /// Cancel any pending tick. Idempotent.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}

/// Picks the next refresh delay for a DASH MPD: `@minimumUpdatePeriod` if present,
/// otherwise the remaining duration of the last period (VOD manifests never reach here because
/// they have no `@minimumUpdatePeriod` and aren't rescheduled).
pub fn dash_refresh_delay(minimum_update_period: Option<Duration>, fallback: Duration) -> Duration {
    minimum_update_period.unwrap_or(fallback).max(Duration::from_millis(1))
}

/// Picks the next refresh delay for an HLS live media playlist: `#EXT-X-TARGETDURATION` by
/// default, or half of it while low-latency partial segments are being delivered (so that new
/// `#EXT-X-PART` entries are picked up promptly), per the low-latency HLS delivery directives
/// surfaced through `isLowLatencyMode`.
pub fn hls_refresh_delay(target_duration: Duration, is_low_latency_mode: bool, segments_unchanged: bool) -> Duration {
    let base = if is_low_latency_mode { target_duration / 2 } else { target_duration };
    if segments_unchanged {
        // RFC 8216bis: if the reloaded playlist is unchanged, wait half the target duration
        // before retrying rather than hammering the server at full frequency.
        (base / 2).max(Duration::from_millis(1))
    } else {
        base
    }
}
