//! The presentation timeline: the authoritative source for availability window, seek range,
//! duration, live/VOD flag and UTC clock offset.

use std::time::Duration;

/// Wall-clock time expressed as milliseconds since the Unix epoch. Kept as a plain integer
/// (rather than `chrono::DateTime`) because every computation in this module is a subtraction or
/// a clamp; callers that need calendar arithmetic convert at the edges.
pub type UnixMillis = i64;

#[derive(Debug, Clone)]
enum Kind {
    Vod,
    Live {
        presentation_start_time: UnixMillis,
        segment_availability_duration: Option<Duration>,
        suggested_presentation_delay: Duration,
    },
}

/// Authoritative source for availability window, seek range, duration, live/VOD flag, and UTC
/// clock offset.
#[derive(Debug, Clone)]
pub struct PresentationTimeline {
    kind: Kind,
    duration_seconds: f64,
    max_segment_duration_seconds: f64,
    clock_offset_ms: i64,
    now_fn_offset_ms: i64,
    in_progress: bool,
}

impl PresentationTimeline {
    /// A static (on-demand) timeline: seek range is always `[0, duration)`.
    pub fn new_vod(duration_seconds: f64) -> Self {
        PresentationTimeline {
            kind: Kind::Vod,
            duration_seconds,
            max_segment_duration_seconds: 0.0,
            clock_offset_ms: 0,
            now_fn_offset_ms: 0,
            in_progress: false,
        }
    }

    /// A dynamic (live) timeline.
    ///
    /// `start_utc_ms` is `availabilityStartTime`/the live-edge anchor; `window_seconds` is the
    /// sliding-window size (`timeShiftBufferDepth`, `∞` for an unbounded window expressed as
    /// `None`); `suggested_delay_seconds` is how far behind the live edge playback should sit.
    pub fn new_live(start_utc_ms: UnixMillis, window_seconds: Option<f64>, suggested_delay_seconds: f64) -> Self {
        PresentationTimeline {
            kind: Kind::Live {
                presentation_start_time: start_utc_ms,
                segment_availability_duration: window_seconds.map(Duration::from_secs_f64),
                suggested_presentation_delay: Duration::from_secs_f64(suggested_delay_seconds.max(0.0)),
            },
            duration_seconds: f64::INFINITY,
            max_segment_duration_seconds: 0.0,
            clock_offset_ms: 0,
            now_fn_offset_ms: 0,
            in_progress: false,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.kind, Kind::Live { .. })
    }

    /// `EVENT`-type HLS playlists (no `ENDLIST` yet, but not a sliding window either): still
    /// "live" for scheduling purposes, but its start never moves.
    pub fn set_in_progress(&mut self, in_progress: bool) {
        self.in_progress = in_progress;
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Records a server-minus-local clock offset derived from UTCTiming (DASH) or from comparing
    /// PROGRAM-DATE-TIME against the local clock (HLS). All wall-clock queries subsequently
    /// include this offset.
    pub fn set_clock_offset_ms(&mut self, offset_ms: i64) {
        self.clock_offset_ms = offset_ms;
    }

    pub fn clock_offset_ms(&self) -> i64 {
        self.clock_offset_ms
    }

    /// Expand known duration (VOD) or advance the sliding window (live) given the end time of
    /// newly-announced segments. Never shrinks the window past the largest segment already
    /// announced; a manifest is free to shrink `segment_availability_duration` explicitly via a
    /// fresh `new_live`/config override, but segment notification alone is monotonic.
    pub fn notify_segments_end_time(&mut self, max_end_time_seconds: f64, is_first_period: bool) {
        match &self.kind {
            Kind::Vod => {
                if is_first_period || max_end_time_seconds > self.duration_seconds {
                    self.duration_seconds = self.duration_seconds.max(max_end_time_seconds);
                }
            }
            Kind::Live { .. } => {
                // Live windows are driven by wall-clock "now", not by segment end times; segment
                // notification here only updates maxSegmentDuration bookkeeping via the caller.
            }
        }
    }

    pub fn notify_max_segment_duration(&mut self, seconds: f64) {
        if seconds > self.max_segment_duration_seconds {
            self.max_segment_duration_seconds = seconds;
        }
    }

    /// Applies `availabilityWindowOverride`; overrides the computed sliding window size.
    pub fn set_availability_window_override(&mut self, window: Duration) {
        if let Kind::Live { segment_availability_duration, .. } = &mut self.kind {
            *segment_availability_duration = Some(window);
        }
    }

    fn now_ms(&self) -> i64 {
        crate::clock::now_unix_ms() + self.clock_offset_ms + self.now_fn_offset_ms
    }

    /// Test-only hook: lets unit tests pin "now" relative to the real wall clock without mocking
    /// a whole clock abstraction.
    #[cfg(test)]
    pub fn set_local_clock_offset_for_test(&mut self, offset_ms: i64) {
        self.now_fn_offset_ms = offset_ms - crate::clock::now_unix_ms();
    }

    pub fn seek_range_start(&self) -> f64 {
        match &self.kind {
            Kind::Vod => 0.0,
            Kind::Live { presentation_start_time, segment_availability_duration, .. } => {
                let window = segment_availability_duration.map(|d| d.as_secs_f64()).unwrap_or(f64::INFINITY);
                if window.is_infinite() {
                    return 0.0;
                }
                let elapsed = (self.now_ms() - presentation_start_time) as f64 / 1000.0;
                (elapsed - window).max(0.0)
            }
        }
    }

    pub fn seek_range_end(&self) -> f64 {
        match &self.kind {
            Kind::Vod => self.duration_seconds,
            Kind::Live { presentation_start_time, suggested_presentation_delay, .. } => {
                let elapsed = (self.now_ms() - presentation_start_time) as f64 / 1000.0;
                let end = elapsed - suggested_presentation_delay.as_secs_f64() - self.max_segment_duration_seconds;
                end.max(0.0).min(self.duration_seconds)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vod_seek_range_is_full_duration() {
        let tl = PresentationTimeline::new_vod(30.0);
        assert_eq!(tl.seek_range_start(), 0.0);
        assert_eq!(tl.seek_range_end(), 30.0);
        assert!(!tl.is_live());
    }

    #[test]
    fn live_seek_range_end_accounts_for_delay_and_max_segment_duration() {
        // availabilityStartTime = epoch, UTCTiming sets server clock to t=30s, local clock
        // reads 10s, maxSegmentDuration=5s, suggestedPresentationDelay=0s => seekRangeEnd = 25.
        let mut tl = PresentationTimeline::new_live(0, Some(60.0), 0.0);
        tl.notify_max_segment_duration(5.0);
        tl.set_clock_offset_ms(20_000); // server is 20s ahead of local
        tl.set_local_clock_offset_for_test(10_000); // local clock reads 10s (pre-offset)
        assert!((tl.seek_range_end() - 25.0).abs() < 1e-6);
    }

    #[test]
    fn window_never_shrinks_on_vod_duration_growth() {
        let mut tl = PresentationTimeline::new_vod(10.0);
        tl.notify_segments_end_time(5.0, false);
        assert_eq!(tl.duration_seconds(), 10.0);
        tl.notify_segments_end_time(20.0, false);
        assert_eq!(tl.duration_seconds(), 20.0);
    }

    #[test]
    fn availability_window_override_is_applied() {
        let mut tl = PresentationTimeline::new_live(0, Some(60.0), 0.0);
        tl.set_availability_window_override(Duration::from_secs(30));
        tl.set_local_clock_offset_for_test(100_000);
        // window now 30s, elapsed 100s => start = 70
        assert!((tl.seek_range_start() - 70.0).abs() < 1e-6);
    }
}
