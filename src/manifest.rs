//! The uniform, source-format-independent container produced by both parsers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use url::Url;

use crate::drm::DrmInfo;
use crate::events::ManifestEvent;
use crate::segment_index::SegmentIndex;
use crate::timeline::PresentationTimeline;

/// Stable identity handle for a [`Stream`]; both parsers hand these out and reuse them across
/// live updates rather than reallocating, so that subscribers holding an `Arc<Stream>` observe
/// index growth in place.
pub type StreamHandle = Arc<Stream>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Audio,
    Video,
    Text,
    Image,
}

/// HLS `TYPE=SUBTITLES` vs `TYPE=CLOSED-CAPTIONS` distinction, and the DASH
/// `Accessibility`/`Role` equivalent; only meaningful for `StreamKind::Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Subtitle,
    Caption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdrLevel {
    Sdr,
    Hdr10,
    Hlg,
    DolbyVision,
}

/// The common record for each media track.
#[derive(Debug)]
pub struct Stream {
    pub kind: StreamKind,
    pub mime_type: Mutex<Option<String>>,
    pub codecs: Mutex<Option<String>>,
    pub width: Option<u64>,
    pub height: Option<u64>,
    pub frame_rate: Option<f64>,
    pub pixel_aspect_ratio: Option<(u64, u64)>,
    pub channels_count: Option<u32>,
    pub audio_sampling_rate: Option<u64>,
    pub spatial_audio: bool,
    pub language: Option<String>,
    pub original_language: Option<String>,
    pub label: Option<String>,
    pub roles: Vec<String>,
    pub forced: bool,
    pub text_kind: Option<TextKind>,
    pub hdr: Option<HdrLevel>,
    pub video_layout: Option<String>,
    /// CEA-608/708 instream-id → language.
    pub closed_captions: HashMap<String, String>,
    pub drm_info: Mutex<Vec<DrmInfo>>,
    pub segment_index: Mutex<Option<SegmentIndex>>,
    pub trick_mode_video: Mutex<Option<StreamHandle>>,
    pub encrypted: Mutex<bool>,
    /// HLS only: the stream's media playlist has not yet been fetched, so MIME type and exact
    /// codec string may still be refined.
    pub unloaded: Mutex<bool>,
    /// A stable id, unique within the owning `Manifest`, used for logging/error context and to
    /// correlate a stream across a live refresh even when its `StreamHandle` changes (it never
    /// should, but callers serializing a snapshot need something Copy).
    pub id: u64,
    /// DASH `Representation@id`: stable across a live refresh's re-parse, so `refresh` can find
    /// the `Stream` a freshly-parsed `Representation` corresponds to. `None` for HLS streams.
    pub dash_representation_id: Option<String>,
    /// HLS only: the stream's own media playlist URI, kept so `refresh` knows what to refetch
    /// without needing the caller to pass per-stream URIs back in. `None` for DASH streams and for
    /// a bare media playlist's synthetic stream (refreshed by reusing the manifest URI itself).
    pub hls_playlist_uri: Mutex<Option<Url>>,
}

impl Stream {
    pub fn lazily_create_segment_index(&self, build: impl FnOnce() -> SegmentIndex) {
        let mut guard = self.segment_index.lock().expect("segment_index mutex poisoned");
        if guard.is_none() {
            *guard = Some(build());
        }
    }
}

/// A pairing of an optional audio stream and optional video stream that may be rendered
/// together.
#[derive(Debug)]
pub struct Variant {
    pub id: u64,
    pub bandwidth: Option<u64>,
    pub language: Option<String>,
    pub primary: bool,
    pub drm_info: Vec<DrmInfo>,
    pub video: Option<StreamHandle>,
    pub audio: Option<StreamHandle>,
}

impl Variant {
    /// Invariant: at least one of audio/video is present.
    pub fn is_well_formed(&self) -> bool {
        self.video.is_some() || self.audio.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Dash,
    Hls,
}

/// The top-level description of a presentation. Created once per manifest URL, mutated only by
/// the parser that owns it, and destroyed when the caller releases it. Its identity is stable
/// across live updates: the same `Stream`/`Variant` objects are reused so downstream subscribers
/// observe index growth rather than replacement.
#[derive(Debug)]
pub struct Manifest {
    pub timeline: PresentationTimeline,
    pub variants: Vec<Variant>,
    pub text_streams: Vec<StreamHandle>,
    pub image_streams: Vec<StreamHandle>,
    pub is_live: bool,
    /// HLS hint to consumers: number segments using the sequence-number space rather than
    /// deriving presentation times from PROGRAM-DATE-TIME.
    pub sequence_mode: bool,
    /// HLS `#EXT-X-START:TIME-OFFSET=` (seconds; negative counts back from the live edge/end).
    /// `None` for DASH and for HLS playlists that don't declare one.
    pub start_time: Option<f64>,
    pub source_format: SourceFormat,
    /// DASH `MPD@minimumUpdatePeriod`, when live. The scheduling driver passes this to
    /// [`crate::scheduler::dash_refresh_delay`] to pick the next tick. `None` for HLS and for VOD.
    pub minimum_update_period: Option<std::time::Duration>,
    /// The largest `#EXT-X-TARGETDURATION` across this manifest's HLS media playlists, when live.
    /// The scheduling driver passes this to [`crate::scheduler::hls_refresh_delay`]. `None` for
    /// DASH and for VOD.
    pub target_duration: Option<std::time::Duration>,
    /// HLS `EXT-X-CONTENT-STEERING` `SERVER-URI`, when declared. Absent for DASH (content
    /// steering is an HLS-only mechanism); the caller constructs and drives a
    /// [`crate::steering::ContentSteeringClient`] from it independently of [`crate::parse`]/
    /// [`crate::refresh`].
    pub content_steering_uri: Option<Url>,
    /// Non-fatal occurrences collected while building this manifest: `EXT-X-SESSION-DATA`,
    /// `EXT-X-DATERANGE`/interstitial metadata, DASH `EventStream` events and SCTE-35 signals.
    /// The caller is expected to drain and re-emit these through its own event bus; [`crate::parse`]
    /// and [`crate::refresh`] only collect them (the latter also appends
    /// [`ManifestEvent::ManifestUpdated`] once it's done merging).
    pub events: Vec<ManifestEvent>,
}

impl Manifest {
    pub fn all_streams(&self) -> Vec<StreamHandle> {
        let mut out = Vec::new();
        for v in &self.variants {
            if let Some(a) = &v.audio {
                out.push(Arc::clone(a));
            }
            if let Some(vid) = &v.video {
                out.push(Arc::clone(vid));
            }
        }
        out.extend(self.text_streams.iter().cloned());
        out.extend(self.image_streams.iter().cloned());
        out
    }
}

/// Monotonic id allocator for `Stream`/`Variant` objects within one parse, so identity survives
/// refreshes without needing interior-mutable counters threaded through every call site.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: std::sync::atomic::AtomicU64,
}

impl IdAllocator {
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}
