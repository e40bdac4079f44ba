//! Manifest-wide configuration options recognised by both parsers.
//!
//! A `ManifestConfig` is built once by the caller and passed by reference into `parse`; it is
//! immutable for the lifetime of the `Manifest` it produces, same as a `VariableScope` is
//! immutable after parse.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy delegated to the [`crate::fetch::Fetcher`] implementation. The facade itself
/// doesn't impose retries beyond what's configured here; most of this is consumed by the
/// default `reqwest`-backed fetcher behind the `fetch` feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryParameters {
    pub max_retries: u32,
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
}

impl Default for RetryParameters {
    fn default() -> Self {
        RetryParameters {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Manifest-wide options recognised by the DASH and HLS parsers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Don't emit `DrmInfo` records at all, even when the manifest signals ContentProtection /
    /// EXT-X-KEY.
    pub ignore_drm_info: bool,
    /// Drop a text stream rather than failing the whole parse when it cannot be constructed.
    pub ignore_text_stream_failures: bool,
    /// Drop an image/thumbnail stream rather than failing the whole parse when it cannot be
    /// constructed.
    pub ignore_image_stream_failures: bool,
    /// Don't emit the additional enhanced-codec variant implied by HLS SUPPLEMENTAL-CODECS.
    pub ignore_supplemental_codecs: bool,
    pub disable_audio: bool,
    pub disable_video: bool,
    pub disable_text: bool,
    pub disable_thumbnails: bool,
    pub disable_i_frames: bool,
    /// Overrides the sliding window computed from `timeShiftBufferDepth` / server-control.
    #[serde(with = "humantime_serde::option")]
    pub availability_window_override: Option<Duration>,
    /// HLS: number segments/discontinuities using the sequence-number space instead of deriving
    /// presentation times from PROGRAM-DATE-TIME; a hint passed through to downstream consumers
    /// as `Manifest::sequence_mode`.
    pub hls_sequence_mode: bool,
    /// HLS: never use EXT-X-PROGRAM-DATE-TIME for cross-rendition alignment; fall back to
    /// media-sequence-number equality.
    pub hls_ignore_manifest_program_date_time: bool,
    /// MIME type assumed when a bare HLS media playlist (no master) is parsed and no better
    /// information is available.
    pub hls_media_playlist_full_mime_type: String,
    /// Skip the CODECS/extension/HEAD-request MIME & codec inference pipeline entirely and
    /// always fall back to `hls_media_playlist_full_mime_type`.
    pub hls_disable_codec_guessing: bool,
    /// Treat `MPD@minBufferTime` as absent even when present (some DASH-IF conformance test
    /// vectors encode bogus values).
    pub dash_ignore_min_buffer_time: bool,
    pub retry_parameters: RetryParameters,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        ManifestConfig {
            ignore_drm_info: false,
            ignore_text_stream_failures: false,
            ignore_image_stream_failures: false,
            ignore_supplemental_codecs: false,
            disable_audio: false,
            disable_video: false,
            disable_text: false,
            disable_thumbnails: false,
            disable_i_frames: false,
            availability_window_override: None,
            hls_sequence_mode: false,
            hls_ignore_manifest_program_date_time: false,
            hls_media_playlist_full_mime_type: String::from("video/mp4"),
            hls_disable_codec_guessing: false,
            dash_ignore_min_buffer_time: false,
            retry_parameters: RetryParameters::default(),
        }
    }
}
