//! Event and metadata payloads delivered to the caller through `onEvent`/`onMetadata`.

/// An event raised by the parser for the caller's `onEvent` callback. These are informational;
/// none of them block parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestEvent {
    /// HLS `#EXT-X-SESSION-DATA`.
    SessionData {
        id: String,
        language: Option<String>,
        value: Option<String>,
        uri: Option<String>,
    },
    /// DASH in-band event stream carrying `emsg`-equivalent box data, or a `scte35:Signal`
    /// passthrough recognised in an `EventStream`.
    Emsg {
        scheme_id_uri: String,
        value: Option<String>,
        id: Option<String>,
        presentation_time: f64,
        duration: Option<f64>,
        message_data: Vec<u8>,
    },
    /// A DASH `EventStream` region became known (covers a span of the timeline rather than a
    /// single instant).
    TimelineRegionAdded {
        scheme_id_uri: String,
        start_time: f64,
        end_time: f64,
        id: Option<String>,
    },
    /// Free-form metadata: HLS `EXT-X-DATERANGE`, `com.apple.hls.interstitial` class regions,
    /// in-band ID3.
    Metadata(Metadata),
    /// Fired exactly once after a successful [`crate::refresh`] call, once every matched stream's
    /// segment index has been merged and the timeline updated.
    ManifestUpdated,
}

/// A metadata cue with a start time and an optional end time, plus a bag of key/value strings —
/// used for HLS DATERANGE records (including the interstitial profile) and ID3 passthrough.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub metadata_type: String,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub values: Vec<(String, String)>,
}

/// Non-fatal warning raised while parsing or refreshing; distinct from the `Result` returned by
/// `parse`, which only fails for `Severity::Critical` errors.
#[derive(Debug, Clone)]
pub struct ManifestWarning {
    pub error: String,
    pub context: crate::error::ErrorContext,
}
