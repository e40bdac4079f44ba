//! Typed MPD XML model, deserialized with `quick-xml`/`serde`.
//!
//! `ContentProtection` carries `schemeIdUri`, and the xlink-capable elements and attribute sets
//! needed for the inheritance/xlink rules are modelled explicitly.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Mpd {
    #[serde(rename = "@type", default)]
    pub mpd_type: Option<String>,
    #[serde(rename = "@availabilityStartTime")]
    pub availability_start_time: Option<String>,
    #[serde(rename = "@publishTime")]
    pub publish_time: Option<String>,
    #[serde(rename = "@mediaPresentationDuration")]
    pub media_presentation_duration: Option<String>,
    #[serde(rename = "@minimumUpdatePeriod")]
    pub minimum_update_period: Option<String>,
    #[serde(rename = "@minBufferTime")]
    pub min_buffer_time: Option<String>,
    #[serde(rename = "@timeShiftBufferDepth")]
    pub time_shift_buffer_depth: Option<String>,
    #[serde(rename = "@suggestedPresentationDelay")]
    pub suggested_presentation_delay: Option<String>,
    #[serde(rename = "BaseURL", default)]
    pub base_url: Vec<BaseUrl>,
    #[serde(rename = "UTCTiming", default)]
    pub utc_timing: Vec<UtcTiming>,
    #[serde(rename = "Period", default)]
    pub period: Vec<Period>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BaseUrl {
    #[serde(rename = "$text", default)]
    pub text: String,
    #[serde(rename = "@serviceLocation")]
    pub service_location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UtcTiming {
    #[serde(rename = "@schemeIdUri")]
    pub scheme_id_uri: String,
    #[serde(rename = "@value")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Period {
    #[serde(rename = "@id")]
    pub id: Option<String>,
    #[serde(rename = "@start")]
    pub start: Option<String>,
    #[serde(rename = "@duration")]
    pub duration: Option<String>,
    #[serde(rename = "@xlink:href")]
    pub xlink_href: Option<String>,
    #[serde(rename = "@xlink:actuate", default = "default_on_load")]
    pub xlink_actuate: String,
    #[serde(rename = "BaseURL", default)]
    pub base_url: Vec<BaseUrl>,
    #[serde(rename = "EventStream", default)]
    pub event_stream: Vec<EventStream>,
    #[serde(rename = "AdaptationSet", default)]
    pub adaptation_set: Vec<AdaptationSet>,
}

fn default_on_load() -> String {
    "onLoad".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventStream {
    #[serde(rename = "@schemeIdUri")]
    pub scheme_id_uri: String,
    #[serde(rename = "@value")]
    pub value: Option<String>,
    #[serde(rename = "@timescale")]
    pub timescale: Option<u64>,
    #[serde(rename = "Event", default)]
    pub event: Vec<DashEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DashEvent {
    #[serde(rename = "@presentationTime")]
    pub presentation_time: Option<u64>,
    #[serde(rename = "@duration")]
    pub duration: Option<u64>,
    #[serde(rename = "@id")]
    pub id: Option<String>,
    #[serde(rename = "$text", default)]
    pub text: Option<String>,
    #[serde(rename = "Signal", default)]
    pub signal: Vec<Scte35Signal>,
}

/// `scte35:Signal`/`scte35:Binary` passthrough, trimmed to decoding only (no splice-command
/// interpretation — that belongs to the embedder's ad-insertion logic).
#[derive(Debug, Clone, Deserialize)]
pub struct Scte35Signal {
    #[serde(rename = "Binary", default)]
    pub binary: Vec<Scte35Binary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scte35Binary {
    #[serde(rename = "$text", default)]
    pub base64_data: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdaptationSet {
    #[serde(rename = "@id")]
    pub id: Option<String>,
    #[serde(rename = "@contentType")]
    pub content_type: Option<String>,
    #[serde(rename = "@mimeType")]
    pub mime_type: Option<String>,
    #[serde(rename = "@codecs")]
    pub codecs: Option<String>,
    #[serde(rename = "@lang")]
    pub lang: Option<String>,
    #[serde(rename = "@width")]
    pub width: Option<u64>,
    #[serde(rename = "@height")]
    pub height: Option<u64>,
    #[serde(rename = "@frameRate")]
    pub frame_rate: Option<String>,
    #[serde(rename = "@par")]
    pub par: Option<String>,
    #[serde(rename = "@segmentAlignment", default)]
    pub segment_alignment: bool,
    #[serde(rename = "BaseURL", default)]
    pub base_url: Vec<BaseUrl>,
    #[serde(rename = "Role", default)]
    pub role: Vec<Descriptor>,
    #[serde(rename = "Accessibility", default)]
    pub accessibility: Vec<Descriptor>,
    #[serde(rename = "Label", default)]
    pub label: Vec<LabelElement>,
    #[serde(rename = "ContentProtection", default)]
    pub content_protection: Vec<ContentProtection>,
    #[serde(rename = "EssentialProperty", default)]
    pub essential_property: Vec<Descriptor>,
    #[serde(rename = "SupplementalProperty", default)]
    pub supplemental_property: Vec<Descriptor>,
    #[serde(rename = "SegmentTemplate")]
    pub segment_template: Option<SegmentTemplate>,
    #[serde(rename = "SegmentList")]
    pub segment_list: Option<SegmentList>,
    #[serde(rename = "SegmentBase")]
    pub segment_base: Option<SegmentBase>,
    #[serde(rename = "Representation", default)]
    pub representation: Vec<Representation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelElement {
    #[serde(rename = "$text", default)]
    pub text: String,
}

/// A generic `urn:`-scheme-identified descriptor element: `Role`, `Accessibility`,
/// `EssentialProperty`, `SupplementalProperty` all share this shape.
#[derive(Debug, Clone, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "@schemeIdUri")]
    pub scheme_id_uri: String,
    #[serde(rename = "@value")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentProtection {
    #[serde(rename = "@schemeIdUri")]
    pub scheme_id_uri: String,
    #[serde(rename = "@value")]
    pub value: Option<String>,
    #[serde(rename = "@cenc:default_KID")]
    pub default_kid: Option<String>,
    #[serde(rename = "pssh", default)]
    pub pssh: Vec<CencPssh>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CencPssh {
    #[serde(rename = "$text", default)]
    pub base64_data: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Representation {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@bandwidth")]
    pub bandwidth: Option<u64>,
    #[serde(rename = "@codecs")]
    pub codecs: Option<String>,
    #[serde(rename = "@mimeType")]
    pub mime_type: Option<String>,
    #[serde(rename = "@width")]
    pub width: Option<u64>,
    #[serde(rename = "@height")]
    pub height: Option<u64>,
    #[serde(rename = "@frameRate")]
    pub frame_rate: Option<String>,
    #[serde(rename = "@audioSamplingRate")]
    pub audio_sampling_rate: Option<u64>,
    #[serde(rename = "BaseURL", default)]
    pub base_url: Vec<BaseUrl>,
    #[serde(rename = "AudioChannelConfiguration", default)]
    pub audio_channel_configuration: Vec<Descriptor>,
    #[serde(rename = "EssentialProperty", default)]
    pub essential_property: Vec<Descriptor>,
    #[serde(rename = "SupplementalProperty", default)]
    pub supplemental_property: Vec<Descriptor>,
    #[serde(rename = "ContentProtection", default)]
    pub content_protection: Vec<ContentProtection>,
    #[serde(rename = "SegmentTemplate")]
    pub segment_template: Option<SegmentTemplate>,
    #[serde(rename = "SegmentList")]
    pub segment_list: Option<SegmentList>,
    #[serde(rename = "SegmentBase")]
    pub segment_base: Option<SegmentBase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentTemplate {
    #[serde(rename = "@media")]
    pub media: Option<String>,
    #[serde(rename = "@initialization")]
    pub initialization: Option<String>,
    #[serde(rename = "@startNumber", default = "default_start_number")]
    pub start_number: u64,
    #[serde(rename = "@timescale", default = "default_timescale")]
    pub timescale: u64,
    #[serde(rename = "@duration")]
    pub duration: Option<u64>,
    #[serde(rename = "SegmentTimeline")]
    pub segment_timeline: Option<SegmentTimeline>,
}

fn default_start_number() -> u64 {
    1
}
fn default_timescale() -> u64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentTimeline {
    #[serde(rename = "S", default)]
    pub s: Vec<SegmentTimelineEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentTimelineEntry {
    #[serde(rename = "@t")]
    pub t: Option<u64>,
    #[serde(rename = "@d")]
    pub d: u64,
    #[serde(rename = "@r", default)]
    pub r: i64,
    #[serde(rename = "@k", default = "default_k")]
    pub k: u64,
}

fn default_k() -> u64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentList {
    #[serde(rename = "@duration")]
    pub duration: Option<u64>,
    #[serde(rename = "@timescale", default = "default_timescale")]
    pub timescale: u64,
    #[serde(rename = "Initialization")]
    pub initialization: Option<InitializationElement>,
    #[serde(rename = "SegmentURL", default)]
    pub segment_url: Vec<SegmentUrl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitializationElement {
    #[serde(rename = "@sourceURL")]
    pub source_url: Option<String>,
    #[serde(rename = "@range")]
    pub range: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentUrl {
    #[serde(rename = "@media")]
    pub media: Option<String>,
    #[serde(rename = "@mediaRange")]
    pub media_range: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentBase {
    #[serde(rename = "@indexRange")]
    pub index_range: Option<String>,
    #[serde(rename = "@timescale", default = "default_timescale")]
    pub timescale: u64,
    #[serde(rename = "Initialization")]
    pub initialization: Option<InitializationElement>,
}
