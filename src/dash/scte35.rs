//! `scte35:Signal`/`scte35:Binary` passthrough for DASH `EventStream` elements whose
//! `schemeIdUri` is `urn:scte:scte35:2013:xml`: decodes just enough of the binary
//! `splice_info_section` to report its `splice_command_type`, then hands the whole payload to the
//! caller as a [`ManifestEvent::Metadata`] — splice-command interpretation (ad break boundaries,
//! `PrivateCommand` payloads) is the embedder's ad-insertion logic, not this engine's.

use base64::Engine;

use crate::dash::model::DashEvent;
use crate::events::{ManifestEvent, Metadata};

const SCTE35_EVENT_STREAM_SCHEME: &str = "urn:scte:scte35:2013:xml";

pub fn is_scte35_event_stream(scheme_id_uri: &str) -> bool {
    scheme_id_uri == SCTE35_EVENT_STREAM_SCHEME
}

/// Builds one `Metadata` event per `scte35:Binary` payload on `event`, anchored to the
/// EventStream's `@timescale` (defaulting to 1, same as `SegmentTimeline`'s).
pub fn build_events(event: &DashEvent, timescale: u64) -> Vec<ManifestEvent> {
    let timescale = timescale.max(1) as f64;
    let start_time = event.presentation_time.unwrap_or(0) as f64 / timescale;
    let end_time = event.duration.map(|d| start_time + d as f64 / timescale);

    let mut out = Vec::new();
    for signal in &event.signal {
        for binary in &signal.binary {
            let trimmed = binary.base64_data.trim();
            let Ok(raw) = base64::engine::general_purpose::STANDARD.decode(trimmed) else {
                continue;
            };
            let mut values = vec![("payloadBase64".to_string(), trimmed.to_string())];
            if let Some(command) = splice_command_type_name(&raw) {
                values.push(("spliceCommandType".to_string(), command.to_string()));
            }
            if let Some(id) = &event.id {
                values.push(("eventId".to_string(), id.clone()));
            }
            out.push(ManifestEvent::Metadata(Metadata {
                metadata_type: "scte35".to_string(),
                start_time,
                end_time,
                values,
            }));
        }
    }
    out
}

/// Reads the fixed-width header fields of a `splice_info_section` (SCTE 35 §9.2) up to and
/// including `splice_command_type`, without interpreting the command body that follows.
fn splice_command_type_name(section: &[u8]) -> Option<&'static str> {
    let command_type = *section.get(13)?;
    Some(match command_type {
        0x00 => "splice_null",
        0x04 => "splice_schedule",
        0x05 => "splice_insert",
        0x06 => "time_signal",
        0x07 => "bandwidth_reservation",
        0xff => "private_command",
        _ => return None,
    })
}
