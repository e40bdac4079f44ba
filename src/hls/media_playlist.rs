//! HLS media playlist parsing: stateful per-segment tag accumulation and start-time derivation.

use std::sync::Arc;

use url::Url;

use crate::events::{ManifestEvent, Metadata};
use crate::hls::drm::{build_aes_key, parse_key_tag, KeyDescriptor};
use crate::hls::tags::{tokenize, Line, TagAttributes};
use crate::segment_index::{
    InitSegmentReference, PartialSegmentReference, SegmentIndex, SegmentReference, SegmentStatus,
};
use crate::timeline::PresentationTimeline;
use crate::uri::{BaseUriChain, VariableScope};
use crate::error::ManifestError;

/// Playlist-level state gathered from `#EXT-X-*` tags that precede the first segment, plus the
/// running per-segment accumulator state as each `#EXTINF`/URI pair closes a segment.
#[derive(Default)]
struct Accumulator {
    target_duration: f64,
    media_sequence: u64,
    discontinuity_sequence: u64,
    playlist_type_event: bool,
    ended: bool,
    low_latency_part_target: Option<f64>,
    independent_segments: bool,

    // Per-segment pending state, reset after each URI line closes a segment.
    pending_duration: Option<f64>,
    pending_byte_range: Option<(u64, Option<u64>)>,
    pending_discontinuity: bool,
    pending_program_date_time: Option<i64>,
    pending_gap: bool,
    pending_bitrate: Option<u64>,
    pending_parts: Vec<PartialSegmentReference>,

    // Sticky state that persists across segments until replaced.
    current_init: Option<Arc<InitSegmentReference>>,
    current_key: KeyDescriptor,
    current_tiles_layout: Option<String>,
}

pub struct ParsedMediaPlaylist {
    pub segment_index: SegmentIndex,
    pub timeline: PresentationTimeline,
    pub is_live: bool,
    pub events: Vec<ManifestEvent>,
    /// `#EXT-X-TARGETDURATION`, seconds; the refresh interval a scheduling driver should use via
    /// [`crate::scheduler::hls_refresh_delay`].
    pub target_duration: f64,
    /// `#EXT-X-START:TIME-OFFSET=`, surfaced as `Manifest::start_time`.
    pub start_time_offset: Option<f64>,
}

pub fn parse_media_playlist(
    document: &str,
    base: &BaseUriChain,
    parent_scope: Option<&VariableScope>,
    now_anchor: Option<(f64, i64)>,
) -> Result<ParsedMediaPlaylist, ManifestError> {
    let lines = tokenize(document);
    let mut scope = VariableScope::new();
    let mut acc = Accumulator::default();
    let mut refs = Vec::new();
    let mut events = Vec::new();
    let mut next_byte_offset = 0u64;
    let mut start_time = 0.0f64;
    let mut start_time_offset = None;

    for line in &lines {
        match line {
            Line::Tag { name, attributes } if name == "#EXT-X-DEFINE" => {
                if let Some(import) = attributes.get_str("IMPORT") {
                    if let Some(parent) = parent_scope {
                        scope.import_from(import, parent);
                    }
                } else if let (Some(n), Some(v)) = (attributes.get_str("NAME"), attributes.get_str("VALUE")) {
                    scope.define(n, v);
                } else if let Some(q) = attributes.get_str("QUERYPARAM") {
                    scope.define_from_query_param(q, base.current());
                }
            }
            Line::ValueTag { name, value } if name == "#EXT-X-TARGETDURATION" => {
                acc.target_duration = value.trim().parse().unwrap_or(0.0);
            }
            Line::ValueTag { name, value } if name == "#EXT-X-MEDIA-SEQUENCE" => {
                acc.media_sequence = value.trim().parse().unwrap_or(0);
            }
            Line::ValueTag { name, value } if name == "#EXT-X-DISCONTINUITY-SEQUENCE" => {
                acc.discontinuity_sequence = value.trim().parse().unwrap_or(0);
            }
            Line::ValueTag { name, value } if name == "#EXT-X-PLAYLIST-TYPE" => {
                acc.playlist_type_event = value.trim() == "EVENT";
            }
            Line::Tag { name, .. } if name == "#EXT-X-ENDLIST" => {
                acc.ended = true;
            }
            Line::Tag { name, .. } if name == "#EXT-X-INDEPENDENT-SEGMENTS" => {
                acc.independent_segments = true;
            }
            Line::Tag { name, attributes } if name == "#EXT-X-START" => {
                start_time_offset = attributes.get_f64("TIME-OFFSET");
            }
            Line::Tag { name, attributes } if name == "#EXT-X-PART-INF" => {
                acc.low_latency_part_target = attributes.get_f64("PART-TARGET");
            }
            Line::ValueTag { name, value } if name == "#EXTINF" => {
                let duration_str = value.split(',').next().unwrap_or(value);
                acc.pending_duration = duration_str.trim().parse().ok();
            }
            Line::ValueTag { name, value } if name == "#EXT-X-BYTERANGE" => {
                acc.pending_byte_range = Some(parse_byterange(value, next_byte_offset));
            }
            Line::Tag { name, .. } if name == "#EXT-X-DISCONTINUITY" => {
                acc.pending_discontinuity = true;
            }
            Line::ValueTag { name, value } if name == "#EXT-X-PROGRAM-DATE-TIME" => {
                acc.pending_program_date_time = parse_program_date_time(value);
            }
            Line::Tag { name, .. } if name == "#EXT-X-GAP" => {
                acc.pending_gap = true;
            }
            Line::ValueTag { name, value } if name == "#EXT-X-BITRATE" => {
                acc.pending_bitrate = value.trim().parse().ok();
            }
            Line::Tag { name, attributes } if name == "#EXT-X-MAP" => {
                let media_sequence_number = acc.media_sequence + refs.len() as u64;
                acc.current_init =
                    Some(Arc::new(parse_map_tag(attributes, base, &scope, &acc.current_key, media_sequence_number)?));
            }
            Line::Tag { name, attributes } if name == "#EXT-X-KEY" => {
                acc.current_key = parse_key_tag_with_uri(attributes, base, &scope)?;
            }
            Line::Tag { name, attributes } if name == "#EXT-X-PART" => {
                acc.pending_parts.push(parse_part_tag(attributes, base, &scope, false)?);
            }
            Line::Tag { name, attributes } if name == "#EXT-X-PRELOAD-HINT" => {
                if attributes.get_str("TYPE") == Some("PART") {
                    acc.pending_parts.push(parse_part_tag(attributes, base, &scope, true)?);
                }
            }
            Line::Tag { name, attributes } if name == "#EXT-X-DATERANGE" => {
                events.push(parse_daterange(attributes));
            }
            Line::Uri(raw) => {
                let uri = base.resolve(&scope.substitute(raw))?;
                let duration = acc.pending_duration.take().unwrap_or(acc.target_duration);
                let (seg_start, seg_end) = (start_time, start_time + duration);

                if acc.pending_discontinuity {
                    acc.discontinuity_sequence += 1;
                    acc.pending_discontinuity = false;
                }

                let (start_byte, end_byte) = acc.pending_byte_range.take().unwrap_or((0, None));
                next_byte_offset = end_byte.map(|e| e + 1).unwrap_or(0);

                let media_sequence_number = acc.media_sequence + refs.len() as u64;
                let aes_key = match &acc.current_key {
                    KeyDescriptor::Aes128 { key_uri, iv_override } => {
                        Some(Arc::new(build_aes_key(key_uri.clone(), *iv_override, media_sequence_number)))
                    }
                    _ => None,
                };
                let drm_info = match &acc.current_key {
                    KeyDescriptor::SampleAes(info) => vec![info.clone()],
                    _ => Vec::new(),
                };

                refs.push(SegmentReference {
                    start_time: seg_start,
                    end_time: seg_end,
                    uris: vec![uri.to_string()],
                    start_byte,
                    end_byte,
                    init_segment_reference: acc.current_init.clone(),
                    timestamp_offset: 0.0,
                    append_window_start: 0.0,
                    append_window_end: f64::INFINITY,
                    partial_references: std::mem::take(&mut acc.pending_parts),
                    status: if acc.pending_gap { SegmentStatus::Missing } else { SegmentStatus::Available },
                    discontinuity_sequence: acc.discontinuity_sequence,
                    aes_key,
                    sync_time: acc.pending_program_date_time,
                    media_sequence_number: Some(media_sequence_number),
                    tiles_layout: acc.current_tiles_layout.clone(),
                    drm_info,
                });
                acc.pending_gap = false;
                acc.pending_program_date_time = None;
                start_time = seg_end;
            }
            _ => {}
        }
    }

    if let Some((anchor_start, _anchor_pdt)) = now_anchor {
        start_time = anchor_start;
        if let Some(first) = refs.first_mut() {
            let shift = anchor_start - first.start_time;
            for r in &mut refs {
                r.start_time += shift;
                r.end_time += shift;
            }
        }
    }

    let is_live = !acc.ended;
    let segment_index = SegmentIndex::from_refs(refs)
        .map_err(|e| ManifestError::UnparsableSegment(e.to_string()))?;
    let duration_seconds = segment_index.iter().last().map(|r| r.end_time).unwrap_or(0.0);

    let mut timeline = if is_live && !acc.playlist_type_event {
        PresentationTimeline::new_live(0, None, acc.target_duration)
    } else {
        PresentationTimeline::new_vod(duration_seconds)
    };
    timeline.set_in_progress(acc.playlist_type_event && is_live);
    timeline.notify_max_segment_duration(acc.target_duration);

    Ok(ParsedMediaPlaylist { segment_index, timeline, is_live, events, target_duration: acc.target_duration, start_time_offset })
}

fn parse_byterange(raw: &str, next_offset: u64) -> (u64, Option<u64>) {
    let mut parts = raw.splitn(2, '@');
    let length: u64 = parts.next().and_then(|s| s.trim().parse().ok()).unwrap_or(0);
    let start = parts.next().and_then(|s| s.trim().parse().ok()).unwrap_or(next_offset);
    (start, Some(start + length.saturating_sub(1)))
}

/// Parses `PROGRAM-DATE-TIME` (an ISO 8601 timestamp) to milliseconds since the Unix epoch.
fn parse_program_date_time(raw: &str) -> Option<i64> {
    let parsed = iso8601::datetime(raw.trim()).ok()?;
    let naive_date = match parsed.date {
        iso8601::Date::YMD { year, month, day } => chrono::NaiveDate::from_ymd_opt(year, month, day)?,
        iso8601::Date::Week { year, ww, d } => {
            chrono::NaiveDate::from_isoywd_opt(year, ww, chrono::Weekday::try_from((d as u8).saturating_sub(1)).ok()?)?
        }
        iso8601::Date::Ordinal { year, ddd } => chrono::NaiveDate::from_yo_opt(year, ddd)?,
    };
    let time = parsed.time;
    let naive_time = chrono::NaiveTime::from_hms_milli_opt(time.hour, time.minute, time.second, time.millisecond)?;
    let naive = naive_date.and_time(naive_time);
    let utc = naive - chrono::Duration::minutes(time.tz_offset_hours as i64 * 60 + time.tz_offset_minutes as i64);
    Some(utc.and_utc().timestamp_millis())
}

fn parse_map_tag(
    attrs: &TagAttributes,
    base: &BaseUriChain,
    scope: &VariableScope,
    current_key: &KeyDescriptor,
    media_sequence_number: u64,
) -> Result<InitSegmentReference, ManifestError> {
    let uri_attr = attrs.get_str("URI").ok_or_else(|| ManifestError::RequiredAttributeMissing {
        element: "EXT-X-MAP".into(),
        attribute: "URI".into(),
    })?;
    let uri = base.resolve(&scope.substitute(uri_attr))?;
    let (start_byte, end_byte) = attrs
        .get_str("BYTERANGE")
        .map(|r| parse_byterange(r, 0))
        .unwrap_or((0, None));
    // Under an AES-128 key scope the init section is encrypted the same as the segments it
    // precedes, keyed by the media sequence number of the next segment to be emitted.
    let aes_key = match current_key {
        KeyDescriptor::Aes128 { key_uri, iv_override } => {
            Some(build_aes_key(key_uri.clone(), *iv_override, media_sequence_number))
        }
        _ => None,
    };
    Ok(InitSegmentReference { uris: vec![uri.to_string()], start_byte, end_byte, media_quality: None, aes_key })
}

fn parse_key_tag_with_uri(attrs: &TagAttributes, base: &BaseUriChain, scope: &VariableScope) -> Result<KeyDescriptor, ManifestError> {
    let descriptor = parse_key_tag(attrs, false)?;
    Ok(match descriptor {
        KeyDescriptor::Aes128 { key_uri, iv_override } => {
            let resolved_uri = base.resolve(&scope.substitute(&key_uri))?;
            KeyDescriptor::Aes128 { key_uri: resolved_uri.to_string(), iv_override }
        }
        other => other,
    })
}

fn parse_part_tag(
    attrs: &TagAttributes,
    base: &BaseUriChain,
    scope: &VariableScope,
    speculative: bool,
) -> Result<PartialSegmentReference, ManifestError> {
    let uri_attr = attrs.get_str("URI").ok_or_else(|| ManifestError::RequiredAttributeMissing {
        element: if speculative { "EXT-X-PRELOAD-HINT" } else { "EXT-X-PART" }.into(),
        attribute: "URI".into(),
    })?;
    let uri = base.resolve(&scope.substitute(uri_attr))?;
    let duration = attrs.get_f64("DURATION").unwrap_or(0.0);
    let (start_byte, end_byte) = attrs.get_str("BYTERANGE").map(|r| parse_byterange(r, 0)).unwrap_or((0, None));
    Ok(PartialSegmentReference {
        start_time: 0.0,
        end_time: duration,
        uri: uri.to_string(),
        start_byte,
        end_byte,
        independent: attrs.get_bool("INDEPENDENT"),
        speculative,
    })
}

/// `#EXT-X-DATERANGE` and its `com.apple.hls.interstitial` CLASS profile carry arbitrary
/// `X-`-prefixed client attributes alongside the standard ones; all are surfaced as metadata
/// key/value pairs.
fn parse_daterange(attrs: &TagAttributes) -> ManifestEvent {
    let start = attrs
        .get_str("START-DATE")
        .and_then(parse_program_date_time)
        .map(|ms| ms as f64 / 1000.0)
        .unwrap_or(0.0);
    let end = attrs
        .get_str("END-DATE")
        .and_then(parse_program_date_time)
        .map(|ms| ms as f64 / 1000.0)
        .or_else(|| attrs.get_f64("DURATION").map(|d| start + d));
    let class = attrs.get_owned("CLASS").unwrap_or_else(|| "org.id3".to_string());
    let mut values = Vec::new();
    for key in ["ID", "CLASS", "X-ASSET-URI", "X-ASSET-LIST", "X-RESUME-OFFSET", "X-PLAYOUT-LIMIT", "X-SNAP"] {
        if let Some(v) = attrs.get_str(key) {
            values.push((key.to_string(), v.to_string()));
        }
    }
    ManifestEvent::Metadata(Metadata { metadata_type: class, start_time: start, end_time: end, values })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BaseUriChain {
        BaseUriChain::new(Url::parse("https://example.com/live/index.m3u8").unwrap())
    }

    #[test]
    fn parses_vod_playlist_with_single_init_and_segment() {
        let doc = "#EXTM3U\n\
            #EXT-X-TARGETDURATION:10\n\
            #EXT-X-PLAYLIST-TYPE:VOD\n\
            #EXT-X-MAP:URI=\"init.mp4\",BYTERANGE=\"615@0\"\n\
            #EXTINF:10.0,\n\
            #EXT-X-BYTERANGE:1000000@615\n\
            seg-1.m4s\n\
            #EXT-X-ENDLIST\n";
        // single init segment followed by one byte-ranged media segment
        let parsed = parse_media_playlist(doc, &base(), None, None).unwrap();
        assert!(!parsed.is_live);
        assert_eq!(parsed.segment_index.len(), 1);
        let seg = parsed.segment_index.get(0).unwrap();
        assert_eq!(seg.start_byte, 615);
        assert_eq!(seg.end_byte, Some(615 + 1_000_000 - 1));
        let init = seg.init_segment_reference.as_ref().unwrap();
        assert_eq!(init.start_byte, 0);
        assert_eq!(init.end_byte, Some(614));
    }

    #[test]
    fn discontinuity_increments_sequence() {
        let doc = "#EXTM3U\n\
            #EXT-X-TARGETDURATION:5\n\
            #EXT-X-PLAYLIST-TYPE:VOD\n\
            #EXTINF:5.0,\n\
            seg-1.ts\n\
            #EXT-X-DISCONTINUITY\n\
            #EXTINF:5.0,\n\
            seg-2.ts\n\
            #EXT-X-ENDLIST\n";
        let parsed = parse_media_playlist(doc, &base(), None, None).unwrap();
        assert_eq!(parsed.segment_index.get(0).unwrap().discontinuity_sequence, 0);
        assert_eq!(parsed.segment_index.get(1).unwrap().discontinuity_sequence, 1);
    }

    #[test]
    fn gap_tag_marks_segment_missing() {
        let doc = "#EXTM3U\n#EXT-X-TARGETDURATION:5\n#EXT-X-PLAYLIST-TYPE:VOD\n#EXT-X-GAP\n#EXTINF:5.0,\nseg-1.ts\n#EXT-X-ENDLIST\n";
        let parsed = parse_media_playlist(doc, &base(), None, None).unwrap();
        assert_eq!(parsed.segment_index.get(0).unwrap().status, SegmentStatus::Missing);
    }

    #[test]
    fn live_playlist_without_endlist_is_live() {
        let doc = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXT-X-MEDIA-SEQUENCE:0\n#EXTINF:6.0,\nseg-1.ts\n";
        let parsed = parse_media_playlist(doc, &base(), None, None).unwrap();
        assert!(parsed.is_live);
    }

    #[test]
    fn daterange_interstitial_becomes_metadata_event() {
        let doc = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXT-X-PLAYLIST-TYPE:VOD\n\
            #EXT-X-DATERANGE:ID=\"ad1\",CLASS=\"com.apple.hls.interstitial\",START-DATE=\"2026-01-01T00:00:00.000Z\",DURATION=30\n\
            #EXTINF:6.0,\nseg-1.ts\n#EXT-X-ENDLIST\n";
        let parsed = parse_media_playlist(doc, &base(), None, None).unwrap();
        assert_eq!(parsed.events.len(), 1);
        match &parsed.events[0] {
            ManifestEvent::Metadata(m) => {
                assert_eq!(m.metadata_type, "com.apple.hls.interstitial");
                assert_eq!(m.end_time, Some(30.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
