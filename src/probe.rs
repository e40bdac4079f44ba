//! Media-container probe: extract the first presentation timestamp from a segment's leading
//! bytes.
//!
//! This never demuxes a full stream (that's explicitly out of scope); it only reads enough of
//! the box/packet structure to recover `(timescale, base_media_decode_time)` for MP4, or a
//! rollover-corrected PTS for MPEG-TS and raw AAC/MP3.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::error::ManifestError;

const MPEG_TS_PACKET_LEN: usize = 188;
const MPEG_TS_SYNC_BYTE: u8 = 0x47;
/// `2^33`, the PTS wraparound modulus expressed in 90kHz ticks.
const PTS_ROLLOVER_TICKS: i64 = 1 << 33;
const PTS_CLOCK_HZ: f64 = 90_000.0;

/// The first presentation timestamp recovered from a segment, expressed in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbedTimestamp {
    pub timescale: u64,
    pub base_media_decode_time: u64,
}

impl ProbedTimestamp {
    pub fn seconds(&self) -> f64 {
        self.base_media_decode_time as f64 / self.timescale as f64
    }
}

/// Walks top-level ISO-BMFF boxes in `moof_bytes`, descending `moof -> traf -> tfdt` to recover
/// the decode time, and reads `timescale` from `moov -> trak -> mdia -> mdhd` of the
/// accompanying init segment.
pub fn probe_mp4_tfdt(init_segment: &[u8], moof_bytes: &[u8]) -> Result<ProbedTimestamp, ManifestError> {
    let timescale = find_mdhd_timescale(init_segment)
        .ok_or_else(|| ManifestError::UnparsableSegment("mdhd timescale not found in init segment".into()))?;
    let base_media_decode_time = find_tfdt_decode_time(moof_bytes)
        .ok_or_else(|| ManifestError::UnparsableSegment("tfdt box not found in segment".into()))?;
    Ok(ProbedTimestamp { timescale, base_media_decode_time })
}

/// Iterates top-level boxes (`size: u32, fourcc: [u8;4], body`) at the current nesting level,
/// recursing into known container boxes, until `visit` returns `Some`.
fn walk_boxes<T>(bytes: &[u8], containers: &[&[u8; 4]], visit: &mut impl FnMut(&[u8; 4], &[u8]) -> Option<T>) -> Option<T> {
    let mut offset = 0usize;
    while offset + 8 <= bytes.len() {
        let size = u32::from_be_bytes(bytes[offset..offset + 4].try_into().ok()?) as usize;
        let fourcc: [u8; 4] = bytes[offset + 4..offset + 8].try_into().ok()?;
        if size < 8 || offset + size > bytes.len() {
            break;
        }
        let body = &bytes[offset + 8..offset + size];
        if let Some(v) = visit(&fourcc, body) {
            return Some(v);
        }
        if containers.iter().any(|c| **c == fourcc) {
            if let Some(v) = walk_boxes(body, containers, visit) {
                return Some(v);
            }
        }
        offset += size;
    }
    None
}

fn find_mdhd_timescale(init_segment: &[u8]) -> Option<u64> {
    let containers: &[&[u8; 4]] = &[b"moov", b"trak", b"mdia"];
    walk_boxes(init_segment, containers, &mut |fourcc, body| {
        if fourcc != b"mdhd" {
            return None;
        }
        let version = *body.first()?;
        let rest = &body[4..]; // skip version+flags
        let timescale_offset = if version == 1 { 16 } else { 8 };
        let bytes: [u8; 4] = rest.get(timescale_offset..timescale_offset + 4)?.try_into().ok()?;
        Some(u32::from_be_bytes(bytes) as u64)
    })
}

fn find_tfdt_decode_time(moof_bytes: &[u8]) -> Option<u64> {
    let containers: &[&[u8; 4]] = &[b"moof", b"traf"];
    walk_boxes(moof_bytes, containers, &mut |fourcc, body| {
        if fourcc != b"tfdt" {
            return None;
        }
        let version = *body.first()?;
        let rest = &body[4..];
        if version == 1 {
            let bytes: [u8; 8] = rest.get(0..8)?.try_into().ok()?;
            Some(u64::from_be_bytes(bytes))
        } else {
            let bytes: [u8; 4] = rest.get(0..4)?.try_into().ok()?;
            Some(u32::from_be_bytes(bytes) as u64)
        }
    })
}

/// Decodes a 33-bit PES PTS (5-byte encoding) at `offset` in `packet`.
fn decode_pes_pts(packet: &[u8]) -> Option<i64> {
    // packet[0..4] start code + stream id, packet[4..6] PES length, packet[6] flags1,
    // packet[7] flags2 (bits 6-7 = PTS_DTS_flags), packet[8] header data length, then PTS at [9..14]
    if packet.len() < 14 {
        return None;
    }
    let pts_dts_flags = (packet[7] & 0xC0) >> 6;
    if pts_dts_flags == 0 {
        return None;
    }
    let b = &packet[9..14];
    // 5-byte PTS encoding: 0010 PTS[32..30] 1 PTS[29..15] 1 PTS[14..0] 1
    let pts = (((b[0] as i64) & 0x0E) << 29)
        | (((b[1] as i64) & 0xFF) << 22)
        | (((b[2] as i64) & 0xFE) << 14)
        | (((b[3] as i64) & 0xFF) << 7)
        | (((b[4] as i64) & 0xFE) >> 1);
    Some(pts)
}

/// Scans 188-byte MPEG-TS packets for the first packet on `pid` that carries a PES header, and
/// returns its 33-bit PTS, rollover-corrected against `expected_pts_ticks` (the timestamp we'd
/// expect given prior segments, in the same 90kHz tick domain). Pass `None` for the very first
/// segment probed.
pub fn probe_mpeg_ts_pts(bytes: &[u8], pid: u16, expected_pts_ticks: Option<i64>) -> Result<i64, ManifestError> {
    let mut offset = 0usize;
    while offset + MPEG_TS_PACKET_LEN <= bytes.len() {
        let packet = &bytes[offset..offset + MPEG_TS_PACKET_LEN];
        offset += MPEG_TS_PACKET_LEN;
        if packet[0] != MPEG_TS_SYNC_BYTE {
            continue;
        }
        let packet_pid = (((packet[1] as u16) & 0x1F) << 8) | packet[2] as u16;
        if packet_pid != pid {
            continue;
        }
        let payload_unit_start = packet[1] & 0x40 != 0;
        if !payload_unit_start {
            continue;
        }
        let adaptation_field_control = (packet[3] & 0x30) >> 4;
        let mut payload_offset = 4usize;
        if adaptation_field_control == 2 || adaptation_field_control == 3 {
            let adaptation_len = packet[4] as usize;
            payload_offset += 1 + adaptation_len;
        }
        if payload_offset >= packet.len() {
            continue;
        }
        if let Some(raw_pts) = decode_pes_pts(&packet[payload_offset..]) {
            return Ok(correct_rollover(raw_pts, expected_pts_ticks));
        }
    }
    Err(ManifestError::UnparsableSegment(format!("no PES header found on PID {pid}")))
}

/// Adds multiples of `2^33` ticks until the derived time is within half a rollover period of the
/// expected time.
fn correct_rollover(raw_pts: i64, expected_pts_ticks: Option<i64>) -> i64 {
    let Some(expected) = expected_pts_ticks else {
        return raw_pts;
    };
    let mut candidate = raw_pts;
    let half_rollover = PTS_ROLLOVER_TICKS / 2;
    while candidate < expected - half_rollover {
        candidate += PTS_ROLLOVER_TICKS;
    }
    while candidate > expected + half_rollover {
        candidate -= PTS_ROLLOVER_TICKS;
    }
    candidate
}

pub fn pts_ticks_to_seconds(ticks: i64) -> f64 {
    ticks as f64 / PTS_CLOCK_HZ
}

/// ID3 `PRIV` frame owner identifier carrying an 8-byte big-endian PTS, used by raw AAC/MP3
/// segments that don't have their own container timestamp.
const ID3_PRIV_TRANSPORT_STREAM_TIMESTAMP: &str = "com.apple.streaming.transportStreamTimestamp";

/// First frame timestamp of a raw AAC/MP3 segment is 0 unless an ID3 `PRIV` tag with owner
/// `com.apple.streaming.transportStreamTimestamp` is present, in which case its 8-byte PTS
/// (rollover-corrected) is used.
pub fn probe_raw_audio_timestamp(bytes: &[u8], expected_pts_ticks: Option<i64>) -> f64 {
    if let Some(ticks) = find_id3_priv_timestamp(bytes) {
        return pts_ticks_to_seconds(correct_rollover(ticks, expected_pts_ticks));
    }
    0.0
}

fn find_id3_priv_timestamp(bytes: &[u8]) -> Option<i64> {
    if bytes.len() < 10 || &bytes[0..3] != b"ID3" {
        return None;
    }
    let size = synchsafe_size(&bytes[6..10]);
    let tag_end = (10 + size).min(bytes.len());
    let mut cursor = Cursor::new(&bytes[10..tag_end]);
    loop {
        let mut frame_id = [0u8; 4];
        if cursor.read_exact(&mut frame_id).is_err() || frame_id == [0, 0, 0, 0] {
            break;
        }
        let frame_size = cursor.read_u32::<BigEndian>().ok()? as usize;
        let _flags = cursor.read_u16::<BigEndian>().ok()?;
        let pos = cursor.position() as usize;
        let frame_body = cursor.get_ref().get(pos..pos + frame_size)?;
        if &frame_id == b"PRIV" {
            if let Some(nul) = frame_body.iter().position(|&b| b == 0) {
                let owner = std::str::from_utf8(&frame_body[..nul]).ok()?;
                if owner == ID3_PRIV_TRANSPORT_STREAM_TIMESTAMP {
                    let data = &frame_body[nul + 1..];
                    if data.len() >= 8 {
                        let ticks = i64::from_be_bytes(data[0..8].try_into().ok()?);
                        return Some(ticks);
                    }
                }
            }
        }
        cursor.set_position((pos + frame_size) as u64);
    }
    None
}

fn synchsafe_size(bytes: &[u8]) -> usize {
    bytes.iter().take(4).fold(0usize, |acc, &b| (acc << 7) | (b & 0x7F) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 36-byte MP4 `moof`+`tfdt` fixture: a version-0 `tfdt` with `baseMediaDecodeTime = 0`,
    /// plus a minimal `mdhd` with timescale 1000, used by integration tests that need a concrete
    /// probe input.
    pub fn fixture_moof_tfdt_zero() -> Vec<u8> {
        let mut tfdt_body = vec![0u8, 0, 0, 0]; // version 0, flags 0
        tfdt_body.extend_from_slice(&0u32.to_be_bytes()); // baseMediaDecodeTime = 0
        let tfdt = make_box(b"tfdt", &tfdt_body);
        let traf = make_box(b"traf", &tfdt);
        make_box(b"moof", &traf)
    }

    pub fn fixture_mdhd_timescale(timescale: u32) -> Vec<u8> {
        let mut mdhd_body = vec![0u8, 0, 0, 0];
        mdhd_body.extend_from_slice(&0u32.to_be_bytes()); // creation_time
        mdhd_body.extend_from_slice(&0u32.to_be_bytes()); // modification_time
        mdhd_body.extend_from_slice(&timescale.to_be_bytes());
        mdhd_body.extend_from_slice(&0u32.to_be_bytes()); // duration
        mdhd_body.extend_from_slice(&[0u8; 4]); // language + pre_defined
        let mdhd = make_box(b"mdhd", &mdhd_body);
        let mdia = make_box(b"mdia", &mdhd);
        let trak = make_box(b"trak", &mdia);
        make_box(b"moov", &trak)
    }

    fn make_box(fourcc: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + body.len());
        out.extend_from_slice(&((8 + body.len()) as u32).to_be_bytes());
        out.extend_from_slice(fourcc);
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn probes_mp4_tfdt_and_mdhd_timescale() {
        let init = fixture_mdhd_timescale(1000);
        let moof = fixture_moof_tfdt_zero();
        let probed = probe_mp4_tfdt(&init, &moof).unwrap();
        assert_eq!(probed.timescale, 1000);
        assert_eq!(probed.base_media_decode_time, 0);
        assert_eq!(probed.seconds(), 0.0);
    }

    #[test]
    fn missing_tfdt_is_unparsable() {
        let init = fixture_mdhd_timescale(1000);
        let err = probe_mp4_tfdt(&init, b"not a box stream").unwrap_err();
        assert!(matches!(err, ManifestError::UnparsableSegment(_)));
    }

    #[test]
    fn pts_rollover_correction_adds_whole_periods() {
        // expected is just past a rollover boundary; raw PTS reads as a small value because the
        // encoder wrapped around.
        let expected = PTS_ROLLOVER_TICKS + 1000;
        let raw = 500i64; // appears to precede `expected` by far more than half a rollover
        let corrected = correct_rollover(raw, Some(expected));
        assert_eq!(corrected, raw + PTS_ROLLOVER_TICKS);
    }

    #[test]
    fn first_segment_has_no_rollover_correction() {
        assert_eq!(correct_rollover(12345, None), 12345);
    }
}
