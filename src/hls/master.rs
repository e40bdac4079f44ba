//! HLS master playlist parsing: tag gathering, rendition grouping, and variant pairing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use url::Url;

use crate::config::ManifestConfig;
use crate::drm::DrmInfo;
use crate::error::ManifestError;
use crate::events::ManifestEvent;
use crate::hls::drm::{parse_key_tag, KeyDescriptor};
use crate::hls::tags::{tokenize, Line, TagAttributes};
use crate::manifest::{HdrLevel, IdAllocator, Stream, StreamHandle, StreamKind, TextKind, Variant};
use crate::uri::{BaseUriChain, VariableScope};

/// One `#EXT-X-MEDIA` entry, keyed by `(TYPE, GROUP-ID)` once grouped.
#[derive(Debug, Clone)]
struct MediaRendition {
    media_type: String,
    group_id: String,
    name: String,
    language: Option<String>,
    default: bool,
    autoselect: bool,
    forced: bool,
    uri: Option<Url>,
    channels: Option<String>,
    instream_id: Option<String>,
}

/// One `#EXT-X-STREAM-INF` entry paired with its URI.
#[derive(Debug, Clone)]
struct VariantStreamInf {
    uri: Url,
    bandwidth: u64,
    codecs: Option<String>,
    resolution: Option<(u64, u64)>,
    frame_rate: Option<f64>,
    audio_group: Option<String>,
    video_group: Option<String>,
    subtitles_group: Option<String>,
    closed_captions_group: Option<String>,
    supplemental_codecs: Option<String>,
    hdr: Option<HdrLevel>,
    video_layout: Option<String>,
    is_i_frame: bool,
}

/// The result of parsing a master playlist: variants and text/closed-caption streams, plus
/// session data events and any content-steering declaration, all still referencing unfetched
/// media playlist URIs.
pub struct ParsedMaster {
    pub variants: Vec<Variant>,
    pub text_streams: Vec<StreamHandle>,
    /// `#EXT-X-IMAGE-STREAM-INF` thumbnail tracks, plus any `#EXT-X-I-FRAME-STREAM-INF` whose
    /// `CODECS` names an image codec (`mjpg`/`jpeg`) rather than a trick-mode video codec.
    pub image_streams: Vec<StreamHandle>,
    pub session_events: Vec<ManifestEvent>,
    pub content_steering_uri: Option<Url>,
    pub independent_segments: bool,
    /// Every stream that owns a dedicated media playlist, paired with that playlist's URI, so
    /// the caller can fetch and materialise each one's segment index.
    pub media_playlists: Vec<(StreamHandle, Url)>,
    /// `#EXT-X-START:TIME-OFFSET=`, to be surfaced as `Manifest::start_time`. Distinct from the
    /// per-rendition presentation-time anchor derived in `hls::mod::probe_anchor`.
    pub start_time_offset: Option<f64>,
}

/// An `#EXT-X-IMAGE-STREAM-INF` entry.
#[derive(Debug, Clone)]
struct ImageStreamInf {
    uri: Url,
    codecs: Option<String>,
    resolution: Option<(u64, u64)>,
}

/// Codec strings that mark an `#EXT-X-I-FRAME-STREAM-INF` as a thumbnail track rather than a
/// trick-mode video rendition.
fn is_image_codec(codecs: Option<&str>) -> bool {
    matches!(codecs, Some(c) if c.eq_ignore_ascii_case("mjpg") || c.eq_ignore_ascii_case("jpeg"))
}

pub fn parse_master_playlist(
    document: &str,
    base: &BaseUriChain,
    config: &ManifestConfig,
    ids: &IdAllocator,
) -> Result<ParsedMaster, ManifestError> {
    let lines = tokenize(document);
    let mut scope = VariableScope::new();
    let mut renditions: Vec<MediaRendition> = Vec::new();
    let mut variant_infs: Vec<VariantStreamInf> = Vec::new();
    let mut session_events = Vec::new();
    let mut content_steering_uri = None;
    let mut independent_segments = false;
    let mut pending_stream_inf: Option<TagAttributes> = None;
    let mut image_stream_infs: Vec<ImageStreamInf> = Vec::new();
    // `#EXT-X-SESSION-KEY` DRM info, applied to every variant's audio/video streams below;
    // several may stack for different key systems, same as per-playlist `#EXT-X-KEY`.
    let mut session_drm_info: Vec<DrmInfo> = Vec::new();
    let mut start_time_offset: Option<f64> = None;

    for line in &lines {
        match line {
            Line::Tag { name, attributes } if name == "#EXT-X-DEFINE" => {
                apply_define(&mut scope, attributes, base.current());
            }
            Line::Tag { name, .. } if name == "#EXT-X-INDEPENDENT-SEGMENTS" => {
                independent_segments = true;
            }
            Line::Tag { name, attributes } if name == "#EXT-X-START" => {
                start_time_offset = attributes.get_f64("TIME-OFFSET");
            }
            Line::Tag { name, attributes } if name == "#EXT-X-SESSION-KEY" => {
                if let KeyDescriptor::SampleAes(info) = parse_key_tag(attributes, false)? {
                    session_drm_info.push(info);
                }
            }
            Line::Tag { name, attributes } if name == "#EXT-X-MEDIA" => {
                renditions.push(parse_media_tag(attributes, base, &scope)?);
            }
            Line::Tag { name, attributes } if name == "#EXT-X-STREAM-INF" || name == "#EXT-X-I-FRAME-STREAM-INF" => {
                if name == "#EXT-X-I-FRAME-STREAM-INF" {
                    let uri_attr = attributes
                        .get_str("URI")
                        .ok_or_else(|| ManifestError::RequiredAttributeMissing {
                            element: "EXT-X-I-FRAME-STREAM-INF".into(),
                            attribute: "URI".into(),
                        })?;
                    let uri = base.resolve(&scope.substitute(uri_attr))?;
                    variant_infs.push(build_variant_inf(attributes, uri, true)?);
                } else {
                    pending_stream_inf = Some(attributes.clone());
                }
            }
            Line::Uri(raw) if pending_stream_inf.is_some() => {
                let attrs = pending_stream_inf.take().unwrap();
                let uri = base.resolve(&scope.substitute(raw))?;
                variant_infs.push(build_variant_inf(&attrs, uri, false)?);
            }
            Line::Tag { name, attributes } if name == "#EXT-X-SESSION-DATA" => {
                session_events.push(parse_session_data(attributes));
            }
            Line::Tag { name, attributes } if name == "#EXT-X-CONTENT-STEERING" => {
                if let Some(uri) = attributes.get_str("SERVER-URI") {
                    content_steering_uri = Some(base.resolve(&scope.substitute(uri))?);
                }
            }
            Line::Tag { name, attributes } if name == "#EXT-X-IMAGE-STREAM-INF" => {
                let uri_attr = attributes.get_str("URI").ok_or_else(|| ManifestError::RequiredAttributeMissing {
                    element: "EXT-X-IMAGE-STREAM-INF".into(),
                    attribute: "URI".into(),
                })?;
                let uri = base.resolve(&scope.substitute(uri_attr))?;
                let resolution = attributes.get_str("RESOLUTION").and_then(|r| {
                    let (w, h) = r.split_once('x')?;
                    Some((w.parse().ok()?, h.parse().ok()?))
                });
                image_stream_infs.push(ImageStreamInf { uri, codecs: attributes.get_owned("CODECS"), resolution });
            }
            _ => {}
        }
    }

    if config.disable_i_frames {
        variant_infs.retain(|v| !v.is_i_frame);
    }

    let audio_groups = group_renditions(&renditions, "AUDIO");
    let subtitle_groups = group_renditions(&renditions, "SUBTITLES");
    let closed_caption_groups = group_renditions(&renditions, "CLOSED-CAPTIONS");

    let mut variants = Vec::new();
    let mut text_streams = Vec::new();
    let mut image_streams = Vec::new();
    let mut media_playlists: Vec<(StreamHandle, Url)> = Vec::new();
    let mut emitted_subtitle_uris: HashMap<String, StreamHandle> = HashMap::new();
    // Keyed by (group-id, rendition name): a rendition referenced by several STREAM-INFs (or by
    // both the base and SUPPLEMENTAL-CODECS variant of the same STREAM-INF) must back the exact
    // same `StreamHandle` everywhere so callers can recognise shared audio by `Arc::ptr_eq`.
    let mut audio_stream_cache: HashMap<(String, String), StreamHandle> = HashMap::new();
    // Every main (non-I-frame) video rendition, recorded so trick-mode `EXT-X-I-FRAME-STREAM-INF`
    // entries can attach to whichever main variant they best match by resolution then codec.
    let mut main_videos: Vec<(StreamHandle, Option<(u64, u64)>, Option<String>)> = Vec::new();

    for inf in &variant_infs {
        if inf.is_i_frame {
            continue; // I-frame-only "variants" carry no audio/video pairing to emit here
        }

        let mut closed_captions = HashMap::new();
        if let Some(group) = &inf.closed_captions_group {
            if let Some(members) = closed_caption_groups.get(group) {
                for m in members {
                    if let Some(id) = &m.instream_id {
                        closed_captions.insert(id.clone(), m.language.clone().unwrap_or_default());
                    }
                }
            }
        }

        // Every variant pairing for this STREAM-INF shares one video stream object: the media
        // content (and its playlist URI) is identical regardless of which audio rendition it's
        // paired with.
        let video = make_video_stream(inf, ids, closed_captions);
        *video.hls_playlist_uri.lock().expect("hls_playlist_uri mutex poisoned") = Some(inf.uri.clone());
        apply_session_drm(&video, &session_drm_info);
        media_playlists.push((Arc::clone(&video), inf.uri.clone()));
        main_videos.push((Arc::clone(&video), inf.resolution, inf.codecs.clone()));

        // An AUDIO group may list several renditions (distinct languages, or the same language
        // at different channel counts); pair one variant per member rather than only the first,
        // so e.g. two video STREAM-INFs times a two-language group yield four variants, two per
        // language, sharing the language's audio stream by identity.
        let audio_members: Vec<&MediaRendition> = inf
            .audio_group
            .as_ref()
            .and_then(|group| audio_groups.get(group))
            .cloned()
            .unwrap_or_default();

        if audio_members.is_empty() {
            push_variant_pair(&mut variants, ids, inf, Some(Arc::clone(&video)), None);
            emit_enhanced_variant(&mut variants, ids, config, inf, None, &mut media_playlists, &session_drm_info);
        } else {
            for m in &audio_members {
                let audio_key = (inf.audio_group.clone().unwrap_or_default(), m.name.clone());
                let is_new = !audio_stream_cache.contains_key(&audio_key);
                let audio = audio_stream_cache.entry(audio_key).or_insert_with(|| make_audio_stream(m, ids)).clone();
                if is_new {
                    if let Some(uri) = &m.uri {
                        *audio.hls_playlist_uri.lock().expect("hls_playlist_uri mutex poisoned") = Some(uri.clone());
                        media_playlists.push((Arc::clone(&audio), uri.clone()));
                    }
                    apply_session_drm(&audio, &session_drm_info);
                }
                push_variant_pair(&mut variants, ids, inf, Some(Arc::clone(&video)), Some(Arc::clone(&audio)));
                emit_enhanced_variant(&mut variants, ids, config, inf, Some(audio), &mut media_playlists, &session_drm_info);
            }
        }

        if let Some(group) = &inf.subtitles_group {
            if let Some(members) = subtitle_groups.get(group) {
                for m in members {
                    if let Some(uri) = &m.uri {
                        let is_new = !emitted_subtitle_uris.contains_key(uri.as_str());
                        let handle = emitted_subtitle_uris
                            .entry(uri.to_string())
                            .or_insert_with(|| make_text_stream(m, ids, TextKind::Subtitle))
                            .clone();
                        if is_new {
                            *handle.hls_playlist_uri.lock().expect("hls_playlist_uri mutex poisoned") = Some(uri.clone());
                            media_playlists.push((Arc::clone(&handle), uri.clone()));
                        }
                        if !text_streams.iter().any(|s: &StreamHandle| Arc::ptr_eq(s, &handle)) {
                            text_streams.push(handle);
                        }
                    }
                }
            }
        }
    }

    if config.disable_text {
        text_streams.clear();
    }

    if !config.disable_i_frames {
        for inf in variant_infs.iter().filter(|v| v.is_i_frame) {
            if is_image_codec(inf.codecs.as_deref()) {
                let image = make_image_stream(inf.resolution, inf.codecs.clone(), ids);
                *image.hls_playlist_uri.lock().expect("hls_playlist_uri mutex poisoned") = Some(inf.uri.clone());
                media_playlists.push((Arc::clone(&image), inf.uri.clone()));
                image_streams.push(image);
            } else if let Some((main, _, _)) = best_matching_main_video(&main_videos, inf.resolution, inf.codecs.as_deref()) {
                let trick_mode = make_video_stream(inf, ids, HashMap::new());
                *trick_mode.hls_playlist_uri.lock().expect("hls_playlist_uri mutex poisoned") = Some(inf.uri.clone());
                media_playlists.push((Arc::clone(&trick_mode), inf.uri.clone()));
                *main.trick_mode_video.lock().expect("trick_mode_video mutex poisoned") = Some(trick_mode);
            }
        }
    }

    if config.disable_thumbnails {
        image_stream_infs.clear();
    }
    for image_inf in &image_stream_infs {
        let image = make_image_stream(image_inf.resolution, image_inf.codecs.clone(), ids);
        *image.hls_playlist_uri.lock().expect("hls_playlist_uri mutex poisoned") = Some(image_inf.uri.clone());
        media_playlists.push((Arc::clone(&image), image_inf.uri.clone()));
        image_streams.push(image);
    }

    Ok(ParsedMaster {
        variants,
        text_streams,
        image_streams,
        session_events,
        content_steering_uri,
        independent_segments,
        media_playlists,
        start_time_offset,
    })
}

/// Picks the main video rendition whose resolution is closest to `resolution` (ties broken by
/// matching `codecs`), for attaching a trick-mode `EXT-X-I-FRAME-STREAM-INF` rendition to the
/// best-matching main variant by resolution then codec.
fn best_matching_main_video<'a>(
    main_videos: &'a [(StreamHandle, Option<(u64, u64)>, Option<String>)],
    resolution: Option<(u64, u64)>,
    codecs: Option<&str>,
) -> Option<&'a (StreamHandle, Option<(u64, u64)>, Option<String>)> {
    main_videos.iter().min_by_key(|(_, res, c)| {
        let distance = match (resolution, res) {
            (Some((w, h)), Some((mw, mh))) => (w as i64 - *mw as i64).abs() + (h as i64 - *mh as i64).abs(),
            _ => i64::MAX,
        };
        let codec_mismatch = match (codecs, c.as_deref()) {
            (Some(a), Some(b)) if a == b => 0,
            _ => 1,
        };
        (distance, codec_mismatch)
    })
}

fn push_variant_pair(
    variants: &mut Vec<Variant>,
    ids: &IdAllocator,
    inf: &VariantStreamInf,
    video: Option<StreamHandle>,
    audio: Option<StreamHandle>,
) {
    variants.push(Variant {
        id: ids.next(),
        bandwidth: Some(inf.bandwidth),
        language: audio.as_ref().and_then(|a| a.language.clone()),
        primary: false,
        drm_info: Vec::new(),
        video,
        audio,
    });
}

/// `SUPPLEMENTAL-CODECS` describes an additional, higher-capability rendition of the same
/// content; emit a second variant sharing the same media URI so ABR logic can prefer it when the
/// platform supports the enhanced codec.
fn emit_enhanced_variant(
    variants: &mut Vec<Variant>,
    ids: &IdAllocator,
    config: &ManifestConfig,
    inf: &VariantStreamInf,
    audio: Option<StreamHandle>,
    media_playlists: &mut Vec<(StreamHandle, Url)>,
    session_drm_info: &[DrmInfo],
) {
    if config.ignore_supplemental_codecs {
        return;
    }
    let Some(supplemental) = &inf.supplemental_codecs else { return };
    let mut enhanced_inf = inf.clone();
    enhanced_inf.codecs = Some(supplemental.clone());
    let enhanced_video = make_video_stream(&enhanced_inf, ids, HashMap::new());
    *enhanced_video.hls_playlist_uri.lock().expect("hls_playlist_uri mutex poisoned") = Some(inf.uri.clone());
    apply_session_drm(&enhanced_video, session_drm_info);
    media_playlists.push((Arc::clone(&enhanced_video), inf.uri.clone()));
    push_variant_pair(variants, ids, inf, Some(enhanced_video), audio);
}

/// Applies `#EXT-X-SESSION-KEY` DRM info to a stream created from a master playlist; these
/// entries are global to the presentation, unlike per-media-playlist `#EXT-X-KEY`.
fn apply_session_drm(stream: &StreamHandle, session_drm_info: &[DrmInfo]) {
    if session_drm_info.is_empty() {
        return;
    }
    stream.drm_info.lock().expect("drm_info mutex poisoned").extend(session_drm_info.iter().cloned());
    *stream.encrypted.lock().expect("encrypted mutex poisoned") = true;
}

fn apply_define(scope: &mut VariableScope, attrs: &TagAttributes, playlist_url: &Url) {
    if let (Some(name), Some(value)) = (attrs.get_str("NAME"), attrs.get_str("VALUE")) {
        scope.define(name, value);
    }
    if let Some(name) = attrs.get_str("QUERYPARAM") {
        scope.define_from_query_param(name, playlist_url);
    }
}

fn parse_media_tag(attrs: &TagAttributes, base: &BaseUriChain, scope: &VariableScope) -> Result<MediaRendition, ManifestError> {
    let media_type =
        attrs.get_owned("TYPE").ok_or_else(|| ManifestError::RequiredAttributeMissing {
            element: "EXT-X-MEDIA".into(),
            attribute: "TYPE".into(),
        })?;
    let group_id =
        attrs.get_owned("GROUP-ID").ok_or_else(|| ManifestError::RequiredAttributeMissing {
            element: "EXT-X-MEDIA".into(),
            attribute: "GROUP-ID".into(),
        })?;
    let name = attrs.get_owned("NAME").unwrap_or_default();
    let uri = attrs
        .get_str("URI")
        .map(|u| base.resolve(&scope.substitute(u)))
        .transpose()?;
    Ok(MediaRendition {
        media_type,
        group_id,
        name,
        language: attrs.get_owned("LANGUAGE"),
        default: attrs.get_bool("DEFAULT"),
        autoselect: attrs.get_bool("AUTOSELECT"),
        forced: attrs.get_bool("FORCED"),
        uri,
        channels: attrs.get_owned("CHANNELS"),
        instream_id: attrs.get_owned("INSTREAM-ID"),
    })
}

fn group_renditions<'a>(renditions: &'a [MediaRendition], media_type: &str) -> HashMap<String, Vec<&'a MediaRendition>> {
    let mut groups: HashMap<String, Vec<&MediaRendition>> = HashMap::new();
    for r in renditions.iter().filter(|r| r.media_type == media_type) {
        groups.entry(r.group_id.clone()).or_default().push(r);
    }
    groups
}

fn build_variant_inf(attrs: &TagAttributes, uri: Url, is_i_frame: bool) -> Result<VariantStreamInf, ManifestError> {
    let bandwidth = attrs
        .get_u64("BANDWIDTH")
        .ok_or_else(|| ManifestError::RequiredAttributeMissing {
            element: "EXT-X-STREAM-INF".into(),
            attribute: "BANDWIDTH".into(),
        })?;
    let resolution = attrs.get_str("RESOLUTION").and_then(|r| {
        let (w, h) = r.split_once('x')?;
        Some((w.parse().ok()?, h.parse().ok()?))
    });
    let hdr = attrs.get_str("VIDEO-RANGE").and_then(|vr| match vr {
        "SDR" => Some(HdrLevel::Sdr),
        "PQ" => Some(HdrLevel::Hdr10),
        "HLG" => Some(HdrLevel::Hlg),
        _ => None,
    });
    Ok(VariantStreamInf {
        uri,
        bandwidth,
        codecs: attrs.get_owned("CODECS"),
        resolution,
        frame_rate: attrs.get_f64("FRAME-RATE"),
        audio_group: attrs.get_owned("AUDIO"),
        video_group: attrs.get_owned("VIDEO"),
        subtitles_group: attrs.get_owned("SUBTITLES"),
        closed_captions_group: attrs.get_owned("CLOSED-CAPTIONS"),
        supplemental_codecs: attrs.get_owned("SUPPLEMENTAL-CODECS"),
        hdr,
        video_layout: attrs.get_owned("REQ-VIDEO-LAYOUT"),
        is_i_frame,
    })
}

fn parse_session_data(attrs: &TagAttributes) -> ManifestEvent {
    ManifestEvent::SessionData {
        id: attrs.get_owned("DATA-ID").unwrap_or_default(),
        language: attrs.get_owned("LANGUAGE"),
        value: attrs.get_owned("VALUE"),
        uri: attrs.get_owned("URI"),
    }
}

fn make_video_stream(inf: &VariantStreamInf, ids: &IdAllocator, closed_captions: HashMap<String, String>) -> StreamHandle {
    Arc::new(Stream {
        kind: StreamKind::Video,
        mime_type: Mutex::new(None),
        codecs: Mutex::new(inf.codecs.clone()),
        width: inf.resolution.map(|(w, _)| w),
        height: inf.resolution.map(|(_, h)| h),
        frame_rate: inf.frame_rate,
        pixel_aspect_ratio: None,
        channels_count: None,
        audio_sampling_rate: None,
        spatial_audio: false,
        language: None,
        original_language: None,
        label: None,
        roles: Vec::new(),
        forced: false,
        text_kind: None,
        hdr: inf.hdr,
        video_layout: inf.video_layout.clone(),
        closed_captions,
        drm_info: Mutex::new(Vec::new()),
        segment_index: Mutex::new(None),
        trick_mode_video: Mutex::new(None),
        encrypted: Mutex::new(false),
        unloaded: Mutex::new(true),
        id: ids.next(),
        dash_representation_id: None,
        hls_playlist_uri: Mutex::new(None),
    })
}

fn make_audio_stream(m: &MediaRendition, ids: &IdAllocator) -> StreamHandle {
    Arc::new(Stream {
        kind: StreamKind::Audio,
        mime_type: Mutex::new(None),
        codecs: Mutex::new(None),
        width: None,
        height: None,
        frame_rate: None,
        pixel_aspect_ratio: None,
        channels_count: m.channels.as_ref().and_then(|c| c.split('/').next()?.parse().ok()),
        audio_sampling_rate: None,
        spatial_audio: m.channels.as_deref().map(|c| c.contains("JOC")).unwrap_or(false),
        language: m.language.clone(),
        original_language: m.language.clone(),
        label: Some(m.name.clone()),
        roles: if m.default { vec!["main".to_string()] } else { Vec::new() },
        forced: false,
        text_kind: None,
        hdr: None,
        video_layout: None,
        closed_captions: HashMap::new(),
        drm_info: Mutex::new(Vec::new()),
        segment_index: Mutex::new(None),
        trick_mode_video: Mutex::new(None),
        encrypted: Mutex::new(false),
        unloaded: Mutex::new(true),
        id: ids.next(),
        dash_representation_id: None,
        hls_playlist_uri: Mutex::new(None),
    })
}

/// Builds a thumbnail/trick-play image track, either from a standalone `#EXT-X-IMAGE-STREAM-INF`
/// or from an `#EXT-X-I-FRAME-STREAM-INF` whose `CODECS` names an image codec rather than a
/// trick-mode video one.
fn make_image_stream(resolution: Option<(u64, u64)>, codecs: Option<String>, ids: &IdAllocator) -> StreamHandle {
    Arc::new(Stream {
        kind: StreamKind::Image,
        mime_type: Mutex::new(Some("image/jpeg".to_string())),
        codecs: Mutex::new(codecs),
        width: resolution.map(|(w, _)| w),
        height: resolution.map(|(_, h)| h),
        frame_rate: None,
        pixel_aspect_ratio: None,
        channels_count: None,
        audio_sampling_rate: None,
        spatial_audio: false,
        language: None,
        original_language: None,
        label: None,
        roles: Vec::new(),
        forced: false,
        text_kind: None,
        hdr: None,
        video_layout: None,
        closed_captions: HashMap::new(),
        drm_info: Mutex::new(Vec::new()),
        segment_index: Mutex::new(None),
        trick_mode_video: Mutex::new(None),
        encrypted: Mutex::new(false),
        unloaded: Mutex::new(true),
        id: ids.next(),
        dash_representation_id: None,
        hls_playlist_uri: Mutex::new(None),
    })
}

fn make_text_stream(m: &MediaRendition, ids: &IdAllocator, text_kind: TextKind) -> StreamHandle {
    Arc::new(Stream {
        kind: StreamKind::Text,
        mime_type: Mutex::new(Some("text/vtt".to_string())),
        codecs: Mutex::new(None),
        width: None,
        height: None,
        frame_rate: None,
        pixel_aspect_ratio: None,
        channels_count: None,
        audio_sampling_rate: None,
        spatial_audio: false,
        language: m.language.clone(),
        original_language: m.language.clone(),
        label: Some(m.name.clone()),
        roles: Vec::new(),
        forced: m.forced,
        text_kind: Some(text_kind),
        hdr: None,
        video_layout: None,
        closed_captions: HashMap::new(),
        drm_info: Mutex::new(Vec::new()),
        segment_index: Mutex::new(None),
        trick_mode_video: Mutex::new(None),
        encrypted: Mutex::new(false),
        unloaded: Mutex::new(true),
        id: ids.next(),
        dash_representation_id: None,
        hls_playlist_uri: Mutex::new(None),
    })
}

