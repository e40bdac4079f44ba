//! HLS (RFC 8216bis) master and media playlist parsing.

pub mod drm;
pub mod master;
pub mod media_playlist;
pub mod mime;
pub mod tags;

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ManifestConfig;
use crate::drm::DrmInfo;
use crate::error::ManifestError;
use crate::events::ManifestEvent;
use crate::fetch::{FetchFacade, RequestType};
use crate::manifest::{IdAllocator, Manifest, SourceFormat, StreamHandle, StreamKind};
use crate::segment_index::{InitSegmentReference, SegmentIndex};
use crate::timeline::PresentationTimeline;
use crate::uri::BaseUriChain;
use media_playlist::ParsedMediaPlaylist;

/// Top-level entry point: fetches `manifest_uri`, determines whether it's a master or a bare
/// media playlist (`#EXT-X-STREAM-INF`/`#EXT-X-MEDIA` presence is the discriminator per RFC
/// 8216bis §4.3.4), and assembles a uniform [`Manifest`].
pub async fn parse(
    manifest_uri: Url,
    facade: &FetchFacade,
    config: &ManifestConfig,
    cancellation_token: CancellationToken,
) -> Result<Manifest, ManifestError> {
    let response = facade.get(RequestType::Manifest, manifest_uri, cancellation_token.clone()).await?;
    let document = std::str::from_utf8(&response.body)
        .map_err(|e| ManifestError::InvalidXml(format!("playlist is not valid UTF-8: {e}")))?;
    let base = BaseUriChain::new(response.uri.clone());
    let ids = IdAllocator::default();

    if is_master_playlist(document) {
        let parsed = master::parse_master_playlist(document, &base, config, &ids)?;
        for variant in &parsed.variants {
            if !variant.is_well_formed() {
                return Err(ManifestError::EmptyAdaptationSet(None));
            }
        }

        let mut loaded = load_media_playlists(&parsed.media_playlists, facade, config, &cancellation_token).await?;
        let mut events = parsed.session_events;
        events.append(&mut loaded.events);

        let text_streams =
            parsed.text_streams.into_iter().filter(|s| !loaded.dropped_stream_ids.contains(&s.id)).collect();
        let image_streams =
            parsed.image_streams.into_iter().filter(|s| !loaded.dropped_stream_ids.contains(&s.id)).collect();

        Ok(Manifest {
            timeline: loaded.timeline,
            variants: parsed.variants,
            text_streams,
            image_streams,
            is_live: loaded.is_live,
            sequence_mode: config.hls_sequence_mode,
            start_time: parsed.start_time_offset,
            source_format: SourceFormat::Hls,
            minimum_update_period: None,
            target_duration: loaded.is_live.then(|| std::time::Duration::from_secs_f64(loaded.target_duration)),
            content_steering_uri: parsed.content_steering_uri,
            events,
        })
    } else {
        let parsed = media_playlist::parse_media_playlist(document, &base, None, None)?;
        let is_live = parsed.is_live;
        let stream = std::sync::Arc::new(crate::manifest::Stream {
            kind: crate::manifest::StreamKind::Video,
            mime_type: std::sync::Mutex::new(Some(config.hls_media_playlist_full_mime_type.clone())),
            codecs: std::sync::Mutex::new(None),
            width: None,
            height: None,
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
            closed_captions: std::collections::HashMap::new(),
            drm_info: std::sync::Mutex::new(Vec::new()),
            segment_index: std::sync::Mutex::new(Some(parsed.segment_index)),
            trick_mode_video: std::sync::Mutex::new(None),
            encrypted: std::sync::Mutex::new(false),
            unloaded: std::sync::Mutex::new(false),
            id: ids.next(),
            dash_representation_id: None,
            hls_playlist_uri: std::sync::Mutex::new(Some(response.uri.clone())),
        });
        let variant = crate::manifest::Variant {
            id: ids.next(),
            bandwidth: None,
            language: None,
            primary: true,
            drm_info: Vec::new(),
            video: Some(stream),
            audio: None,
        };
        Ok(Manifest {
            timeline: parsed.timeline,
            variants: vec![variant],
            text_streams: Vec::new(),
            image_streams: Vec::new(),
            is_live,
            sequence_mode: config.hls_sequence_mode,
            start_time: parsed.start_time_offset,
            source_format: SourceFormat::Hls,
            minimum_update_period: None,
            target_duration: is_live.then(|| std::time::Duration::from_secs_f64(parsed.target_duration)),
            content_steering_uri: None,
            events: parsed.events,
        })
    }
}

/// Live update: refetches and reparses every stream's own media playlist (tracked via
/// [`crate::manifest::Stream::hls_playlist_uri`]) and merges the new segments into its existing
/// index, aligning by media-sequence number. A stream whose playlist now carries
/// `#EXT-X-ENDLIST` stops being refreshable (its `hls_playlist_uri` is cleared) and the manifest
/// as a whole drops out of `is_live` once every stream has reached that state. `onManifestUpdated`
/// (surfaced here as [`ManifestEvent::ManifestUpdated`]) fires exactly once per call, after every
/// stream has been merged.
pub async fn refresh(
    manifest: &mut Manifest,
    facade: &FetchFacade,
    config: &ManifestConfig,
    cancellation_token: CancellationToken,
) -> Result<(), ManifestError> {
    let mut any_still_live = false;
    let mut max_duration = 0.0f64;
    let mut max_target_duration = 0.0f64;
    let mut events = Vec::new();

    for stream in manifest.all_streams() {
        let uri = stream.hls_playlist_uri.lock().expect("hls_playlist_uri mutex poisoned").clone();
        let Some(uri) = uri else { continue };

        let droppable = match stream.kind {
            StreamKind::Text => config.ignore_text_stream_failures,
            StreamKind::Image => config.ignore_image_stream_failures,
            StreamKind::Audio | StreamKind::Video => false,
        };
        let (_document, _base, mut parsed) = match load_one_media_playlist(&uri, facade, &cancellation_token).await {
            Ok(loaded) => loaded,
            Err(e) if droppable => {
                tracing::warn!(error = %e, uri = %uri, kind = ?stream.kind, "skipping stream refresh after failed media playlist reload");
                any_still_live = true;
                continue;
            }
            Err(e) => return Err(e),
        };

        if !config.ignore_drm_info {
            resolve_aes_keys(&mut parsed.segment_index, facade, &cancellation_token).await;
        }
        apply_drm_and_mime(&stream, &parsed, facade, config, &cancellation_token).await;

        let new_refs: Vec<_> = parsed.segment_index.iter().cloned().collect();
        stream.segment_index.lock().expect("segment_index mutex poisoned").get_or_insert_with(SegmentIndex::new).merge(new_refs);

        any_still_live |= parsed.is_live;
        max_duration = max_duration.max(parsed.timeline.duration_seconds());
        max_target_duration = max_target_duration.max(parsed.target_duration);
        events.append(&mut parsed.events);

        if !parsed.is_live {
            *stream.hls_playlist_uri.lock().expect("hls_playlist_uri mutex poisoned") = None;
        }
    }

    manifest.is_live = any_still_live;
    manifest.target_duration = any_still_live.then(|| std::time::Duration::from_secs_f64(max_target_duration));
    if any_still_live {
        manifest.timeline.notify_max_segment_duration(max_duration);
    } else {
        manifest.timeline = PresentationTimeline::new_vod(max_duration.max(manifest.timeline.duration_seconds()));
    }
    manifest.events.append(&mut events);
    manifest.events.push(ManifestEvent::ManifestUpdated);
    Ok(())
}

/// A playlist is a master playlist iff it declares at least one `#EXT-X-STREAM-INF` or
/// `#EXT-X-MEDIA` tag; a bare media playlist never does (RFC 8216bis §4.3.4).
fn is_master_playlist(document: &str) -> bool {
    document.lines().any(|l| {
        let t = l.trim();
        t.starts_with("#EXT-X-STREAM-INF") || t.starts_with("#EXT-X-MEDIA:") || t.starts_with("#EXT-X-I-FRAME-STREAM-INF")
    })
}

struct LoadedMediaPlaylists {
    is_live: bool,
    timeline: PresentationTimeline,
    events: Vec<ManifestEvent>,
    /// IDs of text/image streams dropped after a fetch or parse failure under
    /// `ignore_text_stream_failures` / `ignore_image_stream_failures`.
    dropped_stream_ids: Vec<u64>,
    /// Largest `#EXT-X-TARGETDURATION` across every loaded playlist, surfaced on [`Manifest`] for
    /// a scheduling driver to pick refresh intervals from.
    target_duration: f64,
}

struct FetchedPlaylist {
    stream: StreamHandle,
    document: String,
    base: BaseUriChain,
}

/// Fetches every variant/rendition's dedicated media playlist, probes a single representative
/// stream's true start time, and reparses every playlist anchored to it so all streams agree on
/// presentation time zero, then materialises each stream's segment index in place.
async fn load_media_playlists(
    media_playlists: &[(StreamHandle, Url)],
    facade: &FetchFacade,
    config: &ManifestConfig,
    cancellation_token: &CancellationToken,
) -> Result<LoadedMediaPlaylists, ManifestError> {
    // Fetches and does an unanchored parse of each playlist together, so that a text/image stream
    // whose playlist fails to fetch *or* to parse can be dropped under `ignore_text_stream_failures`
    // / `ignore_image_stream_failures` without leaving `fetched` and `unanchored` misaligned.
    let mut fetched = Vec::with_capacity(media_playlists.len());
    let mut unanchored: Vec<ParsedMediaPlaylist> = Vec::with_capacity(media_playlists.len());
    let mut dropped_stream_ids = Vec::new();
    for (stream, uri) in media_playlists {
        let droppable = match stream.kind {
            StreamKind::Text => config.ignore_text_stream_failures,
            StreamKind::Image => config.ignore_image_stream_failures,
            StreamKind::Audio | StreamKind::Video => false,
        };
        match load_one_media_playlist(uri, facade, cancellation_token).await {
            Ok((document, base, parsed)) => {
                fetched.push(FetchedPlaylist { stream: Arc::clone(stream), document, base });
                unanchored.push(parsed);
            }
            Err(e) if droppable => {
                tracing::warn!(error = %e, uri = %uri, kind = ?stream.kind, "dropping stream after failed media playlist load");
                dropped_stream_ids.push(stream.id);
            }
            Err(e) => return Err(e),
        }
    }

    if fetched.is_empty() {
        return Ok(LoadedMediaPlaylists {
            is_live: false,
            timeline: PresentationTimeline::new_vod(0.0),
            events: Vec::new(),
            dropped_stream_ids,
            target_duration: 0.0,
        });
    }

    let representative_index = fetched
        .iter()
        .position(|f| f.stream.kind == StreamKind::Audio)
        .or_else(|| fetched.iter().position(|f| f.stream.kind == StreamKind::Video))
        .unwrap_or(0);

    let anchor = probe_anchor(&unanchored[representative_index], facade, cancellation_token).await;

    let mut is_live = false;
    let mut max_duration = 0.0f64;
    let mut max_target_duration = 0.0f64;
    let mut live_timeline: Option<PresentationTimeline> = None;
    let mut events = Vec::new();

    for (i, f) in fetched.iter().enumerate() {
        let mut parsed = if anchor.is_some() {
            media_playlist::parse_media_playlist(&f.document, &f.base, None, anchor)?
        } else {
            // `unanchored` holds exactly one entry per `fetched` element, consumed once below.
            std::mem::replace(
                &mut unanchored[i],
                ParsedMediaPlaylist {
                    segment_index: crate::segment_index::SegmentIndex::new(),
                    timeline: PresentationTimeline::new_vod(0.0),
                    is_live: false,
                    events: Vec::new(),
                    target_duration: 0.0,
                    start_time_offset: None,
                },
            )
        };

        if !config.ignore_drm_info {
            resolve_aes_keys(&mut parsed.segment_index, facade, cancellation_token).await;
        }
        apply_drm_and_mime(&f.stream, &parsed, facade, config, cancellation_token).await;

        is_live |= parsed.is_live;
        max_duration = max_duration.max(parsed.timeline.duration_seconds());
        max_target_duration = max_target_duration.max(parsed.target_duration);
        if parsed.is_live {
            live_timeline = Some(parsed.timeline);
        }
        events.append(&mut parsed.events);

        f.stream.lazily_create_segment_index(|| parsed.segment_index);
        *f.stream.unloaded.lock().expect("unloaded mutex poisoned") = false;
    }

    let timeline = live_timeline.unwrap_or_else(|| PresentationTimeline::new_vod(max_duration));
    Ok(LoadedMediaPlaylists {
        is_live,
        timeline,
        events,
        dropped_stream_ids,
        target_duration: max_target_duration,
    })
}

/// Fetches one media playlist and parses it unanchored, so a fetch failure and a parse failure
/// are both droppable the same way by the caller's `ignore_*_stream_failures` policy.
async fn load_one_media_playlist(
    uri: &Url,
    facade: &FetchFacade,
    cancellation_token: &CancellationToken,
) -> Result<(String, BaseUriChain, ParsedMediaPlaylist), ManifestError> {
    let response = facade.get(RequestType::Manifest, uri.clone(), cancellation_token.clone()).await?;
    let document = std::str::from_utf8(&response.body)
        .map_err(|e| ManifestError::InvalidXml(format!("media playlist is not valid UTF-8: {e}")))?
        .to_string();
    let base = BaseUriChain::new(response.uri.clone());
    let parsed = media_playlist::parse_media_playlist(&document, &base, None, None)?;
    Ok((document, base, parsed))
}

/// Fetches the AES-128 key bytes for every distinct `KEYFORMAT=identity` key URI referenced by
/// `index` and fills them into the matching [`AesKey`](crate::segment_index::AesKey)s, so that a
/// caller with no decryption logic of its own can still play back `METHOD=AES-128` content.
/// Caches each URI's bytes so a key shared by many segments is only fetched once.
///
/// An `#EXT-X-MAP` init segment under the same key scope is encrypted too and carries its own
/// (unshared, plain) `AesKey`; since many segments share one `Arc<InitSegmentReference>`, filling
/// it in place via `Arc::make_mut` would silently un-share it for whichever segment is visited
/// first. Instead, distinct init `Arc`s are rebuilt once each (keyed by pointer) and every segment
/// referencing an old pointer is repointed at its rebuilt replacement, preserving sharing.
async fn resolve_aes_keys(index: &mut SegmentIndex, facade: &FetchFacade, cancellation_token: &CancellationToken) {
    let mut cache: HashMap<String, Option<[u8; 16]>> = HashMap::new();
    for r in index.iter_mut() {
        let Some(aes_key) = &mut r.aes_key else { continue };
        if aes_key.key.is_none() {
            let key_uri = aes_key.key_uri.clone();
            let resolved = match cache.get(&key_uri) {
                Some(cached) => *cached,
                None => {
                    let fetched = fetch_aes_key_bytes(&key_uri, facade, cancellation_token).await;
                    cache.insert(key_uri, fetched);
                    fetched
                }
            };
            if let Some(bytes) = resolved {
                Arc::make_mut(aes_key).key = Some(bytes);
            }
        }
    }

    let mut rebuilt: HashMap<*const InitSegmentReference, Arc<InitSegmentReference>> = HashMap::new();
    for r in index.iter_mut() {
        let Some(init) = &r.init_segment_reference else { continue };
        let needs_fill = init.aes_key.as_ref().is_some_and(|k| k.key.is_none());
        if !needs_fill {
            continue;
        }
        let ptr = Arc::as_ptr(init);
        if let Some(new_init) = rebuilt.get(&ptr) {
            r.init_segment_reference = Some(Arc::clone(new_init));
            continue;
        }
        let mut new_init = (**init).clone();
        if let Some(aes_key) = &mut new_init.aes_key {
            let key_uri = aes_key.key_uri.clone();
            let resolved = match cache.get(&key_uri) {
                Some(cached) => *cached,
                None => {
                    let fetched = fetch_aes_key_bytes(&key_uri, facade, cancellation_token).await;
                    cache.insert(key_uri, fetched);
                    fetched
                }
            };
            aes_key.key = resolved;
        }
        let new_init = Arc::new(new_init);
        rebuilt.insert(ptr, Arc::clone(&new_init));
        r.init_segment_reference = Some(new_init);
    }
}

async fn fetch_aes_key_bytes(key_uri: &str, facade: &FetchFacade, cancellation_token: &CancellationToken) -> Option<[u8; 16]> {
    let uri = Url::parse(key_uri).ok()?;
    let response = facade.get(RequestType::Key, uri, cancellation_token.clone()).await.ok()?;
    response.body.as_ref().try_into().ok()
}

async fn apply_drm_and_mime(
    stream: &StreamHandle,
    parsed: &ParsedMediaPlaylist,
    facade: &FetchFacade,
    config: &ManifestConfig,
    cancellation_token: &CancellationToken,
) {
    if !config.ignore_drm_info {
        let drm: Vec<DrmInfo> = parsed.segment_index.iter().flat_map(|r| r.drm_info.clone()).collect();
        let encrypted = parsed.segment_index.iter().any(|r| r.aes_key.is_some() || !r.drm_info.is_empty());
        *stream.drm_info.lock().expect("drm_info mutex poisoned") = drm;
        *stream.encrypted.lock().expect("encrypted mutex poisoned") = encrypted;
    }

    if !config.hls_disable_codec_guessing {
        if let Some(first_uri) = parsed.segment_index.get(0).and_then(|r| r.uris.first()) {
            if let Ok(uri) = Url::parse(first_uri) {
                let codecs = stream.codecs.lock().expect("codecs mutex poisoned").clone();
                let mime = mime::infer_mime_type(facade, &uri, codecs.as_deref(), config, cancellation_token.clone()).await;
                *stream.mime_type.lock().expect("mime_type mutex poisoned") = Some(mime);
            }
        }
    }
}

/// Derives a common presentation-time anchor from the representative stream's first segment:
/// its `PROGRAM-DATE-TIME` if present, otherwise an MP4 `tfdt` probe of its first fragment.
/// MPEG-TS segments fall back to unanchored (zero-based) timing — correlating a PTS with the
/// right elementary stream PID needs PMT demuxing, which this engine doesn't perform.
async fn probe_anchor(
    parsed: &ParsedMediaPlaylist,
    facade: &FetchFacade,
    cancellation_token: &CancellationToken,
) -> Option<(f64, i64)> {
    let first = parsed.segment_index.get(0)?;
    if let Some(sync_ms) = first.sync_time {
        return Some((first.start_time, sync_ms));
    }
    let uri_str = first.uris.first()?;
    if uri_str.to_ascii_lowercase().ends_with(".ts") {
        return None;
    }
    let uri = Url::parse(uri_str).ok()?;

    let init_bytes = match &first.init_segment_reference {
        Some(init_ref) => {
            let init_uri = Url::parse(init_ref.uris.first()?).ok()?;
            facade
                .get_range(RequestType::Segment, init_uri, init_ref.start_byte, init_ref.end_byte, cancellation_token.clone())
                .await
                .ok()?
                .body
                .to_vec()
        }
        None => Vec::new(),
    };
    let segment_bytes = facade
        .get_range(RequestType::Segment, uri, first.start_byte, first.end_byte, cancellation_token.clone())
        .await
        .ok()?
        .body;
    let probed = crate::probe::probe_mp4_tfdt(&init_bytes, &segment_bytes).ok()?;
    Some((probed.seconds(), crate::clock::now_unix_ms()))
}
