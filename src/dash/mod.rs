//! MPEG-DASH MPD parsing: fetch, xlink resolution, Period/AdaptationSet/Representation
//! inheritance, segment-addressing dispatch, DRM and descriptor extraction, variant pairing, and
//! live UTCTiming resolution.

pub mod drm;
pub mod model;
pub mod scte35;
pub mod segments;
pub mod utc_timing;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ManifestConfig;
use crate::error::{ErrorContext, ManifestError};
use crate::events::{ManifestEvent, ManifestWarning};
use crate::fetch::{FetchFacade, RequestType};
use crate::manifest::{IdAllocator, Manifest, SourceFormat, Stream, StreamHandle, StreamKind, TextKind, Variant};
use crate::segment_index::SegmentIndex;
use crate::timeline::PresentationTimeline;
use crate::uri::BaseUriChain;

use model::{AdaptationSet, BaseUrl, Mpd, Period, Representation, SegmentBase, SegmentList, SegmentTemplate, SegmentTimeline};
use segments::TemplateContext;

/// DASH-IF trick-mode association: an `EssentialProperty` on a trick-mode AdaptationSet whose
/// `@value` names the `@id` of the AdaptationSet it speeds through.
const TRICK_MODE_SCHEME: &str = "http://dashif.org/guidelines/trickmode";

/// xlink resolution stops following `onLoad` chains at this depth rather than detecting cycles
/// structurally.
const MAX_XLINK_DEPTH: u32 = 5;

/// Top-level entry point: fetches and parses the MPD at `manifest_uri`, resolves `xlink:href`
/// Periods, walks every Period/AdaptationSet/Representation, and assembles a uniform [`Manifest`].
pub async fn parse(
    manifest_uri: Url,
    facade: &FetchFacade,
    config: &ManifestConfig,
    cancellation_token: CancellationToken,
) -> Result<Manifest, ManifestError> {
    let response = facade.get(RequestType::Manifest, manifest_uri, cancellation_token.clone()).await?;
    let document = std::str::from_utf8(&response.body)
        .map_err(|e| ManifestError::InvalidXml(format!("MPD is not valid UTF-8: {e}")))?;
    let mut mpd = parse_mpd_xml(document)?;
    let root_base = BaseUriChain::new(response.uri.clone());
    let mpd_base = push_base_urls(&root_base, &mpd.base_url)?;

    let mut periods = Vec::with_capacity(mpd.period.len());
    for period in mpd.period.drain(..) {
        if let Some(resolved) = resolve_period_xlink(period, facade, &mpd_base, &cancellation_token, 0).await? {
            periods.push(resolved);
        }
    }

    let is_live = mpd.mpd_type.as_deref() == Some("dynamic");
    let mpd_duration_seconds = mpd.media_presentation_duration.as_deref().and_then(parse_xs_duration_seconds);

    let ids = IdAllocator::default();
    let mut warnings: Vec<ManifestWarning> = Vec::new();
    let mut events: Vec<ManifestEvent> = Vec::new();
    let mut variants: Vec<Variant> = Vec::new();
    let mut text_streams: Vec<StreamHandle> = Vec::new();
    let mut image_streams: Vec<StreamHandle> = Vec::new();

    let period_count = periods.len();
    let mut previous_end: Option<f64> = Some(0.0);
    let mut max_end_time = 0.0f64;
    let mut max_segment_duration = 0.0f64;

    'periods: for (period_index, period) in periods.into_iter().enumerate() {
        let start_seconds = match period.start.as_deref().and_then(parse_xs_duration_seconds) {
            Some(explicit) => explicit,
            None => match previous_end {
                Some(end) => end,
                // The previous Period's duration is unknown (open live edge); every following
                // Period is undated and gets discarded.
                None => break 'periods,
            },
        };
        let explicit_duration = period.duration.as_deref().and_then(parse_xs_duration_seconds);
        let is_last_period = period_index + 1 == period_count;
        let period_duration_seconds = explicit_duration.or_else(|| {
            if is_last_period {
                mpd_duration_seconds.map(|total| (total - start_seconds).max(0.0))
            } else {
                None
            }
        });
        previous_end = explicit_duration.map(|d| start_seconds + d);

        let period_base = push_base_urls(&mpd_base, &period.base_url)?;

        collect_period_events(&period, &mut events);

        if period.adaptation_set.is_empty() {
            return Err(ManifestError::EmptyPeriod(period.id.clone()));
        }

        let mut video_streams: Vec<(StreamHandle, u64)> = Vec::new();
        let mut audio_streams: Vec<(StreamHandle, u64)> = Vec::new();
        let mut trick_mode_candidates: Vec<(String, StreamHandle)> = Vec::new();
        let mut main_video_by_id: HashMap<String, Vec<StreamHandle>> = HashMap::new();

        for adaptation_set in &period.adaptation_set {
            let as_base = push_base_urls(&period_base, &adaptation_set.base_url)?;
            let kind = classify_kind(adaptation_set);

            if adaptation_set.representation.is_empty() {
                warnings.push(ManifestWarning {
                    error: ManifestError::EmptyAdaptationSet(adaptation_set.id.clone()).to_string(),
                    context: ErrorContext::new().with_uri(as_base.current().to_string()),
                });
                continue;
            }

            let trick_mode_main_id = adaptation_set
                .essential_property
                .iter()
                .find(|d| d.scheme_id_uri == TRICK_MODE_SCHEME)
                .and_then(|d| d.value.clone());

            let roles: Vec<String> = adaptation_set.role.iter().filter_map(|r| r.value.clone()).collect();
            let forced = roles.iter().any(|r| r == "forced-subtitle" || r == "forced_subtitle");
            let label = adaptation_set.label.first().map(|l| l.text.clone());
            let language = adaptation_set.lang.clone();

            let mut built: Vec<(StreamHandle, u64)> = Vec::with_capacity(adaptation_set.representation.len());
            let mut seen_ids: HashSet<&str> = HashSet::new();

            for representation in &adaptation_set.representation {
                if !seen_ids.insert(representation.id.as_str()) {
                    let err = ManifestError::DuplicateRepresentationId(representation.id.clone());
                    if is_live {
                        return Err(err);
                    }
                    warnings.push(ManifestWarning {
                        error: err.to_string(),
                        context: ErrorContext::new().with_representation(representation.id.clone()),
                    });
                    continue;
                }

                let rep_base = push_base_urls(&as_base, &representation.base_url)?;
                let addressing = pick_addressing(representation, adaptation_set);
                let Some(addressing) = addressing else {
                    warnings.push(ManifestWarning {
                        error: ManifestError::RequiredTagMissing {
                            element: "Representation".into(),
                            tag: "SegmentBase|SegmentList|SegmentTemplate".into(),
                        }
                        .to_string(),
                        context: ErrorContext::new().with_representation(representation.id.clone()),
                    });
                    continue;
                };

                let timescale = addressing.timescale().max(1);
                let start_number = addressing.start_number();
                let ctx = TemplateContext {
                    base: &rep_base,
                    representation_id: &representation.id,
                    bandwidth: representation.bandwidth.unwrap_or(0),
                    timescale,
                    start_number,
                };

                let refs = match addressing.materialize(&ctx, &rep_base, period_duration_seconds) {
                    Ok(refs) => refs,
                    Err(e) => {
                        warnings.push(ManifestWarning {
                            error: e.to_string(),
                            context: ErrorContext::new().with_representation(representation.id.clone()),
                        });
                        continue;
                    }
                };
                if refs.is_empty() {
                    continue;
                }

                let seg_max = refs.iter().fold(0.0_f64, |acc, r| acc.max(r.duration()));
                max_segment_duration = max_segment_duration.max(seg_max);

                let segment_index = match SegmentIndex::from_refs(refs) {
                    Ok(index) => index,
                    Err(e) => {
                        warnings.push(ManifestWarning {
                            error: ManifestError::UnparsableSegment(e.to_string()).to_string(),
                            context: ErrorContext::new().with_representation(representation.id.clone()),
                        });
                        continue;
                    }
                };

                let mut content_protection = adaptation_set.content_protection.clone();
                content_protection.extend(representation.content_protection.clone());
                let drm_info = if config.ignore_drm_info {
                    Vec::new()
                } else {
                    drm::build_drm_infos(&content_protection, &mut warnings)
                };
                let encrypted = !drm_info.is_empty();

                let frame_rate =
                    representation.frame_rate.as_deref().or(adaptation_set.frame_rate.as_deref()).and_then(parse_frame_rate);
                let pixel_aspect_ratio = adaptation_set.par.as_deref().and_then(parse_aspect_ratio);
                let codecs = representation.codecs.clone().or_else(|| adaptation_set.codecs.clone());
                let channels_count = representation
                    .audio_channel_configuration
                    .first()
                    .and_then(|d| d.value.as_deref())
                    .and_then(|v| v.parse().ok());

                let stream = Arc::new(Stream {
                    kind,
                    mime_type: Mutex::new(representation.mime_type.clone().or_else(|| adaptation_set.mime_type.clone())),
                    codecs: Mutex::new(codecs),
                    width: representation.width.or(adaptation_set.width),
                    height: representation.height.or(adaptation_set.height),
                    frame_rate,
                    pixel_aspect_ratio,
                    channels_count,
                    audio_sampling_rate: representation.audio_sampling_rate,
                    spatial_audio: false,
                    language: language.clone(),
                    original_language: language.clone(),
                    label: label.clone(),
                    roles: roles.clone(),
                    forced,
                    text_kind: (kind == StreamKind::Text).then_some(TextKind::Subtitle),
                    hdr: None,
                    video_layout: None,
                    closed_captions: HashMap::new(),
                    drm_info: Mutex::new(drm_info),
                    segment_index: Mutex::new(Some(segment_index)),
                    trick_mode_video: Mutex::new(None),
                    encrypted: Mutex::new(encrypted),
                    unloaded: Mutex::new(false),
                    id: ids.next(),
                    dash_representation_id: Some(representation.id.clone()),
                    hls_playlist_uri: Mutex::new(None),
                });
                built.push((stream, representation.bandwidth.unwrap_or(0)));
            }

            if built.is_empty() {
                continue;
            }

            match (kind, trick_mode_main_id) {
                (StreamKind::Video, Some(main_id)) => {
                    if let Some((stream, _)) = built.into_iter().next() {
                        trick_mode_candidates.push((main_id, stream));
                    }
                }
                (StreamKind::Video, None) => {
                    if let Some(id) = &adaptation_set.id {
                        main_video_by_id.entry(id.clone()).or_default().extend(built.iter().map(|(s, _)| Arc::clone(s)));
                    }
                    video_streams.extend(built);
                }
                (StreamKind::Audio, _) => audio_streams.extend(built),
                (StreamKind::Text, _) => {
                    if !config.disable_text {
                        text_streams.extend(built.into_iter().map(|(s, _)| s));
                    }
                }
                (StreamKind::Image, _) => {
                    if !config.disable_thumbnails {
                        image_streams.extend(built.into_iter().map(|(s, _)| s));
                    }
                }
            }
        }

        for (main_id, trick_stream) in trick_mode_candidates {
            if let Some(mains) = main_video_by_id.get(&main_id) {
                for main in mains {
                    *main.trick_mode_video.lock().expect("trick_mode_video mutex poisoned") = Some(Arc::clone(&trick_stream));
                }
            }
        }

        if config.disable_video {
            video_streams.clear();
        }
        if config.disable_audio {
            audio_streams.clear();
        }

        variants.extend(pair_variants(&video_streams, &audio_streams, &ids));

        if let Some(end) = previous_end {
            max_end_time = max_end_time.max(end);
        } else if let Some(d) = period_duration_seconds {
            max_end_time = max_end_time.max(start_seconds + d);
        }
    }

    if variants.is_empty() && text_streams.is_empty() && image_streams.is_empty() {
        return Err(ManifestError::EmptyPeriod(None));
    }

    let mut timeline = if is_live {
        let offset_ms = utc_timing::resolve_clock_offset_ms(&mpd.utc_timing, facade, cancellation_token.clone()).await;
        let availability_start_ms =
            mpd.availability_start_time.as_deref().and_then(utc_timing::parse_iso8601_ms).unwrap_or(0);
        let window_seconds = if config.availability_window_override.is_some() {
            None
        } else {
            mpd.time_shift_buffer_depth.as_deref().and_then(parse_xs_duration_seconds)
        };
        let suggested_delay =
            mpd.suggested_presentation_delay.as_deref().and_then(parse_xs_duration_seconds).unwrap_or(0.0);
        let mut tl = PresentationTimeline::new_live(availability_start_ms, window_seconds, suggested_delay);
        if let Some(offset) = offset_ms {
            tl.set_clock_offset_ms(offset);
        }
        tl
    } else {
        PresentationTimeline::new_vod(mpd_duration_seconds.unwrap_or(max_end_time))
    };
    if let Some(window) = config.availability_window_override {
        timeline.set_availability_window_override(window);
    }
    timeline.notify_max_segment_duration(max_segment_duration);

    for w in &warnings {
        tracing::warn!(error = %w.error, context = %w.context, "recoverable DASH parsing issue");
    }

    let minimum_update_period = is_live
        .then(|| mpd.minimum_update_period.as_deref().and_then(parse_xs_duration_seconds))
        .flatten()
        .map(std::time::Duration::from_secs_f64);

    Ok(Manifest {
        timeline,
        variants,
        text_streams,
        image_streams,
        is_live,
        sequence_mode: false,
        start_time: None,
        source_format: SourceFormat::Dash,
        minimum_update_period,
        target_duration: None,
        content_steering_uri: None,
        events,
    })
}

/// Live update: re-fetches and fully re-parses the MPD at `manifest_uri`, then merges the fresh
/// segment references into the existing `Manifest` in place, matching streams by
/// `Representation@id` rather than position so a reordered `AdaptationSet` list still lines up.
///
/// This is a full re-parse rather than an incremental one: simpler to reason about, and MPDs are
/// small enough that re-parsing on every `minimumUpdatePeriod` tick is not a meaningful cost next
/// to the segment fetches it's scheduled alongside. A `Representation` that disappears or appears
/// between refreshes is not reflected in `manifest.variants`; only representations present at both
/// the original `parse` and this `refresh` have their segment index extended. Picking up added or
/// removed representations requires a fresh `parse` call.
pub async fn refresh(
    manifest: &mut Manifest,
    manifest_uri: Url,
    facade: &FetchFacade,
    config: &ManifestConfig,
    cancellation_token: CancellationToken,
) -> Result<(), ManifestError> {
    let fresh = parse(manifest_uri, facade, config, cancellation_token).await?;

    let mut by_representation_id: HashMap<String, StreamHandle> = HashMap::new();
    for stream in manifest.all_streams() {
        if let Some(id) = stream.dash_representation_id.clone() {
            by_representation_id.insert(id, stream);
        }
    }

    for fresh_stream in fresh.all_streams() {
        let Some(id) = &fresh_stream.dash_representation_id else { continue };
        let Some(existing) = by_representation_id.get(id) else { continue };

        let new_refs: Vec<_> = fresh_stream
            .segment_index
            .lock()
            .expect("segment_index mutex poisoned")
            .as_ref()
            .map(|index| index.iter().cloned().collect())
            .unwrap_or_default();
        existing
            .segment_index
            .lock()
            .expect("segment_index mutex poisoned")
            .get_or_insert_with(SegmentIndex::new)
            .merge(new_refs);

        *existing.drm_info.lock().expect("drm_info mutex poisoned") =
            fresh_stream.drm_info.lock().expect("drm_info mutex poisoned").clone();
        *existing.encrypted.lock().expect("encrypted mutex poisoned") =
            *fresh_stream.encrypted.lock().expect("encrypted mutex poisoned");
    }

    manifest.timeline = fresh.timeline;
    manifest.is_live = fresh.is_live;
    manifest.minimum_update_period = fresh.minimum_update_period;
    manifest.events.extend(fresh.events);
    manifest.events.push(ManifestEvent::ManifestUpdated);
    Ok(())
}

fn parse_mpd_xml(document: &str) -> Result<Mpd, ManifestError> {
    let mut de = quick_xml::de::Deserializer::from_str(document);
    serde_path_to_error::deserialize(&mut de).map_err(|e| ManifestError::InvalidXml(e.to_string()))
}

/// Concatenates a sequence of `BaseURL` elements onto `base`, in document order; an absolute
/// `BaseURL` replaces the chain's innermost entry wholesale (`Url::join` semantics), a relative
/// one is appended (BaseURL inheritance).
fn push_base_urls(base: &BaseUriChain, base_urls: &[BaseUrl]) -> Result<BaseUriChain, ManifestError> {
    let mut chain = base.clone();
    if let Some(first) = base_urls.first() {
        chain = chain.push(first.text.trim())?;
    }
    Ok(chain)
}

/// Resolves a `Period@xlink:href` when `actuate="onLoad"`: fetches the referenced fragment and
/// recurses (bounded by [`MAX_XLINK_DEPTH`] to break cycles, since resolved remote Periods can
/// themselves declare further `xlink:href`s). `actuate="onRequest"` Periods are returned with the
/// href cleared so they're treated as present-but-empty rather than fetched eagerly; a Period
/// whose `onLoad` fetch fails is dropped with a warning rather than failing the whole parse.
fn resolve_period_xlink<'a>(
    period: Period,
    facade: &'a FetchFacade,
    base: &'a BaseUriChain,
    cancellation_token: &'a CancellationToken,
    depth: u32,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<Period>, ManifestError>> + 'a>> {
    Box::pin(async move {
        let Some(href) = period.xlink_href.clone() else {
            return Ok(Some(period));
        };
        if period.xlink_actuate != "onLoad" || depth >= MAX_XLINK_DEPTH {
            let mut deferred = period;
            deferred.xlink_href = None;
            return Ok(Some(deferred));
        }

        let uri = base.resolve(&href)?;
        let response = match facade.get(RequestType::Manifest, uri, cancellation_token.clone()).await {
            Ok(response) => response,
            Err(_) => return Ok(None),
        };
        let document = std::str::from_utf8(&response.body)
            .map_err(|e| ManifestError::InvalidXml(format!("xlink:href fragment is not valid UTF-8: {e}")))?;

        // A remote Period fragment is the bare `<Period>` element itself; reuse the MPD-level
        // deserializer by wrapping it so serde sees a single `Period` child, same shape `quick_xml`
        // already knows how to deserialize.
        let wrapped = format!("<Wrapper>{document}</Wrapper>");
        let mut de = quick_xml::de::Deserializer::from_str(&wrapped);
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(rename = "Period")]
            period: Period,
        }
        let resolved: Wrapper = serde_path_to_error::deserialize(&mut de).map_err(|e| ManifestError::InvalidXml(e.to_string()))?;
        resolve_period_xlink(resolved.period, facade, base, cancellation_token, depth + 1).await
    })
}

fn collect_period_events(period: &Period, events: &mut Vec<ManifestEvent>) {
    for event_stream in &period.event_stream {
        let timescale = event_stream.timescale.unwrap_or(1);
        if scte35::is_scte35_event_stream(&event_stream.scheme_id_uri) {
            for dash_event in &event_stream.event {
                events.extend(scte35::build_events(dash_event, timescale));
            }
            continue;
        }
        for dash_event in &event_stream.event {
            let scale = timescale.max(1) as f64;
            let start_time = dash_event.presentation_time.unwrap_or(0) as f64 / scale;
            match dash_event.duration {
                Some(duration) => events.push(ManifestEvent::TimelineRegionAdded {
                    scheme_id_uri: event_stream.scheme_id_uri.clone(),
                    start_time,
                    end_time: start_time + duration as f64 / scale,
                    id: dash_event.id.clone(),
                }),
                None => events.push(ManifestEvent::Emsg {
                    scheme_id_uri: event_stream.scheme_id_uri.clone(),
                    value: event_stream.value.clone(),
                    id: dash_event.id.clone(),
                    presentation_time: start_time,
                    duration: None,
                    message_data: dash_event.text.clone().unwrap_or_default().into_bytes(),
                }),
            }
        }
    }
}

/// The Representation-level element, if present, overrides the AdaptationSet-level one of the
/// same kind. SegmentTemplate (with a SegmentTimeline taking priority over a plain `@duration`)
/// always wins when present; failing that, an explicit SegmentBase wins over SegmentList (see
/// DESIGN.md for the same-level tie-break rationale).
enum Addressing<'a> {
    TemplateTimeline(&'a SegmentTemplate, &'a SegmentTimeline),
    TemplateDuration(&'a SegmentTemplate, u64),
    List(&'a SegmentList),
    Base(Option<&'a SegmentBase>),
}

impl<'a> Addressing<'a> {
    fn timescale(&self) -> u64 {
        match self {
            Addressing::TemplateTimeline(t, _) | Addressing::TemplateDuration(t, _) => t.timescale,
            Addressing::List(l) => l.timescale,
            Addressing::Base(sb) => sb.map(|s| s.timescale).unwrap_or(1),
        }
    }

    fn start_number(&self) -> u64 {
        match self {
            Addressing::TemplateTimeline(t, _) | Addressing::TemplateDuration(t, _) => t.start_number,
            _ => 1,
        }
    }

    fn materialize(
        &self,
        ctx: &TemplateContext,
        rep_base: &BaseUriChain,
        period_duration_seconds: Option<f64>,
    ) -> Result<Vec<crate::segment_index::SegmentReference>, ManifestError> {
        match self {
            Addressing::TemplateTimeline(t, tl) => segments::materialize_template_timeline(ctx, t, tl, period_duration_seconds),
            Addressing::TemplateDuration(t, d) => segments::materialize_template_duration(ctx, t, *d, period_duration_seconds, None),
            Addressing::List(l) => segments::materialize_segment_list(rep_base, l, 1),
            Addressing::Base(sb) => segments::materialize_segment_base(rep_base, "", *sb, period_duration_seconds),
        }
    }
}

fn pick_addressing<'a>(representation: &'a Representation, adaptation_set: &'a AdaptationSet) -> Option<Addressing<'a>> {
    let template = representation.segment_template.as_ref().or(adaptation_set.segment_template.as_ref());
    if let Some(template) = template {
        if let Some(timeline) = &template.segment_timeline {
            return Some(Addressing::TemplateTimeline(template, timeline));
        }
        if let Some(duration) = template.duration {
            return Some(Addressing::TemplateDuration(template, duration));
        }
    }
    // An explicit SegmentBase wins a tie against SegmentList at the same level (the reverse of
    // the summary ordering above, carried over unchanged from behaviour observed upstream; see
    // DESIGN.md for why this one pair's tie-break is the exception).
    let base = representation.segment_base.as_ref().or(adaptation_set.segment_base.as_ref());
    if base.is_some() {
        return Some(Addressing::Base(base));
    }
    let list = representation.segment_list.as_ref().or(adaptation_set.segment_list.as_ref());
    if let Some(list) = list {
        return Some(Addressing::List(list));
    }
    if !representation.base_url.is_empty() {
        return Some(Addressing::Base(None));
    }
    None
}

/// An AdaptationSet's content kind, from `@contentType`, falling back to `@mimeType`'s top-level
/// type, falling back to a codec-string guess for the handful of subtitle codecs that some
/// packagers omit both attributes for.
fn classify_kind(adaptation_set: &AdaptationSet) -> StreamKind {
    let hint = adaptation_set.content_type.as_deref().or(adaptation_set.mime_type.as_deref());
    match hint {
        Some(s) if s.starts_with("audio") => StreamKind::Audio,
        Some(s) if s.starts_with("text") => StreamKind::Text,
        Some(s) if s.starts_with("image") => StreamKind::Image,
        Some(s) if s.starts_with("video") => StreamKind::Video,
        _ => match adaptation_set.codecs.as_deref() {
            Some(c) if c.starts_with("stpp") || c.starts_with("wvtt") => StreamKind::Text,
            _ => StreamKind::Video,
        },
    }
}

fn parse_frame_rate(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => Some(num.trim().parse::<f64>().ok()? / den.trim().parse::<f64>().ok()?),
        None => s.trim().parse().ok(),
    }
}

fn parse_aspect_ratio(s: &str) -> Option<(u64, u64)> {
    let (w, h) = s.split_once(':')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Parses an `xs:duration` string (`PT6S`, `P0Y0M0DT0H0M30.000S`) to `f64` seconds, since every
/// caller here works in fractional seconds rather than a `std::time::Duration`.
fn parse_xs_duration_seconds(s: &str) -> Option<f64> {
    match iso8601::duration(s.trim()).ok()? {
        iso8601::Duration::Weeks(weeks) => Some(weeks as f64 * 7.0 * 86_400.0),
        iso8601::Duration::YMDHMS { year, month, day, hour, minute, second, millisecond } => {
            let mut seconds = second as f64;
            seconds += minute as f64 * 60.0;
            seconds += hour as f64 * 3_600.0;
            seconds += day as f64 * 86_400.0;
            seconds += month as f64 * 86_400.0 * 31.0;
            seconds += year as f64 * 86_400.0 * 365.0;
            seconds += millisecond as f64 / 1_000.0;
            Some(seconds)
        }
    }
}

/// Pairs audio and video Streams into Variants: a cartesian product when a Period has both, one
/// audio-only or video-only Variant per Stream otherwise.
fn pair_variants(video_streams: &[(StreamHandle, u64)], audio_streams: &[(StreamHandle, u64)], ids: &IdAllocator) -> Vec<Variant> {
    let mut variants = Vec::new();
    if !video_streams.is_empty() && !audio_streams.is_empty() {
        for (video, video_bw) in video_streams {
            for (audio, audio_bw) in audio_streams {
                variants.push(build_variant(ids, Some(Arc::clone(video)), Some(Arc::clone(audio)), Some(video_bw + audio_bw)));
            }
        }
    } else if !video_streams.is_empty() {
        for (video, bw) in video_streams {
            variants.push(build_variant(ids, Some(Arc::clone(video)), None, Some(*bw)));
        }
    } else {
        for (audio, bw) in audio_streams {
            variants.push(build_variant(ids, None, Some(Arc::clone(audio)), Some(*bw)));
        }
    }
    variants
}

fn build_variant(ids: &IdAllocator, video: Option<StreamHandle>, audio: Option<StreamHandle>, bandwidth: Option<u64>) -> Variant {
    let mut drm_info = Vec::new();
    if let Some(s) = &video {
        drm_info.extend(s.drm_info.lock().expect("drm_info mutex poisoned").clone());
    }
    if let Some(s) = &audio {
        drm_info.extend(s.drm_info.lock().expect("drm_info mutex poisoned").clone());
    }
    let language = audio.as_ref().and_then(|s| s.language.clone()).or_else(|| video.as_ref().and_then(|s| s.language.clone()));
    Variant { id: ids.next(), bandwidth, language, primary: false, drm_info, video, audio }
}
