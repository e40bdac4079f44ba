//! Segment addressing materialization: `SegmentBase`, `SegmentList`, and `SegmentTemplate` with
//! either an explicit `@duration` or a `SegmentTimeline`, each turned into concrete
//! `SegmentReference`s against a resolved [`BaseUriChain`].

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::dash::model::{InitializationElement, SegmentBase, SegmentList, SegmentTemplate, SegmentTimeline};
use crate::error::ManifestError;
use crate::segment_index::{InitSegmentReference, SegmentReference, SegmentStatus};
use crate::uri::BaseUriChain;

/// Everything needed to expand a `$Number$`/`$Time$`/`$Bandwidth$` URL template for one
/// Representation.
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub base: &'a BaseUriChain,
    pub representation_id: &'a str,
    pub bandwidth: u64,
    pub timescale: u64,
    pub start_number: u64,
}

lazy_static! {
    // One exact-match identifier and one `%0Nd`-padded regex per substitutable token, including
    // `SubNumber` alongside the four core identifiers (DASH §5.3.9.4.4 allows both forms).
    static ref URL_TEMPLATE_IDS: Vec<(&'static str, String, Regex)> = {
        vec!["RepresentationID", "Number", "Time", "Bandwidth", "SubNumber"].into_iter()
            .map(|k| (k, format!("${k}$"), Regex::new(&format!("\\${k}%0([\\d])d\\$")).unwrap()))
            .collect()
    };
}

/// Substitutes `$RepresentationID$`, `$Number[%0Nd]$`, `$Time[%0Nd]$`, `$Bandwidth[%0Nd]$` and
/// `$SubNumber[%0Nd]$` tokens, and collapses `$$` to a literal `$`.
pub fn expand_template(template: &str, params: &HashMap<&str, String>) -> String {
    let mut result = template.to_string();
    for (k, ident, rx) in URL_TEMPLATE_IDS.iter() {
        if result.contains(ident.as_str()) {
            if let Some(value) = params.get(k as &str) {
                result = result.replace(ident.as_str(), value);
            }
        }
        while let Some(cap) = rx.captures(&result) {
            let Some(value) = params.get(k as &str) else { break };
            let width: usize = cap[1].parse().unwrap_or(1);
            let padded = format!("{value:0>width$}");
            let m = rx.find(&result).expect("captures implies find succeeds");
            result = result[..m.start()].to_owned() + &padded + &result[m.end()..];
        }
    }
    result.replace("$$", "$")
}

fn params(ctx: &TemplateContext, number: Option<u64>, time: Option<u64>) -> HashMap<&'static str, String> {
    let mut p = HashMap::new();
    p.insert("RepresentationID", ctx.representation_id.to_string());
    p.insert("Bandwidth", ctx.bandwidth.to_string());
    if let Some(n) = number {
        p.insert("Number", n.to_string());
    }
    if let Some(t) = time {
        p.insert("Time", t.to_string());
    }
    p
}

fn parse_byte_range(range: &str) -> (u64, Option<u64>) {
    let mut parts = range.splitn(2, '-');
    let start = parts.next().and_then(|s| s.trim().parse().ok()).unwrap_or(0);
    let end = parts.next().and_then(|s| s.trim().parse().ok());
    (start, end)
}

fn build_init_from_element(base: &BaseUriChain, el: &InitializationElement) -> Result<Arc<InitSegmentReference>, ManifestError> {
    let uri = base.resolve(el.source_url.as_deref().unwrap_or(""))?;
    let (start_byte, end_byte) = el.range.as_deref().map(parse_byte_range).unwrap_or((0, None));
    Ok(Arc::new(InitSegmentReference { uris: vec![uri.to_string()], start_byte, end_byte, media_quality: None, aes_key: None }))
}

fn build_init_from_template(ctx: &TemplateContext, template: &str) -> Result<Arc<InitSegmentReference>, ManifestError> {
    let expanded = expand_template(template, &params(ctx, None, None));
    let uri = ctx.base.resolve(&expanded)?;
    Ok(Arc::new(InitSegmentReference { uris: vec![uri.to_string()], start_byte: 0, end_byte: None, media_quality: None, aes_key: None }))
}

#[allow(clippy::too_many_arguments)]
fn blank_reference(
    start_time: f64,
    end_time: f64,
    uri: String,
    start_byte: u64,
    end_byte: Option<u64>,
    init: Option<Arc<InitSegmentReference>>,
    number: Option<u64>,
) -> SegmentReference {
    SegmentReference {
        start_time,
        end_time,
        uris: vec![uri],
        start_byte,
        end_byte,
        init_segment_reference: init,
        timestamp_offset: 0.0,
        append_window_start: 0.0,
        append_window_end: f64::INFINITY,
        partial_references: Vec::new(),
        status: SegmentStatus::Available,
        discontinuity_sequence: 0,
        aes_key: None,
        sync_time: None,
        media_sequence_number: number,
        tiles_layout: None,
        drm_info: Vec::new(),
    }
}

/// `SegmentTemplate` + `SegmentTimeline`: expands each `<S t= d= r=/>` run into one reference per
/// repetition (`r` excludes the entry's own first occurrence, so the run length is `r + 1`). `t`
/// omitted continues from the previous entry's end time. `r=-1` repeats until
/// `period_duration_seconds` is reached; if the period's duration isn't known yet (its last
/// period is still open on a live presentation) only the entry itself is emitted and a later
/// refresh appends the rest once the server has announced more of the timeline.
pub fn materialize_template_timeline(
    ctx: &TemplateContext,
    template: &SegmentTemplate,
    timeline: &SegmentTimeline,
    period_duration_seconds: Option<f64>,
) -> Result<Vec<SegmentReference>, ManifestError> {
    let media = template
        .media
        .as_deref()
        .ok_or_else(|| ManifestError::RequiredAttributeMissing { element: "SegmentTemplate".into(), attribute: "media".into() })?;
    let init = template.initialization.as_deref().map(|tmpl| build_init_from_template(ctx, tmpl)).transpose()?;
    let period_duration_units = period_duration_seconds.map(|d| (d * ctx.timescale as f64).round() as u64);

    let mut refs = Vec::new();
    let mut t = 0u64;
    let mut number = ctx.start_number;

    for entry in &timeline.s {
        if let Some(start) = entry.t {
            t = start;
        }
        let open_ended = entry.r < 0;
        let explicit_count = if open_ended { None } else { Some(entry.r as u64 + 1) };

        let mut i = 0u64;
        loop {
            if let Some(count) = explicit_count {
                if i >= count {
                    break;
                }
            } else if let Some(limit) = period_duration_units {
                if t >= limit {
                    break;
                }
            } else if i >= 1 {
                break;
            }

            let seg_start = t;
            let seg_end = t + entry.d;
            let expanded = expand_template(media, &params(ctx, Some(number), Some(seg_start)));
            let uri = ctx.base.resolve(&expanded)?;
            refs.push(blank_reference(
                seg_start as f64 / ctx.timescale as f64,
                seg_end as f64 / ctx.timescale as f64,
                uri.to_string(),
                0,
                None,
                init.clone(),
                Some(number),
            ));

            t = seg_end;
            number += 1;
            i += 1;
        }
    }
    Ok(refs)
}

/// `SegmentTemplate` + `@duration` (no timeline): an infinite arithmetic sequence, materialized up
/// to `period_duration_seconds` for VOD or up to `now_seconds_since_period_start` for the open
/// edge of a live period's last Period.
pub fn materialize_template_duration(
    ctx: &TemplateContext,
    template: &SegmentTemplate,
    duration_units: u64,
    period_duration_seconds: Option<f64>,
    now_seconds_since_period_start: Option<f64>,
) -> Result<Vec<SegmentReference>, ManifestError> {
    let media = template
        .media
        .as_deref()
        .ok_or_else(|| ManifestError::RequiredAttributeMissing { element: "SegmentTemplate".into(), attribute: "media".into() })?;
    let init = template.initialization.as_deref().map(|tmpl| build_init_from_template(ctx, tmpl)).transpose()?;

    let seg_duration_seconds = duration_units as f64 / ctx.timescale as f64;
    if seg_duration_seconds <= 0.0 {
        return Ok(Vec::new());
    }
    let bound = period_duration_seconds.or(now_seconds_since_period_start).unwrap_or(seg_duration_seconds);
    let count = (bound / seg_duration_seconds).ceil().max(1.0) as u64;

    let mut refs = Vec::with_capacity(count as usize);
    for i in 0..count {
        let number = ctx.start_number + i;
        let seg_start = i as f64 * seg_duration_seconds;
        let seg_end = seg_start + seg_duration_seconds;
        let time_value = i * duration_units;
        let expanded = expand_template(media, &params(ctx, Some(number), Some(time_value)));
        let uri = ctx.base.resolve(&expanded)?;
        refs.push(blank_reference(seg_start, seg_end, uri.to_string(), 0, None, init.clone(), Some(number)));
    }
    Ok(refs)
}

/// `SegmentList`: each `SegmentURL` becomes one reference; start/end times accumulate from
/// `@duration`/`@timescale` — `SegmentList` addresses its media items literally, no
/// `$Number$`/`$Time$` template expansion applies.
pub fn materialize_segment_list(base: &BaseUriChain, list: &SegmentList, start_number: u64) -> Result<Vec<SegmentReference>, ManifestError> {
    let init = list.initialization.as_ref().map(|el| build_init_from_element(base, el)).transpose()?;
    let duration = list
        .duration
        .ok_or_else(|| ManifestError::RequiredAttributeMissing { element: "SegmentList".into(), attribute: "duration".into() })?;

    let mut refs = Vec::with_capacity(list.segment_url.len());
    let mut t = 0u64;
    for (i, su) in list.segment_url.iter().enumerate() {
        let media = su
            .media
            .as_deref()
            .ok_or_else(|| ManifestError::RequiredAttributeMissing { element: "SegmentURL".into(), attribute: "media".into() })?;
        let uri = base.resolve(media)?;
        let (start_byte, end_byte) = su.media_range.as_deref().map(parse_byte_range).unwrap_or((0, None));
        let seg_start = t as f64 / list.timescale as f64;
        let seg_end = (t + duration) as f64 / list.timescale as f64;
        refs.push(blank_reference(seg_start, seg_end, uri.to_string(), start_byte, end_byte, init.clone(), Some(start_number + i as u64)));
        t += duration;
    }
    Ok(refs)
}

/// `SegmentBase`: the Representation's own `BaseURL` addresses the entire media resource directly.
/// `@indexRange` locates a `sidx` box that would let a fuller implementation expand this into one
/// reference per sidx entry instead of a single whole-resource segment; that box isn't parsed
/// here, so the resource is exposed as one segment spanning the period's duration.
pub fn materialize_segment_base(
    base: &BaseUriChain,
    representation_base_url: &str,
    segment_base: Option<&SegmentBase>,
    period_duration_seconds: Option<f64>,
) -> Result<Vec<SegmentReference>, ManifestError> {
    let uri = base.resolve(representation_base_url)?;
    let init = segment_base
        .and_then(|sb| sb.initialization.as_ref())
        .map(|el| build_init_from_element(base, el))
        .transpose()?;
    let duration = period_duration_seconds.unwrap_or(0.0).max(0.001);
    Ok(vec![blank_reference(0.0, duration, uri.to_string(), 0, None, init, Some(0))])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> BaseUriChain {
        BaseUriChain::new(url::Url::parse("https://example.com/video/").unwrap())
    }

    #[test]
    fn expands_simple_and_padded_tokens() {
        let params = HashMap::from([("Time", "ZZZ".to_string())]);
        assert_eq!(expand_template("AA$Time$BB", &params), "AAZZZBB");

        let params = HashMap::from([("Number", "42".to_string())]);
        assert_eq!(expand_template("AA$Number%06d$BB", &params), "AA000042BB");

        let params = HashMap::from([("RepresentationID", "640x480".to_string()), ("Number", "42".to_string())]);
        assert_eq!(
            expand_template("AA/$RepresentationID$/segment-$Number%05d$.mp4", &params),
            "AA/640x480/segment-00042.mp4"
        );
    }

    #[test]
    fn escapes_literal_dollar() {
        assert_eq!(expand_template("price$$42", &HashMap::new()), "price$42");
    }

    #[test]
    fn timeline_expands_repeat_count_inclusive_of_entry() {
        let base = chain();
        let ctx = TemplateContext { base: &base, representation_id: "video-1", bandwidth: 500_000, timescale: 1, start_number: 1 };
        let template = SegmentTemplate {
            media: Some("$RepresentationID$/$Number$.m4s".to_string()),
            initialization: Some("$RepresentationID$/init.mp4".to_string()),
            start_number: 1,
            timescale: 1,
            duration: None,
            segment_timeline: None,
        };
        let timeline = SegmentTimeline {
            s: vec![crate::dash::model::SegmentTimelineEntry { t: Some(0), d: 4, r: 2, k: 1 }],
        };
        let refs = materialize_template_timeline(&ctx, &template, &timeline, Some(12.0)).unwrap();
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].start_time, 0.0);
        assert_eq!(refs[2].start_time, 8.0);
        assert_eq!(refs[2].end_time, 12.0);
        assert_eq!(refs[1].uris[0], "https://example.com/video/video-1/2.m4s");
    }

    #[test]
    fn duration_template_counts_segments_for_known_period_length() {
        let base = chain();
        let ctx = TemplateContext { base: &base, representation_id: "audio-1", bandwidth: 128_000, timescale: 1, start_number: 1 };
        let template = SegmentTemplate {
            media: Some("chunk-$Number$.m4s".to_string()),
            initialization: None,
            start_number: 1,
            timescale: 1,
            duration: Some(6),
            segment_timeline: None,
        };
        let refs = materialize_template_duration(&ctx, &template, 6, Some(20.0), None).unwrap();
        assert_eq!(refs.len(), 4);
        assert_eq!(refs[3].start_time, 18.0);
        assert_eq!(refs[3].end_time, 24.0);
    }

    #[test]
    fn segment_list_accumulates_start_times_from_duration() {
        let base = chain();
        let list = SegmentList {
            duration: Some(5),
            timescale: 1,
            initialization: None,
            segment_url: vec![
                crate::dash::model::SegmentUrl { media: Some("a.mp4".to_string()), media_range: Some("0-999".to_string()) },
                crate::dash::model::SegmentUrl { media: Some("b.mp4".to_string()), media_range: Some("1000-1999".to_string()) },
            ],
        };
        let refs = materialize_segment_list(&base, &list, 1).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].start_time, 5.0);
        assert_eq!(refs[1].start_byte, 1000);
        assert_eq!(refs[1].end_byte, Some(1999));
    }
}
