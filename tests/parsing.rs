//! Basic VOD DASH parsing: a single Period, one video and one audio AdaptationSet addressed by
//! `SegmentTemplate`/`@duration`.

mod common;

use manifest_engine::manifest::{SourceFormat, StreamKind};
use tokio_util::sync::CancellationToken;

const MPD: &str = r#"<?xml version="1.0"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static" mediaPresentationDuration="PT30S">
  <Period id="p0">
    <AdaptationSet contentType="video" segmentAlignment="true">
      <Representation id="v0" bandwidth="500000" codecs="avc1.4d401f" width="640" height="360">
        <SegmentTemplate media="v0-$Number$.m4s" initialization="v0-init.mp4" startNumber="1" timescale="1" duration="10"/>
      </Representation>
    </AdaptationSet>
    <AdaptationSet contentType="audio" lang="en">
      <Representation id="a0" bandwidth="128000" codecs="mp4a.40.2" audioSamplingRate="48000">
        <SegmentTemplate media="a0-$Number$.m4s" initialization="a0-init.mp4" startNumber="1" timescale="1" duration="10"/>
      </Representation>
    </AdaptationSet>
  </Period>
</MPD>"#;

#[tokio::test]
async fn parses_vod_mpd_into_one_paired_variant() {
    let fetcher = common::MockFetcher::new().with("https://example.com/stream.mpd", MPD);
    let facade = common::facade(fetcher);
    let config = common::config();

    let manifest = manifest_engine::parse(common::url("https://example.com/stream.mpd"), &facade, &config, CancellationToken::new())
        .await
        .expect("parse should succeed");

    assert_eq!(manifest.source_format, SourceFormat::Dash);
    assert!(!manifest.is_live);
    assert_eq!(manifest.variants.len(), 1);
    assert!((manifest.timeline.duration_seconds() - 30.0).abs() < 1e-6);

    let variant = &manifest.variants[0];
    let video = variant.video.as_ref().expect("video stream");
    let audio = variant.audio.as_ref().expect("audio stream");
    assert_eq!(video.kind, StreamKind::Video);
    assert_eq!(audio.kind, StreamKind::Audio);
    assert_eq!(video.width, Some(640));
    assert_eq!(audio.language.as_deref(), Some("en"));

    let index = video.segment_index.lock().unwrap();
    let index = index.as_ref().expect("segment index materialised");
    assert_eq!(index.len(), 3);
    assert_eq!(index.get(0).unwrap().uris, vec!["https://example.com/v0-1.m4s".to_string()]);
}

#[tokio::test]
async fn missing_manifest_surfaces_as_network_error() {
    let fetcher = common::MockFetcher::new();
    let facade = common::facade(fetcher);
    let config = common::config();

    let err = manifest_engine::parse(common::url("https://example.com/missing.mpd"), &facade, &config, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, manifest_engine::error::ManifestError::NetworkError { .. }));
}
