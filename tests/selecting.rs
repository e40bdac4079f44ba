//! `ManifestConfig.disable_video`/`disable_audio` drop the respective streams before variant
//! pairing.

mod common;

use tokio_util::sync::CancellationToken;

const MPD: &str = r#"<?xml version="1.0"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static" mediaPresentationDuration="PT10S">
  <Period id="p0">
    <AdaptationSet contentType="video">
      <Representation id="v0" bandwidth="500000" codecs="avc1.4d401f">
        <SegmentTemplate media="v0-$Number$.m4s" startNumber="1" timescale="1" duration="10"/>
      </Representation>
    </AdaptationSet>
    <AdaptationSet contentType="audio" lang="en">
      <Representation id="a0" bandwidth="128000" codecs="mp4a.40.2">
        <SegmentTemplate media="a0-$Number$.m4s" startNumber="1" timescale="1" duration="10"/>
      </Representation>
    </AdaptationSet>
  </Period>
</MPD>"#;

#[tokio::test]
async fn disable_video_yields_audio_only_variant() {
    let fetcher = common::MockFetcher::new().with("https://example.com/stream.mpd", MPD);
    let facade = common::facade(fetcher);
    let mut config = common::config();
    config.disable_video = true;

    let manifest = manifest_engine::parse(common::url("https://example.com/stream.mpd"), &facade, &config, CancellationToken::new())
        .await
        .expect("parse should succeed");

    assert_eq!(manifest.variants.len(), 1);
    assert!(manifest.variants[0].video.is_none());
    assert!(manifest.variants[0].audio.is_some());
}

#[tokio::test]
async fn disable_audio_yields_video_only_variant() {
    let fetcher = common::MockFetcher::new().with("https://example.com/stream.mpd", MPD);
    let facade = common::facade(fetcher);
    let mut config = common::config();
    config.disable_audio = true;

    let manifest = manifest_engine::parse(common::url("https://example.com/stream.mpd"), &facade, &config, CancellationToken::new())
        .await
        .expect("parse should succeed");

    assert_eq!(manifest.variants.len(), 1);
    assert!(manifest.variants[0].audio.is_none());
    assert!(manifest.variants[0].video.is_some());
}
