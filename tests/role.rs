//! `Role` descriptors populate `Stream::roles`, and the `forced-subtitle` role marks a text
//! stream as forced.

mod common;

use tokio_util::sync::CancellationToken;

const MPD: &str = r#"<?xml version="1.0"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static" mediaPresentationDuration="PT10S">
  <Period id="p0">
    <AdaptationSet contentType="video">
      <Role schemeIdUri="urn:mpeg:dash:role:2011" value="main"/>
      <Representation id="v0" bandwidth="500000" codecs="avc1.4d401f">
        <SegmentTemplate media="v0-$Number$.m4s" startNumber="1" timescale="1" duration="10"/>
      </Representation>
    </AdaptationSet>
    <AdaptationSet contentType="text" mimeType="application/ttml+xml" lang="fr">
      <Role schemeIdUri="urn:mpeg:dash:role:2011" value="forced-subtitle"/>
      <Representation id="s0" bandwidth="1000">
        <SegmentTemplate media="s0-$Number$.m4s" startNumber="1" timescale="1" duration="10"/>
      </Representation>
    </AdaptationSet>
  </Period>
</MPD>"#;

#[tokio::test]
async fn role_descriptor_populates_roles_and_forced_flag() {
    let fetcher = common::MockFetcher::new().with("https://example.com/stream.mpd", MPD);
    let facade = common::facade(fetcher);
    let config = common::config();

    let manifest = manifest_engine::parse(common::url("https://example.com/stream.mpd"), &facade, &config, CancellationToken::new())
        .await
        .expect("parse should succeed");

    let video = manifest.variants[0].video.as_ref().unwrap();
    assert_eq!(video.roles, vec!["main".to_string()]);
    assert!(!video.forced);

    let text = &manifest.text_streams[0];
    assert!(text.roles.iter().any(|r| r == "forced-subtitle"));
    assert!(text.forced);
}
