//! `xlink:href` Period resolution: an `actuate="onLoad"` Period is replaced by a remote fragment
//! fetched through the same facade.

mod common;

use tokio_util::sync::CancellationToken;

const MPD: &str = r#"<?xml version="1.0"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" xmlns:xlink="http://www.w3.org/1999/xlink" type="static">
  <Period xlink:href="https://example.com/remote-period.xml" xlink:actuate="onLoad"/>
</MPD>"#;

const REMOTE_PERIOD: &str = r#"<Period id="remote" duration="PT5S">
  <AdaptationSet contentType="video">
    <Representation id="v0" bandwidth="500000" codecs="avc1.4d401f">
      <SegmentTemplate media="v0-$Number$.m4s" startNumber="1" timescale="1" duration="5"/>
    </Representation>
  </AdaptationSet>
</Period>"#;

#[tokio::test]
async fn on_load_xlink_period_is_fetched_and_spliced_in() {
    let fetcher = common::MockFetcher::new()
        .with("https://example.com/stream.mpd", MPD)
        .with("https://example.com/remote-period.xml", REMOTE_PERIOD);
    let facade = common::facade(fetcher);
    let config = common::config();

    let manifest = manifest_engine::parse(common::url("https://example.com/stream.mpd"), &facade, &config, CancellationToken::new())
        .await
        .expect("parse should succeed");

    assert_eq!(manifest.variants.len(), 1);
    assert!((manifest.timeline.duration_seconds() - 5.0).abs() < 1e-6);
}

#[tokio::test]
async fn on_load_fetch_failure_drops_the_period_without_failing_the_parse() {
    let fetcher = common::MockFetcher::new().with("https://example.com/stream.mpd", MPD);
    fetcher.fail_uri("https://example.com/remote-period.xml");
    let facade = common::facade(fetcher);
    let config = common::config();

    let result =
        manifest_engine::parse(common::url("https://example.com/stream.mpd"), &facade, &config, CancellationToken::new()).await;

    // No Periods survive, so the manifest as a whole is empty and parse fails with EmptyPeriod.
    assert!(result.is_err());
}
