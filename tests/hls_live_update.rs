//! Live HLS refresh: a single-variant master stays live across two fetches of its media
//! playlist, sequence 0 is evicted and sequence 3 appears, and `refresh` merges the change into
//! the existing stream's segment index by media-sequence alignment. Once the playlist gains
//! `#EXT-X-ENDLIST` the manifest drops out of `is_live`.

mod common;

use std::sync::Arc;

use manifest_engine::events::ManifestEvent;
use tokio_util::sync::CancellationToken;

const MASTER: &str = "#EXTM3U\n\
    #EXT-X-STREAM-INF:BANDWIDTH=1000000,CODECS=\"avc1.4d401f\"\n\
    video.m3u8\n";

const INITIAL: &str = "#EXTM3U\n\
    #EXT-X-TARGETDURATION:6\n\
    #EXT-X-MEDIA-SEQUENCE:0\n\
    #EXTINF:6.0,\n\
    seg-0.ts\n\
    #EXTINF:6.0,\n\
    seg-1.ts\n\
    #EXTINF:6.0,\n\
    seg-2.ts\n";

const REFRESHED: &str = "#EXTM3U\n\
    #EXT-X-TARGETDURATION:6\n\
    #EXT-X-MEDIA-SEQUENCE:1\n\
    #EXTINF:6.0,\n\
    seg-1.ts\n\
    #EXTINF:6.0,\n\
    seg-2.ts\n\
    #EXTINF:6.0,\n\
    seg-3.ts\n";

const ENDED: &str = "#EXTM3U\n\
    #EXT-X-TARGETDURATION:6\n\
    #EXT-X-MEDIA-SEQUENCE:1\n\
    #EXTINF:6.0,\n\
    seg-1.ts\n\
    #EXTINF:6.0,\n\
    seg-2.ts\n\
    #EXTINF:6.0,\n\
    seg-3.ts\n\
    #EXT-X-ENDLIST\n";

#[tokio::test]
async fn refresh_merges_sliding_window_and_fires_manifest_updated() {
    let fetcher = Arc::new(
        common::MockFetcher::new().with("https://example.com/master.m3u8", MASTER).with("https://example.com/video.m3u8", INITIAL),
    );
    let facade = common::facade_shared(Arc::clone(&fetcher));
    let config = common::config();

    let mut manifest = manifest_engine::parse(common::url("https://example.com/master.m3u8"), &facade, &config, CancellationToken::new())
        .await
        .expect("initial parse should succeed");
    assert!(manifest.is_live);
    assert_eq!(manifest.target_duration, Some(std::time::Duration::from_secs(6)));

    let video = manifest.variants[0].video.as_ref().expect("video stream").clone();
    assert_eq!(video.segment_index.lock().unwrap().as_ref().unwrap().len(), 3);

    fetcher.set("https://example.com/video.m3u8", REFRESHED);

    manifest_engine::refresh(&mut manifest, common::url("https://example.com/master.m3u8"), &facade, &config, CancellationToken::new())
        .await
        .expect("refresh should succeed");

    assert!(manifest.is_live);
    let index = video.segment_index.lock().unwrap();
    let index = index.as_ref().unwrap();
    assert_eq!(index.len(), 3, "sequence 0 should have been evicted by the merge");
    assert_eq!(index.get(0).unwrap().media_sequence_number, Some(1));
    assert_eq!(index.get(index.len() - 1).unwrap().uris, vec!["https://example.com/seg-3.ts".to_string()]);
    drop(index);
    assert_eq!(manifest.events.iter().filter(|e| **e == ManifestEvent::ManifestUpdated).count(), 1);

    fetcher.set("https://example.com/video.m3u8", ENDED);
    manifest_engine::refresh(&mut manifest, common::url("https://example.com/master.m3u8"), &facade, &config, CancellationToken::new())
        .await
        .expect("refresh should succeed");

    assert!(!manifest.is_live);
    assert!(video.hls_playlist_uri.lock().unwrap().is_none());
}
