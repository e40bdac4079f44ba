//! `#EXT-X-KEY:METHOD=AES-128` key bytes are fetched through the facade and filled into the
//! matching `AesKey`.

mod common;

use tokio_util::sync::CancellationToken;

const MASTER: &str = "#EXTM3U\n\
    #EXT-X-STREAM-INF:BANDWIDTH=1000000,CODECS=\"avc1.4d401f\"\n\
    video.m3u8\n";

const VIDEO_PLAYLIST: &str = "#EXTM3U\n\
    #EXT-X-TARGETDURATION:6\n\
    #EXT-X-PLAYLIST-TYPE:VOD\n\
    #EXT-X-KEY:METHOD=AES-128,URI=\"https://example.com/key\"\n\
    #EXTINF:6.0,\n\
    v-1.m4s\n\
    #EXTINF:6.0,\n\
    v-2.m4s\n\
    #EXT-X-ENDLIST\n";

#[tokio::test]
async fn aes128_key_is_fetched_once_and_shared_across_segments() {
    let key_bytes: Vec<u8> = (0u8..16).collect();
    let fetcher = common::MockFetcher::new()
        .with("https://example.com/master.m3u8", MASTER)
        .with("https://example.com/video.m3u8", VIDEO_PLAYLIST)
        .with("https://example.com/key", key_bytes.clone());
    let facade = common::facade(fetcher);
    let config = common::config();

    let manifest = manifest_engine::parse(common::url("https://example.com/master.m3u8"), &facade, &config, CancellationToken::new())
        .await
        .expect("parse should succeed");

    let video = manifest.variants[0].video.as_ref().unwrap();
    assert!(*video.encrypted.lock().unwrap());
    let index_guard = video.segment_index.lock().unwrap();
    let index = index_guard.as_ref().unwrap();
    assert_eq!(index.len(), 2);
    for r in index.iter() {
        let aes_key = r.aes_key.as_ref().expect("segment should carry an aes key");
        assert_eq!(aes_key.key, Some(key_bytes.as_slice().try_into().unwrap()));
    }
}

const VIDEO_PLAYLIST_WITH_MAP: &str = "#EXTM3U\n\
    #EXT-X-TARGETDURATION:6\n\
    #EXT-X-PLAYLIST-TYPE:VOD\n\
    #EXT-X-KEY:METHOD=AES-128,URI=\"https://example.com/800k.key\"\n\
    #EXT-X-MAP:URI=\"init.mp4\"\n\
    #EXTINF:6.0,\n\
    v-1.m4s\n\
    #EXTINF:6.0,\n\
    v-2.m4s\n\
    #EXT-X-KEY:METHOD=NONE\n\
    #EXTINF:6.0,\n\
    v-3.m4s\n\
    #EXT-X-ENDLIST\n";

#[tokio::test]
async fn aes128_key_scope_covers_segments_and_shared_init_reference() {
    let key_bytes: Vec<u8> = (0u8..16).collect();
    let fetcher = common::MockFetcher::new()
        .with("https://example.com/master.m3u8", MASTER)
        .with("https://example.com/video.m3u8", VIDEO_PLAYLIST_WITH_MAP)
        .with("https://example.com/800k.key", key_bytes.clone());
    let facade = common::facade(fetcher);
    let config = common::config();

    let manifest = manifest_engine::parse(common::url("https://example.com/master.m3u8"), &facade, &config, CancellationToken::new())
        .await
        .expect("parse should succeed");

    let video = manifest.variants[0].video.as_ref().unwrap();
    let index_guard = video.segment_index.lock().unwrap();
    let index = index_guard.as_ref().unwrap();
    assert_eq!(index.len(), 3);

    for i in 0..2 {
        let r = index.get(i).unwrap();
        let aes_key = r.aes_key.as_ref().expect("first two refs should carry an aes key");
        assert_eq!(aes_key.key, Some(key_bytes.as_slice().try_into().unwrap()));
        let init = r.init_segment_reference.as_ref().expect("refs under EXT-X-MAP carry an init reference");
        let init_key = init.aes_key.as_ref().expect("init reference under an AES-128 scope carries the same key");
        assert_eq!(init_key.key, Some(key_bytes.as_slice().try_into().unwrap()));
    }

    let third = index.get(2).unwrap();
    assert!(third.aes_key.is_none());
}

#[tokio::test]
async fn ignore_drm_info_skips_key_fetch() {
    let key_bytes: Vec<u8> = (0u8..16).collect();
    let fetcher = common::MockFetcher::new()
        .with("https://example.com/master.m3u8", MASTER)
        .with("https://example.com/video.m3u8", VIDEO_PLAYLIST)
        .with("https://example.com/key", key_bytes);
    let facade = common::facade(fetcher);
    let mut config = common::config();
    config.ignore_drm_info = true;

    let manifest = manifest_engine::parse(common::url("https://example.com/master.m3u8"), &facade, &config, CancellationToken::new())
        .await
        .expect("parse should succeed");

    let video = manifest.variants[0].video.as_ref().unwrap();
    let index_guard = video.segment_index.lock().unwrap();
    let index = index_guard.as_ref().unwrap();
    for r in index.iter() {
        let aes_key = r.aes_key.as_ref().expect("segment should still carry an aes key descriptor");
        assert!(aes_key.key.is_none());
    }
}
