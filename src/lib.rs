//! A Rust library for parsing MPEG-DASH and HLS manifests into a uniform, source-format-independent
//! [`Manifest`](manifest::Manifest): a presentation timeline, a set of audio/video variants, and
//! text/image streams, each carrying a lazily-materialised [`SegmentIndex`](segment_index::SegmentIndex).
//!
//! [DASH](https://en.wikipedia.org/wiki/Dynamic_Adaptive_Streaming_over_HTTP) (MPEG-DASH, ISO/IEC
//! 23009-1) and [HLS](https://datatracker.ietf.org/doc/html/rfc8216bis) (RFC 8216bis) are the two
//! manifest formats in production use for adaptive streaming over HTTP. This crate normalises both
//! into one model so that the rest of a playback stack — buffering, ABR selection, DRM session
//! management — doesn't need to branch on source format.
//!
//! ## Scope
//!
//! - VOD and live (dynamic MPD / sliding-window HLS) manifests
//! - Multi-period DASH content, `xlink:href` resolution (`onLoad` and `onRequest`)
//! - All DASH segment addressing modes (`SegmentBase`, `SegmentList`, `SegmentTemplate` with
//!   either `@duration` or `SegmentTimeline`)
//! - HLS master and media playlists, low-latency `#EXT-X-PART`/`#EXT-X-PRELOAD-HINT`, variable
//!   substitution, content steering
//! - DRM signalling (Widevine, PlayReady, FairPlay, ClearKey, HLS AES-128) without performing
//!   decryption
//! - DASH `EventStream`/SCTE-35 and HLS `EXT-X-DATERANGE` passthrough as [`events::ManifestEvent`]s
//!
//! This crate does not select a bitrate, decrypt content, or mux/demux media containers; it hands
//! the embedder a navigable structure and lets them drive playback.

#![forbid(unsafe_code)]

mod clock;
pub mod config;
pub mod dash;
pub mod drm;
pub mod error;
pub mod events;
pub mod fetch;
pub mod hls;
pub mod manifest;
pub mod probe;
pub mod scheduler;
pub mod segment_index;
pub mod steering;
pub mod timeline;
pub mod uri;

use tokio_util::sync::CancellationToken;
use url::Url;

use config::ManifestConfig;
use error::ManifestError;
use fetch::FetchFacade;
use manifest::{Manifest, SourceFormat};

/// Fetches and parses the manifest at `manifest_uri`, dispatching to the [`dash`] or [`hls`]
/// parser based on the URI's file extension (`.mpd` vs everything else, since `.m3u8`/`.m3u` are
/// the only other manifest extensions in practice and HLS tolerates bare extensionless URLs more
/// often than DASH does).
#[tracing::instrument(skip(facade, config, cancellation_token), fields(uri = %manifest_uri))]
pub async fn parse(
    manifest_uri: Url,
    facade: &FetchFacade,
    config: &ManifestConfig,
    cancellation_token: CancellationToken,
) -> Result<Manifest, ManifestError> {
    if is_dash_manifest_uri(&manifest_uri) {
        dash::parse(manifest_uri, facade, config, cancellation_token).await
    } else {
        hls::parse(manifest_uri, facade, config, cancellation_token).await
    }
}

fn is_dash_manifest_uri(uri: &Url) -> bool {
    uri.path().to_ascii_lowercase().ends_with(".mpd")
}

/// Refreshes a live `manifest` in place: re-fetches and merges new segments into the streams
/// [`parse`] produced, rather than building a new [`Manifest`]. `manifest_uri` is only consulted
/// for DASH, which re-fetches the whole MPD on every refresh; HLS tracks each stream's own media
/// playlist URI internally and ignores it.
#[tracing::instrument(skip(manifest, facade, config, cancellation_token), fields(uri = %manifest_uri))]
pub async fn refresh(
    manifest: &mut Manifest,
    manifest_uri: Url,
    facade: &FetchFacade,
    config: &ManifestConfig,
    cancellation_token: CancellationToken,
) -> Result<(), ManifestError> {
    match manifest.source_format {
        SourceFormat::Dash => dash::refresh(manifest, manifest_uri, facade, config, cancellation_token).await,
        SourceFormat::Hls => hls::refresh(manifest, facade, config, cancellation_token).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_file_extension() {
        assert!(is_dash_manifest_uri(&Url::parse("https://example.com/stream.mpd").unwrap()));
        assert!(!is_dash_manifest_uri(&Url::parse("https://example.com/master.m3u8").unwrap()));
        assert!(!is_dash_manifest_uri(&Url::parse("https://example.com/stream?format=mpd").unwrap()));
    }
}
