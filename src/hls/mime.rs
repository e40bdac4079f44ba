//! MIME-type inference priority chain: `CODECS` + file extension, then a HEAD
//! request's `Content-Type`, then the configured fallback.

use crate::config::ManifestConfig;
use crate::error::ManifestError;
use crate::fetch::{FetchFacade, RequestType};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Maps a segment URI's file extension, combined with the CODECS string when present, to a MIME
/// type without touching the network.
pub fn guess_from_extension_and_codecs(uri: &Url, codecs: Option<&str>) -> Option<String> {
    let ext = uri.path_segments()?.next_back()?.rsplit('.').next()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp4" | "m4s" | "m4v" | "m4a" | "cmfv" | "cmfa" => "video/mp4",
        "ts" => "video/mp2t",
        "aac" => special_case_codec(codecs).unwrap_or("audio/aac"),
        "ac3" => "audio/ac3",
        "ec3" => "audio/eac3",
        "mp3" => "audio/mpeg",
        "vtt" => "text/vtt",
        "jpg" | "jpeg" => "image/jpeg",
        _ => return None,
    };
    Some(mime.to_string())
}

/// A handful of codec strings imply their own MIME type regardless of container extension.
fn special_case_codec(codecs: Option<&str>) -> Option<&'static str> {
    match codecs? {
        "mp4a.40.34" => Some("audio/mpeg"), // MP3 audio signalled via a CODECS string, not an extension
        "jpeg" | "mjpg" => Some("image/jpeg"),
        "wvtt" => Some("text/vtt"),
        c if c.starts_with("stpp.ttml") => Some("application/mp4"),
        _ => None,
    }
}

/// Fallback: issue a HEAD request and trust `Content-Type`, stripping any `;charset=` parameter.
pub async fn guess_via_head_request(
    facade: &FetchFacade,
    uri: Url,
    cancellation_token: CancellationToken,
) -> Result<String, ManifestError> {
    let response = facade.head(RequestType::Segment, uri, cancellation_token).await?;
    response
        .header("Content-Type")
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_string())
        .ok_or_else(|| ManifestError::CouldNotGuessMimeType(response.uri.to_string()))
}

/// Runs the full chain; only reaches the network when `config.hls_disable_codec_guessing` is
/// false and the extension/codec heuristic didn't resolve anything.
pub async fn infer_mime_type(
    facade: &FetchFacade,
    uri: &Url,
    codecs: Option<&str>,
    config: &ManifestConfig,
    cancellation_token: CancellationToken,
) -> String {
    if !config.hls_disable_codec_guessing {
        if let Some(mime) = guess_from_extension_and_codecs(uri, codecs) {
            return mime;
        }
        if let Ok(mime) = guess_via_head_request(facade, uri.clone(), cancellation_token).await {
            return mime;
        }
    }
    config.hls_media_playlist_full_mime_type.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_fmp4_from_extension() {
        let uri = Url::parse("https://example.com/seg-1.m4s").unwrap();
        assert_eq!(guess_from_extension_and_codecs(&uri, None), Some("video/mp4".to_string()));
    }

    #[test]
    fn mp3_codec_string_overrides_aac_extension_guess() {
        let uri = Url::parse("https://example.com/seg-1.aac").unwrap();
        assert_eq!(guess_from_extension_and_codecs(&uri, Some("mp4a.40.34")), Some("audio/mpeg".to_string()));
    }

    #[test]
    fn unknown_extension_returns_none() {
        let uri = Url::parse("https://example.com/seg-1.xyz").unwrap();
        assert_eq!(guess_from_extension_and_codecs(&uri, None), None);
    }
}
