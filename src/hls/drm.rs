//! HLS `#EXT-X-KEY` handling: key-format mapping and AES-128 IV derivation.

use crate::drm::{DrmInfo, KeySystem};
use crate::error::ManifestError;
use crate::hls::tags::TagAttributes;
use crate::segment_index::AesKey;

/// Full-segment AES-128 (`METHOD=AES-128`) or sample-level DRM (`METHOD=SAMPLE-AES`,
/// `SAMPLE-AES-CTR`) described by one `#EXT-X-KEY`.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyDescriptor {
    None,
    Aes128 { key_uri: String, iv_override: Option<[u8; 16]> },
    SampleAes(DrmInfo),
}

/// Parses one `#EXT-X-KEY` attribute list into a [`KeyDescriptor`]; `is_mpeg_ts` distinguishes
/// the transport so SAMPLE-AES-over-MPEG-TS (unsupported) can be rejected.
pub fn parse_key_tag(attrs: &TagAttributes, is_mpeg_ts: bool) -> Result<KeyDescriptor, ManifestError> {
    let method = attrs.get_str("METHOD").unwrap_or("NONE");
    match method {
        "NONE" => Ok(KeyDescriptor::None),
        "AES-128" => {
            let key_uri = attrs
                .get_owned("URI")
                .ok_or_else(|| ManifestError::RequiredAttributeMissing {
                    element: "EXT-X-KEY".into(),
                    attribute: "URI".into(),
                })?;
            let iv_override = attrs.get_str("IV").map(parse_iv_hex).transpose()?;
            Ok(KeyDescriptor::Aes128 { key_uri, iv_override })
        }
        "SAMPLE-AES" | "SAMPLE-AES-CTR" => {
            if is_mpeg_ts && method == "SAMPLE-AES" {
                return Err(ManifestError::UnsupportedEncryption(
                    "SAMPLE-AES over MPEG-TS is not supported".into(),
                ));
            }
            let keyformat = attrs.get_str("KEYFORMAT");
            let key_system = KeySystem::from_hls_keyformat(keyformat);
            if key_system == KeySystem::FairPlay && is_mpeg_ts {
                return Err(ManifestError::UnsupportedEncryption("FairPlay over MPEG-TS is not supported".into()));
            }
            let mut drm_info = DrmInfo::new(key_system);
            drm_info.key_system_uris = attrs.get_owned("URI").into_iter().collect();
            drm_info.session_type = attrs.get_owned("SESSIONKEY");
            Ok(KeyDescriptor::SampleAes(drm_info))
        }
        other => Err(ManifestError::UnsupportedEncryption(format!("unknown EXT-X-KEY METHOD {other}"))),
    }
}

fn parse_iv_hex(raw: &str) -> Result<[u8; 16], ManifestError> {
    let hex = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")).unwrap_or(raw);
    if hex.len() != 32 {
        return Err(ManifestError::UnparsableSegment(format!("EXT-X-KEY IV has wrong length: {raw}")));
    }
    let mut bytes = [0u8; 16];
    for i in 0..16 {
        bytes[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| ManifestError::UnparsableSegment(format!("EXT-X-KEY IV is not hex: {raw}")))?;
    }
    Ok(bytes)
}

/// When `#EXT-X-KEY` carries no explicit `IV`, the IV is the segment's media sequence number,
/// big-endian, zero-padded to 16 bytes.
pub fn derive_iv_from_media_sequence(media_sequence_number: u64) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[8..].copy_from_slice(&media_sequence_number.to_be_bytes());
    iv
}

pub fn build_aes_key(key_uri: String, iv_override: Option<[u8; 16]>, media_sequence_number: u64) -> AesKey {
    AesKey {
        key_uri,
        key: None, // filled in once the key URI has been fetched; None until then
        iv: iv_override.unwrap_or_else(|| derive_iv_from_media_sequence(media_sequence_number)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> TagAttributes {
        crate::hls::tags::parse_attribute_list(
            &pairs.iter().map(|(k, v)| format!("{k}=\"{v}\"")).collect::<Vec<_>>().join(","),
        )
    }

    #[test]
    fn none_method_disables_encryption() {
        let a = attrs(&[("METHOD", "NONE")]);
        assert_eq!(parse_key_tag(&a, false).unwrap(), KeyDescriptor::None);
    }

    #[test]
    fn aes128_requires_uri() {
        let a = attrs(&[("METHOD", "AES-128")]);
        assert!(parse_key_tag(&a, false).is_err());
    }

    #[test]
    fn explicit_iv_is_parsed() {
        let iv_hex = format!("0x{}01", "00".repeat(15));
        let valid = attrs(&[("METHOD", "AES-128"), ("URI", "https://example.com/key"), ("IV", &iv_hex)]);
        match parse_key_tag(&valid, false).unwrap() {
            KeyDescriptor::Aes128 { iv_override: Some(iv), .. } => assert_eq!(iv[15], 0x01),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn iv_falls_back_to_media_sequence_number_big_endian() {
        let iv = derive_iv_from_media_sequence(42);
        assert_eq!(&iv[0..8], &[0u8; 8]);
        assert_eq!(u64::from_be_bytes(iv[8..].try_into().unwrap()), 42);
    }

    #[test]
    fn sample_aes_over_mpeg_ts_is_rejected() {
        let a = attrs(&[("METHOD", "SAMPLE-AES")]);
        let err = parse_key_tag(&a, true).unwrap_err();
        assert!(matches!(err, ManifestError::UnsupportedEncryption(_)));
    }
}
