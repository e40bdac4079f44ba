//! Content-protection metadata shared by the DASH and HLS parsers.
//!
//! DRM info records may be shared by multiple streams within a Period and are immutable after
//! construction: a parsed `ContentProtection` element is treated as a read-only description
//! (this crate never attempts decryption).

/// A fully-qualified DRM key system identifier, recognised from either a DASH
/// `ContentProtection@schemeIdUri` UUID urn or an HLS `#EXT-X-KEY:KEYFORMAT=` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySystem {
    Widevine,
    PlayReady,
    WisePlay,
    FairPlay,
    ClearKey,
    /// Carries only the common `cenc`/`cbcs` default_KID signalling, no specific key system.
    CommonEncryption,
    Unknown,
}

impl KeySystem {
    pub fn fully_qualified_id(&self) -> &'static str {
        match self {
            KeySystem::Widevine => "com.widevine.alpha",
            KeySystem::PlayReady => "com.microsoft.playready",
            KeySystem::WisePlay => "com.huawei.wiseplay",
            KeySystem::FairPlay => "com.apple.fps",
            KeySystem::ClearKey => "org.w3.clearkey",
            KeySystem::CommonEncryption => "",
            KeySystem::Unknown => "",
        }
    }

    /// Recognise a DASH `ContentProtection@schemeIdUri`.
    pub fn from_dash_scheme_uri(scheme_uri: &str) -> Option<KeySystem> {
        let lower = scheme_uri.to_ascii_lowercase();
        match lower.as_str() {
            "urn:mpeg:dash:mp4protection:2011" => Some(KeySystem::CommonEncryption),
            "urn:uuid:edef8ba9-79d6-4ace-a3c8-27dcd51d21ed" => Some(KeySystem::Widevine),
            "urn:uuid:9a04f079-9840-4286-ab92-e65be0885f95" => Some(KeySystem::PlayReady),
            "urn:uuid:3d5e6d35-9b9a-41e8-b843-dd3c6e72c42c" => Some(KeySystem::WisePlay),
            "urn:uuid:f239e769-efa3-4850-9c16-a903c6958a2e" => Some(KeySystem::FairPlay),
            "com.apple.streamingkeydelivery" => Some(KeySystem::FairPlay),
            _ => None,
        }
    }

    /// Recognise an HLS `#EXT-X-KEY:KEYFORMAT=`.
    pub fn from_hls_keyformat(keyformat: Option<&str>) -> KeySystem {
        match keyformat {
            None | Some("identity") => KeySystem::ClearKey,
            Some(kf) => {
                let lower = kf.to_ascii_lowercase();
                match lower.as_str() {
                    "urn:uuid:edef8ba9-79d6-4ace-a3c8-27dcd51d21ed" => KeySystem::Widevine,
                    "com.microsoft.playready" => KeySystem::PlayReady,
                    "com.apple.streamingkeydelivery" => KeySystem::FairPlay,
                    _ => KeySystem::Unknown,
                }
            }
        }
    }
}

/// One unit of DRM init-data, as carried in `cenc:pssh` (DASH) or a `data:` URI attached to an
/// HLS `#EXT-X-KEY` (FairPlay `sinf`, Widevine `pssh`).
#[derive(Debug, Clone, PartialEq)]
pub struct InitDataEntry {
    pub init_data_type: String,
    pub data: Vec<u8>,
}

/// Encryption scheme used by Common Encryption: full-block (`cenc`) or pattern-based (`cbcs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionScheme {
    Cenc,
    Cbcs,
}

/// Describes one DRM system's configuration for a stream or variant.
#[derive(Debug, Clone, PartialEq)]
pub struct DrmInfo {
    pub key_system: KeySystem,
    pub encryption_scheme: Option<EncryptionScheme>,
    pub key_ids: Vec<String>,
    pub init_data: Vec<InitDataEntry>,
    pub license_server_uri: Option<String>,
    pub key_system_uris: Vec<String>,
    pub session_type: Option<String>,
}

impl DrmInfo {
    pub fn new(key_system: KeySystem) -> Self {
        DrmInfo {
            key_system,
            encryption_scheme: None,
            key_ids: Vec::new(),
            init_data: Vec::new(),
            license_server_uri: None,
            key_system_uris: Vec::new(),
            session_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_widevine_uuid_urn() {
        assert_eq!(
            KeySystem::from_dash_scheme_uri("urn:uuid:edef8ba9-79d6-4ace-a3c8-27dcd51d21ed"),
            Some(KeySystem::Widevine)
        );
    }

    #[test]
    fn unknown_scheme_uri_returns_none_so_caller_can_warn_and_skip() {
        assert_eq!(KeySystem::from_dash_scheme_uri("urn:some:vendor:scheme"), None);
    }

    #[test]
    fn hls_keyformat_defaults_to_clearkey() {
        assert_eq!(KeySystem::from_hls_keyformat(None), KeySystem::ClearKey);
        assert_eq!(KeySystem::from_hls_keyformat(Some("identity")), KeySystem::ClearKey);
    }
}
