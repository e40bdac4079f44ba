//! `ContentProtection` → `DrmInfo` mapping.

use base64::Engine;

use crate::dash::model::ContentProtection;
use crate::drm::{DrmInfo, EncryptionScheme, InitDataEntry, KeySystem};
use crate::error::ManifestError;
use crate::events::ManifestWarning;

/// Builds one `DrmInfo` per recognised `ContentProtection` element. An element whose
/// `schemeIdUri` isn't recognised is skipped with a warning rather than failing the
/// Representation (per `UnrecognisedScheme`'s `Recoverable` severity).
pub fn build_drm_infos(
    elements: &[ContentProtection],
    warnings: &mut Vec<ManifestWarning>,
) -> Vec<DrmInfo> {
    let mut infos = Vec::new();
    for el in elements {
        match KeySystem::from_dash_scheme_uri(&el.scheme_id_uri) {
            Some(KeySystem::CommonEncryption) => {
                // `urn:mpeg:dash:mp4protection:2011` carries the encryption scheme and default
                // key id but no key-system-specific license info; fold its key id into every
                // other DrmInfo built from sibling ContentProtection elements instead of emitting
                // its own entry (it's not a key system).
                continue;
            }
            Some(key_system) => {
                let mut info = DrmInfo::new(key_system);
                if let Some(kid) = &el.default_kid {
                    info.key_ids.push(normalise_kid(kid));
                }
                for pssh in &el.pssh {
                    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(pssh.base64_data.trim()) {
                        info.init_data.push(InitDataEntry { init_data_type: "cenc".to_string(), data });
                    }
                }
                infos.push(info);
            }
            None => {
                warnings.push(ManifestWarning {
                    error: ManifestError::UnrecognisedScheme(el.scheme_id_uri.clone()).to_string(),
                    context: crate::error::ErrorContext::new(),
                });
            }
        }
    }

    // Apply the common-encryption default_KID/scheme (cenc vs cbcs, inferred from the value
    // attribute: "cenc"/"cbcs") to every key-system-specific entry that doesn't already carry one.
    if let Some(common) = elements
        .iter()
        .find(|el| KeySystem::from_dash_scheme_uri(&el.scheme_id_uri) == Some(KeySystem::CommonEncryption))
    {
        let scheme = match common.value.as_deref() {
            Some("cbcs") => Some(EncryptionScheme::Cbcs),
            _ => Some(EncryptionScheme::Cenc),
        };
        for info in &mut infos {
            if info.encryption_scheme.is_none() {
                info.encryption_scheme = scheme;
            }
            if info.key_ids.is_empty() {
                if let Some(kid) = &common.default_kid {
                    info.key_ids.push(normalise_kid(kid));
                }
            }
        }
    }

    infos
}

fn normalise_kid(raw: &str) -> String {
    raw.replace('-', "").to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widevine_and_common_encryption_merge_default_kid() {
        let elements = vec![
            ContentProtection {
                scheme_id_uri: "urn:mpeg:dash:mp4protection:2011".to_string(),
                value: Some("cenc".to_string()),
                default_kid: Some("34e5db32-8625-47cd-ba06-68fa0853a834".to_string()),
                pssh: Vec::new(),
            },
            ContentProtection {
                scheme_id_uri: "urn:uuid:edef8ba9-79d6-4ace-a3c8-27dcd51d21ed".to_string(),
                value: None,
                default_kid: None,
                pssh: Vec::new(),
            },
        ];
        let mut warnings = Vec::new();
        let infos = build_drm_infos(&elements, &mut warnings);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].key_system, KeySystem::Widevine);
        assert_eq!(infos[0].encryption_scheme, Some(EncryptionScheme::Cenc));
        assert_eq!(infos[0].key_ids, vec!["34e5db32862547cdba0668fa0853a834".to_string()]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn unrecognised_scheme_is_skipped_with_a_warning() {
        let elements = vec![ContentProtection {
            scheme_id_uri: "urn:some:vendor:scheme".to_string(),
            value: None,
            default_kid: None,
            pssh: Vec::new(),
        }];
        let mut warnings = Vec::new();
        let infos = build_drm_infos(&elements, &mut warnings);
        assert!(infos.is_empty());
        assert_eq!(warnings.len(), 1);
    }
}
