//! Uri resolution and HLS `{$name}` variable substitution.
//!
//! DASH and HLS both need "resolve this relative reference against whatever base URI is in
//! scope here", but the chain of bases differs: DASH accumulates `BaseURL` elements down through
//! MPD → Period → AdaptationSet → Representation; HLS has a single playlist URI (itself
//! possibly the result of following redirects) plus per-playlist `EXT-X-DEFINE` variable scopes.

use std::collections::HashMap;

use url::Url;

use crate::error::ManifestError;

/// A chain of base URIs, innermost last. Resolving a reference walks the chain from the end,
/// same as nested DASH `BaseURL` elements override rather than concatenate path segments when
/// absolute, and concatenate (via `Url::join`) otherwise.
#[derive(Debug, Clone)]
pub struct BaseUriChain {
    bases: Vec<Url>,
}

impl BaseUriChain {
    pub fn new(root: Url) -> Self {
        BaseUriChain { bases: vec![root] }
    }

    /// Push a new base, resolved against the current innermost base, and return the chain with
    /// that new base in scope. Used for `BaseURL` elements found at Period/AdaptationSet/
    /// Representation granularity.
    pub fn push(&self, candidate: &str) -> Result<Self, ManifestError> {
        let resolved = self.resolve(candidate)?;
        let mut bases = self.bases.clone();
        bases.push(resolved);
        Ok(BaseUriChain { bases })
    }

    /// The innermost (currently scoped) base URI.
    pub fn current(&self) -> &Url {
        self.bases.last().expect("BaseUriChain is never empty")
    }

    /// Resolve `reference` against the innermost base in the chain, per RFC 3986 (absolute
    /// references replace the base wholesale, relative ones are joined).
    pub fn resolve(&self, reference: &str) -> Result<Url, ManifestError> {
        resolve_against(self.current(), reference)
    }

    /// Replace the innermost base (used after following an HTTP redirect: the *final* URI
    /// becomes the base URI for relative children parsed from that resource).
    pub fn with_redirected_base(mut self, final_uri: Url) -> Self {
        if let Some(last) = self.bases.last_mut() {
            *last = final_uri;
        } else {
            self.bases.push(final_uri);
        }
        self
    }
}

pub fn resolve_against(base: &Url, reference: &str) -> Result<Url, ManifestError> {
    if reference.is_empty() {
        return Ok(base.clone());
    }
    base.join(reference)
        .map_err(|e| ManifestError::Other(format!("resolving URI {reference:?} against {base}: {e}")))
}

/// A per-playlist mapping of `name → value`, populated from `#EXT-X-DEFINE` tags and immutable
/// once the playlist has finished parsing (shared by reference with child playlists that
/// `IMPORT` from it).
#[derive(Debug, Clone, Default)]
pub struct VariableScope {
    values: HashMap<String, String>,
}

impl VariableScope {
    pub fn new() -> Self {
        VariableScope::default()
    }

    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// `#EXT-X-DEFINE:QUERYPARAM=NAME` — extract NAME from the playlist URL's query string.
    pub fn define_from_query_param(&mut self, name: &str, playlist_url: &Url) -> bool {
        if let Some((_, value)) = playlist_url.query_pairs().find(|(k, _)| k == name) {
            self.values.insert(name.to_string(), value.into_owned());
            true
        } else {
            false
        }
    }

    /// `#EXT-X-DEFINE:IMPORT=NAME` — copy NAME from the parent playlist's scope, if present.
    pub fn import_from(&mut self, name: &str, parent: &VariableScope) -> bool {
        if let Some(value) = parent.values.get(name) {
            self.values.insert(name.to_string(), value.clone());
            true
        } else {
            false
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Apply `{$name}` textual substitution to an attribute value or URI, after the line
    /// containing it has otherwise been fully parsed. Unknown variables are left untouched
    /// (RFC 8216bis treats an undefined variable reference as a playlist parsing error, but for
    /// robustness against minor producer bugs we leave the literal token in place and let the
    /// caller's `onError` surface a warning via `missing_variables`).
    pub fn substitute(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let bytes = input.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'{' && input[i..].starts_with("{$") {
                if let Some(end) = input[i..].find('}') {
                    let name = &input[i + 2..i + end];
                    if let Some(value) = self.values.get(name) {
                        out.push_str(value);
                        i += end + 1;
                        continue;
                    }
                }
            }
            let ch = input[i..].chars().next().unwrap();
            out.push(ch);
            i += ch.len_utf8();
        }
        out
    }

    /// Returns the set of `{$name}` tokens in `input` that have no known value, for diagnostics.
    pub fn missing_variables(&self, input: &str) -> Vec<String> {
        let mut missing = Vec::new();
        let mut rest = input;
        while let Some(start) = rest.find("{$") {
            rest = &rest[start + 2..];
            if let Some(end) = rest.find('}') {
                let name = &rest[..end];
                if !self.values.contains_key(name) {
                    missing.push(name.to_string());
                }
                rest = &rest[end + 1..];
            } else {
                break;
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_and_absolute() {
        let root = Url::parse("https://example.com/video/manifest.mpd").unwrap();
        let chain = BaseUriChain::new(root);
        assert_eq!(chain.resolve("seg-1.mp4").unwrap().as_str(), "https://example.com/video/seg-1.mp4");
        assert_eq!(
            chain.resolve("https://cdn.example.net/x.mp4").unwrap().as_str(),
            "https://cdn.example.net/x.mp4"
        );
    }

    #[test]
    fn pushing_base_url_overrides_innermost_scope() {
        let root = Url::parse("https://a.example.com/manifest.mpd").unwrap();
        let chain = BaseUriChain::new(root);
        let period_scope = chain.push("period1/").unwrap();
        let adaptation_scope = period_scope.push("video/").unwrap();
        assert_eq!(
            adaptation_scope.resolve("chunk-1.m4s").unwrap().as_str(),
            "https://a.example.com/period1/video/chunk-1.m4s"
        );
    }

    #[test]
    fn redirect_replaces_innermost_base() {
        let root = Url::parse("https://a.example.com/manifest.mpd").unwrap();
        let chain = BaseUriChain::new(root)
            .with_redirected_base(Url::parse("https://b.example.com/real/manifest.mpd").unwrap());
        assert_eq!(
            chain.resolve("seg.mp4").unwrap().as_str(),
            "https://b.example.com/real/seg.mp4"
        );
    }

    #[test]
    fn variable_substitution() {
        let mut scope = VariableScope::new();
        scope.define("host", "cdn.example.com");
        scope.define("token", "abc123");
        assert_eq!(
            scope.substitute("https://{$host}/seg.ts?auth={$token}"),
            "https://cdn.example.com/seg.ts?auth=abc123"
        );
        assert_eq!(scope.substitute("no variables here"), "no variables here");
        assert_eq!(scope.missing_variables("{$unknown}/x"), vec!["unknown".to_string()]);
    }

    #[test]
    fn query_param_and_import() {
        let url = Url::parse("https://example.com/live.m3u8?auth=xyz").unwrap();
        let mut scope = VariableScope::new();
        assert!(scope.define_from_query_param("auth", &url));
        assert_eq!(scope.get("auth"), Some("xyz"));

        let mut child = VariableScope::new();
        assert!(child.import_from("auth", &scope));
        assert_eq!(child.get("auth"), Some("xyz"));
        assert!(!child.import_from("missing", &scope));
    }
}
