//! Content-steering client.
//!
//! A steering manifest is a small JSON document the packager can update to redirect playback
//! away from an unhealthy CDN pathway without a full manifest refresh. Failure to fetch or parse
//! one is never fatal: the client keeps whatever pathway order it last had (initially, manifest
//! declaration order).

use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::ManifestError;
use crate::fetch::{FetchFacade, RequestType};

/// The steering manifest wire format: `{VERSION,TTL,RELOAD-URI,PATHWAY-PRIORITY}`.
#[derive(Debug, Clone, Deserialize)]
struct SteeringManifestWire {
    #[serde(rename = "VERSION")]
    version: u32,
    #[serde(rename = "TTL")]
    ttl: Option<u64>,
    #[serde(rename = "RELOAD-URI")]
    reload_uri: Option<String>,
    #[serde(rename = "PATHWAY-PRIORITY")]
    pathway_priority: Vec<String>,
}

/// Default TTL (seconds) when a steering manifest omits `TTL`, per the HLS/DASH content-steering
/// specs: 5 minutes.
const DEFAULT_TTL_SECONDS: u64 = 300;

#[derive(Debug, Clone)]
pub struct ContentSteeringClient {
    current_pathway_id: String,
    pathway_order: Vec<String>,
    reload_uri: Url,
    ttl: Duration,
}

impl ContentSteeringClient {
    /// `initial_pathway_order` is the declaration order of `SERVICE-LOCATION` (DASH) or the
    /// implicit single pathway an HLS master playlist without explicit pathways still has.
    pub fn new(initial_reload_uri: Url, initial_pathway_order: Vec<String>) -> Self {
        let current_pathway_id = initial_pathway_order.first().cloned().unwrap_or_default();
        ContentSteeringClient {
            current_pathway_id,
            pathway_order: initial_pathway_order,
            reload_uri: initial_reload_uri,
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
        }
    }

    pub fn current_pathway_id(&self) -> &str {
        &self.current_pathway_id
    }

    pub fn pathway_order(&self) -> &[String] {
        &self.pathway_order
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Reorders `uris` (one per pathway-equivalent CDN alternative, in manifest declaration
    /// order keyed by `pathway_ids`) so the highest-priority surviving pathway comes first. URIs
    /// whose pathway isn't named in the current priority list keep their relative order at the
    /// end, lowest priority.
    pub fn reorder_by_pathway_priority<'a>(&self, pathway_ids: &[&str], uris: &'a [Url]) -> Vec<&'a Url> {
        let mut indexed: Vec<(usize, &Url)> = uris.iter().enumerate().collect();
        indexed.sort_by_key(|(i, _)| {
            let pathway = pathway_ids.get(*i).copied().unwrap_or("");
            self.pathway_order.iter().position(|p| p == pathway).unwrap_or(self.pathway_order.len())
        });
        indexed.into_iter().map(|(_, u)| u).collect()
    }

    /// Fetch and apply the steering manifest. On any failure (network, JSON, or empty priority
    /// list) the existing pathway order is left untouched and the error is returned for the
    /// caller to log as a non-fatal warning.
    pub async fn refresh(
        &mut self,
        facade: &FetchFacade,
        cancellation_token: CancellationToken,
    ) -> Result<(), ManifestError> {
        let response = facade.get(RequestType::App, self.reload_uri.clone(), cancellation_token).await?;
        let wire: SteeringManifestWire = serde_json::from_slice(&response.body)
            .map_err(|e| ManifestError::Other(format!("invalid content steering manifest: {e}")))?;

        if wire.version != 1 {
            return Err(ManifestError::Other(format!("unsupported content steering VERSION {}", wire.version)));
        }
        if wire.pathway_priority.is_empty() {
            return Err(ManifestError::Other("content steering manifest has empty PATHWAY-PRIORITY".into()));
        }

        self.pathway_order = wire.pathway_priority;
        self.current_pathway_id = self.pathway_order[0].clone();
        self.ttl = Duration::from_secs(wire.ttl.unwrap_or(DEFAULT_TTL_SECONDS));
        if let Some(reload) = wire.reload_uri {
            self.reload_uri = response.uri.join(&reload).unwrap_or(self.reload_uri.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorders_uris_by_pathway_priority() {
        let client = ContentSteeringClient::new(
            Url::parse("https://example.com/steering.json").unwrap(),
            vec!["cdn-a".to_string(), "cdn-b".to_string()],
        );
        let uris = vec![
            Url::parse("https://b.example.com/seg.mp4").unwrap(),
            Url::parse("https://a.example.com/seg.mp4").unwrap(),
        ];
        let ordered = client.reorder_by_pathway_priority(&["cdn-b", "cdn-a"], &uris);
        assert_eq!(ordered[0].host_str(), Some("a.example.com"));
        assert_eq!(ordered[1].host_str(), Some("b.example.com"));
    }

    #[test]
    fn unnamed_pathway_sorts_last() {
        let client = ContentSteeringClient::new(
            Url::parse("https://example.com/steering.json").unwrap(),
            vec!["cdn-a".to_string()],
        );
        let uris = vec![
            Url::parse("https://unknown.example.com/seg.mp4").unwrap(),
            Url::parse("https://a.example.com/seg.mp4").unwrap(),
        ];
        let ordered = client.reorder_by_pathway_priority(&["cdn-unknown", "cdn-a"], &uris);
        assert_eq!(ordered[0].host_str(), Some("a.example.com"));
        assert_eq!(ordered[1].host_str(), Some("unknown.example.com"));
    }

    #[test]
    fn initial_pathway_is_first_declared() {
        let client = ContentSteeringClient::new(
            Url::parse("https://example.com/steering.json").unwrap(),
            vec!["primary".to_string(), "backup".to_string()],
        );
        assert_eq!(client.current_pathway_id(), "primary");
    }
}
