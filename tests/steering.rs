//! Content-steering client driven against a mock HTTP fetcher: the happy-path reload swaps in a
//! new pathway priority and TTL, and a malformed/empty reload leaves the previous pathway order
//! untouched rather than failing the caller.

mod common;

use manifest_engine::steering::ContentSteeringClient;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn refresh_applies_new_pathway_priority_and_ttl() {
    let fetcher = common::MockFetcher::new().with(
        "https://example.com/steering.json",
        r#"{"VERSION":1,"TTL":60,"RELOAD-URI":"steering2.json","PATHWAY-PRIORITY":["cdn-b","cdn-a"]}"#,
    );
    let facade = common::facade(fetcher);
    let mut client = ContentSteeringClient::new(common::url("https://example.com/steering.json"), vec!["cdn-a".to_string()]);

    client.refresh(&facade, CancellationToken::new()).await.expect("refresh should succeed");

    assert_eq!(client.current_pathway_id(), "cdn-b");
    assert_eq!(client.pathway_order(), ["cdn-b", "cdn-a"]);
    assert_eq!(client.ttl(), std::time::Duration::from_secs(60));
}

#[tokio::test]
async fn refresh_rejects_empty_pathway_priority() {
    let fetcher =
        common::MockFetcher::new().with("https://example.com/steering.json", r#"{"VERSION":1,"PATHWAY-PRIORITY":[]}"#);
    let facade = common::facade(fetcher);
    let mut client = ContentSteeringClient::new(common::url("https://example.com/steering.json"), vec!["cdn-a".to_string()]);

    let err = client.refresh(&facade, CancellationToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("PATHWAY-PRIORITY"));
    assert_eq!(client.current_pathway_id(), "cdn-a", "a failed reload must not disturb the prior pathway order");
}

#[tokio::test]
async fn refresh_rejects_unsupported_version() {
    let fetcher = common::MockFetcher::new()
        .with("https://example.com/steering.json", r#"{"VERSION":2,"PATHWAY-PRIORITY":["cdn-a"]}"#);
    let facade = common::facade(fetcher);
    let mut client = ContentSteeringClient::new(common::url("https://example.com/steering.json"), vec!["cdn-a".to_string()]);

    let err = client.refresh(&facade, CancellationToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("VERSION"));
}
