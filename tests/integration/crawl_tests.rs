//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! fetch / extract / enqueue cycle end-to-end over real HTTP.

use crawl_frontier::config::{parse_config, Config};
use crawl_frontier::crawler::{Coordinator, ResourceSampler};
use crawl_frontier::output::{load_statistics, FinalOutcome, MemorySink};
use crawl_frontier::{CrawlError, CrawlPhase};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a fast test configuration seeded at the mock server root
fn test_config(base_url: &str, extra: &str) -> Config {
    parse_config(&format!(
        r#"
[crawl]
seeds = ["{base_url}/"]
max-frontier-size = 50
concurrency = 1
keywords = ["gallery"]
shallow-depth = 3

[fetch]
max-retries = 3
backoff = "linear"
base-delay-ms = 1
jitter-ms = 0
timeout-ms = 5000

[identity]
crawler-name = "TestBot"
crawler-version = "1.0.0"

[politeness]
min-delay-ms = 0
jitter-ms = 0

{extra}
"#
    ))
    .expect("test config should be valid")
}

async fn mount_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Paths requested from the mock server, in arrival order
async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.path().to_string())
        .collect()
}

const LEAF: &str = "<html><body>leaf</body></html>";

#[tokio::test]
async fn test_links_are_fetched_by_priority_then_discovery_order() {
    let server = MockServer::start().await;

    // Anchors sit five elements deep, so only the keyword bonus applies
    mount_html(
        &server,
        "/",
        r#"<html><body><div><div><div>
            <a href="/first">more</a>
            <a href="/second">Photo gallery</a>
            <a href="/third">more</a>
        </div></div></div></body></html>"#,
    )
    .await;
    for route in ["/first", "/second", "/third"] {
        mount_html(&server, route, LEAF).await;
    }

    let sink = Arc::new(MemorySink::new());
    let coordinator = Coordinator::builder(test_config(&server.uri(), ""))
        .sink(sink.clone())
        .build()
        .expect("Failed to create coordinator");

    let stats = coordinator
        .run(CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(
        requested_paths(&server).await,
        ["/", "/second", "/first", "/third"]
    );
    assert_eq!(stats.pages_succeeded, 4);
    assert_eq!(stats.links_discovered, 3);
    assert_eq!(coordinator.phase(), CrawlPhase::Done);

    let records = sink.records();
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.outcome.is_success()));
    assert!(records.iter().all(|r| r.body.is_some()));
}

#[tokio::test]
async fn test_scope_binary_and_duplicate_links_are_not_fetched() {
    let server = MockServer::start().await;
    let base_url = server.uri();

    mount_html(
        &server,
        "/",
        &format!(
            r##"<html><body>
                <a href="/page">relative</a>
                <a href="{base_url}/page#details">same page, fragment</a>
                <a href="{base_url}/page/">same page, trailing slash</a>
                <a href="https://other.com/x">foreign</a>
                <a href="/photo.jpg">image</a>
                <a href="javascript:void(0)">script</a>
                <a href="mailto:someone@example.com">mail</a>
            </body></html>"##
        ),
    )
    .await;
    mount_html(&server, "/page", LEAF).await;

    let sink = Arc::new(MemorySink::new());
    let coordinator = Coordinator::builder(test_config(&base_url, ""))
        .sink(sink.clone())
        .build()
        .expect("Failed to create coordinator");

    let stats = coordinator
        .run(CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(requested_paths(&server).await, ["/", "/page"]);
    assert_eq!(stats.rejections.duplicate, 2);
    assert_eq!(stats.rejections.foreign_host, 1);
    assert_eq!(stats.rejections.binary_resource, 1);
    assert_eq!(stats.rejections.invalid, 2);
    assert_eq!(sink.records().len(), 2);
}

#[tokio::test]
async fn test_failing_url_is_retried_recorded_and_crawl_continues() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/",
        r#"<html><body><a href="/broken">broken</a><a href="/fine">fine</a></body></html>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_html(&server, "/fine", LEAF).await;

    let sink = Arc::new(MemorySink::new());
    let coordinator = Coordinator::builder(test_config(&server.uri(), ""))
        .sink(sink.clone())
        .build()
        .expect("Failed to create coordinator");

    let stats = coordinator
        .run(CancellationToken::new())
        .await
        .expect("Crawl failed");

    let broken_hits = requested_paths(&server)
        .await
        .iter()
        .filter(|p| p.as_str() == "/broken")
        .count();
    assert_eq!(broken_hits, 3);

    let records = sink.records();
    let broken = records
        .iter()
        .find(|r| r.url.path() == "/broken")
        .expect("broken URL should be recorded");
    assert_eq!(broken.attempts, 3);
    match &broken.outcome {
        FinalOutcome::Failed { reason } => assert!(reason.contains("HTTP 500")),
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert_eq!(stats.pages_succeeded, 2);
    assert_eq!(stats.pages_failed, 1);
}

#[tokio::test]
async fn test_content_mismatch_fails_without_retry() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/",
        r#"<html><body><a href="/data">data</a></body></html>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .insert_header("content-type", "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::new());
    let coordinator = Coordinator::builder(test_config(&server.uri(), ""))
        .sink(sink.clone())
        .build()
        .expect("Failed to create coordinator");

    let stats = coordinator
        .run(CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(stats.pages_failed, 1);
    let data = sink
        .records()
        .into_iter()
        .find(|r| r.url.path() == "/data")
        .expect("data URL should be recorded");
    assert_eq!(data.attempts, 1);
}

#[tokio::test]
async fn test_capacity_stops_discovery() {
    let server = MockServer::start().await;

    let links: String = (0..10)
        .map(|i| format!(r#"<a href="/p{}">p</a>"#, i))
        .collect();
    mount_html(&server, "/", &format!("<html><body>{}</body></html>", links)).await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(LEAF)
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri(), "");
    config.crawl.max_frontier_size = 4;
    config.crawl.concurrency = 3;

    let sink = Arc::new(MemorySink::new());
    let coordinator = Coordinator::builder(config)
        .sink(sink.clone())
        .build()
        .expect("Failed to create coordinator");

    let stats = coordinator
        .run(CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(stats.urls_accepted, 4);
    assert_eq!(stats.rejections.capacity, 7);
    assert_eq!(requested_paths(&server).await.len(), 4);
    assert_eq!(sink.records().len(), 4);
}

#[tokio::test]
async fn test_cancellation_flushes_in_flight_results() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(LEAF)
                .insert_header("content-type", "text/html")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri(), "");
    config.fetch.timeout_ms = 30_000;

    let sink = Arc::new(MemorySink::new());
    let coordinator = Coordinator::builder(config)
        .sink(sink.clone())
        .build()
        .expect("Failed to create coordinator");

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), coordinator.run(cancel))
        .await
        .expect("cancellation should stop the crawl promptly");

    assert!(matches!(result, Err(CrawlError::Aborted { completed: 0 })));
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, FinalOutcome::Aborted);
    assert!(sink.finished().expect("finish should run").cancelled);
}

#[tokio::test]
async fn test_sqlite_sink_records_run() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<html><body><a href="/a">a</a><a href="/b">b</a></body></html>"#,
    )
    .await;
    mount_html(&server, "/a", LEAF).await;
    mount_html(&server, "/b", LEAF).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("crawl.db");
    let config = test_config(
        &server.uri(),
        &format!("[output]\ndatabase-path = {:?}\n", db_path.display().to_string()),
    );

    let coordinator = Coordinator::builder(config)
        .config_hash("test-hash")
        .build()
        .expect("Failed to create coordinator");
    coordinator
        .run(CancellationToken::new())
        .await
        .expect("Crawl failed");

    let stats = load_statistics(&db_path)
        .expect("Failed to read statistics")
        .expect("run should be recorded");
    assert_eq!(stats.pages_succeeded, 3);
    assert_eq!(stats.urls_accepted, 3);
    assert!(!stats.cancelled);
    assert!(stats.finished_at.is_some());
}

/// Reports the process as over budget for its first `over` samples
struct OverBudgetAtStart {
    over: usize,
    samples: AtomicUsize,
}

impl ResourceSampler for OverBudgetAtStart {
    fn sample(&self) -> u64 {
        if self.samples.fetch_add(1, Ordering::SeqCst) < self.over {
            u64::MAX
        } else {
            0
        }
    }
}

#[tokio::test]
async fn test_budget_pause_is_recorded_in_database() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<html><body><a href="/a">a</a></body></html>"#,
    )
    .await;
    mount_html(&server, "/a", LEAF).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("crawl.db");
    let config = test_config(
        &server.uri(),
        &format!(
            "[resources]\nbudget-bytes = 1000\ncheck-every = 1\ngrace-period-ms = 1\n\n[output]\ndatabase-path = {:?}\n",
            db_path.display().to_string()
        ),
    );

    let coordinator = Coordinator::builder(config)
        .sampler(Arc::new(OverBudgetAtStart {
            over: 2,
            samples: AtomicUsize::new(0),
        }))
        .build()
        .expect("Failed to create coordinator");
    let stats = coordinator
        .run(CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(stats.budget_pauses, 1);
    assert_eq!(stats.pages_succeeded, 2);

    let stored = load_statistics(&db_path)
        .expect("Failed to read statistics")
        .expect("run should be recorded");
    assert_eq!(stored.budget_pauses, 1);
    assert_eq!(stored.pages_succeeded, 2);
}

#[tokio::test]
async fn test_invalid_seed_fails_the_run() {
    let result = parse_config(
        r#"
[crawl]
seeds = ["https://example.com/", "https://other.com/"]
host-scope = "example.com"
"#,
    );
    assert!(result.is_err());

    let mut config = test_config("http://127.0.0.1:9", "");
    config.crawl.seeds = vec!["http://127.0.0.1:9/archive.zip".to_string()];
    assert!(matches!(
        Coordinator::builder(config)
            .sink(Arc::new(MemorySink::new()))
            .build(),
        Err(CrawlError::InvalidSeed { .. })
    ));
}
