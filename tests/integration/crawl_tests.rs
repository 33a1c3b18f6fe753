//! Integration tests for the harvester
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! crawl cycle end-to-end against a temporary store root.

use site_harvester::config::Config;
use site_harvester::crawler::{Coordinator, FixedSequence};
use site_harvester::output::FailureKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a fast test configuration crawling `start_url` into `store_root`
fn create_test_config(start_url: &str, store_root: &Path) -> Config {
    let mut config = Config::default();
    config.crawler.start_url = start_url.to_string();
    config.crawler.download_delay = 0.01;
    config.crawler.max_concurrent_requests = 4;
    config.crawler.request_timeout = 5.0;
    config.autothrottle.start_delay = 0.01;
    config.autothrottle.max_delay = 0.5;
    config.retry.backoff_base = 0.01;
    config.retry.backoff_max = 0.05;
    config.output.store_root = store_root.to_string_lossy().into_owned();
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><body>{}</body></html>", body),
        "text/html; charset=utf-8",
    )
}

fn pdf(content: &[u8]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(content.to_vec(), "application/pdf")
}

#[tokio::test]
async fn test_end_to_end_single_site() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let store = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/a">Section A</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(
            r#"
            <a href="/docs/r1.pdf">Report 1</a>
            <a href="/docs/r2.pdf">Report 2</a>
            <a href="/docs/r1.pdf#page=2">Report 1 again</a>
            <a href="http://external.org/x">Elsewhere</a>
            <a href="/">Home</a>
            <a href="mailto:clerk@x.org">Mail</a>
            "#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/r1.pdf"))
        .respond_with(pdf(b"%PDF-1.4 one"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/r2.pdf"))
        .respond_with(pdf(b"%PDF-1.4 two"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&format!("{}/", base_url), store.path());
    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let stats = coordinator.run().await.expect("Crawl failed");

    assert_eq!(stats.pages_visited, 2);
    assert_eq!(stats.documents_archived, 2);
    assert_eq!(stats.total_failures(), 0);
    assert_eq!(stats.links_out_of_scope, 1);
    assert_eq!(stats.links_duplicate, 2);
    assert_eq!(stats.links_invalid, 0);
    assert_eq!(stats.not_dispatched, 0);

    let r1 = std::fs::read(store.path().join("docs/r1.pdf")).unwrap();
    assert_eq!(r1, b"%PDF-1.4 one");
    let r2 = std::fs::read(store.path().join("docs/r2.pdf")).unwrap();
    assert_eq!(r2, b"%PDF-1.4 two");

    let meta = std::fs::read_to_string(store.path().join("docs/r1.pdf.meta.json")).unwrap();
    let meta: serde_json::Value = serde_json::from_str(&meta).unwrap();
    assert_eq!(meta["local_path"], "docs/r1.pdf");
    assert_eq!(meta["source_url"], format!("{}/docs/r1.pdf", base_url));
    assert_eq!(meta["source_page"], format!("{}/a", base_url));

    // Re-offering visited URLs after the run has no effect
    let frontier = coordinator.frontier();
    assert!(!frontier.offer(&format!("{}/", base_url), &base_url));
    assert!(!frontier.offer(&format!("{}/a", base_url), &base_url));
    assert_eq!(frontier.pending(), 0);
}

#[tokio::test]
async fn test_retryable_status_uses_every_attempt() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let store = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/busy.pdf">Busy</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/busy.pdf"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&format!("{}/", base_url), store.path());
    config.retry.max_attempts = 3;

    let stats = Coordinator::new(config).unwrap().run().await.unwrap();

    assert_eq!(stats.pages_visited, 1);
    assert_eq!(stats.documents_archived, 0);
    assert_eq!(stats.failures_of(FailureKind::RetriesExhausted), 1);
    assert_eq!(stats.retries, 2);
    assert!(!store.path().join("busy.pdf").exists());
}

#[tokio::test]
async fn test_non_retryable_status_single_attempt() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let store = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/gone.pdf">Gone</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gone.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&format!("{}/", base_url), store.path());
    let stats = Coordinator::new(config).unwrap().run().await.unwrap();

    assert_eq!(stats.failures_of(FailureKind::HttpStatus), 1);
    assert_eq!(stats.retries, 0);
}

#[tokio::test]
async fn test_transient_failure_then_success() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let store = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/files/notes.txt">Notes</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/notes.txt"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/notes.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("minutes"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&format!("{}/", base_url), store.path());
    let stats = Coordinator::new(config).unwrap().run().await.unwrap();

    assert_eq!(stats.documents_archived, 1);
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.total_failures(), 0);
    assert_eq!(
        std::fs::read_to_string(store.path().join("files/notes.txt")).unwrap(),
        "minutes"
    );
}

#[tokio::test]
async fn test_user_agents_come_from_strategy() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let store = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "AgentA/1.0"))
        .respond_with(html(r#"<a href="/next">Next</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/next"))
        .and(header("user-agent", "AgentB/1.0"))
        .respond_with(html(""))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&format!("{}/", base_url), store.path());
    config.crawler.max_concurrent_requests = 1;

    let stats = Coordinator::new(config)
        .unwrap()
        .with_user_agents(Arc::new(FixedSequence::new(["AgentA/1.0", "AgentB/1.0"])))
        .run()
        .await
        .unwrap();

    assert_eq!(stats.pages_visited, 2);
    assert_eq!(stats.total_failures(), 0);
}

#[tokio::test]
async fn test_crawl_with_depth_limit() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let store = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/level1">Level 1</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/level1"))
        .respond_with(html(r#"<a href="/level2">Level 2</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/level2"))
        .respond_with(html(""))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&format!("{}/", base_url), store.path());
    config.crawler.max_depth = Some(1);

    let stats = Coordinator::new(config).unwrap().run().await.unwrap();

    assert_eq!(stats.pages_visited, 2);
    assert_eq!(stats.links_too_deep, 1);
}

#[tokio::test]
async fn test_off_site_redirect_is_permanent_failure() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let store = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/mirror.pdf">Mirror</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/mirror.pdf"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "http://external.invalid/r.pdf"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&format!("{}/", base_url), store.path());
    let stats = Coordinator::new(config).unwrap().run().await.unwrap();

    assert_eq!(stats.documents_archived, 0);
    assert_eq!(stats.failures_of(FailureKind::HttpStatus), 1);
}

#[tokio::test]
async fn test_redirect_targets_go_through_visited_set() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let store = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/old">Old</a><a href="/new">New</a><a href="/moved.pdf">Moved</a>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Linked directly and redirected to; fetched once
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html("new home"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/moved.pdf"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/docs/final.pdf"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/final.pdf"))
        .respond_with(pdf(b"%PDF-1.4 final"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&format!("{}/", base_url), store.path());
    let stats = Coordinator::new(config).unwrap().run().await.unwrap();

    assert_eq!(stats.pages_visited, 2);
    assert_eq!(stats.documents_archived, 1);
    assert_eq!(stats.redirects, 2);
    assert_eq!(stats.redirects_deduplicated, 1);
    assert_eq!(stats.total_failures(), 0);

    let new_fetches = mock_server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/new")
        .count();
    assert_eq!(new_fetches, 1);

    let meta = std::fs::read_to_string(store.path().join("docs/final.pdf.meta.json")).unwrap();
    let meta: serde_json::Value = serde_json::from_str(&meta).unwrap();
    assert_eq!(meta["source_url"], format!("{}/docs/final.pdf", base_url));
    assert_eq!(meta["source_page"], format!("{}/", base_url));
}

#[tokio::test]
async fn test_archive_failure_does_not_abort_run() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let store = TempDir::new().unwrap();

    // A plain file where the "blocked" directory would have to be created
    std::fs::write(store.path().join("blocked"), b"not a directory").unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/blocked/r.pdf">Blocked</a><a href="/open/r.pdf">Open</a>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/blocked/r.pdf"))
        .respond_with(pdf(b"blocked"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/open/r.pdf"))
        .respond_with(pdf(b"open"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&format!("{}/", base_url), store.path());
    let stats = Coordinator::new(config).unwrap().run().await.unwrap();

    assert_eq!(stats.documents_archived, 1);
    assert_eq!(stats.failures_of(FailureKind::ArchiveWrite), 1);
    assert_eq!(
        std::fs::read(store.path().join("open/r.pdf")).unwrap(),
        b"open"
    );
}

#[tokio::test]
async fn test_stop_request_cancels_pending_retry() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let store = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/slow.pdf">Slow</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/slow.pdf"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&format!("{}/", base_url), store.path());
    config.retry.backoff_base = 60.0;
    config.retry.backoff_max = 60.0;

    let coordinator = Coordinator::new(config).unwrap();
    let handle = coordinator.shutdown_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.stop();
    });

    let stats = tokio::time::timeout(Duration::from_secs(10), coordinator.run())
        .await
        .expect("stop request should end the run")
        .unwrap();

    assert_eq!(stats.pages_visited, 1);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.total_failures(), 0);
}
