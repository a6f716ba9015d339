//! Integration tests for the download worker.
//!
//! Exercises the retry loop through the public API against mock media
//! endpoints.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use clipgrab_core::download::{
    DownloadError, DownloadWorker, HttpClient, RetryPolicy, Transcoder,
};
use clipgrab_core::{FailureKind, WorkItem};
use tempfile::TempDir;
use tokio::sync::Semaphore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

/// Transcoder that must never be reached by direct downloads.
#[derive(Debug)]
struct UnreachableTranscoder;

#[async_trait]
impl Transcoder for UnreachableTranscoder {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn transcode(&self, source_url: &str, _target: &Path) -> Result<(), DownloadError> {
        panic!("direct item was sent to the transcoder: {source_url}");
    }
}

fn worker(attempts: u32, backoff: Duration) -> DownloadWorker {
    DownloadWorker::new(
        HttpClient::with_timeout(Duration::from_secs(5)).unwrap(),
        Arc::new(UnreachableTranscoder),
        RetryPolicy::new(attempts, backoff),
    )
}

#[tokio::test]
async fn test_worker_downloads_direct_item() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png data"))
        .expect(1)
        .mount(&server)
        .await;

    let item = WorkItem::direct(
        "a_00001.png",
        temp.path().join("a_00001.png"),
        format!("{}/a.png", server.uri()),
    );
    let saved = worker(3, Duration::from_millis(10))
        .download(&item, &Semaphore::new(1))
        .await
        .unwrap();

    assert_eq!(saved, item.target_path);
    assert_eq!(std::fs::read(saved).unwrap(), b"png data");
}

#[tokio::test]
async fn test_non_200_is_retried_without_backoff() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/flaky.mp4"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok"))
        .expect(1)
        .mount(&server)
        .await;

    let item = WorkItem::direct(
        "flaky_00001.mp4",
        temp.path().join("flaky_00001.mp4"),
        format!("{}/flaky.mp4", server.uri()),
    );
    // A long backoff would blow the elapsed bound if status failures slept.
    let started = Instant::now();
    let saved = worker(3, Duration::from_secs(30))
        .download(&item, &Semaphore::new(1))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(std::fs::read(saved).unwrap(), b"ok");
}

#[tokio::test]
async fn test_persistent_404_reports_after_all_attempts() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/gone.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .expect(4)
        .mount(&server)
        .await;

    let item = WorkItem::direct(
        "gone_00001.mp4",
        temp.path().join("gone_00001.mp4"),
        format!("{}/gone.mp4", server.uri()),
    );
    let report = worker(4, Duration::from_millis(10))
        .download(&item, &Semaphore::new(1))
        .await
        .unwrap_err();

    assert_eq!(report.attempts, 4);
    assert_eq!(report.kind, FailureKind::TransientExhausted);
    assert!(report.message.contains("404"), "{}", report.message);
    assert!(!item.target_path.exists());
}

#[tokio::test]
async fn test_connection_refused_is_retried_with_backoff() {
    let Ok(listener) = std::net::TcpListener::bind("127.0.0.1:0") else {
        return;
    };
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let temp = TempDir::new().unwrap();

    let item = WorkItem::direct(
        "down_00001.mp4",
        temp.path().join("down_00001.mp4"),
        format!("http://127.0.0.1:{port}/down.mp4"),
    );
    let started = Instant::now();
    let report = worker(3, Duration::from_millis(100))
        .download(&item, &Semaphore::new(1))
        .await
        .unwrap_err();

    assert_eq!(report.attempts, 3);
    assert_eq!(report.kind, FailureKind::TransientExhausted);
    assert!(started.elapsed() >= Duration::from_millis(200));
}
