//! Integration tests for the harvesting pipeline
//!
//! These tests drive a full session over an in-process feed, with wiremock
//! serving the media and a temporary directory as output.

use chrono::{DateTime, TimeZone, Utc};
use media_harvest::config::{parse_config, Config};
use media_harvest::feed::{MemoryElement, MemoryFeed, TranscriptEntry};
use media_harvest::output::{read_tasks, NoProgress, SUMMARY_MARKER};
use media_harvest::pipeline::{HttpFetcher, ScanOutcome, Session};
use media_harvest::{ConfigError, HarvestError, LocalStorage, MediaKind, SessionPhase};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing into `dir`, with an optional window
fn create_test_config(dir: &TempDir, window: Option<(&str, &str)>) -> Config {
    let window = match window {
        Some((start, end)) => format!(
            "[window]\nstart = \"{}\"\nend = \"{}\"\nenabled = true\n",
            start, end
        ),
        None => String::new(),
    };

    parse_config(&format!(
        r#"
{}
[feed]
endpoint = "https://feed.example.com/api/timeline"
transcript-keyword = "timeline"
retry-backoff-ms = 10

[workers]
image-timeout-secs = 2
video-timeout-secs = 2
politeness-delay-ms = 0

[dispatcher]
pop-timeout-ms = 50

[drain]
timeout-secs = 5
grace-secs = 1
worker-timeout-secs = 5

[output]
directory = "{}"
"#,
        window,
        dir.path().display()
    ))
    .expect("Failed to parse test config")
}

fn create_session(config: Config, feed: MemoryFeed) -> Session<MemoryFeed> {
    Session::new(
        config,
        feed,
        Arc::new(HttpFetcher::new(reqwest::Client::new())),
        Arc::new(LocalStorage::new()),
    )
    .expect("Failed to create session")
    .with_progress(Arc::new(NoProgress))
}

fn june(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap()
}

async fn mount_media(server: &MockServer, expected: u64) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/media/.+"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"image-bytes".to_vec()))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_run_within_window() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_media(&server, 5).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, Some(("2025-06-01", "2025-06-10")));

    // Newest first: two posts after the window, five inside it, then one
    // before its start
    let mut first_page = vec![
        MemoryElement::new("future-2")
            .at(june(13))
            .media(format!("{}/media/F2.jpg", base)),
        MemoryElement::new("future-1")
            .at(june(12))
            .media(format!("{}/media/F1.jpg", base)),
    ];
    for day in (2..=4).rev() {
        first_page.push(
            MemoryElement::new(format!("post-{}", day))
                .at(june(day + 2))
                .media(format!("{}/media/P{}.jpg", base, day)),
        );
    }
    let second_page = vec![
        MemoryElement::new("post-1")
            .at(june(3))
            .media(format!("{}/media/P1.jpg", base)),
        MemoryElement::new("post-0")
            .at(june(2))
            .media(format!("{}/media/P0.jpg", base)),
        MemoryElement::new("old")
            .at(Utc.with_ymd_and_hms(2025, 5, 30, 12, 0, 0).unwrap())
            .media(format!("{}/media/OLD.jpg", base)),
    ];

    let feed = MemoryFeed::with_pages(vec![first_page, second_page]);
    let mut session = create_session(config, feed);

    let report = session.run().await.expect("Run failed");

    assert_eq!(session.phase(), SessionPhase::Terminated);
    assert_eq!(report.scan, ScanOutcome::WindowStop);
    assert!(!report.stopped);
    assert_eq!(report.reconciliation.attempted, 5);
    assert_eq!(report.reconciliation.found, 5);
    assert!(report.reconciliation.is_complete());
    assert_eq!(report.totals().downloaded, 5);

    for name in ["P0.jpg", "P1.jpg", "P2.jpg", "P3.jpg", "P4.jpg"] {
        assert!(dir.path().join(name).is_file(), "{} missing", name);
    }
    assert!(!dir.path().join("F1.jpg").exists());
    assert!(!dir.path().join("OLD.jpg").exists());

    let layout = session.layout();
    let tasks = read_tasks(layout.transcript_path()).await.unwrap();
    assert_eq!(tasks.len(), 5);
    assert!(tasks.iter().all(|t| t.kind == MediaKind::Image));

    let transcript = std::fs::read_to_string(layout.transcript_path()).unwrap();
    assert!(transcript.contains(SUMMARY_MARKER));
    assert!(transcript.contains("attempted=5 found=5 missing=0"));

    let manifest = std::fs::read_to_string(layout.manifest_path()).unwrap();
    assert!(manifest.contains("5 of 5 downloaded, 0 missing"));
}

#[tokio::test]
async fn test_repeated_elements_and_urls_are_fetched_once() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_media(&server, 2).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, None);

    let shared = format!("{}/media/SHARED.jpg", base);
    let feed = MemoryFeed::with_pages(vec![
        vec![
            MemoryElement::new("a").media(shared.clone()),
            MemoryElement::new("b")
                .media(shared.clone())
                .media(format!("{}/media/B.jpg", base)),
        ],
        // The same element shows up again after the feed grows
        vec![MemoryElement::new("a").media(shared.clone())],
    ]);
    let mut session = create_session(config, feed);

    let report = session.run().await.unwrap();

    assert_eq!(report.scan, ScanOutcome::Exhausted);
    assert_eq!(report.reconciliation.attempted, 2);
    assert_eq!(report.reconciliation.found, 2);
    assert_eq!(report.totals().enqueued, 2);
}

#[tokio::test]
async fn test_window_stop_freezes_the_feed() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_media(&server, 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, Some(("2025-06-01", "2025-06-10")));

    let feed = MemoryFeed::with_pages(vec![
        vec![MemoryElement::new("in").at(june(5)).media(format!("{}/media/IN.jpg", base))],
        vec![MemoryElement::new("stop")
            .at(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap())
            .media(format!("{}/media/STOP.jpg", base))],
    ]);

    // Pages appended behind the stop element are never revealed, even when
    // they carry timestamps inside the window
    let remote = feed.clone();
    remote.push_page(vec![MemoryElement::new("late")
        .at(june(4))
        .media(format!("{}/media/LATE.jpg", base))]);

    let mut session = create_session(config, feed);
    let report = session.run().await.unwrap();

    assert_eq!(report.scan, ScanOutcome::WindowStop);
    assert_eq!(report.reconciliation.attempted, 1);
    assert_eq!(remote.revealed_pages(), 2);
    assert_eq!(remote.calls().transcript_reads, 0);
    assert!(!dir.path().join("LATE.jpg").exists());
}

#[tokio::test]
async fn test_stop_mid_scan() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path_regex(r"^/media/.+"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"image-bytes".to_vec()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, None);

    let pages: Vec<Vec<MemoryElement>> = (0..50)
        .map(|i| {
            vec![MemoryElement::new(format!("post-{}", i))
                .media(format!("{}/media/M{}.jpg", base, i))]
        })
        .collect();
    let feed = MemoryFeed::with_pages(pages);
    feed.set_grow_delay(Duration::from_millis(20));

    let mut session = create_session(config, feed.clone());
    let handle = session.handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.stop();
    });

    let report = tokio::time::timeout(Duration::from_secs(10), session.run())
        .await
        .expect("Run did not stop in time")
        .unwrap();

    assert!(report.stopped);
    assert_eq!(report.scan, ScanOutcome::Cancelled);
    assert_eq!(session.phase(), SessionPhase::Terminated);
    assert!(feed.revealed_pages() < 50);

    let reconciliation = &report.reconciliation;
    assert_eq!(
        reconciliation.attempted,
        reconciliation.found + reconciliation.missing
    );
    assert!(reconciliation.attempted < 50);

    // A stopped session can start over
    let handle = session.handle();
    assert!(!handle.is_running());
    assert_eq!(handle.phase(), SessionPhase::Terminated);
}

#[tokio::test]
async fn test_existing_files_are_not_fetched_again() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/media/KEEP.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/NEW.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("KEEP.jpg"), b"old").unwrap();
    let config = create_test_config(&dir, None);

    let feed = MemoryFeed::with_pages(vec![vec![
        MemoryElement::new("keep").media(format!("{}/media/KEEP.jpg", base)),
        MemoryElement::new("new").media(format!("{}/media/NEW.jpg", base)),
    ]]);
    let mut session = create_session(config, feed);

    let report = session.run().await.unwrap();

    assert_eq!(report.totals().skipped, 1);
    assert_eq!(report.totals().downloaded, 1);
    assert_eq!(report.reconciliation.found, 2);
    assert_eq!(std::fs::read(dir.path().join("KEEP.jpg")).unwrap(), b"old");
}

#[tokio::test]
async fn test_failed_download_is_reported_missing() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/media/GONE.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_media(&server, 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, None);

    let feed = MemoryFeed::with_pages(vec![vec![
        MemoryElement::new("gone").media(format!("{}/media/GONE.jpg", base)),
        MemoryElement::new("ok").media(format!("{}/media/OK.jpg", base)),
    ]]);
    let mut session = create_session(config, feed);

    let report = session.run().await.unwrap();

    assert_eq!(report.totals().failed, 1);
    assert_eq!(report.reconciliation.attempted, 2);
    assert_eq!(report.reconciliation.missing, 1);

    let missing: Vec<_> = report.reconciliation.missing_entries().collect();
    assert!(missing[0].url.ends_with("/media/GONE.jpg"));

    let manifest = std::fs::read_to_string(session.layout().manifest_path()).unwrap();
    assert!(manifest.contains("GONE.jpg\tMISSING"));
}

#[tokio::test]
async fn test_inverted_window_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, None);
    config.window.enabled = true;
    config.window.start = Some("2025-06-10".to_string());
    config.window.end = Some("2025-06-01".to_string());

    let result = Session::new(
        config,
        MemoryFeed::new(),
        Arc::new(HttpFetcher::new(reqwest::Client::new())),
        Arc::new(LocalStorage::new()),
    );

    assert!(matches!(
        result,
        Err(HarvestError::Config(ConfigError::InvalidWindow(_)))
    ));
    assert!(!dir.path().join("transcript.txt").exists());
}

#[test]
fn test_inverted_window_fails_config_parsing() {
    let result = parse_config(
        r#"
[window]
start = "2025-06-10"
end = "2025-06-01"

[feed]
endpoint = "https://feed.example.com/api/timeline"
transcript-keyword = "timeline"

[output]
directory = "./harvest"
"#,
    );

    assert!(matches!(result, Err(ConfigError::InvalidWindow(_))));
}

#[tokio::test]
async fn test_variant_pass_after_natural_exhaustion() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/ext_tw_video/1/pu/vid/1280x720/high.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ext_tw_video/1/pu/vid/320x180/low.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, None);

    let body = serde_json::json!({
        "data": {
            "media": [{
                "video_info": {
                    "variants": [
                        { "bitrate": 256000, "url": format!("{}/ext_tw_video/1/pu/vid/320x180/low.mp4", base) },
                        { "content_type": "application/x-mpegURL", "url": format!("{}/pl.m3u8", base) },
                        { "bitrate": 2176000, "url": format!("{}/ext_tw_video/1/pu/vid/1280x720/high.mp4", base) }
                    ]
                }
            }]
        }
    })
    .to_string();

    let feed = MemoryFeed::new();
    feed.push_page_with_transcript(
        vec![MemoryElement::new("post")],
        vec![TranscriptEntry {
            url: "https://feed.example.com/api/timeline?cursor=1".to_string(),
            mime_type: "application/json".to_string(),
            body,
        }],
    );
    let mut session = create_session(config, feed);

    let report = session.run().await.unwrap();

    assert_eq!(report.scan, ScanOutcome::Exhausted);
    assert_eq!(report.reconciliation.attempted, 1);
    assert_eq!(report.reconciliation.found, 1);
    assert!(dir.path().join("video").join("high.mp4").is_file());
}
