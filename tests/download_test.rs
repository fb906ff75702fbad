//! Download endpoint tests.
//!
//! Exercises `/api/download` through the full router with fake backends:
//! passthrough, mp3 conversion, clipping, and the error paths.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use cf_core::config::Config;
use cf_core::{FormatSelector, OutputKind};
use common::{
    encode, sample_info, FakeExtractor, StreamBehavior, TestHarness, MEDIA_BYTES,
    TRANSCODED_PREFIX, VIDEO_URL,
};

/// Build a download URI from extra query parameters.
fn download_uri(extra: &str) -> String {
    format!("/api/download?url={}{extra}", encode(VIDEO_URL))
}

async fn get(harness: &TestHarness, uri: &str) -> axum::response::Response {
    harness
        .router()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn transcoded(payload: &[u8]) -> Vec<u8> {
    [TRANSCODED_PREFIX, payload].concat()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_url_is_400() {
    let harness = TestHarness::new();
    let response = get(&harness, "/api/download?itag=18").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "URL is required");
    assert!(harness.opened_selectors().is_empty());
}

#[tokio::test]
async fn invalid_url_is_400() {
    let harness = TestHarness::new();
    let uri = format!("/api/download?url={}", encode("ftp://youtube.com/x"));
    let response = get(&harness, &uri).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_itag_is_400() {
    let harness = TestHarness::new();
    let response = get(&harness, &download_uri("&itag=999")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("999"));
    assert!(harness.opened_selectors().is_empty());
}

#[tokio::test]
async fn bad_time_range_is_400() {
    let harness = TestHarness::new();
    for extra in [
        "&startTime=20&endTime=10",
        "&startTime=abc&endTime=10",
        "&startTime=-5&endTime=10",
    ] {
        let response = get(&harness, &download_uri(extra)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{extra}");
    }
}

// ---------------------------------------------------------------------------
// Passthrough
// ---------------------------------------------------------------------------

#[tokio::test]
async fn passthrough_streams_requested_format() {
    let harness = TestHarness::new();
    let response = get(&harness, &download_uri("&itag=18")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");

    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains("filename=\"Never Gonna Give You Up.mp4\""));

    assert_eq!(body_bytes(response).await, MEDIA_BYTES);
    assert_eq!(harness.opened_selectors(), vec![FormatSelector::Id("18".into())]);
    assert!(harness.transcoded_plans().is_empty());
}

#[tokio::test]
async fn missing_itag_uses_best_muxed_format() {
    let harness = TestHarness::new();
    let response = get(&harness, &download_uri("")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(harness.opened_selectors(), vec![FormatSelector::Id("22".into())]);
}

// ---------------------------------------------------------------------------
// Audio only
// ---------------------------------------------------------------------------

#[tokio::test]
async fn audio_only_yields_mp3() {
    let harness = TestHarness::new();
    let response = get(&harness, &download_uri("&itag=18&audioOnly=true")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");

    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains("Never Gonna Give You Up.mp3"));

    assert_eq!(body_bytes(response).await, transcoded(MEDIA_BYTES));
    assert_eq!(harness.opened_selectors(), vec![FormatSelector::BestAudio]);

    let plans = harness.transcoded_plans();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].output, OutputKind::Audio);
    assert!(plans[0].range.is_none());
}

#[tokio::test]
async fn audio_only_false_is_not_audio() {
    let harness = TestHarness::new();
    let response = get(&harness, &download_uri("&itag=18&audioOnly=false")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert!(harness.transcoded_plans().is_empty());
}

// ---------------------------------------------------------------------------
// Clips
// ---------------------------------------------------------------------------

#[tokio::test]
async fn time_range_yields_trimmed_clip() {
    let harness = TestHarness::new();
    let response = get(&harness, &download_uri("&itag=18&startTime=10&endTime=25.5")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(body_bytes(response).await, transcoded(MEDIA_BYTES));

    let plans = harness.transcoded_plans();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].output, OutputKind::Clip);
    assert_eq!(plans[0].selector, FormatSelector::Id("18".into()));
    let range = plans[0].range.unwrap();
    assert_eq!(range.start(), 10.0);
    assert_eq!(range.duration(), 15.5);
}

#[tokio::test]
async fn single_bound_is_ignored() {
    let harness = TestHarness::new();
    let response = get(&harness, &download_uri("&itag=18&startTime=10")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(harness.transcoded_plans().is_empty());
}

#[tokio::test]
async fn audio_clip_keeps_range() {
    let harness = TestHarness::new();
    let response = get(&harness, &download_uri("&audioOnly=1&startTime=0&endTime=30")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let plans = harness.transcoded_plans();
    assert_eq!(plans[0].output, OutputKind::Audio);
    assert_eq!(plans[0].range.unwrap().duration(), 30.0);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn extraction_failure_is_500() {
    let harness = TestHarness::with_extractor(
        Config::default(),
        FakeExtractor::failing("Sign in to confirm your age"),
    );
    let response = get(&harness, &download_uri("&itag=18")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("confirm your age"));
}

#[tokio::test]
async fn stream_failing_before_data_is_500() {
    let extractor = FakeExtractor::new(sample_info())
        .with_stream(StreamBehavior::Fail("HTTP Error 403: Forbidden".into()));
    let harness = TestHarness::with_extractor(Config::default(), extractor);

    let response = get(&harness, &download_uri("&itag=18")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("403"));
}

#[tokio::test]
async fn empty_stream_is_500() {
    let extractor = FakeExtractor::new(sample_info()).with_stream(StreamBehavior::Empty);
    let harness = TestHarness::with_extractor(Config::default(), extractor);

    let response = get(&harness, &download_uri("&itag=18")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// ---------------------------------------------------------------------------
// Concurrency limit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exhausted_download_slots_give_503() {
    let mut config = Config::default();
    config.server.max_concurrent_downloads = Some(1);
    let harness = TestHarness::with_config(config);

    // Hold the only permit with an unconsumed response body.
    let first = get(&harness, &download_uri("&itag=18")).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = get(&harness, &download_uri("&itag=18")).await;
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(second).await["code"], "unavailable");

    // Finishing the first body releases the slot.
    assert_eq!(body_bytes(first).await, MEDIA_BYTES);
    let third = get(&harness, &download_uri("&itag=18")).await;
    assert_eq!(third.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Over a real socket
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_over_http() {
    let (_harness, addr) = TestHarness::with_server().await;
    let url = format!("http://{addr}{}", download_uri("&itag=22&audioOnly=yes"));

    let resp = reqwest::get(&url).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "audio/mpeg");
    assert_eq!(resp.headers()["cache-control"], "no-store");
    let bytes = resp.bytes().await.unwrap();
    assert_eq!(&bytes[..], &transcoded(MEDIA_BYTES)[..]);
}
