//! Integration tests for the TTS server

mod common;

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use server::{app, config::ServerConfig, router};
use tower::ServiceExt;

use common::*;

#[tokio::test]
async fn test_health_check() {
    for uri in ["/health", "/healthz", "/api/health"] {
        let (status, body) = get_json(create_test_app(), uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model"], "maya1");
    }
}

#[tokio::test]
async fn test_synthesize_success() {
    let (status, body) = post_json(
        create_test_app(),
        "/api/synthesize",
        json!({
            "text": "Hello , this is a test .",
            "voice_description": "Young British female, energetic",
            "speed": 1.0
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sample_rate"], 24000);
    assert_eq!(body["duration_ms"], 4 * 2048 * 1000 / 24000);

    let wav = general_purpose::STANDARD
        .decode(body["audio_base64"].as_str().unwrap())
        .unwrap();
    let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 24000);
    assert_eq!(spec.bits_per_sample, 16);
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), 4 * 2048);
    assert_eq!(samples.iter().map(|s| s.unsigned_abs()).max(), Some(32767));
}

#[tokio::test]
async fn test_synthesize_defaults_optional_fields() {
    let (status, body) = post_json(create_test_app(), "/synthesize", json!({ "text": "hello there" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["audio_base64"].is_string());

    let (status, _) = post_json(
        create_test_app(),
        "/synthesize",
        json!({ "text": "hello there", "voice_description": null, "speed": null }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_synthesize_validation_empty_text() {
    let (status, body) = post_json(create_test_app(), "/synthesize", json!({ "text": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert!(body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_synthesize_validation_long_text() {
    let long_text = "a".repeat(6000);
    let (status, _) = post_json(create_test_app(), "/synthesize", json!({ "text": long_text })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_synthesize_validation_speed() {
    let (status, _) = post_json(
        create_test_app(),
        "/synthesize",
        json!({ "text": "hello", "speed": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_text_is_rejected() {
    let (status, _) = post_json(create_test_app(), "/synthesize", json!({ "speed": 1.0 })).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_insufficient_audio_codes_is_server_error() {
    let state = test_state_with(
        Arc::new(MockGenerator::new(vec![OFFSET, OFFSET + 1, OFFSET + 2, CODE_END])),
        Arc::new(MockDecoder),
        ServerConfig::default(),
    );
    let app = router(state.clone());

    let (status, body) = post_json(app.clone(), "/synthesize", json!({ "text": "hello" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 500);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("Not enough audio codes"), "{message}");
    assert!(body.get("audio_base64").is_none());

    let (_, metrics) = get_json(app, "/metrics").await;
    assert_eq!(metrics["synthesis"]["insufficient_code_failures"], 1);
    assert_eq!(metrics["endpoints"]["synthesize"]["error_count"], 1);
}

#[tokio::test]
async fn test_decoder_failure_is_reported() {
    let state = test_state_with(
        Arc::new(MockGenerator::new(frame_tokens(4))),
        Arc::new(FailingDecoder),
        ServerConfig::default(),
    );
    let (status, body) = post_json(router(state), "/synthesize", json!({ "text": "hello" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("decoder weights not loaded"));
}

#[tokio::test]
async fn test_exhausted_generation_still_returns_audio() {
    let mut tokens = frame_tokens(3);
    tokens.pop(); // no code-end
    let state = test_state_with(
        Arc::new(MockGenerator::new(tokens)),
        Arc::new(MockDecoder),
        ServerConfig::default(),
    );
    let app = router(state);

    let (status, _) = post_json(app.clone(), "/synthesize", json!({ "text": "hello" })).await;
    assert_eq!(status, StatusCode::OK);

    let (_, metrics) = get_json(app, "/api/metrics").await;
    assert_eq!(metrics["synthesis"]["exhausted_generations"], 1);
    assert_eq!(metrics["synthesis"]["total_frames"], 3);
}

#[tokio::test]
async fn test_synthesis_timeout() {
    let config = ServerConfig {
        synthesis_timeout_secs: 0,
        ..ServerConfig::default()
    };
    let generator = Arc::new(MockGenerator::slow(frame_tokens(4), Duration::from_millis(200)));
    let state = test_state_with(generator.clone(), Arc::new(MockDecoder), config);

    let (status, body) = post_json(router(state.clone()), "/synthesize", json!({ "text": "hello" })).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], 504);

    // The abandoned synthesis keeps running, releases its permit and is
    // still counted when it finishes.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(state.synth_permits.available_permits(), 1);
    assert_eq!(generator.calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    let (_, metrics) = get_json(router(state), "/metrics").await;
    assert_eq!(metrics["synthesis"]["synthesis_count"], 1);
    assert_eq!(metrics["synthesis"]["total_frames"], 4);
    assert_eq!(metrics["synthesis"]["total_samples"], 4 * 2048);
    assert_eq!(metrics["endpoints"]["synthesize"]["error_count"], 1);
}

#[tokio::test]
async fn test_concurrent_requests_are_serialized() {
    let generator = Arc::new(MockGenerator::slow(frame_tokens(4), Duration::from_millis(50)));
    let state = test_state_with(generator.clone(), Arc::new(MockDecoder), ServerConfig::default());
    let app = router(state.clone());

    let requests = (0..3).map(|_| post_json(app.clone(), "/synthesize", json!({ "text": "hello" })));
    let results = spawn_all(requests).await;
    assert!(results.iter().all(|(status, _)| *status == StatusCode::OK));
    assert_eq!(generator.calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert_eq!(state.synth_permits.available_permits(), 1);
}

#[tokio::test]
async fn test_request_id_header() {
    let response = create_test_app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let id = response.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(id.len(), 36);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = create_test_app();
    let (status, _) = post_json(app.clone(), "/synthesize", json!({ "text": "hello" })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, metrics) = get_json(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["system"]["request_count"], 1);
    assert_eq!(metrics["endpoints"]["synthesize"]["request_count"], 1);
    assert_eq!(metrics["synthesis"]["synthesis_count"], 1);
    assert_eq!(metrics["synthesis"]["total_samples"], 4 * 2048);
    assert!(metrics["timestamp"].is_string());
}

#[tokio::test]
async fn test_not_found_endpoint() {
    let response = create_test_app()
        .oneshot(Request::builder().uri("/nonexistent").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_full_app_serves_synthesis() {
    let app = create_full_app(ServerConfig::default());
    let (status, body) = post_json(app.clone(), "/api/synthesize", json!({ "text": "hello" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sample_rate"], 24000);

    let (status, body) = get_json(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_rate_limit_rejects_requests_past_burst() {
    let app = create_full_app(ServerConfig {
        rate_limit_per_minute: 2,
        ..ServerConfig::default()
    });

    for _ in 0..2 {
        let (status, _) = get_json(app.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = get_json(app, "/health").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let text = "a".repeat(70 * 1024);
    let (status, _) = post_json(
        create_full_app(ServerConfig::default()),
        "/synthesize",
        json!({ "text": text }),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin_by_default() {
    let response = create_full_app(ServerConfig::default())
        .oneshot(preflight("https://somewhere.test"))
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_cors_preflight_honours_configured_origins() {
    let app = create_full_app(ServerConfig {
        cors_allowed_origins: Some(vec!["https://studio.test".to_string()]),
        ..ServerConfig::default()
    });

    let response = app.clone().oneshot(preflight("https://studio.test")).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://studio.test"
    );

    let response = app.oneshot(preflight("https://elsewhere.test")).await.unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_request_timeout_layer() {
    let config = ServerConfig {
        request_timeout_secs: 0,
        ..ServerConfig::default()
    };
    let state = test_state_with(
        Arc::new(MockGenerator::slow(frame_tokens(4), Duration::from_millis(200))),
        Arc::new(MockDecoder),
        config,
    );
    let (status, _) = post_json(app(state).unwrap(), "/synthesize", json!({ "text": "hello" })).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
}

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri("/synthesize")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap()
}

/// Run request futures as separate tasks and collect their results in order.
async fn spawn_all<F, T>(futures: impl Iterator<Item = F>) -> Vec<T>
where
    F: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<_> = futures.map(tokio::spawn).collect();
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.await.unwrap());
    }
    out
}
