//! Common utilities for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use server::{app, config::ServerConfig, router, AppState};
use tower::ServiceExt;
use tts_core::{
    CodeDecoder, GenerationParams, HierarchicalCodes, Prompt, TokenGenerator, TtsConfig,
    TtsManager, Waveform,
};

pub const CODE_END: u32 = 128258;
pub const OFFSET: u32 = 128266;

/// `n` full frames of audio codes followed by code-end.
pub fn frame_tokens(n: u32) -> Vec<u32> {
    let mut tokens: Vec<u32> = (0..n * 7).map(|i| OFFSET + (i % 7)).collect();
    tokens.push(CODE_END);
    tokens
}

/// Generation stand-in that replays a fixed stream, optionally slowly.
pub struct MockGenerator {
    pub tokens: Vec<u32>,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new(tokens: Vec<u32>) -> Self {
        Self {
            tokens,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(tokens: Vec<u32>, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(tokens)
        }
    }
}

#[async_trait]
impl TokenGenerator for MockGenerator {
    async fn generate(&self, _: &Prompt, _: &GenerationParams) -> anyhow::Result<Vec<u32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.tokens.clone())
    }
}

/// Decoder stand-in: warmup block then a quiet sine per frame.
pub struct MockDecoder;

#[async_trait]
impl CodeDecoder for MockDecoder {
    async fn decode(&self, codes: &HierarchicalCodes) -> anyhow::Result<Waveform> {
        let mut samples = vec![0.0; 2048];
        let n = codes.frames() * 2048;
        samples.extend((0..n).map(|i| 0.25 * (i as f32 * 0.05).sin()));
        Ok(Waveform::new(samples, 24_000))
    }
}

pub struct FailingDecoder;

#[async_trait]
impl CodeDecoder for FailingDecoder {
    async fn decode(&self, _: &HierarchicalCodes) -> anyhow::Result<Waveform> {
        anyhow::bail!("decoder weights not loaded")
    }
}

pub fn test_state_with(
    generator: Arc<dyn TokenGenerator>,
    decoder: Arc<dyn CodeDecoder>,
    config: ServerConfig,
) -> AppState {
    let tts = TtsManager::new(TtsConfig::default(), generator, decoder)
        .expect("default TTS config is valid");
    AppState::new(Arc::new(tts), config)
}

/// Create a test app instance backed by in-process model stand-ins
pub fn create_test_app() -> Router {
    router(test_state_with(
        Arc::new(MockGenerator::new(frame_tokens(4))),
        Arc::new(MockDecoder),
        ServerConfig::default(),
    ))
}

/// Create the full application, middleware included, with the given settings
pub fn create_full_app(config: ServerConfig) -> Router {
    app(test_state_with(
        Arc::new(MockGenerator::new(frame_tokens(4))),
        Arc::new(MockDecoder),
        config,
    ))
    .expect("middleware configuration is valid")
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
}

pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
}
