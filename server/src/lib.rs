pub mod config;
pub mod error;
pub mod metrics;
pub mod validation;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tts_core::{SynthesisError, TtsManager};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::metrics::{AppMetrics, DetailedMetricsResponse, EndpointMetricsResponse, SystemMetrics};
use crate::validation::validate_synthesis_request;

/// Request bodies larger than this are rejected before parsing.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub tts: Arc<TtsManager>,
    pub request_count: Arc<AtomicU64>,
    pub metrics: AppMetrics,
    /// Admission control: one permit per synthesis allowed to run at once.
    pub synth_permits: Arc<Semaphore>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(tts: Arc<TtsManager>, config: ServerConfig) -> Self {
        Self {
            tts,
            request_count: Arc::new(AtomicU64::new(0)),
            metrics: AppMetrics::new(),
            synth_permits: Arc::new(Semaphore::new(config.max_concurrent_syntheses.max(1))),
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    /// Missing, null or blank falls back to "Generic female voice".
    #[serde(default)]
    pub voice_description: Option<String>,
    /// Accepted and validated, but not applied to the audio.
    #[serde(default)]
    pub speed: Option<f32>,
}

impl SynthesisRequest {
    pub fn speed(&self) -> f32 {
        self.speed.unwrap_or(1.0)
    }
}

#[derive(Debug, Serialize)]
pub struct SynthesisResponse {
    pub audio_base64: String,
    pub sample_rate: u32,
    pub duration_ms: u64,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    model: String,
}

/// Routes without the middleware stack; served at `/` and under `/api`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/synthesize", post(synthesize_endpoint))
        .route("/metrics", get(metrics_endpoint));

    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .layer(axum::middleware::from_fn(add_request_id))
        .with_state(state)
}

/// The full application: routes plus CORS, rate limiting, timeouts and tracing.
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let config = state.config.clone();

    // Global key: all clients share one budget, which is what protects the
    // single model instance.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(replenish_interval_ms(config.rate_limit_per_minute))
            .burst_size(config.rate_limit_per_minute.max(1))
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    );
    info!("Rate limiting: {} requests per minute", config.rate_limit_per_minute);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors_layer(&config))
        .into_inner();

    Ok(router(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware_stack))
}

/// Milliseconds between two replenished rate-limit slots.
fn replenish_interval_ms(rate_limit_per_minute: u32) -> u64 {
    (60_000 / u64::from(rate_limit_per_minute.max(1))).max(1)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false);

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .flatten()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS not set or empty, allowing all origins");
        base.allow_origin(Any)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        base.allow_origin(AllowOrigin::list(origins))
    }
}

// Request ID middleware for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
    request
        .headers_mut()
        .insert("x-request-id", request_id.clone());
    let mut response = next.run(request).await;
    response.headers_mut().insert("x-request-id", request_id);
    response
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.config.model_name.clone(),
    })
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<DetailedMetricsResponse> {
    let request_count = state.request_count.load(Ordering::Relaxed);
    let uptime = state.metrics.uptime_seconds();
    let system = tokio::task::spawn_blocking(move || SystemMetrics::collect(request_count, uptime))
        .await
        .unwrap_or_else(|_| SystemMetrics::collect(request_count, uptime));

    Json(DetailedMetricsResponse {
        timestamp: chrono::Utc::now(),
        system,
        endpoints: EndpointMetricsResponse {
            synthesize: state.metrics.synthesize.snapshot(),
        },
        synthesis: state.metrics.synthesis.snapshot(),
    })
}

pub async fn synthesize_endpoint(
    State(state): State<AppState>,
    Json(req): Json<SynthesisRequest>,
) -> Result<Json<SynthesisResponse>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let start_time = Instant::now();

    let result = run_synthesis(&state, req).await;

    let latency_ms = start_time.elapsed().as_millis() as u64;
    state.metrics.synthesize.record_request(latency_ms);
    if result.is_err() {
        state.metrics.synthesize.record_error();
    }
    result.map(Json)
}

async fn run_synthesis(
    state: &AppState,
    req: SynthesisRequest,
) -> Result<SynthesisResponse, ApiError> {
    let speed = req.speed();
    validate_synthesis_request(&req.text, req.voice_description.as_deref(), speed)?;

    let permit = state
        .synth_permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| ApiError::InternalError(format!("admission control closed: {e}")))?;

    // The pipeline runs on its own task so that a caller hanging up or timing
    // out does not abort generation halfway; the permit is held until it ends
    // and the outcome is counted even when nobody waits for it.
    let tts = state.tts.clone();
    let metrics = state.metrics.synthesis.clone();
    let task = tokio::spawn(async move {
        let _permit = permit;
        let started = Instant::now();
        let result = tts
            .synthesize(&req.text, req.voice_description.as_deref(), speed)
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(synthesis) => {
                metrics.record_synthesis(elapsed_ms, &synthesis.stats, synthesis.audio.num_samples);
                info!(
                    frames = synthesis.stats.frames,
                    duration_ms = synthesis.audio.duration_ms(),
                    elapsed_ms,
                    "Synthesis complete"
                );
            }
            Err(SynthesisError::InsufficientAudioCodes { .. }) => {
                metrics.record_insufficient_codes();
            }
            Err(_) => {}
        }
        result
    });

    let timeout = state.config.synthesis_timeout();
    let synthesis = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result?,
        Ok(Err(join_err)) => {
            return Err(ApiError::InternalError(format!("Task join error: {join_err}")));
        }
        Err(_) => return Err(ApiError::Timeout(timeout.as_secs())),
    };

    Ok(SynthesisResponse {
        audio_base64: synthesis.audio.to_base64(),
        sample_rate: synthesis.audio.sample_rate,
        duration_ms: synthesis.audio.duration_ms(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replenish_interval_follows_requests_per_minute() {
        assert_eq!(replenish_interval_ms(60), 1000);
        assert_eq!(replenish_interval_ms(120), 500);
        assert_eq!(replenish_interval_ms(600), 100);
        assert_eq!(replenish_interval_ms(1), 60_000);
        assert_eq!(replenish_interval_ms(0), 60_000);
        assert_eq!(replenish_interval_ms(120_000), 1);
    }
}
