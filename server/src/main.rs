use std::{net::SocketAddr, sync::Arc};

use inference_client::{RemoteDecoder, RemoteGenerator};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tts_core::{TtsConfig, TtsManager};

use server::{app, config::ServerConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting TTS server...");

    let config = ServerConfig::from_env();

    let tts_config = match config.tts_config_path.as_deref() {
        Some(path) => TtsConfig::from_file(path).unwrap_or_else(|e| {
            warn!("Could not load {path}: {e:#}, using built-in defaults.");
            TtsConfig::default()
        }),
        None => TtsConfig::default(),
    };

    let generator = RemoteGenerator::new(&config.generator_url, config.model_timeout())?;
    let decoder = RemoteDecoder::new(&config.decoder_url, config.model_timeout())?;
    // Not fatal: the model services may still be loading weights.
    if let Err(e) = generator.health().await {
        warn!("Generation service not ready: {e:#}");
    }
    if let Err(e) = decoder.health().await {
        warn!("Decoder service not ready: {e:#}");
    }
    info!(
        "Model services: generator={}, decoder={}",
        generator.base_url(),
        decoder.base_url()
    );

    let tts = Arc::new(TtsManager::new(
        tts_config,
        Arc::new(generator),
        Arc::new(decoder),
    )?);
    info!(
        "Codec: {} Hz, audio codes [{}, {}]",
        tts.sample_rate(),
        tts.config().codec.min_code_id,
        tts.config().codec.max_code_id
    );

    let state = AppState::new(tts, config.clone());
    info!(
        "Server configuration loaded: port={}, rate_limit={}/min, max_concurrent={}, synthesis_timeout={}s",
        config.port,
        config.rate_limit_per_minute,
        config.max_concurrent_syntheses,
        config.synthesis_timeout_secs
    );

    let app = app(state)?;

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
