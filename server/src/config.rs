// Configuration constants for the server

use std::{str::FromStr, time::Duration};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
    pub synthesis_timeout_secs: u64,
    pub max_concurrent_syntheses: usize,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub generator_url: String,
    pub decoder_url: String,
    pub model_timeout_secs: u64,
    /// Optional JSON file overriding token IDs, codec layout and sampling.
    pub tts_config_path: Option<String>,
    pub model_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            rate_limit_per_minute: 60,
            request_timeout_secs: 300,
            synthesis_timeout_secs: 240,
            // a single model instance serializes work on the device anyway
            max_concurrent_syntheses: 1,
            cors_allowed_origins: None,
            generator_url: "http://127.0.0.1:8001".to_string(),
            decoder_url: "http://127.0.0.1:8002".to_string(),
            model_timeout_secs: 180,
            tts_config_path: None,
            model_name: "maya1".to_string(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_allowed_origins = env_string("CORS_ALLOWED_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Self {
            port: env_parse("PORT", defaults.port),
            rate_limit_per_minute: env_parse("RATE_LIMIT_PER_MINUTE", defaults.rate_limit_per_minute),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            synthesis_timeout_secs: env_parse(
                "SYNTHESIS_TIMEOUT_SECS",
                defaults.synthesis_timeout_secs,
            ),
            max_concurrent_syntheses: env_parse(
                "MAX_CONCURRENT_SYNTHESES",
                defaults.max_concurrent_syntheses,
            )
            .max(1),
            cors_allowed_origins,
            generator_url: env_string("GENERATOR_URL").unwrap_or(defaults.generator_url),
            decoder_url: env_string("DECODER_URL").unwrap_or(defaults.decoder_url),
            model_timeout_secs: env_parse("MODEL_TIMEOUT_SECS", defaults.model_timeout_secs),
            tts_config_path: env_string("TTS_CONFIG"),
            model_name: env_string("MODEL_NAME").unwrap_or(defaults.model_name),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }
}
