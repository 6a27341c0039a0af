//! HTTP clients for the generation and decoder model services.
//!
//! The neural models run out of process (typically on a GPU host); these
//! clients speak a small JSON protocol to them and plug into `tts_core`
//! through its backend traits.

mod decoder;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use tts_core::{GenerationParams, Prompt, PromptSegment, TokenGenerator};

pub use decoder::RemoteDecoder;

/// Body of `POST {base}/generate`.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a [PromptSegment],
    #[serde(flatten)]
    params: &'a GenerationParams,
}

/// The service returns only the tokens generated after the prompt.
#[derive(Deserialize)]
struct GenerateResponse {
    token_ids: Vec<u32>,
}

/// Client for a remote generation-model service.
#[derive(Debug, Clone)]
pub struct RemoteGenerator {
    client: Client,
    base_url: String,
}

impl RemoteGenerator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: normalize_base_url(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}/health`; used at startup to report reachability.
    pub async fn health(&self) -> Result<()> {
        check_health(&self.client, &self.base_url).await
    }
}

#[async_trait]
impl TokenGenerator for RemoteGenerator {
    async fn generate(&self, prompt: &Prompt, params: &GenerationParams) -> Result<Vec<u32>> {
        let url = format!("{}/generate", self.base_url);
        let body = GenerateRequest {
            prompt: prompt.segments(),
            params,
        };
        let response: GenerateResponse = post_json(&self.client, &url, &body).await?;
        debug!(tokens = response.token_ids.len(), "Generation service responded");
        Ok(response.token_ids)
    }
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")
}

pub(crate) fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

pub(crate) async fn check_health(client: &Client, base_url: &str) -> Result<()> {
    let url = format!("{base_url}/health");
    client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("{url} is unreachable"))?
        .error_for_status()
        .with_context(|| format!("{url} reported unhealthy"))?;
    Ok(())
}

/// POST `body` as JSON and decode a JSON reply; non-2xx becomes an error
/// carrying the status and response text.
pub(crate) async fn post_json<B, R>(client: &Client, url: &str, body: &B) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        anyhow::bail!("{url} returned {status}: {}", text.trim());
    }

    response
        .json::<R>()
        .await
        .with_context(|| format!("invalid response body from {url}"))
}
