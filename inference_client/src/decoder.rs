use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tts_core::{CodeDecoder, HierarchicalCodes, Waveform};

use crate::{build_client, check_health, normalize_base_url, post_json};

/// Body of `POST {base}/decode`: the three code levels, coarse to fine.
#[derive(Serialize)]
struct DecodeRequest<'a> {
    codes: [&'a [u32]; 3],
}

#[derive(Deserialize)]
struct DecodeResponse {
    samples: Vec<f32>,
    sample_rate: u32,
}

/// Client for a remote hierarchical audio decoder service.
#[derive(Debug, Clone)]
pub struct RemoteDecoder {
    client: Client,
    base_url: String,
}

impl RemoteDecoder {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: normalize_base_url(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<()> {
        check_health(&self.client, &self.base_url).await
    }
}

#[async_trait]
impl CodeDecoder for RemoteDecoder {
    async fn decode(&self, codes: &HierarchicalCodes) -> Result<Waveform> {
        let url = format!("{}/decode", self.base_url);
        let body = DecodeRequest {
            codes: codes.levels(),
        };
        let response: DecodeResponse = post_json(&self.client, &url, &body).await?;
        debug!(
            samples = response.samples.len(),
            sample_rate = response.sample_rate,
            "Decoder service responded"
        );
        Ok(Waveform::new(response.samples, response.sample_rate))
    }
}
