
use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use super::Embedder;
use crate::config::{Config, OpenAiConfig};

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Blocking client for an OpenAI-compatible HTTP API
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: String,
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff_unit: Duration,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &OpenAiConfig, api_key: String, timeout: Duration) -> Result<Self> {
        let base_url = config
            .api_url()
            .context("Failed to build API URL from config")?;

        if api_key.trim().is_empty() {
            return Err(anyhow!("API key is empty"));
        }

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key: api_key.trim().to_string(),
            agent,
            retry_attempts: config.retry_attempts.max(1),
            backoff_unit: Duration::from_secs(1),
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Scale of the exponential backoff between retries
    #[inline]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// POST a JSON body to `path` (relative to the base URL) and decode the JSON reply
    #[inline]
    pub fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("Failed to build URL for {}", path))?;

        let request_json = serde_json::to_string(body).context("Failed to serialize request")?;
        let authorization = format!("Bearer {}", self.api_key);

        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .header("Authorization", &authorization)
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .with_context(|| format!("Request to {} failed", url))?;

        serde_json::from_str(&response_text)
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => return Ok(response_text),
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) if *status == 429 || *status >= 500 => {
                            warn!(
                                "Server error (status {}), attempt {}/{}",
                                status, attempt, self.retry_attempts
                            );
                            true
                        }
                        ureq::Error::StatusCode(status) => {
                            warn!("Client error (status {}), not retrying", status);
                            return Err(anyhow!("Client error: HTTP {}", status));
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => false,
                    };

                    if !should_retry {
                        return Err(anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay = self
                            .backoff_unit
                            .saturating_mul(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) as u32);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Hosted embedding model behind the `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddings {
    client: OpenAiClient,
    model: String,
    batch_size: usize,
}

impl OpenAiEmbeddings {
    #[inline]
    pub fn new(config: &OpenAiConfig, api_key: String) -> Result<Self> {
        let client = OpenAiClient::new(
            config,
            api_key,
            Duration::from_secs(config.timeout_seconds),
        )?;

        Ok(Self {
            client,
            model: config.embedding_model.clone(),
            batch_size: config.batch_size.max(1) as usize,
        })
    }

    /// Build from the application config, reading the API key from the environment
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = Config::api_key()?;
        Self::new(&config.openai, api_key)
    }

    #[inline]
    pub fn with_client(mut self, client: OpenAiClient) -> Self {
        self.client = client;
        self
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let mut response: EmbeddingResponse = self
            .client
            .post_json("embeddings", &request)
            .context("Failed to generate embeddings")?;

        if response.data.len() != texts.len() {
            return Err(anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            ));
        }

        response.data.sort_by_key(|entry| entry.index);
        Ok(response
            .data
            .into_iter()
            .map(|entry| entry.embedding)
            .collect())
    }
}

impl Embedder for OpenAiEmbeddings {
    #[inline]
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let batch_vectors = self
                .embed_batch(batch)
                .with_context(|| format!("Failed to process batch of {} texts", batch.len()))?;
            vectors.extend(batch_vectors);
        }

        if let Some(dimension) = vectors.first().map(Vec::len) {
            if vectors.iter().any(|v| v.len() != dimension) {
                return Err(anyhow!("Embedding model returned vectors of mixed dimension"));
            }
            debug!("Generated {} embeddings of dimension {}", vectors.len(), dimension);
        }

        Ok(vectors)
    }

    #[inline]
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Embedding response was empty"))
    }

    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }
}
