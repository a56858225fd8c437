pub mod extractor;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use ureq::Agent;
use url::Url;

use self::extractor::extract_text;
use crate::QaError;
use crate::config::LoaderConfig;

/// Text of one successfully loaded page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source_url: String,
    pub title: Option<String>,
    pub text: String,
}

/// A configured URL that produced no document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub url: String,
    pub reason: String,
}

/// Outcome of loading every configured URL
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Loaded documents in configuration order
    pub documents: Vec<Document>,
    pub failed: Vec<LoadFailure>,
    pub duration: Duration,
}

impl LoadReport {
    #[inline]
    pub fn attempted(&self) -> usize {
        self.documents.len() + self.failed.len()
    }

    /// The loaded documents, or an error when none could be loaded
    #[inline]
    pub fn into_documents(self) -> crate::Result<Vec<Document>> {
        if self.documents.is_empty() {
            return Err(QaError::Loader(format!(
                "no documents could be loaded from any of {} configured URLs",
                self.attempted()
            )));
        }
        Ok(self.documents)
    }
}

/// Page fetcher with an optional delay between requests and bounded retries
#[derive(Debug)]
pub struct HttpClient {
    agent: Agent,
    config: LoaderConfig,
    retry_delay: Duration,
    last_fetch: Option<Instant>,
}

impl HttpClient {
    #[inline]
    pub fn new(config: LoaderConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .user_agent(&config.user_agent)
            .build()
            .into();

        Self {
            agent,
            config,
            retry_delay: Duration::from_secs(2),
            last_fetch: None,
        }
    }

    #[inline]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Fetch `url` as text, retrying transient failures up to `max_retries` times
    #[inline]
    pub async fn get(&mut self, url: &str) -> Result<String> {
        self.wait_for_turn().await;

        let attempts = self.config.max_retries + 1;
        let mut attempt = 1;
        loop {
            let outcome = self.fetch_once(url).await;
            match outcome {
                Ok(body) => {
                    debug!("Fetched {} ({} bytes, attempt {}/{})", url, body.len(), attempt, attempts);
                    return Ok(body);
                }
                Err(e) if attempt < attempts && is_retryable_error(&e) => {
                    warn!("Attempt {}/{} for {} failed: {:#}", attempt, attempts, url, e);
                    sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn wait_for_turn(&mut self) {
        let delay = Duration::from_millis(self.config.request_delay_ms);
        if let Some(remaining) = self
            .last_fetch
            .and_then(|previous| delay.checked_sub(previous.elapsed()))
            .filter(|remaining| !remaining.is_zero())
        {
            debug!("Waiting {:?} before the next fetch", remaining);
            sleep(remaining).await;
        }

        self.last_fetch = Some(Instant::now());
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let agent = self.agent.clone();
        let target = url.to_string();

        tokio::task::spawn_blocking(move || match agent.get(&target).call() {
            Ok(mut response) => response
                .body_mut()
                .read_to_string()
                .with_context(|| format!("Failed to read body of {}", target)),
            Err(ureq::Error::StatusCode(code)) => Err(anyhow!("HTTP error {}", code)),
            Err(e) => Err(anyhow::Error::from(e)).with_context(|| format!("Failed to fetch {}", target)),
        })
        .await
        .context("Fetch task panicked")?
    }
}

/// Timeouts, connection problems, 5xx and 429 responses are worth another attempt
fn is_retryable_error(error: &anyhow::Error) -> bool {
    const TRANSIENT: [&str; 6] = [
        "timeout",
        "timed out",
        "connection",
        "network",
        "http error 5",
        "http error 429",
    ];

    let message = format!("{:#}", error).to_lowercase();
    TRANSIENT.iter().any(|marker| message.contains(marker))
}

/// Parse a source URL, accepting only http(s) URLs with a host
#[inline]
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str).with_context(|| format!("Not a valid URL: {:?}", url_str))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(anyhow!("Source URL has no host: {}", url_str)),
        scheme => Err(anyhow!("Unsupported scheme {:?} in {}", scheme, url_str)),
    }
}

/// Fetches the configured pages and turns them into documents
#[derive(Debug)]
pub struct DocumentLoader {
    client: HttpClient,
    urls: Vec<String>,
}

impl DocumentLoader {
    #[inline]
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            client: HttpClient::new(config.clone()),
            urls: config.urls.clone(),
        }
    }

    #[inline]
    pub fn with_client(mut self, client: HttpClient) -> Self {
        self.client = client;
        self
    }

    /// Load every configured URL in order.
    ///
    /// Individual failures are logged and recorded in the report; they never
    /// abort the load.
    #[inline]
    pub async fn load(&mut self) -> LoadReport {
        let started = Instant::now();
        let mut report = LoadReport::default();

        let bar = crate::progress_bar(self.urls.len(), "{spinner} [{pos}/{len}] Loading {msg}");

        for url in self.urls.clone() {
            bar.set_message(url.clone());

            match self.load_one(&url).await {
                Ok(document) => {
                    info!(
                        "Loaded {} ({} chars, title {:?})",
                        url,
                        document.text.chars().count(),
                        document.title
                    );
                    report.documents.push(document);
                }
                Err(e) => {
                    warn!("Skipping {}: {:#}", url, e);
                    report.failed.push(LoadFailure {
                        url: url.clone(),
                        reason: format!("{:#}", e),
                    });
                }
            }

            bar.inc(1);
        }

        bar.finish_and_clear();
        report.duration = started.elapsed();

        if report.documents.is_empty() {
            error!(
                "No documents could be loaded from {} configured URLs",
                report.attempted()
            );
        } else {
            info!(
                "Loaded {} of {} documents in {:?}",
                report.documents.len(),
                report.attempted(),
                report.duration
            );
        }

        report
    }

    async fn load_one(&mut self, url: &str) -> Result<Document> {
        let parsed = validate_url(url)?;
        let html = self.client.get(parsed.as_str()).await?;
        let page = extract_text(&html).context("Failed to extract page text")?;

        if page.text.trim().is_empty() {
            return Err(anyhow!("Page contained no extractable text"));
        }

        Ok(Document {
            source_url: url.to_string(),
            title: page.title,
            text: page.text,
        })
    }
}
