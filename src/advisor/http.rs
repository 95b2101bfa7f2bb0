//! HTTP strategy advisor.
//!
//! Posts the `AdvisorContext` as JSON to an external strategy service and
//! parses a pod strategy out of the reply. The service may wrap its JSON in
//! prose or code fences, so parsing scans for the first balanced object.
//! Retries 429 / 5xx with exponential backoff.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{AdvisorContext, AdvisorStrategy, StrategyAdvisor};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Maximum retries on rate limit / server errors.
const MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff (ms).
const BASE_BACKOFF_MS: u64 = 50;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct HttpAdvisor {
    http: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: Option<String>,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
}

impl HttpAdvisor {
    pub fn new(
        endpoint: String,
        api_key: Option<SecretString>,
        model: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("ADPOD/0.1.0 (pod-strategy)")
            .build()
            .context("Failed to build advisor HTTP client")?;

        Ok(Self {
            http,
            endpoint,
            api_key,
            model,
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
        })
    }

    /// Send the context with retry + backoff; returns the raw body.
    async fn call_api(&self, context: &AdvisorContext) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "context": context,
        });

        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                debug!(attempt, delay_ms = delay, "Retrying advisor call");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let mut req = self.http.post(&self.endpoint).json(&body);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key.expose_secret());
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        self.total_calls.fetch_add(1, Ordering::Relaxed);
                        return response
                            .text()
                            .await
                            .context("Failed to read advisor response body");
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, error = %error_text, "Retryable advisor error");
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    anyhow::bail!("Advisor error {status}: {error_text}");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Advisor request failed");
                    last_error = Some(format!("Request error: {e}"));
                }
            }
        }

        anyhow::bail!(
            "Advisor failed after {} retries: {}",
            MAX_RETRIES,
            last_error.unwrap_or_default()
        )
    }

    /// Parse a strategy from a response body.
    ///
    /// Accepts a bare JSON object, an object wrapped in `{"strategy": …}`,
    /// or an object embedded in surrounding text.
    pub fn parse_strategy(text: &str) -> Result<AdvisorStrategy> {
        let object = Self::extract_json_object(text)
            .ok_or_else(|| anyhow::anyhow!("No JSON object in advisor response"))?;

        let value: serde_json::Value =
            serde_json::from_str(object).context("Advisor response is not valid JSON")?;

        let inner = match value.get("strategy") {
            Some(s) if s.is_object() => s.clone(),
            _ => value,
        };

        serde_json::from_value(inner).context("Advisor JSON does not describe a strategy")
    }

    /// Find the first balanced `{…}` span, honouring string literals.
    fn extract_json_object(text: &str) -> Option<&str> {
        let start = text.find('{')?;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (i, c) in text[start..].char_indices() {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..start + i + 1]);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// StrategyAdvisor implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl StrategyAdvisor for HttpAdvisor {
    async fn advise(&self, context: &AdvisorContext) -> Result<AdvisorStrategy> {
        debug!(
            opportunity_id = %context.opportunity_id,
            endpoint = %self.endpoint,
            "Requesting pod strategy"
        );

        let parsed = match self.call_api(context).await {
            Ok(text) => Self::parse_strategy(&text),
            Err(e) => Err(e),
        };

        match &parsed {
            Ok(strategy) => info!(
                opportunity_id = %context.opportunity_id,
                slots = strategy.slot_count,
                calls = self.total_calls(),
                "Advisor strategy received"
            ),
            Err(e) => {
                self.total_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    opportunity_id = %context.opportunity_id,
                    calls = self.total_calls(),
                    failures = self.total_failures(),
                    error = %e,
                    "Advisor gave no usable strategy"
                );
            }
        }

        parsed
    }

    fn name(&self) -> &str {
        self.model.as_deref().unwrap_or("http-advisor")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
