//! HTTP demand client.
//!
//! POSTs a JSON body to a source (or exchange) endpoint. HTTP 204 and an
//! empty body both mean "no bid". Anything else must parse as a
//! [`BidResponse`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::wire::{BidRequest, BidResponse};
use super::DemandClient;

pub struct HttpDemandClient {
    name: String,
    endpoint: String,
    api_key: Option<SecretString>,
    http: Client,
}

impl HttpDemandClient {
    /// `timeout` is a transport-level backstop; the dispatcher applies the
    /// per-slot budget on top.
    pub fn new(
        name: &str,
        endpoint: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("ADPOD/0.1.0 (bid-dispatch)")
            .build()
            .with_context(|| format!("Failed to build HTTP client for {name}"))?;

        Ok(Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            api_key,
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send `body`, returning `None` for a no-bid answer.
    pub async fn post<T: Serialize + Sync>(&self, body: &T) -> Result<Option<BidResponse>> {
        let mut req = self.http.post(&self.endpoint).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("{} request failed", self.name))?;

        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            debug!(source = %self.name, "No bid (204)");
            return Ok(None);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} returned {status}: {text}", self.name);
        }

        let text = resp
            .text()
            .await
            .with_context(|| format!("Failed to read {} response body", self.name))?;
        if text.trim().is_empty() {
            debug!(source = %self.name, "No bid (empty body)");
            return Ok(None);
        }

        let parsed = serde_json::from_str(&text)
            .with_context(|| format!("Malformed bid response from {}", self.name))?;
        Ok(Some(parsed))
    }
}

#[async_trait]
impl DemandClient for HttpDemandClient {
    async fn request_bid(&self, request: &BidRequest) -> Result<Option<BidResponse>> {
        self.post(request).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
