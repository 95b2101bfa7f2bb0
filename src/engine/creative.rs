//! Creative retrieval for winners that only sent a URL.
//!
//! One fetch is attempted. On failure a minimal VAST descriptor stands in
//! and the slot is flagged, but it still counts as filled.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::AuctionError;
use crate::types::{CreativeRef, WinningBid};

#[async_trait]
pub trait CreativeFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpCreativeFetcher {
    http: Client,
}

impl HttpCreativeFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("ADPOD/0.1.0 (creative)")
            .build()
            .context("Failed to build creative HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl CreativeFetcher for HttpCreativeFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Creative request to {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("Creative fetch returned {status}");
        }

        let body = resp.text().await.context("Failed to read creative body")?;
        if body.trim().is_empty() {
            anyhow::bail!("Creative body is empty");
        }
        Ok(body)
    }
}

/// Minimal stand-in when the real creative cannot be retrieved.
pub fn fallback_creative(winner: &WinningBid) -> String {
    format!(
        "<VAST version=\"4.0\"><Ad id=\"fallback-{}\"><InLine><AdSystem>adpod</AdSystem>\
         <AdTitle>{}</AdTitle></InLine></Ad></VAST>",
        escape_xml(&winner.bid.source),
        escape_xml(&winner.bid.advertiser_domain)
    )
}

/// Text and attribute escaping for values pasted into VAST markup.
fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Fill in `creative_payload` for URL-only winners.
pub async fn resolve_creative(fetcher: &dyn CreativeFetcher, winner: &mut WinningBid) {
    let url = match &winner.bid.creative {
        CreativeRef::Inline(_) => return,
        CreativeRef::Url(url) => url.clone(),
    };

    match fetcher.fetch(&url).await {
        Ok(body) => {
            debug!(source = %winner.bid.source, bytes = body.len(), "Creative fetched");
            winner.creative_payload = Some(body);
        }
        Err(e) => {
            let err = AuctionError::CreativeRetrievalFailure {
                url,
                message: format!("{e:#}"),
            };
            warn!(source = %winner.bid.source, error = %err, "Using fallback creative");
            winner.creative_payload = Some(fallback_creative(winner));
            winner.creative_fallback = true;
        }
    }
}
