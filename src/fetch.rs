//! Asset downloads into a request workspace
//!
//! Features:
//! - Browser-like headers (some image hosts reject bare clients)
//! - Connection pooling shared across concurrent requests
//! - Bodies streamed straight to disk, never buffered whole
//! - Bounded redirects and connect/overall timeouts

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use crate::fingerprint::{random_profile, BrowserProfile};
use crate::slideshow::{AssetKind, Result, SlideshowError};

/// Source of remote assets for the orchestrator
///
/// Implementations write exactly one file at `destination`. Cleaning up a
/// partially written file is the workspace's job, not the source's.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, url: &str, destination: &Path, kind: AssetKind) -> Result<()>;
}

/// HTTP client settings for downloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub connect_timeout_secs: u64,
    /// Whole-request ceiling, body included
    pub timeout_secs: u64,
    pub max_redirects: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            timeout_secs: 120,
            max_redirects: 10,
        }
    }
}

impl DownloadConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.connect_timeout_secs == 0 || self.timeout_secs == 0 {
            return Err("download timeouts must be at least 1 second".to_string());
        }
        Ok(())
    }
}

/// reqwest-backed [`AssetSource`]
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: Client,
}

impl AssetFetcher {
    /// Fetcher with default timeouts and a random browser profile
    pub fn new() -> reqwest::Result<Self> {
        Self::with_config(&DownloadConfig::default(), &random_profile())
    }

    pub fn with_config(config: &DownloadConfig, profile: &BrowserProfile) -> reqwest::Result<Self> {
        let client = Client::builder()
            // Keep connections alive for reuse across requests
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .gzip(true)
            .deflate(true)
            .default_headers(profile.to_headers())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl AssetSource for AssetFetcher {
    #[instrument(skip_all, fields(url = %url, kind = %kind))]
    async fn fetch(&self, url: &str, destination: &Path, kind: AssetKind) -> Result<()> {
        info!("Downloading {kind} from {url}...");

        let transport = |source| SlideshowError::Transport {
            url: url.to_string(),
            kind,
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlideshowError::Download {
                url: url.to_string(),
                status: status.as_u16(),
                kind,
            });
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut body = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(transport)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("Wrote {written} bytes of {kind}");
        Ok(())
    }
}
