//! Network transport
//!
//! [`Fetcher`] is the narrow contract the sync layer consumes; [`HttpFetcher`]
//! is the reqwest implementation. Some publishers serve `.gz` files without a
//! `Content-Encoding` header, so bodies are sniffed for the gzip magic bytes
//! and inflated by hand when needed. Inflated output is held to the same
//! size cap as the raw body.

use std::io::Read;
use std::time::Duration;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::config::Config;

/// Gzip magic bytes
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Transport errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("payload too large: {size_mb:.1}MB (limit {limit_mb}MB)")]
    TooLarge { size_mb: f64, limit_mb: usize },

    #[error("could not decode payload: {0}")]
    Decode(String),
}

/// Extra request headers as name/value pairs
pub type Headers<'a> = &'a [(&'a str, &'a str)];

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a document as text
    async fn fetch_text(&self, url: &str, headers: Headers<'_>) -> Result<String, FetchError>;

    /// Fetch the raw body
    async fn fetch_bytes(&self, url: &str, headers: Headers<'_>) -> Result<Vec<u8>, FetchError>;

    /// Fetch a body that may be gzip-compressed and return it as text
    async fn fetch_maybe_gzip(&self, url: &str, headers: Headers<'_>) -> Result<String, FetchError> {
        let bytes = self.fetch_bytes(url, headers).await?;
        decode_body(&bytes, self.max_size_mb())
    }

    /// Payload cap in MB applied to raw and inflated bodies, if any
    fn max_size_mb(&self) -> Option<usize> {
        None
    }
}

/// True if `bytes` starts with the gzip magic number
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= GZIP_MAGIC.len() && bytes[..2] == GZIP_MAGIC
}

fn mb_to_bytes(mb: usize) -> u64 {
    (mb as u64) * 1024 * 1024
}

fn too_large(len: u64, limit_mb: usize) -> FetchError {
    FetchError::TooLarge {
        size_mb: len as f64 / 1024f64 / 1024f64,
        limit_mb,
    }
}

/// Inflate when gzip, then decode as UTF-8 (invalid sequences replaced).
/// Inflation stops one byte past `max_size_mb`.
pub fn decode_body(bytes: &[u8], max_size_mb: Option<usize>) -> Result<String, FetchError> {
    if !is_gzip(bytes) {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }

    let limit = max_size_mb.map(mb_to_bytes).unwrap_or(u64::MAX);
    let mut inflated = Vec::with_capacity(bytes.len() * 4);
    GzDecoder::new(bytes)
        .take(limit.saturating_add(1))
        .read_to_end(&mut inflated)
        .map_err(|e| FetchError::Decode(e.to_string()))?;

    if inflated.len() as u64 > limit {
        if let Some(limit_mb) = max_size_mb {
            tracing::warn!(
                "compressed" = bytes.len(),
                "limit_mb" = limit_mb,
                "Gzip payload exceeds size limit once inflated"
            );
            return Err(too_large(inflated.len() as u64, limit_mb));
        }
    }

    tracing::debug!(
        "compressed" = bytes.len(),
        "inflated" = inflated.len(),
        "Gzip payload inflated"
    );

    Ok(String::from_utf8_lossy(&inflated).into_owned())
}

/// reqwest-backed transport. No retries: a failed fetch is reported once.
pub struct HttpFetcher {
    client: Client,
    max_size_mb: usize,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout_ms: u64, max_size_mb: usize) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_millis(timeout_ms))
            .gzip(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            max_size_mb,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.user_agent,
            config.fetch_timeout_ms,
            config.max_playlist_size_mb,
        )
    }

    fn max_bytes(&self) -> u64 {
        mb_to_bytes(self.max_size_mb)
    }

    fn too_large(&self, len: u64) -> FetchError {
        too_large(len, self.max_size_mb)
    }
}

fn friendly_status(status: StatusCode) -> String {
    match status {
        StatusCode::NOT_FOUND => "Playlist not found (404). Check the URL.".to_string(),
        StatusCode::FORBIDDEN => {
            "Access denied (403). The playlist may require authentication.".to_string()
        }
        StatusCode::TOO_MANY_REQUESTS => {
            "Too many requests (429). The provider is rate limiting.".to_string()
        }
        _ => {
            let reason = status.canonical_reason().unwrap_or("Error");
            format!("HTTP {}: {}", status.as_u16(), reason)
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str, headers: Headers<'_>) -> Result<String, FetchError> {
        let bytes = self.fetch_bytes(url, headers).await?;
        decode_body(&bytes, Some(self.max_size_mb))
    }

    fn max_size_mb(&self) -> Option<usize> {
        Some(self.max_size_mb)
    }

    async fn fetch_bytes(&self, url: &str, headers: Headers<'_>) -> Result<Vec<u8>, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Network("connection timeout, server did not respond".to_string())
            } else if e.is_connect() {
                FetchError::Network("connection failed, server unreachable".to_string())
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                message: friendly_status(status),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes() {
                return Err(self.too_large(len));
            }
            tracing::debug!("size_mb" = len as f64 / 1024.0 / 1024.0, "Payload size");
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if body.len() as u64 > self.max_bytes() {
            return Err(self.too_large(body.len() as u64));
        }

        Ok(body.to_vec())
    }
}
