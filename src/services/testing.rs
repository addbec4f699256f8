//! Test doubles shared by the async service tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::services::fetcher::{Fetcher, FetchError, Headers};
use crate::services::sync::Clock;

/// Fetcher answering from canned routes matched by URL substring
#[derive(Default)]
pub struct StubFetcher {
    routes: Mutex<Vec<(String, Result<Vec<u8>, u16>)>>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
    delay: Option<Duration>,
    max_size_mb: Option<usize>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to URLs containing `pattern` with `body`
    pub fn route(self, pattern: &str, body: &str) -> Self {
        self.route_bytes(pattern, body.as_bytes().to_vec())
    }

    pub fn route_bytes(self, pattern: &str, body: Vec<u8>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .push((pattern.to_string(), Ok(body)));
        self
    }

    /// Respond to URLs containing `pattern` with an HTTP error
    pub fn fail(self, pattern: &str, status: u16) -> Self {
        self.routes
            .lock()
            .unwrap()
            .push((pattern.to_string(), Err(status)));
        self
    }

    /// Hold every response for `delay` so concurrent callers overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Cap inflated gzip bodies the way `HttpFetcher` does
    pub fn with_max_size_mb(mut self, max_size_mb: usize) -> Self {
        self.max_size_mb = Some(max_size_mb);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch_text(&self, url: &str, headers: Headers<'_>) -> Result<String, FetchError> {
        let bytes = self.fetch_bytes(url, headers).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn max_size_mb(&self) -> Option<usize> {
        self.max_size_mb
    }

    async fn fetch_bytes(&self, url: &str, _headers: Headers<'_>) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(url.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let routes = self.routes.lock().unwrap().clone();
        match routes.into_iter().find(|(pattern, _)| url.contains(pattern.as_str())) {
            Some((_, Ok(body))) => Ok(body),
            Some((_, Err(status))) => Err(FetchError::Http {
                status,
                message: format!("HTTP {}", status),
            }),
            None => Err(FetchError::Network(format!("no route for {}", url))),
        }
    }
}

/// Clock frozen at a fixed instant
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
