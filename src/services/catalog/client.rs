//! Xtream Codes API Client
//!
//! Player API v2 client running over the injected [`Fetcher`], so it shares
//! the transport (timeouts, size limits, user agent) with document fetches.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error};

use super::types::*;
use crate::services::fetcher::{FetchError, Fetcher};

/// Catalog API errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("parse error: {0}")]
    Parse(String),

    /// Some endpoints return empty bodies for no results
    #[error("empty response")]
    EmptyResponse,

    #[error("account not active, status: {0}")]
    Inactive(String),
}

/// Xtream API Client
pub struct XtreamClient {
    fetcher: Arc<dyn Fetcher>,
    base_url: String,
}

impl XtreamClient {
    pub fn new(fetcher: Arc<dyn Fetcher>, creds: &XtreamCredentials) -> Self {
        Self {
            fetcher,
            base_url: creds.api_url(),
        }
    }

    /// Make a GET request with optional action parameter
    async fn get<T: DeserializeOwned>(&self, action: &str) -> Result<T, CatalogError> {
        let url = if action.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}&action={}", self.base_url, action)
        };

        debug!("Xtream API request: {}", action);

        let text = self.fetcher.fetch_text(&url, &[]).await?;
        let text = text.trim();

        if text.is_empty() || text == "[]" || text == "null" {
            return Err(CatalogError::EmptyResponse);
        }

        // Some servers return HTML error pages instead of JSON
        if text.starts_with('<') {
            return Err(CatalogError::Parse(
                "server returned HTML instead of JSON, likely invalid credentials".to_string(),
            ));
        }

        serde_json::from_str(text).map_err(|e| {
            error!("Failed to parse Xtream response for action '{}': {}", action, e);
            debug!("Response text: {}", text.chars().take(500).collect::<String>());
            CatalogError::Parse(e.to_string())
        })
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Get authentication info and require an active account
    pub async fn authenticate(&self) -> Result<XtreamAuthResponse, CatalogError> {
        let auth: XtreamAuthResponse = self.get("").await?;
        if !auth.user_info.is_active() {
            return Err(CatalogError::Inactive(auth.user_info.status.clone()));
        }
        Ok(auth)
    }

    // ========================================================================
    // Live
    // ========================================================================

    /// Get live stream categories
    pub async fn get_live_categories(&self) -> Result<Vec<XtreamCategory>, CatalogError> {
        self.get("get_live_categories").await
    }

    /// Get live streams by category. An empty category yields an empty list.
    pub async fn get_live_streams_by_category(
        &self,
        category_id: &str,
    ) -> Result<Vec<XtreamLiveStream>, CatalogError> {
        let action = format!(
            "get_live_streams&category_id={}",
            urlencoding::encode(category_id)
        );
        match self.get(&action).await {
            Err(CatalogError::EmptyResponse) => Ok(Vec::new()),
            other => other,
        }
    }
}
