//! Remote catalog URL detection
//!
//! Decides from a playlist URL alone whether a hosted catalog API can serve
//! it. Nothing here touches the network.

use std::collections::HashMap;

use tracing::debug;
use url::Url;

use super::types::XtreamCredentials;

/// Catalog APIs the ingestor knows how to page through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    /// Xtream Codes Player API behind a `get.php` URL
    Xtream(XtreamCredentials),
    /// iptv-org `streams.json` feed
    IptvOrg { url: String },
}

impl CatalogSource {
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogSource::Xtream(_) => "xtream",
            CatalogSource::IptvOrg { .. } => "iptv-org",
        }
    }
}

/// Extract Xtream credentials from an M3U URL
///
/// Supported URL patterns:
/// - `http://server:port/get.php?username=X&password=Y&...`
/// - `http://server:port/get.php?username=X&password=Y&type=m3u_plus&output=ts`
pub fn extract_credentials(m3u_url: &str) -> Option<XtreamCredentials> {
    let parsed = match Url::parse(m3u_url) {
        Ok(url) => url,
        Err(e) => {
            debug!("Failed to parse URL: {}", e);
            return None;
        }
    };

    let path = parsed.path().to_lowercase();
    if !path.ends_with("/get.php") {
        return None;
    }

    let params: HashMap<_, _> = parsed.query_pairs().collect();
    let username = params.get("username")?.to_string();
    let password = params.get("password")?.to_string();

    if username.is_empty() || password.is_empty() {
        debug!("Empty username or password in URL");
        return None;
    }

    let host = parsed.host_str()?;
    let port_suffix = parsed
        .port()
        .map(|p| format!(":{}", p))
        .unwrap_or_default();
    let server = format!("{}://{}{}", parsed.scheme(), host, port_suffix);

    debug!("Extracted Xtream credentials: server={}, username={}", server, username);

    Some(XtreamCredentials {
        server,
        username,
        password,
    })
}

/// Detect a catalog API behind `url`
pub fn detect_catalog(url: &str) -> Option<CatalogSource> {
    if let Some(creds) = extract_credentials(url) {
        return Some(CatalogSource::Xtream(creds));
    }

    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    if host.contains("iptv-org") && parsed.path().ends_with("/streams.json") {
        return Some(CatalogSource::IptvOrg {
            url: url.to_string(),
        });
    }

    None
}
