//! Remote catalog API types
//!
//! Xtream Codes Player API v2 responses and iptv-org stream records.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Extracted credentials from an Xtream `get.php` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XtreamCredentials {
    /// Server base URL (e.g., "http://example.com:8080")
    pub server: String,
    pub username: String,
    pub password: String,
}

impl XtreamCredentials {
    /// Build the player_api.php base URL
    pub fn api_url(&self) -> String {
        format!(
            "{}/player_api.php?username={}&password={}",
            self.server,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password)
        )
    }

    /// Build playback URL for live streams
    pub fn live_url(&self, stream_id: i64) -> String {
        format!(
            "{}/live/{}/{}/{}.ts",
            self.server,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password),
            stream_id
        )
    }

    /// Build EPG XML URL
    pub fn epg_url(&self) -> String {
        format!(
            "{}/xmltv.php?username={}&password={}",
            self.server,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password)
        )
    }
}

/// Accept values the API sends as either strings or numbers
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn number_or_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// ============================================================================
// Authentication Response Types
// ============================================================================

/// Main authentication response from player_api.php (no action)
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamAuthResponse {
    pub user_info: XtreamUserInfo,
    #[serde(default)]
    pub server_info: Option<XtreamServerInfo>,
}

/// User account information
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamUserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub exp_date: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub max_connections: Option<String>,
}

impl XtreamUserInfo {
    /// Check if account is active
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

/// Server information
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamServerInfo {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

// ============================================================================
// Category Types
// ============================================================================

/// Live stream category
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamCategory {
    #[serde(deserialize_with = "string_or_number")]
    pub category_id: Option<String>,
    pub category_name: String,
}

// ============================================================================
// Live Stream Types
// ============================================================================

/// Live stream (channel) information
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamLiveStream {
    pub name: String,
    #[serde(default)]
    pub stream_type: Option<String>,
    #[serde(deserialize_with = "number_or_string")]
    pub stream_id: Option<i64>,
    #[serde(default)]
    pub stream_icon: Option<String>,
    #[serde(default)]
    pub epg_channel_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub tv_archive: Option<i64>,
}

// ============================================================================
// iptv-org
// ============================================================================

/// One record of the iptv-org `streams.json` feed
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IptvOrgStream {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub feed: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}
