use std::env;
use std::time::Duration;

/// Which `PlaylistStore` implementation backs the sync layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl StoreKind {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("memory") {
            StoreKind::Memory
        } else {
            StoreKind::Postgres
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub store: StoreKind,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,

    // Sync
    pub playlist_ttl_secs: u64,
    pub sync_guides: bool,
    pub remote_catalog: bool,

    // Transport
    pub fetch_timeout_ms: u64,
    pub max_playlist_size_mb: usize,

    // Misc
    pub user_agent: String,
}

fn flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            // Storage
            store: StoreKind::parse(&env::var("STORE").unwrap_or_else(|_| "postgres".to_string())),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/iptv_ingest".to_string()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            db_acquire_timeout_secs: env::var("DB_ACQUIRE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),

            // Sync
            playlist_ttl_secs: env::var("PLAYLIST_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .unwrap_or(86_400), // 24 hours
            sync_guides: flag("SYNC_GUIDES", true),
            remote_catalog: flag("REMOTE_CATALOG", true),

            // Transport
            fetch_timeout_ms: env::var("FETCH_TIMEOUT_MS")
                .unwrap_or_else(|_| "120000".to_string())
                .parse()
                .unwrap_or(120_000), // 2 minutes
            max_playlist_size_mb: env::var("MAX_PLAYLIST_SIZE_MB")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .unwrap_or(200),

            // Use VLC user agent to avoid IPTV server blocks
            user_agent: env::var("USER_AGENT")
                .unwrap_or_else(|_| "VLC/3.0.20 LibVLC/3.0.20".to_string()),
        }
    }

    pub fn playlist_ttl(&self) -> Duration {
        Duration::from_secs(self.playlist_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
