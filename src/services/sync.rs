//! Playlist sync policy
//!
//! Serves stored snapshots while they are younger than the TTL and refreshes
//! them otherwise. A failed refresh is logged and counted, then the previous
//! snapshot is served unchanged: availability wins over freshness.
//!
//! Refreshes are single-flight per playlist id. Callers that queued behind an
//! attempt reuse its outcome from the store instead of fetching again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::{PlaylistStore, StoreError};
use crate::models::{Playlist, PlaylistHeader, PlaylistSnapshot};
use crate::services::fetcher::{FetchError, Fetcher};
use crate::services::ingest::{IngestError, PlaylistIngestor};
use crate::services::metrics::{self, CACHE_HITS_TOTAL};
use crate::services::parser::ParseError;

/// Source of "now" for staleness decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Per-playlist sync state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Fresh,
    Stale,
    Refreshing,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("playlist not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<IngestError> for SyncError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Fetch(e) => SyncError::Fetch(e),
            IngestError::Parse(e) => SyncError::Parse(e),
        }
    }
}

/// Generate a playlist id from its URL
pub fn hash_url(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// One refresh gate per playlist id
#[derive(Default)]
struct Flight {
    gate: tokio::sync::Mutex<()>,
    /// Attempts finished so far, successful or not
    completed: AtomicU64,
}

/// Staleness-driven cache manager over a [`PlaylistStore`]
pub struct SyncPolicy {
    store: Arc<dyn PlaylistStore>,
    ingestor: PlaylistIngestor,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    flights: Mutex<HashMap<String, Arc<Flight>>>,
}

impl SyncPolicy {
    pub fn new(
        store: Arc<dyn PlaylistStore>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            ingestor: PlaylistIngestor::new(fetcher),
            clock,
            ttl,
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Wire up from configuration with the system clock
    pub fn from_config(
        config: &Config,
        store: Arc<dyn PlaylistStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let mut policy = Self::new(store, fetcher, Arc::new(SystemClock), config.playlist_ttl());
        policy.ingestor = policy
            .ingestor
            .with_guides(config.sync_guides)
            .with_remote_catalog(config.remote_catalog);
        policy
    }

    /// Replace the ingestion pipeline (guide sync, remote catalog)
    pub fn with_ingestor(mut self, ingestor: PlaylistIngestor) -> Self {
        self.ingestor = ingestor;
        self
    }

    fn is_fresh(&self, header: &PlaylistHeader) -> bool {
        let age = self.clock.now() - header.last_updated;
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => age <= ttl,
            Err(_) => true,
        }
    }

    fn flight(&self, id: &str) -> Arc<Flight> {
        let mut flights = self.flights.lock().unwrap_or_else(|e| e.into_inner());
        flights.entry(id.to_string()).or_default().clone()
    }

    fn existing_flight(&self, id: &str) -> Option<Arc<Flight>> {
        let flights = self.flights.lock().unwrap_or_else(|e| e.into_inner());
        flights.get(id).cloned()
    }

    /// Drop the gate of an id with nothing stored, unless another caller
    /// still holds it
    fn release_flight(&self, id: &str, flight: &Arc<Flight>) {
        let mut flights = self.flights.lock().unwrap_or_else(|e| e.into_inner());
        let idle = flights
            .get(id)
            .map(|f| Arc::ptr_eq(f, flight) && Arc::strong_count(f) == 2)
            .unwrap_or(false);
        if idle {
            flights.remove(id);
        }
    }

    async fn load_snapshot(&self, id: &str) -> Result<PlaylistSnapshot, SyncError> {
        self.store
            .load_playlist(id)
            .await?
            .ok_or_else(|| SyncError::NotFound(id.to_string()))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Stored snapshot if fresh, otherwise a refreshed one; the previous
    /// snapshot if the refresh fails.
    pub async fn get_playlist(&self, id: &str) -> Result<PlaylistSnapshot, SyncError> {
        let header = self
            .store
            .get_playlist_header(id)
            .await?
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;

        if self.is_fresh(&header) {
            CACHE_HITS_TOTAL.inc();
            debug!("playlist_id" = id, "Serving fresh snapshot");
            return self.load_snapshot(id).await;
        }

        self.refresh_single_flight(id, false).await
    }

    /// Refresh regardless of age, with the same stale fallback
    pub async fn refresh_now(&self, id: &str) -> Result<PlaylistSnapshot, SyncError> {
        self.refresh_single_flight(id, true).await
    }

    pub async fn state_of(&self, id: &str) -> Result<SyncState, SyncError> {
        let refreshing = self
            .existing_flight(id)
            .map(|flight| flight.gate.try_lock().is_err())
            .unwrap_or(false);
        if refreshing {
            return Ok(SyncState::Refreshing);
        }

        let header = self
            .store
            .get_playlist_header(id)
            .await?
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;

        Ok(if self.is_fresh(&header) {
            SyncState::Fresh
        } else {
            SyncState::Stale
        })
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// First sync of a URL. Errors propagate: there is nothing stale to serve.
    pub async fn add_playlist(
        &self,
        url: &str,
        name: Option<&str>,
    ) -> Result<PlaylistSnapshot, SyncError> {
        let id = hash_url(url);
        let flight = self.flight(&id);
        let _guard = flight.gate.lock().await;

        let playlist = self.ingestor.ingest(url).await;
        flight.completed.fetch_add(1, Ordering::SeqCst);
        let playlist = match playlist {
            Ok(playlist) => playlist,
            Err(e) => {
                self.release_flight(&id, &flight);
                return Err(e.into());
            }
        };

        let name = name
            .map(str::to_string)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| playlist.name.clone());
        let header = PlaylistHeader {
            id: id.clone(),
            name,
            url: url.to_string(),
            last_updated: self.clock.now(),
            epg_url: playlist.epg_url.clone(),
        };

        self.store.insert_playlist(&header, &playlist).await?;
        metrics::record_refresh(true);

        info!(
            "playlist_id" = %id,
            "channels" = playlist.channels.len(),
            "programs" = playlist.programs.len(),
            "Playlist added"
        );

        let playlist = Playlist {
            name: header.name.clone(),
            ..playlist
        };
        Ok(PlaylistSnapshot { header, playlist })
    }

    pub async fn remove_playlist(&self, id: &str) -> Result<bool, SyncError> {
        let deleted = self.store.delete_playlist(id).await?;
        self.flights
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);

        if deleted {
            info!("playlist_id" = id, "Playlist removed");
        }
        Ok(deleted)
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    async fn refresh_single_flight(
        &self,
        id: &str,
        force: bool,
    ) -> Result<PlaylistSnapshot, SyncError> {
        let flight = self.flight(id);
        let seen = flight.completed.load(Ordering::SeqCst);
        let _guard = flight.gate.lock().await;

        if flight.completed.load(Ordering::SeqCst) != seen {
            debug!("playlist_id" = id, "Reusing refresh finished while waiting");
            return self.load_snapshot(id).await;
        }

        let Some(header) = self.store.get_playlist_header(id).await? else {
            self.release_flight(id, &flight);
            return Err(SyncError::NotFound(id.to_string()));
        };
        if !force && self.is_fresh(&header) {
            return self.load_snapshot(id).await;
        }

        let outcome = self.refresh(header).await;
        flight.completed.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Ok(snapshot) => {
                metrics::record_refresh(true);
                info!(
                    "playlist_id" = id,
                    "channels" = snapshot.playlist.channels.len(),
                    "Playlist refreshed"
                );
                Ok(snapshot)
            }
            Err(e) => {
                metrics::record_refresh(false);
                warn!("playlist_id" = id, "Refresh failed, serving stale snapshot: {}", e);
                self.load_snapshot(id).await
            }
        }
    }

    async fn refresh(&self, mut header: PlaylistHeader) -> Result<PlaylistSnapshot, SyncError> {
        let playlist = self.ingestor.ingest(&header.url).await?;
        let now = self.clock.now();

        self.store
            .replace_channels_and_groups(&header.id, &playlist, now)
            .await?;

        header.last_updated = now;
        header.epg_url = playlist.epg_url.clone();

        let playlist = Playlist {
            name: header.name.clone(),
            ..playlist
        };
        Ok(PlaylistSnapshot { header, playlist })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::Channel;
    use crate::services::parser::parse_playlist;
    use crate::services::testing::{FixedClock, StubFetcher};
    use chrono::TimeZone;

    const URL: &str = "http://x/list.m3u";
    const PLAYLIST: &str = "#EXTM3U\n\
        #EXTINF:-1 tvg-id=\"c1\" group-title=\"News\",C1\n\
        http://x/c1.m3u8\n\
        #EXTINF:-1 tvg-id=\"c2\" group-title=\"Sport\",C2\n\
        http://x/c2.m3u8\n";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    /// Store holding one old playlist whose last sync was `age_hours` ago
    async fn seeded_store(age_hours: i64) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let header = PlaylistHeader {
            id: hash_url(URL),
            name: "Home".to_string(),
            url: URL.to_string(),
            last_updated: now() - chrono::Duration::hours(age_hours),
            epg_url: None,
        };
        let playlist = Playlist {
            channels: vec![Channel {
                id: "old".to_string(),
                name: "Old".to_string(),
                url: "http://x/old.m3u8".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        store.insert_playlist(&header, &playlist).await.unwrap();
        store
    }

    fn policy(store: Arc<MemoryStore>, fetcher: Arc<StubFetcher>) -> SyncPolicy {
        SyncPolicy::new(
            store,
            fetcher,
            Arc::new(FixedClock(now())),
            Duration::from_secs(24 * 3600),
        )
    }

    #[tokio::test]
    async fn test_fresh_playlist_skips_network() {
        let store = seeded_store(23).await;
        let fetcher = Arc::new(StubFetcher::new().route(URL, PLAYLIST));
        let policy = policy(store.clone(), fetcher.clone());

        let snapshot = policy.get_playlist(&hash_url(URL)).await.unwrap();

        assert_eq!(fetcher.calls(), 0);
        assert_eq!(Some(snapshot), store.load_playlist(&hash_url(URL)).await.unwrap());
    }

    #[tokio::test]
    async fn test_playlist_exactly_at_ttl_is_fresh() {
        let store = seeded_store(24).await;
        let fetcher = Arc::new(StubFetcher::new().route(URL, PLAYLIST));
        let policy = policy(store, fetcher.clone());

        let snapshot = policy.get_playlist(&hash_url(URL)).await.unwrap();

        assert_eq!(fetcher.calls(), 0);
        assert_eq!(snapshot.playlist.channels[0].id, "old");
        assert_eq!(policy.state_of(&hash_url(URL)).await.unwrap(), SyncState::Fresh);
    }

    #[tokio::test]
    async fn test_stale_playlist_is_refreshed() {
        let store = seeded_store(25).await;
        let fetcher = Arc::new(StubFetcher::new().route(URL, PLAYLIST));
        let policy = policy(store.clone(), fetcher.clone());

        let snapshot = policy.get_playlist(&hash_url(URL)).await.unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(snapshot.header.last_updated, now());
        assert_eq!(snapshot.header.name, "Home");
        assert_eq!(snapshot.playlist.channels, parse_playlist(PLAYLIST).unwrap().channels);
        assert_eq!(Some(snapshot), store.load_playlist(&hash_url(URL)).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_previous_snapshot() {
        let store = seeded_store(25).await;
        let before = store.load_playlist(&hash_url(URL)).await.unwrap().unwrap();
        let fetcher = Arc::new(StubFetcher::new().fail(URL, 503));
        let policy = policy(store.clone(), fetcher.clone());

        let snapshot = policy.get_playlist(&hash_url(URL)).await.unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(snapshot, before);
    }

    #[tokio::test]
    async fn test_unparseable_refresh_serves_previous_snapshot() {
        let store = seeded_store(25).await;
        let before = store.load_playlist(&hash_url(URL)).await.unwrap().unwrap();
        let fetcher = Arc::new(StubFetcher::new().route(URL, "{not json"));
        let policy = policy(store, fetcher);

        assert_eq!(policy.get_playlist(&hash_url(URL)).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_concurrent_reads_fetch_once() {
        let store = seeded_store(25).await;
        let fetcher = Arc::new(
            StubFetcher::new()
                .route(URL, PLAYLIST)
                .with_delay(Duration::from_millis(50)),
        );
        let policy = policy(store, fetcher.clone());
        let id = hash_url(URL);

        let results = futures::future::join_all((0..8).map(|_| policy.get_playlist(&id))).await;

        assert_eq!(fetcher.calls(), 1);
        for result in results {
            assert_eq!(result.unwrap().playlist.channels.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_a_failed_attempt() {
        let store = seeded_store(25).await;
        let fetcher = Arc::new(
            StubFetcher::new()
                .fail(URL, 500)
                .with_delay(Duration::from_millis(50)),
        );
        let policy = policy(store, fetcher.clone());
        let id = hash_url(URL);

        let results = futures::future::join_all((0..5).map(|_| policy.get_playlist(&id))).await;

        assert_eq!(fetcher.calls(), 1);
        assert!(results.iter().all(|r| r.as_ref().unwrap().playlist.channels[0].id == "old"));
    }

    #[tokio::test]
    async fn test_cancelled_refresh_keeps_snapshot_and_releases_gate() {
        let store = seeded_store(25).await;
        let before = store.load_playlist(&hash_url(URL)).await.unwrap().unwrap();
        let fetcher = Arc::new(
            StubFetcher::new()
                .route(URL, PLAYLIST)
                .with_delay(Duration::from_millis(100)),
        );
        let policy = policy(store.clone(), fetcher.clone());
        let id = hash_url(URL);

        let cancelled =
            tokio::time::timeout(Duration::from_millis(10), policy.get_playlist(&id)).await;

        assert!(cancelled.is_err());
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(store.load_playlist(&id).await.unwrap(), Some(before));
        assert_eq!(policy.state_of(&id).await.unwrap(), SyncState::Stale);

        let snapshot = policy.get_playlist(&id).await.unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(snapshot.header.last_updated, now());
        assert_eq!(snapshot.playlist.channels.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_ids_leave_no_gate_behind() {
        let fetcher = Arc::new(StubFetcher::new().fail(URL, 404));
        let policy = policy(Arc::new(MemoryStore::new()), fetcher);

        assert!(matches!(policy.state_of("missing").await, Err(SyncError::NotFound(_))));
        assert!(matches!(policy.refresh_now("missing").await, Err(SyncError::NotFound(_))));
        assert!(policy.add_playlist(URL, None).await.is_err());

        assert!(policy.flights.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let policy = policy(Arc::new(MemoryStore::new()), Arc::new(StubFetcher::new()));

        assert!(matches!(
            policy.get_playlist("missing").await,
            Err(SyncError::NotFound(id)) if id == "missing"
        ));
        assert!(matches!(policy.state_of("missing").await, Err(SyncError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_refresh_now_ignores_ttl() {
        let store = seeded_store(1).await;
        let fetcher = Arc::new(StubFetcher::new().route(URL, PLAYLIST));
        let policy = policy(store, fetcher.clone());

        let snapshot = policy.refresh_now(&hash_url(URL)).await.unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(snapshot.playlist.channels.len(), 2);
    }

    #[tokio::test]
    async fn test_state_of() {
        let fresh = policy(seeded_store(2).await, Arc::new(StubFetcher::new()));
        assert_eq!(fresh.state_of(&hash_url(URL)).await.unwrap(), SyncState::Fresh);

        let stale = policy(seeded_store(48).await, Arc::new(StubFetcher::new()));
        assert_eq!(stale.state_of(&hash_url(URL)).await.unwrap(), SyncState::Stale);
    }

    #[tokio::test]
    async fn test_add_playlist() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(StubFetcher::new().route(URL, PLAYLIST));
        let policy = policy(store.clone(), fetcher);

        let snapshot = policy.add_playlist(URL, Some("Living room")).await.unwrap();

        assert_eq!(snapshot.header.id, hash_url(URL));
        assert_eq!(snapshot.header.name, "Living room");
        assert_eq!(snapshot.header.last_updated, now());
        assert_eq!(snapshot.playlist.groups.len(), 2);
        assert_eq!(Some(snapshot), store.load_playlist(&hash_url(URL)).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_playlist_propagates_errors() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(StubFetcher::new().fail(URL, 404));
        let policy = policy(store.clone(), fetcher);

        assert!(matches!(
            policy.add_playlist(URL, None).await,
            Err(SyncError::Fetch(FetchError::Http { status: 404, .. }))
        ));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_remove_playlist() {
        let store = seeded_store(1).await;
        let policy = policy(store, Arc::new(StubFetcher::new()));

        assert!(policy.remove_playlist(&hash_url(URL)).await.unwrap());
        assert!(!policy.remove_playlist(&hash_url(URL)).await.unwrap());
        assert!(matches!(
            policy.get_playlist(&hash_url(URL)).await,
            Err(SyncError::NotFound(_))
        ));
    }

    #[test]
    fn test_hash_url() {
        assert_eq!(hash_url("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }
}
