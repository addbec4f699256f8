//! Playlist ingestion pipeline
//!
//! fetch → sniff → parse → (optional) guide fetch → correlate. Used by the
//! sync layer for first syncs and refreshes; stateless apart from its
//! collaborators.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{Playlist, Program};
use crate::services::catalog::{detect_catalog, RemoteCatalog};
use crate::services::correlator::GuideCorrelator;
use crate::services::epg::{parse_guide, EpgError};
use crate::services::fetcher::{FetchError, Fetcher};
use crate::services::metrics::FETCH_TOTAL;
use crate::services::parser::{parse_playlist, ParseError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Turns a playlist URL into a fully parsed [`Playlist`]
pub struct PlaylistIngestor {
    fetcher: Arc<dyn Fetcher>,
    catalog: Option<RemoteCatalog>,
    sync_guides: bool,
}

impl PlaylistIngestor {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            catalog: None,
            sync_guides: true,
        }
    }

    /// Try catalog APIs before the plain document for URLs that expose one
    pub fn with_remote_catalog(mut self, enabled: bool) -> Self {
        self.catalog = enabled.then(|| RemoteCatalog::new(self.fetcher.clone()));
        self
    }

    pub fn with_guides(mut self, enabled: bool) -> Self {
        self.sync_guides = enabled;
        self
    }

    /// Fetch and parse `url`. A guide failure never fails the playlist.
    pub async fn ingest(&self, url: &str) -> Result<Playlist, IngestError> {
        let playlist = self.load(url).await?;

        let programs = match (&playlist.epg_url, self.sync_guides) {
            (Some(epg_url), true) => self.load_guide(epg_url).await,
            _ => Vec::new(),
        };

        Ok(GuideCorrelator::attach(playlist, programs))
    }

    async fn load(&self, url: &str) -> Result<Playlist, IngestError> {
        if let (Some(catalog), Some(source)) = (&self.catalog, detect_catalog(url)) {
            match catalog.load(&source, crate::models::DEFAULT_PLAYLIST_NAME).await {
                Ok(playlist) => return Ok(playlist),
                Err(e) => warn!(
                    "catalog" = source.kind(),
                    "Remote catalog failed, falling back to document fetch: {}", e
                ),
            }
        }

        FETCH_TOTAL.inc();
        let content = self.fetcher.fetch_maybe_gzip(url, &[]).await?;
        debug!("bytes" = content.len(), "Playlist document fetched");

        let playlist = parse_playlist(&content)?;
        info!(
            "channels" = playlist.channels.len(),
            "groups" = playlist.groups.len(),
            "Playlist document ingested"
        );
        Ok(playlist)
    }

    async fn load_guide(&self, epg_url: &str) -> Vec<Program> {
        FETCH_TOTAL.inc();
        let result: Result<Vec<Program>, EpgError> = match self.fetcher.fetch_maybe_gzip(epg_url, &[]).await {
            Ok(content) => parse_guide(&content),
            Err(e) => {
                warn!("Guide fetch failed for {}: {}", epg_url, e);
                return Vec::new();
            }
        };

        result.unwrap_or_else(|e| {
            warn!("Guide parse failed for {}: {}", epg_url, e);
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::StubFetcher;

    const PLAYLIST: &str = "#EXTM3U url-tvg=\"http://x/epg.xml\"\n\
        #EXTINF:-1 tvg-id=\"c1\" tvg-name=\"C1\",C1\n\
        http://x/c1.m3u8\n";

    const GUIDE: &str = r#"<?xml version="1.0"?>
<tv>
  <programme start="20230101120000 +0000" stop="20230101130000 +0000" channel="c1">
    <title>News</title>
  </programme>
  <programme start="20230101120000 +0000" stop="20230101130000 +0000" channel="elsewhere">
    <title>Orphan</title>
  </programme>
</tv>"#;

    #[tokio::test]
    async fn test_ingest_attaches_guide() {
        let fetcher = Arc::new(
            StubFetcher::new()
                .route("epg.xml", GUIDE)
                .route("list.m3u", PLAYLIST),
        );
        let ingestor = PlaylistIngestor::new(fetcher.clone());

        let playlist = ingestor.ingest("http://x/list.m3u").await.unwrap();

        assert_eq!(playlist.epg_url.as_deref(), Some("http://x/epg.xml"));
        assert_eq!(playlist.channels.len(), 1);
        assert_eq!(playlist.programs.len(), 2);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_guide_failure_keeps_playlist() {
        let fetcher = Arc::new(
            StubFetcher::new()
                .fail("epg.xml", 500)
                .route("list.m3u", PLAYLIST),
        );
        let ingestor = PlaylistIngestor::new(fetcher);

        let playlist = ingestor.ingest("http://x/list.m3u").await.unwrap();
        assert_eq!(playlist.channels[0].id, "c1");
        assert!(playlist.programs.is_empty());
    }

    #[tokio::test]
    async fn test_guides_disabled_skips_fetch() {
        let fetcher = Arc::new(StubFetcher::new().route("list.m3u", PLAYLIST));
        let ingestor = PlaylistIngestor::new(fetcher.clone()).with_guides(false);

        ingestor.ingest("http://x/list.m3u").await.unwrap();
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_oversized_gzip_playlist_is_rejected() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut body = String::from(PLAYLIST);
        body.push_str(&"#EXTVLCOPT:padding\n".repeat(200_000));
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let fetcher = Arc::new(
            StubFetcher::new()
                .route_bytes("list.m3u.gz", compressed)
                .with_max_size_mb(1),
        );
        let ingestor = PlaylistIngestor::new(fetcher);

        assert!(matches!(
            ingestor.ingest("http://x/list.m3u.gz").await,
            Err(IngestError::Fetch(FetchError::TooLarge { limit_mb: 1, .. }))
        ));
    }

    #[tokio::test]
    async fn test_unknown_document_is_parse_error() {
        let fetcher = Arc::new(StubFetcher::new().route("list", "hello world"));
        let ingestor = PlaylistIngestor::new(fetcher);

        assert!(matches!(
            ingestor.ingest("http://x/list").await,
            Err(IngestError::Parse(ParseError::UnknownFormat))
        ));
    }

    #[tokio::test]
    async fn test_catalog_failure_falls_back_to_document() {
        let url = "http://tv.example.com/get.php?username=u&password=p&type=m3u_plus";
        let fetcher = Arc::new(
            StubFetcher::new()
                .fail("player_api.php", 403)
                .route("get.php", "#EXTM3U\n#EXTINF:-1,Fallback\nhttp://x/f.ts\n"),
        );
        let ingestor = PlaylistIngestor::new(fetcher.clone()).with_remote_catalog(true);

        let playlist = ingestor.ingest(url).await.unwrap();
        assert_eq!(playlist.channels[0].name, "Fallback");
        assert_eq!(fetcher.calls(), 2);
    }
}
