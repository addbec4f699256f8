//! Remote catalogs
//!
//! Some sources are better served by paging a hosted API than by parsing the
//! one-shot document behind the URL:
//!
//! - **Xtream Codes**: `get.php?username=X&password=Y` URLs expose the Player
//!   API at `player_api.php`, with categories and per-category stream lists.
//! - **iptv-org**: the public `streams.json` feed of stream records.
//!
//! This strategy is never picked by content sniffing. The sync layer asks
//! [`detect_catalog`] about the URL before fetching anything.

pub mod client;
pub mod detector;
pub mod types;

use std::sync::Arc;

use tracing::{info, warn};

use crate::models::{group_id, Attributes, Channel, Group, GroupSet, Playlist};
use crate::services::fetcher::Fetcher;
use crate::services::parser::ParseError;

pub use client::{CatalogError, XtreamClient};
pub use detector::{detect_catalog, extract_credentials, CatalogSource};
pub use types::{IptvOrgStream, XtreamCredentials};

/// Loads playlists from catalog APIs through the shared transport
pub struct RemoteCatalog {
    fetcher: Arc<dyn Fetcher>,
}

impl RemoteCatalog {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Page through `source` and build a playlist named `name`
    pub async fn load(&self, source: &CatalogSource, name: &str) -> Result<Playlist, ParseError> {
        let result = match source {
            CatalogSource::Xtream(creds) => self.load_xtream(creds).await,
            CatalogSource::IptvOrg { url } => self.load_iptv_org(url).await,
        };

        let mut playlist = result.map_err(|e| ParseError::Catalog(e.to_string()))?;
        playlist.name = name.to_string();

        info!(
            "catalog" = source.kind(),
            "channels" = playlist.channels.len(),
            "groups" = playlist.groups.len(),
            "Remote catalog loaded"
        );

        Ok(playlist)
    }

    async fn load_xtream(&self, creds: &XtreamCredentials) -> Result<Playlist, CatalogError> {
        let client = XtreamClient::new(self.fetcher.clone(), creds);

        let auth = client.authenticate().await?;
        info!(
            "Xtream account {} active, expires {:?}",
            auth.user_info.username, auth.user_info.exp_date
        );

        let categories = match client.get_live_categories().await {
            Err(CatalogError::EmptyResponse) => Vec::new(),
            other => other?,
        };

        let mut groups = GroupSet::new();
        let mut channels = Vec::new();

        for category in categories {
            let Some(category_id) = category.category_id.filter(|id| !id.is_empty()) else {
                continue;
            };
            let group = Group {
                id: category_id.clone(),
                title: category.category_name,
            };

            let streams = client.get_live_streams_by_category(&category_id).await?;
            if streams.is_empty() {
                continue;
            }
            groups.insert(group.clone());

            for stream in streams {
                let Some(stream_id) = stream.stream_id else {
                    continue;
                };

                let mut attributes = Attributes::new();
                if let Some(kind) = stream.stream_type.filter(|k| !k.is_empty()) {
                    attributes.insert("stream_type".to_string(), kind);
                }
                if let Some(archive) = stream.tv_archive.filter(|a| *a > 0) {
                    attributes.insert("tv_archive".to_string(), archive.to_string());
                }

                channels.push(Channel {
                    id: stream_id.to_string(),
                    name: stream.name,
                    url: creds.live_url(stream_id),
                    logo_url: stream.stream_icon.filter(|i| !i.is_empty()),
                    group_id: Some(group.id.clone()),
                    group_title: Some(group.title.clone()),
                    epg_id: stream.epg_channel_id.filter(|e| !e.is_empty()),
                    attributes,
                });
            }
        }

        Ok(Playlist {
            channels,
            groups: groups.into_vec(),
            epg_url: Some(creds.epg_url()),
            ..Default::default()
        })
    }

    async fn load_iptv_org(&self, url: &str) -> Result<Playlist, CatalogError> {
        let text = self.fetcher.fetch_maybe_gzip(url, &[]).await?;
        let records: Vec<IptvOrgStream> =
            serde_json::from_str(&text).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let mut groups = GroupSet::new();
        let mut channels = Vec::with_capacity(records.len());
        let mut skipped = 0usize;

        for record in records {
            let channel_ref = record.channel.filter(|c| !c.is_empty());
            let feed = record.feed.filter(|f| !f.is_empty());

            let Some(name) = record
                .title
                .filter(|t| !t.trim().is_empty())
                .or_else(|| channel_ref.clone())
            else {
                skipped += 1;
                continue;
            };
            if record.url.trim().is_empty() {
                skipped += 1;
                continue;
            }

            let id = match (&channel_ref, &feed) {
                (Some(channel), Some(feed)) => format!("{}@{}", channel, feed),
                (Some(channel), None) => channel.clone(),
                (None, _) => group_id(&name),
            };

            let mut attributes = Attributes::new();
            if let Some(referrer) = record.referrer.filter(|r| !r.is_empty()) {
                attributes.insert("Referer".to_string(), referrer);
            }
            if let Some(agent) = record.user_agent.filter(|a| !a.is_empty()) {
                attributes.insert("User-Agent".to_string(), agent);
            }
            if let Some(quality) = record.quality.filter(|q| !q.is_empty()) {
                attributes.insert("quality".to_string(), quality);
            }

            let channel_group = feed.as_deref().map(|f| groups.insert_title(f));

            channels.push(Channel {
                id,
                name,
                url: record.url.trim().to_string(),
                logo_url: None,
                group_id: channel_group,
                group_title: feed,
                epg_id: channel_ref,
                attributes,
            });
        }

        if skipped > 0 {
            warn!("skipped" = skipped, "iptv-org records without a name or url skipped");
        }

        Ok(Playlist {
            channels,
            groups: groups.into_vec(),
            ..Default::default()
        })
    }
}
