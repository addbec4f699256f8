//! In-memory playlist store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{PlaylistStore, StoreError};
use crate::models::{Playlist, PlaylistHeader, PlaylistSnapshot};

/// Snapshots keyed by playlist id. Every write swaps a whole snapshot under
/// the write lock.
#[derive(Clone, Default)]
pub struct MemoryStore {
    snapshots: Arc<RwLock<HashMap<String, PlaylistSnapshot>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }
}

#[async_trait]
impl PlaylistStore for MemoryStore {
    async fn get_playlist_header(&self, id: &str) -> Result<Option<PlaylistHeader>, StoreError> {
        Ok(self.snapshots.read().await.get(id).map(|s| s.header.clone()))
    }

    async fn load_playlist(&self, id: &str) -> Result<Option<PlaylistSnapshot>, StoreError> {
        Ok(self.snapshots.read().await.get(id).cloned())
    }

    async fn insert_playlist(
        &self,
        header: &PlaylistHeader,
        playlist: &Playlist,
    ) -> Result<(), StoreError> {
        let snapshot = PlaylistSnapshot {
            header: header.clone(),
            playlist: Playlist {
                name: header.name.clone(),
                ..playlist.clone()
            },
        };
        self.snapshots
            .write()
            .await
            .insert(header.id.clone(), snapshot);
        Ok(())
    }

    async fn replace_channels_and_groups(
        &self,
        id: &str,
        playlist: &Playlist,
        last_updated: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut snapshots = self.snapshots.write().await;
        let current = snapshots
            .get_mut(id)
            .ok_or_else(|| StoreError::Missing(id.to_string()))?;

        let mut header = current.header.clone();
        header.last_updated = last_updated;
        header.epg_url = playlist.epg_url.clone();

        *current = PlaylistSnapshot {
            playlist: Playlist {
                name: header.name.clone(),
                ..playlist.clone()
            },
            header,
        };
        Ok(())
    }

    async fn delete_playlist(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.snapshots.write().await.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Channel;
    use chrono::TimeZone;

    fn header(id: &str) -> PlaylistHeader {
        PlaylistHeader {
            id: id.to_string(),
            name: "Home".to_string(),
            url: "http://x/list.m3u".to_string(),
            last_updated: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            epg_url: None,
        }
    }

    fn playlist(channel_id: &str) -> Playlist {
        Playlist {
            channels: vec![Channel {
                id: channel_id.to_string(),
                name: channel_id.to_uppercase(),
                url: format!("http://x/{}.m3u8", channel_id),
                ..Default::default()
            }],
            epg_url: Some("http://x/epg.xml".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_keeps_header_name() {
        let store = MemoryStore::new();
        store.insert_playlist(&header("p1"), &playlist("c1")).await.unwrap();

        let snapshot = store.load_playlist("p1").await.unwrap().unwrap();
        assert_eq!(snapshot.playlist.name, "Home");
        assert_eq!(snapshot.playlist.channels[0].id, "c1");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_replace_swaps_contents_and_header() {
        let store = MemoryStore::new();
        store.insert_playlist(&header("p1"), &playlist("c1")).await.unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        store
            .replace_channels_and_groups("p1", &playlist("c2"), now)
            .await
            .unwrap();

        let snapshot = store.load_playlist("p1").await.unwrap().unwrap();
        assert_eq!(snapshot.header.last_updated, now);
        assert_eq!(snapshot.header.epg_url.as_deref(), Some("http://x/epg.xml"));
        assert_eq!(snapshot.playlist.channels.len(), 1);
        assert_eq!(snapshot.playlist.channels[0].id, "c2");
    }

    #[tokio::test]
    async fn test_replace_unknown_playlist() {
        let store = MemoryStore::new();
        let result = store
            .replace_channels_and_groups("nope", &playlist("c1"), Utc::now())
            .await;
        assert!(matches!(result, Err(StoreError::Missing(id)) if id == "nope"));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        store.insert_playlist(&header("p1"), &playlist("c1")).await.unwrap();

        assert!(store.delete_playlist("p1").await.unwrap());
        assert!(!store.delete_playlist("p1").await.unwrap());
        assert!(store.get_playlist_header("p1").await.unwrap().is_none());
    }
}
