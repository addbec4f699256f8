//! PostgreSQL playlist store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};

use super::repository::{channels, groups, playlists, programs};
use super::{PlaylistStore, StoreError};
use crate::models::{Channel, Group, Playlist, PlaylistHeader, PlaylistSnapshot, Program};

/// Isolation for `load_playlist`: one snapshot for every SELECT
pub(crate) const SNAPSHOT_READ: &str =
    "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY";

/// sqlx-backed store. Every write is one transaction: a dropped future rolls
/// back and leaves the previous snapshot in place.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Delete then re-insert everything a playlist owns
async fn write_contents(
    conn: &mut PgConnection,
    id: &str,
    playlist: &Playlist,
) -> Result<(), sqlx::Error> {
    let removed = channels::delete_by_playlist(conn, id).await?;
    groups::delete_by_playlist(conn, id).await?;
    programs::delete_by_playlist(conn, id).await?;

    groups::insert_many(conn, id, &playlist.groups).await?;
    let written = channels::insert_many(conn, id, &playlist.channels).await?;
    let guide = programs::insert_many(conn, id, &playlist.programs).await?;

    debug!(
        "playlist_id" = id,
        "removed" = removed,
        "channels" = written,
        "programs" = guide,
        "Playlist contents written"
    );

    Ok(())
}

#[async_trait]
impl PlaylistStore for PgStore {
    async fn get_playlist_header(&self, id: &str) -> Result<Option<PlaylistHeader>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let row = playlists::find_by_id(&mut conn, id).await?;
        Ok(row.map(PlaylistHeader::from))
    }

    async fn load_playlist(&self, id: &str) -> Result<Option<PlaylistSnapshot>, StoreError> {
        // Header and contents must come from the same commit; READ COMMITTED
        // would give each SELECT its own snapshot.
        let mut tx = self.pool.begin().await?;
        sqlx::query(SNAPSHOT_READ).execute(&mut *tx).await?;

        let Some(row) = playlists::find_by_id(&mut tx, id).await? else {
            return Ok(None);
        };
        let header = PlaylistHeader::from(row);

        let group_rows = groups::get_by_playlist(&mut tx, id).await?;
        let channel_rows = channels::get_by_playlist(&mut tx, id).await?;
        let program_rows = programs::get_by_playlist(&mut tx, id).await?;
        tx.commit().await?;

        let playlist = Playlist {
            name: header.name.clone(),
            channels: channel_rows.into_iter().map(Channel::from).collect(),
            groups: group_rows.into_iter().map(Group::from).collect(),
            programs: program_rows.into_iter().map(Program::from).collect(),
            epg_url: header.epg_url.clone(),
        };

        Ok(Some(PlaylistSnapshot { header, playlist }))
    }

    async fn insert_playlist(
        &self,
        header: &PlaylistHeader,
        playlist: &Playlist,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        playlists::upsert_playlist(&mut tx, header).await?;
        write_contents(&mut tx, &header.id, playlist).await?;

        tx.commit().await?;

        info!(
            "playlist_id" = %header.id,
            "channels" = playlist.channels.len(),
            "Playlist stored"
        );
        Ok(())
    }

    async fn replace_channels_and_groups(
        &self,
        id: &str,
        playlist: &Playlist,
        last_updated: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let exists =
            playlists::update_playlist_header(&mut tx, id, last_updated, playlist.epg_url.as_deref())
                .await?;
        if !exists {
            return Err(StoreError::Missing(id.to_string()));
        }
        write_contents(&mut tx, id, playlist).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_playlist(&self, id: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let deleted = playlists::delete_playlist(&mut conn, id).await?;
        Ok(deleted > 0)
    }
}
