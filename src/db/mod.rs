//! Playlist persistence
//!
//! [`PlaylistStore`] is the contract the sync layer consumes. Two backends:
//! - [`PgStore`]: PostgreSQL via sqlx, bulk writes with the COPY protocol
//! - [`MemoryStore`]: process-local map, for tests and `STORE=memory`
//!
//! Both apply a refresh as one unit: readers see either the previous
//! snapshot or the new one, never a half-written playlist.

pub mod memory;
pub mod models;
pub mod pool;
pub mod postgres;
pub mod repository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Playlist, PlaylistHeader, PlaylistSnapshot};

pub use memory::MemoryStore;
pub use pool::{create_pool, health_check, run_migrations};
pub use postgres::PgStore;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A write targeted a playlist that has no header row
    #[error("playlist {0} does not exist")]
    Missing(String),
}

#[async_trait]
pub trait PlaylistStore: Send + Sync {
    /// Header row only; cheap enough to call on every read
    async fn get_playlist_header(&self, id: &str) -> Result<Option<PlaylistHeader>, StoreError>;

    /// Header plus channels, groups and programmes
    async fn load_playlist(&self, id: &str) -> Result<Option<PlaylistSnapshot>, StoreError>;

    /// Create the playlist, or overwrite it wholesale if the id exists
    async fn insert_playlist(
        &self,
        header: &PlaylistHeader,
        playlist: &Playlist,
    ) -> Result<(), StoreError>;

    /// Replace channels, groups and programmes and update the header
    /// (`last_updated`, `epg_url`) as one atomic unit
    async fn replace_channels_and_groups(
        &self,
        id: &str,
        playlist: &Playlist,
        last_updated: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Returns false if nothing was stored under `id`
    async fn delete_playlist(&self, id: &str) -> Result<bool, StoreError>;
}
