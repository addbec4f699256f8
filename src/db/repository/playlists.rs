//! Playlist header repository

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::db::models::PlaylistRow;
use crate::models::PlaylistHeader;

/// Create or overwrite a playlist header
pub async fn upsert_playlist(
    conn: &mut PgConnection,
    header: &PlaylistHeader,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO playlists (id, name, url, epg_url, last_updated)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            url = EXCLUDED.url,
            epg_url = EXCLUDED.epg_url,
            last_updated = EXCLUDED.last_updated
        "#,
    )
    .bind(&header.id)
    .bind(&header.name)
    .bind(&header.url)
    .bind(&header.epg_url)
    .bind(header.last_updated)
    .execute(conn)
    .await?;

    Ok(())
}

/// Find playlist header by id
pub async fn find_by_id(
    conn: &mut PgConnection,
    id: &str,
) -> Result<Option<PlaylistRow>, sqlx::Error> {
    sqlx::query_as::<_, PlaylistRow>(
        r#"
        SELECT id, name, url, epg_url, last_updated
        FROM playlists
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Stamp a refresh. Returns false if the playlist does not exist.
pub async fn update_playlist_header(
    conn: &mut PgConnection,
    id: &str,
    last_updated: DateTime<Utc>,
    epg_url: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE playlists
        SET last_updated = $2, epg_url = $3
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(last_updated)
    .bind(epg_url)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete playlist and all related data (CASCADE)
pub async fn delete_playlist(conn: &mut PgConnection, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM playlists WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}
