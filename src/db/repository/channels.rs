//! Playlist channels repository

use sqlx::PgConnection;

use super::copy_lines;
use crate::db::models::{channel_copy_line, ChannelRow};
use crate::models::Channel;

const COPY_CHANNELS: &str = r#"
    COPY playlist_channels (playlist_id, position, channel_id, name, url, logo_url,
                            group_id, group_title, epg_id, attributes)
    FROM STDIN WITH (FORMAT text, NULL '\N')
"#;

/// Bulk insert channels with the COPY protocol, keeping playlist order
pub async fn insert_many(
    conn: &mut PgConnection,
    playlist_id: &str,
    channels: &[Channel],
) -> Result<u64, sqlx::Error> {
    if channels.is_empty() {
        return Ok(0);
    }

    let lines: Box<dyn Iterator<Item = String> + Send + '_> = Box::new(channels
        .iter()
        .enumerate()
        .map(|(position, channel)| channel_copy_line(playlist_id, position, channel)));

    copy_lines(conn, COPY_CHANNELS, lines).await
}

/// Get all channels for a playlist in their original order
pub async fn get_by_playlist(
    conn: &mut PgConnection,
    playlist_id: &str,
) -> Result<Vec<ChannelRow>, sqlx::Error> {
    sqlx::query_as::<_, ChannelRow>(
        r#"
        SELECT channel_id, name, url, logo_url, group_id, group_title, epg_id, attributes
        FROM playlist_channels
        WHERE playlist_id = $1
        ORDER BY position
        "#,
    )
    .bind(playlist_id)
    .fetch_all(conn)
    .await
}

/// Delete all channels for a playlist
pub async fn delete_by_playlist(
    conn: &mut PgConnection,
    playlist_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM playlist_channels WHERE playlist_id = $1")
        .bind(playlist_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}
