//! Playlist groups repository

use sqlx::PgConnection;

use crate::db::models::GroupRow;
use crate::models::Group;

/// Bulk insert groups in playlist order
pub async fn insert_many(
    conn: &mut PgConnection,
    playlist_id: &str,
    groups: &[Group],
) -> Result<usize, sqlx::Error> {
    if groups.is_empty() {
        return Ok(0);
    }

    let positions: Vec<i32> = (0..groups.len() as i32).collect();
    let ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
    let titles: Vec<&str> = groups.iter().map(|g| g.title.as_str()).collect();

    let result = sqlx::query(
        r#"
        INSERT INTO playlist_groups (playlist_id, position, group_id, title)
        SELECT $1::text, * FROM UNNEST($2::int4[], $3::text[], $4::text[])
        "#,
    )
    .bind(playlist_id)
    .bind(positions)
    .bind(ids)
    .bind(titles)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() as usize)
}

/// Get all groups for a playlist
pub async fn get_by_playlist(
    conn: &mut PgConnection,
    playlist_id: &str,
) -> Result<Vec<GroupRow>, sqlx::Error> {
    sqlx::query_as::<_, GroupRow>(
        r#"
        SELECT group_id, title
        FROM playlist_groups
        WHERE playlist_id = $1
        ORDER BY position
        "#,
    )
    .bind(playlist_id)
    .fetch_all(conn)
    .await
}

/// Delete all groups for a playlist
pub async fn delete_by_playlist(
    conn: &mut PgConnection,
    playlist_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM playlist_groups WHERE playlist_id = $1")
        .bind(playlist_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}
