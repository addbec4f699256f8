//! Guide programmes repository

use sqlx::PgConnection;

use super::copy_lines;
use crate::db::models::{program_copy_line, ProgramRow};
use crate::models::Program;

const COPY_PROGRAMS: &str = r#"
    COPY playlist_programs (playlist_id, position, program_id, channel_id, title,
                            description, start_time, end_time, categories, attributes)
    FROM STDIN WITH (FORMAT text, NULL '\N')
"#;

/// Bulk insert programmes with the COPY protocol
pub async fn insert_many(
    conn: &mut PgConnection,
    playlist_id: &str,
    programs: &[Program],
) -> Result<u64, sqlx::Error> {
    if programs.is_empty() {
        return Ok(0);
    }

    let lines: Box<dyn Iterator<Item = String> + Send + '_> = Box::new(programs
        .iter()
        .enumerate()
        .map(|(position, program)| program_copy_line(playlist_id, position, program)));

    copy_lines(conn, COPY_PROGRAMS, lines).await
}

/// Get every programme of a playlist's guide, orphans included
pub async fn get_by_playlist(
    conn: &mut PgConnection,
    playlist_id: &str,
) -> Result<Vec<ProgramRow>, sqlx::Error> {
    sqlx::query_as::<_, ProgramRow>(
        r#"
        SELECT program_id, channel_id, title, description, start_time, end_time,
               categories, attributes
        FROM playlist_programs
        WHERE playlist_id = $1
        ORDER BY position
        "#,
    )
    .bind(playlist_id)
    .fetch_all(conn)
    .await
}

/// Delete the guide for a playlist
pub async fn delete_by_playlist(
    conn: &mut PgConnection,
    playlist_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM playlist_programs WHERE playlist_id = $1")
        .bind(playlist_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}
