//! Database repositories
//!
//! Repository pattern for database access, separating data access logic
//! from business logic. Every function takes a `PgConnection` so callers
//! can run several of them inside one transaction.

pub mod channels;
pub mod groups;
pub mod playlists;
pub mod programs;

use sqlx::PgConnection;

/// Bytes buffered before each COPY send
const COPY_CHUNK_BYTES: usize = 256 * 1024;

/// Stream pre-formatted COPY text lines into `statement`
pub(crate) async fn copy_lines<I>(
    conn: &mut PgConnection,
    statement: &str,
    lines: I,
) -> Result<u64, sqlx::Error>
where
    I: IntoIterator<Item = String>,
{
    let mut copy = conn.copy_in_raw(statement).await?;
    let mut buffer = String::with_capacity(COPY_CHUNK_BYTES);

    for line in lines {
        buffer.push_str(&line);
        if buffer.len() >= COPY_CHUNK_BYTES {
            copy.send(buffer.as_bytes()).await?;
            buffer.clear();
        }
    }

    if !buffer.is_empty() {
        copy.send(buffer.as_bytes()).await?;
    }

    copy.finish().await
}
