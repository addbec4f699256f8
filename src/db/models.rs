//! Database row types for PostgreSQL
//!
//! These types map directly to database rows and convert into the canonical
//! types in `models/`. Bulk inserts go through COPY, so the channel and
//! programme tables also have a text-format line encoder here.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::models::{Attributes, Channel, Group, PlaylistHeader, Program};

// ============================================================================
// Database Row Types
// ============================================================================

/// Playlist header row
#[derive(Debug, Clone, FromRow)]
pub struct PlaylistRow {
    pub id: String,
    pub name: String,
    pub url: String,
    pub epg_url: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl From<PlaylistRow> for PlaylistHeader {
    fn from(row: PlaylistRow) -> Self {
        PlaylistHeader {
            id: row.id,
            name: row.name,
            url: row.url,
            last_updated: row.last_updated,
            epg_url: row.epg_url,
        }
    }
}

/// Playlist group row
#[derive(Debug, Clone, FromRow)]
pub struct GroupRow {
    pub group_id: String,
    pub title: String,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Group {
            id: row.group_id,
            title: row.title,
        }
    }
}

/// Playlist channel row, keyed by (playlist_id, position)
#[derive(Debug, Clone, FromRow)]
pub struct ChannelRow {
    pub channel_id: String,
    pub name: String,
    pub url: String,
    pub logo_url: Option<String>,
    pub group_id: Option<String>,
    pub group_title: Option<String>,
    pub epg_id: Option<String>,
    pub attributes: Json<Attributes>,
}

impl From<ChannelRow> for Channel {
    fn from(row: ChannelRow) -> Self {
        Channel {
            id: row.channel_id,
            name: row.name,
            url: row.url,
            logo_url: row.logo_url,
            group_id: row.group_id,
            group_title: row.group_title,
            epg_id: row.epg_id,
            attributes: row.attributes.0,
        }
    }
}

/// Guide programme row
#[derive(Debug, Clone, FromRow)]
pub struct ProgramRow {
    pub program_id: String,
    pub channel_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_time: i64,
    pub end_time: i64,
    pub categories: Option<Json<Vec<String>>>,
    pub attributes: Json<Attributes>,
}

impl From<ProgramRow> for Program {
    fn from(row: ProgramRow) -> Self {
        Program {
            id: row.program_id,
            channel_id: row.channel_id,
            title: row.title,
            description: row.description,
            start_time: row.start_time,
            end_time: row.end_time,
            categories: row.categories.map(|c| c.0),
            attributes: row.attributes.0,
        }
    }
}

// ============================================================================
// COPY text format
// ============================================================================

const COPY_NULL: &str = "\\N";

/// Escape a value for the COPY text format
fn copy_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\t' => escaped.push_str("\\t"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn copy_opt(value: Option<&str>) -> String {
    value.map(copy_escape).unwrap_or_else(|| COPY_NULL.to_string())
}

fn copy_json<T: serde::Serialize>(value: &T) -> String {
    // Serializing a string map or string list cannot fail
    copy_escape(&serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string()))
}

/// Format a channel row for
/// `COPY playlist_channels (playlist_id, position, channel_id, name, url, logo_url,
/// group_id, group_title, epg_id, attributes)`
pub fn channel_copy_line(playlist_id: &str, position: usize, channel: &Channel) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
        copy_escape(playlist_id),
        position,
        copy_escape(&channel.id),
        copy_escape(&channel.name),
        copy_escape(&channel.url),
        copy_opt(channel.logo_url.as_deref()),
        copy_opt(channel.group_id.as_deref()),
        copy_opt(channel.group_title.as_deref()),
        copy_opt(channel.epg_id.as_deref()),
        copy_json(&channel.attributes),
    )
}

/// Format a programme row for
/// `COPY playlist_programs (playlist_id, position, program_id, channel_id, title,
/// description, start_time, end_time, categories, attributes)`
pub fn program_copy_line(playlist_id: &str, position: usize, program: &Program) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
        copy_escape(playlist_id),
        position,
        copy_escape(&program.id),
        copy_escape(&program.channel_id),
        copy_escape(&program.title),
        copy_opt(program.description.as_deref()),
        program.start_time,
        program.end_time,
        program
            .categories
            .as_ref()
            .map(copy_json)
            .unwrap_or_else(|| COPY_NULL.to_string()),
        copy_json(&program.attributes),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_escape() {
        assert_eq!(copy_escape("a\tb\nc\\d\r"), "a\\tb\\nc\\\\d\\r");
        assert_eq!(copy_opt(None), "\\N");
    }

    #[test]
    fn test_channel_copy_line() {
        let mut attributes = Attributes::new();
        attributes.insert("tvg-id".to_string(), "c1".to_string());
        let channel = Channel {
            id: "c1".to_string(),
            name: "News\tHD".to_string(),
            url: "http://x/c1.m3u8".to_string(),
            group_id: Some("news".to_string()),
            attributes,
            ..Default::default()
        };

        let line = channel_copy_line("p1", 3, &channel);
        let fields: Vec<&str> = line.trim_end_matches('\n').split('\t').collect();

        assert_eq!(fields.len(), 10);
        assert_eq!(fields[1], "3");
        assert_eq!(fields[3], "News\\tHD");
        assert_eq!(fields[5], "\\N");
        assert_eq!(fields[6], "news");
        assert_eq!(fields[9], r#"{"tvg-id":"c1"}"#);
    }

    #[test]
    fn test_program_copy_line_null_categories() {
        let program = Program {
            id: "c1_0".to_string(),
            channel_id: "c1".to_string(),
            title: "News".to_string(),
            description: None,
            start_time: 0,
            end_time: 3_600_000,
            categories: None,
            attributes: Attributes::new(),
        };

        let line = program_copy_line("p1", 0, &program);
        let fields: Vec<&str> = line.trim_end_matches('\n').split('\t').collect();
        assert_eq!(fields[7], "3600000");
        assert_eq!(fields[8], "\\N");
        assert_eq!(fields[9], "{}");
    }

    #[test]
    fn test_channel_row_conversion() {
        let row = ChannelRow {
            channel_id: "c1".to_string(),
            name: "C1".to_string(),
            url: "http://x/c1".to_string(),
            logo_url: None,
            group_id: None,
            group_title: None,
            epg_id: Some("c1.tv".to_string()),
            attributes: Json(Attributes::new()),
        };
        let channel: Channel = row.into();
        assert_eq!(channel.epg_id.as_deref(), Some("c1.tv"));
    }
}
