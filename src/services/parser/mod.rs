//! Playlist parsers
//!
//! One parser per document format, all producing the same [`Playlist`]:
//!
//! - **M3U** (`#EXTM3U` / `#EXTINF`): line-oriented state machine
//! - **XML**: tolerant line scan over XMLTV-style `<channel>` blocks
//! - **JSON**: ordered decode attempts over the common document shapes
//! - **XSPF**: tolerant scan over `<track>` blocks plus VLC extension nodes
//!
//! Parsers are pure and synchronous. Dispatch goes through [`parser_for`],
//! keyed by the tag returned from [`detect_format`].

pub mod json;
pub mod m3u;
mod scan;
pub mod xml;
pub mod xspf;

use thiserror::Error;

use crate::models::Playlist;
use crate::services::sniffer::{detect_format, PlaylistFormat};

pub use json::JsonParser;
pub use m3u::M3uParser;
pub use xml::XmlParser;
pub use xspf::XspfParser;

/// Playlist parse errors
#[derive(Debug, Error)]
pub enum ParseError {
    /// The mandatory header/marker of the selected format is absent
    #[error("not a valid {format} document: {reason}")]
    FormatMismatch {
        format: PlaylistFormat,
        reason: String,
    },

    /// Content did not match any known format
    #[error("unrecognized playlist format")]
    UnknownFormat,

    /// Every candidate JSON shape failed; carries each attempt's error
    #[error("no JSON shape matched: {}", .0.join("; "))]
    SchemaExhausted(Vec<String>),

    /// Remote catalog could not be paged
    #[error("remote catalog error: {0}")]
    Catalog(String),
}

impl ParseError {
    pub(crate) fn mismatch(format: PlaylistFormat, reason: impl Into<String>) -> Self {
        ParseError::FormatMismatch {
            format,
            reason: reason.into(),
        }
    }
}

/// Common contract for every static-document playlist parser
pub trait PlaylistParser: Send + Sync {
    /// Parse a whole document into a fresh playlist
    fn parse(&self, content: &str) -> Result<Playlist, ParseError>;

    /// Format handled by this parser
    fn format(&self) -> PlaylistFormat;
}

/// Pick the parser for a format tag. `Unknown` is an error, never a guess.
pub fn parser_for(format: PlaylistFormat) -> Result<Box<dyn PlaylistParser>, ParseError> {
    match format {
        PlaylistFormat::M3u => Ok(Box::new(M3uParser)),
        PlaylistFormat::Xml => Ok(Box::new(XmlParser)),
        PlaylistFormat::Json => Ok(Box::new(JsonParser)),
        PlaylistFormat::Xspf => Ok(Box::new(XspfParser)),
        PlaylistFormat::Unknown => Err(ParseError::UnknownFormat),
    }
}

/// Sniff, dispatch and parse in one call
pub fn parse_playlist(content: &str) -> Result<Playlist, ParseError> {
    let format = detect_format(content);
    let parser = parser_for(format)?;
    let playlist = parser.parse(content)?;

    tracing::debug!(
        "format" = %format,
        "channels" = playlist.channels.len(),
        "groups" = playlist.groups.len(),
        "Playlist parsed"
    );

    Ok(playlist)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_for_unknown_fails() {
        assert!(matches!(
            parser_for(PlaylistFormat::Unknown),
            Err(ParseError::UnknownFormat)
        ));
    }

    #[test]
    fn test_parser_for_matches_format() {
        for format in [
            PlaylistFormat::M3u,
            PlaylistFormat::Xml,
            PlaylistFormat::Json,
            PlaylistFormat::Xspf,
        ] {
            let parser = parser_for(format).unwrap();
            assert_eq!(parser.format(), format);
        }
    }

    #[test]
    fn test_parse_playlist_dispatches_on_content() {
        let m3u = "#EXTM3U\n#EXTINF:-1 tvg-id=\"a\",A\nhttp://x/a.m3u8\n";
        assert_eq!(parse_playlist(m3u).unwrap().channels.len(), 1);

        let json = r#"[{"id":"a","name":"A","url":"http://x/a"}]"#;
        assert_eq!(parse_playlist(json).unwrap().channels[0].id, "a");

        assert!(matches!(
            parse_playlist("plain text"),
            Err(ParseError::UnknownFormat)
        ));
    }

    #[test]
    fn test_malformed_json_exhausts_schemas() {
        match parse_playlist("{not json") {
            Err(ParseError::SchemaExhausted(errors)) => assert_eq!(errors.len(), 4),
            other => panic!("expected SchemaExhausted, got {:?}", other),
        }
    }
}
