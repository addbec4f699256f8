//! Electronic program guide parsers
//!
//! Guides arrive as XMLTV (`<tv><programme ...>`) or as JSON in a handful of
//! shapes. Both parsers return a flat list of [`Program`] with times already
//! normalized to epoch milliseconds; entries with unusable times are dropped.

pub mod json;
pub mod time;
pub mod xmltv;

use thiserror::Error;

use crate::models::Program;
use crate::services::sniffer::{detect_epg_format, EpgFormat};

pub use json::JsonEpgParser;
pub use xmltv::XmltvParser;

/// Guide parse errors
#[derive(Debug, Error)]
pub enum EpgError {
    #[error("not a valid {format} guide: {reason}")]
    FormatMismatch { format: EpgFormat, reason: String },

    #[error("unrecognized guide format")]
    UnknownFormat,

    /// Document is not well-formed
    #[error("malformed guide document: {0}")]
    Malformed(String),

    #[error("no JSON guide shape matched: {}", .0.join("; "))]
    SchemaExhausted(Vec<String>),

    /// Only ever drops the entry it belongs to
    #[error("unparseable guide timestamp: {value}")]
    TimeParse { value: String },
}

/// Common contract for guide parsers
pub trait EpgParser: Send + Sync {
    fn parse(&self, content: &str) -> Result<Vec<Program>, EpgError>;

    fn format(&self) -> EpgFormat;
}

/// Pick the guide parser for a format tag
pub fn epg_parser_for(format: EpgFormat) -> Result<Box<dyn EpgParser>, EpgError> {
    match format {
        EpgFormat::Xmltv => Ok(Box::new(XmltvParser)),
        EpgFormat::Json => Ok(Box::new(JsonEpgParser)),
        EpgFormat::Unknown => Err(EpgError::UnknownFormat),
    }
}

/// Sniff, dispatch and parse a guide document
pub fn parse_guide(content: &str) -> Result<Vec<Program>, EpgError> {
    let format = detect_epg_format(content);
    let programs = epg_parser_for(format)?.parse(content)?;

    tracing::debug!("format" = %format, "programs" = programs.len(), "Guide parsed");

    Ok(programs)
}

/// Keep only programmes with a real time span, logging the rest
pub(crate) fn retain_valid(programs: &mut Vec<Program>) {
    let before = programs.len();
    programs.retain(|p| p.start_time < p.end_time);

    let dropped = before - programs.len();
    if dropped > 0 {
        tracing::debug!("dropped" = dropped, "Programmes with start >= stop skipped");
    }
}
