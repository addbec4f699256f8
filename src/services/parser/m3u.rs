//! M3U / M3U8 playlist parser
//!
//! Line-oriented state machine:
//!
//! ```text
//! #EXTM3U url-tvg="http://example.com/epg.xml"
//! #PLAYLIST:My Channels
//! #EXTINF:-1 tvg-id="globo" tvg-name="Globo HD" tvg-logo="..." group-title="TV",Globo HD
//! #EXTGRP:Brasil
//! http://example.com/globo.m3u8
//! ```
//!
//! `#EXTINF` opens a pending channel, the next non-comment line closes it.

use lazy_static::lazy_static;
use regex::Regex;

use super::scan::attributes;
use super::{ParseError, PlaylistParser};
use crate::models::{group_id, Attributes, Channel, GroupSet, Playlist};
use crate::services::sniffer::{trim_leading, PlaylistFormat};

lazy_static! {
    /// Regex to extract duration from EXTINF line
    static ref DURATION_REGEX: Regex = Regex::new(r"^\s*(-?\d+)").unwrap();
}

const HEADER: &str = "#EXTM3U";
const EXTINF: &str = "#EXTINF:";
const EXTGRP: &str = "#EXTGRP:";
const PLAYLIST: &str = "#PLAYLIST:";

/// Attributes on the `#EXTM3U` line that carry the guide URL, by priority
const GUIDE_URL_ATTRS: [&str; 2] = ["url-tvg", "x-tvg-url"];

/// Channel data gathered between `#EXTINF` and its URL line
#[derive(Debug, Default)]
struct PendingChannel {
    attributes: Attributes,
    display_name: Option<String>,
}

#[derive(Debug)]
enum State {
    Idle,
    SawExtInf(PendingChannel),
}

/// Parser for `#EXTM3U` documents
#[derive(Debug, Default, Clone, Copy)]
pub struct M3uParser;

impl PlaylistParser for M3uParser {
    fn parse(&self, content: &str) -> Result<Playlist, ParseError> {
        let content = trim_leading(content);
        if !content.starts_with(HEADER) {
            return Err(ParseError::mismatch(
                PlaylistFormat::M3u,
                "missing #EXTM3U header",
            ));
        }

        let mut playlist = Playlist::default();
        let mut groups = GroupSet::new();
        let mut state = State::Idle;
        let mut header_seen = false;
        let mut dropped = 0usize;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with(HEADER) {
                if !header_seen {
                    playlist.epg_url = guide_url(line);
                    header_seen = true;
                }
            } else if let Some(rest) = line.strip_prefix(EXTINF) {
                state = State::SawExtInf(parse_extinf(rest));
            } else if let Some(rest) = line.strip_prefix(EXTGRP) {
                if let State::SawExtInf(pending) = &mut state {
                    let title = rest.trim();
                    if !title.is_empty() {
                        pending
                            .attributes
                            .insert("group-title".to_string(), title.to_string());
                    }
                }
            } else if let Some(rest) = line.strip_prefix(PLAYLIST) {
                let name = rest.trim();
                if !name.is_empty() {
                    playlist.name = name.to_string();
                }
            } else if line.starts_with('#') {
                // Unhandled directive (#EXTVLCOPT, #KODIPROP, ...)
            } else {
                match std::mem::replace(&mut state, State::Idle) {
                    State::SawExtInf(pending) => match finalize(pending, line, &mut groups) {
                        Some(channel) => playlist.channels.push(channel),
                        None => dropped += 1,
                    },
                    // A bare URL without #EXTINF carries no name
                    State::Idle => dropped += 1,
                }
            }
        }

        if dropped > 0 {
            tracing::debug!("dropped" = dropped, "M3U entries without a usable name skipped");
        }

        playlist.groups = groups.into_vec();
        Ok(playlist)
    }

    fn format(&self) -> PlaylistFormat {
        PlaylistFormat::M3u
    }
}

/// Guide URL from the `#EXTM3U` header line
fn guide_url(header: &str) -> Option<String> {
    let attrs: Vec<(&str, &str)> = attributes(header).collect();

    GUIDE_URL_ATTRS.iter().find_map(|wanted| {
        attrs
            .iter()
            .find(|(key, value)| key == wanted && !value.is_empty())
            .map(|(_, value)| value.to_string())
    })
}

/// Parse the part of an `#EXTINF:` line after the colon.
///
/// Format: `duration key="value" ...,Display Name`
fn parse_extinf(rest: &str) -> PendingChannel {
    let (header, display_name) = match split_display_name(rest) {
        Some((header, name)) => (header, Some(name)),
        None => (rest, None),
    };

    let mut attrs = Attributes::new();

    if let Some(duration) = DURATION_REGEX.captures(header).and_then(|c| c.get(1)) {
        attrs.insert("duration".to_string(), duration.as_str().to_string());
    }

    for (key, value) in attributes(header) {
        attrs.insert(key.to_string(), value.to_string());
    }

    PendingChannel {
        attributes: attrs,
        display_name: display_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
    }
}

/// Split at the first comma outside a quoted attribute value
fn split_display_name(rest: &str) -> Option<(&str, &str)> {
    let mut in_quotes = false;

    for (idx, ch) in rest.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some((&rest[..idx], &rest[idx + 1..])),
            _ => {}
        }
    }

    None
}

fn finalize(pending: PendingChannel, url: &str, groups: &mut GroupSet) -> Option<Channel> {
    let PendingChannel {
        attributes,
        display_name,
    } = pending;

    let attr = |key: &str| {
        attributes
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let name = attr("tvg-name").or(display_name)?;
    let epg_id = attr("tvg-id");
    let id = epg_id.clone().unwrap_or_else(|| group_id(&name));
    let logo_url = attr("tvg-logo");
    let group_title = attr("group-title");
    let channel_group = group_title.as_deref().map(|title| groups.insert_title(title));

    Some(Channel {
        id,
        name,
        url: url.to_string(),
        logo_url,
        group_id: channel_group,
        group_title,
        epg_id,
        attributes,
    })
}
