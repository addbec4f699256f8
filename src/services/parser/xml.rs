//! Ad-hoc XMLTV-style channel list parser
//!
//! Publishers ship channel lists that borrow XMLTV's `<channel>` element and
//! bolt on `<url>` and `<group>` children. These documents are frequently not
//! well-formed, so this is a tolerant line scan rather than a real XML parse:
//!
//! ```text
//! <tv>
//!   <title>My List</title>
//!   <channel id="bbc1.uk">
//!     <display-name>BBC One</display-name>
//!     <icon src="http://x/bbc1.png"/>
//!     <group>UK</group>
//!     <url>http://x/bbc1.m3u8</url>
//!   </channel>
//! </tv>
//! ```

use super::scan::{attr_value, find_open_tag, non_empty, tag_attr, tag_text};
use super::{ParseError, PlaylistParser};
use crate::models::{Channel, GroupSet, Playlist};
use crate::services::sniffer::{trim_leading, PlaylistFormat};

/// Fields collected for the channel currently open
#[derive(Debug, Default)]
struct ChannelAccumulator {
    id: String,
    name: String,
    url: String,
    logo_url: Option<String>,
    group_title: Option<String>,
}

impl ChannelAccumulator {
    fn absorb(&mut self, line: &str) {
        if let Some(name) = tag_text(line, "display-name") {
            self.name = name;
        }
        if let Some(src) = non_empty(tag_attr(line, "icon", "src")) {
            self.logo_url = Some(src);
        }
        if let Some(group) = tag_text(line, "group") {
            self.group_title = Some(group);
        }
        if let Some(url) = tag_text(line, "url") {
            self.url = url;
        }
    }

    /// Emit only when id, name and url are all present
    fn finish(self, groups: &mut GroupSet) -> Option<Channel> {
        if self.id.is_empty() || self.name.is_empty() || self.url.is_empty() {
            return None;
        }

        let group_id = self.group_title.as_deref().map(|t| groups.insert_title(t));

        Some(Channel {
            epg_id: Some(self.id.clone()),
            id: self.id,
            name: self.name,
            url: self.url,
            logo_url: self.logo_url,
            group_id,
            group_title: self.group_title,
            attributes: Default::default(),
        })
    }
}

#[derive(Debug)]
enum State {
    Outside,
    InChannel(ChannelAccumulator),
}

/// Parser for XMLTV-style channel lists
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlParser;

impl PlaylistParser for XmlParser {
    fn parse(&self, content: &str) -> Result<Playlist, ParseError> {
        let content = trim_leading(content);
        if !content.starts_with("<?xml") && !content.starts_with("<tv") {
            return Err(ParseError::mismatch(
                PlaylistFormat::Xml,
                "missing XML declaration or <tv> root element",
            ));
        }

        let mut playlist = Playlist::default();
        let mut groups = GroupSet::new();
        let mut state = State::Outside;
        let mut named = false;
        let mut dropped = 0usize;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if find_open_tag(line, "channel", 0) == Some(0) {
                let mut acc = ChannelAccumulator {
                    id: attr_value(line, "id").unwrap_or_default().trim().to_string(),
                    ..Default::default()
                };
                // Remainder of a channel written on a single line
                acc.absorb(line);
                state = State::InChannel(acc);
            } else if let State::InChannel(acc) = &mut state {
                acc.absorb(line);
            } else if !named {
                if let Some(title) = tag_text(line, "title") {
                    playlist.name = title;
                    named = true;
                }
            }

            if line.contains("</channel>") {
                if let State::InChannel(acc) = std::mem::replace(&mut state, State::Outside) {
                    match acc.finish(&mut groups) {
                        Some(channel) => playlist.channels.push(channel),
                        None => dropped += 1,
                    }
                }
            }
        }

        if dropped > 0 {
            tracing::debug!("dropped" = dropped, "XML channels missing id, name or url skipped");
        }

        playlist.groups = groups.into_vec();
        Ok(playlist)
    }

    fn format(&self) -> PlaylistFormat {
        PlaylistFormat::Xml
    }
}
