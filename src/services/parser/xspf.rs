//! XSPF playlist parser with VLC extension support
//!
//! ```text
//! <playlist xmlns="http://xspf.org/ns/0/" xmlns:vlc="http://www.videolan.org/vlc/playlist/ns/0/">
//!   <title>My List</title>
//!   <trackList>
//!     <track>
//!       <title>BBC One</title>
//!       <location>http://x/bbc1.m3u8</location>
//!       <image>http://x/bbc1.png</image>
//!       <extension application="http://www.videolan.org/vlc/playlist/0">
//!         <vlc:id>0</vlc:id>
//!       </extension>
//!     </track>
//!   </trackList>
//!   <extension application="http://www.videolan.org/vlc/playlist/0">
//!     <vlc:node title="UK">
//!       <vlc:item tid="0"/>
//!     </vlc:node>
//!   </extension>
//! </playlist>
//! ```
//!
//! Every `<vlc:node>` becomes a group. A track joins the innermost node whose
//! `<vlc:item tid>` names its `vlc:id` (or, lacking one, its position in the
//! track list). Tracks no node references stay ungrouped.

use std::collections::HashMap;

use super::scan::{attr_value, find_open_tag, non_empty, tag_text};
use super::{ParseError, PlaylistParser};
use crate::models::{group_id, Channel, Group, GroupSet, Playlist};
use crate::services::sniffer::{trim_leading, PlaylistFormat};

/// Fields of one `<track>` block
#[derive(Debug)]
struct Track {
    /// Key `vlc:item tid` references resolve against
    tid: String,
    channel: Channel,
}

/// Parser for XSPF documents
#[derive(Debug, Default, Clone, Copy)]
pub struct XspfParser;

impl PlaylistParser for XspfParser {
    fn parse(&self, content: &str) -> Result<Playlist, ParseError> {
        let content = trim_leading(content);
        if !content.starts_with("<?xml") && !content.contains("<playlist") {
            return Err(ParseError::mismatch(
                PlaylistFormat::Xspf,
                "missing XML declaration or <playlist> element",
            ));
        }

        let mut playlist = Playlist::default();

        let head_end = find_open_tag(content, "trackList", 0)
            .or_else(|| find_open_tag(content, "track", 0))
            .unwrap_or(content.len());
        if let Some(title) = tag_text(&content[..head_end], "title") {
            playlist.name = title;
        }

        let tracks = scan_tracks(content);
        let (nodes, membership) = scan_nodes(content);

        let mut groups = GroupSet::new();
        for node in nodes {
            groups.insert(node);
        }

        playlist.channels = tracks
            .into_iter()
            .map(|track| {
                let mut channel = track.channel;
                if let Some(group) = membership.get(&track.tid) {
                    channel.group_id = Some(group.id.clone());
                    channel.group_title = Some(group.title.clone());
                }
                channel
            })
            .collect();
        playlist.groups = groups.into_vec();

        Ok(playlist)
    }

    fn format(&self) -> PlaylistFormat {
        PlaylistFormat::Xspf
    }
}

fn scan_tracks(content: &str) -> Vec<Track> {
    let mut tracks = Vec::new();
    let mut cursor = 0;
    let mut position = 0usize;
    let mut dropped = 0usize;

    while let Some(start) = find_open_tag(content, "track", cursor) {
        let Some(rel_end) = content[start..].find("</track>") else {
            break;
        };
        let end = start + rel_end + "</track>".len();
        let block = &content[start..end];
        cursor = end;

        let vlc_id = tag_text(block, "vlc:id");
        let tid = vlc_id.clone().unwrap_or_else(|| position.to_string());
        position += 1;

        let (Some(title), Some(location)) = (tag_text(block, "title"), tag_text(block, "location"))
        else {
            dropped += 1;
            continue;
        };

        let id = vlc_id.unwrap_or_else(|| group_id(&title));
        tracks.push(Track {
            tid,
            channel: Channel {
                epg_id: Some(id.clone()),
                id,
                name: title,
                url: location,
                logo_url: non_empty(tag_text(block, "image")),
                ..Default::default()
            },
        });
    }

    if dropped > 0 {
        tracing::debug!("dropped" = dropped, "XSPF tracks missing title or location skipped");
    }

    tracks
}

/// Collect `<vlc:node>` groups in document order and map each referenced
/// `tid` to its innermost enclosing node.
fn scan_nodes(content: &str) -> (Vec<Group>, HashMap<String, Group>) {
    let mut nodes = Vec::new();
    let mut membership = HashMap::new();
    let mut stack: Vec<Option<Group>> = Vec::new();
    let mut cursor = 0;

    while let Some(rel) = content[cursor..].find("<") {
        let start = cursor + rel;
        let rest = &content[start..];
        let tag_end = match rest.find('>') {
            Some(idx) => start + idx + 1,
            None => break,
        };
        let tag = &content[start..tag_end];
        cursor = tag_end;

        if tag.starts_with("</vlc:node") {
            stack.pop();
        } else if find_open_tag(tag, "vlc:node", 0) == Some(0) {
            let group = non_empty(attr_value(tag, "title")).map(Group::from_title);
            if let Some(group) = &group {
                nodes.push(group.clone());
            }
            if !tag.ends_with("/>") {
                stack.push(group);
            }
        } else if find_open_tag(tag, "vlc:item", 0) == Some(0) {
            let innermost = stack.iter().rev().find_map(|g| g.as_ref());
            if let (Some(tid), Some(group)) = (attr_value(tag, "tid"), innermost) {
                membership.entry(tid).or_insert_with(|| group.clone());
            }
        }
    }

    (nodes, membership)
}
