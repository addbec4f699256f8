use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::program::Program;

/// Name used when the source document does not carry one
pub const DEFAULT_PLAYLIST_NAME: &str = "IPTV Playlist";

/// Free-form per-channel or per-program attributes (`tvg-*`, `Referer`, ...)
pub type Attributes = BTreeMap<String, String>;

/// Derive a stable group id from a display title.
///
/// Lowercases and replaces spaces with underscores, nothing else, so the
/// same title always maps to the same id across re-parses.
pub fn group_id(title: &str) -> String {
    title.to_lowercase().replace(' ', "_")
}

/// Single playable channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epg_id: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Channel {
    /// True if `channel_ref` names this channel by id or guide id
    pub fn matches_guide_ref(&self, channel_ref: &str) -> bool {
        self.id == channel_ref || self.epg_id.as_deref() == Some(channel_ref)
    }
}

/// Group/category information
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub title: String,
}

impl Group {
    /// Build a group whose id is derived from its title
    pub fn from_title(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: group_id(&title),
            title,
        }
    }
}

/// Normalized playlist, the output of every playlist parser.
///
/// Always replaced wholesale; nothing patches a playlist in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub name: String,
    pub channels: Vec<Channel>,
    pub groups: Vec<Group>,
    #[serde(default)]
    pub programs: Vec<Program>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epg_url: Option<String>,
}

impl Default for Playlist {
    fn default() -> Self {
        Self {
            name: DEFAULT_PLAYLIST_NAME.to_string(),
            channels: Vec::new(),
            groups: Vec::new(),
            programs: Vec::new(),
            epg_url: None,
        }
    }
}

impl Playlist {
    /// Find a channel by id
    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }
}

/// Persisted playlist header, the row the sync policy reasons about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistHeader {
    pub id: String,
    pub name: String,
    pub url: String,
    pub last_updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epg_url: Option<String>,
}

/// Header plus the playlist body stored alongside it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSnapshot {
    pub header: PlaylistHeader,
    pub playlist: Playlist,
}

/// Collects groups in first-seen order without duplicates
#[derive(Debug, Default)]
pub struct GroupSet {
    groups: Vec<Group>,
    seen: std::collections::HashSet<String>,
}

impl GroupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `title` and return its id
    pub fn insert_title(&mut self, title: &str) -> String {
        let group = Group::from_title(title);
        let id = group.id.clone();
        self.insert(group);
        id
    }

    pub fn insert(&mut self, group: Group) {
        if self.seen.insert(group.id.clone()) {
            self.groups.push(group);
        }
    }

    pub fn into_vec(self) -> Vec<Group> {
        self.groups
    }
}
