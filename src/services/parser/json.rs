//! Schema-tolerant JSON playlist parser
//!
//! The same logical playlist shows up in several JSON shapes. They are tried
//! in a fixed order and the first one that decodes wins:
//!
//! 1. `{"name": .., "channels": [..], "groups": [..]?, "epgUrl": ..?}`
//! 2. `{"name": .., "groups": [{"id"?, "name", "channels": [..]}]}`
//! 3. `[{channel}, ..]`
//! 4. `[{group with channels}, ..]`
//!
//! Channel fields accept the aliases publishers use in the wild
//! (`remote_data.url`, `image.url`, `group`, `epg`, `logo`).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{ParseError, PlaylistParser};
use crate::models::{group_id, Attributes, Channel, Group, GroupSet, Playlist};
use crate::services::sniffer::{trim_leading, PlaylistFormat};

// ============================================================================
// Raw document shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct UrlRef {
    url: String,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(alias = "title")]
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    remote_data: Option<UrlRef>,
    #[serde(default, rename = "logoUrl", alias = "logo")]
    logo_url: Option<String>,
    #[serde(default)]
    image: Option<UrlRef>,
    #[serde(default, rename = "groupTitle", alias = "group")]
    group_title: Option<String>,
    #[serde(default, rename = "groupId", deserialize_with = "lenient_string")]
    group_id: Option<String>,
    #[serde(default, rename = "epgId", alias = "epg", deserialize_with = "lenient_string")]
    epg_id: Option<String>,
    #[serde(default)]
    attributes: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(alias = "title")]
    name: String,
    #[serde(default)]
    channels: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ChannelsDocument {
    #[serde(default)]
    name: Option<String>,
    channels: Vec<Value>,
    #[serde(default)]
    groups: Option<Vec<Value>>,
    #[serde(default, rename = "epgUrl")]
    epg_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroupsDocument {
    #[serde(default)]
    name: Option<String>,
    groups: Vec<Value>,
    #[serde(default, rename = "epgUrl")]
    epg_url: Option<String>,
}

/// Accept ids written as strings or numbers
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ============================================================================
// Decode attempts
// ============================================================================

type Attempt = fn(&str) -> Result<Playlist, String>;

/// Shapes in priority order
const ATTEMPTS: [(&str, Attempt); 4] = [
    ("object with channels", decode_channels_object),
    ("object with groups", decode_groups_object),
    ("array of channels", decode_channel_array),
    ("array of groups", decode_group_array),
];

fn decode_channels_object(content: &str) -> Result<Playlist, String> {
    let doc: ChannelsDocument = serde_json::from_str(content).map_err(|e| e.to_string())?;

    let mut builder = Builder::new(doc.name, doc.epg_url);
    for raw in doc.channels {
        builder.push_value(raw, None);
    }
    for group in doc.groups.unwrap_or_default() {
        builder.push_group_value(group);
    }

    Ok(builder.finish())
}

fn decode_groups_object(content: &str) -> Result<Playlist, String> {
    let doc: GroupsDocument = serde_json::from_str(content).map_err(|e| e.to_string())?;

    let mut builder = Builder::new(doc.name, doc.epg_url);
    for group in doc.groups {
        builder.push_group_value(group);
    }

    Ok(builder.finish())
}

fn decode_channel_array(content: &str) -> Result<Playlist, String> {
    let raw: Vec<Value> = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let total = raw.len();

    let mut builder = Builder::new(None, None);
    for channel in raw {
        builder.push_value(channel, None);
    }

    // Group objects also carry a `name`; an array where no element has a
    // stream url is not a channel array.
    if total > 0 && builder.channels.is_empty() {
        return Err("no element carries a stream url".to_string());
    }

    Ok(builder.finish())
}

fn decode_group_array(content: &str) -> Result<Playlist, String> {
    let raw: Vec<Value> = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let total = raw.len();

    let mut builder = Builder::new(None, None);
    let mut decoded = 0;
    for group in raw {
        if builder.push_group_value(group) {
            decoded += 1;
        }
    }

    if total > 0 && decoded == 0 {
        return Err("no element is a group object".to_string());
    }

    Ok(builder.finish())
}

// ============================================================================
// Normalization
// ============================================================================

struct Builder {
    name: Option<String>,
    epg_url: Option<String>,
    channels: Vec<Channel>,
    groups: GroupSet,
    dropped: usize,
}

impl Builder {
    fn new(name: Option<String>, epg_url: Option<String>) -> Self {
        Self {
            name: name.filter(|n| !n.trim().is_empty()),
            epg_url: epg_url.filter(|u| !u.trim().is_empty()),
            channels: Vec::new(),
            groups: GroupSet::new(),
            dropped: 0,
        }
    }

    /// Decode one array element; a malformed element counts as dropped
    fn decode<T: DeserializeOwned>(&mut self, value: Value) -> Option<T> {
        match serde_json::from_value(value) {
            Ok(raw) => Some(raw),
            Err(e) => {
                tracing::debug!("error" = %e, "Malformed JSON entry skipped");
                self.dropped += 1;
                None
            }
        }
    }

    fn push_value(&mut self, value: Value, parent: Option<&Group>) {
        if let Some(raw) = self.decode::<RawChannel>(value) {
            self.push(raw, parent);
        }
    }

    /// Returns false when the element is not a group
    fn push_group_value(&mut self, value: Value) -> bool {
        match self.decode::<RawGroup>(value) {
            Some(raw) => {
                self.push_group(raw);
                true
            }
            None => false,
        }
    }

    fn push_group(&mut self, raw: RawGroup) {
        let group = Group {
            id: raw.id.unwrap_or_else(|| group_id(&raw.name)),
            title: raw.name,
        };
        self.groups.insert(group.clone());

        for channel in raw.channels {
            self.push_value(channel, Some(&group));
        }
    }

    /// `parent` overrides the channel's own group fields
    fn push(&mut self, raw: RawChannel, parent: Option<&Group>) {
        let url = raw
            .url
            .filter(|u| !u.trim().is_empty())
            .or_else(|| raw.remote_data.map(|r| r.url).filter(|u| !u.trim().is_empty()));

        let Some(url) = url else {
            self.dropped += 1;
            return;
        };

        let (group_id_value, group_title) = match parent {
            Some(group) => (Some(group.id.clone()), Some(group.title.clone())),
            None => {
                let title = raw.group_title.filter(|t| !t.trim().is_empty());
                let id = raw
                    .group_id
                    .or_else(|| title.as_deref().map(group_id));
                (id, title)
            }
        };

        if let (Some(id), Some(title)) = (&group_id_value, &group_title) {
            self.groups.insert(Group {
                id: id.clone(),
                title: title.clone(),
            });
        }

        let attributes: Attributes = raw
            .attributes
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect();

        self.channels.push(Channel {
            id: raw.id.unwrap_or_else(|| group_id(&raw.name)),
            name: raw.name,
            url: url.trim().to_string(),
            logo_url: raw
                .logo_url
                .or_else(|| raw.image.map(|i| i.url))
                .filter(|l| !l.trim().is_empty()),
            group_id: group_id_value,
            group_title,
            epg_id: raw.epg_id,
            attributes,
        });
    }

    fn finish(self) -> Playlist {
        if self.dropped > 0 {
            tracing::debug!("dropped" = self.dropped, "Malformed or url-less JSON channels skipped");
        }

        let mut playlist = Playlist {
            channels: self.channels,
            groups: self.groups.into_vec(),
            epg_url: self.epg_url,
            ..Default::default()
        };
        if let Some(name) = self.name {
            playlist.name = name;
        }
        playlist
    }
}

/// Parser for JSON playlists
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonParser;

impl PlaylistParser for JsonParser {
    fn parse(&self, content: &str) -> Result<Playlist, ParseError> {
        let content = trim_leading(content);
        if !content.starts_with('{') && !content.starts_with('[') {
            return Err(ParseError::mismatch(
                PlaylistFormat::Json,
                "missing opening brace or bracket",
            ));
        }

        let mut errors = Vec::with_capacity(ATTEMPTS.len());

        for (shape, attempt) in ATTEMPTS {
            match attempt(content) {
                Ok(playlist) => {
                    tracing::debug!("shape" = shape, "JSON playlist decoded");
                    return Ok(playlist);
                }
                Err(e) => errors.push(format!("{}: {}", shape, e)),
            }
        }

        Err(ParseError::SchemaExhausted(errors))
    }

    fn format(&self) -> PlaylistFormat {
        PlaylistFormat::Json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_with_channels() {
        let content = r#"{
            "name": "My List",
            "epgUrl": "http://x/epg.xml",
            "channels": [
                {"id": "a", "name": "A", "url": "http://x/a", "logoUrl": "http://x/a.png", "groupTitle": "News", "epgId": "a.epg"},
                {"id": 7, "name": "B", "remote_data": {"url": "http://x/b"}, "image": {"url": "http://x/b.png"}, "group": "Sports", "epg": "b.epg"}
            ]
        }"#;
        let playlist = JsonParser.parse(content).unwrap();

        assert_eq!(playlist.name, "My List");
        assert_eq!(playlist.epg_url.as_deref(), Some("http://x/epg.xml"));
        assert_eq!(playlist.channels.len(), 2);

        let b = &playlist.channels[1];
        assert_eq!(b.id, "7");
        assert_eq!(b.url, "http://x/b");
        assert_eq!(b.logo_url.as_deref(), Some("http://x/b.png"));
        assert_eq!(b.group_title.as_deref(), Some("Sports"));
        assert_eq!(b.group_id.as_deref(), Some("sports"));
        assert_eq!(b.epg_id.as_deref(), Some("b.epg"));
        assert_eq!(playlist.groups.len(), 2);
    }

    #[test]
    fn test_object_with_channels_merges_nested_groups() {
        let content = r#"{
            "channels": [{"id": "a", "name": "A", "url": "http://x/a"}],
            "groups": [{"id": "g1", "name": "Movies", "channels": [{"id": "m", "name": "M", "url": "http://x/m"}]}]
        }"#;
        let playlist = JsonParser.parse(content).unwrap();

        assert_eq!(playlist.name, "IPTV Playlist");
        assert_eq!(playlist.channels.len(), 2);
        assert_eq!(playlist.channels[1].group_id.as_deref(), Some("g1"));
        assert_eq!(playlist.channels[1].group_title.as_deref(), Some("Movies"));
        assert_eq!(playlist.groups, vec![Group { id: "g1".into(), title: "Movies".into() }]);
    }

    #[test]
    fn test_object_with_groups() {
        let content = r#"{"groups": [
            {"name": "Kids TV", "channels": [{"id": "k", "name": "K", "url": "http://x/k", "group": "ignored"}]}
        ]}"#;
        let playlist = JsonParser.parse(content).unwrap();

        let k = &playlist.channels[0];
        assert_eq!(k.group_title.as_deref(), Some("Kids TV"));
        assert_eq!(k.group_id.as_deref(), Some("kids_tv"));
        assert_eq!(playlist.groups.len(), 1);
    }

    #[test]
    fn test_bare_arrays() {
        let channels = r#"[{"id": "a", "name": "A", "url": "http://x/a"}]"#;
        assert_eq!(JsonParser.parse(channels).unwrap().channels[0].id, "a");

        let groups = r#"[{"name": "News", "channels": [{"name": "CNN", "url": "http://x/cnn"}]}]"#;
        let playlist = JsonParser.parse(groups).unwrap();
        assert_eq!(playlist.channels[0].id, "cnn");
        assert_eq!(playlist.channels[0].group_id.as_deref(), Some("news"));
    }

    #[test]
    fn test_earlier_shape_wins() {
        // Decodes both as a channel array and as a group array
        let content = r#"[{"id": "x", "name": "X", "url": "http://x/x", "channels": []}]"#;
        let playlist = JsonParser.parse(content).unwrap();

        assert_eq!(playlist.channels.len(), 1);
        assert!(playlist.groups.is_empty());
    }

    #[test]
    fn test_channels_without_url_are_dropped() {
        let content = r#"{"channels": [
            {"id": "a", "name": "A"},
            {"id": "b", "name": "B", "url": ""},
            {"id": "c", "name": "C", "url": "http://x/c"}
        ]}"#;
        let playlist = JsonParser.parse(content).unwrap();

        assert_eq!(playlist.channels.len(), 1);
        assert_eq!(playlist.channels[0].id, "c");
    }

    #[test]
    fn test_malformed_entries_do_not_fail_the_document() {
        let content = r#"{"channels": [
            {"id": "a", "name": "A", "url": "http://x/a"},
            {"id": "b", "url": "http://x/b"},
            {"id": "c", "name": "C", "url": 42}
        ]}"#;
        let playlist = JsonParser.parse(content).unwrap();

        assert_eq!(playlist.channels.len(), 1);
        assert_eq!(playlist.channels[0].id, "a");

        let groups = r#"{"groups": [
            {"name": "News", "channels": [{"name": "CNN", "url": "http://x/cnn"}, {"url": "http://x/nameless"}]},
            {"channels": []}
        ]}"#;
        let playlist = JsonParser.parse(groups).unwrap();

        assert_eq!(playlist.channels.len(), 1);
        assert_eq!(playlist.groups.len(), 1);
        assert_eq!(playlist.groups[0].title, "News");
    }

    #[test]
    fn test_array_of_scalars_is_not_a_playlist() {
        assert!(matches!(
            JsonParser.parse("[1, 2, 3]"),
            Err(ParseError::SchemaExhausted(errors)) if errors.len() == 4
        ));
    }

    #[test]
    fn test_schema_exhausted_collects_every_attempt() {
        let err = JsonParser.parse("{not json").unwrap_err();
        match err {
            ParseError::SchemaExhausted(errors) => {
                assert_eq!(errors.len(), 4);
                assert!(errors[0].starts_with("object with channels"));
                assert!(errors[3].starts_with("array of groups"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_non_json() {
        assert!(matches!(
            JsonParser.parse("#EXTM3U"),
            Err(ParseError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn test_attributes_are_stringified() {
        let content = r#"[{"id": "a", "name": "A", "url": "http://x/a", "attributes": {"Referer": "http://ref", "hd": true}}]"#;
        let playlist = JsonParser.parse(content).unwrap();
        let attrs = &playlist.channels[0].attributes;

        assert_eq!(attrs.get("Referer").map(String::as_str), Some("http://ref"));
        assert_eq!(attrs.get("hd").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_deterministic() {
        let content = r#"{"name": "L", "channels": [{"id": "a", "name": "A", "url": "http://x/a", "group": "G"}]}"#;
        assert_eq!(JsonParser.parse(content).unwrap(), JsonParser.parse(content).unwrap());
    }
}
