//! JSON guide parser
//!
//! Same ordered-fallback approach as the JSON playlist parser. Shapes, in
//! priority order:
//!
//! 1. `{"programs": [..]}` (or `"programmes"`)
//! 2. `{"channels": [{"id": .., "programs": [..]}]}`
//! 3. `[{program}, ..]`
//! 4. `[{"id": .., "programs": [..]}, ..]`

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::time::parse_json_time;
use super::{retain_valid, EpgError, EpgParser};
use crate::models::{Attributes, Program};
use crate::services::sniffer::{trim_leading, EpgFormat};

#[derive(Debug, Deserialize)]
struct RawProgram {
    #[serde(default, rename = "channelId", alias = "channel", deserialize_with = "lenient_string")]
    channel_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "desc")]
    description: Option<String>,
    #[serde(default, alias = "startTime")]
    start: Option<Value>,
    #[serde(default, alias = "stop", alias = "endTime")]
    end: Option<Value>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    categories: Option<Vec<String>>,
    #[serde(default)]
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawGuideChannel {
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(alias = "programmes")]
    programs: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ProgramsDocument {
    #[serde(alias = "programmes")]
    programs: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ChannelsDocument {
    channels: Vec<Value>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

type Attempt = fn(&str) -> Result<Vec<Program>, String>;

const ATTEMPTS: [(&str, Attempt); 4] = [
    ("object with programs", decode_programs_object),
    ("object with channels", decode_channels_object),
    ("array of programs", decode_program_array),
    ("array of channels", decode_channel_array),
];

fn decode_programs_object(content: &str) -> Result<Vec<Program>, String> {
    let doc: ProgramsDocument = serde_json::from_str(content).map_err(|e| e.to_string())?;
    Ok(normalize(doc.programs.into_iter().map(|p| (p, None))))
}

fn decode_channels_object(content: &str) -> Result<Vec<Program>, String> {
    let doc: ChannelsDocument = serde_json::from_str(content).map_err(|e| e.to_string())?;
    Ok(flatten_channels(decode_each(doc.channels)))
}

fn has_nested_programs(value: &Value) -> bool {
    value.get("programs").is_some() || value.get("programmes").is_some()
}

fn decode_program_array(content: &str) -> Result<Vec<Program>, String> {
    let raw: Vec<Value> = serde_json::from_str(content).map_err(|e| e.to_string())?;
    if raw.iter().any(has_nested_programs) {
        return Err("elements carry nested programs".to_string());
    }
    if !raw.is_empty() && !raw.iter().any(Value::is_object) {
        return Err("no element is a programme object".to_string());
    }
    Ok(normalize(raw.into_iter().map(|p| (p, None))))
}

fn decode_channel_array(content: &str) -> Result<Vec<Program>, String> {
    let raw: Vec<Value> = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let total = raw.len();
    let channels: Vec<RawGuideChannel> = decode_each(raw);
    if total > 0 && channels.is_empty() {
        return Err("no element is a channel object".to_string());
    }
    Ok(flatten_channels(channels))
}

/// Decode array elements one by one, dropping the malformed ones
fn decode_each<T: DeserializeOwned>(values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(raw) => Some(raw),
            Err(e) => {
                tracing::debug!("error" = %e, "Malformed guide channel skipped");
                None
            }
        })
        .collect()
}

fn flatten_channels(channels: Vec<RawGuideChannel>) -> Vec<Program> {
    normalize(channels.into_iter().flat_map(|channel| {
        let id = channel.id;
        channel
            .programs
            .into_iter()
            .map(move |p| (p, id.clone()))
    }))
}

/// Map raw entries to programs; `inherited` is the enclosing channel id
fn normalize(raw: impl Iterator<Item = (Value, Option<String>)>) -> Vec<Program> {
    let mut programs = Vec::new();
    let mut skipped = 0usize;

    for (value, inherited) in raw {
        let entry: RawProgram = match serde_json::from_value(value) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("error" = %e, "Malformed guide entry dropped");
                skipped += 1;
                continue;
            }
        };
        match to_program(entry, inherited) {
            Ok(Some(program)) => programs.push(program),
            Ok(None) => skipped += 1,
            Err(e) => {
                tracing::debug!("error" = %e, "Guide entry dropped");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        tracing::debug!("dropped" = skipped, "JSON guide entries skipped");
    }

    retain_valid(&mut programs);
    programs
}

fn to_program(raw: RawProgram, inherited: Option<String>) -> Result<Option<Program>, EpgError> {
    let Some(channel_id) = raw.channel_id.or(inherited) else {
        return Ok(None);
    };
    let Some(title) = raw.title.filter(|t| !t.trim().is_empty()) else {
        return Ok(None);
    };

    let start_time = parse_json_time(raw.start.as_ref().unwrap_or(&Value::Null))?;
    let end_time = parse_json_time(raw.end.as_ref().unwrap_or(&Value::Null))?;

    let categories = raw
        .category
        .filter(|c| !c.is_empty())
        .or_else(|| raw.categories.and_then(|c| c.into_iter().find(|c| !c.is_empty())))
        .map(|c| vec![c]);

    let mut attributes = Attributes::new();
    if let Some(icon) = raw.icon.filter(|i| !i.is_empty()) {
        attributes.insert("icon".to_string(), icon);
    }

    Ok(Some(Program {
        id: Program::make_id(&channel_id, start_time),
        channel_id,
        title,
        description: raw.description.filter(|d| !d.is_empty()),
        start_time,
        end_time,
        categories,
        attributes,
    }))
}

/// Parser for JSON guides
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEpgParser;

impl EpgParser for JsonEpgParser {
    fn parse(&self, content: &str) -> Result<Vec<Program>, EpgError> {
        let content = trim_leading(content);
        if !content.starts_with('{') && !content.starts_with('[') {
            return Err(EpgError::FormatMismatch {
                format: EpgFormat::Json,
                reason: "missing opening brace or bracket".to_string(),
            });
        }

        let mut errors = Vec::with_capacity(ATTEMPTS.len());

        for (shape, attempt) in ATTEMPTS {
            match attempt(content) {
                Ok(programs) => return Ok(programs),
                Err(e) => errors.push(format!("{}: {}", shape, e)),
            }
        }

        Err(EpgError::SchemaExhausted(errors))
    }

    fn format(&self) -> EpgFormat {
        EpgFormat::Json
    }
}
