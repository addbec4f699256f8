//! XMLTV guide parser
//!
//! Decodes the document into a small generic element tree with quick-xml,
//! then maps each `<programme>` under the `<tv>` root:
//!
//! ```text
//! <tv>
//!   <programme channel="bbc1.uk" start="20230101120000 +0000" stop="20230101130000 +0000">
//!     <title lang="en">News</title>
//!     <desc>Headlines</desc>
//!     <category>News</category>
//!     <icon src="http://x/news.png"/>
//!     <credits><director>A</director><actor>B</actor></credits>
//!   </programme>
//! </tv>
//! ```

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::time::parse_xmltv_time;
use super::{retain_valid, EpgError, EpgParser};
use crate::models::{Attributes, Program};
use crate::services::sniffer::{trim_leading, EpgFormat};

/// Generic XML element
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Self {
        let attributes = start
            .attributes()
            .filter_map(Result::ok)
            .filter_map(|a| {
                let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
                let value = a.unescape_value().ok()?.into_owned();
                Some((key, value))
            })
            .collect();

        Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            ..Default::default()
        }
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first non-empty child named `name`
    fn child_text(&self, name: &str) -> Option<String> {
        self.children_named(name)
            .map(|c| c.text.trim())
            .find(|t| !t.is_empty())
            .map(str::to_string)
    }
}

/// Decode a whole document into its root element
fn parse_tree(content: &str) -> Result<Element, EpgError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(Element::from_start(&e)),
            Ok(Event::Empty(e)) => {
                let element = Element::from_start(&e);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = root.or(Some(element)),
                }
            }
            Ok(Event::End(_)) => {
                let Some(element) = stack.pop() else {
                    return Err(EpgError::Malformed("unbalanced closing tag".to_string()));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = root.or(Some(element)),
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(current) = stack.last_mut() {
                    // Undeclared entities (&nbsp;) are kept verbatim
                    match t.unescape() {
                        Ok(text) => current.text.push_str(&text),
                        Err(_) => current.text.push_str(&String::from_utf8_lossy(&t)),
                    }
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(EpgError::Malformed(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    if !stack.is_empty() {
        return Err(EpgError::Malformed("unexpected end of document".to_string()));
    }

    root.ok_or_else(|| EpgError::Malformed("empty document".to_string()))
}

fn to_program(element: &Element) -> Result<Option<Program>, EpgError> {
    let Some(channel_id) = element.attr("channel").map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    let Some(title) = element.child_text("title") else {
        return Ok(None);
    };

    let start_time = parse_xmltv_time(element.attr("start").unwrap_or_default())?;
    let end_time = parse_xmltv_time(element.attr("stop").unwrap_or_default())?;

    let mut attributes = Attributes::new();
    if let Some(icon) = element
        .children_named("icon")
        .find_map(|i| i.attr("src"))
        .filter(|s| !s.is_empty())
    {
        attributes.insert("icon".to_string(), icon.to_string());
    }
    if let Some(episode) = element.child_text("episode-num") {
        attributes.insert("episode-num".to_string(), episode);
    }
    if let Some(credits) = element.children_named("credits").next() {
        for (tag, key) in [("director", "director"), ("actor", "actors")] {
            let names: Vec<&str> = credits
                .children_named(tag)
                .map(|c| c.text.trim())
                .filter(|t| !t.is_empty())
                .collect();
            if !names.is_empty() {
                attributes.insert(key.to_string(), names.join(", "));
            }
        }
    }

    Ok(Some(Program {
        id: Program::make_id(channel_id, start_time),
        channel_id: channel_id.to_string(),
        title,
        description: element.child_text("desc"),
        start_time,
        end_time,
        categories: element.child_text("category").map(|c| vec![c]),
        attributes,
    }))
}

/// Parser for XMLTV guides
#[derive(Debug, Default, Clone, Copy)]
pub struct XmltvParser;

impl EpgParser for XmltvParser {
    fn parse(&self, content: &str) -> Result<Vec<Program>, EpgError> {
        let content = trim_leading(content);
        let root = parse_tree(content)?;

        if root.name != "tv" {
            return Err(EpgError::FormatMismatch {
                format: EpgFormat::Xmltv,
                reason: format!("root element is <{}>, expected <tv>", root.name),
            });
        }

        let mut programs = Vec::new();
        let mut skipped = 0usize;

        for element in root.children_named("programme") {
            match to_program(element) {
                Ok(Some(program)) => programs.push(program),
                Ok(None) => skipped += 1,
                Err(e) => {
                    tracing::debug!("error" = %e, "Programme dropped");
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            tracing::debug!("dropped" = skipped, "XMLTV programmes skipped");
        }

        retain_valid(&mut programs);
        Ok(programs)
    }

    fn format(&self) -> EpgFormat {
        EpgFormat::Xmltv
    }
}
