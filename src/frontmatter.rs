// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Frontmatter decomposition.
//!
//! Content entries are markdown files that open with a block of YAML
//! metadata fenced by `---` lines, the __frontmatter__:
//!
//! ```text
//! ---
//! title: "Here We Are"
//! order: 1
//! social_media:
//!   instagram: "https://instagram.com/..."
//! ---
//! Free-text body.
//! ```
//!
//! The block is parsed with a real YAML parser, then narrowed down to the
//! shapes the front-end understands: strings, booleans, integers, and one
//! level of nested mapping. Anything richer is kept as its raw YAML text.
//! A block the parser rejects is read again line by line, so one stray
//! value like `title: Here: we are` does not cost the other fields.
//! Data documents under `_data/` use the same field model without fences.

use serde::Serialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Line fencing a frontmatter block.
const FENCE: &str = "---";

/// Key under which the body is exposed next to the fields.
const CONTENT_KEY: &str = "content";

/// Metadata fields of a document.
pub type Fields = BTreeMap<String, FieldValue>;

/// Single metadata value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Integer(i64),
    Map(Fields),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(int) => Some(*int),
            _ => None,
        }
    }
}

/// Markdown document decomposed into fields and body.
///
/// Serializes as a flat object, the fields plus a `content` key holding the
/// body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Document {
    #[serde(flatten)]
    pub fields: Fields,
    pub content: String,
}

impl Document {
    /// Construct new document.
    ///
    /// A `content` field is dropped in favor of the body.
    pub fn new(mut fields: Fields, content: impl Into<String>) -> Self {
        fields.remove(CONTENT_KEY);
        Self {
            fields,
            content: content.into(),
        }
    }

    /// Decompose entry text, falling back to a bare document.
    ///
    /// Without usable frontmatter the whole text becomes the body, and the
    /// title is synthesized from the slug.
    pub fn load(slug: &str, text: &str) -> Self {
        parse(text).unwrap_or_else(|| {
            let mut fields = Fields::new();
            fields.insert("title".into(), FieldValue::Text(title_from_slug(slug)));
            Self::new(fields, text.trim())
        })
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title").and_then(FieldValue::as_text)
    }

    /// Sort position of document, zero when absent.
    pub fn order(&self) -> i64 {
        self.get("order").and_then(FieldValue::as_integer).unwrap_or(0)
    }

    /// Required keys that the document does not carry.
    pub fn missing_fields<'a>(
        &self,
        required: impl IntoIterator<Item = &'a str>,
    ) -> Vec<&'a str> {
        required
            .into_iter()
            .filter(|key| !self.fields.contains_key(*key))
            .collect()
    }
}

/// Split text into frontmatter block and body.
///
/// The first line must be a fence. The block ends at the next fence line.
/// Trailing whitespace after a fence is allowed, and both LF and CRLF line
/// endings are accepted. Returns `None` without both fences.
pub fn split(text: &str) -> Option<(&str, &str)> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != FENCE || !first.ends_with('\n') {
        return None;
    }

    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == FENCE {
            return Some((&text[start..offset], &text[offset + line.len()..]));
        }
        offset += line.len();
    }

    None
}

/// Decompose markdown text into a document.
///
/// The body is trimmed. Returns `None` if fences are missing, or the block is
/// not a YAML mapping.
pub fn parse(text: &str) -> Option<Document> {
    let Some((block, body)) = split(text) else {
        warn!(
            "no frontmatter in {:?}",
            text.chars().take(80).collect::<String>()
        );
        return None;
    };

    let fields = parse_data(block)?;
    Some(Document::new(fields, body.trim()))
}

/// Decompose YAML key-value document into fields.
///
/// An empty document has no fields. Text that is not valid YAML is read as
/// `key: value` lines instead. Returns `None` if the text is a YAML value
/// other than a mapping, or has no key lines at all.
pub fn parse_data(text: &str) -> Option<Fields> {
    if text.trim().is_empty() {
        return Some(Fields::new());
    }

    match serde_yaml::from_str::<Value>(text) {
        Ok(Value::Mapping(mapping)) => Some(
            mapping
                .into_iter()
                .map(|(key, value)| (key_text(key), field_value(value, true)))
                .collect(),
        ),
        Ok(Value::Null) => Some(Fields::new()),
        Ok(other) => {
            warn!("frontmatter is not a mapping: {}", raw_text(&other));
            None
        }
        Err(error) => {
            warn!("malformed frontmatter, reading it line by line: {error}");
            let fields = parse_lines(text);
            (!fields.is_empty()).then_some(fields)
        }
    }
}

/// Read `key: value` lines, one level of nesting by indentation.
fn parse_lines(text: &str) -> Fields {
    let mut fields = Fields::new();
    let mut nested: Option<(String, Fields)> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if line.starts_with([' ', '\t']) {
            let entry = trimmed.trim_start_matches(['-', ' ']);
            if let (Some((_, map)), Some((key, value))) = (nested.as_mut(), split_key(entry)) {
                map.insert(key.into(), line_value(value));
            }
            continue;
        }

        if trimmed.starts_with('-') {
            continue;
        }
        let Some((key, value)) = split_key(trimmed) else {
            continue;
        };

        if let Some((key, map)) = nested.take() {
            fields.insert(key, FieldValue::Map(map));
        }

        if value.is_empty() || value == "{}" {
            nested = Some((key.into(), Fields::new()));
        } else {
            fields.insert(key.into(), line_value(value));
        }
    }

    if let Some((key, map)) = nested {
        fields.insert(key, FieldValue::Map(map));
    }

    fields
}

fn split_key(line: &str) -> Option<(&str, &str)> {
    match line.split_once(": ") {
        Some((key, value)) => Some((key.trim(), value.trim())),
        None => line.strip_suffix(':').map(|key| (key.trim(), "")),
    }
}

fn line_value(value: &str) -> FieldValue {
    let quoted = ['"', '\''].into_iter().find_map(|quote| {
        value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
    });

    if let Some(text) = quoted {
        return FieldValue::Text(text.into());
    }

    match value {
        "true" => FieldValue::Bool(true),
        "false" => FieldValue::Bool(false),
        _ => match value.parse::<i64>() {
            Ok(int) => FieldValue::Integer(int),
            Err(_) => FieldValue::Text(value.into()),
        },
    }
}

/// Turn a title into a URL-friendly identifier.
///
/// Lowercases, collapses every run of characters outside `[a-z0-9]` into a
/// single `-`, and trims dashes from both ends.
pub fn generate_id(title: &str) -> String {
    let mut id = String::with_capacity(title.len());
    let mut gap = false;
    for c in title.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if gap && !id.is_empty() {
                id.push('-');
            }
            gap = false;
            id.push(c);
        } else {
            gap = true;
        }
    }

    id
}

/// Synthesize a title from a slug, e.g., `here-we-are` becomes `Here We Are`.
pub fn title_from_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn field_value(value: Value, top_level: bool) -> FieldValue {
    match value {
        Value::String(text) => FieldValue::Text(text),
        Value::Bool(flag) => FieldValue::Bool(flag),
        Value::Number(number) => match number.as_i64() {
            Some(int) => FieldValue::Integer(int),
            None => FieldValue::Text(number.to_string()),
        },
        Value::Tagged(tagged) => field_value(tagged.value, top_level),
        // INVARIANT: An empty top-level key opens a nested mapping.
        Value::Null if top_level => FieldValue::Map(Fields::new()),
        Value::Null => FieldValue::Text(String::new()),
        Value::Mapping(mapping) if top_level => FieldValue::Map(
            mapping
                .into_iter()
                .map(|(key, value)| (key_text(key), field_value(value, false)))
                .collect(),
        ),
        other => FieldValue::Text(raw_text(&other)),
    }
}

fn key_text(key: Value) -> String {
    match key {
        Value::String(text) => text,
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => raw_text(&other),
    }
}

fn raw_text(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|text| text.trim_end().to_string())
        .unwrap_or_default()
}
