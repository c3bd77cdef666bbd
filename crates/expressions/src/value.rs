//! The universal dynamic value every flow datum travels through.
//!
//! `ValueContainer` is a tagged union over the JSON shapes plus two opaque
//! scalars (GUIDs and timestamps) that must round-trip exactly. All other
//! crates manipulate flow data exclusively through this type's operations:
//! construction, path access (required and optional), JSON conversion, and
//! deep structural comparison.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::Deserializer;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LookupError;

/// A static `Null` to lend out from optional accessors.
pub const NULL: ValueContainer = ValueContainer::Null;

// ---------------------------------------------------------------------------
// ValueContainer
// ---------------------------------------------------------------------------

/// The dynamic value model.
///
/// Equality is deep and structural: two containers are equal iff they carry
/// the same variant and recursively equal contents. Mapping comparison is
/// key→value only — `BTreeMap` makes insertion order irrelevant by
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueContainer {
    Null,
    Boolean(bool),
    Number(f64),
    Text(String),
    Sequence(Vec<ValueContainer>),
    Mapping(BTreeMap<String, ValueContainer>),
    /// Unique identifier; serializes as its hyphenated text form.
    Guid(Uuid),
    /// UTC instant; serializes as RFC 3339 text.
    Timestamp(DateTime<Utc>),
}

impl ValueContainer {
    /// Parse JSON text into a container, preserving number-vs-text
    /// discrimination and nesting exactly.
    pub fn from_json_str(source: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(source)?;
        Ok(Self::from_json(value))
    }

    /// Convert a parsed JSON value into a container.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ValueContainer::Null,
            serde_json::Value::Bool(b) => ValueContainer::Boolean(b),
            serde_json::Value::Number(n) => ValueContainer::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => ValueContainer::Text(s),
            serde_json::Value::Array(items) => {
                ValueContainer::Sequence(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(entries) => ValueContainer::Mapping(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Serialize back to a JSON value. Opaque scalars become their canonical
    /// text forms.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ValueContainer::Null => serde_json::Value::Null,
            ValueContainer::Boolean(b) => serde_json::Value::Bool(*b),
            ValueContainer::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueContainer::Text(s) => serde_json::Value::String(s.clone()),
            ValueContainer::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
            ValueContainer::Mapping(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            ValueContainer::Guid(id) => serde_json::Value::String(id.to_string()),
            ValueContainer::Timestamp(ts) => {
                serde_json::Value::String(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Path access
    // -----------------------------------------------------------------------

    /// Required path access: `get("parameters.item.subject")` or
    /// `get("rows[2].id")`. Fails if any segment is absent, an index is out
    /// of bounds, or an intermediate value cannot be indexed that way.
    pub fn get(&self, path: &str) -> Result<&ValueContainer, LookupError> {
        let segments = parse_path(path)?;
        let mut current = self;
        for segment in &segments {
            current = current.step(segment)?;
        }
        Ok(current)
    }

    /// Optional path access: same traversal as [`get`](Self::get) but any
    /// miss — absent key, bad index, type mismatch, even malformed path
    /// syntax — yields `Null` instead of an error. This never fails.
    pub fn get_opt(&self, path: &str) -> &ValueContainer {
        self.get(path).unwrap_or(&NULL)
    }

    fn step(&self, segment: &PathSegment) -> Result<&ValueContainer, LookupError> {
        match (self, segment) {
            (ValueContainer::Mapping(entries), PathSegment::Key(key)) => entries
                .get(key.as_str())
                .ok_or_else(|| LookupError::MissingKey { key: key.clone() }),
            (ValueContainer::Sequence(items), PathSegment::Element(index)) => {
                items.get(*index).ok_or(LookupError::IndexOutOfBounds {
                    index: *index,
                    len: items.len(),
                })
            }
            (other, segment) => Err(LookupError::NotIndexable {
                segment: segment.to_string(),
                found: other.kind(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn is_null(&self) -> bool {
        matches!(self, ValueContainer::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ValueContainer::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ValueContainer::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ValueContainer::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ValueContainer]> {
        match self {
            ValueContainer::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, ValueContainer>> {
        match self {
            ValueContainer::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Variant name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ValueContainer::Null => "null",
            ValueContainer::Boolean(_) => "boolean",
            ValueContainer::Number(_) => "number",
            ValueContainer::Text(_) => "text",
            ValueContainer::Sequence(_) => "sequence",
            ValueContainer::Mapping(_) => "mapping",
            ValueContainer::Guid(_) => "guid",
            ValueContainer::Timestamp(_) => "timestamp",
        }
    }

    /// Textual rendering used for template concatenation: scalars render
    /// canonically (whole numbers without a trailing `.0`), `Null` renders
    /// empty, composites render as compact JSON.
    pub fn as_text(&self) -> String {
        match self {
            ValueContainer::Null => String::new(),
            ValueContainer::Boolean(b) => b.to_string(),
            ValueContainer::Number(n) => format_number(*n),
            ValueContainer::Text(s) => s.clone(),
            ValueContainer::Guid(id) => id.to_string(),
            ValueContainer::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::Micros, true),
            ValueContainer::Sequence(_) | ValueContainer::Mapping(_) => self.to_json().to_string(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// ---------------------------------------------------------------------------
// Path segments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Key(String),
    Element(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{key}"),
            PathSegment::Element(index) => write!(f, "[{index}]"),
        }
    }
}

/// Split `"a.b[0].c"` into key and element segments. Dots separate keys,
/// `[n]` indexes a sequence.
fn parse_path(path: &str) -> Result<Vec<PathSegment>, LookupError> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            return Err(LookupError::InvalidPath(path.to_owned()));
        }
        let mut rest = part;
        if let Some(bracket) = rest.find('[') {
            let key = &rest[..bracket];
            if !key.is_empty() {
                segments.push(PathSegment::Key(key.to_owned()));
            }
            rest = &rest[bracket..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let close = stripped
                    .find(']')
                    .ok_or_else(|| LookupError::InvalidPath(path.to_owned()))?;
                let index: usize = stripped[..close]
                    .parse()
                    .map_err(|_| LookupError::InvalidPath(path.to_owned()))?;
                segments.push(PathSegment::Element(index));
                rest = &stripped[close + 1..];
            }
            if !rest.is_empty() {
                return Err(LookupError::InvalidPath(path.to_owned()));
            }
        } else {
            segments.push(PathSegment::Key(rest.to_owned()));
        }
    }
    Ok(segments)
}

// ---------------------------------------------------------------------------
// Index sugar — optional-access semantics, the serde_json idiom
// ---------------------------------------------------------------------------

impl Index<&str> for ValueContainer {
    type Output = ValueContainer;

    fn index(&self, key: &str) -> &Self::Output {
        match self {
            ValueContainer::Mapping(entries) => entries.get(key).unwrap_or(&NULL),
            _ => &NULL,
        }
    }
}

impl Index<usize> for ValueContainer {
    type Output = ValueContainer;

    fn index(&self, index: usize) -> &Self::Output {
        match self {
            ValueContainer::Sequence(items) => items.get(index).unwrap_or(&NULL),
            _ => &NULL,
        }
    }
}

// ---------------------------------------------------------------------------
// Literal constructors
// ---------------------------------------------------------------------------

impl From<bool> for ValueContainer {
    fn from(value: bool) -> Self {
        ValueContainer::Boolean(value)
    }
}

impl From<f64> for ValueContainer {
    fn from(value: f64) -> Self {
        ValueContainer::Number(value)
    }
}

impl From<i64> for ValueContainer {
    fn from(value: i64) -> Self {
        ValueContainer::Number(value as f64)
    }
}

impl From<&str> for ValueContainer {
    fn from(value: &str) -> Self {
        ValueContainer::Text(value.to_owned())
    }
}

impl From<String> for ValueContainer {
    fn from(value: String) -> Self {
        ValueContainer::Text(value)
    }
}

impl From<Uuid> for ValueContainer {
    fn from(value: Uuid) -> Self {
        ValueContainer::Guid(value)
    }
}

impl From<DateTime<Utc>> for ValueContainer {
    fn from(value: DateTime<Utc>) -> Self {
        ValueContainer::Timestamp(value)
    }
}

impl From<Vec<ValueContainer>> for ValueContainer {
    fn from(value: Vec<ValueContainer>) -> Self {
        ValueContainer::Sequence(value)
    }
}

impl From<BTreeMap<String, ValueContainer>> for ValueContainer {
    fn from(value: BTreeMap<String, ValueContainer>) -> Self {
        ValueContainer::Mapping(value)
    }
}

impl Default for ValueContainer {
    fn default() -> Self {
        ValueContainer::Null
    }
}

impl fmt::Display for ValueContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

// ---------------------------------------------------------------------------
// Serde — containers serialize to their JSON shape; deserialization produces
// the JSON variants only (opaque scalars are created by code, not documents).
// ---------------------------------------------------------------------------

impl Serialize for ValueContainer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ValueContainer::Null => serializer.serialize_unit(),
            ValueContainer::Boolean(b) => serializer.serialize_bool(*b),
            ValueContainer::Number(n) => serializer.serialize_f64(*n),
            ValueContainer::Text(s) => serializer.serialize_str(s),
            ValueContainer::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ValueContainer::Mapping(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            ValueContainer::Guid(id) => serializer.serialize_str(&id.to_string()),
            ValueContainer::Timestamp(ts) => {
                serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
        }
    }
}

impl<'de> Deserialize<'de> for ValueContainer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(ValueContainer::from_json(value))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
