//! Property codec contract.
//!
//! Every property value type is paired with a codec implementing
//! [`PropertyCodec`]: it negotiates a data type, prepares parameters, and
//! emits/parses the three encodings (plain text, xCal XML fragments, jCal
//! JSON fragments), each parameterized by protocol version. Codecs report
//! recoverable defects as [`Warning`]s on the document context and fail with
//! [`CannotParse`] only when no meaningful value can be recovered at all.
//!
//! A codec that only implements `write_text`/`parse_text` gets XML and JSON
//! for free through default bridging: XML wraps the text in a single child
//! element named after the data type, JSON wraps it in a single-value array.

mod escape;
mod recur_v1;
mod recur_v2;
mod temporal;

pub use escape::{escape_text, unescape_text};
pub use recur_v1::{LegacyRecur, RecurCodecV1};
pub use recur_v2::RecurCodecV2;
pub use temporal::TemporalCodec;

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::ical::core::{Parameters, Recur, Temporal};
use crate::ical::zone::DocumentContext;

/// Protocol version a codec is asked to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecVersion {
    /// vCal 1.0 (legacy positional grammars).
    VCal10,
    /// iCalendar 2.0 (RFC 2445 / RFC 5545 and the xCal/jCal siblings).
    ICal20,
}

impl SpecVersion {
    /// Returns whether this is the legacy vCal 1.0 version.
    #[must_use]
    pub const fn is_legacy(self) -> bool {
        matches!(self, Self::VCal10)
    }
}

/// Wire data type a value self-describes as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Recur,
    Date,
    DateTime,
    Text,
}

impl DataType {
    /// Returns the VALUE parameter spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Recur => "RECUR",
            Self::Date => "DATE",
            Self::DateTime => "DATE-TIME",
            Self::Text => "TEXT",
        }
    }

    /// Returns the xCal element local name (lowercase).
    #[must_use]
    pub const fn xml_name(self) -> &'static str {
        match self {
            Self::Recur => "recur",
            Self::Date => "date",
            Self::DateTime => "date-time",
            Self::Text => "text",
        }
    }
}

/// A recoverable parsing or writing defect.
///
/// Warnings carry enough context (field name, offending raw token) to render
/// a human-readable diagnostic; processing continues with the defect either
/// defaulted or dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// Owning property name (filled in by the context if left empty).
    pub property: String,
    /// Rule part or field the defect was found in, if any.
    pub field: Option<String>,
    /// The offending raw token, if any.
    pub raw: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl Warning {
    /// Creates a warning with a message only.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            property: String::new(),
            field: None,
            raw: None,
            message: message.into(),
        }
    }

    /// Attributes the warning to a property.
    #[must_use]
    pub fn for_property(mut self, property: impl Into<String>) -> Self {
        self.property = property.into();
        self
    }

    /// Names the field the defect was found in.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Attaches the offending raw token.
    #[must_use]
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.property)?;
        if let Some(field) = &self.field {
            write!(f, " {field}")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(raw) = &self.raw {
            write!(f, " (got {raw:?})")?;
        }
        Ok(())
    }
}

/// Fatal parse failure: no meaningful value could be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse {kind} value: {reason}")]
pub struct CannotParse {
    /// Data type or encoding that failed.
    pub kind: &'static str,
    /// Human-readable reason.
    pub reason: String,
}

impl CannotParse {
    #[must_use]
    pub fn new(kind: &'static str, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Parse result shape: one value, or a structural fan-out.
///
/// `Split` means the single source property maps to multiple sibling
/// properties in the target model (legacy packed multi-rule). Callers must
/// handle the fan-out explicitly; it is neither an error nor a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    Single(T),
    Split(Vec<T>),
}

impl<T> Decoded<T> {
    /// Returns the value when it is a single one.
    #[must_use]
    pub fn single(self) -> Option<T> {
        match self {
            Self::Single(value) => Some(value),
            Self::Split(_) => None,
        }
    }

    /// Flattens into a list of values (one or many).
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Single(value) => vec![value],
            Self::Split(values) => values,
        }
    }

    /// Maps the carried value type.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Decoded<U> {
        match self {
            Self::Single(value) => {
                let mut f = f;
                Decoded::Single(f(value))
            }
            Self::Split(values) => Decoded::Split(values.into_iter().map(f).collect()),
        }
    }
}

/// The contract every property value type plugs into.
pub trait PropertyCodec {
    /// The value model this codec encodes and decodes.
    type Value;

    /// Negotiates the wire data type for a value.
    fn data_type(&self, value: &Self::Value, version: SpecVersion) -> DataType;

    /// Returns a possibly-modified copy of the value's parameter set.
    /// Never mutates the caller's copy.
    #[must_use]
    fn prepare_parameters(
        &self,
        _value: &Self::Value,
        params: &Parameters,
        _version: SpecVersion,
    ) -> Parameters {
        params.clone()
    }

    /// Produces the plain-text encoding. `None` is the skip signal: omit
    /// this property from output (e.g. an empty recurrence).
    fn write_text(
        &self,
        value: &Self::Value,
        ctx: &mut DocumentContext,
        version: SpecVersion,
    ) -> Option<String>;

    /// Produces the xCal fragment. Default: wraps the text value in a
    /// single child element named after the data type.
    fn write_xml(
        &self,
        value: &Self::Value,
        ctx: &mut DocumentContext,
        version: SpecVersion,
    ) -> Option<String> {
        let text = self.write_text(value, ctx, version)?;
        Some(xml_element(self.data_type(value, version).xml_name(), &text))
    }

    /// Produces the jCal fragment. Default: wraps the text value as a
    /// single-value array.
    fn write_json(
        &self,
        value: &Self::Value,
        ctx: &mut DocumentContext,
        version: SpecVersion,
    ) -> Option<JsonValue> {
        let text = self.write_text(value, ctx, version)?;
        Some(JsonValue::Array(vec![JsonValue::String(text)]))
    }

    /// Parses the plain-text encoding. Recoverable issues become warnings on
    /// the context; the result is best-effort.
    ///
    /// ## Errors
    /// Fails with [`CannotParse`] only when no meaningful value can be
    /// recovered at all.
    fn parse_text(
        &self,
        raw: &str,
        params: &Parameters,
        ctx: &mut DocumentContext,
        version: SpecVersion,
    ) -> Result<Decoded<Self::Value>, CannotParse>;

    /// Parses an xCal fragment. Default: extracts the concatenated text
    /// content and delegates to [`Self::parse_text`].
    ///
    /// ## Errors
    /// Fails with [`CannotParse`] when the fragment holds no element at all
    /// or the delegated text parse fails.
    fn parse_xml(
        &self,
        fragment: &str,
        params: &Parameters,
        ctx: &mut DocumentContext,
        version: SpecVersion,
    ) -> Result<Decoded<Self::Value>, CannotParse> {
        let text = xml_inner_text(fragment)
            .ok_or_else(|| CannotParse::new("XML", "fragment holds no element"))?;
        self.parse_text(&text, params, ctx, version)
    }

    /// Parses a jCal fragment. Default: takes the first element of a
    /// single-value array (or a bare string) and delegates to
    /// [`Self::parse_text`].
    ///
    /// ## Errors
    /// Fails with [`CannotParse`] when the fragment is not a string-bearing
    /// array or the delegated text parse fails.
    fn parse_json(
        &self,
        fragment: &JsonValue,
        params: &Parameters,
        ctx: &mut DocumentContext,
        version: SpecVersion,
    ) -> Result<Decoded<Self::Value>, CannotParse> {
        let text = match fragment {
            JsonValue::Array(items) => items.first().and_then(JsonValue::as_str),
            JsonValue::String(s) => Some(s.as_str()),
            _ => None,
        }
        .ok_or_else(|| CannotParse::new("JSON", "expected a single-value array of strings"))?;
        self.parse_text(text, params, ctx, version)
    }
}

/// Codec for plain TEXT values. Exists mostly to exercise the shared escape
/// helpers and the default XML/JSON bridging.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl PropertyCodec for TextCodec {
    type Value = String;

    fn data_type(&self, _value: &String, _version: SpecVersion) -> DataType {
        DataType::Text
    }

    fn write_text(
        &self,
        value: &String,
        _ctx: &mut DocumentContext,
        _version: SpecVersion,
    ) -> Option<String> {
        Some(escape_text(value))
    }

    fn parse_text(
        &self,
        raw: &str,
        _params: &Parameters,
        _ctx: &mut DocumentContext,
        _version: SpecVersion,
    ) -> Result<Decoded<String>, CannotParse> {
        Ok(Decoded::Single(unescape_text(raw)))
    }
}

/// A typed property value as produced by the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Recur(Recur),
    LegacyRecur(LegacyRecur),
    Temporal(Temporal),
    Text(String),
}

/// A registered codec, dispatched by value kind.
#[derive(Debug, Clone, Copy)]
pub enum Codec {
    RecurV2(RecurCodecV2),
    RecurV1(RecurCodecV1),
    Temporal(TemporalCodec),
    Text(TextCodec),
}

impl Codec {
    /// Parses the plain-text encoding into a typed value.
    ///
    /// ## Errors
    /// Propagates [`CannotParse`] from the underlying codec.
    pub fn parse_text(
        &self,
        raw: &str,
        params: &Parameters,
        ctx: &mut DocumentContext,
        version: SpecVersion,
    ) -> Result<Decoded<PropertyValue>, CannotParse> {
        match self {
            Self::RecurV2(c) => Ok(c
                .parse_text(raw, params, ctx, version)?
                .map(PropertyValue::Recur)),
            Self::RecurV1(c) => Ok(c
                .parse_text(raw, params, ctx, version)?
                .map(PropertyValue::LegacyRecur)),
            Self::Temporal(c) => Ok(c
                .parse_text(raw, params, ctx, version)?
                .map(PropertyValue::Temporal)),
            Self::Text(c) => Ok(c
                .parse_text(raw, params, ctx, version)?
                .map(PropertyValue::Text)),
        }
    }

    /// Parses an xCal fragment into a typed value.
    ///
    /// ## Errors
    /// Propagates [`CannotParse`] from the underlying codec.
    pub fn parse_xml(
        &self,
        fragment: &str,
        params: &Parameters,
        ctx: &mut DocumentContext,
        version: SpecVersion,
    ) -> Result<Decoded<PropertyValue>, CannotParse> {
        match self {
            Self::RecurV2(c) => Ok(c
                .parse_xml(fragment, params, ctx, version)?
                .map(PropertyValue::Recur)),
            Self::RecurV1(c) => Ok(c
                .parse_xml(fragment, params, ctx, version)?
                .map(PropertyValue::LegacyRecur)),
            Self::Temporal(c) => Ok(c
                .parse_xml(fragment, params, ctx, version)?
                .map(PropertyValue::Temporal)),
            Self::Text(c) => Ok(c
                .parse_xml(fragment, params, ctx, version)?
                .map(PropertyValue::Text)),
        }
    }

    /// Parses a jCal fragment into a typed value.
    ///
    /// ## Errors
    /// Propagates [`CannotParse`] from the underlying codec.
    pub fn parse_json(
        &self,
        fragment: &JsonValue,
        params: &Parameters,
        ctx: &mut DocumentContext,
        version: SpecVersion,
    ) -> Result<Decoded<PropertyValue>, CannotParse> {
        match self {
            Self::RecurV2(c) => Ok(c
                .parse_json(fragment, params, ctx, version)?
                .map(PropertyValue::Recur)),
            Self::RecurV1(c) => Ok(c
                .parse_json(fragment, params, ctx, version)?
                .map(PropertyValue::LegacyRecur)),
            Self::Temporal(c) => Ok(c
                .parse_json(fragment, params, ctx, version)?
                .map(PropertyValue::Temporal)),
            Self::Text(c) => Ok(c
                .parse_json(fragment, params, ctx, version)?
                .map(PropertyValue::Text)),
        }
    }

    /// Writes a typed value as plain text. A value of the wrong kind for
    /// this codec is skipped.
    #[must_use]
    pub fn write_text(
        &self,
        value: &PropertyValue,
        ctx: &mut DocumentContext,
        version: SpecVersion,
    ) -> Option<String> {
        match (self, value) {
            (Self::RecurV2(c), PropertyValue::Recur(v)) => c.write_text(v, ctx, version),
            (Self::RecurV1(c), PropertyValue::LegacyRecur(v)) => c.write_text(v, ctx, version),
            (Self::Temporal(c), PropertyValue::Temporal(v)) => c.write_text(v, ctx, version),
            (Self::Text(c), PropertyValue::Text(v)) => c.write_text(v, ctx, version),
            _ => None,
        }
    }

    /// Writes a typed value as an xCal fragment.
    #[must_use]
    pub fn write_xml(
        &self,
        value: &PropertyValue,
        ctx: &mut DocumentContext,
        version: SpecVersion,
    ) -> Option<String> {
        match (self, value) {
            (Self::RecurV2(c), PropertyValue::Recur(v)) => c.write_xml(v, ctx, version),
            (Self::RecurV1(c), PropertyValue::LegacyRecur(v)) => c.write_xml(v, ctx, version),
            (Self::Temporal(c), PropertyValue::Temporal(v)) => c.write_xml(v, ctx, version),
            (Self::Text(c), PropertyValue::Text(v)) => c.write_xml(v, ctx, version),
            _ => None,
        }
    }

    /// Writes a typed value as a jCal fragment.
    #[must_use]
    pub fn write_json(
        &self,
        value: &PropertyValue,
        ctx: &mut DocumentContext,
        version: SpecVersion,
    ) -> Option<JsonValue> {
        match (self, value) {
            (Self::RecurV2(c), PropertyValue::Recur(v)) => c.write_json(v, ctx, version),
            (Self::RecurV1(c), PropertyValue::LegacyRecur(v)) => c.write_json(v, ctx, version),
            (Self::Temporal(c), PropertyValue::Temporal(v)) => c.write_json(v, ctx, version),
            (Self::Text(c), PropertyValue::Text(v)) => c.write_json(v, ctx, version),
            _ => None,
        }
    }

    /// Negotiates the wire data type for a typed value.
    #[must_use]
    pub fn data_type(&self, value: &PropertyValue, version: SpecVersion) -> Option<DataType> {
        match (self, value) {
            (Self::RecurV2(c), PropertyValue::Recur(v)) => Some(c.data_type(v, version)),
            (Self::RecurV1(c), PropertyValue::LegacyRecur(v)) => Some(c.data_type(v, version)),
            (Self::Temporal(c), PropertyValue::Temporal(v)) => Some(c.data_type(v, version)),
            (Self::Text(c), PropertyValue::Text(v)) => Some(c.data_type(v, version)),
            _ => None,
        }
    }

    /// Prepares a possibly-modified copy of the parameter set for writing.
    #[must_use]
    pub fn prepare_parameters(
        &self,
        value: &PropertyValue,
        params: &Parameters,
        version: SpecVersion,
    ) -> Parameters {
        match (self, value) {
            (Self::RecurV2(c), PropertyValue::Recur(v)) => {
                c.prepare_parameters(v, params, version)
            }
            (Self::RecurV1(c), PropertyValue::LegacyRecur(v)) => {
                c.prepare_parameters(v, params, version)
            }
            (Self::Temporal(c), PropertyValue::Temporal(v)) => {
                c.prepare_parameters(v, params, version)
            }
            (Self::Text(c), PropertyValue::Text(v)) => c.prepare_parameters(v, params, version),
            _ => params.clone(),
        }
    }
}

/// Property-name → codec table.
///
/// Resolved once at document-reader construction time; lookups are
/// case-insensitive. Properties without a registered codec fall back to the
/// text codec.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    entries: HashMap<String, Codec>,
    fallback: Codec,
}

/// Properties carrying DATE/DATE-TIME values by default.
const TEMPORAL_PROPERTIES: &[&str] = &[
    "DTSTART",
    "DTEND",
    "DTSTAMP",
    "DUE",
    "COMPLETED",
    "CREATED",
    "LAST-MODIFIED",
    "RECURRENCE-ID",
    "EXDATE",
    "RDATE",
];

impl CodecRegistry {
    /// Builds the registry for a protocol version. The recurrence grammar is
    /// selected here, once, rather than per value.
    #[must_use]
    pub fn for_version(version: SpecVersion) -> Self {
        let mut entries = HashMap::new();

        let recur = if version.is_legacy() {
            Codec::RecurV1(RecurCodecV1)
        } else {
            Codec::RecurV2(RecurCodecV2)
        };
        entries.insert("RRULE".to_string(), recur);
        entries.insert("EXRULE".to_string(), recur);

        for name in TEMPORAL_PROPERTIES {
            entries.insert((*name).to_string(), Codec::Temporal(TemporalCodec));
        }

        Self {
            entries,
            fallback: Codec::Text(TextCodec),
        }
    }

    /// Looks up the codec for a property name (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> &Codec {
        self.entries
            .get(&name.to_ascii_uppercase())
            .unwrap_or(&self.fallback)
    }
}

/// XML-escapes the five special characters.
pub(crate) fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Renders a single text-content element.
pub(crate) fn xml_element(tag: &str, text: &str) -> String {
    format!("<{tag}>{}</{tag}>", xml_escape(text))
}

/// Resolves a named XML entity to its character.
pub(crate) fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

/// Resolves a general reference event (`&amp;`, `&#60;`, ...) to its
/// character. Character references first, then the predefined entities.
pub(crate) fn resolve_reference(
    reader: &Reader<&[u8]>,
    reference: &quick_xml::events::BytesRef<'_>,
) -> Option<char> {
    if let Ok(Some(c)) = reference.resolve_char_ref() {
        return Some(c);
    }
    let name = reader.decoder().decode(reference.as_ref()).ok()?;
    resolve_entity(&name)
}

/// Extracts the concatenated text content of an XML fragment, or `None`
/// when the fragment holds no element, is malformed, or uses an entity
/// that cannot be resolved. Text is taken verbatim; whitespace inside an
/// element is significant.
pub(crate) fn xml_inner_text(fragment: &str) -> Option<String> {
    let mut reader = Reader::from_reader(fragment.as_bytes());

    let mut buf = Vec::new();
    let mut text = String::new();
    let mut saw_element = false;
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) => {
                saw_element = true;
                depth += 1;
            }
            Ok(Event::Empty(_)) => saw_element = true,
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Text(ref e)) => {
                if depth > 0 {
                    if let Ok(decoded) = reader.decoder().decode(e.as_ref()) {
                        text.push_str(&decoded);
                    }
                }
            }
            Ok(Event::GeneralRef(ref e)) => {
                if depth > 0 {
                    text.push(resolve_reference(&reader, e)?);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }

    saw_element.then_some(text)
}
