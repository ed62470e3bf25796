//! Property values and their metadata

use crate::names::ValueName;
use crate::property::{PropertyKind, Status};
use std::fmt;

/// The payload of one element inside a property vector
#[derive(Debug, Clone, PartialEq)]
pub enum ValuePayload {
    /// Free-form text
    Text(String),
    /// IEEE 754 double
    Number(f64),
    /// Switch position
    Boolean(bool),
    /// Light state
    State(Status),
    /// Decoded BLOB bytes
    Blob(Vec<u8>),
}

impl ValuePayload {
    /// The property kind this payload belongs to
    pub fn kind(&self) -> PropertyKind {
        match self {
            ValuePayload::Text(_) => PropertyKind::Text,
            ValuePayload::Number(_) => PropertyKind::Number,
            ValuePayload::Boolean(_) => PropertyKind::Switch,
            ValuePayload::State(_) => PropertyKind::Light,
            ValuePayload::Blob(_) => PropertyKind::Blob,
        }
    }
}

impl fmt::Display for ValuePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValuePayload::Text(s) => write!(f, "{}", s),
            ValuePayload::Number(n) => write!(f, "{}", n),
            ValuePayload::Boolean(b) => write!(f, "{}", crate::property::switch::emit(*b)),
            ValuePayload::State(s) => write!(f, "{}", s),
            ValuePayload::Blob(bytes) => write!(f, "[{} byte BLOB]", bytes.len()),
        }
    }
}

/// One named element of a property vector, with the metadata the server
/// attached to it
///
/// Metadata fields are `None` when the wire omitted them; the registry's
/// merge keeps earlier metadata alive across payload-only updates.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    /// Element name
    pub name: ValueName,
    /// Current payload
    pub payload: ValuePayload,
    /// GUI label
    pub label: Option<String>,
    /// printf-like display format (numbers and BLOBs)
    pub format: Option<String>,
    /// Lower bound (numbers)
    pub min: Option<f64>,
    /// Upper bound (numbers)
    pub max: Option<f64>,
    /// Increment hint (numbers)
    pub step: Option<f64>,
    /// Unit hint (numbers)
    pub unit: Option<String>,
    /// Advertised payload size in bytes (BLOBs)
    pub size: Option<u64>,
    /// Whether the payload arrived compressed (BLOBs)
    pub compressed: Option<bool>,
}

impl Value {
    /// A bare value with no metadata
    pub fn new(name: impl Into<ValueName>, payload: ValuePayload) -> Self {
        Self {
            name: name.into(),
            payload,
            label: None,
            format: None,
            min: None,
            max: None,
            step: None,
            unit: None,
            size: None,
            compressed: None,
        }
    }

    /// A text value
    pub fn text(name: impl Into<ValueName>, value: impl Into<String>) -> Self {
        Self::new(name, ValuePayload::Text(value.into()))
    }

    /// A number value
    pub fn number(name: impl Into<ValueName>, value: f64) -> Self {
        Self::new(name, ValuePayload::Number(value))
    }

    /// A switch value
    pub fn switch(name: impl Into<ValueName>, on: bool) -> Self {
        Self::new(name, ValuePayload::Boolean(on))
    }

    /// A light value
    pub fn light(name: impl Into<ValueName>, state: Status) -> Self {
        Self::new(name, ValuePayload::State(state))
    }

    /// A BLOB value
    pub fn blob(name: impl Into<ValueName>, bytes: Vec<u8>) -> Self {
        Self::new(name, ValuePayload::Blob(bytes))
    }

    /// Text payload, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            ValuePayload::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Number payload, if this is a number value
    pub fn as_number(&self) -> Option<f64> {
        match self.payload {
            ValuePayload::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Switch payload, if this is a switch value
    pub fn as_switch(&self) -> Option<bool> {
        match self.payload {
            ValuePayload::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// Light payload, if this is a light value
    pub fn as_light(&self) -> Option<Status> {
        match self.payload {
            ValuePayload::State(s) => Some(s),
            _ => None,
        }
    }

    /// BLOB payload, if this is a BLOB value
    pub fn as_blob(&self) -> Option<&[u8]> {
        match &self.payload {
            ValuePayload::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Fold an incoming update into this value: the payload is always taken
    /// from `incoming`, each metadata field only when `incoming` restates it.
    pub fn merge_update(&mut self, incoming: Value) {
        self.payload = incoming.payload;
        if incoming.label.is_some() {
            self.label = incoming.label;
        }
        if incoming.format.is_some() {
            self.format = incoming.format;
        }
        if incoming.min.is_some() {
            self.min = incoming.min;
        }
        if incoming.max.is_some() {
            self.max = incoming.max;
        }
        if incoming.step.is_some() {
            self.step = incoming.step;
        }
        if incoming.unit.is_some() {
            self.unit = incoming.unit;
        }
        if incoming.size.is_some() {
            self.size = incoming.size;
        }
        if incoming.compressed.is_some() {
            self.compressed = incoming.compressed;
        }
    }
}
