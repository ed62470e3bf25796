//! Core protocol enumerations
//!
//! These are the scalar vocabularies shared by the wire layer and the device
//! store: property kinds, states, permissions, switch rules and the BLOB
//! transfer policy. Wire spellings follow the INDI protocol reference.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// The five INDI property kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Free-form text vector
    Text,
    /// IEEE 754 double vector
    Number,
    /// Boolean vector constrained by a [`SwitchRule`]
    Switch,
    /// Read-only indicator lights
    Light,
    /// Base64-transported binary payloads
    Blob,
}

impl PropertyKind {
    /// Wire spelling used inside element names (`defTextVector`, `oneBLOB`, ...)
    pub fn wire_name(&self) -> &'static str {
        match self {
            PropertyKind::Text => "Text",
            PropertyKind::Number => "Number",
            PropertyKind::Switch => "Switch",
            PropertyKind::Light => "Light",
            PropertyKind::Blob => "BLOB",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Property permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Read-only property
    ReadOnly,
    /// Write-only property
    WriteOnly,
    /// Read-write property
    ReadWrite,
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ro" => Ok(Permission::ReadOnly),
            "wo" => Ok(Permission::WriteOnly),
            "rw" => Ok(Permission::ReadWrite),
            _ => Err(Error::Property(format!("invalid permission: {}", s))),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::ReadOnly => write!(f, "ro"),
            Permission::WriteOnly => write!(f, "wo"),
            Permission::ReadWrite => write!(f, "rw"),
        }
    }
}

/// State of a property, also used as the value of a light element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// No activity
    #[default]
    Idle,
    /// Last operation succeeded
    Ok,
    /// Operation in progress
    Busy,
    /// Attention required
    Alert,
}

impl Status {
    /// Case-insensitive parse, reporting whether the input needed coercion
    /// to the canonical spelling.
    pub fn from_str_lenient(s: &str) -> Option<(Self, bool)> {
        let status = match s {
            "Idle" => return Some((Status::Idle, false)),
            "Ok" => return Some((Status::Ok, false)),
            "Busy" => return Some((Status::Busy, false)),
            "Alert" => return Some((Status::Alert, false)),
            _ => match s.to_ascii_lowercase().as_str() {
                "idle" => Status::Idle,
                "ok" => Status::Ok,
                "busy" => Status::Busy,
                "alert" => Status::Alert,
                _ => return None,
            },
        };
        Some((status, true))
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Idle" => Ok(Status::Idle),
            "Ok" => Ok(Status::Ok),
            "Busy" => Ok(Status::Busy),
            "Alert" => Ok(Status::Alert),
            _ => Err(Error::Property(format!("invalid status: {}", s))),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => write!(f, "Idle"),
            Status::Ok => write!(f, "Ok"),
            Status::Busy => write!(f, "Busy"),
            Status::Alert => write!(f, "Alert"),
        }
    }
}

/// Constraint on how many elements of a switch vector may be on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchRule {
    /// Exactly one switch is on
    OneOfMany,
    /// At most one switch is on
    AtMostOne,
    /// Any combination
    AnyOfMany,
}

impl FromStr for SwitchRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OneOfMany" => Ok(SwitchRule::OneOfMany),
            "AtMostOne" => Ok(SwitchRule::AtMostOne),
            "AnyOfMany" => Ok(SwitchRule::AnyOfMany),
            _ => Err(Error::Property(format!("invalid switch rule: {}", s))),
        }
    }
}

impl fmt::Display for SwitchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchRule::OneOfMany => write!(f, "OneOfMany"),
            SwitchRule::AtMostOne => write!(f, "AtMostOne"),
            SwitchRule::AnyOfMany => write!(f, "AnyOfMany"),
        }
    }
}

/// BLOB transfer policy requested through `enableBLOB`
///
/// `Never`/`Also`/`Only` are the classic spellings; `Off`/`On`/`Raw` appear
/// in newer server variants and are accepted as aliases on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobSending {
    /// No BLOB payloads on this channel
    Never,
    /// BLOBs interleaved with other traffic
    Also,
    /// Only BLOB payloads on this channel
    Only,
    /// Alias of `Never`
    Off,
    /// Alias of `Also`
    On,
    /// Raw transfer variant
    Raw,
}

impl FromStr for BlobSending {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Never" => Ok(BlobSending::Never),
            "Also" => Ok(BlobSending::Also),
            "Only" => Ok(BlobSending::Only),
            "Off" => Ok(BlobSending::Off),
            "On" => Ok(BlobSending::On),
            "Raw" => Ok(BlobSending::Raw),
            _ => Err(Error::Property(format!("invalid BLOB sending mode: {}", s))),
        }
    }
}

impl fmt::Display for BlobSending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobSending::Never => write!(f, "Never"),
            BlobSending::Also => write!(f, "Also"),
            BlobSending::Only => write!(f, "Only"),
            BlobSending::Off => write!(f, "Off"),
            BlobSending::On => write!(f, "On"),
            BlobSending::Raw => write!(f, "Raw"),
        }
    }
}

/// Boolean switch parsing and serialization
///
/// Receive accepts `on|off|true|false|1|0` case-insensitively; emit is the
/// canonical `On`/`Off`.
pub mod switch {
    /// Parse a wire boolean, `None` when the spelling is unrecognized
    pub fn parse(s: &str) -> Option<bool> {
        match s.to_ascii_lowercase().as_str() {
            "on" | "true" | "1" => Some(true),
            "off" | "false" | "0" => Some(false),
            _ => None,
        }
    }

    /// Canonical wire spelling
    pub fn emit(value: bool) -> &'static str {
        if value {
            "On"
        } else {
            "Off"
        }
    }
}
