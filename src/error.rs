//! Error types for the INDI client

use quick_xml::events::attributes::AttrError;
use quick_xml::Error as XmlError;
use std::io;
use thiserror::Error;

/// Result type for the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for INDI client operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    /// XML attribute error
    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] AttrError),

    /// UTF-8 conversion error
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Parse error
    #[error("parse error: {0}")]
    Parse(String),

    /// Number format error
    #[error("format error: {0}")]
    Format(String),

    /// The message variant cannot be sent by a client
    #[error("message `{0}` is not client-sendable")]
    NotSerializable(&'static str),

    /// Operation requires an established connection
    #[error("not connected")]
    NotConnected,

    /// The pending operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// A switch-rule invariant would be broken
    #[error("switch rule violated: {0}")]
    RuleViolation(String),

    /// A named element does not exist on the property
    #[error("no value named `{value}` on property `{property}`")]
    ValueNotFound {
        /// Property that was addressed
        property: String,
        /// Element name that was not found
        value: String,
    },

    /// A named property does not exist on the device
    #[error("no property named `{0}`")]
    PropertyNotFound(String),

    /// A named device is not known to the registry
    #[error("no device named `{0}`")]
    DeviceNotFound(String),

    /// Property error
    #[error("property error: {0}")]
    Property(String),
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Error::Format(err.to_string())
    }
}
