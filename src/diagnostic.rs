//! Diagnostics attached to parsed protocol messages
//!
//! Every parsed [`Message`](crate::message::Message) carries an ordered list
//! of diagnostics collected while decoding and validating it. An `Error` or
//! `Fatal` diagnostic does not suppress emission of the message; consumers
//! choose their own policy.

use std::fmt;

/// Diagnostic severity, in increasing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Developer-level detail
    Debug,
    /// Informational note
    Info,
    /// Minor observation, e.g. an unknown value name on an unknown property
    Note,
    /// Data was tolerated but looks wrong; it is retained as received
    Warning,
    /// Data was invalid; a placeholder or fallback was substituted
    Error,
    /// The surrounding bytes were not decodable at all
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Debug => write!(f, "debug"),
            Severity::Info => write!(f, "info"),
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

/// A severity-tagged note describing a validation outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// How serious the finding is
    pub severity: Severity,
    /// Free-form description
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic with an explicit severity
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    /// Create a `Fatal` diagnostic
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, message)
    }

    /// Create an `Error` diagnostic
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Create a `Warning` diagnostic
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Create a `Note` diagnostic
    pub fn note(message: impl Into<String>) -> Self {
        Self::new(Severity::Note, message)
    }

    /// Create an `Info` diagnostic
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    /// Create a `Debug` diagnostic
    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(Severity::Debug, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}
