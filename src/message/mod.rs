//! INDI protocol messages
//!
//! Inbound raw element trees become a [`Message`]: a tagged [`Payload`] plus
//! the ordered diagnostics collected while validating it. The reverse
//! direction serializes the client-sendable subset to bit-exact wire XML.
//!
//! Element-name dispatch:
//!
//! | Element | Variant |
//! |---|---|
//! | `getProperties` | [`GetProperties`] |
//! | `defXVector` | [`DefineProperty`] |
//! | `setXVector` | [`UpdateProperty`] |
//! | `newXVector` | [`SetProperty`] |
//! | `delProperty` | [`DeleteProperty`] |
//! | `enableBLOB` | [`EnableBlob`] |
//! | `message` | [`ServerMessage`] |
//! | `pingRequest` / `pingReply` | [`PingRequest`] / [`PingReply`] |

mod parse;
mod serialize;
mod value;


pub use value::{Value, ValuePayload};

use crate::diagnostic::{Diagnostic, Severity};
use crate::error::Result;
use crate::names::PropertyName;
use crate::property::{BlobSending, Permission, PropertyKind, Status, SwitchRule};
use crate::timestamp::IndiTimestamp;
use crate::xml::RawElement;

/// Client request for the property catalogue
#[derive(Debug, Clone, PartialEq)]
pub struct GetProperties {
    /// Restrict to one device
    pub device: Option<String>,
    /// Restrict to one property
    pub name: Option<PropertyName>,
    /// Protocol version, `1.7`
    pub version: String,
}

impl Default for GetProperties {
    fn default() -> Self {
        Self {
            device: None,
            name: None,
            version: crate::PROTOCOL_VERSION.to_string(),
        }
    }
}

/// Server publication of a property definition
#[derive(Debug, Clone, PartialEq)]
pub struct DefineProperty {
    /// Property kind
    pub kind: PropertyKind,
    /// Owning device
    pub device: String,
    /// Property name
    pub name: PropertyName,
    /// GUI grouping
    pub group: Option<String>,
    /// GUI label
    pub label: Option<String>,
    /// Client write permission
    pub perm: Option<Permission>,
    /// Property state
    pub state: Option<Status>,
    /// Worst-case completion time in seconds
    pub timeout: Option<f64>,
    /// Switch rule (switch vectors only)
    pub rule: Option<SwitchRule>,
    /// Elements
    pub values: Vec<Value>,
    /// Moment the data was valid
    pub timestamp: Option<IndiTimestamp>,
    /// Commentary attached by the server
    pub comment: Option<String>,
}

/// Server update of current element values
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateProperty {
    /// Property kind
    pub kind: PropertyKind,
    /// Owning device
    pub device: String,
    /// Property name
    pub name: PropertyName,
    /// Property state
    pub state: Option<Status>,
    /// Worst-case completion time in seconds
    pub timeout: Option<f64>,
    /// Elements; metadata-omitting by convention
    pub values: Vec<Value>,
    /// Moment the data was valid
    pub timestamp: Option<IndiTimestamp>,
    /// Commentary attached by the server
    pub comment: Option<String>,
}

/// Client request to change element values
#[derive(Debug, Clone, PartialEq)]
pub struct SetProperty {
    /// Property kind
    pub kind: PropertyKind,
    /// Target device
    pub device: String,
    /// Target property
    pub name: PropertyName,
    /// Requested values
    pub values: Vec<Value>,
}

/// Server withdrawal of a property, a device, or everything
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteProperty {
    /// Device scope; `None` clears all devices
    pub device: Option<String>,
    /// Property scope; `None` clears the whole device
    pub name: Option<PropertyName>,
    /// Moment the deletion was issued
    pub timestamp: Option<IndiTimestamp>,
    /// Commentary attached by the server
    pub comment: Option<String>,
}

/// Client request to control BLOB delivery
#[derive(Debug, Clone, PartialEq)]
pub struct EnableBlob {
    /// Target device
    pub device: String,
    /// Target property
    pub name: PropertyName,
    /// Requested policy
    pub state: Option<BlobSending>,
}

/// Free-form commentary from the server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerMessage {
    /// Subject device; `None` for site-wide messages
    pub device: Option<String>,
    /// Moment the message was generated
    pub timestamp: Option<IndiTimestamp>,
    /// Message text
    pub text: String,
}

/// Server liveness probe
#[derive(Debug, Clone, PartialEq)]
pub struct PingRequest {
    /// Correlation id echoed by the reply
    pub uid: Option<String>,
}

/// Client answer to a [`PingRequest`]
#[derive(Debug, Clone, PartialEq)]
pub struct PingReply {
    /// Correlation id copied from the request
    pub uid: Option<String>,
}

/// The tagged union of protocol messages
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Client request for the property catalogue
    GetProperties(GetProperties),
    /// Server publication of a property definition
    DefineProperty(DefineProperty),
    /// Server update of current values
    UpdateProperty(UpdateProperty),
    /// Client write request
    SetProperty(SetProperty),
    /// Server withdrawal of state
    DeleteProperty(DeleteProperty),
    /// Client BLOB policy request
    EnableBlob(EnableBlob),
    /// Server commentary
    ServerMessage(ServerMessage),
    /// Server liveness probe
    PingRequest(PingRequest),
    /// Client liveness answer
    PingReply(PingReply),
}

impl Payload {
    /// Variant name, used in diagnostics and errors
    pub fn variant_name(&self) -> &'static str {
        match self {
            Payload::GetProperties(_) => "GetProperties",
            Payload::DefineProperty(_) => "DefineProperty",
            Payload::UpdateProperty(_) => "UpdateProperty",
            Payload::SetProperty(_) => "SetProperty",
            Payload::DeleteProperty(_) => "DeleteProperty",
            Payload::EnableBlob(_) => "EnableBlob",
            Payload::ServerMessage(_) => "ServerMessage",
            Payload::PingRequest(_) => "PingRequest",
            Payload::PingReply(_) => "PingReply",
        }
    }

    /// Whether the serializer can render this variant at all
    ///
    /// Commentary `message`s are serializable (bridge-style clients relay
    /// them) but are not part of the session send set; see
    /// [`Payload::is_session_sendable`].
    pub fn is_client_sendable(&self) -> bool {
        matches!(
            self,
            Payload::GetProperties(_)
                | Payload::SetProperty(_)
                | Payload::EnableBlob(_)
                | Payload::PingReply(_)
                | Payload::ServerMessage(_)
        )
    }

    /// Whether a [`Session`](crate::client::Session) will transmit this
    /// variant on behalf of a client
    pub fn is_session_sendable(&self) -> bool {
        matches!(
            self,
            Payload::GetProperties(_)
                | Payload::SetProperty(_)
                | Payload::EnableBlob(_)
                | Payload::PingReply(_)
        )
    }
}

/// A protocol message with its validation diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// The decoded content
    pub payload: Payload,
    /// Ordered findings from decode and validation
    pub diagnostics: Vec<Diagnostic>,
}

impl Message {
    /// Wrap a payload with no diagnostics
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            diagnostics: Vec::new(),
        }
    }

    /// A catalogue request for everything
    pub fn get_properties() -> Self {
        Self::new(Payload::GetProperties(GetProperties::default()))
    }

    /// A ping reply echoing `uid`; an empty uid is treated as absent
    pub fn ping_reply(uid: Option<String>) -> Self {
        let uid = uid.filter(|u| !u.is_empty());
        Self::new(Payload::PingReply(PingReply { uid }))
    }

    /// Build a message from a decoded raw element
    ///
    /// Returns `None` when the element name is not part of the protocol.
    pub fn from_raw(raw: &RawElement) -> Option<Self> {
        parse::build(raw)
    }

    /// Serialize the client-sendable subset to wire XML, without a trailing
    /// newline
    pub fn to_xml(&self) -> Result<String> {
        serialize::to_xml(&self.payload)
    }

    /// Append a diagnostic
    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// The most severe diagnostic attached, if any
    pub fn max_severity(&self) -> Option<Severity> {
        self.diagnostics.iter().map(|d| d.severity).max()
    }

    /// Whether an `Error` or `Fatal` diagnostic is attached
    pub fn has_errors(&self) -> bool {
        self.max_severity() >= Some(Severity::Error)
    }
}
