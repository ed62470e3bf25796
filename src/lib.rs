#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! INDI protocol client for Rust
//!
//! This crate talks to [INDI](https://indilib.org/) (Instrument Neutral
//! Distributed Interface) servers: the XML-over-TCP protocol used in
//! astronomy to control telescopes, cameras, focusers, filter wheels and
//! domes. It provides:
//!
//! - a streaming decoder for the rootless, arbitrarily chunked element
//!   stream the protocol puts on the wire ([`xml`]);
//! - validated protocol messages with attached diagnostics, and bit-exact
//!   serialization of the client-sendable subset ([`message`]);
//! - a per-server session actor with raw and parsed fan-out streams and
//!   automatic ping replies ([`client::Session`]);
//! - a live registry of devices and properties with metadata-preserving
//!   updates and switch-rule-checked target writes ([`client::Registry`]).
//!
//! # Example
//!
//! ```no_run
//! use indi_client::client::{Endpoint, Registry};
//!
//! #[tokio::main]
//! async fn main() -> indi_client::Result<()> {
//!     let registry = Registry::new(Endpoint::with_default_port("localhost"));
//!     registry.connect().await?;
//!
//!     registry
//!         .set_on_property_update(|device, property| {
//!             println!("{}.{} changed", device.name(), property.name);
//!         })
//!         .await;
//!
//!     // Ask the telescope to connect and push the targets to the server.
//!     registry
//!         .set_target_switch("Telescope Simulator", "CONNECTION", "CONNECT", true)
//!         .await?;
//!     registry
//!         .send_target_values("Telescope Simulator", "CONNECTION")
//!         .await?;
//!
//!     registry.disconnect().await
//! }
//! ```

/// Client implementation: sessions and the device registry
pub mod client;
/// Message diagnostics
pub mod diagnostic;
/// Error types and handling
pub mod error;
/// Number format parsing and sexagesimal rendering
pub mod format;
/// Protocol message types, parsing and serialization
pub mod message;
/// Well-known property and element names
pub mod names;
/// Core protocol enumerations
pub mod property;
/// INDI timestamp handling
pub mod timestamp;
/// Streaming XML decode
pub mod xml;

/// Common types and traits
pub mod prelude {
    pub use crate::client::{
        ConnectionStatus, Device, Endpoint, Property, Registry, Session, SessionState,
    };
    pub use crate::diagnostic::{Diagnostic, Severity};
    pub use crate::error::{Error, Result};
    pub use crate::message::{Message, Payload, Value, ValuePayload};
    pub use crate::names::{PropertyName, ValueName};
    pub use crate::property::{
        BlobSending, Permission, PropertyKind, Status, SwitchRule,
    };
    pub use crate::timestamp::IndiTimestamp;
}

pub use error::{Error, Result};

/// Version of the INDI protocol implemented by this library
pub const PROTOCOL_VERSION: &str = "1.7";
