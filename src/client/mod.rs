//! INDI client: server sessions and the device registry
//!
//! A [`Session`] owns one TCP connection and exposes raw and parsed message
//! streams; a [`Registry`] layers the live device model on top of it. Both
//! are actors: each serializes its own state behind a single execution
//! context while different sessions run in parallel.

mod config;
mod device;
mod session;
mod state;

#[cfg(test)]
mod tests;

pub use config::{Endpoint, RegistryConfig, SessionConfig};
pub use device::{ConnectionStatus, Device, Property};
pub use session::{MessageStream, RawDataStream, Session, SessionState};
pub use state::{DeviceCallback, PropertyCallback, Registry};
