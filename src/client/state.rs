//! Live projection of server state
//!
//! The [`Registry`] consumes a session's message stream and maintains the
//! `device → property → values` model, preserving metadata across
//! payload-only updates, invoking user callbacks after each applied change,
//! and watching server liveness through inbound `pingRequest`s. All state
//! lives behind one async mutex and is only touched from the dispatch
//! context or from suspending public methods, so access is serialized.

use crate::client::config::{Endpoint, RegistryConfig};
use crate::client::device::{ConnectionStatus, Device, Property};
use crate::client::session::{MessageStream, Session};
use crate::error::{Error, Result};
use crate::message::{Message, Payload, ServerMessage, SetProperty};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Callback invoked when a device first appears
pub type DeviceCallback = Arc<dyn Fn(&Device) + Send + Sync>;
/// Callback invoked after a property is defined or updated
pub type PropertyCallback = Arc<dyn Fn(&Device, &Property) + Send + Sync>;

#[derive(Default)]
struct RegistryInner {
    devices: IndexMap<String, Device>,
    on_device_update: Option<DeviceCallback>,
    on_property_update: Option<PropertyCallback>,
    ping_roundtrips: HashMap<String, Instant>,
    last_ping_seen: Option<Instant>,
}

/// The device registry for one server
pub struct Registry {
    session: Session,
    config: RegistryConfig,
    inner: Arc<Mutex<RegistryInner>>,
    server_messages: broadcast::Sender<ServerMessage>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Registry {
    /// Create a registry for `endpoint` with default settings
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_config(endpoint, RegistryConfig::default())
    }

    /// Create a registry with explicit settings
    pub fn with_config(endpoint: Endpoint, config: RegistryConfig) -> Self {
        let session = Session::with_config(endpoint, config.session.clone());
        let (server_messages, _) = broadcast::channel(64);
        Self {
            session,
            config,
            inner: Arc::new(Mutex::new(RegistryInner::default())),
            server_messages,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The underlying session handle
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Connect, send the handshake and start consuming messages
    pub async fn connect(&self) -> Result<()> {
        // Subscribe before the socket exists so nothing received between
        // connect and subscription can bypass the dispatch loop.
        let messages = self.session.messages().await?;
        self.session.connect().await?;
        self.session.send_handshake().await?;

        let mut tasks = self.tasks.lock().await;
        for stale in tasks.drain(..) {
            stale.abort();
        }
        tasks.push(tokio::spawn(dispatch_loop(
            messages,
            Arc::clone(&self.inner),
            self.server_messages.clone(),
        )));
        tasks.push(tokio::spawn(heartbeat(
            self.session.clone(),
            Arc::clone(&self.inner),
            self.config.ping_interval,
        )));
        Ok(())
    }

    /// Stop the heartbeat and dispatch tasks, close the session and clear
    /// liveness bookkeeping; the device model is kept as a last snapshot
    pub async fn disconnect(&self) -> Result<()> {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        self.session.disconnect().await?;
        let mut inner = self.inner.lock().await;
        inner.ping_roundtrips.clear();
        inner.last_ping_seen = None;
        Ok(())
    }

    /// Feed one message without a socket; test hook and replay entry point
    pub async fn process_message(&self, message: Message) {
        apply(&self.inner, &self.server_messages, message).await;
    }

    /// Insert or replace a device wholesale
    pub async fn register_device(&self, device: Device) {
        self.inner
            .lock()
            .await
            .devices
            .insert(device.name().to_string(), device);
    }

    /// Snapshot of every known device, in first-seen order
    pub async fn devices(&self) -> Vec<Device> {
        self.inner.lock().await.devices.values().cloned().collect()
    }

    /// Snapshot of one device
    pub async fn device(&self, name: &str) -> Option<Device> {
        self.inner.lock().await.devices.get(name).cloned()
    }

    /// Connectivity of one device, [`ConnectionStatus::Disconnected`] when
    /// the device is unknown
    pub async fn connection_status(&self, name: &str) -> ConnectionStatus {
        self.inner
            .lock()
            .await
            .devices
            .get(name)
            .map(Device::connection_status)
            .unwrap_or(ConnectionStatus::Disconnected)
    }

    /// Install the device-created callback
    ///
    /// Runs on the registry's dispatch context: a blocking callback delays
    /// message dispatch. Panics are caught and logged.
    pub async fn set_on_device_update(&self, callback: impl Fn(&Device) + Send + Sync + 'static) {
        self.inner.lock().await.on_device_update = Some(Arc::new(callback));
    }

    /// Install the property-updated callback; same execution contract as
    /// [`Registry::set_on_device_update`]
    pub async fn set_on_property_update(
        &self,
        callback: impl Fn(&Device, &Property) + Send + Sync + 'static,
    ) {
        self.inner.lock().await.on_property_update = Some(Arc::new(callback));
    }

    /// Subscribe to server commentary messages
    pub fn server_messages(&self) -> broadcast::Receiver<ServerMessage> {
        self.server_messages.subscribe()
    }

    /// Set the target of a text element
    pub async fn set_target_text(
        &self,
        device: &str,
        property: &str,
        value_name: &str,
        value: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        lookup_property(&mut inner, device, property)?.set_target_text(value_name, value)
    }

    /// Set the target of a number element
    pub async fn set_target_number(
        &self,
        device: &str,
        property: &str,
        value_name: &str,
        value: f64,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        lookup_property(&mut inner, device, property)?.set_target_number(value_name, value)
    }

    /// Set the target of a switch element, honoring the switch rule
    pub async fn set_target_switch(
        &self,
        device: &str,
        property: &str,
        value_name: &str,
        on: bool,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        lookup_property(&mut inner, device, property)?.set_target_switch(value_name, on)
    }

    /// Send the property's target values to the server; a no-op when no
    /// target was written
    pub async fn send_target_values(&self, device: &str, property: &str) -> Result<()> {
        let message = {
            let inner = self.inner.lock().await;
            let found = inner
                .devices
                .get(device)
                .ok_or_else(|| Error::DeviceNotFound(device.to_string()))?
                .property(property)
                .ok_or_else(|| Error::PropertyNotFound(property.to_string()))?;
            found.target_values().map(|targets| {
                Message::new(Payload::SetProperty(SetProperty {
                    kind: found.kind,
                    device: device.to_string(),
                    name: found.name.clone(),
                    values: targets.to_vec(),
                }))
            })
        };
        match message {
            Some(message) => self.session.send(&message).await,
            None => Ok(()),
        }
    }

    /// When each answered ping came back, by uid
    pub async fn ping_roundtrips(&self) -> HashMap<String, Instant> {
        self.inner.lock().await.ping_roundtrips.clone()
    }

    /// When the server was last heard from via `pingRequest`
    pub async fn last_ping_seen(&self) -> Option<Instant> {
        self.inner.lock().await.last_ping_seen
    }
}

fn lookup_property<'a>(
    inner: &'a mut RegistryInner,
    device: &str,
    property: &str,
) -> Result<&'a mut Property> {
    inner
        .devices
        .get_mut(device)
        .ok_or_else(|| Error::DeviceNotFound(device.to_string()))?
        .property_mut(property)
        .ok_or_else(|| Error::PropertyNotFound(property.to_string()))
}

async fn dispatch_loop(
    mut messages: MessageStream,
    inner: Arc<Mutex<RegistryInner>>,
    server_messages: broadcast::Sender<ServerMessage>,
) {
    while let Some(message) = messages.next().await {
        apply(&inner, &server_messages, message).await;
    }
    debug!("message stream ended");
}

async fn apply(
    inner: &Mutex<RegistryInner>,
    server_messages: &broadcast::Sender<ServerMessage>,
    message: Message,
) {
    log_diagnostics(&message);
    let mut inner = inner.lock().await;
    match message.payload {
        Payload::DefineProperty(def) => {
            let device_name = def.device.clone();
            let property_name = def.name.as_str().to_string();
            let created = !inner.devices.contains_key(&device_name);
            inner
                .devices
                .entry(device_name.clone())
                .or_insert_with(|| Device::new(device_name.as_str()))
                .upsert_define(def);
            fire_callbacks(&inner, &device_name, &property_name, created);
        }
        Payload::UpdateProperty(upd) => {
            let device_name = upd.device.clone();
            let property_name = upd.name.as_str().to_string();
            let created = !inner.devices.contains_key(&device_name);
            inner
                .devices
                .entry(device_name.clone())
                .or_insert_with(|| Device::new(device_name.as_str()))
                .upsert_update(upd);
            fire_callbacks(&inner, &device_name, &property_name, created);
        }
        Payload::DeleteProperty(del) => match (del.device, del.name) {
            (Some(device), Some(name)) => {
                if let Some(entry) = inner.devices.get_mut(&device) {
                    if !entry.remove_property(name.as_str()) {
                        debug!(device = %device, property = %name, "delete for unknown property");
                    }
                }
            }
            (Some(device), None) => {
                if inner.devices.shift_remove(&device).is_none() {
                    debug!(device = %device, "delete for unknown device");
                }
            }
            (None, None) => {
                inner.devices.clear();
            }
            (None, Some(name)) => {
                warn!(property = %name, "delete names a property without a device; ignored");
            }
        },
        Payload::PingRequest(_) => {
            inner.last_ping_seen = Some(Instant::now());
        }
        Payload::PingReply(reply) => {
            if let Some(uid) = reply.uid {
                inner.ping_roundtrips.insert(uid, Instant::now());
            }
        }
        Payload::ServerMessage(sm) => {
            info!(device = sm.device.as_deref().unwrap_or("*"), message = %sm.text, "server message");
            let _ = server_messages.send(sm);
        }
        // Client-to-server traffic echoed back at us carries nothing to apply.
        Payload::GetProperties(_) | Payload::SetProperty(_) | Payload::EnableBlob(_) => {}
    }
}

fn fire_callbacks(
    inner: &RegistryInner,
    device_name: &str,
    property_name: &str,
    created: bool,
) {
    let Some(device) = inner.devices.get(device_name) else {
        return;
    };
    if created {
        if let Some(callback) = &inner.on_device_update {
            invoke_isolated(|| callback(device), "device callback");
        }
    }
    if let Some(callback) = &inner.on_property_update {
        if let Some(property) = device.property(property_name) {
            invoke_isolated(|| callback(device, property), "property callback");
        }
    }
}

/// A panicking user callback must not desynchronize dispatch.
fn invoke_isolated(call: impl FnOnce(), what: &str) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        warn!("{} panicked; continuing", what);
    }
}

fn log_diagnostics(message: &Message) {
    for diagnostic in &message.diagnostics {
        use crate::diagnostic::Severity;
        match diagnostic.severity {
            Severity::Error | Severity::Fatal => {
                warn!(variant = message.payload.variant_name(), %diagnostic, "message diagnostic")
            }
            _ => debug!(variant = message.payload.variant_name(), %diagnostic, "message diagnostic"),
        }
    }
}

/// Declare the link dead when no `pingRequest` arrives within twice the
/// expected interval.
async fn heartbeat(session: Session, inner: Arc<Mutex<RegistryInner>>, interval: Duration) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let last = inner.lock().await.last_ping_seen;
        let silent = last
            .map(|seen| seen.elapsed())
            .unwrap_or_else(|| started.elapsed());
        if silent > interval * 2 {
            warn!(silent_for = ?silent, "no pingRequest from server; declaring link dead");
            let _ = session.disconnect().await;
            break;
        }
    }
}

/// Convenience constructor matching [`Session::new`]
impl From<Endpoint> for Registry {
    fn from(endpoint: Endpoint) -> Self {
        Registry::new(endpoint)
    }
}
