//! One TCP session with an INDI server
//!
//! A [`Session`] is a cheap cloneable handle onto a single actor task that
//! owns the socket, the stream decoder and the fan-out sinks. Every public
//! method is a message to that task, so all socket state is touched from
//! exactly one place; callers on other tasks merely suspend. Concurrent
//! sessions are independent actors.
//!
//! Inbound bytes are fanned out twice: verbatim chunks to raw-data
//! subscribers and decoded [`Message`]s to message subscribers. Both fans
//! apply backpressure by awaiting the slowest sink; nothing is dropped.
//! A received `pingRequest` is answered on a detached task with a matching
//! `pingReply` while still being forwarded to subscribers.

use crate::client::config::{Endpoint, SessionConfig};
use crate::error::{Error, Result};
use crate::message::{Message, Payload};
use crate::xml::StreamDecoder;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Stream of verbatim byte chunks from the server
pub type RawDataStream = ReceiverStream<Bytes>;
/// Stream of parsed protocol messages from the server
pub type MessageStream = ReceiverStream<Message>;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection attempted yet
    Setup,
    /// TCP connect in flight
    Connecting,
    /// Connected, nothing received yet
    Ready,
    /// Connected and receiving
    Receiving,
    /// Closed locally
    Cancelled,
    /// Closed by the peer or by an error
    Failed,
}

enum Command {
    Connect(oneshot::Sender<Result<RawDataStream>>),
    Disconnect(oneshot::Sender<()>),
    SendBytes(Vec<u8>, oneshot::Sender<Result<()>>),
    Messages(oneshot::Sender<MessageStream>),
    RawData(oneshot::Sender<RawDataStream>),
    IsConnected(oneshot::Sender<bool>),
    State(oneshot::Sender<SessionState>),
}

/// Handle to one server session
#[derive(Debug, Clone)]
pub struct Session {
    commands: mpsc::Sender<Command>,
}

impl Session {
    /// Create a session for `endpoint` with default settings
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_config(endpoint, SessionConfig::default())
    }

    /// Create a session with explicit settings
    pub fn with_config(endpoint: Endpoint, config: SessionConfig) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let actor = SessionActor {
            endpoint,
            config,
            commands: commands_rx,
            feedback: commands_tx.downgrade(),
            socket: None,
            decoder: StreamDecoder::new(),
            state: SessionState::Setup,
            raw_sinks: Vec::new(),
            message_sinks: Vec::new(),
        };
        tokio::spawn(actor.run());
        Self {
            commands: commands_tx,
        }
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| Error::Cancelled)?;
        rx.await.map_err(|_| Error::Cancelled)
    }

    /// Establish the connection, idempotently, and subscribe to raw bytes
    ///
    /// The returned stream yields every chunk read from the socket and ends
    /// when the session closes.
    pub async fn connect(&self) -> Result<RawDataStream> {
        self.call(Command::Connect).await?
    }

    /// Close the connection; pending operations resume with a cancellation
    /// error and both fan-out streams end
    pub async fn disconnect(&self) -> Result<()> {
        self.call(Command::Disconnect).await
    }

    /// Write one complete, pre-serialized message
    pub async fn send_bytes(&self, bytes: Vec<u8>) -> Result<()> {
        self.call(|tx| Command::SendBytes(bytes, tx)).await?
    }

    /// Serialize and write a message from the session send set
    /// (`GetProperties`, `SetProperty`, `EnableBlob`, `PingReply`),
    /// newline-terminated
    pub async fn send(&self, message: &Message) -> Result<()> {
        if !message.payload.is_session_sendable() {
            return Err(Error::NotSerializable(message.payload.variant_name()));
        }
        let mut bytes = message.to_xml()?.into_bytes();
        bytes.push(b'\n');
        self.send_bytes(bytes).await
    }

    /// Write the protocol handshake, `<getProperties version='1.7'/>`
    pub async fn send_handshake(&self) -> Result<()> {
        let line = format!("<getProperties version='{}'/>\n", crate::PROTOCOL_VERSION);
        self.send_bytes(line.into_bytes()).await
    }

    /// Subscribe to parsed protocol messages
    pub async fn messages(&self) -> Result<MessageStream> {
        self.call(Command::Messages).await
    }

    /// Subscribe to verbatim byte chunks
    pub async fn raw_data(&self) -> Result<RawDataStream> {
        self.call(Command::RawData).await
    }

    /// Whether the socket is currently open
    pub async fn is_connected(&self) -> bool {
        self.call(Command::IsConnected).await.unwrap_or(false)
    }

    /// Current lifecycle state
    pub async fn state(&self) -> SessionState {
        self.call(Command::State)
            .await
            .unwrap_or(SessionState::Cancelled)
    }
}

struct SessionActor {
    endpoint: Endpoint,
    config: SessionConfig,
    commands: mpsc::Receiver<Command>,
    feedback: mpsc::WeakSender<Command>,
    socket: Option<TcpStream>,
    decoder: StreamDecoder,
    state: SessionState,
    raw_sinks: Vec<mpsc::Sender<Bytes>>,
    message_sinks: Vec<mpsc::Sender<Message>>,
}

impl SessionActor {
    async fn run(mut self) {
        let mut read_buf = BytesMut::with_capacity(self.config.read_buffer_size);
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            self.shutdown(SessionState::Cancelled).await;
                            break;
                        }
                    }
                }
                result = read_chunk(&mut self.socket, &mut read_buf, self.config.read_buffer_size),
                    if self.socket.is_some() =>
                {
                    match result {
                        Ok(0) => {
                            info!(endpoint = %self.endpoint, "server closed the connection");
                            self.shutdown(SessionState::Failed).await;
                        }
                        Ok(_) => {
                            let chunk = read_buf.split().freeze();
                            self.dispatch_chunk(chunk).await;
                        }
                        Err(e) => {
                            warn!(endpoint = %self.endpoint, error = %e, "receive failed");
                            self.shutdown(SessionState::Failed).await;
                        }
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(reply) => {
                let result = self.connect().await;
                let _ = reply.send(result);
            }
            Command::Disconnect(reply) => {
                self.shutdown(SessionState::Cancelled).await;
                let _ = reply.send(());
            }
            Command::SendBytes(bytes, reply) => {
                let result = self.write(&bytes).await;
                let _ = reply.send(result);
            }
            Command::Messages(reply) => {
                let (tx, rx) = mpsc::channel(self.config.channel_capacity);
                self.message_sinks.push(tx);
                let _ = reply.send(ReceiverStream::new(rx));
            }
            Command::RawData(reply) => {
                let (tx, rx) = mpsc::channel(self.config.channel_capacity);
                self.raw_sinks.push(tx);
                let _ = reply.send(ReceiverStream::new(rx));
            }
            Command::IsConnected(reply) => {
                let _ = reply.send(self.socket.is_some());
            }
            Command::State(reply) => {
                let _ = reply.send(self.state);
            }
        }
    }

    async fn connect(&mut self) -> Result<RawDataStream> {
        if self.socket.is_none() {
            self.state = SessionState::Connecting;
            debug!(endpoint = %self.endpoint, "connecting");
            let addr = (self.endpoint.host.as_str(), self.endpoint.port);
            match TcpStream::connect(addr).await {
                Ok(socket) => {
                    info!(endpoint = %self.endpoint, "connected");
                    self.socket = Some(socket);
                    self.decoder = StreamDecoder::new();
                    self.state = SessionState::Ready;
                }
                Err(e) => {
                    warn!(endpoint = %self.endpoint, error = %e, "connect failed");
                    self.state = SessionState::Failed;
                    return Err(e.into());
                }
            }
        }
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        self.raw_sinks.push(tx);
        Ok(ReceiverStream::new(rx))
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        match self.socket.as_mut() {
            Some(socket) => {
                socket.write_all(bytes).await?;
                socket.flush().await?;
                Ok(())
            }
            None => Err(Error::NotConnected),
        }
    }

    async fn dispatch_chunk(&mut self, chunk: Bytes) {
        self.state = SessionState::Receiving;
        fan_out(&mut self.raw_sinks, chunk.clone()).await;
        self.decoder.feed(&chunk);
        while let Some(decoded) = self.decoder.next() {
            match decoded.element {
                Some(element) => match Message::from_raw(&element) {
                    Some(message) => {
                        self.autoreply_ping(&message);
                        fan_out(&mut self.message_sinks, message).await;
                    }
                    None => {
                        warn!(element = %element.name, "ignoring unknown protocol element");
                    }
                },
                None => {
                    for diagnostic in &decoded.diagnostics {
                        warn!(endpoint = %self.endpoint, %diagnostic, "undecodable input");
                    }
                }
            }
        }
    }

    /// Answer a `pingRequest` from a detached task; the request itself is
    /// still forwarded to subscribers. A failed reply is logged, not fatal.
    fn autoreply_ping(&self, message: &Message) {
        let Payload::PingRequest(ping) = &message.payload else {
            return;
        };
        let uid = ping.uid.clone();
        let feedback = self.feedback.clone();
        tokio::spawn(async move {
            let Some(commands) = feedback.upgrade() else {
                return;
            };
            let reply = Message::ping_reply(uid);
            let mut bytes = match reply.to_xml() {
                Ok(xml) => xml.into_bytes(),
                Err(e) => {
                    warn!(error = %e, "could not serialize ping reply");
                    return;
                }
            };
            bytes.push(b'\n');
            let (tx, rx) = oneshot::channel();
            if commands.send(Command::SendBytes(bytes, tx)).await.is_err() {
                return;
            }
            match rx.await {
                Ok(Ok(())) => debug!("ping reply sent"),
                Ok(Err(e)) => warn!(error = %e, "ping reply failed"),
                Err(_) => {}
            }
        });
    }

    async fn shutdown(&mut self, state: SessionState) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.shutdown().await;
        }
        for diagnostic in self.decoder.finish() {
            warn!(endpoint = %self.endpoint, %diagnostic, "at stream end");
        }
        self.raw_sinks.clear();
        self.message_sinks.clear();
        self.state = state;
    }
}

async fn read_chunk(
    socket: &mut Option<TcpStream>,
    buf: &mut BytesMut,
    limit: usize,
) -> std::io::Result<usize> {
    match socket.as_mut() {
        Some(socket) => {
            buf.reserve(limit);
            let mut limited = (&mut *buf).limit(limit);
            socket.read_buf(&mut limited).await
        }
        None => std::future::pending().await,
    }
}

async fn fan_out<T: Clone>(sinks: &mut Vec<mpsc::Sender<T>>, item: T) {
    let mut closed = Vec::new();
    for (index, sink) in sinks.iter().enumerate() {
        if sink.send(item.clone()).await.is_err() {
            closed.push(index);
        }
    }
    for index in closed.into_iter().rev() {
        sinks.remove(index);
    }
}
