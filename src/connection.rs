//! Websocket connection driver for one room session.
//!
//! DESIGN
//! ======
//! `Connection::open` performs the whole handshake inline: websocket connect,
//! Engine.IO open, namespace CONNECT, `join`, and the join acknowledgement.
//! Room events that arrive before the ack are folded as they come. Only a
//! joined session is handed to the driver task.
//!
//! The driver task owns the socket and the `Session` exclusively. Inbound
//! frames, local commands and the typing deadline are multiplexed in one
//! `select!` loop, so every fold and every emit happens on a single task in
//! arrival order. The UI reads state through a `watch` channel and learns
//! about asynchronous failures through the notice channel.
//!
//! TEARDOWN
//! ========
//! `close()` (or dropping the handle) sends `Leave`. The driver then flushes
//! the final `stopTyping`, deregisters handlers, sends the namespace
//! DISCONNECT and closes the websocket.
//! Transport loss runs the same session teardown but has nothing to flush.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use packets::{EnginePacket, SocketKind, SocketPacket};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::identity::JoinParams;
use crate::session::{AckOutcome, Change, Emit, RoomState, Session};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Failure surfaced after the session is live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// A `sendMessage` ack carried an error. The draft is kept.
    SendFailed(String),
    /// The transport closed or failed. The session is torn down.
    Disconnected(String),
}

enum Command {
    Input(String),
    Submit,
    Leave,
}

/// Handle to a joined room session.
pub struct Connection {
    id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<RoomState>,
    notices: mpsc::UnboundedReceiver<Notice>,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

impl Connection {
    /// Connect, join the room and start the driver task.
    ///
    /// # Errors
    ///
    /// - [`ChatError::InvalidEndpoint`] for an unusable backend URL
    /// - [`ChatError::Ws`] when the websocket cannot be opened
    /// - [`ChatError::JoinRejected`] when the server refuses the namespace or the join
    /// - [`ChatError::Timeout`] when the handshake exceeds `join_timeout`
    /// - [`ChatError::TransportLost`] when the server hangs up mid-handshake
    pub async fn open(config: &ChatConfig, params: JoinParams) -> Result<Self, ChatError> {
        let url = config.socket_url()?;
        let id = Uuid::new_v4();
        info!(connection_id = %id, %url, name = %params.name, room = %params.room, "connection: connecting");

        let mut session = Session::new(params, config.typing_idle);
        let stream = handshake(id, &url, &mut session, config.join_timeout).await?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(session.state().clone());

        let driver = Driver { id, stream, session, view: view_tx, notices: notice_tx };
        let task = tokio::spawn(driver.run(command_rx));

        Ok(Self { id, commands: command_tx, view: view_rx, notices: notice_rx, task: Some(task), closed: false })
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The draft changed.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Closed`] once the session is torn down.
    pub fn input(&self, text: &str) -> Result<(), ChatError> {
        self.command(Command::Input(text.to_owned()))
    }

    /// Send the current draft.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Closed`] once the session is torn down.
    pub fn submit(&self) -> Result<(), ChatError> {
        self.command(Command::Submit)
    }

    /// Snapshot of the rendered state.
    #[must_use]
    pub fn view(&self) -> RoomState {
        self.view.borrow().clone()
    }

    /// Receiver that wakes on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RoomState> {
        self.view.clone()
    }

    /// Next asynchronous failure, or `None` once the driver has stopped
    /// and every notice has been read.
    pub async fn next_notice(&mut self) -> Option<Notice> {
        self.notices.recv().await
    }

    /// Leave the room and wait for the driver to finish. Calling it again
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::TransportLost`] if the driver task panicked.
    pub async fn close(&mut self) -> Result<(), ChatError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.commands.send(Command::Leave).is_err() {
            debug!(connection_id = %self.id, "connection: driver already stopped");
        }
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| ChatError::TransportLost(format!("driver task failed: {e}")))?;
        }
        Ok(())
    }

    fn command(&self, command: Command) -> Result<(), ChatError> {
        if self.closed {
            return Err(ChatError::Closed);
        }
        self.commands.send(command).map_err(|_| ChatError::Closed)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if !self.closed && self.commands.send(Command::Leave).is_err() {
            debug!(connection_id = %self.id, "connection: dropped after driver stopped");
        }
    }
}

// =============================================================================
// HANDSHAKE
// =============================================================================

/// Upper bound on flushing the teardown of a failed join.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Connect and join within `limit`. A rejected or timed-out join is torn
/// down before returning.
async fn handshake(id: Uuid, url: &Url, session: &mut Session, limit: Duration) -> Result<WsStream, ChatError> {
    let deadline = Instant::now() + limit;
    let mut stream = match tokio::time::timeout_at(deadline, connect_async(url.as_str())).await {
        Ok(connected) => connected?.0,
        Err(_) => return Err(ChatError::Timeout("websocket connect")),
    };

    let error = match tokio::time::timeout_at(deadline, join(&mut stream, session)).await {
        Ok(Ok(())) => return Ok(stream),
        Ok(Err(error)) => error,
        Err(_) => ChatError::Timeout("join acknowledgement"),
    };
    warn!(connection_id = %id, %error, "connection: join failed");
    if tokio::time::timeout(SHUTDOWN_GRACE, shutdown(&mut stream, session)).await.is_err() {
        debug!(connection_id = %id, "connection: teardown flush timed out");
    }
    Err(error)
}

async fn join(stream: &mut WsStream, session: &mut Session) -> Result<(), ChatError> {
    loop {
        match next_engine(stream).await? {
            EnginePacket::Open(handshake) => {
                debug!(engine_sid = %handshake.sid, ping_interval = handshake.ping_interval, "connection: engine open");
                break;
            }
            EnginePacket::Close => return Err(ChatError::TransportLost("closed before open".to_owned())),
            other => debug!(?other, "connection: ignoring packet before open"),
        }
    }

    send_text(stream, packets::encode_message(&SocketPacket::connect())).await?;

    let sid = loop {
        let packet = next_socket(stream).await?;
        match packet.kind {
            SocketKind::Connect => break packet.sid().map(ToOwned::to_owned),
            SocketKind::ConnectError => {
                let reason = packet.error_message().unwrap_or_default();
                return Err(ChatError::JoinRejected(reason));
            }
            kind => debug!(?kind, "connection: ignoring packet before namespace connect"),
        }
    };
    info!(sid = ?sid, "connection: namespace connected");

    let Some(request) = session.connected(sid) else {
        return Err(ChatError::Closed);
    };
    send_emit(stream, &request).await?;

    loop {
        let packet = next_socket(stream).await?;
        match packet.kind {
            SocketKind::Event => {
                fold_event(session, packet);
            }
            SocketKind::Ack => {
                let Some(id) = packet.ack_id else {
                    continue;
                };
                if session.handle_ack(id, &packet.into_ack_args())? == AckOutcome::Joined {
                    return Ok(());
                }
            }
            SocketKind::Disconnect => {
                return Err(ChatError::TransportLost("namespace disconnected before join".to_owned()));
            }
            kind => debug!(?kind, "connection: ignoring packet while joining"),
        }
    }
}

/// Next Engine.IO packet from a text frame. Pings are answered here;
/// undecodable frames are logged and skipped. Only transport failures are
/// errors.
async fn next_engine(stream: &mut WsStream) -> Result<EnginePacket, ChatError> {
    loop {
        let Some(frame) = stream.next().await else {
            return Err(ChatError::TransportLost("stream ended".to_owned()));
        };
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(_) => return Err(ChatError::TransportLost("websocket closed".to_owned())),
            _ => continue,
        };
        match packets::decode_engine(text.as_str()) {
            Ok(EnginePacket::Ping(payload)) => pong(stream, payload).await?,
            Ok(packet) => return Ok(packet),
            Err(error) => warn!(%error, "connection: dropping undecodable frame while joining"),
        }
    }
}

/// Next Socket.IO packet carried in an Engine.IO message. Undecodable
/// packets are logged and skipped.
async fn next_socket(stream: &mut WsStream) -> Result<SocketPacket, ChatError> {
    loop {
        match next_engine(stream).await? {
            EnginePacket::Message(body) => match packets::decode_socket(&body) {
                Ok(packet) => return Ok(packet),
                Err(error) => warn!(%error, "connection: dropping undecodable packet while joining"),
            },
            EnginePacket::Close => return Err(ChatError::TransportLost("engine closed".to_owned())),
            _ => {}
        }
    }
}

/// Flush the session teardown, leave the namespace and close the websocket.
/// Failures are only logged: the socket is being abandoned either way.
async fn shutdown(stream: &mut WsStream, session: &mut Session) {
    for emit in session.teardown() {
        if let Err(error) = send_emit(stream, &emit).await {
            debug!(%error, event = emit.event.name(), "connection: teardown emit failed");
            break;
        }
    }
    if let Err(error) = send_text(stream, packets::encode_message(&SocketPacket::disconnect())).await {
        debug!(%error, "connection: namespace disconnect failed");
    }
    if let Err(error) = stream.close(None).await {
        debug!(%error, "connection: websocket close failed");
    }
}

// =============================================================================
// DRIVER
// =============================================================================

struct Driver {
    id: Uuid,
    stream: WsStream,
    session: Session,
    view: watch::Sender<RoomState>,
    notices: mpsc::UnboundedSender<Notice>,
}

enum Exit {
    Leave,
    Lost(String),
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let exit = loop {
            let deadline = self.session.typing_deadline();
            let step = tokio::select! {
                frame = self.stream.next() => self.on_frame(frame).await,
                command = commands.recv() => match command {
                    Some(Command::Input(text)) => {
                        let out = self.session.input_at(&text, Instant::now());
                        self.send_all(out).await
                    }
                    Some(Command::Submit) => {
                        let out = self.session.submit();
                        self.send_all(out).await
                    }
                    Some(Command::Leave) | None => break Exit::Leave,
                },
                () = typing_timer(deadline) => {
                    let out = self.session.poll_typing_at(Instant::now());
                    self.send_all(out).await
                }
            };
            if let Err(error) = step {
                break Exit::Lost(error.to_string());
            }
        };

        match exit {
            Exit::Leave => {
                shutdown(&mut self.stream, &mut self.session).await;
                info!(connection_id = %self.id, "connection: left room");
            }
            Exit::Lost(reason) => {
                let unsent = self.session.teardown();
                warn!(connection_id = %self.id, %reason, unsent = unsent.len(), "connection: transport lost");
                if self.notices.send(Notice::Disconnected(reason)).is_err() {
                    debug!(connection_id = %self.id, "connection: nobody listening for notices");
                }
            }
        }
        self.publish();
    }

    async fn on_frame(
        &mut self,
        frame: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    ) -> Result<(), ChatError> {
        let text = match frame {
            None => return Err(ChatError::TransportLost("stream ended".to_owned())),
            Some(Err(error)) => return Err(error.into()),
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) => return Err(ChatError::TransportLost("websocket closed".to_owned())),
            Some(Ok(_)) => return Ok(()),
        };

        match packets::decode_engine(text.as_str()) {
            Ok(EnginePacket::Ping(payload)) => pong(&mut self.stream, payload).await,
            Ok(EnginePacket::Close) => Err(ChatError::TransportLost("engine closed".to_owned())),
            Ok(EnginePacket::Message(body)) => self.on_socket(&body),
            Ok(_) => Ok(()),
            Err(error) => {
                warn!(connection_id = %self.id, %error, "connection: dropping undecodable frame");
                Ok(())
            }
        }
    }

    fn on_socket(&mut self, body: &str) -> Result<(), ChatError> {
        let packet = match packets::decode_socket(body) {
            Ok(packet) => packet,
            Err(error) => {
                warn!(connection_id = %self.id, %error, "connection: dropping undecodable packet");
                return Ok(());
            }
        };

        match packet.kind {
            SocketKind::Event => {
                if fold_event(&mut self.session, packet).is_some() {
                    self.publish();
                }
            }
            SocketKind::Ack => {
                let Some(id) = packet.ack_id else {
                    return Ok(());
                };
                match self.session.handle_ack(id, &packet.into_ack_args()) {
                    Ok(outcome) => debug!(connection_id = %self.id, ack_id = id, ?outcome, "connection: ack"),
                    Err(ChatError::SendFailed(reason)) => {
                        warn!(connection_id = %self.id, %reason, "connection: send failed");
                        if self.notices.send(Notice::SendFailed(reason)).is_err() {
                            debug!(connection_id = %self.id, "connection: nobody listening for notices");
                        }
                    }
                    Err(error) => warn!(connection_id = %self.id, %error, "connection: ack rejected"),
                }
                self.publish();
            }
            SocketKind::Disconnect => {
                return Err(ChatError::TransportLost("namespace disconnected".to_owned()));
            }
            kind => debug!(connection_id = %self.id, ?kind, "connection: ignoring packet"),
        }
        Ok(())
    }

    async fn send_all(&mut self, emits: Vec<Emit>) -> Result<(), ChatError> {
        for emit in emits {
            send_emit(&mut self.stream, &emit).await?;
        }
        Ok(())
    }

    fn publish(&self) {
        self.view.send_modify(|view| view.clone_from(self.session.state()));
    }
}

async fn typing_timer(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn fold_event(session: &mut Session, packet: SocketPacket) -> Option<Change> {
    let (event, args) = match packet.into_event() {
        Ok(parts) => parts,
        Err(error) => {
            warn!(%error, "connection: malformed event packet");
            return None;
        }
    };
    match session.handle_event(&event, args) {
        Ok(change) => change,
        Err(error) => {
            warn!(%event, %error, "connection: dropping malformed event");
            None
        }
    }
}

async fn send_emit(stream: &mut WsStream, emit: &Emit) -> Result<(), ChatError> {
    let packet = emit.event.to_packet(emit.ack_id)?;
    debug!(event = emit.event.name(), ack_id = ?emit.ack_id, "connection: emit");
    send_text(stream, packets::encode_message(&packet)).await
}

async fn pong(stream: &mut WsStream, payload: String) -> Result<(), ChatError> {
    send_text(stream, packets::encode_engine(&EnginePacket::Pong(payload))).await
}

async fn send_text(stream: &mut WsStream, text: String) -> Result<(), ChatError> {
    stream.send(Message::Text(text.into())).await?;
    Ok(())
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
