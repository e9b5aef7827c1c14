//! Realtime message delivery.
//!
//! One connection per session is owned by [`ConnectionManager`]; views only see
//! it as an `Arc<dyn RealtimeChannel>`. The live transport is a Socket.IO v4
//! client (see [`crate::api::events`]). `join` and `send` are fire-and-forget:
//! nothing is queued, acknowledged or retried. Inbound `receiveMessage` frames
//! are dispatched to every registered handler in receipt order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message as WsFrame;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;

use crate::api::events::{
    connect_packet, decode_packet, socket_io_url, OutgoingEvent, OutgoingMessage, Packet, PONG,
};
use crate::api::models::Message;
use crate::error::{ChatError, Result};

pub type ReceiveHandler = Box<dyn Fn(&Message) + Send + Sync>;

pub trait RealtimeChannel: Send + Sync {
    /// Subscribe to pushes for a conversation room.
    fn join(&self, room_id: &str);

    /// Emit a message for delivery to its receiver.
    fn send(&self, message: &OutgoingMessage);

    /// Register a handler for inbound messages. It stays installed until the
    /// returned [`Subscription`] is dropped.
    fn on_receive(&self, handler: ReceiveHandler) -> Subscription;
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Handlers {
    next_id: u64,
    entries: Vec<(u64, Arc<dyn Fn(&Message) + Send + Sync>)>,
}

/// Handler table shared by the channel implementations.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    inner: Arc<Mutex<Handlers>>,
}

impl HandlerRegistry {
    pub fn register(&self, handler: ReceiveHandler) -> Subscription {
        let mut handlers = lock(&self.inner);
        handlers.next_id += 1;
        let id = handlers.next_id;
        handlers.entries.push((id, Arc::from(handler)));
        debug!("Registered receive handler #{} ({} active)", id, handlers.entries.len());
        Subscription { id, registry: Arc::downgrade(&self.inner) }
    }

    /// Invoke every handler once. Handlers run outside the lock so they may
    /// subscribe or unsubscribe themselves.
    pub fn dispatch(&self, message: &Message) {
        let handlers: Vec<_> = lock(&self.inner).entries.iter().map(|(_, h)| h.clone()).collect();
        for handler in handlers {
            handler(message);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registration handle returned by [`RealtimeChannel::on_receive`].
#[must_use = "dropping a Subscription deregisters its handler"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Handlers>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            let mut handlers = lock(&inner);
            handlers.entries.retain(|(id, _)| *id != self.id);
            debug!("Removed receive handler #{} ({} active)", self.id, handlers.entries.len());
        }
    }
}

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Socket.IO v4 client over a plain WebSocket (Engine.IO `websocket` transport).
pub struct WsChannel {
    outgoing: mpsc::UnboundedSender<String>,
    registry: HandlerRegistry,
    connected: Arc<AtomicBool>,
}

impl WsChannel {
    /// Open the socket at `server_url` (an `http(s)://` or `ws(s)://` address)
    /// and complete the Socket.IO CONNECT for the default namespace.
    pub async fn connect(server_url: &str, token: Option<&str>) -> Result<(Self, Vec<JoinHandle<()>>)> {
        let url = socket_io_url(server_url)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ChatError::Channel(e.to_string()))?;
        if let Some(t) = token.filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", t))
                .map_err(|e| ChatError::Config(e.to_string()))?;
            request.headers_mut().insert("Authorization", value);
        }
        let (mut ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| ChatError::Channel(e.to_string()))?;
        timeout(HANDSHAKE_TIMEOUT, handshake(&mut ws_stream, token))
            .await
            .map_err(|_| ChatError::Channel("handshake timed out".to_string()))??;
        info!("Realtime channel connected to {}", url);

        let (mut sink, mut stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let registry = HandlerRegistry::default();
        let connected = Arc::new(AtomicBool::new(true));

        let writer = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                debug!("ws -> {}", text);
                if let Err(e) = sink.send(WsFrame::Text(text)).await {
                    warn!("Realtime send failed, stopping writer: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = {
            let registry = registry.clone();
            let connected = connected.clone();
            let pong = tx.clone();
            tokio::spawn(async move {
                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(WsFrame::Text(text)) => {
                            if !handle_frame(&registry, &pong, &text) {
                                break;
                            }
                        }
                        Ok(WsFrame::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Realtime channel error: {}", e);
                            break;
                        }
                    }
                }
                connected.store(false, Ordering::SeqCst);
                info!("Realtime channel closed");
            })
        };

        let channel = Self { outgoing: tx, registry, connected };
        Ok((channel, vec![writer, reader]))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: OutgoingEvent) {
        if !self.is_connected() {
            warn!("Realtime channel is down, dropping '{}' event", event.name());
            return;
        }
        let text = match event.encode() {
            Ok(t) => t,
            Err(e) => {
                warn!("Could not encode '{}' event: {}", event.name(), e);
                return;
            }
        };
        if self.outgoing.send(text).is_err() {
            warn!("Realtime writer has stopped, frame dropped");
        }
    }
}

/// Wait for the Engine.IO OPEN, send CONNECT, and wait for the server's CONNECT.
async fn handshake<S>(ws: &mut S, token: Option<&str>) -> Result<()>
where
    S: Stream<Item = std::result::Result<WsFrame, WsError>> + Sink<WsFrame, Error = WsError> + Unpin,
{
    let mut connect_sent = false;
    while let Some(frame) = ws.next().await {
        let text = match frame.map_err(|e| ChatError::Channel(e.to_string()))? {
            WsFrame::Text(text) => text,
            WsFrame::Close(_) => break,
            _ => continue,
        };
        debug!("ws <- {}", text);
        match decode_packet(&text) {
            Packet::Open(_) if !connect_sent => {
                ws.send(WsFrame::Text(connect_packet(token)))
                    .await
                    .map_err(|e| ChatError::Channel(e.to_string()))?;
                connect_sent = true;
            }
            Packet::Ping => ws
                .send(WsFrame::Text(PONG.to_string()))
                .await
                .map_err(|e| ChatError::Channel(e.to_string()))?,
            Packet::Connect if connect_sent => return Ok(()),
            Packet::ConnectError(reason) => {
                return Err(ChatError::Channel(format!("connection refused: {}", reason)));
            }
            Packet::Close | Packet::Disconnect => break,
            other => debug!("Ignoring {:?} during handshake", other),
        }
    }
    Err(ChatError::Channel("connection closed during handshake".to_string()))
}

/// Returns false once the server has ended the session.
fn handle_frame(registry: &HandlerRegistry, outgoing: &mpsc::UnboundedSender<String>, text: &str) -> bool {
    debug!("ws <- {}", text);
    match decode_packet(text) {
        Packet::Ping => {
            let _ = outgoing.send(PONG.to_string());
        }
        Packet::Event(event) => {
            let name = event.event.clone();
            match event.into_message() {
                Some(message) => registry.dispatch(&message),
                None => debug!("Ignoring '{}' event", name),
            }
        }
        Packet::Close | Packet::Disconnect => {
            info!("Server ended the realtime session");
            return false;
        }
        Packet::ConnectError(reason) => {
            warn!("Realtime session rejected: {}", reason);
            return false;
        }
        Packet::Open(_) | Packet::Connect | Packet::Pong => {}
        Packet::Unknown(raw) => warn!("Ignoring undecodable frame: {}", raw),
    }
    true
}

impl RealtimeChannel for WsChannel {
    fn join(&self, room_id: &str) {
        self.emit(OutgoingEvent::Join(room_id.to_string()));
    }

    fn send(&self, message: &OutgoingMessage) {
        self.emit(OutgoingEvent::SendMessage(message.clone()));
    }

    fn on_receive(&self, handler: ReceiveHandler) -> Subscription {
        self.registry.register(handler)
    }
}

/// In-process channel: records what would have gone over the wire and lets
/// the caller push inbound messages by hand. Used offline and in tests.
#[derive(Default)]
pub struct LoopbackChannel {
    registry: HandlerRegistry,
    joined: Mutex<Vec<String>>,
    sent: Mutex<Vec<OutgoingMessage>>,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliver(&self, message: &Message) {
        self.registry.dispatch(message);
    }

    pub fn joined(&self) -> Vec<String> {
        lock(&self.joined).clone()
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        lock(&self.sent).clone()
    }

    pub fn handler_count(&self) -> usize {
        self.registry.len()
    }
}

impl RealtimeChannel for LoopbackChannel {
    fn join(&self, room_id: &str) {
        lock(&self.joined).push(room_id.to_string());
    }

    fn send(&self, message: &OutgoingMessage) {
        lock(&self.sent).push(message.clone());
    }

    fn on_receive(&self, handler: ReceiveHandler) -> Subscription {
        self.registry.register(handler)
    }
}

/// Owns the session's single realtime connection.
pub struct ConnectionManager {
    channel: Arc<dyn RealtimeChannel>,
    tasks: Vec<JoinHandle<()>>,
}

impl ConnectionManager {
    pub async fn init(socket_url: Option<&str>, token: Option<&str>) -> Result<Self> {
        match socket_url.filter(|u| !u.trim().is_empty()) {
            Some(url) => {
                let (channel, tasks) = WsChannel::connect(url, token).await?;
                Ok(Self { channel: Arc::new(channel), tasks })
            }
            None => {
                warn!("No socket URL configured, live delivery disabled");
                Ok(Self::loopback(Arc::new(LoopbackChannel::new())))
            }
        }
    }

    pub fn loopback(channel: Arc<LoopbackChannel>) -> Self {
        Self { channel, tasks: Vec::new() }
    }

    pub fn channel(&self) -> Arc<dyn RealtimeChannel> {
        self.channel.clone()
    }

    pub fn dispose(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!("Realtime connection disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: &Arc<AtomicUsize>) -> ReceiveHandler {
        let counter = counter.clone();
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn dropping_subscription_removes_only_its_handler() {
        let channel = LoopbackChannel::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let sub_a = channel.on_receive(counting(&a));
        let _sub_b = channel.on_receive(counting(&b));
        let msg = Message::optimistic("d1", "u1", "hi");

        channel.deliver(&msg);
        sub_a.unsubscribe();
        channel.deliver(&msg);

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 2);
        assert_eq!(channel.handler_count(), 1);
    }

    #[test]
    fn subscription_outliving_registry_is_harmless() {
        let sub = {
            let registry = HandlerRegistry::default();
            registry.register(Box::new(|_| {}))
        };
        drop(sub);
    }

    #[test]
    fn frames_dispatch_only_receive_events() {
        let registry = HandlerRegistry::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let hits = Arc::new(AtomicUsize::new(0));
        let _sub = registry.register(counting(&hits));

        assert!(handle_frame(&registry, &tx, r#"42["receiveMessage",{"from":"d1","to":"u1","content":"a"}]"#));
        assert!(handle_frame(&registry, &tx, r#"42["online",["d1"]]"#));
        assert!(handle_frame(&registry, &tx, "not json"));
        assert!(handle_frame(&registry, &tx, r#"42["receiveMessage",{"from":"d1"}]"#));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ping_is_answered_and_close_stops_the_reader() {
        let registry = HandlerRegistry::default();
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(handle_frame(&registry, &tx, "2"));
        assert_eq!(rx.try_recv().ok().as_deref(), Some(PONG));
        assert!(!handle_frame(&registry, &tx, "41"));
        assert!(!handle_frame(&registry, &tx, "1"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn init_without_socket_url_falls_back_to_loopback() {
        let manager = ConnectionManager::init(Some("  "), None).await.unwrap();
        let channel = manager.channel();
        channel.join("d1");
        manager.dispose();
    }
}
