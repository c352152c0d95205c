//! Cluster links, global chat registration, and remote dispatch.
//!
//! Nodes link over TCP with one JSON message per line. A link starts with
//! a `hello`/`welcome` handshake carrying the shared cookie; a cookie
//! mismatch closes the link. After the handshake either side may send
//! requests (correlated by id), fire-and-forget casts, and relayed pubsub
//! events.
//!
//! The chat singleton is a well-known global name: the node that runs the
//! chat worker answers `where_is` queries with its own name, every other
//! node forwards chat traffic to the holder it resolved. When the holder
//! link drops, chat data is gone until a fresh start elects a new holder;
//! no state migrates.

use crate::chat::pubsub::{PubSub, PubSubEvent, CLUSTER_TOPIC};
use crate::chat::server::ChatEvent;
use crate::error::DomainError;
use crate::kernel::Mailbox;
use crate::model::ChatMessage;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The well-known global name of the chat singleton.
pub const CHAT_GLOBAL_NAME: &str = "chat";

/// Timeout for a single RPC round-trip on a peer link.
pub const LINK_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Chat operations as carried on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChatOp {
    CreateRoom { name: String },
    Send { room: String, author: String, content: String },
    History { room: String },
    ListRooms,
    Reset,
}

/// Chat replies as carried on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatReplyBody {
    Room { name: String },
    Rooms { rooms: Vec<String> },
    History { messages: Vec<ChatMessage> },
    Done,
    Fail { code: String, detail: String },
}

impl ChatReplyBody {
    pub fn fail(err: &DomainError) -> Self {
        let detail = match err {
            DomainError::RoomExists(name) | DomainError::RoomNotFound(name) => name.clone(),
            _ => String::new(),
        };
        Self::Fail { code: err.error_code().to_string(), detail }
    }
}

/// Reconstruct a domain error from a wire failure.
pub fn domain_from_fail(code: &str, detail: String) -> DomainError {
    match code {
        "room_exists" => DomainError::RoomExists(detail),
        "room_not_found" => DomainError::RoomNotFound(detail),
        "timeout" => DomainError::Timeout,
        "chat_unavailable" => DomainError::ChatUnavailable,
        _ => DomainError::Unavailable,
    }
}

/// One JSON line on a peer link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireMsg {
    Hello { node: String, cookie: String },
    Welcome { node: String, holds_chat: bool },
    WhereIs { id: String, name: String },
    WhereIsReply { id: String, holder: Option<String> },
    ChatRequest { id: String, op: ChatOp },
    ChatReply { id: String, body: ChatReplyBody },
    ChatCast { op: ChatOp },
    Event { topic: String, message: ChatMessage },
    Ping { id: String },
    Pong { id: String },
}

/// Where chat traffic should go from this node.
#[derive(Clone)]
pub enum ChatTarget {
    /// This node holds the singleton.
    Local(Mailbox<ChatEvent>),
    /// A linked peer holds it.
    Remote(String),
    /// No holder is reachable.
    Unavailable,
}

/// A node's view of the cluster, as reported by `cluster_info`.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterInfo {
    pub node: String,
    pub role: &'static str,
    pub chat_holder: Option<String>,
    pub peers: Vec<String>,
}

struct Peer {
    tx: mpsc::UnboundedSender<WireMsg>,
}

struct ClusterInner {
    node_name: String,
    cookie: String,
    pubsub: PubSub,
    peers: DashMap<String, Peer>,
    pending: DashMap<String, oneshot::Sender<WireMsg>>,
    chat_local: RwLock<Option<Mailbox<ChatEvent>>>,
    chat_holder: RwLock<Option<String>>,
}

/// Handle to this node's cluster state. Cheap to clone.
#[derive(Clone)]
pub struct Cluster {
    inner: Arc<ClusterInner>,
}

impl Cluster {
    pub fn new(node_name: impl Into<String>, cookie: impl Into<String>, pubsub: PubSub) -> Self {
        Self {
            inner: Arc::new(ClusterInner {
                node_name: node_name.into(),
                cookie: cookie.into(),
                pubsub,
                peers: DashMap::new(),
                pending: DashMap::new(),
                chat_local: RwLock::new(None),
                chat_holder: RwLock::new(None),
            }),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.inner.node_name
    }

    pub fn holds_chat(&self) -> bool {
        self.inner
            .chat_local
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    fn local_chat(&self) -> Option<Mailbox<ChatEvent>> {
        self.inner.chat_local.read().ok().and_then(|guard| guard.clone())
    }

    fn cached_holder(&self) -> Option<String> {
        self.inner.chat_holder.read().ok().and_then(|guard| guard.clone())
    }

    fn set_cached_holder(&self, holder: Option<String>) {
        if let Ok(mut guard) = self.inner.chat_holder.write() {
            *guard = holder;
        }
    }

    pub fn connected_peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.inner.peers.iter().map(|p| p.key().clone()).collect();
        peers.sort();
        peers
    }

    pub fn info(&self) -> ClusterInfo {
        let role = if self.holds_chat() { "holder" } else { "forwarder" };
        let chat_holder = if self.holds_chat() {
            Some(self.inner.node_name.clone())
        } else {
            self.cached_holder()
        };
        ClusterInfo {
            node: self.inner.node_name.clone(),
            role,
            chat_holder,
            peers: self.connected_peers(),
        }
    }

    /// Install the local chat worker under the global name and start
    /// relaying its published room events to every linked peer.
    pub fn register_local_chat(&self, mailbox: Mailbox<ChatEvent>) {
        if let Ok(mut guard) = self.inner.chat_local.write() {
            *guard = Some(mailbox);
        }
        let (relay_tx, mut relay_rx) = mpsc::unbounded_channel::<(String, PubSubEvent)>();
        self.inner.pubsub.set_relay(relay_tx);
        let cluster = self.clone();
        tokio::spawn(async move {
            while let Some((topic, event)) = relay_rx.recv().await {
                let PubSubEvent::NewMessage(message) = event else { continue };
                for peer in cluster.inner.peers.iter() {
                    let _ = peer.tx.send(WireMsg::Event {
                        topic: topic.clone(),
                        message: message.clone(),
                    });
                }
            }
        });
        info!(node = %self.inner.node_name, "registered as chat holder");
    }

    /// Accept peer links on `addr`.
    pub async fn listen(&self, addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(node = %self.inner.node_name, addr, "cluster listener up");
        let cluster = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer_addr)) => {
                        debug!(%peer_addr, "incoming peer link");
                        let cluster = cluster.clone();
                        tokio::spawn(async move {
                            cluster.accept_link(stream).await;
                        });
                    }
                    Err(err) => {
                        warn!(error = %err, "cluster accept failed");
                    }
                }
            }
        });
        Ok(())
    }

    /// Connect to a peer at `addr`. Returns the peer's node name.
    pub async fn connect(&self, addr: &str) -> std::io::Result<String> {
        let stream = TcpStream::connect(addr).await?;
        let mut framed = Framed::new(stream, LinesCodec::new());

        send_frame(
            &mut framed,
            &WireMsg::Hello {
                node: self.inner.node_name.clone(),
                cookie: self.inner.cookie.clone(),
            },
        )
        .await?;

        let (peer_name, holds_chat) = match read_frame(&mut framed).await? {
            Some(WireMsg::Welcome { node, holds_chat }) => (node, holds_chat),
            other => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unexpected handshake reply: {other:?}"),
                ));
            }
        };

        if holds_chat {
            self.set_cached_holder(Some(peer_name.clone()));
        }

        // Register the peer before returning so a holder cached above is
        // immediately resolvable.
        self.start_link(peer_name.clone(), framed);
        Ok(peer_name)
    }

    async fn accept_link(&self, stream: TcpStream) {
        let mut framed = Framed::new(stream, LinesCodec::new());
        let hello = match read_frame(&mut framed).await {
            Ok(Some(WireMsg::Hello { node, cookie })) => {
                if cookie != self.inner.cookie {
                    warn!(peer = %node, "peer rejected: cookie mismatch");
                    return;
                }
                node
            }
            other => {
                warn!(?other, "peer rejected: bad handshake");
                return;
            }
        };

        let welcome = WireMsg::Welcome {
            node: self.inner.node_name.clone(),
            holds_chat: self.holds_chat(),
        };
        if send_frame(&mut framed, &welcome).await.is_err() {
            return;
        }
        self.start_link(hello, framed);
    }

    /// Register a peer and spawn its link task. Registration happens
    /// synchronously so callers can rely on the peer being resolvable as
    /// soon as this returns.
    fn start_link(&self, peer_name: String, framed: Framed<TcpStream, LinesCodec>) {
        let (tx, rx) = mpsc::unbounded_channel::<WireMsg>();
        self.inner.peers.insert(peer_name.clone(), Peer { tx });
        self.inner
            .pubsub
            .publish_local(CLUSTER_TOPIC, PubSubEvent::NodeUp(peer_name.clone()));
        info!(peer = %peer_name, "peer link up");

        let cluster = self.clone();
        tokio::spawn(async move {
            cluster.serve_link(peer_name, framed, rx).await;
        });
    }

    /// Serve one established link until it drops.
    async fn serve_link(
        &self,
        peer_name: String,
        framed: Framed<TcpStream, LinesCodec>,
        mut rx: mpsc::UnboundedReceiver<WireMsg>,
    ) {
        let (mut sink, mut stream) = framed.split();

        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let line = match serde_json::to_string(&msg) {
                    Ok(line) => line,
                    Err(err) => {
                        warn!(error = %err, "wire encode failed");
                        continue;
                    }
                };
                if sink.send(line).await.is_err() {
                    break;
                }
            }
        });

        while let Some(item) = stream.next().await {
            let line = match item {
                Ok(line) => line,
                Err(err) => {
                    debug!(peer = %peer_name, error = %err, "link read failed");
                    break;
                }
            };
            match serde_json::from_str::<WireMsg>(&line) {
                Ok(msg) => self.handle_wire(&peer_name, msg),
                Err(err) => warn!(peer = %peer_name, error = %err, "undecodable wire message"),
            }
        }

        writer.abort();
        self.inner.peers.remove(&peer_name);
        if self.cached_holder().as_deref() == Some(peer_name.as_str()) {
            self.set_cached_holder(None);
        }
        self.inner
            .pubsub
            .publish_local(CLUSTER_TOPIC, PubSubEvent::NodeDown(peer_name.clone()));
        info!(peer = %peer_name, "peer link down");
    }

    fn handle_wire(&self, peer_name: &str, msg: WireMsg) {
        match msg {
            WireMsg::WhereIs { id, name } => {
                let holder = if name == CHAT_GLOBAL_NAME && self.holds_chat() {
                    Some(self.inner.node_name.clone())
                } else {
                    None
                };
                self.send_to_peer(peer_name, WireMsg::WhereIsReply { id, holder });
            }
            WireMsg::WhereIsReply { ref id, .. }
            | WireMsg::ChatReply { ref id, .. }
            | WireMsg::Pong { ref id } => {
                if let Some((_, reply_tx)) = self.inner.pending.remove(id) {
                    let _ = reply_tx.send(msg);
                }
            }
            WireMsg::ChatRequest { id, op } => {
                let cluster = self.clone();
                let peer = peer_name.to_string();
                tokio::spawn(async move {
                    let body = cluster.execute_local_chat(op).await;
                    cluster.send_to_peer(&peer, WireMsg::ChatReply { id, body });
                });
            }
            WireMsg::ChatCast { op } => {
                if let ChatOp::Send { room, author, content } = op {
                    match self.local_chat() {
                        Some(mailbox) => {
                            mailbox.cast(ChatEvent::Send { room, author, content });
                        }
                        None => warn!(peer = %peer_name, "chat cast but not the holder"),
                    }
                }
            }
            WireMsg::Event { topic, message } => {
                self.inner
                    .pubsub
                    .publish_local(&topic, PubSubEvent::NewMessage(message));
            }
            WireMsg::Ping { id } => {
                self.send_to_peer(peer_name, WireMsg::Pong { id });
            }
            WireMsg::Hello { .. } | WireMsg::Welcome { .. } => {
                debug!(peer = %peer_name, "stray handshake message ignored");
            }
        }
    }

    /// Run a chat operation against the local worker.
    async fn execute_local_chat(&self, op: ChatOp) -> ChatReplyBody {
        let Some(mailbox) = self.local_chat() else {
            return ChatReplyBody::fail(&DomainError::ChatUnavailable);
        };
        match op {
            ChatOp::CreateRoom { name } => {
                match mailbox
                    .call(|reply_tx| ChatEvent::CreateRoom { name, reply_tx }, LINK_CALL_TIMEOUT)
                    .await
                {
                    Ok(Ok(name)) => ChatReplyBody::Room { name },
                    Ok(Err(err)) => ChatReplyBody::fail(&err),
                    Err(err) => ChatReplyBody::fail(&DomainError::from(err)),
                }
            }
            ChatOp::Send { room, author, content } => {
                mailbox.cast(ChatEvent::Send { room, author, content });
                ChatReplyBody::Done
            }
            ChatOp::History { room } => {
                match mailbox
                    .call(|reply_tx| ChatEvent::History { room, reply_tx }, LINK_CALL_TIMEOUT)
                    .await
                {
                    Ok(Ok(messages)) => ChatReplyBody::History { messages },
                    Ok(Err(err)) => ChatReplyBody::fail(&err),
                    Err(err) => ChatReplyBody::fail(&DomainError::from(err)),
                }
            }
            ChatOp::ListRooms => {
                match mailbox
                    .call(|reply_tx| ChatEvent::ListRooms { reply_tx }, LINK_CALL_TIMEOUT)
                    .await
                {
                    Ok(rooms) => ChatReplyBody::Rooms { rooms },
                    Err(err) => ChatReplyBody::fail(&DomainError::from(err)),
                }
            }
            ChatOp::Reset => {
                match mailbox
                    .call(|reply_tx| ChatEvent::Reset { reply_tx }, LINK_CALL_TIMEOUT)
                    .await
                {
                    Ok(()) => ChatReplyBody::Done,
                    Err(err) => ChatReplyBody::fail(&DomainError::from(err)),
                }
            }
        }
    }

    fn send_to_peer(&self, peer_name: &str, msg: WireMsg) -> bool {
        match self.inner.peers.get(peer_name) {
            Some(peer) => peer.tx.send(msg).is_ok(),
            None => false,
        }
    }

    async fn request(&self, peer_name: &str, msg: WireMsg, id: String) -> Option<WireMsg> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner.pending.insert(id.clone(), reply_tx);
        if !self.send_to_peer(peer_name, msg) {
            self.inner.pending.remove(&id);
            return None;
        }
        match tokio::time::timeout(LINK_CALL_TIMEOUT, reply_rx).await {
            Ok(Ok(reply)) => Some(reply),
            _ => {
                self.inner.pending.remove(&id);
                None
            }
        }
    }

    /// Resolve where chat traffic goes. Local worker wins; otherwise the
    /// cached holder if its link is still up; otherwise ask every live
    /// peer once. `Unavailable` maps to `chat_unavailable` at the caller.
    pub async fn resolve_chat(&self) -> ChatTarget {
        if let Some(mailbox) = self.local_chat() {
            return ChatTarget::Local(mailbox);
        }
        if let Some(holder) = self.cached_holder() {
            if self.inner.peers.contains_key(&holder) {
                return ChatTarget::Remote(holder);
            }
            self.set_cached_holder(None);
        }
        for peer in self.connected_peers() {
            let id = Uuid::new_v4().to_string();
            let query = WireMsg::WhereIs { id: id.clone(), name: CHAT_GLOBAL_NAME.to_string() };
            if let Some(WireMsg::WhereIsReply { holder: Some(holder), .. }) =
                self.request(&peer, query, id).await
            {
                self.set_cached_holder(Some(holder.clone()));
                return ChatTarget::Remote(holder);
            }
        }
        ChatTarget::Unavailable
    }

    /// Forward a chat call to the holder peer.
    pub async fn remote_chat_request(&self, peer_name: &str, op: ChatOp) -> Option<ChatReplyBody> {
        let id = Uuid::new_v4().to_string();
        let msg = WireMsg::ChatRequest { id: id.clone(), op };
        match self.request(peer_name, msg, id).await {
            Some(WireMsg::ChatReply { body, .. }) => Some(body),
            _ => None,
        }
    }

    /// Forward the send cast to the holder peer. Returns delivery.
    pub fn remote_chat_cast(&self, peer_name: &str, op: ChatOp) -> bool {
        self.send_to_peer(peer_name, WireMsg::ChatCast { op })
    }

    /// Round-trip a ping to every connected peer.
    pub async fn ping_peers(&self) -> Vec<(String, bool)> {
        let mut results = Vec::new();
        for peer in self.connected_peers() {
            let id = Uuid::new_v4().to_string();
            let reply = self.request(&peer, WireMsg::Ping { id: id.clone() }, id).await;
            results.push((peer, matches!(reply, Some(WireMsg::Pong { .. }))));
        }
        results
    }
}

async fn send_frame(
    framed: &mut Framed<TcpStream, LinesCodec>,
    msg: &WireMsg,
) -> std::io::Result<()> {
    let line = serde_json::to_string(msg)?;
    framed
        .send(line)
        .await
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::BrokenPipe, err))
}

async fn read_frame(
    framed: &mut Framed<TcpStream, LinesCodec>,
) -> std::io::Result<Option<WireMsg>> {
    match framed.next().await {
        Some(Ok(line)) => {
            let msg = serde_json::from_str(&line)?;
            Ok(Some(msg))
        }
        Some(Err(err)) => Err(std::io::Error::new(std::io::ErrorKind::InvalidData, err)),
        None => Ok(None),
    }
}
