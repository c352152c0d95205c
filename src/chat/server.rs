//! The chat server worker.
//!
//! Owns every room's newest-first history. There is at most one chat
//! worker in the whole cluster; non-holder nodes forward to it over their
//! peer links. `send` is the sole cast in the system: a message to a
//! missing room is dropped and logged, never an error. After a message is
//! appended (and the room file persisted) it is published on the
//! `chat:<room>` topic.

use crate::chat::pubsub::{room_topic, PubSub, PubSubEvent};
use crate::error::{DomainError, DomainResult};
use crate::kernel::Worker;
use crate::model::ChatMessage;
use crate::store::SnapshotStore;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// The room every fresh chat server starts with.
pub const GENERAL_ROOM: &str = "general";

/// Events served by the chat worker.
pub enum ChatEvent {
    CreateRoom {
        name: String,
        reply_tx: oneshot::Sender<DomainResult<String>>,
    },
    /// Fire-and-forget; the only event without a reply.
    Send {
        room: String,
        author: String,
        content: String,
    },
    History {
        room: String,
        reply_tx: oneshot::Sender<DomainResult<Vec<ChatMessage>>>,
    },
    ListRooms {
        reply_tx: oneshot::Sender<Vec<String>>,
    },
    Reset {
        reply_tx: oneshot::Sender<()>,
    },
}

/// The chat worker state: room name → newest-first history.
pub struct ChatServer {
    rooms: HashMap<String, Vec<ChatMessage>>,
    store: SnapshotStore,
    pubsub: PubSub,
}

impl ChatServer {
    pub fn new(store: SnapshotStore, pubsub: PubSub) -> Self {
        Self { rooms: HashMap::new(), store, pubsub }
    }

    async fn persist_index(&self) {
        let mut names: Vec<String> = self.rooms.keys().cloned().collect();
        names.sort();
        if let Err(err) = self.store.write_room_index(&names).await {
            warn!(error = %err, "room index write failed");
        }
    }

    async fn persist_room(&self, room: &str) {
        let Some(messages) = self.rooms.get(room) else { return };
        if let Err(err) = self.store.write_room(room, messages).await {
            warn!(room, error = %err, "room snapshot write failed");
        }
    }

    async fn handle_create_room(&mut self, name: String) -> DomainResult<String> {
        if self.rooms.contains_key(&name) {
            return Err(DomainError::RoomExists(name));
        }
        self.rooms.insert(name.clone(), Vec::new());
        self.persist_room(&name).await;
        self.persist_index().await;
        info!(room = %name, "room created");
        Ok(name)
    }

    async fn handle_send(&mut self, room: String, author: String, content: String) {
        let Some(messages) = self.rooms.get_mut(&room) else {
            warn!(room = %room, author = %author, "message to unknown room dropped");
            return;
        };
        let message = ChatMessage::new(room.clone(), author, content);
        messages.insert(0, message.clone());
        self.persist_room(&room).await;
        // Broadcast strictly after the append is durable.
        self.pubsub
            .publish(&room_topic(&room), PubSubEvent::NewMessage(message));
        debug!(room = %room, "message appended");
    }

    async fn handle_reset(&mut self) {
        self.rooms.clear();
        self.rooms.insert(GENERAL_ROOM.to_string(), Vec::new());
        self.store.clear_chat().await;
        self.persist_room(GENERAL_ROOM).await;
        self.persist_index().await;
        info!("chat reset to a single empty general room");
    }
}

#[async_trait]
impl Worker for ChatServer {
    type Event = ChatEvent;

    fn name(&self) -> &'static str {
        "chat"
    }

    async fn init(&mut self) {
        for room in self.store.read_room_index().await {
            let messages = self.store.read_room(&room).await;
            self.rooms.insert(room, messages);
        }
        if !self.rooms.contains_key(GENERAL_ROOM) {
            self.rooms.insert(GENERAL_ROOM.to_string(), Vec::new());
            self.persist_room(GENERAL_ROOM).await;
            self.persist_index().await;
        }
        info!(rooms = self.rooms.len(), "chat server loaded");
    }

    async fn handle(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::CreateRoom { name, reply_tx } => {
                let _ = reply_tx.send(self.handle_create_room(name).await);
            }
            ChatEvent::Send { room, author, content } => {
                self.handle_send(room, author, content).await;
            }
            ChatEvent::History { room, reply_tx } => {
                // Stored newest-first; read out oldest-first.
                let history = self
                    .rooms
                    .get(&room)
                    .map(|messages| messages.iter().rev().cloned().collect())
                    .ok_or(DomainError::RoomNotFound(room));
                let _ = reply_tx.send(history);
            }
            ChatEvent::ListRooms { reply_tx } => {
                let mut names: Vec<String> = self.rooms.keys().cloned().collect();
                names.sort();
                let _ = reply_tx.send(names);
            }
            ChatEvent::Reset { reply_tx } => {
                self.handle_reset().await;
                let _ = reply_tx.send(());
            }
        }
    }
}
