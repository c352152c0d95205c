//! Transparent chat dispatch.
//!
//! One handle, two backends: the local chat worker when this node holds
//! the singleton, or a forwarded RPC to the holder peer otherwise. Every
//! operation resolves the holder first; with nobody reachable the call
//! fails `chat_unavailable` instead of blocking or spawning a local
//! server.

use crate::chat::cluster::{domain_from_fail, ChatOp, ChatReplyBody, ChatTarget, Cluster, ClusterInfo};
use crate::chat::pubsub::{room_topic, PubSub, PubSubEvent, SubscriberId};
use crate::chat::server::ChatEvent;
use crate::error::{DomainError, DomainResult};
use crate::model::ChatMessage;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default caller-side timeout for chat calls.
pub const CHAT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Caller handle to the (possibly remote) chat server.
#[derive(Clone)]
pub struct ChatHandle {
    cluster: Cluster,
    pubsub: PubSub,
    timeout: Duration,
}

impl ChatHandle {
    pub fn new(cluster: Cluster, pubsub: PubSub) -> Self {
        Self { cluster, pubsub, timeout: CHAT_CALL_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn create_room(&self, name: &str) -> DomainResult<String> {
        match self.cluster.resolve_chat().await {
            ChatTarget::Local(mailbox) => {
                let name = name.to_string();
                mailbox
                    .call(|reply_tx| ChatEvent::CreateRoom { name, reply_tx }, self.timeout)
                    .await?
            }
            ChatTarget::Remote(holder) => {
                let op = ChatOp::CreateRoom { name: name.to_string() };
                match self.cluster.remote_chat_request(&holder, op).await {
                    Some(ChatReplyBody::Room { name }) => Ok(name),
                    Some(ChatReplyBody::Fail { code, detail }) => {
                        Err(domain_from_fail(&code, detail))
                    }
                    _ => Err(DomainError::ChatUnavailable),
                }
            }
            ChatTarget::Unavailable => Err(DomainError::ChatUnavailable),
        }
    }

    /// Fire-and-forget send. A missing room is silently dropped by the
    /// holder; an unreachable holder fails `chat_unavailable`.
    pub async fn send_message(&self, room: &str, author: &str, content: &str) -> DomainResult<()> {
        match self.cluster.resolve_chat().await {
            ChatTarget::Local(mailbox) => {
                let delivered = mailbox.cast(ChatEvent::Send {
                    room: room.to_string(),
                    author: author.to_string(),
                    content: content.to_string(),
                });
                if delivered {
                    Ok(())
                } else {
                    Err(DomainError::ChatUnavailable)
                }
            }
            ChatTarget::Remote(holder) => {
                let op = ChatOp::Send {
                    room: room.to_string(),
                    author: author.to_string(),
                    content: content.to_string(),
                };
                if self.cluster.remote_chat_cast(&holder, op) {
                    Ok(())
                } else {
                    Err(DomainError::ChatUnavailable)
                }
            }
            ChatTarget::Unavailable => Err(DomainError::ChatUnavailable),
        }
    }

    /// Room history, oldest-first.
    pub async fn history(&self, room: &str) -> DomainResult<Vec<ChatMessage>> {
        match self.cluster.resolve_chat().await {
            ChatTarget::Local(mailbox) => {
                let room = room.to_string();
                mailbox
                    .call(|reply_tx| ChatEvent::History { room, reply_tx }, self.timeout)
                    .await?
            }
            ChatTarget::Remote(holder) => {
                let op = ChatOp::History { room: room.to_string() };
                match self.cluster.remote_chat_request(&holder, op).await {
                    Some(ChatReplyBody::History { messages }) => Ok(messages),
                    Some(ChatReplyBody::Fail { code, detail }) => {
                        Err(domain_from_fail(&code, detail))
                    }
                    _ => Err(DomainError::ChatUnavailable),
                }
            }
            ChatTarget::Unavailable => Err(DomainError::ChatUnavailable),
        }
    }

    pub async fn list_rooms(&self) -> DomainResult<Vec<String>> {
        match self.cluster.resolve_chat().await {
            ChatTarget::Local(mailbox) => Ok(mailbox
                .call(|reply_tx| ChatEvent::ListRooms { reply_tx }, self.timeout)
                .await?),
            ChatTarget::Remote(holder) => {
                match self.cluster.remote_chat_request(&holder, ChatOp::ListRooms).await {
                    Some(ChatReplyBody::Rooms { rooms }) => Ok(rooms),
                    Some(ChatReplyBody::Fail { code, detail }) => {
                        Err(domain_from_fail(&code, detail))
                    }
                    _ => Err(DomainError::ChatUnavailable),
                }
            }
            ChatTarget::Unavailable => Err(DomainError::ChatUnavailable),
        }
    }

    pub async fn reset(&self) -> DomainResult<()> {
        match self.cluster.resolve_chat().await {
            ChatTarget::Local(mailbox) => Ok(mailbox
                .call(|reply_tx| ChatEvent::Reset { reply_tx }, self.timeout)
                .await?),
            ChatTarget::Remote(holder) => {
                match self.cluster.remote_chat_request(&holder, ChatOp::Reset).await {
                    Some(ChatReplyBody::Done) => Ok(()),
                    Some(ChatReplyBody::Fail { code, detail }) => {
                        Err(domain_from_fail(&code, detail))
                    }
                    _ => Err(DomainError::ChatUnavailable),
                }
            }
            ChatTarget::Unavailable => Err(DomainError::ChatUnavailable),
        }
    }

    /// Live feed for one room. Local-node subscription: relayed events
    /// from the holder arrive on the same topic.
    pub fn subscribe(&self, room: &str) -> (SubscriberId, mpsc::UnboundedReceiver<PubSubEvent>) {
        self.pubsub.subscribe(&room_topic(room))
    }

    pub fn unsubscribe(&self, room: &str, id: SubscriberId) {
        self.pubsub.unsubscribe(&room_topic(room), id);
    }

    pub fn cluster_info(&self) -> ClusterInfo {
        self.cluster.info()
    }
}
