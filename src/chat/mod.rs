//! Chat: rooms, history, pub/sub fan-out, and the cluster singleton.
//!
//! At most one chat worker exists across the cluster. The local pubsub
//! bus carries room traffic; in cluster mode the holder relays room
//! events to its peers so subscribers on any node see the same feed.

pub mod cluster;
pub mod handle;
pub mod pubsub;
pub mod server;

pub use cluster::{ChatOp, ChatReplyBody, ChatTarget, Cluster, ClusterInfo, CHAT_GLOBAL_NAME};
pub use handle::{ChatHandle, CHAT_CALL_TIMEOUT};
pub use pubsub::{room_topic, PubSub, PubSubEvent, SubscriberId, CLUSTER_TOPIC};
pub use server::{ChatEvent, ChatServer, GENERAL_ROOM};
