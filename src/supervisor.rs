//! System bring-up.
//!
//! Strict start order: pubsub bus, cluster links, team registry, project
//! registry, chat (only when no holder is reachable anywhere in the
//! cluster), mentor registry. Every worker is spawned supervised: a
//! crashed worker is rebuilt and re-initializes from its snapshot while
//! its queue survives.

use crate::chat::{ChatHandle, ChatServer, ChatTarget, Cluster, PubSub};
use crate::config::{self, Config};
use crate::facade::Hub;
use crate::kernel;
use crate::registry::{MentorsHandle, ProjectsHandle, TeamsHandle};
use crate::store::SnapshotStore;
use tracing::{info, warn};

/// Bring the whole system up and hand back the façade.
pub async fn start(config: &Config) -> std::io::Result<Hub> {
    let store = SnapshotStore::new(config.storage.data_dir.clone());
    tokio::fs::create_dir_all(store.base()).await?;

    let pubsub = PubSub::new();

    let cluster = Cluster::new(
        config.node.name.clone(),
        config::cluster_cookie(),
        pubsub.clone(),
    );
    if let Some(listen) = &config.cluster.listen {
        cluster.listen(listen).await?;
    }
    for addr in &config.cluster.peers {
        match cluster.connect(addr).await {
            Ok(peer) => info!(peer = %peer, addr = %addr, "linked to peer"),
            Err(err) => warn!(addr = %addr, error = %err, "peer connect failed"),
        }
    }

    let teams = TeamsHandle::spawn(store.clone());
    let projects = ProjectsHandle::spawn(store.clone());

    // Chat election: start a local worker only when no holder exists.
    match cluster.resolve_chat().await {
        ChatTarget::Unavailable => {
            let chat_store = store.clone();
            let chat_pubsub = pubsub.clone();
            let mailbox = kernel::spawn_supervised(move || {
                ChatServer::new(chat_store.clone(), chat_pubsub.clone())
            });
            cluster.register_local_chat(mailbox);
        }
        ChatTarget::Remote(holder) => {
            info!(holder = %holder, "chat held remotely, forwarding");
        }
        ChatTarget::Local(_) => {}
    }
    let chat = ChatHandle::new(cluster.clone(), pubsub.clone());

    let mentors = MentorsHandle::spawn(store.clone(), projects.clone());

    info!(node = %config.node.name, "system started");
    Ok(Hub::new(store, pubsub, cluster, teams, projects, mentors, chat))
}
