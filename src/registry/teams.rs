//! Team registry worker.
//!
//! Teams are keyed by name; participants are keyed by email within their
//! team. When two `create_team` requests for the same name race, the
//! first one dequeued wins and the second fails with `team_exists`.

use crate::error::{DomainError, DomainResult};
use crate::kernel::{self, Mailbox, Worker};
use crate::model::{Participant, Team};
use crate::store::{SnapshotStore, TEAMS_FILE};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Events served by the team worker.
pub enum TeamEvent {
    Create {
        name: String,
        topic: String,
        reply_tx: oneshot::Sender<DomainResult<Team>>,
    },
    AddParticipant {
        team_name: String,
        person_name: String,
        email: String,
        reply_tx: oneshot::Sender<DomainResult<Team>>,
    },
    Get {
        name: String,
        reply_tx: oneshot::Sender<DomainResult<Team>>,
    },
    List {
        reply_tx: oneshot::Sender<Vec<Team>>,
    },
    Reset {
        reply_tx: oneshot::Sender<()>,
    },
}

/// The team worker: owns the name → team map and its snapshot file.
pub struct TeamRegistry {
    teams: HashMap<String, Team>,
    store: SnapshotStore,
}

impl TeamRegistry {
    pub fn new(store: SnapshotStore) -> Self {
        Self { teams: HashMap::new(), store }
    }

    async fn snapshot(&self) {
        if let Err(err) = self.store.write_map(TEAMS_FILE, &self.teams).await {
            warn!(error = %err, "team snapshot write failed");
        }
    }

    async fn handle_create(&mut self, name: String, topic: String) -> DomainResult<Team> {
        if self.teams.contains_key(&name) {
            return Err(DomainError::TeamExists(name));
        }
        let team = Team::new(name.clone(), topic);
        self.teams.insert(name, team.clone());
        self.snapshot().await;
        Ok(team)
    }

    async fn handle_add_participant(
        &mut self,
        team_name: String,
        person_name: String,
        email: String,
    ) -> DomainResult<Team> {
        let team = self
            .teams
            .get_mut(&team_name)
            .ok_or(DomainError::TeamNotFound(team_name))?;
        if team.participants.iter().any(|p| p.email == email) {
            return Err(DomainError::ParticipantDuplicate(email));
        }
        team.participants.insert(0, Participant { name: person_name, email });
        let updated = team.clone();
        self.snapshot().await;
        Ok(updated)
    }
}

#[async_trait]
impl Worker for TeamRegistry {
    type Event = TeamEvent;

    fn name(&self) -> &'static str {
        "teams"
    }

    async fn init(&mut self) {
        self.teams = self.store.read_map(TEAMS_FILE).await;
        info!(teams = self.teams.len(), "team registry loaded");
    }

    async fn handle(&mut self, event: TeamEvent) {
        match event {
            TeamEvent::Create { name, topic, reply_tx } => {
                let _ = reply_tx.send(self.handle_create(name, topic).await);
            }
            TeamEvent::AddParticipant { team_name, person_name, email, reply_tx } => {
                let _ = reply_tx.send(
                    self.handle_add_participant(team_name, person_name, email).await,
                );
            }
            TeamEvent::Get { name, reply_tx } => {
                let found = self
                    .teams
                    .get(&name)
                    .cloned()
                    .ok_or(DomainError::TeamNotFound(name));
                let _ = reply_tx.send(found);
            }
            TeamEvent::List { reply_tx } => {
                let mut teams: Vec<Team> = self.teams.values().cloned().collect();
                teams.sort_by(|a, b| a.name.cmp(&b.name));
                let _ = reply_tx.send(teams);
            }
            TeamEvent::Reset { reply_tx } => {
                self.teams.clear();
                self.snapshot().await;
                let _ = reply_tx.send(());
            }
        }
    }
}

/// Caller handle to the team worker.
#[derive(Clone)]
pub struct TeamsHandle {
    mailbox: Mailbox<TeamEvent>,
    timeout: Duration,
}

impl TeamsHandle {
    /// Spawn a supervised team worker over the given store.
    pub fn spawn(store: SnapshotStore) -> Self {
        let mailbox = kernel::spawn_supervised(move || TeamRegistry::new(store.clone()));
        Self { mailbox, timeout: super::CALL_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn create_team(&self, name: &str, topic: &str) -> DomainResult<Team> {
        let (name, topic) = (name.to_string(), topic.to_string());
        self.mailbox
            .call(|reply_tx| TeamEvent::Create { name, topic, reply_tx }, self.timeout)
            .await?
    }

    pub async fn add_participant(
        &self,
        team_name: &str,
        person_name: &str,
        email: &str,
    ) -> DomainResult<Team> {
        let team_name = team_name.to_string();
        let person_name = person_name.to_string();
        let email = email.to_string();
        self.mailbox
            .call(
                |reply_tx| TeamEvent::AddParticipant { team_name, person_name, email, reply_tx },
                self.timeout,
            )
            .await?
    }

    pub async fn get_team(&self, name: &str) -> DomainResult<Team> {
        let name = name.to_string();
        self.mailbox
            .call(|reply_tx| TeamEvent::Get { name, reply_tx }, self.timeout)
            .await?
    }

    pub async fn list_teams(&self) -> DomainResult<Vec<Team>> {
        Ok(self
            .mailbox
            .call(|reply_tx| TeamEvent::List { reply_tx }, self.timeout)
            .await?)
    }

    pub async fn reset(&self) -> DomainResult<()> {
        Ok(self
            .mailbox
            .call(|reply_tx| TeamEvent::Reset { reply_tx }, self.timeout)
            .await?)
    }
}
