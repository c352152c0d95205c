//! Mentor registry worker.
//!
//! Mentors are keyed by generated id; names are not unique and
//! registration never fails. `send_feedback` is the one cross-registry
//! write in the system: the mentor-side append commits first, then the
//! project registry is called. The two steps are not atomic: a project
//! failure is reported to the caller and the mentor append is kept.

use crate::error::{DomainError, DomainResult};
use crate::kernel::{self, Mailbox, Worker};
use crate::model::{Mentor, MentorFeedback};
use crate::registry::ProjectsHandle;
use crate::store::{SnapshotStore, MENTORS_FILE};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Events served by the mentor worker.
pub enum MentorEvent {
    Register {
        name: String,
        specialty: String,
        reply_tx: oneshot::Sender<Mentor>,
    },
    SendFeedback {
        mentor_id: String,
        team_name: String,
        content: String,
        reply_tx: oneshot::Sender<DomainResult<Mentor>>,
    },
    Get {
        id: String,
        reply_tx: oneshot::Sender<DomainResult<Mentor>>,
    },
    List {
        reply_tx: oneshot::Sender<Vec<Mentor>>,
    },
    FindBySpecialty {
        specialty: String,
        reply_tx: oneshot::Sender<Vec<Mentor>>,
    },
    Reset {
        reply_tx: oneshot::Sender<()>,
    },
}

/// The mentor worker: owns the id → mentor map, its snapshot file, and a
/// handle into the project registry for the feedback dual-write.
pub struct MentorRegistry {
    mentors: HashMap<String, Mentor>,
    store: SnapshotStore,
    projects: ProjectsHandle,
}

impl MentorRegistry {
    pub fn new(store: SnapshotStore, projects: ProjectsHandle) -> Self {
        Self { mentors: HashMap::new(), store, projects }
    }

    async fn snapshot(&self) {
        if let Err(err) = self.store.write_map(MENTORS_FILE, &self.mentors).await {
            warn!(error = %err, "mentor snapshot write failed");
        }
    }

    async fn handle_send_feedback(
        &mut self,
        mentor_id: String,
        team_name: String,
        content: String,
    ) -> DomainResult<Mentor> {
        let mentor = self
            .mentors
            .get_mut(&mentor_id)
            .ok_or(DomainError::MentorNotFound(mentor_id))?;
        mentor.feedback_given.insert(
            0,
            MentorFeedback {
                team_name: team_name.clone(),
                content: content.clone(),
                at: Utc::now(),
            },
        );
        let updated = mentor.clone();
        self.snapshot().await;

        // Second leg of the dual write. Not rolled back on failure.
        if let Err(err) = self
            .projects
            .append_feedback(&team_name, &updated.name, &content)
            .await
        {
            warn!(
                mentor = %updated.id,
                team = %team_name,
                error_code = err.error_code(),
                "project-side feedback append failed, mentor append kept"
            );
            return Err(err);
        }
        Ok(updated)
    }
}

#[async_trait]
impl Worker for MentorRegistry {
    type Event = MentorEvent;

    fn name(&self) -> &'static str {
        "mentors"
    }

    async fn init(&mut self) {
        self.mentors = self.store.read_map(MENTORS_FILE).await;
        info!(mentors = self.mentors.len(), "mentor registry loaded");
    }

    async fn handle(&mut self, event: MentorEvent) {
        match event {
            MentorEvent::Register { name, specialty, reply_tx } => {
                let mentor = Mentor::new(name, specialty);
                self.mentors.insert(mentor.id.clone(), mentor.clone());
                self.snapshot().await;
                let _ = reply_tx.send(mentor);
            }
            MentorEvent::SendFeedback { mentor_id, team_name, content, reply_tx } => {
                let result = self.handle_send_feedback(mentor_id, team_name, content).await;
                let _ = reply_tx.send(result);
            }
            MentorEvent::Get { id, reply_tx } => {
                let found = self
                    .mentors
                    .get(&id)
                    .cloned()
                    .ok_or(DomainError::MentorNotFound(id));
                let _ = reply_tx.send(found);
            }
            MentorEvent::List { reply_tx } => {
                let _ = reply_tx.send(self.list_sorted(|_| true));
            }
            MentorEvent::FindBySpecialty { specialty, reply_tx } => {
                let wanted = specialty.to_lowercase();
                let _ = reply_tx.send(self.list_sorted(|m| m.specialty.to_lowercase() == wanted));
            }
            MentorEvent::Reset { reply_tx } => {
                self.mentors.clear();
                self.snapshot().await;
                let _ = reply_tx.send(());
            }
        }
    }
}

impl MentorRegistry {
    fn list_sorted<F>(&self, keep: F) -> Vec<Mentor>
    where
        F: Fn(&Mentor) -> bool,
    {
        let mut mentors: Vec<Mentor> = self.mentors.values().filter(|m| keep(m)).cloned().collect();
        mentors.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        mentors
    }
}

/// Caller handle to the mentor worker.
#[derive(Clone)]
pub struct MentorsHandle {
    mailbox: Mailbox<MentorEvent>,
    timeout: Duration,
}

impl MentorsHandle {
    /// Spawn a supervised mentor worker over the given store, wired to the
    /// project registry for the feedback dual-write.
    pub fn spawn(store: SnapshotStore, projects: ProjectsHandle) -> Self {
        let mailbox = kernel::spawn_supervised(move || {
            MentorRegistry::new(store.clone(), projects.clone())
        });
        Self { mailbox, timeout: super::CALL_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a mentor. Never fails with a domain error: duplicate names
    /// are allowed by design.
    pub async fn register_mentor(&self, name: &str, specialty: &str) -> DomainResult<Mentor> {
        let (name, specialty) = (name.to_string(), specialty.to_string());
        Ok(self
            .mailbox
            .call(|reply_tx| MentorEvent::Register { name, specialty, reply_tx }, self.timeout)
            .await?)
    }

    pub async fn send_feedback(
        &self,
        mentor_id: &str,
        team_name: &str,
        content: &str,
    ) -> DomainResult<Mentor> {
        let mentor_id = mentor_id.to_string();
        let team_name = team_name.to_string();
        let content = content.to_string();
        self.mailbox
            .call(
                |reply_tx| MentorEvent::SendFeedback { mentor_id, team_name, content, reply_tx },
                self.timeout,
            )
            .await?
    }

    pub async fn get_mentor(&self, id: &str) -> DomainResult<Mentor> {
        let id = id.to_string();
        self.mailbox
            .call(|reply_tx| MentorEvent::Get { id, reply_tx }, self.timeout)
            .await?
    }

    pub async fn list_mentors(&self) -> DomainResult<Vec<Mentor>> {
        Ok(self
            .mailbox
            .call(|reply_tx| MentorEvent::List { reply_tx }, self.timeout)
            .await?)
    }

    /// Case-insensitive specialty match.
    pub async fn find_by_specialty(&self, specialty: &str) -> DomainResult<Vec<Mentor>> {
        let specialty = specialty.to_string();
        Ok(self
            .mailbox
            .call(
                |reply_tx| MentorEvent::FindBySpecialty { specialty, reply_tx },
                self.timeout,
            )
            .await?)
    }

    pub async fn reset(&self) -> DomainResult<()> {
        Ok(self
            .mailbox
            .call(|reply_tx| MentorEvent::Reset { reply_tx }, self.timeout)
            .await?)
    }
}
