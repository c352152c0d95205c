//! Project registry worker.
//!
//! One project per team, keyed by team name. The key is opaque here: the
//! worker does not check that the referenced team exists. State changes
//! are value-checked only; any enumerated state may follow any other.

use crate::error::{DomainError, DomainResult};
use crate::kernel::{self, Mailbox, Worker};
use crate::model::{FeedbackEntry, Project, ProjectCategory, ProjectState};
use crate::store::{SnapshotStore, PROJECTS_FILE};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Events served by the project worker.
pub enum ProjectEvent {
    Create {
        team_name: String,
        description: String,
        category: ProjectCategory,
        reply_tx: oneshot::Sender<DomainResult<Project>>,
    },
    UpdateState {
        team_name: String,
        state: ProjectState,
        reply_tx: oneshot::Sender<DomainResult<Project>>,
    },
    AppendProgress {
        team_name: String,
        text: String,
        reply_tx: oneshot::Sender<DomainResult<Project>>,
    },
    AppendFeedback {
        team_name: String,
        mentor_name: String,
        content: String,
        reply_tx: oneshot::Sender<DomainResult<Project>>,
    },
    Get {
        team_name: String,
        reply_tx: oneshot::Sender<DomainResult<Project>>,
    },
    ListByCategory {
        category: ProjectCategory,
        reply_tx: oneshot::Sender<Vec<Project>>,
    },
    ListByState {
        state: ProjectState,
        reply_tx: oneshot::Sender<Vec<Project>>,
    },
    ListAll {
        reply_tx: oneshot::Sender<Vec<Project>>,
    },
    Reset {
        reply_tx: oneshot::Sender<()>,
    },
}

/// The project worker: owns the team_name → project map and its snapshot.
pub struct ProjectRegistry {
    projects: HashMap<String, Project>,
    store: SnapshotStore,
}

impl ProjectRegistry {
    pub fn new(store: SnapshotStore) -> Self {
        Self { projects: HashMap::new(), store }
    }

    async fn snapshot(&self) {
        if let Err(err) = self.store.write_map(PROJECTS_FILE, &self.projects).await {
            warn!(error = %err, "project snapshot write failed");
        }
    }

    async fn handle_create(
        &mut self,
        team_name: String,
        description: String,
        category: ProjectCategory,
    ) -> DomainResult<Project> {
        if self.projects.contains_key(&team_name) {
            return Err(DomainError::ProjectExists(team_name));
        }
        let project = Project::new(team_name.clone(), description, category);
        self.projects.insert(team_name, project.clone());
        self.snapshot().await;
        Ok(project)
    }

    /// Apply `mutate` to an existing project and persist the result.
    async fn handle_mutation<F>(&mut self, team_name: String, mutate: F) -> DomainResult<Project>
    where
        F: FnOnce(&mut Project),
    {
        let project = self
            .projects
            .get_mut(&team_name)
            .ok_or(DomainError::ProjectNotFound(team_name))?;
        mutate(project);
        let updated = project.clone();
        self.snapshot().await;
        Ok(updated)
    }

    fn list_sorted<F>(&self, keep: F) -> Vec<Project>
    where
        F: Fn(&Project) -> bool,
    {
        let mut projects: Vec<Project> = self.projects.values().filter(|p| keep(p)).cloned().collect();
        projects.sort_by(|a, b| a.team_name.cmp(&b.team_name));
        projects
    }
}

#[async_trait]
impl Worker for ProjectRegistry {
    type Event = ProjectEvent;

    fn name(&self) -> &'static str {
        "projects"
    }

    async fn init(&mut self) {
        self.projects = self.store.read_map(PROJECTS_FILE).await;
        info!(projects = self.projects.len(), "project registry loaded");
    }

    async fn handle(&mut self, event: ProjectEvent) {
        match event {
            ProjectEvent::Create { team_name, description, category, reply_tx } => {
                let _ = reply_tx.send(self.handle_create(team_name, description, category).await);
            }
            ProjectEvent::UpdateState { team_name, state, reply_tx } => {
                let result = self
                    .handle_mutation(team_name, |project| project.state = state)
                    .await;
                let _ = reply_tx.send(result);
            }
            ProjectEvent::AppendProgress { team_name, text, reply_tx } => {
                let result = self
                    .handle_mutation(team_name, |project| project.progress.insert(0, text))
                    .await;
                let _ = reply_tx.send(result);
            }
            ProjectEvent::AppendFeedback { team_name, mentor_name, content, reply_tx } => {
                let entry = FeedbackEntry { mentor_name, content, at: Utc::now() };
                let result = self
                    .handle_mutation(team_name, |project| project.feedback.insert(0, entry))
                    .await;
                let _ = reply_tx.send(result);
            }
            ProjectEvent::Get { team_name, reply_tx } => {
                let found = self
                    .projects
                    .get(&team_name)
                    .cloned()
                    .ok_or(DomainError::ProjectNotFound(team_name));
                let _ = reply_tx.send(found);
            }
            ProjectEvent::ListByCategory { category, reply_tx } => {
                let _ = reply_tx.send(self.list_sorted(|p| p.category == category));
            }
            ProjectEvent::ListByState { state, reply_tx } => {
                let _ = reply_tx.send(self.list_sorted(|p| p.state == state));
            }
            ProjectEvent::ListAll { reply_tx } => {
                let _ = reply_tx.send(self.list_sorted(|_| true));
            }
            ProjectEvent::Reset { reply_tx } => {
                self.projects.clear();
                self.snapshot().await;
                let _ = reply_tx.send(());
            }
        }
    }
}

/// Caller handle to the project worker.
#[derive(Clone)]
pub struct ProjectsHandle {
    mailbox: Mailbox<ProjectEvent>,
    timeout: Duration,
}

impl ProjectsHandle {
    /// Spawn a supervised project worker over the given store.
    pub fn spawn(store: SnapshotStore) -> Self {
        let mailbox = kernel::spawn_supervised(move || ProjectRegistry::new(store.clone()));
        Self { mailbox, timeout: super::CALL_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn create_project(
        &self,
        team_name: &str,
        description: &str,
        category: ProjectCategory,
    ) -> DomainResult<Project> {
        let team_name = team_name.to_string();
        let description = description.to_string();
        self.mailbox
            .call(
                |reply_tx| ProjectEvent::Create { team_name, description, category, reply_tx },
                self.timeout,
            )
            .await?
    }

    pub async fn update_state(&self, team_name: &str, state: ProjectState) -> DomainResult<Project> {
        let team_name = team_name.to_string();
        self.mailbox
            .call(
                |reply_tx| ProjectEvent::UpdateState { team_name, state, reply_tx },
                self.timeout,
            )
            .await?
    }

    pub async fn append_progress(&self, team_name: &str, text: &str) -> DomainResult<Project> {
        let team_name = team_name.to_string();
        let text = text.to_string();
        self.mailbox
            .call(
                |reply_tx| ProjectEvent::AppendProgress { team_name, text, reply_tx },
                self.timeout,
            )
            .await?
    }

    pub async fn append_feedback(
        &self,
        team_name: &str,
        mentor_name: &str,
        content: &str,
    ) -> DomainResult<Project> {
        let team_name = team_name.to_string();
        let mentor_name = mentor_name.to_string();
        let content = content.to_string();
        self.mailbox
            .call(
                |reply_tx| ProjectEvent::AppendFeedback { team_name, mentor_name, content, reply_tx },
                self.timeout,
            )
            .await?
    }

    pub async fn get_project(&self, team_name: &str) -> DomainResult<Project> {
        let team_name = team_name.to_string();
        self.mailbox
            .call(|reply_tx| ProjectEvent::Get { team_name, reply_tx }, self.timeout)
            .await?
    }

    pub async fn list_by_category(&self, category: ProjectCategory) -> DomainResult<Vec<Project>> {
        Ok(self
            .mailbox
            .call(|reply_tx| ProjectEvent::ListByCategory { category, reply_tx }, self.timeout)
            .await?)
    }

    pub async fn list_by_state(&self, state: ProjectState) -> DomainResult<Vec<Project>> {
        Ok(self
            .mailbox
            .call(|reply_tx| ProjectEvent::ListByState { state, reply_tx }, self.timeout)
            .await?)
    }

    pub async fn list_all(&self) -> DomainResult<Vec<Project>> {
        Ok(self
            .mailbox
            .call(|reply_tx| ProjectEvent::ListAll { reply_tx }, self.timeout)
            .await?)
    }

    pub async fn reset(&self) -> DomainResult<()> {
        Ok(self
            .mailbox
            .call(|reply_tx| ProjectEvent::Reset { reply_tx }, self.timeout)
            .await?)
    }
}
