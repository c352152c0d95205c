//! The unified entry API.
//!
//! `Hub` is a stateless dispatcher over the registries, the chat handle,
//! and the snapshot store. The only logic of its own is the system
//! surface: `reset` (wipe snapshots, then reset every component,
//! swallowing individual failures) and `persist_state` (aggregate a live
//! snapshot of everything, substituting defaults for non-responsive
//! registries so it never fails).

use crate::chat::{ChatHandle, Cluster, ClusterInfo, PubSub, PubSubEvent, SubscriberId};
use crate::error::DomainResult;
use crate::model::{
    ChatMessage, Mentor, Project, ProjectCategory, ProjectState, Team,
};
use crate::registry::{MentorsHandle, ProjectsHandle, TeamsHandle};
use crate::store::{
    PersistInfo, SnapshotStore, MENTORS_FILE, PROJECTS_FILE, TEAMS_FILE,
};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::warn;

/// The façade. Cheap to clone; all state lives behind the handles.
#[derive(Clone)]
pub struct Hub {
    store: SnapshotStore,
    pubsub: PubSub,
    cluster: Cluster,
    teams: TeamsHandle,
    projects: ProjectsHandle,
    mentors: MentorsHandle,
    chat: ChatHandle,
}

impl Hub {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: SnapshotStore,
        pubsub: PubSub,
        cluster: Cluster,
        teams: TeamsHandle,
        projects: ProjectsHandle,
        mentors: MentorsHandle,
        chat: ChatHandle,
    ) -> Self {
        Self { store, pubsub, cluster, teams, projects, mentors, chat }
    }

    // ------------------------------------------------------------------
    // Teams
    // ------------------------------------------------------------------

    pub async fn create_team(&self, name: &str, topic: &str) -> DomainResult<Team> {
        self.teams.create_team(name, topic).await
    }

    pub async fn add_participant(
        &self,
        team_name: &str,
        person_name: &str,
        email: &str,
    ) -> DomainResult<Team> {
        self.teams.add_participant(team_name, person_name, email).await
    }

    pub async fn get_team(&self, name: &str) -> DomainResult<Team> {
        self.teams.get_team(name).await
    }

    pub async fn list_teams(&self) -> DomainResult<Vec<Team>> {
        self.teams.list_teams().await
    }

    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    pub async fn create_project(
        &self,
        team_name: &str,
        description: &str,
        category: ProjectCategory,
    ) -> DomainResult<Project> {
        self.projects.create_project(team_name, description, category).await
    }

    pub async fn update_state(
        &self,
        team_name: &str,
        state: ProjectState,
    ) -> DomainResult<Project> {
        self.projects.update_state(team_name, state).await
    }

    pub async fn append_progress(&self, team_name: &str, text: &str) -> DomainResult<Project> {
        self.projects.append_progress(team_name, text).await
    }

    pub async fn append_feedback(
        &self,
        team_name: &str,
        mentor_name: &str,
        content: &str,
    ) -> DomainResult<Project> {
        self.projects.append_feedback(team_name, mentor_name, content).await
    }

    pub async fn get_project(&self, team_name: &str) -> DomainResult<Project> {
        self.projects.get_project(team_name).await
    }

    pub async fn list_by_category(
        &self,
        category: ProjectCategory,
    ) -> DomainResult<Vec<Project>> {
        self.projects.list_by_category(category).await
    }

    pub async fn list_by_state(&self, state: ProjectState) -> DomainResult<Vec<Project>> {
        self.projects.list_by_state(state).await
    }

    pub async fn list_projects(&self) -> DomainResult<Vec<Project>> {
        self.projects.list_all().await
    }

    // ------------------------------------------------------------------
    // Mentors
    // ------------------------------------------------------------------

    pub async fn register_mentor(&self, name: &str, specialty: &str) -> DomainResult<Mentor> {
        self.mentors.register_mentor(name, specialty).await
    }

    pub async fn send_feedback(
        &self,
        mentor_id: &str,
        team_name: &str,
        content: &str,
    ) -> DomainResult<Mentor> {
        self.mentors.send_feedback(mentor_id, team_name, content).await
    }

    pub async fn get_mentor(&self, id: &str) -> DomainResult<Mentor> {
        self.mentors.get_mentor(id).await
    }

    pub async fn list_mentors(&self) -> DomainResult<Vec<Mentor>> {
        self.mentors.list_mentors().await
    }

    pub async fn find_by_specialty(&self, specialty: &str) -> DomainResult<Vec<Mentor>> {
        self.mentors.find_by_specialty(specialty).await
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    pub async fn create_room(&self, name: &str) -> DomainResult<String> {
        self.chat.create_room(name).await
    }

    pub async fn send_message(
        &self,
        room: &str,
        author: &str,
        content: &str,
    ) -> DomainResult<()> {
        self.chat.send_message(room, author, content).await
    }

    pub async fn history(&self, room: &str) -> DomainResult<Vec<ChatMessage>> {
        self.chat.history(room).await
    }

    pub async fn list_rooms(&self) -> DomainResult<Vec<String>> {
        self.chat.list_rooms().await
    }

    pub fn subscribe(
        &self,
        room: &str,
    ) -> (SubscriberId, mpsc::UnboundedReceiver<PubSubEvent>) {
        self.chat.subscribe(room)
    }

    pub fn unsubscribe(&self, room: &str, id: SubscriberId) {
        self.chat.unsubscribe(room, id);
    }

    pub async fn chat_reset(&self) -> DomainResult<()> {
        self.chat.reset().await
    }

    pub fn cluster_info(&self) -> ClusterInfo {
        self.chat.cluster_info()
    }

    pub async fn connect_peer(&self, addr: &str) -> std::io::Result<String> {
        self.cluster.connect(addr).await
    }

    pub async fn ping_peers(&self) -> Vec<(String, bool)> {
        self.cluster.ping_peers().await
    }

    pub fn pubsub(&self) -> &PubSub {
        &self.pubsub
    }

    // ------------------------------------------------------------------
    // System
    // ------------------------------------------------------------------

    /// Wipe the snapshot directory, then reset every component. A
    /// component that fails to reset is logged and skipped.
    pub async fn reset(&self) {
        self.store.clear_all().await;
        if let Err(err) = self.teams.reset().await {
            warn!(error_code = err.error_code(), "team reset failed");
        }
        if let Err(err) = self.projects.reset().await {
            warn!(error_code = err.error_code(), "project reset failed");
        }
        if let Err(err) = self.mentors.reset().await {
            warn!(error_code = err.error_code(), "mentor reset failed");
        }
        if let Err(err) = self.chat.reset().await {
            warn!(error_code = err.error_code(), "chat reset failed");
        }
    }

    /// Write a live snapshot of every registry. Never fails: a registry
    /// that does not answer is replaced by an empty map, projects by the
    /// default placeholder entry.
    pub async fn persist_state(&self) -> PersistInfo {
        let teams: HashMap<String, Team> = match self.teams.list_teams().await {
            Ok(teams) => teams.into_iter().map(|t| (t.name.clone(), t)).collect(),
            Err(err) => {
                warn!(error_code = err.error_code(), "teams unavailable, persisting empty");
                HashMap::new()
            }
        };
        if let Err(err) = self.store.write_map(TEAMS_FILE, &teams).await {
            warn!(error = %err, "teams persist failed");
        }

        let projects: HashMap<String, Project> = match self.projects.list_all().await {
            Ok(projects) => projects
                .into_iter()
                .map(|p| (p.team_name.clone(), p))
                .collect(),
            Err(err) => {
                warn!(
                    error_code = err.error_code(),
                    "projects unavailable, persisting placeholder"
                );
                let placeholder = Project::placeholder();
                HashMap::from([(placeholder.team_name.clone(), placeholder)])
            }
        };
        if let Err(err) = self.store.write_map(PROJECTS_FILE, &projects).await {
            warn!(error = %err, "projects persist failed");
        }

        let mentors: HashMap<String, Mentor> = match self.mentors.list_mentors().await {
            Ok(mentors) => mentors.into_iter().map(|m| (m.id.clone(), m)).collect(),
            Err(err) => {
                warn!(error_code = err.error_code(), "mentors unavailable, persisting empty");
                HashMap::new()
            }
        };
        if let Err(err) = self.store.write_map(MENTORS_FILE, &mentors).await {
            warn!(error = %err, "mentors persist failed");
        }

        match self.chat.list_rooms().await {
            Ok(rooms) => {
                for room in &rooms {
                    match self.chat.history(room).await {
                        Ok(mut messages) => {
                            // History reads oldest-first; storage order is
                            // newest-first.
                            messages.reverse();
                            if let Err(err) = self.store.write_room(room, &messages).await {
                                warn!(room = %room, error = %err, "room persist failed");
                            }
                        }
                        Err(err) => {
                            warn!(room = %room, error_code = err.error_code(), "room skipped");
                        }
                    }
                }
                if let Err(err) = self.store.write_room_index(&rooms).await {
                    warn!(error = %err, "room index persist failed");
                }
            }
            Err(err) => {
                warn!(error_code = err.error_code(), "chat unavailable, persisting empty index");
                if let Err(err) = self.store.write_room_index(&[]).await {
                    warn!(error = %err, "room index persist failed");
                }
            }
        }

        self.store.persist_info().await
    }

    pub async fn persist_info(&self) -> PersistInfo {
        self.store.persist_info().await
    }

    pub async fn clear_all(&self) {
        self.store.clear_all().await;
    }
}
