//! Domain records for the collaboration registries.
//!
//! Every record is a plain serde struct; registries key them by their
//! natural key (team name, project team_name, mentor id, room name).
//! Append-only sequences (participants, progress, feedback, room history)
//! are stored newest-first: the most recent entry is at index 0.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generate a random 8-hex identifier.
pub fn short_id() -> String {
    format!("{:08x}", rand::random::<u32>())
}

/// A registered hackathon team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub topic: String,
    /// Newest-first. Email is unique within the team.
    #[serde(default)]
    pub participants: Vec<Participant>,
    pub created_at: DateTime<Utc>,
}

impl Team {
    pub fn new(name: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id: short_id(),
            name: name.into(),
            topic: topic.into(),
            participants: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// A member of a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub email: String,
}

/// Project category. The wire form is the lowercase Spanish token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectCategory {
    Social,
    Ambiental,
    Educativo,
}

impl fmt::Display for ProjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Social => "social",
            Self::Ambiental => "ambiental",
            Self::Educativo => "educativo",
        };
        f.write_str(token)
    }
}

impl FromStr for ProjectCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "social" => Ok(Self::Social),
            "ambiental" => Ok(Self::Ambiental),
            "educativo" => Ok(Self::Educativo),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Project lifecycle state. Any enumerated value may be set from any other;
/// rejection is value-based and happens at the string boundary (`FromStr`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectState {
    Iniciado,
    EnProgreso,
    Completado,
}

impl fmt::Display for ProjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Iniciado => "iniciado",
            Self::EnProgreso => "en_progreso",
            Self::Completado => "completado",
        };
        f.write_str(token)
    }
}

impl FromStr for ProjectState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iniciado" => Ok(Self::Iniciado),
            "en_progreso" => Ok(Self::EnProgreso),
            "completado" => Ok(Self::Completado),
            other => Err(format!("unknown state: {other}")),
        }
    }
}

/// A team's project. Keyed by `team_name`, which the registry treats as an
/// opaque key: the referenced team is not required to exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub team_name: String,
    pub description: String,
    pub category: ProjectCategory,
    pub state: ProjectState,
    /// Newest-first progress notes.
    #[serde(default)]
    pub progress: Vec<String>,
    /// Newest-first mentor feedback.
    #[serde(default)]
    pub feedback: Vec<FeedbackEntry>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        team_name: impl Into<String>,
        description: impl Into<String>,
        category: ProjectCategory,
    ) -> Self {
        Self {
            id: short_id(),
            team_name: team_name.into(),
            description: description.into(),
            category,
            state: ProjectState::Iniciado,
            progress: Vec::new(),
            feedback: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Placeholder written by the snapshot aggregator when the project
    /// registry is momentarily non-responsive.
    pub fn placeholder() -> Self {
        Self::new("default", "placeholder", ProjectCategory::Social)
    }
}

/// Feedback attached to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub mentor_name: String,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// A mentor. Names are not unique; the id is the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mentor {
    pub id: String,
    pub name: String,
    pub specialty: String,
    /// Newest-first record of feedback this mentor has given.
    #[serde(default)]
    pub feedback_given: Vec<MentorFeedback>,
}

impl Mentor {
    pub fn new(name: impl Into<String>, specialty: impl Into<String>) -> Self {
        Self {
            id: short_id(),
            name: name.into(),
            specialty: specialty.into(),
            feedback_given: Vec::new(),
        }
    }
}

/// Feedback as recorded on the mentor side of the dual write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorFeedback {
    pub team_name: String,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// An immutable chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub author: String,
    pub content: String,
    pub room: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        room: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: short_id(),
            author: author.into(),
            content: content.into(),
            room: room.into(),
            timestamp: Utc::now(),
        }
    }
}
