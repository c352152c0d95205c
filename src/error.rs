//! Unified error handling for hackd.
//!
//! Every registry operation returns a tagged `DomainError`; no panic
//! escapes into a caller's task. Kernel-level call failures (timeout,
//! dead worker) map into the same taxonomy so the façade surface stays
//! uniform.

use crate::kernel::CallError;
use thiserror::Error;

/// Domain-level failures, one variant per error kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("team already exists: {0}")]
    TeamExists(String),

    #[error("no such team: {0}")]
    TeamNotFound(String),

    #[error("participant already registered: {0}")]
    ParticipantDuplicate(String),

    #[error("project already exists for team: {0}")]
    ProjectExists(String),

    #[error("no project for team: {0}")]
    ProjectNotFound(String),

    #[error("no such mentor: {0}")]
    MentorNotFound(String),

    #[error("room already exists: {0}")]
    RoomExists(String),

    #[error("no such room: {0}")]
    RoomNotFound(String),

    #[error("chat server unavailable")]
    ChatUnavailable,

    #[error("call timed out")]
    Timeout,

    #[error("registry unavailable")]
    Unavailable,
}

impl DomainError {
    /// Stable error code for logging and CLI output.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TeamExists(_) => "team_exists",
            Self::TeamNotFound(_) => "team_not_found",
            Self::ParticipantDuplicate(_) => "participant_duplicate",
            Self::ProjectExists(_) => "project_exists",
            Self::ProjectNotFound(_) => "project_not_found",
            Self::MentorNotFound(_) => "mentor_not_found",
            Self::RoomExists(_) => "room_exists",
            Self::RoomNotFound(_) => "room_not_found",
            Self::ChatUnavailable => "chat_unavailable",
            Self::Timeout => "timeout",
            Self::Unavailable => "unavailable",
        }
    }
}

impl From<CallError> for DomainError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Timeout => Self::Timeout,
            CallError::Closed => Self::Unavailable,
        }
    }
}

/// Result type for registry and façade operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            DomainError::TeamExists("Alpha".into()).error_code(),
            "team_exists"
        );
        assert_eq!(
            DomainError::ParticipantDuplicate("a@x".into()).error_code(),
            "participant_duplicate"
        );
        assert_eq!(DomainError::ChatUnavailable.error_code(), "chat_unavailable");
    }

    #[test]
    fn test_call_error_mapping() {
        assert_eq!(DomainError::from(CallError::Timeout), DomainError::Timeout);
        assert_eq!(DomainError::from(CallError::Closed), DomainError::Unavailable);
    }
}
