use shared::domain::NoteId;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }

    /// Log line for a request the backend accepted.
    pub fn acknowledgement(self) -> &'static str {
        match self {
            MutationKind::Create => "note created",
            MutationKind::Update => "note updated",
            MutationKind::Delete => "note deleted",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("failed to fetch notes: {0}")]
    Fetch(String),
    #[error("{0}")]
    Validation(String),
    #[error("failed to {} note {note_id}: {message}", .operation.as_str())]
    Mutation {
        operation: MutationKind,
        note_id: NoteId,
        message: String,
    },
}

impl SyncError {
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_))
    }
}
