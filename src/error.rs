use thiserror::Error;
use uuid::Uuid;

/// Custom error types for the classroom server
#[derive(Debug, Error)]
pub enum ClassroomError {
    /// Room and session lookup errors
    #[error("Class room {0} not found")]
    RoomNotFound(String),

    #[error("Session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Participant {0} not found")]
    ParticipantNotFound(Uuid),

    /// Membership precondition errors
    #[error("Class room {0} is not active")]
    InactiveRoom(String),

    #[error("Participant {0} is already a member of this class room")]
    DuplicateParticipant(String),

    #[error("Participant {0} is already in this session")]
    AlreadyInSession(String),

    #[error("Session {0} has no owning class room")]
    MissingClassroom(Uuid),

    /// Authorization errors
    #[error("Participant {0} is not authorized for this operation")]
    Unauthorized(Uuid),

    /// Signaling errors
    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Storage errors
    #[error("Storage failure: {0}")]
    Storage(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Convenience type alias for Results using ClassroomError
pub type Result<T> = std::result::Result<T, ClassroomError>;

impl ClassroomError {
    /// Helper to create Storage errors with context
    pub fn storage(msg: impl Into<String>) -> Self {
        ClassroomError::Storage(msg.into())
    }
}
