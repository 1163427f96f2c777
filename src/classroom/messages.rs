use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::{Participant, Role, Session};
use super::service::{ClassroomState, SessionListing, SessionState};

/// Actions a client connection may send over the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    CreateRoom {
        name: String,
    },

    Join {
        room_id: String,
        name: String,
        email: String,
        role: Role,
    },

    StartClass {
        classroom_id: Uuid,
    },

    EndClass {
        session_id: Uuid,
    },

    LeaveSession {
        session_id: Uuid,
        participant_id: Uuid,
        role: Role,
    },

    LeaveRoom {
        room_id: String,
        participant_id: Uuid,
        role: Role,
    },

    JoinSession {
        session_id: Uuid,
        name: String,
        email: String,
        role: Role,
    },

    ListActiveSessions {
        room_id: Option<String>,
    },
}

/// State fanned back out to connected parties after a lifecycle call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    RoomCreated {
        classroom_id: Uuid,
        room_id: String,
    },

    Joined {
        participant: Participant,
    },

    RoomState {
        state: ClassroomState,
    },

    SessionStarted {
        session: Session,
    },

    SessionState {
        state: SessionState,
    },

    SessionEnded {
        session: Session,
    },

    ActiveSessions {
        sessions: Vec<SessionListing>,
    },

    Error {
        message: String,
    },
}
