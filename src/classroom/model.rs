use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

/// A person identified by email, reusable across rooms and sessions.
/// Role is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Payload supplied by a client when joining; resolved to a stored
/// `Participant` by email before any membership change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewParticipant {
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl NewParticipant {
    pub fn into_participant(self) -> Participant {
        Participant {
            id: Uuid::new_v4(),
            name: self.name,
            email: self.email,
            role: self.role,
        }
    }
}

/// A standing class room with a stable shareable identifier (`room_id`).
///
/// Current membership lives in the per-role lists; `participant_history`
/// is append-only and allows duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classroom {
    pub id: Uuid,
    pub room_id: String,
    pub name: String,
    pub is_active: bool,
    pub teachers: Vec<Uuid>,
    pub students: Vec<Uuid>,
    pub participant_history: Vec<Uuid>,
}

impl Classroom {
    pub fn new(room_id: String, name: String, is_active: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id,
            name,
            is_active,
            teachers: Vec::new(),
            students: Vec::new(),
            participant_history: Vec::new(),
        }
    }

    /// Whether the participant is currently in either role list.
    pub fn is_member(&self, participant_id: Uuid) -> bool {
        self.teachers.contains(&participant_id) || self.students.contains(&participant_id)
    }

    pub fn role_list_mut(&mut self, role: Role) -> &mut Vec<Uuid> {
        match role {
            Role::Teacher => &mut self.teachers,
            Role::Student => &mut self.students,
        }
    }
}

/// One timed occurrence of a room being taught, bounded by start/end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub classroom_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub current_participants: Vec<Uuid>,
    pub participants_history: Vec<Uuid>,
}

impl Session {
    /// Creates a session with the starting teacher already inside
    /// `current_participants` and history.
    pub fn start(classroom_id: Uuid, teacher_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            classroom_id,
            started_at: Utc::now(),
            ended_at: None,
            current_participants: vec![teacher_id],
            participants_history: vec![teacher_id],
        }
    }

    /// A session is active while `ended_at` is unset.
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Join,
    Leave,
    Start,
    End,
}

/// One immutable entry of the append-only event log.
///
/// Events are stored once, keyed by classroom and optional session; the
/// classroom view and session view of a log are index lookups, not
/// duplicated id arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub kind: EventKind,
    pub actor: Uuid,
    pub classroom_id: Uuid,
    pub session_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}
