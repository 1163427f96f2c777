use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use super::events::EventRecorder;
use super::model::{Classroom, EventKind, NewParticipant, Participant, Role, Session};
use super::store::Store;
use crate::error::{ClassroomError, Result};

/// Result of creating a class room.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedRoom {
    pub classroom_id: Uuid,
    pub room_id: String,
}

/// Class room with its membership lists expanded to full participant
/// records; the realtime "classroom state" payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassroomState {
    pub classroom_id: Uuid,
    pub room_id: String,
    pub name: String,
    pub is_active: bool,
    pub teachers: Vec<Participant>,
    pub students: Vec<Participant>,
}

/// Session with current participants expanded and partitioned by role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub classroom_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub teachers: Vec<Participant>,
    pub students: Vec<Participant>,
}

/// Entry of the active-sessions browse list: a live session populated with
/// its owning class room.
#[derive(Debug, Clone, Serialize)]
pub struct SessionListing {
    pub session: Session,
    pub classroom: Classroom,
}

/// Owns all classroom/session state-transition logic.
///
/// Explicitly constructed with its store; callers hold it behind an `Arc`
/// rather than through a global accessor. Mutating operations raise
/// `ClassroomError` on failed preconditions; read-only projections do not
/// mutate anything.
pub struct LifecycleService {
    store: Arc<dyn Store>,
    recorder: EventRecorder,
    rooms_active_by_default: bool,
}

impl LifecycleService {
    pub fn new(store: Arc<dyn Store>, rooms_active_by_default: bool) -> Self {
        Self {
            recorder: EventRecorder::new(store.clone()),
            store,
            rooms_active_by_default,
        }
    }

    /// Generate a random shareable room code
    fn generate_room_id() -> String {
        let mut rng = rand::thread_rng();
        format!("{:06}", rng.gen_range(100000..999999))
    }

    /// Create a new class room with a freshly generated room code.
    pub async fn create(&self, name: String) -> Result<CreatedRoom> {
        let room_id = loop {
            let candidate = Self::generate_room_id();
            if self
                .store
                .find_classroom_by_room_id(&candidate)
                .await?
                .is_none()
            {
                break candidate;
            }
        };

        let classroom = Classroom::new(room_id.clone(), name, self.rooms_active_by_default);
        let classroom_id = classroom.id;
        self.store.create_classroom(classroom).await?;

        tracing::info!(room_id = %room_id, classroom_id = %classroom_id, "Class room created");
        Ok(CreatedRoom {
            classroom_id,
            room_id,
        })
    }

    /// Admit a participant into a class room by its shareable code.
    ///
    /// Students are refused while the room is inactive; teachers are not.
    /// The duplicate check runs against current membership, never history.
    pub async fn join_classroom(
        &self,
        room_id: &str,
        payload: NewParticipant,
    ) -> Result<Participant> {
        let mut classroom = self
            .store
            .find_classroom_by_room_id(room_id)
            .await?
            .ok_or_else(|| ClassroomError::RoomNotFound(room_id.to_string()))?;

        if payload.role == Role::Student && !classroom.is_active {
            return Err(ClassroomError::InactiveRoom(room_id.to_string()));
        }

        let existing = self.store.find_participant_by_email(&payload.email).await?;
        if let Some(ref participant) = existing {
            if classroom.is_member(participant.id) {
                return Err(ClassroomError::DuplicateParticipant(payload.email));
            }
        }

        let participant = match existing {
            Some(participant) => participant,
            None => {
                let participant = payload.into_participant();
                self.store.create_participant(participant.clone()).await?;
                participant
            }
        };

        classroom.role_list_mut(participant.role).push(participant.id);
        classroom.participant_history.push(participant.id);

        self.recorder
            .record(EventKind::Join, participant.id, classroom.id, None)
            .await?;
        self.store.update_classroom(classroom).await?;

        tracing::info!(
            room_id = %room_id,
            participant_id = %participant.id,
            role = ?participant.role,
            "Participant joined class room"
        );
        Ok(participant)
    }

    /// Start a new session for a class room.
    ///
    /// The starter must be a current teacher of the room; the session is
    /// created with the teacher already inside `current_participants`.
    pub async fn start_class(&self, classroom_id: Uuid, teacher_id: Uuid) -> Result<Session> {
        let classroom = self
            .store
            .find_classroom(classroom_id)
            .await?
            .ok_or_else(|| ClassroomError::RoomNotFound(classroom_id.to_string()))?;

        if !classroom.teachers.contains(&teacher_id) {
            return Err(ClassroomError::Unauthorized(teacher_id));
        }

        let session = Session::start(classroom.id, teacher_id);
        self.store.create_session(session.clone()).await?;
        self.recorder
            .record(EventKind::Start, teacher_id, classroom.id, Some(session.id))
            .await?;

        tracing::info!(
            classroom_id = %classroom.id,
            session_id = %session.id,
            teacher_id = %teacher_id,
            "Class session started"
        );
        Ok(session)
    }

    /// Remove a participant from a live session.
    ///
    /// A departing teacher force-ends the session: `current_participants`
    /// is cleared, `ended_at` is set, and an END event is appended after
    /// the LEAVE event.
    pub async fn leave_class_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<Session> {
        let mut session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(ClassroomError::SessionNotFound(session_id))?;

        session.current_participants.retain(|id| *id != user_id);

        self.recorder
            .record(EventKind::Leave, user_id, session.classroom_id, Some(session.id))
            .await?;

        if role == Role::Teacher {
            session.current_participants.clear();
            session.ended_at = Some(Utc::now());
            self.recorder
                .record(EventKind::End, user_id, session.classroom_id, Some(session.id))
                .await?;
            tracing::info!(session_id = %session.id, "Teacher left, session force-ended");
        } else {
            tracing::info!(session_id = %session.id, user_id = %user_id, "Student left session");
        }

        self.store.update_session(session.clone()).await?;
        Ok(session)
    }

    /// Explicitly end a session.
    ///
    /// The acting participant must be a current teacher of the owning room.
    pub async fn end_class(&self, session_id: Uuid, teacher_id: Uuid) -> Result<Session> {
        let mut session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(ClassroomError::SessionNotFound(session_id))?;

        let classroom = self
            .store
            .find_classroom(session.classroom_id)
            .await?
            .ok_or(ClassroomError::MissingClassroom(session_id))?;
        if !classroom.teachers.contains(&teacher_id) {
            return Err(ClassroomError::Unauthorized(teacher_id));
        }

        session.current_participants.clear();
        session.ended_at = Some(Utc::now());

        self.recorder
            .record(EventKind::End, teacher_id, session.classroom_id, Some(session.id))
            .await?;
        self.store.update_session(session.clone()).await?;

        tracing::info!(session_id = %session.id, teacher_id = %teacher_id, "Class session ended");
        Ok(session)
    }

    /// Room-level departure, distinct from leaving a session.
    pub async fn leave_class_room(
        &self,
        room_id: &str,
        user_id: Uuid,
        role: Role,
    ) -> Result<Classroom> {
        let mut classroom = self
            .store
            .find_classroom_by_room_id(room_id)
            .await?
            .ok_or_else(|| ClassroomError::RoomNotFound(room_id.to_string()))?;

        classroom.role_list_mut(role).retain(|id| *id != user_id);

        self.recorder
            .record(EventKind::Leave, user_id, classroom.id, None)
            .await?;
        self.store.update_classroom(classroom.clone()).await?;

        tracing::info!(room_id = %room_id, user_id = %user_id, "Participant left class room");
        Ok(classroom)
    }

    /// Live sessions, each populated with its owning class room, optionally
    /// restricted to one room code. Read-only.
    pub async fn active_sessions(&self, room_id: Option<&str>) -> Result<Vec<SessionListing>> {
        let classroom_filter = match room_id {
            Some(room_id) => {
                let classroom = self
                    .store
                    .find_classroom_by_room_id(room_id)
                    .await?
                    .ok_or_else(|| ClassroomError::RoomNotFound(room_id.to_string()))?;
                Some(classroom.id)
            }
            None => None,
        };

        let sessions = self.store.active_sessions(classroom_filter).await?;
        let mut listings = Vec::with_capacity(sessions.len());
        for session in sessions {
            let classroom = self
                .store
                .find_classroom(session.classroom_id)
                .await?
                .ok_or(ClassroomError::MissingClassroom(session.id))?;
            listings.push(SessionListing { session, classroom });
        }
        Ok(listings)
    }

    /// Alternate join path entered from the session browse list rather than
    /// a room code.
    pub async fn join_session_via_session_list(
        &self,
        session_id: Uuid,
        payload: NewParticipant,
    ) -> Result<Participant> {
        let mut session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(ClassroomError::SessionNotFound(session_id))?;
        let mut classroom = self
            .store
            .find_classroom(session.classroom_id)
            .await?
            .ok_or(ClassroomError::MissingClassroom(session_id))?;

        let existing = self.store.find_participant_by_email(&payload.email).await?;

        let participant = match existing {
            Some(participant) => {
                if session.current_participants.contains(&participant.id) {
                    return Err(ClassroomError::AlreadyInSession(payload.email));
                }
                if !classroom.is_member(participant.id) {
                    classroom.role_list_mut(participant.role).push(participant.id);
                    classroom.participant_history.push(participant.id);
                    self.store.update_classroom(classroom.clone()).await?;
                }
                participant
            }
            None => {
                let participant = payload.into_participant();
                self.store.create_participant(participant.clone()).await?;
                classroom.role_list_mut(participant.role).push(participant.id);
                classroom.participant_history.push(participant.id);
                self.store.update_classroom(classroom.clone()).await?;
                participant
            }
        };

        session.current_participants.push(participant.id);
        session.participants_history.push(participant.id);

        self.recorder
            .record(EventKind::Join, participant.id, classroom.id, Some(session.id))
            .await?;
        self.store.update_session(session).await?;

        tracing::info!(
            session_id = %session_id,
            participant_id = %participant.id,
            "Participant joined session from browse list"
        );
        Ok(participant)
    }

    /// Read-only class room state with membership expanded to full
    /// participant records.
    pub async fn classroom_state(&self, room_id: &str) -> Result<ClassroomState> {
        let classroom = self
            .store
            .find_classroom_by_room_id(room_id)
            .await?
            .ok_or_else(|| ClassroomError::RoomNotFound(room_id.to_string()))?;

        Ok(ClassroomState {
            classroom_id: classroom.id,
            room_id: classroom.room_id.clone(),
            name: classroom.name.clone(),
            is_active: classroom.is_active,
            teachers: self.load_participants(&classroom.teachers).await?,
            students: self.load_participants(&classroom.students).await?,
        })
    }

    /// Read-only session state: current participants expanded and
    /// partitioned by role, with the owning room's name attached.
    pub async fn session_state(&self, session_id: Uuid) -> Result<SessionState> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(ClassroomError::SessionNotFound(session_id))?;
        let classroom = self
            .store
            .find_classroom(session.classroom_id)
            .await?
            .ok_or(ClassroomError::MissingClassroom(session_id))?;

        let participants = self.load_participants(&session.current_participants).await?;
        let (teachers, students) = participants
            .into_iter()
            .partition(|p| p.role == Role::Teacher);

        Ok(SessionState {
            session_id: session.id,
            classroom_name: classroom.name,
            started_at: session.started_at,
            ended_at: session.ended_at,
            teachers,
            students,
        })
    }

    /// Look up a participant by email, creating one from the payload if
    /// absent. Deduplicates participant identity across join paths.
    pub async fn find_participant_by_email(&self, payload: NewParticipant) -> Result<Participant> {
        if let Some(participant) = self.store.find_participant_by_email(&payload.email).await? {
            return Ok(participant);
        }
        let participant = payload.into_participant();
        self.store.create_participant(participant.clone()).await?;
        Ok(participant)
    }

    async fn load_participants(&self, ids: &[Uuid]) -> Result<Vec<Participant>> {
        let mut participants = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.find_participant(*id).await? {
                Some(participant) => participants.push(participant),
                None => tracing::warn!(participant_id = %id, "Dangling participant reference"),
            }
        }
        Ok(participants)
    }
}
