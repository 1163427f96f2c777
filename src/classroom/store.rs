use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::model::{Classroom, EventRecord, Participant, Session};
use crate::error::Result;

/// Persistence interface for classrooms, sessions, participants and the
/// append-only event log.
///
/// The store is the sole source of truth and the sole serialization point;
/// the lifecycle service holds no locks of its own.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_classroom(&self, classroom: Classroom) -> Result<()>;
    async fn update_classroom(&self, classroom: Classroom) -> Result<()>;
    async fn find_classroom(&self, id: Uuid) -> Result<Option<Classroom>>;
    /// Lookup by the shareable room code.
    async fn find_classroom_by_room_id(&self, room_id: &str) -> Result<Option<Classroom>>;

    async fn create_session(&self, session: Session) -> Result<()>;
    async fn update_session(&self, session: Session) -> Result<()>;
    async fn find_session(&self, id: Uuid) -> Result<Option<Session>>;
    /// Sessions with `ended_at` unset, optionally restricted to one classroom.
    async fn active_sessions(&self, classroom_id: Option<Uuid>) -> Result<Vec<Session>>;
    /// Every session ever run for the classroom, insertion order.
    async fn sessions_for_classroom(&self, classroom_id: Uuid) -> Result<Vec<Session>>;

    async fn create_participant(&self, participant: Participant) -> Result<()>;
    async fn find_participant(&self, id: Uuid) -> Result<Option<Participant>>;
    async fn find_participant_by_email(&self, email: &str) -> Result<Option<Participant>>;

    /// Appends to the event log. Entries are never mutated or removed.
    async fn append_event(&self, event: EventRecord) -> Result<()>;
    /// Classroom view of the log: every event for the room, insertion order.
    async fn events_for_classroom(&self, classroom_id: Uuid) -> Result<Vec<EventRecord>>;
    /// Session view of the log: events carrying this session id, insertion order.
    async fn events_for_session(&self, session_id: Uuid) -> Result<Vec<EventRecord>>;
}

/// In-memory store backed by `RwLock`ed maps.
///
/// All mutation happens behind write guards, so the duplicate-membership
/// race of concurrent joins narrows to the service's re-check before save.
pub struct MemoryStore {
    classrooms: Arc<RwLock<HashMap<Uuid, Classroom>>>,
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    participants: Arc<RwLock<HashMap<Uuid, Participant>>>,
    events: Arc<RwLock<Vec<EventRecord>>>,
    session_order: Arc<RwLock<Vec<Uuid>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            classrooms: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            participants: Arc::new(RwLock::new(HashMap::new())),
            events: Arc::new(RwLock::new(Vec::new())),
            session_order: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_classroom(&self, classroom: Classroom) -> Result<()> {
        let mut classrooms = self.classrooms.write().await;
        classrooms.insert(classroom.id, classroom);
        Ok(())
    }

    async fn update_classroom(&self, classroom: Classroom) -> Result<()> {
        let mut classrooms = self.classrooms.write().await;
        classrooms.insert(classroom.id, classroom);
        Ok(())
    }

    async fn find_classroom(&self, id: Uuid) -> Result<Option<Classroom>> {
        let classrooms = self.classrooms.read().await;
        Ok(classrooms.get(&id).cloned())
    }

    async fn find_classroom_by_room_id(&self, room_id: &str) -> Result<Option<Classroom>> {
        let classrooms = self.classrooms.read().await;
        Ok(classrooms.values().find(|c| c.room_id == room_id).cloned())
    }

    async fn create_session(&self, session: Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let mut order = self.session_order.write().await;
        order.push(session.id);
        sessions.insert(session.id, session);
        Ok(())
    }

    async fn update_session(&self, session: Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id, session);
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id).cloned())
    }

    async fn active_sessions(&self, classroom_id: Option<Uuid>) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        let order = self.session_order.read().await;
        Ok(order
            .iter()
            .filter_map(|id| sessions.get(id))
            .filter(|s| s.is_active())
            .filter(|s| classroom_id.map_or(true, |c| s.classroom_id == c))
            .cloned()
            .collect())
    }

    async fn sessions_for_classroom(&self, classroom_id: Uuid) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        let order = self.session_order.read().await;
        Ok(order
            .iter()
            .filter_map(|id| sessions.get(id))
            .filter(|s| s.classroom_id == classroom_id)
            .cloned()
            .collect())
    }

    async fn create_participant(&self, participant: Participant) -> Result<()> {
        let mut participants = self.participants.write().await;
        participants.insert(participant.id, participant);
        Ok(())
    }

    async fn find_participant(&self, id: Uuid) -> Result<Option<Participant>> {
        let participants = self.participants.read().await;
        Ok(participants.get(&id).cloned())
    }

    async fn find_participant_by_email(&self, email: &str) -> Result<Option<Participant>> {
        let participants = self.participants.read().await;
        Ok(participants.values().find(|p| p.email == email).cloned())
    }

    async fn append_event(&self, event: EventRecord) -> Result<()> {
        let mut events = self.events.write().await;
        events.push(event);
        Ok(())
    }

    async fn events_for_classroom(&self, classroom_id: Uuid) -> Result<Vec<EventRecord>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| e.classroom_id == classroom_id)
            .cloned()
            .collect())
    }

    async fn events_for_session(&self, session_id: Uuid) -> Result<Vec<EventRecord>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| e.session_id == Some(session_id))
            .cloned()
            .collect())
    }
}
