use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;
use warp::ws::Message;

use super::messages::{ClientMessage, ServerMessage};
use super::model::Role;
use super::service::LifecycleService;
use crate::error::ClassroomError;

/// Identity a connection acquires once it joins a room or session.
/// Used for room-scoped broadcast and best-effort cleanup on disconnect.
#[derive(Debug, Clone, Default)]
struct ConnectionIdentity {
    participant_id: Option<Uuid>,
    role: Option<Role>,
    classroom_id: Option<Uuid>,
    session_id: Option<Uuid>,
}

struct Connection {
    sender: mpsc::UnboundedSender<Message>,
    identity: ConnectionIdentity,
}

/// Receives client actions, invokes the lifecycle service, and fans the
/// resulting state out to the connections of the affected room or session.
///
/// The teacher-only check for start/end runs here against the identity the
/// connection established when it joined; the service re-validates against
/// the room's current teacher list.
pub struct ClassroomGateway {
    service: Arc<LifecycleService>,
    connections: Arc<RwLock<HashMap<Uuid, Connection>>>,
}

impl ClassroomGateway {
    pub fn new(service: Arc<LifecycleService>) -> Self {
        Self {
            service,
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a new websocket connection and returns its id.
    pub async fn register(&self, sender: mpsc::UnboundedSender<Message>) -> Uuid {
        let connection_id = Uuid::new_v4();
        let mut connections = self.connections.write().await;
        connections.insert(
            connection_id,
            Connection {
                sender,
                identity: ConnectionIdentity::default(),
            },
        );
        tracing::info!(connection_id = %connection_id, "Gateway connection registered");
        connection_id
    }

    /// Drops the connection and, if it held session identity, removes the
    /// participant from that session as best-effort cleanup. Errors are
    /// logged, never surfaced to the departed client.
    pub async fn disconnect(&self, connection_id: Uuid) {
        let identity = {
            let mut connections = self.connections.write().await;
            connections.remove(&connection_id).map(|c| c.identity)
        };

        let Some(identity) = identity else {
            return;
        };

        if let (Some(session_id), Some(participant_id), Some(role)) =
            (identity.session_id, identity.participant_id, identity.role)
        {
            match self
                .service
                .leave_class_session(session_id, participant_id, role)
                .await
            {
                Ok(session) => {
                    self.broadcast_session_update(session_id, session.is_active())
                        .await;
                }
                Err(e) => {
                    tracing::error!(
                        connection_id = %connection_id,
                        session_id = %session_id,
                        participant_id = %participant_id,
                        error = %e,
                        "Disconnect cleanup failed"
                    );
                }
            }
        }

        tracing::info!(connection_id = %connection_id, "Gateway connection closed");
    }

    /// Dispatches one client action. Failures are sent back to the calling
    /// connection as an `Error` message and logged with context.
    pub async fn handle_message(&self, connection_id: Uuid, message: ClientMessage) {
        let result = match message {
            ClientMessage::CreateRoom { name } => self.on_create_room(connection_id, name).await,
            ClientMessage::Join {
                room_id,
                name,
                email,
                role,
            } => self.on_join(connection_id, room_id, name, email, role).await,
            ClientMessage::StartClass { classroom_id } => {
                self.on_start_class(connection_id, classroom_id).await
            }
            ClientMessage::EndClass { session_id } => {
                self.on_end_class(connection_id, session_id).await
            }
            ClientMessage::LeaveSession {
                session_id,
                participant_id,
                role,
            } => {
                self.on_leave_session(connection_id, session_id, participant_id, role)
                    .await
            }
            ClientMessage::LeaveRoom {
                room_id,
                participant_id,
                role,
            } => {
                self.on_leave_room(connection_id, room_id, participant_id, role)
                    .await
            }
            ClientMessage::JoinSession {
                session_id,
                name,
                email,
                role,
            } => {
                self.on_join_session(connection_id, session_id, name, email, role)
                    .await
            }
            ClientMessage::ListActiveSessions { room_id } => {
                self.on_list_active_sessions(connection_id, room_id).await
            }
        };

        if let Err(e) = result {
            tracing::error!(connection_id = %connection_id, error = %e, "Gateway action failed");
            self.send_to(
                connection_id,
                &ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
        }
    }

    async fn on_create_room(&self, connection_id: Uuid, name: String) -> crate::error::Result<()> {
        let created = self.service.create(name).await?;
        self.send_to(
            connection_id,
            &ServerMessage::RoomCreated {
                classroom_id: created.classroom_id,
                room_id: created.room_id,
            },
        )
        .await;
        Ok(())
    }

    async fn on_join(
        &self,
        connection_id: Uuid,
        room_id: String,
        name: String,
        email: String,
        role: Role,
    ) -> crate::error::Result<()> {
        let participant = self
            .service
            .join_classroom(
                &room_id,
                super::model::NewParticipant { name, email, role },
            )
            .await?;
        let state = self.service.classroom_state(&room_id).await?;

        self.update_identity(connection_id, |identity| {
            identity.participant_id = Some(participant.id);
            identity.role = Some(participant.role);
            identity.classroom_id = Some(state.classroom_id);
        })
        .await;

        self.send_to(connection_id, &ServerMessage::Joined { participant })
            .await;
        self.broadcast_to_classroom(state.classroom_id, &ServerMessage::RoomState { state })
            .await;
        Ok(())
    }

    async fn on_start_class(
        &self,
        connection_id: Uuid,
        classroom_id: Uuid,
    ) -> crate::error::Result<()> {
        let teacher_id = self.require_teacher(connection_id).await?;
        let session = self.service.start_class(classroom_id, teacher_id).await?;

        self.update_identity(connection_id, |identity| {
            identity.session_id = Some(session.id);
        })
        .await;

        self.broadcast_to_classroom(classroom_id, &ServerMessage::SessionStarted { session })
            .await;
        Ok(())
    }

    async fn on_end_class(
        &self,
        connection_id: Uuid,
        session_id: Uuid,
    ) -> crate::error::Result<()> {
        let teacher_id = self.require_teacher(connection_id).await?;
        let session = self.service.end_class(session_id, teacher_id).await?;

        let classroom_id = session.classroom_id;
        self.update_identity(connection_id, |identity| {
            identity.session_id = None;
        })
        .await;

        self.broadcast_to_classroom(classroom_id, &ServerMessage::SessionEnded { session })
            .await;
        Ok(())
    }

    async fn on_leave_session(
        &self,
        connection_id: Uuid,
        session_id: Uuid,
        participant_id: Uuid,
        role: Role,
    ) -> crate::error::Result<()> {
        let session = self
            .service
            .leave_class_session(session_id, participant_id, role)
            .await?;

        self.update_identity(connection_id, |identity| {
            identity.session_id = None;
        })
        .await;

        if session.is_active() {
            let state = self.service.session_state(session_id).await?;
            self.broadcast_to_classroom(
                session.classroom_id,
                &ServerMessage::SessionState { state },
            )
            .await;
        } else {
            self.broadcast_to_classroom(
                session.classroom_id,
                &ServerMessage::SessionEnded { session },
            )
            .await;
        }
        Ok(())
    }

    async fn on_leave_room(
        &self,
        connection_id: Uuid,
        room_id: String,
        participant_id: Uuid,
        role: Role,
    ) -> crate::error::Result<()> {
        let classroom = self
            .service
            .leave_class_room(&room_id, participant_id, role)
            .await?;

        self.update_identity(connection_id, |identity| {
            identity.classroom_id = None;
            identity.participant_id = None;
            identity.role = None;
        })
        .await;

        let state = self.service.classroom_state(&room_id).await?;
        self.broadcast_to_classroom(classroom.id, &ServerMessage::RoomState { state })
            .await;
        Ok(())
    }

    async fn on_join_session(
        &self,
        connection_id: Uuid,
        session_id: Uuid,
        name: String,
        email: String,
        role: Role,
    ) -> crate::error::Result<()> {
        let participant = self
            .service
            .join_session_via_session_list(
                session_id,
                super::model::NewParticipant { name, email, role },
            )
            .await?;
        let state = self.service.session_state(session_id).await?;

        self.update_identity(connection_id, |identity| {
            identity.participant_id = Some(participant.id);
            identity.role = Some(participant.role);
            identity.session_id = Some(session_id);
        })
        .await;

        self.send_to(connection_id, &ServerMessage::Joined { participant })
            .await;
        self.broadcast_to_session(session_id, &ServerMessage::SessionState { state })
            .await;
        Ok(())
    }

    async fn on_list_active_sessions(
        &self,
        connection_id: Uuid,
        room_id: Option<String>,
    ) -> crate::error::Result<()> {
        let sessions = self.service.active_sessions(room_id.as_deref()).await?;
        self.send_to(connection_id, &ServerMessage::ActiveSessions { sessions })
            .await;
        Ok(())
    }

    /// Start/end are teacher-only; the connection must have joined as one.
    async fn require_teacher(&self, connection_id: Uuid) -> crate::error::Result<Uuid> {
        let connections = self.connections.read().await;
        let connection = connections
            .get(&connection_id)
            .ok_or(ClassroomError::Unauthorized(connection_id))?;

        match (
            connection.identity.participant_id,
            connection.identity.role,
        ) {
            (Some(participant_id), Some(Role::Teacher)) => Ok(participant_id),
            (Some(participant_id), _) => Err(ClassroomError::Unauthorized(participant_id)),
            _ => Err(ClassroomError::Unauthorized(connection_id)),
        }
    }

    async fn update_identity<F>(&self, connection_id: Uuid, update: F)
    where
        F: FnOnce(&mut ConnectionIdentity),
    {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&connection_id) {
            update(&mut connection.identity);
        }
    }

    async fn send_to(&self, connection_id: Uuid, message: &ServerMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize server message");
                return;
            }
        };

        let connections = self.connections.read().await;
        if let Some(connection) = connections.get(&connection_id) {
            if let Err(e) = connection.sender.send(Message::text(payload)) {
                tracing::error!(connection_id = %connection_id, error = %e, "Failed to send message");
            }
        }
    }

    /// Best-effort fan-out to every connection in the class room.
    async fn broadcast_to_classroom(&self, classroom_id: Uuid, message: &ServerMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize broadcast");
                return;
            }
        };

        let connections = self.connections.read().await;
        for (id, connection) in connections.iter() {
            if connection.identity.classroom_id == Some(classroom_id) {
                if let Err(e) = connection.sender.send(Message::text(payload.clone())) {
                    tracing::error!(connection_id = %id, error = %e, "Broadcast send failed");
                }
            }
        }
    }

    /// Best-effort fan-out to every connection in the session.
    async fn broadcast_to_session(&self, session_id: Uuid, message: &ServerMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize broadcast");
                return;
            }
        };

        let connections = self.connections.read().await;
        for (id, connection) in connections.iter() {
            if connection.identity.session_id == Some(session_id) {
                if let Err(e) = connection.sender.send(Message::text(payload.clone())) {
                    tracing::error!(connection_id = %id, error = %e, "Broadcast send failed");
                }
            }
        }
    }

    async fn broadcast_session_update(&self, session_id: Uuid, still_active: bool) {
        if !still_active {
            return;
        }
        match self.service.session_state(session_id).await {
            Ok(state) => {
                self.broadcast_to_session(session_id, &ServerMessage::SessionState { state })
                    .await;
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Failed to project session state");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classroom::store::MemoryStore;
    use crate::classroom::store::Store;

    fn new_gateway() -> (Arc<MemoryStore>, ClassroomGateway) {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(LifecycleService::new(store.clone(), true));
        (store, ClassroomGateway::new(service))
    }

    async fn recv_json(rx: &mut mpsc::UnboundedReceiver<Message>) -> serde_json::Value {
        let message = rx.recv().await.expect("expected a message");
        serde_json::from_str(message.to_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_create_room_responds_with_room_id() {
        let (_store, gateway) = new_gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection_id = gateway.register(tx).await;

        gateway
            .handle_message(
                connection_id,
                ClientMessage::CreateRoom {
                    name: "Algebra".to_string(),
                },
            )
            .await;

        let response = recv_json(&mut rx).await;
        assert_eq!(response["type"], "RoomCreated");
        assert_eq!(response["room_id"].as_str().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_join_then_broadcast_room_state() {
        let (_store, gateway) = new_gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection_id = gateway.register(tx).await;

        gateway
            .handle_message(
                connection_id,
                ClientMessage::CreateRoom {
                    name: "Algebra".to_string(),
                },
            )
            .await;
        let created = recv_json(&mut rx).await;
        let room_id = created["room_id"].as_str().unwrap().to_string();

        gateway
            .handle_message(
                connection_id,
                ClientMessage::Join {
                    room_id,
                    name: "Dr. Smith".to_string(),
                    email: "smith@example.com".to_string(),
                    role: Role::Teacher,
                },
            )
            .await;

        let joined = recv_json(&mut rx).await;
        assert_eq!(joined["type"], "Joined");

        let state = recv_json(&mut rx).await;
        assert_eq!(state["type"], "RoomState");
        assert_eq!(state["state"]["teachers"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_start_class_requires_teacher_identity() {
        let (_store, gateway) = new_gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection_id = gateway.register(tx).await;

        gateway
            .handle_message(
                connection_id,
                ClientMessage::StartClass {
                    classroom_id: Uuid::new_v4(),
                },
            )
            .await;

        let response = recv_json(&mut rx).await;
        assert_eq!(response["type"], "Error");
    }

    #[tokio::test]
    async fn test_error_sent_back_for_unknown_room() {
        let (_store, gateway) = new_gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection_id = gateway.register(tx).await;

        gateway
            .handle_message(
                connection_id,
                ClientMessage::Join {
                    room_id: "999999".to_string(),
                    name: "Ada".to_string(),
                    email: "ada@example.com".to_string(),
                    role: Role::Student,
                },
            )
            .await;

        let response = recv_json(&mut rx).await;
        assert_eq!(response["type"], "Error");
        assert!(response["message"]
            .as_str()
            .unwrap()
            .contains("not found"));
    }

    #[tokio::test]
    async fn test_disconnect_cleans_up_session_membership() {
        let (store, gateway) = new_gateway();
        let (teacher_tx, mut teacher_rx) = mpsc::unbounded_channel();
        let teacher_conn = gateway.register(teacher_tx).await;

        gateway
            .handle_message(
                teacher_conn,
                ClientMessage::CreateRoom {
                    name: "Algebra".to_string(),
                },
            )
            .await;
        let created = recv_json(&mut teacher_rx).await;
        let room_id = created["room_id"].as_str().unwrap().to_string();
        let classroom_id: Uuid =
            serde_json::from_value(created["classroom_id"].clone()).unwrap();

        gateway
            .handle_message(
                teacher_conn,
                ClientMessage::Join {
                    room_id,
                    name: "Dr. Smith".to_string(),
                    email: "smith@example.com".to_string(),
                    role: Role::Teacher,
                },
            )
            .await;
        recv_json(&mut teacher_rx).await; // Joined
        recv_json(&mut teacher_rx).await; // RoomState

        gateway
            .handle_message(teacher_conn, ClientMessage::StartClass { classroom_id })
            .await;
        let started = recv_json(&mut teacher_rx).await;
        assert_eq!(started["type"], "SessionStarted");
        let session_id: Uuid =
            serde_json::from_value(started["session"]["id"].clone()).unwrap();

        // Teacher disconnect force-ends the session via cleanup
        gateway.disconnect(teacher_conn).await;

        let session = store.find_session(session_id).await.unwrap().unwrap();
        assert!(!session.is_active());
        assert!(session.current_participants.is_empty());
    }
}
