use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::model::{EventKind, EventRecord, Participant, Role};
use super::store::Store;
use crate::error::Result;

/// One event line of a report, with the actor reference resolved to a
/// name and role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub name: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub event_log: Vec<ReportEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassroomReport {
    pub classroom_id: Uuid,
    pub room_id: String,
    pub name: String,
    pub event_log: Vec<ReportEvent>,
    pub sessions: Vec<SessionReport>,
}

/// Tagged outcome of the read-only report path.
///
/// Unlike the mutating lifecycle operations, absence is not an error here;
/// it sits directly behind a user-facing query surface. Storage failures
/// still propagate as `Err`.
#[derive(Debug)]
pub enum ReportOutcome {
    Found(ClassroomReport),
    NotFound,
}

/// Projects a class room's event log and sessions into a human-readable
/// report timeline.
pub struct Reporter {
    store: Arc<dyn Store>,
}

impl Reporter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn classroom_report(&self, room_id: &str) -> Result<ReportOutcome> {
        let classroom = match self.store.find_classroom_by_room_id(room_id).await? {
            Some(classroom) => classroom,
            None => {
                tracing::debug!(room_id = %room_id, "Report requested for unknown class room");
                return Ok(ReportOutcome::NotFound);
            }
        };

        let mut actors: HashMap<Uuid, Participant> = HashMap::new();

        let events = self.store.events_for_classroom(classroom.id).await?;
        let event_log = self.resolve_events(&events, &mut actors).await?;

        let sessions = self.store.sessions_for_classroom(classroom.id).await?;
        let mut session_reports = Vec::with_capacity(sessions.len());
        for session in sessions {
            let events = self.store.events_for_session(session.id).await?;
            session_reports.push(SessionReport {
                started_at: session.started_at,
                ended_at: session.ended_at,
                event_log: self.resolve_events(&events, &mut actors).await?,
            });
        }

        Ok(ReportOutcome::Found(ClassroomReport {
            classroom_id: classroom.id,
            room_id: classroom.room_id,
            name: classroom.name,
            event_log,
            sessions: session_reports,
        }))
    }

    async fn resolve_events(
        &self,
        events: &[EventRecord],
        actors: &mut HashMap<Uuid, Participant>,
    ) -> Result<Vec<ReportEvent>> {
        let mut resolved = Vec::with_capacity(events.len());
        for event in events {
            if !actors.contains_key(&event.actor) {
                match self.store.find_participant(event.actor).await? {
                    Some(participant) => {
                        actors.insert(event.actor, participant);
                    }
                    None => {
                        tracing::warn!(
                            event_id = %event.id,
                            actor = %event.actor,
                            "Event actor no longer resolvable, skipping"
                        );
                        continue;
                    }
                }
            }
            let actor = &actors[&event.actor];
            resolved.push(ReportEvent {
                kind: event.kind,
                name: actor.name.clone(),
                role: actor.role,
                timestamp: event.timestamp,
            });
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classroom::model::NewParticipant;
    use crate::classroom::service::LifecycleService;
    use crate::classroom::store::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, LifecycleService, Reporter) {
        let store = Arc::new(MemoryStore::new());
        let service = LifecycleService::new(store.clone(), true);
        let reporter = Reporter::new(store.clone());
        (store, service, reporter)
    }

    fn teacher_payload() -> NewParticipant {
        NewParticipant {
            name: "Dr. Smith".to_string(),
            email: "smith@example.com".to_string(),
            role: Role::Teacher,
        }
    }

    #[tokio::test]
    async fn test_report_for_unknown_room() {
        let (_store, _service, reporter) = setup();
        let outcome = reporter.classroom_report("999999").await.unwrap();
        assert!(matches!(outcome, ReportOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_fresh_room_reports_empty() {
        let (_store, service, reporter) = setup();
        let created = service.create("Algebra".to_string()).await.unwrap();

        let outcome = reporter.classroom_report(&created.room_id).await.unwrap();
        let report = match outcome {
            ReportOutcome::Found(report) => report,
            ReportOutcome::NotFound => panic!("expected report"),
        };
        assert_eq!(report.room_id, created.room_id);
        assert!(report.event_log.is_empty());
        assert!(report.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_report_resolves_actors_and_lists_sessions() {
        let (_store, service, reporter) = setup();
        let created = service.create("Algebra".to_string()).await.unwrap();
        let teacher = service
            .join_classroom(&created.room_id, teacher_payload())
            .await
            .unwrap();
        let session = service
            .start_class(created.classroom_id, teacher.id)
            .await
            .unwrap();
        service.end_class(session.id, teacher.id).await.unwrap();

        let outcome = reporter.classroom_report(&created.room_id).await.unwrap();
        let report = match outcome {
            ReportOutcome::Found(report) => report,
            ReportOutcome::NotFound => panic!("expected report"),
        };

        // JOIN, START, END at room level
        assert_eq!(report.event_log.len(), 3);
        assert!(report
            .event_log
            .iter()
            .all(|e| e.name == "Dr. Smith" && e.role == Role::Teacher));
        assert_eq!(report.event_log[0].kind, EventKind::Join);

        assert_eq!(report.sessions.len(), 1);
        let session_report = &report.sessions[0];
        assert!(session_report.ended_at.is_some());
        // START and END were recorded within the session
        assert_eq!(session_report.event_log.len(), 2);
        assert_eq!(session_report.event_log[0].kind, EventKind::Start);
        assert_eq!(session_report.event_log[1].kind, EventKind::End);
    }
}
