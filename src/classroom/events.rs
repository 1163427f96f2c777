use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::model::{EventKind, EventRecord};
use super::store::Store;
use crate::error::Result;

/// Builds and appends immutable event records to the append-only log.
///
/// Each call writes exactly one record, keyed by the owning classroom and,
/// when the event occurs within a live session, by that session as well.
/// Prior entries are never edited or removed.
pub struct EventRecorder {
    store: Arc<dyn Store>,
}

impl EventRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        kind: EventKind,
        actor: Uuid,
        classroom_id: Uuid,
        session_id: Option<Uuid>,
    ) -> Result<EventRecord> {
        let event = EventRecord {
            id: Uuid::new_v4(),
            kind,
            actor,
            classroom_id,
            session_id,
            timestamp: Utc::now(),
        };

        self.store.append_event(event.clone()).await?;

        tracing::debug!(
            event_id = %event.id,
            kind = ?kind,
            actor = %actor,
            classroom_id = %classroom_id,
            "Recorded event"
        );

        Ok(event)
    }
}
