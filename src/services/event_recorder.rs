use std::time::SystemTime;

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::dao::{
    models::{EventEntity, EventKindEntity},
    race_store::RaceStore,
    storage::StorageResult,
};

/// Append one record to the race log.
///
/// The log is diagnostic, not authoritative race state: a failed append is
/// logged and swallowed so the state mutation that triggered it still counts
/// as successful.
pub async fn record(
    store: &dyn RaceStore,
    kind: EventKindEntity,
    team_id: Uuid,
    point_id: Option<Uuid>,
    route_id: Option<Uuid>,
    details: Value,
    now: SystemTime,
) {
    let event = EventEntity {
        id: Uuid::new_v4(),
        team_id,
        kind,
        point_id,
        route_id,
        details,
        created_at: now,
    };

    if let Err(err) = store.append_event(event).await {
        warn!(
            kind = kind.as_str(),
            %team_id,
            error = %err,
            "failed to append race-log event"
        );
    }
}

/// Administrative bulk clear of the race log. Returns the number of records
/// removed.
pub async fn clear_all(store: &dyn RaceStore) -> StorageResult<u64> {
    store.clear_events().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::race_store::memory::MemoryRaceStore;
    use serde_json::json;

    #[tokio::test]
    async fn records_are_appended_in_order() {
        let store = MemoryRaceStore::new();
        let team_id = Uuid::new_v4();
        let now = SystemTime::UNIX_EPOCH;

        record(
            &store,
            EventKindEntity::RouteStarted,
            team_id,
            None,
            None,
            json!({"source": "admin"}),
            now,
        )
        .await;
        record(
            &store,
            EventKindEntity::QuestionAnswered,
            team_id,
            None,
            None,
            json!({"correct": true, "attempt": 1}),
            now,
        )
        .await;

        let events = store.list_events(Some(team_id)).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKindEntity::RouteStarted);
        assert_eq!(events[1].kind, EventKindEntity::QuestionAnswered);

        let removed = clear_all(&store).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.list_events(None).await.unwrap().is_empty());
    }
}
