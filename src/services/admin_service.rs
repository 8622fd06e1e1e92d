//! Business logic powering the admin REST routes. Commands funnel through the
//! same per-team gate as racer traffic, so admin corrections and live
//! submissions never interleave on one team.

use std::time::{Duration, SystemTime};

use serde_json::json;

use crate::{
    dao::{models::EventKindEntity, race_store::RaceStore},
    dto::{
        admin::{
            ClearEventsResponse, CommandResponse, EventView, StartWaitingResponse,
            TeamCommandRequest, TeamListItem,
        },
        format_system_time,
        race::TeamProgressView,
    },
    error::ServiceError,
    services::{
        event_recorder, race_events,
        race_service::{load_route_snapshot, persist_team, reload_team, require_store},
        team_locator::{self, LookupMode},
    },
    state::SharedState,
};

// ---------------------------------------------------------------------------
// Read-only projections
// ---------------------------------------------------------------------------

/// Every team known to the store, flattened for the admin roster table.
pub async fn list_teams(state: &SharedState) -> Result<Vec<TeamListItem>, ServiceError> {
    let store = require_store(state).await?;
    let teams = store.list_teams().await?;
    Ok(teams.into_iter().map(TeamListItem::from).collect())
}

/// Race log in recording order, optionally narrowed to a single team.
pub async fn list_events(
    state: &SharedState,
    team_ref: Option<&str>,
) -> Result<Vec<EventView>, ServiceError> {
    let store = require_store(state).await?;

    let team_id = match team_ref {
        Some(reference) => {
            let team = team_locator::resolve(store.as_ref(), reference, LookupMode::Strict).await?;
            Some(team.id)
        }
        None => None,
    };

    let events = store.list_events(team_id).await?;
    Ok(events.into_iter().map(EventView::from).collect())
}

/// Wipe the race log, typically between race days.
pub async fn clear_events(state: &SharedState) -> Result<ClearEventsResponse, ServiceError> {
    let store = require_store(state).await?;
    let deleted = event_recorder::clear_all(store.as_ref()).await?;
    Ok(ClearEventsResponse { deleted })
}

// ---------------------------------------------------------------------------
// Team commands
// ---------------------------------------------------------------------------

/// Apply one admin command to a team and return the resulting progression.
pub async fn dispatch_command(
    state: &SharedState,
    team_ref: &str,
    request: TeamCommandRequest,
) -> Result<CommandResponse, ServiceError> {
    let store = require_store(state).await?;
    let located = team_locator::resolve(store.as_ref(), team_ref, LookupMode::Strict).await?;

    let gate = state.team_gate(located.id);
    let _guard = gate.lock().await;

    let mut team = reload_team(store.as_ref(), located.id).await?;
    let route = load_route_snapshot(state, store.as_ref(), team.route_id).await?;
    let now = SystemTime::now();

    let message = match request {
        TeamCommandRequest::StartRace => {
            if team.start(now) {
                persist_team(store.as_ref(), &mut team, now).await?;
                event_recorder::record(
                    store.as_ref(),
                    EventKindEntity::RouteStarted,
                    team.id,
                    None,
                    Some(route.id),
                    json!({"source": "admin"}),
                    now,
                )
                .await;
                race_events::broadcast_race_started(state, &team, now);
                race_events::broadcast_team_progress(state, &team, &route, now);
                "race started".to_string()
            } else {
                "team already started".to_string()
            }
        }
        TeamCommandRequest::RestartRace => {
            team.restart();
            persist_team(store.as_ref(), &mut team, now).await?;
            race_events::broadcast_team_progress(state, &team, &route, now);
            "progress reset".to_string()
        }
        TeamCommandRequest::AdvancePoint => {
            team.advance(&route);
            persist_team(store.as_ref(), &mut team, now).await?;
            race_events::broadcast_team_progress(state, &team, &route, now);
            "advanced one point".to_string()
        }
        TeamCommandRequest::ApplyPenalty { minutes } => {
            let until = team.apply_penalty(Duration::from_secs(u64::from(minutes) * 60), now);
            persist_team(store.as_ref(), &mut team, now).await?;
            event_recorder::record(
                store.as_ref(),
                EventKindEntity::PenaltyApplied,
                team.id,
                None,
                Some(route.id),
                json!({
                    "source": "admin",
                    "minutes": minutes,
                    "until": format_system_time(until),
                }),
                now,
            )
            .await;
            race_events::broadcast_penalty_applied(state, team.id, until, false);
            race_events::broadcast_team_progress(state, &team, &route, now);
            format!("penalty applied for {minutes} minutes")
        }
    };

    Ok(CommandResponse {
        message,
        team: TeamProgressView::project(&team, &route, now),
    })
}

/// Start every active team that has not started yet. Used on race morning to
/// release the whole field at once.
pub async fn start_waiting(state: &SharedState) -> Result<StartWaitingResponse, ServiceError> {
    let store = require_store(state).await?;
    let now = SystemTime::now();

    let waiting: Vec<_> = store
        .list_teams()
        .await?
        .into_iter()
        .filter(|team| team.active && team.start_time.is_none())
        .collect();

    let mut started = 0;
    for entity in waiting {
        let gate = state.team_gate(entity.id);
        let _guard = gate.lock().await;

        let mut team = reload_team(store.as_ref(), entity.id).await?;
        if !team.start(now) {
            continue;
        }
        persist_team(store.as_ref(), &mut team, now).await?;
        event_recorder::record(
            store.as_ref(),
            EventKindEntity::RouteStarted,
            team.id,
            None,
            Some(team.route_id),
            json!({"source": "bulk_start"}),
            now,
        )
        .await;
        race_events::broadcast_race_started(state, &team, now);

        let route = load_route_snapshot(state, store.as_ref(), team.route_id).await?;
        race_events::broadcast_team_progress(state, &team, &route, now);
        started += 1;
    }

    Ok(StartWaitingResponse { started })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use indexmap::IndexSet;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::models::{
            GeoPointEntity, PointEntity, QuestionEntity, RouteEntity, TeamEntity,
        },
        dao::race_store::{RaceStore, TeamLookup, memory::MemoryRaceStore},
        state::AppState,
    };

    fn seed_route(store: &MemoryRaceStore, point_count: usize) -> RouteEntity {
        let points: Vec<PointEntity> = (0..point_count)
            .map(|index| PointEntity {
                id: Uuid::new_v4(),
                name: format!("Point {index}"),
                code: format!("P{index}"),
                coordinates: GeoPointEntity {
                    lat: 32.5578,
                    lon: 35.0766,
                },
                question: QuestionEntity {
                    text: format!("Question {index}?"),
                    options: vec![],
                    correct_answer: format!("answer-{index}"),
                },
                images: None,
                is_advanced: false,
                is_finish_point: false,
            })
            .collect();
        let route = RouteEntity {
            id: Uuid::new_v4(),
            name: "City loop".to_string(),
            point_ids: points.iter().map(|point| point.id).collect(),
            settings: None,
        };
        for point in &points {
            store.insert_point(point.clone());
        }
        store.insert_route(route.clone());
        route
    }

    fn seed_team(store: &MemoryRaceStore, route_id: Uuid, name: &str, link: &str) -> Uuid {
        let team = TeamEntity {
            id: Uuid::new_v4(),
            name: name.to_string(),
            unique_link: link.to_string(),
            route_id,
            current_point_index: 0,
            attempts: 0,
            visited_points: IndexSet::new(),
            start_time: None,
            completion_time_ms: None,
            completed_at: None,
            active: true,
            penalty_end_time: None,
            hint: None,
            location: None,
            updated_at: SystemTime::UNIX_EPOCH,
        };
        let id = team.id;
        store.insert_team(team);
        id
    }

    async fn fixture() -> (crate::state::SharedState, MemoryRaceStore, Uuid) {
        let store = MemoryRaceStore::new();
        let route = seed_route(&store, 3);
        let team_id = seed_team(
            &store,
            route.id,
            "Falcons",
            "https://race.example/race/falcons-7f3a",
        );

        let state = AppState::new(AppConfig::default());
        state.install_race_store(Arc::new(store.clone())).await;
        (state, store, team_id)
    }

    #[tokio::test]
    async fn start_race_happens_once() {
        let (state, store, team_id) = fixture().await;

        let first = dispatch_command(&state, "falcons-7f3a", TeamCommandRequest::StartRace)
            .await
            .unwrap();
        assert_eq!(first.message, "race started");
        assert_eq!(first.team.phase, "question_open");

        let second = dispatch_command(&state, "falcons-7f3a", TeamCommandRequest::StartRace)
            .await
            .unwrap();
        assert_eq!(second.message, "team already started");

        let starts = store
            .list_events(Some(team_id))
            .await
            .unwrap()
            .into_iter()
            .filter(|event| event.kind == EventKindEntity::RouteStarted)
            .count();
        assert_eq!(starts, 1);
    }

    #[tokio::test]
    async fn restart_clears_progress_but_keeps_identity() {
        let (state, store, team_id) = fixture().await;

        dispatch_command(&state, "falcons-7f3a", TeamCommandRequest::StartRace)
            .await
            .unwrap();
        dispatch_command(&state, "falcons-7f3a", TeamCommandRequest::AdvancePoint)
            .await
            .unwrap();

        let reset = dispatch_command(&state, "falcons-7f3a", TeamCommandRequest::RestartRace)
            .await
            .unwrap();
        assert_eq!(reset.team.current_point_index, 0);
        assert_eq!(reset.team.phase, "waiting");

        let stored = store
            .find_team(TeamLookup::Id(team_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "Falcons");
        assert!(stored.start_time.is_none());
        assert!(stored.visited_points.is_empty());
    }

    #[tokio::test]
    async fn penalty_command_sets_the_window_and_logs_it() {
        let (state, store, team_id) = fixture().await;
        dispatch_command(&state, "falcons-7f3a", TeamCommandRequest::StartRace)
            .await
            .unwrap();

        let response = dispatch_command(
            &state,
            "falcons-7f3a",
            TeamCommandRequest::ApplyPenalty { minutes: 5 },
        )
        .await
        .unwrap();
        assert_eq!(response.message, "penalty applied for 5 minutes");
        assert_eq!(response.team.phase, "penalized");
        assert!(response.team.penalty_end_time.is_some());

        let penalties = store
            .list_events(Some(team_id))
            .await
            .unwrap()
            .into_iter()
            .filter(|event| event.kind == EventKindEntity::PenaltyApplied)
            .count();
        assert_eq!(penalties, 1);
    }

    #[tokio::test]
    async fn start_waiting_skips_teams_already_racing() {
        let (state, store, first_id) = fixture().await;
        let route = seed_route(&store, 2);
        let second_id = seed_team(
            &store,
            route.id,
            "Owls",
            "https://race.example/race/owls-11aa",
        );

        dispatch_command(&state, "falcons-7f3a", TeamCommandRequest::StartRace)
            .await
            .unwrap();

        let response = start_waiting(&state).await.unwrap();
        assert_eq!(response.started, 1);

        for id in [first_id, second_id] {
            let stored = store.find_team(TeamLookup::Id(id)).await.unwrap().unwrap();
            assert!(stored.start_time.is_some());
        }
    }

    #[tokio::test]
    async fn event_listing_filters_by_team_reference() {
        let (state, store, _team_id) = fixture().await;
        let route = seed_route(&store, 2);
        seed_team(&store, route.id, "Owls", "https://race.example/race/owls-11aa");

        start_waiting(&state).await.unwrap();

        let all = list_events(&state, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let one = list_events(&state, Some("owls-11aa")).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].kind, "ROUTE_STARTED");

        let cleared = clear_events(&state).await.unwrap();
        assert_eq!(cleared.deleted, 2);
        assert!(list_events(&state, None).await.unwrap().is_empty());
    }
}
