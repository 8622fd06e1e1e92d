use std::{sync::Arc, time::SystemTime};

use serde_json::json;
use uuid::Uuid;

use crate::{
    dao::{
        models::{EventKindEntity, TeamEntity},
        race_store::{RaceStore, TeamLookup},
    },
    dto::{
        format_system_time,
        race::{
            AnswerResponse, CompleteRouteRequest, CompleteRouteResponse, HintRequestBody,
            HintResponse, LocationAck, LocationUpdateRequest, ReachResponse, SubmitAnswerRequest,
            TeamProgressView,
        },
    },
    error::ServiceError,
    services::{
        event_recorder, race_events,
        team_locator::{self, LookupMode},
    },
    state::{
        SharedState,
        geo::GeoPoint,
        progression::{self, AnswerOutcome, CompletionOutcome, HintOrigin, ReachOutcome},
        race::{Route, Team, TeamLocation},
        tracker,
    },
};

/// Evaluate an answer for the team's current point and persist the outcome.
pub async fn submit_answer(
    state: &SharedState,
    team_ref: &str,
    request: SubmitAnswerRequest,
) -> Result<AnswerResponse, ServiceError> {
    let store = require_store(state).await?;
    let located = team_locator::resolve(store.as_ref(), team_ref, LookupMode::Strict).await?;

    let gate = state.team_gate(located.id);
    let _guard = gate.lock().await;

    // Re-read inside the gate so concurrent submissions for the same team
    // observe each other's writes.
    let mut team = reload_team(store.as_ref(), located.id).await?;
    let route = load_route_snapshot(state, store.as_ref(), team.route_id).await?;
    let now = SystemTime::now();
    let hint_penalty = state.config().hint_penalty();

    let outcome = progression::submit_answer(
        &mut team,
        &route,
        request.point_id,
        &request.answer,
        hint_penalty,
        now,
    )?;

    if !matches!(outcome, AnswerOutcome::AlreadyCompleted) {
        persist_team(store.as_ref(), &mut team, now).await?;
        record_answer(store.as_ref(), &team, &route, &request, &outcome, hint_penalty, now).await;
        race_events::broadcast_team_progress(state, &team, &route, now);
    }

    match &outcome {
        AnswerOutcome::IncorrectPenalized {
            penalty_end,
            hint_level,
            ..
        } => {
            race_events::broadcast_penalty_applied(state, team.id, *penalty_end, false);
            race_events::broadcast_hint_granted(
                state,
                team.id,
                team.current_point_index,
                *hint_level,
                true,
            );
        }
        AnswerOutcome::ForcedAdvance { penalty_end, .. } => {
            race_events::broadcast_penalty_applied(state, team.id, *penalty_end, true);
        }
        _ => {}
    }

    Ok(outcome.into())
}

/// Grant a hint for the team's current point and persist it.
pub async fn request_hint(
    state: &SharedState,
    team_ref: &str,
    request: HintRequestBody,
) -> Result<HintResponse, ServiceError> {
    let store = require_store(state).await?;
    let located = team_locator::resolve(store.as_ref(), team_ref, LookupMode::Strict).await?;

    let gate = state.team_gate(located.id);
    let _guard = gate.lock().await;

    let mut team = reload_team(store.as_ref(), located.id).await?;
    let route = load_route_snapshot(state, store.as_ref(), team.route_id).await?;
    let now = SystemTime::now();
    let hint_penalty = state.config().hint_penalty();

    let origin = if request.is_automatic {
        HintOrigin::Automatic
    } else {
        HintOrigin::Manual
    };
    let grant = progression::request_hint(
        &mut team,
        &route,
        request.point_index,
        request.hint_level,
        origin,
        hint_penalty,
        now,
    )?;

    persist_team(store.as_ref(), &mut team, now).await?;

    let point_id = route.points.get(request.point_index).map(|point| point.id);
    event_recorder::record(
        store.as_ref(),
        EventKindEntity::HintRequested,
        team.id,
        point_id,
        Some(route.id),
        json!({
            "point_index": request.point_index,
            "hint_level": grant.level,
            "penalty_seconds": hint_penalty.as_secs(),
            "automatic": request.is_automatic,
        }),
        now,
    )
    .await;
    race_events::broadcast_hint_granted(
        state,
        team.id,
        request.point_index,
        grant.level,
        request.is_automatic,
    );
    race_events::broadcast_team_progress(state, &team, &route, now);

    Ok(grant.into())
}

/// Report physical arrival at a point. Advances only past points already
/// answered correctly through some earlier part of the route.
pub async fn reach_point(
    state: &SharedState,
    team_ref: &str,
    point_id: Uuid,
) -> Result<ReachResponse, ServiceError> {
    let store = require_store(state).await?;
    let located = team_locator::resolve(store.as_ref(), team_ref, LookupMode::Strict).await?;

    let gate = state.team_gate(located.id);
    let _guard = gate.lock().await;

    let mut team = reload_team(store.as_ref(), located.id).await?;
    let route = load_route_snapshot(state, store.as_ref(), team.route_id).await?;
    let now = SystemTime::now();

    let outcome = progression::reach_point(&mut team, &route, point_id)?;

    if matches!(outcome, ReachOutcome::Advanced { .. }) {
        persist_team(store.as_ref(), &mut team, now).await?;
        race_events::broadcast_team_progress(state, &team, &route, now);
    }

    let view = TeamProgressView::project(&team, &route, now);
    Ok((outcome, view).into())
}

/// Store a team's reported coordinates and measure them against the route.
///
/// Deliberately skips the team mutation gate: location writes go through a
/// targeted store update and are last-write-wins, so they cannot clobber a
/// concurrent progression save and never wait behind one.
pub async fn update_location(
    state: &SharedState,
    team_ref: &str,
    request: LocationUpdateRequest,
) -> Result<LocationAck, ServiceError> {
    let store = require_store(state).await?;
    let located = team_locator::resolve(store.as_ref(), team_ref, LookupMode::Strict).await?;

    let mut team = Team::from(located);
    let route = load_route_snapshot(state, store.as_ref(), team.route_id).await?;
    let now = SystemTime::now();

    let coordinates = GeoPoint {
        lat: request.latitude,
        lon: request.longitude,
    };
    let report = tracker::update_location(
        &mut team,
        &route,
        coordinates,
        state.config().arrival_threshold_m(),
        now,
    );

    let location = TeamLocation {
        coordinates,
        timestamp: now,
    };
    store.save_location(team.id, location.into()).await?;
    race_events::broadcast_team_location(state, team.id, coordinates, now);

    Ok((report, now).into())
}

/// Finalize a finished route with the client-reported elapsed time.
/// Idempotent: repeated calls after the first return the stored result.
pub async fn complete_route(
    state: &SharedState,
    team_ref: &str,
    request: CompleteRouteRequest,
) -> Result<CompleteRouteResponse, ServiceError> {
    let store = require_store(state).await?;
    let located = team_locator::resolve(store.as_ref(), team_ref, LookupMode::Strict).await?;

    let gate = state.team_gate(located.id);
    let _guard = gate.lock().await;

    let mut team = reload_team(store.as_ref(), located.id).await?;
    let route = load_route_snapshot(state, store.as_ref(), team.route_id).await?;
    let now = SystemTime::now();

    let outcome = progression::complete_route(&mut team, &route, request.elapsed_ms, now)?;

    let message = match outcome {
        CompletionOutcome::Finalized => {
            persist_team(store.as_ref(), &mut team, now).await?;
            event_recorder::record(
                store.as_ref(),
                EventKindEntity::RouteCompleted,
                team.id,
                None,
                Some(route.id),
                json!({"elapsed_ms": request.elapsed_ms}),
                now,
            )
            .await;
            race_events::broadcast_race_completed(state, &team, request.elapsed_ms);
            race_events::broadcast_team_progress(state, &team, &route, now);
            "route completed"
        }
        CompletionOutcome::AlreadyCompleted => "route already completed",
    };

    Ok(CompleteRouteResponse {
        message: message.to_string(),
        completion_time_ms: team.completion_time_ms,
        completed_at: team.completed_at.map(format_system_time),
    })
}

/// Progression snapshot for a racing client. Resolution is lenient and falls
/// back to any team still racing, so a live racer never sees "not found".
pub async fn team_progress(
    state: &SharedState,
    team_ref: &str,
) -> Result<TeamProgressView, ServiceError> {
    let store = require_store(state).await?;

    let located = match team_locator::resolve(store.as_ref(), team_ref, LookupMode::Lenient).await {
        Ok(team) => team,
        Err(ServiceError::TeamNotFound(_)) => store
            .find_team(TeamLookup::AnyActive)
            .await?
            .ok_or_else(|| ServiceError::TeamNotFound(team_ref.trim().to_string()))?,
        Err(err) => return Err(err),
    };

    let team = Team::from(located);
    let route = load_route_snapshot(state, store.as_ref(), team.route_id).await?;
    Ok(TeamProgressView::project(&team, &route, SystemTime::now()))
}

pub(crate) async fn require_store(
    state: &SharedState,
) -> Result<Arc<dyn RaceStore>, ServiceError> {
    state.race_store().await.ok_or(ServiceError::Degraded)
}

pub(crate) async fn reload_team(
    store: &dyn RaceStore,
    team_id: Uuid,
) -> Result<Team, ServiceError> {
    let entity = store
        .find_team(TeamLookup::Id(team_id))
        .await?
        .ok_or_else(|| ServiceError::TeamNotFound(team_id.to_string()))?;
    Ok(Team::from(entity))
}

pub(crate) async fn load_route_snapshot(
    state: &SharedState,
    store: &dyn RaceStore,
    route_id: Uuid,
) -> Result<Route, ServiceError> {
    let entity = store
        .find_route(route_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("route `{route_id}` not found")))?;
    let points = store.find_points(entity.point_ids.clone()).await?;

    Route::assemble(entity, points, state.config().default_route_settings())
        .map_err(|err| ServiceError::InvalidState(err.to_string()))
}

pub(crate) async fn persist_team(
    store: &dyn RaceStore,
    team: &mut Team,
    now: SystemTime,
) -> Result<(), ServiceError> {
    team.updated_at = now;
    store.save_team(TeamEntity::from(team.clone())).await?;
    Ok(())
}

async fn record_answer(
    store: &dyn RaceStore,
    team: &Team,
    route: &Route,
    request: &SubmitAnswerRequest,
    outcome: &AnswerOutcome,
    hint_penalty: std::time::Duration,
    now: SystemTime,
) {
    let (correct, attempt) = match outcome {
        AnswerOutcome::AlreadyCompleted => return,
        AnswerOutcome::Correct { attempt, .. } => (true, *attempt),
        AnswerOutcome::Incorrect { attempt }
        | AnswerOutcome::IncorrectPenalized { attempt, .. }
        | AnswerOutcome::ForcedAdvance { attempt, .. } => (false, *attempt),
    };

    event_recorder::record(
        store,
        EventKindEntity::QuestionAnswered,
        team.id,
        Some(request.point_id),
        Some(route.id),
        json!({
            "answer": request.answer,
            "correct": correct,
            "attempt": attempt,
        }),
        now,
    )
    .await;

    match outcome {
        AnswerOutcome::IncorrectPenalized {
            attempt,
            penalty_end,
            hint_level,
        } => {
            event_recorder::record(
                store,
                EventKindEntity::PenaltyApplied,
                team.id,
                Some(request.point_id),
                Some(route.id),
                json!({
                    "attempt": attempt,
                    "penalty_minutes": route.settings.penalty_minutes,
                    "until": format_system_time(*penalty_end),
                    "forced_advance": false,
                }),
                now,
            )
            .await;
            event_recorder::record(
                store,
                EventKindEntity::HintRequested,
                team.id,
                Some(request.point_id),
                Some(route.id),
                json!({
                    "point_index": team.current_point_index,
                    "hint_level": hint_level,
                    "penalty_seconds": hint_penalty.as_secs(),
                    "automatic": true,
                }),
                now,
            )
            .await;
        }
        AnswerOutcome::ForcedAdvance {
            attempt,
            penalty_end,
            ..
        } => {
            event_recorder::record(
                store,
                EventKindEntity::PenaltyApplied,
                team.id,
                Some(request.point_id),
                Some(route.id),
                json!({
                    "attempt": attempt,
                    "penalty_minutes": route.settings.penalty_minutes,
                    "until": format_system_time(*penalty_end),
                    "forced_advance": true,
                }),
                now,
            )
            .await;
        }
        _ => {}
    }
}
