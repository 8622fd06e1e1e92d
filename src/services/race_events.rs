use std::time::SystemTime;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        format_system_time,
        sse::{
            HintGrantedEvent, PenaltyAppliedEvent, RaceCompletedEvent, RaceStartedEvent,
            ServerEvent, SystemStatus, TeamLocationEvent, TeamProgressEvent,
        },
    },
    state::{
        SharedState,
        geo::GeoPoint,
        race::{Route, Team},
    },
};

const EVENT_TEAM_PROGRESS: &str = "team.progress";
const EVENT_TEAM_LOCATION: &str = "team.location";
const EVENT_RACE_STARTED: &str = "race.started";
const EVENT_RACE_COMPLETED: &str = "race.completed";
const EVENT_PENALTY_APPLIED: &str = "penalty.applied";
const EVENT_HINT_GRANTED: &str = "hint.granted";
const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Broadcast a team's refreshed progression snapshot.
pub fn broadcast_team_progress(state: &SharedState, team: &Team, route: &Route, now: SystemTime) {
    let payload = TeamProgressEvent {
        team_id: team.id,
        name: team.name.clone(),
        current_point_index: team.current_point_index,
        total_points: route.points.len(),
        visited_count: team.visited_points.len(),
        phase: team.phase(route, now).as_str().to_string(),
    };
    send_public_event(state, EVENT_TEAM_PROGRESS, &payload);
}

/// Broadcast that a team's start time was set.
pub fn broadcast_race_started(state: &SharedState, team: &Team, start_time: SystemTime) {
    let payload = RaceStartedEvent {
        team_id: team.id,
        name: team.name.clone(),
        start_time: format_system_time(start_time),
    };
    send_public_event(state, EVENT_RACE_STARTED, &payload);
}

/// Broadcast that a team finished its route.
pub fn broadcast_race_completed(state: &SharedState, team: &Team, completion_time_ms: u64) {
    let payload = RaceCompletedEvent {
        team_id: team.id,
        name: team.name.clone(),
        completion_time_ms,
    };
    send_public_event(state, EVENT_RACE_COMPLETED, &payload);
}

/// Broadcast an opened penalty window.
pub fn broadcast_penalty_applied(
    state: &SharedState,
    team_id: Uuid,
    penalty_end: SystemTime,
    forced_advance: bool,
) {
    let payload = PenaltyAppliedEvent {
        team_id,
        penalty_end_time: format_system_time(penalty_end),
        forced_advance,
    };
    send_public_event(state, EVENT_PENALTY_APPLIED, &payload);
}

/// Broadcast a granted hint.
pub fn broadcast_hint_granted(
    state: &SharedState,
    team_id: Uuid,
    point_index: usize,
    hint_level: u8,
    automatic: bool,
) {
    let payload = HintGrantedEvent {
        team_id,
        point_index,
        hint_level,
        automatic,
    };
    send_public_event(state, EVENT_HINT_GRANTED, &payload);
}

/// Broadcast a team's fresh coordinates.
pub fn broadcast_team_location(
    state: &SharedState,
    team_id: Uuid,
    coordinates: GeoPoint,
    reported_at: SystemTime,
) {
    let payload = TeamLocationEvent {
        team_id,
        latitude: coordinates.lat,
        longitude: coordinates.lon,
        reported_at: format_system_time(reported_at),
    };
    send_public_event(state, EVENT_TEAM_LOCATION, &payload);
}

/// Broadcast that the backend entered or left degraded mode.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    let payload = SystemStatus { degraded };
    send_public_event(state, EVENT_SYSTEM_STATUS, &payload);
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.public_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}
