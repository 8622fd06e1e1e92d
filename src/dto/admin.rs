//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{EventEntity, TeamEntity},
    dto::{format_system_time, race::TeamProgressView},
};

/// Typed race-transition command applied to one team. Each transition
/// carries a fixed field set instead of a free-form partial update.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum TeamCommandRequest {
    /// Set the team's start time if it is not racing yet.
    StartRace,
    /// Reset the team's progression fields to their initial values.
    RestartRace,
    /// Move the team past its current point without an answer.
    AdvancePoint,
    /// Open a penalty window for the team.
    ApplyPenalty { minutes: u32 },
}

/// Result of a team command, with the refreshed progression snapshot.
#[derive(Debug, Serialize, ToSchema)]
pub struct CommandResponse {
    pub message: String,
    pub team: TeamProgressView,
}

/// Result of the bulk "start all waiting teams" action.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartWaitingResponse {
    pub started: usize,
}

/// Query parameters accepted when listing race-log events.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EventsQuery {
    /// Restrict the log to one team (id, shareable link, or link fragment).
    pub team: Option<String>,
}

/// Projection of a team when listed for administrators.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamListItem {
    pub id: Uuid,
    pub name: String,
    pub unique_link: String,
    pub route_id: Uuid,
    pub current_point_index: usize,
    pub started: bool,
    pub active: bool,
}

/// One appended race-log record.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventView {
    pub id: Uuid,
    pub team_id: Uuid,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_id: Option<Uuid>,
    pub details: Value,
    pub created_at: String,
}

/// Result of the bulk event-log clear.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClearEventsResponse {
    pub deleted: u64,
}

impl From<TeamEntity> for TeamListItem {
    fn from(team: TeamEntity) -> Self {
        Self {
            id: team.id,
            name: team.name,
            unique_link: team.unique_link,
            route_id: team.route_id,
            current_point_index: team.current_point_index,
            started: team.start_time.is_some(),
            active: team.active,
        }
    }
}

impl From<EventEntity> for EventView {
    fn from(event: EventEntity) -> Self {
        Self {
            id: event.id,
            team_id: event.team_id,
            kind: event.kind.as_str().to_string(),
            point_id: event.point_id,
            route_id: event.route_id,
            details: event.details,
            created_at: format_system_time(event.created_at),
        }
    }
}
