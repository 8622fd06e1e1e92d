use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};

use crate::{
    dto::admin::{
        ClearEventsResponse, CommandResponse, EventView, EventsQuery, StartWaitingResponse,
        TeamCommandRequest, TeamListItem,
    },
    error::AppError,
    services::admin_service,
    state::SharedState,
};

/// Operator endpoints used from the race control table. The control surface
/// is expected to sit behind the deployment's own access restrictions.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/admin/teams", get(list_teams))
        .route("/admin/teams/{team_ref}/commands", post(team_command))
        .route("/admin/races/start-waiting", post(start_waiting))
        .route("/admin/events", get(list_events).delete(clear_events))
}

/// Retrieve all teams known to the system for administration purposes.
#[utoipa::path(
    get,
    path = "/admin/teams",
    tag = "admin",
    responses((status = 200, description = "List registered teams", body = [TeamListItem]))
)]
pub async fn list_teams(
    State(state): State<SharedState>,
) -> Result<Json<Vec<TeamListItem>>, AppError> {
    Ok(Json(admin_service::list_teams(&state).await?))
}

/// Apply a lifecycle command to one team.
#[utoipa::path(
    post,
    path = "/admin/teams/{team_ref}/commands",
    tag = "admin",
    params(("team_ref" = String, Path, description = "Team id, invite link, or link fragment")),
    request_body = TeamCommandRequest,
    responses(
        (status = 200, description = "Command applied", body = CommandResponse),
        (status = 404, description = "No team matched the reference")
    )
)]
pub async fn team_command(
    State(state): State<SharedState>,
    Path(team_ref): Path<String>,
    Json(payload): Json<TeamCommandRequest>,
) -> Result<Json<CommandResponse>, AppError> {
    Ok(Json(
        admin_service::dispatch_command(&state, &team_ref, payload).await?,
    ))
}

/// Start every active team that has not started racing yet.
#[utoipa::path(
    post,
    path = "/admin/races/start-waiting",
    tag = "admin",
    responses((status = 200, description = "Waiting teams started", body = StartWaitingResponse))
)]
pub async fn start_waiting(
    State(state): State<SharedState>,
) -> Result<Json<StartWaitingResponse>, AppError> {
    Ok(Json(admin_service::start_waiting(&state).await?))
}

/// Race log in recording order, optionally narrowed to one team.
#[utoipa::path(
    get,
    path = "/admin/events",
    tag = "admin",
    params(("team" = Option<String>, Query, description = "Team reference to filter by")),
    responses((status = 200, description = "Recorded race events", body = [EventView]))
)]
pub async fn list_events(
    State(state): State<SharedState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<EventView>>, AppError> {
    Ok(Json(
        admin_service::list_events(&state, query.team.as_deref()).await?,
    ))
}

/// Delete the entire race log.
#[utoipa::path(
    delete,
    path = "/admin/events",
    tag = "admin",
    responses((status = 200, description = "Race log cleared", body = ClearEventsResponse))
)]
pub async fn clear_events(
    State(state): State<SharedState>,
) -> Result<Json<ClearEventsResponse>, AppError> {
    Ok(Json(admin_service::clear_events(&state).await?))
}
