use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::race::{
        AnswerResponse, CompleteRouteRequest, CompleteRouteResponse, HintRequestBody, HintResponse,
        LocationAck, LocationUpdateRequest, ReachResponse, SubmitAnswerRequest, TeamProgressView,
    },
    error::AppError,
    services::race_service,
    state::SharedState,
};

/// Racer-facing endpoints, all keyed by the team reference from the invite
/// link.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/race/{team_ref}", get(team_progress))
        .route("/race/{team_ref}/answer", post(submit_answer))
        .route("/race/{team_ref}/hint", post(request_hint))
        .route("/race/{team_ref}/points/{point_id}/reach", post(reach_point))
        .route("/race/{team_ref}/location", post(update_location))
        .route("/race/{team_ref}/complete", post(complete_route))
}

/// Current progression of the team behind the reference.
#[utoipa::path(
    get,
    path = "/race/{team_ref}",
    tag = "race",
    params(("team_ref" = String, Path, description = "Team id, invite link, or link fragment")),
    responses(
        (status = 200, description = "Team progression snapshot", body = TeamProgressView),
        (status = 404, description = "No team matched the reference")
    )
)]
pub async fn team_progress(
    State(state): State<SharedState>,
    Path(team_ref): Path<String>,
) -> Result<Json<TeamProgressView>, AppError> {
    Ok(Json(race_service::team_progress(&state, &team_ref).await?))
}

/// Evaluate an answer for the team's current point.
#[utoipa::path(
    post,
    path = "/race/{team_ref}/answer",
    tag = "race",
    params(("team_ref" = String, Path, description = "Team id, invite link, or link fragment")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer evaluated", body = AnswerResponse),
        (status = 409, description = "Penalty active or point mismatch")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(team_ref): Path<String>,
    Valid(Json(payload)): Valid<Json<SubmitAnswerRequest>>,
) -> Result<Json<AnswerResponse>, AppError> {
    Ok(Json(
        race_service::submit_answer(&state, &team_ref, payload).await?,
    ))
}

/// Grant a hint for the team's current point, applying the hint penalty.
#[utoipa::path(
    post,
    path = "/race/{team_ref}/hint",
    tag = "race",
    params(("team_ref" = String, Path, description = "Team id, invite link, or link fragment")),
    request_body = HintRequestBody,
    responses(
        (status = 200, description = "Hint granted", body = HintResponse),
        (status = 409, description = "Hint already granted or stale point index")
    )
)]
pub async fn request_hint(
    State(state): State<SharedState>,
    Path(team_ref): Path<String>,
    Valid(Json(payload)): Valid<Json<HintRequestBody>>,
) -> Result<Json<HintResponse>, AppError> {
    Ok(Json(
        race_service::request_hint(&state, &team_ref, payload).await?,
    ))
}

/// Confirm physical arrival at a previously answered point.
#[utoipa::path(
    post,
    path = "/race/{team_ref}/points/{point_id}/reach",
    tag = "race",
    params(
        ("team_ref" = String, Path, description = "Team id, invite link, or link fragment"),
        ("point_id" = String, Path, description = "Identifier of the reached point")
    ),
    responses(
        (status = 200, description = "Arrival processed", body = ReachResponse),
        (status = 409, description = "Point is not the team's current point")
    )
)]
pub async fn reach_point(
    State(state): State<SharedState>,
    Path((team_ref, point_id)): Path<(String, Uuid)>,
) -> Result<Json<ReachResponse>, AppError> {
    Ok(Json(
        race_service::reach_point(&state, &team_ref, point_id).await?,
    ))
}

/// Record the team's live position and return distances to every checkpoint.
#[utoipa::path(
    post,
    path = "/race/{team_ref}/location",
    tag = "race",
    params(("team_ref" = String, Path, description = "Team id, invite link, or link fragment")),
    request_body = LocationUpdateRequest,
    responses(
        (status = 200, description = "Location recorded", body = LocationAck)
    )
)]
pub async fn update_location(
    State(state): State<SharedState>,
    Path(team_ref): Path<String>,
    Valid(Json(payload)): Valid<Json<LocationUpdateRequest>>,
) -> Result<Json<LocationAck>, AppError> {
    Ok(Json(
        race_service::update_location(&state, &team_ref, payload).await?,
    ))
}

/// Finalize the route with the client-measured elapsed time.
#[utoipa::path(
    post,
    path = "/race/{team_ref}/complete",
    tag = "race",
    params(("team_ref" = String, Path, description = "Team id, invite link, or link fragment")),
    request_body = CompleteRouteRequest,
    responses(
        (status = 200, description = "Completion recorded", body = CompleteRouteResponse),
        (status = 409, description = "Route is not finished yet")
    )
)]
pub async fn complete_route(
    State(state): State<SharedState>,
    Path(team_ref): Path<String>,
    Json(payload): Json<CompleteRouteRequest>,
) -> Result<Json<CompleteRouteResponse>, AppError> {
    Ok(Json(
        race_service::complete_route(&state, &team_ref, payload).await?,
    ))
}
