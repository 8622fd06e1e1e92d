use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Orienteer Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::race::team_progress,
        crate::routes::race::submit_answer,
        crate::routes::race::request_hint,
        crate::routes::race::reach_point,
        crate::routes::race::update_location,
        crate::routes::race::complete_route,
        crate::routes::admin::list_teams,
        crate::routes::admin::team_command,
        crate::routes::admin::start_waiting,
        crate::routes::admin::list_events,
        crate::routes::admin::clear_events,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::Handshake,
            crate::dto::race::SubmitAnswerRequest,
            crate::dto::race::HintRequestBody,
            crate::dto::race::LocationUpdateRequest,
            crate::dto::race::CompleteRouteRequest,
            crate::dto::race::AnswerResponse,
            crate::dto::race::HintResponse,
            crate::dto::race::ReachResponse,
            crate::dto::race::LocationAck,
            crate::dto::race::CompleteRouteResponse,
            crate::dto::race::TeamProgressView,
            crate::dto::admin::TeamCommandRequest,
            crate::dto::admin::CommandResponse,
            crate::dto::admin::StartWaitingResponse,
            crate::dto::admin::TeamListItem,
            crate::dto::admin::EventView,
            crate::dto::admin::ClearEventsResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "race", description = "Racer-facing progression operations"),
        (name = "admin", description = "Race operator controls"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
