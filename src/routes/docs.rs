use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Serve the Swagger UI backed by the generated OpenAPI document.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::<SharedState>::from(
        SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()),
    )
    .with_state(state)
}
