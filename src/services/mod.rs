/// Admin service for race operator commands.
pub mod admin_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Append-only race log recording.
pub mod event_recorder;
/// Health check service.
pub mod health_service;
/// Server-Sent Events message generation.
pub mod race_events;
/// Core progression workflows for racing teams.
pub mod race_service;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervision and degraded-mode tracking.
pub mod storage_supervisor;
/// Team reference resolution across id, link, and name shapes.
pub mod team_locator;
