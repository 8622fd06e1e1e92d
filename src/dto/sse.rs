use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever a team's progression state changes.
pub struct TeamProgressEvent {
    pub team_id: Uuid,
    pub name: String,
    pub current_point_index: usize,
    pub total_points: usize,
    pub visited_count: usize,
    pub phase: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a team's start time is set.
pub struct RaceStartedEvent {
    pub team_id: Uuid,
    pub name: String,
    pub start_time: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once when a team finishes its route.
pub struct RaceCompletedEvent {
    pub team_id: Uuid,
    pub name: String,
    pub completion_time_ms: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a penalty window opens for a team.
pub struct PenaltyAppliedEvent {
    pub team_id: Uuid,
    pub penalty_end_time: String,
    pub forced_advance: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a hint is granted to a team.
pub struct HintGrantedEvent {
    pub team_id: Uuid,
    pub point_index: usize,
    pub hint_level: u8,
    pub automatic: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a team reports fresh coordinates.
pub struct TeamLocationEvent {
    pub team_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub reported_at: String,
}
