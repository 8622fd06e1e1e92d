use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::SystemTime;
use uuid::Uuid;

/// Representation of a team stored in persistence and shared across layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamEntity {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Display name chosen for the team.
    pub name: String,
    /// Shareable link token identifying the team, usable in place of its id.
    pub unique_link: String,
    /// Route assigned to this team.
    pub route_id: Uuid,
    /// 0-based position into the route's ordered point list. Equal to the
    /// number of route points once the route has been finished.
    pub current_point_index: usize,
    /// Wrong answers at the current point since the last advancement.
    pub attempts: u32,
    /// Points answered correctly, in answer order, without duplicates.
    pub visited_points: IndexSet<Uuid>,
    /// Unset until the team started racing.
    pub start_time: Option<SystemTime>,
    /// Client-reported elapsed race time, persisted once on completion.
    pub completion_time_ms: Option<u64>,
    /// Server-side timestamp of the completion transition.
    pub completed_at: Option<SystemTime>,
    /// False once the team finished its route.
    pub active: bool,
    /// While now is before this instant, question interaction is blocked.
    pub penalty_end_time: Option<SystemTime>,
    /// Hint granted for the current point, if any.
    pub hint: Option<HintStateEntity>,
    /// Last known live position of the team.
    pub location: Option<TeamLocationEntity>,
    /// Last time this team was updated.
    pub updated_at: SystemTime,
}

/// Hint state scoped to a single point index of the team's route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HintStateEntity {
    /// Point index the hint was granted for.
    pub point_index: usize,
    /// Escalation level: 1 = far-view image, 2 = point name reveal.
    pub level: u8,
    /// When the hint was granted.
    pub requested_at: SystemTime,
}

/// Live position record attached to a team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamLocationEntity {
    /// Reported coordinates.
    pub coordinates: GeoPointEntity,
    /// When the position was reported.
    pub timestamp: SystemTime,
}

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPointEntity {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
}

/// Route definition: an ordered sequence of checkpoint ids plus race settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteEntity {
    /// Stable identifier for the route.
    pub id: Uuid,
    /// Human readable route name.
    pub name: String,
    /// Ordered checkpoint ids making up the route.
    pub point_ids: Vec<Uuid>,
    /// Per-route race settings; defaults apply when absent.
    #[serde(default)]
    pub settings: Option<RouteSettingsEntity>,
}

/// Per-route race settings controlling the penalty ladder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteSettingsEntity {
    /// Penalty duration in minutes applied on repeated wrong answers.
    pub penalty_minutes: u32,
    /// Attempt count at which the team is force-advanced past the point.
    pub max_attempts: u32,
}

/// Checkpoint stored in persistence: location, question, and hint imagery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointEntity {
    /// Stable identifier for the point.
    pub id: Uuid,
    /// Display name of the checkpoint.
    pub name: String,
    /// Short code printed on checkpoint signage.
    pub code: String,
    /// Geographic location of the checkpoint.
    pub coordinates: GeoPointEntity,
    /// Question gating advancement past this point.
    pub question: QuestionEntity,
    /// Optional imagery used for hint escalation.
    #[serde(default)]
    pub images: Option<PointImagesEntity>,
    /// Marks checkpoints reserved for advanced routes.
    #[serde(default)]
    pub is_advanced: bool,
    /// Marks the terminal checkpoint of a route.
    #[serde(default)]
    pub is_finish_point: bool,
}

/// Question attached to a checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Question text shown to the team.
    pub text: String,
    /// Ordered list of answer options.
    pub options: Vec<String>,
    /// The option that unlocks the next point (exact string match).
    pub correct_answer: String,
}

/// Near/far imagery for a checkpoint, used by hint levels 0 and 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PointImagesEntity {
    /// Close-up view shown by default.
    pub near_url: String,
    /// Wide view revealed at hint level 1.
    pub far_url: String,
}

/// Kinds of domain events appended to the race log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKindEntity {
    /// A team started racing.
    RouteStarted,
    /// A team submitted an answer (correct or not).
    QuestionAnswered,
    /// A team finished its route.
    RouteCompleted,
    /// A hint was granted to a team.
    HintRequested,
    /// A penalty window was applied to a team.
    PenaltyApplied,
}

impl EventKindEntity {
    /// Wire name of the event kind, matching its serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RouteStarted => "ROUTE_STARTED",
            Self::QuestionAnswered => "QUESTION_ANSWERED",
            Self::RouteCompleted => "ROUTE_COMPLETED",
            Self::HintRequested => "HINT_REQUESTED",
            Self::PenaltyApplied => "PENALTY_APPLIED",
        }
    }
}

/// Immutable race-log record. Created once, never mutated; only removed by
/// the administrative bulk clear.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEntity {
    /// Stable identifier for the event.
    pub id: Uuid,
    /// Team the event belongs to.
    pub team_id: Uuid,
    /// Event classification.
    pub kind: EventKindEntity,
    /// Checkpoint the event refers to, when applicable.
    pub point_id: Option<Uuid>,
    /// Route the event refers to, when applicable.
    pub route_id: Option<Uuid>,
    /// Opaque diagnostic payload.
    pub details: Value,
    /// When the event was recorded.
    pub created_at: SystemTime,
}
