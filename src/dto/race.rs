use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{format_system_time, validation::validate_not_blank},
    state::{
        progression::{AnswerOutcome, HintGrant, PointGuidance, ReachOutcome},
        race::{HintState, Point, Route, Team},
        tracker::ProximityReport,
    },
};

/// Payload submitted when a team answers its current point's question.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitAnswerRequest {
    /// Id of the point the team believes it is answering.
    pub point_id: Uuid,
    pub answer: String,
}

impl Validate for SubmitAnswerRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_not_blank(&self.answer) {
            errors.add("answer", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload for a hint request at the team's current point.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct HintRequestBody {
    pub point_index: usize,
    /// 1 reveals the far-view image, 2 reveals the point name.
    #[validate(range(min = 1, max = 2))]
    pub hint_level: u8,
    /// Set when the client triggers the hint on penalty expiry rather than a
    /// racer action; skips the penalty and duplicate-hint checks.
    #[serde(default)]
    pub is_automatic: bool,
}

/// Live coordinates reported by a racing client.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LocationUpdateRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

/// Client-reported elapsed race time submitted on completion.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CompleteRouteRequest {
    pub elapsed_ms: u64,
}

/// Name and signage code of the checkpoint a team should head to next.
#[derive(Debug, Serialize, ToSchema)]
pub struct NextPointView {
    pub name: String,
    pub code: String,
}

/// Outcome of an answer submission.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerResponse {
    pub correct: bool,
    pub message: String,
    /// Ordinal of this submission at the point (1-based), 0 when the route
    /// was already over.
    pub attempts: u32,
    pub penalty_end_time: Option<String>,
    /// Hint level granted automatically alongside a penalty, if any.
    pub hint_level: Option<u8>,
    pub next_point: Option<NextPointView>,
    pub is_last_point: bool,
}

/// Outcome of a hint request.
#[derive(Debug, Serialize, ToSchema)]
pub struct HintResponse {
    pub hint_level: u8,
    pub penalty_end_time: String,
}

/// Outcome of a physical arrival report.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReachResponse {
    pub advanced: bool,
    pub message: String,
    pub team: TeamProgressView,
}

/// Distance from the reported position to one checkpoint of the route.
#[derive(Debug, Serialize, ToSchema)]
pub struct PointDistanceView {
    pub point_id: Uuid,
    pub name: String,
    pub distance_m: f64,
    pub visited: bool,
    pub within_threshold: bool,
}

/// Acknowledgement of a location update, with distances to every checkpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct LocationAck {
    pub recorded_at: String,
    pub threshold_m: f64,
    pub points: Vec<PointDistanceView>,
    pub nearest_unvisited: Option<Uuid>,
}

/// Acknowledgement of a completion request.
#[derive(Debug, Serialize, ToSchema)]
pub struct CompleteRouteResponse {
    pub message: String,
    pub completion_time_ms: Option<u64>,
    pub completed_at: Option<String>,
}

/// Hint currently granted to a team.
#[derive(Debug, Serialize, ToSchema)]
pub struct HintView {
    pub point_index: usize,
    pub hint_level: u8,
    pub requested_at: String,
}

/// Question text and options, without the correct answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionView {
    pub text: String,
    pub options: Vec<String>,
}

/// Checkpoint imagery used for hint escalation.
#[derive(Debug, Serialize, ToSchema)]
pub struct PointImagesView {
    pub near_url: String,
    pub far_url: String,
}

/// The checkpoint a team currently stands at, stripped of the solution.
#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentPointView {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub question: QuestionView,
    pub images: Option<PointImagesView>,
    pub is_finish_point: bool,
}

/// Progression snapshot of a team, as exposed to racing clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamProgressView {
    pub id: Uuid,
    pub name: String,
    pub current_point_index: usize,
    pub total_points: usize,
    pub attempts: u32,
    pub visited_point_ids: Vec<Uuid>,
    /// One of "waiting", "question_open", "penalized", "completed".
    pub phase: String,
    pub penalty_end_time: Option<String>,
    pub hint: Option<HintView>,
    pub start_time: Option<String>,
    pub completion_time_ms: Option<u64>,
    pub completed_at: Option<String>,
    pub active: bool,
    pub current_point: Option<CurrentPointView>,
}

impl TeamProgressView {
    /// Project a team and its route snapshot at the given instant.
    pub fn project(team: &Team, route: &Route, now: SystemTime) -> Self {
        Self {
            id: team.id,
            name: team.name.clone(),
            current_point_index: team.current_point_index,
            total_points: route.points.len(),
            attempts: team.attempts,
            visited_point_ids: team.visited_points.iter().copied().collect(),
            phase: team.phase(route, now).as_str().to_string(),
            penalty_end_time: team.penalty_active(now).map(format_system_time),
            hint: team.hint.map(Into::into),
            start_time: team.start_time.map(format_system_time),
            completion_time_ms: team.completion_time_ms,
            completed_at: team.completed_at.map(format_system_time),
            active: team.active,
            current_point: team.current_point(route).map(Into::into),
        }
    }
}

impl From<PointGuidance> for NextPointView {
    fn from(guidance: PointGuidance) -> Self {
        Self {
            name: guidance.name,
            code: guidance.code,
        }
    }
}

impl From<HintState> for HintView {
    fn from(hint: HintState) -> Self {
        Self {
            point_index: hint.point_index,
            hint_level: hint.level,
            requested_at: format_system_time(hint.requested_at),
        }
    }
}

impl From<&Point> for CurrentPointView {
    fn from(point: &Point) -> Self {
        Self {
            id: point.id,
            name: point.name.clone(),
            code: point.code.clone(),
            question: QuestionView {
                text: point.question.text.clone(),
                options: point.question.options.clone(),
            },
            images: point.images.as_ref().map(|images| PointImagesView {
                near_url: images.near_url.clone(),
                far_url: images.far_url.clone(),
            }),
            is_finish_point: point.is_finish_point,
        }
    }
}

impl From<AnswerOutcome> for AnswerResponse {
    fn from(outcome: AnswerOutcome) -> Self {
        match outcome {
            AnswerOutcome::AlreadyCompleted => Self {
                correct: true,
                message: "route already completed".to_string(),
                attempts: 0,
                penalty_end_time: None,
                hint_level: None,
                next_point: None,
                is_last_point: true,
            },
            AnswerOutcome::Correct {
                attempt,
                next_point,
                route_finished,
            } => Self {
                correct: true,
                message: if route_finished {
                    "correct, route finished".to_string()
                } else {
                    "correct".to_string()
                },
                attempts: attempt,
                penalty_end_time: None,
                hint_level: None,
                next_point: next_point.map(Into::into),
                is_last_point: route_finished,
            },
            AnswerOutcome::Incorrect { attempt } => Self {
                correct: false,
                message: "wrong, try again".to_string(),
                attempts: attempt,
                penalty_end_time: None,
                hint_level: None,
                next_point: None,
                is_last_point: false,
            },
            AnswerOutcome::IncorrectPenalized {
                attempt,
                penalty_end,
                hint_level,
            } => Self {
                correct: false,
                message: "wrong, penalty applied and the far view will unlock".to_string(),
                attempts: attempt,
                penalty_end_time: Some(format_system_time(penalty_end)),
                hint_level: Some(hint_level),
                next_point: None,
                is_last_point: false,
            },
            AnswerOutcome::ForcedAdvance {
                attempt,
                penalty_end,
                skipped_point,
                next_point,
                route_finished,
            } => Self {
                correct: false,
                message: format!("out of attempts, moving on past {}", skipped_point.name),
                attempts: attempt,
                penalty_end_time: Some(format_system_time(penalty_end)),
                hint_level: None,
                next_point: next_point.map(Into::into),
                is_last_point: route_finished,
            },
        }
    }
}

impl From<HintGrant> for HintResponse {
    fn from(grant: HintGrant) -> Self {
        Self {
            hint_level: grant.level,
            penalty_end_time: format_system_time(grant.penalty_end),
        }
    }
}

impl From<(ReachOutcome, TeamProgressView)> for ReachResponse {
    fn from((outcome, team): (ReachOutcome, TeamProgressView)) -> Self {
        let (advanced, message) = match outcome {
            ReachOutcome::AlreadyCompleted => (false, "route already completed"),
            ReachOutcome::Advanced { .. } => (true, "arrival confirmed, moving on"),
            ReachOutcome::NotYetAnswered => (false, "answer the question to pass this point"),
        };

        Self {
            advanced,
            message: message.to_string(),
            team,
        }
    }
}

impl From<(ProximityReport, SystemTime)> for LocationAck {
    fn from((report, recorded_at): (ProximityReport, SystemTime)) -> Self {
        let nearest_unvisited = report.nearest_unvisited().map(|reading| reading.point_id);
        let threshold_m = report.threshold_m;
        let points = report
            .readings
            .into_iter()
            .map(|reading| PointDistanceView {
                point_id: reading.point_id,
                name: reading.name,
                distance_m: reading.distance_m,
                visited: reading.visited,
                within_threshold: reading.distance_m <= threshold_m,
            })
            .collect();

        Self {
            recorded_at: format_system_time(recorded_at),
            threshold_m,
            points,
            nearest_unvisited,
        }
    }
}
