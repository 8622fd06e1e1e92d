use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use indexmap::IndexSet;
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{
    HintStateEntity, PointEntity, PointImagesEntity, QuestionEntity, RouteEntity,
    RouteSettingsEntity, TeamEntity, TeamLocationEntity,
};
use crate::state::geo::GeoPoint;

/// Runtime representation of a team racing one route.
#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Display name chosen for the team.
    pub name: String,
    /// Shareable link token identifying the team.
    pub unique_link: String,
    /// Route assigned to this team.
    pub route_id: Uuid,
    /// 0-based position into the route's ordered point list. Equal to the
    /// number of route points once the route has been finished.
    pub current_point_index: usize,
    /// Wrong answers at the current point since the last advancement.
    pub attempts: u32,
    /// Points answered correctly, in answer order.
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
    pub hint: Option<HintState>,
    /// Last known live position of the team.
    pub location: Option<TeamLocation>,
    /// Last time this team was updated.
    pub updated_at: SystemTime,
}

/// Hint state scoped to a single point index of the team's route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintState {
    /// Point index the hint was granted for.
    pub point_index: usize,
    /// Escalation level: 1 = far-view image, 2 = point name reveal.
    pub level: u8,
    /// When the hint was granted.
    pub requested_at: SystemTime,
}

/// Live position record attached to a team.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeamLocation {
    /// Reported coordinates.
    pub coordinates: GeoPoint,
    /// When the position was reported.
    pub timestamp: SystemTime,
}

/// Runtime route snapshot with its points populated and settings resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Stable identifier for the route.
    pub id: Uuid,
    /// Human readable route name.
    pub name: String,
    /// Ordered checkpoints making up the route.
    pub points: Vec<Point>,
    /// Resolved race settings (route-specific or application defaults).
    pub settings: RouteSettings,
}

/// Race settings controlling the penalty ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSettings {
    /// Penalty duration in minutes applied on repeated wrong answers.
    pub penalty_minutes: u32,
    /// Attempt count at which the team is force-advanced past the point.
    pub max_attempts: u32,
}

impl RouteSettings {
    /// Penalty window as a duration.
    pub fn penalty_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.penalty_minutes) * 60)
    }
}

/// Runtime checkpoint with its question and hint imagery.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    /// Stable identifier for the point.
    pub id: Uuid,
    /// Display name of the checkpoint.
    pub name: String,
    /// Short code printed on checkpoint signage.
    pub code: String,
    /// Geographic location of the checkpoint.
    pub coordinates: GeoPoint,
    /// Question gating advancement past this point.
    pub question: Question,
    /// Optional imagery used for hint escalation.
    pub images: Option<PointImages>,
    /// Marks checkpoints reserved for advanced routes.
    pub is_advanced: bool,
    /// Marks the terminal checkpoint of a route.
    pub is_finish_point: bool,
}

/// Question attached to a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Question text shown to the team.
    pub text: String,
    /// Ordered list of answer options.
    pub options: Vec<String>,
    /// The option that unlocks the next point (exact string match).
    pub correct_answer: String,
}

/// Near/far imagery for a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointImages {
    /// Close-up view shown by default.
    pub near_url: String,
    /// Wide view revealed at hint level 1.
    pub far_url: String,
}

/// High-level phase a team is in, derived from its stored fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RacePhase {
    /// Start time not set yet; the team has not begun racing.
    Waiting,
    /// Racing with the current point's question open.
    QuestionOpen,
    /// Question interaction blocked until the deadline passes.
    Penalized {
        /// When the penalty window ends.
        until: SystemTime,
    },
    /// Every point of the route has been passed.
    Completed,
}

impl RacePhase {
    /// Short lowercase name of the phase, used in client payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::QuestionOpen => "question_open",
            Self::Penalized { .. } => "penalized",
            Self::Completed => "completed",
        }
    }
}

/// Raised when a route references point ids missing from storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("route `{route_id}` references {missing} point(s) missing from storage")]
pub struct MissingPointsError {
    /// Route whose snapshot could not be assembled.
    pub route_id: Uuid,
    /// Number of referenced point ids without a stored document.
    pub missing: usize,
}

impl Route {
    /// Assemble a runtime snapshot from a stored route and its point
    /// documents, ordering points as the route lists them. `defaults` fills
    /// in settings for routes that do not carry their own.
    pub fn assemble(
        entity: RouteEntity,
        points: Vec<PointEntity>,
        defaults: RouteSettings,
    ) -> Result<Self, MissingPointsError> {
        let mut by_id: HashMap<Uuid, PointEntity> =
            points.into_iter().map(|point| (point.id, point)).collect();

        let mut ordered: Vec<Point> = Vec::with_capacity(entity.point_ids.len());
        let mut missing = 0;
        for id in &entity.point_ids {
            match by_id.remove(id) {
                Some(point) => ordered.push(Point::from(point)),
                // A repeated id is served from the already-built snapshot.
                None => match ordered.iter().find(|point| point.id == *id).cloned() {
                    Some(point) => ordered.push(point),
                    None => missing += 1,
                },
            }
        }

        if missing > 0 {
            return Err(MissingPointsError {
                route_id: entity.id,
                missing,
            });
        }

        let settings = entity
            .settings
            .map(RouteSettings::from)
            .unwrap_or(defaults);

        Ok(Self {
            id: entity.id,
            name: entity.name,
            points: ordered,
            settings,
        })
    }
}

impl Team {
    /// Mark the team as racing. Returns false without mutating when the team
    /// already has a start time.
    pub fn start(&mut self, now: SystemTime) -> bool {
        if self.start_time.is_some() {
            return false;
        }
        self.start_time = Some(now);
        true
    }

    /// Reset every progression field to its initial value, keeping identity
    /// and the last known location.
    pub fn restart(&mut self) {
        self.current_point_index = 0;
        self.attempts = 0;
        self.visited_points.clear();
        self.start_time = None;
        self.completion_time_ms = None;
        self.completed_at = None;
        self.active = true;
        self.penalty_end_time = None;
        self.hint = None;
    }

    /// Move to the next point: the index advances (capped at the route
    /// length), attempts reset, and hint state scoped to the left-behind
    /// point is dropped.
    pub fn advance(&mut self, route: &Route) {
        self.current_point_index = (self.current_point_index + 1).min(route.points.len());
        self.attempts = 0;
        self.hint = None;
    }

    /// Extend the penalty window to at least `now + duration`. An already
    /// later deadline is kept, so stacked penalties never shorten each other.
    pub fn apply_penalty(&mut self, duration: Duration, now: SystemTime) -> SystemTime {
        let candidate = now + duration;
        let effective = match self.penalty_end_time {
            Some(current) if current > candidate => current,
            _ => candidate,
        };
        self.penalty_end_time = Some(effective);
        effective
    }

    /// The penalty deadline, if it is still in the future.
    pub fn penalty_active(&self, now: SystemTime) -> Option<SystemTime> {
        self.penalty_end_time.filter(|until| now < *until)
    }

    /// The point the team currently stands at, or None once the route is
    /// finished.
    pub fn current_point<'a>(&self, route: &'a Route) -> Option<&'a Point> {
        route.points.get(self.current_point_index)
    }

    /// Whether the team answered this point correctly at some earlier index.
    pub fn has_visited(&self, point_id: Uuid) -> bool {
        self.visited_points.contains(&point_id)
    }

    /// Whether the index has passed the last point of the route.
    pub fn is_completed(&self, route: &Route) -> bool {
        self.current_point_index >= route.points.len()
    }

    /// Derive the high-level phase from stored fields at the given instant.
    pub fn phase(&self, route: &Route, now: SystemTime) -> RacePhase {
        if self.is_completed(route) {
            return RacePhase::Completed;
        }
        if self.start_time.is_none() {
            return RacePhase::Waiting;
        }
        match self.penalty_active(now) {
            Some(until) => RacePhase::Penalized { until },
            None => RacePhase::QuestionOpen,
        }
    }
}

impl From<RouteSettingsEntity> for RouteSettings {
    fn from(value: RouteSettingsEntity) -> Self {
        Self {
            penalty_minutes: value.penalty_minutes,
            max_attempts: value.max_attempts,
        }
    }
}

impl From<PointEntity> for Point {
    fn from(value: PointEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            code: value.code,
            coordinates: value.coordinates.into(),
            question: value.question.into(),
            images: value.images.map(Into::into),
            is_advanced: value.is_advanced,
            is_finish_point: value.is_finish_point,
        }
    }
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            text: value.text,
            options: value.options,
            correct_answer: value.correct_answer,
        }
    }
}

impl From<PointImagesEntity> for PointImages {
    fn from(value: PointImagesEntity) -> Self {
        Self {
            near_url: value.near_url,
            far_url: value.far_url,
        }
    }
}

impl From<HintStateEntity> for HintState {
    fn from(value: HintStateEntity) -> Self {
        Self {
            point_index: value.point_index,
            level: value.level,
            requested_at: value.requested_at,
        }
    }
}

impl From<HintState> for HintStateEntity {
    fn from(value: HintState) -> Self {
        Self {
            point_index: value.point_index,
            level: value.level,
            requested_at: value.requested_at,
        }
    }
}

impl From<TeamLocationEntity> for TeamLocation {
    fn from(value: TeamLocationEntity) -> Self {
        Self {
            coordinates: value.coordinates.into(),
            timestamp: value.timestamp,
        }
    }
}

impl From<TeamLocation> for TeamLocationEntity {
    fn from(value: TeamLocation) -> Self {
        Self {
            coordinates: value.coordinates.into(),
            timestamp: value.timestamp,
        }
    }
}

impl From<TeamEntity> for Team {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            unique_link: value.unique_link,
            route_id: value.route_id,
            current_point_index: value.current_point_index,
            attempts: value.attempts,
            visited_points: value.visited_points,
            start_time: value.start_time,
            completion_time_ms: value.completion_time_ms,
            completed_at: value.completed_at,
            active: value.active,
            penalty_end_time: value.penalty_end_time,
            hint: value.hint.map(Into::into),
            location: value.location.map(Into::into),
            updated_at: value.updated_at,
        }
    }
}

impl From<Team> for TeamEntity {
    fn from(value: Team) -> Self {
        Self {
            id: value.id,
            name: value.name,
            unique_link: value.unique_link,
            route_id: value.route_id,
            current_point_index: value.current_point_index,
            attempts: value.attempts,
            visited_points: value.visited_points,
            start_time: value.start_time,
            completion_time_ms: value.completion_time_ms,
            completed_at: value.completed_at,
            active: value.active,
            penalty_end_time: value.penalty_end_time,
            hint: value.hint.map(Into::into),
            location: value.location.map(Into::into),
            updated_at: value.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::state::test_support::{route_of, team_on};

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn restart_resets_progression_but_keeps_location() {
        let route = route_of(3);
        let mut team = team_on(&route);
        team.start(at(100));
        team.current_point_index = 2;
        team.attempts = 1;
        team.visited_points.insert(route.points[0].id);
        team.penalty_end_time = Some(at(500));
        team.location = Some(TeamLocation {
            coordinates: GeoPoint { lat: 1.0, lon: 2.0 },
            timestamp: at(90),
        });

        team.restart();

        assert_eq!(team.current_point_index, 0);
        assert_eq!(team.attempts, 0);
        assert!(team.visited_points.is_empty());
        assert!(team.start_time.is_none());
        assert!(team.penalty_end_time.is_none());
        assert!(team.active);
        assert!(team.location.is_some());
    }

    #[test]
    fn start_is_a_noop_when_already_racing() {
        let route = route_of(2);
        let mut team = team_on(&route);
        assert!(team.start(at(10)));
        assert!(!team.start(at(20)));
        assert_eq!(team.start_time, Some(at(10)));
    }

    #[test]
    fn stacked_penalties_never_shorten_the_window() {
        let route = route_of(2);
        let mut team = team_on(&route);

        let first = team.apply_penalty(Duration::from_secs(180), at(100));
        assert_eq!(first, at(280));

        // A one-minute penalty applied right after must not pull the
        // deadline back.
        let second = team.apply_penalty(Duration::from_secs(60), at(110));
        assert_eq!(second, at(280));

        let third = team.apply_penalty(Duration::from_secs(600), at(120));
        assert_eq!(third, at(720));
    }

    #[test]
    fn advance_caps_at_route_length_and_clears_point_state() {
        let route = route_of(2);
        let mut team = team_on(&route);
        team.attempts = 2;
        team.hint = Some(HintState {
            point_index: 0,
            level: 1,
            requested_at: at(5),
        });

        team.advance(&route);
        assert_eq!(team.current_point_index, 1);
        assert_eq!(team.attempts, 0);
        assert!(team.hint.is_none());

        team.advance(&route);
        team.advance(&route);
        assert_eq!(team.current_point_index, 2);
    }

    #[test]
    fn phase_derivation_follows_stored_fields() {
        let route = route_of(2);
        let mut team = team_on(&route);
        assert_eq!(team.phase(&route, at(0)), RacePhase::Waiting);

        team.start(at(10));
        assert_eq!(team.phase(&route, at(20)), RacePhase::QuestionOpen);

        team.apply_penalty(Duration::from_secs(60), at(20));
        assert_eq!(
            team.phase(&route, at(30)),
            RacePhase::Penalized { until: at(80) }
        );
        assert_eq!(team.phase(&route, at(80)), RacePhase::QuestionOpen);

        team.current_point_index = route.points.len();
        assert_eq!(team.phase(&route, at(90)), RacePhase::Completed);
    }

    #[test]
    fn assemble_orders_points_and_resolves_default_settings() {
        let defaults = RouteSettings {
            penalty_minutes: 3,
            max_attempts: 3,
        };
        let route = route_of(3);
        let mut entity = RouteEntity {
            id: route.id,
            name: route.name.clone(),
            point_ids: route.points.iter().map(|point| point.id).collect(),
            settings: None,
        };
        entity.point_ids.reverse();

        let mut point_entities: Vec<PointEntity> = Vec::new();
        for point in &route.points {
            point_entities.push(PointEntity {
                id: point.id,
                name: point.name.clone(),
                code: point.code.clone(),
                coordinates: point.coordinates.into(),
                question: QuestionEntity {
                    text: point.question.text.clone(),
                    options: point.question.options.clone(),
                    correct_answer: point.question.correct_answer.clone(),
                },
                images: None,
                is_advanced: false,
                is_finish_point: false,
            });
        }

        let assembled = Route::assemble(entity.clone(), point_entities.clone(), defaults)
            .expect("assembly succeeds");
        let assembled_ids: Vec<Uuid> = assembled.points.iter().map(|point| point.id).collect();
        assert_eq!(assembled_ids, entity.point_ids);
        assert_eq!(assembled.settings, defaults);

        point_entities.pop();
        let err = Route::assemble(entity, point_entities, defaults).unwrap_err();
        assert_eq!(err.missing, 1);
    }
}
