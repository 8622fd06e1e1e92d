use std::time::{Duration, SystemTime};

use thiserror::Error;
use uuid::Uuid;

use crate::state::race::{HintState, Point, Route, Team};

/// Hint level revealing the far-view image of the point.
const FAR_VIEW_HINT: u8 = 1;
/// Hint level revealing the point name.
const NAME_REVEAL_HINT: u8 = 2;

/// Rejections raised by the progression engine. None of these mutate the
/// team; the caller returns them as failed operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressionError {
    /// The submitted point id does not match the team's current point.
    #[error("point `{submitted}` is not the team's current point")]
    PointMismatch {
        /// Point id carried by the request.
        submitted: Uuid,
    },
    /// A penalty window is still open.
    #[error("a penalty is active, question interaction is blocked")]
    PenaltyActive {
        /// When the penalty window ends.
        until: SystemTime,
    },
    /// A hint at the same or a higher level was already granted here.
    #[error("hint level {existing} was already granted at point index {point_index}")]
    HintAlreadyGranted {
        /// Point index the existing hint is scoped to.
        point_index: usize,
        /// Level of the existing hint.
        existing: u8,
    },
    /// The hint request targets a point index the team is no longer at.
    #[error("hint requested for point index {requested} but the team is at index {current}")]
    StalePoint {
        /// Index carried by the request.
        requested: usize,
        /// The team's current index.
        current: usize,
    },
    /// Hint levels are 1 (far view) or 2 (name reveal).
    #[error("invalid hint level {level}, expected 1 or 2")]
    InvalidHintLevel {
        /// Level carried by the request.
        level: u8,
    },
    /// Completion was requested before the last point was passed.
    #[error("route is not finished yet: at point {current} of {total}")]
    RouteNotFinished {
        /// The team's current index.
        current: usize,
        /// Number of points in the route.
        total: usize,
    },
}

/// Name and signage code of a checkpoint, returned as caller guidance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointGuidance {
    /// Display name of the checkpoint.
    pub name: String,
    /// Short code printed on checkpoint signage.
    pub code: String,
}

impl From<&Point> for PointGuidance {
    fn from(point: &Point) -> Self {
        Self {
            name: point.name.clone(),
            code: point.code.clone(),
        }
    }
}

/// Result of an answer submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The route was already complete; nothing changed.
    AlreadyCompleted,
    /// Correct answer: the point was recorded as visited and the team
    /// advanced.
    Correct {
        /// Ordinal of this submission at the point (1-based).
        attempt: u32,
        /// Guidance towards the next point, if one remains.
        next_point: Option<PointGuidance>,
        /// True when the advancement passed the last point.
        route_finished: bool,
    },
    /// Wrong answer below the penalty tier; the team may retry immediately.
    Incorrect {
        /// Ordinal of this submission at the point (1-based).
        attempt: u32,
    },
    /// Wrong answer at the penalty tier: a penalty window opened and the
    /// far-view hint was granted for when it expires.
    IncorrectPenalized {
        /// Ordinal of this submission at the point (1-based).
        attempt: u32,
        /// When the penalty window ends.
        penalty_end: SystemTime,
        /// Level of the automatically granted hint.
        hint_level: u8,
    },
    /// Wrong answer at the final tier: a second penalty window opened and the
    /// team was moved past the point without answering it.
    ForcedAdvance {
        /// Ordinal of this submission at the point (1-based).
        attempt: u32,
        /// When the penalty window ends.
        penalty_end: SystemTime,
        /// The point that was skipped.
        skipped_point: PointGuidance,
        /// Guidance towards the next point, if one remains.
        next_point: Option<PointGuidance>,
        /// True when the forced advancement passed the last point.
        route_finished: bool,
    },
}

/// Who triggered a hint request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintOrigin {
    /// A racer asked for the hint; all policy checks apply.
    Manual,
    /// The engine granted the hint itself; penalty and duplicate checks are
    /// skipped.
    Automatic,
}

/// A granted hint and the penalty deadline it costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintGrant {
    /// Granted hint level.
    pub level: u8,
    /// When the penalty window ends.
    pub penalty_end: SystemTime,
}

/// Result of a physical arrival report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReachOutcome {
    /// The route was already complete; nothing changed.
    AlreadyCompleted,
    /// The point was answered earlier, so arrival moved the team forward.
    Advanced {
        /// Guidance towards the next point, if one remains.
        next_point: Option<PointGuidance>,
        /// True when the advancement passed the last point.
        route_finished: bool,
    },
    /// Arrival alone grants nothing; the question still has to be answered.
    NotYetAnswered,
}

/// Result of a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// First finalization; the completion event should be recorded.
    Finalized,
    /// The route was finalized earlier; nothing changed.
    AlreadyCompleted,
}

/// Evaluate an answer for the team's current point and transition the team
/// accordingly.
///
/// Wrong answers climb a ladder driven by the route settings: below
/// `max_attempts - 1` the team just retries, at `max_attempts - 1` a penalty
/// window opens and the far-view hint is queued, and at `max_attempts` a
/// second penalty opens and the team is moved past the point without it being
/// recorded as visited.
pub fn submit_answer(
    team: &mut Team,
    route: &Route,
    point_id: Uuid,
    answer: &str,
    hint_penalty: Duration,
    now: SystemTime,
) -> Result<AnswerOutcome, ProgressionError> {
    let Some(point) = team.current_point(route) else {
        return Ok(AnswerOutcome::AlreadyCompleted);
    };

    if let Some(until) = team.penalty_active(now) {
        return Err(ProgressionError::PenaltyActive { until });
    }

    if point_id != point.id {
        return Err(ProgressionError::PointMismatch {
            submitted: point_id,
        });
    }

    let attempt = team.attempts + 1;

    if answer == point.question.correct_answer {
        team.visited_points.insert(point.id);
        team.advance(route);
        return Ok(AnswerOutcome::Correct {
            attempt,
            next_point: team.current_point(route).map(PointGuidance::from),
            route_finished: team.is_completed(route),
        });
    }

    team.attempts = attempt;
    let settings = route.settings;

    if attempt >= settings.max_attempts {
        let penalty_end = team.apply_penalty(settings.penalty_duration(), now);
        let skipped_point = PointGuidance::from(point);
        team.advance(route);
        return Ok(AnswerOutcome::ForcedAdvance {
            attempt,
            penalty_end,
            skipped_point,
            next_point: team.current_point(route).map(PointGuidance::from),
            route_finished: team.is_completed(route),
        });
    }

    if attempt + 1 == settings.max_attempts {
        team.apply_penalty(settings.penalty_duration(), now);
        let index = team.current_point_index;
        let grant = grant_hint(team, index, FAR_VIEW_HINT, hint_penalty, now);
        return Ok(AnswerOutcome::IncorrectPenalized {
            attempt,
            penalty_end: grant.penalty_end,
            hint_level: grant.level,
        });
    }

    Ok(AnswerOutcome::Incorrect { attempt })
}

/// Grant a hint for the team's current point.
///
/// Manual requests are rejected while a penalty is active or when a hint at
/// the same or a higher level was already granted for the point; automatic
/// grants skip both checks.
pub fn request_hint(
    team: &mut Team,
    route: &Route,
    point_index: usize,
    level: u8,
    origin: HintOrigin,
    hint_penalty: Duration,
    now: SystemTime,
) -> Result<HintGrant, ProgressionError> {
    if !(FAR_VIEW_HINT..=NAME_REVEAL_HINT).contains(&level) {
        return Err(ProgressionError::InvalidHintLevel { level });
    }

    if team.is_completed(route) || point_index != team.current_point_index {
        return Err(ProgressionError::StalePoint {
            requested: point_index,
            current: team.current_point_index,
        });
    }

    if origin == HintOrigin::Manual {
        if let Some(until) = team.penalty_active(now) {
            return Err(ProgressionError::PenaltyActive { until });
        }
        if let Some(existing) = team.hint {
            if existing.point_index == point_index && existing.level >= level {
                return Err(ProgressionError::HintAlreadyGranted {
                    point_index,
                    existing: existing.level,
                });
            }
        }
    }

    Ok(grant_hint(team, point_index, level, hint_penalty, now))
}

/// Report physical arrival at a point. Advances only when the point was
/// already answered correctly at an earlier index of the route.
pub fn reach_point(
    team: &mut Team,
    route: &Route,
    point_id: Uuid,
) -> Result<ReachOutcome, ProgressionError> {
    let Some(point) = team.current_point(route) else {
        return Ok(ReachOutcome::AlreadyCompleted);
    };

    if point_id != point.id {
        return Err(ProgressionError::PointMismatch {
            submitted: point_id,
        });
    }

    if !team.has_visited(point_id) {
        return Ok(ReachOutcome::NotYetAnswered);
    }

    team.advance(route);
    Ok(ReachOutcome::Advanced {
        next_point: team.current_point(route).map(PointGuidance::from),
        route_finished: team.is_completed(route),
    })
}

/// Finalize a finished route: deactivate the team and persist the
/// client-reported elapsed time. Performed at most once; later calls are
/// no-ops.
pub fn complete_route(
    team: &mut Team,
    route: &Route,
    elapsed_ms: u64,
    now: SystemTime,
) -> Result<CompletionOutcome, ProgressionError> {
    if team.completed_at.is_some() {
        return Ok(CompletionOutcome::AlreadyCompleted);
    }

    if !team.is_completed(route) {
        return Err(ProgressionError::RouteNotFinished {
            current: team.current_point_index,
            total: route.points.len(),
        });
    }

    team.active = false;
    team.completion_time_ms = Some(elapsed_ms);
    team.completed_at = Some(now);
    Ok(CompletionOutcome::Finalized)
}

fn grant_hint(
    team: &mut Team,
    point_index: usize,
    level: u8,
    hint_penalty: Duration,
    now: SystemTime,
) -> HintGrant {
    team.hint = Some(HintState {
        point_index,
        level,
        requested_at: now,
    });
    let penalty_end = team.apply_penalty(hint_penalty, now);
    HintGrant { level, penalty_end }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::race::RouteSettings;
    use crate::state::test_support::{route_of, route_with_settings, team_on};

    const HINT_COST: Duration = Duration::from_secs(60);

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn answer_correctly(team: &mut Team, route: &Route, index: usize, now: SystemTime) {
        let point = &route.points[index];
        let answer = point.question.correct_answer.clone();
        submit_answer(team, route, point.id, &answer, HINT_COST, now).unwrap();
    }

    fn miss(
        team: &mut Team,
        route: &Route,
        now: SystemTime,
    ) -> Result<AnswerOutcome, ProgressionError> {
        let point_id = route.points[team.current_point_index].id;
        submit_answer(team, route, point_id, "not it", HINT_COST, now)
    }

    #[test]
    fn correct_answer_advances_and_records_visit() {
        let route = route_of(3);
        let mut team = team_on(&route);
        let first = route.points[0].id;

        let outcome =
            submit_answer(&mut team, &route, first, "answer-0", HINT_COST, at(100)).unwrap();

        assert_eq!(
            outcome,
            AnswerOutcome::Correct {
                attempt: 1,
                next_point: Some(PointGuidance {
                    name: "Point 1".to_owned(),
                    code: "P1".to_owned(),
                }),
                route_finished: false,
            }
        );
        assert_eq!(team.current_point_index, 1);
        assert_eq!(team.attempts, 0);
        assert!(team.has_visited(first));
        assert!(team.penalty_end_time.is_none());
    }

    #[test]
    fn correct_answer_resets_attempts_after_a_miss() {
        let route = route_of(2);
        let mut team = team_on(&route);

        assert_eq!(
            miss(&mut team, &route, at(100)).unwrap(),
            AnswerOutcome::Incorrect { attempt: 1 }
        );
        assert_eq!(team.attempts, 1);

        let outcome = submit_answer(
            &mut team,
            &route,
            route.points[0].id,
            "answer-0",
            HINT_COST,
            at(110),
        )
        .unwrap();
        assert!(matches!(outcome, AnswerOutcome::Correct { attempt: 2, .. }));
        assert_eq!(team.attempts, 0);
        assert_eq!(team.current_point_index, 1);
    }

    #[test]
    fn first_wrong_answer_costs_nothing() {
        let route = route_of(2);
        let mut team = team_on(&route);

        let outcome = miss(&mut team, &route, at(100)).unwrap();

        assert_eq!(outcome, AnswerOutcome::Incorrect { attempt: 1 });
        assert_eq!(team.current_point_index, 0);
        assert!(team.penalty_end_time.is_none());
        assert!(team.hint.is_none());
        assert!(team.visited_points.is_empty());
    }

    #[test]
    fn second_wrong_answer_opens_penalty_and_queues_far_view_hint() {
        let route = route_of(2);
        let mut team = team_on(&route);
        miss(&mut team, &route, at(1000)).unwrap();

        let outcome = miss(&mut team, &route, at(1010)).unwrap();

        // The route penalty is three minutes; the flat hint cost is shorter
        // and must not pull the deadline forward.
        assert_eq!(
            outcome,
            AnswerOutcome::IncorrectPenalized {
                attempt: 2,
                penalty_end: at(1190),
                hint_level: 1,
            }
        );
        assert_eq!(team.current_point_index, 0);
        assert_eq!(team.attempts, 2);
        assert_eq!(
            team.hint,
            Some(HintState {
                point_index: 0,
                level: 1,
                requested_at: at(1010),
            })
        );
    }

    #[test]
    fn third_wrong_answer_forces_advancement() {
        let route = route_of(2);
        let mut team = team_on(&route);
        miss(&mut team, &route, at(1000)).unwrap();
        miss(&mut team, &route, at(1010)).unwrap();

        let outcome = miss(&mut team, &route, at(1200)).unwrap();

        assert_eq!(
            outcome,
            AnswerOutcome::ForcedAdvance {
                attempt: 3,
                penalty_end: at(1380),
                skipped_point: PointGuidance {
                    name: "Point 0".to_owned(),
                    code: "P0".to_owned(),
                },
                next_point: Some(PointGuidance {
                    name: "Point 1".to_owned(),
                    code: "P1".to_owned(),
                }),
                route_finished: false,
            }
        );
        assert_eq!(team.current_point_index, 1);
        assert_eq!(team.attempts, 0);
        // Skipped, not answered: the point must not count as visited.
        assert!(team.visited_points.is_empty());
        assert!(team.hint.is_none());
    }

    #[test]
    fn answer_during_penalty_is_rejected_without_mutation() {
        let route = route_of(2);
        let mut team = team_on(&route);
        miss(&mut team, &route, at(1000)).unwrap();
        miss(&mut team, &route, at(1010)).unwrap();

        let err = miss(&mut team, &route, at(1100)).unwrap_err();

        assert_eq!(err, ProgressionError::PenaltyActive { until: at(1190) });
        assert_eq!(team.attempts, 2);
        assert_eq!(team.current_point_index, 0);
    }

    #[test]
    fn mismatched_point_is_rejected() {
        let route = route_of(2);
        let mut team = team_on(&route);
        let stale = route.points[1].id;

        let err =
            submit_answer(&mut team, &route, stale, "answer-1", HINT_COST, at(100)).unwrap_err();

        assert_eq!(err, ProgressionError::PointMismatch { submitted: stale });
        assert_eq!(team.attempts, 0);
    }

    #[test]
    fn resubmitting_after_route_end_changes_nothing() {
        let route = route_of(2);
        let mut team = team_on(&route);
        answer_correctly(&mut team, &route, 0, at(100));
        answer_correctly(&mut team, &route, 1, at(200));
        let snapshot = team.clone();

        let outcome = submit_answer(
            &mut team,
            &route,
            route.points[1].id,
            "answer-1",
            HINT_COST,
            at(300),
        )
        .unwrap();

        assert_eq!(outcome, AnswerOutcome::AlreadyCompleted);
        assert_eq!(team, snapshot);
    }

    #[test]
    fn correct_answer_on_last_point_finishes_route() {
        let route = route_of(2);
        let mut team = team_on(&route);
        answer_correctly(&mut team, &route, 0, at(100));

        let outcome = submit_answer(
            &mut team,
            &route,
            route.points[1].id,
            "answer-1",
            HINT_COST,
            at(200),
        )
        .unwrap();

        assert_eq!(
            outcome,
            AnswerOutcome::Correct {
                attempt: 1,
                next_point: None,
                route_finished: true,
            }
        );
        assert_eq!(team.current_point_index, 2);
    }

    #[test]
    fn forced_advance_can_finish_the_route() {
        let route = route_of(1);
        let mut team = team_on(&route);
        miss(&mut team, &route, at(1000)).unwrap();
        miss(&mut team, &route, at(1010)).unwrap();

        let outcome = miss(&mut team, &route, at(1200)).unwrap();

        assert!(matches!(
            outcome,
            AnswerOutcome::ForcedAdvance {
                attempt: 3,
                next_point: None,
                route_finished: true,
                ..
            }
        ));
        assert_eq!(team.current_point_index, 1);
        assert!(team.visited_points.is_empty());
    }

    #[test]
    fn penalty_tier_follows_route_settings() {
        let route = route_with_settings(
            2,
            RouteSettings {
                penalty_minutes: 1,
                max_attempts: 2,
            },
        );
        let mut team = team_on(&route);

        let first = miss(&mut team, &route, at(100)).unwrap();
        assert_eq!(
            first,
            AnswerOutcome::IncorrectPenalized {
                attempt: 1,
                penalty_end: at(160),
                hint_level: 1,
            }
        );

        let second = miss(&mut team, &route, at(170)).unwrap();
        assert!(matches!(
            second,
            AnswerOutcome::ForcedAdvance { attempt: 2, .. }
        ));
    }

    #[test]
    fn manual_hint_rejected_during_penalty_but_automatic_granted() {
        let route = route_of(2);
        let mut team = team_on(&route);
        team.apply_penalty(Duration::from_secs(180), at(100));

        let err = request_hint(
            &mut team,
            &route,
            0,
            1,
            HintOrigin::Manual,
            HINT_COST,
            at(150),
        )
        .unwrap_err();
        assert_eq!(err, ProgressionError::PenaltyActive { until: at(280) });
        assert!(team.hint.is_none());

        let grant = request_hint(
            &mut team,
            &route,
            0,
            1,
            HintOrigin::Automatic,
            HINT_COST,
            at(150),
        )
        .unwrap();
        assert_eq!(
            grant,
            HintGrant {
                level: 1,
                penalty_end: at(280),
            }
        );
        assert!(team.hint.is_some());
    }

    #[test]
    fn repeated_hint_level_is_rejected_but_escalation_allowed() {
        let route = route_of(2);
        let mut team = team_on(&route);

        let first = request_hint(
            &mut team,
            &route,
            0,
            1,
            HintOrigin::Manual,
            HINT_COST,
            at(100),
        )
        .unwrap();
        assert_eq!(first.penalty_end, at(160));

        let err = request_hint(
            &mut team,
            &route,
            0,
            1,
            HintOrigin::Manual,
            HINT_COST,
            at(200),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ProgressionError::HintAlreadyGranted {
                point_index: 0,
                existing: 1,
            }
        );

        let escalated = request_hint(
            &mut team,
            &route,
            0,
            2,
            HintOrigin::Manual,
            HINT_COST,
            at(200),
        )
        .unwrap();
        assert_eq!(escalated.level, 2);
        assert_eq!(escalated.penalty_end, at(260));
        assert_eq!(team.hint.map(|hint| hint.level), Some(2));
    }

    #[test]
    fn hint_level_bounds_are_validated() {
        let route = route_of(2);
        let mut team = team_on(&route);

        for level in [0, 3] {
            let err = request_hint(
                &mut team,
                &route,
                0,
                level,
                HintOrigin::Manual,
                HINT_COST,
                at(100),
            )
            .unwrap_err();
            assert_eq!(err, ProgressionError::InvalidHintLevel { level });
        }
    }

    #[test]
    fn hint_for_stale_index_is_rejected() {
        let route = route_of(3);
        let mut team = team_on(&route);
        answer_correctly(&mut team, &route, 0, at(100));

        let err = request_hint(
            &mut team,
            &route,
            0,
            1,
            HintOrigin::Manual,
            HINT_COST,
            at(200),
        )
        .unwrap_err();

        assert_eq!(
            err,
            ProgressionError::StalePoint {
                requested: 0,
                current: 1,
            }
        );
    }

    #[test]
    fn automatic_grant_overrides_existing_hint() {
        let route = route_of(2);
        let mut team = team_on(&route);
        request_hint(
            &mut team,
            &route,
            0,
            2,
            HintOrigin::Manual,
            HINT_COST,
            at(100),
        )
        .unwrap();

        let grant = request_hint(
            &mut team,
            &route,
            0,
            1,
            HintOrigin::Automatic,
            HINT_COST,
            at(200),
        )
        .unwrap();

        assert_eq!(grant.level, 1);
        assert_eq!(team.hint.map(|hint| hint.level), Some(1));
    }

    #[test]
    fn arrival_without_answer_changes_nothing() {
        let route = route_of(2);
        let mut team = team_on(&route);

        let outcome = reach_point(&mut team, &route, route.points[0].id).unwrap();

        assert_eq!(outcome, ReachOutcome::NotYetAnswered);
        assert_eq!(team.current_point_index, 0);
    }

    #[test]
    fn arrival_at_previously_answered_point_advances() {
        // The second stop revisits the first point, so the answer given at
        // index 0 already covers it.
        let mut route = route_of(2);
        route.points[1] = route.points[0].clone();
        let mut team = team_on(&route);
        answer_correctly(&mut team, &route, 0, at(100));
        assert_eq!(team.current_point_index, 1);

        let outcome = reach_point(&mut team, &route, route.points[1].id).unwrap();

        assert_eq!(
            outcome,
            ReachOutcome::Advanced {
                next_point: None,
                route_finished: true,
            }
        );
        assert_eq!(team.current_point_index, 2);
    }

    #[test]
    fn arrival_at_wrong_point_is_rejected() {
        let route = route_of(2);
        let mut team = team_on(&route);
        let other = route.points[1].id;

        let err = reach_point(&mut team, &route, other).unwrap_err();

        assert_eq!(err, ProgressionError::PointMismatch { submitted: other });
    }

    #[test]
    fn completion_requires_the_last_point_passed() {
        let route = route_of(2);
        let mut team = team_on(&route);
        answer_correctly(&mut team, &route, 0, at(100));

        let err = complete_route(&mut team, &route, 120_000, at(200)).unwrap_err();

        assert_eq!(
            err,
            ProgressionError::RouteNotFinished {
                current: 1,
                total: 2,
            }
        );
        assert!(team.active);
    }

    #[test]
    fn completion_is_finalized_once() {
        let route = route_of(2);
        let mut team = team_on(&route);
        team.start(at(50));
        answer_correctly(&mut team, &route, 0, at(100));
        answer_correctly(&mut team, &route, 1, at(200));

        let first = complete_route(&mut team, &route, 654_321, at(900)).unwrap();
        assert_eq!(first, CompletionOutcome::Finalized);
        assert!(!team.active);
        assert_eq!(team.completion_time_ms, Some(654_321));
        assert_eq!(team.completed_at, Some(at(900)));

        let second = complete_route(&mut team, &route, 999, at(950)).unwrap();
        assert_eq!(second, CompletionOutcome::AlreadyCompleted);
        assert_eq!(team.completion_time_ms, Some(654_321));
        assert_eq!(team.completed_at, Some(at(900)));
    }
}
