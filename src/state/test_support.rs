//! Shared fixtures for state-layer tests.

use std::time::SystemTime;

use indexmap::IndexSet;
use uuid::Uuid;

use crate::state::geo::GeoPoint;
use crate::state::race::{Point, Question, Route, RouteSettings, Team};

/// A route of `count` points with predictable questions: point `i` accepts
/// `answer-i` and is roughly 140 m from its neighbours.
pub fn route_of(count: usize) -> Route {
    route_with_settings(
        count,
        RouteSettings {
            penalty_minutes: 3,
            max_attempts: 3,
        },
    )
}

/// Same as [`route_of`] with explicit race settings.
pub fn route_with_settings(count: usize, settings: RouteSettings) -> Route {
    let points = (0..count)
        .map(|i| Point {
            id: Uuid::new_v4(),
            name: format!("Point {i}"),
            code: format!("P{i}"),
            coordinates: GeoPoint {
                lat: 32.5578 + i as f64 * 0.00125,
                lon: 35.0766,
            },
            question: Question {
                text: format!("Question {i}?"),
                options: vec![format!("answer-{i}"), "wrong".to_owned()],
                correct_answer: format!("answer-{i}"),
            },
            images: None,
            is_advanced: false,
            is_finish_point: i + 1 == count,
        })
        .collect();

    Route {
        id: Uuid::new_v4(),
        name: "Test route".to_owned(),
        points,
        settings,
    }
}

/// A fresh team bound to `route`, not yet started.
pub fn team_on(route: &Route) -> Team {
    Team {
        id: Uuid::new_v4(),
        name: "Falcons".to_owned(),
        unique_link: "https://race.example/race/falcons-7f3a".to_owned(),
        route_id: route.id,
        current_point_index: 0,
        attempts: 0,
        visited_points: IndexSet::new(),
        start_time: None,
        completion_time_ms: None,
        completed_at: None,
        active: true,
        penalty_end_time: None,
        hint: None,
        location: None,
        updated_at: SystemTime::UNIX_EPOCH,
    }
}
