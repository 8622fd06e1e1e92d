use std::time::SystemTime;

use uuid::Uuid;

use crate::state::geo::GeoPoint;
use crate::state::race::{Route, Team, TeamLocation};

/// Distance from the team to one checkpoint of its route.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityReading {
    /// Checkpoint the reading refers to.
    pub point_id: Uuid,
    /// Display name of the checkpoint.
    pub name: String,
    /// Great-circle distance in meters.
    pub distance_m: f64,
    /// Whether the team already answered this checkpoint.
    pub visited: bool,
}

/// Distances from the team's reported position to every checkpoint of its
/// route, in route order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityReport {
    /// One reading per route checkpoint.
    pub readings: Vec<ProximityReading>,
    /// Arrival threshold the report was computed against, in meters.
    pub threshold_m: f64,
}

impl ProximityReport {
    /// Unvisited checkpoints the team is currently within the arrival
    /// threshold of. Informational only; arrival is confirmed elsewhere.
    pub fn arrival_candidates(&self) -> impl Iterator<Item = &ProximityReading> {
        self.readings
            .iter()
            .filter(|reading| !reading.visited && reading.distance_m <= self.threshold_m)
    }

    /// The closest checkpoint the team has not answered yet.
    pub fn nearest_unvisited(&self) -> Option<&ProximityReading> {
        self.readings
            .iter()
            .filter(|reading| !reading.visited)
            .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m))
    }
}

/// Store the team's reported position and measure it against every
/// checkpoint of the route.
///
/// Position writes are unconditional and last-write-wins; being close to a
/// checkpoint never advances race state by itself.
pub fn update_location(
    team: &mut Team,
    route: &Route,
    coordinates: GeoPoint,
    threshold_m: f64,
    now: SystemTime,
) -> ProximityReport {
    team.location = Some(TeamLocation {
        coordinates,
        timestamp: now,
    });

    let readings = route
        .points
        .iter()
        .map(|point| ProximityReading {
            point_id: point.id,
            name: point.name.clone(),
            distance_m: coordinates.distance_to(&point.coordinates),
            visited: team.has_visited(point.id),
        })
        .collect();

    ProximityReport {
        readings,
        threshold_m,
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
    fn stores_position_and_flags_nearby_unvisited_points() {
        let route = route_of(2);
        let mut team = team_on(&route);
        let standing_on_first = route.points[0].coordinates;

        let report = update_location(&mut team, &route, standing_on_first, 25.0, at(100));

        assert_eq!(
            team.location,
            Some(TeamLocation {
                coordinates: standing_on_first,
                timestamp: at(100),
            })
        );
        assert_eq!(report.readings.len(), 2);

        let candidates: Vec<_> = report.arrival_candidates().collect();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].point_id, route.points[0].id);
        assert!(candidates[0].distance_m < 1.0);
    }

    #[test]
    fn visited_points_are_not_arrival_candidates() {
        let route = route_of(2);
        let mut team = team_on(&route);
        team.visited_points.insert(route.points[0].id);

        let report =
            update_location(&mut team, &route, route.points[0].coordinates, 25.0, at(100));

        assert_eq!(report.arrival_candidates().count(), 0);
        let nearest = report.nearest_unvisited().expect("one point left");
        assert_eq!(nearest.point_id, route.points[1].id);
        assert!(nearest.distance_m > 25.0);
    }

    #[test]
    fn position_updates_are_last_write_wins() {
        let route = route_of(1);
        let mut team = team_on(&route);
        let first = GeoPoint { lat: 32.0, lon: 35.0 };
        let second = GeoPoint { lat: 32.1, lon: 35.1 };

        update_location(&mut team, &route, first, 25.0, at(100));
        update_location(&mut team, &route, second, 25.0, at(90));

        // The tracker does not order by timestamp; the latest write sticks.
        assert_eq!(team.location.map(|l| l.coordinates), Some(second));
    }
}
