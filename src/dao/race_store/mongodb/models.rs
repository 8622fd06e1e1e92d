use indexmap::IndexSet;
use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::models::{
    EventEntity, EventKindEntity, GeoPointEntity, HintStateEntity, PointEntity,
    PointImagesEntity, QuestionEntity, RouteEntity, RouteSettingsEntity, TeamEntity,
    TeamLocationEntity,
};

/// Team document as stored in the `teams` collection. Timestamps are kept as
/// BSON datetimes so they stay queryable server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTeamDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    unique_link: String,
    route_id: Uuid,
    current_point_index: usize,
    attempts: u32,
    visited_points: IndexSet<Uuid>,
    start_time: Option<DateTime>,
    completion_time_ms: Option<u64>,
    completed_at: Option<DateTime>,
    active: bool,
    penalty_end_time: Option<DateTime>,
    hint: Option<MongoHintState>,
    location: Option<MongoTeamLocation>,
    updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoHintState {
    point_index: usize,
    level: u8,
    requested_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTeamLocation {
    coordinates: GeoPointEntity,
    timestamp: DateTime,
}

impl From<TeamEntity> for MongoTeamDocument {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            unique_link: value.unique_link,
            route_id: value.route_id,
            current_point_index: value.current_point_index,
            attempts: value.attempts,
            visited_points: value.visited_points,
            start_time: value.start_time.map(DateTime::from_system_time),
            completion_time_ms: value.completion_time_ms,
            completed_at: value.completed_at.map(DateTime::from_system_time),
            active: value.active,
            penalty_end_time: value.penalty_end_time.map(DateTime::from_system_time),
            hint: value.hint.map(|hint| MongoHintState {
                point_index: hint.point_index,
                level: hint.level,
                requested_at: DateTime::from_system_time(hint.requested_at),
            }),
            location: value.location.map(|location| MongoTeamLocation {
                coordinates: location.coordinates,
                timestamp: DateTime::from_system_time(location.timestamp),
            }),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoTeamDocument> for TeamEntity {
    fn from(value: MongoTeamDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            unique_link: value.unique_link,
            route_id: value.route_id,
            current_point_index: value.current_point_index,
            attempts: value.attempts,
            visited_points: value.visited_points,
            start_time: value.start_time.map(DateTime::to_system_time),
            completion_time_ms: value.completion_time_ms,
            completed_at: value.completed_at.map(DateTime::to_system_time),
            active: value.active,
            penalty_end_time: value.penalty_end_time.map(DateTime::to_system_time),
            hint: value.hint.map(|hint| HintStateEntity {
                point_index: hint.point_index,
                level: hint.level,
                requested_at: hint.requested_at.to_system_time(),
            }),
            location: value.location.map(|location| TeamLocationEntity {
                coordinates: location.coordinates,
                timestamp: location.timestamp.to_system_time(),
            }),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// Route document as stored in the `routes` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRouteDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    point_ids: Vec<Uuid>,
    #[serde(default)]
    settings: Option<RouteSettingsEntity>,
}

impl From<MongoRouteDocument> for RouteEntity {
    fn from(value: MongoRouteDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            point_ids: value.point_ids,
            settings: value.settings,
        }
    }
}

/// Checkpoint document as stored in the `points` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPointDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    code: String,
    coordinates: GeoPointEntity,
    question: QuestionEntity,
    #[serde(default)]
    images: Option<PointImagesEntity>,
    #[serde(default)]
    is_advanced: bool,
    #[serde(default)]
    is_finish_point: bool,
}

impl From<MongoPointDocument> for PointEntity {
    fn from(value: MongoPointDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            code: value.code,
            coordinates: value.coordinates,
            question: value.question,
            images: value.images,
            is_advanced: value.is_advanced,
            is_finish_point: value.is_finish_point,
        }
    }
}

/// Event document as stored in the `events` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEventDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    team_id: Uuid,
    kind: EventKindEntity,
    point_id: Option<Uuid>,
    route_id: Option<Uuid>,
    details: Value,
    created_at: DateTime,
}

impl From<EventEntity> for MongoEventDocument {
    fn from(value: EventEntity) -> Self {
        Self {
            id: value.id,
            team_id: value.team_id,
            kind: value.kind,
            point_id: value.point_id,
            route_id: value.route_id,
            details: value.details,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoEventDocument> for EventEntity {
    fn from(value: MongoEventDocument) -> Self {
        Self {
            id: value.id,
            team_id: value.team_id,
            kind: value.kind,
            point_id: value.point_id,
            route_id: value.route_id,
            details: value.details,
            created_at: value.created_at.to_system_time(),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}

/// `$set` update writing only the live-location fields of a team document.
/// Field names must line up with [`MongoTeamDocument`]'s serialized form.
pub fn location_update(location: &TeamLocationEntity) -> Document {
    let timestamp = DateTime::from_system_time(location.timestamp);
    doc! {
        "$set": {
            "location": {
                "coordinates": {
                    "lat": location.coordinates.lat,
                    "lon": location.coordinates.lon,
                },
                "timestamp": timestamp,
            },
            "updated_at": timestamp,
        }
    }
}

/// Escape a user-supplied fragment so it matches literally inside a `$regex`
/// filter.
pub fn regex_escape(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(
            c,
            '\\' | '^' | '$' | '.' | '|' | '?' | '*' | '+' | '(' | ')' | '[' | ']' | '{' | '}'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::regex_escape;

    #[test]
    fn escapes_regex_metacharacters() {
        assert_eq!(regex_escape("abc123"), "abc123");
        assert_eq!(regex_escape("a.b*c"), "a\\.b\\*c");
        assert_eq!(regex_escape("(x)+[y]"), "\\(x\\)\\+\\[y\\]");
    }
}
