use uuid::Uuid;

use crate::{
    dao::{
        models::TeamEntity,
        race_store::{RaceStore, TeamLookup},
    },
    dto::validation::validate_team_ref,
    error::ServiceError,
};

/// Path segment marking the shareable part of a race link. Everything after
/// the last occurrence identifies the team.
const LINK_PATH_MARKER: &str = "/race/";

/// How far the locator may loosen its search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// Id and link strategies only.
    Strict,
    /// Id and link strategies, then a case-insensitive name search.
    Lenient,
}

/// Resolve an opaque team reference to exactly one stored team.
///
/// Strategies run in a fixed order, first match wins: primary id (when the
/// reference parses as one), exact link, link ending with the reference,
/// link containing the reference case-insensitively, and, in lenient mode
/// only, a name search.
pub async fn resolve(
    store: &dyn RaceStore,
    raw: &str,
    mode: LookupMode,
) -> Result<TeamEntity, ServiceError> {
    if let Err(err) = validate_team_ref(raw) {
        return Err(ServiceError::InvalidInput(format!(
            "invalid team reference: {err}"
        )));
    }

    let identifier = normalize_identifier(raw);

    if let Ok(id) = Uuid::parse_str(identifier) {
        if let Some(team) = store.find_team(TeamLookup::Id(id)).await? {
            return Ok(team);
        }
    }

    let link_strategies = [
        TeamLookup::LinkExact(identifier.to_string()),
        TeamLookup::LinkSuffix(identifier.to_string()),
        TeamLookup::LinkContains(identifier.to_string()),
    ];
    for lookup in link_strategies {
        if let Some(team) = store.find_team(lookup).await? {
            return Ok(team);
        }
    }

    if mode == LookupMode::Lenient {
        if let Some(team) = store
            .find_team(TeamLookup::NameContains(identifier.to_string()))
            .await?
        {
            return Ok(team);
        }
    }

    Err(ServiceError::TeamNotFound(identifier.to_string()))
}

/// Strip decoration from a reference before matching: surrounding whitespace,
/// a leading `@`, and for full URLs everything up to the last link marker.
fn normalize_identifier(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('@').unwrap_or(trimmed);

    if trimmed.contains("://") {
        if let Some(position) = trimmed.rfind(LINK_PATH_MARKER) {
            let segment = trimmed[position + LINK_PATH_MARKER.len()..].trim_end_matches('/');
            if !segment.is_empty() {
                return segment;
            }
        }
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use indexmap::IndexSet;

    use super::*;
    use crate::dao::race_store::memory::MemoryRaceStore;

    fn team_named(name: &str, link: &str) -> TeamEntity {
        TeamEntity {
            id: Uuid::new_v4(),
            name: name.to_string(),
            unique_link: link.to_string(),
            route_id: Uuid::new_v4(),
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

    fn store_with(teams: Vec<TeamEntity>) -> MemoryRaceStore {
        let store = MemoryRaceStore::new();
        for team in teams {
            store.insert_team(team);
        }
        store
    }

    #[test]
    fn normalization_strips_decorations() {
        assert_eq!(normalize_identifier("  abc123 "), "abc123");
        assert_eq!(normalize_identifier("@abc123"), "abc123");
        assert_eq!(
            normalize_identifier("https://race.example/race/abc123"),
            "abc123"
        );
        assert_eq!(
            normalize_identifier("https://race.example/race/abc123/"),
            "abc123"
        );
        // Not a URL: the marker alone does not trigger segment extraction.
        assert_eq!(normalize_identifier("foo/race/bar"), "foo/race/bar");
    }

    #[tokio::test]
    async fn resolves_by_primary_id_first() {
        let team = team_named("Falcons", "https://race.example/race/falcons-7f3a");
        let id = team.id;
        let store = store_with(vec![team]);

        let found = resolve(&store, &id.to_string(), LookupMode::Strict)
            .await
            .unwrap();
        assert_eq!(found.id, id);
    }

    #[tokio::test]
    async fn resolves_link_suffix_before_loose_contains() {
        // Two teams: one whose link merely contains the fragment, one whose
        // link ends with it. The suffix strategy must win.
        let contains = team_named("Decoy", "https://race.example/race/abc123-old");
        let suffix = team_named("Falcons", "https://race.example/race/abc123");
        let expected = suffix.id;
        let store = store_with(vec![contains, suffix]);

        let found = resolve(&store, "abc123", LookupMode::Strict).await.unwrap();
        assert_eq!(found.id, expected);
    }

    #[tokio::test]
    async fn full_url_reference_resolves_to_its_team() {
        let team = team_named("Falcons", "https://race.example/race/falcons-7f3a");
        let expected = team.id;
        let store = store_with(vec![team]);

        let found = resolve(
            &store,
            "https://race.example/race/falcons-7f3a",
            LookupMode::Strict,
        )
        .await
        .unwrap();
        assert_eq!(found.id, expected);
    }

    #[tokio::test]
    async fn name_search_requires_lenient_mode() {
        let team = team_named("Night Falcons", "https://race.example/race/7f3a");
        let expected = team.id;
        let store = store_with(vec![team]);

        let strict = resolve(&store, "falcons", LookupMode::Strict).await;
        assert!(matches!(strict, Err(ServiceError::TeamNotFound(_))));

        let lenient = resolve(&store, "falcons", LookupMode::Lenient)
            .await
            .unwrap();
        assert_eq!(lenient.id, expected);
    }

    #[tokio::test]
    async fn unknown_reference_is_not_found() {
        let store = store_with(vec![team_named(
            "Falcons",
            "https://race.example/race/falcons-7f3a",
        )]);

        let result = resolve(&store, "missing", LookupMode::Lenient).await;
        assert!(matches!(result, Err(ServiceError::TeamNotFound(_))));
    }

    #[tokio::test]
    async fn blank_reference_is_rejected_before_lookup() {
        let store = store_with(Vec::new());

        let result = resolve(&store, "   ", LookupMode::Strict).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }
}
