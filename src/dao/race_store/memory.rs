//! In-memory [`RaceStore`] backend. Used for local development without a
//! database and as the storage double in service-level tests.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    models::{EventEntity, PointEntity, RouteEntity, TeamEntity, TeamLocationEntity},
    race_store::{RaceStore, TeamLookup},
    storage::StorageResult,
};

/// Process-local store keeping every record in maps. All operations succeed;
/// the health check is a no-op.
#[derive(Clone, Default)]
pub struct MemoryRaceStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    teams: DashMap<Uuid, TeamEntity>,
    routes: DashMap<Uuid, RouteEntity>,
    points: DashMap<Uuid, PointEntity>,
    events: RwLock<Vec<EventEntity>>,
}

impl MemoryRaceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route definition, replacing any previous one with the same id.
    pub fn insert_route(&self, route: RouteEntity) {
        self.inner.routes.insert(route.id, route);
    }

    /// Insert a checkpoint, replacing any previous one with the same id.
    pub fn insert_point(&self, point: PointEntity) {
        self.inner.points.insert(point.id, point);
    }

    /// Insert a team, replacing any previous one with the same id.
    pub fn insert_team(&self, team: TeamEntity) {
        self.inner.teams.insert(team.id, team);
    }

    fn match_team(&self, lookup: &TeamLookup) -> Option<TeamEntity> {
        match lookup {
            TeamLookup::Id(id) => self.inner.teams.get(id).map(|entry| entry.clone()),
            TeamLookup::LinkExact(link) => self.scan(|team| team.unique_link == *link),
            TeamLookup::LinkSuffix(suffix) => {
                self.scan(|team| team.unique_link.ends_with(suffix.as_str()))
            }
            TeamLookup::LinkContains(fragment) => {
                let fragment = fragment.to_lowercase();
                self.scan(|team| team.unique_link.to_lowercase().contains(&fragment))
            }
            TeamLookup::NameContains(fragment) => {
                let fragment = fragment.to_lowercase();
                self.scan(|team| team.name.to_lowercase().contains(&fragment))
            }
            TeamLookup::AnyActive => self.scan(|team| team.active && team.start_time.is_some()),
        }
    }

    fn scan(&self, predicate: impl Fn(&TeamEntity) -> bool) -> Option<TeamEntity> {
        self.inner
            .teams
            .iter()
            .find(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
    }
}

impl RaceStore for MemoryRaceStore {
    fn find_team(&self, lookup: TeamLookup) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.match_team(&lookup)) })
    }

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.teams.insert(team.id, team);
            Ok(())
        })
    }

    fn save_location(
        &self,
        team_id: Uuid,
        location: TeamLocationEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut entry) = store.inner.teams.get_mut(&team_id) {
                entry.updated_at = location.timestamp;
                entry.location = Some(location);
            }
            Ok(())
        })
    }

    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut teams: Vec<TeamEntity> = store
                .inner
                .teams
                .iter()
                .map(|entry| entry.value().clone())
                .collect();
            teams.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(teams)
        })
    }

    fn find_route(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RouteEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.routes.get(&id).map(|entry| entry.clone())) })
    }

    fn find_points(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<PointEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(ids
                .into_iter()
                .filter_map(|id| store.inner.points.get(&id).map(|entry| entry.clone()))
                .collect())
        })
    }

    fn append_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.events.write().await.push(event);
            Ok(())
        })
    }

    fn list_events(
        &self,
        team_id: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<EventEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let events = store.inner.events.read().await;
            Ok(events
                .iter()
                .filter(|event| team_id.is_none_or(|id| event.team_id == id))
                .cloned()
                .collect())
        })
    }

    fn clear_events(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut events = store.inner.events.write().await;
            let removed = events.len() as u64;
            events.clear();
            Ok(removed)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
