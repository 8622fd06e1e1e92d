pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{EventEntity, PointEntity, RouteEntity, TeamEntity, TeamLocationEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Single-team query shapes supported by the persistence layer. The team
/// locator combines these into its fallback chain; backends only implement
/// the individual matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamLookup {
    /// Exact primary-id match.
    Id(Uuid),
    /// Exact shareable-link match.
    LinkExact(String),
    /// Shareable link ending with the fragment (case-sensitive).
    LinkSuffix(String),
    /// Shareable link containing the fragment anywhere (case-insensitive).
    LinkContains(String),
    /// Team name containing the fragment (case-insensitive).
    NameContains(String),
    /// Any team currently racing (active with a start time set).
    AnyActive,
}

/// Abstraction over the persistence layer for teams, routes, points, and the
/// append-only race event log.
pub trait RaceStore: Send + Sync {
    /// Find at most one team matching the lookup.
    fn find_team(&self, lookup: TeamLookup) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>>;
    /// Upsert a team, replacing its previous state.
    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Overwrite a team's live location without touching progression fields.
    /// Location writes race freely with progression saves.
    fn save_location(
        &self,
        team_id: Uuid,
        location: TeamLocationEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// All teams known to the store.
    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>>;
    /// Fetch a route definition by id.
    fn find_route(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RouteEntity>>>;
    /// Fetch the point documents for the given ids, in no particular order.
    fn find_points(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<PointEntity>>>;
    /// Append one event to the race log.
    fn append_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Events in recording order, optionally restricted to one team.
    fn list_events(
        &self,
        team_id: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<EventEntity>>>;
    /// Delete every event; returns the number removed.
    fn clear_events(&self) -> BoxFuture<'static, StorageResult<u64>>;
    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
