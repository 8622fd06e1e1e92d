use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoEventDocument, MongoPointDocument, MongoRouteDocument, MongoTeamDocument, doc_id,
        location_update, regex_escape, uuid_as_binary,
    },
};
use crate::dao::{
    models::{EventEntity, PointEntity, RouteEntity, TeamEntity, TeamLocationEntity},
    race_store::{RaceStore, TeamLookup},
    storage::StorageResult,
};

const TEAM_COLLECTION_NAME: &str = "teams";
const ROUTE_COLLECTION_NAME: &str = "routes";
const POINT_COLLECTION_NAME: &str = "points";
const EVENT_COLLECTION_NAME: &str = "events";

/// MongoDB-backed [`RaceStore`]. Cheap to clone; connection state is shared
/// behind a lock so a reconnect swaps the client for every handle at once.
#[derive(Clone)]
pub struct MongoRaceStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard: tokio::sync::RwLockReadGuard<'_, MongoState> = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRaceStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // Shareable links must stay unique; team resolution relies on it.
        let team_collection = database.collection::<MongoTeamDocument>(TEAM_COLLECTION_NAME);
        let link_index = mongodb::IndexModel::builder()
            .keys(doc! {"unique_link": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("team_unique_link_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        team_collection
            .create_index(link_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: TEAM_COLLECTION_NAME,
                index: "unique_link",
                source,
            })?;

        // Event queries filter by team and read in recording order.
        let event_collection = database.collection::<MongoEventDocument>(EVENT_COLLECTION_NAME);
        let event_index = mongodb::IndexModel::builder()
            .keys(doc! {"team_id": 1, "created_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("event_team_log_idx".to_owned()))
                    .build(),
            )
            .build();

        event_collection
            .create_index(event_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: EVENT_COLLECTION_NAME,
                index: "team_id,created_at",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn team_collection(&self) -> Collection<MongoTeamDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoTeamDocument>(TEAM_COLLECTION_NAME)
    }

    async fn route_collection(&self) -> Collection<MongoRouteDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRouteDocument>(ROUTE_COLLECTION_NAME)
    }

    async fn point_collection(&self) -> Collection<MongoPointDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoPointDocument>(POINT_COLLECTION_NAME)
    }

    async fn event_collection(&self) -> Collection<MongoEventDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoEventDocument>(EVENT_COLLECTION_NAME)
    }

    fn team_filter(lookup: TeamLookup) -> Document {
        match lookup {
            TeamLookup::Id(id) => doc_id(id),
            TeamLookup::LinkExact(link) => doc! {"unique_link": link},
            TeamLookup::LinkSuffix(fragment) => doc! {
                "unique_link": {"$regex": format!("{}$", regex_escape(&fragment))}
            },
            TeamLookup::LinkContains(fragment) => doc! {
                "unique_link": {"$regex": regex_escape(&fragment), "$options": "i"}
            },
            TeamLookup::NameContains(fragment) => doc! {
                "name": {"$regex": regex_escape(&fragment), "$options": "i"}
            },
            TeamLookup::AnyActive => doc! {"active": true, "start_time": {"$ne": null}},
        }
    }

    async fn find_team(&self, lookup: TeamLookup) -> MongoResult<Option<TeamEntity>> {
        let collection = self.team_collection().await;

        let document = collection
            .find_one(Self::team_filter(lookup))
            .await
            .map_err(|source| MongoDaoError::FindTeam { source })?;

        Ok(document.map(Into::into))
    }

    async fn save_team(&self, team: TeamEntity) -> MongoResult<()> {
        let id = team.id;
        let document: MongoTeamDocument = team.into();
        let collection = self.team_collection().await;
        collection
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveTeam { id, source })?;

        Ok(())
    }

    async fn save_location(&self, team_id: Uuid, location: TeamLocationEntity) -> MongoResult<()> {
        let collection = self.team_collection().await;
        collection
            .update_one(doc_id(team_id), location_update(&location))
            .await
            .map_err(|source| MongoDaoError::SaveTeam {
                id: team_id,
                source,
            })?;

        Ok(())
    }

    async fn list_teams(&self) -> MongoResult<Vec<TeamEntity>> {
        let collection = self.team_collection().await;

        let documents: Vec<MongoTeamDocument> = collection
            .find(doc! {})
            .sort(doc! {"name": 1})
            .await
            .map_err(|source| MongoDaoError::ListTeams { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListTeams { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn find_route(&self, id: Uuid) -> MongoResult<Option<RouteEntity>> {
        let collection = self.route_collection().await;

        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadRoute { id, source })?;

        Ok(document.map(Into::into))
    }

    async fn find_points(&self, ids: Vec<Uuid>) -> MongoResult<Vec<PointEntity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let binaries: Vec<_> = ids.into_iter().map(uuid_as_binary).collect();
        let collection = self.point_collection().await;

        let documents: Vec<MongoPointDocument> = collection
            .find(doc! {"_id": {"$in": binaries}})
            .await
            .map_err(|source| MongoDaoError::LoadPoints { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadPoints { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn append_event(&self, event: EventEntity) -> MongoResult<()> {
        let id = event.id;
        let document: MongoEventDocument = event.into();
        let collection = self.event_collection().await;
        collection
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::AppendEvent { id, source })?;

        Ok(())
    }

    async fn list_events(&self, team_id: Option<Uuid>) -> MongoResult<Vec<EventEntity>> {
        let filter = match team_id {
            Some(id) => doc! {"team_id": uuid_as_binary(id)},
            None => doc! {},
        };
        let collection = self.event_collection().await;

        let documents: Vec<MongoEventDocument> = collection
            .find(filter)
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListEvents { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListEvents { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn clear_events(&self) -> MongoResult<u64> {
        let collection = self.event_collection().await;
        let result = collection
            .delete_many(doc! {})
            .await
            .map_err(|source| MongoDaoError::ClearEvents { source })?;

        Ok(result.deleted_count)
    }
}

impl RaceStore for MongoRaceStore {
    fn find_team(
        &self,
        lookup: TeamLookup,
    ) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_team(lookup).await.map_err(Into::into) })
    }

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_team(team).await.map_err(Into::into) })
    }

    fn save_location(
        &self,
        team_id: Uuid,
        location: TeamLocationEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .save_location(team_id, location)
                .await
                .map_err(Into::into)
        })
    }

    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_teams().await.map_err(Into::into) })
    }

    fn find_route(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RouteEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_route(id).await.map_err(Into::into) })
    }

    fn find_points(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<PointEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_points(ids).await.map_err(Into::into) })
    }

    fn append_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append_event(event).await.map_err(Into::into) })
    }

    fn list_events(
        &self,
        team_id: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<EventEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_events(team_id).await.map_err(Into::into) })
    }

    fn clear_events(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.clear_events().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_lookup_anchors_the_fragment() {
        let filter = MongoRaceStore::team_filter(TeamLookup::LinkSuffix("abc123".to_owned()));
        let regex = filter
            .get_document("unique_link")
            .expect("regex clause")
            .get_str("$regex")
            .expect("pattern");
        assert_eq!(regex, "abc123$");
    }

    #[test]
    fn contains_lookups_are_case_insensitive() {
        for lookup in [
            TeamLookup::LinkContains("Falcons".to_owned()),
            TeamLookup::NameContains("Falcons".to_owned()),
        ] {
            let filter = MongoRaceStore::team_filter(lookup);
            let (_key, clause) = filter.iter().next().expect("one clause");
            let clause = clause.as_document().expect("regex clause");
            assert_eq!(clause.get_str("$options").expect("options"), "i");
        }
    }

    #[test]
    fn any_active_requires_a_start_time() {
        let filter = MongoRaceStore::team_filter(TeamLookup::AnyActive);
        assert!(filter.get_bool("active").expect("active flag"));
        assert!(filter.get_document("start_time").is_ok());
    }
}
