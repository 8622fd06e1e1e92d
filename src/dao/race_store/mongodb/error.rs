use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB backend, annotated with the operation that
/// produced them.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save team `{id}`")]
    SaveTeam {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("team lookup failed")]
    FindTeam {
        #[source]
        source: MongoError,
    },
    #[error("failed to list teams")]
    ListTeams {
        #[source]
        source: MongoError,
    },
    #[error("failed to load route `{id}`")]
    LoadRoute {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load points")]
    LoadPoints {
        #[source]
        source: MongoError,
    },
    #[error("failed to append event `{id}`")]
    AppendEvent {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list events")]
    ListEvents {
        #[source]
        source: MongoError,
    },
    #[error("failed to clear events")]
    ClearEvents {
        #[source]
        source: MongoError,
    },
}
