/// Database model definitions.
pub mod models;
/// Race state storage and retrieval operations.
pub mod race_store;
/// Storage abstraction layer for database operations.
pub mod storage;
