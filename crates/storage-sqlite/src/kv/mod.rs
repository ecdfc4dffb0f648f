mod model;
mod repository;

pub use model::SyncKvDB;
pub use repository::SqliteKeyValueStore;
