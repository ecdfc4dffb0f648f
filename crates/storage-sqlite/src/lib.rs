//! SQLite storage for the card sync state.

pub mod db;
pub mod errors;
pub mod kv;
pub mod schema;

pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbPool, WriteHandle,
};
pub use errors::StorageError;
pub use kv::SqliteKeyValueStore;
