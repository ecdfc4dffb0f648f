use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;
use std::sync::Arc;

use cardsync_core::store::KeyValueStore;
use cardsync_core::Result;

use super::model::SyncKvDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::sync_kv;

/// [`KeyValueStore`] backed by the `sync_kv` table.
pub struct SqliteKeyValueStore {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SqliteKeyValueStore {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        let keys = sync_kv::table
            .select(sync_kv::state_key)
            .order(sync_kv::state_key.asc())
            .load::<String>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(keys)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        let value = sync_kv::table
            .find(key)
            .select(sync_kv::state_value)
            .first::<String>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(value)
    }

    async fn set_many(&self, entries: Vec<(String, String)>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let now = Utc::now().to_rfc3339();
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    for (key, value) in entries {
                        let row = SyncKvDB {
                            state_key: key,
                            state_value: value.clone(),
                            updated_at: now.clone(),
                        };
                        diesel::insert_into(sync_kv::table)
                            .values(&row)
                            .on_conflict(sync_kv::state_key)
                            .do_update()
                            .set((
                                sync_kv::state_value.eq(value),
                                sync_kv::updated_at.eq(now.clone()),
                            ))
                            .execute(conn)?;
                    }
                    Ok(())
                })
                .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn remove(&self, keys: Vec<String>) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::delete(sync_kv::table.filter(sync_kv::state_key.eq_any(keys)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn clear(&self) -> Result<()> {
        self.writer
            .exec(|conn: &mut SqliteConnection| -> Result<()> {
                diesel::delete(sync_kv::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}
