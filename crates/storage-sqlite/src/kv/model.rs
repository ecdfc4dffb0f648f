//! Database model for the persisted sync state table.

use diesel::prelude::*;

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone)]
#[diesel(primary_key(state_key))]
#[diesel(table_name = crate::schema::sync_kv)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncKvDB {
    pub state_key: String,
    /// JSON-encoded value.
    pub state_value: String,
    pub updated_at: String,
}
