//! Reference `ChangeLogStore` implementation against SQLite (feature
//! `sqlite-store`). Concrete database drivers are explicitly out of scope
//! for the kernel (spec §1); this module exists only as the worked example
//! the teacher crate always was — grounded directly in its
//! `init_schema`/`log_local_change`/`apply_remote_ops` shape.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::{SyncError, SyncResult};
use crate::model::{Entry, MappingState, Operation, RecordHash, TrackedClient};
use crate::store::ChangeLogStore;

impl From<rusqlite::Error> for SyncError {
    fn from(e: rusqlite::Error) -> Self {
        SyncError::Database(e.to_string())
    }
}

pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        SqliteStore { conn }
    }

    /// Create the `_sync_*` tables named in spec §6. Safe to call multiple
    /// times.
    pub fn init_schema(&self) -> SyncResult<()> {
        self.conn.execute_batch(
            r#"
PRAGMA journal_mode=WAL;

CREATE TABLE IF NOT EXISTS _sync_log (
    version INTEGER PRIMARY KEY AUTOINCREMENT,
    table_name TEXT NOT NULL,
    pk_value TEXT NOT NULL,
    operation TEXT NOT NULL CHECK(operation IN ('insert','update','delete')),
    payload TEXT,
    origin TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS _sync_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS _sync_session (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    sync_active INTEGER NOT NULL DEFAULT 0
);
INSERT OR IGNORE INTO _sync_session (id, sync_active) VALUES (1, 0);

CREATE TABLE IF NOT EXISTS _sync_clients (
    origin_id TEXT PRIMARY KEY,
    last_sync_version INTEGER NOT NULL,
    last_sync_timestamp TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS _sync_subscriptions (
    subscription_id TEXT PRIMARY KEY,
    origin_id TEXT NOT NULL,
    type TEXT NOT NULL,
    table_name TEXT NOT NULL,
    filter TEXT,
    created_at TEXT NOT NULL,
    expires_at TEXT
);

CREATE TABLE IF NOT EXISTS _sync_mapping_state (
    mapping_id TEXT PRIMARY KEY,
    last_synced_version INTEGER NOT NULL,
    last_sync_timestamp TEXT NOT NULL,
    records_synced INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS _sync_record_hashes (
    mapping_id TEXT NOT NULL,
    source_pk TEXT NOT NULL,
    payload_hash TEXT NOT NULL,
    synced_at TEXT NOT NULL,
    PRIMARY KEY (mapping_id, source_pk)
);
"#,
        )?;
        Ok(())
    }
}

impl<'c> ChangeLogStore for SqliteStore<'c> {
    fn append(
        &self,
        table: &str,
        pk_json: &Value,
        op: Operation,
        payload_json: Option<&Value>,
        origin: &str,
        ts: &str,
    ) -> SyncResult<i64> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO _sync_log (table_name, pk_value, operation, payload, origin, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                table,
                pk_json.to_string(),
                op.as_str(),
                payload_json.map(|v| v.to_string()),
                origin,
                ts,
            ],
        )?;
        let version = tx.last_insert_rowid();
        tx.commit()?;
        Ok(version)
    }

    fn fetch(&self, from_version: i64, limit: i64) -> SyncResult<Vec<Entry>> {
        let mut stmt = self.conn.prepare(
            "SELECT version, table_name, pk_value, operation, payload, origin, timestamp
             FROM _sync_log WHERE version > ?1 ORDER BY version ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![from_version, limit], |r| {
            let op_str: String = r.get(3)?;
            let pk_raw: String = r.get(2)?;
            let payload_raw: Option<String> = r.get(4)?;
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                pk_raw,
                op_str,
                payload_raw,
                r.get::<_, String>(5)?,
                r.get::<_, String>(6)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (version, table_name, pk_raw, op_str, payload_raw, origin, timestamp) = row?;
            let operation = match op_str.as_str() {
                "insert" => Operation::Insert,
                "update" => Operation::Update,
                "delete" => Operation::Delete,
                other => return Err(SyncError::Database(format!("unknown operation `{other}`"))),
            };
            out.push(Entry {
                version,
                table_name,
                pk_value: serde_json::from_str(&pk_raw)?,
                operation,
                payload: payload_raw.map(|p| serde_json::from_str(&p)).transpose()?,
                origin,
                timestamp,
            });
        }
        Ok(out)
    }

    fn get_state(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM _sync_state WHERE key = ?1", params![key], |r| r.get(0))
            .optional()?)
    }

    fn set_state(&self, key: &str, value: &str) -> SyncResult<()> {
        self.conn.execute(
            "INSERT INTO _sync_state (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_session_flag(&self) -> SyncResult<bool> {
        let flag: i64 = self
            .conn
            .query_row("SELECT sync_active FROM _sync_session WHERE id = 1", [], |r| r.get(0))?;
        Ok(flag != 0)
    }

    fn set_session_flag(&self, flag: bool) -> SyncResult<()> {
        self.conn.execute(
            "UPDATE _sync_session SET sync_active = ?1 WHERE id = 1",
            params![flag as i64],
        )?;
        Ok(())
    }

    fn purge(&self, max_version: i64) -> SyncResult<u64> {
        let count = self.conn.execute(
            "DELETE FROM _sync_log WHERE version <= ?1 AND operation = 'delete'",
            params![max_version],
        )?;
        Ok(count as u64)
    }

    fn list_clients(&self) -> SyncResult<Vec<TrackedClient>> {
        let mut stmt = self.conn.prepare(
            "SELECT origin_id, last_sync_version, last_sync_timestamp, created_at FROM _sync_clients",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok(TrackedClient {
                origin_id: r.get(0)?,
                last_sync_version: r.get(1)?,
                last_sync_timestamp: r.get(2)?,
                created_at: r.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn upsert_client(&self, client: &TrackedClient) -> SyncResult<()> {
        self.conn.execute(
            "INSERT INTO _sync_clients (origin_id, last_sync_version, last_sync_timestamp, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(origin_id) DO UPDATE SET
                last_sync_version = excluded.last_sync_version,
                last_sync_timestamp = excluded.last_sync_timestamp",
            params![
                client.origin_id,
                client.last_sync_version,
                client.last_sync_timestamp,
                client.created_at,
            ],
        )?;
        Ok(())
    }

    fn delete_client(&self, origin_id: &str) -> SyncResult<()> {
        self.conn
            .execute("DELETE FROM _sync_clients WHERE origin_id = ?1", params![origin_id])?;
        Ok(())
    }

    fn get_mapping_state(&self, mapping_id: &str) -> SyncResult<Option<MappingState>> {
        Ok(self
            .conn
            .query_row(
                "SELECT mapping_id, last_synced_version, last_sync_timestamp, records_synced
                 FROM _sync_mapping_state WHERE mapping_id = ?1",
                params![mapping_id],
                |r| {
                    Ok(MappingState {
                        mapping_id: r.get(0)?,
                        last_synced_version: r.get(1)?,
                        last_sync_timestamp: r.get(2)?,
                        records_synced: r.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    fn put_mapping_state(&self, state: &MappingState) -> SyncResult<()> {
        self.conn.execute(
            "INSERT INTO _sync_mapping_state (mapping_id, last_synced_version, last_sync_timestamp, records_synced)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(mapping_id) DO UPDATE SET
                last_synced_version = excluded.last_synced_version,
                last_sync_timestamp = excluded.last_sync_timestamp,
                records_synced = excluded.records_synced",
            params![
                state.mapping_id,
                state.last_synced_version,
                state.last_sync_timestamp,
                state.records_synced,
            ],
        )?;
        Ok(())
    }

    fn get_record_hash(&self, mapping_id: &str, source_pk: &Value) -> SyncResult<Option<RecordHash>> {
        Ok(self
            .conn
            .query_row(
                "SELECT mapping_id, source_pk, payload_hash, synced_at
                 FROM _sync_record_hashes WHERE mapping_id = ?1 AND source_pk = ?2",
                params![mapping_id, source_pk.to_string()],
                |r| {
                    let source_pk_raw: String = r.get(1)?;
                    Ok((r.get::<_, String>(0)?, source_pk_raw, r.get::<_, String>(2)?, r.get::<_, String>(3)?))
                },
            )
            .optional()?
            .map(|(mapping_id, source_pk_raw, payload_hash, synced_at)| {
                Ok::<_, SyncError>(RecordHash {
                    mapping_id,
                    source_pk: serde_json::from_str(&source_pk_raw)?,
                    payload_hash,
                    synced_at,
                })
            })
            .transpose()?)
    }

    fn put_record_hash(&self, hash: &RecordHash) -> SyncResult<()> {
        self.conn.execute(
            "INSERT INTO _sync_record_hashes (mapping_id, source_pk, payload_hash, synced_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(mapping_id, source_pk) DO UPDATE SET
                payload_hash = excluded.payload_hash,
                synced_at = excluded.synced_at",
            params![
                hash.mapping_id,
                hash.source_pk.to_string(),
                hash.payload_hash,
                hash.synced_at,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let store = SqliteStore::new(&conn);
        store.init_schema().unwrap();
        conn
    }

    #[test]
    fn append_then_fetch_round_trips() {
        let conn = open();
        let store = SqliteStore::new(&conn);
        store
            .append(
                "trips",
                &json!({"id": 1}),
                Operation::Insert,
                Some(&json!({"id": 1, "name": "x"})),
                "origin-a",
                "2025-01-01T00:00:00.000Z",
            )
            .unwrap();
        let entries = store.fetch(0, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].table_name, "trips");
        assert_eq!(entries[0].operation, Operation::Insert);
    }

    #[test]
    fn session_flag_round_trips() {
        let conn = open();
        let store = SqliteStore::new(&conn);
        assert!(!store.get_session_flag().unwrap());
        store.set_session_flag(true).unwrap();
        assert!(store.get_session_flag().unwrap());
    }

    #[test]
    fn state_round_trips() {
        let conn = open();
        let store = SqliteStore::new(&conn);
        assert_eq!(store.get_state("last_server_version").unwrap(), None);
        store.set_state("last_server_version", "42").unwrap();
        assert_eq!(store.get_state("last_server_version").unwrap(), Some("42".into()));
    }

    #[test]
    fn mapping_state_upserts() {
        let conn = open();
        let store = SqliteStore::new(&conn);
        let state = MappingState {
            mapping_id: "m1".into(),
            last_synced_version: 5,
            last_sync_timestamp: "t".into(),
            records_synced: 1,
        };
        store.put_mapping_state(&state).unwrap();
        assert_eq!(store.get_mapping_state("m1").unwrap(), Some(state));
    }
}
