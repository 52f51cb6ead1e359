//! Local key-addressed store.
//!
//! # Responsibility
//! - Persist both collections as JSON snapshots under two fixed keys.
//! - Implement the `(member_id, date)` upsert through derived record ids.
//!
//! # Invariants
//! - Every mutation rewrites the whole affected collection.
//! - Read-modify-write sequences run inside one SQLite transaction.
//! - A corrupt snapshot reads as an empty collection.

use crate::db::{open_db, open_db_in_memory};
use crate::model::attendance::{local_record_id, AttendanceRecord, AttendanceWrite};
use crate::model::member::{default_member_names, Member};
use crate::store::{AttendanceStore, BackendKind, Snapshot, StoreError, StoreResult};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

/// Snapshot key holding the member collection.
pub const MEMBERS_KEY: &str = "morning-winner-members";
/// Snapshot key holding the attendance collection.
pub const RECORDS_KEY: &str = "morning-winner-attendance";

/// SQLite-backed local adapter.
pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    /// Opens (or creates) the store file at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a throwaway in-memory store.
    pub fn in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    #[cfg(test)]
    fn raw_entry(&self, key: &str) -> StoreResult<Option<String>> {
        read_raw(&self.conn, key)
    }

    #[cfg(test)]
    fn put_raw_entry(&self, key: &str, value: &str) -> StoreResult<()> {
        write_raw(&self.conn, key, value)
    }
}

impl AttendanceStore for LocalStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Local
    }

    fn load_all(&self) -> StoreResult<Snapshot> {
        Ok(Snapshot {
            members: read_collection(&self.conn, MEMBERS_KEY)?,
            records: read_collection(&self.conn, RECORDS_KEY)?,
        })
    }

    fn ensure_default_members(&self) -> StoreResult<Vec<Member>> {
        let tx = self.conn.unchecked_transaction()?;
        let existing: Vec<Member> = read_collection(&tx, MEMBERS_KEY)?;
        if !existing.is_empty() {
            return Ok(Vec::new());
        }

        let defaults: Vec<Member> = default_member_names()
            .into_iter()
            .enumerate()
            .map(|(index, name)| Member::new((index + 1).to_string(), name))
            .collect();
        write_collection(&tx, MEMBERS_KEY, &defaults)?;
        tx.commit()?;

        info!(
            "event=members_seed module=store backend=local status=ok count={}",
            defaults.len()
        );
        Ok(defaults)
    }

    fn create_member(&self, name: &str) -> StoreResult<Member> {
        let tx = self.conn.unchecked_transaction()?;
        let mut members: Vec<Member> = read_collection(&tx, MEMBERS_KEY)?;
        let member = Member::new(Uuid::new_v4().to_string(), name);
        members.push(member.clone());
        write_collection(&tx, MEMBERS_KEY, &members)?;
        tx.commit()?;
        Ok(member)
    }

    fn rename_member(&self, id: &str, new_name: &str) -> StoreResult<Member> {
        let tx = self.conn.unchecked_transaction()?;
        let mut members: Vec<Member> = read_collection(&tx, MEMBERS_KEY)?;
        let member = members
            .iter_mut()
            .find(|member| member.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        member.name = new_name.to_string();
        let updated = member.clone();

        write_collection(&tx, MEMBERS_KEY, &members)?;
        tx.commit()?;
        Ok(updated)
    }

    fn record_attendance(&self, write: &AttendanceWrite) -> StoreResult<AttendanceRecord> {
        write.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        let members: Vec<Member> = read_collection(&tx, MEMBERS_KEY)?;
        if !members.iter().any(|member| member.id == write.member_id) {
            return Err(StoreError::NotFound(write.member_id.clone()));
        }

        let record = AttendanceRecord {
            id: local_record_id(&write.member_id, write.date),
            member_id: write.member_id.clone(),
            date: write.date,
            status: write.status,
            timestamp: Some(write.effective_timestamp()),
        };

        let mut records: Vec<AttendanceRecord> = read_collection(&tx, RECORDS_KEY)?;
        // Legacy snapshots may hold the same pair under a different id.
        let same_pair = |existing: &AttendanceRecord| {
            existing.id == record.id
                || (existing.member_id == record.member_id && existing.date == record.date)
        };
        match records.iter().position(same_pair) {
            Some(index) => {
                records[index] = record.clone();
                let mut position = 0;
                records.retain(|existing| {
                    let keep = position == index || !same_pair(existing);
                    position += 1;
                    keep
                });
            }
            None => records.push(record.clone()),
        }

        write_collection(&tx, RECORDS_KEY, &records)?;
        tx.commit()?;
        Ok(record)
    }
}

fn read_raw(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM kv_entries WHERE key = ?1;",
            [key],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(value)
}

fn write_raw(conn: &Connection, key: &str, value: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO kv_entries (key, value)
         VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = (strftime('%s', 'now') * 1000);",
        params![key, value],
    )?;
    Ok(())
}

fn read_collection<T: DeserializeOwned>(conn: &Connection, key: &str) -> StoreResult<Vec<T>> {
    let Some(raw) = read_raw(conn, key)? else {
        return Ok(Vec::new());
    };

    match serde_json::from_str::<Vec<T>>(&raw) {
        Ok(items) => Ok(items),
        Err(err) => {
            warn!(
                "event=snapshot_read module=store backend=local status=corrupt key={key} error={err}"
            );
            Ok(Vec::new())
        }
    }
}

fn write_collection<T: Serialize>(conn: &Connection, key: &str, items: &[T]) -> StoreResult<()> {
    let json = serde_json::to_string(items)
        .map_err(|err| StoreError::InvalidData(format!("cannot encode `{key}`: {err}")))?;
    write_raw(conn, key, &json)
}
