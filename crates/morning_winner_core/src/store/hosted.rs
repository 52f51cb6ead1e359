//! Hosted table adapter over a PostgREST-compatible REST endpoint.
//!
//! # Responsibility
//! - Map port operations onto the `members` and `attendance_records` tables.
//! - Translate transport failures into `Unreachable` and non-success
//!   responses into `Backend` errors.
//!
//! # Invariants
//! - Every request is bounded by the configured timeout.
//! - `attendance_records` is unique on `(member_id, date)`; a conflicting
//!   insert fails instead of creating a duplicate.
//! - Rows with a status outside the closed set are skipped on read.

use crate::config::{HostedConfig, UpsertMode};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, AttendanceWrite, DATE_FORMAT};
use crate::model::member::{default_member_names, Member};
use crate::store::{AttendanceStore, BackendKind, Snapshot, StoreError, StoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info, warn};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};

const MEMBERS_TABLE: &str = "members";
const RECORDS_TABLE: &str = "attendance_records";
/// `id` breaks ties between rows inserted in the same statement.
const MEMBERS_ORDER: &str = "created_at.asc,id.asc";
const PREFER_REPRESENTATION: &str = "return=representation";
const PREFER_MERGE: &str = "resolution=merge-duplicates,return=representation";
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Blocking REST client for the hosted tables.
pub struct HostedStore {
    client: Client,
    rest_url: String,
    upsert_mode: UpsertMode,
}

/// Row ids may be UUID strings or serial integers depending on the schema.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RowId {
    Text(String),
    Number(i64),
}

impl From<RowId> for String {
    fn from(value: RowId) -> Self {
        match value {
            RowId::Text(text) => text,
            RowId::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MemberRow {
    id: RowId,
    name: String,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Member::new(row.id, row.name)
    }
}

#[derive(Debug, Deserialize)]
struct AttendanceRow {
    id: RowId,
    member_id: RowId,
    date: NaiveDate,
    status: String,
    timestamp: Option<DateTime<Utc>>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        Ok(AttendanceRecord {
            id: row.id.into(),
            member_id: row.member_id.into(),
            date: row.date,
            status: row.status.parse::<AttendanceStatus>()?,
            timestamp: row.timestamp,
        })
    }
}

impl HostedStore {
    /// Builds a client for `config` with a per-request `timeout`.
    ///
    /// # Errors
    /// `ClientSetup` when the api key is not a valid header value or the
    /// HTTP client cannot be built. No request is sent.
    pub fn new(
        config: &HostedConfig,
        timeout: Duration,
        upsert_mode: UpsertMode,
    ) -> StoreResult<Self> {
        let key = config.api_key.trim();
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {key}"))?);

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(client_setup_error)?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", config.base_url.trim().trim_end_matches('/')),
            upsert_mode,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.rest_url)
    }

    fn fetch_members(&self) -> StoreResult<Vec<Member>> {
        let request = self
            .client
            .get(self.table_url(MEMBERS_TABLE))
            .query(&[("select", "*"), ("order", MEMBERS_ORDER)]);
        let rows: Vec<MemberRow> = self.send("members_list", request)?;
        Ok(rows.into_iter().map(Member::from).collect())
    }

    fn fetch_records(&self) -> StoreResult<Vec<AttendanceRecord>> {
        let request = self
            .client
            .get(self.table_url(RECORDS_TABLE))
            .query(&[("select", "*"), ("order", "date.desc")]);
        let rows: Vec<AttendanceRow> = self.send("records_list", request)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match AttendanceRecord::try_from(row) {
                Ok(record) => records.push(record),
                Err(err) => warn!(
                    "event=records_list module=store backend=hosted status=skip_row error={err}"
                ),
            }
        }
        Ok(records)
    }

    fn upsert_atomic(&self, write: &AttendanceWrite) -> StoreResult<AttendanceRecord> {
        let request = self
            .client
            .post(self.table_url(RECORDS_TABLE))
            .query(&[("on_conflict", "member_id,date")])
            .header("Prefer", PREFER_MERGE)
            .json(&json!({
                "member_id": write.member_id,
                "date": write.date.format(DATE_FORMAT).to_string(),
                "status": write.status.as_str(),
                "timestamp": write.effective_timestamp(),
                "updated_at": Utc::now(),
            }));
        let rows: Vec<AttendanceRow> = self.send("record_upsert", request)?;
        single_record(rows)
    }

    fn upsert_read_then_write(&self, write: &AttendanceWrite) -> StoreResult<AttendanceRecord> {
        let date = write.date.format(DATE_FORMAT).to_string();
        let lookup = self.client.get(self.table_url(RECORDS_TABLE)).query(&[
            ("select", "*".to_string()),
            ("member_id", format!("eq.{}", write.member_id)),
            ("date", format!("eq.{date}")),
            ("limit", "1".to_string()),
        ]);
        let existing: Vec<AttendanceRow> = self.send("record_lookup", lookup)?;
        let timestamp = write.effective_timestamp();

        let request = match existing.into_iter().next() {
            Some(row) => {
                let id: String = row.id.into();
                self.client
                    .patch(self.table_url(RECORDS_TABLE))
                    .query(&[("id", format!("eq.{id}"))])
                    .header("Prefer", PREFER_REPRESENTATION)
                    .json(&json!({
                        "status": write.status.as_str(),
                        "timestamp": timestamp,
                        "updated_at": Utc::now(),
                    }))
            }
            None => self
                .client
                .post(self.table_url(RECORDS_TABLE))
                .header("Prefer", PREFER_REPRESENTATION)
                .json(&json!({
                    "member_id": write.member_id,
                    "date": date,
                    "status": write.status.as_str(),
                    "timestamp": timestamp,
                })),
        };

        let rows: Vec<AttendanceRow> = self.send("record_write", request)?;
        single_record(rows)
    }

    fn send<T: DeserializeOwned>(
        &self,
        op: &'static str,
        request: RequestBuilder,
    ) -> StoreResult<T> {
        let started_at = Instant::now();
        let response = request.send().map_err(|err| {
            let mapped = transport_error(err);
            error!(
                "event=hosted_request module=store backend=hosted op={op} status=error duration_ms={} error_code={} error={mapped}",
                started_at.elapsed().as_millis(),
                mapped.code()
            );
            mapped
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let mapped = StoreError::Backend {
                status: status.as_u16(),
                message: backend_message(&body),
            };
            error!(
                "event=hosted_request module=store backend=hosted op={op} status=error duration_ms={} error_code={} http_status={}",
                started_at.elapsed().as_millis(),
                mapped.code(),
                status.as_u16()
            );
            return Err(mapped);
        }

        let body = response.json::<T>().map_err(|err| {
            StoreError::InvalidData(format!("cannot decode `{op}` response: {err}"))
        })?;
        info!(
            "event=hosted_request module=store backend=hosted op={op} status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(body)
    }
}

impl AttendanceStore for HostedStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Hosted
    }

    fn load_all(&self) -> StoreResult<Snapshot> {
        Ok(Snapshot {
            members: self.fetch_members()?,
            records: self.fetch_records()?,
        })
    }

    fn ensure_default_members(&self) -> StoreResult<Vec<Member>> {
        if !self.fetch_members()?.is_empty() {
            return Ok(Vec::new());
        }

        // Sequential inserts: every default row gets a distinct `created_at`.
        default_member_names()
            .iter()
            .map(|name| self.create_member(name))
            .collect()
    }

    fn create_member(&self, name: &str) -> StoreResult<Member> {
        let request = self
            .client
            .post(self.table_url(MEMBERS_TABLE))
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&json!({ "name": name }));
        let rows: Vec<MemberRow> = self.send("member_create", request)?;
        rows.into_iter()
            .next()
            .map(Member::from)
            .ok_or_else(|| StoreError::InvalidData("member insert returned no row".to_string()))
    }

    fn rename_member(&self, id: &str, new_name: &str) -> StoreResult<Member> {
        let request = self
            .client
            .patch(self.table_url(MEMBERS_TABLE))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&json!({ "name": new_name, "updated_at": Utc::now() }));
        let rows: Vec<MemberRow> = self.send("member_rename", request)?;
        rows.into_iter()
            .next()
            .map(Member::from)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn record_attendance(&self, write: &AttendanceWrite) -> StoreResult<AttendanceRecord> {
        write.validate()?;
        match self.upsert_mode {
            UpsertMode::Atomic => self.upsert_atomic(write),
            UpsertMode::ReadThenWrite => self.upsert_read_then_write(write),
        }
    }
}

fn header_value(value: &str) -> StoreResult<HeaderValue> {
    let mut header = HeaderValue::from_str(value)
        .map_err(|_| {
            StoreError::ClientSetup("api key is not a valid header value".to_string())
        })?;
    header.set_sensitive(true);
    Ok(header)
}

fn single_record(rows: Vec<AttendanceRow>) -> StoreResult<AttendanceRecord> {
    rows.into_iter()
        .next()
        .ok_or_else(|| StoreError::InvalidData("attendance write returned no row".to_string()))
        .and_then(AttendanceRecord::try_from)
}

fn client_setup_error(err: reqwest::Error) -> StoreError {
    StoreError::ClientSetup(format!("cannot build http client: {err}"))
}

fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Unreachable(format!("request timed out: {err}"))
    } else if err.is_decode() {
        StoreError::InvalidData(err.to_string())
    } else {
        StoreError::Unreachable(err.to_string())
    }
}

/// Extracts PostgREST's `message` field, falling back to the raw body.
fn backend_message(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|message| message.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());
    let normalized = message.replace(['\n', '\r'], " ");
    normalized.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::{backend_message, client_setup_error, AttendanceRow, HostedStore, RowId};
    use crate::config::{HostedConfig, UpsertMode};
    use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
    use crate::store::StoreError;
    use std::time::Duration;

    #[test]
    fn local_client_failures_are_not_reported_as_unreachable() {
        let bad_key = HostedConfig::new("https://abc.supabase.co", "anon\nkey");
        let err = HostedStore::new(&bad_key, Duration::from_secs(1), UpsertMode::Atomic).err();
        assert!(matches!(err, Some(StoreError::ClientSetup(_))));

        let builder_err = reqwest::blocking::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        let mapped = client_setup_error(builder_err);
        assert_eq!(mapped.code(), "client_setup");
    }

    #[test]
    fn backend_message_prefers_postgrest_message_field() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#;
        assert_eq!(
            backend_message(body),
            "duplicate key value violates unique constraint"
        );
        assert_eq!(backend_message("gateway\ntimeout"), "gateway timeout");
    }

    #[test]
    fn numeric_and_text_ids_decode_to_strings() {
        let json = r#"{"id":7,"member_id":"b3c1","date":"2024-06-01","status":"absent","timestamp":null,"created_at":"x"}"#;
        let row: AttendanceRow = serde_json::from_str(json).unwrap();
        let record = AttendanceRecord::try_from(row).unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.member_id, "b3c1");
        assert_eq!(record.status, AttendanceStatus::Absent);
        assert!(matches!(
            serde_json::from_str::<RowId>("\"x\"").unwrap(),
            RowId::Text(_)
        ));
    }

    #[test]
    fn unknown_status_row_is_rejected() {
        let json = r#"{"id":"r1","member_id":"m1","date":"2024-06-01","status":"sick"}"#;
        let row: AttendanceRow = serde_json::from_str(json).unwrap();
        assert!(AttendanceRecord::try_from(row).is_err());
    }
}
