//! Attendance domain model.
//!
//! # Responsibility
//! - Define the closed attendance status set and the per-day record shape.
//! - Parse and validate write requests before they reach any store.
//!
//! # Invariants
//! - `AttendanceStatus` only admits `present|late|absent|holiday`.
//! - `date` is an ISO calendar date (`YYYY-MM-DD`).
//! - Locally stored records use `{member_id}-{date}` as their id.

use crate::model::member::{Member, MemberId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Calendar date format shared by storage and CLI.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Attendance state for one member on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    Holiday,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::Present,
        AttendanceStatus::Late,
        AttendanceStatus::Absent,
        AttendanceStatus::Holiday,
    ];

    /// Returns the wire/storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Late => "late",
            Self::Absent => "absent",
            Self::Holiday => "holiday",
        }
    }
}

impl Display for AttendanceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = ValidationError;

    /// Exact, case-sensitive match against the closed status set.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "present" => Ok(Self::Present),
            "late" => Ok(Self::Late),
            "absent" => Ok(Self::Absent),
            "holiday" => Ok(Self::Holiday),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Write-boundary validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    UnknownStatus(String),
    InvalidDate(String),
    EmptyMemberId,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownStatus(value) => write!(
                f,
                "unknown attendance status `{value}`; expected present|late|absent|holiday"
            ),
            Self::InvalidDate(value) => {
                write!(f, "invalid attendance date `{value}`; expected YYYY-MM-DD")
            }
            Self::EmptyMemberId => write!(f, "member id cannot be empty"),
        }
    }
}

impl Error for ValidationError {}

/// Parses a strict `YYYY-MM-DD` calendar date.
pub fn parse_attendance_date(value: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = value.trim();
    // chrono accepts unpadded fields; the stored form must stay zero-padded.
    if trimmed.len() != 10 {
        return Err(ValidationError::InvalidDate(value.to_string()));
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(value.to_string()))
}

/// Derives the local-store record id for one `(member, date)` pair.
pub fn local_record_id(member_id: &str, date: NaiveDate) -> String {
    format!("{member_id}-{}", date.format(DATE_FORMAT))
}

/// One attendance entry, unique per `(member_id, date)`.
///
/// Serialized in camelCase so local snapshots keep the legacy key layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub member_id: MemberId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    /// Instant the status was recorded. Legacy snapshots may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Validated upsert request for one `(member_id, date)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceWrite {
    pub member_id: MemberId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    /// Defaults to "now" at write time when `None`.
    pub timestamp: Option<DateTime<Utc>>,
}

impl AttendanceWrite {
    pub fn new(member_id: impl Into<MemberId>, date: NaiveDate, status: AttendanceStatus) -> Self {
        Self {
            member_id: member_id.into(),
            date,
            status,
            timestamp: None,
        }
    }

    /// Builds a write request from untyped input.
    ///
    /// # Errors
    /// - `EmptyMemberId` when `member_id` is blank.
    /// - `InvalidDate` when `date` is not `YYYY-MM-DD`.
    /// - `UnknownStatus` when `status` is outside the closed set.
    pub fn parse(member_id: &str, date: &str, status: &str) -> Result<Self, ValidationError> {
        let member_id = member_id.trim();
        if member_id.is_empty() {
            return Err(ValidationError::EmptyMemberId);
        }
        let date = parse_attendance_date(date)?;
        let status = status.parse::<AttendanceStatus>()?;
        Ok(Self::new(member_id, date, status))
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns the explicit timestamp or the current instant.
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or_else(Utc::now)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.member_id.trim().is_empty() {
            return Err(ValidationError::EmptyMemberId);
        }
        Ok(())
    }
}

/// Derived per-member totals. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSummary {
    pub member: Member,
    pub present_count: usize,
    pub late_count: usize,
    pub holiday_count: usize,
    pub total_penalty: u64,
}

#[cfg(test)]
mod tests {
    use super::{
        local_record_id, parse_attendance_date, AttendanceRecord, AttendanceStatus,
        AttendanceWrite, ValidationError,
    };
    use chrono::NaiveDate;

    #[test]
    fn status_parse_rejects_unknown_and_case_variants() {
        assert_eq!("late".parse::<AttendanceStatus>(), Ok(AttendanceStatus::Late));
        assert_eq!(
            "tardy".parse::<AttendanceStatus>(),
            Err(ValidationError::UnknownStatus("tardy".to_string()))
        );
        assert!("Present".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn status_roundtrips_through_display() {
        for status in AttendanceStatus::ALL {
            assert_eq!(status.to_string().parse::<AttendanceStatus>(), Ok(status));
        }
    }

    #[test]
    fn date_parse_requires_padded_iso_form() {
        assert!(parse_attendance_date("2024-03-07").is_ok());
        assert!(parse_attendance_date("2024-3-7").is_err());
        assert!(parse_attendance_date("2024-02-30").is_err());
        assert!(parse_attendance_date("07/03/2024").is_err());
    }

    #[test]
    fn write_parse_validates_every_field() {
        assert_eq!(
            AttendanceWrite::parse(" ", "2024-03-07", "late"),
            Err(ValidationError::EmptyMemberId)
        );
        assert!(matches!(
            AttendanceWrite::parse("1", "yesterday", "late"),
            Err(ValidationError::InvalidDate(_))
        ));
        assert!(matches!(
            AttendanceWrite::parse("1", "2024-03-07", "sick"),
            Err(ValidationError::UnknownStatus(_))
        ));

        let write = AttendanceWrite::parse("1", "2024-03-07", "holiday").unwrap();
        assert_eq!(write.status, AttendanceStatus::Holiday);
        assert!(write.timestamp.is_none());
    }

    #[test]
    fn local_record_id_joins_member_and_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(local_record_id("3", date), "3-2024-01-05");
    }

    #[test]
    fn record_deserializes_legacy_snapshot_entry() {
        let json = r#"{"id":"1-2024-01-05","memberId":"1","date":"2024-01-05","status":"late","timestamp":"2024-01-05T00:12:03.456Z"}"#;
        let record: AttendanceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.member_id, "1");
        assert_eq!(record.status, AttendanceStatus::Late);
        assert!(record.timestamp.is_some());

        let without_timestamp = r#"{"id":"2-2024-01-05","memberId":"2","date":"2024-01-05","status":"present"}"#;
        let record: AttendanceRecord = serde_json::from_str(without_timestamp).unwrap();
        assert!(record.timestamp.is_none());
    }

    #[test]
    fn record_rejects_unknown_status_on_decode() {
        let json = r#"{"id":"1-2024-01-05","memberId":"1","date":"2024-01-05","status":"sick"}"#;
        assert!(serde_json::from_str::<AttendanceRecord>(json).is_err());
    }
}
