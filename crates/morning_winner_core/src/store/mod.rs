//! Storage port and its two adapters.
//!
//! # Responsibility
//! - Define the single contract between callers and persistence.
//! - Construct the adapter selected by `StorageConfig` exactly once.
//!
//! # Invariants
//! - At most one record per `(member_id, date)` in either backend.
//! - Writes validate their input before any I/O.
//! - A failed write leaves the backing store unmutated.

use crate::config::{BackendSelection, StorageConfig};
use crate::db::DbError;
use crate::model::attendance::{AttendanceRecord, AttendanceWrite, ValidationError};
use crate::model::member::{Member, MemberId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod hosted;
pub mod local;

pub use hosted::HostedStore;
pub use local::LocalStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-port error taxonomy.
#[derive(Debug)]
pub enum StoreError {
    /// Rejected input (status, date, member id) before any I/O.
    Validation(ValidationError),
    /// Unknown member id.
    NotFound(MemberId),
    /// Hosted backend timed out or could not be reached.
    Unreachable(String),
    /// Hosted backend answered with a non-success status.
    Backend { status: u16, message: String },
    /// Local SQLite failure.
    Db(DbError),
    /// Payload could not be decoded or encoded.
    InvalidData(String),
    /// HTTP client could not be set up locally (bad key, TLS backend).
    ClientSetup(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "member not found: {id}"),
            Self::Unreachable(message) => write!(f, "backend unreachable: {message}"),
            Self::Backend { status, message } => {
                write!(f, "backend request failed with status {status}: {message}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
            Self::ClientSetup(message) => write!(f, "http client setup failed: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_)
            | Self::Unreachable(_)
            | Self::Backend { .. }
            | Self::InvalidData(_)
            | Self::ClientSetup(_) => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl StoreError {
    /// Stable short code for log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Unreachable(_) => "unreachable",
            Self::Backend { .. } => "backend",
            Self::Db(_) => "db",
            Self::InvalidData(_) => "invalid_data",
            Self::ClientSetup(_) => "client_setup",
        }
    }
}

/// Which adapter serves the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Hosted,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Hosted => "hosted",
        }
    }
}

/// Point-in-time copy of both collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub members: Vec<Member>,
    pub records: Vec<AttendanceRecord>,
}

/// Storage port shared by the local and hosted adapters.
///
/// Both implementations expose identical observable semantics; callers
/// hold a `Box<dyn AttendanceStore>` built by [`open_store`].
pub trait AttendanceStore {
    fn backend(&self) -> BackendKind;

    /// Returns the current snapshot. Succeeds with zero members.
    fn load_all(&self) -> StoreResult<Snapshot>;

    /// Seeds `メンバー1..4` iff no member exists. Returns the created members.
    fn ensure_default_members(&self) -> StoreResult<Vec<Member>>;

    /// Appends one member with a fresh id.
    fn create_member(&self, name: &str) -> StoreResult<Member>;

    /// Renames an existing member. Unknown ids yield `NotFound`.
    fn rename_member(&self, id: &str, new_name: &str) -> StoreResult<Member>;

    /// Upserts the record for `(write.member_id, write.date)`.
    fn record_attendance(&self, write: &AttendanceWrite) -> StoreResult<AttendanceRecord>;

    /// Re-fetches the canonical snapshot.
    fn refresh(&self) -> StoreResult<Snapshot> {
        self.load_all()
    }
}

impl<S: AttendanceStore + ?Sized> AttendanceStore for Box<S> {
    fn backend(&self) -> BackendKind {
        (**self).backend()
    }

    fn load_all(&self) -> StoreResult<Snapshot> {
        (**self).load_all()
    }

    fn ensure_default_members(&self) -> StoreResult<Vec<Member>> {
        (**self).ensure_default_members()
    }

    fn create_member(&self, name: &str) -> StoreResult<Member> {
        (**self).create_member(name)
    }

    fn rename_member(&self, id: &str, new_name: &str) -> StoreResult<Member> {
        (**self).rename_member(id, new_name)
    }

    fn record_attendance(&self, write: &AttendanceWrite) -> StoreResult<AttendanceRecord> {
        (**self).record_attendance(write)
    }

    fn refresh(&self) -> StoreResult<Snapshot> {
        (**self).refresh()
    }
}

/// Builds the adapter selected by `config`.
///
/// # Errors
/// - Local: the SQLite file cannot be opened or migrated.
/// - Hosted: the HTTP client cannot be constructed.
pub fn open_store(config: &StorageConfig) -> StoreResult<Box<dyn AttendanceStore>> {
    match &config.backend {
        BackendSelection::Local => Ok(Box::new(LocalStore::open(&config.local_db_path)?)),
        BackendSelection::Hosted(hosted) => Ok(Box::new(HostedStore::new(
            hosted,
            config.http_timeout,
            config.upsert_mode,
        )?)),
    }
}
