//! Core domain logic for Morning Winner attendance tracking.
//! This crate owns the penalty rules and the storage port; presentation
//! layers only call into it.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;
pub mod summary;

pub use config::{BackendSelection, ConfigError, HostedConfig, StorageConfig, UpsertMode};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::attendance::{
    parse_attendance_date, AttendanceRecord, AttendanceStatus, AttendanceWrite, MemberSummary,
    ValidationError,
};
pub use model::member::{Member, MemberId};
pub use service::attendance_service::{AttendanceService, ServiceError};
pub use service::migration::{migrate_local_to_hosted, MigrationReport};
pub use store::{
    open_store, AttendanceStore, BackendKind, HostedStore, LocalStore, Snapshot, StoreError,
    StoreResult,
};
pub use summary::penalty::{
    count_for_date, penalty_for, status_for, summarize, summarize_all, PENALTY_AMOUNT,
};

/// Minimal health-check API for wiring probes.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
