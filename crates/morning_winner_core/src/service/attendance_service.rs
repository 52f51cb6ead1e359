//! Attendance session service.
//!
//! # Responsibility
//! - Seed, load and refresh the snapshot through one injected store.
//! - Apply writes to the in-memory snapshot only after the store confirms.
//! - Derive member summaries on demand.
//!
//! # Invariants
//! - A failed read keeps the prior snapshot and records an error message.
//! - A failed write leaves the snapshot unmutated.
//! - The snapshot never holds two records for one `(member_id, date)`.

use crate::model::attendance::{
    AttendanceRecord, AttendanceStatus, AttendanceWrite, MemberSummary, ValidationError,
};
use crate::model::member::Member;
use crate::store::{AttendanceStore, Snapshot, StoreError};
use crate::summary::penalty::{status_for, summarize, summarize_all};
use chrono::NaiveDate;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Service error for session use cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Input rejected before reaching the store.
    InvalidInput(ValidationError),
    LoadFailed(StoreError),
    RenameFailed(StoreError),
    CreateFailed(StoreError),
    SaveFailed(StoreError),
}

impl ServiceError {
    /// Message suitable for direct display to end users.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "入力内容が正しくありません",
            Self::LoadFailed(_) => "データの読み込みに失敗しました",
            Self::RenameFailed(_) => "メンバー名の更新に失敗しました",
            Self::CreateFailed(_) => "メンバーの追加に失敗しました",
            Self::SaveFailed(_) => "出席記録の保存に失敗しました",
        }
    }

    /// Underlying store error, when the failure came from storage.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::InvalidInput(_) => None,
            Self::LoadFailed(err)
            | Self::RenameFailed(err)
            | Self::CreateFailed(err)
            | Self::SaveFailed(err) => Some(err),
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "invalid input: {err}"),
            Self::LoadFailed(err) => write!(f, "failed to load attendance data: {err}"),
            Self::RenameFailed(err) => write!(f, "failed to rename member: {err}"),
            Self::CreateFailed(err) => write!(f, "failed to create member: {err}"),
            Self::SaveFailed(err) => write!(f, "failed to save attendance: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            other => other.store_error().map(|err| err as &(dyn Error + 'static)),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidInput(value)
    }
}

/// Stateful facade used by presentation layers.
pub struct AttendanceService<S: AttendanceStore> {
    store: S,
    snapshot: Snapshot,
    last_error: Option<String>,
}

impl<S: AttendanceStore> AttendanceService<S> {
    /// Creates a service with an empty snapshot. Call [`Self::initialize`]
    /// before reading.
    pub fn new(store: S) -> Self {
        Self {
            store,
            snapshot: Snapshot::default(),
            last_error: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn members(&self) -> &[Member] {
        &self.snapshot.members
    }

    pub fn records(&self) -> &[AttendanceRecord] {
        &self.snapshot.records
    }

    /// User-visible message of the most recent failure, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Seeds default members when the store is empty, then loads.
    ///
    /// Never fails: on error the prior snapshot is kept and
    /// [`Self::last_error`] is set.
    pub fn initialize(&mut self) -> &Snapshot {
        self.last_error = None;
        if let Err(err) = self.store.ensure_default_members() {
            self.fail("initialize", ServiceError::LoadFailed(err));
            return &self.snapshot;
        }
        self.reload("initialize", false)
    }

    /// Re-fetches the canonical snapshot. Same failure contract as
    /// [`Self::initialize`].
    pub fn refresh(&mut self) -> &Snapshot {
        self.last_error = None;
        self.reload("refresh", true)
    }

    fn reload(&mut self, op: &'static str, refresh: bool) -> &Snapshot {
        let started_at = Instant::now();
        let result = if refresh {
            self.store.refresh()
        } else {
            self.store.load_all()
        };

        match result {
            Ok(snapshot) => {
                info!(
                    "event=snapshot_load module=service op={op} status=ok backend={} members={} records={} duration_ms={}",
                    self.store.backend().as_str(),
                    snapshot.members.len(),
                    snapshot.records.len(),
                    started_at.elapsed().as_millis()
                );
                self.snapshot = snapshot;
            }
            Err(err) => {
                self.fail(op, ServiceError::LoadFailed(err));
            }
        }
        &self.snapshot
    }

    /// Renames one member and updates the snapshot on success.
    pub fn rename_member(&mut self, id: &str, new_name: &str) -> Result<Member, ServiceError> {
        match self.store.rename_member(id, new_name) {
            Ok(updated) => {
                if let Some(member) = self
                    .snapshot
                    .members
                    .iter_mut()
                    .find(|member| member.id == updated.id)
                {
                    *member = updated.clone();
                }
                Ok(updated)
            }
            Err(err) => Err(self.fail("rename_member", ServiceError::RenameFailed(err))),
        }
    }

    /// Adds one member and appends it to the snapshot on success.
    pub fn add_member(&mut self, name: &str) -> Result<Member, ServiceError> {
        match self.store.create_member(name) {
            Ok(member) => {
                self.snapshot.members.push(member.clone());
                Ok(member)
            }
            Err(err) => Err(self.fail("add_member", ServiceError::CreateFailed(err))),
        }
    }

    /// Records attendance from untyped input.
    ///
    /// Unknown statuses and malformed dates are rejected before the store is
    /// touched.
    pub fn record_attendance(
        &mut self,
        member_id: &str,
        date: &str,
        status: &str,
    ) -> Result<AttendanceRecord, ServiceError> {
        match AttendanceWrite::parse(member_id, date, status) {
            Ok(write) => self.record(&write),
            Err(err) => Err(self.fail("record_attendance", ServiceError::InvalidInput(err))),
        }
    }

    /// Records a validated write and replaces the pair in the snapshot.
    pub fn record(&mut self, write: &AttendanceWrite) -> Result<AttendanceRecord, ServiceError> {
        match self.store.record_attendance(write) {
            Ok(record) => {
                self.snapshot.records.retain(|existing| {
                    !(existing.member_id == record.member_id && existing.date == record.date)
                });
                self.snapshot.records.push(record.clone());
                Ok(record)
            }
            Err(err) => Err(self.fail("record_attendance", ServiceError::SaveFailed(err))),
        }
    }

    pub fn status_for(&self, member_id: &str, date: NaiveDate) -> Option<AttendanceStatus> {
        status_for(&self.snapshot.records, member_id, date)
    }

    pub fn summary(&self, member: &Member) -> MemberSummary {
        summarize(member, &self.snapshot.records)
    }

    pub fn summaries(&self) -> Vec<MemberSummary> {
        summarize_all(&self.snapshot.members, &self.snapshot.records)
    }

    fn fail(&mut self, op: &'static str, err: ServiceError) -> ServiceError {
        error!(
            "event=service_call module=service op={op} status=error backend={} error_code={} error={err}",
            self.store.backend().as_str(),
            err.store_error().map_or("validation", StoreError::code)
        );
        self.last_error = Some(err.user_message().to_string());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::{AttendanceService, ServiceError};
    use crate::model::attendance::{AttendanceRecord, AttendanceWrite};
    use crate::model::member::Member;
    use crate::store::{AttendanceStore, BackendKind, LocalStore, Snapshot, StoreError, StoreResult};
    use std::cell::Cell;

    /// Delegates to a local store until `offline` is set.
    struct FlakyStore {
        inner: LocalStore,
        offline: Cell<bool>,
    }

    impl FlakyStore {
        fn check(&self) -> StoreResult<()> {
            if self.offline.get() {
                Err(StoreError::Unreachable("simulated outage".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl AttendanceStore for FlakyStore {
        fn backend(&self) -> BackendKind {
            BackendKind::Hosted
        }

        fn load_all(&self) -> StoreResult<Snapshot> {
            self.check()?;
            self.inner.load_all()
        }

        fn ensure_default_members(&self) -> StoreResult<Vec<Member>> {
            self.check()?;
            self.inner.ensure_default_members()
        }

        fn create_member(&self, name: &str) -> StoreResult<Member> {
            self.check()?;
            self.inner.create_member(name)
        }

        fn rename_member(&self, id: &str, new_name: &str) -> StoreResult<Member> {
            self.check()?;
            self.inner.rename_member(id, new_name)
        }

        fn record_attendance(&self, write: &AttendanceWrite) -> StoreResult<AttendanceRecord> {
            self.check()?;
            self.inner.record_attendance(write)
        }
    }

    fn flaky_service() -> AttendanceService<FlakyStore> {
        AttendanceService::new(FlakyStore {
            inner: LocalStore::in_memory().unwrap(),
            offline: Cell::new(false),
        })
    }

    #[test]
    fn failed_refresh_keeps_prior_snapshot() {
        let mut service = flaky_service();
        service.initialize();
        service
            .record_attendance("1", "2024-07-01", "present")
            .unwrap();
        assert_eq!(service.members().len(), 4);

        service.store().offline.set(true);
        let snapshot = service.refresh();
        assert_eq!(snapshot.members.len(), 4);
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(service.last_error(), Some("データの読み込みに失敗しました"));

        service.store().offline.set(false);
        service.refresh();
        assert!(service.last_error().is_none());
    }

    #[test]
    fn failed_initialize_keeps_prior_snapshot() {
        let mut service = flaky_service();
        service.initialize();
        service
            .record_attendance("3", "2024-07-02", "late")
            .unwrap();
        let before = service.snapshot().clone();

        service.store().offline.set(true);
        let snapshot = service.initialize();
        assert_eq!(snapshot, &before);
        assert_eq!(service.last_error(), Some("データの読み込みに失敗しました"));

        service.store().offline.set(false);
        service.initialize();
        assert!(service.last_error().is_none());
        assert_eq!(service.members().len(), 4);
    }

    #[test]
    fn failed_write_leaves_snapshot_unmutated() {
        let mut service = flaky_service();
        service.initialize();
        service.store().offline.set(true);

        let err = service
            .record_attendance("1", "2024-07-01", "late")
            .unwrap_err();
        assert!(matches!(err, ServiceError::SaveFailed(StoreError::Unreachable(_))));
        assert!(service.records().is_empty());
        assert_eq!(service.last_error(), Some("出席記録の保存に失敗しました"));

        let err = service.rename_member("1", "Aki").unwrap_err();
        assert!(matches!(err, ServiceError::RenameFailed(_)));
        assert_eq!(service.members()[0].name, "メンバー1");
    }

    #[test]
    fn invalid_status_never_reaches_store() {
        let mut service = flaky_service();
        service.initialize();

        let err = service
            .record_attendance("1", "2024-07-01", "overslept")
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(service.store().inner.load_all().unwrap().records.is_empty());
    }

    #[test]
    fn snapshot_tracks_overwrites_without_duplicates() {
        let mut service = flaky_service();
        service.initialize();
        service
            .record_attendance("2", "2024-07-01", "late")
            .unwrap();
        service
            .record_attendance("2", "2024-07-01", "present")
            .unwrap();

        assert_eq!(service.records().len(), 1);
        let date = chrono::NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert_eq!(
            service.status_for("2", date),
            Some(crate::model::attendance::AttendanceStatus::Present)
        );
    }
}
