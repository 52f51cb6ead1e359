//! One-shot copy of a local snapshot into another store.
//!
//! Best-effort and meant to be run under supervision: records are matched
//! to target members by display name, so two members sharing a name can
//! receive each other's records.

use crate::model::attendance::AttendanceWrite;
use crate::model::member::{default_member_name, Member};
use crate::store::{AttendanceStore, StoreResult};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

static LEADING_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)").expect("valid leading number regex"));

/// Counts reported after a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub members_created: usize,
    pub records_migrated: usize,
    /// Records whose member could not be matched in the target.
    pub records_skipped: usize,
}

/// Copies members and attendance from `source` into `target`.
///
/// # Contract
/// - Source members missing from the target (by name) are created.
/// - Each record is attached to the target member named `メンバー{N}`, where
///   `N` is the leading integer of the source member id, or to the target
///   member sharing the source member's name.
/// - Records keep their original timestamp and go through the normal upsert.
///
/// # Errors
/// Stops at the first store failure; earlier writes are not rolled back.
pub fn migrate_local_to_hosted<L, H>(source: &L, target: &H) -> StoreResult<MigrationReport>
where
    L: AttendanceStore + ?Sized,
    H: AttendanceStore + ?Sized,
{
    let local = source.load_all()?;
    let mut report = MigrationReport::default();

    let mut target_members = target.load_all()?.members;
    for member in &local.members {
        if target_members.iter().any(|existing| existing.name == member.name) {
            continue;
        }
        target_members.push(target.create_member(&member.name)?);
        report.members_created += 1;
    }

    for record in &local.records {
        let source_name = local
            .members
            .iter()
            .find(|member| member.id == record.member_id)
            .map(|member| member.name.as_str());
        let Some(matched) = match_member(&target_members, &record.member_id, source_name) else {
            report.records_skipped += 1;
            continue;
        };

        let mut write = AttendanceWrite::new(matched.id.clone(), record.date, record.status);
        write.timestamp = record.timestamp;
        target.record_attendance(&write)?;
        report.records_migrated += 1;
    }

    if report.records_skipped > 0 {
        warn!(
            "event=migration module=service status=partial skipped={}",
            report.records_skipped
        );
    }
    info!(
        "event=migration module=service status=ok members_created={} records_migrated={}",
        report.members_created, report.records_migrated
    );
    Ok(report)
}

fn match_member<'a>(
    targets: &'a [Member],
    source_member_id: &str,
    source_name: Option<&str>,
) -> Option<&'a Member> {
    let placeholder = leading_number(source_member_id).map(default_member_name);
    targets.iter().find(|candidate| {
        placeholder.as_deref() == Some(candidate.name.as_str())
            || source_name == Some(candidate.name.as_str())
    })
}

/// Leading integer of `value`, mirroring lenient numeric id parsing.
fn leading_number(value: &str) -> Option<usize> {
    LEADING_NUMBER_RE
        .captures(value)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::{leading_number, migrate_local_to_hosted};
    use crate::model::attendance::{AttendanceStatus, AttendanceWrite};
    use crate::store::{AttendanceStore, LocalStore};
    use chrono::NaiveDate;

    #[test]
    fn leading_number_parses_prefix_only() {
        assert_eq!(leading_number("3"), Some(3));
        assert_eq!(leading_number(" 12abc"), Some(12));
        assert_eq!(leading_number("abc"), None);
    }

    #[test]
    fn migration_matches_by_placeholder_and_name() {
        let source = LocalStore::in_memory().unwrap();
        source.ensure_default_members().unwrap();
        source.rename_member("2", "Haru").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        source
            .record_attendance(&AttendanceWrite::new("1", date, AttendanceStatus::Late))
            .unwrap();
        source
            .record_attendance(&AttendanceWrite::new("2", date, AttendanceStatus::Present))
            .unwrap();

        let target = LocalStore::in_memory().unwrap();
        target.create_member("メンバー1").unwrap();

        let report = migrate_local_to_hosted(&source, &target).unwrap();
        assert_eq!(report.members_created, 3);
        assert_eq!(report.records_migrated, 2);
        assert_eq!(report.records_skipped, 0);

        let snapshot = target.load_all().unwrap();
        let haru = snapshot
            .members
            .iter()
            .find(|member| member.name == "Haru")
            .unwrap();
        assert!(snapshot.records.iter().any(|record| {
            record.member_id == haru.id && record.status == AttendanceStatus::Present
        }));
    }

    #[test]
    fn migration_is_repeatable_without_duplicates() {
        let source = LocalStore::in_memory().unwrap();
        source.ensure_default_members().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 8, 2).unwrap();
        source
            .record_attendance(&AttendanceWrite::new("3", date, AttendanceStatus::Holiday))
            .unwrap();

        let target = LocalStore::in_memory().unwrap();
        migrate_local_to_hosted(&source, &target).unwrap();
        let second = migrate_local_to_hosted(&source, &target).unwrap();

        assert_eq!(second.members_created, 0);
        let snapshot = target.load_all().unwrap();
        assert_eq!(snapshot.members.len(), 4);
        assert_eq!(snapshot.records.len(), 1);
    }
}
