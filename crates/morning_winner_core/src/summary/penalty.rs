//! Penalty and summary engine.
//!
//! A late member pays `PENALTY_AMOUNT` to every member marked present on the
//! same day. Each late day is charged independently.

use crate::model::attendance::{AttendanceRecord, AttendanceStatus, MemberSummary};
use crate::model::member::Member;
use chrono::NaiveDate;

/// Penalty charged per present member for each late day.
pub const PENALTY_AMOUNT: u64 = 500;

/// Counts records on `date` with `status` across all members.
pub fn count_for_date(
    records: &[AttendanceRecord],
    date: NaiveDate,
    status: AttendanceStatus,
) -> usize {
    records
        .iter()
        .filter(|record| record.date == date && record.status == status)
        .count()
}

/// Returns the recorded status for one member on one day, if any.
pub fn status_for(
    records: &[AttendanceRecord],
    member_id: &str,
    date: NaiveDate,
) -> Option<AttendanceStatus> {
    records
        .iter()
        .find(|record| record.member_id == member_id && record.date == date)
        .map(|record| record.status)
}

/// Total penalty owed by `member` over the whole record set.
///
/// For each of the member's late records, the present count is taken over
/// all records of that date, not only the member's own.
pub fn penalty_for(member: &Member, records: &[AttendanceRecord]) -> u64 {
    records
        .iter()
        .filter(|record| {
            record.member_id == member.id && record.status == AttendanceStatus::Late
        })
        .map(|late| {
            let present = count_for_date(records, late.date, AttendanceStatus::Present) as u64;
            present * PENALTY_AMOUNT
        })
        .sum()
}

/// Builds the display summary for one member.
pub fn summarize(member: &Member, records: &[AttendanceRecord]) -> MemberSummary {
    let mut present_count = 0;
    let mut late_count = 0;
    let mut holiday_count = 0;

    for record in records.iter().filter(|record| record.member_id == member.id) {
        match record.status {
            AttendanceStatus::Present => present_count += 1,
            AttendanceStatus::Late => late_count += 1,
            AttendanceStatus::Holiday => holiday_count += 1,
            AttendanceStatus::Absent => {}
        }
    }

    MemberSummary {
        member: member.clone(),
        present_count,
        late_count,
        holiday_count,
        total_penalty: penalty_for(member, records),
    }
}

/// Summaries for every member, in roster order.
pub fn summarize_all(members: &[Member], records: &[AttendanceRecord]) -> Vec<MemberSummary> {
    members
        .iter()
        .map(|member| summarize(member, records))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{count_for_date, penalty_for, status_for, summarize, PENALTY_AMOUNT};
    use crate::model::attendance::{local_record_id, AttendanceRecord, AttendanceStatus};
    use crate::model::member::Member;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn record(member_id: &str, date: NaiveDate, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: local_record_id(member_id, date),
            member_id: member_id.to_string(),
            date,
            status,
            timestamp: None,
        }
    }

    #[test]
    fn late_day_charges_each_present_member() {
        let a = Member::new("a", "A");
        let records = vec![
            record("a", day(1), AttendanceStatus::Late),
            record("b", day(1), AttendanceStatus::Present),
            record("c", day(1), AttendanceStatus::Present),
            record("a", day(2), AttendanceStatus::Late),
            record("b", day(2), AttendanceStatus::Absent),
        ];

        assert_eq!(penalty_for(&a, &records), 2 * PENALTY_AMOUNT);

        let summary = summarize(&a, &records);
        assert_eq!(summary.late_count, 2);
        assert_eq!(summary.present_count, 0);
        assert_eq!(summary.total_penalty, 1000);
    }

    #[test]
    fn each_late_day_is_charged_independently() {
        let a = Member::new("a", "A");
        let records = vec![
            record("a", day(1), AttendanceStatus::Late),
            record("b", day(1), AttendanceStatus::Present),
            record("a", day(2), AttendanceStatus::Late),
            record("b", day(2), AttendanceStatus::Present),
            record("c", day(2), AttendanceStatus::Present),
        ];
        assert_eq!(penalty_for(&a, &records), 3 * PENALTY_AMOUNT);
    }

    #[test]
    fn present_and_holiday_members_owe_nothing() {
        let b = Member::new("b", "B");
        let records = vec![
            record("a", day(1), AttendanceStatus::Late),
            record("b", day(1), AttendanceStatus::Present),
            record("b", day(2), AttendanceStatus::Holiday),
        ];

        let summary = summarize(&b, &records);
        assert_eq!(summary.present_count, 1);
        assert_eq!(summary.holiday_count, 1);
        assert_eq!(summary.total_penalty, 0);
    }

    #[test]
    fn unknown_member_gets_zero_summary() {
        let ghost = Member::new("ghost", "Ghost");
        let records = vec![record("a", day(1), AttendanceStatus::Late)];

        let summary = summarize(&ghost, &records);
        assert_eq!(
            summary.present_count + summary.late_count + summary.holiday_count,
            0
        );
        assert_eq!(summary.total_penalty, 0);
    }

    #[test]
    fn date_lookups_scan_all_members() {
        let records = vec![
            record("a", day(1), AttendanceStatus::Present),
            record("b", day(1), AttendanceStatus::Present),
            record("c", day(1), AttendanceStatus::Late),
            record("a", day(2), AttendanceStatus::Present),
        ];

        assert_eq!(
            count_for_date(&records, day(1), AttendanceStatus::Present),
            2
        );
        assert_eq!(
            status_for(&records, "c", day(1)),
            Some(AttendanceStatus::Late)
        );
        assert_eq!(status_for(&records, "c", day(2)), None);
    }
}
