//! Domain model for members and daily attendance.
//!
//! # Responsibility
//! - Define canonical data structures shared by storage adapters and the
//!   summary engine.
//! - Validate write-boundary inputs (status strings, calendar dates).
//!
//! # Invariants
//! - At most one `AttendanceRecord` exists per `(member_id, date)` pair.
//! - `AttendanceStatus` is closed; unknown values are rejected, never coerced.
//! - `MemberSummary` is derived and never persisted.

pub mod attendance;
pub mod member;
