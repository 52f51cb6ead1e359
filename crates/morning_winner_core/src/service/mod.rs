//! Session-level use cases over the storage port.
//!
//! # Responsibility
//! - Hold the last-known snapshot for presentation callers.
//! - Turn storage failures into user-visible error state without losing
//!   previously loaded data.
//! - Provide the one-shot local-to-hosted migration helper.

pub mod attendance_service;
pub mod migration;
