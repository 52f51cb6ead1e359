//! Derived attendance aggregates.
//!
//! # Responsibility
//! - Compute per-member counts and lateness penalties from record sets.
//!
//! # Invariants
//! - Pure functions only: inputs are never mutated and nothing is stored.
//! - Records that do not match the member contribute zero.

pub mod penalty;
