//! Member domain model.
//!
//! # Responsibility
//! - Define the tracked member identity and display name.
//! - Provide the placeholder roster used to seed an empty store.
//!
//! # Invariants
//! - `id` is stable for the member lifetime and never reused.
//! - `name` is mutable through rename only; emptiness is not enforced.

use serde::{Deserialize, Serialize};

/// Stable member identifier.
///
/// Local storage uses short numeric strings for seeded members; the hosted
/// backend assigns opaque ids.
pub type MemberId = String;

/// Number of placeholder members created for an empty store.
pub const DEFAULT_MEMBER_COUNT: usize = 4;

/// One tracked person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
}

impl Member {
    pub fn new(id: impl Into<MemberId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Returns the placeholder name for the 1-based member slot.
pub fn default_member_name(slot: usize) -> String {
    format!("メンバー{slot}")
}

/// Returns placeholder names `メンバー1..4` in stable order.
pub fn default_member_names() -> Vec<String> {
    (1..=DEFAULT_MEMBER_COUNT).map(default_member_name).collect()
}
