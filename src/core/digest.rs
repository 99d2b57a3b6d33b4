//! Paper memory digest: the ordered list of approved stage decisions.
//!
//! Entries are never removed. A rewind flips `superseded` on the entries of
//! the stages it invalidates, and replay skips them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::Stage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestEntry {
    pub stage: Stage,
    pub decision: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub superseded: bool,
}

/// Record the decision made when `stage` was approved.
pub fn append_decision(
    digest: &mut Vec<DigestEntry>,
    stage: Stage,
    decision: impl Into<String>,
    now: DateTime<Utc>,
) {
    digest.push(DigestEntry {
        stage,
        decision: decision.into(),
        timestamp: now,
        superseded: false,
    });
}

/// Mark every live entry for one of `stages` as superseded.
///
/// Returns how many entries changed.
pub fn supersede_entries_for_stages(digest: &mut [DigestEntry], stages: &[Stage]) -> usize {
    let mut changed = 0;
    for entry in digest.iter_mut() {
        if !entry.superseded && stages.contains(&entry.stage) {
            entry.superseded = true;
            changed += 1;
        }
    }
    changed
}

/// Entries still in force, oldest first.
pub fn replay(digest: &[DigestEntry]) -> impl Iterator<Item = &DigestEntry> {
    digest.iter().filter(|entry| !entry.superseded)
}
