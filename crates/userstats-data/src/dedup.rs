use std::collections::HashSet;

use userstats_core::models::UserRecord;

/// Identifiers already accepted into the aggregate, kept for the whole run.
///
/// The first record seen for an identifier wins, in file enumeration order
/// and then row order, so a different file order can keep a different copy
/// of a duplicated user.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only records whose identifier has not been seen before, recording
    /// each kept identifier. Duplicates inside `chunk` are dropped too.
    pub fn filter_new(&mut self, chunk: Vec<UserRecord>) -> Vec<UserRecord> {
        chunk
            .into_iter()
            .filter(|record| self.seen.insert(record.user_id.clone()))
            .collect()
    }

    /// Number of distinct identifiers accepted so far.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
