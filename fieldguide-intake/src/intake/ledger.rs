//! Dedup ledger: ticket references already recorded for the active tour
//!
//! Mirrors the remote `ticket_scans` rows of one tour instance. `add` and
//! `remove` are only called after the matching remote write succeeded, and
//! `reset_from` replaces the contents after every full reload.

use std::collections::HashSet;

#[derive(Debug, Default, Clone)]
pub struct DedupLedger {
    references: HashSet<String>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.references.contains(reference)
    }

    pub fn add(&mut self, reference: &str) {
        self.references.insert(reference.to_string());
    }

    pub fn remove(&mut self, reference: &str) {
        self.references.remove(reference);
    }

    /// Replace the contents entirely (no merge)
    pub fn reset_from<I, S>(&mut self, existing: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references = existing.into_iter().map(Into::into).collect();
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}
