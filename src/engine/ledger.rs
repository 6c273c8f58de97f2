//! Append-only stores: analysis history and feedback ledger.
//!
//! Both grow without bound; retention is left to the embedding application.

use crate::models::{AnalysisRecord, FeedbackEntry};
use std::collections::HashSet;

/// Analysis records indexed by sequence id.
#[derive(Debug, Default, Clone)]
pub struct History {
    records: Vec<AnalysisRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence id the next record will receive.
    pub fn next_sequence_id(&self) -> u64 {
        self.records.len() as u64
    }

    /// Append a record. Its id must be the next sequence id.
    pub(crate) fn push(&mut self, record: AnalysisRecord) {
        debug_assert_eq!(record.sequence_id, self.next_sequence_id());
        self.records.push(record);
    }

    pub fn get(&self, sequence_id: u64) -> Option<&AnalysisRecord> {
        usize::try_from(sequence_id)
            .ok()
            .and_then(|i| self.records.get(i))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[AnalysisRecord] {
        &self.records
    }

    /// The last `n` records, oldest first.
    pub fn recent(&self, n: usize) -> &[AnalysisRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }
}

/// Append-only record of submitted feedback.
#[derive(Debug, Default, Clone)]
pub struct FeedbackLedger {
    entries: Vec<FeedbackEntry>,
    seen: HashSet<u64>,
}

impl FeedbackLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, entry: FeedbackEntry) {
        self.seen.insert(entry.sequence_id);
        self.entries.push(entry);
    }

    /// Whether any feedback references `sequence_id`.
    pub fn contains(&self, sequence_id: u64) -> bool {
        self.seen.contains(&sequence_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FeedbackEntry] {
        &self.entries
    }

    /// Entries marked correct divided by all entries; 0 when empty.
    pub fn accuracy(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let correct = self.entries.iter().filter(|e| e.human_verdict).count();
        correct as f64 / self.entries.len() as f64
    }
}
