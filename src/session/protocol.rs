//! Session protocol: an append-only record of planning decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::knowledge::ObjectId;

/// One protocol entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProtocolEntry {
    /// A path was calculated and committed.
    CalculatedPath {
        time: DateTime<Utc>,
        actions: Vec<ObjectId>,
        duration_ms: u64,
    },
    /// Free-form note, e.g. newly detected conflicting questions.
    Text { time: DateTime<Utc>, message: String },
}

impl ProtocolEntry {
    /// When the entry was recorded.
    #[must_use]
    pub const fn time(&self) -> DateTime<Utc> {
        match self {
            Self::CalculatedPath { time, .. } | Self::Text { time, .. } => *time,
        }
    }
}

/// Append-only protocol of a real session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Protocol {
    entries: Vec<ProtocolEntry>,
}

impl Protocol {
    /// Appends an entry.
    pub fn push(&mut self, entry: ProtocolEntry) {
        self.entries.push(entry);
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[ProtocolEntry] {
        &self.entries
    }

    /// Committed paths, oldest first.
    pub fn calculated_paths(&self) -> impl Iterator<Item = &[ObjectId]> {
        self.entries.iter().filter_map(|e| match e {
            ProtocolEntry::CalculatedPath { actions, .. } => Some(actions.as_slice()),
            ProtocolEntry::Text { .. } => None,
        })
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True before the first entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
