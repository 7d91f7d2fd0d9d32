//! Append-only conversation transcript

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Creation-ordered entry identifier. Higher ids were created later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(u64);

impl EntryId {
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::User => "you",
            Role::Agent => "agent",
            Role::System => "system",
        })
    }
}

/// One message in the conversation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: EntryId,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {}] {}",
            self.created_at.format("%H:%M:%S"),
            self.role,
            self.text
        )
    }
}

/// Ordered record of the conversation.
///
/// Entries are kept sorted by id no matter the order they are appended in,
/// so display order always matches creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry at its id position. Returns false for a duplicate id.
    pub fn append(&mut self, entry: TranscriptEntry) -> bool {
        let at = self.entries.partition_point(|e| e.id < entry.id);
        if self.entries.get(at).is_some_and(|e| e.id == entry.id) {
            return false;
        }
        self.entries.insert(at, entry);
        true
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Entries created after `id`, in order.
    pub fn since(&self, id: Option<EntryId>) -> &[TranscriptEntry] {
        match id {
            Some(id) => {
                let at = self.entries.partition_point(|e| e.id <= id);
                &self.entries[at..]
            }
            None => &self.entries,
        }
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, text: &str) -> TranscriptEntry {
        TranscriptEntry {
            id: EntryId::new(id),
            role: Role::Agent,
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn late_arrivals_are_placed_by_id() {
        let mut transcript = Transcript::new();
        transcript.append(entry(3, "third"));
        transcript.append(entry(1, "first"));
        transcript.append(entry(2, "second"));

        let texts: Vec<_> = transcript.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut transcript = Transcript::new();
        assert!(transcript.append(entry(1, "a")));
        assert!(!transcript.append(entry(1, "b")));
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.entries()[0].text, "a");
    }

    #[test]
    fn since_returns_newer_entries() {
        let mut transcript = Transcript::new();
        for i in 1..=4 {
            transcript.append(entry(i, "x"));
        }
        assert_eq!(transcript.since(None).len(), 4);
        assert_eq!(transcript.since(Some(EntryId::new(2))).len(), 2);
        assert!(transcript.since(Some(EntryId::new(4))).is_empty());
    }
}
