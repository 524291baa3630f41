use serde::{Deserialize, Serialize};

/// A discussion topic. Relations are stored as ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: u64,
    pub name: String,
    pub entries: Vec<u64>,
    pub opening_entry: Option<u64>,
    pub participants: Vec<u64>,
    pub creator: Option<u64>,
}

impl Topic {
    /// Creates a topic whose opening entry is the first of `entries`.
    pub fn new(id: u64, name: impl Into<String>, creator: u64, entries: Vec<u64>) -> Self {
        Self {
            id,
            name: name.into(),
            opening_entry: entries.first().copied(),
            entries,
            participants: Vec::new(),
            creator: Some(creator),
        }
    }

    pub fn with_participants(mut self, participants: Vec<u64>) -> Self {
        self.participants = participants;
        self
    }
}
