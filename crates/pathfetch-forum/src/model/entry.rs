use serde::{Deserialize, Serialize};

/// One post in a topic. `author` is `None` for deleted accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: u64,
    pub text: String,
    pub author: Option<u64>,
}

impl Entry {
    pub fn new(id: u64, text: impl Into<String>, author: Option<u64>) -> Self {
        Self {
            id,
            text: text.into(),
            author,
        }
    }
}
