//! # Pages
//!
//! Readers that turn the forum's view into page models. They run inside
//! [`Client::io`](pathfetch::Client::io), possibly several times, so they only
//! read.

use pathfetch_core::{BoxError, ObjectView};
use serde::Serialize;

/// Author shown for entries whose author is gone.
pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryLine {
    pub author: String,
    pub avatar: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicPage {
    pub name: String,
    pub creator: Option<String>,
    pub opening_entry: Option<String>,
    pub entries: Vec<EntryLine>,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicSummary {
    pub id: String,
    pub name: String,
    pub entries: usize,
}

/// The topic `topic_id` with all its entries and their authors. `None` when
/// the topic does not exist.
pub fn topic_page(root: &ObjectView<'_>, topic_id: &str) -> Result<Option<TopicPage>, BoxError> {
    let Some(topic) = root.collection("topics")?.item(topic_id) else {
        return Ok(None);
    };
    let name = topic.text("name")?;

    let entries = topic
        .collection("entries")?
        .items()
        .iter()
        .map(entry_line)
        .collect::<Result<Vec<_>, _>>()?;
    let participants = topic
        .collection("participants")?
        .items()
        .iter()
        .map(|user| user.text("name"))
        .collect::<Result<Vec<_>, _>>()?;
    let creator = match topic.reference("creator")? {
        Some(user) => Some(user.text("name")?),
        None => None,
    };
    let opening_entry = match topic.reference("openingEntry")? {
        Some(entry) => Some(entry.text("text")?),
        None => None,
    };

    Ok(Some(TopicPage {
        name,
        creator,
        opening_entry,
        entries,
        participants,
    }))
}

/// Every topic with its entry count.
pub fn topic_index(root: &ObjectView<'_>) -> Result<Vec<TopicSummary>, BoxError> {
    let topics = root.collection("topics")?;
    let mut summaries = Vec::new();
    for id in topics.keys() {
        let Some(topic) = topics.item(&id) else {
            continue;
        };
        summaries.push(TopicSummary {
            name: topic.text("name")?,
            entries: topic.collection("entries")?.keys().len(),
            id,
        });
    }
    Ok(summaries)
}

fn entry_line(entry: &ObjectView<'_>) -> Result<EntryLine, BoxError> {
    let (author, avatar) = match entry.reference("author")? {
        Some(user) => {
            let avatar = match user.object("avatar")? {
                Some(avatar) => Some(avatar.text("url")?),
                None => None,
            };
            (user.text("name")?, avatar)
        }
        None => (ANONYMOUS.to_owned(), None),
    };
    Ok(EntryLine {
        author,
        avatar,
        text: entry.text("text")?,
    })
}
