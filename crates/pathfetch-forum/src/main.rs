//! # Pathfetch Forum Demo
//!
//! Renders the forum's topic index and one topic page through a client
//! session. With `RUST_LOG=info` every handler call the server makes is
//! logged, which shows how reads made during one render pass become one
//! batched request.
//!
//! ## 🚀 Flow
//!
//! 1. [`ForumSystem::new`] wires schema, database, server and client.
//! 2. The topic index is read: one pass to discover topics, one to render.
//! 3. Topic 1 is read: topic, entries, authors and avatars follow each other
//!    in dependency order, each level batched.
//! 4. Topic 1 is read again and served entirely from the session store.

use pathfetch::lifecycle::setup_tracing;
use pathfetch_forum::lifecycle::ForumSystem;
use pathfetch_forum::pages::{topic_index, topic_page};
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    info!("Starting forum demo");

    let system = ForumSystem::new().map_err(|e| e.to_string())?;

    let span = tracing::info_span!("topic_index");
    let index = async {
        info!("Reading topic index");
        system
            .client
            .io(topic_index)
            .await
            .map_err(|e| e.to_string())
    }
    .instrument(span)
    .await?;

    for topic in &index {
        info!(id = %topic.id, name = %topic.name, entries = topic.entries, "Topic");
    }

    let span = tracing::info_span!("topic_page", topic_id = "1");
    let page = async {
        info!("Reading topic page");
        system.client.io(|root| topic_page(root, "1")).await
    }
    .instrument(span)
    .await;

    match page {
        Ok(Some(page)) => {
            let rendered = serde_json::to_string_pretty(&page).map_err(|e| e.to_string())?;
            info!(page = %rendered, "Topic page rendered");
        }
        Ok(None) => error!("Topic 1 does not exist"),
        Err(e) => error!(error = %e, "Rendering topic page failed"),
    }

    // The session store already has everything this page reads
    let span = tracing::info_span!("topic_page_cached", topic_id = "1");
    async {
        system
            .client
            .io(|root| topic_page(root, "1"))
            .await
            .map_err(|e| e.to_string())
    }
    .instrument(span)
    .await?;

    info!("Forum demo completed successfully");
    Ok(())
}
