//! Coalesce an event file the way the outbound queue does.

use anyhow::Result;
use std::path::Path;
use tasksync_core::OutboundQueue;
use tasksync_types::Event;
use tracing::info;

use super::load_events;

/// Run the merge command.
pub async fn run(path: &Path) -> Result<()> {
    let events = load_events(path).await?;
    let received = events.len();
    let pending = coalesce(events);
    info!(received, pending = pending.len(), "Coalesced events");

    println!("{}", serde_json::to_string_pretty(&pending)?);
    Ok(())
}

/// Enqueue `events` in file order and return the pending set.
fn coalesce(events: Vec<Event>) -> Vec<Event> {
    let mut queue = OutboundQueue::new();
    for event in events {
        queue.enqueue(event);
    }
    queue.snapshot()
}
