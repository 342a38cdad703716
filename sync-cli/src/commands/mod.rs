//! CLI command implementations.

pub mod apply;
pub mod config;
pub mod merge;

use anyhow::{Context, Result};
use std::path::Path;
use tasksync_types::Event;

/// Read a JSON array of events.
pub async fn load_events(path: &Path) -> Result<Vec<Event>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse events in {}", path.display()))
}
