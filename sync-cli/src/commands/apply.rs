//! Apply an event file to an empty task list.

use anyhow::{Context, Result};
use std::fmt::Write;
use std::path::Path;
use tasksync_todo::{Task, TodoList};
use tracing::info;

use super::load_events;

/// Run the apply command.
pub async fn run(path: &Path) -> Result<()> {
    let events = load_events(path).await?;
    info!(count = events.len(), file = %path.display(), "Applying events");

    let mut list = TodoList::new(());
    list.apply_sorted(events)
        .context("Event file does not apply to an empty list")?;

    print!("{}", render(list.tasks()));
    Ok(())
}

/// One line per task, in list order.
fn render<'a>(tasks: impl Iterator<Item = &'a Task>) -> String {
    let mut out = String::new();
    for task in tasks {
        let mark = if task.completed() { 'x' } else { ' ' };
        let _ = writeln!(
            out,
            "[{}] {} ({}) {}",
            mark,
            task.title(),
            task.label(),
            task.identifier()
        );
    }
    out
}
