//! The task list and its event application.
//!
//! User actions go through [`TodoList::create`], [`TodoList::update`] and
//! [`TodoList::remove`]: each takes a pointer from the receiver, builds the
//! event, applies it locally and then hands it to the receiver for
//! publication. Events from the authority arrive through
//! [`ModelReconciler::apply`].

use std::collections::HashMap;

use tasksync_core::{ApplyError, ModelReconciler, OutboundEventReceiver};
use tasksync_types::{sort_causal, Event, EventType, TaskId};
use tracing::debug;

use crate::task::{ColorLabel, Task};

/// Tasks in insertion order.
#[derive(Debug)]
pub struct TodoList<R> {
    receiver: R,
    order: Vec<TaskId>,
    tasks: HashMap<TaskId, Task>,
}

impl<R> TodoList<R> {
    /// Create an empty list reporting to `receiver`.
    pub fn new(receiver: R) -> Self {
        Self {
            receiver,
            order: Vec::new(),
            tasks: HashMap::new(),
        }
    }

    /// The receiver new events are reported to.
    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    /// Tasks in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    /// Look up a task.
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sort `events` causally, then apply them.
    pub fn apply_sorted(&mut self, mut events: Vec<Event>) -> Result<(), ApplyError> {
        sort_causal(&mut events);
        self.apply(&events)
    }

    fn apply_one(&mut self, event: &Event) -> Result<(), ApplyError> {
        let id = event.identifier();
        match event.event_type() {
            EventType::Insert => {
                if self.tasks.contains_key(&id) {
                    return Err(ApplyError::AlreadyExists(id));
                }
                let task = Task::new(
                    id,
                    event.completed().unwrap_or(false),
                    event.title().unwrap_or_default(),
                    ColorLabel::from(event.label().unwrap_or(0)),
                );
                self.tasks.insert(id, task);
                self.order.push(id);
            }
            EventType::Update => {
                let task = self.tasks.get_mut(&id).ok_or(ApplyError::NotFound(id))?;
                task.update(
                    event.completed(),
                    event.title().map(str::to_owned),
                    event.label().map(ColorLabel::from),
                );
            }
            EventType::Delete => {
                self.tasks.remove(&id).ok_or(ApplyError::NotFound(id))?;
                self.order.retain(|existing| *existing != id);
            }
        }
        Ok(())
    }
}

impl<R: OutboundEventReceiver> TodoList<R> {
    /// Create a task at the end of the list.
    pub fn create(&mut self, title: impl Into<String>, label: ColorLabel) -> Result<TaskId, ApplyError> {
        let id = TaskId::new();
        let pointer = self.receiver.issue_pointer();
        self.submit(Event::insert(id, pointer, false, title, label.into()))?;
        Ok(id)
    }

    /// Update the present fields of an existing task.
    pub fn update(
        &mut self,
        id: TaskId,
        completed: Option<bool>,
        title: Option<String>,
        label: Option<ColorLabel>,
    ) -> Result<(), ApplyError> {
        if !self.tasks.contains_key(&id) {
            return Err(ApplyError::NotFound(id));
        }
        let pointer = self.receiver.issue_pointer();
        self.submit(Event::update(id, pointer, completed, title, label.map(u8::from)))
    }

    /// Remove an existing task.
    pub fn remove(&mut self, id: TaskId) -> Result<(), ApplyError> {
        if !self.tasks.contains_key(&id) {
            return Err(ApplyError::NotFound(id));
        }
        let pointer = self.receiver.issue_pointer();
        self.submit(Event::delete(id, pointer))
    }

    /// Apply locally, then report.
    fn submit(&mut self, event: Event) -> Result<(), ApplyError> {
        self.apply_one(&event)?;
        self.receiver.on_event_created(event);
        Ok(())
    }
}

impl<R> ModelReconciler for TodoList<R> {
    fn apply(&mut self, events: &[Event]) -> Result<(), ApplyError> {
        for event in events {
            if let Err(e) = self.apply_one(event) {
                debug!(error = %e, pointer = ?event.pointer(), "Apply stopped");
                return Err(e);
            }
        }
        Ok(())
    }
}
