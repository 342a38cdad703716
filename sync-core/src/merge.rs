//! Coalescing of pending events.
//!
//! When a new event is created while earlier events for the same task are
//! still waiting to be published, there is no point sending all of them.
//! [`merge`] folds them into the new event so the queue holds at most one
//! event per task per publish cycle.

use tasksync_types::{Event, EventType};

/// Merge `new_event` into `pending`, returning the queue that replaces it.
///
/// `pending` is walked in causal order from most recent to least recent.
/// For each prior event on the same task:
/// - a new Delete drops it;
/// - a new Update absorbs a prior Insert or Update: every field the new
///   event leaves unset is taken from the most recent prior value. If an
///   Insert is absorbed the result is an Insert, since the authority has
///   not seen the task yet;
/// - anything else is kept.
///
/// Events for other tasks are kept unchanged and in causal order. The
/// (possibly folded) new event is appended last.
pub fn merge(new_event: Event, pending: &[Event]) -> Vec<Event> {
    let mut ordered: Vec<&Event> = pending.iter().collect();
    ordered.sort_by_key(|e| e.causal_key());

    let target = new_event.identifier();
    let mut folded = Folded::start(&new_event);
    let mut kept = Vec::with_capacity(ordered.len() + 1);

    for prior in ordered.into_iter().rev() {
        if prior.identifier() != target {
            kept.push(prior.clone());
            continue;
        }
        match (new_event.event_type(), prior.event_type()) {
            (EventType::Delete, _) => {}
            (EventType::Update, EventType::Insert | EventType::Update) => folded.absorb(prior),
            _ => kept.push(prior.clone()),
        }
    }

    kept.reverse();
    kept.push(folded.into_event(new_event));
    kept
}

/// Payload accumulated while folding prior events into a new one.
struct Folded {
    completed: Option<bool>,
    title: Option<String>,
    label: Option<u8>,
    absorbed_insert: bool,
}

impl Folded {
    fn start(event: &Event) -> Self {
        Self {
            completed: event.completed(),
            title: event.title().map(str::to_owned),
            label: event.label(),
            absorbed_insert: false,
        }
    }

    fn absorb(&mut self, prior: &Event) {
        if self.completed.is_none() {
            self.completed = prior.completed();
        }
        if self.title.is_none() {
            self.title = prior.title().map(str::to_owned);
        }
        if self.label.is_none() {
            self.label = prior.label();
        }
        if prior.event_type() == EventType::Insert {
            self.absorbed_insert = true;
        }
    }

    fn into_event(self, original: Event) -> Event {
        if original.event_type() != EventType::Update {
            return original;
        }
        let id = original.identifier();
        let pointer = original.pointer();
        match (self.absorbed_insert, self.completed, self.title, self.label) {
            (true, Some(completed), Some(title), Some(label)) => {
                Event::insert(id, pointer, completed, title, label)
            }
            (_, completed, title, label) => Event::update(id, pointer, completed, title, label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_types::{Seq, SeqPointer, TaskId};

    fn ptr(preceding: u64, client: u64) -> SeqPointer {
        SeqPointer::new(Seq::new(preceding), client)
    }

    #[test]
    fn merge_into_empty_queue_appends() {
        let event = Event::insert(TaskId::new(), ptr(0, 0), false, "Buy milk", 0);
        let queue = merge(event.clone(), &[]);
        assert_eq!(queue, vec![event]);
    }

    #[test]
    fn empty_update_over_insert_yields_the_insert() {
        let id = TaskId::new();
        let insert = Event::insert(id, ptr(0, 0), false, "Buy milk", 6);
        let update = Event::update(id, ptr(0, 1), None, None, None);

        let queue = merge(update, &[insert.clone()]);

        assert_eq!(queue.len(), 1);
        let merged = &queue[0];
        assert_eq!(merged.event_type(), EventType::Insert);
        assert_eq!(merged.identifier(), id);
        assert_eq!(merged.completed(), insert.completed());
        assert_eq!(merged.title(), insert.title());
        assert_eq!(merged.label(), insert.label());
        assert_eq!(merged.pointer(), ptr(0, 1));
    }

    #[test]
    fn update_over_insert_keeps_new_values() {
        let id = TaskId::new();
        let insert = Event::insert(id, ptr(0, 0), false, "Buy milk", 6);
        let update = Event::update(id, ptr(0, 1), Some(true), None, None);

        let queue = merge(update, &[insert]);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].completed(), Some(true));
        assert_eq!(queue[0].title(), Some("Buy milk"));
        assert_eq!(queue[0].label(), Some(6));
    }

    #[test]
    fn delete_absorbs_every_prior_event_for_target() {
        let id = TaskId::new();
        let other = TaskId::new();
        let pending = vec![
            Event::insert(id, ptr(0, 0), false, "Buy milk", 0),
            Event::insert(other, ptr(0, 1), false, "Get beer", 2),
            Event::update(id, ptr(0, 2), Some(true), None, None),
        ];
        let delete = Event::delete(id, ptr(0, 3));

        let queue = merge(delete.clone(), &pending);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0], pending[1]);
        assert_eq!(queue[1], delete);
        assert_eq!(
            queue.iter().filter(|e| e.identifier() == id).count(),
            1,
            "only the delete remains for the target"
        );
    }

    #[test]
    fn most_recent_pending_value_wins_when_new_event_is_silent() {
        let id = TaskId::new();
        let pending = vec![
            Event::update(id, ptr(0, 0), None, Some("old title".into()), Some(1)),
            Event::update(id, ptr(0, 1), None, Some("new title".into()), None),
        ];
        let update = Event::update(id, ptr(0, 2), Some(true), None, None);

        let queue = merge(update, &pending);

        assert_eq!(queue.len(), 1);
        let merged = &queue[0];
        assert_eq!(merged.event_type(), EventType::Update);
        assert_eq!(merged.title(), Some("new title"));
        assert_eq!(merged.label(), Some(1));
        assert_eq!(merged.completed(), Some(true));
    }

    #[test]
    fn recency_follows_causal_order_not_queue_position() {
        let id = TaskId::new();
        // Stored out of causal order on purpose.
        let pending = vec![
            Event::update(id, ptr(1, 0), None, Some("newer".into()), None),
            Event::update(id, ptr(0, 5), None, Some("older".into()), None),
        ];
        let queue = merge(Event::update(id, ptr(1, 1), None, None, None), &pending);
        assert_eq!(queue[0].title(), Some("newer"));
    }

    #[test]
    fn other_targets_are_kept_in_causal_order() {
        let a = TaskId::new();
        let b = TaskId::new();
        let pending = vec![
            Event::insert(b, ptr(0, 1), false, "B", 0),
            Event::insert(a, ptr(0, 0), false, "A", 0),
        ];
        let new_event = Event::insert(TaskId::new(), ptr(0, 2), false, "C", 0);

        let queue = merge(new_event.clone(), &pending);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue[0].identifier(), a);
        assert_eq!(queue[1].identifier(), b);
        assert_eq!(queue[2], new_event);
    }

    #[test]
    fn update_does_not_absorb_prior_delete() {
        let id = TaskId::new();
        let delete = Event::delete(id, ptr(0, 0));
        let update = Event::update(id, ptr(0, 1), Some(true), None, None);

        let queue = merge(update.clone(), &[delete.clone()]);

        assert_eq!(queue, vec![delete, update]);
    }

    #[test]
    fn insert_does_not_absorb_anything() {
        let id = TaskId::new();
        let update = Event::update(id, ptr(0, 0), Some(true), None, None);
        let insert = Event::insert(id, ptr(0, 1), false, "again", 0);

        let queue = merge(insert.clone(), &[update.clone()]);

        assert_eq!(queue, vec![update, insert]);
    }
}
