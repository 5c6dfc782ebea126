use super::types::{Event, EventKind};

pub const DEFAULT_STALE_PASSES: u32 = 8;

/// Frame-scoped event buffer. Producers append, the frame loop offers every
/// event to every subsystem, then `sweep` drops what was handled.
pub struct EventQueue {
    events: Vec<Event>,
    stale_after: u32,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_PASSES)
    }
}

impl EventQueue {
    pub fn new(stale_after: u32) -> Self {
        Self {
            events: Vec::new(),
            stale_after: stale_after.max(1),
        }
    }

    pub fn push(&mut self, kind: EventKind, timestamp: f32) {
        self.events.push(Event::new(kind, timestamp));
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Offers every queued event, in arrival order, to `visit`.
    ///
    /// Each call counts as one dispatch pass for every event in the queue.
    pub fn dispatch_pass<F>(&mut self, mut visit: F)
    where
        F: FnMut(&mut Event),
    {
        for event in &mut self.events {
            visit(event);
            event.record_pass();
        }
    }

    /// Removes handled events, and unhandled ones that nobody claimed for
    /// `stale_after` passes. Returns how many were removed.
    pub fn sweep(&mut self) -> usize {
        let before = self.events.len();
        let stale_after = self.stale_after;

        self.events.retain(|e| {
            if e.is_handled() {
                return false;
            }
            if e.passes() >= stale_after {
                log::debug!(
                    "Dropping unhandled {:?} after {} passes",
                    e.kind(),
                    e.passes()
                );
                return false;
            }
            true
        });

        before - self.events.len()
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.events.iter().any(|e| e.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::dispatch;

    #[test]
    fn push_keeps_arrival_order() {
        let mut queue = EventQueue::default();
        queue.push(EventKind::Jump, 0.0);
        queue.push(EventKind::MoveLeft, 0.1);
        queue.push(EventKind::WindowClose, 0.2);

        let kinds: Vec<_> = queue.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Jump, EventKind::MoveLeft, EventKind::WindowClose]
        );
    }

    #[test]
    fn sweep_removes_adjacent_handled_events() {
        let mut queue = EventQueue::default();
        queue.push(EventKind::Jump, 0.0);
        queue.push(EventKind::Jump, 0.0);
        queue.push(EventKind::MoveLeft, 0.0);
        queue.push(EventKind::Jump, 0.0);

        queue.dispatch_pass(|e| {
            dispatch(e, EventKind::Jump, || {});
        });

        assert_eq!(queue.sweep(), 3);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get(0).map(|e| e.kind()), Some(EventKind::MoveLeft));
    }

    #[test]
    fn unmatched_event_survives_sweep() {
        let mut queue = EventQueue::default();
        queue.push(EventKind::MoveForward, 0.0);

        queue.dispatch_pass(|e| {
            dispatch(e, EventKind::Jump, || {});
        });
        queue.sweep();

        assert_eq!(queue.len(), 1);
        assert!(!queue.get(0).unwrap().is_handled());
    }

    #[test]
    fn handled_event_is_never_delivered_twice() {
        let mut queue = EventQueue::default();
        queue.push(EventKind::Jump, 0.0);

        let mut deliveries = 0;
        for _ in 0..3 {
            queue.dispatch_pass(|e| {
                dispatch(e, EventKind::Jump, || deliveries += 1);
            });
            queue.sweep();
        }

        assert_eq!(deliveries, 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn every_visitor_sees_every_event_in_one_pass() {
        let mut queue = EventQueue::default();
        queue.push(EventKind::PlayerFinish, 0.0);
        queue.push(EventKind::Jump, 0.0);

        let mut first = Vec::new();
        let mut second = Vec::new();
        queue.dispatch_pass(|e| {
            first.push(e.kind());
            dispatch(e, EventKind::PlayerFinish, || {});
            second.push(e.kind());
        });

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn stale_events_are_dropped() {
        let mut queue = EventQueue::new(2);
        queue.push(EventKind::NetworkPeerReceive, 0.0);

        queue.dispatch_pass(|_| {});
        queue.sweep();
        assert_eq!(queue.len(), 1);

        queue.dispatch_pass(|_| {});
        queue.sweep();
        assert!(queue.is_empty());
    }
}
