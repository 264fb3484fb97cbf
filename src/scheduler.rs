/// The future event list.
///
/// A `BinaryHeap` of `Reverse<Event>` acts as a min-heap keyed by
/// `(time, serial)`. Serials are stamped here, at enqueue, so the order in
/// which the kernel drains outbound buffers fixes the order of same-time
/// deliveries. Two runs issuing the same sequence of sends produce the same
/// dispatch order.
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::event::{Event, Serial, SerialGen};

/// Deterministic priority queue of pending events.
///
/// Owns the serial generator: every event that enters the queue goes
/// through [`FutureQueue::push`].
#[derive(Debug, Clone, Default)]
pub struct FutureQueue {
    queue: BinaryHeap<Reverse<Event>>,
    serials: SerialGen,
}

impl FutureQueue {
    pub fn new() -> Self {
        FutureQueue {
            queue: BinaryHeap::new(),
            serials: SerialGen::new(),
        }
    }

    /// Stamp `event` with the next serial and enqueue it.
    pub fn push(&mut self, mut event: Event) -> Serial {
        let serial = self.serials.next_serial();
        event.assign_serial(serial);
        tracing::trace!(%event, "enqueued");
        self.queue.push(Reverse(event));
        serial
    }

    /// Pop the earliest event (lowest time, then lowest serial).
    pub fn pop_next(&mut self) -> Option<Event> {
        self.queue.pop().map(|Reverse(e)| e)
    }

    pub fn peek_next(&self) -> Option<&Event> {
        self.queue.peek().map(|Reverse(e)| e)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// The serial the next enqueued event will receive.
    pub fn next_serial(&self) -> Serial {
        self.serials.peek()
    }

    /// Drain all events in delivery order.
    pub fn drain_ordered(&mut self) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.queue.len());
        while let Some(e) = self.pop_next() {
            events.push(e);
        }
        events
    }
}
