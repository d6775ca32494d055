//! Bounded event queues.
//!
//! A queue bound to an active object keeps that object's ready bit in step
//! with its contents: the bit is set by every successful put and cleared by
//! the get that empties the queue. An unbound queue (used for deferral)
//! never touches readiness.

use std::collections::VecDeque;

use rkh_core::{require, Event, Priority, ReadyGroup};
use rkh_trc::{TraceRecord, Tracer};

/// Usage counters of one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueInfo {
    pub puts: u32,
    pub gets: u32,
    pub reads: u32,
    /// Gets attempted on an empty queue.
    pub empty: u32,
    /// Puts attempted on a full queue.
    pub full: u32,
}

/// Fixed-capacity queue of events.
pub struct EventQueue {
    items: VecDeque<Event>,
    capacity: usize,
    owner: Option<Priority>,
    min_free: usize,
    info: QueueInfo,
    tracer: Tracer,
}

impl EventQueue {
    /// Queue feeding the active object at `owner`.
    pub fn bound(capacity: usize, owner: Priority, tracer: Tracer) -> Self {
        Self::new(capacity, Some(owner), tracer)
    }

    /// Queue that holds events aside, typically for deferral.
    pub fn unbound(capacity: usize) -> Self {
        Self::new(capacity, None, Tracer::disabled())
    }

    fn new(capacity: usize, owner: Option<Priority>, tracer: Tracer) -> Self {
        require!(capacity > 0, "event queue needs at least one slot");
        tracer.emit(TraceRecord::QueueInit {
            owner: owner.map(Priority::raw),
            capacity: capacity as u16,
        });
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            owner,
            min_free: capacity,
            info: QueueInfo::default(),
            tracer,
        }
    }

    /// Active object this queue feeds, if any.
    pub fn owner(&self) -> Option<Priority> {
        self.owner
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Fewest free slots ever observed.
    pub fn low_watermark(&self) -> usize {
        self.min_free
    }

    pub fn info(&self) -> QueueInfo {
        self.info
    }

    /// Appends `event`. A full queue is fatal.
    pub fn put_fifo(&mut self, event: Event, ready: &mut ReadyGroup) {
        self.check_room();
        self.items.push_back(event);
        self.after_put(ready);
        self.tracer.emit(TraceRecord::QueueFifo {
            owner: self.owner.map(Priority::raw),
            len: self.items.len() as u16,
            min_free: self.min_free as u16,
        });
    }

    /// Prepends `event` so it is the next one out. A full queue is fatal.
    pub fn put_lifo(&mut self, event: Event, ready: &mut ReadyGroup) {
        self.check_room();
        self.items.push_front(event);
        self.after_put(ready);
        self.tracer.emit(TraceRecord::QueueLifo {
            owner: self.owner.map(Priority::raw),
            len: self.items.len() as u16,
            min_free: self.min_free as u16,
        });
    }

    /// Removes the front event.
    pub fn get(&mut self, ready: &mut ReadyGroup) -> Option<Event> {
        let Some(event) = self.items.pop_front() else {
            self.info.empty += 1;
            return None;
        };
        self.info.gets += 1;
        if self.items.is_empty() {
            if let Some(owner) = self.owner {
                ready.set_unready(owner);
            }
        }
        self.tracer.emit(TraceRecord::QueueGet {
            owner: self.owner.map(Priority::raw),
            len: self.items.len() as u16,
        });
        Some(event)
    }

    /// Front event, left in place.
    pub fn read(&mut self) -> Option<&Event> {
        self.info.reads += 1;
        self.items.front()
    }

    /// Empties the queue and hands the removed events back to the caller,
    /// who is responsible for collecting them.
    pub fn deplete(&mut self, ready: &mut ReadyGroup) -> Vec<Event> {
        let removed: Vec<Event> = self.items.drain(..).collect();
        if let Some(owner) = self.owner {
            ready.set_unready(owner);
        }
        self.tracer.emit(TraceRecord::QueueDeplete {
            owner: self.owner.map(Priority::raw),
            removed: removed.len() as u16,
        });
        removed
    }

    fn check_room(&mut self) {
        if self.is_full() {
            self.info.full += 1;
            self.tracer.emit(TraceRecord::QueueFull {
                owner: self.owner.map(Priority::raw),
            });
            log::error!(
                "queue of {:?} full at {} events",
                self.owner,
                self.capacity
            );
        }
        require!(!self.is_full(), "event queue full");
    }

    fn after_put(&mut self, ready: &mut ReadyGroup) {
        self.info.puts += 1;
        self.min_free = self.min_free.min(self.capacity - self.items.len());
        if let Some(owner) = self.owner {
            ready.set_ready(owner);
        }
    }
}

impl core::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventQueue")
            .field("owner", &self.owner)
            .field("len", &self.items.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rkh_core::{Signal, StaticEvent};

    use super::*;

    static PING: StaticEvent = StaticEvent::new(Signal(9));

    fn sig(n: u16) -> Event {
        Event::Signal(Signal(n as rkh_core::SignalRaw))
    }

    #[test]
    fn fifo_and_lifo_order() {
        let mut ready = ReadyGroup::new();
        let mut q = EventQueue::unbound(4);
        q.put_fifo(sig(1), &mut ready);
        q.put_fifo(sig(2), &mut ready);
        q.put_lifo(sig(3), &mut ready);
        q.put_fifo(Event::Static(&PING), &mut ready);

        let order: Vec<_> = std::iter::from_fn(|| q.get(&mut ready))
            .map(|e| e.signal().raw())
            .collect();
        assert_eq!(order, [3, 1, 2, 9]);
        assert!(ready.is_empty());
    }

    #[test]
    fn bound_queue_tracks_readiness() {
        let prio = Priority::new(5);
        let mut ready = ReadyGroup::new();
        let mut q = EventQueue::bound(2, prio, Tracer::disabled());

        q.put_fifo(sig(1), &mut ready);
        assert!(ready.contains(prio));
        q.put_fifo(sig(2), &mut ready);

        q.get(&mut ready);
        assert!(ready.contains(prio));
        q.get(&mut ready);
        assert!(!ready.contains(prio));
        assert!(q.get(&mut ready).is_none());
        assert_eq!(q.info().empty, 1);
    }

    #[test]
    #[should_panic(expected = "event queue full")]
    fn put_on_full_queue_is_fatal() {
        let mut ready = ReadyGroup::new();
        let mut q = EventQueue::unbound(1);
        q.put_fifo(sig(1), &mut ready);
        q.put_lifo(sig(2), &mut ready);
    }

    #[test]
    fn watermark_and_counters() {
        let mut ready = ReadyGroup::new();
        let mut q = EventQueue::unbound(3);
        assert_eq!(q.low_watermark(), 3);

        q.put_fifo(sig(1), &mut ready);
        q.put_fifo(sig(2), &mut ready);
        assert_eq!(q.low_watermark(), 1);
        assert_eq!(q.read().map(Event::signal), Some(Signal(1)));
        q.get(&mut ready);
        q.get(&mut ready);
        assert_eq!(q.low_watermark(), 1);

        let info = q.info();
        assert_eq!((info.puts, info.gets, info.reads), (2, 2, 1));
        assert!(q.is_empty());
        assert!(!q.is_full());
        assert_eq!(q.capacity(), 3);
    }

    #[test]
    fn deplete_returns_items_and_clears_readiness() {
        let prio = Priority::new(2);
        let mut ready = ReadyGroup::new();
        let mut q = EventQueue::bound(3, prio, Tracer::disabled());
        q.put_fifo(sig(1), &mut ready);
        q.put_fifo(sig(2), &mut ready);

        let removed = q.deplete(&mut ready);
        assert_eq!(removed.len(), 2);
        assert!(q.is_empty());
        assert!(ready.is_empty());
    }
}
