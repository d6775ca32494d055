//! Event handles.
//!
//! An [`Event`] is what queues carry and what the state-machine engine
//! dispatches. Three shapes exist: a bare signal, a statically declared
//! immutable event, and a handle to a pool-allocated, reference-counted
//! block. Dynamic handles are neither `Clone` nor `Copy`; sharing one goes
//! through the pool's `reference`, releasing one through its `gc`, so a
//! handle cannot outlive the block it names.

use crate::signal::Signal;

/// Immutable event declared once and never freed.
#[derive(Debug, PartialEq, Eq)]
pub struct StaticEvent {
    signal: Signal,
    payload: &'static [u8],
}

impl StaticEvent {
    pub const fn new(signal: Signal) -> Self {
        Self { signal, payload: &[] }
    }

    pub const fn with_payload(signal: Signal, payload: &'static [u8]) -> Self {
        Self { signal, payload }
    }

    pub const fn signal(&self) -> Signal {
        self.signal
    }

    pub const fn payload(&self) -> &'static [u8] {
        self.payload
    }
}

/// Handle to a block owned by an event pool.
///
/// Holds one use-count on the block. Dropping a handle without handing it
/// back to the pool leaks the block; this is logged.
#[derive(Debug, PartialEq, Eq)]
pub struct DynEvent {
    signal: Signal,
    pool: u8,
    block: u16,
}

impl DynEvent {
    /// Mints a handle. Only the pool allocator should call this, and only
    /// after accounting for the use-count the handle carries.
    #[doc(hidden)]
    pub fn from_parts(signal: Signal, pool: u8, block: u16) -> Self {
        Self {
            signal,
            pool,
            block,
        }
    }

    /// Consumes the handle without running the leak diagnostic.
    #[doc(hidden)]
    pub fn into_parts(self) -> (Signal, u8, u16) {
        let parts = (self.signal, self.pool, self.block);
        core::mem::forget(self);
        parts
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    /// Index of the owning pool.
    pub fn pool(&self) -> u8 {
        self.pool
    }

    /// Block index within the owning pool.
    pub fn block(&self) -> u16 {
        self.block
    }
}

impl Drop for DynEvent {
    fn drop(&mut self) {
        log::warn!(
            "dynamic event {} (pool {}, block {}) dropped without garbage collection",
            self.signal,
            self.pool,
            self.block
        );
    }
}

/// Event as carried by queues and seen by state machines.
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
    /// Payload-less event holding only its signal.
    Signal(Signal),
    /// Reference to a static immutable event.
    Static(&'static StaticEvent),
    /// Pool-allocated, reference-counted event.
    Dynamic(DynEvent),
}

impl Event {
    pub fn signal(&self) -> Signal {
        match self {
            Event::Signal(sig) => *sig,
            Event::Static(evt) => evt.signal(),
            Event::Dynamic(evt) => evt.signal(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Event::Dynamic(_))
    }

    /// Payload of a static event; dynamic payloads live in their pool.
    pub fn static_payload(&self) -> Option<&'static [u8]> {
        match self {
            Event::Static(evt) => Some(evt.payload()),
            _ => None,
        }
    }

    pub fn as_dynamic(&self) -> Option<&DynEvent> {
        match self {
            Event::Dynamic(evt) => Some(evt),
            _ => None,
        }
    }
}

impl From<Signal> for Event {
    fn from(sig: Signal) -> Self {
        Event::Signal(sig)
    }
}

impl From<&'static StaticEvent> for Event {
    fn from(evt: &'static StaticEvent) -> Self {
        Event::Static(evt)
    }
}

impl From<DynEvent> for Event {
    fn from(evt: DynEvent) -> Self {
        Event::Dynamic(evt)
    }
}
