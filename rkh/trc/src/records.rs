//! Trace groups and event identifiers.
//!
//! An identifier packs its group in the high nibble and the event number
//! within the group in the low nibble, so every group holds up to sixteen
//! events and the per-event filter table is a flat bitmap.

use core::fmt;

/// Subsystem a record originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TraceGroup {
    /// Memory pools and dynamic events.
    Mp = 0,
    /// Event queues.
    Que = 1,
    /// Active objects.
    Sma = 2,
    /// State machine engine.
    Sm = 3,
    /// Software timers.
    Tmr = 4,
    /// Framework services.
    Fwk = 5,
    /// Application records.
    Usr = 6,
}

impl TraceGroup {
    pub const ALL: [TraceGroup; 7] = [
        TraceGroup::Mp,
        TraceGroup::Que,
        TraceGroup::Sma,
        TraceGroup::Sm,
        TraceGroup::Tmr,
        TraceGroup::Fwk,
        TraceGroup::Usr,
    ];

    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Events per group.
pub const EVENTS_PER_GROUP: u8 = 16;

/// Packed `(group, event)` identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceEventId(u8);

impl TraceEventId {
    pub const fn new(group: TraceGroup, event: u8) -> Self {
        TraceEventId(((group as u8) << 4) | (event & 0x0f))
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn group(self) -> TraceGroup {
        match self.0 >> 4 {
            0 => TraceGroup::Mp,
            1 => TraceGroup::Que,
            2 => TraceGroup::Sma,
            3 => TraceGroup::Sm,
            4 => TraceGroup::Tmr,
            5 => TraceGroup::Fwk,
            _ => TraceGroup::Usr,
        }
    }

    pub const fn event(self) -> u8 {
        self.0 & 0x0f
    }
}

impl fmt::Debug for TraceEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.group(), self.event())
    }
}

pub mod mp {
    use super::{TraceEventId, TraceGroup::Mp};

    pub const INIT: TraceEventId = TraceEventId::new(Mp, 0);
    pub const GET: TraceEventId = TraceEventId::new(Mp, 1);
    pub const PUT: TraceEventId = TraceEventId::new(Mp, 2);
}

pub mod que {
    use super::{TraceEventId, TraceGroup::Que};

    pub const INIT: TraceEventId = TraceEventId::new(Que, 0);
    pub const GET: TraceEventId = TraceEventId::new(Que, 1);
    pub const FIFO: TraceEventId = TraceEventId::new(Que, 2);
    pub const LIFO: TraceEventId = TraceEventId::new(Que, 3);
    pub const FULL: TraceEventId = TraceEventId::new(Que, 4);
    pub const DEPLETE: TraceEventId = TraceEventId::new(Que, 5);
}

pub mod sma {
    use super::{TraceEventId, TraceGroup::Sma};

    pub const ACTIVATE: TraceEventId = TraceEventId::new(Sma, 0);
    pub const TERMINATE: TraceEventId = TraceEventId::new(Sma, 1);
    pub const GET_EVENT: TraceEventId = TraceEventId::new(Sma, 2);
    pub const FIFO: TraceEventId = TraceEventId::new(Sma, 3);
    pub const LIFO: TraceEventId = TraceEventId::new(Sma, 4);
    pub const DEFER: TraceEventId = TraceEventId::new(Sma, 5);
    pub const RECALL: TraceEventId = TraceEventId::new(Sma, 6);
}

pub mod sm {
    use super::{TraceEventId, TraceGroup::Sm};

    pub const INIT: TraceEventId = TraceEventId::new(Sm, 0);
    pub const CLEAR_HISTORY: TraceEventId = TraceEventId::new(Sm, 1);
    pub const DISPATCH: TraceEventId = TraceEventId::new(Sm, 2);
    pub const TRANSITION: TraceEventId = TraceEventId::new(Sm, 3);
    pub const STATE: TraceEventId = TraceEventId::new(Sm, 4);
    pub const ENTER_STATE: TraceEventId = TraceEventId::new(Sm, 5);
    pub const EXIT_STATE: TraceEventId = TraceEventId::new(Sm, 6);
    pub const ENTRY_EXIT_COUNT: TraceEventId = TraceEventId::new(Sm, 7);
    pub const SEGMENTS: TraceEventId = TraceEventId::new(Sm, 8);
    pub const GUARD_FALSE: TraceEventId = TraceEventId::new(Sm, 9);
    pub const EVENT_NOT_FOUND: TraceEventId = TraceEventId::new(Sm, 10);
    pub const CONDITION_NOT_FOUND: TraceEventId = TraceEventId::new(Sm, 11);
    pub const UNKNOWN_STATE: TraceEventId = TraceEventId::new(Sm, 12);
    pub const EXCEEDED_DEPTH: TraceEventId = TraceEventId::new(Sm, 13);
    pub const EXCEEDED_SEGMENTS: TraceEventId = TraceEventId::new(Sm, 14);
}

pub mod tmr {
    use super::{TraceEventId, TraceGroup::Tmr};

    pub const INIT: TraceEventId = TraceEventId::new(Tmr, 0);
    pub const START: TraceEventId = TraceEventId::new(Tmr, 1);
    pub const STOP: TraceEventId = TraceEventId::new(Tmr, 2);
    pub const TIMEOUT: TraceEventId = TraceEventId::new(Tmr, 3);
    pub const REMOVE: TraceEventId = TraceEventId::new(Tmr, 4);
}

pub mod fwk {
    use super::{TraceEventId, TraceGroup::Fwk};

    pub const ENTER: TraceEventId = TraceEventId::new(Fwk, 0);
    pub const IDLE: TraceEventId = TraceEventId::new(Fwk, 1);
    pub const ALLOC: TraceEventId = TraceEventId::new(Fwk, 2);
    pub const GC: TraceEventId = TraceEventId::new(Fwk, 3);
    pub const GC_RELEASE: TraceEventId = TraceEventId::new(Fwk, 4);
    pub const SUBSCRIBE: TraceEventId = TraceEventId::new(Fwk, 5);
    pub const UNSUBSCRIBE: TraceEventId = TraceEventId::new(Fwk, 6);
    pub const PUBLISH: TraceEventId = TraceEventId::new(Fwk, 7);
}

pub mod usr {
    use super::{TraceEventId, TraceGroup::Usr};

    pub const USER: TraceEventId = TraceEventId::new(Usr, 0);
}
