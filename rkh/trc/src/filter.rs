//! Runtime trace filters.
//!
//! A record is suppressed when its group is filtered *and* its own event bit
//! is set, or when the active object or signal it concerns is filtered.
//! Everything passes by default.

use rkh_core::config::{MAX_ACTIVE, MAX_TRACE_SIGNALS};
use rkh_core::Signal;

use crate::record::TraceRecord;
use crate::records::{TraceEventId, TraceGroup, EVENTS_PER_GROUP};

const EVENT_BYTES: usize = 128 / 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFilter {
    groups: u8,
    events: [u8; EVENT_BYTES],
    actives: [u8; MAX_ACTIVE / 8],
    signals: [u8; MAX_TRACE_SIGNALS / 8],
}

impl Default for TraceFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceFilter {
    pub const fn new() -> Self {
        Self {
            groups: 0,
            events: [0; EVENT_BYTES],
            actives: [0; MAX_ACTIVE / 8],
            signals: [0; MAX_TRACE_SIGNALS / 8],
        }
    }

    /// Filters (`off = true`) or releases a whole group. With `propagate`,
    /// every event bit in the group follows.
    pub fn filter_group(&mut self, group: TraceGroup, off: bool, propagate: bool) {
        if off {
            self.groups |= group.bit();
        } else {
            self.groups &= !group.bit();
        }
        if propagate {
            for event in 0..EVENTS_PER_GROUP {
                set_bit(&mut self.events, TraceEventId::new(group, event).raw() as usize, off);
            }
        }
    }

    /// Filters or releases one event. Filtering an event arms its group;
    /// releasing the last filtered event of a group disarms it.
    pub fn filter_event(&mut self, id: TraceEventId, off: bool) {
        set_bit(&mut self.events, id.raw() as usize, off);
        let group = id.group();
        if off {
            self.groups |= group.bit();
        } else if !self.group_has_filtered_events(group) {
            self.groups &= !group.bit();
        }
    }

    pub fn filter_all_events(&mut self, off: bool) {
        for group in TraceGroup::ALL {
            self.filter_group(group, off, true);
        }
    }

    pub fn filter_active(&mut self, ao: u8, off: bool) {
        if (ao as usize) < MAX_ACTIVE {
            set_bit(&mut self.actives, ao as usize, off);
        }
    }

    pub fn filter_signal(&mut self, signal: Signal, off: bool) {
        if signal.index() < MAX_TRACE_SIGNALS {
            set_bit(&mut self.signals, signal.index(), off);
        }
    }

    pub fn is_group_off(&self, group: TraceGroup) -> bool {
        self.groups & group.bit() != 0
    }

    pub fn is_event_off(&self, id: TraceEventId) -> bool {
        self.is_group_off(id.group()) && get_bit(&self.events, id.raw() as usize)
    }

    pub fn is_active_off(&self, ao: u8) -> bool {
        (ao as usize) < MAX_ACTIVE && get_bit(&self.actives, ao as usize)
    }

    pub fn is_signal_off(&self, signal: Signal) -> bool {
        signal.index() < MAX_TRACE_SIGNALS && get_bit(&self.signals, signal.index())
    }

    /// Whether `record` passes every filter.
    pub fn allows(&self, record: &TraceRecord) -> bool {
        !self.is_event_off(record.id())
            && !record.ao().is_some_and(|ao| self.is_active_off(ao))
            && !record.signal().is_some_and(|sig| self.is_signal_off(sig))
    }

    fn group_has_filtered_events(&self, group: TraceGroup) -> bool {
        (0..EVENTS_PER_GROUP)
            .any(|event| get_bit(&self.events, TraceEventId::new(group, event).raw() as usize))
    }
}

fn set_bit(table: &mut [u8], index: usize, on: bool) {
    let mask = 1 << (index & 7);
    if on {
        table[index >> 3] |= mask;
    } else {
        table[index >> 3] &= !mask;
    }
}

fn get_bit(table: &[u8], index: usize) -> bool {
    table[index >> 3] & (1 << (index & 7)) != 0
}
