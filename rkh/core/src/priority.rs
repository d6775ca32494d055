//! Active-object priorities and the ready bitmap.
//!
//! Lower numbers are more urgent: priority 0 always wins a scheduling
//! decision. The bitmap splits priorities into groups of eight, one summary
//! bit per group plus a presence byte, so every operation is O(1).

use core::fmt;

use crate::config::{MAX_ACTIVE, READY_GROUPS};

/// Scheduling priority of an active object. Unique per active object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Priority(u8);

impl Priority {
    /// Most urgent priority.
    pub const HIGHEST: Priority = Priority(0);
    /// Least urgent priority.
    pub const LOWEST: Priority = Priority(MAX_ACTIVE as u8 - 1);

    /// Validates `raw` against [`MAX_ACTIVE`]; an out-of-range value is fatal.
    pub fn new(raw: u8) -> Self {
        crate::require!((raw as usize) < MAX_ACTIVE, "priority out of range");
        Priority(raw)
    }

    /// Non-panicking constructor.
    pub const fn try_new(raw: u8) -> Option<Self> {
        if (raw as usize) < MAX_ACTIVE {
            Some(Priority(raw))
        } else {
            None
        }
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    const fn group(self) -> usize {
        (self.0 >> 3) as usize
    }

    const fn bit(self) -> u8 {
        1 << (self.0 & 0x07)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Priority({})", self.0)
    }
}

/// Set of ready priorities.
///
/// A bit is set exactly while the corresponding active object has queued
/// events; the same structure doubles as a subscriber set for
/// publish/subscribe channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadyGroup {
    grp: u8,
    tbl: [u8; READY_GROUPS],
}

impl ReadyGroup {
    pub const fn new() -> Self {
        Self {
            grp: 0,
            tbl: [0; READY_GROUPS],
        }
    }

    pub fn set_ready(&mut self, prio: Priority) {
        let group = prio.group();
        self.tbl[group] |= prio.bit();
        self.grp |= 1 << group;
    }

    /// Clears `prio`; the group summary bit goes only when the whole group is empty.
    pub fn set_unready(&mut self, prio: Priority) {
        let group = prio.group();
        self.tbl[group] &= !prio.bit();
        if self.tbl[group] == 0 {
            self.grp &= !(1 << group);
        }
    }

    /// True if any priority is set.
    pub const fn is_ready(&self) -> bool {
        self.grp != 0
    }

    pub const fn is_not_ready(&self) -> bool {
        self.grp == 0
    }

    pub const fn contains(&self, prio: Priority) -> bool {
        self.tbl[prio.group()] & prio.bit() != 0
    }

    /// Numerically lowest (most urgent) set priority.
    pub fn find_highest(&self) -> Option<Priority> {
        if self.grp == 0 {
            return None;
        }
        let group = self.grp.trailing_zeros() as u8;
        let bit = self.tbl[group as usize].trailing_zeros() as u8;
        Some(Priority((group << 3) + bit))
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn len(&self) -> usize {
        self.tbl.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.is_not_ready()
    }

    /// Set priorities, most urgent first.
    pub fn iter(&self) -> ReadyIter {
        ReadyIter { rest: *self }
    }
}

impl<'a> IntoIterator for &'a ReadyGroup {
    type Item = Priority;
    type IntoIter = ReadyIter;

    fn into_iter(self) -> ReadyIter {
        self.iter()
    }
}

/// Iterator over a snapshot of a [`ReadyGroup`].
#[derive(Debug, Clone)]
pub struct ReadyIter {
    rest: ReadyGroup,
}

impl Iterator for ReadyIter {
    type Item = Priority;

    fn next(&mut self) -> Option<Priority> {
        let prio = self.rest.find_highest()?;
        self.rest.set_unready(prio);
        Some(prio)
    }
}
