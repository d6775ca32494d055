//! Software timers.
//!
//! Timers live in fixed slots addressed by [`TimerId`]. Running timers are
//! chained through slot indices; a start prepends to the chain and a tick
//! walks it front to back. Restarting or reinitializing a running timer
//! works on the slot in place, so the chain never holds a slot twice.

use rkh_core::{require, Priority, Signal};

/// Handle to a timer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerId(u16);

impl TimerId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn raw(self) -> u16 {
        self.0
    }
}

/// Usage counters of a timer list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerInfo {
    pub starts: u32,
    pub stops: u32,
    pub expirations: u32,
}

#[derive(Debug)]
struct Slot {
    signal: Signal,
    owner: Option<Priority>,
    counter: u32,
    period: u32,
    next: Option<u16>,
    linked: bool,
}

/// Timer expired during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    pub timer: TimerId,
    pub owner: Priority,
    pub signal: Signal,
    /// The timer reloaded and stays armed.
    pub periodic: bool,
}

/// Arena of timers plus the chain of running ones.
#[derive(Debug)]
pub struct TimerList {
    slots: Vec<Slot>,
    head: Option<u16>,
    limit: usize,
    info: TimerInfo,
}

impl TimerList {
    pub fn new(limit: usize) -> Self {
        Self {
            slots: Vec::with_capacity(limit),
            head: None,
            limit,
            info: TimerInfo::default(),
        }
    }

    /// Claims a slot for a timer posting `signal`.
    pub fn create(&mut self, signal: Signal) -> TimerId {
        require!(self.slots.len() < self.limit, "timer slots exhausted");
        self.slots.push(Slot {
            signal,
            owner: None,
            counter: 0,
            period: 0,
            next: None,
            linked: false,
        });
        TimerId((self.slots.len() - 1) as u16)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Arms `timer` to fire after `ticks` ticks and then every `period`
    /// ticks; `period == 0` makes it one-shot.
    pub fn start(&mut self, timer: TimerId, owner: Priority, ticks: u32, period: u32) {
        require!(ticks != 0, "timer started with zero delay");
        let head = self.head;
        let slot = self.slot_mut(timer);
        slot.owner = Some(owner);
        slot.counter = ticks;
        slot.period = period;
        if !slot.linked {
            slot.linked = true;
            slot.next = head;
            self.head = Some(timer.0);
        }
        self.info.starts += 1;
    }

    /// Disarms `timer`. Returns whether it was running.
    pub fn stop(&mut self, timer: TimerId) -> bool {
        if !self.slot_mut(timer).linked {
            return false;
        }
        self.unlink(timer.0);
        self.info.stops += 1;
        true
    }

    /// Stops `timer` if running and gives it a new signal.
    pub fn reinit(&mut self, timer: TimerId, signal: Signal) {
        self.stop(timer);
        self.slot_mut(timer).signal = signal;
    }

    /// Stops every timer owned by `owner`; returns how many were running.
    pub fn stop_owned(&mut self, owner: Priority) -> usize {
        let running: Vec<u16> = self
            .chain()
            .filter(|&i| self.slots[i as usize].owner == Some(owner))
            .collect();
        for &i in &running {
            self.unlink(i);
            self.info.stops += 1;
        }
        running.len()
    }

    /// Ticks left before `timer` fires; zero when it is not running.
    pub fn remaining(&self, timer: TimerId) -> u32 {
        let slot = self.slot(timer);
        if slot.linked {
            slot.counter
        } else {
            0
        }
    }

    pub fn is_running(&self, timer: TimerId) -> bool {
        self.slot(timer).linked
    }

    pub fn signal(&self, timer: TimerId) -> Signal {
        self.slot(timer).signal
    }

    pub fn period(&self, timer: TimerId) -> u32 {
        self.slot(timer).period
    }

    pub fn info(&self) -> TimerInfo {
        self.info
    }

    /// Advances every running timer by one tick. Expired timers are handed
    /// to `on_expiry` in chain order; one-shots leave the chain, periodic
    /// timers reload.
    pub fn tick(&mut self, mut on_expiry: impl FnMut(Expiry)) {
        let mut prev: Option<u16> = None;
        let mut cursor = self.head;
        while let Some(i) = cursor {
            let slot = &mut self.slots[i as usize];
            let next = slot.next;
            slot.counter = slot.counter.saturating_sub(1);
            if slot.counter > 0 {
                prev = Some(i);
                cursor = next;
                continue;
            }

            let expiry = Expiry {
                timer: TimerId(i),
                owner: slot.owner.unwrap_or(Priority::LOWEST),
                signal: slot.signal,
                periodic: slot.period > 0,
            };
            if slot.period > 0 {
                slot.counter = slot.period;
                prev = Some(i);
            } else {
                slot.linked = false;
                slot.next = None;
                match prev {
                    Some(p) => self.slots[p as usize].next = next,
                    None => self.head = next,
                }
            }
            self.info.expirations += 1;
            on_expiry(expiry);
            cursor = next;
        }
    }

    /// Running timers, front to back.
    pub fn running(&self) -> impl Iterator<Item = TimerId> + '_ {
        self.chain().map(TimerId)
    }

    fn chain(&self) -> impl Iterator<Item = u16> + '_ {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let i = cursor?;
            cursor = self.slots[i as usize].next;
            Some(i)
        })
    }

    fn unlink(&mut self, index: u16) {
        let next = self.slots[index as usize].next;
        let prev = self
            .chain()
            .find(|&i| self.slots[i as usize].next == Some(index));
        match prev {
            Some(p) => self.slots[p as usize].next = next,
            None if self.head == Some(index) => self.head = next,
            None => {}
        }
        let slot = &mut self.slots[index as usize];
        slot.linked = false;
        slot.next = None;
    }

    fn slot(&self, timer: TimerId) -> &Slot {
        let Some(slot) = self.slots.get(timer.index()) else {
            rkh_core::fatal!("unknown timer");
        };
        slot
    }

    fn slot_mut(&mut self, timer: TimerId) -> &mut Slot {
        let Some(slot) = self.slots.get_mut(timer.index()) else {
            rkh_core::fatal!("unknown timer");
        };
        slot
    }
}
