//! Minimal active object that records what it is given.

use std::cell::RefCell;
use std::rc::Rc;

use rkh_core::{Event, Priority, Signal};
use rkh_sm::DispatchResult;

use crate::{Active, Framework};

pub type Log = Rc<RefCell<Vec<(u8, Signal)>>>;

pub struct Recorder {
    prio: Priority,
    log: Log,
    pub inits: usize,
}

impl Recorder {
    pub fn new(prio: u8, log: &Log) -> Self {
        Self {
            prio: Priority::new(prio),
            log: Rc::clone(log),
            inits: 0,
        }
    }
}

impl Active for Recorder {
    fn priority(&self) -> Priority {
        self.prio
    }

    fn name(&self) -> &'static str {
        "recorder"
    }

    fn init(&mut self, _: &Framework) {
        self.inits += 1;
    }

    fn dispatch(&mut self, _: &Framework, event: &Event) -> DispatchResult {
        self.log.borrow_mut().push((self.prio.raw(), event.signal()));
        DispatchResult::HandledInternal
    }
}
