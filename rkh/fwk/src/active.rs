//! Active objects.
//!
//! An active object couples a priority with a state machine. The kernel
//! owns the scheduling; the object only sees one event at a time, together
//! with the [`Framework`] it can post, publish and arm timers through.

use std::sync::Arc;

use rkh_core::{Event, Priority};
use rkh_sm::{DispatchResult, Hsm, StateChart};

use crate::framework::Framework;

/// Object-safe interface the kernel schedules.
pub trait Active {
    fn priority(&self) -> Priority;

    fn name(&self) -> &'static str;

    /// Takes the initial transition. Called once, on activation.
    fn init(&mut self, fwk: &Framework);

    /// Processes one event to completion.
    fn dispatch(&mut self, fwk: &Framework, event: &Event) -> DispatchResult;
}

/// Statechart-driven active object.
///
/// `D` is the extended state the chart's actions operate on; they receive
/// the framework as their port.
pub struct ActiveObject<D> {
    priority: Priority,
    name: &'static str,
    hsm: Hsm<D, Framework>,
    data: D,
}

impl<D> ActiveObject<D> {
    pub fn new(
        priority: Priority,
        name: &'static str,
        chart: Arc<StateChart<D, Framework>>,
        data: D,
    ) -> Self {
        Self {
            priority,
            name,
            hsm: Hsm::new(chart),
            data,
        }
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    pub fn hsm(&self) -> &Hsm<D, Framework> {
        &self.hsm
    }

    pub fn hsm_mut(&mut self) -> &mut Hsm<D, Framework> {
        &mut self.hsm
    }
}

impl<D> Active for ActiveObject<D> {
    fn priority(&self) -> Priority {
        self.priority
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn init(&mut self, fwk: &Framework) {
        self.hsm.set_tracer(fwk.tracer().clone(), self.priority.raw());
        let result = self.hsm.init(&mut self.data, fwk);
        if result.is_error() {
            log::error!("`{}` failed its initial transition: {}", self.name, result);
        }
    }

    fn dispatch(&mut self, fwk: &Framework, event: &Event) -> DispatchResult {
        self.hsm.dispatch(&mut self.data, fwk, event)
    }
}

impl<D> core::fmt::Debug for ActiveObject<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActiveObject")
            .field("priority", &self.priority)
            .field("name", &self.name)
            .field("hsm", &self.hsm)
            .finish()
    }
}
