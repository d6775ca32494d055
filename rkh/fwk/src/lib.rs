#![forbid(unsafe_code)]

//! # RKH Framework
//!
//! Active objects on a cooperative, priority-based dispatcher.
//!
//! ## Module Overview
//! - [`framework`] – the runtime context: readiness, queues, posting,
//!   event allocation, defer/recall and timers.
//! - [`pubsub`] – publish/subscribe channels on top of the runtime context.
//! - [`queue`] – bounded event queues.
//! - [`time`] – software timers driven by a periodic tick.
//! - [`active`] – the [`Active`] interface and the statechart-driven
//!   [`ActiveObject`].
//! - [`kernel`] – [`KernelConfig`] and the run-to-completion [`Kernel`].
//!
//! Everything an interrupt may touch is reached through `&Framework` and
//! guarded by a critical section; dispatching itself happens outside of
//! any critical section.

pub mod active;
pub mod framework;
pub mod kernel;
pub mod pubsub;
pub mod queue;
pub mod time;

pub use active::{Active, ActiveObject};
pub use framework::Framework;
pub use kernel::{ConfigError, Kernel, KernelConfig, KernelConfigBuilder};
pub use queue::{EventQueue, QueueInfo};
pub use time::{Expiry, TimerId, TimerInfo, TimerList};

pub use rkh_core::{Event, Priority, Signal, StaticEvent};
pub use rkh_sm::DispatchResult;

#[cfg(test)]
mod tests;
