#![no_std]
#![forbid(unsafe_code)]

//! # RKH Core
//!
//! Shared primitives for the RKH active-object runtime: signals, priorities,
//! the ready bitmap used by the cooperative scheduler, event handles and the
//! fatal-assertion path every other crate reports precondition violations
//! through.
//!
//! Everything here is `no_std`. State shared with interrupt context is kept
//! in [`CsCell`], which is a thin wrapper over the `critical-section` crate.

pub mod assert;
pub mod config;
pub mod event;
pub mod priority;
pub mod signal;
pub mod sync;

pub use assert::{set_assert_handler, AssertHandler, AssertInfo};
pub use event::{DynEvent, Event, StaticEvent};
pub use priority::{Priority, ReadyGroup, ReadyIter};
pub use signal::{Signal, SignalRaw};
pub use sync::CsCell;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
