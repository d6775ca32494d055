//! Event signals.

use core::fmt;

#[cfg(all(feature = "signal-u8", feature = "signal-u32"))]
compile_error!("features `signal-u8` and `signal-u32` are mutually exclusive");

/// Integer type backing [`Signal`], selected at compile time.
#[cfg(feature = "signal-u8")]
pub type SignalRaw = u8;
/// Integer type backing [`Signal`], selected at compile time.
#[cfg(feature = "signal-u32")]
pub type SignalRaw = u32;
/// Integer type backing [`Signal`], selected at compile time.
#[cfg(not(any(feature = "signal-u8", feature = "signal-u32")))]
pub type SignalRaw = u16;

/// Identifies what happened. Immutable once an event is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Signal(pub SignalRaw);

impl Signal {
    /// Reserved signal carried by the event that drives a machine's
    /// top-level initial transition.
    pub const INIT: Signal = Signal(SignalRaw::MAX);

    /// Reserved signal a state machine dispatches to itself when it settles
    /// in a final state or in a state with a completion transition.
    pub const COMPLETION: Signal = Signal(SignalRaw::MAX - 1);

    pub const fn new(raw: SignalRaw) -> Self {
        Signal(raw)
    }

    pub const fn raw(self) -> SignalRaw {
        self.0
    }

    /// Index used by per-signal lookup tables.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signal({})", self.0)
    }
}

impl From<SignalRaw> for Signal {
    fn from(raw: SignalRaw) -> Self {
        Signal(raw)
    }
}
