//! Structured trace records.

use rkh_core::Signal;

use crate::records::{fwk, mp, que, sm, sma, tmr, usr, TraceEventId, TraceGroup};

/// One observation emitted by the runtime.
///
/// Active objects are identified by their priority, states by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceRecord {
    // Memory pools
    PoolInit { pool: u8, block_size: u16, blocks: u16 },
    PoolGet { pool: u8, free: u16, min_free: u16 },
    PoolPut { pool: u8, free: u16 },

    // Queues
    QueueInit { owner: Option<u8>, capacity: u16 },
    QueueGet { owner: Option<u8>, len: u16 },
    QueueFifo { owner: Option<u8>, len: u16, min_free: u16 },
    QueueLifo { owner: Option<u8>, len: u16, min_free: u16 },
    QueueFull { owner: Option<u8> },
    QueueDeplete { owner: Option<u8>, removed: u16 },

    // Active objects
    Activate { ao: u8, name: &'static str },
    Terminate { ao: u8 },
    GetEvent { ao: u8, signal: Signal },
    PostFifo { ao: u8, signal: Signal },
    PostLifo { ao: u8, signal: Signal },
    Defer { signal: Signal },
    Recall { ao: u8, signal: Signal },

    // State machines
    SmInit { ao: Option<u8>, state: &'static str },
    ClearHistory { ao: Option<u8> },
    Dispatch { ao: Option<u8>, signal: Signal, state: &'static str },
    Transition { ao: Option<u8>, source: &'static str, target: &'static str },
    State { ao: Option<u8>, state: &'static str },
    EnterState { ao: Option<u8>, state: &'static str },
    ExitState { ao: Option<u8>, state: &'static str },
    EntryExitCount { ao: Option<u8>, entered: u8, exited: u8 },
    Segments { ao: Option<u8>, count: u8 },
    GuardFalse { ao: Option<u8>, signal: Signal },
    EventNotFound { ao: Option<u8>, signal: Signal },
    ConditionNotFound { ao: Option<u8>, signal: Signal },
    UnknownState { ao: Option<u8>, signal: Signal },
    ExceededDepth { ao: Option<u8>, signal: Signal },
    ExceededSegments { ao: Option<u8>, signal: Signal },

    // Timers
    TimerInit { timer: u16, signal: Signal },
    TimerStart { timer: u16, ao: u8, ticks: u32, period: u32 },
    TimerStop { timer: u16, ticks: u32, period: u32 },
    TimerTimeout { timer: u16, signal: Signal, ao: u8 },
    TimerRemove { timer: u16 },

    // Framework
    FwkEnter,
    Idle,
    Alloc { signal: Signal, pool: u8 },
    Gc { signal: Signal, pool: u8, refs: u8 },
    GcRelease { signal: Signal, pool: u8 },
    Subscribe { ao: u8, channel: u8 },
    Unsubscribe { ao: u8, channel: u8 },
    Publish { channel: u8, signal: Signal, subscribers: u8 },

    // Application
    User { tag: u8, value: u32 },
}

impl TraceRecord {
    pub fn id(&self) -> TraceEventId {
        use TraceRecord::*;
        match self {
            PoolInit { .. } => mp::INIT,
            PoolGet { .. } => mp::GET,
            PoolPut { .. } => mp::PUT,
            QueueInit { .. } => que::INIT,
            QueueGet { .. } => que::GET,
            QueueFifo { .. } => que::FIFO,
            QueueLifo { .. } => que::LIFO,
            QueueFull { .. } => que::FULL,
            QueueDeplete { .. } => que::DEPLETE,
            Activate { .. } => sma::ACTIVATE,
            Terminate { .. } => sma::TERMINATE,
            GetEvent { .. } => sma::GET_EVENT,
            PostFifo { .. } => sma::FIFO,
            PostLifo { .. } => sma::LIFO,
            Defer { .. } => sma::DEFER,
            Recall { .. } => sma::RECALL,
            SmInit { .. } => sm::INIT,
            ClearHistory { .. } => sm::CLEAR_HISTORY,
            Dispatch { .. } => sm::DISPATCH,
            Transition { .. } => sm::TRANSITION,
            State { .. } => sm::STATE,
            EnterState { .. } => sm::ENTER_STATE,
            ExitState { .. } => sm::EXIT_STATE,
            EntryExitCount { .. } => sm::ENTRY_EXIT_COUNT,
            Segments { .. } => sm::SEGMENTS,
            GuardFalse { .. } => sm::GUARD_FALSE,
            EventNotFound { .. } => sm::EVENT_NOT_FOUND,
            ConditionNotFound { .. } => sm::CONDITION_NOT_FOUND,
            UnknownState { .. } => sm::UNKNOWN_STATE,
            ExceededDepth { .. } => sm::EXCEEDED_DEPTH,
            ExceededSegments { .. } => sm::EXCEEDED_SEGMENTS,
            TimerInit { .. } => tmr::INIT,
            TimerStart { .. } => tmr::START,
            TimerStop { .. } => tmr::STOP,
            TimerTimeout { .. } => tmr::TIMEOUT,
            TimerRemove { .. } => tmr::REMOVE,
            FwkEnter => fwk::ENTER,
            Idle => fwk::IDLE,
            Alloc { .. } => fwk::ALLOC,
            Gc { .. } => fwk::GC,
            GcRelease { .. } => fwk::GC_RELEASE,
            Subscribe { .. } => fwk::SUBSCRIBE,
            Unsubscribe { .. } => fwk::UNSUBSCRIBE,
            Publish { .. } => fwk::PUBLISH,
            User { .. } => usr::USER,
        }
    }

    pub fn group(&self) -> TraceGroup {
        self.id().group()
    }

    /// Active object the record concerns, if any.
    pub fn ao(&self) -> Option<u8> {
        use TraceRecord::*;
        match *self {
            QueueInit { owner, .. }
            | QueueGet { owner, .. }
            | QueueFifo { owner, .. }
            | QueueLifo { owner, .. }
            | QueueFull { owner }
            | QueueDeplete { owner, .. } => owner,
            Activate { ao, .. }
            | Terminate { ao }
            | GetEvent { ao, .. }
            | PostFifo { ao, .. }
            | PostLifo { ao, .. }
            | Recall { ao, .. }
            | TimerStart { ao, .. }
            | TimerTimeout { ao, .. }
            | Subscribe { ao, .. }
            | Unsubscribe { ao, .. } => Some(ao),
            SmInit { ao, .. }
            | ClearHistory { ao }
            | Dispatch { ao, .. }
            | Transition { ao, .. }
            | State { ao, .. }
            | EnterState { ao, .. }
            | ExitState { ao, .. }
            | EntryExitCount { ao, .. }
            | Segments { ao, .. }
            | GuardFalse { ao, .. }
            | EventNotFound { ao, .. }
            | ConditionNotFound { ao, .. }
            | UnknownState { ao, .. }
            | ExceededDepth { ao, .. }
            | ExceededSegments { ao, .. } => ao,
            _ => None,
        }
    }

    /// Signal the record concerns, if any.
    pub fn signal(&self) -> Option<Signal> {
        use TraceRecord::*;
        match *self {
            GetEvent { signal, .. }
            | PostFifo { signal, .. }
            | PostLifo { signal, .. }
            | Defer { signal }
            | Recall { signal, .. }
            | Dispatch { signal, .. }
            | GuardFalse { signal, .. }
            | EventNotFound { signal, .. }
            | ConditionNotFound { signal, .. }
            | UnknownState { signal, .. }
            | ExceededDepth { signal, .. }
            | ExceededSegments { signal, .. }
            | TimerInit { signal, .. }
            | TimerTimeout { signal, .. }
            | Alloc { signal, .. }
            | Gc { signal, .. }
            | GcRelease { signal, .. }
            | Publish { signal, .. } => Some(signal),
            _ => None,
        }
    }
}
