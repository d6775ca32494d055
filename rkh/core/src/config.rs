//! Compile-time sizing limits.
//!
//! Runtime objects are sized against these ceilings; a `KernelConfig` may
//! choose smaller values but never larger ones.

/// Number of distinct active-object priorities (`0..MAX_ACTIVE`).
pub const MAX_ACTIVE: usize = 64;

/// Number of fixed-block event pools that can be registered.
pub const MAX_EVENT_POOLS: usize = 4;

/// Deepest state nesting a dispatch is allowed to walk.
pub const MAX_HIERARCHY_DEPTH: usize = 8;

/// Longest chain of segments one compound transition may take.
pub const MAX_TRANSITION_SEGMENTS: usize = 8;

/// Number of publish/subscribe channels.
pub const MAX_CHANNELS: usize = 16;

/// Signals above this value are never affected by the per-signal trace filter.
pub const MAX_TRACE_SIGNALS: usize = 256;

/// Ready-bitmap groups of eight priorities each.
pub const READY_GROUPS: usize = MAX_ACTIVE.div_ceil(8);

const _: () = assert!(MAX_ACTIVE <= 64, "ready bitmap supports at most 64 priorities");
const _: () = assert!(MAX_EVENT_POOLS <= u8::MAX as usize);
