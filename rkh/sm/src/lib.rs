#![forbid(unsafe_code)]

//! # RKH State Machine Engine
//!
//! Table-driven hierarchical state machines. A [`StateChart`] is the
//! immutable model: a tree of states, each with an ordered transition
//! table, optional entry/exit actions and, for composites, an initial
//! transition; plus choice and history pseudostates. An [`Hsm`] is one
//! running instance of a chart: its current leaf, its history memory and
//! its counters.
//!
//! Dispatching an event runs to completion and always returns a
//! [`DispatchResult`]:
//! - the signal is searched from the current leaf outward, skipping entries
//!   whose guard is false;
//! - the target of a matching transition is resolved through any choice or
//!   history pseudostates;
//! - states are exited from the leaf up to the least common ancestor of the
//!   handling state and the target, the transition actions run, states are
//!   entered down to the target and initial transitions are followed to a
//!   leaf;
//! - if the new leaf is final, or simple with a completion transition, the
//!   machine dispatches [`Signal::COMPLETION`](rkh_core::Signal::COMPLETION)
//!   to itself before returning.
//!
//! Walks are bounded by [`MAX_HIERARCHY_DEPTH`] and compound transitions by
//! [`MAX_TRANSITION_SEGMENTS`]; exceeding either is reported as a result
//! code, never by looping or recursing.

use core::fmt;

pub mod hsm;
pub mod model;
pub mod transition;

pub use hsm::{Hsm, SmInfo};
pub use model::{
    Action, ChartBuilder, Guard, HistoryKind, ModelError, Preprocessor, StateAction, StateChart,
    StateId, Transition,
};
pub use rkh_core::config::{MAX_HIERARCHY_DEPTH, MAX_TRANSITION_SEGMENTS};

#[cfg(test)]
mod tests;

/// Outcome of dispatching one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchResult {
    /// A transition with a target was taken.
    HandledTransition,
    /// An internal transition ran its action; the leaf is unchanged.
    HandledInternal,
    /// No state in the active configuration handles the signal.
    NotHandled,
    /// Entries matched the signal but every guard was false.
    GuardFalse,
    /// A choice pseudostate had no enabled branch.
    ConditionNotFound,
    /// The current state or a resolved target is not a valid state of the chart.
    UnknownState,
    /// A hierarchy walk went deeper than [`MAX_HIERARCHY_DEPTH`].
    ExceededHierarchyDepth,
    /// A compound transition chained more than [`MAX_TRANSITION_SEGMENTS`] segments.
    ExceededTransitionSegments,
}

impl DispatchResult {
    /// The event was consumed by some state.
    pub const fn is_handled(self) -> bool {
        matches!(self, Self::HandledTransition | Self::HandledInternal)
    }

    /// Model-integrity failure, as opposed to an ordinary outcome.
    pub const fn is_error(self) -> bool {
        matches!(
            self,
            Self::ConditionNotFound
                | Self::UnknownState
                | Self::ExceededHierarchyDepth
                | Self::ExceededTransitionSegments
        )
    }
}

impl fmt::Display for DispatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::HandledTransition => "handled (transition)",
            Self::HandledInternal => "handled (internal)",
            Self::NotHandled => "not handled",
            Self::GuardFalse => "guard false",
            Self::ConditionNotFound => "no enabled branch",
            Self::UnknownState => "unknown state",
            Self::ExceededHierarchyDepth => "hierarchy depth exceeded",
            Self::ExceededTransitionSegments => "transition segments exceeded",
        };
        f.write_str(text)
    }
}
