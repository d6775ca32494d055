//! Compound transition planning.
//!
//! A transition is worked out completely before anything runs: the target
//! is resolved through choice and history pseudostates, then the exit and
//! entry paths are laid out. Only a plan that fits within the hierarchy and
//! segment limits is executed, so a structural error leaves the machine as
//! it was.

use heapless::Vec;
use rkh_core::config::{MAX_HIERARCHY_DEPTH, MAX_TRANSITION_SEGMENTS};
use rkh_core::Event;

use crate::model::{Action, HistoryKind, StateChart, StateId, VertexKind};
use crate::DispatchResult;

/// Chain of states along one hierarchy walk.
pub type Path = Vec<StateId, MAX_HIERARCHY_DEPTH>;

/// Execution path of one compound transition.
pub struct TransitionPlan<D, P: ?Sized> {
    /// States to exit, innermost first.
    pub exits: Path,
    /// Actions of every segment, in the order they were traversed.
    pub actions: Vec<Action<D, P>, MAX_TRANSITION_SEGMENTS>,
    /// States to enter, outermost first.
    pub entries: Path,
    /// Resolved target state.
    pub target: Option<StateId>,
    segments: usize,
}

impl<D, P: ?Sized> TransitionPlan<D, P> {
    /// Plan for a chain whose first segment carries `action`.
    pub fn new(action: Option<Action<D, P>>) -> Self {
        let mut plan = Self {
            exits: Vec::new(),
            actions: Vec::new(),
            entries: Vec::new(),
            target: None,
            segments: 1,
        };
        if let Some(action) = action {
            // first push into an empty vector with non-zero capacity
            let _ = plan.actions.push(action);
        }
        plan
    }

    /// Segments traversed so far, the first one included.
    pub fn segments(&self) -> usize {
        self.segments
    }

    pub fn add_exit(&mut self, state: StateId) -> Result<(), DispatchResult> {
        self.exits
            .push(state)
            .map_err(|_| DispatchResult::ExceededHierarchyDepth)
    }

    fn add_segment(&mut self, action: Option<Action<D, P>>) -> Result<(), DispatchResult> {
        self.segments += 1;
        if self.segments > MAX_TRANSITION_SEGMENTS {
            return Err(DispatchResult::ExceededTransitionSegments);
        }
        if let Some(action) = action {
            self.actions
                .push(action)
                .map_err(|_| DispatchResult::ExceededTransitionSegments)?;
        }
        Ok(())
    }

    /// Follows `target` through pseudostates until it names a state.
    ///
    /// Choice branches are tried in declaration order. A history with a
    /// recorded state resolves to it; with nothing recorded its default
    /// transition is taken, and failing that its composite.
    pub fn resolve(
        &mut self,
        chart: &StateChart<D, P>,
        history: &[Option<StateId>],
        data: &D,
        port: &P,
        event: &Event,
        target: StateId,
    ) -> Result<StateId, DispatchResult> {
        let mut cursor = target;
        loop {
            let vertex = chart.vertex(cursor).ok_or(DispatchResult::UnknownState)?;
            match &vertex.kind {
                VertexKind::State(_) => {
                    self.target = Some(cursor);
                    return Ok(cursor);
                }
                VertexKind::Choice(choice) => {
                    let branch = choice
                        .branches
                        .iter()
                        .find(|b| b.guard.map_or(true, |g| g(data, port, event)))
                        .ok_or(DispatchResult::ConditionNotFound)?;
                    self.add_segment(branch.action)?;
                    cursor = branch.target.ok_or(DispatchResult::UnknownState)?;
                }
                VertexKind::History(node) => {
                    match (history.get(cursor.index()).copied().flatten(), &node.default) {
                        (Some(recorded), _) => {
                            self.add_segment(None)?;
                            cursor = recorded;
                        }
                        (None, Some(default)) => {
                            if let Some(guard) = default.guard {
                                if !guard(data, port, event) {
                                    return Err(DispatchResult::GuardFalse);
                                }
                            }
                            self.add_segment(default.action)?;
                            cursor = default.target.ok_or(DispatchResult::UnknownState)?;
                        }
                        (None, None) => {
                            self.add_segment(None)?;
                            cursor = node.parent;
                        }
                    }
                }
            }
        }
    }

    /// Lays out the exit path from `leaf` and the entry path down to the
    /// resolved target for a transition handled by `source`.
    pub fn layout(
        &mut self,
        chart: &StateChart<D, P>,
        leaf: StateId,
        source: StateId,
    ) -> Result<(), DispatchResult> {
        let target = self.target.ok_or(DispatchResult::UnknownState)?;
        if chart.depth(target) > MAX_HIERARCHY_DEPTH {
            return Err(DispatchResult::ExceededHierarchyDepth);
        }
        let lca = least_common_ancestor(chart, leaf, source, target)?;

        let mut cursor = Some(leaf);
        while cursor != lca {
            let state = cursor.ok_or(DispatchResult::UnknownState)?;
            self.add_exit(state)?;
            cursor = chart.parent(state);
        }

        self.entries = entry_path(chart, lca, target)?;
        Ok(())
    }
}

/// States strictly below `from` (the root when `None`) down to and
/// including `to`, outermost first.
pub fn entry_path<D, P: ?Sized>(
    chart: &StateChart<D, P>,
    from: Option<StateId>,
    to: StateId,
) -> Result<Path, DispatchResult> {
    let mut path = Path::new();
    let mut cursor = Some(to);
    while cursor != from {
        let state = cursor.ok_or(DispatchResult::UnknownState)?;
        path.push(state)
            .map_err(|_| DispatchResult::ExceededHierarchyDepth)?;
        cursor = chart.parent(state);
    }
    path.reverse();
    Ok(path)
}

/// Boundary of a transition from `source` to `target` while `leaf` is
/// active. `None` stands for the chart root.
///
/// A target at or above the handling state is not exited: its active
/// substates are, and its initial transition is taken again. The one
/// exception is a self-transition of the leaf, which exits and re-enters
/// the leaf.
pub fn least_common_ancestor<D, P: ?Sized>(
    chart: &StateChart<D, P>,
    leaf: StateId,
    source: StateId,
    target: StateId,
) -> Result<Option<StateId>, DispatchResult> {
    if target == source && source == leaf {
        return Ok(chart.parent(leaf));
    }
    if chart.is_within(target, source) {
        return Ok(Some(source));
    }
    if chart.is_within(source, target) {
        return Ok(Some(target));
    }

    let mut cursor = chart.parent(source);
    let mut steps = 0;
    while let Some(state) = cursor {
        steps += 1;
        if steps > MAX_HIERARCHY_DEPTH {
            return Err(DispatchResult::ExceededHierarchyDepth);
        }
        if chart.is_within(target, state) {
            return Ok(Some(state));
        }
        cursor = chart.parent(state);
    }
    Ok(None)
}

/// Value a history pseudostate records when `exited` is left while `leaf`
/// was the active leaf.
pub fn recorded_state(kind: HistoryKind, exited: StateId, leaf: StateId) -> StateId {
    match kind {
        HistoryKind::Shallow => exited,
        HistoryKind::Deep => leaf,
    }
}
