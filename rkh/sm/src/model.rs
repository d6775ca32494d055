//! Statechart model and its builder.
//!
//! Vertices live in one arena and are referred to by [`StateId`]. A vertex
//! is a state (basic when it has no children, composite otherwise, final
//! when it marks its region as done), a choice pseudostate or a history
//! pseudostate. Parents are always created
//! before their children, so the parent graph cannot contain cycles.

use core::fmt;

use rkh_core::{Event, Signal};
use thiserror::Error;

/// Transition or initial action.
pub type Action<D, P> = fn(&mut D, &P, &Event);
/// Transition guard.
pub type Guard<D, P> = fn(&D, &P, &Event) -> bool;
/// Entry or exit action.
pub type StateAction<D, P> = fn(&mut D, &P);
/// Maps an incoming event to the signal a state's table is searched for.
pub type Preprocessor<D, P> = fn(&D, &P, &Event) -> Signal;

/// Index of a vertex within its chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StateId(u16);

impl StateId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Memory kept by a history pseudostate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    /// Last active direct child.
    Shallow,
    /// Last active leaf.
    Deep,
}

/// Descriptor of one transition segment.
///
/// Used for table entries, choice branches and history defaults. A missing
/// target makes a table entry internal; a missing guard on a choice branch
/// makes it the else-branch.
pub struct Transition<D, P: ?Sized = ()> {
    pub(crate) guard: Option<Guard<D, P>>,
    pub(crate) action: Option<Action<D, P>>,
    pub(crate) target: Option<StateId>,
}

impl<D, P: ?Sized> Clone for Transition<D, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D, P: ?Sized> Copy for Transition<D, P> {}

impl<D, P: ?Sized> Transition<D, P> {
    /// External transition to `target`.
    pub fn to(target: StateId) -> Self {
        Self {
            guard: None,
            action: None,
            target: Some(target),
        }
    }

    /// Internal transition: action only, no state change.
    pub fn internal() -> Self {
        Self {
            guard: None,
            action: None,
            target: None,
        }
    }

    pub fn guard(mut self, guard: Guard<D, P>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn action(mut self, action: Action<D, P>) -> Self {
        self.action = Some(action);
        self
    }

    pub fn target(&self) -> Option<StateId> {
        self.target
    }

    pub fn is_internal(&self) -> bool {
        self.target.is_none()
    }
}

impl<D, P: ?Sized> fmt::Debug for Transition<D, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("guarded", &self.guard.is_some())
            .field("action", &self.action.is_some())
            .field("target", &self.target)
            .finish()
    }
}

pub(crate) struct Initial<D, P: ?Sized> {
    pub(crate) target: StateId,
    pub(crate) action: Option<Action<D, P>>,
}

pub(crate) struct StateNode<D, P: ?Sized> {
    pub(crate) parent: Option<StateId>,
    pub(crate) children: u16,
    pub(crate) entry: Option<StateAction<D, P>>,
    pub(crate) exit: Option<StateAction<D, P>>,
    pub(crate) initial: Option<Initial<D, P>>,
    pub(crate) history: Option<StateId>,
    pub(crate) rows: Vec<(Signal, Transition<D, P>)>,
    pub(crate) preprocess: Option<Preprocessor<D, P>>,
    pub(crate) is_final: bool,
}

impl<D, P: ?Sized> StateNode<D, P> {
    pub(crate) fn is_composite(&self) -> bool {
        self.children > 0
    }

    /// Entering this state raises a completion event: it is final, or it
    /// is simple and has a completion transition.
    pub(crate) fn awaits_completion(&self) -> bool {
        self.is_final
            || (!self.is_composite() && self.rows.iter().any(|(sig, _)| *sig == Signal::COMPLETION))
    }

    /// Signal this state's table is searched for when `event` arrives.
    pub(crate) fn input(&self, data: &D, port: &P, event: &Event) -> Signal {
        self.preprocess
            .map_or_else(|| event.signal(), |map| map(data, port, event))
    }
}

pub(crate) struct ChoiceNode<D, P: ?Sized> {
    pub(crate) branches: Vec<Transition<D, P>>,
}

pub(crate) struct HistoryNode<D, P: ?Sized> {
    pub(crate) kind: HistoryKind,
    pub(crate) parent: StateId,
    pub(crate) default: Option<Transition<D, P>>,
}

pub(crate) enum VertexKind<D, P: ?Sized> {
    State(StateNode<D, P>),
    Choice(ChoiceNode<D, P>),
    History(HistoryNode<D, P>),
}

pub(crate) struct Vertex<D, P: ?Sized> {
    pub(crate) name: &'static str,
    pub(crate) kind: VertexKind<D, P>,
}

/// Structural problems found while building a chart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("chart has no top-level initial transition")]
    MissingTopInitial,
    #[error("vertex {0:?} does not belong to this chart")]
    UnknownVertex(StateId),
    #[error("`{0}` is a pseudostate where a state is required")]
    NotAState(&'static str),
    #[error("composite state `{0}` has no initial transition")]
    MissingInitial(&'static str),
    #[error("simple state `{0}` cannot have an initial transition")]
    InitialOnSimpleState(&'static str),
    #[error("initial transition of `{state}` targets `{target}`, which is not nested in it")]
    InitialNotNested {
        state: &'static str,
        target: &'static str,
    },
    #[error("history `{0}` must belong to a composite state")]
    HistoryOnSimpleState(&'static str),
    #[error("composite state `{0}` already has a history pseudostate")]
    DuplicateHistory(&'static str),
    #[error("choice `{0}` has no branches")]
    EmptyChoice(&'static str),
    #[error("segment leaving `{0}` has no target")]
    MissingTarget(&'static str),
    #[error("final state `{0}` cannot have substates, actions or transitions")]
    FinalStateNotEmpty(&'static str),
    #[error("chart exceeds {} vertices", u16::MAX)]
    TooManyVertices,
}

/// Immutable statechart model shared by every machine instance.
///
/// `D` is the extended-state type actions mutate; `P` is the service port
/// they receive alongside it (the framework, or `()` for a bare machine).
pub struct StateChart<D, P: ?Sized = ()> {
    name: &'static str,
    vertices: Vec<Vertex<D, P>>,
    initial: Initial<D, P>,
}

impl<D, P: ?Sized> StateChart<D, P> {
    pub fn builder(name: &'static str) -> ChartBuilder<D, P> {
        ChartBuilder::new(name)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of vertices, pseudostates included.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex_name(&self, id: StateId) -> &'static str {
        self.vertices.get(id.index()).map_or("?", |v| v.name)
    }

    /// Looks a vertex up by name.
    pub fn find(&self, name: &str) -> Option<StateId> {
        self.vertices
            .iter()
            .position(|v| v.name == name)
            .map(|i| StateId(i as u16))
    }

    pub fn parent(&self, id: StateId) -> Option<StateId> {
        match &self.vertices.get(id.index())?.kind {
            VertexKind::State(node) => node.parent,
            VertexKind::History(node) => Some(node.parent),
            VertexKind::Choice(_) => None,
        }
    }

    pub fn is_state(&self, id: StateId) -> bool {
        self.state(id).is_some()
    }

    pub fn is_composite(&self, id: StateId) -> bool {
        self.state(id).is_some_and(StateNode::is_composite)
    }

    pub fn is_final(&self, id: StateId) -> bool {
        self.state(id).is_some_and(|node| node.is_final)
    }

    /// Number of states from the top level down to `id` (top level = 1).
    pub fn depth(&self, id: StateId) -> usize {
        let mut depth = 0;
        let mut cursor = self.state(id).map(|_| id);
        while let Some(s) = cursor {
            depth += 1;
            cursor = self.state(s).and_then(|n| n.parent);
        }
        depth
    }

    pub(crate) fn vertex(&self, id: StateId) -> Option<&Vertex<D, P>> {
        self.vertices.get(id.index())
    }

    pub(crate) fn state(&self, id: StateId) -> Option<&StateNode<D, P>> {
        match &self.vertex(id)?.kind {
            VertexKind::State(node) => Some(node),
            _ => None,
        }
    }

    pub(crate) fn initial(&self) -> &Initial<D, P> {
        &self.initial
    }
}

impl<D, P: ?Sized> fmt::Debug for StateChart<D, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateChart")
            .field("name", &self.name)
            .field("vertices", &self.vertices.len())
            .finish()
    }
}

/// Incremental construction of a [`StateChart`]. Mistakes are collected and
/// reported by [`ChartBuilder::build`].
pub struct ChartBuilder<D, P: ?Sized = ()> {
    name: &'static str,
    vertices: Vec<Vertex<D, P>>,
    initial: Option<Initial<D, P>>,
    errors: Vec<ModelError>,
}

impl<D, P: ?Sized> ChartBuilder<D, P> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            vertices: Vec::new(),
            initial: None,
            errors: Vec::new(),
        }
    }

    /// Adds a top-level state.
    pub fn state(&mut self, name: &'static str) -> StateId {
        self.add_state(name, None)
    }

    /// Adds a state nested in `parent`, making `parent` composite.
    pub fn substate(&mut self, parent: StateId, name: &'static str) -> StateId {
        match self.state_mut(parent) {
            Some(node) => node.children += 1,
            None => return self.add_state(name, None),
        }
        self.add_state(name, Some(parent))
    }

    /// Adds a final state to `parent`. Entering it completes `parent`,
    /// which then takes its completion transition, if any.
    pub fn final_state(&mut self, parent: StateId, name: &'static str) -> StateId {
        let id = self.substate(parent, name);
        if let Some(node) = self.state_mut(id) {
            node.is_final = true;
        }
        id
    }

    pub fn entry(&mut self, state: StateId, action: StateAction<D, P>) -> &mut Self {
        if let Some(node) = self.state_mut(state) {
            node.entry = Some(action);
        }
        self
    }

    pub fn exit(&mut self, state: StateId, action: StateAction<D, P>) -> &mut Self {
        if let Some(node) = self.state_mut(state) {
            node.exit = Some(action);
        }
        self
    }

    /// Sets the initial transition of a composite state.
    pub fn initial(
        &mut self,
        composite: StateId,
        target: StateId,
        action: Option<Action<D, P>>,
    ) -> &mut Self {
        if let Some(node) = self.state_mut(composite) {
            node.initial = Some(Initial { target, action });
        }
        self
    }

    /// Sets the chart's top-level initial transition.
    pub fn top_initial(&mut self, target: StateId, action: Option<Action<D, P>>) -> &mut Self {
        self.initial = Some(Initial { target, action });
        self
    }

    /// Appends a row to `state`'s transition table. Rows are tried in the
    /// order they were added.
    pub fn on(
        &mut self,
        state: StateId,
        signal: Signal,
        transition: Transition<D, P>,
    ) -> &mut Self {
        if let Some(node) = self.state_mut(state) {
            node.rows.push((signal, transition));
        }
        self
    }

    /// Appends a completion transition to `state`. On a simple state it is
    /// taken as soon as the state is entered; on a composite, once one of
    /// its final states is entered.
    pub fn on_completion(&mut self, state: StateId, transition: Transition<D, P>) -> &mut Self {
        self.on(state, Signal::COMPLETION, transition)
    }

    /// Installs a preprocessor that turns each event into the signal
    /// `state`'s table is searched for.
    pub fn preprocessor(&mut self, state: StateId, map: Preprocessor<D, P>) -> &mut Self {
        if let Some(node) = self.state_mut(state) {
            node.preprocess = Some(map);
        }
        self
    }

    pub fn shallow_history(&mut self, composite: StateId, name: &'static str) -> StateId {
        self.add_history(composite, name, HistoryKind::Shallow)
    }

    pub fn deep_history(&mut self, composite: StateId, name: &'static str) -> StateId {
        self.add_history(composite, name, HistoryKind::Deep)
    }

    /// Transition taken through `history` while it has nothing recorded.
    pub fn history_default(&mut self, history: StateId, transition: Transition<D, P>) -> &mut Self {
        match self.vertices.get_mut(history.index()).map(|v| &mut v.kind) {
            Some(VertexKind::History(node)) => node.default = Some(transition),
            _ => self.reject_vertex(history),
        }
        self
    }

    pub fn choice(&mut self, name: &'static str) -> StateId {
        self.push(Vertex {
            name,
            kind: VertexKind::Choice(ChoiceNode {
                branches: Vec::new(),
            }),
        })
    }

    /// Appends a branch to `choice`. An unguarded branch is the else-branch
    /// and always matches, so it belongs last.
    pub fn branch(&mut self, choice: StateId, transition: Transition<D, P>) -> &mut Self {
        match self.vertices.get_mut(choice.index()).map(|v| &mut v.kind) {
            Some(VertexKind::Choice(node)) => node.branches.push(transition),
            _ => self.reject_vertex(choice),
        }
        self
    }

    /// Validates the model.
    pub fn build(self) -> Result<StateChart<D, P>, ModelError> {
        if let Some(err) = self.errors.first() {
            return Err(err.clone());
        }
        let Some(initial) = self.initial else {
            return Err(ModelError::MissingTopInitial);
        };
        let chart = StateChart {
            name: self.name,
            vertices: self.vertices,
            initial,
        };
        validate(&chart)?;
        log::debug!(
            "statechart `{}` built with {} vertices",
            chart.name,
            chart.vertices.len()
        );
        Ok(chart)
    }

    fn add_state(&mut self, name: &'static str, parent: Option<StateId>) -> StateId {
        self.push(Vertex {
            name,
            kind: VertexKind::State(StateNode {
                parent,
                children: 0,
                entry: None,
                exit: None,
                initial: None,
                history: None,
                rows: Vec::new(),
                preprocess: None,
                is_final: false,
            }),
        })
    }

    fn add_history(&mut self, composite: StateId, name: &'static str, kind: HistoryKind) -> StateId {
        let id = StateId(self.vertices.len() as u16);
        let duplicate = match self.state_mut(composite) {
            Some(node) if node.history.is_some() => true,
            Some(node) => {
                node.history = Some(id);
                false
            }
            None => false,
        };
        if duplicate {
            let owner = self.vertices[composite.index()].name;
            self.errors.push(ModelError::DuplicateHistory(owner));
        }
        self.push(Vertex {
            name,
            kind: VertexKind::History(HistoryNode {
                kind,
                parent: composite,
                default: None,
            }),
        })
    }

    fn push(&mut self, vertex: Vertex<D, P>) -> StateId {
        if self.vertices.len() >= u16::MAX as usize {
            self.errors.push(ModelError::TooManyVertices);
        }
        self.vertices.push(vertex);
        StateId((self.vertices.len() - 1) as u16)
    }

    fn state_mut(&mut self, id: StateId) -> Option<&mut StateNode<D, P>> {
        let valid = matches!(
            self.vertices.get(id.index()).map(|v| &v.kind),
            Some(VertexKind::State(_))
        );
        if !valid {
            self.reject_vertex(id);
            return None;
        }
        match &mut self.vertices[id.index()].kind {
            VertexKind::State(node) => Some(node),
            _ => None,
        }
    }

    fn reject_vertex(&mut self, id: StateId) {
        let err = match self.vertices.get(id.index()) {
            Some(v) => ModelError::NotAState(v.name),
            None => ModelError::UnknownVertex(id),
        };
        self.errors.push(err);
    }
}

fn validate<D, P: ?Sized>(chart: &StateChart<D, P>) -> Result<(), ModelError> {
    let exists = |id: StateId| {
        if chart.vertex(id).is_some() {
            Ok(())
        } else {
            Err(ModelError::UnknownVertex(id))
        }
    };

    exists(chart.initial.target)?;

    for (index, vertex) in chart.vertices.iter().enumerate() {
        match &vertex.kind {
            VertexKind::State(node) => {
                if node.is_final
                    && (node.is_composite()
                        || !node.rows.is_empty()
                        || node.entry.is_some()
                        || node.exit.is_some()
                        || node.preprocess.is_some())
                {
                    return Err(ModelError::FinalStateNotEmpty(vertex.name));
                }
                for (_, row) in &node.rows {
                    if let Some(target) = row.target {
                        exists(target)?;
                    }
                }
                match (&node.initial, node.is_composite()) {
                    (None, true) => return Err(ModelError::MissingInitial(vertex.name)),
                    (Some(_), false) => return Err(ModelError::InitialOnSimpleState(vertex.name)),
                    (Some(init), true) => {
                        exists(init.target)?;
                        let id = StateId(index as u16);
                        if !initial_target_nested(chart, id, init.target) {
                            return Err(ModelError::InitialNotNested {
                                state: vertex.name,
                                target: chart.vertex_name(init.target),
                            });
                        }
                    }
                    (None, false) => {}
                }
            }
            VertexKind::Choice(node) => {
                if node.branches.is_empty() {
                    return Err(ModelError::EmptyChoice(vertex.name));
                }
                for branch in &node.branches {
                    exists(branch.target.ok_or(ModelError::MissingTarget(vertex.name))?)?;
                }
            }
            VertexKind::History(node) => {
                if !chart.is_composite(node.parent) {
                    return Err(ModelError::HistoryOnSimpleState(vertex.name));
                }
                if let Some(default) = &node.default {
                    exists(default.target.ok_or(ModelError::MissingTarget(vertex.name))?)?;
                }
            }
        }
    }
    Ok(())
}

impl<D, P: ?Sized> StateChart<D, P> {
    /// True if `id` is `ancestor` or nested somewhere below it.
    pub(crate) fn is_within(&self, id: StateId, ancestor: StateId) -> bool {
        let mut cursor = Some(id);
        while let Some(s) = cursor {
            if s == ancestor {
                return true;
            }
            cursor = self.state(s).and_then(|n| n.parent);
        }
        false
    }
}

/// A composite's initial transition must lead strictly inside it. Choice
/// targets are checked when taken.
fn initial_target_nested<D, P: ?Sized>(
    chart: &StateChart<D, P>,
    composite: StateId,
    target: StateId,
) -> bool {
    match chart.vertex(target).map(|v| &v.kind) {
        Some(VertexKind::State(_)) => target != composite && chart.is_within(target, composite),
        Some(VertexKind::History(h)) => chart.is_within(h.parent, composite),
        Some(VertexKind::Choice(_)) => true,
        None => false,
    }
}
