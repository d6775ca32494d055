//! Running instance of a statechart.

use std::sync::Arc;

use rkh_core::{require, Event, Signal};
use rkh_trc::{TraceRecord, Tracer};

use crate::model::{StateChart, StateId, VertexKind};
use crate::transition::{entry_path, recorded_state, Path, TransitionPlan};
use crate::{DispatchResult, MAX_HIERARCHY_DEPTH, MAX_TRANSITION_SEGMENTS};

/// Per-machine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SmInfo {
    /// Events dispatched, handled or not. Completion events are not counted.
    pub received: u32,
    /// Transitions with a target that completed, completion transitions
    /// included.
    pub transitions: u32,
}

/// Hierarchical state machine: a shared chart plus the per-instance
/// current state and history memory.
pub struct Hsm<D, P: ?Sized = ()> {
    chart: Arc<StateChart<D, P>>,
    state: Option<StateId>,
    history: Vec<Option<StateId>>,
    info: SmInfo,
    tracer: Tracer,
    ao: Option<u8>,
}

impl<D, P: ?Sized> Hsm<D, P> {
    pub fn new(chart: Arc<StateChart<D, P>>) -> Self {
        let history = vec![None; chart.len()];
        Self {
            chart,
            state: None,
            history,
            info: SmInfo::default(),
            tracer: Tracer::disabled(),
            ao: None,
        }
    }

    /// Emits trace records tagged with the owning active object's priority.
    pub fn with_tracer(mut self, tracer: Tracer, ao: u8) -> Self {
        self.set_tracer(tracer, ao);
        self
    }

    pub fn set_tracer(&mut self, tracer: Tracer, ao: u8) {
        self.tracer = tracer;
        self.ao = Some(ao);
    }

    pub fn chart(&self) -> &Arc<StateChart<D, P>> {
        &self.chart
    }

    /// Current leaf state, `None` before [`Hsm::init`].
    pub fn state(&self) -> Option<StateId> {
        self.state
    }

    pub fn state_name(&self) -> &'static str {
        self.state.map_or("<uninitialized>", |s| self.chart.vertex_name(s))
    }

    /// True if `state` is the current leaf or one of its ancestors.
    pub fn is_in(&self, state: StateId) -> bool {
        self.state
            .is_some_and(|current| self.chart.is_within(current, state))
    }

    /// Forces the current state without running any action.
    pub fn set_state(&mut self, state: StateId) {
        self.state = Some(state);
    }

    /// State recorded by history pseudostate `history`.
    pub fn history(&self, history: StateId) -> Option<StateId> {
        self.history.get(history.index()).copied().flatten()
    }

    pub fn clear_history(&mut self) {
        self.history.iter_mut().for_each(|h| *h = None);
        self.tracer.emit(TraceRecord::ClearHistory { ao: self.ao });
    }

    pub fn info(&self) -> SmInfo {
        self.info
    }

    /// Takes the top-level initial transition and drills down to a leaf.
    pub fn init(&mut self, data: &mut D, port: &P) -> DispatchResult {
        require!(self.state.is_none(), "state machine already initialized");
        let chart = Arc::clone(&self.chart);
        let event = Event::Signal(Signal::INIT);
        let initial = chart.initial();

        let mut plan = TransitionPlan::new(initial.action);
        let planned = plan
            .resolve(&chart, &self.history, data, port, &event, initial.target)
            .and_then(|target| entry_path(&chart, None, target));
        let entries = match planned {
            Ok(entries) => entries,
            Err(result) => return self.fail(result, event.signal()),
        };

        for action in &plan.actions {
            action(data, port, &event);
        }
        self.enter(&chart, data, port, &entries);
        if let Some(&target) = entries.last() {
            self.state = Some(target);
            if let Err(result) = self.drill(&chart, data, port, &event, target) {
                return self.fail(result, event.signal());
            }
        }

        log::debug!("{}: initialized in `{}`", chart.name(), self.state_name());
        self.tracer.emit(TraceRecord::SmInit {
            ao: self.ao,
            state: self.state_name(),
        });
        self.complete(data, port)
    }

    /// Processes one event to completion, completion transitions included.
    pub fn dispatch(&mut self, data: &mut D, port: &P, event: &Event) -> DispatchResult {
        self.info.received = self.info.received.wrapping_add(1);
        match self.step(data, port, event) {
            DispatchResult::HandledTransition => self.complete(data, port),
            result => result,
        }
    }

    /// Dispatches completion events while the current leaf raises them.
    /// A completion event nobody takes leaves the machine where it is.
    fn complete(&mut self, data: &mut D, port: &P) -> DispatchResult {
        let event = Event::Signal(Signal::COMPLETION);
        let mut taken = 0;
        while self
            .state
            .and_then(|s| self.chart.state(s))
            .is_some_and(|node| node.awaits_completion())
        {
            taken += 1;
            if taken > MAX_TRANSITION_SEGMENTS {
                return self.fail(DispatchResult::ExceededTransitionSegments, Signal::COMPLETION);
            }
            match self.step(data, port, &event) {
                DispatchResult::HandledTransition => {}
                result if result.is_error() => return result,
                _ => break,
            }
        }
        DispatchResult::HandledTransition
    }

    /// One run-to-completion step for `event`, without completion events.
    fn step(&mut self, data: &mut D, port: &P, event: &Event) -> DispatchResult {
        let chart = Arc::clone(&self.chart);
        let signal = event.signal();

        let leaf = match self.state {
            Some(s) if chart.state(s).is_some_and(|node| !node.is_composite()) => s,
            _ => return self.fail(DispatchResult::UnknownState, signal),
        };
        self.tracer.emit(TraceRecord::Dispatch {
            ao: self.ao,
            signal,
            state: chart.vertex_name(leaf),
        });

        // Search outward for the first enabled row.
        let mut guarded = false;
        let mut walked = 0;
        let mut cursor = Some(leaf);
        let found = loop {
            let Some(state) = cursor else { break None };
            walked += 1;
            if walked > MAX_HIERARCHY_DEPTH {
                return self.fail(DispatchResult::ExceededHierarchyDepth, signal);
            }
            let Some(node) = chart.state(state) else {
                return self.fail(DispatchResult::UnknownState, signal);
            };
            let input = node.input(data, port, event);
            let row = node.rows.iter().find(|(sig, row)| {
                if *sig != input {
                    return false;
                }
                match row.guard {
                    Some(guard) if !guard(data, port, event) => {
                        guarded = true;
                        false
                    }
                    _ => true,
                }
            });
            if let Some((_, row)) = row {
                break Some((state, *row));
            }
            cursor = node.parent;
        };

        let Some((source, row)) = found else {
            return if guarded {
                self.tracer.emit(TraceRecord::GuardFalse { ao: self.ao, signal });
                DispatchResult::GuardFalse
            } else {
                self.tracer
                    .emit(TraceRecord::EventNotFound { ao: self.ao, signal });
                DispatchResult::NotHandled
            };
        };

        let Some(target) = row.target else {
            if let Some(action) = row.action {
                action(data, port, event);
            }
            return DispatchResult::HandledInternal;
        };

        let mut plan = TransitionPlan::new(row.action);
        let planned = plan
            .resolve(&chart, &self.history, data, port, event, target)
            .and_then(|_| plan.layout(&chart, leaf, source));
        if let Err(result) = planned {
            return self.fail(result, signal);
        }
        let Some(target) = plan.target else {
            return self.fail(DispatchResult::UnknownState, signal);
        };
        self.tracer.emit(TraceRecord::Transition {
            ao: self.ao,
            source: chart.vertex_name(source),
            target: chart.vertex_name(target),
        });
        self.tracer.emit(TraceRecord::Segments {
            ao: self.ao,
            count: plan.segments() as u8,
        });

        self.exit(&chart, data, port, &plan.exits, leaf);
        for action in &plan.actions {
            action(data, port, event);
        }
        self.enter(&chart, data, port, &plan.entries);
        self.tracer.emit(TraceRecord::EntryExitCount {
            ao: self.ao,
            entered: plan.entries.len() as u8,
            exited: plan.exits.len() as u8,
        });
        self.state = Some(target);

        if let Err(result) = self.drill(&chart, data, port, event, target) {
            return self.fail(result, signal);
        }

        self.info.transitions = self.info.transitions.wrapping_add(1);
        self.tracer.emit(TraceRecord::State {
            ao: self.ao,
            state: self.state_name(),
        });
        DispatchResult::HandledTransition
    }

    /// Follows initial transitions from `state` until a leaf is active.
    /// Each step is checked against the nesting limit before it runs; on
    /// error the machine stays in the last state entered.
    fn drill(
        &mut self,
        chart: &StateChart<D, P>,
        data: &mut D,
        port: &P,
        event: &Event,
        mut state: StateId,
    ) -> Result<(), DispatchResult> {
        while chart.is_composite(state) {
            let initial = chart
                .state(state)
                .and_then(|node| node.initial.as_ref())
                .ok_or(DispatchResult::UnknownState)?;
            let mut plan = TransitionPlan::new(initial.action);
            let next = plan.resolve(chart, &self.history, data, port, event, initial.target)?;
            if next == state || !chart.is_within(next, state) {
                return Err(DispatchResult::UnknownState);
            }
            if chart.depth(next) > MAX_HIERARCHY_DEPTH {
                return Err(DispatchResult::ExceededHierarchyDepth);
            }
            let entries = entry_path(chart, Some(state), next)?;

            for action in &plan.actions {
                action(data, port, event);
            }
            self.enter(chart, data, port, &entries);
            state = next;
            self.state = Some(state);
        }
        Ok(())
    }

    fn exit(&mut self, chart: &StateChart<D, P>, data: &mut D, port: &P, path: &Path, leaf: StateId) {
        for &state in path {
            let Some(node) = chart.state(state) else {
                continue;
            };
            if let Some(exit) = node.exit {
                exit(data, port);
            }
            self.tracer.emit(TraceRecord::ExitState {
                ao: self.ao,
                state: chart.vertex_name(state),
            });

            let history = node
                .parent
                .and_then(|parent| chart.state(parent))
                .and_then(|parent| parent.history);
            if let Some(h) = history {
                if let Some(VertexKind::History(hist)) = chart.vertex(h).map(|v| &v.kind) {
                    self.history[h.index()] = Some(recorded_state(hist.kind, state, leaf));
                }
            }
        }
    }

    fn enter(&mut self, chart: &StateChart<D, P>, data: &mut D, port: &P, path: &Path) {
        for &state in path {
            if let Some(entry) = chart.state(state).and_then(|node| node.entry) {
                entry(data, port);
            }
            self.tracer.emit(TraceRecord::EnterState {
                ao: self.ao,
                state: chart.vertex_name(state),
            });
        }
    }

    fn fail(&self, result: DispatchResult, signal: Signal) -> DispatchResult {
        log::warn!(
            "{}: {} while dispatching {} in `{}`",
            self.chart.name(),
            result,
            signal,
            self.state_name()
        );
        let ao = self.ao;
        let record = match result {
            DispatchResult::GuardFalse => TraceRecord::GuardFalse { ao, signal },
            DispatchResult::ConditionNotFound => TraceRecord::ConditionNotFound { ao, signal },
            DispatchResult::ExceededHierarchyDepth => TraceRecord::ExceededDepth { ao, signal },
            DispatchResult::ExceededTransitionSegments => {
                TraceRecord::ExceededSegments { ao, signal }
            }
            _ => TraceRecord::UnknownState { ao, signal },
        };
        self.tracer.emit(record);
        result
    }
}

impl<D, P: ?Sized> core::fmt::Debug for Hsm<D, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hsm")
            .field("chart", &self.chart.name())
            .field("state", &self.state_name())
            .field("info", &self.info)
            .finish()
    }
}
