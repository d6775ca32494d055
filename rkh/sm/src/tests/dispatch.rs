use std::sync::Arc;

use rkh_core::{Event, Signal};
use rkh_trc::{RecordingSink, TraceRecord, Tracer};

use super::chart::*;
use crate::{DispatchResult, Hsm};

#[test]
fn init_enters_top_initial_target() {
    let (chart, ids) = demo_chart();
    let mut hsm = Hsm::new(chart);
    let mut demo = Demo::default();

    assert_eq!(hsm.state(), None);
    assert_eq!(hsm.init(&mut demo, &()), DispatchResult::HandledTransition);
    assert_eq!(hsm.state(), Some(ids.s0));
    assert_eq!(demo.take(), ["enter s0"]);
}

#[test]
#[should_panic(expected = "already initialized")]
fn init_twice_is_fatal() {
    let (mut hsm, mut demo, _) = started();
    hsm.init(&mut demo, &());
}

#[test]
fn transition_drills_through_initials() {
    let (mut hsm, mut demo, ids) = started();

    assert_eq!(send(&mut hsm, &mut demo, A), DispatchResult::HandledTransition);
    assert_eq!(
        demo.take(),
        ["exit s0", "enter s2", "enter s22", "enter s221", "enter s2211"]
    );
    assert_eq!(hsm.state(), Some(ids.s2211));
    assert!(hsm.is_in(ids.s2));
    assert!(hsm.is_in(ids.s22));
    assert!(!hsm.is_in(ids.s21));
}

#[test]
fn exits_up_to_lca_then_action_then_entries() {
    let (mut hsm, mut demo, ids) = started();
    demo.x = 1;
    send(&mut hsm, &mut demo, K);
    send(&mut hsm, &mut demo, I);
    assert_eq!(hsm.state(), Some(ids.s211));
    demo.take();

    assert_eq!(send(&mut hsm, &mut demo, B), DispatchResult::HandledTransition);
    assert_eq!(
        demo.take(),
        ["exit s211", "exit s21", "exit s2", "act b", "enter s1", "enter s11"]
    );
    assert_eq!(hsm.state(), Some(ids.s11));
}

#[test]
fn transition_to_enclosing_composite_is_local() {
    let (mut hsm, mut demo, ids) = started();
    demo.x = 1;
    send(&mut hsm, &mut demo, K);
    send(&mut hsm, &mut demo, I);
    demo.take();

    assert_eq!(send(&mut hsm, &mut demo, C), DispatchResult::HandledTransition);
    assert_eq!(
        demo.take(),
        ["exit s211", "exit s21", "init s2", "enter s21", "enter s211"]
    );
    assert_eq!(hsm.state(), Some(ids.s211));
}

#[test]
fn loop_on_composite_reenters_through_initial() {
    let (mut hsm, mut demo, ids) = started();
    send(&mut hsm, &mut demo, G);
    demo.take();

    assert_eq!(send(&mut hsm, &mut demo, D), DispatchResult::HandledTransition);
    assert_eq!(demo.take(), ["exit s31", "init s3", "enter s31"]);
    assert_eq!(hsm.state(), Some(ids.s31));

    let (mut hsm, mut demo, ids) = started();
    send(&mut hsm, &mut demo, A);
    demo.take();

    assert_eq!(send(&mut hsm, &mut demo, E), DispatchResult::HandledTransition);
    assert_eq!(
        demo.take(),
        ["exit s2211", "exit s221", "enter s221", "enter s2211"]
    );
    assert_eq!(hsm.state(), Some(ids.s2211));
}

#[test]
fn self_transition_on_leaf_exits_and_reenters() {
    let (mut hsm, mut demo, ids) = started();

    assert_eq!(send(&mut hsm, &mut demo, F), DispatchResult::HandledTransition);
    assert_eq!(demo.take(), ["exit s0", "enter s0"]);
    assert_eq!(hsm.state(), Some(ids.s0));
}

#[test]
fn sibling_transition_exits_only_below_lca() {
    let (mut hsm, mut demo, ids) = started();
    send(&mut hsm, &mut demo, A);
    demo.take();

    send(&mut hsm, &mut demo, M);
    assert_eq!(demo.take(), ["exit s2211", "enter s2212"]);
    assert_eq!(hsm.state(), Some(ids.s2212));
}

#[test]
fn internal_transition_keeps_state() {
    let (mut hsm, mut demo, ids) = started();
    send(&mut hsm, &mut demo, A);
    demo.take();

    assert_eq!(send(&mut hsm, &mut demo, H), DispatchResult::HandledInternal);
    assert_eq!(demo.take(), ["act h"]);
    assert_eq!(hsm.state(), Some(ids.s2211));
    assert_eq!(hsm.info().transitions, 1);
}

#[test]
fn false_guard_falls_through_to_next_row() {
    let (mut hsm, mut demo, ids) = started();

    let result = send(&mut hsm, &mut demo, G);
    assert_eq!(result, DispatchResult::HandledTransition);
    assert!(result.is_handled());
    assert_eq!(
        demo.take(),
        ["exit s0", "act g", "enter s3", "init s3", "enter s31"]
    );
    assert_eq!(hsm.state(), Some(ids.s31));
}

#[test]
fn only_false_guards_report_guard_false() {
    let (mut hsm, mut demo, ids) = started();
    send(&mut hsm, &mut demo, G);
    demo.take();

    assert_eq!(send(&mut hsm, &mut demo, G), DispatchResult::GuardFalse);
    assert!(demo.take().is_empty());
    assert_eq!(hsm.state(), Some(ids.s31));
}

#[test]
fn unknown_signal_changes_nothing() {
    let (mut hsm, mut demo, ids) = started();
    demo.x = 1;
    send(&mut hsm, &mut demo, K);
    send(&mut hsm, &mut demo, I);
    send(&mut hsm, &mut demo, B);
    demo.take();
    let before = (hsm.state(), hsm.history(ids.h2), hsm.history(ids.dh22));

    let result = send(&mut hsm, &mut demo, Signal(99));
    assert_eq!(result, DispatchResult::NotHandled);
    assert!(!result.is_error());
    assert!(demo.take().is_empty());
    assert_eq!(
        (hsm.state(), hsm.history(ids.h2), hsm.history(ids.dh22)),
        before
    );
}

#[test]
fn choice_takes_first_enabled_branch() {
    let (mut hsm, mut demo, ids) = started();
    demo.x = 5;
    assert_eq!(send(&mut hsm, &mut demo, K), DispatchResult::HandledTransition);
    assert_eq!(demo.take(), ["exit s0", "act pos", "enter s1", "enter s11"]);
    assert_eq!(hsm.state(), Some(ids.s11));

    let (mut hsm, mut demo, ids) = started();
    demo.x = -5;
    assert_eq!(send(&mut hsm, &mut demo, K), DispatchResult::HandledTransition);
    assert_eq!(
        demo.take(),
        ["exit s0", "enter s3", "init s3", "enter s31"]
    );
    assert_eq!(hsm.state(), Some(ids.s31));
}

#[test]
fn choice_without_enabled_branch_exits_nothing() {
    let (mut hsm, mut demo, ids) = started();
    demo.x = 0;

    assert_eq!(send(&mut hsm, &mut demo, K), DispatchResult::ConditionNotFound);
    assert!(demo.take().is_empty());
    assert_eq!(hsm.state(), Some(ids.s0));
}

#[test]
fn composite_or_missing_state_is_unknown() {
    let (mut hsm, mut demo, ids) = started();
    hsm.set_state(ids.s2);
    assert_eq!(send(&mut hsm, &mut demo, H), DispatchResult::UnknownState);

    hsm.set_state(ids.c1);
    assert_eq!(send(&mut hsm, &mut demo, H), DispatchResult::UnknownState);

    let (chart, _) = demo_chart();
    let mut fresh = Hsm::new(chart);
    let result = fresh.dispatch(&mut demo, &(), &Event::Signal(A));
    assert_eq!(result, DispatchResult::UnknownState);
    assert!(result.is_error());
    assert!(demo.take().is_empty());
}

#[test]
fn counters_track_received_and_transitions() {
    let (mut hsm, mut demo, _) = started();
    send(&mut hsm, &mut demo, F);
    send(&mut hsm, &mut demo, Signal(99));
    send(&mut hsm, &mut demo, A);
    send(&mut hsm, &mut demo, H);

    let info = hsm.info();
    assert_eq!(info.received, 4);
    assert_eq!(info.transitions, 2);
}

#[test]
fn dispatch_emits_trace_records_in_order() {
    let sink = Arc::new(RecordingSink::new());
    let (chart, _) = demo_chart();
    let mut hsm = Hsm::new(chart).with_tracer(Tracer::new(sink.clone()), 3);
    let mut demo = Demo::default();
    hsm.init(&mut demo, &());
    assert_eq!(
        sink.take(),
        [
            TraceRecord::EnterState { ao: Some(3), state: "s0" },
            TraceRecord::SmInit { ao: Some(3), state: "s0" },
        ]
    );

    send(&mut hsm, &mut demo, F);
    assert_eq!(
        sink.take(),
        [
            TraceRecord::Dispatch { ao: Some(3), signal: F, state: "s0" },
            TraceRecord::Transition { ao: Some(3), source: "s0", target: "s0" },
            TraceRecord::Segments { ao: Some(3), count: 1 },
            TraceRecord::ExitState { ao: Some(3), state: "s0" },
            TraceRecord::EnterState { ao: Some(3), state: "s0" },
            TraceRecord::EntryExitCount { ao: Some(3), entered: 1, exited: 1 },
            TraceRecord::State { ao: Some(3), state: "s0" },
        ]
    );

    send(&mut hsm, &mut demo, Signal(99));
    assert_eq!(
        sink.take(),
        [
            TraceRecord::Dispatch { ao: Some(3), signal: Signal(99), state: "s0" },
            TraceRecord::EventNotFound { ao: Some(3), signal: Signal(99) },
        ]
    );
}
