use std::sync::Arc;

use rkh_core::{Event, Signal};

use crate::{
    ChartBuilder, DispatchResult, Hsm, ModelError, StateId, Transition, MAX_TRANSITION_SEGMENTS,
};

const GO: Signal = Signal(1);
const NEXT: Signal = Signal(2);
const RESET: Signal = Signal(3);
const DIGIT: Signal = Signal(4);

#[derive(Default)]
struct Job {
    trail: Vec<&'static str>,
    ready: bool,
}

impl Job {
    fn take(&mut self) -> Vec<&'static str> {
        std::mem::take(&mut self.trail)
    }
}

fn exit_store(job: &mut Job, _: &()) {
    job.trail.push("exit store");
}
fn exit_work(job: &mut Job, _: &()) {
    job.trail.push("exit work");
}
fn enter_idle(job: &mut Job, _: &()) {
    job.trail.push("enter idle");
}
fn enter_flash(job: &mut Job, _: &()) {
    job.trail.push("enter flash");
}
fn finished(job: &mut Job, _: &(), event: &Event) {
    assert_eq!(event.signal(), Signal::COMPLETION);
    job.trail.push("finished");
}
fn blink(job: &mut Job, _: &(), _: &Event) {
    job.trail.push("blink");
}
fn digit(job: &mut Job, _: &(), _: &Event) {
    job.trail.push("digit");
}
fn is_ready(job: &Job, _: &(), _: &Event) -> bool {
    job.ready
}
fn keys(_: &Job, _: &(), event: &Event) -> Signal {
    match event.signal() {
        Signal(30..=39) => DIGIT,
        other => other,
    }
}

struct Ids {
    idle: StateId,
    work: StateId,
    store: StateId,
    done: StateId,
    flash: StateId,
}

/// `idle --GO--> work{fetch -> store -> done(final)}`; `work` completes to
/// `idle` and resets on `RESET`. `idle --NEXT--> flash`, a state that
/// leaves for `idle` on completion once the job is ready.
fn job_chart(work_completes: bool) -> (Hsm<Job>, Job, Ids) {
    let mut b = ChartBuilder::<Job>::new("job");
    let idle = b.state("idle");
    let work = b.state("work");
    let fetch = b.substate(work, "fetch");
    let store = b.substate(work, "store");
    let done = b.final_state(work, "done");
    let flash = b.state("flash");
    b.initial(work, fetch, None);
    b.on(idle, GO, Transition::to(work))
        .on(idle, NEXT, Transition::to(flash))
        .on(fetch, NEXT, Transition::to(store))
        .on(store, NEXT, Transition::to(done))
        .on(work, RESET, Transition::to(idle));
    if work_completes {
        b.on_completion(work, Transition::to(idle).action(finished));
    }
    b.on_completion(flash, Transition::to(idle).guard(is_ready).action(blink));
    b.entry(idle, enter_idle)
        .entry(flash, enter_flash)
        .exit(store, exit_store)
        .exit(work, exit_work);
    b.top_initial(idle, None);

    let mut hsm = Hsm::new(Arc::new(b.build().expect("job chart")));
    let mut job = Job::default();
    hsm.init(&mut job, &());
    job.take();
    let ids = Ids {
        idle,
        work,
        store,
        done,
        flash,
    };
    (hsm, job, ids)
}

fn send(hsm: &mut Hsm<Job>, job: &mut Job, signal: Signal) -> DispatchResult {
    hsm.dispatch(job, &(), &Event::Signal(signal))
}

#[test]
fn entering_final_state_completes_the_parent() {
    let (mut hsm, mut job, ids) = job_chart(true);
    send(&mut hsm, &mut job, GO);
    send(&mut hsm, &mut job, NEXT);
    assert_eq!(hsm.state(), Some(ids.store));
    job.take();

    assert_eq!(send(&mut hsm, &mut job, NEXT), DispatchResult::HandledTransition);
    assert_eq!(job.take(), ["exit store", "exit work", "finished", "enter idle"]);
    assert_eq!(hsm.state(), Some(ids.idle));
    assert_eq!(hsm.info().received, 3);
    assert_eq!(hsm.info().transitions, 4);
}

#[test]
fn final_state_without_completion_row_waits() {
    let (mut hsm, mut job, ids) = job_chart(false);
    send(&mut hsm, &mut job, GO);
    send(&mut hsm, &mut job, NEXT);

    assert_eq!(send(&mut hsm, &mut job, NEXT), DispatchResult::HandledTransition);
    assert_eq!(hsm.state(), Some(ids.done));
    assert!(hsm.chart().is_final(ids.done));
    assert!(hsm.is_in(ids.work));

    assert_eq!(send(&mut hsm, &mut job, GO), DispatchResult::NotHandled);
    job.take();
    assert_eq!(send(&mut hsm, &mut job, RESET), DispatchResult::HandledTransition);
    assert_eq!(job.take(), ["exit work", "enter idle"]);
}

#[test]
fn simple_state_takes_completion_transition_on_entry() {
    let (mut hsm, mut job, ids) = job_chart(true);
    job.ready = true;

    assert_eq!(send(&mut hsm, &mut job, NEXT), DispatchResult::HandledTransition);
    assert_eq!(job.take(), ["enter flash", "blink", "enter idle"]);
    assert_eq!(hsm.state(), Some(ids.idle));
}

#[test]
fn false_completion_guard_keeps_the_state() {
    let (mut hsm, mut job, ids) = job_chart(true);

    assert_eq!(send(&mut hsm, &mut job, NEXT), DispatchResult::HandledTransition);
    assert_eq!(job.take(), ["enter flash"]);
    assert_eq!(hsm.state(), Some(ids.flash));

    // No completion is raised again until the state is re-entered.
    job.ready = true;
    assert_eq!(send(&mut hsm, &mut job, GO), DispatchResult::NotHandled);
    assert_eq!(hsm.state(), Some(ids.flash));
}

#[test]
fn initial_transition_into_completing_state() {
    let mut b = ChartBuilder::<Job>::new("boot");
    let flash = b.state("flash");
    let idle = b.state("idle");
    b.on_completion(flash, Transition::to(idle).action(blink));
    b.entry(flash, enter_flash).entry(idle, enter_idle);
    b.top_initial(flash, None);

    let mut hsm = Hsm::new(Arc::new(b.build().expect("boot chart")));
    let mut job = Job::default();
    assert_eq!(hsm.init(&mut job, &()), DispatchResult::HandledTransition);
    assert_eq!(job.take(), ["enter flash", "blink", "enter idle"]);
    assert_eq!(hsm.state(), Some(idle));
}

#[test]
fn endless_completion_chain_is_cut_off() {
    let mut b = ChartBuilder::<Job>::new("ping");
    let ping = b.state("ping");
    let pong = b.state("pong");
    b.on_completion(ping, Transition::to(pong));
    b.on_completion(pong, Transition::to(ping));
    b.top_initial(ping, None);

    let mut hsm = Hsm::new(Arc::new(b.build().expect("ping chart")));
    let result = hsm.init(&mut Job::default(), &());
    assert_eq!(result, DispatchResult::ExceededTransitionSegments);
    assert_eq!(hsm.info().transitions as usize, MAX_TRANSITION_SEGMENTS);
}

#[test]
fn preprocessor_maps_events_for_its_state_only() {
    let mut b = ChartBuilder::<Job>::new("keypad");
    let panel = b.state("panel");
    let entry = b.substate(panel, "entry");
    b.initial(panel, entry, None);
    b.preprocessor(entry, keys);
    b.on(entry, DIGIT, Transition::internal().action(digit));
    b.on(panel, Signal(35), Transition::internal().action(blink));
    b.top_initial(panel, None);

    let mut hsm = Hsm::new(Arc::new(b.build().expect("keypad chart")));
    let mut job = Job::default();
    hsm.init(&mut job, &());

    assert_eq!(send(&mut hsm, &mut job, Signal(35)), DispatchResult::HandledInternal);
    assert_eq!(send(&mut hsm, &mut job, DIGIT), DispatchResult::HandledInternal);
    assert_eq!(send(&mut hsm, &mut job, Signal(40)), DispatchResult::NotHandled);
    assert_eq!(job.take(), ["digit", "digit"]);
}

#[test]
fn final_state_must_stay_empty() {
    fn build(setup: fn(&mut ChartBuilder<Job>, StateId, StateId)) -> ModelError {
        let mut b = ChartBuilder::<Job>::new("m");
        let outer = b.state("outer");
        let inner = b.substate(outer, "inner");
        let done = b.final_state(outer, "done");
        b.initial(outer, inner, None);
        b.top_initial(outer, None);
        setup(&mut b, done, inner);
        b.build().unwrap_err()
    }

    let expected = ModelError::FinalStateNotEmpty("done");
    assert_eq!(
        build(|b, done, inner| {
            b.on(done, GO, Transition::to(inner));
        }),
        expected
    );
    assert_eq!(
        build(|b, done, _| {
            b.entry(done, enter_idle);
        }),
        expected
    );
    assert_eq!(
        build(|b, done, _| {
            b.preprocessor(done, keys);
        }),
        expected
    );
    assert_eq!(
        build(|b, done, _| {
            let below = b.substate(done, "below");
            b.initial(done, below, None);
        }),
        expected
    );
}
