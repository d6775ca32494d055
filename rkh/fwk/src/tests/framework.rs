use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rkh_core::{Event, Priority, Signal, StaticEvent};
use rkh_trc::{RecordingSink, TraceRecord, Tracer};

use crate::{ConfigError, EventQueue, Framework, KernelConfig, TimerId};

const TICK: Signal = Signal(20);
static READING: StaticEvent = StaticEvent::with_payload(Signal(21), &[1, 2, 3]);

fn prio(n: u8) -> Priority {
    Priority::new(n)
}

fn framework() -> Framework {
    let fwk = Framework::new(KernelConfig::default()).expect("default config is valid");
    for p in [1, 3, 5] {
        fwk.install_queue(prio(p), 4);
    }
    fwk
}

fn with_pool() -> Framework {
    let fwk = framework();
    fwk.register_pool(vec![0; 16 * 4], 16);
    fwk
}

fn drain(fwk: &Framework) -> Vec<(u8, Signal)> {
    let mut out = Vec::new();
    while let Some((p, event)) = fwk.next_event() {
        out.push((p.raw(), event.signal()));
        fwk.gc(event);
    }
    out
}

#[test]
fn invalid_config_is_rejected() {
    let err = Framework::new(KernelConfig::builder().max_active(0).build()).unwrap_err();
    assert_eq!(err, ConfigError::MaxActive(0));

    let err = Framework::new(KernelConfig::builder().max_channels(200).build()).unwrap_err();
    assert_eq!(err, ConfigError::MaxChannels(200));
}

#[test]
fn post_marks_ready_and_get_clears() {
    let fwk = framework();
    assert!(fwk.ready_set().is_empty());

    fwk.post_fifo(prio(3), Event::Signal(Signal(1)));
    assert!(fwk.is_ready(prio(3)));
    assert_eq!(fwk.queue_len(prio(3)), 1);

    assert_eq!(drain(&fwk), [(3, Signal(1))]);
    assert!(!fwk.is_ready(prio(3)));
    assert_eq!(fwk.queue_info(prio(3)).map(|i| i.puts), Some(1));
}

#[test]
fn most_urgent_queue_is_served_first() {
    let fwk = framework();
    fwk.post_fifo(prio(5), Event::Signal(Signal(1)));
    fwk.post_fifo(prio(1), Event::Signal(Signal(2)));
    fwk.post_lifo(prio(5), Event::Signal(Signal(3)));

    assert_eq!(
        drain(&fwk),
        [(1, Signal(2)), (5, Signal(3)), (5, Signal(1))]
    );
}

#[test]
#[should_panic(expected = "post to unregistered active object")]
fn post_to_unregistered_priority_is_fatal() {
    let fwk = framework();
    fwk.post_fifo(prio(2), Event::Signal(Signal(1)));
}

#[test]
fn frameworks_are_independent() {
    let a = framework();
    let b = framework();
    a.post_fifo(prio(1), Event::Signal(Signal(1)));

    assert!(a.is_ready(prio(1)));
    assert!(b.ready_set().is_empty());
}

#[test]
fn idle_hook_runs_when_nothing_is_ready() {
    static IDLE: AtomicUsize = AtomicUsize::new(0);
    fn on_idle() {
        IDLE.fetch_add(1, Ordering::SeqCst);
    }

    let fwk = Framework::new(KernelConfig::builder().idle_callback(on_idle).build())
        .expect("valid config");
    fwk.install_queue(prio(0), 2);
    fwk.post_fifo(prio(0), Event::Signal(Signal(1)));

    assert!(fwk.next_event().is_some());
    assert_eq!(IDLE.load(Ordering::SeqCst), 0);
    assert!(fwk.next_event().is_none());
    assert_eq!(IDLE.load(Ordering::SeqCst), 1);
}

#[test]
fn periodic_timer_posts_every_period() {
    let fwk = framework();
    let timer = fwk.create_timer(TICK);
    fwk.start_timer(timer, prio(3), 2, 2);

    let mut posted_at = Vec::new();
    for t in 1..=6 {
        fwk.tick();
        if fwk.queue_len(prio(3)) > 0 {
            posted_at.push(t);
            drain(&fwk);
        }
    }
    assert_eq!(posted_at, [2, 4, 6]);
    assert!(fwk.is_timer_running(timer));
    assert_eq!(fwk.timer_info().expirations, 3);
}

#[test]
fn one_shot_timer_and_stop() {
    let fwk = framework();
    let once = fwk.create_timer(Signal(1));
    let other = fwk.create_timer(Signal(2));
    fwk.start_timer(once, prio(1), 1, 0);
    fwk.start_timer(other, prio(1), 5, 0);
    assert_eq!(fwk.timer_remaining(other), 5);

    fwk.tick();
    assert!(!fwk.is_timer_running(once));
    assert_eq!(drain(&fwk), [(1, Signal(1))]);

    assert!(fwk.stop_timer(other));
    assert!(!fwk.stop_timer(other));
    for _ in 0..5 {
        fwk.tick();
    }
    assert!(drain(&fwk).is_empty());

    fwk.reinit_timer(other, Signal(7));
    fwk.start_timer(other, prio(5), 1, 0);
    fwk.tick();
    assert_eq!(drain(&fwk), [(5, Signal(7))]);
}

#[test]
fn timeout_hook_sees_each_expiry() {
    static FIRED: AtomicUsize = AtomicUsize::new(0);
    fn on_timeout(_: TimerId) {
        FIRED.fetch_add(1, Ordering::SeqCst);
    }

    let fwk = Framework::new(KernelConfig::builder().timeout_callback(on_timeout).build())
        .expect("valid config");
    fwk.install_queue(prio(2), 8);
    let a = fwk.create_timer(Signal(1));
    let b = fwk.create_timer(Signal(2));
    fwk.start_timer(a, prio(2), 1, 1);
    fwk.start_timer(b, prio(2), 2, 0);

    fwk.tick();
    fwk.tick();
    assert_eq!(FIRED.load(Ordering::SeqCst), 3);
}

#[test]
#[should_panic(expected = "timer owner has no queue")]
fn timer_for_unregistered_owner_is_fatal() {
    let fwk = framework();
    let timer = fwk.create_timer(TICK);
    fwk.start_timer(timer, prio(9), 3, 0);
}

#[test]
fn payload_access_for_every_event_kind() {
    let fwk = with_pool();
    let dynamic = fwk.allocate_with(Signal(4), b"rkh");

    assert_eq!(fwk.payload(&Event::Signal(Signal(1)), <[u8]>::len), 0);
    assert_eq!(fwk.payload(&Event::Static(&READING), |p| p.to_vec()), [1, 2, 3]);
    assert!(fwk.payload(&dynamic, |p| p.starts_with(b"rkh")));
    fwk.gc(dynamic);
    assert!(fwk.pools().stats(0).is_idle());
}

#[test]
fn defer_then_recall_frees_exactly_once() {
    let fwk = with_pool();
    let mut deferred = EventQueue::unbound(4);

    let event = fwk.allocate(Signal(9), 8);
    fwk.defer(&mut deferred, &event);
    assert_eq!(fwk.pools().stats(0).used_blocks, 1);
    fwk.gc(event);
    assert_eq!(fwk.pools().stats(0).used_blocks, 1);
    assert!(fwk.ready_set().is_empty());

    fwk.post_fifo(prio(3), Event::Signal(Signal(1)));
    assert_eq!(fwk.recall(prio(3), &mut deferred), Some(Signal(9)));
    assert_eq!(fwk.recall(prio(3), &mut deferred), None);

    assert_eq!(drain(&fwk), [(3, Signal(9)), (3, Signal(1))]);
    let stats = fwk.pools().stats(0);
    assert_eq!(stats.used_blocks, 0);
    assert_eq!(stats.free_blocks, stats.total_blocks);
}

#[test]
#[should_panic(expected = "must not feed an active object")]
fn defer_into_bound_queue_is_fatal() {
    let fwk = framework();
    let mut queue = EventQueue::bound(2, prio(3), Tracer::disabled());
    fwk.defer(&mut queue, &Event::Signal(Signal(1)));
}

#[test]
fn publish_reaches_subscribers_most_urgent_first() {
    let sink = Arc::new(RecordingSink::new());
    let fwk = Framework::with_tracer(KernelConfig::default(), Tracer::new(sink.clone()))
        .expect("valid config");
    for p in [1, 3, 5] {
        fwk.install_queue(prio(p), 4);
    }
    fwk.subscribe(2, prio(5));
    fwk.subscribe(2, prio(1));
    fwk.subscribe(2, prio(3));
    fwk.subscribe(4, prio(3));
    sink.take();

    assert_eq!(fwk.publish(2, Event::Signal(Signal(11))), 3);
    let posts: Vec<u8> = sink
        .take()
        .into_iter()
        .filter_map(|r| match r {
            TraceRecord::PostFifo { ao, .. } => Some(ao),
            _ => None,
        })
        .collect();
    assert_eq!(posts, [1, 3, 5]);

    fwk.unsubscribe(2, prio(3));
    assert_eq!(fwk.subscribers(2).len(), 2);
    fwk.unsubscribe_all(prio(3));
    assert!(fwk.subscribers(4).is_empty());
    assert_eq!(fwk.publish(4, Event::Signal(Signal(12))), 0);
}

#[test]
fn published_dynamic_event_is_freed_after_last_subscriber() {
    let fwk = with_pool();
    fwk.subscribe(0, prio(1));
    fwk.subscribe(0, prio(5));

    let event = fwk.allocate(Signal(30), 4);
    fwk.publish(0, event);
    assert_eq!(fwk.pools().stats(0).used_blocks, 1);

    assert_eq!(drain(&fwk), [(1, Signal(30)), (5, Signal(30))]);
    assert!(fwk.pools().stats(0).is_idle());
}

#[test]
#[should_panic(expected = "channel out of range")]
fn unknown_channel_is_fatal() {
    let fwk = framework();
    fwk.subscribe(KernelConfig::default().max_channels, prio(1));
}

#[test]
fn retire_leaves_nothing_for_tick_or_publish_to_reach() {
    let fwk = framework();
    let gone = prio(3);
    let due = fwk.create_timer(Signal(1));
    let other = fwk.create_timer(Signal(2));
    fwk.start_timer(due, gone, 1, 1);
    fwk.start_timer(other, prio(5), 1, 0);
    fwk.subscribe(1, gone);
    fwk.subscribe(1, prio(1));
    fwk.post_fifo(gone, Event::Signal(Signal(3)));

    let (pending, stopped) = fwk.retire(gone);
    assert_eq!(pending, [Event::Signal(Signal(3))]);
    assert_eq!(stopped, 1);
    assert!(!fwk.is_ready(gone));
    assert!(!fwk.subscribers(1).contains(gone));

    fwk.tick();
    assert_eq!(fwk.publish(1, Event::Signal(Signal(4))), 1);
    assert!(!fwk.is_timer_running(due));
    assert_eq!(drain(&fwk), [(1, Signal(4)), (5, Signal(2))]);
}
