//! Runtime context.
//!
//! A [`Framework`] owns everything active objects share: the ready bitmap,
//! one queue per registered priority, the timer list, publish/subscribe
//! channels and the event pools. Every method takes `&self` and confines
//! its mutation to a critical section, so interrupt handlers can post
//! events and arm timers through a shared reference.

use critical_section::CriticalSection;
use rkh_core::config::MAX_CHANNELS;
use rkh_core::{fatal, require, CsCell, Event, Priority, ReadyGroup, Signal};
use rkh_mem::EventPools;
use rkh_trc::{TraceRecord, Tracer};

use crate::kernel::{ConfigError, KernelConfig};
use crate::queue::{EventQueue, QueueInfo};
use crate::time::{TimerId, TimerInfo, TimerList};

pub(crate) struct Shared {
    pub(crate) ready: ReadyGroup,
    pub(crate) queues: Vec<Option<EventQueue>>,
    pub(crate) timers: TimerList,
    pub(crate) channels: heapless::Vec<ReadyGroup, MAX_CHANNELS>,
}

impl Shared {
    fn queue_mut(&mut self, prio: Priority) -> Option<&mut EventQueue> {
        self.queues.get_mut(prio.index()).and_then(Option::as_mut)
    }
}

/// Shared state of one runtime instance.
pub struct Framework {
    config: KernelConfig,
    pub(crate) shared: CsCell<Shared>,
    pools: EventPools,
    tracer: Tracer,
}

impl Framework {
    /// Validates `config` and builds an empty runtime with tracing off.
    pub fn new(config: KernelConfig) -> Result<Self, ConfigError> {
        Self::with_tracer(config, Tracer::disabled())
    }

    pub fn with_tracer(config: KernelConfig, tracer: Tracer) -> Result<Self, ConfigError> {
        config.validate()?;
        let shared = Shared {
            ready: ReadyGroup::new(),
            queues: (0..config.max_active).map(|_| None).collect(),
            timers: TimerList::new(config.max_timers as usize),
            channels: (0..config.max_channels).map(|_| ReadyGroup::new()).collect(),
        };
        let pools = EventPools::new(config.max_event_pools as usize, tracer.clone());
        log::debug!(
            "{}: framework up with {} priorities, {} timers, {} channels",
            config.name,
            config.max_active,
            config.max_timers,
            config.max_channels
        );
        Ok(Self {
            config,
            shared: CsCell::new(shared),
            pools,
            tracer,
        })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn pools(&self) -> &EventPools {
        &self.pools
    }

    // ----- readiness and queues -------------------------------------------

    /// Snapshot of the ready bitmap.
    pub fn ready_set(&self) -> ReadyGroup {
        self.shared.lock(|s| s.ready)
    }

    pub fn is_ready(&self, prio: Priority) -> bool {
        self.shared.lock(|s| s.ready.contains(prio))
    }

    /// Events waiting for the active object at `prio`.
    pub fn queue_len(&self, prio: Priority) -> usize {
        self.shared
            .lock(|s| s.queue_mut(prio).map_or(0, |q| q.len()))
    }

    pub fn queue_info(&self, prio: Priority) -> Option<QueueInfo> {
        self.shared.lock(|s| s.queue_mut(prio).map(|q| q.info()))
    }

    pub(crate) fn install_queue(&self, prio: Priority, capacity: usize) {
        let queue = EventQueue::bound(capacity, prio, self.tracer.clone());
        self.shared.lock(|s| {
            let Some(slot) = s.queues.get_mut(prio.index()) else {
                fatal!("priority beyond configured max_active");
            };
            require!(slot.is_none(), "priority already in use");
            *slot = Some(queue);
        });
    }

    /// Unregisters `prio` in one critical section: its timers stop, its
    /// subscriptions go and its queue is detached. Returns what the queue
    /// still held and how many timers were running.
    ///
    /// A tick or publish from interrupt context sees either the registered
    /// object or none of it.
    pub(crate) fn retire(&self, prio: Priority) -> (Vec<Event>, usize) {
        self.shared.lock(|s| {
            let Shared {
                ready,
                queues,
                timers,
                channels,
            } = s;
            let stopped = timers.stop_owned(prio);
            for subs in channels.iter_mut() {
                subs.set_unready(prio);
            }
            let pending = queues
                .get_mut(prio.index())
                .and_then(Option::take)
                .map(|mut q| q.deplete(ready))
                .unwrap_or_default();
            (pending, stopped)
        })
    }

    /// Pops the most urgent ready event. When nothing is ready the idle
    /// hook runs before the critical section is left.
    pub(crate) fn next_event(&self) -> Option<(Priority, Event)> {
        critical_section::with(|cs| {
            let next = self.take_highest(cs);
            if next.is_none() {
                self.tracer.emit(TraceRecord::Idle);
                if let Some(idle) = self.config.idle_callback {
                    idle();
                }
            }
            next
        })
    }

    fn take_highest(&self, cs: CriticalSection<'_>) -> Option<(Priority, Event)> {
        let mut shared = self.shared.borrow_mut(cs);
        let Shared { ready, queues, .. } = &mut *shared;
        let prio = ready.find_highest()?;
        let queue = queues.get_mut(prio.index()).and_then(Option::as_mut)?;
        queue.get(ready).map(|event| (prio, event))
    }

    // ----- posting --------------------------------------------------------

    /// Appends `event` to the queue of `to`. Safe from interrupt context.
    pub fn post_fifo(&self, to: Priority, event: Event) {
        let signal = event.signal();
        self.shared.lock(|s| {
            let Shared { ready, queues, .. } = s;
            let Some(queue) = queues.get_mut(to.index()).and_then(Option::as_mut) else {
                fatal!("post to unregistered active object");
            };
            queue.put_fifo(event, ready);
        });
        self.tracer.emit(TraceRecord::PostFifo {
            ao: to.raw(),
            signal,
        });
    }

    /// Puts `event` at the front of the queue of `to`.
    pub fn post_lifo(&self, to: Priority, event: Event) {
        let signal = event.signal();
        self.shared.lock(|s| {
            let Shared { ready, queues, .. } = s;
            let Some(queue) = queues.get_mut(to.index()).and_then(Option::as_mut) else {
                fatal!("post to unregistered active object");
            };
            queue.put_lifo(event, ready);
        });
        self.tracer.emit(TraceRecord::PostLifo {
            ao: to.raw(),
            signal,
        });
    }

    // ----- events ---------------------------------------------------------

    /// Registers a pool of `storage.len() / block_size` blocks. Pools must
    /// be registered smallest block size first.
    #[cfg(feature = "dynamic-events")]
    pub fn register_pool(&self, storage: Vec<u8>, block_size: usize) -> u8 {
        self.pools.register(storage, block_size)
    }

    /// Allocates a dynamic event with room for `size` payload bytes.
    #[cfg(feature = "dynamic-events")]
    pub fn allocate(&self, signal: Signal, size: usize) -> Event {
        Event::Dynamic(self.pools.allocate(signal, size))
    }

    #[cfg(feature = "dynamic-events")]
    pub fn allocate_with(&self, signal: Signal, payload: &[u8]) -> Event {
        Event::Dynamic(self.pools.allocate_with(signal, payload))
    }

    /// Runs `f` on the payload of any kind of event.
    pub fn payload<R>(&self, event: &Event, f: impl FnOnce(&[u8]) -> R) -> R {
        match event {
            Event::Signal(_) => f(&[]),
            Event::Static(evt) => f(evt.payload()),
            Event::Dynamic(evt) => self.pools.with_payload(evt, f),
        }
    }

    /// Another handle to `event` for an additional holder.
    pub fn reference(&self, event: &Event) -> Event {
        self.pools.reference(event)
    }

    /// Releases one holder's handle.
    pub fn gc(&self, event: Event) {
        self.pools.gc(event);
    }

    // ----- defer / recall -------------------------------------------------

    /// Sets `event` aside in `queue`. The queue keeps its own reference, so
    /// the dispatcher's collection of the original does not free it.
    #[cfg(feature = "defer")]
    pub fn defer(&self, queue: &mut EventQueue, event: &Event) {
        require!(
            queue.owner().is_none(),
            "deferral queue must not feed an active object"
        );
        let signal = event.signal();
        queue.put_fifo(self.reference(event), &mut ReadyGroup::new());
        self.tracer.emit(TraceRecord::Defer { signal });
    }

    /// Moves the oldest deferred event to the front of `to`'s queue.
    #[cfg(feature = "defer")]
    pub fn recall(&self, to: Priority, queue: &mut EventQueue) -> Option<Signal> {
        let event = queue.get(&mut ReadyGroup::new())?;
        let signal = event.signal();
        self.post_lifo(to, event);
        self.tracer.emit(TraceRecord::Recall {
            ao: to.raw(),
            signal,
        });
        Some(signal)
    }

    // ----- timers ---------------------------------------------------------

    pub fn create_timer(&self, signal: Signal) -> TimerId {
        let timer = self.shared.lock(|s| s.timers.create(signal));
        self.tracer.emit(TraceRecord::TimerInit {
            timer: timer.raw(),
            signal,
        });
        timer
    }

    /// Arms `timer` to post its signal to `owner` after `ticks` ticks and
    /// then every `period` ticks (`0` for one-shot).
    pub fn start_timer(&self, timer: TimerId, owner: Priority, ticks: u32, period: u32) {
        self.shared.lock(|s| {
            require!(s.queue_mut(owner).is_some(), "timer owner has no queue");
            s.timers.start(timer, owner, ticks, period);
        });
        self.tracer.emit(TraceRecord::TimerStart {
            timer: timer.raw(),
            ao: owner.raw(),
            ticks,
            period,
        });
    }

    /// Disarms `timer`; returns whether it was running.
    pub fn stop_timer(&self, timer: TimerId) -> bool {
        let (stopped, ticks, period) = self.shared.lock(|s| {
            let ticks = s.timers.remaining(timer);
            let period = s.timers.period(timer);
            (s.timers.stop(timer), ticks, period)
        });
        if stopped {
            self.tracer.emit(TraceRecord::TimerStop {
                timer: timer.raw(),
                ticks,
                period,
            });
        }
        stopped
    }

    pub fn reinit_timer(&self, timer: TimerId, signal: Signal) {
        self.shared.lock(|s| s.timers.reinit(timer, signal));
    }

    pub fn timer_remaining(&self, timer: TimerId) -> u32 {
        self.shared.lock(|s| s.timers.remaining(timer))
    }

    pub fn is_timer_running(&self, timer: TimerId) -> bool {
        self.shared.lock(|s| s.timers.is_running(timer))
    }

    pub fn timer_info(&self) -> TimerInfo {
        self.shared.lock(|s| s.timers.info())
    }

    /// Advances all timers by one tick, posting the signal of each expired
    /// timer FIFO to its owner. Call from the periodic tick source.
    pub fn tick(&self) {
        let mut expired = Vec::new();
        self.shared.lock(|s| {
            let Shared {
                ready,
                queues,
                timers,
                ..
            } = s;
            timers.tick(|expiry| {
                let Some(queue) = queues
                    .get_mut(expiry.owner.index())
                    .and_then(Option::as_mut)
                else {
                    fatal!("timer owner has no queue");
                };
                queue.put_fifo(Event::Signal(expiry.signal), ready);
                expired.push(expiry);
            });
        });

        for expiry in expired {
            self.tracer.emit(TraceRecord::TimerTimeout {
                timer: expiry.timer.raw(),
                signal: expiry.signal,
                ao: expiry.owner.raw(),
            });
            if !expiry.periodic {
                self.tracer.emit(TraceRecord::TimerRemove {
                    timer: expiry.timer.raw(),
                });
            }
            if let Some(callback) = self.config.timeout_callback {
                callback(expiry.timer);
            }
        }
    }
}

impl core::fmt::Debug for Framework {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Framework")
            .field("name", &self.config.name)
            .field("ready", &self.ready_set())
            .finish()
    }
}
