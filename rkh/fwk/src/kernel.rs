//! Cooperative dispatcher and runtime configuration.

use rkh_core::config::{MAX_ACTIVE, MAX_CHANNELS, MAX_EVENT_POOLS};
use rkh_core::{require, Priority};
use rkh_trc::TraceRecord;
use thiserror::Error;

use crate::active::Active;
use crate::framework::Framework;
use crate::time::TimerId;

/// Runtime sizing and hooks for one [`Framework`].
#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub name: &'static str,
    /// Priorities `0..max_active` may be activated.
    pub max_active: u8,
    pub max_event_pools: u8,
    pub max_timers: u16,
    pub max_channels: u8,
    /// Runs inside a critical section whenever nothing is ready.
    pub idle_callback: Option<fn()>,
    /// Runs after every timer expiry.
    pub timeout_callback: Option<fn(TimerId)>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            name: "RKH",
            max_active: 16,
            max_event_pools: 3,
            max_timers: 16,
            max_channels: 8,
            idle_callback: None,
            timeout_callback: None,
        }
    }
}

/// Configuration values outside what the runtime can hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_active must be between 1 and {}, got {0}", MAX_ACTIVE)]
    MaxActive(u8),
    #[error("max_event_pools must be at most {}, got {0}", MAX_EVENT_POOLS)]
    MaxEventPools(u8),
    #[error("max_channels must be at most {}, got {0}", MAX_CHANNELS)]
    MaxChannels(u8),
}

impl KernelConfig {
    pub fn builder() -> KernelConfigBuilder {
        KernelConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_active == 0 || self.max_active as usize > MAX_ACTIVE {
            return Err(ConfigError::MaxActive(self.max_active));
        }
        if self.max_event_pools as usize > MAX_EVENT_POOLS {
            return Err(ConfigError::MaxEventPools(self.max_event_pools));
        }
        if self.max_channels as usize > MAX_CHANNELS {
            return Err(ConfigError::MaxChannels(self.max_channels));
        }
        Ok(())
    }
}

/// Fluent construction of a [`KernelConfig`].
#[derive(Debug, Clone, Default)]
pub struct KernelConfigBuilder {
    config: KernelConfig,
}

impl KernelConfigBuilder {
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    pub fn max_active(mut self, max: u8) -> Self {
        self.config.max_active = max;
        self
    }

    pub fn max_event_pools(mut self, max: u8) -> Self {
        self.config.max_event_pools = max;
        self
    }

    pub fn max_timers(mut self, max: u16) -> Self {
        self.config.max_timers = max;
        self
    }

    pub fn max_channels(mut self, max: u8) -> Self {
        self.config.max_channels = max;
        self
    }

    pub fn idle_callback(mut self, callback: fn()) -> Self {
        self.config.idle_callback = Some(callback);
        self
    }

    pub fn timeout_callback(mut self, callback: fn(TimerId)) -> Self {
        self.config.timeout_callback = Some(callback);
        self
    }

    /// Returns the configuration without validating it; see
    /// [`KernelConfig::validate`].
    pub fn build(self) -> KernelConfig {
        self.config
    }
}

/// Run-to-completion dispatcher over the active objects of one framework.
///
/// Active objects are borrowed for the kernel's lifetime and indexed by
/// priority. Each scheduling step takes the most urgent ready object's next
/// event, dispatches it to completion and then collects it.
pub struct Kernel<'a> {
    fwk: &'a Framework,
    actives: Vec<Option<&'a mut dyn Active>>,
}

impl<'a> Kernel<'a> {
    pub fn new(fwk: &'a Framework) -> Self {
        let slots = fwk.config().max_active as usize;
        Self {
            fwk,
            actives: (0..slots).map(|_| None).collect(),
        }
    }

    pub fn framework(&self) -> &'a Framework {
        self.fwk
    }

    /// Registers `active` with a queue of `queue_capacity` events and takes
    /// its initial transition.
    pub fn activate(&mut self, active: &'a mut dyn Active, queue_capacity: usize) {
        let prio = active.priority();
        require!(
            prio.index() < self.actives.len(),
            "priority beyond configured max_active"
        );
        require!(
            self.actives[prio.index()].is_none(),
            "priority already in use"
        );

        self.fwk.install_queue(prio, queue_capacity);
        self.fwk.tracer().emit(TraceRecord::Activate {
            ao: prio.raw(),
            name: active.name(),
        });
        log::debug!("activated `{}` at priority {}", active.name(), prio);

        active.init(self.fwk);
        self.actives[prio.index()] = Some(active);
    }

    /// Unregisters the active object at `prio`. Its timers are stopped, its
    /// subscriptions dropped and its queue detached atomically; the events
    /// still queued are then collected.
    pub fn terminate(&mut self, prio: Priority) -> Option<&'a mut dyn Active> {
        let active = self.actives.get_mut(prio.index())?.take()?;
        let (pending, stopped) = self.fwk.retire(prio);
        let dropped = pending.len();
        for event in pending {
            self.fwk.gc(event);
        }

        self.fwk.tracer().emit(TraceRecord::Terminate { ao: prio.raw() });
        log::debug!(
            "terminated `{}` at priority {} ({} events dropped, {} timers stopped)",
            active.name(),
            prio,
            dropped,
            stopped
        );
        Some(active)
    }

    pub fn is_active(&self, prio: Priority) -> bool {
        matches!(self.actives.get(prio.index()), Some(Some(_)))
    }

    /// Runs one scheduling step. Returns `false` when nothing was ready, in
    /// which case the idle hook has run.
    pub fn dispatch_once(&mut self) -> bool {
        let Some((prio, event)) = self.fwk.next_event() else {
            return false;
        };
        self.fwk.tracer().emit(TraceRecord::GetEvent {
            ao: prio.raw(),
            signal: event.signal(),
        });

        match self.actives.get_mut(prio.index()).and_then(Option::as_mut) {
            Some(active) => {
                let result = active.dispatch(self.fwk, &event);
                log::trace!(
                    "`{}` dispatched {}: {}",
                    active.name(),
                    event.signal(),
                    result
                );
            }
            None => log::warn!(
                "event {} queued for inactive priority {}",
                event.signal(),
                prio
            ),
        }
        self.fwk.gc(event);
        true
    }

    /// Dispatches until no active object is ready.
    pub fn run_until_idle(&mut self) {
        while self.dispatch_once() {}
    }

    /// Dispatches forever. The idle hook is the only place to sleep.
    pub fn run(&mut self) -> ! {
        self.fwk.tracer().emit(TraceRecord::FwkEnter);
        log::debug!("{}: entering dispatcher loop", self.fwk.config().name);
        loop {
            self.dispatch_once();
        }
    }
}
