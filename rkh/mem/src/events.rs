//! Dynamic-event lifecycle.
//!
//! A dynamic event is born with use-count 1 in the smallest pool whose block
//! covers its payload. Every extra holder (a second queue, a deferral
//! queue, a publish fan-out) takes a reference first; every holder gives its
//! handle back through [`EventPools::gc`], and the block returns to its pool
//! when the last one does. Static and signal-only events pass through
//! `reference` and `gc` untouched.

use heapless::Vec as BoundedVec;
use rkh_core::config::MAX_EVENT_POOLS;
use rkh_core::{fatal, require, CsCell, DynEvent, Event, Signal};
use rkh_trc::{TraceRecord, Tracer};

use crate::pool::BlockPool;
use crate::PoolStats;

/// The registered pools of one runtime instance.
pub struct EventPools {
    pools: CsCell<BoundedVec<BlockPool, MAX_EVENT_POOLS>>,
    limit: usize,
    tracer: Tracer,
}

impl EventPools {
    /// Manager accepting up to `limit` pools.
    pub fn new(limit: usize, tracer: Tracer) -> Self {
        require!(limit <= MAX_EVENT_POOLS, "event pool limit above MAX_EVENT_POOLS");
        Self {
            pools: CsCell::new(BoundedVec::new()),
            limit,
            tracer,
        }
    }

    /// Registers a pool over `storage`. Pools must be registered in strictly
    /// ascending block size. Returns the pool index.
    pub fn register(&self, storage: Vec<u8>, block_size: usize) -> u8 {
        let pool = BlockPool::new(storage, block_size);
        let blocks = pool.total_blocks();
        let index = self.pools.lock(|pools| {
            require!(pools.len() < self.limit, "too many event pools");
            if let Some(last) = pools.last() {
                require!(
                    block_size > last.block_size(),
                    "event pools must be registered in ascending block size"
                );
            }
            if pools.push(pool).is_err() {
                fatal!("too many event pools");
            }
            (pools.len() - 1) as u8
        });

        log::debug!("event pool {index} registered: {blocks} blocks of {block_size} bytes");
        self.tracer.emit(TraceRecord::PoolInit {
            pool: index,
            block_size: block_size as u16,
            blocks: blocks as u16,
        });
        index
    }

    /// Number of registered pools.
    pub fn len(&self) -> usize {
        self.pools.lock(|pools| pools.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocates a dynamic event with room for `size` payload bytes.
    ///
    /// No pool large enough, or the fitting pool being exhausted, is fatal.
    pub fn allocate(&self, signal: Signal, size: usize) -> DynEvent {
        let (pool, block, free, min_free) = self.pools.lock(|pools| {
            let Some(index) = pools.iter().position(|p| p.block_size() >= size) else {
                fatal!("no event pool fits the requested size");
            };
            let pool = &mut pools[index];
            let Some(block) = pool.get(size) else {
                fatal!("event pool exhausted");
            };
            (index as u8, block, pool.free_blocks(), pool.min_free_blocks())
        });

        log::trace!("allocated {signal} in pool {pool} block {block}");
        self.tracer.emit(TraceRecord::PoolGet {
            pool,
            free: free as u16,
            min_free: min_free as u16,
        });
        self.tracer.emit(TraceRecord::Alloc { signal, pool });
        DynEvent::from_parts(signal, pool, block)
    }

    /// Allocates an event and copies `payload` into it.
    pub fn allocate_with(&self, signal: Signal, payload: &[u8]) -> DynEvent {
        let event = self.allocate(signal, payload.len());
        self.with_payload_mut(&event, |buf| buf.copy_from_slice(payload));
        event
    }

    /// Takes another reference to `event` for an additional holder.
    pub fn reference(&self, event: &Event) -> Event {
        match event {
            Event::Signal(sig) => Event::Signal(*sig),
            Event::Static(evt) => Event::Static(evt),
            Event::Dynamic(evt) => Event::Dynamic(self.reference_dynamic(evt)),
        }
    }

    pub fn reference_dynamic(&self, event: &DynEvent) -> DynEvent {
        self.pools.lock(|pools| {
            pool_of(pools, event).retain(event.block());
        });
        DynEvent::from_parts(event.signal(), event.pool(), event.block())
    }

    /// Gives back one holder's handle; the block is freed when none remain.
    pub fn gc(&self, event: Event) {
        if let Event::Dynamic(evt) = event {
            self.gc_dynamic(evt);
        }
    }

    pub fn gc_dynamic(&self, event: DynEvent) {
        let (signal, pool, block) = event.into_parts();
        let (refs, free) = self.pools.lock(|pools| {
            let Some(p) = pools.get_mut(pool as usize) else {
                fatal!("event handle from unknown pool");
            };
            (p.release(block), p.free_blocks())
        });

        if refs == 0 {
            self.tracer.emit(TraceRecord::GcRelease { signal, pool });
            self.tracer.emit(TraceRecord::PoolPut {
                pool,
                free: free as u16,
            });
        } else {
            self.tracer.emit(TraceRecord::Gc { signal, pool, refs });
        }
    }

    /// Current number of holders of `event`.
    pub fn use_count(&self, event: &DynEvent) -> u8 {
        self.pools
            .lock(|pools| pool_of(pools, event).use_count(event.block()))
    }

    /// Reads the payload inside a critical section. `f` must not call back
    /// into this pool set.
    pub fn with_payload<R>(&self, event: &DynEvent, f: impl FnOnce(&[u8]) -> R) -> R {
        self.pools
            .lock(|pools| f(pool_of(pools, event).payload(event.block())))
    }

    /// Writes the payload. Only the sole holder may do so.
    pub fn with_payload_mut<R>(&self, event: &DynEvent, f: impl FnOnce(&mut [u8]) -> R) -> R {
        self.pools.lock(|pools| {
            let pool = pool_of(pools, event);
            require!(
                pool.use_count(event.block()) == 1,
                "payload written while event is shared"
            );
            f(pool.payload_mut(event.block()))
        })
    }

    pub fn stats(&self, pool: u8) -> PoolStats {
        self.pools.lock(|pools| {
            let Some(p) = pools.get(pool as usize) else {
                fatal!("unknown event pool");
            };
            p.stats()
        })
    }
}

fn pool_of<'a>(
    pools: &'a mut BoundedVec<BlockPool, MAX_EVENT_POOLS>,
    event: &DynEvent,
) -> &'a mut BlockPool {
    match pools.get_mut(event.pool() as usize) {
        Some(pool) => pool,
        None => fatal!("event handle from unknown pool"),
    }
}
