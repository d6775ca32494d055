//! # RKH Memory
//!
//! Deterministic storage for dynamic events. Each [`BlockPool`] carves a
//! caller-supplied buffer into equally sized blocks; [`EventPools`] keeps up
//! to `MAX_EVENT_POOLS` of them in ascending block size, hands out the
//! smallest block that fits a request and tracks how many holders reference
//! each block.
//!
//! Running out of blocks is a configuration bug and goes through the fatal
//! assertion path; pools never grow.

pub mod events;
pub mod pool;

pub use events::EventPools;
pub use pool::BlockPool;

/// Occupancy snapshot of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Size of every block in bytes.
    pub block_size: usize,
    /// Total number of blocks in the pool.
    pub total_blocks: usize,
    /// Number of blocks currently available.
    pub free_blocks: usize,
    /// Number of blocks currently referenced by at least one holder.
    pub used_blocks: usize,
    /// Fewest free blocks ever observed since registration.
    pub min_free_blocks: usize,
}

impl PoolStats {
    /// Stats of a pool with every block free.
    pub const fn new(block_size: usize, total_blocks: usize) -> Self {
        Self {
            block_size,
            total_blocks,
            free_blocks: total_blocks,
            used_blocks: 0,
            min_free_blocks: total_blocks,
        }
    }

    pub const fn is_exhausted(&self) -> bool {
        self.free_blocks == 0
    }

    /// True when no block is in use.
    pub const fn is_idle(&self) -> bool {
        self.used_blocks == 0
    }

    /// Percentage of blocks in use (0-100).
    pub fn utilization(&self) -> u8 {
        if self.total_blocks == 0 {
            0
        } else {
            ((self.used_blocks * 100) / self.total_blocks) as u8
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PoolStats {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "PoolStats{{ block: {}, total: {}, free: {}, used: {}, min_free: {} }}",
            self.block_size,
            self.total_blocks,
            self.free_blocks,
            self.used_blocks,
            self.min_free_blocks
        );
    }
}
