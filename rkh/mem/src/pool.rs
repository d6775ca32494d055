//! Fixed-size block allocator.

use rkh_core::require;

use crate::PoolStats;

/// One pool of equally sized blocks, each with its own use-count.
///
/// A block is free exactly while its use-count is zero; the free list and
/// the counts are updated together, so `free + used == total` always holds.
#[derive(Debug)]
pub struct BlockPool {
    block_size: usize,
    storage: Box<[u8]>,
    free: Vec<u16>,
    refs: Box<[u8]>,
    lens: Box<[u16]>,
    min_free: usize,
}

impl BlockPool {
    /// Carves `storage` into `storage.len() / block_size` blocks; a trailing
    /// remainder is unused.
    pub fn new(storage: Vec<u8>, block_size: usize) -> Self {
        require!(block_size > 0, "zero block size");
        require!(block_size <= u16::MAX as usize, "block size too large");
        let blocks = storage.len() / block_size;
        require!(blocks > 0, "pool storage smaller than one block");
        require!(blocks <= u16::MAX as usize, "too many blocks in pool");

        Self {
            block_size,
            storage: storage.into_boxed_slice(),
            // Popped from the back, so block 0 is handed out first.
            free: (0..blocks as u16).rev().collect(),
            refs: vec![0; blocks].into_boxed_slice(),
            lens: vec![0; blocks].into_boxed_slice(),
            min_free: blocks,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn total_blocks(&self) -> usize {
        self.refs.len()
    }

    pub fn free_blocks(&self) -> usize {
        self.free.len()
    }

    pub fn min_free_blocks(&self) -> usize {
        self.min_free
    }

    /// Takes a free block for a payload of `len` bytes, with use-count 1.
    pub fn get(&mut self, len: usize) -> Option<u16> {
        require!(len <= self.block_size, "payload larger than block");
        let block = self.free.pop()?;
        self.refs[block as usize] = 1;
        self.lens[block as usize] = len as u16;
        self.min_free = self.min_free.min(self.free.len());
        Some(block)
    }

    /// Adds one holder to a live block.
    pub fn retain(&mut self, block: u16) -> u8 {
        let count = self.live_count(block);
        require!(count < u8::MAX, "event use-count overflow");
        self.refs[block as usize] = count + 1;
        count + 1
    }

    /// Drops one holder; the block returns to the free list at zero.
    /// Returns the remaining use-count.
    pub fn release(&mut self, block: u16) -> u8 {
        let count = self.live_count(block) - 1;
        self.refs[block as usize] = count;
        if count == 0 {
            require!(self.free.len() < self.total_blocks(), "pool free list overflow");
            self.lens[block as usize] = 0;
            self.free.push(block);
        }
        count
    }

    pub fn use_count(&self, block: u16) -> u8 {
        require!((block as usize) < self.total_blocks(), "block outside pool");
        self.refs[block as usize]
    }

    pub fn payload(&self, block: u16) -> &[u8] {
        let start = self.offset(block);
        &self.storage[start..start + self.lens[block as usize] as usize]
    }

    pub fn payload_mut(&mut self, block: u16) -> &mut [u8] {
        let start = self.offset(block);
        let len = self.lens[block as usize] as usize;
        &mut self.storage[start..start + len]
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            block_size: self.block_size,
            total_blocks: self.total_blocks(),
            free_blocks: self.free.len(),
            used_blocks: self.total_blocks() - self.free.len(),
            min_free_blocks: self.min_free,
        }
    }

    fn live_count(&self, block: u16) -> u8 {
        let count = self.use_count(block);
        require!(count > 0, "stale event handle");
        count
    }

    fn offset(&self, block: u16) -> usize {
        let _ = self.live_count(block);
        block as usize * self.block_size
    }
}
