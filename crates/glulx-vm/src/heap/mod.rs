// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The `malloc`/`mfree` heap.
//!
//! The heap occupies `[heap_start, endmem)` and exists only while at least
//! one allocation is live. It is a flat list of blocks that always tiles
//! that range exactly:
//!
//! ```text
//! heap_start ┌───────────┬──────┬───────────────┬─────────┐ endmem
//!            │ allocated │ free │ allocated     │ free    │
//!            └───────────┴──────┴───────────────┴─────────┘
//! ```
//!
//! Allocation is first-fit over the free blocks, merging adjacent free
//! pairs as the scan passes them. When nothing fits, memory is extended.
//! Freeing only marks the block; the final free tears the whole heap down
//! and shrinks memory back to `heap_start`.


#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use crate::fault::Fault;
use crate::memory::{MemoryMap, PAGE};

/// One block of the heap tiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapBlock {
    /// First byte of the block.
    pub addr: u32,
    /// Length in bytes, never zero.
    pub len: u32,
    /// Whether the block is available.
    pub free: bool,
}

/// The allocation heap. Inactive while `start == 0`.
#[derive(Debug, Default)]
pub struct Heap {
    start: u32,
    blocks: Vec<HeapBlock>,
    alloc_count: u32,
}

impl Heap {
    /// Create an inactive heap.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            start: 0,
            blocks: Vec::new(),
            alloc_count: 0,
        }
    }

    /// Whether any allocation is live.
    #[must_use]
    pub const fn active(&self) -> bool {
        self.start != 0
    }

    /// Start of the heap region; 0 while inactive.
    #[must_use]
    pub const fn start(&self) -> u32 {
        self.start
    }

    /// Number of live allocations.
    #[must_use]
    pub const fn alloc_count(&self) -> u32 {
        self.alloc_count
    }

    /// The current block tiling, for inspection.
    #[must_use]
    pub fn blocks(&self) -> &[HeapBlock] {
        &self.blocks
    }

    /// Allocate `len` bytes; returns the address or 0 on failure.
    ///
    /// The first allocation activates the heap at the current end of
    /// memory. If no free block fits, memory is grown in 256-byte steps.
    pub fn alloc(&mut self, mem: &mut MemoryMap, len: u32) -> u32 {
        if len == 0 {
            return 0;
        }
        if !self.active() {
            self.start = mem.size();
            self.blocks.clear();
            log::debug!("heap activated at {:#x}", self.start);
        }

        if let Some(addr) = self.fit_first(len) {
            self.alloc_count += 1;
            return addr;
        }

        // Nothing fits; extend memory so the tail can hold the request.
        let tail_free = match self.blocks.last() {
            Some(block) if block.free => block.len,
            _ => 0,
        };
        let needed = (len - tail_free).max(PAGE).max(len);
        let growth = needed.div_ceil(PAGE).saturating_mul(PAGE);
        let old_end = mem.size();
        let grown = match old_end.checked_add(growth) {
            Some(target) => mem.set_size(target),
            None => false,
        };
        if !grown {
            if self.alloc_count == 0 {
                self.start = 0;
            }
            return 0;
        }

        match self.blocks.last_mut() {
            Some(block) if block.free => block.len += growth,
            _ => self.blocks.push(HeapBlock {
                addr: old_end,
                len: growth,
                free: true,
            }),
        }

        match self.fit_first(len) {
            Some(addr) => {
                self.alloc_count += 1;
                addr
            }
            None => 0,
        }
    }

    /// First-fit scan, merging adjacent free pairs as it goes.
    fn fit_first(&mut self, len: u32) -> Option<u32> {
        let mut i = 0;
        while i < self.blocks.len() {
            if self.blocks[i].free && i + 1 < self.blocks.len() && self.blocks[i + 1].free {
                let merged = self.blocks.remove(i + 1);
                self.blocks[i].len += merged.len;
                continue;
            }
            if self.blocks[i].free && self.blocks[i].len >= len {
                let addr = self.blocks[i].addr;
                if self.blocks[i].len == len {
                    self.blocks[i].free = false;
                } else {
                    let rest = HeapBlock {
                        addr: addr + len,
                        len: self.blocks[i].len - len,
                        free: true,
                    };
                    self.blocks[i] = HeapBlock {
                        addr,
                        len,
                        free: false,
                    };
                    self.blocks.insert(i + 1, rest);
                }
                return Some(addr);
            }
            i += 1;
        }
        None
    }

    /// Free the allocation at `addr`.
    ///
    /// The last free deactivates the heap and shrinks memory back to the
    /// old heap start.
    ///
    /// # Errors
    ///
    /// `HeapError` if `addr` is not a live allocation.
    pub fn free(&mut self, mem: &mut MemoryMap, addr: u32) -> Result<(), Fault> {
        let block = self
            .blocks
            .iter_mut()
            .find(|b| b.addr == addr && !b.free)
            .ok_or(Fault::HeapError(addr))?;
        block.free = true;
        self.alloc_count -= 1;

        if self.alloc_count == 0 {
            let start = self.start;
            self.blocks.clear();
            self.start = 0;
            // Always succeeds: start is 256-aligned and >= the initial endmem.
            let _ = mem.set_size(start);
            log::debug!("heap deactivated, memory back to {start:#x}");
        }
        Ok(())
    }

    /// Tear the heap down without freeing blocks individually (restart).
    pub fn reset(&mut self) {
        self.start = 0;
        self.blocks.clear();
        self.alloc_count = 0;
    }

    /// Snapshot as `[heap_start, alloc_count, addr_i, len_i, ...]` over the
    /// live allocations in address order. `[0, 0]` while inactive.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u32> {
        let mut words = Vec::with_capacity(2 + 2 * self.alloc_count as usize);
        words.push(self.start);
        words.push(self.alloc_count);
        for block in &self.blocks {
            if !block.free {
                words.push(block.addr);
                words.push(block.len);
            }
        }
        words
    }

    /// Rebuild the tiling from a snapshot, filling the gaps between the
    /// recorded allocations (and the tail up to `endmem`) with free blocks.
    ///
    /// # Errors
    ///
    /// `HeapError` on a malformed snapshot (odd length, overlapping or
    /// out-of-range blocks).
    pub fn from_snapshot(words: &[u32], endmem: u32) -> Result<Self, Fault> {
        if words.len() < 2 || words.len() % 2 != 0 {
            return Err(Fault::HeapError(0));
        }
        let start = words[0];
        let alloc_count = words[1];
        if start == 0 {
            if alloc_count != 0 {
                return Err(Fault::HeapError(0));
            }
            return Ok(Self::new());
        }
        if words.len() != 2 + 2 * alloc_count as usize {
            return Err(Fault::HeapError(start));
        }

        let mut blocks = Vec::new();
        let mut cursor = start;
        for pair in words[2..].chunks_exact(2) {
            let (addr, len) = (pair[0], pair[1]);
            if addr < cursor || len == 0 || u64::from(addr) + u64::from(len) > u64::from(endmem) {
                return Err(Fault::HeapError(addr));
            }
            if addr > cursor {
                blocks.push(HeapBlock {
                    addr: cursor,
                    len: addr - cursor,
                    free: true,
                });
            }
            blocks.push(HeapBlock {
                addr,
                len,
                free: false,
            });
            cursor = addr + len;
        }
        if cursor < endmem {
            blocks.push(HeapBlock {
                addr: cursor,
                len: endmem - cursor,
                free: true,
            });
        }

        Ok(Self {
            start,
            blocks,
            alloc_count,
        })
    }
}
