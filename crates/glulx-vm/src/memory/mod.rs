// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The Glulx memory map.
//!
//! One contiguous byte array, big-endian for every multi-byte value:
//!
//! ```text
//! 0x000000 ┌──────────────────────┐
//!          │ header (read-only)   │
//! 0x000024 ├──────────────────────┤
//!          │ ROM (read-only)      │
//! ramstart ├──────────────────────┤
//!          │ RAM from game file   │
//! extstart ├──────────────────────┤
//!          │ zero-initialised RAM │
//! endmem   └──────────────────────┘
//! ```
//!
//! `endmem` may grow past its initial value via `setmemsize` or the heap;
//! it never shrinks below it. The pristine game image is kept for restart,
//! the save-file delta, and `verify`.


#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use crate::fault::Fault;
use crate::header::GameHeader;

/// Memory segment boundaries and the protected range must stay 256-aligned.
pub const PAGE: u32 = 256;

/// The live memory image of a running game.
pub struct MemoryMap {
    bytes: Vec<u8>,
    original: Vec<u8>,
    ramstart: u32,
    extstart: u32,
    endmem_initial: u32,
    protect_start: u32,
    protect_len: u32,
}

impl MemoryMap {
    /// Build the initial memory image from a validated header and the game
    /// file bytes.
    #[must_use]
    pub fn new(header: &GameHeader, game: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(header.endmem as usize);
        bytes.extend_from_slice(&game[..header.extstart as usize]);
        bytes.resize(header.endmem as usize, 0);

        Self {
            bytes,
            original: game[..header.extstart as usize].to_vec(),
            ramstart: header.ramstart,
            extstart: header.extstart,
            endmem_initial: header.endmem,
            protect_start: 0,
            protect_len: 0,
        }
    }

    /// Start of writable memory.
    #[must_use]
    pub const fn ramstart(&self) -> u32 {
        self.ramstart
    }

    /// End of the game-file-backed portion.
    #[must_use]
    pub const fn extstart(&self) -> u32 {
        self.extstart
    }

    /// Initial end of memory, from the header.
    #[must_use]
    pub const fn endmem_initial(&self) -> u32 {
        self.endmem_initial
    }

    /// Current end of memory.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// The pristine game-file image (through extstart).
    #[must_use]
    pub fn original(&self) -> &[u8] {
        &self.original
    }

    /// A byte of the pristine image; zero beyond extstart.
    #[must_use]
    pub fn original_byte(&self, addr: u32) -> u8 {
        self.original.get(addr as usize).copied().unwrap_or(0)
    }

    /// The live RAM, `[ramstart, endmem)`.
    #[must_use]
    pub fn ram(&self) -> &[u8] {
        &self.bytes[self.ramstart as usize..]
    }

    fn check_read(&self, addr: u32, len: u32) -> Result<usize, Fault> {
        let end = addr as u64 + len as u64;
        if end > self.bytes.len() as u64 {
            return Err(Fault::OutOfRange { addr, len });
        }
        Ok(addr as usize)
    }

    fn check_write(&self, addr: u32, len: u32) -> Result<usize, Fault> {
        if addr < self.ramstart {
            return Err(Fault::IllegalWrite(addr));
        }
        self.check_read(addr, len)
    }

    /// Read one byte.
    pub fn read_u8(&self, addr: u32) -> Result<u32, Fault> {
        let at = self.check_read(addr, 1)?;
        Ok(u32::from(self.bytes[at]))
    }

    /// Read a big-endian u16.
    pub fn read_u16(&self, addr: u32) -> Result<u32, Fault> {
        let at = self.check_read(addr, 2)?;
        Ok(u32::from(u16::from_be_bytes([
            self.bytes[at],
            self.bytes[at + 1],
        ])))
    }

    /// Read a big-endian u32.
    pub fn read_u32(&self, addr: u32) -> Result<u32, Fault> {
        let at = self.check_read(addr, 4)?;
        Ok(u32::from_be_bytes([
            self.bytes[at],
            self.bytes[at + 1],
            self.bytes[at + 2],
            self.bytes[at + 3],
        ]))
    }

    /// Write one byte.
    pub fn write_u8(&mut self, addr: u32, value: u32) -> Result<(), Fault> {
        let at = self.check_write(addr, 1)?;
        self.bytes[at] = value as u8;
        Ok(())
    }

    /// Write a big-endian u16.
    pub fn write_u16(&mut self, addr: u32, value: u32) -> Result<(), Fault> {
        let at = self.check_write(addr, 2)?;
        self.bytes[at..at + 2].copy_from_slice(&(value as u16).to_be_bytes());
        Ok(())
    }

    /// Write a big-endian u32.
    pub fn write_u32(&mut self, addr: u32, value: u32) -> Result<(), Fault> {
        let at = self.check_write(addr, 4)?;
        self.bytes[at..at + 4].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Resize memory to `n` bytes.
    ///
    /// Fails when `n` is below the initial endmem or not 256-aligned; the
    /// heap-active rejection belongs to the `setmemsize` opcode so the heap
    /// itself can resize. Growth zero-fills, shrinkage drops the tail.
    #[must_use]
    pub fn set_size(&mut self, n: u32) -> bool {
        if n < self.endmem_initial || n % PAGE != 0 {
            return false;
        }
        log::debug!("memory resize {:#x} -> {:#x}", self.bytes.len(), n);
        self.bytes.resize(n as usize, 0);
        true
    }

    /// Set the protected range; `start == 0 && len == 0` disables it.
    pub fn set_protect(&mut self, start: u32, len: u32) {
        self.protect_start = start;
        self.protect_len = len;
    }

    /// The current protected range as `(start, len)`.
    #[must_use]
    pub const fn protect_range(&self) -> (u32, u32) {
        (self.protect_start, self.protect_len)
    }

    fn protected(&self, addr: u32) -> bool {
        self.protect_len != 0
            && addr >= self.protect_start
            && addr - self.protect_start < self.protect_len
    }

    /// Reset memory to its initial state, sparing protected bytes.
    ///
    /// Memory shrinks back to the initial endmem; RAM is reloaded from the
    /// game file with the zero-initialised tail cleared.
    pub fn reset(&mut self) {
        self.bytes.resize(self.endmem_initial as usize, 0);
        for addr in self.ramstart..self.endmem_initial {
            if self.protected(addr) {
                continue;
            }
            self.bytes[addr as usize] = self.original_byte(addr);
        }
    }

    /// Overwrite RAM with a restored image, sparing protected bytes.
    ///
    /// `ram` covers `[ramstart, ramstart + ram.len())` and must fit inside
    /// the current memory size.
    pub fn load_ram(&mut self, ram: &[u8]) -> Result<(), Fault> {
        let base = self.ramstart;
        self.check_read(base, ram.len() as u32)?;
        for (i, &byte) in ram.iter().enumerate() {
            let addr = base + i as u32;
            if self.protected(addr) {
                continue;
            }
            self.bytes[addr as usize] = byte;
        }
        Ok(())
    }

    /// Zero `len` bytes at `addr`.
    pub fn zero_range(&mut self, addr: u32, len: u32) -> Result<(), Fault> {
        if len == 0 {
            return Ok(());
        }
        let at = self.check_write(addr, len)?;
        self.bytes[at..at + len as usize].fill(0);
        Ok(())
    }

    /// Copy `len` bytes from `src` to `dst`, handling overlap like memmove.
    pub fn copy_range(&mut self, src: u32, dst: u32, len: u32) -> Result<(), Fault> {
        if len == 0 {
            return Ok(());
        }
        let from = self.check_read(src, len)?;
        let to = self.check_write(dst, len)?;
        self.bytes.copy_within(from..from + len as usize, to);
        Ok(())
    }
}
