// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # Glulx VM
//!
//! Interpreter core for the Glulx 32-bit stack machine that runs
//! Inform-compiled story files.
//!
//! This crate provides:
//! - Game file loading and header validation
//! - The flat big-endian memory map with ROM/RAM split and protected range
//! - The `malloc`/`mfree` heap layered over the end of memory
//! - The typed call/value stack with locals descriptors and call stubs
//! - The dispatch loop with the full opcode set, including compressed
//!   string streaming, the search opcodes and the float subsystem
//! - Function acceleration for the well-known Inform library routines
//! - Save, restore and in-memory undo in a Quetzal-style layout
//!
//! The host supplies I/O through the traits in `glulx-io`: a `GlkSystem`
//! for output and dispatch, and byte streams for save files.
//!
//! ```no_run
//! use glulx_io::NullGlk;
//! use glulx_vm::Vm;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let game = std::fs::read("story.ulx")?;
//! let mut vm = Vm::new(&game)?;
//! let mut glk = NullGlk::new();
//! vm.run(&mut glk)?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(any(test, feature = "std"))]
extern crate std;

#[cfg(not(any(test, feature = "std")))]
extern crate alloc;

pub mod accel;
pub mod fault;
pub mod float;
pub mod header;
pub mod heap;
pub mod memory;
pub mod operand;
pub mod rand;
pub mod save;
pub mod stack;
pub mod vm;

// Re-export commonly used types at crate root
pub use fault::{Fault, VmError};
pub use header::GameHeader;
pub use vm::{RunStatus, Vm};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
