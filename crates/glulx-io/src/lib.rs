// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared I/O interface definitions between the Glulx VM and Glk front-ends.
//!
//! This crate defines the contract between the VM core and its host:
//! - The [`GlkSystem`] trait the VM streams output through and dispatches
//!   `glk` opcode calls to
//! - The [`ByteSink`]/[`ByteSource`] stream traits consumed by save and
//!   restore
//! - [`NullGlk`], a discard implementation for tests and headless hosts
//!
//! # Design Principles
//!
//! - **No dependencies**: Pure interface types, 100% host-testable
//! - **No Glk semantics**: window/stream/event management stays on the host
//!   side; the VM only hands over selectors and popped argument words

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(any(test, feature = "std"))]
extern crate std;

#[cfg(not(any(test, feature = "std")))]
extern crate alloc;

pub mod glk;
pub mod stream;

#[cfg(test)]
mod glk_test;

// Re-export commonly used types at crate root
pub use glk::{GlkOutcome, GlkSystem, NullGlk};
pub use stream::{ByteSink, ByteSource, SliceSource, StreamError, VecSource};
