// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared test infrastructure for integration tests.
//!
//! This module provides:
//! - [`Asm`] - A byte emitter for hand-assembled instructions
//! - [`ImageBuilder`] - Assembles game images around a start function
//! - [`TestGlk`] - A capturing I/O system with an in-memory save slot

#![allow(dead_code, missing_docs)] // not every test file uses every helper

pub mod builder;
pub mod glk;

pub use builder::{Asm, ImageBuilder, ret0};
pub use glk::TestGlk;
