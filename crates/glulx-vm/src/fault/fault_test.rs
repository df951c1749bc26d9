// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for fault formatting.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::{Fault, VmError};

#[test]
fn fault_display_is_stable() {
    assert_eq!(
        Fault::OutOfRange { addr: 0x1000, len: 4 }.to_string(),
        "memory access out of range: 4 bytes at 0x1000"
    );
    assert_eq!(
        Fault::IllegalWrite(0x24).to_string(),
        "write into read-only memory at 0x24"
    );
    assert_eq!(Fault::ArithmeticError.to_string(), "division by zero");
}

#[test]
fn vm_error_carries_pc() {
    let err = VmError {
        pc: 0x42,
        fault: Fault::BadOpcode(0x777),
    };
    assert_eq!(err.to_string(), "fatal VM error at pc 0x42: unknown opcode 0x777");
}
