// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Acceleration end-to-end: registered addresses bypass the interpreter.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

mod common;

use common::{Asm, ImageBuilder, TestGlk, ret0};
use glulx_vm::vm::opcode::op;
use glulx_vm::{RunStatus, Vm};

/// The replaced routine: would leave a marker and return 7 if it ran.
fn stub_routine() -> Vec<u8> {
    let mut asm = Asm::new();
    asm.op(op::COPY).modes(&[0x3, 0x7]).d(0x0BAD).d(0x1050);
    asm.op(op::RETURN).modes(&[0x1]).b(7);
    asm.into_c1(0)
}

#[test]
fn accelerated_z_region_skips_the_routine() {
    let mut main = Asm::new();
    // num_attr_bytes = 7, then accelerate index 1 at the stub's address
    main.op(op::ACCELPARAM).modes(&[0x1, 0x1]).b(7).b(7);
    main.op(op::ACCELFUNC).modes(&[0x1, 0x3]).b(1).d(0x2000);
    // calling the stub now classifies the object at 0x1000
    main.op(op::CALLFI)
        .modes(&[0x3, 0x3, 0x7])
        .d(0x2000)
        .d(0x1000)
        .d(0x1040);
    ret0(&mut main);

    let game = ImageBuilder::new()
        .layout(0x1000, 0x2200, 0x2200)
        .start(&main.into_c1(1))
        .seg(0x1000, &[0x70]) // an Inform object header
        .seg(0x2000, &stub_routine())
        .build();

    let mut vm = Vm::new(&game).unwrap();
    let mut glk = TestGlk::new();
    assert_eq!(vm.run(&mut glk).unwrap(), RunStatus::Halted);

    assert_eq!(vm.memory().read_u32(0x1040).unwrap(), 1);
    // the stub never executed
    assert_eq!(vm.memory().read_u32(0x1050).unwrap(), 0);
}

#[test]
fn unregistering_runs_the_routine_again() {
    let mut main = Asm::new();
    main.op(op::ACCELPARAM).modes(&[0x1, 0x1]).b(7).b(7);
    main.op(op::ACCELFUNC).modes(&[0x1, 0x3]).b(1).d(0x2000);
    main.op(op::CALLFI)
        .modes(&[0x3, 0x3, 0x7])
        .d(0x2000)
        .d(0x1000)
        .d(0x1040);
    // unregister and call once more: the real routine runs
    main.op(op::ACCELFUNC).modes(&[0x1, 0x3]).b(0).d(0x2000);
    main.op(op::CALLFI)
        .modes(&[0x3, 0x3, 0x7])
        .d(0x2000)
        .d(0x1000)
        .d(0x1044);
    ret0(&mut main);

    let game = ImageBuilder::new()
        .layout(0x1000, 0x2200, 0x2200)
        .start(&main.into_c1(1))
        .seg(0x1000, &[0x70])
        .seg(0x2000, &stub_routine())
        .build();

    let mut vm = Vm::new(&game).unwrap();
    assert_eq!(vm.run(&mut TestGlk::new()).unwrap(), RunStatus::Halted);

    assert_eq!(vm.memory().read_u32(0x1040).unwrap(), 1);
    assert_eq!(vm.memory().read_u32(0x1044).unwrap(), 7);
    assert_eq!(vm.memory().read_u32(0x1050).unwrap(), 0x0BAD);
}

#[test]
fn unsupported_accel_index_is_ignored() {
    let mut main = Asm::new();
    main.op(op::ACCELFUNC).modes(&[0x1, 0x3]).b(99).d(0x2000);
    main.op(op::CALLFI)
        .modes(&[0x3, 0x3, 0x7])
        .d(0x2000)
        .d(0x1000)
        .d(0x1040);
    ret0(&mut main);

    let game = ImageBuilder::new()
        .layout(0x1000, 0x2200, 0x2200)
        .start(&main.into_c1(1))
        .seg(0x1000, &[0x70])
        .seg(0x2000, &stub_routine())
        .build();

    let mut vm = Vm::new(&game).unwrap();
    assert_eq!(vm.run(&mut TestGlk::new()).unwrap(), RunStatus::Halted);
    // the routine itself ran
    assert_eq!(vm.memory().read_u32(0x1040).unwrap(), 7);
    assert_eq!(vm.memory().read_u32(0x1050).unwrap(), 0x0BAD);
}
