// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! End-to-end execution tests: whole game images run to completion.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

mod common;

use common::{Asm, ImageBuilder, TestGlk, ret0};
use glulx_vm::vm::opcode::op;
use glulx_vm::{RunStatus, Vm};

fn run(game: &[u8]) -> (Vm, TestGlk) {
    let mut vm = Vm::new(game).unwrap();
    let mut glk = TestGlk::new();
    assert_eq!(vm.run(&mut glk).unwrap(), RunStatus::Halted);
    (vm, glk)
}

// ============================================================================
// Arithmetic through the call path
// ============================================================================

#[test]
fn wrapping_add_through_a_called_routine() {
    // routine: local0 = 0xFFFFFFFF + 1; return local0
    let mut routine = Asm::new();
    routine
        .op(op::ADD)
        .modes(&[0x3, 0x1, 0x9])
        .d(0xFFFF_FFFF)
        .b(1)
        .b(0);
    routine.op(op::RETURN).modes(&[0x9]).b(0);
    let routine_fn = routine.into_c1(1);

    // entry: call it, print the result as a number through Glk
    let mut main = Asm::new();
    main.op(op::CALLF).modes(&[0x3, 0x7]).d(0x100).d(0x200);
    main.op(op::SETIOSYS).modes(&[0x1, 0x0]).b(2);
    main.op(op::STREAMNUM).modes(&[0x7]).d(0x200);
    ret0(&mut main);

    let game = ImageBuilder::new()
        .start(&main.into_c1(1))
        .seg(0x100, &routine_fn)
        .build();
    let (vm, glk) = run(&game);
    assert_eq!(vm.memory().read_u32(0x200).unwrap(), 0);
    assert_eq!(glk.text(), "0");
}

// ============================================================================
// catch / throw
// ============================================================================

#[test]
fn throw_resumes_at_catch_with_value_and_height() {
    let mut main = Asm::new();
    // catch -> local0, branch to the throwing path
    main.op(op::CATCH).modes(&[0x9, 0x1]).b(0).b(17);
    // throw lands here: record the thrown value and the stack height
    main.op(op::COPY).modes(&[0x9, 0x7]).b(0).d(0x210);
    main.op(op::STKCOUNT).modes(&[0x7]).d(0x214);
    ret0(&mut main);
    // throwing path: leave junk on the stack, then throw 42 to the token
    main.op(op::COPY).modes(&[0x3, 0x8]).d(0xAAAA);
    main.op(op::THROW).modes(&[0x1, 0x9]).b(42).b(0);

    let game = ImageBuilder::new().start(&main.into_c1(2)).build();
    let (vm, _) = run(&game);
    assert_eq!(vm.memory().read_u32(0x210).unwrap(), 42);
    assert_eq!(vm.memory().read_u32(0x214).unwrap(), 0);
}

#[test]
fn throw_with_dead_token_is_fatal() {
    let mut main = Asm::new();
    main.op(op::THROW).modes(&[0x1, 0x3]).b(1).d(0x0FFF_FFF0);
    let game = ImageBuilder::new().start(&main.into_c1(1)).build();
    let mut vm = Vm::new(&game).unwrap();
    let err = vm.run(&mut TestGlk::new()).unwrap_err();
    assert_eq!(err.fault, glulx_vm::Fault::ThrowUnresolved(0x0FFF_FFF0));
}

// ============================================================================
// Floats through opcodes
// ============================================================================

#[test]
fn float_conversions_and_arithmetic() {
    let mut main = Asm::new();
    main.op(op::NUMTOF).modes(&[0x1, 0x7]).b(10).d(0x200);
    main.op(op::FADD)
        .modes(&[0x7, 0x3, 0x7])
        .d(0x200)
        .d(0x3F80_0000) // 1.0
        .d(0x204);
    main.op(op::FTONUMZ).modes(&[0x7, 0x7]).d(0x204).d(0x208);
    // NaN is NaN: skip the marker store when the branch is taken
    main.op(op::JISNAN).modes(&[0x3, 0x1]).d(0x7FC0_0000).b(12);
    main.op(op::COPY).modes(&[0x3, 0x7]).d(0x0BAD).d(0x20C);
    main.op(op::COPY).modes(&[0x3, 0x7]).d(0x600D).d(0x210);
    ret0(&mut main);

    let game = ImageBuilder::new().start(&main.into_c1(1)).build();
    let (vm, _) = run(&game);
    assert_eq!(vm.memory().read_u32(0x200).unwrap(), 0x4120_0000); // 10.0
    assert_eq!(vm.memory().read_u32(0x204).unwrap(), 0x4130_0000); // 11.0
    assert_eq!(vm.memory().read_u32(0x208).unwrap(), 11);
    assert_eq!(vm.memory().read_u32(0x20C).unwrap(), 0); // skipped
    assert_eq!(vm.memory().read_u32(0x210).unwrap(), 0x600D);
}

// ============================================================================
// Stack rotation
// ============================================================================

#[test]
fn stkroll_and_stkcopy() {
    let mut main = Asm::new();
    for value in 1..=5u8 {
        main.op(op::COPY).modes(&[0x1, 0x8]).b(value);
    }
    main.op(op::STKROLL).modes(&[0x1, 0x1]).b(3).b(1);
    main.op(op::STKCOPY).modes(&[0x1]).b(2);
    for slot in 0..7u32 {
        main.op(op::COPY).modes(&[0x8, 0x7]).d(0x200 + 4 * slot);
    }
    ret0(&mut main);

    let game = ImageBuilder::new().start(&main.into_c1(1)).build();
    let (vm, _) = run(&game);
    let mem = vm.memory();
    let popped: Vec<u32> = (0..7).map(|i| mem.read_u32(0x200 + 4 * i).unwrap()).collect();
    // stack was 1 2 3 4 5; roll top 3 by 1 -> 1 2 5 3 4; copy top 2 -> .. 3 4
    assert_eq!(popped, vec![4, 3, 4, 3, 5, 2, 1]);
}

// ============================================================================
// Verify and unicode strings
// ============================================================================

#[test]
fn verify_accepts_intact_image() {
    let mut main = Asm::new();
    main.op(op::VERIFY).modes(&[0x7]).d(0x200);
    ret0(&mut main);
    let game = ImageBuilder::new().start(&main.into_c1(1)).build();
    let (vm, _) = run(&game);
    assert_eq!(vm.memory().read_u32(0x200).unwrap(), 0);
}

#[test]
fn unicode_string_streams_code_points() {
    let mut text = vec![0xE2, 0, 0, 0];
    text.extend_from_slice(&0x68u32.to_be_bytes());
    text.extend_from_slice(&0x2603u32.to_be_bytes()); // snowman
    text.extend_from_slice(&0u32.to_be_bytes());

    let mut main = Asm::new();
    main.op(op::SETIOSYS).modes(&[0x1, 0x0]).b(2);
    main.op(op::STREAMSTR).modes(&[0x3]).d(0x300);
    ret0(&mut main);

    let game = ImageBuilder::new()
        .start(&main.into_c1(1))
        .seg(0x300, &text)
        .build();
    let (_, glk) = run(&game);
    assert_eq!(glk.uni, vec![0x68, 0x2603]);
}
