// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The search opcodes over in-memory tables.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

mod common;

use common::{Asm, ImageBuilder, TestGlk, ret0};
use glulx_vm::vm::opcode::op;
use glulx_vm::{RunStatus, Vm};

/// Five 8-byte structs keyed 2,4,6,8,10, then an all-zero terminator.
fn sorted_table() -> Vec<u8> {
    let mut table = Vec::new();
    for key in [2u32, 4, 6, 8, 10] {
        table.extend_from_slice(&key.to_be_bytes());
        table.extend_from_slice(&(key * 100).to_be_bytes());
    }
    table.extend_from_slice(&[0u8; 8]);
    table
}

/// Two linked nodes: {key, next}.
fn linked_nodes() -> Vec<u8> {
    let mut nodes = Vec::new();
    nodes.extend_from_slice(&5u32.to_be_bytes());
    nodes.extend_from_slice(&0x390u32.to_be_bytes());
    nodes.extend_from_slice(&[0u8; 8]); // padding to 0x390
    nodes.extend_from_slice(&9u32.to_be_bytes());
    nodes.extend_from_slice(&0u32.to_be_bytes());
    nodes
}

fn run(game: &[u8]) -> Vm {
    let mut vm = Vm::new(game).unwrap();
    assert_eq!(vm.run(&mut TestGlk::new()).unwrap(), RunStatus::Halted);
    vm
}

#[test]
fn linear_search_finds_address() {
    let mut main = Asm::new();
    main.op(op::LINEARSEARCH)
        .modes(&[0x1, 0x1, 0x3, 0x1, 0x1, 0x1, 0x1, 0x7])
        .b(6) // key
        .b(4) // keysize
        .d(0x300)
        .b(8) // structsize
        .b(5) // numstructs
        .b(0) // keyoffset
        .b(0) // options
        .d(0x200);
    // miss with return-index option: -1
    main.op(op::LINEARSEARCH)
        .modes(&[0x1, 0x1, 0x3, 0x1, 0x1, 0x1, 0x1, 0x7])
        .b(7)
        .b(4)
        .d(0x300)
        .b(8)
        .b(5)
        .b(0)
        .b(1)
        .d(0x204);
    ret0(&mut main);

    let game = ImageBuilder::new()
        .start(&main.into_c1(1))
        .seg(0x300, &sorted_table())
        .build();
    let vm = run(&game);
    assert_eq!(vm.memory().read_u32(0x200).unwrap(), 0x310);
    assert_eq!(vm.memory().read_u32(0x204).unwrap(), 0xFFFF_FFFF);
}

#[test]
fn linear_search_zero_key_terminates_unbounded_scan() {
    let mut main = Asm::new();
    main.op(op::LINEARSEARCH)
        .modes(&[0x1, 0x1, 0x3, 0x1, 0x1, 0x1, 0x1, 0x7])
        .b(99)
        .b(4)
        .d(0x300)
        .b(8)
        .b(0xFF) // numstructs -1: unbounded
        .b(0)
        .b(2) // zero key terminates
        .d(0x200);
    ret0(&mut main);

    let game = ImageBuilder::new()
        .start(&main.into_c1(1))
        .seg(0x300, &sorted_table())
        .build();
    let vm = run(&game);
    assert_eq!(vm.memory().read_u32(0x200).unwrap(), 0);
}

#[test]
fn binary_search_hits_and_misses() {
    let mut main = Asm::new();
    // hit with return-index: key 8 is struct 3
    main.op(op::BINARYSEARCH)
        .modes(&[0x1, 0x1, 0x3, 0x1, 0x1, 0x1, 0x1, 0x7])
        .b(8)
        .b(4)
        .d(0x300)
        .b(8)
        .b(5)
        .b(0)
        .b(1)
        .d(0x200);
    // miss between keys: 0
    main.op(op::BINARYSEARCH)
        .modes(&[0x1, 0x1, 0x3, 0x1, 0x1, 0x1, 0x1, 0x7])
        .b(7)
        .b(4)
        .d(0x300)
        .b(8)
        .b(5)
        .b(0)
        .b(0)
        .d(0x204);
    ret0(&mut main);

    let game = ImageBuilder::new()
        .start(&main.into_c1(1))
        .seg(0x300, &sorted_table())
        .build();
    let vm = run(&game);
    assert_eq!(vm.memory().read_u32(0x200).unwrap(), 3);
    assert_eq!(vm.memory().read_u32(0x204).unwrap(), 0);
}

#[test]
fn linked_search_follows_chain() {
    let mut main = Asm::new();
    main.op(op::LINKEDSEARCH)
        .modes(&[0x1, 0x1, 0x3, 0x0, 0x0, 0x1, 0x1, 0x7])
        .b(9)
        .b(4)
        .d(0x380)
        .b(0) // keyoffset
        .b(0) // options
        .d(0x200);
    main.op(op::LINKEDSEARCH)
        .modes(&[0x1, 0x1, 0x3, 0x0, 0x0, 0x1, 0x1, 0x7])
        .b(7)
        .b(4)
        .d(0x380)
        .b(0)
        .b(0)
        .d(0x204);
    ret0(&mut main);

    let game = ImageBuilder::new()
        .start(&main.into_c1(1))
        .seg(0x380, &linked_nodes())
        .build();
    let vm = run(&game);
    assert_eq!(vm.memory().read_u32(0x200).unwrap(), 0x390);
    assert_eq!(vm.memory().read_u32(0x204).unwrap(), 0);
}

#[test]
fn indirect_key_compares_bytes_at_address() {
    let mut main = Asm::new();
    main.op(op::LINEARSEARCH)
        .modes(&[0x3, 0x1, 0x3, 0x1, 0x1, 0x1, 0x1, 0x7])
        .d(0x3C0) // address of the key bytes
        .b(4)
        .d(0x300)
        .b(8)
        .b(5)
        .b(0)
        .b(4) // key indirect
        .d(0x200);
    ret0(&mut main);

    let game = ImageBuilder::new()
        .start(&main.into_c1(1))
        .seg(0x300, &sorted_table())
        .seg(0x3C0, &6u32.to_be_bytes())
        .build();
    let vm = run(&game);
    assert_eq!(vm.memory().read_u32(0x200).unwrap(), 0x310);
}
