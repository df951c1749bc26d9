// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the random source.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::{RandomGen, Xoshiro128};

#[test]
fn seeded_sequences_are_reproducible() {
    let mut a = RandomGen::from_seed(12345);
    let mut b = RandomGen::from_seed(12345);
    for _ in 0..64 {
        assert_eq!(a.next_u32(), b.next_u32());
    }
}

#[test]
fn different_seeds_diverge() {
    let mut a = RandomGen::from_seed(1);
    let mut b = RandomGen::from_seed(2);
    let same = (0..16).filter(|_| a.next_u32() == b.next_u32()).count();
    assert!(same < 16);
}

#[test]
fn zero_seed_is_native() {
    assert_eq!(RandomGen::from_seed(0), RandomGen::Native);
}

#[test]
fn positive_range() {
    let mut r#gen = RandomGen::from_seed(99);
    for _ in 0..256 {
        let v = r#gen.range(6) as i32;
        assert!((0..6).contains(&v));
    }
}

#[test]
fn negative_range() {
    let mut r#gen = RandomGen::from_seed(99);
    for _ in 0..256 {
        let v = r#gen.range((-6i32) as u32) as i32;
        assert!((-5..=0).contains(&v));
    }
}

#[test]
fn range_zero_passes_word_through() {
    let mut r#gen = RandomGen::from_seed(7);
    let mut reference = Xoshiro128::seeded(7);
    assert_eq!(r#gen.range(0), reference.next_u32());
}

#[test]
fn snapshot_round_trip_mid_stream() {
    let mut r#gen = RandomGen::from_seed(4242);
    for _ in 0..10 {
        let _ = r#gen.next_u32();
    }
    let snap = r#gen.snapshot();
    let mut replay = RandomGen::from_snapshot(snap);
    for _ in 0..32 {
        assert_eq!(r#gen.next_u32(), replay.next_u32());
    }
}

#[test]
fn native_mode_produces_words() {
    let mut r#gen = RandomGen::Native;
    // Just exercise the path; entropy values are unpredictable.
    let _ = r#gen.next_u32();
    let _ = r#gen.range(10);
    assert_eq!(r#gen.snapshot(), [0, 0, 0, 0, 0]);
}

#[test]
fn seeded_distribution_covers_range() {
    let mut r#gen = RandomGen::from_seed(31337);
    let mut seen = [false; 8];
    for _ in 0..512 {
        seen[r#gen.range(8) as usize] = true;
    }
    assert!(seen.iter().all(|&s| s));
}
