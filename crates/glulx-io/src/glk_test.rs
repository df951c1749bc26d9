// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the Glk interface types.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::glk::{GlkOutcome, GlkSystem, NullGlk};

#[test]
fn null_glk_discards_output() {
    let mut glk = NullGlk::new();
    glk.put_char(b'x');
    glk.put_char_uni(0x1F600);
    glk.put_buffer(b"hello");
}

#[test]
fn null_glk_consumes_all_args() {
    let mut glk = NullGlk::new();
    let mut popped = 0;
    let outcome = glk.dispatch(0x20, 3, &mut || {
        popped += 1;
        popped
    });
    assert_eq!(outcome, GlkOutcome::Complete(0));
    assert_eq!(popped, 3);
}

#[test]
fn default_put_buffer_forwards_chars() {
    struct Capture(Vec<u8>);
    impl GlkSystem for Capture {
        fn put_char(&mut self, ch: u8) {
            self.0.push(ch);
        }
        fn put_char_uni(&mut self, _ch: u32) {}
        fn dispatch(
            &mut self,
            _selector: u32,
            _argc: u32,
            _pop: &mut dyn FnMut() -> u32,
        ) -> GlkOutcome {
            GlkOutcome::Complete(0)
        }
    }

    let mut glk = Capture(Vec::new());
    glk.put_buffer(b"hi");
    assert_eq!(glk.0, b"hi");
}
