// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! A capturing Glk for integration tests.

use glulx_io::{ByteSink, ByteSource, GlkOutcome, GlkSystem, StreamError};

/// Captures output and serves one in-memory save slot.
#[derive(Default)]
pub struct TestGlk {
    pub out: Vec<u8>,
    pub uni: Vec<u32>,
    pub dispatches: Vec<(u32, Vec<u32>)>,
    pub save_data: Vec<u8>,
    restore_pos: usize,
}

impl TestGlk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collected Latin-1 output as text.
    pub fn text(&self) -> String {
        self.out.iter().map(|&b| b as char).collect()
    }
}

impl GlkSystem for TestGlk {
    fn put_char(&mut self, ch: u8) {
        self.out.push(ch);
    }

    fn put_char_uni(&mut self, ch: u32) {
        self.uni.push(ch);
    }

    fn dispatch(&mut self, selector: u32, argc: u32, pop: &mut dyn FnMut() -> u32) -> GlkOutcome {
        let args: Vec<u32> = (0..argc).map(|_| pop()).collect();
        self.dispatches.push((selector, args));
        GlkOutcome::Complete(0)
    }

    fn save_sink(&mut self, _fileref: u32) -> Option<&mut dyn ByteSink> {
        self.save_data.clear();
        Some(&mut self.save_data)
    }

    fn restore_source(&mut self, _fileref: u32) -> Option<&mut dyn ByteSource> {
        self.restore_pos = 0;
        Some(self)
    }
}

impl ByteSource for TestGlk {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), StreamError> {
        let end = self.restore_pos + buf.len();
        if end > self.save_data.len() {
            return Err(StreamError::UnexpectedEof);
        }
        buf.copy_from_slice(&self.save_data[self.restore_pos..end]);
        self.restore_pos = end;
        Ok(())
    }
}
