// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Byte stream traits consumed by save and restore.
//!
//! The file-open/close machinery of a real interpreter lives on the host
//! side; the VM only needs a sink to serialize into and a source to
//! deserialize from.

#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

/// Stream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    /// The sink refused further bytes.
    WriteFailed,
    /// The source ran out of bytes.
    UnexpectedEof,
}

impl core::fmt::Display for StreamError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::WriteFailed => write!(f, "write failed"),
            Self::UnexpectedEof => write!(f, "unexpected end of stream"),
        }
    }
}

/// A write-only byte stream.
pub trait ByteSink {
    /// Write all of `buf` to the stream.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::WriteFailed` if the sink cannot take the bytes.
    fn write_all(&mut self, buf: &[u8]) -> Result<(), StreamError>;
}

/// A read-only byte stream.
pub trait ByteSource {
    /// Fill `buf` completely from the stream.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::UnexpectedEof` if the stream ends early.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), StreamError>;
}

impl ByteSink for Vec<u8> {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), StreamError> {
        self.extend_from_slice(buf);
        Ok(())
    }
}

/// A cursor over a byte slice, for restoring from an in-memory save.
#[derive(Debug)]
pub struct SliceSource<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    /// Create a source reading from the start of `bytes`.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Number of bytes not yet consumed.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

impl ByteSource for SliceSource<'_> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), StreamError> {
        let end = self.pos + buf.len();
        if end > self.bytes.len() {
            return Err(StreamError::UnexpectedEof);
        }
        buf.copy_from_slice(&self.bytes[self.pos..end]);
        self.pos = end;
        Ok(())
    }
}

/// An owned byte cursor, for hosts that keep save data in memory.
#[derive(Debug, Default, Clone)]
pub struct VecSource {
    bytes: Vec<u8>,
    pos: usize,
}

impl VecSource {
    /// Create a source reading from the start of `bytes`.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, pos: 0 }
    }
}

impl ByteSource for VecSource {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), StreamError> {
        let end = self.pos + buf.len();
        if end > self.bytes.len() {
            return Err(StreamError::UnexpectedEof);
        }
        buf.copy_from_slice(&self.bytes[self.pos..end]);
        self.pos = end;
        Ok(())
    }
}
