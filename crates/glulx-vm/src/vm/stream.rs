// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! String streaming.
//!
//! Strings are printed by an iterative job machine, never by recursing
//! through host frames. The current job is one of: a Latin-1 string, a
//! UTF-32 string, a walk through the Huffman decoding table, or a decimal
//! number. When a job has to call a VM function - every character under a
//! filter I/O system, or an embedded-routine node in a compressed string -
//! it parks its position in a resume stub on the value stack and enters
//! the function; the return path finds the stub and re-enters the job.
//!
//! The first suspension of a print pushes one extra stub that resumes
//! ordinary execution, so the instruction after the stream opcode runs
//! exactly once the whole string is out.
//!
//! Compressed strings consume bits most-significant-first within each
//! byte. Leaf nodes 0x02/0x04 emit one character, 0x03/0x05 an embedded
//! string, and 0x08-0x0B reference another string or routine, double
//! indirect and with arguments in the higher two.

use glulx_io::GlkSystem;

#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use crate::fault::Fault;
use crate::stack::{CallStub, dest};

use super::Vm;

/// I/O system selectors.
pub mod iosys {
    /// Discard all output.
    pub const NULL: u32 = 0;
    /// Feed each character to a game routine.
    pub const FILTER: u32 = 1;
    /// Send output to the Glk current stream.
    pub const GLK: u32 = 2;
    /// Unicode variant of the filter system.
    pub const FILTER_UNI: u32 = 20;
}

/// Longest decimal rendering of a signed word, with sign.
const DECIMAL_MAX: usize = 12;

/// A string-printing job and its position.
#[derive(Debug, Clone, Copy)]
enum StreamJob {
    /// Zero-terminated Latin-1 bytes at `addr`.
    Latin1 { addr: u32 },
    /// Zero-terminated UTF-32 words at `addr`.
    Unicode { addr: u32 },
    /// Compressed string: next bit is `bits` into the byte at `addr`.
    Huff { addr: u32, bits: u32 },
    /// Signed decimal of `value`, next digit index `digit`.
    Decimal { value: u32, digit: u32 },
}

impl StreamJob {
    /// Park this job in a stub.
    fn stub(self, fp: u32) -> CallStub {
        match self {
            Self::Latin1 { addr } => CallStub {
                dest_type: dest::RESUME_CSTR,
                dest_addr: 0,
                pc: addr,
                fp,
            },
            Self::Unicode { addr } => CallStub {
                dest_type: dest::RESUME_UNI,
                dest_addr: 0,
                pc: addr,
                fp,
            },
            Self::Huff { addr, bits } => CallStub {
                dest_type: dest::RESUME_HUFF,
                dest_addr: bits,
                pc: addr,
                fp,
            },
            Self::Decimal { value, digit } => CallStub {
                dest_type: dest::RESUME_NUM,
                dest_addr: digit,
                pc: value,
                fp,
            },
        }
    }
}

impl Vm {
    /// `streamchar`/`streamunichar`: emit one code point.
    pub(crate) fn stream_char<G: GlkSystem>(
        &mut self,
        io: &mut G,
        ch: u32,
        unicode: bool,
    ) -> Result<(), Fault> {
        match self.iosys_mode {
            iosys::NULL => Ok(()),
            iosys::GLK => {
                if unicode {
                    io.put_char_uni(ch);
                } else {
                    io.put_char(ch as u8);
                }
                Ok(())
            }
            _ => {
                // One filter call; execution continues at the current PC
                // when the routine returns.
                let rock = self.iosys_rock;
                self.stack.push_stub(CallStub {
                    dest_type: dest::DISCARD,
                    dest_addr: 0,
                    pc: self.pc,
                    fp: self.stack.fp(),
                })?;
                self.enter_function(rock, &[ch])
            }
        }
    }

    /// `streamnum`: emit a signed decimal.
    pub(crate) fn begin_stream_num<G: GlkSystem>(
        &mut self,
        io: &mut G,
        value: u32,
    ) -> Result<(), Fault> {
        self.run_stream(io, StreamJob::Decimal { value, digit: 0 }, false)
    }

    /// `streamstr`: emit the string object at `addr`.
    pub(crate) fn begin_stream_str<G: GlkSystem>(
        &mut self,
        io: &mut G,
        addr: u32,
    ) -> Result<(), Fault> {
        let job = self.string_job(addr)?;
        self.run_stream(io, job, false)
    }

    /// Re-enter a job parked in `stub` (the function-return path).
    pub(crate) fn resume_stream<G: GlkSystem>(
        &mut self,
        io: &mut G,
        stub: CallStub,
    ) -> Result<(), Fault> {
        let job = match stub.dest_type {
            dest::RESUME_CSTR => StreamJob::Latin1 { addr: stub.pc },
            dest::RESUME_UNI => StreamJob::Unicode { addr: stub.pc },
            dest::RESUME_HUFF => StreamJob::Huff {
                addr: stub.pc,
                bits: stub.dest_addr,
            },
            dest::RESUME_NUM => StreamJob::Decimal {
                value: stub.pc,
                digit: stub.dest_addr,
            },
            other => {
                log::error!("resume with non-stream stub {other:#x}");
                return Err(Fault::NotAString(stub.pc));
            }
        };
        self.run_stream(io, job, true)
    }

    /// Classify the string object at `addr` into a job.
    fn string_job(&self, addr: u32) -> Result<StreamJob, Fault> {
        match self.mem.read_u8(addr)? {
            0xE0 => Ok(StreamJob::Latin1 { addr: addr + 1 }),
            0xE1 => Ok(StreamJob::Huff {
                addr: addr + 1,
                bits: 0,
            }),
            0xE2 => Ok(StreamJob::Unicode { addr: addr + 4 }),
            _ => Err(Fault::NotAString(addr)),
        }
    }

    fn filtering(&self) -> bool {
        matches!(self.iosys_mode, iosys::FILTER | iosys::FILTER_UNI)
    }

    /// Push the resume-execution stub under the first stream suspension.
    fn ensure_base_stub(&mut self, inmiddle: &mut bool) -> Result<(), Fault> {
        if !*inmiddle {
            self.stack.push_stub(CallStub {
                dest_type: dest::RESUME_FUNC,
                dest_addr: 0,
                pc: self.pc,
                fp: self.stack.fp(),
            })?;
            *inmiddle = true;
        }
        Ok(())
    }

    /// Suspend the current job for a filter call on `ch`.
    fn filter_char(&mut self, job: StreamJob, ch: u32, inmiddle: &mut bool) -> Result<(), Fault> {
        self.ensure_base_stub(inmiddle)?;
        let stub = job.stub(self.stack.fp());
        self.stack.push_stub(stub)?;
        let rock = self.iosys_rock;
        self.enter_function(rock, &[ch])
    }

    /// Finish the current job: either unwind to the next parked job, or
    /// (with no stream stubs below) simply return.
    ///
    /// `Ok(None)` means printing is over and execution state is restored.
    fn next_stream_job(&mut self, inmiddle: bool) -> Result<Option<StreamJob>, Fault> {
        if !inmiddle {
            return Ok(None);
        }
        let stub = self.stack.pop_stub()?;
        match stub.dest_type {
            dest::RESUME_FUNC => {
                self.pc = stub.pc;
                self.stack.set_fp(stub.fp);
                Ok(None)
            }
            dest::RESUME_CSTR => Ok(Some(StreamJob::Latin1 { addr: stub.pc })),
            dest::RESUME_UNI => Ok(Some(StreamJob::Unicode { addr: stub.pc })),
            dest::RESUME_HUFF => Ok(Some(StreamJob::Huff {
                addr: stub.pc,
                bits: stub.dest_addr,
            })),
            dest::RESUME_NUM => Ok(Some(StreamJob::Decimal {
                value: stub.pc,
                digit: stub.dest_addr,
            })),
            other => {
                log::error!("string terminator over non-stream stub {other:#x}");
                Err(Fault::NotAString(stub.pc))
            }
        }
    }

    /// The job machine. Returns when printing completes or a VM function
    /// has been entered (the dispatch loop then runs it to completion and
    /// the return path re-enters here).
    #[allow(clippy::too_many_lines)]
    fn run_stream<G: GlkSystem>(
        &mut self,
        io: &mut G,
        job: StreamJob,
        inmiddle: bool,
    ) -> Result<(), Fault> {
        let mut job = job;
        let mut inmiddle = inmiddle;
        loop {
            match job {
                StreamJob::Latin1 { mut addr } => {
                    loop {
                        let ch = self.mem.read_u8(addr)?;
                        if ch == 0 {
                            break;
                        }
                        addr += 1;
                        match self.iosys_mode {
                            iosys::NULL => {}
                            iosys::GLK => io.put_char(ch as u8),
                            _ => {
                                return self.filter_char(
                                    StreamJob::Latin1 { addr },
                                    ch,
                                    &mut inmiddle,
                                );
                            }
                        }
                    }
                    match self.next_stream_job(inmiddle)? {
                        Some(next) => job = next,
                        None => return Ok(()),
                    }
                }

                StreamJob::Unicode { mut addr } => {
                    loop {
                        let ch = self.mem.read_u32(addr)?;
                        if ch == 0 {
                            break;
                        }
                        addr += 4;
                        match self.iosys_mode {
                            iosys::NULL => {}
                            iosys::GLK => io.put_char_uni(ch),
                            _ => {
                                return self.filter_char(
                                    StreamJob::Unicode { addr },
                                    ch,
                                    &mut inmiddle,
                                );
                            }
                        }
                    }
                    match self.next_stream_job(inmiddle)? {
                        Some(next) => job = next,
                        None => return Ok(()),
                    }
                }

                StreamJob::Decimal { value, digit } => {
                    let mut buf = [0u8; DECIMAL_MAX];
                    let len = decimal_digits(value, &mut buf);
                    let at = (digit as usize).min(len);
                    match self.iosys_mode {
                        iosys::NULL => {}
                        iosys::GLK => io.put_buffer(&buf[at..len]),
                        _ => {
                            if at < len {
                                return self.filter_char(
                                    StreamJob::Decimal {
                                        value,
                                        digit: digit + 1,
                                    },
                                    u32::from(buf[at]),
                                    &mut inmiddle,
                                );
                            }
                        }
                    }
                    match self.next_stream_job(inmiddle)? {
                        Some(next) => job = next,
                        None => return Ok(()),
                    }
                }

                StreamJob::Huff { mut addr, mut bits } => {
                    let root = self.mem.read_u32(self.stringtbl + 8)?;
                    let mut node = root;
                    let finished = loop {
                        match self.mem.read_u8(node)? {
                            // branch: consume one bit
                            0x00 => {
                                let byte = self.mem.read_u8(addr)?;
                                let bit = (byte >> (7 - bits)) & 1;
                                bits += 1;
                                if bits == 8 {
                                    bits = 0;
                                    addr += 1;
                                }
                                node = if bit == 0 {
                                    self.mem.read_u32(node + 1)?
                                } else {
                                    self.mem.read_u32(node + 5)?
                                };
                            }

                            // string terminator
                            0x01 => break true,

                            // single Latin-1 character
                            0x02 => {
                                let ch = self.mem.read_u8(node + 1)?;
                                match self.iosys_mode {
                                    iosys::NULL => {}
                                    iosys::GLK => io.put_char(ch as u8),
                                    _ => {
                                        return self.filter_char(
                                            StreamJob::Huff { addr, bits },
                                            ch,
                                            &mut inmiddle,
                                        );
                                    }
                                }
                                node = root;
                            }

                            // single Unicode character
                            0x04 => {
                                let ch = self.mem.read_u32(node + 1)?;
                                match self.iosys_mode {
                                    iosys::NULL => {}
                                    iosys::GLK => io.put_char_uni(ch),
                                    _ => {
                                        return self.filter_char(
                                            StreamJob::Huff { addr, bits },
                                            ch,
                                            &mut inmiddle,
                                        );
                                    }
                                }
                                node = root;
                            }

                            // embedded Latin-1 string
                            0x03 => {
                                if self.filtering() {
                                    self.ensure_base_stub(&mut inmiddle)?;
                                    let parked = StreamJob::Huff { addr, bits }.stub(self.stack.fp());
                                    self.stack.push_stub(parked)?;
                                    job = StreamJob::Latin1 { addr: node + 1 };
                                    break false;
                                }
                                let mut at = node + 1;
                                loop {
                                    let ch = self.mem.read_u8(at)?;
                                    if ch == 0 {
                                        break;
                                    }
                                    if self.iosys_mode == iosys::GLK {
                                        io.put_char(ch as u8);
                                    }
                                    at += 1;
                                }
                                node = root;
                            }

                            // embedded Unicode string
                            0x05 => {
                                if self.filtering() {
                                    self.ensure_base_stub(&mut inmiddle)?;
                                    let parked = StreamJob::Huff { addr, bits }.stub(self.stack.fp());
                                    self.stack.push_stub(parked)?;
                                    job = StreamJob::Unicode { addr: node + 1 };
                                    break false;
                                }
                                let mut at = node + 1;
                                loop {
                                    let ch = self.mem.read_u32(at)?;
                                    if ch == 0 {
                                        break;
                                    }
                                    if self.iosys_mode == iosys::GLK {
                                        io.put_char_uni(ch);
                                    }
                                    at += 4;
                                }
                                node = root;
                            }

                            // indirect references, possibly with arguments
                            node_type @ (0x08 | 0x09 | 0x0A | 0x0B) => {
                                let mut target = self.mem.read_u32(node + 1)?;
                                if node_type == 0x09 || node_type == 0x0B {
                                    target = self.mem.read_u32(target)?;
                                }
                                let args: Vec<u32> = if node_type == 0x0A || node_type == 0x0B {
                                    let argc = self.mem.read_u32(node + 5)?;
                                    let mut list = Vec::with_capacity(argc.min(32) as usize);
                                    for i in 0..argc {
                                        list.push(self.mem.read_u32(node + 9 + 4 * i)?);
                                    }
                                    list
                                } else {
                                    Vec::new()
                                };

                                match self.mem.read_u8(target)? {
                                    0xE0 | 0xE1 | 0xE2 => {
                                        self.ensure_base_stub(&mut inmiddle)?;
                                        let parked =
                                            StreamJob::Huff { addr, bits }.stub(self.stack.fp());
                                        self.stack.push_stub(parked)?;
                                        job = self.string_job(target)?;
                                        break false;
                                    }
                                    0xC0 | 0xC1 => {
                                        if let Some(index) = self.accel.find(target) {
                                            // Accelerated routines print
                                            // nothing; keep decoding.
                                            let _ = self.call_accel(io, index, &args)?;
                                            node = root;
                                        } else {
                                            self.ensure_base_stub(&mut inmiddle)?;
                                            let parked = StreamJob::Huff { addr, bits }
                                                .stub(self.stack.fp());
                                            self.stack.push_stub(parked)?;
                                            self.enter_function(target, &args)?;
                                            return Ok(());
                                        }
                                    }
                                    _ => return Err(Fault::NotAString(target)),
                                }
                            }

                            _ => return Err(Fault::NotAString(node)),
                        }
                    };
                    if finished {
                        match self.next_stream_job(inmiddle)? {
                            Some(next) => job = next,
                            None => return Ok(()),
                        }
                    }
                }
            }
        }
    }
}

/// Render a signed word as decimal ASCII; returns the length used.
fn decimal_digits(value: u32, buf: &mut [u8; DECIMAL_MAX]) -> usize {
    let signed = i64::from(value as i32);
    let mut magnitude = signed.unsigned_abs();
    let mut reversed = [0u8; DECIMAL_MAX];
    let mut count = 0;
    if magnitude == 0 {
        reversed[0] = b'0';
        count = 1;
    }
    while magnitude > 0 {
        reversed[count] = b'0' + (magnitude % 10) as u8;
        magnitude /= 10;
        count += 1;
    }

    let mut len = 0;
    if signed < 0 {
        buf[0] = b'-';
        len = 1;
    }
    for i in (0..count).rev() {
        buf[len] = reversed[i];
        len += 1;
    }
    len
}
