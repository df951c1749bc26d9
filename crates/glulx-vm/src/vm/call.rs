// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Function calls, returns, and catch/throw.
//!
//! Every call pushes a four-word stub recording where its result goes and
//! where execution resumes; returns pop the frame and complete through that
//! stub. Catch tokens are the stack position just above such a stub, and
//! throw unwinds to a token and completes through the stub below it. The
//! same records drive the string decoder's resumption, so a return can
//! land in the middle of a string and continue printing it.

#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use glulx_io::GlkSystem;

use crate::fault::Fault;
use crate::operand::Operand;
use crate::stack::{CallStub, LocalsLayout, STUB_SIZE, dest};

use super::{Continuation, Vm, iosys};

/// A store operand as stub fields.
pub(crate) fn dest_parts(op: Operand) -> (u32, u32) {
    match op {
        Operand::Discard | Operand::Const(_) => (dest::DISCARD, 0),
        Operand::Addr(addr) => (dest::MAIN, addr),
        Operand::Local(offset) => (dest::LOCAL, offset),
        Operand::Stack => (dest::STACK, 0),
    }
}

impl Vm {
    /// Push a stub that resumes at the current PC and stores to `dest`.
    pub(crate) fn push_dest_stub(&mut self, dest_op: Operand) -> Result<(), Fault> {
        let (dest_type, dest_addr) = dest_parts(dest_op);
        self.stack.push_stub(CallStub {
            dest_type,
            dest_addr,
            pc: self.pc,
            fp: self.stack.fp(),
        })
    }

    /// Call a function, honouring the accelerator.
    ///
    /// `tail` replaces the current frame instead of pushing a stub, so the
    /// callee returns straight to the original caller.
    pub(crate) fn do_call<G: GlkSystem>(
        &mut self,
        io: &mut G,
        addr: u32,
        args: &[u32],
        dest_op: Operand,
        tail: bool,
    ) -> Result<Continuation, Fault> {
        if let Some(index) = self.accel.find(addr) {
            let result = self.call_accel(io, index, args)?;
            if tail {
                return self.do_return(io, result);
            }
            self.store_operand(dest_op, result)?;
            return Ok(Continuation::Next);
        }

        if tail {
            self.stack.pop_frame();
        } else {
            self.push_dest_stub(dest_op)?;
        }
        self.enter_function(addr, args)?;
        Ok(Continuation::Next)
    }

    /// Run an accelerated function; Inform errors go out through Glk only.
    pub(crate) fn call_accel<G: GlkSystem>(
        &mut self,
        io: &mut G,
        index: u32,
        args: &[u32],
    ) -> Result<u32, Fault> {
        let glk_selected = self.iosys_mode == iosys::GLK;
        let mut report = |msg: &str| {
            if glk_selected {
                io.put_char(b'\n');
                io.put_buffer(msg.as_bytes());
                io.put_char(b'\n');
            }
        };
        self.accel.call(index, args, &self.mem, &mut report)
    }

    /// Build a frame for the function at `addr` and point the PC at its
    /// body. The caller has already pushed its stub (or dropped its frame
    /// for a tailcall).
    pub(crate) fn enter_function(&mut self, addr: u32, args: &[u32]) -> Result<(), Fault> {
        let func_type = self.mem.read_u8(addr)?;
        if func_type != 0xC0 && func_type != 0xC1 {
            return Err(Fault::NotAFunction(addr));
        }

        let mut pairs = Vec::new();
        let mut at = addr + 1;
        loop {
            let ty = self.mem.read_u8(at)? as u8;
            let count = self.mem.read_u8(at + 1)? as u8;
            at += 2;
            if ty == 0 && count == 0 {
                break;
            }
            pairs.push((ty, count));
        }

        let layout = LocalsLayout::parse(&pairs, addr)?;
        self.stack.push_frame(&layout)?;
        self.pc = at;

        if func_type == 0xC0 {
            // Stack-argument convention: last argument first, count on top.
            for &value in args.iter().rev() {
                self.stack.push(value)?;
            }
            self.stack.push(args.len() as u32)?;
        } else {
            // C convention: arguments land in locals, truncated to the
            // declared widths; extras dropped, missing locals stay zero.
            for (cell, &value) in layout.cells.iter().zip(args.iter()) {
                self.stack
                    .write_local_bytes(cell.offset, u32::from(cell.width), value)?;
            }
        }
        Ok(())
    }

    /// Return `value` from the current function.
    pub(crate) fn do_return<G: GlkSystem>(
        &mut self,
        io: &mut G,
        value: u32,
    ) -> Result<Continuation, Fault> {
        self.stack.pop_frame();
        if self.stack.is_empty() {
            // Leaving the outermost frame ends the program.
            return Ok(Continuation::Halt);
        }
        self.pop_stub_and_store(io, value)
    }

    /// Complete the stub on top of the stack with `value`.
    ///
    /// String-resume stubs hand control back to the decoder instead of
    /// storing anything; the function's result is discarded, as filter
    /// routines' results are.
    pub(crate) fn pop_stub_and_store<G: GlkSystem>(
        &mut self,
        io: &mut G,
        value: u32,
    ) -> Result<Continuation, Fault> {
        let stub = self.stack.pop_stub()?;
        match stub.dest_type {
            dest::DISCARD | dest::RESUME_FUNC => {
                self.pc = stub.pc;
                self.stack.set_fp(stub.fp);
            }
            dest::MAIN => {
                self.pc = stub.pc;
                self.stack.set_fp(stub.fp);
                self.mem.write_u32(stub.dest_addr, value)?;
            }
            dest::LOCAL => {
                self.pc = stub.pc;
                self.stack.set_fp(stub.fp);
                self.stack.write_local(stub.dest_addr, value)?;
            }
            dest::STACK => {
                self.pc = stub.pc;
                self.stack.set_fp(stub.fp);
                self.stack.push(value)?;
            }
            dest::RESUME_HUFF | dest::RESUME_CSTR | dest::RESUME_UNI | dest::RESUME_NUM => {
                self.stack.set_fp(stub.fp);
                self.resume_stream(io, stub)?;
            }
            other => {
                log::error!("corrupt call stub type {other:#x}");
                return Err(Fault::StackUnderflow);
            }
        }
        Ok(Continuation::Next)
    }

    /// Take a branch: offsets 0 and 1 return from the current function,
    /// everything else is relative to the end of the instruction.
    pub(crate) fn take_branch<G: GlkSystem>(
        &mut self,
        io: &mut G,
        offset: u32,
    ) -> Result<Continuation, Fault> {
        if offset == 0 || offset == 1 {
            return self.do_return(io, offset);
        }
        self.pc = self.pc.wrapping_add(offset).wrapping_sub(2);
        Ok(Continuation::Next)
    }

    /// `catch`: push the stub, hand out the token, branch.
    pub(crate) fn do_catch<G: GlkSystem>(
        &mut self,
        io: &mut G,
        dest_op: Operand,
        offset: u32,
    ) -> Result<Continuation, Fault> {
        self.push_dest_stub(dest_op)?;
        let token = self.stack.sp();
        self.store_operand(dest_op, token)?;
        self.take_branch(io, offset)
    }

    /// `throw`: unwind to the catch token and deliver the value.
    pub(crate) fn do_throw<G: GlkSystem>(
        &mut self,
        io: &mut G,
        value: u32,
        token: u32,
    ) -> Result<Continuation, Fault> {
        if token > self.stack.sp() || token < STUB_SIZE || token % 4 != 0 {
            return Err(Fault::ThrowUnresolved(token));
        }
        self.stack.set_sp(token);
        self.pop_stub_and_store(io, value)
    }
}
