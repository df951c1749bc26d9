// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The execution engine.
//!
//! [`Vm`] owns the whole machine: memory, stack, heap, RNG, accelerator and
//! undo ring. The host supplies the I/O system on every entry into
//! [`Vm::run`], which steps the dispatch loop until the game quits, a Glk
//! call blocks on an event, or a fatal fault surfaces.
//!
//! Each step decodes the opcode and its addressing modes, resolves read
//! operands left to right (stack pops included), executes the body, and
//! writes results afterwards, so a fault never leaves a partial store
//! behind.

pub mod arith;
mod call;
pub mod opcode;
mod search;
mod stream;


#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use glulx_io::{GlkOutcome, GlkSystem};

use crate::accel::Accel;
use crate::fault::{Fault, VmError};
use crate::float;
use crate::header::GameHeader;
use crate::heap::Heap;
use crate::memory::MemoryMap;
use crate::operand::{self, MAX_OPERANDS, Operand};
use crate::rand::RandomGen;
use crate::save::{self, IFHD_SIZE, UndoRing};
use crate::stack::Stack;

use opcode::{Use, op};
pub use stream::iosys;

/// Glulx version word reported by gestalt selector 0.
pub const GLULX_VERSION: u32 = 0x0003_0103;

/// Interpreter version reported by gestalt selector 1.
pub const TERP_VERSION: u32 = 0x0000_0100;

/// Why the dispatch loop returned to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The game quit or returned from its top-level function.
    Halted,
    /// A Glk call is waiting for an event; re-enter with [`Vm::resume`].
    AwaitingEvent,
}

/// What a single step asks the loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Continuation {
    Next,
    Await,
    Halt,
}

/// The Glulx virtual machine.
pub struct Vm {
    pub(crate) mem: MemoryMap,
    pub(crate) stack: Stack,
    pub(crate) heap: Heap,
    pub(crate) rng: RandomGen,
    pub(crate) accel: Accel,
    pub(crate) undo: UndoRing,
    pub(crate) header: GameHeader,
    pub(crate) pc: u32,
    pub(crate) stringtbl: u32,
    pub(crate) iosys_mode: u32,
    pub(crate) iosys_rock: u32,
    running: bool,
    pending_glk: Option<Operand>,
}

impl Vm {
    /// Load a game image and set it up to run from its start function.
    ///
    /// # Errors
    ///
    /// Header validation faults from [`GameHeader::parse`], or a fault
    /// while building the first frame.
    pub fn new(game: &[u8]) -> Result<Self, Fault> {
        let header = GameHeader::parse(game)?;
        let mut vm = Self {
            mem: MemoryMap::new(&header, game),
            stack: Stack::new(header.stacksize),
            heap: Heap::new(),
            rng: RandomGen::default(),
            accel: Accel::new(),
            undo: UndoRing::new(),
            header,
            pc: 0,
            stringtbl: header.decoding_tbl,
            iosys_mode: iosys::NULL,
            iosys_rock: 0,
            running: true,
            pending_glk: None,
        };
        vm.enter_function(header.startfunc, &[])?;
        Ok(vm)
    }

    /// The live memory map.
    #[must_use]
    pub fn memory(&self) -> &MemoryMap {
        &self.mem
    }

    /// The allocation heap.
    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Current program counter.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.pc
    }

    /// Selected I/O system as `(mode, rock)`.
    #[must_use]
    pub const fn iosys(&self) -> (u32, u32) {
        (self.iosys_mode, self.iosys_rock)
    }

    /// Current string decoding table address.
    #[must_use]
    pub const fn string_table(&self) -> u32 {
        self.stringtbl
    }

    /// Whether the machine can still execute.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Run until the game halts or waits for an event.
    ///
    /// # Errors
    ///
    /// A fatal fault, carrying the PC of the faulting instruction. The
    /// machine stops; further calls report `Halted`.
    pub fn run<G: GlkSystem>(&mut self, io: &mut G) -> Result<RunStatus, VmError> {
        while self.running {
            let pc_enter = self.pc;
            match self.step(io) {
                Ok(Continuation::Next) => {}
                Ok(Continuation::Await) => return Ok(RunStatus::AwaitingEvent),
                Ok(Continuation::Halt) => self.running = false,
                Err(fault) => {
                    self.running = false;
                    return Err(VmError {
                        pc: pc_enter,
                        fault,
                    });
                }
            }
        }
        Ok(RunStatus::Halted)
    }

    /// Resume after [`RunStatus::AwaitingEvent`] with the result of the
    /// suspended Glk call.
    ///
    /// # Errors
    ///
    /// As [`Vm::run`].
    pub fn resume<G: GlkSystem>(&mut self, io: &mut G, result: u32) -> Result<RunStatus, VmError> {
        if let Some(dest) = self.pending_glk.take() {
            self.store_operand(dest, result).map_err(|fault| {
                self.running = false;
                VmError {
                    pc: self.pc,
                    fault,
                }
            })?;
        }
        self.run(io)
    }

    // --- operand access ---

    pub(crate) fn load_operand(&mut self, op: Operand) -> Result<u32, Fault> {
        match op {
            Operand::Const(value) => Ok(value),
            Operand::Addr(addr) => self.mem.read_u32(addr),
            Operand::Stack => self.stack.pop(),
            Operand::Local(offset) => self.stack.read_local(offset),
            Operand::Discard => Ok(0),
        }
    }

    pub(crate) fn store_operand(&mut self, op: Operand, value: u32) -> Result<(), Fault> {
        match op {
            Operand::Discard | Operand::Const(_) => Ok(()),
            Operand::Addr(addr) => self.mem.write_u32(addr, value),
            Operand::Stack => self.stack.push(value),
            Operand::Local(offset) => self.stack.write_local(offset, value),
        }
    }

    fn load_operand_sized(&mut self, op: Operand, width: u32) -> Result<u32, Fault> {
        match op {
            Operand::Const(value) => Ok(match width {
                1 => value & 0xFF,
                2 => value & 0xFFFF,
                _ => value,
            }),
            Operand::Addr(addr) => match width {
                1 => self.mem.read_u8(addr),
                2 => self.mem.read_u16(addr),
                _ => self.mem.read_u32(addr),
            },
            Operand::Stack => Ok(match width {
                1 => self.stack.pop()? & 0xFF,
                2 => self.stack.pop()? & 0xFFFF,
                _ => self.stack.pop()?,
            }),
            Operand::Local(offset) => self.stack.read_local_bytes(offset, width),
            Operand::Discard => Ok(0),
        }
    }

    fn store_operand_sized(&mut self, op: Operand, width: u32, value: u32) -> Result<(), Fault> {
        match op {
            Operand::Discard | Operand::Const(_) => Ok(()),
            Operand::Addr(addr) => match width {
                1 => self.mem.write_u8(addr, value),
                2 => self.mem.write_u16(addr, value),
                _ => self.mem.write_u32(addr, value),
            },
            Operand::Stack => self.stack.push(value),
            Operand::Local(offset) => self.stack.write_local_bytes(offset, width, value),
        }
    }

    // --- the dispatch loop body ---

    #[allow(clippy::too_many_lines)]
    fn step<G: GlkSystem>(&mut self, io: &mut G) -> Result<Continuation, Fault> {
        let opcode = operand::fetch_opcode(&self.mem, &mut self.pc)?;
        let uses = opcode::operands(opcode).ok_or(Fault::BadOpcode(opcode))?;

        let modes = operand::fetch_modes(&self.mem, &mut self.pc, uses.len())?;
        let mut ops = [Operand::Discard; MAX_OPERANDS];
        for (i, use_kind) in uses.iter().enumerate() {
            ops[i] = match use_kind {
                Use::Load => operand::decode_load(&self.mem, &mut self.pc, modes[i])?,
                Use::Store => operand::decode_store(&self.mem, &mut self.pc, modes[i])?,
            };
        }

        // copys and copyb read and write with their own width
        let width = match opcode {
            op::COPYS => 2,
            op::COPYB => 1,
            _ => 4,
        };

        // Resolve loads in operand order so stack pops line up.
        let mut vals = [0u32; MAX_OPERANDS];
        for (i, use_kind) in uses.iter().enumerate() {
            if matches!(use_kind, Use::Load) {
                vals[i] = if width == 4 {
                    self.load_operand(ops[i])?
                } else {
                    self.load_operand_sized(ops[i], width)?
                };
            }
        }

        match opcode {
            op::NOP => {}

            // --- arithmetic ---
            op::ADD => self.store_operand(ops[2], vals[0].wrapping_add(vals[1]))?,
            op::SUB => self.store_operand(ops[2], vals[0].wrapping_sub(vals[1]))?,
            op::MUL => self.store_operand(ops[2], vals[0].wrapping_mul(vals[1]))?,
            op::DIV => {
                let quotient = arith::div(vals[0], vals[1])?;
                self.store_operand(ops[2], quotient)?;
            }
            op::MOD => {
                let remainder = arith::rem(vals[0], vals[1])?;
                self.store_operand(ops[2], remainder)?;
            }
            op::NEG => self.store_operand(ops[1], 0u32.wrapping_sub(vals[0]))?,
            op::BITAND => self.store_operand(ops[2], vals[0] & vals[1])?,
            op::BITOR => self.store_operand(ops[2], vals[0] | vals[1])?,
            op::BITXOR => self.store_operand(ops[2], vals[0] ^ vals[1])?,
            op::BITNOT => self.store_operand(ops[1], !vals[0])?,
            op::SHIFTL => self.store_operand(ops[2], arith::shiftl(vals[0], vals[1]))?,
            op::SSHIFTR => self.store_operand(ops[2], arith::sshiftr(vals[0], vals[1]))?,
            op::USHIFTR => self.store_operand(ops[2], arith::ushiftr(vals[0], vals[1]))?,

            // --- branches ---
            op::JUMP => return self.take_branch(io, vals[0]),
            op::JUMPABS => self.pc = vals[0],
            op::JZ if vals[0] == 0 => return self.take_branch(io, vals[1]),
            op::JNZ if vals[0] != 0 => return self.take_branch(io, vals[1]),
            op::JZ | op::JNZ => {}
            op::JEQ if vals[0] == vals[1] => return self.take_branch(io, vals[2]),
            op::JNE if vals[0] != vals[1] => return self.take_branch(io, vals[2]),
            op::JLT if (vals[0] as i32) < vals[1] as i32 => {
                return self.take_branch(io, vals[2]);
            }
            op::JGE if vals[0] as i32 >= vals[1] as i32 => {
                return self.take_branch(io, vals[2]);
            }
            op::JGT if vals[0] as i32 > vals[1] as i32 => {
                return self.take_branch(io, vals[2]);
            }
            op::JLE if vals[0] as i32 <= vals[1] as i32 => {
                return self.take_branch(io, vals[2]);
            }
            op::JLTU if vals[0] < vals[1] => return self.take_branch(io, vals[2]),
            op::JGEU if vals[0] >= vals[1] => return self.take_branch(io, vals[2]),
            op::JGTU if vals[0] > vals[1] => return self.take_branch(io, vals[2]),
            op::JLEU if vals[0] <= vals[1] => return self.take_branch(io, vals[2]),
            op::JEQ | op::JNE | op::JLT | op::JGE | op::JGT | op::JLE | op::JLTU | op::JGEU
            | op::JGTU | op::JLEU => {}

            // --- calls ---
            op::CALL | op::TAILCALL => {
                let addr = vals[0];
                let argc = vals[1] as usize;
                let mut args = Vec::with_capacity(argc.min(64));
                for _ in 0..argc {
                    args.push(self.stack.pop()?);
                }
                let tail = opcode == op::TAILCALL;
                let dest = if tail { Operand::Discard } else { ops[2] };
                return self.do_call(io, addr, &args, dest, tail);
            }
            op::CALLF => return self.do_call(io, vals[0], &[], ops[1], false),
            op::CALLFI => return self.do_call(io, vals[0], &vals[1..2], ops[2], false),
            op::CALLFII => return self.do_call(io, vals[0], &vals[1..3], ops[3], false),
            op::CALLFIII => return self.do_call(io, vals[0], &vals[1..4], ops[4], false),
            op::RETURN => return self.do_return(io, vals[0]),
            op::CATCH => return self.do_catch(io, ops[0], vals[1]),
            op::THROW => return self.do_throw(io, vals[0], vals[1]),

            // --- data movement ---
            op::COPY => self.store_operand(ops[1], vals[0])?,
            op::COPYS | op::COPYB => self.store_operand_sized(ops[1], width, vals[0])?,
            op::SEXS => self.store_operand(ops[1], vals[0] as u16 as i16 as i32 as u32)?,
            op::SEXB => self.store_operand(ops[1], vals[0] as u8 as i8 as i32 as u32)?,

            op::ALOAD => {
                let addr = vals[0].wrapping_add(vals[1].wrapping_mul(4));
                let value = self.mem.read_u32(addr)?;
                self.store_operand(ops[2], value)?;
            }
            op::ALOADS => {
                let addr = vals[0].wrapping_add(vals[1].wrapping_mul(2));
                let value = self.mem.read_u16(addr)?;
                self.store_operand(ops[2], value)?;
            }
            op::ALOADB => {
                let addr = vals[0].wrapping_add(vals[1]);
                let value = self.mem.read_u8(addr)?;
                self.store_operand(ops[2], value)?;
            }
            op::ALOADBIT => {
                let (addr, bit) = bit_address(vals[0], vals[1]);
                let byte = self.mem.read_u8(addr)?;
                self.store_operand(ops[2], (byte >> bit) & 1)?;
            }
            op::ASTORE => {
                let addr = vals[0].wrapping_add(vals[1].wrapping_mul(4));
                self.mem.write_u32(addr, vals[2])?;
            }
            op::ASTORES => {
                let addr = vals[0].wrapping_add(vals[1].wrapping_mul(2));
                self.mem.write_u16(addr, vals[2])?;
            }
            op::ASTOREB => {
                let addr = vals[0].wrapping_add(vals[1]);
                self.mem.write_u8(addr, vals[2])?;
            }
            op::ASTOREBIT => {
                let (addr, bit) = bit_address(vals[0], vals[1]);
                let byte = self.mem.read_u8(addr)?;
                let updated = if vals[2] != 0 {
                    byte | (1 << bit)
                } else {
                    byte & !(1 << bit)
                };
                self.mem.write_u8(addr, updated)?;
            }

            // --- stack ---
            op::STKCOUNT => {
                let count = self.stack.count();
                self.store_operand(ops[0], count)?;
            }
            op::STKPEEK => {
                let value = self.stack.peek(vals[0])?;
                self.store_operand(ops[1], value)?;
            }
            op::STKSWAP => self.stack.swap()?,
            op::STKROLL => self.stack.roll(vals[0], vals[1])?,
            op::STKCOPY => self.stack.copy(vals[0])?,

            // --- string streaming ---
            op::STREAMCHAR => self.stream_char(io, vals[0] & 0xFF, false)?,
            op::STREAMUNICHAR => self.stream_char(io, vals[0], true)?,
            op::STREAMNUM => self.begin_stream_num(io, vals[0])?,
            op::STREAMSTR => self.begin_stream_str(io, vals[0])?,

            // --- system ---
            op::GESTALT => {
                let value = self.gestalt(vals[0], vals[1]);
                self.store_operand(ops[2], value)?;
            }
            op::DEBUGTRAP => log::warn!("debugtrap {:#x} at pc {:#x}", vals[0], self.pc),
            op::GETMEMSIZE => {
                let size = self.mem.size();
                self.store_operand(ops[0], size)?;
            }
            op::SETMEMSIZE => {
                let failed = self.heap.active() || !self.mem.set_size(vals[0]);
                self.store_operand(ops[1], u32::from(failed))?;
            }
            op::RANDOM => {
                let value = self.rng.range(vals[0]);
                self.store_operand(ops[1], value)?;
            }
            op::SETRANDOM => self.rng = RandomGen::from_seed(vals[0]),
            op::QUIT => return Ok(Continuation::Halt),
            op::VERIFY => {
                let ok = self.header.verify(self.mem.original());
                self.store_operand(ops[0], u32::from(!ok))?;
            }
            op::RESTART => self.do_restart()?,
            op::SAVE => return self.do_save(io, vals[0], ops[1]),
            op::RESTORE => return self.do_restore(io, vals[0], ops[1]),
            op::SAVEUNDO => return self.do_saveundo(ops[0]),
            op::RESTOREUNDO => return self.do_restoreundo(io, ops[0]),
            op::HASUNDO => {
                let missing = self.undo.is_empty();
                self.store_operand(ops[0], u32::from(missing))?;
            }
            op::DISCARDUNDO => self.undo.discard_newest(),
            op::PROTECT => self.mem.set_protect(vals[0], vals[1]),

            op::GLK => {
                let selector = vals[0];
                let argc = vals[1];
                let stack = &mut self.stack;
                let mut pop_fault = None;
                let outcome = io.dispatch(selector, argc, &mut || match stack.pop() {
                    Ok(value) => value,
                    Err(fault) => {
                        pop_fault.get_or_insert(fault);
                        0
                    }
                });
                if let Some(fault) = pop_fault {
                    return Err(fault);
                }
                match outcome {
                    GlkOutcome::Complete(value) => self.store_operand(ops[2], value)?,
                    GlkOutcome::Await => {
                        self.pending_glk = Some(ops[2]);
                        return Ok(Continuation::Await);
                    }
                }
            }

            op::GETSTRINGTBL => {
                let table = self.stringtbl;
                self.store_operand(ops[0], table)?;
            }
            op::SETSTRINGTBL => self.stringtbl = vals[0],
            op::GETIOSYS => {
                let (mode, rock) = (self.iosys_mode, self.iosys_rock);
                self.store_operand(ops[0], mode)?;
                self.store_operand(ops[1], rock)?;
            }
            op::SETIOSYS => {
                match vals[0] {
                    iosys::NULL | iosys::FILTER | iosys::GLK | iosys::FILTER_UNI => {
                        self.iosys_mode = vals[0];
                    }
                    other => {
                        log::warn!("unknown iosys {other}, falling back to null");
                        self.iosys_mode = iosys::NULL;
                    }
                }
                self.iosys_rock = vals[1];
            }

            // --- searches ---
            op::LINEARSEARCH => {
                let result = search::linear(&self.mem, &vals[..7])?;
                self.store_operand(ops[7], result)?;
            }
            op::BINARYSEARCH => {
                let result = search::binary(&self.mem, &vals[..7])?;
                self.store_operand(ops[7], result)?;
            }
            op::LINKEDSEARCH => {
                let result = search::linked(&self.mem, &vals[..7])?;
                self.store_operand(ops[7], result)?;
            }

            // --- memory ranges and the heap ---
            op::MZERO => self.mem.zero_range(vals[1], vals[0])?,
            op::MCOPY => self.mem.copy_range(vals[1], vals[2], vals[0])?,
            op::MALLOC => {
                let addr = self.heap.alloc(&mut self.mem, vals[0]);
                self.store_operand(ops[1], addr)?;
            }
            op::MFREE => self.heap.free(&mut self.mem, vals[0])?,

            // --- acceleration ---
            op::ACCELFUNC => self.accel.set_func(vals[0], vals[1], &self.mem)?,
            op::ACCELPARAM => self.accel.set_param(vals[0], vals[1]),

            // --- floats ---
            op::NUMTOF => self.store_operand(ops[1], float::from_int(vals[0]))?,
            op::FTONUMZ => self.store_operand(ops[1], float::to_int_trunc(vals[0]))?,
            op::FTONUMN => self.store_operand(ops[1], float::to_int_round(vals[0]))?,
            op::CEIL => self.store_float(ops[1], libm::ceilf(float::decode(vals[0])))?,
            op::FLOOR => self.store_float(ops[1], libm::floorf(float::decode(vals[0])))?,
            op::FADD => {
                self.store_float(ops[2], float::decode(vals[0]) + float::decode(vals[1]))?;
            }
            op::FSUB => {
                self.store_float(ops[2], float::decode(vals[0]) - float::decode(vals[1]))?;
            }
            op::FMUL => {
                self.store_float(ops[2], float::decode(vals[0]) * float::decode(vals[1]))?;
            }
            op::FDIV => {
                self.store_float(ops[2], float::decode(vals[0]) / float::decode(vals[1]))?;
            }
            op::FMOD => {
                let (rem, quo) = float::fmod_parts(vals[0], vals[1]);
                self.store_operand(ops[2], rem)?;
                self.store_operand(ops[3], quo)?;
            }
            op::SQRT => self.store_float(ops[1], libm::sqrtf(float::decode(vals[0])))?,
            op::EXP => self.store_float(ops[1], libm::expf(float::decode(vals[0])))?,
            op::LOG => self.store_float(ops[1], libm::logf(float::decode(vals[0])))?,
            op::POW => {
                let value = libm::powf(float::decode(vals[0]), float::decode(vals[1]));
                self.store_float(ops[2], value)?;
            }
            op::SIN => self.store_float(ops[1], libm::sinf(float::decode(vals[0])))?,
            op::COS => self.store_float(ops[1], libm::cosf(float::decode(vals[0])))?,
            op::TAN => self.store_float(ops[1], libm::tanf(float::decode(vals[0])))?,
            op::ASIN => self.store_float(ops[1], libm::asinf(float::decode(vals[0])))?,
            op::ACOS => self.store_float(ops[1], libm::acosf(float::decode(vals[0])))?,
            op::ATAN => self.store_float(ops[1], libm::atanf(float::decode(vals[0])))?,
            op::ATAN2 => {
                let value = libm::atan2f(float::decode(vals[0]), float::decode(vals[1]));
                self.store_float(ops[2], value)?;
            }

            op::JFEQ if float::nearly_equal(vals[0], vals[1], vals[2]) => {
                return self.take_branch(io, vals[3]);
            }
            op::JFNE if !float::nearly_equal(vals[0], vals[1], vals[2]) => {
                return self.take_branch(io, vals[3]);
            }
            op::JFLT if float::decode(vals[0]) < float::decode(vals[1]) => {
                return self.take_branch(io, vals[2]);
            }
            op::JFLE if float::decode(vals[0]) <= float::decode(vals[1]) => {
                return self.take_branch(io, vals[2]);
            }
            op::JFGT if float::decode(vals[0]) > float::decode(vals[1]) => {
                return self.take_branch(io, vals[2]);
            }
            op::JFGE if float::decode(vals[0]) >= float::decode(vals[1]) => {
                return self.take_branch(io, vals[2]);
            }
            op::JISNAN if float::decode(vals[0]).is_nan() => {
                return self.take_branch(io, vals[1]);
            }
            op::JISINF if float::decode(vals[0]).is_infinite() => {
                return self.take_branch(io, vals[1]);
            }
            op::JFEQ | op::JFNE | op::JFLT | op::JFLE | op::JFGT | op::JFGE | op::JISNAN
            | op::JISINF => {}

            other => return Err(Fault::BadOpcode(other)),
        }

        Ok(Continuation::Next)
    }

    fn store_float(&mut self, op: Operand, value: f32) -> Result<(), Fault> {
        self.store_operand(op, float::encode(value))
    }

    /// Gestalt capability queries. Unknown selectors report 0.
    #[must_use]
    pub fn gestalt(&self, selector: u32, arg: u32) -> u32 {
        match selector {
            0 => GLULX_VERSION,
            1 => TERP_VERSION,
            2 => 1,                                  // resizable memory
            3 => 1,                                  // undo
            4 => match arg {
                iosys::NULL | iosys::FILTER | iosys::GLK | iosys::FILTER_UNI => 1,
                _ => 0,
            },
            5 => 1,                                  // unicode
            6 => 1,                                  // mzero/mcopy
            7 => 1,                                  // malloc/mfree
            8 => self.heap.start(),                  // heap start while active
            9 => 1,                                  // acceleration
            10 => u32::from(Accel::supported(arg)),
            11 => 1,                                 // floats
            12 => 1,                                 // hasundo/discardundo
            _ => 0,                                  // includes double-precision
        }
    }

    // --- state-restoring operations ---

    fn do_restart(&mut self) -> Result<(), Fault> {
        log::debug!("restart");
        self.heap.reset();
        self.mem.reset();
        self.stack.clear();
        self.undo.clear();
        self.accel.clear_params();
        self.stringtbl = self.header.decoding_tbl;
        self.enter_function(self.header.startfunc, &[])
    }

    fn do_save<G: GlkSystem>(
        &mut self,
        io: &mut G,
        fileref: u32,
        dest: Operand,
    ) -> Result<Continuation, Fault> {
        // The result stub rides inside the snapshot so a later restore can
        // find the destination again.
        self.push_dest_stub(dest)?;
        let snap = save::capture(
            &self.mem,
            &self.stack,
            &self.heap,
            &self.rng,
            self.pc,
            (self.iosys_mode, self.iosys_rock),
            self.stringtbl,
        );
        let ifhd = &self.mem.original()[..IFHD_SIZE];
        let ok = match io.save_sink(fileref) {
            Some(sink) => save::write_quetzal(&snap, ifhd, sink).is_ok(),
            None => false,
        };
        self.stack.pop_stub()?;
        log::debug!("save: {}", if ok { "ok" } else { "failed" });
        self.store_operand(dest, u32::from(!ok))?;
        Ok(Continuation::Next)
    }

    fn do_restore<G: GlkSystem>(
        &mut self,
        io: &mut G,
        fileref: u32,
        dest: Operand,
    ) -> Result<Continuation, Fault> {
        let ifhd_owned: [u8; IFHD_SIZE] = {
            let mut head = [0u8; IFHD_SIZE];
            head.copy_from_slice(&self.mem.original()[..IFHD_SIZE]);
            head
        };
        let snap = match io.restore_source(fileref) {
            Some(source) => save::read_quetzal(source, &ifhd_owned),
            None => Err(Fault::SaveFailed),
        };
        let Ok(snap) = snap else {
            log::debug!("restore: unreadable save");
            self.store_operand(dest, 1)?;
            return Ok(Continuation::Next);
        };
        self.apply_snapshot(io, &snap)
    }

    fn do_saveundo(&mut self, dest: Operand) -> Result<Continuation, Fault> {
        self.push_dest_stub(dest)?;
        let snap = save::capture(
            &self.mem,
            &self.stack,
            &self.heap,
            &self.rng,
            self.pc,
            (self.iosys_mode, self.iosys_rock),
            self.stringtbl,
        );
        self.stack.pop_stub()?;
        self.undo.push(snap);
        self.store_operand(dest, 0)?;
        Ok(Continuation::Next)
    }

    fn do_restoreundo<G: GlkSystem>(
        &mut self,
        io: &mut G,
        dest: Operand,
    ) -> Result<Continuation, Fault> {
        let Some(snap) = self.undo.pop() else {
            self.store_operand(dest, 1)?;
            return Ok(Continuation::Next);
        };
        self.apply_snapshot(io, &snap)
    }

    /// Reinstate a snapshot and resume through the stub captured with it,
    /// storing the restore marker -1.
    fn apply_snapshot<G: GlkSystem>(
        &mut self,
        io: &mut G,
        snap: &save::Snapshot,
    ) -> Result<Continuation, Fault> {
        save::apply(snap, &mut self.mem, &mut self.stack, &mut self.heap, &mut self.rng)?;
        self.pc = snap.pc;
        self.iosys_mode = snap.iosys_mode;
        self.iosys_rock = snap.iosys_rock;
        self.stringtbl = snap.stringtbl;
        self.pop_stub_and_store(io, 0xFFFF_FFFF)
    }
}

/// Byte address and bit index for the bit-array opcodes; negative bit
/// numbers reach into preceding bytes.
fn bit_address(base: u32, bitnum: u32) -> (u32, u32) {
    let signed = bitnum as i32;
    let byte_offset = signed.div_euclid(8);
    let bit = signed.rem_euclid(8);
    (base.wrapping_add(byte_offset as u32), bit as u32)
}
