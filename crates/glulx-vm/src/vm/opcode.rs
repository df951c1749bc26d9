// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Opcode numbers and operand signatures.
//!
//! Every opcode maps to a list of operand uses; `None` from [`operands`]
//! means the number is not a Glulx opcode. Loads come before stores except
//! for `catch`, which stores its token before reading the branch offset.

/// Opcode numbers.
#[allow(missing_docs)]
pub mod op {
    pub const NOP: u32 = 0x00;
    pub const ADD: u32 = 0x10;
    pub const SUB: u32 = 0x11;
    pub const MUL: u32 = 0x12;
    pub const DIV: u32 = 0x13;
    pub const MOD: u32 = 0x14;
    pub const NEG: u32 = 0x15;
    pub const BITAND: u32 = 0x18;
    pub const BITOR: u32 = 0x19;
    pub const BITXOR: u32 = 0x1A;
    pub const BITNOT: u32 = 0x1B;
    pub const SHIFTL: u32 = 0x1C;
    pub const SSHIFTR: u32 = 0x1D;
    pub const USHIFTR: u32 = 0x1E;
    pub const JUMP: u32 = 0x20;
    pub const JZ: u32 = 0x22;
    pub const JNZ: u32 = 0x23;
    pub const JEQ: u32 = 0x24;
    pub const JNE: u32 = 0x25;
    pub const JLT: u32 = 0x26;
    pub const JGE: u32 = 0x27;
    pub const JGT: u32 = 0x28;
    pub const JLE: u32 = 0x29;
    pub const JLTU: u32 = 0x2A;
    pub const JGEU: u32 = 0x2B;
    pub const JGTU: u32 = 0x2C;
    pub const JLEU: u32 = 0x2D;
    pub const CALL: u32 = 0x30;
    pub const RETURN: u32 = 0x31;
    pub const CATCH: u32 = 0x32;
    pub const THROW: u32 = 0x33;
    pub const TAILCALL: u32 = 0x34;
    pub const COPY: u32 = 0x40;
    pub const COPYS: u32 = 0x41;
    pub const COPYB: u32 = 0x42;
    pub const SEXS: u32 = 0x44;
    pub const SEXB: u32 = 0x45;
    pub const ALOAD: u32 = 0x48;
    pub const ALOADS: u32 = 0x49;
    pub const ALOADB: u32 = 0x4A;
    pub const ALOADBIT: u32 = 0x4B;
    pub const ASTORE: u32 = 0x4C;
    pub const ASTORES: u32 = 0x4D;
    pub const ASTOREB: u32 = 0x4E;
    pub const ASTOREBIT: u32 = 0x4F;
    pub const STKCOUNT: u32 = 0x50;
    pub const STKPEEK: u32 = 0x51;
    pub const STKSWAP: u32 = 0x52;
    pub const STKROLL: u32 = 0x53;
    pub const STKCOPY: u32 = 0x54;
    pub const STREAMCHAR: u32 = 0x70;
    pub const STREAMNUM: u32 = 0x71;
    pub const STREAMSTR: u32 = 0x72;
    pub const STREAMUNICHAR: u32 = 0x73;
    pub const GESTALT: u32 = 0x100;
    pub const DEBUGTRAP: u32 = 0x101;
    pub const GETMEMSIZE: u32 = 0x102;
    pub const SETMEMSIZE: u32 = 0x103;
    pub const JUMPABS: u32 = 0x104;
    pub const RANDOM: u32 = 0x110;
    pub const SETRANDOM: u32 = 0x111;
    pub const QUIT: u32 = 0x120;
    pub const VERIFY: u32 = 0x121;
    pub const RESTART: u32 = 0x122;
    pub const SAVE: u32 = 0x123;
    pub const RESTORE: u32 = 0x124;
    pub const SAVEUNDO: u32 = 0x125;
    pub const RESTOREUNDO: u32 = 0x126;
    pub const PROTECT: u32 = 0x127;
    pub const HASUNDO: u32 = 0x128;
    pub const DISCARDUNDO: u32 = 0x129;
    pub const GLK: u32 = 0x130;
    pub const GETSTRINGTBL: u32 = 0x140;
    pub const SETSTRINGTBL: u32 = 0x141;
    pub const GETIOSYS: u32 = 0x148;
    pub const SETIOSYS: u32 = 0x149;
    pub const CALLF: u32 = 0x160;
    pub const CALLFI: u32 = 0x161;
    pub const CALLFII: u32 = 0x162;
    pub const CALLFIII: u32 = 0x163;
    pub const LINEARSEARCH: u32 = 0x150;
    pub const BINARYSEARCH: u32 = 0x151;
    pub const LINKEDSEARCH: u32 = 0x152;
    pub const MZERO: u32 = 0x170;
    pub const MCOPY: u32 = 0x171;
    pub const MALLOC: u32 = 0x178;
    pub const MFREE: u32 = 0x179;
    pub const ACCELFUNC: u32 = 0x180;
    pub const ACCELPARAM: u32 = 0x181;
    pub const NUMTOF: u32 = 0x190;
    pub const FTONUMZ: u32 = 0x191;
    pub const FTONUMN: u32 = 0x192;
    pub const CEIL: u32 = 0x198;
    pub const FLOOR: u32 = 0x199;
    pub const FADD: u32 = 0x1A0;
    pub const FSUB: u32 = 0x1A1;
    pub const FMUL: u32 = 0x1A2;
    pub const FDIV: u32 = 0x1A3;
    pub const FMOD: u32 = 0x1A4;
    pub const SQRT: u32 = 0x1A8;
    pub const EXP: u32 = 0x1A9;
    pub const LOG: u32 = 0x1AA;
    pub const POW: u32 = 0x1AB;
    pub const SIN: u32 = 0x1B0;
    pub const COS: u32 = 0x1B1;
    pub const TAN: u32 = 0x1B2;
    pub const ASIN: u32 = 0x1B3;
    pub const ACOS: u32 = 0x1B4;
    pub const ATAN: u32 = 0x1B5;
    pub const ATAN2: u32 = 0x1B6;
    pub const JFEQ: u32 = 0x1C0;
    pub const JFNE: u32 = 0x1C1;
    pub const JFLT: u32 = 0x1C2;
    pub const JFLE: u32 = 0x1C3;
    pub const JFGT: u32 = 0x1C4;
    pub const JFGE: u32 = 0x1C5;
    pub const JISNAN: u32 = 0x1C8;
    pub const JISINF: u32 = 0x1C9;
}

/// How an operand position is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Use {
    /// Read before the opcode body runs.
    Load,
    /// Written after the opcode body runs.
    Store,
}

use Use::{Load, Store};

const NONE: &[Use] = &[];
const L: &[Use] = &[Load];
const LL: &[Use] = &[Load, Load];
const LLL: &[Use] = &[Load, Load, Load];
const LLLL: &[Use] = &[Load, Load, Load, Load];
const S: &[Use] = &[Store];
const SS: &[Use] = &[Store, Store];
const LS: &[Use] = &[Load, Store];
const LLS: &[Use] = &[Load, Load, Store];
const LLLS: &[Use] = &[Load, Load, Load, Store];
const LLLLS: &[Use] = &[Load, Load, Load, Load, Store];
const LLSS: &[Use] = &[Load, Load, Store, Store];
const SL: &[Use] = &[Store, Load];
const SEARCH: &[Use] = &[Load, Load, Load, Load, Load, Load, Load, Store];

/// The operand signature of an opcode, or `None` for an unknown number.
#[must_use]
pub fn operands(opcode: u32) -> Option<&'static [Use]> {
    Some(match opcode {
        op::NOP | op::STKSWAP | op::QUIT | op::RESTART | op::DISCARDUNDO => NONE,

        op::ADD
        | op::SUB
        | op::MUL
        | op::DIV
        | op::MOD
        | op::BITAND
        | op::BITOR
        | op::BITXOR
        | op::SHIFTL
        | op::SSHIFTR
        | op::USHIFTR => LLS,

        op::NEG | op::BITNOT => LS,

        op::JUMP | op::JUMPABS | op::RETURN | op::STKCOPY | op::SETRANDOM | op::DEBUGTRAP
        | op::SETSTRINGTBL | op::MFREE => L,

        op::JZ | op::JNZ | op::THROW | op::TAILCALL | op::STKROLL | op::PROTECT | op::MZERO
        | op::SETIOSYS | op::ACCELFUNC | op::ACCELPARAM | op::JISNAN | op::JISINF => LL,

        op::JEQ
        | op::JNE
        | op::JLT
        | op::JGE
        | op::JGT
        | op::JLE
        | op::JLTU
        | op::JGEU
        | op::JGTU
        | op::JLEU => LLL,

        op::CALL | op::GESTALT | op::GLK => LLS,
        op::CALLF => LS,
        op::CALLFI => LLS,
        op::CALLFII => LLLS,
        op::CALLFIII => LLLLS,

        op::CATCH => SL,

        op::COPY | op::COPYS | op::COPYB | op::SEXS | op::SEXB => LS,

        op::ALOAD | op::ALOADS | op::ALOADB | op::ALOADBIT => LLS,
        op::ASTORE | op::ASTORES | op::ASTOREB | op::ASTOREBIT | op::MCOPY => LLL,

        op::STKCOUNT | op::GETMEMSIZE | op::VERIFY | op::SAVEUNDO | op::RESTOREUNDO
        | op::HASUNDO | op::GETSTRINGTBL => S,

        op::STKPEEK | op::SETMEMSIZE | op::RANDOM | op::SAVE | op::RESTORE | op::MALLOC => LS,

        op::STREAMCHAR | op::STREAMNUM | op::STREAMSTR | op::STREAMUNICHAR => L,

        op::GETIOSYS => SS,

        op::LINEARSEARCH | op::BINARYSEARCH | op::LINKEDSEARCH => SEARCH,

        op::NUMTOF | op::FTONUMZ | op::FTONUMN | op::CEIL | op::FLOOR | op::SQRT | op::EXP
        | op::LOG | op::SIN | op::COS | op::TAN | op::ASIN | op::ACOS | op::ATAN => LS,

        op::FADD | op::FSUB | op::FMUL | op::FDIV | op::POW | op::ATAN2 => LLS,
        op::FMOD => LLSS,

        op::JFEQ | op::JFNE => LLLL,
        op::JFLT | op::JFLE | op::JFGT | op::JFGE => LLL,

        _ => return None,
    })
}
