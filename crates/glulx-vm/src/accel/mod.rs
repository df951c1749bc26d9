// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Function acceleration.
//!
//! Games register addresses of well-known Inform library routines; calls to
//! a registered address skip the interpreter entirely and run the native
//! replacement against main memory. Natives never touch the stack or the
//! PC, and their errors are not fatal: the Inform-style bracketed message
//! goes out through the I/O system and the call returns 0.
//!
//! Indices 1-7 are the classic functions compiled against `NUM_ATTR_BYTES`
//! of 7; indices 8-13 are the same functions honouring the runtime
//! `num_attr_bytes` parameter.


#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use crate::fault::Fault;
use crate::memory::MemoryMap;

/// Accelerator parameter indices, in `accelparam` order.
pub mod param {
    /// Address of the class-object table.
    pub const CLASSES_TABLE: usize = 0;
    /// First individual property number.
    pub const INDIV_PROP_START: usize = 1;
    /// The Class metaclass object.
    pub const CLASS_METACLASS: usize = 2;
    /// The Object metaclass object.
    pub const OBJECT_METACLASS: usize = 3;
    /// The Routine metaclass object.
    pub const ROUTINE_METACLASS: usize = 4;
    /// The String metaclass object.
    pub const STRING_METACLASS: usize = 5;
    /// Address of the `self` global.
    pub const SELF: usize = 6;
    /// Attribute bytes per object.
    pub const NUM_ATTR_BYTES: usize = 7;
    /// Address of the common-property default values table.
    pub const CPV_START: usize = 8;
}

/// Number of accelerator parameters.
pub const PARAM_COUNT: usize = 9;

/// Highest supported function index.
pub const MAX_FUNC_INDEX: u32 = 13;

/// `NUM_ATTR_BYTES` assumed by the classic function indices 1-7.
const OLD_NUM_ATTR_BYTES: u32 = 7;

/// Bytes per property-table entry.
const PROP_ENTRY_SIZE: u32 = 10;

/// The acceleration state: parameters plus the address registry.
#[derive(Debug, Default)]
pub struct Accel {
    params: [u32; PARAM_COUNT],
    funcs: Vec<(u32, u32)>,
}

impl Accel {
    /// Create an empty accelerator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            params: [0; PARAM_COUNT],
            funcs: Vec::new(),
        }
    }

    /// Apply `accelparam`; unknown indices are ignored.
    pub fn set_param(&mut self, index: u32, value: u32) {
        if let Some(slot) = self.params.get_mut(index as usize) {
            *slot = value;
        }
    }

    /// Read a parameter; unknown indices read as 0.
    #[must_use]
    pub fn get_param(&self, index: u32) -> u32 {
        self.params.get(index as usize).copied().unwrap_or(0)
    }

    /// Clear the parameters (restart). The address registry survives.
    pub fn clear_params(&mut self) {
        self.params = [0; PARAM_COUNT];
    }

    /// Whether a function index has a native implementation.
    #[must_use]
    pub const fn supported(index: u32) -> bool {
        index >= 1 && index <= MAX_FUNC_INDEX
    }

    /// Apply `accelfunc`.
    ///
    /// Index 0 unregisters the address; unsupported indices are ignored.
    ///
    /// # Errors
    ///
    /// `NotAFunction` when `addr` does not carry a function type byte.
    pub fn set_func(&mut self, index: u32, addr: u32, mem: &MemoryMap) -> Result<(), Fault> {
        let type_byte = mem.read_u8(addr)?;
        if type_byte != 0xC0 && type_byte != 0xC1 {
            return Err(Fault::NotAFunction(addr));
        }
        if index == 0 {
            self.funcs.retain(|&(a, _)| a != addr);
            return Ok(());
        }
        if !Self::supported(index) {
            log::debug!("ignoring accelfunc {index} at {addr:#x}");
            return Ok(());
        }
        match self.funcs.iter_mut().find(|(a, _)| *a == addr) {
            Some(entry) => entry.1 = index,
            None => self.funcs.push((addr, index)),
        }
        log::debug!("accelfunc {index} registered at {addr:#x}");
        Ok(())
    }

    /// Look up the function index registered for `addr`.
    #[must_use]
    pub fn find(&self, addr: u32) -> Option<u32> {
        self.funcs
            .iter()
            .find(|&&(a, _)| a == addr)
            .map(|&(_, index)| index)
    }

    /// Run the native function for `index`.
    ///
    /// Missing arguments read as zero; extras are ignored. `report` receives
    /// the user-visible message of a recovered Inform error.
    pub fn call(
        &self,
        index: u32,
        args: &[u32],
        mem: &MemoryMap,
        report: &mut dyn FnMut(&str),
    ) -> Result<u32, Fault> {
        let a0 = arg(args, 0);
        let a1 = arg(args, 1);
        let rt = self.params[param::NUM_ATTR_BYTES];
        match index {
            1 => self.z_region(mem, a0),
            2 => self.cp_tab(mem, a0, a1, OLD_NUM_ATTR_BYTES, report),
            3 => self.ra_pr(mem, a0, a1, OLD_NUM_ATTR_BYTES, report),
            4 => self.rl_pr(mem, a0, a1, OLD_NUM_ATTR_BYTES, report),
            5 => self.oc_cl(mem, a0, a1, OLD_NUM_ATTR_BYTES, report),
            6 => self.rv_pr(mem, a0, a1, OLD_NUM_ATTR_BYTES, report),
            7 => self.op_pr(mem, a0, a1, OLD_NUM_ATTR_BYTES, report),
            8 => self.cp_tab(mem, a0, a1, rt, report),
            9 => self.ra_pr(mem, a0, a1, rt, report),
            10 => self.rl_pr(mem, a0, a1, rt, report),
            11 => self.oc_cl(mem, a0, a1, rt, report),
            12 => self.rv_pr(mem, a0, a1, rt, report),
            13 => self.op_pr(mem, a0, a1, rt, report),
            _ => Ok(0),
        }
    }

    /// `Z__Region`: classify an address as object (1), routine (2),
    /// string (3) or none (0).
    fn z_region(&self, mem: &MemoryMap, addr: u32) -> Result<u32, Fault> {
        if addr < 36 || addr >= mem.size() {
            return Ok(0);
        }
        let type_byte = mem.read_u8(addr)?;
        if type_byte >= 0xE0 {
            Ok(3)
        } else if type_byte >= 0xC0 {
            Ok(2)
        } else if (0x70..=0x7F).contains(&type_byte) && addr >= mem.ramstart() {
            Ok(1)
        } else {
            Ok(0)
        }
    }

    /// `CP__Tab`: find a property entry in an object's property table.
    fn cp_tab(
        &self,
        mem: &MemoryMap,
        obj: u32,
        id: u32,
        nab: u32,
        report: &mut dyn FnMut(&str),
    ) -> Result<u32, Fault> {
        if self.z_region(mem, obj)? != 1 {
            report("[** Programming error: tried to find the \".\" of (something) **]");
            return Ok(0);
        }
        let otab = mem.read_u32(obj + 4 * (3 + nab / 4))?;
        if otab == 0 {
            return Ok(0);
        }
        let max = mem.read_u32(otab)?;
        prop_search(mem, id, otab + 4, max)
    }

    fn obj_in_class(&self, mem: &MemoryMap, obj: u32, nab: u32) -> Result<bool, Fault> {
        Ok(mem.read_u32(obj + 13 + nab)? == self.params[param::CLASS_METACLASS])
    }

    /// The shared property lookup behind `RA__Pr`/`RL__Pr`/`RV__Pr`.
    fn get_prop(
        &self,
        mem: &MemoryMap,
        mut obj: u32,
        mut id: u32,
        nab: u32,
        report: &mut dyn FnMut(&str),
    ) -> Result<u32, Fault> {
        let mut cla = 0;
        if id & 0xFFFF_0000 != 0 {
            cla = mem.read_u32(self.params[param::CLASSES_TABLE] + (id & 0xFFFF) * 4)?;
            if self.oc_cl(mem, obj, cla, nab, report)? == 0 {
                return Ok(0);
            }
            id >>= 16;
            obj = cla;
        }

        let prop = self.cp_tab(mem, obj, id, nab, report)?;
        if prop == 0 {
            return Ok(0);
        }

        let indiv = self.params[param::INDIV_PROP_START];
        if self.oc_cl(mem, obj, self.params[param::CLASS_METACLASS], nab, report)? == 1
            && cla == 0
            && !(id >= indiv && id < indiv + 8)
        {
            return Ok(0);
        }

        if mem.read_u32(self.params[param::SELF])? != obj && mem.read_u8(prop + 9)? & 1 != 0 {
            return Ok(0);
        }
        Ok(prop)
    }

    /// `RA__Pr`: address of a property's data.
    fn ra_pr(
        &self,
        mem: &MemoryMap,
        obj: u32,
        id: u32,
        nab: u32,
        report: &mut dyn FnMut(&str),
    ) -> Result<u32, Fault> {
        let prop = self.get_prop(mem, obj, id, nab, report)?;
        if prop == 0 {
            return Ok(0);
        }
        mem.read_u32(prop + 4)
    }

    /// `RL__Pr`: byte length of a property's data.
    fn rl_pr(
        &self,
        mem: &MemoryMap,
        obj: u32,
        id: u32,
        nab: u32,
        report: &mut dyn FnMut(&str),
    ) -> Result<u32, Fault> {
        let prop = self.get_prop(mem, obj, id, nab, report)?;
        if prop == 0 {
            return Ok(0);
        }
        Ok(4 * mem.read_u16(prop + 2)?)
    }

    /// `OC__Cl`: is the object of the given class?
    fn oc_cl(
        &self,
        mem: &MemoryMap,
        obj: u32,
        cla: u32,
        nab: u32,
        report: &mut dyn FnMut(&str),
    ) -> Result<u32, Fault> {
        match self.z_region(mem, obj)? {
            3 => return Ok(u32::from(cla == self.params[param::STRING_METACLASS])),
            2 => return Ok(u32::from(cla == self.params[param::ROUTINE_METACLASS])),
            1 => {}
            _ => return Ok(0),
        }

        let class_mc = self.params[param::CLASS_METACLASS];
        let is_metaclass = |x: u32| {
            x == class_mc
                || x == self.params[param::OBJECT_METACLASS]
                || x == self.params[param::ROUTINE_METACLASS]
                || x == self.params[param::STRING_METACLASS]
        };

        if cla == class_mc {
            return Ok(u32::from(
                self.obj_in_class(mem, obj, nab)? || is_metaclass(obj),
            ));
        }
        if cla == self.params[param::OBJECT_METACLASS] {
            return Ok(u32::from(
                !self.obj_in_class(mem, obj, nab)? && !is_metaclass(obj),
            ));
        }
        if cla == self.params[param::ROUTINE_METACLASS]
            || cla == self.params[param::STRING_METACLASS]
        {
            return Ok(0);
        }
        if !self.obj_in_class(mem, cla, nab)? {
            report("[** Programming error: tried to apply 'ofclass' with non-class **]");
            return Ok(0);
        }

        // Property 2 holds the inheritance list.
        let prop = self.get_prop(mem, obj, 2, nab, report)?;
        if prop == 0 {
            return Ok(0);
        }
        let inlist = mem.read_u32(prop + 4)?;
        if inlist == 0 {
            return Ok(0);
        }
        let inlistlen = mem.read_u16(prop + 2)?;
        for jx in 0..inlistlen {
            if mem.read_u32(inlist + 4 * jx)? == cla {
                return Ok(1);
            }
        }
        Ok(0)
    }

    /// `RV__Pr`: read a property value, falling back to the defaults table.
    fn rv_pr(
        &self,
        mem: &MemoryMap,
        obj: u32,
        id: u32,
        nab: u32,
        report: &mut dyn FnMut(&str),
    ) -> Result<u32, Fault> {
        let addr = self.ra_pr(mem, obj, id, nab, report)?;
        if addr != 0 {
            return mem.read_u32(addr);
        }
        let indiv = self.params[param::INDIV_PROP_START];
        if id > 0 && id < indiv {
            return mem.read_u32(self.params[param::CPV_START] + 4 * id);
        }
        report("[** Programming error: tried to read (something) **]");
        Ok(0)
    }

    /// `OP__Pr`: does the object provide the property?
    fn op_pr(
        &self,
        mem: &MemoryMap,
        obj: u32,
        id: u32,
        nab: u32,
        report: &mut dyn FnMut(&str),
    ) -> Result<u32, Fault> {
        let indiv = self.params[param::INDIV_PROP_START];
        match self.z_region(mem, obj)? {
            // print and print_to_array
            3 => return Ok(u32::from(id == indiv + 6 || id == indiv + 7)),
            // call
            2 => return Ok(u32::from(id == indiv + 5)),
            1 => {}
            _ => return Ok(0),
        }

        if id >= indiv
            && id < indiv + 8
            && self.oc_cl(mem, obj, self.params[param::CLASS_METACLASS], nab, report)? == 1
        {
            return Ok(1);
        }
        Ok(u32::from(self.ra_pr(mem, obj, id, nab, report)? != 0))
    }
}

fn arg(args: &[u32], index: usize) -> u32 {
    args.get(index).copied().unwrap_or(0)
}

/// Binary search of a property table: 10-byte entries sorted by their
/// leading 2-byte id. Returns the entry address or 0.
fn prop_search(mem: &MemoryMap, id: u32, tab: u32, count: u32) -> Result<u32, Fault> {
    let mut lo = 0i64;
    let mut hi = i64::from(count) - 1;
    while lo <= hi {
        let mid = (lo + hi) / 2;
        let entry = tab + PROP_ENTRY_SIZE * mid as u32;
        let entry_id = mem.read_u16(entry)?;
        if entry_id == id {
            return Ok(entry);
        }
        if entry_id < id {
            lo = mid + 1;
        } else {
            hi = mid - 1;
        }
    }
    Ok(0)
}
