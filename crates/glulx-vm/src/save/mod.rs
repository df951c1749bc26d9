// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Save files and the undo ring.
//!
//! A save is a Quetzal-style IFF stream:
//!
//! ```text
//! FORM <len> IFZS
//!   IFhd  first 128 bytes of the original game image
//!   CMem  RAM delta, XORed against the original and zero-run compressed
//!   Stks  SP, FP, then the raw stack bytes up to SP
//!   MAll  heap snapshot (only while the heap is active)
//!   XPcs  endmem, PC, iosys, string table, RNG state, protect range
//! ```
//!
//! Undo keeps the same [`Snapshot`] in memory, newest last, in a bounded
//! ring. The result destination of the save or saveundo opcode is captured
//! inside the stack snapshot as a call stub, which is how a later restore
//! knows where the resumption value goes.


#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use glulx_io::{ByteSink, ByteSource, StreamError};

use crate::fault::Fault;
use crate::heap::Heap;
use crate::memory::MemoryMap;
use crate::rand::RandomGen;
use crate::stack::Stack;

/// Bytes of the original image identifying the game in `IFhd`.
pub const IFHD_SIZE: usize = 128;

/// Capacity of the undo ring.
pub const MAX_UNDO_SNAPSHOTS: usize = 8;

/// A full machine state, as kept by the undo ring and written to saves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Memory size at capture time.
    pub endmem: u32,
    /// Compressed RAM delta.
    pub cmem: Vec<u8>,
    /// Raw stack bytes up to SP.
    pub stack: Vec<u8>,
    /// Stack pointer.
    pub sp: u32,
    /// Frame pointer.
    pub fp: u32,
    /// Heap snapshot words.
    pub heap: Vec<u32>,
    /// Program counter.
    pub pc: u32,
    /// Selected I/O system.
    pub iosys_mode: u32,
    /// I/O system rock (filter routine address).
    pub iosys_rock: u32,
    /// String decoding table address.
    pub stringtbl: u32,
    /// RNG state words.
    pub rng: [u32; 5],
    /// Protected range at capture time.
    pub protect: (u32, u32),
}

/// Capture the machine state.
#[must_use]
pub fn capture(
    mem: &MemoryMap,
    stack: &Stack,
    heap: &Heap,
    rng: &RandomGen,
    pc: u32,
    iosys: (u32, u32),
    stringtbl: u32,
) -> Snapshot {
    Snapshot {
        endmem: mem.size(),
        cmem: cmem_encode(mem),
        stack: stack.contents().to_vec(),
        sp: stack.sp(),
        fp: stack.fp(),
        heap: heap.snapshot(),
        pc,
        iosys_mode: iosys.0,
        iosys_rock: iosys.1,
        stringtbl,
        rng: rng.snapshot(),
        protect: mem.protect_range(),
    }
}

/// Reinstate a captured state, sparing protected memory.
///
/// Validates what it can before touching anything; memory, stack, heap and
/// RNG are only written once the snapshot is known to fit.
///
/// # Errors
///
/// `SaveFailed` for a snapshot that cannot fit this machine; `HeapError`
/// for a corrupt heap summary.
pub fn apply(
    snap: &Snapshot,
    mem: &mut MemoryMap,
    stack: &mut Stack,
    heap: &mut Heap,
    rng: &mut RandomGen,
) -> Result<(), Fault> {
    if snap.endmem < mem.endmem_initial() || snap.endmem % 256 != 0 {
        return Err(Fault::SaveFailed);
    }
    if snap.stack.len() > stack.capacity() as usize || snap.sp as usize > snap.stack.len() {
        return Err(Fault::SaveFailed);
    }
    let restored_heap = Heap::from_snapshot(&snap.heap, snap.endmem)?;
    let ram = cmem_decode(&snap.cmem, mem, snap.endmem)?;

    if !mem.set_size(snap.endmem) {
        return Err(Fault::SaveFailed);
    }
    mem.load_ram(&ram)?;
    stack.load(&snap.stack, snap.sp, snap.fp)?;
    *heap = restored_heap;
    *rng = RandomGen::from_snapshot(snap.rng);
    Ok(())
}

/// XOR RAM against the original image and compress zero runs.
///
/// A zero byte is followed by a count: `0x00 N` stands for N+1 unchanged
/// bytes. The trailing run of unchanged bytes is omitted entirely.
#[must_use]
pub fn cmem_encode(mem: &MemoryMap) -> Vec<u8> {
    let ram = mem.ram();
    let base = mem.ramstart();
    let mut out = Vec::new();
    let mut zeros = 0usize;
    for (i, &byte) in ram.iter().enumerate() {
        let delta = byte ^ mem.original_byte(base + i as u32);
        if delta == 0 {
            zeros += 1;
        } else {
            while zeros > 0 {
                let run = zeros.min(256);
                out.push(0);
                out.push((run - 1) as u8);
                zeros -= run;
            }
            out.push(delta);
        }
    }
    out
}

/// Expand a compressed delta back into a full RAM image.
fn cmem_decode(data: &[u8], mem: &MemoryMap, endmem: u32) -> Result<Vec<u8>, Fault> {
    let base = mem.ramstart();
    let len = (endmem - base) as usize;
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        out.push(mem.original_byte(base + i as u32));
    }

    let mut at = 0usize;
    let mut bytes = data.iter();
    while let Some(&byte) = bytes.next() {
        if byte == 0 {
            let run = *bytes.next().ok_or(Fault::SaveFailed)? as usize + 1;
            at += run;
        } else {
            if at >= len {
                return Err(Fault::SaveFailed);
            }
            out[at] ^= byte;
            at += 1;
        }
    }
    if at > len {
        return Err(Fault::SaveFailed);
    }
    Ok(out)
}

/// The bounded undo ring; newest snapshots last.
#[derive(Debug, Default)]
pub struct UndoRing {
    snaps: Vec<Snapshot>,
}

impl UndoRing {
    /// Create an empty ring.
    #[must_use]
    pub const fn new() -> Self {
        Self { snaps: Vec::new() }
    }

    /// Whether a snapshot is available.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snaps.is_empty()
    }

    /// Push a snapshot, evicting the oldest when full.
    pub fn push(&mut self, snap: Snapshot) {
        if self.snaps.len() == MAX_UNDO_SNAPSHOTS {
            self.snaps.remove(0);
        }
        self.snaps.push(snap);
    }

    /// Take the newest snapshot.
    pub fn pop(&mut self) -> Option<Snapshot> {
        self.snaps.pop()
    }

    /// Drop the newest snapshot.
    pub fn discard_newest(&mut self) {
        let _ = self.snaps.pop();
    }

    /// Drop everything (restart).
    pub fn clear(&mut self) {
        self.snaps.clear();
    }
}

// --- Quetzal serialization ---

const TAG_FORM: &[u8; 4] = b"FORM";
const TAG_IFZS: &[u8; 4] = b"IFZS";
const TAG_IFHD: &[u8; 4] = b"IFhd";
const TAG_CMEM: &[u8; 4] = b"CMem";
const TAG_STKS: &[u8; 4] = b"Stks";
const TAG_MALL: &[u8; 4] = b"MAll";
const TAG_XPCS: &[u8; 4] = b"XPcs";

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_chunk(out: &mut Vec<u8>, tag: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(tag);
    push_u32(out, payload.len() as u32);
    out.extend_from_slice(payload);
    if payload.len() % 2 != 0 {
        out.push(0);
    }
}

/// Serialize a snapshot to a sink.
///
/// `ifhd` is the identifying prefix of the running game's original image.
///
/// # Errors
///
/// Forwards sink write failures.
pub fn write_quetzal(
    snap: &Snapshot,
    ifhd: &[u8],
    sink: &mut dyn ByteSink,
) -> Result<(), StreamError> {
    let mut body = Vec::new();
    body.extend_from_slice(TAG_IFZS);

    let mut head = [0u8; IFHD_SIZE];
    let n = ifhd.len().min(IFHD_SIZE);
    head[..n].copy_from_slice(&ifhd[..n]);
    push_chunk(&mut body, TAG_IFHD, &head);

    push_chunk(&mut body, TAG_CMEM, &snap.cmem);

    let mut stks = Vec::with_capacity(8 + snap.stack.len());
    push_u32(&mut stks, snap.sp);
    push_u32(&mut stks, snap.fp);
    stks.extend_from_slice(&snap.stack);
    push_chunk(&mut body, TAG_STKS, &stks);

    if snap.heap.first().copied().unwrap_or(0) != 0 {
        let mut mall = Vec::with_capacity(4 * snap.heap.len());
        for &word in &snap.heap {
            push_u32(&mut mall, word);
        }
        push_chunk(&mut body, TAG_MALL, &mall);
    }

    let mut xpcs = Vec::with_capacity(48);
    push_u32(&mut xpcs, snap.endmem);
    push_u32(&mut xpcs, snap.pc);
    push_u32(&mut xpcs, snap.iosys_mode);
    push_u32(&mut xpcs, snap.iosys_rock);
    push_u32(&mut xpcs, snap.stringtbl);
    for word in snap.rng {
        push_u32(&mut xpcs, word);
    }
    push_u32(&mut xpcs, snap.protect.0);
    push_u32(&mut xpcs, snap.protect.1);
    push_chunk(&mut body, TAG_XPCS, &xpcs);

    sink.write_all(TAG_FORM)?;
    sink.write_all(&(body.len() as u32).to_be_bytes())?;
    sink.write_all(&body)
}

fn words_of(payload: &[u8]) -> Result<Vec<u32>, Fault> {
    if payload.len() % 4 != 0 {
        return Err(Fault::SaveFailed);
    }
    Ok(payload
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Parse a save stream back into a snapshot.
///
/// `ifhd` must match the chunk stored in the stream, proving the save
/// belongs to the running game.
///
/// # Errors
///
/// `SaveFailed` for truncated or malformed streams and for a different
/// game's save file.
pub fn read_quetzal(source: &mut dyn ByteSource, ifhd: &[u8]) -> Result<Snapshot, Fault> {
    let mut header = [0u8; 12];
    source
        .read_exact(&mut header)
        .map_err(|_| Fault::SaveFailed)?;
    if &header[0..4] != TAG_FORM || &header[8..12] != TAG_IFZS {
        return Err(Fault::SaveFailed);
    }
    let total = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    if total < 4 {
        return Err(Fault::SaveFailed);
    }
    let mut remaining = total - 4;

    let mut cmem = None;
    let mut stks = None;
    let mut mall = Vec::from([0u32, 0]);
    let mut xpcs = None;
    let mut seen_ifhd = false;

    while remaining > 0 {
        if remaining < 8 {
            return Err(Fault::SaveFailed);
        }
        let mut chunk_header = [0u8; 8];
        source
            .read_exact(&mut chunk_header)
            .map_err(|_| Fault::SaveFailed)?;
        let len = u32::from_be_bytes([
            chunk_header[4],
            chunk_header[5],
            chunk_header[6],
            chunk_header[7],
        ]) as usize;
        let padded = len + len % 2;
        if remaining < 8 + padded {
            return Err(Fault::SaveFailed);
        }
        let mut payload = Vec::new();
        payload.resize(padded, 0);
        source
            .read_exact(&mut payload)
            .map_err(|_| Fault::SaveFailed)?;
        payload.truncate(len);
        remaining -= 8 + padded;

        match &chunk_header[0..4] {
            tag if tag == TAG_IFHD => {
                let mut head = [0u8; IFHD_SIZE];
                let n = ifhd.len().min(IFHD_SIZE);
                head[..n].copy_from_slice(&ifhd[..n]);
                if payload != head {
                    return Err(Fault::SaveFailed);
                }
                seen_ifhd = true;
            }
            tag if tag == TAG_CMEM => cmem = Some(payload),
            tag if tag == TAG_STKS => stks = Some(payload),
            tag if tag == TAG_MALL => mall = words_of(&payload)?,
            tag if tag == TAG_XPCS => xpcs = Some(words_of(&payload)?),
            _ => {} // unknown chunks are skipped
        }
    }

    let (Some(cmem), Some(stks), Some(xpcs), true) = (cmem, stks, xpcs, seen_ifhd) else {
        return Err(Fault::SaveFailed);
    };
    if stks.len() < 8 || xpcs.len() != 12 {
        return Err(Fault::SaveFailed);
    }

    let sp = u32::from_be_bytes([stks[0], stks[1], stks[2], stks[3]]);
    let fp = u32::from_be_bytes([stks[4], stks[5], stks[6], stks[7]]);
    Ok(Snapshot {
        endmem: xpcs[0],
        cmem,
        stack: stks[8..].to_vec(),
        sp,
        fp,
        heap: mall,
        pc: xpcs[1],
        iosys_mode: xpcs[2],
        iosys_rock: xpcs[3],
        stringtbl: xpcs[4],
        rng: [xpcs[5], xpcs[6], xpcs[7], xpcs[8], xpcs[9]],
        protect: (xpcs[10], xpcs[11]),
    })
}
