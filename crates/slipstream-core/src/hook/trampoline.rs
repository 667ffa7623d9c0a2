//! Pointer-capture trampolines
//!
//! The game publishes no API for its race state; the base address of the
//! live race struct only ever exists in a register at one instruction site.
//! A trampoline makes that value readable: the original instruction is
//! relocated into a private executable region, followed by a stub that
//! stores the chosen register into an 8-byte slot at the region's tail and
//! jumps back. The site itself is overwritten with a rel32 branch into the
//! region. Equivalent in effect to a conditional breakpoint that logs a
//! register and resumes, but with no per-hit cost and no debugger
//! attachment.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::memory::{ProcessMemory, Protection};

/// Size of each injected region. Leaves generous room for the relocated
/// instruction plus the capture stub, with the slot in the last 8 bytes.
pub const REGION_SIZE: usize = 64;

/// A rel32 `jmp` is 5 bytes; a site shorter than this cannot be patched.
pub const JMP_LEN: usize = 5;

/// General-purpose register captured by a stub.
///
/// The current signature table only captures RDI and R13, but the selector
/// is table data, not code: any register here can be named by a new entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CaptureRegister {
    Rax,
    Rcx,
    Rdx,
    Rbx,
    Rsp,
    Rbp,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl CaptureRegister {
    /// (extended, low 3 bits) for ModRM encoding.
    fn encoding(self) -> (bool, u8) {
        let index = self as u8;
        (index >= 8, index & 0b111)
    }

    /// `mov rbx, <reg>`: REX.W (+ REX.R for r8-r15), opcode 89, ModRM with
    /// rbx as destination.
    fn mov_to_rbx(self) -> [u8; 3] {
        let (extended, low) = self.encoding();
        let rex = if extended { 0x4C } else { 0x48 };
        [rex, 0x89, 0xC0 | (low << 3) | 0b011]
    }
}

/// Everything needed to read through, audit, or conceptually undo one
/// injected hook. Owned by the `HookSession`; invalid after the target
/// process restarts.
#[derive(Debug, Clone)]
pub struct TrampolineRecord {
    pub site_address: u64,
    pub original_bytes: Vec<u8>,
    pub region_address: u64,
    pub slot_address: u64,
}

/// Registry of installed trampolines for one process attachment, keyed by
/// signature name. Recreated from scratch on every re-attachment.
#[derive(Debug, Default)]
pub struct HookSession {
    records: HashMap<String, TrampolineRecord>,
}

impl HookSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, record: TrampolineRecord) {
        self.records.insert(name.to_string(), record);
    }

    pub fn record(&self, name: &str) -> Option<&TrampolineRecord> {
        self.records.get(name)
    }

    /// Slot address for a named hook, 0 if that hook is not installed.
    pub fn slot(&self, name: &str) -> u64 {
        self.records.get(name).map(|r| r.slot_address).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Inject a pointer-capture trampoline at `site_address`.
///
/// `original_bytes` are the instruction bytes being displaced; they must be
/// at least `JMP_LEN` long so the site can hold the branch. Fails with an
/// injection-class error if the target denies allocation, write, or
/// protection changes, or if the allocated region is out of rel32 reach.
pub fn inject_pointer_capture<P: ProcessMemory>(
    process: &P,
    site_address: u64,
    original_bytes: &[u8],
    capture_register: CaptureRegister,
) -> Result<TrampolineRecord> {
    if original_bytes.len() < JMP_LEN {
        return Err(Error::InjectionFailed(format!(
            "site at {:#x} is {} bytes, need at least {}",
            site_address,
            original_bytes.len(),
            JMP_LEN
        )));
    }

    let region_address = process.allocate(REGION_SIZE, Some(site_address))?;
    let slot_address = region_address + (REGION_SIZE as u64) - 8;

    let stub = emit_capture_stub(original_bytes, site_address, region_address, capture_register)?;
    debug_assert!(stub.len() <= REGION_SIZE - 8);
    process.write_bytes(region_address, &stub)?;

    // The slot must read as 0 until the patched site actually executes.
    process.write_bytes(slot_address, &[0u8; 8])?;

    let patch = emit_site_patch(site_address, original_bytes.len(), region_address)?;
    let prior = process.protect(
        site_address,
        original_bytes.len(),
        Protection::READ_WRITE_EXECUTE,
    )?;
    let write_result = process.write_bytes(site_address, &patch);
    // Restore before propagating any write failure; the relaxed window must
    // never outlive the patch operation.
    process.protect(site_address, original_bytes.len(), prior)?;
    write_result?;
    process.flush_instruction_cache(site_address, original_bytes.len())?;

    info!(
        "Trampoline installed: site {:#x} -> region {:#x}, slot {:#x}, captures {}",
        site_address, region_address, slot_address, capture_register
    );

    Ok(TrampolineRecord {
        site_address,
        original_bytes: original_bytes.to_vec(),
        region_address,
        slot_address,
    })
}

/// Emit the relocated code for the injected region:
///
/// ```text
/// <original instruction bytes>
/// push rbx                     ; scratch (skipped when capturing rbx)
/// mov  rbx, <reg>
/// mov  [rip + disp32], rbx     ; -> slot at region tail
/// pop  rbx
/// jmp  rel32                   ; -> site + len(original)
/// ```
pub fn emit_capture_stub(
    original_bytes: &[u8],
    site_address: u64,
    region_address: u64,
    capture_register: CaptureRegister,
) -> Result<Vec<u8>> {
    let slot_address = region_address + (REGION_SIZE as u64) - 8;
    let mut stub = Vec::with_capacity(REGION_SIZE - 8);
    stub.extend_from_slice(original_bytes);

    let scratch = capture_register != CaptureRegister::Rbx;
    if scratch {
        stub.push(0x53); // push rbx
        stub.extend_from_slice(&capture_register.mov_to_rbx());
    }

    // mov [rip+disp32], rbx -- disp is relative to the end of this 7-byte
    // instruction.
    let store_end = region_address + stub.len() as u64 + 7;
    let disp = checked_rel32(store_end, slot_address).ok_or_else(|| {
        Error::InjectionFailed(format!("slot at {:#x} out of rip-relative reach", slot_address))
    })?;
    stub.extend_from_slice(&[0x48, 0x89, 0x1D]);
    stub.extend_from_slice(&disp.to_le_bytes());

    if scratch {
        stub.push(0x5B); // pop rbx
    }

    // jmp back to the first byte after the displaced instruction.
    let resume = site_address + original_bytes.len() as u64;
    let jmp_end = region_address + stub.len() as u64 + JMP_LEN as u64;
    let rel = checked_rel32(jmp_end, resume).ok_or_else(|| {
        Error::InjectionFailed(format!(
            "resume address {:#x} out of rel32 reach from region {:#x}",
            resume, region_address
        ))
    })?;
    stub.push(0xE9);
    stub.extend_from_slice(&rel.to_le_bytes());

    if stub.len() > REGION_SIZE - 8 {
        return Err(Error::InjectionFailed(format!(
            "stub of {} bytes does not fit region of {}",
            stub.len(),
            REGION_SIZE
        )));
    }

    Ok(stub)
}

/// Emit the bytes that overwrite the original site: `jmp rel32` into the
/// region, NOP padding up to the displaced instruction's length.
pub fn emit_site_patch(site_address: u64, original_len: usize, region_address: u64) -> Result<Vec<u8>> {
    let rel = checked_rel32(site_address + JMP_LEN as u64, region_address).ok_or_else(|| {
        Error::InjectionFailed(format!(
            "region {:#x} out of rel32 reach from site {:#x}",
            region_address, site_address
        ))
    })?;

    let mut patch = Vec::with_capacity(original_len);
    patch.push(0xE9);
    patch.extend_from_slice(&rel.to_le_bytes());
    patch.resize(original_len, 0x90);
    Ok(patch)
}

fn checked_rel32(from: u64, to: u64) -> Option<i32> {
    let delta = (to as i64).wrapping_sub(from as i64);
    i32::try_from(delta).ok()
}
