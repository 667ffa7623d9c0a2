//! Mock process capability for tests
//!
//! Simulates a target address space as a set of mapped regions, with an
//! allocation bump pointer and a log of protection changes so injection
//! tests can assert the relax/restore discipline.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::memory::process::{ModuleRange, ProcessMemory, Protection};
use crate::memory::reader::ReadMemory;

/// One recorded `protect` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectCall {
    pub address: u64,
    pub size: usize,
    pub protection: Protection,
}

pub struct MockProcess {
    regions: Mutex<BTreeMap<u64, Vec<u8>>>,
    module: ModuleRange,
    alloc_next: Mutex<u64>,
    protect_log: Mutex<Vec<ProtectCall>>,
    alive: Mutex<bool>,
}

impl MockProcess {
    /// Snapshot of all protection changes, in call order.
    pub fn protect_calls(&self) -> Vec<ProtectCall> {
        self.protect_log.lock().unwrap().clone()
    }

    /// Simulate process termination: all subsequent operations fail.
    pub fn kill(&self) {
        *self.alive.lock().unwrap() = false;
    }

    fn check_alive(&self, address: u64) -> Result<()> {
        if *self.alive.lock().unwrap() {
            Ok(())
        } else {
            Err(Error::MemoryReadFailed {
                address,
                message: "process exited".to_string(),
            })
        }
    }
}

impl ReadMemory for MockProcess {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        self.check_alive(address)?;
        let regions = self.regions.lock().unwrap();
        if let Some((&base, bytes)) = regions.range(..=address).next_back() {
            let offset = (address - base) as usize;
            if offset + size <= bytes.len() {
                return Ok(bytes[offset..offset + size].to_vec());
            }
        }
        Err(Error::MemoryReadFailed {
            address,
            message: "unmapped page".to_string(),
        })
    }
}

impl ProcessMemory for MockProcess {
    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()> {
        self.check_alive(address)?;
        let mut regions = self.regions.lock().unwrap();
        if let Some((&base, bytes)) = regions.range_mut(..=address).next_back() {
            let offset = (address - base) as usize;
            if offset + data.len() <= bytes.len() {
                bytes[offset..offset + data.len()].copy_from_slice(data);
                return Ok(());
            }
        }
        Err(Error::MemoryWriteFailed {
            address,
            message: "unmapped page".to_string(),
        })
    }

    fn allocate(&self, size: usize, near: Option<u64>) -> Result<u64> {
        self.check_alive(near.unwrap_or(0))?;
        let mut next = self.alloc_next.lock().unwrap();
        let address = *next;
        *next += ((size as u64) + 0xFFF) & !0xFFF;
        self.regions
            .lock()
            .unwrap()
            .insert(address, vec![0u8; size]);
        Ok(address)
    }

    fn protect(&self, address: u64, size: usize, protection: Protection) -> Result<Protection> {
        self.check_alive(address)?;
        let mut log = self.protect_log.lock().unwrap();
        let prior = log
            .iter()
            .rev()
            .find(|c| c.address == address)
            .map(|c| c.protection)
            .unwrap_or(Protection::READ_EXECUTE);
        log.push(ProtectCall {
            address,
            size,
            protection,
        });
        Ok(prior)
    }

    fn module(&self) -> ModuleRange {
        self.module
    }
}

pub struct MockProcessBuilder {
    regions: BTreeMap<u64, Vec<u8>>,
    module: ModuleRange,
}

impl MockProcessBuilder {
    pub fn new() -> Self {
        Self {
            regions: BTreeMap::new(),
            module: ModuleRange {
                base: 0x0040_0000,
                size: 0,
            },
        }
    }

    /// Map `bytes` at `base`.
    pub fn region(mut self, base: u64, bytes: Vec<u8>) -> Self {
        self.regions.insert(base, bytes);
        self
    }

    /// Map `bytes` at `base` and mark them as the main module's code.
    pub fn module_code(mut self, base: u64, bytes: Vec<u8>) -> Self {
        self.module = ModuleRange {
            base,
            size: bytes.len(),
        };
        self.regions.insert(base, bytes);
        self
    }

    pub fn build(self) -> MockProcess {
        MockProcess {
            regions: Mutex::new(self.regions),
            module: self.module,
            // Well above the module so allocations never collide with
            // mapped test regions.
            alloc_next: Mutex::new(0x7000_0000),
            protect_log: Mutex::new(Vec::new()),
            alive: Mutex::new(true),
        }
    }
}

impl Default for MockProcessBuilder {
    fn default() -> Self {
        Self::new()
    }
}
