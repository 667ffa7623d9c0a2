//! Foreign-process capability
//!
//! The target process is modeled as a capability object exposing explicit
//! `read`/`write`/`allocate`/`protect` operations, never as a language-native
//! handle with implicit lifetime. Addresses are plain integers with no
//! ownership semantics across the process boundary.

use crate::error::Result;
use crate::memory::reader::ReadMemory;

/// Page protection, carried as the Win32 numeric constant so records of
/// prior protection survive a round trip through `protect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protection(pub u32);

impl Protection {
    /// PAGE_EXECUTE_READ
    pub const READ_EXECUTE: Protection = Protection(0x20);
    /// PAGE_EXECUTE_READWRITE
    pub const READ_WRITE_EXECUTE: Protection = Protection(0x40);
    /// PAGE_READWRITE
    pub const READ_WRITE: Protection = Protection(0x04);
}

/// Mapped range of the game's main module inside the target process.
#[derive(Debug, Clone, Copy)]
pub struct ModuleRange {
    pub base: u64,
    pub size: usize,
}

impl ModuleRange {
    pub fn end(&self) -> u64 {
        self.base + self.size as u64
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }
}

/// Full capability over a foreign process: everything `ReadMemory` offers
/// plus the write/allocate/protect operations the injector needs.
pub trait ProcessMemory: ReadMemory {
    /// Write `bytes` at `address` in the target process.
    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()>;

    /// Allocate an executable region of `size` bytes, preferring an address
    /// near `near` when given (the site patch is a rel32 branch, so the
    /// region must end up within +/-2 GiB of the patched site).
    fn allocate(&self, size: usize, near: Option<u64>) -> Result<u64>;

    /// Change page protection for `[address, address + size)`, returning
    /// the prior protection so the caller can restore it.
    fn protect(&self, address: u64, size: usize, protection: Protection) -> Result<Protection>;

    /// Invalidate cached instructions after patching code bytes. No-op
    /// where the platform does not need it.
    fn flush_instruction_cache(&self, _address: u64, _size: usize) -> Result<()> {
        Ok(())
    }

    /// Range of the module whose code is scanned for signatures.
    fn module(&self) -> ModuleRange;

    /// Opportunistic liveness probe: the process counts as gone as soon as
    /// its module base can no longer be read.
    fn is_alive(&self) -> bool {
        self.read_bytes(self.module().base, 4).is_ok()
    }
}

#[cfg(target_os = "windows")]
pub use windows_impl::ProcessHandle;

#[cfg(target_os = "windows")]
mod windows_impl {
    use std::ffi::c_void;

    use tracing::{debug, info};
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Diagnostics::Debug::{
        FlushInstructionCache, ReadProcessMemory, WriteProcessMemory,
    };
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW, Module32NextW, PROCESSENTRY32W,
        Process32FirstW, Process32NextW, TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32,
        TH32CS_SNAPPROCESS,
    };
    use windows::Win32::System::Memory::{
        MEM_COMMIT, MEM_RESERVE, PAGE_EXECUTE_READWRITE, PAGE_PROTECTION_FLAGS, VirtualAllocEx,
        VirtualProtectEx,
    };
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_ALL_ACCESS};

    use crate::error::{Error, Result};
    use crate::memory::process::{ModuleRange, ProcessMemory, Protection};
    use crate::memory::reader::ReadMemory;

    /// Open handle to the running game process.
    pub struct ProcessHandle {
        handle: HANDLE,
        pub pid: u32,
        module: ModuleRange,
    }

    // HANDLE is a plain kernel object reference; all operations on it here
    // are thread safe.
    unsafe impl Send for ProcessHandle {}
    unsafe impl Sync for ProcessHandle {}

    impl ProcessHandle {
        /// Find the process by executable name and open it with the rights
        /// the injector needs.
        pub fn find_and_open(process_name: &str, module_name: &str) -> Result<Self> {
            let pid = find_process_id(process_name)?
                .ok_or_else(|| Error::ProcessNotFound(process_name.to_string()))?;

            let handle = unsafe { OpenProcess(PROCESS_ALL_ACCESS, false, pid) }
                .map_err(|e| Error::ProcessOpenFailed(format!("{} (pid {}): {}", process_name, pid, e)))?;

            let module = match find_module(pid, module_name) {
                Ok(m) => m,
                Err(e) => {
                    unsafe { let _ = CloseHandle(handle); }
                    return Err(e);
                }
            };

            info!(
                "Attached to {} (pid {}, module base {:#x}, size {:#x})",
                process_name, pid, module.base, module.size
            );

            Ok(Self { handle, pid, module })
        }
    }

    impl Drop for ProcessHandle {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseHandle(self.handle);
            }
        }
    }

    impl ReadMemory for ProcessHandle {
        fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
            let mut buffer = vec![0u8; size];
            let mut read = 0usize;
            unsafe {
                ReadProcessMemory(
                    self.handle,
                    address as *const c_void,
                    buffer.as_mut_ptr() as *mut c_void,
                    size,
                    Some(&mut read),
                )
            }
            .map_err(|e| Error::MemoryReadFailed {
                address,
                message: e.to_string(),
            })?;
            if read != size {
                return Err(Error::MemoryReadFailed {
                    address,
                    message: format!("short read ({} of {} bytes)", read, size),
                });
            }
            Ok(buffer)
        }
    }

    impl ProcessMemory for ProcessHandle {
        fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()> {
            let mut written = 0usize;
            unsafe {
                WriteProcessMemory(
                    self.handle,
                    address as *const c_void,
                    bytes.as_ptr() as *const c_void,
                    bytes.len(),
                    Some(&mut written),
                )
            }
            .map_err(|e| Error::MemoryWriteFailed {
                address,
                message: e.to_string(),
            })
        }

        fn allocate(&self, size: usize, near: Option<u64>) -> Result<u64> {
            // Try hinted addresses below the site first so the rel32 patch
            // can reach the region, then let the kernel pick.
            if let Some(site) = near {
                let aligned = site & !0xFFFF;
                for step in 1..=8u64 {
                    let hint = aligned.saturating_sub(step * 0x0100_0000);
                    if hint == 0 {
                        break;
                    }
                    let region = unsafe {
                        VirtualAllocEx(
                            self.handle,
                            Some(hint as *const c_void),
                            size,
                            MEM_COMMIT | MEM_RESERVE,
                            PAGE_EXECUTE_READWRITE,
                        )
                    };
                    if !region.is_null() {
                        debug!("Allocated {:#x} near {:#x}", region as u64, site);
                        return Ok(region as u64);
                    }
                }
            }

            let region = unsafe {
                VirtualAllocEx(
                    self.handle,
                    None,
                    size,
                    MEM_COMMIT | MEM_RESERVE,
                    PAGE_EXECUTE_READWRITE,
                )
            };
            if region.is_null() {
                return Err(Error::AllocationFailed {
                    size,
                    message: windows::core::Error::from_win32().to_string(),
                });
            }
            Ok(region as u64)
        }

        fn protect(&self, address: u64, size: usize, protection: Protection) -> Result<Protection> {
            let mut old = PAGE_PROTECTION_FLAGS(0);
            unsafe {
                VirtualProtectEx(
                    self.handle,
                    address as *const c_void,
                    size,
                    PAGE_PROTECTION_FLAGS(protection.0),
                    &mut old,
                )
            }
            .map_err(|e| Error::ProtectionChangeFailed {
                address,
                message: e.to_string(),
            })?;
            Ok(Protection(old.0))
        }

        fn flush_instruction_cache(&self, address: u64, size: usize) -> Result<()> {
            unsafe { FlushInstructionCache(self.handle, Some(address as *const c_void), size) }
                .map_err(|e| Error::MemoryWriteFailed {
                    address,
                    message: format!("FlushInstructionCache: {}", e),
                })
        }

        fn module(&self) -> ModuleRange {
            self.module
        }
    }

    fn find_process_id(name: &str) -> Result<Option<u32>> {
        let snap = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
            .map_err(|e| Error::ProcessOpenFailed(format!("process snapshot: {}", e)))?;

        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        let mut found = None;
        unsafe {
            if Process32FirstW(snap, &mut entry).is_ok() {
                loop {
                    let len = entry.szExeFile.iter().position(|&c| c == 0).unwrap_or(260);
                    let exe = String::from_utf16_lossy(&entry.szExeFile[..len]);
                    if exe.eq_ignore_ascii_case(name) {
                        found = Some(entry.th32ProcessID);
                        break;
                    }
                    if Process32NextW(snap, &mut entry).is_err() {
                        break;
                    }
                }
            }
            let _ = CloseHandle(snap);
        }
        Ok(found)
    }

    fn find_module(pid: u32, module_name: &str) -> Result<ModuleRange> {
        let snap =
            unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid) }
                .map_err(|e| Error::ProcessOpenFailed(format!("module snapshot: {}", e)))?;

        let mut entry = MODULEENTRY32W {
            dwSize: std::mem::size_of::<MODULEENTRY32W>() as u32,
            ..Default::default()
        };

        let mut found = None;
        unsafe {
            if Module32FirstW(snap, &mut entry).is_ok() {
                loop {
                    let len = entry.szModule.iter().position(|&c| c == 0).unwrap_or(256);
                    let name = String::from_utf16_lossy(&entry.szModule[..len]);
                    if name.eq_ignore_ascii_case(module_name) {
                        found = Some(ModuleRange {
                            base: entry.modBaseAddr as u64,
                            size: entry.modBaseSize as usize,
                        });
                        break;
                    }
                    if Module32NextW(snap, &mut entry).is_err() {
                        break;
                    }
                }
            }
            let _ = CloseHandle(snap);
        }

        found.ok_or_else(|| Error::ModuleNotFound(module_name.to_string()))
    }
}
