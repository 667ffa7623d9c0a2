//! Scan the signature table against the live process without injecting.
//!
//! Offset discovery is best-effort across independent signatures: every
//! entry is reported individually so one stale pattern reads as one stale
//! pattern, not a failed attach.

use anyhow::Result;
use slipstream_core::{Config, SignatureSet};

#[cfg(target_os = "windows")]
pub fn execute(config: &Config, signatures: &SignatureSet) -> Result<()> {
    use slipstream_core::{ProcessHandle, ProcessMemory, SignatureScanner};

    let process = ProcessHandle::find_and_open(&config.process_name, &config.module_name)?;
    let module = process.module();
    let scanner = SignatureScanner::new(&process);

    println!(
        "Probing {} ({} entries, table {})",
        config.process_name,
        signatures.entries.len(),
        signatures.version
    );
    println!("Module base {:#x}, size {:#x}\n", module.base, module.size);

    let mut missing = 0usize;
    for entry in &signatures.entries {
        let pattern = entry.pattern_bytes()?;
        let role = match entry.capture {
            Some(register) => format!("captures {}", register),
            None => "scan-only".to_string(),
        };
        match scanner.scan_module(module, &pattern)? {
            Some(address) => println!(
                "  {:<14} {:#x} (base+{:#x})  [{}]",
                entry.name,
                address,
                address - module.base,
                role
            ),
            None => {
                missing += 1;
                println!("  {:<14} NOT FOUND  [{}]", entry.name, role);
            }
        }
    }

    if missing > 0 {
        println!(
            "\n{} signature(s) missing; the table may not match this build.",
            missing
        );
    }
    Ok(())
}

#[cfg(not(target_os = "windows"))]
pub fn execute(_config: &Config, _signatures: &SignatureSet) -> Result<()> {
    anyhow::bail!("probe attaches to a Windows game process and is only available on Windows")
}
