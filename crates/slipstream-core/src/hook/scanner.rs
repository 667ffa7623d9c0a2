//! Signature scanning over a module's mapped code
//!
//! A missed scan is reported as absence, not an error: the offset-discovery
//! phase proceeds best-effort across multiple independent signatures and a
//! single stale pattern must not abort the rest.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::memory::{ModuleRange, ReadMemory};

/// Remote reads are chunked; patterns straddling a chunk boundary are
/// covered by carrying a pattern-length tail into the next chunk.
const SCAN_CHUNK_SIZE: usize = 64 * 1024;

pub struct SignatureScanner<'a, R: ReadMemory> {
    reader: &'a R,
}

impl<'a, R: ReadMemory> SignatureScanner<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self { reader }
    }

    /// Scan the module's mapped code for `pattern`, returning the address
    /// of the first match or `None`.
    ///
    /// Only an unreadable module start is an error (the process is gone);
    /// a read fault further in ends the scan early with a miss.
    pub fn scan_module(
        &self,
        module: ModuleRange,
        pattern: &[Option<u8>],
    ) -> Result<Option<u64>> {
        if pattern.is_empty() {
            return Err(Error::InvalidSignature("Pattern is empty".to_string()));
        }

        let mut offset: usize = 0;
        let mut tail: Vec<u8> = Vec::new();

        while offset < module.size {
            let read_size = (module.size - offset).min(SCAN_CHUNK_SIZE);
            let address = module.base + offset as u64;

            let chunk = match self.reader.read_bytes(address, read_size) {
                Ok(bytes) => bytes,
                Err(e) => {
                    if offset == 0 {
                        return Err(e);
                    }
                    warn!(
                        "Scan stopped at {:#x} after {:#x} bytes: {}",
                        address, offset, e
                    );
                    break;
                }
            };

            let mut window = Vec::with_capacity(tail.len() + chunk.len());
            window.extend_from_slice(&tail);
            window.extend_from_slice(&chunk);
            let window_base = address - tail.len() as u64;

            if let Some(pos) = find_first(&window, pattern) {
                let found = window_base + pos as u64;
                debug!("Pattern matched at {:#x}", found);
                return Ok(Some(found));
            }

            if pattern.len() > 1 {
                let keep = (pattern.len() - 1).min(window.len());
                tail = window[window.len() - keep..].to_vec();
            }

            offset += read_size;
        }

        Ok(None)
    }
}

/// First match position of `pattern` in `buffer`, honoring wildcards.
fn find_first(buffer: &[u8], pattern: &[Option<u8>]) -> Option<usize> {
    if buffer.len() < pattern.len() {
        return None;
    }
    let last = buffer.len() - pattern.len();

    // Anchor on the first concrete byte so the common case runs on memchr
    // instead of a byte-by-byte window walk.
    match pattern[0] {
        Some(first) => memchr::memchr_iter(first, &buffer[..=last])
            .find(|&pos| matches_at(buffer, pos, pattern)),
        None => (0..=last).find(|&pos| matches_at(buffer, pos, pattern)),
    }
}

fn matches_at(buffer: &[u8], pos: usize, pattern: &[Option<u8>]) -> bool {
    pattern
        .iter()
        .enumerate()
        .all(|(i, byte)| byte.is_none_or(|value| buffer[pos + i] == value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::signature::parse_pattern;
    use crate::memory::{MockProcessBuilder, ProcessMemory};

    const MODULE_BASE: u64 = 0x0040_0000;

    fn image_with(pattern: &[u8], at: usize, size: usize) -> Vec<u8> {
        let mut image = vec![0xCCu8; size];
        image[at..at + pattern.len()].copy_from_slice(pattern);
        image
    }

    #[test]
    fn test_scan_finds_exact_offset() {
        let needle = [0x48, 0x01, 0x87, 0xA0, 0x00, 0x00, 0x00];
        let mock = MockProcessBuilder::new()
            .module_code(MODULE_BASE, image_with(&needle, 0x1234, 0x4000))
            .build();

        let pattern = parse_pattern("48 01 87 A0 00 00 00").unwrap();
        let scanner = SignatureScanner::new(&mock);
        let found = scanner.scan_module(mock.module(), &pattern).unwrap();
        assert_eq!(found, Some(MODULE_BASE + 0x1234));
    }

    #[test]
    fn test_scan_miss_is_soft() {
        let mock = MockProcessBuilder::new()
            .module_code(MODULE_BASE, vec![0xCC; 0x4000])
            .build();

        let pattern = parse_pattern("41 8B 85 4C 02 00 00").unwrap();
        let scanner = SignatureScanner::new(&mock);
        assert_eq!(scanner.scan_module(mock.module(), &pattern).unwrap(), None);
    }

    #[test]
    fn test_scan_across_chunk_boundary() {
        // Pattern straddles the 64 KiB chunk edge.
        let needle = [0xF3, 0x0F, 0x11, 0x8F, 0xB8, 0x01, 0x00, 0x00];
        let at = SCAN_CHUNK_SIZE - 3;
        let mock = MockProcessBuilder::new()
            .module_code(MODULE_BASE, image_with(&needle, at, SCAN_CHUNK_SIZE * 2))
            .build();

        let pattern = parse_pattern("F3 0F 11 8F B8 01 00 00").unwrap();
        let scanner = SignatureScanner::new(&mock);
        let found = scanner.scan_module(mock.module(), &pattern).unwrap();
        assert_eq!(found, Some(MODULE_BASE + at as u64));
    }

    #[test]
    fn test_scan_with_wildcards() {
        let needle = [0x89, 0x87, 0xD8, 0x01, 0x00, 0x00, 0x48, 0x83, 0xC4, 0x38];
        let mock = MockProcessBuilder::new()
            .module_code(MODULE_BASE, image_with(&needle, 0x100, 0x1000))
            .build();

        // Displacement bytes wildcarded, as a renumbered build would need.
        let pattern = parse_pattern("89 87 ?? ?? 00 00 48 83 C4 38").unwrap();
        let scanner = SignatureScanner::new(&mock);
        let found = scanner.scan_module(mock.module(), &pattern).unwrap();
        assert_eq!(found, Some(MODULE_BASE + 0x100));
    }

    #[test]
    fn test_scan_returns_first_match() {
        let needle = [0x41, 0x8B, 0x85];
        let mut image = vec![0u8; 0x1000];
        image[0x200..0x203].copy_from_slice(&needle);
        image[0x800..0x803].copy_from_slice(&needle);
        let mock = MockProcessBuilder::new()
            .module_code(MODULE_BASE, image)
            .build();

        let pattern = parse_pattern("41 8B 85").unwrap();
        let scanner = SignatureScanner::new(&mock);
        let found = scanner.scan_module(mock.module(), &pattern).unwrap();
        assert_eq!(found, Some(MODULE_BASE + 0x200));
    }

    #[test]
    fn test_scan_unreadable_module_is_an_error() {
        let mock = MockProcessBuilder::new()
            .module_code(MODULE_BASE, vec![0u8; 0x1000])
            .build();
        mock.kill();

        let pattern = parse_pattern("48 01 87").unwrap();
        let scanner = SignatureScanner::new(&mock);
        assert!(scanner.scan_module(mock.module(), &pattern).is_err());
    }
}
