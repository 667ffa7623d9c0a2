use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::hook::trampoline::CaptureRegister;

/// One instruction-site signature from the offset table.
///
/// Entries with a `capture` register get a pointer-capture trampoline; the
/// rest are scan-only, kept in the table to verify that the module build
/// still matches the offsets shipped alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookSignature {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub capture: Option<CaptureRegister>,
}

impl HookSignature {
    pub fn pattern_bytes(&self) -> Result<Vec<Option<u8>>> {
        parse_pattern(&self.pattern)
    }
}

/// Versioned signature table. External configuration input: adding a field
/// to the telemetry means adding one entry here plus one typed reader, with
/// no injector or assembler changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureSet {
    pub version: String,
    pub entries: Vec<HookSignature>,
}

impl SignatureSet {
    pub fn entry(&self, name: &str) -> Option<&HookSignature> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }
}

/// Signature names wired to typed readers in the extractor.
pub mod names {
    /// `add [rdi+0A0h], rax` inside the timer update; RDI carries the
    /// race-data struct.
    pub const RACE_TIMER: &str = "raceTimer";
    /// `mov [rdi+1D8h], eax; add rsp, 38h` in the progress writer.
    /// Confirms the race-data struct location; not separately hooked.
    pub const RACE_PROGRESS: &str = "raceProgress";
    /// `movss [rdi+1B8h], xmm1` in the gearbox update. Scan-only.
    pub const ENGINE_RPM: &str = "engineRpm";
    /// `mov eax, [r13+24Ch]`; R13 carries the checkpoint struct.
    pub const CHECKPOINT: &str = "checkpoint";
}

/// Built-in table for the current Steam x64 build.
pub fn builtin_signatures() -> SignatureSet {
    SignatureSet {
        version: "steam-x64-r3".to_string(),
        entries: vec![
            HookSignature {
                name: names::RACE_TIMER.to_string(),
                pattern: "48 01 87 A0 00 00 00".to_string(),
                capture: Some(CaptureRegister::Rdi),
            },
            HookSignature {
                name: names::RACE_PROGRESS.to_string(),
                pattern: "89 87 D8 01 00 00 48 83 C4 38".to_string(),
                capture: None,
            },
            HookSignature {
                name: names::ENGINE_RPM.to_string(),
                pattern: "F3 0F 11 8F B8 01 00 00".to_string(),
                capture: None,
            },
            HookSignature {
                name: names::CHECKPOINT.to_string(),
                pattern: "41 8B 85 4C 02 00 00".to_string(),
                capture: Some(CaptureRegister::R13),
            },
        ],
    }
}

pub fn load_signatures<P: AsRef<Path>>(path: P) -> Result<SignatureSet> {
    let content = fs::read_to_string(&path)?;
    let data = serde_json::from_str(&content)?;
    Ok(data)
}

pub fn save_signatures<P: AsRef<Path>>(path: P, signatures: &SignatureSet) -> Result<()> {
    let content = serde_json::to_string_pretty(signatures)?;
    fs::write(path, content)?;
    Ok(())
}

/// Parse a space-separated hex pattern; `??` marks a wildcard byte.
pub fn parse_pattern(pattern: &str) -> Result<Vec<Option<u8>>> {
    let mut bytes = Vec::new();
    for token in pattern.split_whitespace() {
        if token == "??" || token == "?" {
            bytes.push(None);
            continue;
        }

        let value = u8::from_str_radix(token, 16).map_err(|e| {
            Error::InvalidSignature(format!("Invalid pattern token '{}': {}", token, e))
        })?;
        bytes.push(Some(value));
    }

    if bytes.is_empty() {
        return Err(Error::InvalidSignature("Pattern is empty".to_string()));
    }

    Ok(bytes)
}

pub fn format_pattern(bytes: &[Option<u8>]) -> String {
    bytes
        .iter()
        .map(|b| match b {
            Some(value) => format!("{:02X}", value),
            None => "??".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pattern_with_wildcards() {
        let bytes = parse_pattern("48 01 87 ?? ?? 00 00").unwrap();
        assert_eq!(bytes.len(), 7);
        assert_eq!(bytes[0], Some(0x48));
        assert_eq!(bytes[3], None);
        assert_eq!(bytes[5], Some(0x00));
    }

    #[test]
    fn test_parse_pattern_rejects_garbage() {
        assert!(parse_pattern("48 XY").is_err());
        assert!(parse_pattern("").is_err());
    }

    #[test]
    fn test_format_pattern_roundtrip() {
        let pattern = vec![Some(0x41), Some(0x8B), None, Some(0x4C)];
        let formatted = format_pattern(&pattern);
        assert_eq!(formatted, "41 8B ?? 4C");
        assert_eq!(parse_pattern(&formatted).unwrap(), pattern);
    }

    #[test]
    fn test_builtin_table_is_parseable() {
        let set = builtin_signatures();
        assert!(!set.version.is_empty());
        for entry in &set.entries {
            let bytes = entry.pattern_bytes().unwrap();
            // Every capture entry must be long enough to host the patch.
            if entry.capture.is_some() {
                assert!(bytes.len() >= crate::hook::trampoline::JMP_LEN);
            }
        }
        assert_eq!(
            set.entry("raceTimer").unwrap().capture,
            Some(CaptureRegister::Rdi)
        );
        assert_eq!(
            set.entry("checkpoint").unwrap().capture,
            Some(CaptureRegister::R13)
        );
        assert!(set.entry("engineRpm").unwrap().capture.is_none());
    }

    #[test]
    fn test_signature_set_json_roundtrip() {
        let set = builtin_signatures();
        let json = serde_json::to_string_pretty(&set).unwrap();
        let back: SignatureSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.version, set.version);
        assert_eq!(back.entries.len(), set.entries.len());
        assert_eq!(
            back.entry("checkpoint").unwrap().capture,
            Some(CaptureRegister::R13)
        );
    }
}
