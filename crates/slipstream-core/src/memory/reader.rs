use crate::error::Result;

/// Read access to a foreign address space.
///
/// Implementors return explicit errors; convenience wrappers that degrade a
/// failure to `None` live on the trait so every typed field reader is
/// independently fail-soft (a fault on one field never poisons the rest of a
/// snapshot).
pub trait ReadMemory {
    /// Read exactly `size` bytes starting at `address`. A short read is a
    /// failure, never a truncated buffer.
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    fn read_u8(&self, address: u64) -> Result<u8> {
        let bytes = self.read_bytes(address, 1)?;
        Ok(bytes[0])
    }

    fn read_i32(&self, address: u64) -> Result<i32> {
        let bytes = self.read_bytes(address, 4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u32(&self, address: u64) -> Result<u32> {
        let bytes = self.read_bytes(address, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        let bytes = self.read_bytes(address, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[..8]);
        Ok(u64::from_le_bytes(buf))
    }

    fn read_f32(&self, address: u64) -> Result<f32> {
        let bytes = self.read_bytes(address, 4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a 4-byte integer field at `base + offset`, `None` on any fault
    /// or when the base pointer has not been captured yet.
    fn field_i32(&self, base: u64, offset: u64) -> Option<i32> {
        if base == 0 {
            return None;
        }
        self.read_i32(base + offset).ok()
    }

    /// Read a float field at `base + offset`, `None` on any fault.
    fn field_f32(&self, base: u64, offset: u64) -> Option<f32> {
        if base == 0 {
            return None;
        }
        self.read_f32(base + offset).ok()
    }

    /// Read a pointer slot. Returns 0 when the slot has never been written
    /// by its trampoline (no live struct) or on any read fault.
    fn pointer_slot(&self, slot: u64) -> u64 {
        if slot == 0 {
            return 0;
        }
        self.read_u64(slot).unwrap_or(0)
    }
}
