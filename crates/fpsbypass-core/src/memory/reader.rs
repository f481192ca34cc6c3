use std::sync::Arc;

use crate::error::{Error, Result};

/// Read access to another process's memory.
pub trait ReadMemory {
    /// Read exactly `size` bytes starting at `address`.
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    fn read_u8(&self, address: u64) -> Result<u8> {
        Ok(to_array::<1>(address, self.read_bytes(address, 1)?)?[0])
    }

    fn read_i32(&self, address: u64) -> Result<i32> {
        Ok(i32::from_le_bytes(to_array(address, self.read_bytes(address, 4)?)?))
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        Ok(u64::from_le_bytes(to_array(address, self.read_bytes(address, 8)?)?))
    }
}

fn to_array<const N: usize>(address: u64, bytes: Vec<u8>) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| Error::MemoryReadFailed {
            address,
            message: format!("short read: {} of {} bytes", bytes.len(), N),
        })
}

/// Write access to another process's memory.
pub trait WriteMemory {
    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()>;

    fn write_u8(&self, address: u64, value: u8) -> Result<()> {
        self.write_bytes(address, &[value])
    }

    fn write_i32(&self, address: u64, value: i32) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }
}

/// Liveness of the target process.
pub trait ProcessStatus {
    fn is_alive(&self) -> bool;
}

impl<T: ReadMemory + ?Sized> ReadMemory for &T {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(address, size)
    }
}

impl<T: ReadMemory + ?Sized> ReadMemory for Arc<T> {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(address, size)
    }
}

impl<T: WriteMemory + ?Sized> WriteMemory for &T {
    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(address, bytes)
    }
}

impl<T: WriteMemory + ?Sized> WriteMemory for Arc<T> {
    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(address, bytes)
    }
}

impl<T: ProcessStatus + ?Sized> ProcessStatus for &T {
    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }
}

impl<T: ProcessStatus + ?Sized> ProcessStatus for Arc<T> {
    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }
}
