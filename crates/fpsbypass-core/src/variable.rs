//! Variables pinned inside the target process.

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::error::{Error, Result};
use crate::memory::{ReadMemory, WriteMemory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    #[strum(serialize = "frame rate")]
    FrameRate,
    #[strum(serialize = "vsync")]
    VSync,
}

impl VariableKind {
    /// Width in bytes and signedness of the value in memory.
    pub fn layout(self) -> (usize, bool) {
        match self {
            VariableKind::FrameRate => (4, true),
            VariableKind::VSync => (1, false),
        }
    }
}

/// A resolved variable in the live process.
///
/// The address stays valid for as long as the game session lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedVariable {
    pub kind: VariableKind,
    pub address: u64,
    pub width: usize,
    pub signed: bool,
}

impl TrackedVariable {
    pub fn new(kind: VariableKind, address: u64) -> Self {
        let (width, signed) = kind.layout();
        Self {
            kind,
            address,
            width,
            signed,
        }
    }

    pub fn read<R: ReadMemory + ?Sized>(&self, reader: &R) -> Result<i64> {
        let bytes = reader.read_bytes(self.address, self.width)?;
        Ok(decode_le(&bytes, self.signed))
    }

    pub fn write<W: WriteMemory + ?Sized>(&self, writer: &W, value: i64) -> Result<()> {
        let bytes = encode_le(value, self.width, self.signed).ok_or_else(|| {
            Error::resolution(
                self.kind.to_string(),
                format!("value {} does not fit in {} bytes", value, self.width),
            )
        })?;
        writer.write_bytes(self.address, &bytes)
    }
}

/// Addresses for both tracked variables.
///
/// Only built once every variable has resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddresses {
    pub frame_rate: TrackedVariable,
    pub vsync: TrackedVariable,
}

/// Decode a little-endian integer of 1 to 8 bytes.
pub(crate) fn decode_le(bytes: &[u8], signed: bool) -> i64 {
    let mut buf = [0u8; 8];
    let len = bytes.len().min(8);
    buf[..len].copy_from_slice(&bytes[..len]);
    let raw = u64::from_le_bytes(buf);

    if signed && len > 0 && len < 8 {
        let shift = 64 - 8 * len as u32;
        ((raw << shift) as i64) >> shift
    } else {
        raw as i64
    }
}

fn encode_le(value: i64, width: usize, signed: bool) -> Option<Vec<u8>> {
    if width == 0 || width > 8 {
        return None;
    }
    if width < 8 {
        let bits = 8 * width as u32;
        let fits = if signed {
            let min = -(1i64 << (bits - 1));
            let max = (1i64 << (bits - 1)) - 1;
            (min..=max).contains(&value)
        } else {
            (0..(1i64 << bits)).contains(&value)
        };
        if !fits {
            return None;
        }
    }
    Some(value.to_le_bytes()[..width].to_vec())
}
