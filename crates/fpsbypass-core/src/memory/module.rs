use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::memory::ReadMemory;
use crate::retry::{RetryStrategy, poll_until};
use crate::shutdown::ShutdownSignal;

/// Chunk size used when copying a module out of the target (16MB)
const SNAPSHOT_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// A module loaded in the target process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub base_address: u64,
    pub size: usize,
}

impl ModuleInfo {
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base_address && address - self.base_address < self.size as u64
    }
}

impl fmt::Display for ModuleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (base: {:#x}, size: {:#x})",
            self.name, self.base_address, self.size
        )
    }
}

/// Lists the modules loaded in a process.
pub trait ModuleDirectory {
    /// Modules whose name satisfies `filter`.
    ///
    /// May return fewer modules than expected while the target is still
    /// loading; callers poll until the set they need is present.
    fn enumerate_modules(&self, filter: &dyn Fn(&str) -> bool) -> Result<Vec<ModuleInfo>>;
}

impl<T: ModuleDirectory + ?Sized> ModuleDirectory for &T {
    fn enumerate_modules(&self, filter: &dyn Fn(&str) -> bool) -> Result<Vec<ModuleInfo>> {
        (**self).enumerate_modules(filter)
    }
}

impl<T: ModuleDirectory + ?Sized> ModuleDirectory for Arc<T> {
    fn enumerate_modules(&self, filter: &dyn Fn(&str) -> bool) -> Result<Vec<ModuleInfo>> {
        (**self).enumerate_modules(filter)
    }
}

/// Wait until every module in `names` is loaded.
///
/// Names match case-insensitively; the result is in the order of `names`.
pub fn wait_for_modules<D: ModuleDirectory + ?Sized>(
    directory: &D,
    names: &[&str],
    strategy: &dyn RetryStrategy,
    shutdown: &ShutdownSignal,
) -> Result<Vec<ModuleInfo>> {
    let filter = |name: &str| names.iter().any(|n| n.eq_ignore_ascii_case(name));

    poll_until("modules", strategy, shutdown, || {
        let found = directory.enumerate_modules(&filter)?;
        let ordered: Option<Vec<ModuleInfo>> = names
            .iter()
            .map(|name| {
                found
                    .iter()
                    .find(|m| m.name.eq_ignore_ascii_case(name))
                    .cloned()
            })
            .collect();

        if ordered.is_none() {
            debug!("Loaded {} of {} modules", found.len(), names.len());
        }
        Ok(ordered)
    })
}

/// Copy of a module's memory taken at one instant.
#[derive(Clone)]
pub struct ModuleSnapshot {
    info: ModuleInfo,
    content: Arc<[u8]>,
}

impl ModuleSnapshot {
    pub fn new(info: ModuleInfo, content: Vec<u8>) -> Self {
        Self {
            info,
            content: content.into(),
        }
    }

    /// Read the whole module from the target.
    ///
    /// Chunks after the first that can't be read are left zeroed.
    pub fn capture<R: ReadMemory + ?Sized>(reader: &R, info: &ModuleInfo) -> Result<Self> {
        let mut content = vec![0u8; info.size];
        let mut skipped = 0usize;

        for (index, chunk) in content.chunks_mut(SNAPSHOT_CHUNK_SIZE).enumerate() {
            let offset = index * SNAPSHOT_CHUNK_SIZE;
            let address = info.base_address + offset as u64;
            match reader.read_bytes(address, chunk.len()) {
                Ok(bytes) => chunk.copy_from_slice(&bytes),
                Err(e) if index == 0 => return Err(e),
                Err(e) => {
                    debug!("Snapshot of {} skipped chunk at {:#x}: {}", info.name, address, e);
                    skipped += 1;
                }
            }
        }

        debug!(
            "Captured {} ({} bytes, {} unreadable chunks)",
            info.name, info.size, skipped
        );
        Ok(Self::new(info.clone(), content))
    }

    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    pub fn base_address(&self) -> u64 {
        self.info.base_address
    }

    pub fn bytes(&self) -> &[u8] {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// `len` bytes at `offset`, or `None` if the range leaves the snapshot.
    pub fn slice(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.content.get(offset..offset.checked_add(len)?)
    }

    /// Translate a live address into an offset within this module.
    pub fn offset_of(&self, address: u64) -> Result<usize> {
        if self.info.contains(address) {
            Ok((address - self.info.base_address) as usize)
        } else {
            Err(Error::ModuleNotFound(format!(
                "address {:#x} is outside {}",
                address, self.info
            )))
        }
    }
}

impl fmt::Debug for ModuleSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSnapshot")
            .field("info", &self.info)
            .field("len", &self.content.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::memory::mock::MockMemoryBuilder;
    use crate::retry::FixedDelay;

    #[test]
    fn test_module_contains() {
        let info = ModuleInfo {
            name: "UnityPlayer.dll".to_string(),
            base_address: 0x1000,
            size: 0x100,
        };
        assert!(info.contains(0x1000));
        assert!(info.contains(0x10FF));
        assert!(!info.contains(0x1100));
        assert!(!info.contains(0xFFF));
    }

    #[test]
    fn test_capture_snapshot() {
        let mock = MockMemoryBuilder::new()
            .module("UserAssembly.dll", 0x4000, vec![1, 2, 3, 4])
            .build();
        let info = mock.module_info("UserAssembly.dll").unwrap();

        let snapshot = ModuleSnapshot::capture(&mock, &info).unwrap();
        assert_eq!(snapshot.bytes(), &[1, 2, 3, 4]);
        assert_eq!(snapshot.slice(2, 2), Some(&[3u8, 4][..]));
        assert_eq!(snapshot.slice(3, 2), None);
        assert_eq!(snapshot.offset_of(0x4003).unwrap(), 3);
        assert!(snapshot.offset_of(0x4004).is_err());
    }

    #[test]
    fn test_capture_unmapped_module_fails() {
        let mock = MockMemoryBuilder::new().build();
        let info = ModuleInfo {
            name: "missing.dll".to_string(),
            base_address: 0x9000,
            size: 16,
        };
        assert!(ModuleSnapshot::capture(&mock, &info).is_err());
    }

    #[test]
    fn test_wait_for_modules_until_loaded() {
        let mock = MockMemoryBuilder::new()
            .module("UnityPlayer.dll", 0x1000, vec![0; 8])
            .module("UserAssembly.dll", 0x2000, vec![0; 8])
            .modules_hidden_for(3)
            .build();

        let shutdown = ShutdownSignal::new();
        let modules = wait_for_modules(
            &mock,
            &["userassembly.dll", "UnityPlayer.dll"],
            &FixedDelay::new(Duration::ZERO),
            &shutdown,
        )
        .unwrap();

        assert_eq!(modules[0].name, "UserAssembly.dll");
        assert_eq!(modules[1].name, "UnityPlayer.dll");
        assert_eq!(mock.enumerations(), 4);
    }

    #[test]
    fn test_wait_for_modules_gives_up() {
        let mock = MockMemoryBuilder::new()
            .module("UnityPlayer.dll", 0x1000, vec![0; 8])
            .build();

        let shutdown = ShutdownSignal::new();
        let result = wait_for_modules(
            &mock,
            &["UnityPlayer.dll", "UserAssembly.dll"],
            &FixedDelay::new(Duration::ZERO).with_max_attempts(2),
            &shutdown,
        );
        assert!(matches!(result, Err(Error::RetriesExhausted { .. })));
    }
}
