//! In-memory stand-in for a target process.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::memory::{ModuleDirectory, ModuleInfo, ProcessStatus, ReadMemory, WriteMemory};

/// One remote memory operation seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryOp {
    Read { address: u64, size: usize },
    Write { address: u64, bytes: Vec<u8> },
}

#[derive(Debug, Clone)]
enum ScriptedRead {
    Value(Vec<u8>),
    Fail,
}

#[derive(Debug, Default)]
struct MockState {
    regions: Vec<(u64, Vec<u8>)>,
    scripts: HashMap<u64, VecDeque<ScriptedRead>>,
    ops: Vec<MemoryOp>,
    successful_reads: usize,
}

impl MockState {
    fn region_mut(&mut self, address: u64, size: usize) -> Option<&mut [u8]> {
        self.regions.iter_mut().find_map(|(base, bytes)| {
            let start = address.checked_sub(*base)? as usize;
            bytes.get_mut(start..start.checked_add(size)?)
        })
    }
}

/// Scripted fake process recording every read and write.
///
/// Reads hit scripted values first (consumed in order), then the backing
/// regions. Writes update the backing regions so later reads observe them.
#[derive(Debug)]
pub struct MockMemory {
    state: Mutex<MockState>,
    modules: Vec<ModuleInfo>,
    hidden_enumerations: usize,
    enumerations: AtomicUsize,
    exit_after_reads: Option<usize>,
    alive: AtomicBool,
}

impl MockMemory {
    pub fn module_info(&self, name: &str) -> Option<ModuleInfo> {
        self.modules.iter().find(|m| m.name == name).cloned()
    }

    pub fn ops(&self) -> Vec<MemoryOp> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn writes(&self) -> Vec<(u64, Vec<u8>)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                MemoryOp::Write { address, bytes } => Some((address, bytes)),
                MemoryOp::Read { .. } => None,
            })
            .collect()
    }

    pub fn clear_ops(&self) {
        self.state.lock().unwrap().ops.clear();
    }

    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }

    /// Simulate the process exiting.
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Current backing value, bypassing scripts and the op log.
    pub fn peek_i32(&self, address: u64) -> Option<i32> {
        let mut state = self.state.lock().unwrap();
        let bytes = state.region_mut(address, 4)?;
        Some(i32::from_le_bytes(bytes.try_into().ok()?))
    }

    fn gone(&self, address: u64) -> Error {
        Error::MemoryReadFailed {
            address,
            message: "process has exited".to_string(),
        }
    }
}

impl ReadMemory for MockMemory {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(MemoryOp::Read { address, size });

        if !self.alive.load(Ordering::SeqCst) {
            return Err(self.gone(address));
        }
        if let Some(limit) = self.exit_after_reads
            && state.successful_reads >= limit
        {
            self.alive.store(false, Ordering::SeqCst);
            return Err(self.gone(address));
        }

        let scripted = state
            .scripts
            .get_mut(&address)
            .and_then(VecDeque::pop_front);
        let result = match scripted {
            Some(ScriptedRead::Value(bytes)) if bytes.len() == size => Ok(bytes),
            Some(ScriptedRead::Value(bytes)) => Err(Error::MemoryReadFailed {
                address,
                message: format!("scripted {} bytes, read {}", bytes.len(), size),
            }),
            Some(ScriptedRead::Fail) => Err(Error::MemoryReadFailed {
                address,
                message: "scripted failure".to_string(),
            }),
            None => state
                .region_mut(address, size)
                .map(|bytes| bytes.to_vec())
                .ok_or_else(|| Error::MemoryReadFailed {
                    address,
                    message: "unmapped".to_string(),
                }),
        };

        if result.is_ok() {
            state.successful_reads += 1;
        }
        result
    }
}

impl WriteMemory for MockMemory {
    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(MemoryOp::Write {
            address,
            bytes: bytes.to_vec(),
        });

        if !self.alive.load(Ordering::SeqCst) {
            return Err(Error::MemoryWriteFailed {
                address,
                message: "process has exited".to_string(),
            });
        }

        let target = state
            .region_mut(address, bytes.len())
            .ok_or_else(|| Error::MemoryWriteFailed {
                address,
                message: "unmapped".to_string(),
            })?;
        target.copy_from_slice(bytes);
        Ok(())
    }
}

impl ModuleDirectory for MockMemory {
    fn enumerate_modules(&self, filter: &dyn Fn(&str) -> bool) -> Result<Vec<ModuleInfo>> {
        let count = self.enumerations.fetch_add(1, Ordering::SeqCst);
        if count < self.hidden_enumerations {
            return Ok(Vec::new());
        }
        Ok(self
            .modules
            .iter()
            .filter(|m| filter(&m.name))
            .cloned()
            .collect())
    }
}

impl ProcessStatus for MockMemory {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Builder for [`MockMemory`].
#[derive(Debug, Default)]
pub struct MockMemoryBuilder {
    state: MockState,
    modules: Vec<ModuleInfo>,
    hidden_enumerations: usize,
    exit_after_reads: Option<usize>,
}

impl MockMemoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `bytes` at `base`.
    pub fn region(mut self, base: u64, bytes: Vec<u8>) -> Self {
        self.state.regions.push((base, bytes));
        self
    }

    /// Map `bytes` at `base` and list them as a loaded module.
    pub fn module(mut self, name: &str, base: u64, bytes: Vec<u8>) -> Self {
        self.modules.push(ModuleInfo {
            name: name.to_string(),
            base_address: base,
            size: bytes.len(),
        });
        self.region(base, bytes)
    }

    pub fn i32_at(self, address: u64, value: i32) -> Self {
        self.region(address, value.to_le_bytes().to_vec())
    }

    pub fn u8_at(self, address: u64, value: u8) -> Self {
        self.region(address, vec![value])
    }

    /// Successive 4-byte reads at `address` return `values` before falling
    /// back to the backing region.
    pub fn script_i32(mut self, address: u64, values: &[i32]) -> Self {
        let script = self.state.scripts.entry(address).or_default();
        script.extend(
            values
                .iter()
                .map(|v| ScriptedRead::Value(v.to_le_bytes().to_vec())),
        );
        self
    }

    /// Successive 8-byte reads at `address` return `values`.
    pub fn script_u64(mut self, address: u64, values: &[u64]) -> Self {
        let script = self.state.scripts.entry(address).or_default();
        script.extend(
            values
                .iter()
                .map(|v| ScriptedRead::Value(v.to_le_bytes().to_vec())),
        );
        self
    }

    /// The next `count` reads at `address` fail.
    pub fn failing_reads(mut self, address: u64, count: usize) -> Self {
        let script = self.state.scripts.entry(address).or_default();
        script.extend(std::iter::repeat_n(ScriptedRead::Fail, count));
        self
    }

    /// The first `count` module enumerations return nothing.
    pub fn modules_hidden_for(mut self, count: usize) -> Self {
        self.hidden_enumerations = count;
        self
    }

    /// The process exits once `count` reads have succeeded.
    pub fn exit_after_reads(mut self, count: usize) -> Self {
        self.exit_after_reads = Some(count);
        self
    }

    pub fn build(self) -> MockMemory {
        MockMemory {
            state: Mutex::new(self.state),
            modules: self.modules,
            hidden_enumerations: self.hidden_enumerations,
            enumerations: AtomicUsize::new(0),
            exit_after_reads: self.exit_after_reads,
            alive: AtomicBool::new(true),
        }
    }
}
