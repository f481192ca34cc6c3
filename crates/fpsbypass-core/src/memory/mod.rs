pub mod layout;
mod module;
mod process;
mod reader;

#[cfg(test)]
pub mod mock;

pub use module::{ModuleDirectory, ModuleInfo, ModuleSnapshot, wait_for_modules};
pub use process::*;
pub use reader::{ProcessStatus, ReadMemory, WriteMemory};

#[cfg(test)]
pub use mock::{MemoryOp, MockMemory, MockMemoryBuilder};
