//! Handle to the target process.
//!
//! Only Windows is supported; on other platforms every constructor returns
//! [`Error::Unsupported`].

use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::memory::{ModuleDirectory, ModuleInfo, ProcessStatus};

/// An open handle with read, write and query access to a process.
///
/// The handle is closed on drop.
pub struct ProcessHandle {
    pub pid: u32,
    #[cfg(target_os = "windows")]
    handle: windows::Win32::Foundation::HANDLE,
}

// SAFETY: a process handle is a kernel object reference that may be used from
// any thread; the wrapper never hands out the raw value.
#[cfg(target_os = "windows")]
unsafe impl Send for ProcessHandle {}
#[cfg(target_os = "windows")]
unsafe impl Sync for ProcessHandle {}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle").field("pid", &self.pid).finish()
    }
}

/// Whether a process with this executable name is running.
pub fn is_running(name: &str) -> bool {
    matches!(find_process_id(name), Ok(Some(_)))
}

impl ProcessHandle {
    /// Start `path` with its own directory as the working directory and open it.
    pub fn launch(path: &Path) -> Result<Self> {
        imp::ensure_supported()?;
        if !path.exists() {
            return Err(Error::ProcessNotFound(format!(
                "executable not found at {}",
                path.display()
            )));
        }

        let mut command = std::process::Command::new(path);
        if let Some(dir) = path.parent() {
            command.current_dir(dir);
        }
        let child = command
            .spawn()
            .map_err(|e| Error::ProcessOpenFailed(format!("failed to launch game: {e}")))?;

        debug!("Launched {} (PID {})", path.display(), child.id());
        Self::open(child.id())
    }
}

#[cfg(target_os = "windows")]
mod imp {
    use std::ffi::c_void;
    use std::mem::size_of;
    use std::path::PathBuf;

    use tracing::{debug, warn};
    use windows::Win32::Foundation::{CloseHandle, FALSE, HANDLE, HMODULE, MAX_PATH, STILL_ACTIVE};
    use windows::Win32::System::Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory};
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW,
        TH32CS_SNAPPROCESS,
    };
    use windows::Win32::System::ProcessStatus::{
        EnumProcessModules, GetModuleBaseNameW, GetModuleInformation, MODULEINFO,
    };
    use windows::Win32::System::Threading::{
        GetExitCodeProcess, OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_INFORMATION,
        PROCESS_TERMINATE, PROCESS_VM_OPERATION, PROCESS_VM_READ, PROCESS_VM_WRITE,
        QueryFullProcessImageNameW, TerminateProcess,
    };
    use windows::core::PWSTR;

    use super::ProcessHandle;
    use crate::error::{Error, Result};
    use crate::memory::{ModuleInfo, ReadMemory, WriteMemory};

    const MAX_MODULES: usize = 1024;

    fn utf16_name(buffer: &[u16]) -> String {
        let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
        String::from_utf16_lossy(&buffer[..len])
    }

    pub fn ensure_supported() -> Result<()> {
        Ok(())
    }

    pub fn find_process_id(name: &str) -> Result<Option<u32>> {
        // SAFETY: plain snapshot creation; the handle is closed below.
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
            .map_err(|e| Error::ProcessNotFound(format!("process snapshot failed: {e}")))?;

        let mut entry = PROCESSENTRY32W {
            dwSize: size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        let mut found = None;
        // SAFETY: `entry` is a properly sized PROCESSENTRY32W.
        let mut more = unsafe { Process32FirstW(snapshot, &mut entry) }.is_ok();
        while more {
            if utf16_name(&entry.szExeFile).eq_ignore_ascii_case(name) {
                found = Some(entry.th32ProcessID);
                break;
            }
            // SAFETY: same snapshot and entry as above.
            more = unsafe { Process32NextW(snapshot, &mut entry) }.is_ok();
        }

        // SAFETY: snapshot was returned by CreateToolhelp32Snapshot.
        if let Err(e) = unsafe { CloseHandle(snapshot) } {
            warn!("Failed to close process snapshot: {}", e);
        }
        Ok(found)
    }

    impl ProcessHandle {
        pub fn open(pid: u32) -> Result<Self> {
            // SAFETY: OpenProcess has no memory-safety preconditions.
            let handle = unsafe {
                OpenProcess(
                    PROCESS_QUERY_INFORMATION
                        | PROCESS_VM_OPERATION
                        | PROCESS_VM_READ
                        | PROCESS_VM_WRITE
                        | PROCESS_TERMINATE,
                    FALSE,
                    pid,
                )
            }
            .map_err(|e| Error::ProcessOpenFailed(format!("PID {pid}: {e}")))?;

            debug!("Opened process {}", pid);
            Ok(Self { pid, handle })
        }

        pub fn executable_path(&self) -> Result<PathBuf> {
            let mut buffer = vec![0u16; MAX_PATH as usize * 4];
            let mut size = buffer.len() as u32;
            // SAFETY: `size` holds the buffer capacity in characters.
            unsafe {
                QueryFullProcessImageNameW(
                    self.handle,
                    PROCESS_NAME_WIN32,
                    PWSTR(buffer.as_mut_ptr()),
                    &mut size,
                )
            }
            .map_err(|e| Error::ProcessOpenFailed(format!("failed to query image name: {e}")))?;

            Ok(PathBuf::from(String::from_utf16_lossy(
                &buffer[..size as usize],
            )))
        }

        pub fn terminate(self) -> Result<()> {
            // SAFETY: handle was opened with PROCESS_TERMINATE.
            unsafe { TerminateProcess(self.handle, 0) }
                .map_err(|e| Error::ProcessOpenFailed(format!("failed to terminate: {e}")))
        }

        pub(super) fn alive(&self) -> bool {
            let mut code = 0u32;
            // SAFETY: `code` is a valid out pointer.
            match unsafe { GetExitCodeProcess(self.handle, &mut code) } {
                Ok(()) => code == STILL_ACTIVE.0 as u32,
                Err(_) => false,
            }
        }

        pub(super) fn close_handle(&mut self) {
            if self.handle.is_invalid() {
                return;
            }
            // SAFETY: handle came from OpenProcess and is closed once.
            if let Err(e) = unsafe { CloseHandle(self.handle) } {
                warn!("Failed to close process handle: {}", e);
            }
            self.handle = HANDLE::default();
        }

        pub(super) fn modules(&self, filter: &dyn Fn(&str) -> bool) -> Result<Vec<ModuleInfo>> {
            let mut modules = vec![HMODULE::default(); MAX_MODULES];
            let mut needed = 0u32;
            // SAFETY: the byte count matches the `modules` allocation.
            unsafe {
                EnumProcessModules(
                    self.handle,
                    modules.as_mut_ptr(),
                    (modules.len() * size_of::<HMODULE>()) as u32,
                    &mut needed,
                )
            }
            .map_err(|e| Error::ModuleNotFound(format!("failed to enumerate modules: {e}")))?;

            let count = (needed as usize / size_of::<HMODULE>()).min(MAX_MODULES);
            let mut result = Vec::new();
            for &module in &modules[..count] {
                let mut name = [0u16; MAX_PATH as usize];
                // SAFETY: writes at most `name.len()` characters.
                let len = unsafe { GetModuleBaseNameW(self.handle, module, &mut name) };
                if len == 0 {
                    continue;
                }
                let name = String::from_utf16_lossy(&name[..len as usize]);
                if !filter(&name) {
                    continue;
                }

                let mut info = MODULEINFO::default();
                // SAFETY: `info` is a properly sized MODULEINFO.
                if unsafe {
                    GetModuleInformation(
                        self.handle,
                        module,
                        &mut info,
                        size_of::<MODULEINFO>() as u32,
                    )
                }
                .is_err()
                {
                    continue;
                }

                result.push(ModuleInfo {
                    name,
                    base_address: info.lpBaseOfDll as u64,
                    size: info.SizeOfImage as usize,
                });
            }

            Ok(result)
        }
    }

    impl ReadMemory for ProcessHandle {
        fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
            let mut buffer = vec![0u8; size];
            let mut read = 0usize;
            // SAFETY: `buffer` has room for `size` bytes.
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
                    message: format!("short read: {} of {} bytes", read, size),
                });
            }
            Ok(buffer)
        }
    }

    impl WriteMemory for ProcessHandle {
        fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()> {
            let mut written = 0usize;
            // SAFETY: `bytes` is valid for `bytes.len()` bytes.
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
            })?;

            if written != bytes.len() {
                return Err(Error::MemoryWriteFailed {
                    address,
                    message: format!("short write: {} of {} bytes", written, bytes.len()),
                });
            }
            Ok(())
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod imp {
    use std::path::PathBuf;

    use super::ProcessHandle;
    use crate::error::{Error, Result};
    use crate::memory::{ModuleInfo, ReadMemory, WriteMemory};

    const UNSUPPORTED: &str = "process access is only implemented for Windows";

    pub fn ensure_supported() -> Result<()> {
        Err(Error::Unsupported(UNSUPPORTED))
    }

    pub fn find_process_id(_name: &str) -> Result<Option<u32>> {
        Err(Error::Unsupported(UNSUPPORTED))
    }

    impl ProcessHandle {
        pub fn open(_pid: u32) -> Result<Self> {
            Err(Error::Unsupported(UNSUPPORTED))
        }

        pub fn executable_path(&self) -> Result<PathBuf> {
            Err(Error::Unsupported(UNSUPPORTED))
        }

        pub fn terminate(self) -> Result<()> {
            Err(Error::Unsupported(UNSUPPORTED))
        }

        pub(super) fn alive(&self) -> bool {
            false
        }

        pub(super) fn close_handle(&mut self) {}

        pub(super) fn modules(&self, _filter: &dyn Fn(&str) -> bool) -> Result<Vec<ModuleInfo>> {
            Err(Error::Unsupported(UNSUPPORTED))
        }
    }

    impl ReadMemory for ProcessHandle {
        fn read_bytes(&self, _address: u64, _size: usize) -> Result<Vec<u8>> {
            Err(Error::Unsupported(UNSUPPORTED))
        }
    }

    impl WriteMemory for ProcessHandle {
        fn write_bytes(&self, _address: u64, _bytes: &[u8]) -> Result<()> {
            Err(Error::Unsupported(UNSUPPORTED))
        }
    }
}

pub use imp::find_process_id;

impl ProcessHandle {
    /// Close the handle now instead of on drop.
    pub fn close(mut self) {
        self.close_handle();
    }
}

impl ProcessStatus for ProcessHandle {
    fn is_alive(&self) -> bool {
        self.alive()
    }
}

impl ModuleDirectory for ProcessHandle {
    fn enumerate_modules(&self, filter: &dyn Fn(&str) -> bool) -> Result<Vec<ModuleInfo>> {
        self.modules(filter)
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.close_handle();
    }
}
