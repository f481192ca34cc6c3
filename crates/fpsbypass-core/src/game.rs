//! Game executables and process lookup.

use std::path::Path;

use crate::error::Result;
use crate::memory::find_process_id;
use crate::retry::{RetryStrategy, poll_until};
use crate::shutdown::ShutdownSignal;

/// Executable names of the global and CN clients.
pub const GAME_EXECUTABLES: [&str; 2] = ["GenshinImpact.exe", "YuanShen.exe"];

/// A running game process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningGame {
    pub pid: u32,
    pub executable: &'static str,
}

/// Whether `path` names one of the game executables.
pub fn is_game_executable(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| {
            GAME_EXECUTABLES
                .iter()
                .any(|exe| exe.eq_ignore_ascii_case(name))
        })
}

pub fn find_running_game() -> Result<Option<RunningGame>> {
    for executable in GAME_EXECUTABLES {
        if let Some(pid) = find_process_id(executable)? {
            return Ok(Some(RunningGame { pid, executable }));
        }
    }
    Ok(None)
}

/// Block until a game process appears.
pub fn wait_for_game(
    strategy: &dyn RetryStrategy,
    shutdown: &ShutdownSignal,
) -> Result<RunningGame> {
    poll_until("game process", strategy, shutdown, find_running_game)
}

/// Block until no game process is running.
pub fn wait_for_game_exit(strategy: &dyn RetryStrategy, shutdown: &ShutdownSignal) -> Result<()> {
    poll_until("game exit", strategy, shutdown, || {
        Ok(find_running_game()?.is_none().then_some(()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_game_executable() {
        assert!(is_game_executable(Path::new(
            "C:/Program Files/Genshin Impact/Genshin Impact Game/GenshinImpact.exe"
        )));
        assert!(is_game_executable(Path::new("D:/Games/yuanshen.exe")));
        assert!(!is_game_executable(Path::new("D:/Games/launcher.exe")));
        assert!(!is_game_executable(Path::new("D:/Games/")));
    }
}
