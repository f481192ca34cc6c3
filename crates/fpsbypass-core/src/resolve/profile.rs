use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::resolve::{ModuleRole, ResolutionPath, ResolveStep};
use crate::signature::Signature;

pub const PROFILE_VERSION: u32 = 1;

/// File names of the two code modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleNames {
    pub assembly: String,
    pub runtime: String,
}

impl Default for ModuleNames {
    fn default() -> Self {
        Self {
            assembly: "UserAssembly.dll".to_string(),
            runtime: "UnityPlayer.dll".to_string(),
        }
    }
}

/// Resolution paths for one family of game builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionProfile {
    pub version: u32,
    #[serde(default)]
    pub modules: ModuleNames,
    pub frame_rate: ResolutionPath,
    pub vsync: ResolutionPath,
}

pub fn load_profile<P: AsRef<Path>>(path: P) -> Result<ResolutionProfile> {
    let content = fs::read_to_string(&path)?;
    let profile: ResolutionProfile = serde_json::from_str(&content)?;
    if profile.version != PROFILE_VERSION {
        return Err(Error::Config(format!(
            "Unsupported profile version {} (expected {})",
            profile.version, PROFILE_VERSION
        )));
    }
    Ok(profile)
}

pub fn save_profile<P: AsRef<Path>>(path: P, profile: &ResolutionProfile) -> Result<()> {
    let content = serde_json::to_string_pretty(profile)?;
    fs::write(path, content)?;
    Ok(())
}

/// Profile for the current game layout.
///
/// Frame rate: `mov ecx, 60; call [rip+disp]` in the assembly module. The
/// called slot holds a pointer into the runtime module, which leads through
/// trampolines to `mov [rip+disp], ecx`.
///
/// Vsync: a call in the runtime module whose target loads a global object
/// pointer with `mov rax, [rip+disp]`; the flag lives at a field offset
/// encoded a few bytes later in the same function.
pub fn builtin_profile() -> Result<ResolutionProfile> {
    let frame_rate = ResolutionPath::new(
        "B9 3C 00 00 00 FF 15".parse::<Signature>()?,
        ModuleRole::Assembly,
        vec![
            ResolveStep::Displacement {
                operand_offset: 7,
                instruction_len: 11,
                width: 4,
                signed: true,
            },
            ResolveStep::Dereference {
                width: 8,
                retry_until_nonzero: true,
            },
            ResolveStep::Rebase {
                module: ModuleRole::Runtime,
            },
            ResolveStep::FollowTrampoline,
            ResolveStep::Displacement {
                operand_offset: 2,
                instruction_len: 6,
                width: 4,
                signed: true,
            },
        ],
    );

    let vsync = ResolutionPath::new(
        "E8 ?? ?? ?? ?? 8B E8 49 8B 1E".parse::<Signature>()?,
        ModuleRole::Runtime,
        vec![
            ResolveStep::Displacement {
                operand_offset: 1,
                instruction_len: 5,
                width: 4,
                signed: true,
            },
            ResolveStep::Mark,
            ResolveStep::Displacement {
                operand_offset: 3,
                instruction_len: 7,
                width: 4,
                signed: false,
            },
            ResolveStep::Dereference {
                width: 8,
                retry_until_nonzero: true,
            },
            ResolveStep::AddMarkedDisplacement {
                operand_offset: 9,
                width: 4,
                signed: false,
            },
        ],
    );

    Ok(ResolutionProfile {
        version: PROFILE_VERSION,
        modules: ModuleNames::default(),
        frame_rate,
        vsync,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builtin_profile_anchors() {
        let profile = builtin_profile().unwrap();
        assert_eq!(profile.frame_rate.module, ModuleRole::Assembly);
        assert_eq!(profile.vsync.module, ModuleRole::Runtime);
        assert_eq!(profile.frame_rate.signature.to_string(), "B9 3C 00 00 00 FF 15");
        assert_eq!(profile.vsync.signature.to_string(), "E8 ?? ?? ?? ?? 8B E8 49 8B 1E");
        assert_eq!(profile.modules.runtime, "UnityPlayer.dll");
    }

    #[test]
    fn test_profile_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.json");
        let profile = builtin_profile().unwrap();

        save_profile(&path, &profile).unwrap();
        let loaded = load_profile(&path).unwrap();
        assert_eq!(loaded, profile);
    }

    #[test]
    fn test_load_profile_rejects_unknown_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.json");
        let mut profile = builtin_profile().unwrap();
        profile.version = 7;
        save_profile(&path, &profile).unwrap();

        assert!(matches!(load_profile(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_profile_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_profile(dir.path().join("nope.json")).unwrap_err();
        assert!(err.is_not_found());
    }
}
