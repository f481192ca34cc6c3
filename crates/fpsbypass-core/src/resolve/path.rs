use serde::{Deserialize, Serialize};
use strum::Display;

use crate::signature::Signature;

/// Which of the two code modules a path reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModuleRole {
    /// Managed-assembly code module
    Assembly,
    /// Native engine runtime module
    Runtime,
}

/// One instruction of a resolution path.
///
/// The resolver keeps a cursor that is either an offset inside a module
/// snapshot or a live address; each step moves that cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ResolveStep {
    /// RIP-relative operand: `cursor + instruction_len + disp`, where `disp`
    /// is read from the snapshot at `cursor + operand_offset`.
    Displacement {
        operand_offset: usize,
        instruction_len: usize,
        width: usize,
        signed: bool,
    },
    /// Follow `E8`/`E9` rel32 hops until a non-trampoline opcode.
    FollowTrampoline,
    /// Read a pointer from the live process.
    Dereference {
        width: usize,
        #[serde(default)]
        retry_until_nonzero: bool,
    },
    /// Turn a live address back into an offset within a module.
    Rebase { module: ModuleRole },
    /// Remember the current position in code.
    Mark,
    /// Add a field offset embedded in the code at the marked position.
    AddMarkedDisplacement {
        operand_offset: usize,
        width: usize,
        signed: bool,
    },
}

/// Anchor signature plus the steps leading from it to a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionPath {
    pub signature: Signature,
    pub module: ModuleRole,
    /// Offset where the anchor sat in a known build; checked before scanning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_offset: Option<usize>,
    pub steps: Vec<ResolveStep>,
}

impl ResolutionPath {
    pub fn new(signature: Signature, module: ModuleRole, steps: Vec<ResolveStep>) -> Self {
        Self {
            signature,
            module,
            estimated_offset: None,
            steps,
        }
    }

    pub fn with_estimated_offset(mut self, offset: usize) -> Self {
        self.estimated_offset = Some(offset);
        self
    }
}
