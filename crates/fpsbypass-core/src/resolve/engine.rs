//! Step interpreter that turns anchors into live variable addresses.

use std::fmt;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::memory::layout::x86;
use crate::memory::{ModuleInfo, ModuleSnapshot, ReadMemory};
use crate::resolve::{
    AnchorEstimates, Discovery, ModuleRole, ResolutionPath, ResolutionProfile, ResolveStep,
};
use crate::retry::{RetryStrategy, poll_until};
use crate::shutdown::ShutdownSignal;
use crate::signature::exact_match;
use crate::variable::{ResolvedAddresses, TrackedVariable, VariableKind, decode_le};

/// Snapshots of both code modules, taken once per session.
#[derive(Debug, Clone)]
pub struct ModuleSnapshots {
    pub assembly: ModuleSnapshot,
    pub runtime: ModuleSnapshot,
}

impl ModuleSnapshots {
    pub fn new(assembly: ModuleSnapshot, runtime: ModuleSnapshot) -> Self {
        Self { assembly, runtime }
    }

    pub fn capture<R: ReadMemory + ?Sized>(
        reader: &R,
        assembly: &ModuleInfo,
        runtime: &ModuleInfo,
    ) -> Result<Self> {
        Ok(Self {
            assembly: ModuleSnapshot::capture(reader, assembly)?,
            runtime: ModuleSnapshot::capture(reader, runtime)?,
        })
    }

    pub fn get(&self, role: ModuleRole) -> &ModuleSnapshot {
        match role {
            ModuleRole::Assembly => &self.assembly,
            ModuleRole::Runtime => &self.runtime,
        }
    }
}

/// Where an anchor signature was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub offset: usize,
    /// Found at the remembered offset without scanning.
    pub estimated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Relative { module: ModuleRole, offset: usize },
    Absolute(u64),
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Relative { module, offset } => write!(f, "{}+{:#x}", module, offset),
            Cursor::Absolute(address) => write!(f, "{:#x}", address),
        }
    }
}

pub struct PointerResolver<'a, M: ReadMemory + ?Sized> {
    memory: &'a M,
    modules: &'a ModuleSnapshots,
    retry: &'a dyn RetryStrategy,
    shutdown: &'a ShutdownSignal,
}

impl<'a, M: ReadMemory + ?Sized> PointerResolver<'a, M> {
    pub fn new(
        memory: &'a M,
        modules: &'a ModuleSnapshots,
        retry: &'a dyn RetryStrategy,
        shutdown: &'a ShutdownSignal,
    ) -> Self {
        Self {
            memory,
            modules,
            retry,
            shutdown,
        }
    }

    /// Find the anchor of `path`, trying the remembered offset first.
    pub fn locate_anchor(&self, kind: VariableKind, path: &ResolutionPath) -> Result<Anchor> {
        let snapshot = self.modules.get(path.module);

        if let Some(estimate) = path.estimated_offset
            && let Some(window) = snapshot.slice(estimate, path.signature.len())
            && exact_match(window, &path.signature)
        {
            debug!("{} anchor at estimated offset {:#x}", kind, estimate);
            return Ok(Anchor {
                offset: estimate,
                estimated: true,
            });
        }

        match path.signature.scan(snapshot.bytes()) {
            Some(offset) => {
                debug!("{} anchor found by scan at {}+{:#x}", kind, path.module, offset);
                Ok(Anchor {
                    offset,
                    estimated: false,
                })
            }
            None => Err(Error::SignatureNotFound {
                name: kind.to_string(),
                pattern: path.signature.to_string(),
            }),
        }
    }

    pub fn resolve(&self, kind: VariableKind, path: &ResolutionPath) -> Result<TrackedVariable> {
        let anchor = self.locate_anchor(kind, path)?;
        self.resolve_from(kind, path, anchor)
    }

    /// Walk the steps of `path` starting at an anchor that was already located.
    pub fn resolve_from(
        &self,
        kind: VariableKind,
        path: &ResolutionPath,
        anchor: Anchor,
    ) -> Result<TrackedVariable> {
        let mut cursor = Cursor::Relative {
            module: path.module,
            offset: anchor.offset,
        };
        let mut mark = None;

        for (index, step) in path.steps.iter().enumerate() {
            cursor = self.apply(kind, step, cursor, &mut mark)?;
            debug!("{} step {} ({:?}) -> {}", kind, index, step, cursor);
        }

        let address = self.address_of(cursor);
        info!("Resolved {} at {:#x}", kind, address);
        Ok(TrackedVariable::new(kind, address))
    }

    /// Resolve both variables; any failure discards the other.
    pub fn resolve_all(&self, profile: &ResolutionProfile) -> Result<Discovery> {
        let frame_rate_anchor = self.locate_anchor(VariableKind::FrameRate, &profile.frame_rate)?;
        let frame_rate =
            self.resolve_from(VariableKind::FrameRate, &profile.frame_rate, frame_rate_anchor)?;
        let vsync_anchor = self.locate_anchor(VariableKind::VSync, &profile.vsync)?;
        let vsync = self.resolve_from(VariableKind::VSync, &profile.vsync, vsync_anchor)?;

        Ok(Discovery {
            addresses: ResolvedAddresses { frame_rate, vsync },
            frame_rate_anchor,
            vsync_anchor,
            estimates: AnchorEstimates::new(
                self.modules,
                frame_rate_anchor.offset,
                vsync_anchor.offset,
            ),
        })
    }

    fn apply(
        &self,
        kind: VariableKind,
        step: &ResolveStep,
        cursor: Cursor,
        mark: &mut Option<(ModuleRole, usize)>,
    ) -> Result<Cursor> {
        match *step {
            ResolveStep::Displacement {
                operand_offset,
                instruction_len,
                width,
                signed,
            } => {
                let (module, offset) = relative(kind, cursor, "displacement")?;
                let disp = self.read_code(kind, module, offset, operand_offset, width, signed)?;
                let offset = advance(kind, offset, instruction_len as i64 + disp)?;
                Ok(Cursor::Relative { module, offset })
            }
            ResolveStep::FollowTrampoline => {
                let (module, offset) = relative(kind, cursor, "trampoline")?;
                let offset = self.follow_trampolines(kind, module, offset)?;
                Ok(Cursor::Relative { module, offset })
            }
            ResolveStep::Dereference {
                width,
                retry_until_nonzero,
            } => {
                let address = self.address_of(cursor);
                let value = self.dereference(kind, address, width, retry_until_nonzero)?;
                Ok(Cursor::Absolute(value))
            }
            ResolveStep::Rebase { module } => {
                let address = self.address_of(cursor);
                let offset = self.modules.get(module).offset_of(address).map_err(|_| {
                    Error::resolution(
                        kind.to_string(),
                        format!("pointer {:#x} is outside the {} module", address, module),
                    )
                })?;
                Ok(Cursor::Relative { module, offset })
            }
            ResolveStep::Mark => {
                *mark = Some(relative(kind, cursor, "mark")?);
                Ok(cursor)
            }
            ResolveStep::AddMarkedDisplacement {
                operand_offset,
                width,
                signed,
            } => {
                let (marked_module, marked_offset) = mark.ok_or_else(|| {
                    Error::resolution(kind.to_string(), "no marked position to read from")
                })?;
                let disp = self.read_code(
                    kind,
                    marked_module,
                    marked_offset,
                    operand_offset,
                    width,
                    signed,
                )?;
                match cursor {
                    Cursor::Relative { module, offset } => Ok(Cursor::Relative {
                        module,
                        offset: advance(kind, offset, disp)?,
                    }),
                    Cursor::Absolute(address) => address
                        .checked_add_signed(disp)
                        .map(Cursor::Absolute)
                        .ok_or_else(|| {
                            Error::resolution(
                                kind.to_string(),
                                format!("{:#x} + {:#x} overflows", address, disp),
                            )
                        }),
                }
            }
        }
    }

    fn follow_trampolines(
        &self,
        kind: VariableKind,
        module: ModuleRole,
        mut offset: usize,
    ) -> Result<usize> {
        let mut hops = 0;
        loop {
            let opcode = self.read_code(kind, module, offset, 0, 1, false)? as u8;
            if !x86::is_trampoline(opcode) {
                return Ok(offset);
            }
            if hops == x86::MAX_TRAMPOLINE_HOPS {
                return Err(Error::resolution(
                    kind.to_string(),
                    format!(
                        "more than {} trampolines from {}+{:#x}",
                        x86::MAX_TRAMPOLINE_HOPS,
                        module,
                        offset
                    ),
                ));
            }
            let rel = self.read_code(kind, module, offset, 1, 4, true)?;
            offset = advance(kind, offset, x86::REL32_INSTRUCTION_LEN + rel)?;
            hops += 1;
        }
    }

    fn dereference(
        &self,
        kind: VariableKind,
        address: u64,
        width: usize,
        retry_until_nonzero: bool,
    ) -> Result<u64> {
        check_width(kind, width)?;

        let mut pending = false;
        let what = format!("{} pointer at {:#x}", kind, address);
        let result = poll_until(&what, self.retry, self.shutdown, || {
            pending = false;
            let bytes = self.memory.read_bytes(address, width)?;
            let value = decode_le(&bytes, false) as u64;
            if value == 0 && retry_until_nonzero {
                pending = true;
                debug!("{} is still null", what);
                return Ok(None);
            }
            Ok(Some(value))
        });

        match result {
            Err(Error::RetriesExhausted { .. }) if pending => {
                Err(Error::PendingInitialization { address })
            }
            other => other,
        }
    }

    fn read_code(
        &self,
        kind: VariableKind,
        module: ModuleRole,
        offset: usize,
        operand_offset: usize,
        width: usize,
        signed: bool,
    ) -> Result<i64> {
        check_width(kind, width)?;
        offset
            .checked_add(operand_offset)
            .and_then(|start| self.modules.get(module).slice(start, width))
            .map(|bytes| decode_le(bytes, signed))
            .ok_or_else(|| {
                Error::resolution(
                    kind.to_string(),
                    format!(
                        "code read at {}+{:#x}+{} is outside the module",
                        module, offset, operand_offset
                    ),
                )
            })
    }

    fn address_of(&self, cursor: Cursor) -> u64 {
        match cursor {
            Cursor::Relative { module, offset } => {
                self.modules.get(module).base_address() + offset as u64
            }
            Cursor::Absolute(address) => address,
        }
    }
}

fn relative(kind: VariableKind, cursor: Cursor, step: &str) -> Result<(ModuleRole, usize)> {
    match cursor {
        Cursor::Relative { module, offset } => Ok((module, offset)),
        Cursor::Absolute(address) => Err(Error::resolution(
            kind.to_string(),
            format!("{} step needs a module position, got {:#x}", step, address),
        )),
    }
}

fn advance(kind: VariableKind, offset: usize, delta: i64) -> Result<usize> {
    (offset as i64)
        .checked_add(delta)
        .and_then(|next| usize::try_from(next).ok())
        .ok_or_else(|| {
            Error::resolution(
                kind.to_string(),
                format!("offset {:#x} moved by {} leaves the module", offset, delta),
            )
        })
}

fn check_width(kind: VariableKind, width: usize) -> Result<()> {
    match width {
        1 | 2 | 4 | 8 => Ok(()),
        _ => Err(Error::resolution(
            kind.to_string(),
            format!("unsupported operand width {}", width),
        )),
    }
}
