//! Wildcard byte signatures.
//!
//! A signature is written the way it appears in a disassembler, one hex byte
//! per token with `??` (or `?`) for bytes that vary between builds:
//!
//! ```text
//! E8 ?? ?? ?? ?? 8B E8 49 8B 1E
//! ```

mod matcher;

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use matcher::CompiledMatcher;

/// Immutable byte pattern where `None` marks a wildcard.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature {
    pattern: Vec<Option<u8>>,
    #[serde(skip)]
    matcher: OnceLock<CompiledMatcher>,
}

impl Signature {
    pub fn new(pattern: Vec<Option<u8>>) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::InvalidPattern(
                "Signature pattern is empty".to_string(),
            ));
        }

        Ok(Self {
            pattern,
            matcher: OnceLock::new(),
        })
    }

    pub fn bytes(&self) -> &[Option<u8>] {
        &self.pattern
    }

    pub fn len(&self) -> usize {
        self.pattern.len()
    }

    /// Always false; construction rejects empty patterns.
    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    /// Compile the signature into a scanner.
    ///
    /// The matcher is built on first use and cached for the lifetime of this
    /// signature.
    pub fn compile(&self) -> &CompiledMatcher {
        self.matcher
            .get_or_init(|| CompiledMatcher::new(&self.pattern))
    }

    /// Lowest offset in `buffer` where the signature matches.
    pub fn scan(&self, buffer: &[u8]) -> Option<usize> {
        self.compile().scan(buffer)
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for Signature {}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(\"{}\")", self)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_pattern(&self.pattern))
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Signature::new(parse_pattern(s)?)
    }
}

impl TryFrom<String> for Signature {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Signature> for String {
    fn from(signature: Signature) -> Self {
        signature.to_string()
    }
}

/// Check a candidate slice against a signature without scanning.
///
/// Used to check a remembered offset before paying for a full scan. The slice
/// must be exactly as long as the signature.
pub fn exact_match(buffer: &[u8], signature: &Signature) -> bool {
    buffer.len() == signature.len() && signature.compile().matches_at(buffer, 0)
}

pub fn parse_pattern(pattern: &str) -> Result<Vec<Option<u8>>> {
    let mut bytes = Vec::new();
    for token in pattern.split_whitespace() {
        if token == "??" || token == "?" {
            bytes.push(None);
            continue;
        }

        let value = u8::from_str_radix(token, 16).map_err(|e| {
            Error::InvalidPattern(format!("Invalid signature token '{}': {}", token, e))
        })?;
        bytes.push(Some(value));
    }

    if bytes.is_empty() {
        return Err(Error::InvalidPattern(
            "Signature pattern is empty".to_string(),
        ));
    }

    Ok(bytes)
}

pub fn format_pattern(bytes: &[Option<u8>]) -> String {
    bytes
        .iter()
        .map(|b| match b {
            Some(value) => format!("{:02X}", value),
            None => "??".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
