// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Memory budget configuration and parsing.
//!
//! A [`MemoryBudget`] caps the total arena bytes a runtime may hold at once
//! across all of its execution contexts. It is written in configuration files
//! as a human-readable string.

use crate::MemoryError;
use std::fmt;
use std::str::FromStr;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;
const GIB: usize = 1024 * MIB;

/// Recognised suffixes, longest first so `"MB"` wins over `"B"`.
const SUFFIXES: [(&str, usize); 7] = [
    ("GB", GIB),
    ("MB", MIB),
    ("KB", KIB),
    ("G", GIB),
    ("M", MIB),
    ("K", KIB),
    ("B", 1),
];

/// A hard ceiling on live arena bytes.
///
/// # Parsing
/// - `"512K"` / `"512KB"` → 512 × 1024 bytes
/// - `"64M"` / `"64MB"` → 64 × 1024² bytes
/// - `"1G"` / `"1GB"` → 1024³ bytes
/// - `"4096"` → raw byte count
///
/// Serialises as its [`Display`](fmt::Display) form, which parses back to the
/// same value.
///
/// # Examples
/// ```
/// use memory_manager::MemoryBudget;
///
/// let b: MemoryBudget = "64M".parse().unwrap();
/// assert_eq!(b.as_bytes(), 64 * 1024 * 1024);
/// assert_eq!(b.to_string(), "64 MB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemoryBudget {
    bytes: usize,
}

impl MemoryBudget {
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    pub fn from_kb(kb: usize) -> Self {
        Self { bytes: kb * KIB }
    }

    pub fn from_mb(mb: usize) -> Self {
        Self { bytes: mb * MIB }
    }

    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Parses a human-readable budget string. Case-insensitive; whitespace
    /// between the number and the suffix is allowed.
    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        let (digits, multiplier) = SUFFIXES
            .iter()
            .find(|(suffix, _)| upper.ends_with(suffix))
            .map(|&(suffix, mult)| (&trimmed[..trimmed.len() - suffix.len()], mult))
            .unwrap_or((trimmed, 1));

        let invalid = || MemoryError::InvalidBudget(s.to_string());
        let value: usize = digits.trim().parse().map_err(|_| invalid())?;
        let bytes = value.checked_mul(multiplier).ok_or_else(invalid)?;
        if bytes == 0 {
            return Err(invalid());
        }
        Ok(Self { bytes })
    }
}

impl Default for MemoryBudget {
    fn default() -> Self {
        Self::from_mb(64)
    }
}

impl FromStr for MemoryBudget {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MemoryBudget {
    type Error = MemoryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<MemoryBudget> for String {
    fn from(b: MemoryBudget) -> Self {
        b.to_string()
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (unit, scale) = [("GB", GIB), ("MB", MIB), ("KB", KIB)]
            .into_iter()
            .find(|&(_, scale)| self.bytes >= scale && self.bytes % scale == 0)
            .unwrap_or(("B", 1));
        write!(f, "{} {unit}", self.bytes / scale)
    }
}
