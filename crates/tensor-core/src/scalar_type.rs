// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element types and the promotion lattice between them.
//!
//! The lattice is ordered `Bool < integers < floats`. Within a category the
//! wider type wins; mixing the only unsigned type (`U8`) with `I8` widens to
//! `I16` so that neither operand loses range.
//!
//! ```text
//!   Bool
//!    │
//!   U8   I8
//!    └─┬─┘
//!     I16 ─ I32 ─ I64
//!                  │
//!          F16 ─ F32 ─ F64
//! ```

use std::fmt;
use std::str::FromStr;

/// Enumerates the element kinds a tensor can hold.
///
/// Declaration order follows the promotion lattice, so the derived `Ord`
/// picks the wider type within one category.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    /// Boolean stored as one byte (`0` or `1`).
    Bool,
    /// 8-bit unsigned integer.
    U8,
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 16-bit IEEE 754 floating point.
    F16,
    /// 32-bit IEEE 754 floating point.
    F32,
    /// 64-bit IEEE 754 floating point.
    F64,
}

/// Every supported element type, in lattice order.
pub const ALL_SCALAR_TYPES: [ScalarType; 9] = [
    ScalarType::Bool,
    ScalarType::U8,
    ScalarType::I8,
    ScalarType::I16,
    ScalarType::I32,
    ScalarType::I64,
    ScalarType::F16,
    ScalarType::F32,
    ScalarType::F64,
];

impl ScalarType {
    /// Type used when an integral computation has to produce a float.
    pub const DEFAULT_FLOAT: ScalarType = ScalarType::F32;

    /// Returns the size of a single element in bytes.
    pub fn element_size(self) -> usize {
        match self {
            ScalarType::Bool | ScalarType::U8 | ScalarType::I8 => 1,
            ScalarType::I16 | ScalarType::F16 => 2,
            ScalarType::I32 | ScalarType::F32 => 4,
            ScalarType::I64 | ScalarType::F64 => 8,
        }
    }

    /// Returns a human-readable label for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::U8 => "u8",
            ScalarType::I8 => "i8",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::F16 => "f16",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        }
    }

    /// Returns `true` for integer types, and for `Bool` when `include_bool` is set.
    pub fn is_integral(self, include_bool: bool) -> bool {
        match self {
            ScalarType::Bool => include_bool,
            ScalarType::U8
            | ScalarType::I8
            | ScalarType::I16
            | ScalarType::I32
            | ScalarType::I64 => true,
            ScalarType::F16 | ScalarType::F32 | ScalarType::F64 => false,
        }
    }

    pub fn is_floating(self) -> bool {
        matches!(self, ScalarType::F16 | ScalarType::F32 | ScalarType::F64)
    }

    pub fn is_signed(self) -> bool {
        !matches!(self, ScalarType::Bool | ScalarType::U8)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_SCALAR_TYPES
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown scalar type '{s}'"))
    }
}

/// Returns the common computation type for two operand types.
///
/// Total, pure, commutative and associative over [`ALL_SCALAR_TYPES`].
///
/// # Examples
/// ```
/// use tensor_core::{promote_types, ScalarType};
/// assert_eq!(promote_types(ScalarType::Bool, ScalarType::I32), ScalarType::I32);
/// assert_eq!(promote_types(ScalarType::U8, ScalarType::I8), ScalarType::I16);
/// assert_eq!(promote_types(ScalarType::I64, ScalarType::F16), ScalarType::F16);
/// ```
pub fn promote_types(a: ScalarType, b: ScalarType) -> ScalarType {
    if a == b {
        return a;
    }
    match (a, b) {
        (ScalarType::Bool, other) | (other, ScalarType::Bool) => other,
        _ if a.is_floating() && b.is_floating() => a.max(b),
        _ if a.is_floating() => a,
        _ if b.is_floating() => b,
        _ => promote_integral(a, b),
    }
}

fn promote_integral(a: ScalarType, b: ScalarType) -> ScalarType {
    if a.is_signed() == b.is_signed() {
        return a.max(b);
    }
    let (signed, unsigned) = if a.is_signed() { (a, b) } else { (b, a) };
    if signed.element_size() > unsigned.element_size() {
        signed
    } else {
        ScalarType::I16
    }
}

/// Returns `true` if a value of type `from` may be written into `to`.
///
/// Floating values never narrow into integers and only booleans may be
/// stored into a boolean slot. Everything else is allowed.
pub fn can_cast(from: ScalarType, to: ScalarType) -> bool {
    if from.is_floating() && to.is_integral(false) {
        return false;
    }
    if from != ScalarType::Bool && to == ScalarType::Bool {
        return false;
    }
    true
}

/// A statically enumerated set of element types an operator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    /// Non-boolean numeric types with native arithmetic (`F16` excluded).
    Real,
    /// [`TypeClass::Real`] plus `Bool`.
    RealAndBool,
    /// `F32` and `F64`.
    Float,
    /// Every supported type.
    All,
}

impl TypeClass {
    pub fn contains(self, ty: ScalarType) -> bool {
        match self {
            TypeClass::Real => !matches!(ty, ScalarType::Bool | ScalarType::F16),
            TypeClass::RealAndBool => ty != ScalarType::F16,
            TypeClass::Float => matches!(ty, ScalarType::F32 | ScalarType::F64),
            TypeClass::All => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TypeClass::Real => "real",
            TypeClass::RealAndBool => "real+bool",
            TypeClass::Float => "float",
            TypeClass::All => "all",
        }
    }
}
