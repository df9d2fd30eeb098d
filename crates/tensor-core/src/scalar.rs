// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Dynamically typed scalar values passed as non-tensor operator arguments.

use crate::ScalarType;
use std::fmt;

/// A scalar operand: a boolean, a 64-bit integer, or a double.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Double(f64),
}

impl Scalar {
    /// Returns the element type this scalar naturally maps to.
    pub fn scalar_type(self) -> ScalarType {
        match self {
            Scalar::Bool(_) => ScalarType::Bool,
            Scalar::Int(_) => ScalarType::I64,
            Scalar::Double(_) => ScalarType::F64,
        }
    }

    pub fn is_integral(self) -> bool {
        matches!(self, Scalar::Bool(_) | Scalar::Int(_))
    }

    /// Returns `true` for `false`, `0` and `±0.0`.
    pub fn is_zero(self) -> bool {
        match self {
            Scalar::Bool(b) => !b,
            Scalar::Int(v) => v == 0,
            Scalar::Double(v) => v == 0.0,
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Scalar::Bool(b) => f64::from(u8::from(b)),
            Scalar::Int(v) => v as f64,
            Scalar::Double(v) => v,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Double(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Double(v)
    }
}

/// Computation type for a tensor operand combined with a scalar operand.
///
/// The scalar only lifts the tensor's category, never its width: an integer
/// scalar keeps an `I8` tensor at `I8`, and a double scalar moves integral
/// tensors to [`ScalarType::DEFAULT_FLOAT`].
pub fn promote_with_scalar(tensor_type: ScalarType, scalar: Scalar) -> ScalarType {
    match scalar {
        Scalar::Bool(_) => tensor_type,
        Scalar::Int(_) => {
            if tensor_type == ScalarType::Bool {
                ScalarType::I64
            } else {
                tensor_type
            }
        }
        Scalar::Double(_) => {
            if tensor_type.is_floating() {
                tensor_type
            } else {
                ScalarType::DEFAULT_FLOAT
            }
        }
    }
}
