// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor descriptors and kernels.

use crate::{ScalarType, Shape};

/// Errors that can occur while building tensor views or running a kernel.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TensorError {
    /// The provided buffer is too small for the shape, strides and dtype.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Operand shapes cannot be broadcast together.
    #[error("shapes {shapes:?} are not broadcastable")]
    NotBroadcastable { shapes: Vec<Shape> },

    /// Two tensors have incompatible shapes for the requested operation.
    #[error("incompatible shapes for {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// A fixed-size output was asked to change shape.
    #[error("cannot resize fixed output from {from} to {to}")]
    IllegalResize { from: Shape, to: Shape },

    /// A resizable output was asked to grow past its storage.
    #[error("resize to {to} needs {required} bytes but capacity is {capacity}")]
    ResizeExceedsCapacity {
        to: Shape,
        required: usize,
        capacity: usize,
    },

    /// The storage footprint of a shape does not fit in the address space.
    #[error("{shape} of {dtype} overflows the addressable size")]
    SizeOverflow { shape: Shape, dtype: ScalarType },

    /// Explicit strides do not have one entry per dimension.
    #[error("strides rank {strides} does not match shape rank {shape}")]
    RankMismatch { shape: usize, strides: usize },

    /// Kernels only write contiguous outputs.
    #[error("{op} requires a contiguous output")]
    NonContiguousOutput { op: &'static str },

    /// The element type is not in the set the operation supports.
    #[error("unsupported dtype {dtype} for operation {op}")]
    UnsupportedDType { op: &'static str, dtype: ScalarType },

    /// The common computation type cannot be written to the output type.
    #[error("{op}: cannot cast computation type {from} to output type {to}")]
    UnsupportedCast {
        op: &'static str,
        from: ScalarType,
        to: ScalarType,
    },

    /// A typed accessor was used on a tensor of another dtype.
    #[error("dtype mismatch: expected {expected}, got {actual}")]
    DTypeMismatch {
        expected: ScalarType,
        actual: ScalarType,
    },

    /// Integral division or modulo by zero.
    #[error("{op}: integer division by zero")]
    DivisionByZero { op: &'static str },

    /// An operator received the wrong number or kind of arguments.
    #[error("invalid argument for {op}: {detail}")]
    InvalidArgument { op: &'static str, detail: String },
}

/// Coarse classification of a [`TensorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorErrorKind {
    /// Unsupported promotion or uncastable output type.
    Type,
    /// Numeric domain violation, such as an integral zero divisor.
    Domain,
    /// Non-broadcastable operands, illegal resize or inconsistent geometry.
    Shape,
    /// Malformed operator invocation.
    Argument,
}

impl TensorError {
    pub fn kind(&self) -> TensorErrorKind {
        match self {
            TensorError::UnsupportedDType { .. }
            | TensorError::UnsupportedCast { .. }
            | TensorError::DTypeMismatch { .. } => TensorErrorKind::Type,
            TensorError::DivisionByZero { .. } => TensorErrorKind::Domain,
            TensorError::BufferSizeMismatch { .. }
            | TensorError::NotBroadcastable { .. }
            | TensorError::ShapeMismatch { .. }
            | TensorError::IllegalResize { .. }
            | TensorError::ResizeExceedsCapacity { .. }
            | TensorError::SizeOverflow { .. }
            | TensorError::RankMismatch { .. }
            | TensorError::NonContiguousOutput { .. } => TensorErrorKind::Shape,
            TensorError::InvalidArgument { .. } => TensorErrorKind::Argument,
        }
    }
}
