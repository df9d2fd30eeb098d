// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Element types, tensor descriptors and portable kernels for the edge
//! executor.
//!
//! This crate provides:
//! - [`ScalarType`], the closed set of element types, with the promotion
//!   lattice ([`promote_types`]) and castability rule ([`can_cast`]).
//! - [`TensorDescriptor`], a shape/strides/dtype record, and the borrowed
//!   views [`TensorRef`] and [`TensorMut`] over externally owned bytes.
//! - [`broadcast_shapes`] and [`BroadcastCursor`] for strided broadcasting
//!   without materialised copies.
//! - [`ops`], the element-wise kernels the executor dispatches to.
//!
//! # Design Goals
//! - Views never own storage; planned buffers belong to the executor.
//! - Type dispatch is resolved once per kernel call, not per element.
//! - Clean error types via `thiserror`.

mod broadcast;
pub mod element;
mod error;
pub mod ops;
mod scalar;
mod scalar_type;
mod shape;
mod tensor;

pub use broadcast::{broadcast_shapes, broadcast_strides, BroadcastCursor};
pub use element::{Element, FloatElement, RealElement};
pub use error::{TensorError, TensorErrorKind};
pub use half::f16;
pub use scalar::{promote_with_scalar, Scalar};
pub use scalar_type::{can_cast, promote_types, ScalarType, TypeClass, ALL_SCALAR_TYPES};
pub use shape::{contiguous_strides, Shape};
pub use tensor::{ShapeDynamism, Tensor, TensorDescriptor, TensorMut, TensorRef};
