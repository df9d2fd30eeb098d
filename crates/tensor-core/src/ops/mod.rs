// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Portable element-wise kernels.
//!
//! Every kernel writes into a caller-provided [`TensorMut`](crate::TensorMut)
//! and never allocates tensor storage. Outputs are resized only when their
//! descriptor is `DynamicBound` and the new shape fits the storage.

mod arith_op;
mod compare_op;
mod copy_op;
pub mod dispatch;
mod fmod_op;
mod gelu_op;
mod unary_op;

pub use arith_op::{add_out, div_out, floor_divide_out, maximum_out, minimum_out, mul_out, sub_out};
pub use compare_op::{eq_out, gt_out, lt_out};
pub use copy_op::to_copy_out;
pub use fmod_op::{fmod_scalar_out, fmod_tensor_out, remainder_tensor_out};
pub use gelu_op::gelu_out;
pub use unary_op::{abs_out, exp_out, neg_out, relu_out, sqrt_out};
