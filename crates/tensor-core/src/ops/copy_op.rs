// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Explicit dtype conversion (`_to_copy`).
//!
//! The output type is the caller's explicit request, so every pair of
//! types is accepted, narrowing included. Float to integer truncates toward
//! zero and saturates; integer narrowing wraps; any non-zero value becomes
//! `true`.

use super::dispatch::{apply_unary_elementwise, prepare_unary};
use crate::{switch_all_types, TensorError, TensorMut, TensorRef, TypeClass};

/// Copies `input` into `out`, converting every element to `out`'s dtype.
/// Non-contiguous inputs are gathered.
pub fn to_copy_out(input: &TensorRef<'_>, out: &mut TensorMut<'_>) -> Result<(), TensorError> {
    prepare_unary("_to_copy.out", input, out, TypeClass::All, TypeClass::All)?;
    switch_all_types!(out.dtype(), |T| {
        apply_unary_elementwise::<T, T, _>(input, out, Ok)
    })
}
