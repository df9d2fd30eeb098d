// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element-wise comparisons producing boolean results.
//!
//! Operands are compared in their promoted common type; the boolean result
//! is then written to the output type, so a numeric output receives `0`/`1`.
//! Any comparison involving NaN is false.

use std::cmp::Ordering;

use super::dispatch::{apply_binary_elementwise, prepare_comparison};
use crate::{switch_real_and_bool_types, TensorError, TensorMut, TensorRef, TypeClass};

fn compare_out(
    op: &'static str,
    a: &TensorRef<'_>,
    b: &TensorRef<'_>,
    out: &mut TensorMut<'_>,
    accept: fn(Option<Ordering>) -> bool,
) -> Result<(), TensorError> {
    let common = prepare_comparison(op, a, b, out, TypeClass::RealAndBool, TypeClass::RealAndBool)?;
    switch_real_and_bool_types!(common, op, |C| {
        apply_binary_elementwise::<C, bool, _>(a, b, out, |x, y| Ok(accept(x.partial_cmp(&y))))
    })
}

/// `out = (a == b)`.
pub fn eq_out(a: &TensorRef<'_>, b: &TensorRef<'_>, out: &mut TensorMut<'_>) -> Result<(), TensorError> {
    compare_out("eq.Tensor_out", a, b, out, |o| o == Some(Ordering::Equal))
}

/// `out = (a < b)`.
pub fn lt_out(a: &TensorRef<'_>, b: &TensorRef<'_>, out: &mut TensorMut<'_>) -> Result<(), TensorError> {
    compare_out("lt.Tensor_out", a, b, out, |o| o == Some(Ordering::Less))
}

/// `out = (a > b)`.
pub fn gt_out(a: &TensorRef<'_>, b: &TensorRef<'_>, out: &mut TensorMut<'_>) -> Result<(), TensorError> {
    compare_out("gt.Tensor_out", a, b, out, |o| o == Some(Ordering::Greater))
}
