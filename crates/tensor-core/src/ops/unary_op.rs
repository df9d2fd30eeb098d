// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element-wise unary kernels.
//!
//! `neg`, `abs` and `relu` compute in the input type. `sqrt` and `exp`
//! compute in the (floating) output type, so an integral or boolean input
//! is widened before the function is applied.

use super::dispatch::{apply_unary_elementwise, check_can_cast, prepare_unary};
use crate::element::{FloatElement, RealElement};
use crate::{
    switch_float_types, switch_real_types, ScalarType, TensorError, TensorMut, TensorRef, TypeClass,
};

fn prepare_real_unary(
    op: &'static str,
    input: &TensorRef<'_>,
    out: &mut TensorMut<'_>,
) -> Result<ScalarType, TensorError> {
    prepare_unary(op, input, out, TypeClass::Real, TypeClass::Real)?;
    check_can_cast(op, input.dtype(), out.dtype())?;
    Ok(input.dtype())
}

/// `out = -input`. Integers wrap.
pub fn neg_out(input: &TensorRef<'_>, out: &mut TensorMut<'_>) -> Result<(), TensorError> {
    const OP: &str = "neg.out";
    let common = prepare_real_unary(OP, input, out)?;
    switch_real_types!(common, OP, |C| {
        apply_unary_elementwise::<C, C, _>(input, out, |x| Ok(x.negate()))
    })
}

/// `out = |input|`.
pub fn abs_out(input: &TensorRef<'_>, out: &mut TensorMut<'_>) -> Result<(), TensorError> {
    const OP: &str = "abs.out";
    let common = prepare_real_unary(OP, input, out)?;
    switch_real_types!(common, OP, |C| {
        apply_unary_elementwise::<C, C, _>(input, out, |x| Ok(x.magnitude()))
    })
}

/// `out = max(input, 0)`. NaN passes through.
pub fn relu_out(input: &TensorRef<'_>, out: &mut TensorMut<'_>) -> Result<(), TensorError> {
    const OP: &str = "relu.out";
    let common = prepare_real_unary(OP, input, out)?;
    switch_real_types!(common, OP, |C| {
        apply_unary_elementwise::<C, C, _>(input, out, |x| {
            Ok(if x < C::ZERO { C::ZERO } else { x })
        })
    })
}

/// Checks a floating unary kernel and returns the output type it computes in.
pub(crate) fn prepare_float_unary(
    op: &'static str,
    input: &TensorRef<'_>,
    out: &mut TensorMut<'_>,
) -> Result<ScalarType, TensorError> {
    prepare_unary(op, input, out, TypeClass::RealAndBool, TypeClass::Float)?;
    check_can_cast(op, input.dtype(), out.dtype())?;
    Ok(out.dtype())
}

/// `out = sqrt(input)`. Negative inputs produce NaN.
pub fn sqrt_out(input: &TensorRef<'_>, out: &mut TensorMut<'_>) -> Result<(), TensorError> {
    const OP: &str = "sqrt.out";
    let compute = prepare_float_unary(OP, input, out)?;
    switch_float_types!(compute, OP, |C| {
        apply_unary_elementwise::<C, C, _>(input, out, |x| Ok(FloatElement::sqrt(x)))
    })
}

/// `out = e^input`.
pub fn exp_out(input: &TensorRef<'_>, out: &mut TensorMut<'_>) -> Result<(), TensorError> {
    const OP: &str = "exp.out";
    let compute = prepare_float_unary(OP, input, out)?;
    switch_float_types!(compute, OP, |C| {
        apply_unary_elementwise::<C, C, _>(input, out, |x| Ok(FloatElement::exp(x)))
    })
}
