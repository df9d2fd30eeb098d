// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Gaussian Error Linear Unit (GELU) activation.

use super::dispatch::apply_unary_elementwise;
use super::unary_op::prepare_float_unary;
use crate::element::{FloatElement, RealElement};
use crate::{switch_float_types, TensorError, TensorMut, TensorRef};

/// Coefficient `sqrt(2/π)`.
const SQRT_2_OVER_PI: f64 = 0.797_884_560_802_865_4;

/// Cubic coefficient in the tanh approximation.
const GELU_COEFF: f64 = 0.044715;

/// Applies GELU element-wise using the tanh approximation:
///
/// `GELU(x) ≈ 0.5 * x * (1 + tanh(sqrt(2/π) * (x + 0.044715 * x³)))`
///
/// Computes in the output type, which must be `F32` or `F64`; integral and
/// boolean inputs are widened first.
///
/// # Errors
/// Returns [`TensorError::UnsupportedDType`] for a non-float output and a
/// shape error if a fixed output does not match the input shape.
pub fn gelu_out(input: &TensorRef<'_>, out: &mut TensorMut<'_>) -> Result<(), TensorError> {
    const OP: &str = "gelu.out";
    let compute = prepare_float_unary(OP, input, out)?;
    switch_float_types!(compute, OP, |C| {
        apply_unary_elementwise::<C, C, _>(input, out, |x| Ok(gelu_scalar(x)))
    })
}

#[inline(always)]
fn gelu_scalar<T: FloatElement>(x: T) -> T {
    let inner = T::from_f64(SQRT_2_OVER_PI) * (x + T::from_f64(GELU_COEFF) * x * x * x);
    T::from_f64(0.5) * x * (T::ONE + FloatElement::tanh(inner))
}
