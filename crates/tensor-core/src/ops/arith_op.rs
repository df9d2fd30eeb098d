// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Broadcasting arithmetic: add, sub, mul, div, floor_divide, maximum, minimum.

use super::dispatch::{apply_binary_elementwise, check_type_class, prepare_binary};
use crate::element::RealElement;
use crate::{switch_float_types, switch_real_types, ScalarType, TensorError, TensorMut, TensorRef, TypeClass};

/// Runs `logical` when both operands are boolean, so the result stays a
/// boolean (`1`) even when written to a numeric output.
fn apply_bool(
    a: &TensorRef<'_>,
    b: &TensorRef<'_>,
    out: &mut TensorMut<'_>,
    logical: fn(bool, bool) -> bool,
) -> Result<(), TensorError> {
    apply_binary_elementwise::<bool, bool, _>(a, b, out, |x, y| Ok(logical(x, y)))
}

/// `out = a + b`
pub fn add_out(a: &TensorRef<'_>, b: &TensorRef<'_>, out: &mut TensorMut<'_>) -> Result<(), TensorError> {
    const OP: &str = "add.out";
    let common = prepare_binary(OP, a, b, out, TypeClass::RealAndBool, TypeClass::RealAndBool)?;
    if common == ScalarType::Bool {
        return apply_bool(a, b, out, |x, y| x || y);
    }
    switch_real_types!(common, OP, |C| {
        apply_binary_elementwise::<C, C, _>(a, b, out, |x, y| Ok(x.sum(y)))
    })
}

/// `out = a - b`. Boolean operands are rejected.
pub fn sub_out(a: &TensorRef<'_>, b: &TensorRef<'_>, out: &mut TensorMut<'_>) -> Result<(), TensorError> {
    const OP: &str = "sub.out";
    let common = prepare_binary(OP, a, b, out, TypeClass::Real, TypeClass::Real)?;
    switch_real_types!(common, OP, |C| {
        apply_binary_elementwise::<C, C, _>(a, b, out, |x, y| Ok(x.difference(y)))
    })
}

/// `out = a * b`
pub fn mul_out(a: &TensorRef<'_>, b: &TensorRef<'_>, out: &mut TensorMut<'_>) -> Result<(), TensorError> {
    const OP: &str = "mul.out";
    let common = prepare_binary(OP, a, b, out, TypeClass::RealAndBool, TypeClass::RealAndBool)?;
    if common == ScalarType::Bool {
        return apply_bool(a, b, out, |x, y| x && y);
    }
    switch_real_types!(common, OP, |C| {
        apply_binary_elementwise::<C, C, _>(a, b, out, |x, y| Ok(x.product(y)))
    })
}

/// True division `out = a / b`.
///
/// Integral operands are divided in [`ScalarType::DEFAULT_FLOAT`], so a zero
/// divisor produces an IEEE infinity or NaN rather than an error.
pub fn div_out(a: &TensorRef<'_>, b: &TensorRef<'_>, out: &mut TensorMut<'_>) -> Result<(), TensorError> {
    const OP: &str = "div.out";
    let common = prepare_binary(OP, a, b, out, TypeClass::RealAndBool, TypeClass::Float)?;
    let compute = if common.is_floating() {
        common
    } else {
        ScalarType::DEFAULT_FLOAT
    };
    check_type_class(OP, TypeClass::Float, compute)?;
    switch_float_types!(compute, OP, |C| {
        apply_binary_elementwise::<C, C, _>(a, b, out, |x, y| Ok(x / y))
    })
}

/// Floor division `out = floor(a / b)`.
///
/// # Errors
/// Returns [`TensorError::DivisionByZero`] for a zero divisor when the common
/// type is integral.
pub fn floor_divide_out(
    a: &TensorRef<'_>,
    b: &TensorRef<'_>,
    out: &mut TensorMut<'_>,
) -> Result<(), TensorError> {
    const OP: &str = "floor_divide.out";
    let common = prepare_binary(OP, a, b, out, TypeClass::Real, TypeClass::Real)?;
    let integral = common.is_integral(true);
    switch_real_types!(common, OP, |C| {
        apply_binary_elementwise::<C, C, _>(a, b, out, |x, y| {
            if integral && y.is_zero() {
                return Err(TensorError::DivisionByZero { op: OP });
            }
            Ok(x.floor_divide(y))
        })
    })
}

/// Element-wise maximum; NaN propagates.
pub fn maximum_out(
    a: &TensorRef<'_>,
    b: &TensorRef<'_>,
    out: &mut TensorMut<'_>,
) -> Result<(), TensorError> {
    const OP: &str = "maximum.out";
    let common = prepare_binary(OP, a, b, out, TypeClass::RealAndBool, TypeClass::RealAndBool)?;
    if common == ScalarType::Bool {
        return apply_bool(a, b, out, |x, y| x || y);
    }
    switch_real_types!(common, OP, |C| {
        apply_binary_elementwise::<C, C, _>(a, b, out, |x, y| Ok(x.max_propagate_nan(y)))
    })
}

/// Element-wise minimum; NaN propagates.
pub fn minimum_out(
    a: &TensorRef<'_>,
    b: &TensorRef<'_>,
    out: &mut TensorMut<'_>,
) -> Result<(), TensorError> {
    const OP: &str = "minimum.out";
    let common = prepare_binary(OP, a, b, out, TypeClass::RealAndBool, TypeClass::RealAndBool)?;
    if common == ScalarType::Bool {
        return apply_bool(a, b, out, |x, y| x && y);
    }
    switch_real_types!(common, OP, |C| {
        apply_binary_elementwise::<C, C, _>(a, b, out, |x, y| Ok(x.min_propagate_nan(y)))
    })
}
