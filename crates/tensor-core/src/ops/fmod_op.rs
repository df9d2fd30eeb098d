// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Modulo family: `fmod` (sign of the dividend) and `remainder` (sign of the
//! divisor).
//!
//! Both accept boolean operands by explicit inclusion, but the computation
//! type must be a real numeric type, so `bool % bool` is rejected. When the
//! computation type is integral a zero divisor is a domain error; floating
//! types follow IEEE 754 and produce NaN.

use super::dispatch::{
    apply_binary_elementwise, apply_unary_elementwise, check_can_cast, check_type_class,
    prepare_binary, prepare_unary,
};
use crate::element::{Element, RealElement};
use crate::{promote_with_scalar, switch_real_types, Scalar, TensorError, TensorMut, TensorRef, TypeClass};

/// `out = fmod(a, b)` with broadcasting.
///
/// # Errors
/// - [`TensorError::DivisionByZero`] if the common type is integral and any
///   divisor element is zero.
/// - [`TensorError::UnsupportedDType`] if the common type is `Bool`.
pub fn fmod_tensor_out(
    a: &TensorRef<'_>,
    b: &TensorRef<'_>,
    out: &mut TensorMut<'_>,
) -> Result<(), TensorError> {
    const OP: &str = "fmod.Tensor_out";
    let common = prepare_binary(OP, a, b, out, TypeClass::RealAndBool, TypeClass::Real)?;
    let integral = common.is_integral(true);
    switch_real_types!(common, OP, |C| {
        apply_binary_elementwise::<C, C, _>(a, b, out, |x, y| {
            if integral && y.is_zero() {
                return Err(TensorError::DivisionByZero { op: OP });
            }
            Ok(x.fmod(y))
        })
    })
}

/// `out = fmod(a, b)` for a scalar divisor. `out` takes the shape of `a`.
///
/// The computation type follows [`promote_with_scalar`]. The divisor is
/// checked for zero once, up front, before it is narrowed to that type.
pub fn fmod_scalar_out(
    a: &TensorRef<'_>,
    b: Scalar,
    out: &mut TensorMut<'_>,
) -> Result<(), TensorError> {
    const OP: &str = "fmod.Scalar_out";
    prepare_unary(OP, a, out, TypeClass::RealAndBool, TypeClass::Real)?;
    let common = promote_with_scalar(a.dtype(), b);
    check_type_class(OP, TypeClass::Real, common)?;
    check_can_cast(OP, common, out.dtype())?;
    if common.is_integral(true) && b.is_zero() {
        return Err(TensorError::DivisionByZero { op: OP });
    }
    switch_real_types!(common, OP, |C| {
        let divisor = C::from_scalar(b);
        apply_unary_elementwise::<C, C, _>(a, out, |x| Ok(x.fmod(divisor)))
    })
}

/// `out = remainder(a, b)`: the result has the sign of the divisor.
pub fn remainder_tensor_out(
    a: &TensorRef<'_>,
    b: &TensorRef<'_>,
    out: &mut TensorMut<'_>,
) -> Result<(), TensorError> {
    const OP: &str = "remainder.Tensor_out";
    let common = prepare_binary(OP, a, b, out, TypeClass::RealAndBool, TypeClass::Real)?;
    let integral = common.is_integral(true);
    switch_real_types!(common, OP, |C| {
        apply_binary_elementwise::<C, C, _>(a, b, out, |x, y| {
            if integral && y.is_zero() {
                return Err(TensorError::DivisionByZero { op: OP });
            }
            Ok(x.remainder(y))
        })
    })
}
