// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Generic element-wise application shared by every numeric kernel.
//!
//! A binary kernel runs in two phases:
//!
//! 1. [`prepare_binary`] resolves the broadcast shape and resizes the
//!    output if it is allowed to change, checks both operands and the
//!    output against the operator's type classes, promotes the operand
//!    types and verifies the result can be cast to the output type.
//! 2. [`apply_binary_elementwise`] walks the output index space once. Each
//!    operand element is read through its broadcast offset, converted to
//!    the computation type `C`, passed to the scalar function, and the
//!    result is converted to the output type and written.
//!
//! Comparisons use [`prepare_comparison`] instead of step 1, since their
//! result is boolean whatever the operand types. Unary kernels follow the
//! same shape with one operand.

use crate::element::{loader, storer, Element};
use crate::{
    broadcast_shapes, can_cast, promote_types, BroadcastCursor, ScalarType, TensorError, TensorMut,
    TensorRef, TypeClass,
};

/// Fails with `UnsupportedDType` unless `dtype` is in `class`.
pub fn check_type_class(
    op: &'static str,
    class: TypeClass,
    dtype: ScalarType,
) -> Result<(), TensorError> {
    if class.contains(dtype) {
        Ok(())
    } else {
        Err(TensorError::UnsupportedDType { op, dtype })
    }
}

/// Fails with `UnsupportedCast` unless `from` may be written as `to`.
pub fn check_can_cast(op: &'static str, from: ScalarType, to: ScalarType) -> Result<(), TensorError> {
    if can_cast(from, to) {
        Ok(())
    } else {
        Err(TensorError::UnsupportedCast { op, from, to })
    }
}

/// Resizes `out` to the broadcast shape of `a` and `b`.
pub fn resize_to_broadcast_target(
    a: &TensorRef<'_>,
    b: &TensorRef<'_>,
    out: &mut TensorMut<'_>,
) -> Result<(), TensorError> {
    let target = broadcast_shapes(&[a.dims(), b.dims()])?;
    out.resize(&target)
}

/// Runs steps 1–3 of a binary kernel and returns the common type.
pub fn prepare_binary(
    op: &'static str,
    a: &TensorRef<'_>,
    b: &TensorRef<'_>,
    out: &mut TensorMut<'_>,
    inputs: TypeClass,
    outputs: TypeClass,
) -> Result<ScalarType, TensorError> {
    resize_to_broadcast_target(a, b, out)?;
    check_type_class(op, inputs, a.dtype())?;
    check_type_class(op, inputs, b.dtype())?;
    check_type_class(op, outputs, out.dtype())?;
    let common = promote_types(a.dtype(), b.dtype());
    check_can_cast(op, common, out.dtype())?;
    Ok(common)
}

/// Like [`prepare_binary`], but for operators whose result is boolean
/// whatever the operand types: the output must accept a `Bool`, not the
/// common operand type.
pub fn prepare_comparison(
    op: &'static str,
    a: &TensorRef<'_>,
    b: &TensorRef<'_>,
    out: &mut TensorMut<'_>,
    inputs: TypeClass,
    outputs: TypeClass,
) -> Result<ScalarType, TensorError> {
    resize_to_broadcast_target(a, b, out)?;
    check_type_class(op, inputs, a.dtype())?;
    check_type_class(op, inputs, b.dtype())?;
    check_type_class(op, outputs, out.dtype())?;
    check_can_cast(op, ScalarType::Bool, out.dtype())?;
    Ok(promote_types(a.dtype(), b.dtype()))
}

/// Resizes `out` to the input shape and checks both type classes.
pub fn prepare_unary(
    op: &'static str,
    input: &TensorRef<'_>,
    out: &mut TensorMut<'_>,
    inputs: TypeClass,
    outputs: TypeClass,
) -> Result<(), TensorError> {
    out.resize(input.dims())?;
    check_type_class(op, inputs, input.dtype())?;
    check_type_class(op, outputs, out.dtype())
}

/// Applies `f` to every broadcast pair of `a` and `b`, computing in `C` and
/// producing `R`, which is then converted to the output type.
///
/// `out` must already have the broadcast shape.
pub fn apply_binary_elementwise<C, R, F>(
    a: &TensorRef<'_>,
    b: &TensorRef<'_>,
    out: &mut TensorMut<'_>,
    f: F,
) -> Result<(), TensorError>
where
    C: Element,
    R: Element,
    F: Fn(C, C) -> Result<R, TensorError>,
{
    let load_a = loader::<C>(a.dtype());
    let load_b = loader::<C>(b.dtype());
    let store = storer::<R>(out.dtype());
    let out_dims = out.dims().to_vec();
    let cursor = BroadcastCursor::new(
        &out_dims,
        [(a.dims(), a.strides()), (b.dims(), b.strides())],
    );
    let (a_bytes, b_bytes) = (a.as_bytes(), b.as_bytes());
    let dst = out.as_bytes_mut();
    for (i, [ia, ib]) in cursor.enumerate() {
        store(dst, i, f(load_a(a_bytes, ia), load_b(b_bytes, ib))?);
    }
    Ok(())
}

/// Applies `f` to every element of `input`, computing in `C` and producing
/// `R`, which is then converted to the output type.
///
/// `out` must already have the input's shape.
pub fn apply_unary_elementwise<C, R, F>(
    input: &TensorRef<'_>,
    out: &mut TensorMut<'_>,
    f: F,
) -> Result<(), TensorError>
where
    C: Element,
    R: Element,
    F: Fn(C) -> Result<R, TensorError>,
{
    let load = loader::<C>(input.dtype());
    let store = storer::<R>(out.dtype());
    let cursor = BroadcastCursor::new(input.dims(), [(input.dims(), input.strides())]);
    let src = input.as_bytes();
    let dst = out.as_bytes_mut();
    for (i, [offset]) in cursor.enumerate() {
        store(dst, i, f(load(src, offset))?);
    }
    Ok(())
}
