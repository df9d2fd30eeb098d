// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Kernel calling convention and the portable operator set.
//!
//! Every kernel has the same signature: the instruction's arguments as
//! [`KernelArg`]s and its results as writable tensors. The wrappers here
//! unpack the arguments for the element-wise operators in `tensor-core`.

use tensor_core::ops;
use tensor_core::{Scalar, TensorError, TensorMut, TensorRef};

use crate::registry::{KernelKey, KernelRegistry};
use crate::RuntimeError;

/// One instruction argument, resolved against the context's storage.
#[derive(Debug, Clone, Copy)]
pub enum KernelArg<'a> {
    Tensor(TensorRef<'a>),
    Scalar(Scalar),
    IntList(&'a [i64]),
    None,
}

impl<'a> KernelArg<'a> {
    pub fn as_tensor(&self) -> Option<&TensorRef<'a>> {
        match self {
            KernelArg::Tensor(t) => Some(t),
            _ => None,
        }
    }
}

/// A kernel entry point.
pub type KernelFn =
    for<'a, 'b> fn(&[KernelArg<'a>], &mut [TensorMut<'b>]) -> Result<(), TensorError>;

// ── Argument unpacking ─────────────────────────────────────────────

fn arity(op: &'static str, args: usize, outs: usize, want: (usize, usize)) -> Result<(), TensorError> {
    if (args, outs) != want {
        return Err(TensorError::InvalidArgument {
            op,
            detail: format!(
                "expected {} args and {} results, got {args} and {outs}",
                want.0, want.1
            ),
        });
    }
    Ok(())
}

fn tensor<'a>(op: &'static str, args: &[KernelArg<'a>], i: usize) -> Result<TensorRef<'a>, TensorError> {
    match args.get(i) {
        Some(KernelArg::Tensor(t)) => Ok(*t),
        _ => Err(TensorError::InvalidArgument {
            op,
            detail: format!("argument {i} must be a tensor"),
        }),
    }
}

fn scalar(op: &'static str, args: &[KernelArg<'_>], i: usize) -> Result<Scalar, TensorError> {
    match args.get(i) {
        Some(KernelArg::Scalar(s)) => Ok(*s),
        _ => Err(TensorError::InvalidArgument {
            op,
            detail: format!("argument {i} must be a scalar"),
        }),
    }
}

macro_rules! binary_kernel {
    ($name:ident, $op:literal, $f:path) => {
        fn $name(args: &[KernelArg<'_>], outs: &mut [TensorMut<'_>]) -> Result<(), TensorError> {
            arity($op, args.len(), outs.len(), (2, 1))?;
            let a = tensor($op, args, 0)?;
            let b = tensor($op, args, 1)?;
            $f(&a, &b, &mut outs[0])
        }
    };
}

macro_rules! unary_kernel {
    ($name:ident, $op:literal, $f:path) => {
        fn $name(args: &[KernelArg<'_>], outs: &mut [TensorMut<'_>]) -> Result<(), TensorError> {
            arity($op, args.len(), outs.len(), (1, 1))?;
            let input = tensor($op, args, 0)?;
            $f(&input, &mut outs[0])
        }
    };
}

binary_kernel!(add, "aten::add.out", ops::add_out);
binary_kernel!(sub, "aten::sub.out", ops::sub_out);
binary_kernel!(mul, "aten::mul.out", ops::mul_out);
binary_kernel!(div, "aten::div.out", ops::div_out);
binary_kernel!(floor_divide, "aten::floor_divide.out", ops::floor_divide_out);
binary_kernel!(fmod_tensor, "aten::fmod.Tensor_out", ops::fmod_tensor_out);
binary_kernel!(remainder_tensor, "aten::remainder.Tensor_out", ops::remainder_tensor_out);
binary_kernel!(maximum, "aten::maximum.out", ops::maximum_out);
binary_kernel!(minimum, "aten::minimum.out", ops::minimum_out);
binary_kernel!(eq, "aten::eq.Tensor_out", ops::eq_out);
binary_kernel!(lt, "aten::lt.Tensor_out", ops::lt_out);
binary_kernel!(gt, "aten::gt.Tensor_out", ops::gt_out);

unary_kernel!(neg, "aten::neg.out", ops::neg_out);
unary_kernel!(abs, "aten::abs.out", ops::abs_out);
unary_kernel!(sqrt, "aten::sqrt.out", ops::sqrt_out);
unary_kernel!(exp, "aten::exp.out", ops::exp_out);
unary_kernel!(relu, "aten::relu.out", ops::relu_out);
unary_kernel!(to_copy, "aten::_to_copy.out", ops::to_copy_out);

fn fmod_scalar(args: &[KernelArg<'_>], outs: &mut [TensorMut<'_>]) -> Result<(), TensorError> {
    const OP: &str = "aten::fmod.Scalar_out";
    arity(OP, args.len(), outs.len(), (2, 1))?;
    let a = tensor(OP, args, 0)?;
    let b = scalar(OP, args, 1)?;
    ops::fmod_scalar_out(&a, b, &mut outs[0])
}

/// `aten::gelu.out(input, approximate)`; only the `tanh` approximation is
/// implemented, and the mode argument may be omitted.
fn gelu(args: &[KernelArg<'_>], outs: &mut [TensorMut<'_>]) -> Result<(), TensorError> {
    const OP: &str = "aten::gelu.out";
    if args.len() == 2 {
        arity(OP, 1, outs.len(), (1, 1))?;
    } else {
        arity(OP, args.len(), outs.len(), (1, 1))?;
    }
    let input = tensor(OP, args, 0)?;
    ops::gelu_out(&input, &mut outs[0])
}

/// The portable operator set, by opcode.
pub const PORTABLE_KERNELS: &[(&str, KernelFn)] = &[
    ("aten::add.out", add),
    ("aten::sub.out", sub),
    ("aten::mul.out", mul),
    ("aten::div.out", div),
    ("aten::floor_divide.out", floor_divide),
    ("aten::fmod.Tensor_out", fmod_tensor),
    ("aten::fmod.Scalar_out", fmod_scalar),
    ("aten::remainder.Tensor_out", remainder_tensor),
    ("aten::maximum.out", maximum),
    ("aten::minimum.out", minimum),
    ("aten::eq.Tensor_out", eq),
    ("aten::lt.Tensor_out", lt),
    ("aten::gt.Tensor_out", gt),
    ("aten::neg.out", neg),
    ("aten::abs.out", abs),
    ("aten::sqrt.out", sqrt),
    ("aten::exp.out", exp),
    ("aten::gelu.out", gelu),
    ("aten::relu.out", relu),
    ("aten::_to_copy.out", to_copy),
];

/// Registers every portable kernel as the generic entry for its opcode.
pub fn register_portable_kernels(registry: &mut KernelRegistry) -> Result<(), RuntimeError> {
    for &(name, kernel) in PORTABLE_KERNELS {
        registry.register(KernelKey::generic(name), kernel)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::{ScalarType, Tensor};

    #[test]
    fn test_add_wrapper() {
        let a = Tensor::from_slice([3], &[1i32, 2, 3]).unwrap();
        let b = Tensor::from_slice([1], &[10i32]).unwrap();
        let mut out = Tensor::zeros([3], ScalarType::I32);
        {
            let mut outs = [out.view_mut()];
            add(&[KernelArg::Tensor(a.view()), KernelArg::Tensor(b.view())], &mut outs).unwrap();
        }
        assert_eq!(out.to_vec::<i32>().unwrap(), vec![11, 12, 13]);
    }

    #[test]
    fn test_fmod_scalar_wrapper_zero() {
        let a = Tensor::from_slice([2], &[4i64, 5]).unwrap();
        let mut out = Tensor::zeros([2], ScalarType::I64);
        let mut outs = [out.view_mut()];
        let err = fmod_scalar(
            &[KernelArg::Tensor(a.view()), KernelArg::Scalar(Scalar::Int(0))],
            &mut outs,
        )
        .unwrap_err();
        assert_eq!(err, TensorError::DivisionByZero { op: "fmod.Scalar_out" });
    }

    #[test]
    fn test_wrong_arity() {
        let a = Tensor::from_slice([1], &[1.0f32]).unwrap();
        let mut out = Tensor::zeros([1], ScalarType::F32);
        let mut outs = [out.view_mut()];
        let err = add(&[KernelArg::Tensor(a.view())], &mut outs).unwrap_err();
        assert!(matches!(err, TensorError::InvalidArgument { .. }));
    }

    #[test]
    fn test_scalar_where_tensor_expected() {
        let mut out = Tensor::zeros([1], ScalarType::F32);
        let mut outs = [out.view_mut()];
        let err = relu(&[KernelArg::Scalar(Scalar::Double(1.0))], &mut outs).unwrap_err();
        assert!(matches!(err, TensorError::InvalidArgument { .. }));
    }

    #[test]
    fn test_gelu_accepts_mode_argument() {
        let x = Tensor::from_slice([1], &[0.0f32]).unwrap();
        let mut out = Tensor::zeros([1], ScalarType::F32);
        {
            let mut outs = [out.view_mut()];
            gelu(&[KernelArg::Tensor(x.view()), KernelArg::None], &mut outs).unwrap();
        }
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![0.0]);
    }
}
