// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Rust element types backing each [`ScalarType`], and the type-indexed
//! load/store tables used by the element-wise dispatch layer.
//!
//! Kernels are generic over a *computation* type `C`. Operand and output
//! types are only known at run time, so reads and writes go through
//! function pointers selected once per kernel call by [`loader`] and
//! [`storer`]. This keeps monomorphisation linear in the number of types
//! instead of quartic.
//!
//! Reads and writes use native-endian byte copies, so arena offsets never
//! need to satisfy the alignment of the element type.

use crate::{Scalar, ScalarType};
use half::f16;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A Rust type that stores one element of a [`ScalarType`].
pub trait Element: Copy + Send + Sync + PartialEq + PartialOrd + fmt::Debug + 'static {
    /// The runtime tag of this element type.
    const SCALAR_TYPE: ScalarType;
    /// Size of one element in bytes.
    const SIZE: usize = std::mem::size_of::<Self>();

    /// Reads one element from the start of `bytes`.
    fn read(bytes: &[u8]) -> Self;
    /// Writes this element to the start of `bytes`.
    fn write(self, bytes: &mut [u8]);
    /// Widens to a [`Scalar`] without loss for integers up to 64 bits.
    fn to_scalar(self) -> Scalar;
    /// Converts with `as`-cast semantics (wrapping integers, saturating floats).
    fn from_scalar(value: Scalar) -> Self;

    /// Converts this element to another element type.
    #[inline]
    fn cast<T: Element>(self) -> T {
        T::from_scalar(self.to_scalar())
    }
}

macro_rules! impl_int_element {
    ($($t:ty => $variant:ident),* $(,)?) => {$(
        impl Element for $t {
            const SCALAR_TYPE: ScalarType = ScalarType::$variant;

            #[inline]
            fn read(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                <$t>::from_ne_bytes(raw)
            }

            #[inline]
            fn write(self, bytes: &mut [u8]) {
                bytes[..std::mem::size_of::<$t>()].copy_from_slice(&self.to_ne_bytes());
            }

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::Int(self as i64)
            }

            #[inline]
            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Bool(b) => <$t>::from(b),
                    Scalar::Int(v) => v as $t,
                    Scalar::Double(v) => v as $t,
                }
            }
        }
    )*};
}

macro_rules! impl_float_element {
    ($($t:ty => $variant:ident),* $(,)?) => {$(
        impl Element for $t {
            const SCALAR_TYPE: ScalarType = ScalarType::$variant;

            #[inline]
            fn read(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                <$t>::from_ne_bytes(raw)
            }

            #[inline]
            fn write(self, bytes: &mut [u8]) {
                bytes[..std::mem::size_of::<$t>()].copy_from_slice(&self.to_ne_bytes());
            }

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::Double(self as f64)
            }

            #[inline]
            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Bool(b) => <$t>::from(u8::from(b)),
                    Scalar::Int(v) => v as $t,
                    Scalar::Double(v) => v as $t,
                }
            }
        }
    )*};
}

impl_int_element!(u8 => U8, i8 => I8, i16 => I16, i32 => I32, i64 => I64);
impl_float_element!(f32 => F32, f64 => F64);

impl Element for bool {
    const SCALAR_TYPE: ScalarType = ScalarType::Bool;

    #[inline]
    fn read(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    #[inline]
    fn write(self, bytes: &mut [u8]) {
        bytes[0] = u8::from(self);
    }

    #[inline]
    fn to_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }

    #[inline]
    fn from_scalar(value: Scalar) -> Self {
        match value {
            Scalar::Bool(b) => b,
            Scalar::Int(v) => v != 0,
            Scalar::Double(v) => v != 0.0,
        }
    }
}

impl Element for f16 {
    const SCALAR_TYPE: ScalarType = ScalarType::F16;

    #[inline]
    fn read(bytes: &[u8]) -> Self {
        f16::from_bits(u16::from_ne_bytes([bytes[0], bytes[1]]))
    }

    #[inline]
    fn write(self, bytes: &mut [u8]) {
        bytes[..2].copy_from_slice(&self.to_bits().to_ne_bytes());
    }

    #[inline]
    fn to_scalar(self) -> Scalar {
        Scalar::Double(self.to_f64())
    }

    #[inline]
    fn from_scalar(value: Scalar) -> Self {
        f16::from_f64(value.to_f64())
    }
}

/// Arithmetic available to every computation type of the `Real` class.
///
/// Integer implementations wrap on overflow and return zero for a zero
/// divisor; kernels reject integral zero divisors before calling in.
pub trait RealElement: Element {
    const ZERO: Self;
    const ONE: Self;

    fn sum(self, rhs: Self) -> Self;
    fn difference(self, rhs: Self) -> Self;
    fn product(self, rhs: Self) -> Self;
    /// Truncating division for integers, IEEE division for floats.
    fn quotient(self, rhs: Self) -> Self;
    /// Remainder with the sign of the dividend (C `fmod`).
    fn fmod(self, rhs: Self) -> Self;
    /// Remainder with the sign of the divisor.
    fn remainder(self, rhs: Self) -> Self;
    fn floor_divide(self, rhs: Self) -> Self;
    fn negate(self) -> Self;
    fn magnitude(self) -> Self;
    /// Larger operand; NaN propagates for floats.
    fn max_propagate_nan(self, rhs: Self) -> Self;
    /// Smaller operand; NaN propagates for floats.
    fn min_propagate_nan(self, rhs: Self) -> Self;

    #[inline]
    fn is_zero(self) -> bool {
        self == Self::ZERO
    }
}

macro_rules! impl_real_signed {
    ($($t:ty),*) => {$(
        impl RealElement for $t {
            const ZERO: Self = 0;
            const ONE: Self = 1;

            #[inline] fn sum(self, rhs: Self) -> Self { self.wrapping_add(rhs) }
            #[inline] fn difference(self, rhs: Self) -> Self { self.wrapping_sub(rhs) }
            #[inline] fn product(self, rhs: Self) -> Self { self.wrapping_mul(rhs) }

            #[inline]
            fn quotient(self, rhs: Self) -> Self {
                if rhs == 0 { 0 } else { self.wrapping_div(rhs) }
            }

            #[inline]
            fn fmod(self, rhs: Self) -> Self {
                if rhs == 0 { 0 } else { self.wrapping_rem(rhs) }
            }

            #[inline]
            fn remainder(self, rhs: Self) -> Self {
                let r = self.fmod(rhs);
                if r != 0 && ((r < 0) != (rhs < 0)) { r.wrapping_add(rhs) } else { r }
            }

            #[inline]
            fn floor_divide(self, rhs: Self) -> Self {
                if rhs == 0 {
                    return 0;
                }
                let q = self.wrapping_div(rhs);
                if self.wrapping_rem(rhs) != 0 && ((self < 0) != (rhs < 0)) {
                    q.wrapping_sub(1)
                } else {
                    q
                }
            }

            #[inline] fn negate(self) -> Self { self.wrapping_neg() }
            #[inline] fn magnitude(self) -> Self { self.wrapping_abs() }
            #[inline] fn max_propagate_nan(self, rhs: Self) -> Self { Ord::max(self, rhs) }
            #[inline] fn min_propagate_nan(self, rhs: Self) -> Self { Ord::min(self, rhs) }
        }
    )*};
}

impl_real_signed!(i8, i16, i32, i64);

impl RealElement for u8 {
    const ZERO: Self = 0;
    const ONE: Self = 1;

    #[inline] fn sum(self, rhs: Self) -> Self { self.wrapping_add(rhs) }
    #[inline] fn difference(self, rhs: Self) -> Self { self.wrapping_sub(rhs) }
    #[inline] fn product(self, rhs: Self) -> Self { self.wrapping_mul(rhs) }

    #[inline]
    fn quotient(self, rhs: Self) -> Self {
        self.checked_div(rhs).unwrap_or(0)
    }

    #[inline]
    fn fmod(self, rhs: Self) -> Self {
        self.checked_rem(rhs).unwrap_or(0)
    }

    #[inline] fn remainder(self, rhs: Self) -> Self { self.fmod(rhs) }
    #[inline] fn floor_divide(self, rhs: Self) -> Self { self.quotient(rhs) }
    #[inline] fn negate(self) -> Self { self.wrapping_neg() }
    #[inline] fn magnitude(self) -> Self { self }
    #[inline] fn max_propagate_nan(self, rhs: Self) -> Self { Ord::max(self, rhs) }
    #[inline] fn min_propagate_nan(self, rhs: Self) -> Self { Ord::min(self, rhs) }
}

macro_rules! impl_real_float {
    ($($t:ty),*) => {$(
        impl RealElement for $t {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;

            #[inline] fn sum(self, rhs: Self) -> Self { self + rhs }
            #[inline] fn difference(self, rhs: Self) -> Self { self - rhs }
            #[inline] fn product(self, rhs: Self) -> Self { self * rhs }
            #[inline] fn quotient(self, rhs: Self) -> Self { self / rhs }
            #[inline] fn fmod(self, rhs: Self) -> Self { self % rhs }

            #[inline]
            fn remainder(self, rhs: Self) -> Self {
                let r = self % rhs;
                if r != 0.0 && ((r < 0.0) != (rhs < 0.0)) { r + rhs } else { r }
            }

            #[inline] fn floor_divide(self, rhs: Self) -> Self { <$t>::floor(self / rhs) }
            #[inline] fn negate(self) -> Self { -self }
            #[inline] fn magnitude(self) -> Self { <$t>::abs(self) }

            #[inline]
            fn max_propagate_nan(self, rhs: Self) -> Self {
                if self.is_nan() || rhs.is_nan() { <$t>::NAN } else { <$t>::max(self, rhs) }
            }

            #[inline]
            fn min_propagate_nan(self, rhs: Self) -> Self {
                if self.is_nan() || rhs.is_nan() { <$t>::NAN } else { <$t>::min(self, rhs) }
            }
        }
    )*};
}

impl_real_float!(f32, f64);

/// Transcendental functions for the `Float` class.
pub trait FloatElement:
    RealElement
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    fn from_f64(v: f64) -> Self;
    fn sqrt(self) -> Self;
    fn exp(self) -> Self;
    fn tanh(self) -> Self;
}

macro_rules! impl_float {
    ($($t:ty),*) => {$(
        impl FloatElement for $t {
            #[inline] fn from_f64(v: f64) -> Self { v as $t }
            #[inline] fn sqrt(self) -> Self { <$t>::sqrt(self) }
            #[inline] fn exp(self) -> Self { <$t>::exp(self) }
            #[inline] fn tanh(self) -> Self { <$t>::tanh(self) }
        }
    )*};
}

impl_float!(f32, f64);

/// Reads element `index` of a buffer and converts it to `C`.
pub type LoadFn<C> = fn(&[u8], usize) -> C;

/// Converts a `C` and writes it as element `index` of a buffer.
pub type StoreFn<C> = fn(&mut [u8], usize, C);

#[inline]
fn load_as<S: Element, C: Element>(bytes: &[u8], index: usize) -> C {
    S::read(&bytes[index * S::SIZE..]).cast::<C>()
}

#[inline]
fn store_as<D: Element, C: Element>(bytes: &mut [u8], index: usize, value: C) {
    value.cast::<D>().write(&mut bytes[index * D::SIZE..]);
}

/// Selects the reader that converts elements of `src` into `C`.
pub fn loader<C: Element>(src: ScalarType) -> LoadFn<C> {
    match src {
        ScalarType::Bool => load_as::<bool, C>,
        ScalarType::U8 => load_as::<u8, C>,
        ScalarType::I8 => load_as::<i8, C>,
        ScalarType::I16 => load_as::<i16, C>,
        ScalarType::I32 => load_as::<i32, C>,
        ScalarType::I64 => load_as::<i64, C>,
        ScalarType::F16 => load_as::<f16, C>,
        ScalarType::F32 => load_as::<f32, C>,
        ScalarType::F64 => load_as::<f64, C>,
    }
}

/// Selects the writer that converts `C` into elements of `dst`.
pub fn storer<C: Element>(dst: ScalarType) -> StoreFn<C> {
    match dst {
        ScalarType::Bool => store_as::<bool, C>,
        ScalarType::U8 => store_as::<u8, C>,
        ScalarType::I8 => store_as::<i8, C>,
        ScalarType::I16 => store_as::<i16, C>,
        ScalarType::I32 => store_as::<i32, C>,
        ScalarType::I64 => store_as::<i64, C>,
        ScalarType::F16 => store_as::<f16, C>,
        ScalarType::F32 => store_as::<f32, C>,
        ScalarType::F64 => store_as::<f64, C>,
    }
}

/// Binds `$T` to the Rust type of a `Real` scalar type and evaluates `$body`.
///
/// Any other type yields [`TensorError::UnsupportedDType`](crate::TensorError).
#[macro_export]
macro_rules! switch_real_types {
    ($ty:expr, $op:expr, |$T:ident| $body:block) => {
        match $ty {
            $crate::ScalarType::U8 => { type $T = u8; $body }
            $crate::ScalarType::I8 => { type $T = i8; $body }
            $crate::ScalarType::I16 => { type $T = i16; $body }
            $crate::ScalarType::I32 => { type $T = i32; $body }
            $crate::ScalarType::I64 => { type $T = i64; $body }
            $crate::ScalarType::F32 => { type $T = f32; $body }
            $crate::ScalarType::F64 => { type $T = f64; $body }
            other => ::core::result::Result::Err($crate::TensorError::UnsupportedDType {
                op: $op,
                dtype: other,
            }),
        }
    };
}

/// Like [`switch_real_types!`] with `Bool` explicitly included.
#[macro_export]
macro_rules! switch_real_and_bool_types {
    ($ty:expr, $op:expr, |$T:ident| $body:block) => {
        match $ty {
            $crate::ScalarType::Bool => { type $T = bool; $body }
            other => $crate::switch_real_types!(other, $op, |$T| $body),
        }
    };
}

/// Binds `$T` to `f32` or `f64`.
#[macro_export]
macro_rules! switch_float_types {
    ($ty:expr, $op:expr, |$T:ident| $body:block) => {
        match $ty {
            $crate::ScalarType::F32 => { type $T = f32; $body }
            $crate::ScalarType::F64 => { type $T = f64; $body }
            other => ::core::result::Result::Err($crate::TensorError::UnsupportedDType {
                op: $op,
                dtype: other,
            }),
        }
    };
}

/// Binds `$T` to the Rust type of any scalar type.
#[macro_export]
macro_rules! switch_all_types {
    ($ty:expr, |$T:ident| $body:block) => {
        match $ty {
            $crate::ScalarType::Bool => { type $T = bool; $body }
            $crate::ScalarType::U8 => { type $T = u8; $body }
            $crate::ScalarType::I8 => { type $T = i8; $body }
            $crate::ScalarType::I16 => { type $T = i16; $body }
            $crate::ScalarType::I32 => { type $T = i32; $body }
            $crate::ScalarType::I64 => { type $T = i64; $body }
            $crate::ScalarType::F16 => { type $T = $crate::f16; $body }
            $crate::ScalarType::F32 => { type $T = f32; $body }
            $crate::ScalarType::F64 => { type $T = f64; $body }
        }
    };
}
