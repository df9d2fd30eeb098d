// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor descriptors and the borrowed views kernels operate on.
//!
//! A [`TensorDescriptor`] is pure metadata. Storage is attached by
//! borrowing: [`TensorRef`] pairs a descriptor with read-only bytes and
//! [`TensorMut`] with writable bytes, typically a slice of an arena owned
//! by an execution context. Neither view owns memory. [`Tensor`] is the
//! owned buffer type used by callers at the runtime boundary.

use crate::element::Element;
use crate::{contiguous_strides, BroadcastCursor, ScalarType, Shape, TensorError};

/// Whether an output slot may change shape at run time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ShapeDynamism {
    /// The declared shape is the only legal shape.
    #[default]
    Static,
    /// Any shape whose contiguous footprint fits the declared capacity.
    DynamicBound,
}

/// Shape, strides and element type of a tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDescriptor {
    shape: Shape,
    strides: Vec<usize>,
    dtype: ScalarType,
    dynamism: ShapeDynamism,
}

impl TensorDescriptor {
    /// Creates a contiguous, static descriptor.
    pub fn new(shape: impl Into<Shape>, dtype: ScalarType) -> Self {
        let shape = shape.into();
        let strides = shape.strides();
        Self {
            shape,
            strides,
            dtype,
            dynamism: ShapeDynamism::Static,
        }
    }

    /// Creates a contiguous, static descriptor for an untrusted shape.
    ///
    /// Fails with [`TensorError::SizeOverflow`] if the footprint does not fit
    /// in `isize::MAX` bytes.
    pub fn try_new(shape: impl Into<Shape>, dtype: ScalarType) -> Result<Self, TensorError> {
        let desc = Self::new(shape, dtype);
        desc.check_addressable()?;
        Ok(desc)
    }

    /// Creates a descriptor with explicit element strides.
    ///
    /// Fails if the rank of `strides` differs from the shape, or if the
    /// strided span is not addressable.
    pub fn with_strides(
        shape: impl Into<Shape>,
        strides: Vec<usize>,
        dtype: ScalarType,
    ) -> Result<Self, TensorError> {
        let shape = shape.into();
        if strides.len() != shape.rank() {
            return Err(TensorError::RankMismatch {
                shape: shape.rank(),
                strides: strides.len(),
            });
        }
        let desc = Self {
            shape,
            strides,
            dtype,
            dynamism: ShapeDynamism::Static,
        };
        desc.check_addressable()?;
        Ok(desc)
    }

    fn check_addressable(&self) -> Result<(), TensorError> {
        let fits = |bytes: Option<usize>| bytes.is_some_and(|b| b <= isize::MAX as usize);
        if fits(self.shape.checked_size_bytes(self.dtype)) && fits(self.checked_storage_span_bytes()) {
            Ok(())
        } else {
            Err(TensorError::SizeOverflow {
                shape: self.shape.clone(),
                dtype: self.dtype,
            })
        }
    }

    pub fn with_dynamism(mut self, dynamism: ShapeDynamism) -> Self {
        self.dynamism = dynamism;
        self
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn dtype(&self) -> ScalarType {
        self.dtype
    }

    pub fn dynamism(&self) -> ShapeDynamism {
        self.dynamism
    }

    pub fn numel(&self) -> usize {
        self.shape.num_elements()
    }

    /// Contiguous footprint of the current shape in bytes.
    pub fn nbytes(&self) -> usize {
        self.shape.size_bytes(self.dtype)
    }

    /// Returns `true` if the strides are row-major for the shape.
    ///
    /// Dimensions of size 1 may carry any stride.
    pub fn is_contiguous(&self) -> bool {
        let expected = contiguous_strides(self.dims());
        self.dims()
            .iter()
            .zip(self.strides.iter().zip(&expected))
            .all(|(&d, (&s, &e))| d <= 1 || s == e)
    }

    /// Bytes of storage the strided layout reaches, starting at offset 0.
    ///
    /// Saturates at `usize::MAX`.
    pub fn storage_span_bytes(&self) -> usize {
        self.checked_storage_span_bytes().unwrap_or(usize::MAX)
    }

    /// Strided span in bytes, or `None` on overflow.
    pub fn checked_storage_span_bytes(&self) -> Option<usize> {
        if self.dims().contains(&0) {
            return Some(0);
        }
        let last = self
            .dims()
            .iter()
            .zip(&self.strides)
            .try_fold(0usize, |acc, (&d, &s)| acc.checked_add((d - 1).checked_mul(s)?))?;
        last.checked_add(1)?.checked_mul(self.dtype.element_size())
    }

    /// Replaces the shape and resets strides to row-major.
    pub fn set_contiguous_shape(&mut self, dims: &[usize]) {
        self.shape = Shape::from(dims);
        self.strides = contiguous_strides(dims);
    }
}

/// A read-only tensor view over borrowed bytes.
#[derive(Debug, Clone, Copy)]
pub struct TensorRef<'a> {
    desc: &'a TensorDescriptor,
    data: &'a [u8],
}

impl<'a> TensorRef<'a> {
    /// Pairs a descriptor with its storage.
    ///
    /// Fails if `data` is shorter than the strided span of the descriptor.
    pub fn new(desc: &'a TensorDescriptor, data: &'a [u8]) -> Result<Self, TensorError> {
        let expected = desc.storage_span_bytes();
        if data.len() < expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { desc, data })
    }

    pub fn descriptor(&self) -> &'a TensorDescriptor {
        self.desc
    }

    pub fn dtype(&self) -> ScalarType {
        self.desc.dtype
    }

    pub fn shape(&self) -> &'a Shape {
        &self.desc.shape
    }

    pub fn dims(&self) -> &'a [usize] {
        self.desc.dims()
    }

    pub fn strides(&self) -> &'a [usize] {
        &self.desc.strides
    }

    pub fn numel(&self) -> usize {
        self.desc.numel()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Copies the elements in row-major order into `dst`.
    pub fn copy_contiguous_into(&self, dst: &mut [u8]) -> Result<(), TensorError> {
        let nbytes = self.desc.nbytes();
        if dst.len() < nbytes {
            return Err(TensorError::BufferSizeMismatch {
                expected: nbytes,
                actual: dst.len(),
            });
        }
        if self.desc.is_contiguous() {
            dst[..nbytes].copy_from_slice(&self.data[..nbytes]);
            return Ok(());
        }
        let size = self.dtype().element_size();
        let cursor = BroadcastCursor::new(self.dims(), [(self.dims(), self.strides())]);
        for (i, [src]) in cursor.enumerate() {
            dst[i * size..(i + 1) * size].copy_from_slice(&self.data[src * size..(src + 1) * size]);
        }
        Ok(())
    }

    /// Reads all elements in row-major order.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, TensorError> {
        if T::SCALAR_TYPE != self.dtype() {
            return Err(TensorError::DTypeMismatch {
                expected: self.dtype(),
                actual: T::SCALAR_TYPE,
            });
        }
        let cursor = BroadcastCursor::new(self.dims(), [(self.dims(), self.strides())]);
        Ok(cursor
            .map(|[src]| T::read(&self.data[src * T::SIZE..]))
            .collect())
    }

    /// Copies the view into a new contiguous owned tensor.
    pub fn to_tensor(&self) -> Result<Tensor, TensorError> {
        let mut data = vec![0u8; self.desc.nbytes()];
        self.copy_contiguous_into(&mut data)?;
        Ok(Tensor {
            desc: TensorDescriptor::new(self.shape().clone(), self.dtype())
                .with_dynamism(self.desc.dynamism),
            data,
        })
    }
}

/// A writable, contiguous tensor view over borrowed bytes.
///
/// The byte slice is the slot's full capacity. The view may change shape
/// only when it is resizable: the descriptor is `DynamicBound` and the
/// owner has not pinned it with [`TensorMut::fixed`].
#[derive(Debug)]
pub struct TensorMut<'a> {
    desc: &'a mut TensorDescriptor,
    data: &'a mut [u8],
    pinned: bool,
}

impl<'a> TensorMut<'a> {
    /// Pairs a descriptor with writable storage.
    ///
    /// The descriptor must be contiguous and `data` must hold its current
    /// footprint.
    pub fn new(desc: &'a mut TensorDescriptor, data: &'a mut [u8]) -> Result<Self, TensorError> {
        if !desc.is_contiguous() {
            return Err(TensorError::NonContiguousOutput { op: "TensorMut::new" });
        }
        let expected = desc.nbytes();
        if data.len() < expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            desc,
            data,
            pinned: false,
        })
    }

    /// Forbids any resize regardless of the descriptor's dynamism.
    pub fn fixed(mut self) -> Self {
        self.pinned = true;
        self
    }

    pub fn is_resizable(&self) -> bool {
        !self.pinned && self.desc.dynamism == ShapeDynamism::DynamicBound
    }

    pub fn descriptor(&self) -> &TensorDescriptor {
        &*self.desc
    }

    pub fn dtype(&self) -> ScalarType {
        self.desc.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.desc.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.desc.dims()
    }

    pub fn numel(&self) -> usize {
        self.desc.numel()
    }

    /// Bytes available to this slot.
    pub fn capacity_bytes(&self) -> usize {
        self.data.len()
    }

    /// Changes the shape to `dims`.
    ///
    /// A no-op when the shape already matches. Otherwise the view must be
    /// resizable and the new footprint must fit the capacity.
    pub fn resize(&mut self, dims: &[usize]) -> Result<(), TensorError> {
        if self.dims() == dims {
            return Ok(());
        }
        if !self.is_resizable() {
            return Err(TensorError::IllegalResize {
                from: self.shape().clone(),
                to: Shape::from(dims),
            });
        }
        let required = Shape::from(dims).size_bytes(self.dtype());
        if required > self.data.len() {
            return Err(TensorError::ResizeExceedsCapacity {
                to: Shape::from(dims),
                required,
                capacity: self.data.len(),
            });
        }
        self.desc.set_contiguous_shape(dims);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &*self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut *self.data
    }

    /// Reborrows as a read-only view.
    pub fn as_view(&self) -> TensorRef<'_> {
        TensorRef {
            desc: &*self.desc,
            data: &*self.data,
        }
    }

    /// Reborrows as a shorter-lived writable view with the same capability.
    pub fn reborrow(&mut self) -> TensorMut<'_> {
        TensorMut {
            desc: &mut *self.desc,
            data: &mut *self.data,
            pinned: self.pinned,
        }
    }

    /// Overwrites the elements with `values`, which must match dtype and numel.
    pub fn write_values<T: Element>(&mut self, values: &[T]) -> Result<(), TensorError> {
        if T::SCALAR_TYPE != self.dtype() {
            return Err(TensorError::DTypeMismatch {
                expected: self.dtype(),
                actual: T::SCALAR_TYPE,
            });
        }
        if values.len() != self.numel() {
            return Err(TensorError::BufferSizeMismatch {
                expected: self.numel() * T::SIZE,
                actual: values.len() * T::SIZE,
            });
        }
        for (i, v) in values.iter().enumerate() {
            v.write(&mut self.data[i * T::SIZE..]);
        }
        Ok(())
    }
}

/// An owned, contiguous tensor.
///
/// Used for caller-provided inputs, copied-out outputs and constants built
/// on the exporter side.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    desc: TensorDescriptor,
    data: Vec<u8>,
}

impl Tensor {
    /// Creates a new tensor filled with zeros.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, ScalarType};
    /// let t = Tensor::zeros([2, 3], ScalarType::F32);
    /// assert_eq!(t.size_bytes(), 24);
    /// ```
    pub fn zeros(shape: impl Into<Shape>, dtype: ScalarType) -> Self {
        let desc = TensorDescriptor::new(shape, dtype);
        let data = vec![0u8; desc.nbytes()];
        Self { desc, data }
    }

    /// Creates a tensor from raw native-endian bytes.
    pub fn from_bytes(
        shape: impl Into<Shape>,
        dtype: ScalarType,
        data: Vec<u8>,
    ) -> Result<Self, TensorError> {
        let desc = TensorDescriptor::new(shape, dtype);
        if data.len() != desc.nbytes() {
            return Err(TensorError::BufferSizeMismatch {
                expected: desc.nbytes(),
                actual: data.len(),
            });
        }
        Ok(Self { desc, data })
    }

    /// Creates a tensor from typed values.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Tensor;
    /// let t = Tensor::from_slice([3], &[1i32, 2, 3]).unwrap();
    /// assert_eq!(t.to_vec::<i32>().unwrap(), vec![1, 2, 3]);
    /// ```
    pub fn from_slice<T: Element>(shape: impl Into<Shape>, values: &[T]) -> Result<Self, TensorError> {
        let desc = TensorDescriptor::new(shape, T::SCALAR_TYPE);
        if values.len() != desc.numel() {
            return Err(TensorError::BufferSizeMismatch {
                expected: desc.nbytes(),
                actual: values.len() * T::SIZE,
            });
        }
        let mut data = vec![0u8; desc.nbytes()];
        for (i, v) in values.iter().enumerate() {
            v.write(&mut data[i * T::SIZE..]);
        }
        Ok(Self { desc, data })
    }

    /// Creates a rank-0 tensor holding `value`.
    pub fn scalar<T: Element>(value: T) -> Self {
        let desc = TensorDescriptor::new(Shape::scalar(), T::SCALAR_TYPE);
        let mut data = vec![0u8; T::SIZE];
        value.write(&mut data);
        Self { desc, data }
    }

    /// Marks the tensor as resizable within its current byte capacity.
    pub fn with_dynamism(mut self, dynamism: ShapeDynamism) -> Self {
        self.desc.dynamism = dynamism;
        self
    }

    pub fn descriptor(&self) -> &TensorDescriptor {
        &self.desc
    }

    pub fn shape(&self) -> &Shape {
        &self.desc.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.desc.dims()
    }

    pub fn dtype(&self) -> ScalarType {
        self.desc.dtype
    }

    pub fn numel(&self) -> usize {
        self.desc.numel()
    }

    /// Returns the byte size of the backing buffer.
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Returns a read-only view.
    pub fn view(&self) -> TensorRef<'_> {
        TensorRef {
            desc: &self.desc,
            data: &self.data,
        }
    }

    /// Returns a writable view. Resizable only if the tensor is `DynamicBound`.
    pub fn view_mut(&mut self) -> TensorMut<'_> {
        TensorMut {
            desc: &mut self.desc,
            data: &mut self.data,
            pinned: false,
        }
    }

    /// Reads all elements in row-major order.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, TensorError> {
        self.view().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let t = Tensor::zeros(Shape::matrix(2, 3), ScalarType::F32);
        assert_eq!(t.size_bytes(), 24);
        assert_eq!(t.dtype(), ScalarType::F32);
        assert!(t.to_vec::<f32>().unwrap().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_from_slice_and_dtype_guard() {
        let t = Tensor::from_slice([2, 2], &[1i64, 2, 3, 4]).unwrap();
        assert_eq!(t.to_vec::<i64>().unwrap(), vec![1, 2, 3, 4]);
        assert!(matches!(
            t.to_vec::<i32>(),
            Err(TensorError::DTypeMismatch { .. })
        ));
        assert!(Tensor::from_slice([3], &[1u8, 2]).is_err());
    }

    #[test]
    fn test_from_bytes_size_mismatch() {
        let result = Tensor::from_bytes(Shape::matrix(2, 3), ScalarType::F32, vec![0u8; 10]);
        assert!(result.is_err());
    }

    #[test]
    fn test_strided_ref_reads_logical_order() {
        // Transpose of [[1, 2, 3], [4, 5, 6]].
        let storage = Tensor::from_slice([6], &[1i32, 2, 3, 4, 5, 6]).unwrap();
        let desc = TensorDescriptor::with_strides([3, 2], vec![1, 3], ScalarType::I32).unwrap();
        assert!(!desc.is_contiguous());
        let view = TensorRef::new(&desc, storage.as_bytes()).unwrap();
        assert_eq!(view.to_vec::<i32>().unwrap(), vec![1, 4, 2, 5, 3, 6]);

        let owned = view.to_tensor().unwrap();
        assert!(owned.descriptor().is_contiguous());
        assert_eq!(owned.to_vec::<i32>().unwrap(), vec![1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn test_stride_zero_view() {
        let storage = Tensor::from_slice([1], &[7u8]).unwrap();
        let desc = TensorDescriptor::with_strides([4], vec![0], ScalarType::U8).unwrap();
        assert_eq!(desc.storage_span_bytes(), 1);
        let view = TensorRef::new(&desc, storage.as_bytes()).unwrap();
        assert_eq!(view.to_vec::<u8>().unwrap(), vec![7, 7, 7, 7]);
    }

    #[test]
    fn test_ref_rejects_short_buffer() {
        let desc = TensorDescriptor::new([4], ScalarType::F64);
        let bytes = [0u8; 16];
        assert!(TensorRef::new(&desc, &bytes).is_err());
    }

    #[test]
    fn test_rank_mismatch() {
        let err = TensorDescriptor::with_strides([2, 2], vec![1], ScalarType::F32).unwrap_err();
        assert!(matches!(err, TensorError::RankMismatch { shape: 2, strides: 1 }));
    }

    #[test]
    fn test_unaddressable_descriptor_rejected() {
        let half = usize::MAX / 2;
        let err = TensorDescriptor::try_new([half, half], ScalarType::F32).unwrap_err();
        assert!(matches!(err, TensorError::SizeOverflow { dtype: ScalarType::F32, .. }));
        assert!(TensorDescriptor::try_new([isize::MAX as usize], ScalarType::I16).is_err());
        assert!(TensorDescriptor::try_new([0, half, half], ScalarType::F32).is_ok());

        let err = TensorDescriptor::with_strides([2, 2], vec![half, 1], ScalarType::U8).unwrap_err();
        assert!(matches!(err, TensorError::SizeOverflow { .. }));
        assert_eq!(err.kind(), crate::TensorErrorKind::Shape);
    }

    #[test]
    fn test_static_resize_rejected() {
        let mut t = Tensor::zeros([4], ScalarType::I32);
        let mut out = t.view_mut();
        assert!(out.resize(&[4]).is_ok());
        assert!(matches!(
            out.resize(&[2]),
            Err(TensorError::IllegalResize { .. })
        ));
    }

    #[test]
    fn test_dynamic_resize_within_capacity() {
        let mut t = Tensor::zeros([2, 4], ScalarType::F32).with_dynamism(ShapeDynamism::DynamicBound);
        let mut out = t.view_mut();
        out.resize(&[3, 2]).unwrap();
        assert_eq!(out.dims(), &[3, 2]);
        assert!(matches!(
            out.resize(&[3, 3]),
            Err(TensorError::ResizeExceedsCapacity { .. })
        ));
        assert_eq!(t.dims(), &[3, 2]);
    }

    #[test]
    fn test_pinned_view_never_resizes() {
        let mut t = Tensor::zeros([4], ScalarType::F32).with_dynamism(ShapeDynamism::DynamicBound);
        let mut out = t.view_mut().fixed();
        assert!(!out.is_resizable());
        assert!(out.resize(&[2]).is_err());
    }

    #[test]
    fn test_write_values() {
        let mut t = Tensor::zeros([3], ScalarType::I16);
        t.view_mut().write_values(&[5i16, -1, 2]).unwrap();
        assert_eq!(t.to_vec::<i16>().unwrap(), vec![5, -1, 2]);
        assert!(t.view_mut().write_values(&[1.0f32; 3]).is_err());
    }

    #[test]
    fn test_reborrow_keeps_pin() {
        let mut t = Tensor::zeros([4], ScalarType::F32).with_dynamism(ShapeDynamism::DynamicBound);
        let mut out = t.view_mut().fixed();
        assert!(!out.reborrow().is_resizable());
        out.reborrow().write_values(&[1.0f32, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(t.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
