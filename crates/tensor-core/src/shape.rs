// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor shapes and row-major stride computation.

use crate::ScalarType;
use std::fmt;

/// The dimension sizes of a tensor.
///
/// A rank-0 shape describes a single element. Any zero-sized dimension makes
/// the tensor empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Creates a new shape from the given dimensions.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::new(vec![2, 3, 4]);
    /// assert_eq!(s.rank(), 3);
    /// assert_eq!(s.num_elements(), 24);
    /// ```
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Creates a scalar shape (rank 0).
    pub fn scalar() -> Self {
        Self { dims: vec![] }
    }

    /// Creates a 2-D shape.
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self {
            dims: vec![rows, cols],
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the total number of elements (1 for rank 0).
    ///
    /// Saturates at `usize::MAX`; use [`Shape::checked_num_elements`] on
    /// untrusted shapes.
    pub fn num_elements(&self) -> usize {
        self.checked_num_elements().unwrap_or(usize::MAX)
    }

    /// Returns the total number of elements, or `None` on overflow.
    pub fn checked_num_elements(&self) -> Option<usize> {
        if self.dims.contains(&0) {
            return Some(0);
        }
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Computes the contiguous footprint in bytes for a given element type.
    pub fn size_bytes(&self, dtype: ScalarType) -> usize {
        self.checked_size_bytes(dtype).unwrap_or(usize::MAX)
    }

    /// Contiguous footprint in bytes, or `None` on overflow.
    pub fn checked_size_bytes(&self, dtype: ScalarType) -> Option<usize> {
        self.checked_num_elements()?.checked_mul(dtype.element_size())
    }

    /// Computes row-major (C-order) strides, in elements.
    pub fn strides(&self) -> Vec<usize> {
        contiguous_strides(&self.dims)
    }

    /// Returns `true` if two shapes can be broadcast against each other.
    pub fn is_broadcast_compatible(&self, other: &Shape) -> bool {
        crate::broadcast_shapes(&[self.dims(), other.dims()]).is_ok()
    }
}

/// Row-major strides for `dims`.
///
/// The stride for dimension `i` is the number of elements to skip in the
/// flat buffer to advance one step along that dimension. Strides saturate
/// at `usize::MAX`, which only happens for shapes with a zero-sized
/// dimension or shapes whose footprint already overflows.
pub fn contiguous_strides(dims: &[usize]) -> Vec<usize> {
    let rank = dims.len();
    let mut strides = vec![0usize; rank];
    let mut acc = 1usize;
    for i in (0..rank).rev() {
        strides[i] = acc;
        acc = acc.saturating_mul(dims[i].max(1));
    }
    strides
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Self::new(dims.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_shape() {
        let s = Shape::scalar();
        assert_eq!(s.rank(), 0);
        assert_eq!(s.num_elements(), 1);
        assert!(s.strides().is_empty());
    }

    #[test]
    fn test_matrix_shape() {
        let s = Shape::matrix(3, 4);
        assert_eq!(s.num_elements(), 12);
        assert_eq!(s.strides(), vec![4, 1]);
        assert_eq!(s.size_bytes(ScalarType::F32), 48);
        assert_eq!(s.size_bytes(ScalarType::I16), 24);
    }

    #[test]
    fn test_3d_strides() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(s.strides(), vec![12, 4, 1]);
    }

    #[test]
    fn test_empty_dimension() {
        let s = Shape::new(vec![2, 0, 3]);
        assert_eq!(s.num_elements(), 0);
        assert_eq!(s.size_bytes(ScalarType::F64), 0);
        assert_eq!(s.strides(), vec![3, 3, 1]);
    }

    #[test]
    fn test_overflowing_shape() {
        let half = usize::MAX / 2;
        let s = Shape::new(vec![half, half]);
        assert_eq!(s.checked_num_elements(), None);
        assert_eq!(s.checked_size_bytes(ScalarType::F32), None);
        assert_eq!(s.num_elements(), usize::MAX);
        assert_eq!(s.strides(), vec![half, 1]);

        let elements = Shape::new(vec![usize::MAX / 4]);
        assert_eq!(elements.checked_num_elements(), Some(usize::MAX / 4));
        assert_eq!(elements.checked_size_bytes(ScalarType::F64), None);

        let empty = Shape::new(vec![0, usize::MAX, usize::MAX]);
        assert_eq!(empty.checked_size_bytes(ScalarType::F64), Some(0));
    }

    #[test]
    fn test_broadcast_compatible() {
        let a = Shape::new(vec![1, 3]);
        assert!(a.is_broadcast_compatible(&Shape::new(vec![4, 3])));
        assert!(a.is_broadcast_compatible(&Shape::new(vec![4, 1])));
        assert!(!a.is_broadcast_compatible(&Shape::new(vec![4, 2])));
    }

    #[test]
    fn test_display() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(format!("{s}"), "[2, 3, 4]");
        assert_eq!(format!("{}", Shape::scalar()), "[]");
    }

    #[test]
    fn test_from_conversions() {
        let s1: Shape = vec![2, 3].into();
        let s2: Shape = (&[2, 3][..]).into();
        let s3: Shape = [2, 3].into();
        assert_eq!(s1, s2);
        assert_eq!(s2, s3);
    }
}
