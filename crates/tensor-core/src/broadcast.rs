// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Broadcast shape resolution and stride-0 operand addressing.
//!
//! Operands are never expanded in memory. Instead each operand gets a stride
//! vector aligned to the output rank, with stride 0 on every dimension it is
//! broadcast along. [`BroadcastCursor`] walks the output index space in
//! row-major order and yields the element offset of every operand at each
//! step, updating offsets incrementally so the per-element cost is O(1)
//! amortised.

use crate::{Shape, TensorError};

/// Computes the broadcast output shape of `shapes`.
///
/// Dimensions are aligned from the right. Each aligned group must be equal
/// or contain only the common size and 1.
///
/// # Examples
/// ```
/// use tensor_core::broadcast_shapes;
/// let out = broadcast_shapes(&[&[4, 1, 3], &[2, 1]]).unwrap();
/// assert_eq!(out, vec![4, 2, 3]);
/// assert!(broadcast_shapes(&[&[3], &[4]]).is_err());
/// ```
pub fn broadcast_shapes(shapes: &[&[usize]]) -> Result<Vec<usize>, TensorError> {
    let rank = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut out = vec![1usize; rank];
    for shape in shapes {
        let offset = rank - shape.len();
        for (i, &d) in shape.iter().enumerate() {
            let slot = &mut out[offset + i];
            if *slot == d || d == 1 {
                continue;
            }
            if *slot == 1 {
                *slot = d;
                continue;
            }
            return Err(TensorError::NotBroadcastable {
                shapes: shapes.iter().map(|s| Shape::from(*s)).collect(),
            });
        }
    }
    Ok(out)
}

/// Aligns an operand's strides to `out_dims`, zeroing broadcast dimensions.
pub fn broadcast_strides(out_dims: &[usize], dims: &[usize], strides: &[usize]) -> Vec<usize> {
    debug_assert!(dims.len() <= out_dims.len());
    debug_assert_eq!(dims.len(), strides.len());
    let offset = out_dims.len() - dims.len();
    (0..out_dims.len())
        .map(|i| {
            if i < offset || dims[i - offset] == 1 {
                0
            } else {
                strides[i - offset]
            }
        })
        .collect()
}

/// Iterates the output index space of a broadcast operation.
///
/// Yields, for each output element in row-major order, the element offset
/// of each of the `N` operands.
#[derive(Debug, Clone)]
pub struct BroadcastCursor<const N: usize> {
    dims: Vec<usize>,
    index: Vec<usize>,
    strides: [Vec<usize>; N],
    offsets: [usize; N],
    remaining: usize,
}

impl<const N: usize> BroadcastCursor<N> {
    /// Creates a cursor over `out_dims` for operands given as `(dims, strides)`.
    ///
    /// Operand shapes must already be broadcast-compatible with `out_dims`.
    pub fn new(out_dims: &[usize], operands: [(&[usize], &[usize]); N]) -> Self {
        let strides =
            std::array::from_fn(|k| broadcast_strides(out_dims, operands[k].0, operands[k].1));
        Self {
            dims: out_dims.to_vec(),
            index: vec![0; out_dims.len()],
            strides,
            offsets: [0; N],
            remaining: out_dims.iter().product(),
        }
    }

    fn advance(&mut self) {
        for d in (0..self.dims.len()).rev() {
            self.index[d] += 1;
            if self.index[d] < self.dims[d] {
                for k in 0..N {
                    self.offsets[k] += self.strides[k][d];
                }
                return;
            }
            self.index[d] = 0;
            for k in 0..N {
                self.offsets[k] -= self.strides[k][d] * (self.dims[d] - 1);
            }
        }
    }
}

impl<const N: usize> Iterator for BroadcastCursor<N> {
    type Item = [usize; N];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.offsets;
        self.remaining -= 1;
        if self.remaining > 0 {
            self.advance();
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<const N: usize> ExactSizeIterator for BroadcastCursor<N> {}
