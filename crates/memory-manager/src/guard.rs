// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII buffer guard that returns memory to the pool on drop.

use crate::pool::PoolInner;
use std::sync::Arc;

/// Exclusive ownership of one pool buffer.
///
/// The guard exposes exactly the requested number of bytes even when the
/// underlying buffer came from a larger size class. Dropping it returns the
/// buffer to the [`MemoryPool`](crate::MemoryPool) free list and releases
/// its budget reservation.
pub struct BufferGuard {
    data: Vec<u8>,
    pool: Arc<PoolInner>,
    size_bytes: usize,
}

impl BufferGuard {
    pub(crate) fn new(data: Vec<u8>, pool: Arc<PoolInner>, size_bytes: usize) -> Self {
        Self {
            data,
            pool,
            size_bytes,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.size_bytes]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.size_bytes]
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

impl Drop for BufferGuard {
    fn drop(&mut self) {
        let buffer = std::mem::take(&mut self.data);
        self.pool.return_buffer(buffer, self.size_bytes);
    }
}

impl std::fmt::Debug for BufferGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferGuard")
            .field("size_bytes", &self.size_bytes)
            .field("backing_bytes", &self.data.len())
            .finish()
    }
}
