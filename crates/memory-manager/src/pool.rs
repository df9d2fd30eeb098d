// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Budget-enforced buffer pool.
//!
//! The [`MemoryPool`] is the single source of arena storage for a runtime.
//! It:
//!
//! 1. Reserves bytes against a hard [`MemoryBudget`] atomically, so
//!    concurrent context creation can never overshoot it.
//! 2. Keeps returned buffers on a free list binned by power-of-two size
//!    class, so recreating a context for the same program does not touch
//!    the system allocator.
//! 3. Tracks [`AllocationStats`].
//!
//! `MemoryPool` is `Send + Sync` and shared as `Arc<MemoryPool>`.

use crate::{AllocationStats, BufferGuard, MemoryBudget, MemoryError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Smallest size class: 4 KB.
const MIN_SIZE_CLASS: usize = 4096;

/// Pool state shared with every outstanding [`BufferGuard`].
pub struct PoolInner {
    budget: MemoryBudget,
    allocated_bytes: AtomicUsize,
    free_buffers: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
    stats: Mutex<AllocationStats>,
}

impl PoolInner {
    /// Called by `BufferGuard::drop`.
    pub(crate) fn return_buffer(&self, buffer: Vec<u8>, size_bytes: usize) {
        self.allocated_bytes.fetch_sub(size_bytes, Ordering::AcqRel);
        if let Ok(mut stats) = self.stats.lock() {
            stats.record_release();
        }
        if let Ok(mut free) = self.free_buffers.lock() {
            free.entry(size_class_for(size_bytes))
                .or_default()
                .push(buffer);
        }
    }

    /// Reserves `size_bytes` against the budget or reports how much is left.
    fn reserve(&self, size_bytes: usize) -> Result<usize, MemoryError> {
        let budget = self.budget.as_bytes();
        self.allocated_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current
                    .checked_add(size_bytes)
                    .filter(|&next| next <= budget)
            })
            .map(|previous| previous + size_bytes)
            .map_err(|current| MemoryError::OutOfMemory {
                requested_bytes: size_bytes,
                available_bytes: budget.saturating_sub(current),
                budget_bytes: budget,
            })
    }

    fn take_cached(&self, size_bytes: usize) -> Option<Vec<u8>> {
        let mut free = self.free_buffers.lock().ok()?;
        free.get_mut(&size_class_for(size_bytes))?.pop()
    }
}

/// The allocator behind every execution context's arenas.
///
/// # Example
/// ```
/// use memory_manager::{MemoryPool, MemoryBudget};
///
/// let pool = MemoryPool::new(MemoryBudget::from_mb(1));
/// let guard = pool.allocate(4096).unwrap();
/// assert_eq!(pool.allocated_bytes(), 4096);
/// drop(guard);
/// assert_eq!(pool.allocated_bytes(), 0);
/// ```
pub struct MemoryPool {
    inner: Arc<PoolInner>,
}

impl MemoryPool {
    pub fn new(budget: MemoryBudget) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                budget,
                allocated_bytes: AtomicUsize::new(0),
                free_buffers: Mutex::new(HashMap::new()),
                stats: Mutex::new(AllocationStats::default()),
            }),
        }
    }

    /// Allocates a zero-filled buffer of `size_bytes`.
    ///
    /// # Errors
    /// - [`MemoryError::ZeroSizedAllocation`] for `size_bytes == 0`.
    /// - [`MemoryError::OutOfMemory`] if the budget cannot cover the request.
    pub fn allocate(&self, size_bytes: usize) -> Result<BufferGuard, MemoryError> {
        if size_bytes == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }

        let live = match self.inner.reserve(size_bytes) {
            Ok(live) => live,
            Err(e) => {
                warn!(size_bytes, budget = %self.inner.budget, "arena allocation exceeds budget");
                if let Ok(mut stats) = self.inner.stats.lock() {
                    stats.record_oom();
                }
                return Err(e);
            }
        };

        let cached = self.inner.take_cached(size_bytes);
        let reused = cached.is_some();
        let data = match cached {
            Some(mut buf) => {
                if buf.len() < size_bytes {
                    buf.resize(size_bytes, 0);
                }
                buf[..size_bytes].fill(0);
                buf
            }
            None => vec![0u8; size_bytes],
        };

        if let Ok(mut stats) = self.inner.stats.lock() {
            stats.record_allocation(reused, live);
        }
        debug!(size_bytes, reused, live, "allocated pool buffer");

        Ok(BufferGuard::new(data, Arc::clone(&self.inner), size_bytes))
    }

    /// Bytes currently held by live guards.
    pub fn allocated_bytes(&self) -> usize {
        self.inner.allocated_bytes.load(Ordering::Acquire)
    }

    pub fn available_bytes(&self) -> usize {
        self.inner
            .budget
            .as_bytes()
            .saturating_sub(self.allocated_bytes())
    }

    pub fn budget(&self) -> MemoryBudget {
        self.inner.budget
    }

    pub fn stats(&self) -> AllocationStats {
        self.inner
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Drops every cached free buffer.
    pub fn shrink(&self) {
        if let Ok(mut free) = self.inner.free_buffers.lock() {
            free.clear();
        }
    }

    /// Bytes held on the free list.
    pub fn free_list_bytes(&self) -> usize {
        self.inner
            .free_buffers
            .lock()
            .map(|free| free.values().flatten().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

/// Smallest power of two that is at least `size` and [`MIN_SIZE_CLASS`].
fn size_class_for(size: usize) -> usize {
    size.max(MIN_SIZE_CLASS).next_power_of_two()
}

impl std::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("budget", &self.inner.budget)
            .field("allocated_bytes", &self.allocated_bytes())
            .finish()
    }
}
