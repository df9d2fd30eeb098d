// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocation statistics for profiling and diagnostics.

/// Cumulative counters for one [`MemoryPool`](crate::MemoryPool).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct AllocationStats {
    /// Allocation requests that succeeded.
    pub allocations: u64,
    /// Successful requests served from the free list.
    pub cache_hits: u64,
    /// Requests rejected because the budget was exhausted.
    pub oom_count: u64,
    /// Buffers returned to the pool.
    pub releases: u64,
    /// High-water mark of live bytes.
    pub peak_allocated_bytes: usize,
}

impl AllocationStats {
    /// Fraction of successful allocations served from the free list.
    pub fn cache_hit_ratio(&self) -> f64 {
        if self.allocations == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.allocations as f64
        }
    }

    pub(crate) fn record_allocation(&mut self, reused: bool, live_bytes: usize) {
        self.allocations += 1;
        if reused {
            self.cache_hits += 1;
        }
        self.peak_allocated_bytes = self.peak_allocated_bytes.max(live_bytes);
    }

    pub(crate) fn record_oom(&mut self) {
        self.oom_count += 1;
    }

    pub(crate) fn record_release(&mut self) {
        self.releases += 1;
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{} allocations ({:.0}% reused), {} released, {} OOMs, peak {:.1} KB",
            self.allocations,
            self.cache_hit_ratio() * 100.0,
            self.releases,
            self.oom_count,
            self.peak_allocated_bytes as f64 / 1024.0,
        )
    }
}
