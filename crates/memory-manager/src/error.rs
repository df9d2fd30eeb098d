// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for arena allocation and region borrowing.

/// Errors that can occur while allocating arenas or borrowing regions of them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// The requested allocation would exceed the memory budget.
    #[error("out of memory: requested {requested_bytes} bytes, but only {available_bytes} available (budget: {budget_bytes})")]
    OutOfMemory {
        requested_bytes: usize,
        available_bytes: usize,
        budget_bytes: usize,
    },

    /// Attempted to allocate a zero-sized buffer.
    #[error("cannot allocate zero-sized buffer")]
    ZeroSizedAllocation,

    /// A budget string could not be parsed.
    #[error("invalid memory budget '{0}': expected a number followed by an optional K, M or G suffix")]
    InvalidBudget(String),

    /// Two arenas were declared with the same memory id.
    #[error("arena {memory_id} declared twice")]
    DuplicateArena { memory_id: u32 },

    /// A region names an arena that was never allocated.
    #[error("no arena with memory id {memory_id}")]
    UnknownArena { memory_id: u32 },

    /// A region extends past the end of its arena.
    #[error("region [{offset}, {offset}+{len}) exceeds arena {memory_id} capacity {capacity}")]
    RegionOutOfBounds {
        memory_id: u32,
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// A mutable region overlaps another region borrowed at the same time.
    #[error("arena {memory_id}: region at offset {offset} overlaps a mutable region at offset {other}")]
    OverlappingRegions {
        memory_id: u32,
        offset: usize,
        other: usize,
    },
}
