// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the memory planner.

/// Errors produced while building or verifying a memory plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlannerError {
    /// An allocation refers to an arena the plan does not declare.
    #[error("value {value} is placed in undeclared arena {memory_id}")]
    UnknownArena { value: usize, memory_id: u32 },

    /// The same memory id is declared more than once.
    #[error("arena {memory_id} declared more than once")]
    DuplicateArena { memory_id: u32 },

    /// An allocation runs past the end of its arena.
    #[error("value {value} ends at byte {end} but arena {memory_id} holds {capacity}")]
    ExceedsCapacity {
        value: usize,
        memory_id: u32,
        end: usize,
        capacity: usize,
    },

    /// Two simultaneously live values share bytes.
    #[error("values {first} and {second} are live at the same time and overlap in arena {memory_id}")]
    Overlap {
        memory_id: u32,
        first: usize,
        second: usize,
    },

    /// Alignment must be a non-zero power of two.
    #[error("alignment {0} is not a power of two")]
    InvalidAlignment(usize),
}
