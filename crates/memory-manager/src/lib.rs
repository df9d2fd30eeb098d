// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-manager
//!
//! Budget-enforced storage for execution-context arenas.
//!
//! # Key Components
//!
//! - [`MemoryBudget`]: a hard ceiling with human-readable parsing (`"64M"`).
//! - [`MemoryPool`]: the allocator. Enforces the budget, keeps a free list
//!   binned by size class and tracks [`AllocationStats`].
//! - [`BufferGuard`]: RAII ownership of one pool buffer.
//! - [`ArenaSet`]: the arenas of one context, keyed by memory id, with
//!   [`ArenaSet::borrow_regions`] for borrowing kernel arguments and results
//!   from the same arena at once.
//!
//! # Ownership Model
//!
//! ```text
//! ArenaSet::allocate(pool, plan)
//!       │
//!       ▼
//!   Vec<BufferGuard>  ◄─── each holds Arc<PoolInner>
//!       │
//!       │  drop(context)
//!       ▼
//!   PoolInner::return_buffer()  ──► free list
//! ```

mod arena;
mod budget;
mod error;
mod guard;
pub mod pool;
mod stats;

pub use arena::{split_disjoint, ArenaSet, Region};
pub use budget::MemoryBudget;
pub use error::MemoryError;
pub use guard::BufferGuard;
pub use pool::MemoryPool;
pub use stats::AllocationStats;
