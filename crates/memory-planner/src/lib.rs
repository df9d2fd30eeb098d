// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-planner
//!
//! Offline placement of planned tensors into arenas, and the verification
//! the loader runs on an embedded plan.
//!
//! # Strategies
//!
//! | Strategy | Reuse | Arena size |
//! |---|---|---|
//! | [`GreedyBestFit`] | yes, best-fit with coalescing | close to [`min_peak_bytes`] |
//! | [`Naive`] | none | sum of all values |
//!
//! All strategies implement [`PlanningStrategy`]:
//!
//! ```
//! use memory_planner::{GreedyBestFit, PlanningStrategy, TensorLifetime};
//!
//! let lifetimes = [
//!     TensorLifetime { value: 0, first_use: 0, last_use: 1, size_bytes: 64, memory_id: 0 },
//!     TensorLifetime { value: 1, first_use: 1, last_use: 2, size_bytes: 64, memory_id: 0 },
//!     TensorLifetime { value: 2, first_use: 2, last_use: 3, size_bytes: 64, memory_id: 0 },
//! ];
//! let plan = GreedyBestFit::default().plan(&lifetimes).unwrap();
//! assert_eq!(plan.peak_bytes(), 128);
//! ```

mod error;
mod lifetime;
mod plan;
pub mod strategy;

pub use error::PlannerError;
pub use lifetime::{min_peak_bytes, TensorLifetime};
pub use plan::{align_up, Allocation, ArenaSpec, MemoryPlan};
pub use strategy::greedy::GreedyBestFit;
pub use strategy::naive::Naive;
pub use strategy::PlanningStrategy;
