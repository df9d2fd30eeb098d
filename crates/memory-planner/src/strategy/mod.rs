// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`PlanningStrategy`] trait and strategy implementations.

pub mod greedy;
pub mod naive;

use crate::{MemoryPlan, PlannerError, TensorLifetime};

/// Assigns arena offsets to a set of value lifetimes.
///
/// Strategies are purely algorithmic (no I/O, no allocation of the arenas
/// themselves), which keeps them unit- and property-testable. Every plan
/// they return must pass [`MemoryPlan::validate`].
pub trait PlanningStrategy: Send + Sync {
    /// Human-readable name, recorded in the plan.
    fn name(&self) -> &str;

    /// Places every lifetime and sizes every arena it touches.
    fn plan(&self, lifetimes: &[TensorLifetime]) -> Result<MemoryPlan, PlannerError>;
}

/// Fails unless `alignment` is a non-zero power of two.
pub(crate) fn check_alignment(alignment: usize) -> Result<(), PlannerError> {
    if alignment.is_power_of_two() {
        Ok(())
    } else {
        Err(PlannerError::InvalidAlignment(alignment))
    }
}
