// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Bump allocation without reuse.
//!
//! Every value gets its own bytes, so the arena size is the sum of all
//! (aligned) value sizes. Useful as a baseline and when debugging a
//! suspected aliasing problem.

use crate::plan::align_up;
use crate::strategy::{check_alignment, PlanningStrategy};
use crate::{Allocation, ArenaSpec, MemoryPlan, PlannerError, TensorLifetime};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Naive {
    pub alignment: usize,
}

impl Default for Naive {
    fn default() -> Self {
        Self { alignment: 16 }
    }
}

impl PlanningStrategy for Naive {
    fn name(&self) -> &str {
        "naive"
    }

    fn plan(&self, lifetimes: &[TensorLifetime]) -> Result<MemoryPlan, PlannerError> {
        check_alignment(self.alignment)?;
        let mut tops: BTreeMap<u32, usize> = BTreeMap::new();
        let mut allocations = Vec::with_capacity(lifetimes.len());
        for lt in lifetimes {
            let top = tops.entry(lt.memory_id).or_insert(0);
            allocations.push(Allocation::at(lt, *top));
            *top += align_up(lt.size_bytes, self.alignment);
        }
        let plan = MemoryPlan {
            strategy_name: self.name().to_string(),
            arenas: tops
                .into_iter()
                .map(|(memory_id, capacity)| ArenaSpec {
                    memory_id,
                    capacity,
                })
                .collect(),
            allocations,
        };
        plan.validate()?;
        Ok(plan)
    }
}
