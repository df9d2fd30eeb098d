// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Greedy best-fit placement.
//!
//! Values are processed in order of first use (larger values first on
//! ties). Before placing a value, every allocation whose lifetime ended
//! at an earlier step is returned to its arena's free list, merging with
//! free neighbours. The value then takes the smallest free range that
//! fits. If none fits and the highest free range touches the arena's end,
//! that range is extended; otherwise the arena grows.
//!
//! # Memory Model
//!
//! ```text
//! arena capacity = top after the last placement
//!                ≥ max over steps of live bytes (see `min_peak_bytes`)
//! ```
//!
//! For equal-sized values this is exactly the lower bound: a range is
//! only added when every existing one is occupied.

use crate::plan::align_up;
use crate::strategy::{check_alignment, PlanningStrategy};
use crate::{Allocation, ArenaSpec, MemoryPlan, PlannerError, TensorLifetime};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::debug;

/// Greedy best-fit with free-range coalescing.
#[derive(Debug, Clone)]
pub struct GreedyBestFit {
    /// Every placement is rounded up to this many bytes.
    pub alignment: usize,
}

impl GreedyBestFit {
    pub fn new(alignment: usize) -> Self {
        Self { alignment }
    }
}

impl Default for GreedyBestFit {
    fn default() -> Self {
        Self { alignment: 16 }
    }
}

#[derive(Debug, Clone, Copy)]
struct Block {
    offset: usize,
    size: usize,
}

impl Block {
    fn end(&self) -> usize {
        self.offset + self.size
    }
}

#[derive(Debug, Default)]
struct ArenaState {
    /// Sorted by offset, never adjacent.
    free: Vec<Block>,
    /// `(last_use, block)` for placed values.
    live: Vec<(usize, Block)>,
    top: usize,
}

impl ArenaState {
    fn retire_before(&mut self, step: usize) {
        let mut i = 0;
        while i < self.live.len() {
            if self.live[i].0 < step {
                let (_, block) = self.live.swap_remove(i);
                self.release(block);
            } else {
                i += 1;
            }
        }
    }

    fn release(&mut self, block: Block) {
        let pos = self.free.partition_point(|b| b.offset < block.offset);
        self.free.insert(pos, block);
        if pos + 1 < self.free.len() && self.free[pos].end() == self.free[pos + 1].offset {
            self.free[pos].size += self.free[pos + 1].size;
            self.free.remove(pos + 1);
        }
        if pos > 0 && self.free[pos - 1].end() == self.free[pos].offset {
            self.free[pos - 1].size += self.free[pos].size;
            self.free.remove(pos);
        }
    }

    fn place(&mut self, size: usize) -> usize {
        let best = self
            .free
            .iter()
            .enumerate()
            .filter(|(_, b)| b.size >= size)
            .min_by_key(|(_, b)| (b.size, b.offset))
            .map(|(i, _)| i);

        if let Some(i) = best {
            let offset = self.free[i].offset;
            if self.free[i].size == size {
                self.free.remove(i);
            } else {
                self.free[i].offset += size;
                self.free[i].size -= size;
            }
            return offset;
        }

        if let Some(last) = self.free.last().copied() {
            if last.end() == self.top {
                self.free.pop();
                self.top = last.offset + size;
                return last.offset;
            }
        }

        let offset = self.top;
        self.top += size;
        offset
    }
}

impl PlanningStrategy for GreedyBestFit {
    fn name(&self) -> &str {
        "greedy-best-fit"
    }

    fn plan(&self, lifetimes: &[TensorLifetime]) -> Result<MemoryPlan, PlannerError> {
        check_alignment(self.alignment)?;

        let mut order: Vec<&TensorLifetime> = lifetimes.iter().collect();
        order.sort_by_key(|lt| (lt.first_use, Reverse(lt.size_bytes), lt.value));

        let mut arenas: BTreeMap<u32, ArenaState> = BTreeMap::new();
        let mut allocations = Vec::with_capacity(lifetimes.len());
        let mut unused = Vec::new();

        for lt in order {
            let state = arenas.entry(lt.memory_id).or_default();
            let size = align_up(lt.size_bytes, self.alignment);
            if lt.is_empty() || size == 0 {
                unused.push((lt, size));
                continue;
            }
            state.retire_before(lt.first_use);
            let offset = state.place(size);
            state.live.push((lt.last_use, Block { offset, size }));
            allocations.push(Allocation::at(lt, offset));
        }

        // Never-live values conflict with nothing; they only need to fit.
        for (lt, size) in unused {
            let state = arenas.entry(lt.memory_id).or_default();
            state.top = state.top.max(size);
            allocations.push(Allocation::at(lt, 0));
        }
        allocations.sort_by_key(|a| a.value);

        let plan = MemoryPlan {
            strategy_name: self.name().to_string(),
            arenas: arenas
                .into_iter()
                .map(|(memory_id, state)| ArenaSpec {
                    memory_id,
                    capacity: state.top,
                })
                .collect(),
            allocations,
        };
        debug!(
            strategy = self.name(),
            values = lifetimes.len(),
            arenas = plan.arenas.len(),
            peak_bytes = plan.peak_bytes(),
            "memory plan computed"
        );
        plan.validate()?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{min_peak_bytes, Naive};
    use proptest::prelude::*;

    fn lt(value: usize, first: usize, last: usize, size: usize) -> TensorLifetime {
        TensorLifetime {
            value,
            first_use: first,
            last_use: last,
            size_bytes: size,
            memory_id: 0,
        }
    }

    fn offsets(plan: &MemoryPlan) -> Vec<usize> {
        plan.allocations.iter().map(|a| a.offset).collect()
    }

    #[test]
    fn test_chain_reuses_bytes() {
        let lts = [lt(0, 0, 1, 100), lt(1, 1, 2, 100), lt(2, 2, 3, 100)];
        let plan = GreedyBestFit::default().plan(&lts).unwrap();
        assert_eq!(offsets(&plan), vec![0, 112, 0]);
        assert_eq!(plan.peak_bytes(), 224);
    }

    #[test]
    fn test_equal_sizes_reach_lower_bound() {
        let lts = [
            lt(0, 0, 2, 64),
            lt(1, 1, 3, 64),
            lt(2, 2, 4, 64),
            lt(3, 3, 5, 64),
            lt(4, 4, 6, 64),
            lt(5, 0, 6, 64),
        ];
        let plan = GreedyBestFit::default().plan(&lts).unwrap();
        assert_eq!(plan.peak_bytes(), min_peak_bytes(&lts));
        assert_eq!(plan.peak_bytes(), 4 * 64);
    }

    #[test]
    fn test_extends_top_free_block() {
        let lts = [lt(0, 0, 0, 32), lt(1, 1, 1, 64)];
        let plan = GreedyBestFit::default().plan(&lts).unwrap();
        assert_eq!(offsets(&plan), vec![0, 0]);
        assert_eq!(plan.peak_bytes(), 64);
    }

    #[test]
    fn test_picks_smallest_fitting_range() {
        let lts = [
            lt(0, 0, 0, 64),
            lt(1, 0, 5, 48),
            lt(2, 0, 0, 32),
            lt(3, 0, 5, 16),
            lt(4, 1, 2, 32),
        ];
        let plan = GreedyBestFit::default().plan(&lts).unwrap();
        // Step 0 leaves free ranges [0, 64) and [112, 144) for step 1.
        assert_eq!(offsets(&plan), vec![0, 64, 112, 144, 112]);
        assert_eq!(plan.peak_bytes(), 160);
    }

    #[test]
    fn test_unused_and_zero_sized_values() {
        let lts = [lt(0, 3, 1, 500), lt(1, 0, 4, 0), lt(2, 0, 4, 16)];
        let plan = GreedyBestFit::default().plan(&lts).unwrap();
        assert_eq!(offsets(&plan), vec![0, 0, 0]);
        assert_eq!(plan.capacity(0), Some(512));
    }

    #[test]
    fn test_separate_arenas() {
        let mut b = lt(1, 0, 1, 48);
        b.memory_id = 1;
        let plan = GreedyBestFit::default().plan(&[lt(0, 0, 1, 16), b]).unwrap();
        assert_eq!(plan.capacity(0), Some(16));
        assert_eq!(plan.capacity(1), Some(48));
        assert_eq!(offsets(&plan), vec![0, 0]);
    }

    fn arb_lifetimes() -> impl Strategy<Value = Vec<TensorLifetime>> {
        prop::collection::vec((0usize..24, 0usize..10, 0usize..600, 0u32..3), 0..40).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(value, (first, len, size, memory_id))| TensorLifetime {
                        value,
                        first_use: first,
                        last_use: first + len,
                        size_bytes: size,
                        memory_id,
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_greedy_plan_has_no_overlap(lts in arb_lifetimes()) {
            let plan = GreedyBestFit::default().plan(&lts).unwrap();
            prop_assert_eq!(plan.allocations.len(), lts.len());
            for (i, a) in plan.allocations.iter().enumerate() {
                for b in &plan.allocations[i + 1..] {
                    let live_together = a.memory_id == b.memory_id
                        && a.first_use <= b.last_use
                        && b.first_use <= a.last_use;
                    let share_bytes = a.size_bytes > 0
                        && b.size_bytes > 0
                        && a.offset < b.offset + b.size_bytes
                        && b.offset < a.offset + a.size_bytes;
                    prop_assert!(!(live_together && share_bytes), "{a:?} overlaps {b:?}");
                }
            }
        }

        #[test]
        fn prop_greedy_between_bound_and_naive(lts in arb_lifetimes()) {
            let greedy = GreedyBestFit::default().plan(&lts).unwrap();
            let naive = Naive::default().plan(&lts).unwrap();
            prop_assert!(greedy.peak_bytes() >= min_peak_bytes(&lts));
            prop_assert!(greedy.peak_bytes() <= naive.peak_bytes());
        }
    }
}
