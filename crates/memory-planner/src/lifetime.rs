// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Value lifetimes over the instruction chain.

use std::collections::BTreeMap;

/// The inclusive step interval during which a value's bytes must survive.
///
/// Step `k` is the `k`-th instruction. A lifetime with `first_use >
/// last_use` is empty: the value is never touched and conflicts with
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TensorLifetime {
    /// Index of the value in the program's value table.
    pub value: usize,
    pub first_use: usize,
    pub last_use: usize,
    pub size_bytes: usize,
    pub memory_id: u32,
}

impl TensorLifetime {
    pub fn is_empty(&self) -> bool {
        self.first_use > self.last_use
    }

    /// `true` when both lifetimes are non-empty and share a step.
    pub fn intersects(&self, other: &TensorLifetime) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.first_use <= other.last_use
            && other.first_use <= self.last_use
    }
}

/// Lower bound on total arena bytes: for each arena, the largest sum of
/// sizes live at any one step, summed over arenas.
pub fn min_peak_bytes(lifetimes: &[TensorLifetime]) -> usize {
    let mut per_arena: BTreeMap<u32, Vec<&TensorLifetime>> = BTreeMap::new();
    for lt in lifetimes.iter().filter(|lt| !lt.is_empty()) {
        per_arena.entry(lt.memory_id).or_default().push(lt);
    }

    per_arena
        .values()
        .map(|lts| {
            // Sweep over +size at first_use and -size after last_use.
            let mut events: Vec<(usize, isize)> = Vec::with_capacity(lts.len() * 2);
            for lt in lts {
                events.push((lt.first_use, lt.size_bytes as isize));
                events.push((lt.last_use + 1, -(lt.size_bytes as isize)));
            }
            events.sort_by_key(|&(step, delta)| (step, delta));
            let mut live = 0isize;
            let mut peak = 0isize;
            for (_, delta) in events {
                live += delta;
                peak = peak.max(live);
            }
            peak as usize
        })
        .sum()
}
