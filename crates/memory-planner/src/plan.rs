// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Memory plan: the output of a planning strategy.
//!
//! A plan fixes the capacity of every arena and the byte offset of every
//! planned value. It is the contract between the exporter, which embeds it
//! in the program, and the loader, which re-verifies it before any context
//! is created.

use crate::{PlannerError, TensorLifetime};
use std::collections::HashMap;

/// One arena's declared size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ArenaSpec {
    pub memory_id: u32,
    pub capacity: usize,
}

/// Placement of one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Allocation {
    pub value: usize,
    pub memory_id: u32,
    pub offset: usize,
    pub size_bytes: usize,
    pub first_use: usize,
    pub last_use: usize,
}

impl Allocation {
    /// Places `lifetime` at `offset`.
    pub fn at(lifetime: &TensorLifetime, offset: usize) -> Self {
        Self {
            value: lifetime.value,
            memory_id: lifetime.memory_id,
            offset,
            size_bytes: lifetime.size_bytes,
            first_use: lifetime.first_use,
            last_use: lifetime.last_use,
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.size_bytes
    }

    fn lifetime(&self) -> TensorLifetime {
        TensorLifetime {
            value: self.value,
            first_use: self.first_use,
            last_use: self.last_use,
            size_bytes: self.size_bytes,
            memory_id: self.memory_id,
        }
    }

    fn overlaps_bytes(&self, other: &Allocation) -> bool {
        self.size_bytes > 0
            && other.size_bytes > 0
            && self.offset < other.end()
            && other.offset < self.end()
    }
}

/// The complete placement produced by a [`crate::PlanningStrategy`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MemoryPlan {
    pub strategy_name: String,
    pub arenas: Vec<ArenaSpec>,
    pub allocations: Vec<Allocation>,
}

impl MemoryPlan {
    pub fn capacity(&self, memory_id: u32) -> Option<usize> {
        self.arenas
            .iter()
            .find(|a| a.memory_id == memory_id)
            .map(|a| a.capacity)
    }

    /// Total bytes across all arenas.
    pub fn peak_bytes(&self) -> usize {
        self.arenas.iter().map(|a| a.capacity).sum()
    }

    pub fn allocation(&self, value: usize) -> Option<&Allocation> {
        self.allocations.iter().find(|a| a.value == value)
    }

    /// Verifies the plan.
    ///
    /// Checks:
    /// - arena ids are unique;
    /// - every allocation names a declared arena and fits inside it;
    /// - no two allocations in the same arena with intersecting lifetimes
    ///   share a byte.
    pub fn validate(&self) -> Result<(), PlannerError> {
        let mut capacities: HashMap<u32, usize> = HashMap::with_capacity(self.arenas.len());
        for arena in &self.arenas {
            if capacities.insert(arena.memory_id, arena.capacity).is_some() {
                return Err(PlannerError::DuplicateArena {
                    memory_id: arena.memory_id,
                });
            }
        }

        for alloc in &self.allocations {
            let capacity = *capacities.get(&alloc.memory_id).ok_or(PlannerError::UnknownArena {
                value: alloc.value,
                memory_id: alloc.memory_id,
            })?;
            match alloc.offset.checked_add(alloc.size_bytes) {
                Some(end) if end <= capacity => {}
                _ => {
                    return Err(PlannerError::ExceedsCapacity {
                        value: alloc.value,
                        memory_id: alloc.memory_id,
                        end: alloc.offset.saturating_add(alloc.size_bytes),
                        capacity,
                    })
                }
            }
        }

        // Sweep by offset inside each arena; once a later allocation starts
        // past the current one's end nothing further can overlap it.
        let mut order: Vec<&Allocation> = self.allocations.iter().collect();
        order.sort_by_key(|a| (a.memory_id, a.offset));
        for (i, a) in order.iter().enumerate() {
            for b in order[i + 1..]
                .iter()
                .take_while(|b| b.memory_id == a.memory_id && b.offset < a.end())
            {
                if a.overlaps_bytes(b) && a.lifetime().intersects(&b.lifetime()) {
                    return Err(PlannerError::Overlap {
                        memory_id: a.memory_id,
                        first: a.value.min(b.value),
                        second: a.value.max(b.value),
                    });
                }
            }
        }
        Ok(())
    }

    /// One-line description, including efficiency against `lower_bound`.
    pub fn summary(&self, lower_bound: usize) -> String {
        let total = self.peak_bytes();
        let efficiency = if total == 0 {
            100.0
        } else {
            lower_bound as f64 / total as f64 * 100.0
        };
        format!(
            "Plan '{}': {} values in {} arenas, {} bytes total (lower bound {} bytes, {:.0}% efficient)",
            self.strategy_name,
            self.allocations.len(),
            self.arenas.len(),
            total,
            lower_bound,
            efficiency,
        )
    }
}

/// Rounds `size` up to a multiple of `alignment` (a power of two).
pub fn align_up(size: usize, alignment: usize) -> usize {
    (size + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc(value: usize, offset: usize, size: usize, first: usize, last: usize) -> Allocation {
        Allocation {
            value,
            memory_id: 0,
            offset,
            size_bytes: size,
            first_use: first,
            last_use: last,
        }
    }

    fn plan(allocations: Vec<Allocation>, capacity: usize) -> MemoryPlan {
        MemoryPlan {
            strategy_name: "test".into(),
            arenas: vec![ArenaSpec {
                memory_id: 0,
                capacity,
            }],
            allocations,
        }
    }

    #[test]
    fn test_validate_reuse_ok() {
        // Same bytes, disjoint lifetimes.
        let p = plan(vec![alloc(0, 0, 64, 0, 1), alloc(1, 0, 64, 2, 3)], 64);
        p.validate().unwrap();
        assert_eq!(p.peak_bytes(), 64);
    }

    #[test]
    fn test_validate_overlap() {
        let p = plan(vec![alloc(3, 0, 64, 0, 2), alloc(1, 32, 64, 2, 3)], 128);
        assert_eq!(
            p.validate().unwrap_err(),
            PlannerError::Overlap {
                memory_id: 0,
                first: 1,
                second: 3,
            }
        );
    }

    #[test]
    fn test_validate_touching_ranges_ok() {
        let p = plan(vec![alloc(0, 0, 32, 0, 5), alloc(1, 32, 32, 0, 5)], 64);
        p.validate().unwrap();
    }

    #[test]
    fn test_validate_capacity() {
        let p = plan(vec![alloc(0, 32, 64, 0, 0)], 64);
        assert!(matches!(
            p.validate().unwrap_err(),
            PlannerError::ExceedsCapacity { end: 96, capacity: 64, .. }
        ));
    }

    #[test]
    fn test_validate_unknown_and_duplicate_arena() {
        let mut p = plan(vec![alloc(0, 0, 8, 0, 0)], 8);
        p.allocations[0].memory_id = 2;
        assert!(matches!(p.validate(), Err(PlannerError::UnknownArena { memory_id: 2, .. })));

        let mut p = plan(vec![], 8);
        p.arenas.push(ArenaSpec {
            memory_id: 0,
            capacity: 16,
        });
        assert_eq!(p.validate(), Err(PlannerError::DuplicateArena { memory_id: 0 }));
    }

    #[test]
    fn test_empty_lifetime_never_conflicts() {
        let p = plan(vec![alloc(0, 0, 64, 4, 2), alloc(1, 0, 64, 0, 9)], 64);
        p.validate().unwrap();
    }

    #[test]
    fn test_summary() {
        let p = plan(vec![alloc(0, 0, 64, 0, 1)], 128);
        let s = p.summary(64);
        assert!(s.contains("'test'"));
        assert!(s.contains("128 bytes total"));
        assert!(s.contains("50% efficient"));
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(17, 8), 24);
    }
}
