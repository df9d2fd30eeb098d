// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Execution profiling metrics.
//!
//! [`ExecutionMetrics`] collects per-instruction timings for one run of a
//! context, split between portable kernels and delegate calls.

use std::time::Duration;

/// What an instruction dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    Kernel,
    Delegate,
}

/// Metrics for a single instruction.
#[derive(Debug, Clone, serde::Serialize)]
pub struct InstructionMetrics {
    /// Position in the chain.
    pub index: usize,
    pub opcode: String,
    pub debug_handle: u32,
    pub kind: InstructionKind,
    pub duration: Duration,
}

/// Aggregate metrics for one run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionMetrics {
    /// Wall-clock time of the whole run.
    pub total_duration: Duration,
    pub kernel_duration: Duration,
    pub delegate_duration: Duration,
    /// Arena bytes owned by the context.
    pub arena_bytes: usize,
    /// Per-instruction metrics; empty when profiling is disabled.
    pub instructions: Vec<InstructionMetrics>,
    /// Instructions executed, whether or not they were profiled.
    pub instructions_executed: usize,
}

impl ExecutionMetrics {
    pub fn new(arena_bytes: usize) -> Self {
        Self {
            total_duration: Duration::ZERO,
            kernel_duration: Duration::ZERO,
            delegate_duration: Duration::ZERO,
            arena_bytes,
            instructions: Vec::new(),
            instructions_executed: 0,
        }
    }

    /// Records one instruction.
    pub fn record(
        &mut self,
        index: usize,
        opcode: &str,
        debug_handle: u32,
        kind: InstructionKind,
        duration: Duration,
    ) {
        match kind {
            InstructionKind::Kernel => self.kernel_duration += duration,
            InstructionKind::Delegate => self.delegate_duration += duration,
        }
        self.instructions.push(InstructionMetrics {
            index,
            opcode: opcode.to_string(),
            debug_handle,
            kind,
            duration,
        });
    }

    pub fn finalise(&mut self, total: Duration, executed: usize) {
        self.total_duration = total;
        self.instructions_executed = executed;
    }

    /// The `n` slowest profiled instructions, slowest first.
    pub fn slowest(&self, n: usize) -> Vec<&InstructionMetrics> {
        let mut sorted: Vec<&InstructionMetrics> = self.instructions.iter().collect();
        sorted.sort_by(|a, b| b.duration.cmp(&a.duration));
        sorted.truncate(n);
        sorted
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let total_ms = self.total_duration.as_secs_f64() * 1000.0;
        let delegate_pct = if total_ms > 0.0 {
            self.delegate_duration.as_secs_f64() * 1000.0 / total_ms * 100.0
        } else {
            0.0
        };
        format!(
            "Execution: {:.3}ms total, {} instructions, {:.3}ms kernels, \
             {:.3}ms delegates ({:.0}%), {} arena bytes",
            total_ms,
            self.instructions_executed,
            self.kernel_duration.as_secs_f64() * 1000.0,
            self.delegate_duration.as_secs_f64() * 1000.0,
            delegate_pct,
            self.arena_bytes,
        )
    }
}
