// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `edge-exec plan`: recompute lifetimes and compare the embedded memory
//! plan with what each planner would produce.

use std::path::PathBuf;

use anyhow::Context;
use memory_planner::{min_peak_bytes, GreedyBestFit, Naive, PlanningStrategy};
use runtime::RuntimeConfig;

use super::{banner, kib, portable_runtime};

pub async fn execute(config: RuntimeConfig, path: PathBuf) -> anyhow::Result<()> {
    banner("Memory Plan");

    let rt = portable_runtime(config)?;
    let program = rt
        .load_file(&path)
        .with_context(|| format!("failed to load program '{}'", path.display()))?;
    let lifetimes = program.lifetimes();
    let lower_bound = min_peak_bytes(lifetimes);

    // ── Lifetimes ──────────────────────────────────────────────
    println!("  {:<6} {:<7} {:<13} {:>10} {:>10}", "Value", "Arena", "Steps", "Bytes", "Offset");
    println!("  {}", "-".repeat(52));
    for lt in lifetimes {
        let steps = if lt.is_empty() {
            "unused".to_string()
        } else {
            format!("{}..={}", lt.first_use, lt.last_use)
        };
        let offset = program
            .memory_plan()
            .allocation(lt.value)
            .map(|a| a.offset.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<6} {:<7} {:<13} {:>10} {:>10}",
            lt.value, lt.memory_id, steps, lt.size_bytes, offset,
        );
    }
    println!();

    // ── Comparison ─────────────────────────────────────────────
    println!("  Embedded: {}", program.memory_plan().summary(lower_bound));
    let strategies: Vec<Box<dyn PlanningStrategy>> =
        vec![Box::new(GreedyBestFit::default()), Box::new(Naive::default())];
    for strategy in &strategies {
        match strategy.plan(lifetimes) {
            Ok(plan) => println!("  Replan:   {}", plan.summary(lower_bound)),
            Err(e) => println!("  Replan:   '{}' failed: {e}", strategy.name()),
        }
    }
    println!();
    println!(
        "  Lower bound {:.1} KB, embedded arenas {:.1} KB",
        kib(lower_bound),
        kib(program.memory_plan().peak_bytes()),
    );

    Ok(())
}
