// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `edge-exec benchmark`: concurrent contexts over one loaded program.
//!
//! Each context runs on a tokio blocking task, binds zero inputs and
//! executes `iterations` times. Prints per-context latency and aggregate
//! throughput.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{ensure, Context};
use runtime::RuntimeConfig;
use tensor_core::Tensor;

use super::{banner, kib, portable_runtime};

struct ContextReport {
    latencies: Vec<Duration>,
    arena_bytes: usize,
}

pub async fn execute(
    mut config: RuntimeConfig,
    path: PathBuf,
    iterations: usize,
    contexts: usize,
) -> anyhow::Result<()> {
    banner("Benchmark");
    ensure!(iterations > 0 && contexts > 0, "iterations and contexts must be positive");

    // Per-instruction timing would dominate small programs.
    config.enable_profiling = false;
    let rt = Arc::new(portable_runtime(config)?);
    let program = rt
        .load_file(&path)
        .with_context(|| format!("failed to load program '{}'", path.display()))?;
    println!("  {}", program.summary().replace('\n', "\n  "));
    println!("  Contexts: {contexts}, iterations: {iterations}");
    println!();

    let started = Instant::now();
    let mut handles = Vec::with_capacity(contexts);
    for _ in 0..contexts {
        let rt = Arc::clone(&rt);
        let program = Arc::clone(&program);
        handles.push(tokio::task::spawn_blocking(move || -> anyhow::Result<ContextReport> {
            let mut ctx = rt.create_context(&program)?;
            let inputs = (0..ctx.num_inputs())
                .map(|i| -> anyhow::Result<Tensor> {
                    let meta = ctx.input_meta(i)?;
                    Ok(Tensor::zeros(meta.shape.as_slice(), meta.dtype))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let mut latencies = Vec::with_capacity(iterations);
            for _ in 0..iterations {
                let t = Instant::now();
                for (i, input) in inputs.iter().enumerate() {
                    ctx.set_input_tensor(i, input)?;
                }
                ctx.execute()?;
                latencies.push(t.elapsed());
            }
            Ok(ContextReport {
                latencies,
                arena_bytes: ctx.arena_bytes(),
            })
        }));
    }

    println!("  {:<8} {:>12} {:>12} {:>12} {:>10}", "Context", "Mean µs", "p50 µs", "Max µs", "Arena KB");
    println!("  {}", "-".repeat(58));
    let mut total_runs = 0usize;
    for (index, handle) in handles.into_iter().enumerate() {
        let mut report = handle.await.context("benchmark task panicked")??;
        report.latencies.sort();
        let mean = report.latencies.iter().sum::<Duration>() / report.latencies.len() as u32;
        let p50 = report.latencies[report.latencies.len() / 2];
        let max = report.latencies[report.latencies.len() - 1];
        println!(
            "  {:<8} {:>12.1} {:>12.1} {:>12.1} {:>10.1}",
            index,
            micros(mean),
            micros(p50),
            micros(max),
            kib(report.arena_bytes),
        );
        total_runs += report.latencies.len();
    }
    let elapsed = started.elapsed();
    println!();
    println!(
        "  {total_runs} executions in {:.2} s ({:.0} exec/s)",
        elapsed.as_secs_f64(),
        total_runs as f64 / elapsed.as_secs_f64(),
    );
    println!("  Pool: {}", rt.pool_stats().summary());

    Ok(())
}

fn micros(d: Duration) -> f64 {
    d.as_secs_f64() * 1e6
}
