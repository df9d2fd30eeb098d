// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `edge-exec inspect`: print the structure of a program.

use std::path::PathBuf;

use anyhow::Context;
use program::{Storage, ValueDef};
use runtime::RuntimeConfig;

use super::{banner, kib, portable_runtime};

pub async fn execute(config: RuntimeConfig, path: PathBuf) -> anyhow::Result<()> {
    banner("Program Inspector");

    let rt = portable_runtime(config)?;
    let program = rt
        .load_file(&path)
        .with_context(|| format!("failed to load program '{}'", path.display()))?;

    // ── Summary ────────────────────────────────────────────────
    println!("  {}", program.summary().replace('\n', "\n  "));
    println!(
        "  File: {:.1} KB ({})",
        kib(program.size_bytes()),
        if program.is_memory_mapped() { "mapped" } else { "owned" },
    );
    println!();

    // ── Values ─────────────────────────────────────────────────
    println!("  {:<5} {:<9} {:<8} {:<16} {:<16} {}", "Idx", "Kind", "DType", "Shape", "Dynamism", "Storage");
    println!("  {}", "-".repeat(80));
    for (index, value) in program.values().iter().enumerate() {
        match value {
            ValueDef::Tensor(t) => {
                let storage = match &t.storage {
                    Storage::Constant { name } => format!("const '{name}'"),
                    Storage::Planned { memory_id, offset } => {
                        format!("arena {memory_id} @ {offset}")
                    }
                };
                println!(
                    "  {:<5} {:<9} {:<8} {:<16} {:<16} {}",
                    index,
                    value.kind_name(),
                    t.dtype,
                    format!("{:?}", t.shape),
                    format!("{:?}", t.dynamism),
                    storage,
                );
            }
            ValueDef::Bool { value: v } => println!("  {index:<5} {:<9} {v}", value.kind_name()),
            ValueDef::Int { value: v } => println!("  {index:<5} {:<9} {v}", value.kind_name()),
            ValueDef::Double { value: v } => println!("  {index:<5} {:<9} {v}", value.kind_name()),
            ValueDef::IntList { values } => {
                println!("  {index:<5} {:<9} {values:?}", value.kind_name())
            }
            ValueDef::None => println!("  {index:<5} {}", value.kind_name()),
        }
    }
    println!();
    println!("  Inputs:  {:?}", program.inputs());
    println!("  Outputs: {:?}", program.outputs());
    println!();

    // ── Chain ──────────────────────────────────────────────────
    println!("  {:<5} {:<32} {:<16} {:<16} {}", "Step", "Opcode", "Args", "Results", "Handle");
    println!("  {}", "-".repeat(80));
    for (step, instruction) in program.chain().iter().enumerate() {
        println!(
            "  {:<5} {:<32} {:<16} {:<16} {}",
            step,
            instruction.opcode(),
            format!("{:?}", instruction.args),
            format!("{:?}", instruction.results),
            instruction.debug_handle,
        );
    }
    println!();

    // ── Arenas & Delegates ─────────────────────────────────────
    println!("  Arenas:");
    for arena in program.arenas() {
        println!("   memory {}: {} bytes", arena.memory_id, arena.capacity);
    }
    if !program.delegates().is_empty() {
        println!();
        println!("  Delegates:");
        for (index, delegate) in program.delegates().iter().enumerate() {
            let specs: Vec<&str> = delegate.compile_specs.iter().map(|s| s.key.as_str()).collect();
            println!(
                "   #{index} backend '{}', blob {} bytes, compile specs {specs:?}",
                delegate.backend_id, delegate.blob.len,
            );
        }
    }
    println!();

    Ok(())
}
