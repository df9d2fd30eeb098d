// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `edge-exec run`: bind inputs, execute once, print outputs and metrics.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context};
use program::TensorMeta;
use runtime::RuntimeConfig;
use tensor_core::{ops, ShapeDynamism, Tensor};

use super::{banner, kib, portable_runtime, preview, to_f64};

pub async fn execute(
    config: RuntimeConfig,
    path: PathBuf,
    inputs: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    banner("Program Runner");

    let bindings = parse_bindings(&inputs)?;
    let rt = portable_runtime(config)?;
    let program = rt
        .load_file(&path)
        .with_context(|| format!("failed to load program '{}'", path.display()))?;
    println!("  {}", program.summary().replace('\n', "\n  "));
    println!();

    let mut ctx = rt.create_context(&program)?;
    println!("  Context: {:.1} KB of arenas", kib(ctx.arena_bytes()));

    // ── Inputs ─────────────────────────────────────────────────
    for i in 0..ctx.num_inputs() {
        let meta = ctx.input_meta(i)?;
        let tensor = match bindings.get(&i) {
            Some(values) => build_input(&meta, values)
                .with_context(|| format!("input {i} ({} {:?})", meta.dtype, meta.shape))?,
            None => Tensor::zeros(meta.shape.as_slice(), meta.dtype),
        };
        println!(
            "   in[{i}]  {} {:?} = {}",
            meta.dtype,
            tensor.dims(),
            preview(&to_f64(&tensor.view())?, 8),
        );
        ctx.set_input_tensor(i, &tensor)?;
    }
    if let Some(&extra) = bindings.keys().find(|&&i| i >= ctx.num_inputs()) {
        bail!("input {extra} given but the program has {} inputs", ctx.num_inputs());
    }
    println!();

    // ── Execute ────────────────────────────────────────────────
    ctx.execute()?;

    for i in 0..ctx.num_outputs() {
        let out = ctx.output(i)?;
        println!(
            "   out[{i}] {} {:?} = {}",
            out.dtype(),
            out.dims(),
            preview(&to_f64(&out)?, 8),
        );
    }
    println!();

    if let Some(metrics) = ctx.last_metrics().filter(|_| json) {
        println!("{}", serde_json::to_string_pretty(metrics)?);
    } else if let Some(metrics) = ctx.last_metrics() {
        println!("  Metrics:");
        println!("   {}", metrics.summary());
        for m in metrics.slowest(5) {
            println!(
                "   #{:<4} {:<32} {:>10.1} µs",
                m.index,
                m.opcode,
                m.duration.as_secs_f64() * 1e6,
            );
        }
        println!();
    }
    println!("  Pool: {}", rt.pool_stats().summary());

    Ok(())
}

/// Parses `INDEX=V1,V2,...` bindings.
fn parse_bindings(raw: &[String]) -> anyhow::Result<HashMap<usize, Vec<f64>>> {
    let mut bindings = HashMap::new();
    for binding in raw {
        let (index, values) = binding
            .split_once('=')
            .with_context(|| format!("input binding '{binding}' is not INDEX=V1,V2,..."))?;
        let index: usize = index
            .trim()
            .parse()
            .with_context(|| format!("bad input index in '{binding}'"))?;
        let values = values
            .split(',')
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                v.trim()
                    .parse::<f64>()
                    .with_context(|| format!("bad value '{v}' in '{binding}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        if bindings.insert(index, values).is_some() {
            bail!("input {index} bound twice");
        }
    }
    Ok(bindings)
}

/// Casts `values` to the input's dtype. A rank-1 dynamic input takes the
/// length of `values`; otherwise the declared shape is used.
fn build_input(meta: &TensorMeta, values: &[f64]) -> anyhow::Result<Tensor> {
    let declared: usize = meta.shape.iter().product();
    let shape = if values.len() == declared {
        meta.shape.clone()
    } else if meta.shape.len() == 1 && meta.dynamism == ShapeDynamism::DynamicBound {
        vec![values.len()]
    } else {
        bail!("expected {declared} values, got {}", values.len());
    };
    let wide = Tensor::from_slice(shape.as_slice(), values)?;
    let mut tensor = Tensor::zeros(shape.as_slice(), meta.dtype);
    ops::to_copy_out(&wide.view(), &mut tensor.view_mut())?;
    Ok(tensor)
}
