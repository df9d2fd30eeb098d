// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommands and the helpers they share.

pub mod benchmark;
pub mod demo;
pub mod inspect;
pub mod plan;
pub mod run;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use runtime::{Registry, Runtime, RuntimeConfig};
use tensor_core::{ops, ScalarType, Tensor, TensorRef};
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` overrides the `-v` level.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("failed to read config '{}'", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

/// A runtime with the portable kernels and the portable backend.
pub fn portable_runtime(config: RuntimeConfig) -> anyhow::Result<Runtime> {
    let registry = Registry::portable().context("failed to build the portable registry")?;
    Ok(Runtime::new(config, Arc::new(registry)))
}

pub fn banner(title: &str) {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║  {:<52}║", format!("edge-exec · {title}"));
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
}

/// Reads any tensor as `f64` values for display.
pub fn to_f64(view: &TensorRef<'_>) -> anyhow::Result<Vec<f64>> {
    let mut wide = Tensor::zeros(view.dims(), ScalarType::F64);
    ops::to_copy_out(view, &mut wide.view_mut())?;
    Ok(wide.to_vec::<f64>()?)
}

/// Formats the first few values of a tensor.
pub fn preview(values: &[f64], max: usize) -> String {
    let shown: Vec<String> = values.iter().take(max).map(|v| format!("{v}")).collect();
    let more = if values.len() > max { ", ..." } else { "" };
    format!("[{}{more}]", shown.join(", "))
}

pub fn kib(bytes: usize) -> f64 {
    bytes as f64 / 1024.0
}
