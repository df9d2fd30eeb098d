// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # edge-exec
//!
//! Command-line driver for serialized programs.
//!
//! ## Usage
//! ```bash
//! # Write a sample program
//! edge-exec demo --out sample.exrt
//!
//! # Print its header, value table and chain
//! edge-exec inspect --program sample.exrt
//!
//! # Execute with explicit inputs (unbound inputs default to zeros)
//! edge-exec run --program sample.exrt --input 0=1,2,3 --input 1=0.5,0.5,0.5
//!
//! # Compare the embedded memory plan against the planners
//! edge-exec plan --program sample.exrt
//!
//! # Run concurrent contexts
//! edge-exec benchmark --program sample.exrt --iterations 1000 --contexts 4
//! ```

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "edge-exec",
    about = "Load, inspect and execute serialized inference programs",
    version,
    author
)]
struct Cli {
    /// Path to a TOML runtime configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a program's header, values, chain, arenas and delegates.
    Inspect {
        /// Path to the program file.
        #[arg(short, long)]
        program: PathBuf,
    },

    /// Bind inputs, execute once and print the outputs.
    Run {
        /// Path to the program file.
        #[arg(short, long)]
        program: PathBuf,

        /// Input binding `INDEX=V1,V2,...`; may be repeated.
        #[arg(short, long = "input")]
        inputs: Vec<String>,

        /// Print the execution metrics as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Recompute lifetimes and compare the embedded plan with the planners.
    Plan {
        /// Path to the program file.
        #[arg(short, long)]
        program: PathBuf,
    },

    /// Execute repeatedly from several concurrent contexts.
    Benchmark {
        /// Path to the program file.
        #[arg(short, long)]
        program: PathBuf,

        /// Executions per context.
        #[arg(short = 'n', long, default_value_t = 100)]
        iterations: usize,

        /// Number of concurrent contexts.
        #[arg(short = 'k', long, default_value_t = 4)]
        contexts: usize,
    },

    /// Write a sample program for trying the other commands.
    Demo {
        /// Output path.
        #[arg(short, long, default_value = "sample.exrt")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Inspect { program } => commands::inspect::execute(config, program).await,
        Commands::Run {
            program,
            inputs,
            json,
        } => commands::run::execute(config, program, inputs, json).await,
        Commands::Plan { program } => commands::plan::execute(config, program).await,
        Commands::Benchmark {
            program,
            iterations,
            contexts,
        } => commands::benchmark::execute(config, program, iterations, contexts).await,
        Commands::Demo { out } => commands::demo::execute(out).await,
    }
}
