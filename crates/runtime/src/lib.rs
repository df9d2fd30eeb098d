// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! Executes verified programs.
//!
//! The runtime holds:
//! - A [`KernelRegistry`] mapping opcodes (and optional dtype signatures)
//!   to portable kernel functions.
//! - A [`BackendRegistry`] of [`BackendDelegate`]s that take over whole
//!   subgraphs.
//! - A [`MemoryPool`](memory_manager::MemoryPool) that every context's
//!   arenas are drawn from.
//!
//! # Lifecycle
//! ```text
//! bytes ─load─▶ Arc<Program> ─create_context─▶ ExecutionContext
//!                                   set_input* ─▶ execute ─▶ output*
//! ```
//! A program is immutable and may back any number of contexts on any
//! number of threads. A context is used by one thread at a time.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use runtime::{Registry, Runtime, RuntimeConfig};
//! use tensor_core::Tensor;
//!
//! let registry = Arc::new(Registry::portable()?);
//! let runtime = Runtime::new(RuntimeConfig::default(), registry);
//! let program = runtime.load_file(std::path::Path::new("model.exrt"))?;
//! let mut ctx = runtime.create_context(&program)?;
//! ctx.set_input_tensor(0, &Tensor::from_slice([2], &[1.0f32, 2.0])?)?;
//! ctx.execute()?;
//! let y: Vec<f32> = ctx.output(0)?.to_vec()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backends;
mod config;
mod context;
mod delegate;
mod error;
mod kernels;
mod metrics;
mod registry;
mod runtime;

pub use backends::{PortableBackend, PortableSubgraph, PORTABLE_BACKEND_ID};
pub use config::RuntimeConfig;
pub use context::{ContextState, ExecutionContext};
pub use delegate::{BackendDelegate, DelegateError, DelegateHandle, DelegateIoSpec, DelegateState};
pub use error::{ErrorKind, RuntimeError};
pub use kernels::{register_portable_kernels, KernelArg, KernelFn, PORTABLE_KERNELS};
pub use metrics::{ExecutionMetrics, InstructionKind, InstructionMetrics};
pub use registry::{BackendRegistry, KernelKey, KernelRegistry, Registry};
pub use runtime::Runtime;
