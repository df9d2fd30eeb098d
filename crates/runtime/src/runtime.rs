// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Top-level entry point: owns the registries and the memory pool.
//!
//! A [`Runtime`] is shared across threads. Loaded programs are immutable and
//! handed out as `Arc<Program>`; each caller creates its own
//! [`ExecutionContext`] from one.

use std::path::Path;
use std::sync::Arc;

use memory_manager::{AllocationStats, MemoryPool};
use program::{BackendCatalog, Parsed, Program};
use tracing::info;

use crate::registry::BackendRegistry;
use crate::{ExecutionContext, Registry, RuntimeConfig, RuntimeError};

#[derive(Debug, Clone)]
pub struct Runtime {
    config: RuntimeConfig,
    registry: Arc<Registry>,
    pool: Arc<MemoryPool>,
}

/// Registered backends minus the ones the config disables.
struct EnabledBackends<'a> {
    backends: &'a BackendRegistry,
    config: &'a RuntimeConfig,
}

impl BackendCatalog for EnabledBackends<'_> {
    fn is_registered(&self, backend_id: &str) -> bool {
        !self.config.is_backend_disabled(backend_id) && self.backends.is_registered(backend_id)
    }
}

impl Runtime {
    pub fn new(config: RuntimeConfig, registry: Arc<Registry>) -> Self {
        let pool = Arc::new(MemoryPool::new(config.memory_budget));
        Self::with_pool(config, registry, pool)
    }

    /// Shares an existing pool, e.g. between runtimes with different
    /// registries.
    pub fn with_pool(config: RuntimeConfig, registry: Arc<Registry>, pool: Arc<MemoryPool>) -> Self {
        info!(
            budget = %config.memory_budget,
            kernels = registry.kernels().len(),
            backends = registry.backends().len(),
            "runtime initialised"
        );
        Self {
            config,
            registry,
            pool,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn pool(&self) -> &Arc<MemoryPool> {
        &self.pool
    }

    pub fn pool_stats(&self) -> AllocationStats {
        self.pool.stats()
    }

    /// Parses and verifies a program held in memory.
    pub fn load(&self, bytes: Vec<u8>) -> Result<Arc<Program>, RuntimeError> {
        self.verify(Program::parse(bytes)?)
    }

    /// Memory-maps and verifies a program file.
    pub fn load_file(&self, path: &Path) -> Result<Arc<Program>, RuntimeError> {
        self.verify(Program::load_file(path)?)
    }

    fn verify(&self, parsed: Program<Parsed>) -> Result<Arc<Program>, RuntimeError> {
        let catalog = EnabledBackends {
            backends: self.registry.backends(),
            config: &self.config,
        };
        Ok(Arc::new(parsed.verify(&catalog)?))
    }

    /// Allocates arenas and resolves every instruction of `program`.
    pub fn create_context(&self, program: &Arc<Program>) -> Result<ExecutionContext, RuntimeError> {
        ExecutionContext::new(Arc::clone(program), &self.registry, &self.pool, &self.config)
    }
}
