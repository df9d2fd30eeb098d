// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Kernel and backend registries.
//!
//! Registries are plain values. A [`Registry`] is built once, wrapped in an
//! `Arc` and handed to every [`Runtime`](crate::Runtime) that should see it.

use std::collections::HashMap;
use std::sync::Arc;

use program::BackendCatalog;
use tensor_core::ScalarType;

use crate::backends::PortableBackend;
use crate::delegate::BackendDelegate;
use crate::kernels::{register_portable_kernels, KernelFn};
use crate::RuntimeError;

// ── Kernels ────────────────────────────────────────────────────────

/// Operator name plus an optional dtype signature.
///
/// The signature lists the dtypes of the tensor arguments followed by the
/// results. A key without one is the generic entry for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub name: String,
    pub signature: Option<Vec<ScalarType>>,
}

impl KernelKey {
    pub fn generic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signature: None,
        }
    }

    pub fn specialized(name: impl Into<String>, signature: Vec<ScalarType>) -> Self {
        Self {
            name: name.into(),
            signature: Some(signature),
        }
    }
}

/// Maps kernel keys to entry points.
#[derive(Default, Clone)]
pub struct KernelRegistry {
    kernels: HashMap<KernelKey, KernelFn>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the portable operator set.
    pub fn portable() -> Result<Self, RuntimeError> {
        let mut registry = Self::new();
        register_portable_kernels(&mut registry)?;
        Ok(registry)
    }

    /// Adds a kernel. Registering the same key twice is an error.
    pub fn register(&mut self, key: KernelKey, kernel: KernelFn) -> Result<(), RuntimeError> {
        if self.kernels.contains_key(&key) {
            return Err(RuntimeError::DuplicateRegistration {
                what: "kernel",
                key: describe_key(&key),
            });
        }
        self.kernels.insert(key, kernel);
        Ok(())
    }

    /// Finds the kernel for `name`, preferring an exact signature match over
    /// the generic entry.
    pub fn resolve(&self, name: &str, signature: &[ScalarType]) -> Result<KernelFn, RuntimeError> {
        let exact = KernelKey::specialized(name, signature.to_vec());
        self.kernels
            .get(&exact)
            .or_else(|| self.kernels.get(&KernelKey::generic(name)))
            .copied()
            .ok_or_else(|| RuntimeError::UnregisteredOpcode {
                opcode: name.to_string(),
                signature: signature.iter().map(|t| t.to_string()).collect(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kernels.keys().any(|k| k.name == name)
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Registered operator names, sorted and deduplicated.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kernels.keys().map(|k| k.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl std::fmt::Debug for KernelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelRegistry")
            .field("kernels", &self.kernels.len())
            .field("operators", &self.names())
            .finish()
    }
}

fn describe_key(key: &KernelKey) -> String {
    match &key.signature {
        Some(sig) => {
            let sig: Vec<String> = sig.iter().map(|t| t.to_string()).collect();
            format!("{}({})", key.name, sig.join(", "))
        }
        None => key.name.clone(),
    }
}

// ── Backends ───────────────────────────────────────────────────────

/// Maps backend ids to delegates.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn BackendDelegate>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a backend. Registering the same id twice is an error.
    pub fn register(&mut self, backend: Arc<dyn BackendDelegate>) -> Result<(), RuntimeError> {
        let id = backend.id().to_string();
        if self.backends.contains_key(&id) {
            return Err(RuntimeError::DuplicateRegistration {
                what: "backend",
                key: id,
            });
        }
        tracing::debug!(backend = %id, available = backend.is_available(), "registered backend");
        self.backends.insert(id, backend);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn BackendDelegate>> {
        self.backends.get(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl BackendCatalog for BackendRegistry {
    fn is_registered(&self, backend_id: &str) -> bool {
        self.backends
            .get(backend_id)
            .is_some_and(|b| b.is_available())
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.ids())
            .finish()
    }
}

// ── Registry ───────────────────────────────────────────────────────

/// Kernels and backends visible to a runtime.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    kernels: KernelRegistry,
    backends: BackendRegistry,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the portable operator set and no backends.
    pub fn with_portable_kernels() -> Result<Self, RuntimeError> {
        Ok(Self {
            kernels: KernelRegistry::portable()?,
            backends: BackendRegistry::new(),
        })
    }

    /// Portable kernels plus the portable reference backend.
    pub fn portable() -> Result<Self, RuntimeError> {
        let mut registry = Self::with_portable_kernels()?;
        registry
            .backends
            .register(Arc::new(PortableBackend::new()?))?;
        Ok(registry)
    }

    pub fn kernels(&self) -> &KernelRegistry {
        &self.kernels
    }

    pub fn kernels_mut(&mut self) -> &mut KernelRegistry {
        &mut self.kernels
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    pub fn backends_mut(&mut self) -> &mut BackendRegistry {
        &mut self.backends
    }
}
