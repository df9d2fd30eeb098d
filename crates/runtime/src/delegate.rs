// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The backend delegate contract.
//!
//! A backend turns an opaque blob produced by the exporter into per-context
//! state with [`BackendDelegate::init`]. The executor owns that state
//! through a [`DelegateHandle`], which guarantees `destroy` runs exactly
//! once: on an explicit [`DelegateHandle::destroy`] or on drop.

use program::{CompileSpec, TensorMeta};
use tensor_core::{TensorError, TensorMut, TensorRef};

/// Errors raised by delegate backends.
#[derive(Debug, thiserror::Error)]
pub enum DelegateError {
    /// The backend cannot run on this device.
    #[error("backend '{0}' is not available")]
    Unavailable(String),

    /// The blob could not be decoded.
    #[error("invalid delegate blob: {0}")]
    InvalidBlob(String),

    /// The blob asks for something the backend does not implement.
    #[error("unsupported by backend: {0}")]
    Unsupported(String),

    /// Runtime operands disagree with what `init` was told.
    #[error("delegate I/O mismatch: {0}")]
    IoMismatch(String),

    /// The handle has already been destroyed.
    #[error("delegate handle for '{0}' already destroyed")]
    Destroyed(String),

    /// A kernel inside the backend failed.
    #[error(transparent)]
    Kernel(#[from] TensorError),

    /// Backend-specific failure.
    #[error("{0}")]
    Backend(String),
}

/// Declared operands of a delegate call, handed to `init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateIoSpec {
    pub inputs: Vec<TensorMeta>,
    pub outputs: Vec<TensorMeta>,
}

/// A pluggable execution backend.
pub trait BackendDelegate: Send + Sync {
    /// Identifier programs use to select this backend.
    fn id(&self) -> &str;

    /// Whether the backend can run on this device.
    fn is_available(&self) -> bool {
        true
    }

    /// Prepares per-context state for one delegate call.
    fn init(
        &self,
        blob: &[u8],
        specs: &[CompileSpec],
        io: &DelegateIoSpec,
    ) -> Result<Box<dyn DelegateState>, DelegateError>;
}

/// Per-context backend state.
pub trait DelegateState: Send {
    /// Runs the lowered sub-graph. `outputs` are never resizable.
    fn execute(
        &mut self,
        inputs: &[TensorRef<'_>],
        outputs: &mut [TensorMut<'_>],
    ) -> Result<(), DelegateError>;

    /// Releases backend resources.
    fn destroy(&mut self);
}

/// Owns a [`DelegateState`] and destroys it exactly once.
pub struct DelegateHandle {
    backend_id: String,
    state: Option<Box<dyn DelegateState>>,
}

impl DelegateHandle {
    pub fn new(backend_id: impl Into<String>, state: Box<dyn DelegateState>) -> Self {
        Self {
            backend_id: backend_id.into(),
            state: Some(state),
        }
    }

    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    pub fn is_live(&self) -> bool {
        self.state.is_some()
    }

    pub fn execute(
        &mut self,
        inputs: &[TensorRef<'_>],
        outputs: &mut [TensorMut<'_>],
    ) -> Result<(), DelegateError> {
        match self.state.as_mut() {
            Some(state) => state.execute(inputs, outputs),
            None => Err(DelegateError::Destroyed(self.backend_id.clone())),
        }
    }

    /// Destroys the backend state. Later calls are no-ops.
    pub fn destroy(&mut self) {
        if let Some(mut state) = self.state.take() {
            state.destroy();
            tracing::debug!(backend = %self.backend_id, "delegate destroyed");
        }
    }
}

impl Drop for DelegateHandle {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for DelegateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateHandle")
            .field("backend_id", &self.backend_id)
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting(Arc<AtomicUsize>);

    impl DelegateState for Counting {
        fn execute(
            &mut self,
            _inputs: &[TensorRef<'_>],
            _outputs: &mut [TensorMut<'_>],
        ) -> Result<(), DelegateError> {
            Err(DelegateError::Backend("always fails".into()))
        }

        fn destroy(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_destroy_once_explicit_then_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut handle = DelegateHandle::new("counting", Box::new(Counting(count.clone())));
        assert!(handle.execute(&[], &mut []).is_err());
        handle.destroy();
        handle.destroy();
        assert!(!handle.is_live());
        assert!(matches!(
            handle.execute(&[], &mut []),
            Err(DelegateError::Destroyed(_))
        ));
        drop(handle);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_destroy_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        drop(DelegateHandle::new("counting", Box::new(Counting(count.clone()))));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
