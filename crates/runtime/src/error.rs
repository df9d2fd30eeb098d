// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the runtime.

use crate::{ContextState, DelegateError};
use memory_manager::MemoryError;
use program::ProgramError;
use tensor_core::{TensorError, TensorErrorKind};

/// Coarse classification of every runtime failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorKind {
    /// Malformed container, header, constants or indices.
    Format,
    /// Arena placement inconsistent with value lifetimes or capacities.
    MemoryPlanViolation,
    /// Unsupported dtype combination or uncastable output.
    Type,
    /// Numeric domain violation such as an integral zero divisor.
    Domain,
    /// Non-broadcastable shapes or an illegal resize.
    Shape,
    /// A backend delegate failed to initialise or execute.
    Delegate,
    /// A kernel opcode has no registered implementation.
    UnregisteredOpcode,
    /// A delegate names a backend that is not registered.
    UnregisteredBackend,
    /// The API was used in the wrong context state.
    InvalidState,
    /// The memory budget cannot satisfy the arenas.
    OutOfMemory,
    /// Invalid configuration or registration.
    Config,
}

/// Errors that can occur while loading or executing a program.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The program failed to load or verify.
    #[error("program error: {0}")]
    Program(#[from] ProgramError),

    /// A kernel rejected its operands.
    #[error(transparent)]
    Tensor(#[from] TensorError),

    /// Arena allocation or region borrowing failed.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    /// A backend delegate failed.
    #[error("delegate error: {0}")]
    Delegate(#[from] DelegateError),

    /// No kernel is registered for an opcode and operand signature.
    #[error("no kernel registered for '{opcode}' with signature {signature:?}")]
    UnregisteredOpcode { opcode: String, signature: Vec<String> },

    /// A delegate backend is missing or disabled.
    #[error("backend '{backend_id}' is not registered")]
    UnregisteredBackend { backend_id: String },

    /// A kernel or backend was registered twice.
    #[error("duplicate registration of {what} '{key}'")]
    DuplicateRegistration { what: &'static str, key: String },

    /// A caller-provided input does not match the declared input.
    #[error("input {index}: {source}")]
    Input {
        index: usize,
        #[source]
        source: TensorError,
    },

    /// An input or output index is out of range.
    #[error("{what} index {index} out of range (program has {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// The context is not in a state that allows the operation.
    #[error("cannot {operation} while context is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: ContextState,
    },

    /// An instruction failed; the context is now `Failed`.
    #[error("instruction {index} ('{opcode}', debug handle {debug_handle}) failed: {source}")]
    Instruction {
        index: usize,
        opcode: String,
        debug_handle: u32,
        #[source]
        source: Box<RuntimeError>,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RuntimeError {
    /// Maps the error onto its [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Program(e) => match e {
                ProgramError::Plan(_) => ErrorKind::MemoryPlanViolation,
                ProgramError::UnregisteredBackend { .. } => ErrorKind::UnregisteredBackend,
                _ => ErrorKind::Format,
            },
            RuntimeError::Tensor(e) | RuntimeError::Input { source: e, .. } => tensor_kind(e),
            RuntimeError::Memory(MemoryError::OutOfMemory { .. }) => ErrorKind::OutOfMemory,
            RuntimeError::Memory(_) => ErrorKind::MemoryPlanViolation,
            RuntimeError::Delegate(_) => ErrorKind::Delegate,
            RuntimeError::UnregisteredOpcode { .. } => ErrorKind::UnregisteredOpcode,
            RuntimeError::UnregisteredBackend { .. } => ErrorKind::UnregisteredBackend,
            RuntimeError::DuplicateRegistration { .. } | RuntimeError::Config(_) => {
                ErrorKind::Config
            }
            RuntimeError::IndexOutOfRange { .. } | RuntimeError::InvalidState { .. } => {
                ErrorKind::InvalidState
            }
            RuntimeError::Instruction { source, .. } => source.kind(),
        }
    }

    /// Index of the failing instruction, if the error came from one.
    pub fn instruction_index(&self) -> Option<usize> {
        match self {
            RuntimeError::Instruction { index, .. } => Some(*index),
            _ => None,
        }
    }
}

fn tensor_kind(e: &TensorError) -> ErrorKind {
    match e.kind() {
        TensorErrorKind::Type => ErrorKind::Type,
        TensorErrorKind::Domain => ErrorKind::Domain,
        TensorErrorKind::Shape | TensorErrorKind::Argument => ErrorKind::Shape,
    }
}
