// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for program parsing, verification and building.

use memory_planner::PlannerError;
use tensor_core::TensorError;

/// Errors that can occur while loading or building a program.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    /// The program file could not be opened or mapped.
    #[error("failed to read program: {0}")]
    Io(#[from] std::io::Error),

    /// The container framing is wrong (magic, lengths, segment bounds).
    #[error("malformed program container: {0}")]
    Format(String),

    /// The container was written by an incompatible exporter.
    #[error("unsupported program format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// The JSON header could not be (de)serialised.
    #[error("invalid program header: {0}")]
    Header(#[from] serde_json::Error),

    /// The constant segment could not be parsed or written.
    #[error("invalid constant segment: {0}")]
    Constants(String),

    /// A constant referenced by a value is missing or too small.
    #[error("value {value}: {detail}")]
    InvalidConstant { value: usize, detail: String },

    /// A value entry is internally inconsistent.
    #[error("invalid value {index}: {detail}")]
    InvalidValue { index: usize, detail: String },

    /// An instruction is malformed.
    #[error("invalid instruction {index}: {detail}")]
    InvalidInstruction { index: usize, detail: String },

    /// An index into one of the program tables is out of range.
    #[error("{table} index {index} out of range (len {len})")]
    IndexOutOfRange {
        table: &'static str,
        index: usize,
        len: usize,
    },

    /// A planned value is consumed before anything produces it.
    #[error("value {value} is read by instruction {instruction} before it is written")]
    ReadBeforeWrite { value: usize, instruction: usize },

    /// The embedded memory plan does not hold up against the chain.
    #[error("memory plan violation: {0}")]
    Plan(#[from] PlannerError),

    /// A delegate names a backend that is not registered.
    #[error("backend '{backend_id}' is not registered")]
    UnregisteredBackend { backend_id: String },

    /// A tensor descriptor could not be built.
    #[error(transparent)]
    Tensor(#[from] TensorError),
}
