// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The JSON program header and the value, instruction and delegate tables
//! it carries.
//!
//! # Format
//! ```json
//! {
//!   "name": "add_mul",
//!   "values": [
//!     { "kind": "tensor", "dtype": "f32", "shape": [2, 3],
//!       "dynamism": "static",
//!       "storage": { "kind": "planned", "memory_id": 0, "offset": 0 } },
//!     { "kind": "tensor", "dtype": "f32", "shape": [3],
//!       "storage": { "kind": "constant", "name": "bias" } },
//!     { "kind": "int", "value": 2 }
//!   ],
//!   "inputs": [0],
//!   "outputs": [3],
//!   "chain": [
//!     { "op": { "kind": "kernel", "name": "aten::add.out" },
//!       "args": [0, 1], "results": [3], "debug_handle": 0 }
//!   ],
//!   "arenas": [{ "memory_id": 0, "capacity": 64 }],
//!   "delegates": [],
//!   "constants": { "offset": 0, "len": 120 }
//! }
//! ```

use memory_planner::ArenaSpec;
use tensor_core::{ScalarType, ShapeDynamism, TensorDescriptor, TensorError};

/// Debug handle meaning "no source location".
pub const NO_DEBUG_HANDLE: u32 = u16::MAX as u32;

/// A byte range inside the data section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    pub offset: usize,
    pub len: usize,
}

impl Segment {
    pub fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.len)
    }
}

/// Where a tensor value's bytes live.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Storage {
    /// Read-only bytes in the constant segment.
    Constant { name: String },
    /// A slot in a per-context arena.
    Planned { memory_id: u32, offset: usize },
}

/// A tensor entry in the value table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TensorValue {
    pub dtype: ScalarType,
    pub shape: Vec<usize>,
    /// Element strides; row-major when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strides: Option<Vec<usize>>,
    #[serde(default)]
    pub dynamism: ShapeDynamism,
    pub storage: Storage,
}

impl TensorValue {
    pub fn descriptor(&self) -> Result<TensorDescriptor, TensorError> {
        let desc = match &self.strides {
            Some(strides) => {
                TensorDescriptor::with_strides(self.shape.clone(), strides.clone(), self.dtype)?
            }
            None => TensorDescriptor::try_new(self.shape.clone(), self.dtype)?,
        };
        Ok(desc.with_dynamism(self.dynamism))
    }

    pub fn is_planned(&self) -> bool {
        matches!(self.storage, Storage::Planned { .. })
    }

    pub fn meta(&self) -> TensorMeta {
        TensorMeta {
            dtype: self.dtype,
            shape: self.shape.clone(),
            dynamism: self.dynamism,
        }
    }
}

/// One entry of the value table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueDef {
    None,
    Bool { value: bool },
    Int { value: i64 },
    Double { value: f64 },
    IntList { values: Vec<i64> },
    Tensor(TensorValue),
}

impl ValueDef {
    pub fn as_tensor(&self) -> Option<&TensorValue> {
        match self {
            ValueDef::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ValueDef::None => "none",
            ValueDef::Bool { .. } => "bool",
            ValueDef::Int { .. } => "int",
            ValueDef::Double { .. } => "double",
            ValueDef::IntList { .. } => "int_list",
            ValueDef::Tensor(_) => "tensor",
        }
    }
}

/// Declared type and shape of a program input or output.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TensorMeta {
    pub dtype: ScalarType,
    /// For `DynamicBound` tensors, the upper bound.
    pub shape: Vec<usize>,
    pub dynamism: ShapeDynamism,
}

/// What an instruction runs.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    /// A kernel looked up by operator name in the kernel registry.
    Kernel { name: String },
    /// A call into delegate `index` of the delegate table.
    Delegate { index: usize },
}

/// One step of the instruction chain.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Instruction {
    pub op: Operation,
    pub args: Vec<usize>,
    pub results: Vec<usize>,
    #[serde(default = "default_debug_handle")]
    pub debug_handle: u32,
}

fn default_debug_handle() -> u32 {
    NO_DEBUG_HANDLE
}

impl Instruction {
    /// Opcode for logs and metrics.
    pub fn opcode(&self) -> String {
        match &self.op {
            Operation::Kernel { name } => name.clone(),
            Operation::Delegate { index } => format!("delegate#{index}"),
        }
    }
}

/// A backend-specific compile option.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CompileSpec {
    pub key: String,
    pub value: Vec<u8>,
}

impl CompileSpec {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A sub-graph lowered for an accelerator backend.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DelegateDef {
    pub backend_id: String,
    pub blob: Segment,
    #[serde(default)]
    pub compile_specs: Vec<CompileSpec>,
}

/// The complete JSON header.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProgramHeader {
    pub name: String,
    pub values: Vec<ValueDef>,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
    pub chain: Vec<Instruction>,
    pub arenas: Vec<ArenaSpec>,
    #[serde(default)]
    pub delegates: Vec<DelegateDef>,
    #[serde(default)]
    pub constants: Segment,
}
