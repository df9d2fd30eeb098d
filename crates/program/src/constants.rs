// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The constant segment: a SafeTensors blob embedded in the data section.
//!
//! Parsing only reads the SafeTensors header. Each constant is recorded as a
//! byte range into the program's backing buffer, so a memory-mapped program
//! never copies its weights.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use tensor_core::{ScalarType, Tensor};

use crate::ProgramError;

/// Location and type of one constant inside the backing buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantEntry {
    pub dtype: ScalarType,
    pub shape: Vec<usize>,
    /// Absolute byte range within the program bytes.
    pub range: Range<usize>,
}

/// Index of named constants.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: HashMap<String, ConstantEntry>,
}

impl ConstantPool {
    /// Indexes the SafeTensors blob at `segment` within `bytes`.
    ///
    /// An empty segment yields an empty pool.
    pub fn parse(bytes: &[u8], segment: Range<usize>) -> Result<Self, ProgramError> {
        if segment.is_empty() {
            return Ok(Self::default());
        }
        let base = bytes.as_ptr() as usize;
        let tensors = SafeTensors::deserialize(&bytes[segment])
            .map_err(|e| ProgramError::Constants(format!("SafeTensors parse error: {e}")))?;

        let mut entries = HashMap::new();
        for (name, view) in tensors.tensors() {
            let dtype = from_safetensors_dtype(view.dtype())?;
            let data = view.data();
            let start = data.as_ptr() as usize - base;
            entries.insert(
                name,
                ConstantEntry {
                    dtype,
                    shape: view.shape().to_vec(),
                    range: start..start + data.len(),
                },
            );
        }
        tracing::debug!(count = entries.len(), "indexed constant segment");
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&ConstantEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.entries.values().map(|e| e.range.len()).sum()
    }
}

/// Serialises named tensors into a SafeTensors blob.
pub fn serialize_constants(constants: &BTreeMap<String, Tensor>) -> Result<Vec<u8>, ProgramError> {
    if constants.is_empty() {
        return Ok(Vec::new());
    }
    let mut views = BTreeMap::new();
    for (name, tensor) in constants {
        let view = TensorView::new(
            to_safetensors_dtype(tensor.dtype()),
            tensor.dims().to_vec(),
            tensor.as_bytes(),
        )
        .map_err(|e| ProgramError::Constants(format!("constant '{name}': {e}")))?;
        views.insert(name.clone(), view);
    }
    safetensors::serialize(&views, &None)
        .map_err(|e| ProgramError::Constants(format!("SafeTensors write error: {e}")))
}

fn from_safetensors_dtype(dtype: Dtype) -> Result<ScalarType, ProgramError> {
    match dtype {
        Dtype::BOOL => Ok(ScalarType::Bool),
        Dtype::U8 => Ok(ScalarType::U8),
        Dtype::I8 => Ok(ScalarType::I8),
        Dtype::I16 => Ok(ScalarType::I16),
        Dtype::I32 => Ok(ScalarType::I32),
        Dtype::I64 => Ok(ScalarType::I64),
        Dtype::F16 => Ok(ScalarType::F16),
        Dtype::F32 => Ok(ScalarType::F32),
        Dtype::F64 => Ok(ScalarType::F64),
        other => Err(ProgramError::Constants(format!(
            "unsupported SafeTensors dtype: {other:?}"
        ))),
    }
}

fn to_safetensors_dtype(dtype: ScalarType) -> Dtype {
    match dtype {
        ScalarType::Bool => Dtype::BOOL,
        ScalarType::U8 => Dtype::U8,
        ScalarType::I8 => Dtype::I8,
        ScalarType::I16 => Dtype::I16,
        ScalarType::I32 => Dtype::I32,
        ScalarType::I64 => Dtype::I64,
        ScalarType::F16 => Dtype::F16,
        ScalarType::F32 => Dtype::F32,
        ScalarType::F64 => Dtype::F64,
    }
}
