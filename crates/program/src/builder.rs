// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Exporter-side program construction.
//!
//! Values are declared first, then instructions that reference them by
//! index. `build` derives lifetimes from the chain, lays planned values out
//! with a [`PlanningStrategy`] and writes the container.
//!
//! # Example
//! ```
//! use memory_planner::GreedyBestFit;
//! use program::{Program, ProgramBuilder};
//! use std::collections::HashSet;
//! use tensor_core::{ScalarType, ShapeDynamism, Tensor};
//!
//! let mut b = ProgramBuilder::new("add_bias");
//! let x = b.input(ScalarType::F32, &[2, 2], ShapeDynamism::Static);
//! let bias = b.constant("bias", Tensor::from_slice([2], &[1.0f32, 2.0]).unwrap());
//! let y = b.tensor(ScalarType::F32, &[2, 2]);
//! b.kernel("aten::add.out", &[x, bias], &[y]);
//! b.output(y);
//!
//! let bytes = b.build(&GreedyBestFit::default()).unwrap();
//! let program = Program::load(bytes, &HashSet::new()).unwrap();
//! assert_eq!(program.num_instructions(), 1);
//! ```

use std::collections::BTreeMap;

use memory_planner::PlanningStrategy;
use tensor_core::{ScalarType, ShapeDynamism, Tensor};

use crate::constants::serialize_constants;
use crate::header::{
    CompileSpec, DelegateDef, Instruction, Operation, Segment, Storage, TensorValue, ValueDef,
};
use crate::liveness::compute_lifetimes;
use crate::{format, ProgramError, ProgramHeader};

/// Arena used by [`ProgramBuilder::input`] and [`ProgramBuilder::tensor`].
pub const DEFAULT_MEMORY_ID: u32 = 0;

struct PendingDelegate {
    backend_id: String,
    blob: Vec<u8>,
    compile_specs: Vec<CompileSpec>,
}

/// Incrementally assembles a serialized program.
pub struct ProgramBuilder {
    name: String,
    values: Vec<ValueDef>,
    constants: BTreeMap<String, Tensor>,
    chain: Vec<Instruction>,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
    delegates: Vec<PendingDelegate>,
}

impl ProgramBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            constants: BTreeMap::new(),
            chain: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            delegates: Vec::new(),
        }
    }

    fn push(&mut self, value: ValueDef) -> usize {
        self.values.push(value);
        self.values.len() - 1
    }

    // ── Values ─────────────────────────────────────────────────────

    /// Declares a planned tensor in `memory_id`. Its offset is assigned at
    /// build time.
    pub fn tensor_in(
        &mut self,
        memory_id: u32,
        dtype: ScalarType,
        shape: &[usize],
        dynamism: ShapeDynamism,
    ) -> usize {
        self.push(ValueDef::Tensor(TensorValue {
            dtype,
            shape: shape.to_vec(),
            strides: None,
            dynamism,
            storage: Storage::Planned {
                memory_id,
                offset: 0,
            },
        }))
    }

    /// Declares a static planned tensor in the default arena.
    pub fn tensor(&mut self, dtype: ScalarType, shape: &[usize]) -> usize {
        self.tensor_in(DEFAULT_MEMORY_ID, dtype, shape, ShapeDynamism::Static)
    }

    /// Declares a planned tensor and appends it to the program inputs.
    pub fn input(&mut self, dtype: ScalarType, shape: &[usize], dynamism: ShapeDynamism) -> usize {
        let value = self.tensor_in(DEFAULT_MEMORY_ID, dtype, shape, dynamism);
        self.inputs.push(value);
        value
    }

    /// Declares a constant tensor stored in the constant segment.
    pub fn constant(&mut self, name: impl Into<String>, tensor: Tensor) -> usize {
        let name = name.into();
        let value = self.push(ValueDef::Tensor(TensorValue {
            dtype: tensor.dtype(),
            shape: tensor.dims().to_vec(),
            strides: None,
            dynamism: ShapeDynamism::Static,
            storage: Storage::Constant { name: name.clone() },
        }));
        self.constants.insert(name, tensor);
        value
    }

    pub fn int(&mut self, value: i64) -> usize {
        self.push(ValueDef::Int { value })
    }

    pub fn double(&mut self, value: f64) -> usize {
        self.push(ValueDef::Double { value })
    }

    pub fn bool(&mut self, value: bool) -> usize {
        self.push(ValueDef::Bool { value })
    }

    pub fn int_list(&mut self, values: Vec<i64>) -> usize {
        self.push(ValueDef::IntList { values })
    }

    pub fn none(&mut self) -> usize {
        self.push(ValueDef::None)
    }

    /// Marks `value` as a program output.
    pub fn output(&mut self, value: usize) -> &mut Self {
        self.outputs.push(value);
        self
    }

    // ── Instructions ───────────────────────────────────────────────

    /// Appends a kernel call.
    pub fn kernel(&mut self, name: impl Into<String>, args: &[usize], results: &[usize]) -> &mut Self {
        self.instruction(Operation::Kernel { name: name.into() }, args, results)
    }

    /// Adds a delegate entry and returns its index.
    pub fn delegate(
        &mut self,
        backend_id: impl Into<String>,
        blob: Vec<u8>,
        compile_specs: Vec<CompileSpec>,
    ) -> usize {
        self.delegates.push(PendingDelegate {
            backend_id: backend_id.into(),
            blob,
            compile_specs,
        });
        self.delegates.len() - 1
    }

    /// Appends a call into delegate `index`.
    pub fn call_delegate(&mut self, index: usize, args: &[usize], results: &[usize]) -> &mut Self {
        self.instruction(Operation::Delegate { index }, args, results)
    }

    fn instruction(&mut self, op: Operation, args: &[usize], results: &[usize]) -> &mut Self {
        let debug_handle = self.chain.len() as u32;
        self.chain.push(Instruction {
            op,
            args: args.to_vec(),
            results: results.to_vec(),
            debug_handle,
        });
        self
    }

    // ── Serialisation ──────────────────────────────────────────────

    /// Plans arena offsets with `strategy` and writes the container.
    pub fn build(&self, strategy: &dyn PlanningStrategy) -> Result<Vec<u8>, ProgramError> {
        let mut header = ProgramHeader {
            name: self.name.clone(),
            values: self.values.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            chain: self.chain.clone(),
            arenas: Vec::new(),
            delegates: Vec::new(),
            constants: Segment::default(),
        };

        let lifetimes = compute_lifetimes(&header)?;
        let plan = strategy.plan(&lifetimes)?;
        for allocation in &plan.allocations {
            if let Some(ValueDef::Tensor(TensorValue {
                storage: Storage::Planned { offset, .. },
                ..
            })) = header.values.get_mut(allocation.value)
            {
                *offset = allocation.offset;
            }
        }
        header.arenas = plan.arenas.clone();

        let mut data = serialize_constants(&self.constants)?;
        header.constants = Segment {
            offset: 0,
            len: data.len(),
        };
        for pending in &self.delegates {
            header.delegates.push(DelegateDef {
                backend_id: pending.backend_id.clone(),
                blob: Segment {
                    offset: data.len(),
                    len: pending.blob.len(),
                },
                compile_specs: pending.compile_specs.clone(),
            });
            data.extend_from_slice(&pending.blob);
        }

        tracing::debug!(
            program = %self.name,
            strategy = strategy.name(),
            arena_bytes = plan.peak_bytes(),
            data_bytes = data.len(),
            "built program"
        );
        format::encode(&header, &data)
    }
}
