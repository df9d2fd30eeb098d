// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The loaded program.
//!
//! # Type-State Pattern
//!
//! ```text
//! Program<Parsed>     framing, header and constant index read; nothing checked.
//!       │  .verify(&catalog)
//!       ▼
//! Program<Verified>   every index, tensor, constant, lifetime and arena
//!                     placement checked; safe to execute.
//! ```
//!
//! Only `Program<Verified>` exposes the introspection API the executor
//! uses, so an unchecked program cannot reach a context.

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, Range};
use std::path::Path;

use memory_planner::{min_peak_bytes, Allocation, ArenaSpec, MemoryPlan, TensorLifetime};
use tensor_core::TensorDescriptor;

use crate::constants::ConstantPool;
use crate::header::{
    DelegateDef, Instruction, Operation, Storage, TensorMeta, TensorValue, ValueDef,
};
use crate::liveness::compute_lifetimes;
use crate::{format, ProgramError, ProgramHeader};

/// Answers whether a delegate backend id can be served.
pub trait BackendCatalog {
    fn is_registered(&self, backend_id: &str) -> bool;
}

impl BackendCatalog for HashSet<String> {
    fn is_registered(&self, backend_id: &str) -> bool {
        self.contains(backend_id)
    }
}

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: container decoded but not checked.
#[derive(Debug)]
pub struct Parsed;

/// Marker: program checked and ready to execute.
#[derive(Debug)]
pub struct Verified;

/// Sealed trait for program states.
pub trait ProgramState: fmt::Debug {}
impl ProgramState for Parsed {}
impl ProgramState for Verified {}

// ── Backing bytes ──────────────────────────────────────────────────

enum Backing {
    Owned(Vec<u8>),
    Mapped(memmap2::Mmap),
}

impl Deref for Backing {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Backing::Owned(bytes) => bytes,
            Backing::Mapped(map) => map,
        }
    }
}

impl fmt::Debug for Backing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backing::Owned(b) => write!(f, "Owned({} bytes)", b.len()),
            Backing::Mapped(m) => write!(f, "Mapped({} bytes)", m.len()),
        }
    }
}

// ── Program ────────────────────────────────────────────────────────

/// A serialized program together with its backing bytes.
///
/// Immutable once verified; share it through `Arc`.
#[derive(Debug)]
pub struct Program<S: ProgramState = Verified> {
    header: ProgramHeader,
    backing: Backing,
    data: Range<usize>,
    constants: ConstantPool,
    lifetimes: Vec<TensorLifetime>,
    plan: MemoryPlan,
    _state: PhantomData<S>,
}

impl Program<Parsed> {
    /// Decodes a program held in memory.
    pub fn parse(bytes: Vec<u8>) -> Result<Self, ProgramError> {
        Self::from_backing(Backing::Owned(bytes))
    }

    /// Memory-maps and decodes a program file.
    pub fn load_file(path: &Path) -> Result<Self, ProgramError> {
        let file = std::fs::File::open(path)?;
        // SAFETY: the map is read-only and program files are not modified
        // while loaded.
        let map = unsafe { memmap2::Mmap::map(&file) }?;
        tracing::info!(path = %path.display(), bytes = map.len(), "mapped program file");
        Self::from_backing(Backing::Mapped(map))
    }

    fn from_backing(backing: Backing) -> Result<Self, ProgramError> {
        let (header, data) = format::decode(&backing)?;
        let constants_range = segment_range(&data, header.constants.offset, header.constants.len)
            .ok_or_else(|| {
                ProgramError::Format(format!(
                    "constant segment {:?} outside data section of {} bytes",
                    header.constants,
                    data.len()
                ))
            })?;
        let constants = ConstantPool::parse(&backing, constants_range)?;
        Ok(Self {
            header,
            backing,
            data,
            constants,
            lifetimes: Vec::new(),
            plan: MemoryPlan {
                strategy_name: String::new(),
                arenas: Vec::new(),
                allocations: Vec::new(),
            },
            _state: PhantomData,
        })
    }

    pub fn header(&self) -> &ProgramHeader {
        &self.header
    }

    /// Checks the program and transitions to the `Verified` state.
    ///
    /// # Checks
    /// - Every input, output, argument, result and delegate index is in range.
    /// - Tensor values are well formed; planned tensors are contiguous;
    ///   constants exist with the declared dtype and enough bytes.
    /// - Inputs and results are planned tensors; no instruction writes one
    ///   of its own arguments; outputs are tensors.
    /// - No planned value is read before it is written.
    /// - The embedded arena placement is valid for the computed lifetimes.
    /// - Delegate blobs are in bounds and their backends are registered.
    pub fn verify(self, catalog: &dyn BackendCatalog) -> Result<Program<Verified>, ProgramError> {
        self.check_values()?;
        self.check_io()?;
        self.check_chain()?;
        self.check_delegates(catalog)?;

        let lifetimes = compute_lifetimes(&self.header)?;
        let plan = embedded_plan(&self.header, &lifetimes);
        plan.validate()?;

        tracing::info!(
            program = %self.header.name,
            values = self.header.values.len(),
            instructions = self.header.chain.len(),
            delegates = self.header.delegates.len(),
            arena_bytes = plan.peak_bytes(),
            "program verified"
        );

        Ok(Program {
            header: self.header,
            backing: self.backing,
            data: self.data,
            constants: self.constants,
            lifetimes,
            plan,
            _state: PhantomData,
        })
    }

    fn value_index(&self, index: usize) -> Result<&ValueDef, ProgramError> {
        self.header.values.get(index).ok_or(ProgramError::IndexOutOfRange {
            table: "value",
            index,
            len: self.header.values.len(),
        })
    }

    fn check_values(&self) -> Result<(), ProgramError> {
        for (index, value) in self.header.values.iter().enumerate() {
            let Some(tensor) = value.as_tensor() else { continue };
            let desc = tensor.descriptor().map_err(|e| ProgramError::InvalidValue {
                index,
                detail: e.to_string(),
            })?;
            match &tensor.storage {
                Storage::Planned { .. } => {
                    if !desc.is_contiguous() {
                        return Err(ProgramError::InvalidValue {
                            index,
                            detail: "planned tensors must be contiguous".into(),
                        });
                    }
                }
                Storage::Constant { name } => {
                    let entry = self.constants.get(name).ok_or_else(|| {
                        ProgramError::InvalidConstant {
                            value: index,
                            detail: format!("constant '{name}' not in constant segment"),
                        }
                    })?;
                    if entry.dtype != tensor.dtype {
                        return Err(ProgramError::InvalidConstant {
                            value: index,
                            detail: format!(
                                "constant '{name}' is {} but value declares {}",
                                entry.dtype, tensor.dtype
                            ),
                        });
                    }
                    if entry.range.len() < desc.storage_span_bytes() {
                        return Err(ProgramError::InvalidConstant {
                            value: index,
                            detail: format!(
                                "constant '{name}' has {} bytes, value needs {}",
                                entry.range.len(),
                                desc.storage_span_bytes()
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn check_io(&self) -> Result<(), ProgramError> {
        for &input in &self.header.inputs {
            if !self.value_index(input)?.as_tensor().is_some_and(TensorValue::is_planned) {
                return Err(ProgramError::InvalidValue {
                    index: input,
                    detail: "program inputs must be planned tensors".into(),
                });
            }
        }
        for &output in &self.header.outputs {
            if self.value_index(output)?.as_tensor().is_none() {
                return Err(ProgramError::InvalidValue {
                    index: output,
                    detail: "program outputs must be tensors".into(),
                });
            }
        }
        Ok(())
    }

    fn check_chain(&self) -> Result<(), ProgramError> {
        for (index, instruction) in self.header.chain.iter().enumerate() {
            match &instruction.op {
                Operation::Kernel { name } if name.is_empty() => {
                    return Err(ProgramError::InvalidInstruction {
                        index,
                        detail: "empty kernel name".into(),
                    })
                }
                Operation::Kernel { .. } => {}
                Operation::Delegate { index: delegate } => {
                    if *delegate >= self.header.delegates.len() {
                        return Err(ProgramError::IndexOutOfRange {
                            table: "delegate",
                            index: *delegate,
                            len: self.header.delegates.len(),
                        });
                    }
                }
            }
            for &arg in &instruction.args {
                self.value_index(arg)?;
            }
            for &result in &instruction.results {
                if !self.value_index(result)?.as_tensor().is_some_and(TensorValue::is_planned) {
                    return Err(ProgramError::InvalidInstruction {
                        index,
                        detail: format!("result value {result} is not a planned tensor"),
                    });
                }
                if instruction.args.contains(&result) {
                    return Err(ProgramError::InvalidInstruction {
                        index,
                        detail: format!("value {result} is both argument and result"),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_delegates(&self, catalog: &dyn BackendCatalog) -> Result<(), ProgramError> {
        for (index, delegate) in self.header.delegates.iter().enumerate() {
            if segment_range(&self.data, delegate.blob.offset, delegate.blob.len).is_none() {
                return Err(ProgramError::Format(format!(
                    "delegate {index} blob {:?} outside data section of {} bytes",
                    delegate.blob,
                    self.data.len()
                )));
            }
            if !catalog.is_registered(&delegate.backend_id) {
                return Err(ProgramError::UnregisteredBackend {
                    backend_id: delegate.backend_id.clone(),
                });
            }
        }
        Ok(())
    }
}

impl Program<Verified> {
    /// Parses and verifies in one step.
    pub fn load(bytes: Vec<u8>, catalog: &dyn BackendCatalog) -> Result<Self, ProgramError> {
        Program::parse(bytes)?.verify(catalog)
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn header(&self) -> &ProgramHeader {
        &self.header
    }

    pub fn values(&self) -> &[ValueDef] {
        &self.header.values
    }

    pub fn value(&self, index: usize) -> Option<&ValueDef> {
        self.header.values.get(index)
    }

    pub fn tensor_value(&self, index: usize) -> Option<&TensorValue> {
        self.value(index).and_then(ValueDef::as_tensor)
    }

    /// Descriptor of a tensor value, as declared.
    pub fn descriptor(&self, index: usize) -> Option<TensorDescriptor> {
        // Verification already built every descriptor once.
        self.tensor_value(index).and_then(|t| t.descriptor().ok())
    }

    pub fn inputs(&self) -> &[usize] {
        &self.header.inputs
    }

    pub fn outputs(&self) -> &[usize] {
        &self.header.outputs
    }

    pub fn num_inputs(&self) -> usize {
        self.header.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.header.outputs.len()
    }

    pub fn chain(&self) -> &[Instruction] {
        &self.header.chain
    }

    pub fn num_instructions(&self) -> usize {
        self.header.chain.len()
    }

    pub fn arenas(&self) -> &[ArenaSpec] {
        &self.header.arenas
    }

    pub fn delegates(&self) -> &[DelegateDef] {
        &self.header.delegates
    }

    /// Declared dtype, shape and dynamism of input `i`.
    pub fn input_meta(&self, i: usize) -> Result<TensorMeta, ProgramError> {
        self.io_meta("input", &self.header.inputs, i)
    }

    /// Declared dtype, shape and dynamism of output `i`.
    pub fn output_meta(&self, i: usize) -> Result<TensorMeta, ProgramError> {
        self.io_meta("output", &self.header.outputs, i)
    }

    fn io_meta(
        &self,
        table: &'static str,
        indices: &[usize],
        i: usize,
    ) -> Result<TensorMeta, ProgramError> {
        indices
            .get(i)
            .and_then(|&v| self.tensor_value(v))
            .map(TensorValue::meta)
            .ok_or(ProgramError::IndexOutOfRange {
                table,
                index: i,
                len: indices.len(),
            })
    }

    /// Bytes of a named constant.
    pub fn constant_bytes(&self, name: &str) -> Option<&[u8]> {
        self.constants
            .get(name)
            .map(|entry| &self.backing[entry.range.clone()])
    }

    pub fn constant_pool(&self) -> &ConstantPool {
        &self.constants
    }

    /// Opaque blob of delegate `i`.
    pub fn delegate_blob(&self, i: usize) -> Option<&[u8]> {
        let delegate = self.header.delegates.get(i)?;
        segment_range(&self.data, delegate.blob.offset, delegate.blob.len)
            .map(|range| &self.backing[range])
    }

    /// Arena placement of every planned value.
    pub fn memory_plan(&self) -> &MemoryPlan {
        &self.plan
    }

    pub fn lifetimes(&self) -> &[TensorLifetime] {
        &self.lifetimes
    }

    /// Total size of the serialized program.
    pub fn size_bytes(&self) -> usize {
        self.backing.len()
    }

    pub fn is_memory_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    /// Human-readable multi-line summary.
    pub fn summary(&self) -> String {
        let kernels = self
            .header
            .chain
            .iter()
            .filter(|i| matches!(i.op, Operation::Kernel { .. }))
            .count();
        let mut lines = vec![
            format!(
                "Program '{}': {} values, {} instructions ({} kernel, {} delegate)",
                self.header.name,
                self.header.values.len(),
                self.header.chain.len(),
                kernels,
                self.header.chain.len() - kernels,
            ),
            format!(
                "  inputs {:?}, outputs {:?}",
                self.header.inputs, self.header.outputs
            ),
            format!(
                "  {} constants ({} bytes), {} delegates",
                self.constants.len(),
                self.constants.total_bytes(),
                self.header.delegates.len()
            ),
            format!("  {}", self.plan.summary(min_peak_bytes(&self.lifetimes))),
        ];
        for delegate in &self.header.delegates {
            lines.push(format!(
                "  delegate '{}': {} byte blob, {} compile specs",
                delegate.backend_id,
                delegate.blob.len,
                delegate.compile_specs.len()
            ));
        }
        lines.join("\n")
    }
}

/// Absolute range of a data-relative segment, if it fits.
fn segment_range(data: &Range<usize>, offset: usize, len: usize) -> Option<Range<usize>> {
    let start = data.start.checked_add(offset)?;
    let end = start.checked_add(len)?;
    (end <= data.end).then_some(start..end)
}

/// Rebuilds the plan from the header's arenas and planned value offsets.
fn embedded_plan(header: &ProgramHeader, lifetimes: &[TensorLifetime]) -> MemoryPlan {
    let allocations = lifetimes
        .iter()
        .filter_map(|lt| match header.values[lt.value].as_tensor()?.storage {
            Storage::Planned { offset, .. } => Some(Allocation::at(lt, offset)),
            Storage::Constant { .. } => None,
        })
        .collect();
    MemoryPlan {
        strategy_name: "embedded".into(),
        arenas: header.arenas.clone(),
        allocations,
    }
}
