// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-invocation execution state.
//!
//! ```text
//! Loaded ──set_input (all bound)──▶ Ready ──execute──▶ Executing
//!    ▲                                                   │
//!    └──────────── set_input ─── Completed ◀──── ok ─────┤
//!                                                        └── err ──▶ Failed
//! ```
//!
//! A context owns its arenas and delegate handles. `Failed` is terminal:
//! every later call returns [`RuntimeError::InvalidState`]. Dropping the
//! context releases the arenas to the pool and destroys every delegate.

use std::sync::Arc;
use std::time::Instant;

use memory_manager::{ArenaSet, MemoryPool, Region};
use program::{Operation, Program, Storage, TensorMeta, ValueDef};
use tensor_core::{Scalar, ShapeDynamism, Tensor, TensorDescriptor, TensorError, TensorMut, TensorRef};

use crate::delegate::{DelegateError, DelegateHandle, DelegateIoSpec};
use crate::kernels::{KernelArg, KernelFn};
use crate::metrics::{ExecutionMetrics, InstructionKind};
use crate::{Registry, RuntimeConfig, RuntimeError};

/// Lifecycle state of an [`ExecutionContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ContextState {
    /// Created; some inputs are unbound.
    Loaded,
    /// Every input is bound.
    Ready,
    /// Walking the instruction chain.
    Executing,
    /// The last run finished; outputs are readable.
    Completed,
    /// An instruction failed. Terminal.
    Failed,
}

enum StepKind {
    Kernel(KernelFn),
    Delegate(DelegateHandle),
}

struct Step {
    opcode: String,
    debug_handle: u32,
    args: Vec<usize>,
    results: Vec<usize>,
    kind: StepKind,
}

impl Step {
    fn instruction_kind(&self) -> InstructionKind {
        match self.kind {
            StepKind::Kernel(_) => InstructionKind::Kernel,
            StepKind::Delegate(_) => InstructionKind::Delegate,
        }
    }
}

/// Arenas, bound inputs and resolved instructions for one program.
pub struct ExecutionContext {
    program: Arc<Program>,
    state: ContextState,
    arenas: ArenaSet,
    /// Arena slot of every planned value.
    regions: Vec<Option<Region>>,
    /// Current descriptor of every tensor value.
    descriptors: Vec<Option<TensorDescriptor>>,
    /// Planned, non-input values whose shape may change during a run.
    dynamic_values: Vec<usize>,
    steps: Vec<Step>,
    bound: Vec<bool>,
    profiling: bool,
    zero_arenas: bool,
    last_metrics: Option<ExecutionMetrics>,
}

impl ExecutionContext {
    pub(crate) fn new(
        program: Arc<Program>,
        registry: &Registry,
        pool: &MemoryPool,
        config: &RuntimeConfig,
    ) -> Result<Self, RuntimeError> {
        let arenas = ArenaSet::allocate(
            pool,
            program.arenas().iter().map(|a| (a.memory_id, a.capacity)),
        )?;

        let mut regions = Vec::with_capacity(program.values().len());
        let mut descriptors = Vec::with_capacity(program.values().len());
        let mut dynamic_values = Vec::new();
        for (index, value) in program.values().iter().enumerate() {
            let tensor = value.as_tensor();
            let desc = program.descriptor(index);
            let region = match (tensor.map(|t| &t.storage), &desc) {
                (Some(Storage::Planned { memory_id, offset }), Some(desc)) => {
                    Some(Region::new(*memory_id, *offset, desc.nbytes()))
                }
                _ => None,
            };
            if region.is_some()
                && desc.as_ref().is_some_and(|d| d.dynamism() == ShapeDynamism::DynamicBound)
                && !program.inputs().contains(&index)
            {
                dynamic_values.push(index);
            }
            regions.push(region);
            descriptors.push(desc);
        }

        // Handles created before a failure are destroyed when `steps` drops.
        let mut steps = Vec::with_capacity(program.num_instructions());
        for instruction in program.chain() {
            let kind = match &instruction.op {
                Operation::Kernel { name } => {
                    let signature: Vec<_> = instruction
                        .args
                        .iter()
                        .chain(&instruction.results)
                        .filter_map(|&v| program.tensor_value(v).map(|t| t.dtype))
                        .collect();
                    StepKind::Kernel(registry.kernels().resolve(name, &signature)?)
                }
                Operation::Delegate { index } => StepKind::Delegate(init_delegate(
                    &program,
                    registry,
                    config,
                    *index,
                    &instruction.args,
                    &instruction.results,
                )?),
            };
            steps.push(Step {
                opcode: instruction.opcode(),
                debug_handle: instruction.debug_handle,
                args: instruction.args.clone(),
                results: instruction.results.clone(),
                kind,
            });
        }

        let state = if program.num_inputs() == 0 {
            ContextState::Ready
        } else {
            ContextState::Loaded
        };
        tracing::info!(
            program = %program.name(),
            arena_bytes = arenas.total_bytes(),
            instructions = steps.len(),
            "execution context created"
        );
        Ok(Self {
            bound: vec![false; program.num_inputs()],
            program,
            state,
            arenas,
            regions,
            descriptors,
            dynamic_values,
            steps,
            profiling: config.enable_profiling,
            zero_arenas: config.zero_arenas_on_execute,
            last_metrics: None,
        })
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    pub fn arena_bytes(&self) -> usize {
        self.arenas.total_bytes()
    }

    pub fn num_inputs(&self) -> usize {
        self.program.num_inputs()
    }

    pub fn num_outputs(&self) -> usize {
        self.program.num_outputs()
    }

    pub fn input_meta(&self, i: usize) -> Result<TensorMeta, RuntimeError> {
        Ok(self.program.input_meta(i)?)
    }

    pub fn output_meta(&self, i: usize) -> Result<TensorMeta, RuntimeError> {
        Ok(self.program.output_meta(i)?)
    }

    pub fn is_input_bound(&self, i: usize) -> bool {
        self.bound.get(i).copied().unwrap_or(false)
    }

    /// Metrics of the last completed run.
    pub fn last_metrics(&self) -> Option<&ExecutionMetrics> {
        self.last_metrics.as_ref()
    }

    // ── Inputs ─────────────────────────────────────────────────────

    /// Copies `input` into the arena slot of program input `i`.
    ///
    /// The dtype must match exactly. The shape must match the declared
    /// shape, or fit its capacity when the input is `DynamicBound`.
    pub fn set_input(&mut self, i: usize, input: &TensorRef<'_>) -> Result<(), RuntimeError> {
        if self.state == ContextState::Failed {
            return Err(self.invalid_state("set_input"));
        }
        let value = *self.program.inputs().get(i).ok_or(RuntimeError::IndexOutOfRange {
            what: "input",
            index: i,
            len: self.program.num_inputs(),
        })?;

        if self.state == ContextState::Completed {
            // First binding of a new run.
            if self.zero_arenas {
                self.arenas.zero_all();
            }
            self.state = ContextState::Loaded;
        }

        let input_err = |source: TensorError| RuntimeError::Input { index: i, source };
        let not_planned = self.invalid_state("set_input");
        let (Some(desc), Some(region)) = (self.descriptors[value].as_mut(), self.regions[value])
        else {
            return Err(not_planned);
        };
        if input.dtype() != desc.dtype() {
            return Err(input_err(TensorError::DTypeMismatch {
                expected: desc.dtype(),
                actual: input.dtype(),
            }));
        }
        let dst = self.arenas.region_mut(&region)?;
        let mut slot = TensorMut::new(desc, dst).map_err(input_err)?;
        slot.resize(input.dims()).map_err(input_err)?;
        input
            .copy_contiguous_into(slot.as_bytes_mut())
            .map_err(input_err)?;

        self.bound[i] = true;
        self.state = if self.bound.iter().all(|&b| b) {
            ContextState::Ready
        } else {
            ContextState::Loaded
        };
        Ok(())
    }

    /// Convenience for binding an owned tensor.
    pub fn set_input_tensor(&mut self, i: usize, input: &Tensor) -> Result<(), RuntimeError> {
        self.set_input(i, &input.view())
    }

    // ── Execution ──────────────────────────────────────────────────

    /// Runs the instruction chain once.
    ///
    /// The first failing instruction moves the context to `Failed` and the
    /// remaining instructions are skipped. On success the context is
    /// `Completed` and every input must be bound again before the next run.
    pub fn execute(&mut self) -> Result<(), RuntimeError> {
        let rerun = self.state == ContextState::Completed && self.bound.iter().all(|&b| b);
        if self.state != ContextState::Ready && !rerun {
            return Err(self.invalid_state("execute"));
        }
        if rerun && self.zero_arenas {
            self.arenas.zero_all();
        }
        for &v in &self.dynamic_values {
            self.descriptors[v] = self.program.descriptor(v);
        }

        self.state = ContextState::Executing;
        let run_start = Instant::now();
        let mut metrics = ExecutionMetrics::new(self.arenas.total_bytes());

        for (index, step) in self.steps.iter_mut().enumerate() {
            let step_start = Instant::now();
            let outcome = run_step(
                step,
                &self.program,
                &mut self.arenas,
                &mut self.descriptors,
                &self.regions,
            );
            if let Err(source) = outcome {
                self.state = ContextState::Failed;
                tracing::error!(
                    program = %self.program.name(),
                    instruction = index,
                    opcode = %step.opcode,
                    debug_handle = step.debug_handle,
                    error = %source,
                    "instruction failed"
                );
                return Err(RuntimeError::Instruction {
                    index,
                    opcode: step.opcode.clone(),
                    debug_handle: step.debug_handle,
                    source: Box::new(source),
                });
            }
            if self.profiling {
                metrics.record(
                    index,
                    &step.opcode,
                    step.debug_handle,
                    step.instruction_kind(),
                    step_start.elapsed(),
                );
            }
            tracing::trace!(instruction = index, opcode = %step.opcode, "instruction done");
        }

        metrics.finalise(run_start.elapsed(), self.steps.len());
        tracing::debug!("{}", metrics.summary());
        self.last_metrics = Some(metrics);
        self.bound.fill(false);
        self.state = ContextState::Completed;
        Ok(())
    }

    // ── Outputs ────────────────────────────────────────────────────

    /// Borrows program output `i`. Only valid in `Completed`.
    pub fn output(&self, i: usize) -> Result<TensorRef<'_>, RuntimeError> {
        if self.state != ContextState::Completed {
            return Err(self.invalid_state("read outputs"));
        }
        let value = *self.program.outputs().get(i).ok_or(RuntimeError::IndexOutOfRange {
            what: "output",
            index: i,
            len: self.program.num_outputs(),
        })?;
        self.inspect_value(value)
    }

    /// Borrows any tensor of the value table as the last run left it.
    ///
    /// Valid in every state, so a `Failed` context can be examined: values
    /// written by instructions before the failing one hold their results.
    /// Planned values not yet written this run hold unspecified bytes.
    pub fn inspect_value(&self, value: usize) -> Result<TensorRef<'_>, RuntimeError> {
        let slot = self.descriptors.get(value).ok_or(RuntimeError::IndexOutOfRange {
            what: "value",
            index: value,
            len: self.descriptors.len(),
        })?;
        let not_a_tensor = || {
            RuntimeError::Tensor(TensorError::InvalidArgument {
                op: "inspect_value",
                detail: format!("value {value} is not a tensor"),
            })
        };
        let desc = slot.as_ref().ok_or_else(not_a_tensor)?;
        let bytes = match (self.regions[value], self.program.tensor_value(value)) {
            (Some(region), _) => self.arenas.region(&region)?,
            (None, Some(tensor)) => match &tensor.storage {
                Storage::Constant { name } => self
                    .program
                    .constant_bytes(name)
                    .ok_or_else(not_a_tensor)?,
                Storage::Planned { .. } => return Err(not_a_tensor()),
            },
            (None, None) => return Err(not_a_tensor()),
        };
        Ok(TensorRef::new(desc, bytes)?)
    }

    /// Copies program output `i` into an owned tensor.
    pub fn output_tensor(&self, i: usize) -> Result<Tensor, RuntimeError> {
        Ok(self.output(i)?.to_tensor()?)
    }

    fn invalid_state(&self, operation: &'static str) -> RuntimeError {
        RuntimeError::InvalidState {
            operation,
            state: self.state,
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("program", &self.program.name())
            .field("state", &self.state)
            .field("arena_bytes", &self.arenas.total_bytes())
            .field("instructions", &self.steps.len())
            .finish()
    }
}

fn init_delegate(
    program: &Program,
    registry: &Registry,
    config: &RuntimeConfig,
    index: usize,
    args: &[usize],
    results: &[usize],
) -> Result<DelegateHandle, RuntimeError> {
    let def = &program.delegates()[index];
    let backend = registry
        .backends()
        .get(&def.backend_id)
        .filter(|_| !config.is_backend_disabled(&def.backend_id))
        .ok_or_else(|| RuntimeError::UnregisteredBackend {
            backend_id: def.backend_id.clone(),
        })?;
    if !backend.is_available() {
        return Err(DelegateError::Unavailable(def.backend_id.clone()).into());
    }
    let blob = program.delegate_blob(index).unwrap_or_default();
    let meta = |v: &usize| program.tensor_value(*v).map(|t| t.meta());
    let io = DelegateIoSpec {
        inputs: args.iter().filter_map(meta).collect(),
        outputs: results.iter().filter_map(meta).collect(),
    };
    let state = backend.init(blob, &def.compile_specs, &io)?;
    tracing::debug!(backend = %def.backend_id, delegate = index, "delegate initialised");
    Ok(DelegateHandle::new(def.backend_id.clone(), state))
}

/// Runs one instruction. Result descriptors are moved out for the call so
/// the kernel can resize them while arguments borrow the rest.
fn run_step(
    step: &mut Step,
    program: &Program,
    arenas: &mut ArenaSet,
    descriptors: &mut [Option<TensorDescriptor>],
    regions: &[Option<Region>],
) -> Result<(), RuntimeError> {
    let mut out_descs = Vec::with_capacity(step.results.len());
    let mut missing = None;
    for &v in &step.results {
        match descriptors[v].take() {
            Some(desc) => out_descs.push(desc),
            None => {
                missing = Some(v);
                break;
            }
        }
    }

    let outcome = match missing {
        Some(v) => Err(RuntimeError::Tensor(TensorError::InvalidArgument {
            op: "execute",
            detail: format!("value {v} written twice by one instruction"),
        })),
        None => invoke(step, program, arenas, descriptors, regions, &mut out_descs),
    };

    for (&v, desc) in step.results.iter().zip(out_descs) {
        descriptors[v] = Some(desc);
    }
    outcome
}

fn invoke(
    step: &mut Step,
    program: &Program,
    arenas: &mut ArenaSet,
    descriptors: &[Option<TensorDescriptor>],
    regions: &[Option<Region>],
    out_descs: &mut [TensorDescriptor],
) -> Result<(), RuntimeError> {
    let reads: Vec<Region> = step.args.iter().filter_map(|&v| regions[v]).collect();
    let writes: Vec<Region> = step.results.iter().filter_map(|&v| regions[v]).collect();
    let (read_slices, write_slices) = arenas.borrow_regions(&reads, &writes)?;
    let mut read_slices = read_slices.into_iter();

    let missing = |v: usize| {
        RuntimeError::Tensor(TensorError::InvalidArgument {
            op: "execute",
            detail: format!("value {v} has no storage"),
        })
    };
    let mut args = Vec::with_capacity(step.args.len());
    for &v in &step.args {
        args.push(match program.value(v) {
            Some(ValueDef::Tensor(tensor)) => {
                let desc = descriptors[v].as_ref().ok_or_else(|| missing(v))?;
                let bytes = match &tensor.storage {
                    Storage::Planned { .. } => read_slices.next().ok_or_else(|| missing(v))?,
                    Storage::Constant { name } => {
                        program.constant_bytes(name).ok_or_else(|| missing(v))?
                    }
                };
                KernelArg::Tensor(TensorRef::new(desc, bytes)?)
            }
            Some(ValueDef::Bool { value }) => KernelArg::Scalar(Scalar::Bool(*value)),
            Some(ValueDef::Int { value }) => KernelArg::Scalar(Scalar::Int(*value)),
            Some(ValueDef::Double { value }) => KernelArg::Scalar(Scalar::Double(*value)),
            Some(ValueDef::IntList { values }) => KernelArg::IntList(values),
            Some(ValueDef::None) | None => KernelArg::None,
        });
    }

    let mut outs = out_descs
        .iter_mut()
        .zip(write_slices)
        .map(|(desc, bytes)| TensorMut::new(desc, bytes))
        .collect::<Result<Vec<_>, _>>()?;

    match &mut step.kind {
        StepKind::Kernel(kernel) => (*kernel)(&args, &mut outs)?,
        StepKind::Delegate(handle) => {
            let inputs: Vec<TensorRef<'_>> =
                args.iter().filter_map(|a| a.as_tensor().copied()).collect();
            let mut outs: Vec<TensorMut<'_>> = outs.into_iter().map(TensorMut::fixed).collect();
            handle.execute(&inputs, &mut outs)?;
        }
    }
    Ok(())
}
