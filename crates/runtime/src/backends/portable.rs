// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The portable reference backend.
//!
//! Runs a delegated sub-graph on the portable kernels. The blob is JSON:
//!
//! ```json
//! {
//!   "version": 1,
//!   "values": [
//!     { "kind": "tensor", "dtype": "f32", "shape": [4],
//!       "external": { "external_id": 0, "io_type": "input" } },
//!     { "kind": "tensor", "dtype": "f32", "shape": [4] },
//!     { "kind": "tensor", "dtype": "f32", "shape": [4],
//!       "external": { "external_id": 0, "io_type": "output" } }
//!   ],
//!   "inputs": [0],
//!   "outputs": [2],
//!   "nodes": [
//!     { "op": "aten::relu.out", "args": [0], "results": [1] },
//!     { "op": "aten::exp.out", "args": [1], "results": [2] }
//!   ]
//! }
//! ```
//!
//! External values are bound to the delegate call's operands; the rest are
//! scratch tensors owned by the delegate state. External outputs are
//! write-only inside the sub-graph.
//!
//! Compile specs: `trace` (one byte, non-zero) logs every node at debug
//! level.

use program::CompileSpec;
use tensor_core::{Scalar, ScalarType, Tensor, TensorMut, TensorRef};

use crate::delegate::{BackendDelegate, DelegateError, DelegateIoSpec, DelegateState};
use crate::kernels::{KernelArg, KernelFn};
use crate::registry::KernelRegistry;
use crate::RuntimeError;

pub const PORTABLE_BACKEND_ID: &str = "portable";
pub const SUBGRAPH_VERSION: u32 = 1;

// ── Blob format ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoType {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct External {
    pub external_id: usize,
    pub io_type: IoType,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubgraphValue {
    Tensor {
        dtype: ScalarType,
        shape: Vec<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        external: Option<External>,
    },
    Bool {
        value: bool,
    },
    Int {
        value: i64,
    },
    Double {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SubgraphNode {
    pub op: String,
    pub args: Vec<usize>,
    pub results: Vec<usize>,
}

/// A delegated sub-graph, as stored in the blob.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PortableSubgraph {
    pub version: u32,
    pub values: Vec<SubgraphValue>,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
    pub nodes: Vec<SubgraphNode>,
}

impl Default for PortableSubgraph {
    fn default() -> Self {
        Self::new()
    }
}

impl PortableSubgraph {
    pub fn new() -> Self {
        Self {
            version: SUBGRAPH_VERSION,
            values: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            nodes: Vec::new(),
        }
    }

    fn push(&mut self, value: SubgraphValue) -> usize {
        self.values.push(value);
        self.values.len() - 1
    }

    /// Declares the next external input.
    pub fn input(&mut self, dtype: ScalarType, shape: &[usize]) -> usize {
        let external = External {
            external_id: self.inputs.len(),
            io_type: IoType::Input,
        };
        let value = self.push(SubgraphValue::Tensor {
            dtype,
            shape: shape.to_vec(),
            external: Some(external),
        });
        self.inputs.push(value);
        value
    }

    /// Declares the next external output.
    pub fn output(&mut self, dtype: ScalarType, shape: &[usize]) -> usize {
        let external = External {
            external_id: self.outputs.len(),
            io_type: IoType::Output,
        };
        let value = self.push(SubgraphValue::Tensor {
            dtype,
            shape: shape.to_vec(),
            external: Some(external),
        });
        self.outputs.push(value);
        value
    }

    /// Declares a backend-owned scratch tensor.
    pub fn scratch(&mut self, dtype: ScalarType, shape: &[usize]) -> usize {
        self.push(SubgraphValue::Tensor {
            dtype,
            shape: shape.to_vec(),
            external: None,
        })
    }

    pub fn scalar(&mut self, scalar: Scalar) -> usize {
        self.push(match scalar {
            Scalar::Bool(value) => SubgraphValue::Bool { value },
            Scalar::Int(value) => SubgraphValue::Int { value },
            Scalar::Double(value) => SubgraphValue::Double { value },
        })
    }

    pub fn node(&mut self, op: impl Into<String>, args: &[usize], results: &[usize]) -> &mut Self {
        self.nodes.push(SubgraphNode {
            op: op.into(),
            args: args.to_vec(),
            results: results.to_vec(),
        });
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DelegateError> {
        serde_json::to_vec(self).map_err(|e| DelegateError::InvalidBlob(e.to_string()))
    }

    pub fn from_bytes(blob: &[u8]) -> Result<Self, DelegateError> {
        serde_json::from_slice(blob).map_err(|e| DelegateError::InvalidBlob(e.to_string()))
    }
}

// ── Backend ────────────────────────────────────────────────────────

/// Runs sub-graphs on the portable kernels.
#[derive(Debug)]
pub struct PortableBackend {
    kernels: KernelRegistry,
}

impl PortableBackend {
    pub fn new() -> Result<Self, RuntimeError> {
        Ok(Self::with_kernels(KernelRegistry::portable()?))
    }

    pub fn with_kernels(kernels: KernelRegistry) -> Self {
        Self { kernels }
    }
}

impl BackendDelegate for PortableBackend {
    fn id(&self) -> &str {
        PORTABLE_BACKEND_ID
    }

    fn init(
        &self,
        blob: &[u8],
        specs: &[CompileSpec],
        io: &DelegateIoSpec,
    ) -> Result<Box<dyn DelegateState>, DelegateError> {
        let graph = PortableSubgraph::from_bytes(blob)?;
        if graph.version != SUBGRAPH_VERSION {
            return Err(DelegateError::Unsupported(format!(
                "sub-graph version {}",
                graph.version
            )));
        }
        let trace = specs
            .iter()
            .find(|s| s.key == "trace")
            .is_some_and(|s| s.value.first().is_some_and(|&b| b != 0));

        let slots = resolve_slots(&graph, io)?;
        let mut steps = Vec::with_capacity(graph.nodes.len());
        for (index, node) in graph.nodes.iter().enumerate() {
            steps.push(compile_node(&self.kernels, &graph, &slots, index, node)?);
        }
        let scratch = graph
            .values
            .iter()
            .zip(&slots)
            .map(|(value, slot)| match (value, slot) {
                (SubgraphValue::Tensor { dtype, shape, .. }, Slot::Scratch) => {
                    Some(Tensor::zeros(shape.clone(), *dtype))
                }
                _ => None,
            })
            .collect();

        tracing::debug!(nodes = steps.len(), trace, "portable delegate initialised");
        Ok(Box::new(PortableState {
            slots,
            steps,
            scratch,
            trace,
            num_inputs: io.inputs.len(),
            num_outputs: io.outputs.len(),
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Input(usize),
    Output(usize),
    Scratch,
    Scalar(Scalar),
}

fn resolve_slots(graph: &PortableSubgraph, io: &DelegateIoSpec) -> Result<Vec<Slot>, DelegateError> {
    if graph.inputs.len() != io.inputs.len() || graph.outputs.len() != io.outputs.len() {
        return Err(DelegateError::IoMismatch(format!(
            "sub-graph has {} inputs and {} outputs, call site has {} and {}",
            graph.inputs.len(),
            graph.outputs.len(),
            io.inputs.len(),
            io.outputs.len()
        )));
    }

    let mut slots = Vec::with_capacity(graph.values.len());
    for value in &graph.values {
        slots.push(match value {
            SubgraphValue::Tensor { external: None, .. } => Slot::Scratch,
            SubgraphValue::Tensor {
                dtype,
                shape,
                external: Some(ext),
            } => {
                let (declared, slot) = match ext.io_type {
                    IoType::Input => (io.inputs.get(ext.external_id), Slot::Input(ext.external_id)),
                    IoType::Output => {
                        (io.outputs.get(ext.external_id), Slot::Output(ext.external_id))
                    }
                };
                let declared = declared.ok_or_else(|| {
                    DelegateError::IoMismatch(format!("external id {} out of range", ext.external_id))
                })?;
                if declared.dtype != *dtype || declared.shape != *shape {
                    return Err(DelegateError::IoMismatch(format!(
                        "external {:?} {} is {} {:?}, call site declares {} {:?}",
                        ext.io_type, ext.external_id, dtype, shape, declared.dtype, declared.shape
                    )));
                }
                slot
            }
            SubgraphValue::Bool { value } => Slot::Scalar(Scalar::Bool(*value)),
            SubgraphValue::Int { value } => Slot::Scalar(Scalar::Int(*value)),
            SubgraphValue::Double { value } => Slot::Scalar(Scalar::Double(*value)),
        });
    }
    Ok(slots)
}

struct Step {
    op: String,
    kernel: KernelFn,
    args: Vec<usize>,
    results: Vec<usize>,
}

fn compile_node(
    kernels: &KernelRegistry,
    graph: &PortableSubgraph,
    slots: &[Slot],
    index: usize,
    node: &SubgraphNode,
) -> Result<Step, DelegateError> {
    let invalid = |detail: String| DelegateError::InvalidBlob(format!("node {index}: {detail}"));
    let mut signature = Vec::new();
    for &arg in &node.args {
        match slots.get(arg) {
            None => return Err(invalid(format!("value {arg} out of range"))),
            Some(Slot::Output(_)) => {
                return Err(invalid(format!("external output {arg} read inside sub-graph")))
            }
            Some(_) => {}
        }
        if let SubgraphValue::Tensor { dtype, .. } = &graph.values[arg] {
            signature.push(*dtype);
        }
    }
    for &result in &node.results {
        match slots.get(result) {
            Some(Slot::Output(_)) | Some(Slot::Scratch) => {}
            _ => return Err(invalid(format!("value {result} cannot be written"))),
        }
        if node.args.contains(&result) {
            return Err(invalid(format!("value {result} is both argument and result")));
        }
        if let SubgraphValue::Tensor { dtype, .. } = &graph.values[result] {
            signature.push(*dtype);
        }
    }
    let kernel = kernels
        .resolve(&node.op, &signature)
        .map_err(|_| DelegateError::Unsupported(format!("operator '{}'", node.op)))?;
    Ok(Step {
        op: node.op.clone(),
        kernel,
        args: node.args.clone(),
        results: node.results.clone(),
    })
}

// ── State ──────────────────────────────────────────────────────────

struct PortableState {
    slots: Vec<Slot>,
    steps: Vec<Step>,
    scratch: Vec<Option<Tensor>>,
    trace: bool,
    num_inputs: usize,
    num_outputs: usize,
}

impl PortableState {
    fn run_step(
        step: &Step,
        slots: &[Slot],
        scratch: &mut [Option<Tensor>],
        inputs: &[TensorRef<'_>],
        outputs: &mut [TensorMut<'_>],
    ) -> Result<(), DelegateError> {
        // Scratch results are moved out while the node runs so the
        // arguments can borrow the rest of the scratch set.
        let mut taken: Vec<(usize, Tensor)> = Vec::new();
        for &v in &step.results {
            if slots[v] == Slot::Scratch {
                let tensor = scratch[v].take().ok_or_else(|| {
                    DelegateError::Backend(format!("scratch value {v} written twice"))
                })?;
                taken.push((v, tensor));
            }
        }

        let result = {
            let mut args = Vec::with_capacity(step.args.len());
            for &v in &step.args {
                args.push(match slots[v] {
                    Slot::Input(i) => KernelArg::Tensor(inputs[i]),
                    Slot::Scalar(s) => KernelArg::Scalar(s),
                    Slot::Scratch => match &scratch[v] {
                        Some(t) => KernelArg::Tensor(t.view()),
                        None => {
                            return Err(DelegateError::Backend(format!(
                                "scratch value {v} unavailable"
                            )))
                        }
                    },
                    Slot::Output(_) => {
                        return Err(DelegateError::Backend(format!("output {v} read")))
                    }
                });
            }

            let mut outs: Vec<Option<&mut TensorMut<'_>>> = outputs.iter_mut().map(Some).collect();
            let mut scratch_views = taken.iter_mut();
            let mut results = Vec::with_capacity(step.results.len());
            for &v in &step.results {
                match slots[v] {
                    Slot::Output(o) => match outs.get_mut(o).and_then(Option::take) {
                        Some(out) => results.push(out.reborrow()),
                        None => {
                            return Err(DelegateError::Backend(format!("output {o} bound twice")))
                        }
                    },
                    _ => match scratch_views.next() {
                        Some((_, tensor)) => results.push(tensor.view_mut()),
                        None => return Err(DelegateError::Backend("scratch mismatch".into())),
                    },
                }
            }
            (step.kernel)(&args, &mut results).map_err(DelegateError::from)
        };

        for (v, tensor) in taken {
            scratch[v] = Some(tensor);
        }
        result
    }
}

impl DelegateState for PortableState {
    fn execute(
        &mut self,
        inputs: &[TensorRef<'_>],
        outputs: &mut [TensorMut<'_>],
    ) -> Result<(), DelegateError> {
        if inputs.len() != self.num_inputs || outputs.len() != self.num_outputs {
            return Err(DelegateError::IoMismatch(format!(
                "expected {} inputs and {} outputs, got {} and {}",
                self.num_inputs,
                self.num_outputs,
                inputs.len(),
                outputs.len()
            )));
        }
        for (index, step) in self.steps.iter().enumerate() {
            if self.trace {
                tracing::debug!(node = index, op = %step.op, "portable delegate node");
            }
            Self::run_step(step, &self.slots, &mut self.scratch, inputs, outputs)?;
        }
        Ok(())
    }

    fn destroy(&mut self) {
        self.scratch.clear();
        self.steps.clear();
    }
}
