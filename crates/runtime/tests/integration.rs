// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: build → load → create context → bind → execute.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use memory_manager::MemoryBudget;
use memory_planner::GreedyBestFit;
use program::{CompileSpec, ProgramBuilder, ProgramError, TensorMeta};
use runtime::{
    BackendDelegate, ContextState, DelegateError, DelegateIoSpec, DelegateState, ErrorKind,
    KernelArg, KernelKey, PortableSubgraph, Registry, Runtime, RuntimeConfig, RuntimeError,
};
use tensor_core::{Scalar, ScalarType, ShapeDynamism, Tensor, TensorError, TensorMut, TensorRef};

// ── Helpers ────────────────────────────────────────────────────

fn runtime() -> Runtime {
    Runtime::new(RuntimeConfig::default(), Arc::new(Registry::portable().unwrap()))
}

fn f32s(values: &[f32]) -> Tensor {
    Tensor::from_slice([values.len()], values).unwrap()
}

/// out = (x + y) * scale
fn add_mul() -> Vec<u8> {
    let mut b = ProgramBuilder::new("add_mul");
    let x = b.input(ScalarType::F32, &[3], ShapeDynamism::Static);
    let y = b.input(ScalarType::F32, &[3], ShapeDynamism::Static);
    let scale = b.constant("scale", f32s(&[2.0, 2.0, 2.0]));
    let sum = b.tensor(ScalarType::F32, &[3]);
    let out = b.tensor(ScalarType::F32, &[3]);
    b.kernel("aten::add.out", &[x, y], &[sum])
        .kernel("aten::mul.out", &[sum, scale], &[out])
        .output(out);
    b.build(&GreedyBestFit::default()).unwrap()
}

/// a = x + 1; out = fmod(a, 0). Returns the program and the value index of `a`.
fn divide_by_zero() -> (Vec<u8>, usize) {
    let mut b = ProgramBuilder::new("div0");
    let x = b.input(ScalarType::I32, &[3], ShapeDynamism::Static);
    let one = b.constant("one", Tensor::from_slice([3], &[1i32, 1, 1]).unwrap());
    let zero = b.constant("zero", Tensor::zeros([3], ScalarType::I32));
    let a = b.tensor(ScalarType::I32, &[3]);
    let out = b.tensor(ScalarType::I32, &[3]);
    b.kernel("aten::add.out", &[x, one], &[a])
        .kernel("aten::fmod.Tensor_out", &[a, zero], &[out])
        .output(out);
    (b.build(&GreedyBestFit::default()).unwrap(), a)
}

// ── Execution ──────────────────────────────────────────────────

#[test]
fn test_add_mul_end_to_end() {
    let rt = runtime();
    let program = rt.load(add_mul()).unwrap();
    let mut ctx = rt.create_context(&program).unwrap();
    assert_eq!(ctx.state(), ContextState::Loaded);

    ctx.set_input_tensor(0, &f32s(&[1.0, 2.0, 3.0])).unwrap();
    assert_eq!(ctx.state(), ContextState::Loaded);
    ctx.set_input_tensor(1, &f32s(&[0.5, 0.5, 0.5])).unwrap();
    assert_eq!(ctx.state(), ContextState::Ready);

    ctx.execute().unwrap();
    assert_eq!(ctx.state(), ContextState::Completed);
    let out = ctx.output(0).unwrap();
    assert_eq!(out.dims(), &[3]);
    assert_eq!(out.to_vec::<f32>().unwrap(), vec![3.0, 5.0, 7.0]);

    let metrics = ctx.last_metrics().unwrap();
    assert_eq!(metrics.instructions_executed, 2);
    assert_eq!(metrics.instructions.len(), 2);
    assert_eq!(metrics.instructions[1].opcode, "aten::mul.out");
}

#[test]
fn test_rerun_requires_rebinding() {
    let rt = runtime();
    let program = rt.load(add_mul()).unwrap();
    let mut ctx = rt.create_context(&program).unwrap();
    ctx.set_input_tensor(0, &f32s(&[1.0, 1.0, 1.0])).unwrap();
    ctx.set_input_tensor(1, &f32s(&[1.0, 1.0, 1.0])).unwrap();
    ctx.execute().unwrap();

    let err = ctx.execute().unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidState { operation: "execute", .. }));
    assert_eq!(ctx.state(), ContextState::Completed);

    ctx.set_input_tensor(0, &f32s(&[2.0, 2.0, 2.0])).unwrap();
    assert_eq!(ctx.state(), ContextState::Loaded);
    assert!(ctx.output(0).is_err());
    ctx.set_input_tensor(1, &f32s(&[0.0, 1.0, 2.0])).unwrap();
    ctx.execute().unwrap();
    assert_eq!(
        ctx.output_tensor(0).unwrap().to_vec::<f32>().unwrap(),
        vec![4.0, 6.0, 8.0]
    );
}

#[test]
fn test_failure_stops_at_instruction() {
    let rt = runtime();
    let (bytes, sum) = divide_by_zero();
    let program = rt.load(bytes).unwrap();
    let mut ctx = rt.create_context(&program).unwrap();
    let x = Tensor::from_slice([3], &[1i32, 2, 3]).unwrap();
    ctx.set_input_tensor(0, &x).unwrap();

    let err = ctx.execute().unwrap_err();
    assert_eq!(err.instruction_index(), Some(1));
    assert_eq!(err.kind(), ErrorKind::Domain);
    match &err {
        RuntimeError::Instruction {
            opcode,
            debug_handle,
            source,
            ..
        } => {
            assert_eq!(opcode, "aten::fmod.Tensor_out");
            assert_eq!(*debug_handle, 1);
            assert!(matches!(
                **source,
                RuntimeError::Tensor(TensorError::DivisionByZero { .. })
            ));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The add ran to completion before the fmod failed.
    assert_eq!(
        ctx.inspect_value(sum).unwrap().to_vec::<i32>().unwrap(),
        vec![2, 3, 4]
    );

    // Failed is terminal.
    assert_eq!(ctx.state(), ContextState::Failed);
    assert!(matches!(
        ctx.set_input_tensor(0, &x),
        Err(RuntimeError::InvalidState { state: ContextState::Failed, .. })
    ));
    assert!(matches!(ctx.execute(), Err(RuntimeError::InvalidState { .. })));
    assert!(matches!(ctx.output(0), Err(RuntimeError::InvalidState { .. })));
    assert!(matches!(
        ctx.execute(),
        Err(RuntimeError::InvalidState { state: ContextState::Failed, .. })
    ));
    assert_eq!(ctx.state(), ContextState::Failed);
}

#[test]
fn test_inspect_value_rejects_non_tensors() {
    let rt = runtime();
    let program = rt.load(add_mul()).unwrap();
    let ctx = rt.create_context(&program).unwrap();
    assert!(matches!(
        ctx.inspect_value(99),
        Err(RuntimeError::IndexOutOfRange { what: "value", index: 99, .. })
    ));
    // The constant is readable before any run.
    let scale = ctx.inspect_value(2).unwrap();
    assert_eq!(scale.to_vec::<f32>().unwrap(), vec![2.0, 2.0, 2.0]);
}

#[test]
fn test_comparisons_produce_bool_outputs() {
    let mut b = ProgramBuilder::new("compare");
    let x = b.input(ScalarType::F32, &[4], ShapeDynamism::Static);
    let threshold = b.constant("threshold", Tensor::from_slice([4], &[2i64, 2, 2, 5]).unwrap());
    let below = b.tensor(ScalarType::Bool, &[4]);
    let above = b.tensor(ScalarType::Bool, &[4]);
    let equal = b.tensor(ScalarType::Bool, &[4]);
    b.kernel("aten::lt.Tensor_out", &[x, threshold], &[below])
        .kernel("aten::gt.Tensor_out", &[x, threshold], &[above])
        .kernel("aten::eq.Tensor_out", &[x, threshold], &[equal])
        .output(below)
        .output(above)
        .output(equal);
    let rt = runtime();
    let program = rt.load(b.build(&GreedyBestFit::default()).unwrap()).unwrap();
    let mut ctx = rt.create_context(&program).unwrap();

    ctx.set_input_tensor(0, &f32s(&[1.0, 2.0, 3.0, 4.0])).unwrap();
    ctx.execute().unwrap();
    let bools = |i: usize| ctx.output(i).unwrap().to_vec::<bool>().unwrap();
    assert_eq!(bools(0), vec![true, false, false, true]);
    assert_eq!(bools(1), vec![false, false, true, false]);
    assert_eq!(bools(2), vec![false, true, false, false]);
}

#[test]
fn test_dynamic_shapes_flow_through() {
    let mut b = ProgramBuilder::new("dynamic");
    let x = b.input(ScalarType::F32, &[4], ShapeDynamism::DynamicBound);
    let y = b.tensor_in(0, ScalarType::F32, &[4], ShapeDynamism::DynamicBound);
    b.kernel("aten::relu.out", &[x], &[y]).output(y);
    let rt = runtime();
    let program = rt.load(b.build(&GreedyBestFit::default()).unwrap()).unwrap();
    let mut ctx = rt.create_context(&program).unwrap();

    ctx.set_input_tensor(0, &f32s(&[-1.0, 2.0])).unwrap();
    ctx.execute().unwrap();
    let out = ctx.output(0).unwrap();
    assert_eq!(out.dims(), &[2]);
    assert_eq!(out.to_vec::<f32>().unwrap(), vec![0.0, 2.0]);

    ctx.set_input_tensor(0, &f32s(&[1.0, -2.0, 3.0])).unwrap();
    ctx.execute().unwrap();
    assert_eq!(ctx.output(0).unwrap().dims(), &[3]);

    // Past the declared bound.
    let err = ctx
        .set_input_tensor(0, &f32s(&[1.0, 2.0, 3.0, 4.0, 5.0]))
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Input { index: 0, .. }));
    assert_eq!(err.kind(), ErrorKind::Shape);
}

#[test]
fn test_input_validation() {
    let rt = runtime();
    let program = rt.load(add_mul()).unwrap();
    let mut ctx = rt.create_context(&program).unwrap();

    let ints = Tensor::from_slice([3], &[1i32, 2, 3]).unwrap();
    let err = ctx.set_input_tensor(0, &ints).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Input {
            index: 0,
            source: TensorError::DTypeMismatch { .. }
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Type);

    let err = ctx.set_input_tensor(1, &f32s(&[1.0, 2.0])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);

    let err = ctx.set_input_tensor(2, &f32s(&[1.0, 2.0, 3.0])).unwrap_err();
    assert!(matches!(err, RuntimeError::IndexOutOfRange { what: "input", index: 2, len: 2 }));

    // Rejected bindings leave the context usable.
    assert_eq!(ctx.state(), ContextState::Loaded);
    assert!(!ctx.is_input_bound(0));
    assert!(matches!(ctx.execute(), Err(RuntimeError::InvalidState { .. })));
}

#[test]
fn test_strided_input_is_copied_contiguously() {
    let rt = runtime();
    let program = rt.load(add_mul()).unwrap();
    let mut ctx = rt.create_context(&program).unwrap();

    // Every other element of [1, 9, 2, 9, 3].
    let backing = f32s(&[1.0, 9.0, 2.0, 9.0, 3.0]);
    let desc = tensor_core::TensorDescriptor::with_strides(vec![3], vec![2], ScalarType::F32).unwrap();
    let strided = TensorRef::new(&desc, backing.as_bytes()).unwrap();
    ctx.set_input(0, &strided).unwrap();
    ctx.set_input_tensor(1, &f32s(&[0.0, 0.0, 0.0])).unwrap();
    ctx.execute().unwrap();
    assert_eq!(ctx.output(0).unwrap().to_vec::<f32>().unwrap(), vec![2.0, 4.0, 6.0]);
}

#[test]
fn test_program_without_inputs_reruns() {
    let mut b = ProgramBuilder::new("constants_only");
    let a = b.constant("a", f32s(&[1.0, 2.0]));
    let c = b.constant("c", f32s(&[10.0, 20.0]));
    let y = b.tensor(ScalarType::F32, &[2]);
    b.kernel("aten::add.out", &[a, c], &[y]).output(y);
    let rt = runtime();
    let program = rt.load(b.build(&GreedyBestFit::default()).unwrap()).unwrap();
    let mut ctx = rt.create_context(&program).unwrap();

    assert_eq!(ctx.state(), ContextState::Ready);
    ctx.execute().unwrap();
    ctx.execute().unwrap();
    assert_eq!(ctx.output(0).unwrap().to_vec::<f32>().unwrap(), vec![11.0, 22.0]);
}

#[test]
fn test_scalar_arguments() {
    let mut b = ProgramBuilder::new("fmod_scalar");
    let x = b.input(ScalarType::F32, &[3], ShapeDynamism::Static);
    let divisor = b.double(2.5);
    let y = b.tensor(ScalarType::F32, &[3]);
    b.kernel("aten::fmod.Scalar_out", &[x, divisor], &[y]).output(y);
    let rt = runtime();
    let program = rt.load(b.build(&GreedyBestFit::default()).unwrap()).unwrap();
    let mut ctx = rt.create_context(&program).unwrap();

    ctx.set_input_tensor(0, &f32s(&[3.0, 5.0, -6.0])).unwrap();
    ctx.execute().unwrap();
    assert_eq!(ctx.output(0).unwrap().to_vec::<f32>().unwrap(), vec![0.5, 0.0, -1.0]);
}

// ── Resolution ─────────────────────────────────────────────────

#[test]
fn test_unregistered_opcode_fails_context_creation() {
    let mut b = ProgramBuilder::new("custom");
    let x = b.input(ScalarType::F32, &[2], ShapeDynamism::Static);
    let y = b.tensor(ScalarType::F32, &[2]);
    b.kernel("custom::square.out", &[x], &[y]).output(y);
    let bytes = b.build(&GreedyBestFit::default()).unwrap();

    let rt = runtime();
    let program = rt.load(bytes.clone()).unwrap();
    let err = rt.create_context(&program).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnregisteredOpcode);
    match err {
        RuntimeError::UnregisteredOpcode { opcode, signature } => {
            assert_eq!(opcode, "custom::square.out");
            assert_eq!(signature, vec!["f32".to_string(), "f32".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    // Registering the kernel makes the same program runnable.
    fn square(args: &[KernelArg<'_>], outs: &mut [TensorMut<'_>]) -> Result<(), TensorError> {
        let x = args[0].as_tensor().copied().ok_or(TensorError::InvalidArgument {
            op: "custom::square.out",
            detail: "expected a tensor".into(),
        })?;
        tensor_core::ops::mul_out(&x, &x, &mut outs[0])
    }
    let mut registry = Registry::with_portable_kernels().unwrap();
    registry
        .kernels_mut()
        .register(KernelKey::generic("custom::square.out"), square)
        .unwrap();
    let rt = Runtime::new(RuntimeConfig::default(), Arc::new(registry));
    let program = rt.load(bytes).unwrap();
    let mut ctx = rt.create_context(&program).unwrap();
    ctx.set_input_tensor(0, &f32s(&[3.0, -4.0])).unwrap();
    ctx.execute().unwrap();
    assert_eq!(ctx.output(0).unwrap().to_vec::<f32>().unwrap(), vec![9.0, 16.0]);
}

#[test]
fn test_out_of_memory() {
    let mut b = ProgramBuilder::new("large");
    let x = b.input(ScalarType::F32, &[1024], ShapeDynamism::Static);
    let y = b.tensor(ScalarType::F32, &[1024]);
    b.kernel("aten::neg.out", &[x], &[y]).output(y);
    let config = RuntimeConfig {
        memory_budget: MemoryBudget::from_kb(1),
        ..RuntimeConfig::default()
    };
    let rt = Runtime::new(config, Arc::new(Registry::portable().unwrap()));
    let program = rt.load(b.build(&GreedyBestFit::default()).unwrap()).unwrap();
    let err = rt.create_context(&program).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfMemory);
    assert_eq!(rt.pool().allocated_bytes(), 0);
}

#[test]
fn test_arenas_returned_on_drop() {
    let rt = runtime();
    let program = rt.load(add_mul()).unwrap();
    let ctx = rt.create_context(&program).unwrap();
    assert_eq!(rt.pool().allocated_bytes(), ctx.arena_bytes());
    assert!(ctx.arena_bytes() >= program.memory_plan().peak_bytes());
    drop(ctx);
    assert_eq!(rt.pool().allocated_bytes(), 0);
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&add_mul()).unwrap();
    file.flush().unwrap();

    let rt = runtime();
    let program = rt.load_file(file.path()).unwrap();
    assert!(program.is_memory_mapped());
    let mut ctx = rt.create_context(&program).unwrap();
    ctx.set_input_tensor(0, &f32s(&[1.0, 2.0, 3.0])).unwrap();
    ctx.set_input_tensor(1, &f32s(&[1.0, 2.0, 3.0])).unwrap();
    ctx.execute().unwrap();
    assert_eq!(ctx.output(0).unwrap().to_vec::<f32>().unwrap(), vec![4.0, 8.0, 12.0]);
}

#[test]
fn test_format_errors_surface_as_format_kind() {
    let rt = runtime();
    let err = rt.load(b"definitely not a program".to_vec()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

// ── Delegates ──────────────────────────────────────────────────

#[derive(Default)]
struct Counters {
    inits: AtomicUsize,
    destroys: AtomicUsize,
    fail_execute: AtomicBool,
}

/// Negates its single input, or fails when told to.
struct CountingBackend {
    counters: Arc<Counters>,
}

struct CountingState {
    counters: Arc<Counters>,
}

impl BackendDelegate for CountingBackend {
    fn id(&self) -> &str {
        "counting"
    }

    fn init(
        &self,
        blob: &[u8],
        compile_specs: &[CompileSpec],
        io: &DelegateIoSpec,
    ) -> Result<Box<dyn DelegateState>, DelegateError> {
        if blob != b"negate" || compile_specs.len() != 1 || io.inputs.len() != 1 {
            return Err(DelegateError::InvalidBlob("unexpected init arguments".into()));
        }
        self.counters.inits.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingState {
            counters: Arc::clone(&self.counters),
        }))
    }
}

impl DelegateState for CountingState {
    fn execute(
        &mut self,
        inputs: &[TensorRef<'_>],
        outputs: &mut [TensorMut<'_>],
    ) -> Result<(), DelegateError> {
        if self.counters.fail_execute.load(Ordering::SeqCst) {
            return Err(DelegateError::Backend("device lost".into()));
        }
        tensor_core::ops::neg_out(&inputs[0], &mut outputs[0])?;
        Ok(())
    }

    fn destroy(&mut self) {
        self.counters.destroys.fetch_add(1, Ordering::SeqCst);
    }
}

fn counting_runtime(config: RuntimeConfig) -> (Runtime, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let mut registry = Registry::portable().unwrap();
    registry
        .backends_mut()
        .register(Arc::new(CountingBackend {
            counters: Arc::clone(&counters),
        }))
        .unwrap();
    (Runtime::new(config, Arc::new(registry)), counters)
}

/// x → counting delegate (negate) → relu
fn delegated() -> Vec<u8> {
    let mut b = ProgramBuilder::new("delegated");
    let x = b.input(ScalarType::F32, &[3], ShapeDynamism::Static);
    let n = b.tensor(ScalarType::F32, &[3]);
    let y = b.tensor(ScalarType::F32, &[3]);
    let d = b.delegate("counting", b"negate".to_vec(), vec![CompileSpec::new("level", [1u8])]);
    b.call_delegate(d, &[x], &[n])
        .kernel("aten::relu.out", &[n], &[y])
        .output(y);
    b.build(&GreedyBestFit::default()).unwrap()
}

#[test]
fn test_delegate_runs_and_is_destroyed_once() {
    let (rt, counters) = counting_runtime(RuntimeConfig::default());
    let program = rt.load(delegated()).unwrap();
    {
        let mut ctx = rt.create_context(&program).unwrap();
        assert_eq!(counters.inits.load(Ordering::SeqCst), 1);
        ctx.set_input_tensor(0, &f32s(&[1.0, -2.0, 3.0])).unwrap();
        ctx.execute().unwrap();
        assert_eq!(ctx.output(0).unwrap().to_vec::<f32>().unwrap(), vec![0.0, 2.0, 0.0]);
        let metrics = ctx.last_metrics().unwrap();
        assert_eq!(metrics.instructions[0].opcode, "delegate#0");
        assert_eq!(counters.destroys.load(Ordering::SeqCst), 0);
    }
    assert_eq!(counters.destroys.load(Ordering::SeqCst), 1);
}

#[test]
fn test_delegate_survives_reruns_and_is_destroyed_once() {
    let (rt, counters) = counting_runtime(RuntimeConfig::default());
    let program = rt.load(delegated()).unwrap();
    let mut ctx = rt.create_context(&program).unwrap();

    let runs = [
        ([1.0, -2.0, 3.0], [0.0, 2.0, 0.0]),
        ([-1.0, -1.0, 4.0], [1.0, 1.0, 0.0]),
    ];
    for (input, expected) in runs {
        ctx.set_input_tensor(0, &f32s(&input)).unwrap();
        ctx.execute().unwrap();
        assert_eq!(ctx.output(0).unwrap().to_vec::<f32>().unwrap(), expected.to_vec());
    }
    assert_eq!(counters.inits.load(Ordering::SeqCst), 1);
    assert_eq!(counters.destroys.load(Ordering::SeqCst), 0);

    drop(ctx);
    assert_eq!(counters.inits.load(Ordering::SeqCst), 1);
    assert_eq!(counters.destroys.load(Ordering::SeqCst), 1);
}

#[test]
fn test_delegate_failure_fails_context_and_still_destroys() {
    let (rt, counters) = counting_runtime(RuntimeConfig::default());
    let program = rt.load(delegated()).unwrap();
    let mut ctx = rt.create_context(&program).unwrap();
    counters.fail_execute.store(true, Ordering::SeqCst);
    ctx.set_input_tensor(0, &f32s(&[1.0, 2.0, 3.0])).unwrap();

    let err = ctx.execute().unwrap_err();
    assert_eq!(err.instruction_index(), Some(0));
    assert_eq!(err.kind(), ErrorKind::Delegate);
    assert_eq!(ctx.state(), ContextState::Failed);
    drop(ctx);
    assert_eq!(counters.destroys.load(Ordering::SeqCst), 1);
}

#[test]
fn test_disabled_backend_rejected_at_load() {
    let config = RuntimeConfig {
        disabled_backends: vec!["counting".into()],
        ..RuntimeConfig::default()
    };
    let (rt, counters) = counting_runtime(config);
    let err = rt.load(delegated()).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Program(ProgramError::UnregisteredBackend { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::UnregisteredBackend);
    assert_eq!(counters.inits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_portable_subgraph_delegate() {
    let mut g = PortableSubgraph::new();
    let gx = g.input(ScalarType::F32, &[3]);
    let gr = g.scratch(ScalarType::F32, &[3]);
    let gy = g.output(ScalarType::F32, &[3]);
    let two = g.scalar(Scalar::Int(2));
    g.node("aten::abs.out", &[gx], &[gr]);
    g.node("aten::fmod.Scalar_out", &[gr, two], &[gy]);

    let mut b = ProgramBuilder::new("portable_delegate");
    let x = b.input(ScalarType::F32, &[3], ShapeDynamism::Static);
    let y = b.tensor(ScalarType::F32, &[3]);
    let d = b.delegate(runtime::PORTABLE_BACKEND_ID, g.to_bytes().unwrap(), Vec::new());
    b.call_delegate(d, &[x], &[y]).output(y);

    let rt = runtime();
    let program = rt.load(b.build(&GreedyBestFit::default()).unwrap()).unwrap();
    let mut ctx = rt.create_context(&program).unwrap();
    ctx.set_input_tensor(0, &f32s(&[-3.0, 4.5, 1.0])).unwrap();
    ctx.execute().unwrap();
    assert_eq!(ctx.output(0).unwrap().to_vec::<f32>().unwrap(), vec![1.0, 0.5, 1.0]);
    assert_eq!(
        ctx.output_meta(0).unwrap(),
        TensorMeta {
            dtype: ScalarType::F32,
            shape: vec![3],
            dynamism: ShapeDynamism::Static,
        }
    );
}

// ── Concurrency ────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_contexts_share_program() {
    let rt = Arc::new(runtime());
    let program = rt.load(add_mul()).unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let rt = Arc::clone(&rt);
        let program = Arc::clone(&program);
        handles.push(tokio::task::spawn_blocking(move || {
            let v = i as f32;
            let mut ctx = rt.create_context(&program).unwrap();
            ctx.set_input_tensor(0, &f32s(&[v, v, v])).unwrap();
            ctx.set_input_tensor(1, &f32s(&[1.0, 2.0, 3.0])).unwrap();
            ctx.execute().unwrap();
            ctx.output_tensor(0).unwrap().to_vec::<f32>().unwrap()
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let v = i as f32;
        let out = handle.await.unwrap();
        assert_eq!(out, vec![(v + 1.0) * 2.0, (v + 2.0) * 2.0, (v + 3.0) * 2.0]);
    }
    assert_eq!(rt.pool().allocated_bytes(), 0);
}

// ── Config ─────────────────────────────────────────────────────

#[test]
fn test_zeroing_between_runs() {
    let config = RuntimeConfig {
        zero_arenas_on_execute: true,
        ..RuntimeConfig::default()
    };
    let rt = Runtime::new(config, Arc::new(Registry::portable().unwrap()));
    let program = rt.load(add_mul()).unwrap();
    let mut ctx = rt.create_context(&program).unwrap();
    for round in 0..3 {
        let v = round as f32;
        ctx.set_input_tensor(0, &f32s(&[v, v, v])).unwrap();
        ctx.set_input_tensor(1, &f32s(&[v, v, v])).unwrap();
        ctx.execute().unwrap();
        assert_eq!(
            ctx.output(0).unwrap().to_vec::<f32>().unwrap(),
            vec![4.0 * v; 3]
        );
    }
}
