// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: build → serialize → load → verify.

use std::collections::HashSet;
use std::io::Write;

use memory_planner::{GreedyBestFit, PlannerError};
use program::{
    format, CompileSpec, Program, ProgramBuilder, ProgramError, ProgramHeader, Storage,
    TensorMeta, ValueDef,
};
use tensor_core::{ScalarType, ShapeDynamism, Tensor};

// ── Helpers ────────────────────────────────────────────────────

fn no_backends() -> HashSet<String> {
    HashSet::new()
}

fn portable() -> HashSet<String> {
    ["portable".to_string()].into()
}

/// x:i32[2,3] + bias:i32[3] -> y; fmod(y, 2) -> z (dynamic output)
fn sample() -> Vec<u8> {
    let mut b = ProgramBuilder::new("sample");
    let x = b.input(ScalarType::I32, &[2, 3], ShapeDynamism::Static);
    let mask = b.input(ScalarType::Bool, &[4], ShapeDynamism::DynamicBound);
    let bias = b.constant("bias", Tensor::from_slice([3], &[1i32, 2, 3]).unwrap());
    let two = b.int(2);
    let y = b.tensor(ScalarType::I32, &[2, 3]);
    let z = b.tensor_in(0, ScalarType::I64, &[2, 3], ShapeDynamism::DynamicBound);
    let m = b.tensor(ScalarType::Bool, &[4]);
    b.kernel("aten::add.out", &[x, bias], &[y]);
    b.kernel("aten::fmod.Scalar_out", &[y, two], &[z]);
    b.kernel("aten::_to_copy.out", &[mask], &[m]);
    b.output(z).output(m);
    b.build(&GreedyBestFit::default()).unwrap()
}

/// Decodes, edits and re-encodes the header, keeping the data section.
fn rewrite(bytes: &[u8], edit: impl FnOnce(&mut ProgramHeader)) -> Vec<u8> {
    let (mut header, data) = format::decode(bytes).unwrap();
    edit(&mut header);
    format::encode(&header, &bytes[data]).unwrap()
}

fn planned_offset(header: &mut ProgramHeader, value: usize) -> &mut usize {
    match &mut header.values[value] {
        ValueDef::Tensor(t) => match &mut t.storage {
            Storage::Planned { offset, .. } => offset,
            Storage::Constant { .. } => panic!("value {value} is a constant"),
        },
        other => panic!("value {value} is {}", other.kind_name()),
    }
}

// ── Round trip ─────────────────────────────────────────────────

#[test]
fn test_io_meta_round_trip() {
    let program = Program::load(sample(), &no_backends()).unwrap();

    assert_eq!(program.name(), "sample");
    assert_eq!(program.num_inputs(), 2);
    assert_eq!(program.num_outputs(), 2);
    assert_eq!(program.num_instructions(), 3);
    assert_eq!(
        program.input_meta(0).unwrap(),
        TensorMeta {
            dtype: ScalarType::I32,
            shape: vec![2, 3],
            dynamism: ShapeDynamism::Static,
        }
    );
    assert_eq!(
        program.input_meta(1).unwrap(),
        TensorMeta {
            dtype: ScalarType::Bool,
            shape: vec![4],
            dynamism: ShapeDynamism::DynamicBound,
        }
    );
    assert_eq!(
        program.output_meta(0).unwrap(),
        TensorMeta {
            dtype: ScalarType::I64,
            shape: vec![2, 3],
            dynamism: ShapeDynamism::DynamicBound,
        }
    );
    assert!(matches!(
        program.output_meta(2),
        Err(ProgramError::IndexOutOfRange { table: "output", index: 2, len: 2 })
    ));
}

#[test]
fn test_constants_and_plan_exposed() {
    let program = Program::load(sample(), &no_backends()).unwrap();
    let bias = Tensor::from_slice([3], &[1i32, 2, 3]).unwrap();
    assert_eq!(program.constant_bytes("bias").unwrap(), bias.as_bytes());
    assert!(program.constant_bytes("missing").is_none());

    let plan = program.memory_plan();
    plan.validate().unwrap();
    // Five planned values: x, mask, y, z, m.
    assert_eq!(plan.allocations.len(), 5);
    assert_eq!(program.lifetimes().len(), 5);
    assert!(program.summary().contains("Program 'sample'"));
    assert!(!program.is_memory_mapped());
}

#[test]
fn test_load_memory_mapped_file() {
    let bytes = sample();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();

    let program = Program::load_file(file.path())
        .unwrap()
        .verify(&no_backends())
        .unwrap();
    assert!(program.is_memory_mapped());
    assert_eq!(program.size_bytes(), bytes.len());
    assert_eq!(
        program.constant_bytes("bias").unwrap(),
        Tensor::from_slice([3], &[1i32, 2, 3]).unwrap().as_bytes()
    );
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = Program::load_file(&dir.path().join("absent.exrt"));
    assert!(matches!(result, Err(ProgramError::Io(_))));
}

// ── Validation failures ────────────────────────────────────────

#[test]
fn test_constant_dtype_mismatch() {
    let bytes = rewrite(&sample(), |h| {
        if let ValueDef::Tensor(t) = &mut h.values[2] {
            t.dtype = ScalarType::F32;
        }
    });
    let err = Program::load(bytes, &no_backends()).unwrap_err();
    assert!(matches!(err, ProgramError::InvalidConstant { value: 2, .. }));
}

#[test]
fn test_constant_too_small() {
    let bytes = rewrite(&sample(), |h| {
        if let ValueDef::Tensor(t) = &mut h.values[2] {
            t.shape = vec![4];
        }
    });
    let err = Program::load(bytes, &no_backends()).unwrap_err();
    assert!(matches!(err, ProgramError::InvalidConstant { value: 2, .. }));
}

#[test]
fn test_overlapping_plan_rejected() {
    let bytes = sample();
    let program = Program::load(bytes.clone(), &no_backends()).unwrap();
    // x (value 0) and y (value 4) are live together at instruction 0.
    let y_offset = program.memory_plan().allocation(4).unwrap().offset;
    let bytes = rewrite(&bytes, |h| *planned_offset(h, 0) = y_offset);
    let err = Program::load(bytes, &no_backends()).unwrap_err();
    assert!(matches!(err, ProgramError::Plan(PlannerError::Overlap { .. })));
}

#[test]
fn test_arena_too_small_rejected() {
    let bytes = rewrite(&sample(), |h| h.arenas[0].capacity = 8);
    let err = Program::load(bytes, &no_backends()).unwrap_err();
    assert!(matches!(
        err,
        ProgramError::Plan(PlannerError::ExceedsCapacity { .. })
    ));
}

#[test]
fn test_result_aliasing_argument_rejected() {
    let bytes = rewrite(&sample(), |h| h.chain[0].results = vec![0]);
    let err = Program::load(bytes, &no_backends()).unwrap_err();
    assert!(matches!(err, ProgramError::InvalidInstruction { index: 0, .. }));
}

#[test]
fn test_result_must_be_planned() {
    let bytes = rewrite(&sample(), |h| h.chain[1].results = vec![2]);
    let err = Program::load(bytes, &no_backends()).unwrap_err();
    assert!(matches!(err, ProgramError::InvalidInstruction { index: 1, .. }));
}

#[test]
fn test_input_must_be_planned_tensor() {
    let bytes = rewrite(&sample(), |h| h.inputs.push(3));
    let err = Program::load(bytes, &no_backends()).unwrap_err();
    assert!(matches!(err, ProgramError::InvalidValue { index: 3, .. }));
}

#[test]
fn test_index_out_of_range() {
    let bytes = rewrite(&sample(), |h| h.chain[2].args = vec![99]);
    let err = Program::load(bytes, &no_backends()).unwrap_err();
    assert!(matches!(
        err,
        ProgramError::IndexOutOfRange { table: "value", index: 99, .. }
    ));
}

#[test]
fn test_non_contiguous_planned_rejected() {
    let bytes = rewrite(&sample(), |h| {
        if let ValueDef::Tensor(t) = &mut h.values[4] {
            t.strides = Some(vec![1, 2]);
        }
    });
    let err = Program::load(bytes, &no_backends()).unwrap_err();
    assert!(matches!(err, ProgramError::InvalidValue { index: 4, .. }));
}

#[test]
fn test_read_before_write_rejected() {
    // y is consumed by instruction 0 but only produced by instruction 1.
    let bytes = rewrite(&sample(), |h| h.chain.swap(0, 1));
    let err = Program::load(bytes, &no_backends()).unwrap_err();
    assert!(matches!(
        err,
        ProgramError::ReadBeforeWrite { value: 4, instruction: 0 }
    ));
}

#[test]
fn test_overflowing_shape_rejected() {
    let bytes = rewrite(&sample(), |h| {
        if let ValueDef::Tensor(t) = &mut h.values[4] {
            t.shape = vec![usize::MAX / 2, 4];
        }
    });
    let err = Program::load(bytes, &no_backends()).unwrap_err();
    assert!(matches!(err, ProgramError::InvalidValue { index: 4, .. }));
}

#[test]
fn test_overflowing_strides_rejected() {
    let bytes = rewrite(&sample(), |h| {
        if let ValueDef::Tensor(t) = &mut h.values[2] {
            t.strides = Some(vec![usize::MAX]);
        }
    });
    let err = Program::load(bytes, &no_backends()).unwrap_err();
    assert!(matches!(err, ProgramError::InvalidValue { index: 2, .. }));
}

#[test]
fn test_unwritten_output_rejected() {
    // Drop the instruction producing m (value 6) while keeping it an output.
    let bytes = rewrite(&sample(), |h| {
        h.chain.pop();
    });
    let err = Program::load(bytes, &no_backends()).unwrap_err();
    assert!(matches!(err, ProgramError::InvalidValue { index: 6, .. }));
}

#[test]
fn test_constant_segment_out_of_bounds() {
    let bytes = rewrite(&sample(), |h| h.constants.len += 1_000);
    assert!(matches!(Program::parse(bytes), Err(ProgramError::Format(_))));
}

// ── Delegates ──────────────────────────────────────────────────

fn delegated() -> Vec<u8> {
    let mut b = ProgramBuilder::new("delegated");
    let x = b.input(ScalarType::F32, &[2], ShapeDynamism::Static);
    let y = b.tensor(ScalarType::F32, &[2]);
    let d = b.delegate(
        "portable",
        b"{}".to_vec(),
        vec![CompileSpec::new("trace", [1u8])],
    );
    b.call_delegate(d, &[x], &[y]).output(y);
    b.build(&GreedyBestFit::default()).unwrap()
}

#[test]
fn test_unregistered_backend() {
    let err = Program::load(delegated(), &no_backends()).unwrap_err();
    assert!(matches!(
        err,
        ProgramError::UnregisteredBackend { ref backend_id } if backend_id == "portable"
    ));
}

#[test]
fn test_delegate_blob_exposed() {
    let program = Program::load(delegated(), &portable()).unwrap();
    assert_eq!(program.delegates().len(), 1);
    assert_eq!(program.delegate_blob(0).unwrap(), b"{}");
    assert_eq!(program.delegates()[0].compile_specs[0].value, vec![1u8]);
    assert!(program.delegate_blob(1).is_none());
}

#[test]
fn test_delegate_blob_out_of_bounds() {
    let bytes = rewrite(&delegated(), |h| h.delegates[0].blob.offset = 1 << 20);
    let err = Program::load(bytes, &portable()).unwrap_err();
    assert!(matches!(err, ProgramError::Format(_)));
}

#[test]
fn test_delegate_index_out_of_range() {
    let bytes = rewrite(&delegated(), |h| {
        h.chain[0].op = program::Operation::Delegate { index: 3 }
    });
    let err = Program::load(bytes, &portable()).unwrap_err();
    assert!(matches!(
        err,
        ProgramError::IndexOutOfRange { table: "delegate", index: 3, len: 1 }
    ));
}
