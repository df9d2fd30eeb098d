// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Lifetime analysis of planned values over the instruction chain.
//!
//! Instruction `i` is step `i`. Program inputs are live from step 0 and
//! program outputs until step `chain.len()`, one past the last instruction,
//! so the caller can read them after the run.

use memory_planner::TensorLifetime;

use crate::header::{Storage, TensorValue};
use crate::{ProgramError, ProgramHeader};

/// Computes one lifetime per planned tensor value, ordered by value index.
///
/// A planned value that nothing touches gets an empty lifetime. Reading a
/// planned value before any instruction writes it is an error unless it is
/// a program input, and so is a planned output that is neither an input nor
/// written by any instruction.
pub fn compute_lifetimes(header: &ProgramHeader) -> Result<Vec<TensorLifetime>, ProgramError> {
    let planned = |index: usize| -> Result<Option<&TensorValue>, ProgramError> {
        let value = header.values.get(index).ok_or(ProgramError::IndexOutOfRange {
            table: "value",
            index,
            len: header.values.len(),
        })?;
        Ok(value.as_tensor().filter(|t| t.is_planned()))
    };

    // (first_use, last_use) per value; None until touched.
    let mut spans: Vec<Option<(usize, usize)>> = vec![None; header.values.len()];

    for &input in &header.inputs {
        if planned(input)?.is_some() {
            spans[input] = Some((0, 0));
        }
    }

    for (step, instruction) in header.chain.iter().enumerate() {
        for &arg in &instruction.args {
            if planned(arg)?.is_none() {
                continue;
            }
            match &mut spans[arg] {
                Some((_, last)) => *last = step,
                None => {
                    return Err(ProgramError::ReadBeforeWrite {
                        value: arg,
                        instruction: step,
                    })
                }
            }
        }
        for &result in &instruction.results {
            if planned(result)?.is_none() {
                continue;
            }
            let span = spans[result].get_or_insert((step, step));
            span.1 = step;
        }
    }

    let end = header.chain.len();
    for &output in &header.outputs {
        if planned(output)?.is_none() {
            continue;
        }
        match &mut spans[output] {
            Some((_, last)) => *last = end,
            None => {
                return Err(ProgramError::InvalidValue {
                    index: output,
                    detail: "program output is never written".into(),
                })
            }
        }
    }

    let mut lifetimes = Vec::new();
    for (value, def) in header.values.iter().enumerate() {
        let Some(tensor) = def.as_tensor() else { continue };
        let Storage::Planned { memory_id, .. } = tensor.storage else { continue };
        let (first_use, last_use) = spans[value].unwrap_or((1, 0));
        lifetimes.push(TensorLifetime {
            value,
            first_use,
            last_use,
            size_bytes: tensor.descriptor()?.nbytes(),
            memory_id,
        });
    }
    Ok(lifetimes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{Instruction, Operation, Segment, ValueDef, NO_DEBUG_HANDLE};
    use tensor_core::{ScalarType, ShapeDynamism};

    fn planned(len: usize) -> ValueDef {
        ValueDef::Tensor(TensorValue {
            dtype: ScalarType::F32,
            shape: vec![len],
            strides: None,
            dynamism: ShapeDynamism::Static,
            storage: Storage::Planned {
                memory_id: 0,
                offset: 0,
            },
        })
    }

    fn kernel(args: &[usize], results: &[usize]) -> Instruction {
        Instruction {
            op: Operation::Kernel {
                name: "aten::add.out".into(),
            },
            args: args.to_vec(),
            results: results.to_vec(),
            debug_handle: NO_DEBUG_HANDLE,
        }
    }

    fn header(values: Vec<ValueDef>, chain: Vec<Instruction>) -> ProgramHeader {
        ProgramHeader {
            name: "t".into(),
            values,
            inputs: vec![0],
            outputs: vec![3],
            chain,
            arenas: vec![],
            delegates: vec![],
            constants: Segment::default(),
        }
    }

    #[test]
    fn test_chain_lifetimes() {
        // v2 = v0 + v0; v3 = v2 + v1(int, unplanned); v4 unused
        let h = header(
            vec![planned(4), ValueDef::Int { value: 1 }, planned(4), planned(2), planned(8)],
            vec![kernel(&[0, 0], &[2]), kernel(&[2, 1], &[3])],
        );
        let lts = compute_lifetimes(&h).unwrap();
        let spans: Vec<_> = lts.iter().map(|l| (l.value, l.first_use, l.last_use)).collect();
        assert_eq!(spans, vec![(0, 0, 0), (2, 0, 1), (3, 1, 2), (4, 1, 0)]);
        assert_eq!(lts[0].size_bytes, 16);
        assert!(lts[3].is_empty());
    }

    #[test]
    fn test_read_before_write() {
        let h = header(
            vec![planned(4), planned(4), planned(4), planned(4)],
            vec![kernel(&[0, 1], &[2]), kernel(&[2], &[3])],
        );
        assert!(matches!(
            compute_lifetimes(&h),
            Err(ProgramError::ReadBeforeWrite {
                value: 1,
                instruction: 0
            })
        ));
    }

    #[test]
    fn test_unwritten_output() {
        // v3 is declared as the output but only v2 is produced.
        let h = header(
            vec![planned(4), planned(4), planned(4), planned(4)],
            vec![kernel(&[0, 0], &[2])],
        );
        assert!(matches!(
            compute_lifetimes(&h),
            Err(ProgramError::InvalidValue { index: 3, .. })
        ));
    }

    #[test]
    fn test_input_as_output_lives_to_end() {
        let mut h = header(vec![planned(4)], vec![]);
        h.outputs = vec![0];
        let lts = compute_lifetimes(&h).unwrap();
        assert_eq!((lts[0].first_use, lts[0].last_use), (0, 0));
    }

    #[test]
    fn test_bad_index() {
        let h = header(vec![planned(4)], vec![kernel(&[0], &[9])]);
        assert!(matches!(
            compute_lifetimes(&h),
            Err(ProgramError::IndexOutOfRange { index: 9, .. })
        ));
    }
}
