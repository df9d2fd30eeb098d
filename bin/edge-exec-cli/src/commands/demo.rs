// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `edge-exec demo`: write a small sample program.
//!
//! ```text
//! x:f32[4] ─┐
//!           add ─▶ sum ─ mul(scale) ─▶ scaled ─ portable delegate ─▶ out
//! y:f32[4] ─┘                                  (relu, fmod 3)
//! ```

use std::path::PathBuf;

use anyhow::Context;
use memory_planner::GreedyBestFit;
use program::ProgramBuilder;
use runtime::{PortableSubgraph, PORTABLE_BACKEND_ID};
use tensor_core::{Scalar, ScalarType, ShapeDynamism, Tensor};

pub async fn execute(out: PathBuf) -> anyhow::Result<()> {
    let bytes = sample_program()?;
    std::fs::write(&out, &bytes).with_context(|| format!("failed to write '{}'", out.display()))?;
    println!("  Wrote {} ({} bytes)", out.display(), bytes.len());
    println!("  Try: edge-exec run --program {} --input 0=1,-2,3,-4", out.display());
    Ok(())
}

pub fn sample_program() -> anyhow::Result<Vec<u8>> {
    let mut subgraph = PortableSubgraph::new();
    let gx = subgraph.input(ScalarType::F32, &[4]);
    let relu = subgraph.scratch(ScalarType::F32, &[4]);
    let gy = subgraph.output(ScalarType::F32, &[4]);
    let three = subgraph.scalar(Scalar::Int(3));
    subgraph
        .node("aten::relu.out", &[gx], &[relu])
        .node("aten::fmod.Scalar_out", &[relu, three], &[gy]);

    let mut b = ProgramBuilder::new("demo");
    let x = b.input(ScalarType::F32, &[4], ShapeDynamism::Static);
    let y = b.input(ScalarType::F32, &[4], ShapeDynamism::Static);
    let scale = b.constant("scale", Tensor::from_slice([4], &[1.0f32, 2.0, 3.0, 4.0])?);
    let sum = b.tensor(ScalarType::F32, &[4]);
    let scaled = b.tensor(ScalarType::F32, &[4]);
    let out = b.tensor(ScalarType::F32, &[4]);
    let delegate = b.delegate(PORTABLE_BACKEND_ID, subgraph.to_bytes()?, Vec::new());
    b.kernel("aten::add.out", &[x, y], &[sum])
        .kernel("aten::mul.out", &[sum, scale], &[scaled])
        .call_delegate(delegate, &[scaled], &[out])
        .output(out);
    Ok(b.build(&GreedyBestFit::default())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtime::RuntimeConfig;

    #[test]
    fn test_sample_program_runs() {
        let rt = crate::commands::portable_runtime(RuntimeConfig::default()).unwrap();
        let program = rt.load(sample_program().unwrap()).unwrap();
        assert_eq!(program.delegates().len(), 1);

        let mut ctx = rt.create_context(&program).unwrap();
        let x = Tensor::from_slice([4], &[1.0f32, -2.0, 3.0, -4.0]).unwrap();
        let y = Tensor::from_slice([4], &[0.0f32, 0.0, 0.0, 5.0]).unwrap();
        ctx.set_input_tensor(0, &x).unwrap();
        ctx.set_input_tensor(1, &y).unwrap();
        ctx.execute().unwrap();
        // (x + y) * [1, 2, 3, 4] = [1, -4, 9, 4] → relu → fmod 3
        assert_eq!(
            ctx.output(0).unwrap().to_vec::<f32>().unwrap(),
            vec![1.0, 0.0, 0.0, 1.0]
        );
    }
}
