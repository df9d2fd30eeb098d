// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # program
//!
//! The serialized program: a value table, an instruction chain, a constant
//! segment, an arena placement for every intermediate and the delegate blobs
//! that accelerator backends consume.
//!
//! - [`format`]: container framing (`EXRT` magic, version, JSON header).
//! - [`ProgramHeader`] and its tables: [`ValueDef`], [`Instruction`],
//!   [`DelegateDef`].
//! - [`Program`]: the loaded program, with a **type-state pattern**
//!   (`Parsed` → `Verified`). Loading a file memory-maps it.
//! - [`ProgramBuilder`]: exporter-side construction for tests and tools.
//!
//! # Example
//! ```no_run
//! use program::Program;
//! use std::collections::HashSet;
//! use std::path::Path;
//!
//! let backends: HashSet<String> = ["portable".to_string()].into();
//! let program = Program::load_file(Path::new("model.exrt"))
//!     .unwrap()
//!     .verify(&backends)
//!     .unwrap();
//! println!("{}", program.summary());
//! ```

mod builder;
mod constants;
mod error;
pub mod format;
pub mod header;
mod liveness;
pub mod program;

pub use builder::{ProgramBuilder, DEFAULT_MEMORY_ID};
pub use constants::{ConstantEntry, ConstantPool};
pub use error::ProgramError;
pub use header::{
    CompileSpec, DelegateDef, Instruction, Operation, ProgramHeader, Segment, Storage, TensorMeta,
    TensorValue, ValueDef, NO_DEBUG_HANDLE,
};
pub use liveness::compute_lifetimes;
pub use program::{BackendCatalog, Parsed, Program, ProgramState, Verified};
