// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Bundled delegate backends.

pub mod portable;

pub use portable::{PortableBackend, PortableSubgraph, PORTABLE_BACKEND_ID};
