// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe Compile
//!
//! SCAD-to-STL compilation pipeline around an external OpenSCAD build.
//! Rewrites typed parameters into model source, runs the compiler in a
//! per-request sandbox, checks the binary STL it produces and orchestrates
//! rapid parameter edits with last-request-wins semantics.

pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod params;
pub mod stl;
pub mod worker;

pub use config::{Backend, CompilerConfig};
pub use error::{CompileError, Transcript};
pub use orchestrator::{EncodedModel, Orchestrator, Outcome, TargetStatus, Ticket};
pub use params::{rewrite, rewrite_all, Parameter, ParameterSet, ParameterValue, RewriteOptions};
pub use stl::{validate as validate_stl, StlReport, StlValidationError};
pub use worker::{CompilationWorker, CompileRequest, CompiledModel, RequestId};

use anyhow::Result;

/// Compile `source` once with the configured backend, passing `overrides`
/// as defines
pub async fn compile_source(
    config: &CompilerConfig,
    source: &str,
    overrides: ParameterSet,
) -> Result<CompiledModel> {
    let worker = CompilationWorker::from_config(config)?;
    let model = worker
        .compile(CompileRequest::new(source).with_overrides(overrides))
        .await?;
    Ok(model)
}
