// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Compiler runtimes
//!
//! A runtime runs one compiler invocation against a request's virtual
//! filesystem and reports what happened. Implementations must start from
//! fresh mutable state on every call.

pub mod mock;
pub mod process;
#[cfg(feature = "wasm-runtime")]
pub mod wasm;

pub use process::ProcessRuntime;
#[cfg(feature = "wasm-runtime")]
pub use wasm::WasmRuntime;

use super::vfs::VirtualFs;
use anyhow::Result;

/// Arguments and environment for a single compiler run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// How the compiler run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    Code(i32),
    /// Abort, trap or signal; no exit code
    Abnormal(String),
}

impl Exit {
    pub fn code(&self) -> Option<i32> {
        match self {
            Exit::Code(code) => Some(*code),
            Exit::Abnormal(_) => None,
        }
    }
}

/// Raw result of a compiler run
#[derive(Debug, Clone)]
pub struct RawOutput {
    pub exit: Exit,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

/// Something that can run the OpenSCAD compiler
pub trait CompilerRuntime: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;

    /// Path the compiler should use for a guest path.
    ///
    /// Sandboxed runtimes see the guest layout directly; host processes need
    /// the backing host path.
    fn resolve(&self, _vfs: &VirtualFs, guest: &str) -> Result<String> {
        Ok(guest.to_string())
    }

    /// Run the compiler once. Errors mean the runtime itself could not be
    /// started; compiler failures are reported through [`RawOutput`].
    fn invoke(&self, vfs: &VirtualFs, invocation: &Invocation) -> Result<RawOutput>;
}

/// Split captured bytes into lines
pub(crate) fn capture_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}
