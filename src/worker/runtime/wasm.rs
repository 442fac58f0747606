// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! WASI runtime for a WebAssembly build of OpenSCAD
//!
//! The compiled module is code only and is shared. Every invocation gets a
//! new store, WASI context, instance and stdio pipes, with the request's
//! sandbox directory preopened as `/`.

use super::{CompilerRuntime, Exit, Invocation, RawOutput};
use crate::worker::vfs::VirtualFs;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};
use wasmtime::{Engine, Linker, Module, Store};
use wasmtime_wasi::pipe::MemoryOutputPipe;
use wasmtime_wasi::preview1::{self, WasiP1Ctx};
use wasmtime_wasi::{DirPerms, FilePerms, I32Exit, WasiCtxBuilder};

/// Upper bound on captured bytes per stream
const CAPTURE_LIMIT: usize = 4 * 1024 * 1024;

/// Program name passed as argv[0]
const PROGRAM: &str = "openscad";

pub struct WasmRuntime {
    engine: Engine,
    module: Module,
}

impl WasmRuntime {
    /// Compile the module at `path`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let engine = Engine::default();
        let module = Module::from_file(&engine, path)
            .with_context(|| format!("Failed to load OpenSCAD module: {}", path.display()))?;
        info!(module = %path.display(), "Loaded OpenSCAD WebAssembly module");
        Ok(Self { engine, module })
    }

    /// Compile a module from bytes (binary or text format)
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<Self> {
        let engine = Engine::default();
        let module = Module::new(&engine, bytes).context("Failed to compile OpenSCAD module")?;
        Ok(Self { engine, module })
    }
}

impl CompilerRuntime for WasmRuntime {
    fn name(&self) -> &str {
        "wasm"
    }

    fn invoke(&self, vfs: &VirtualFs, invocation: &Invocation) -> Result<RawOutput> {
        let stdout = MemoryOutputPipe::new(CAPTURE_LIMIT);
        let stderr = MemoryOutputPipe::new(CAPTURE_LIMIT);

        let mut builder = WasiCtxBuilder::new();
        builder
            .stdout(stdout.clone())
            .stderr(stderr.clone())
            .arg(PROGRAM)
            .args(invocation.args.as_slice());
        for (key, value) in &invocation.env {
            builder.env(key, value);
        }
        builder
            .preopened_dir(vfs.root(), "/", DirPerms::all(), FilePerms::all())
            .context("Failed to preopen sandbox directory")?;
        let ctx = builder.build_p1();

        let mut store = Store::new(&self.engine, ctx);
        let mut linker: Linker<WasiP1Ctx> = Linker::new(&self.engine);
        preview1::add_to_linker_sync(&mut linker, |ctx| ctx)
            .context("Failed to link WASI imports")?;

        let instance = linker
            .instantiate(&mut store, &self.module)
            .context("Failed to instantiate OpenSCAD module")?;
        let start = instance
            .get_typed_func::<(), ()>(&mut store, "_start")
            .context("OpenSCAD module has no _start export")?;

        debug!(args = ?invocation.args, "Running OpenSCAD module");
        let exit = match start.call(&mut store, ()) {
            Ok(()) => Exit::Code(0),
            Err(e) => match e.downcast_ref::<I32Exit>() {
                Some(I32Exit(code)) => Exit::Code(*code),
                None => Exit::Abnormal(format!("{e:#}")),
            },
        };
        drop(store);

        Ok(RawOutput {
            exit,
            stdout: super::capture_lines(&stdout.contents()),
            stderr: super::capture_lines(&stderr.contents()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Writes "hi\n" to stderr and exits with code 2.
    const EXIT_TWO: &str = r#"
        (module
          (import "wasi_snapshot_preview1" "fd_write"
            (func $fd_write (param i32 i32 i32 i32) (result i32)))
          (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
          (memory (export "memory") 1)
          (data (i32.const 16) "hi\n")
          (func (export "_start")
            (i32.store (i32.const 0) (i32.const 16))
            (i32.store (i32.const 4) (i32.const 3))
            (drop (call $fd_write (i32.const 2) (i32.const 0) (i32.const 1) (i32.const 8)))
            (call $proc_exit (i32.const 2))))
    "#;

    const NO_START: &str = r#"(module (memory (export "memory") 1))"#;

    #[test]
    fn test_exit_code_and_stderr_capture() -> Result<()> {
        let runtime = WasmRuntime::from_bytes(EXIT_TWO)?;
        let vfs = VirtualFs::for_request("wasm")?;

        let raw = runtime.invoke(&vfs, &Invocation::default())?;
        assert_eq!(raw.exit, Exit::Code(2));
        assert_eq!(raw.stderr, vec!["hi".to_string()]);
        assert!(raw.stdout.is_empty());

        // A second call starts from fresh state
        let again = runtime.invoke(&vfs, &Invocation::default())?;
        assert_eq!(again.stderr, vec!["hi".to_string()]);
        Ok(())
    }

    #[test]
    fn test_missing_start_is_runtime_error() -> Result<()> {
        let runtime = WasmRuntime::from_bytes(NO_START)?;
        let vfs = VirtualFs::for_request("wasm")?;
        assert!(runtime.invoke(&vfs, &Invocation::default()).is_err());
        Ok(())
    }
}
