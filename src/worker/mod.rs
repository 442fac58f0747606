// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Compilation worker
//!
//! Drives one compiler run per request inside a private sandbox directory
//! and turns whatever comes back into either a validated STL buffer or a
//! [`CompileError`] carrying the compiler transcript.

pub mod diagnostics;
pub mod fonts;
pub mod runtime;
pub mod vfs;

use crate::config::{Backend, CompilerConfig};
use crate::error::{CompileError, Transcript};
use crate::params::ParameterSet;
use crate::stl;
use anyhow::anyhow;
use diagnostics::StderrFilter;
use fonts::FontFetch;
use runtime::{CompilerRuntime, Exit, Invocation, ProcessRuntime, RawOutput};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vfs::VirtualFs;

/// Guest directory holding the request's input and output files
pub const WORK_DIR: &str = "/work";

/// Correlation id of one compile request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of work for the compiler
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub id: RequestId,
    pub source: String,
    /// Passed as `-D` definitions; the source itself is never modified
    pub overrides: ParameterSet,
}

impl CompileRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            source: source.into(),
            overrides: ParameterSet::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: ParameterSet) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Structurally valid compiler output
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledModel {
    pub bytes: Vec<u8>,
    pub triangle_count: u32,
    pub warnings: Vec<String>,
}

/// `-D name=value` pairs for numeric, finite overrides
pub fn defines(overrides: &ParameterSet) -> Vec<String> {
    let mut args = Vec::new();
    for (name, value) in overrides {
        if value.as_finite_number().is_some() {
            args.push("-D".to_string());
            args.push(format!("{}={}", name, value.to_scad_literal()));
        } else {
            debug!(parameter = %name, kind = %value.kind(), "Skipping non-numeric define");
        }
    }
    args
}

/// Full compiler argument list
///
/// `-o <output> --export-format <format> [--enable=<feature>...] <input> [-D name=value...]`
pub fn command_line(
    output: &str,
    input: &str,
    export_format: &str,
    features: &[String],
    overrides: &ParameterSet,
) -> Vec<String> {
    let mut args = vec![
        "-o".to_string(),
        output.to_string(),
        "--export-format".to_string(),
        export_format.to_string(),
    ];
    args.extend(features.iter().map(|f| format!("--enable={f}")));
    args.push(input.to_string());
    args.extend(defines(overrides));
    args
}

/// Runs compile requests against a shared compiler runtime
#[derive(Clone)]
pub struct CompilationWorker {
    runtime: Arc<dyn CompilerRuntime>,
    features: Vec<String>,
    export_format: String,
    fonts: Vec<PathBuf>,
    filter: StderrFilter,
}

impl CompilationWorker {
    pub fn new(runtime: Arc<dyn CompilerRuntime>) -> Self {
        Self {
            runtime,
            features: Vec::new(),
            export_format: "binstl".to_string(),
            fonts: Vec::new(),
            filter: StderrFilter::default(),
        }
    }

    /// Build the configured backend
    pub fn from_config(config: &CompilerConfig) -> anyhow::Result<Self> {
        let runtime: Arc<dyn CompilerRuntime> = match &config.backend {
            #[cfg(feature = "wasm-runtime")]
            Backend::Wasm { module } => Arc::new(runtime::WasmRuntime::from_file(module)?),
            #[cfg(not(feature = "wasm-runtime"))]
            Backend::Wasm { module } => {
                return Err(anyhow!(
                    "Cannot load {}: built without the wasm-runtime feature",
                    module.display()
                ))
            }
            Backend::Process { executable } => Arc::new(ProcessRuntime::new(executable)),
        };

        Ok(Self::new(runtime)
            .with_features(config.features.clone())
            .with_export_format(config.export_format.clone())
            .with_fonts(config.fonts.clone())
            .with_benign_stderr(config.benign_stderr.clone()))
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = features;
        self
    }

    pub fn with_export_format(mut self, format: impl Into<String>) -> Self {
        self.export_format = format.into();
        self
    }

    pub fn with_fonts(mut self, fonts: Vec<PathBuf>) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn with_benign_stderr(mut self, extra: Vec<String>) -> Self {
        self.filter = StderrFilter::new(extra);
        self
    }

    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    /// Compile one request.
    ///
    /// The font read is the only await before the blocking section; the
    /// compiler itself runs on a blocking thread with its own sandbox.
    pub async fn compile(&self, request: CompileRequest) -> Result<CompiledModel, CompileError> {
        let started = Instant::now();
        let id = request.id;
        let fetch = fonts::fetch_fallback_font(&self.fonts).await;

        let worker = self.clone();
        let (raw, output, font_warnings) =
            tokio::task::spawn_blocking(move || worker.run_in_sandbox(&request, &fetch))
                .await
                .map_err(|e| CompileError::Runtime(anyhow!("compile task failed: {e}")))??;

        let result = self.classify(raw, output, font_warnings);
        match &result {
            Ok(model) => info!(
                request = %id,
                runtime = self.runtime.name(),
                triangles = model.triangle_count,
                warnings = model.warnings.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Compiled model"
            ),
            Err(e) => info!(
                request = %id,
                runtime = self.runtime.name(),
                exit_code = ?e.exit_code(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Compile failed"
            ),
        }
        result
    }

    /// Provision the sandbox, run the compiler and read the output file.
    /// The sandbox is removed when this returns.
    fn run_in_sandbox(
        &self,
        request: &CompileRequest,
        fetch: &FontFetch,
    ) -> Result<(RawOutput, Option<Vec<u8>>, Vec<String>), CompileError> {
        let id = request.id.to_string();
        let vfs = VirtualFs::for_request(&id).map_err(CompileError::Sandbox)?;
        let input = format!("{WORK_DIR}/input-{id}.scad");
        let output = format!("{WORK_DIR}/out-{id}.stl");

        vfs.mkdir_all(WORK_DIR).map_err(CompileError::Sandbox)?;
        vfs.write(&input, &request.source)
            .map_err(CompileError::Sandbox)?;

        let resolve = |guest: &str| {
            self.runtime
                .resolve(&vfs, guest)
                .map_err(CompileError::Runtime)
        };
        let font_warnings = fonts::mount(&vfs, &resolve(fonts::FONT_DIR)?, fetch);

        let invocation = Invocation {
            args: command_line(
                &resolve(&output)?,
                &resolve(&input)?,
                &self.export_format,
                &self.features,
                &request.overrides,
            ),
            env: vec![
                ("FONTCONFIG_FILE".to_string(), resolve(fonts::FONTS_CONF)?),
                ("FONTCONFIG_PATH".to_string(), resolve(fonts::FONTS_CONF_DIR)?),
            ],
        };
        debug!(request = %id, sandbox = %vfs.root().display(), args = ?invocation.args, "Invoking compiler");

        let raw = self
            .runtime
            .invoke(&vfs, &invocation)
            .map_err(CompileError::Runtime)?;

        let bytes = match vfs.read(&output) {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => None,
            Err(e) => {
                debug!(request = %id, error = %e, "No compiler output");
                None
            }
        };
        Ok((raw, bytes, font_warnings))
    }

    fn classify(
        &self,
        raw: RawOutput,
        output: Option<Vec<u8>>,
        font_warnings: Vec<String>,
    ) -> Result<CompiledModel, CompileError> {
        let transcript = Transcript {
            stdout: raw.stdout,
            stderr: raw.stderr,
        };

        let bytes = match (output, &raw.exit) {
            (_, Exit::Abnormal(reason)) => {
                return Err(CompileError::CompilerInvocation {
                    exit_code: None,
                    reason: format!("OpenSCAD aborted: {reason}"),
                    transcript,
                })
            }
            (None, Exit::Code(0)) => {
                return Err(CompileError::CompilerInvocation {
                    exit_code: Some(0),
                    reason: "Empty STL output".to_string(),
                    transcript,
                })
            }
            (None, Exit::Code(code)) => {
                return Err(CompileError::CompilerInvocation {
                    exit_code: Some(*code),
                    reason: format!("OpenSCAD exited with code {code}"),
                    transcript,
                })
            }
            (Some(bytes), Exit::Code(_)) => bytes,
        };

        let report = match stl::validate(&bytes) {
            Ok(report) => report,
            Err(source) => {
                return Err(CompileError::StructuralValidation {
                    source,
                    transcript: transcript.stderr_only(),
                })
            }
        };

        let mut warnings = font_warnings;
        if let Some(code) = raw.exit.code().filter(|c| *c != 0) {
            if self.filter.is_fatal(&transcript.stderr) {
                return Err(CompileError::CompilerInvocation {
                    exit_code: Some(code),
                    reason: format!("OpenSCAD exited with code {code}"),
                    transcript,
                });
            }
            let message = format!("OpenSCAD returned exit code {code}; using generated STL.");
            warn!("{}", message);
            warnings.push(message);
        }
        warnings.extend(report.warnings);
        warnings.extend(self.filter.significant(&transcript.stderr).map(str::to_string));

        let mut seen = std::collections::HashSet::new();
        warnings.retain(|w| seen.insert(w.clone()));

        Ok(CompiledModel {
            bytes,
            triangle_count: report.triangle_count,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterValue;
    use runtime::mock::{binary_stl, MockRuntime, MockScript};

    fn overrides() -> ParameterSet {
        let mut set = ParameterSet::new();
        set.insert("width".into(), ParameterValue::Number(25.0));
        set.insert("label".into(), ParameterValue::String("hi".into()));
        set.insert("depth".into(), ParameterValue::Number(f64::NAN));
        set
    }

    #[test]
    fn test_command_line_order() {
        let args = command_line(
            "/work/out.stl",
            "/work/input.scad",
            "binstl",
            &["manifold".to_string()],
            &overrides(),
        );
        assert_eq!(
            args,
            vec![
                "-o",
                "/work/out.stl",
                "--export-format",
                "binstl",
                "--enable=manifold",
                "/work/input.scad",
                "-D",
                "width=25",
            ]
        );
    }

    #[test]
    fn test_defines_skip_non_numeric() {
        assert_eq!(defines(&overrides()), vec!["-D", "width=25"]);
        assert!(defines(&ParameterSet::new()).is_empty());
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[tokio::test]
    async fn test_paths_are_request_scoped() -> anyhow::Result<()> {
        let mock = Arc::new(MockRuntime::new(MockScript::success(binary_stl(1))));
        let worker = CompilationWorker::new(mock.clone());
        let request = CompileRequest::new("cube(1);");
        let id = request.id.to_string();

        worker.compile(request).await?;
        let recorded = &mock.invocations()[0];
        assert_eq!(
            recorded.arg_after("-o"),
            Some(format!("/work/out-{id}.stl").as_str())
        );
        assert!(recorded.args.contains(&format!("/work/input-{id}.scad")));
        assert!(recorded
            .env
            .contains(&("FONTCONFIG_FILE".to_string(), "/etc/fonts/fonts.conf".to_string())));
        assert_eq!(recorded.source.as_deref(), Some("cube(1);"));
        Ok(())
    }

    #[tokio::test]
    async fn test_trap_is_invocation_failure() {
        let mock = Arc::new(MockRuntime::new(
            MockScript::trap("unreachable executed").stderr_line("abort()"),
        ));
        let worker = CompilationWorker::new(mock);
        let err = worker
            .compile(CompileRequest::new("cube(1);"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompileError::CompilerInvocation { exit_code: None, .. }));
        assert!(err.to_string().contains("unreachable executed"));
        assert!(err.to_string().contains("abort()"));
    }

    #[tokio::test]
    async fn test_runtime_start_failure() {
        let mock = Arc::new(MockRuntime::new(MockScript::unavailable("module missing")));
        let worker = CompilationWorker::new(mock);
        let err = worker
            .compile(CompileRequest::new("cube(1);"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompileError::Runtime(_)));
    }

    #[test]
    fn test_missing_wasm_module_fails_construction() {
        let config = CompilerConfig {
            backend: Backend::Wasm {
                module: PathBuf::from("/nonexistent/openscad.wasm"),
            },
            ..CompilerConfig::default()
        };
        assert!(CompilationWorker::from_config(&config).is_err());
    }
}
