// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Native `openscad` executable runtime

use super::{capture_lines, CompilerRuntime, Exit, Invocation, RawOutput};
use crate::worker::vfs::VirtualFs;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

/// Spawns a new compiler process per invocation, rooted in the request's
/// sandbox directory
pub struct ProcessRuntime {
    executable: PathBuf,
}

impl ProcessRuntime {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &PathBuf {
        &self.executable
    }

    /// Check if the executable runs
    pub fn is_available(&self) -> bool {
        Command::new(&self.executable)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }
}

impl CompilerRuntime for ProcessRuntime {
    fn name(&self) -> &str {
        "process"
    }

    fn resolve(&self, vfs: &VirtualFs, guest: &str) -> Result<String> {
        let host = vfs
            .host_path(guest)
            .with_context(|| format!("Failed to resolve sandbox path: {guest}"))?;
        Ok(host.to_string_lossy().into_owned())
    }

    fn invoke(&self, vfs: &VirtualFs, invocation: &Invocation) -> Result<RawOutput> {
        debug!(executable = %self.executable.display(), args = ?invocation.args, "Spawning compiler");

        let output = Command::new(&self.executable)
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .current_dir(vfs.root())
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to execute {}", self.executable.display()))?;

        let exit = match output.status.code() {
            Some(code) => Exit::Code(code),
            None => Exit::Abnormal(format!("compiler terminated by signal ({})", output.status)),
        };

        Ok(RawOutput {
            exit,
            stdout: capture_lines(&output.stdout),
            stderr: capture_lines(&output.stderr),
        })
    }
}
