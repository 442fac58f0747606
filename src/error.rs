// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Compile failure taxonomy

use crate::stl::StlValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Captured compiler output for one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl Transcript {
    pub fn stdout_text(&self) -> String {
        self.stdout.join("\n")
    }

    pub fn stderr_text(&self) -> String {
        self.stderr.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }

    /// Transcript reduced to stderr only
    pub fn stderr_only(&self) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: self.stderr.clone(),
        }
    }
}

/// Renders as `\nstderr:\n...\nstdout:\n...`, omitting empty streams
impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.stderr.is_empty() {
            write!(f, "\nstderr:\n{}", self.stderr_text())?;
        }
        if !self.stdout.is_empty() {
            write!(f, "\nstdout:\n{}", self.stdout_text())?;
        }
        Ok(())
    }
}

/// Why a compile did not produce a usable STL
#[derive(Debug, Error)]
pub enum CompileError {
    /// Fatal diagnostics, a trap, or no output
    #[error("{reason}{transcript}")]
    CompilerInvocation {
        exit_code: Option<i32>,
        reason: String,
        transcript: Transcript,
    },

    /// Output bytes break the binary STL layout
    #[error("{source}{transcript}")]
    StructuralValidation {
        #[source]
        source: StlValidationError,
        transcript: Transcript,
    },

    /// The per-request filesystem could not be prepared
    #[error("failed to prepare compiler sandbox: {0}")]
    Sandbox(#[source] std::io::Error),

    /// The compiler runtime could not be loaded or started
    #[error("compiler runtime unavailable: {0:#}")]
    Runtime(anyhow::Error),
}

impl CompileError {
    pub fn transcript(&self) -> Option<&Transcript> {
        match self {
            CompileError::CompilerInvocation { transcript, .. }
            | CompileError::StructuralValidation { transcript, .. } => Some(transcript),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CompileError::CompilerInvocation { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}
