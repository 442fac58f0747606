// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scripted compiler runtime for testing.
//!
//! Available for integration tests and downstream crates. Each invocation
//! pops the next queued [`MockScript`] (or replays the default one), writes
//! the scripted output bytes to the `-o` path inside the request's sandbox
//! and records what the worker asked for.

use super::{CompilerRuntime, Exit, Invocation, RawOutput};
use crate::worker::vfs::VirtualFs;
use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Behavior of one scripted compiler run
#[derive(Debug, Clone)]
pub struct MockScript {
    pub exit: Exit,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    /// Bytes written to the output path; `None` writes nothing
    pub output: Option<Vec<u8>>,
    /// Blocks the invocation before it completes
    pub delay: Option<Duration>,
    /// Makes `invoke` fail as if the runtime could not start
    pub start_error: Option<String>,
}

impl MockScript {
    /// Exit 0 with `output` written
    pub fn success(output: Vec<u8>) -> Self {
        Self {
            exit: Exit::Code(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
            output: Some(output),
            delay: None,
            start_error: None,
        }
    }

    /// Exit with `code` and no output file
    pub fn no_output(code: i32) -> Self {
        Self {
            output: None,
            ..Self::success(Vec::new()).exit_code(code)
        }
    }

    /// Runtime trap with no exit code
    pub fn trap(message: impl Into<String>) -> Self {
        Self {
            exit: Exit::Abnormal(message.into()),
            output: None,
            ..Self::success(Vec::new())
        }
    }

    /// Runtime fails to start
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            start_error: Some(message.into()),
            ..Self::no_output(0)
        }
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit = Exit::Code(code);
        self
    }

    pub fn stdout_line(mut self, line: impl Into<String>) -> Self {
        self.stdout.push(line.into());
        self
    }

    pub fn stderr_line(mut self, line: impl Into<String>) -> Self {
        self.stderr.push(line.into());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// What the worker passed to one invocation
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Contents of the `.scad` input as written into the sandbox
    pub source: Option<String>,
}

impl RecordedInvocation {
    /// Value following `flag` in the argument list
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        let index = self.args.iter().position(|a| a == flag)?;
        self.args.get(index + 1).map(String::as_str)
    }

    /// `-D` definitions in order
    pub fn defines(&self) -> Vec<&str> {
        self.args
            .windows(2)
            .filter(|pair| pair[0] == "-D")
            .map(|pair| pair[1].as_str())
            .collect()
    }
}

/// Mock compiler runtime for testing without an OpenSCAD build
pub struct MockRuntime {
    scripts: Mutex<VecDeque<MockScript>>,
    default: Mutex<MockScript>,
    invocations: Mutex<Vec<RecordedInvocation>>,
}

impl MockRuntime {
    /// Creates a mock that replays `default` whenever the queue is empty
    pub fn new(default: MockScript) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Queues a script for the next unscripted invocation
    pub fn push_script(&self, script: MockScript) {
        self.scripts
            .lock()
            .expect("MockRuntime scripts mutex poisoned")
            .push_back(script);
    }

    pub fn set_default(&self, script: MockScript) {
        *self.default.lock().expect("MockRuntime default mutex poisoned") = script;
    }

    /// Invocations recorded so far, oldest first
    pub fn invocations(&self) -> Vec<RecordedInvocation> {
        self.invocations
            .lock()
            .expect("MockRuntime invocations mutex poisoned")
            .clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations
            .lock()
            .expect("MockRuntime invocations mutex poisoned")
            .len()
    }

    fn next_script(&self) -> MockScript {
        let queued = self
            .scripts
            .lock()
            .expect("MockRuntime scripts mutex poisoned")
            .pop_front();
        queued.unwrap_or_else(|| {
            self.default
                .lock()
                .expect("MockRuntime default mutex poisoned")
                .clone()
        })
    }
}

impl CompilerRuntime for MockRuntime {
    fn name(&self) -> &str {
        "mock"
    }

    fn invoke(&self, vfs: &VirtualFs, invocation: &Invocation) -> Result<RawOutput> {
        let script = self.next_script();

        let source = invocation
            .args
            .iter()
            .find(|a| a.ends_with(".scad"))
            .and_then(|input| vfs.read(input).ok())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
        self.invocations
            .lock()
            .expect("MockRuntime invocations mutex poisoned")
            .push(RecordedInvocation {
                args: invocation.args.clone(),
                env: invocation.env.clone(),
                source,
            });

        if let Some(message) = script.start_error {
            return Err(anyhow!(message));
        }
        if let Some(delay) = script.delay {
            std::thread::sleep(delay);
        }

        if let Some(bytes) = &script.output {
            let index = invocation
                .args
                .iter()
                .position(|a| a == "-o")
                .ok_or_else(|| anyhow!("mock invocation has no -o argument"))?;
            let path = invocation
                .args
                .get(index + 1)
                .ok_or_else(|| anyhow!("mock invocation has no output path"))?;
            vfs.write(path, bytes)?;
        }

        Ok(RawOutput {
            exit: script.exit,
            stdout: script.stdout,
            stderr: script.stderr,
        })
    }
}

/// Binary STL with `triangles` zeroed records
pub fn binary_stl(triangles: u32) -> Vec<u8> {
    let mut bytes = vec![0u8; crate::stl::expected_len(triangles) as usize];
    bytes[80..84].copy_from_slice(&triangles.to_le_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_then_default() -> Result<()> {
        let mock = MockRuntime::new(MockScript::success(binary_stl(1)));
        mock.push_script(MockScript::no_output(2).stderr_line("ERROR: boom"));
        let vfs = VirtualFs::for_request("mock")?;
        let invocation = Invocation {
            args: vec!["-o".into(), "/work/out.stl".into()],
            env: Vec::new(),
        };

        let first = mock.invoke(&vfs, &invocation)?;
        assert_eq!(first.exit, Exit::Code(2));
        assert!(!vfs.exists("/work/out.stl"));

        let second = mock.invoke(&vfs, &invocation)?;
        assert_eq!(second.exit, Exit::Code(0));
        assert_eq!(vfs.read("/work/out.stl")?.len(), 134);
        assert_eq!(mock.invocation_count(), 2);
        Ok(())
    }

    #[test]
    fn test_records_source_and_defines() -> Result<()> {
        let mock = MockRuntime::new(MockScript::no_output(0));
        let vfs = VirtualFs::for_request("mock")?;
        vfs.write("/work/input.scad", "cube(1);")?;
        let invocation = Invocation {
            args: vec![
                "/work/input.scad".into(),
                "-D".into(),
                "width=25".into(),
            ],
            env: Vec::new(),
        };

        mock.invoke(&vfs, &invocation)?;
        let recorded = &mock.invocations()[0];
        assert_eq!(recorded.source.as_deref(), Some("cube(1);"));
        assert_eq!(recorded.defines(), vec!["width=25"]);
        Ok(())
    }

    #[test]
    fn test_unavailable_fails_invoke() -> Result<()> {
        let mock = MockRuntime::new(MockScript::unavailable("no module"));
        let vfs = VirtualFs::for_request("mock")?;
        assert!(mock.invoke(&vfs, &Invocation::default()).is_err());
        Ok(())
    }
}
