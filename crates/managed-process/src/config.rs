//! Process configuration

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default time allowed for output pipes to reach EOF after the process exits
const DEFAULT_OUTPUT_DRAIN_MS: u64 = 1000;

/// How `wait` decides whether an exited process failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any stderr output is a failure; the exit status is not consulted
    #[default]
    Stderr,
    /// A non-success exit status is a failure; stderr output is not consulted
    ExitCode,
    /// Either stderr output or a non-success exit status is a failure
    Either,
}

/// Configuration applied to every process spawned by a `ManagedProcess`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Working directory (None = current dir)
    pub working_dir: Option<PathBuf>,
    /// Environment variables (added to parent env)
    pub env: HashMap<String, String>,
    /// Capture stdout
    pub capture_stdout: bool,
    /// Capture stderr
    pub capture_stderr: bool,
    /// Open a pipe to the child's stdin
    pub pipe_stdin: bool,
    /// Exit-time failure rule
    pub failure_policy: FailurePolicy,
    /// Milliseconds the output readers may keep draining after exit
    pub output_drain_ms: u64,
    /// Terminate a still-running process when its owner is dropped
    pub kill_on_drop: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            env: HashMap::new(),
            capture_stdout: true,
            capture_stderr: true,
            pipe_stdin: true,
            failure_policy: FailurePolicy::default(),
            output_drain_ms: DEFAULT_OUTPUT_DRAIN_MS,
            kill_on_drop: true,
        }
    }
}

impl ProcessConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Enable/disable stdout capture
    pub fn capture_stdout(mut self, capture: bool) -> Self {
        self.capture_stdout = capture;
        self
    }

    /// Enable/disable stderr capture
    pub fn capture_stderr(mut self, capture: bool) -> Self {
        self.capture_stderr = capture;
        self
    }

    /// Enable/disable the stdin pipe
    pub fn pipe_stdin(mut self, pipe: bool) -> Self {
        self.pipe_stdin = pipe;
        self
    }

    /// Set the exit-time failure rule
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the post-exit output drain window
    pub fn output_drain(mut self, duration: Duration) -> Self {
        self.output_drain_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enable/disable termination on drop
    pub fn kill_on_drop(mut self, kill: bool) -> Self {
        self.kill_on_drop = kill;
        self
    }

    /// Post-exit output drain window as a `Duration`
    pub fn output_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.output_drain_ms)
    }
}
