//! Managed process - lifecycle orchestration for one child at a time

use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, error, info};

use crate::{
    buffer::OutputBuffer,
    config::{FailurePolicy, ProcessConfig},
    error::{ProcessError, Result},
    executable::Executable,
    handle::ProcessHandle,
    input::{ProcessInput, WriteOptions},
};

/// Lifecycle state of a `ManagedProcess`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// No process has been spawned yet
    Unspawned,
    /// The current process is running
    Running,
    /// The current process exited on its own
    Exited,
    /// A kill was requested for the current process
    Killed,
}

/// Owns at most one live child process of executable `E` together with the
/// captured stdout and stderr of that child.
///
/// Spawning again retires the previous child first: its output listeners are
/// detached, it is terminated if still running, and both buffers are cleared
/// before the new child's output starts arriving.
///
/// # Examples
/// ```no_run
/// use managed_process::{ManagedProcess, Program};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut process = ManagedProcess::new(Program::new("cat"));
/// process.spawn(vec![]).await?;
/// process.write("hello");
/// process.wait().await?;
/// assert_eq!(process.stdout().to_bytes(), b"hello");
/// # Ok(())
/// # }
/// ```
pub struct ManagedProcess<E: Executable> {
    executable: E,
    config: ProcessConfig,
    handle: Option<ProcessHandle>,
    stdout: OutputBuffer,
    stderr: OutputBuffer,
}

impl<E: Executable> ManagedProcess<E> {
    /// Create a managed process with the default configuration
    pub fn new(executable: E) -> Self {
        Self::with_config(executable, ProcessConfig::default())
    }

    /// Create a managed process with an explicit configuration
    pub fn with_config(executable: E, config: ProcessConfig) -> Self {
        Self {
            executable,
            config,
            handle: None,
            stdout: OutputBuffer::new(),
            stderr: OutputBuffer::new(),
        }
    }

    /// Get the executable definition
    pub fn executable(&self) -> &E {
        &self.executable
    }

    /// Get the process configuration
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Captured stdout of the current process
    pub fn stdout(&self) -> &OutputBuffer {
        &self.stdout
    }

    /// Captured stderr of the current process
    pub fn stderr(&self) -> &OutputBuffer {
        &self.stderr
    }

    /// Process ID of the current process
    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().and_then(ProcessHandle::pid)
    }

    /// Exit status of the current process, once its exit has been observed
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.handle.as_ref().and_then(ProcessHandle::exit_status)
    }

    /// True while the current process has neither been killed nor exited
    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(ProcessHandle::is_alive)
    }

    /// Current lifecycle state
    pub fn state(&self) -> ProcessState {
        match &self.handle {
            None => ProcessState::Unspawned,
            Some(handle) if handle.is_killed() => ProcessState::Killed,
            Some(handle) if handle.has_exited() => ProcessState::Exited,
            Some(_) => ProcessState::Running,
        }
    }

    /// Spawn a new process from domain arguments.
    ///
    /// Any previous process is retired first, so on failure no process is
    /// associated with this instance.
    pub async fn spawn(&mut self, args: E::Args) -> Result<()> {
        let program = self.executable.program().to_string();
        let arguments = self.executable.arguments(args);

        self.retire().await;

        if program.is_empty() {
            return Err(ProcessError::InvalidConfig(
                "program name is empty".to_string(),
            ));
        }

        debug!(program = %program, args = ?arguments, "Spawning process");

        let mut cmd = Command::new(&program);
        cmd.args(&arguments);

        if let Some(ref dir) = self.config.working_dir {
            cmd.current_dir(dir);
        }

        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        cmd.stdin(if self.config.pipe_stdin {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(if self.config.capture_stdout {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stderr(if self.config.capture_stderr {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.kill_on_drop(self.config.kill_on_drop);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(program = %program, error = %e, "Failed to spawn process");
                return Err(ProcessError::SpawnFailed(e));
            }
        };

        let handle = ProcessHandle::attach(
            child,
            &self.stdout,
            &self.stderr,
            self.config.output_drain_timeout(),
        );
        info!(pid = ?handle.pid(), program = %program, "Process spawned");
        self.handle = Some(handle);

        Ok(())
    }

    /// Forward data to stdin and close it afterwards
    pub fn write(&self, input: impl Into<ProcessInput>) {
        self.write_with(input, WriteOptions::default());
    }

    /// Forward data to stdin.
    ///
    /// Silently does nothing when no process is present or it has no stdin.
    /// Data is queued and forwarded in order by a background task, so this
    /// never waits for the child to consume it.
    pub fn write_with(&self, input: impl Into<ProcessInput>, options: WriteOptions) {
        match &self.handle {
            Some(handle) => handle.write(input.into(), options),
            None => debug!("Write ignored, no process spawned"),
        }
    }

    /// Wait for the current process to exit.
    ///
    /// Resolves immediately when nothing was spawned. Otherwise the outcome
    /// is decided by the configured `FailurePolicy` once the process exited
    /// and its output pipes drained.
    pub async fn wait(&self) -> Result<()> {
        let Some(handle) = &self.handle else {
            return Ok(());
        };
        let record = handle.exited().await;
        self.judge(record.status)
    }

    /// Request termination of the current process.
    ///
    /// `0` requests forced termination; on Unix any other value is sent as
    /// that signal number. Buffers and listeners are left untouched.
    pub fn kill(&self, code: i32) {
        match &self.handle {
            Some(handle) => handle.kill(code),
            None => debug!("Kill ignored, no process spawned"),
        }
    }

    fn judge(&self, status: Option<ExitStatus>) -> Result<()> {
        let policy = self.config.failure_policy;
        let checks_stderr = matches!(policy, FailurePolicy::Stderr | FailurePolicy::Either);
        let checks_status = matches!(policy, FailurePolicy::ExitCode | FailurePolicy::Either);

        if checks_stderr && !self.stderr.is_empty() {
            return Err(ProcessError::Stderr(self.stderr.to_text()));
        }
        if checks_status && !status.is_some_and(|status| status.success()) {
            return Err(ProcessError::ExitStatus {
                code: status.and_then(|status| status.code()),
                stderr: self.stderr.to_text(),
            });
        }
        Ok(())
    }

    /// Detach and terminate the current process, then reset both buffers.
    ///
    /// Everything up to the buffer reset happens before the first await, so
    /// dropping a pending `spawn` still retires the old process.
    async fn retire(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.release();
            self.stdout.clear();
            self.stderr.clear();
            handle.join_listeners().await;
        }
    }
}

impl<E: Executable> Drop for ManagedProcess<E> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if self.config.kill_on_drop {
                handle.release();
            } else {
                handle.cancel_listeners();
            }
        }
        self.stdout.clear();
        self.stderr.clear();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::executable::Program;
    use std::time::Duration;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_unspawned_state() {
        let process = ManagedProcess::new(Program::new("sh"));
        assert_eq!(process.state(), ProcessState::Unspawned);
        assert!(!process.is_alive());
        assert!(process.pid().is_none());
        assert!(process.exit_status().is_none());

        process.write("ignored");
        process.kill(0);
        process.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_spawn_and_wait() {
        let mut process = ManagedProcess::new(Program::new("sh"));
        process.spawn(sh("printf hello")).await.unwrap();
        assert!(process.pid().is_some());

        process.wait().await.unwrap();
        assert_eq!(process.stdout().to_bytes(), b"hello");
        assert!(process.stderr().is_empty());
        assert_eq!(process.state(), ProcessState::Exited);
        assert!(process.exit_status().unwrap().success());
    }

    #[tokio::test]
    async fn test_empty_program_is_rejected() {
        let mut process = ManagedProcess::new(Program::new(""));
        let err = process.spawn(vec![]).await.unwrap_err();
        assert!(matches!(err, ProcessError::InvalidConfig(_)));
        assert_eq!(process.state(), ProcessState::Unspawned);
    }

    #[tokio::test]
    async fn test_kill_marks_process_killed() {
        let mut process = ManagedProcess::new(Program::new("sleep"));
        process.spawn(vec!["10".to_string()]).await.unwrap();
        assert!(process.is_alive());

        process.kill(0);
        assert!(!process.is_alive());
        assert_eq!(process.state(), ProcessState::Killed);

        tokio::time::timeout(Duration::from_secs(5), process.wait())
            .await
            .unwrap()
            .unwrap();
        assert!(!process.exit_status().unwrap().success());
    }

    #[tokio::test]
    async fn test_unknown_signal_does_not_mark_killed() {
        let mut process = ManagedProcess::new(Program::new("sleep"));
        process.spawn(vec!["10".to_string()]).await.unwrap();

        process.kill(9999);
        assert!(process.is_alive());
        assert_eq!(process.state(), ProcessState::Running);

        process.kill(0);
        assert_eq!(process.state(), ProcessState::Killed);
    }

    #[tokio::test]
    async fn test_exit_code_policy_ignores_stderr() {
        let config = ProcessConfig::new().failure_policy(FailurePolicy::ExitCode);
        let mut process = ManagedProcess::with_config(Program::new("sh"), config);

        process.spawn(sh("printf warn >&2")).await.unwrap();
        process.wait().await.unwrap();
        assert_eq!(process.stderr().to_text(), "warn");

        process.spawn(sh("exit 3")).await.unwrap();
        let err = process.wait().await.unwrap_err();
        assert!(matches!(err, ProcessError::ExitStatus { code: Some(3), .. }));
    }

    #[tokio::test]
    async fn test_either_policy() {
        let config = ProcessConfig::new().failure_policy(FailurePolicy::Either);
        let mut process = ManagedProcess::with_config(Program::new("sh"), config);

        process.spawn(sh("printf oops >&2")).await.unwrap();
        assert_eq!(process.wait().await.unwrap_err().to_string(), "oops");

        process.spawn(sh("exit 1")).await.unwrap();
        assert!(matches!(
            process.wait().await.unwrap_err(),
            ProcessError::ExitStatus { code: Some(1), .. }
        ));

        process.spawn(sh("true")).await.unwrap();
        process.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_uncaptured_stderr_stays_empty() {
        let config = ProcessConfig::new().capture_stderr(false);
        let mut process = ManagedProcess::with_config(Program::new("sh"), config);

        process.spawn(sh("printf noise >&2")).await.unwrap();
        process.wait().await.unwrap();
        assert!(process.stderr().is_empty());
    }
}
