//! Live child process handle and its background tasks

use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::buffer::OutputBuffer;
use crate::input::{InputStream, ProcessInput, WriteOptions};

/// Size of the scratch buffer used per pipe read
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Published once the child has exited and its output has drained
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExitRecord {
    /// None if the OS wait call itself failed
    pub(crate) status: Option<ExitStatus>,
}

struct StdinRequest {
    stream: InputStream,
    end: bool,
}

/// Revocable reference to one spawned child.
///
/// The `Child` itself is owned by a supervisor task, which reaps it and
/// publishes the exit record. Reader tasks append pipe chunks to the owner's
/// buffers until the handle is detached.
pub(crate) struct ProcessHandle {
    pid: Option<u32>,
    killed: AtomicBool,
    exited: Arc<AtomicBool>,
    kill_tx: mpsc::UnboundedSender<i32>,
    stdin_tx: Option<mpsc::UnboundedSender<StdinRequest>>,
    exit_rx: watch::Receiver<Option<ExitRecord>>,
    detach: CancellationToken,
    listeners: Vec<JoinHandle<()>>,
}

impl ProcessHandle {
    /// Take ownership of a freshly spawned child and start its tasks
    pub(crate) fn attach(
        mut child: Child,
        stdout: &OutputBuffer,
        stderr: &OutputBuffer,
        drain_timeout: Duration,
    ) -> Self {
        let pid = child.id();
        let detach = CancellationToken::new();
        let exited = Arc::new(AtomicBool::new(false));
        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        // Readers hold clones; recv() yields None once every reader has finished.
        let (drain_tx, drain_rx) = mpsc::channel::<()>(1);
        let mut listeners = Vec::with_capacity(3);

        if let Some(pipe) = child.stdout.take() {
            listeners.push(tokio::spawn(read_into(
                pipe,
                stdout.clone(),
                detach.clone(),
                drain_tx.clone(),
                pid,
                "stdout",
            )));
        }
        if let Some(pipe) = child.stderr.take() {
            listeners.push(tokio::spawn(read_into(
                pipe,
                stderr.clone(),
                detach.clone(),
                drain_tx.clone(),
                pid,
                "stderr",
            )));
        }
        drop(drain_tx);

        let stdin_tx = child.stdin.take().map(|stdin| {
            let (tx, rx) = mpsc::unbounded_channel();
            listeners.push(tokio::spawn(forward_stdin(stdin, rx, detach.clone(), pid)));
            tx
        });

        tokio::spawn(supervise(
            child,
            pid,
            kill_rx,
            drain_rx,
            drain_timeout,
            Arc::clone(&exited),
            exit_tx,
        ));

        Self {
            pid,
            killed: AtomicBool::new(false),
            exited,
            kill_tx,
            stdin_tx,
            exit_rx,
            detach,
            listeners,
        }
    }

    pub(crate) fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub(crate) fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    pub(crate) fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    pub(crate) fn is_alive(&self) -> bool {
        !self.is_killed() && !self.has_exited()
    }

    pub(crate) fn exit_status(&self) -> Option<ExitStatus> {
        let record = *self.exit_rx.borrow();
        record.and_then(|record| record.status)
    }

    /// Queue a termination request; ignored once the child has exited.
    ///
    /// Codes that are not valid signals are rejected without marking the
    /// handle killed.
    pub(crate) fn kill(&self, code: i32) {
        if self.has_exited() {
            debug!(pid = ?self.pid, "Kill ignored, process already exited");
            return;
        }
        #[cfg(unix)]
        {
            if code != 0 {
                if let Err(e) = nix::sys::signal::Signal::try_from(code) {
                    warn!(pid = ?self.pid, code, error = %e, "Unknown signal, kill ignored");
                    return;
                }
            }
        }
        if self.kill_tx.send(code).is_ok() {
            self.killed.store(true, Ordering::SeqCst);
            debug!(pid = ?self.pid, code, "Kill requested");
        }
    }

    /// Queue data for the child's stdin; no-op without a stdin pipe
    pub(crate) fn write(&self, input: ProcessInput, options: WriteOptions) {
        let Some(tx) = &self.stdin_tx else {
            debug!(pid = ?self.pid, "Write ignored, process has no stdin");
            return;
        };
        let request = StdinRequest {
            stream: input.into_stream(),
            end: options.end,
        };
        if tx.send(request).is_err() {
            debug!(pid = ?self.pid, "Write ignored, stdin already closed");
        }
    }

    /// Resolve once the exit record has been published
    pub(crate) async fn exited(&self) -> ExitRecord {
        let mut rx = self.exit_rx.clone();
        let record = match rx.wait_for(Option::is_some).await {
            Ok(record) => *record,
            // Supervisor gone without publishing (runtime shutting down)
            Err(_) => None,
        };
        record.unwrap_or(ExitRecord { status: None })
    }

    /// Stop the listeners without waiting for them
    pub(crate) fn cancel_listeners(&self) {
        self.detach.cancel();
    }

    /// Force termination unless the child has already exited.
    ///
    /// Earlier kill requests are not consulted; a trapped or ignored signal
    /// still leaves the child running.
    pub(crate) fn terminate(&self) {
        if !self.has_exited() && self.kill_tx.send(0).is_ok() {
            debug!(pid = ?self.pid, "Terminating process");
        }
    }

    /// Stop the listeners and terminate the child without awaiting anything.
    ///
    /// After this returns no listener appends to the buffers, so the owner
    /// may clear them right away.
    pub(crate) fn release(&self) {
        debug!(pid = ?self.pid, "Detaching process handle");
        self.detach.cancel();
        self.terminate();
    }

    /// Wait for every listener task to finish
    pub(crate) async fn join_listeners(self) {
        for listener in self.listeners {
            if let Err(e) = listener.await {
                warn!(pid = ?self.pid, error = %e, "Process listener task failed");
            }
        }
    }
}

async fn read_into(
    mut pipe: impl AsyncRead + Unpin,
    buffer: OutputBuffer,
    detach: CancellationToken,
    _drain: mpsc::Sender<()>,
    pid: Option<u32>,
    stream: &'static str,
) {
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let read = tokio::select! {
            biased;
            _ = detach.cancelled() => break,
            read = pipe.read(&mut chunk) => read,
        };
        match read {
            Ok(0) => {
                debug!(pid = ?pid, stream, "Output stream ended");
                break;
            }
            Ok(n) => {
                if !buffer.append_attached(&chunk[..n], &detach) {
                    break;
                }
            }
            Err(e) => {
                warn!(pid = ?pid, stream, error = %e, "Error reading from output stream");
                break;
            }
        }
    }
}

async fn forward_stdin(
    mut stdin: ChildStdin,
    mut requests: mpsc::UnboundedReceiver<StdinRequest>,
    detach: CancellationToken,
    pid: Option<u32>,
) {
    loop {
        let request = tokio::select! {
            biased;
            _ = detach.cancelled() => break,
            request = requests.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };
        let end = request.end;
        let forwarded = tokio::select! {
            biased;
            _ = detach.cancelled() => break,
            forwarded = copy_into(request.stream, &mut stdin) => forwarded,
        };
        if let Err(e) = forwarded {
            warn!(pid = ?pid, error = %e, "Failed to write to process stdin");
            break;
        }
        if end {
            if let Err(e) = stdin.shutdown().await {
                debug!(pid = ?pid, error = %e, "Error closing process stdin");
            }
            debug!(pid = ?pid, "Process stdin closed");
            break;
        }
    }
}

async fn copy_into(mut stream: InputStream, stdin: &mut ChildStdin) -> std::io::Result<()> {
    tokio::io::copy(&mut stream, stdin).await?;
    stdin.flush().await
}

async fn supervise(
    mut child: Child,
    pid: Option<u32>,
    mut kill_rx: mpsc::UnboundedReceiver<i32>,
    mut drain_rx: mpsc::Receiver<()>,
    drain_timeout: Duration,
    exited: Arc<AtomicBool>,
    exit_tx: watch::Sender<Option<ExitRecord>>,
) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(code) = kill_rx.recv() => deliver_kill(&mut child, pid, code),
        }
    };
    exited.store(true, Ordering::SeqCst);

    let status = match status {
        Ok(status) => {
            debug!(pid = ?pid, %status, "Process exited");
            Some(status)
        }
        Err(e) => {
            warn!(pid = ?pid, error = %e, "Error waiting for process");
            None
        }
    };

    if tokio::time::timeout(drain_timeout, drain_rx.recv()).await.is_err() {
        debug!(pid = ?pid, "Output still open after exit, not waiting further");
    }
    exit_tx.send_replace(Some(ExitRecord { status }));
}

/// Code 0 is the platform's forced termination; other codes are Unix signals
fn deliver_kill(child: &mut Child, pid: Option<u32>, code: i32) {
    if code == 0 {
        if let Err(e) = child.start_kill() {
            warn!(pid = ?pid, error = %e, "Failed to kill process");
        }
        return;
    }

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = pid else {
            return;
        };
        match Signal::try_from(code) {
            Ok(signal) => {
                if let Err(e) = kill(Pid::from_raw(pid as i32), signal) {
                    warn!(pid, %signal, error = %e, "Failed to signal process");
                }
            }
            Err(e) => warn!(pid, code, error = %e, "Unknown signal, kill ignored"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = child.start_kill() {
            warn!(pid = ?pid, error = %e, "Failed to kill process");
        }
    }
}
