// src/process.rs

//! Executes one correction as an external process.
//!
//! The child gets exactly `[command, script, args]`, its stdin is written in
//! full and closed, and stdout/stderr are captured until it exits or the
//! wall-clock [`TIMEOUT`] expires. A timed-out child is killed and reaped.
//! On unix the child leads its own process group, and the whole group is
//! killed, so anything the script forked goes down with it.
//! Every failure mode ends up as an [`ExecutionResult`]; nothing here
//! returns an error to the caller.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::activity::{Correction, ExecutionResult, Outcome};
use crate::checks::verify;

/// Wall-clock limit for every correction process.
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// How long to keep draining pipes after the child is gone. A grandchild
/// that inherited the pipes can keep them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Stdout reported when a timed-out process printed nothing.
const NO_OUTPUT: &str = "\n";

/// Run `correction` with the process-wide [`TIMEOUT`].
pub async fn run(correction: &Correction) -> ExecutionResult {
    run_with_timeout(correction, TIMEOUT).await
}

/// Run `correction`, killing the process after `limit`.
pub async fn run_with_timeout(correction: &Correction, limit: Duration) -> ExecutionResult {
    let start = Instant::now();
    let finish = |outcome: Outcome, exit_code: i32, stdout: String, stderr: String| {
        ExecutionResult {
            success: outcome == Outcome::Passed,
            outcome,
            exit_code,
            stdout,
            stderr,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    };

    let script = script_path(correction);
    if !script.exists() {
        tracing::debug!(script = %script.display(), "script not found");
        return finish(
            Outcome::NotStarted,
            -1,
            String::new(),
            format!(
                "Could not start process: script {} not found.",
                correction.script
            ),
        );
    }

    let [command, script_arg, args] = correction.argv();
    let mut cmd = Command::new(command);
    cmd.arg(script_arg)
        .arg(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &correction.workdir {
        cmd.current_dir(dir);
    }
    #[cfg(unix)]
    cmd.process_group(0);

    tracing::debug!(command = %correction.command_line(), "spawning");

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return finish(
                Outcome::NotStarted,
                -1,
                String::new(),
                format!("Could not start process `{}`: {}", command, e),
            )
        }
    };
    let mut guard = ChildGuard::new(child);

    let (stdin, stdout, stderr) = match guard.child_mut() {
        Some(child) => (child.stdin.take(), child.stdout.take(), child.stderr.take()),
        None => (None, None, None),
    };

    if let Some(mut pipe) = stdin {
        let input = correction.stdin.clone().into_bytes();
        tokio::spawn(async move {
            // The child may exit without reading; a broken pipe is fine.
            if !input.is_empty() {
                let _ = pipe.write_all(&input).await;
            }
            let _ = pipe.shutdown().await;
        });
    }

    let out = Capture::start(stdout);
    let err = Capture::start(stderr);

    let waited = match guard.child_mut() {
        Some(child) => tokio::time::timeout(limit, child.wait()).await,
        None => Ok(Err(std::io::Error::other("child handle missing"))),
    };

    match waited {
        Ok(Ok(status)) => {
            guard.disarm();
            let stdout = out.finish().await;
            let stderr = err.finish().await;
            // Killed by a signal: no exit code.
            let code = status.code().unwrap_or(-1);

            if code != 0 {
                return finish(Outcome::ExitedNonZero, code, stdout, stderr);
            }

            match verify(&stdout, &correction.verifications, &correction.error_message) {
                Ok(()) => finish(Outcome::Passed, code, stdout, stderr),
                Err(failed) => {
                    tracing::debug!(
                        check = failed.check,
                        index = failed.index,
                        "verification failed"
                    );
                    finish(Outcome::VerificationFailed, code, stdout, failed.message)
                }
            }
        }
        Ok(Err(e)) => {
            guard.kill_and_reap().await;
            let stdout = out.finish().await;
            finish(
                Outcome::NotStarted,
                -1,
                stdout,
                format!("Failed while waiting for process: {}", e),
            )
        }
        Err(_elapsed) => {
            tracing::warn!(
                command = %correction.command_line(),
                timeout_s = limit.as_secs(),
                "process timed out, killing"
            );
            guard.kill_and_reap().await;
            let mut stdout = out.finish().await;
            err.finish().await;
            if stdout.is_empty() {
                stdout = NO_OUTPUT.to_string();
            }
            finish(Outcome::TimedOut, 1, stdout, timeout_message(limit))
        }
    }
}

/// Diagnostic used for timed-out runs.
pub fn timeout_message(limit: Duration) -> String {
    format!("Timeout of {}s expired.", limit.as_secs())
}

fn script_path(correction: &Correction) -> PathBuf {
    let script = Path::new(&correction.script);
    match &correction.workdir {
        Some(dir) if script.is_relative() => dir.join(script),
        _ => script.to_path_buf(),
    }
}

/* ---------------- child lifetime ---------------- */

/// Kills the child and its process group on drop unless it has been waited
/// on to completion.
struct ChildGuard {
    child: Option<Child>,
    /// Id of the process group the child leads.
    group: Option<u32>,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        let group = child.id();
        Self {
            child: Some(child),
            group,
        }
    }

    fn child_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }

    /// The child exited on its own. Whatever it left running in its group
    /// is killed.
    fn disarm(&mut self) {
        if self.child.take().is_some() {
            self.kill_group();
        }
    }

    /// Kill the group, then wait on the child so no zombie is left behind.
    async fn kill_and_reap(&mut self) {
        if let Some(mut child) = self.child.take() {
            self.kill_group();
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "failed to kill child process");
            }
        }
    }

    #[cfg(unix)]
    fn kill_group(&self) {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(id) = self.group.and_then(|id| i32::try_from(id).ok()) else {
            return;
        };
        match killpg(Pid::from_raw(id), Signal::SIGKILL) {
            // Group already empty.
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => tracing::warn!(group = id, error = %e, "failed to kill process group"),
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&self) {}
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.kill_group();
        }
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/* ---------------- output capture ---------------- */

/// Reads a pipe into a shared buffer so partial output survives a timeout.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl Capture {
    fn start<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let task = pipe.map(|mut pipe| {
            let sink = Arc::clone(&buf);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => sink
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend_from_slice(&chunk[..n]),
                    }
                }
            })
        });
        Self { buf, task }
    }

    /// Wait briefly for EOF, then decode whatever was read.
    ///
    /// Undecodable bytes are replaced rather than failing the run.
    async fn finish(mut self) -> String {
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(DRAIN_GRACE, &mut task).await.is_err() {
                task.abort();
            }
        }
        let bytes = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
