//! Running child processes with a deadline and bounded capture.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How long a child may run and how much of each stream is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// One captured stream. Bytes past the limit are drained and counted.
#[derive(Debug, Default)]
pub struct Captured {
    pub bytes: Vec<u8>,
    pub dropped: usize,
}

impl Captured {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }
}

/// A child that has exited, either on its own or after being killed.
#[derive(Debug)]
pub struct Finished {
    pub status: ExitStatus,
    pub stdout: Captured,
    pub stderr: Captured,
    pub timed_out: bool,
}

/// Run `cmd` with stdin closed, killing it once `limits.timeout` passes.
///
/// Both pipes are drained on their own threads while the child runs, so a
/// chatty child cannot block on a full pipe.
#[instrument(skip_all, fields(timeout_secs = limits.timeout.as_secs(), limit = limits.output_limit_bytes))]
pub fn run_bounded(mut cmd: Command, limits: RunLimits) -> Result<Finished> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|err| {
        error!(err = %err, "failed to spawn command");
        anyhow!(err).context("spawn command")
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout = drain(stdout, limits.output_limit_bytes);
    let stderr = drain(stderr, limits.output_limit_bytes);

    let (status, timed_out) = match child.wait_timeout(limits.timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!(timeout_secs = limits.timeout.as_secs(), "command timed out, killing");
            child.kill().context("kill command")?;
            (child.wait().context("wait command after kill")?, true)
        }
    };

    let stdout = collect(stdout).context("join stdout")?;
    let stderr = collect(stderr).context("join stderr")?;
    if stdout.is_truncated() || stderr.is_truncated() {
        warn!(
            stdout_dropped = stdout.dropped,
            stderr_dropped = stderr.dropped,
            "output truncated"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(Finished {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn drain<R: Read + Send + 'static>(mut reader: R, limit: usize) -> JoinHandle<Result<Captured>> {
    thread::spawn(move || {
        let mut captured = Captured::default();
        let mut chunk = [0u8; 8192];
        loop {
            let n = reader.read(&mut chunk).context("read output")?;
            if n == 0 {
                return Ok(captured);
            }
            let keep = n.min(limit.saturating_sub(captured.bytes.len()));
            captured.bytes.extend_from_slice(&chunk[..keep]);
            captured.dropped += n - keep;
        }
    })
}

fn collect(handle: JoinHandle<Result<Captured>>) -> Result<Captured> {
    handle
        .join()
        .unwrap_or_else(|_| Err(anyhow!("output reader thread panicked")))
}
