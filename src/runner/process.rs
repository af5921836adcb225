// ABOUTME: Child process execution shared by the local and ssh runners
// ABOUTME: Streams stdout/stderr line by line and kills the whole process group on cancellation

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::collections::VecDeque;
use std::os::unix::process::CommandExt;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{Result, RunnerError};
use super::sink::OutputSink;

/// Lines of stderr kept for the error message of a failed script
const STDERR_TAIL_LINES: usize = 20;

/// Run a prepared command to completion.
///
/// The child leads its own process group, so cancelling (or dropping this
/// future) kills every command the script started, not just the shell.
/// `stdin` is written to the child while its output is being read, so a
/// large script piped to a remote shell cannot deadlock against a full
/// stdout pipe.
pub(crate) async fn run_streaming(
    mut cmd: Command,
    stdin: Option<String>,
    cancel: &CancellationToken,
    out: &OutputSink,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(RunnerError::Cancelled);
    }

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .kill_on_drop(true);
    cmd.as_std_mut().process_group(0);

    let mut child = cmd.spawn().map_err(RunnerError::Spawn)?;
    let mut group = ProcessGroup::new(child.id());

    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

    let stdin_task = match (stdin, child.stdin.take()) {
        (Some(script), Some(mut pipe)) => Some(tokio::spawn(async move {
            pipe.write_all(script.as_bytes()).await?;
            pipe.shutdown().await
        })),
        (Some(_), None) => return Err(missing_pipe("stdin")),
        _ => None,
    };

    let stdout_task = tokio::spawn(forward_lines(stdout, out.clone(), 0));
    let stderr_task = tokio::spawn(forward_lines(stderr, out.clone(), STDERR_TAIL_LINES));

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = cancel.cancelled() => {
            warn!("Cancellation requested, killing script process group");
            group.kill();
            if let Err(e) = child.wait().await {
                warn!("Failed to reap script process: {}", e);
            }
            stdout_task.abort();
            stderr_task.abort();
            if let Some(task) = stdin_task {
                task.abort();
            }
            return Err(RunnerError::Cancelled);
        }
    };

    // Background jobs the script left behind are its own business
    group.release();

    stdout_task.await??;
    let stderr_tail = stderr_task.await??;

    if let Some(task) = stdin_task {
        // The script may exit without reading all of its input
        if let Err(e) = task.await? {
            debug!("Script stdin closed early: {}", e);
        }
    }

    if status.success() {
        Ok(())
    } else {
        Err(RunnerError::ExitStatus {
            code: status.code().unwrap_or(-1),
            stderr: stderr_tail.join("\n"),
        })
    }
}

/// Process group of a running script, killed on drop unless released
struct ProcessGroup {
    leader: Option<Pid>,
}

impl ProcessGroup {
    fn new(pid: Option<u32>) -> Self {
        Self {
            leader: pid.and_then(|pid| i32::try_from(pid).ok()).map(Pid::from_raw),
        }
    }

    fn kill(&mut self) {
        let Some(leader) = self.leader.take() else {
            return;
        };
        match killpg(leader, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!("Failed to kill process group {}: {}", leader, e),
        }
    }

    fn release(&mut self) {
        self.leader = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Copy lines from a pipe into the sink, keeping the last `keep` lines.
///
/// Bytes that are not valid UTF-8 are replaced rather than treated as an error,
/// since tool output in arbitrary locales ends up here.
async fn forward_lines<R>(reader: R, out: OutputSink, keep: usize) -> std::io::Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut raw = Vec::new();
    let mut tail = VecDeque::with_capacity(keep);

    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw).await? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(trim_line_end(&raw)).into_owned();
        out.write_line(&line)?;

        if keep > 0 {
            if tail.len() == keep {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }

    Ok(tail.into())
}

fn trim_line_end(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}

fn missing_pipe(name: &str) -> RunnerError {
    RunnerError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("child {} was not captured", name),
    ))
}
