use std::{path::PathBuf, process::Stdio, time::Duration};

use {
    anyhow::{Context, Result, bail},
    tokio::{io::AsyncWriteExt, process::Command},
    tracing::{debug, warn},
};

/// Result of running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Options controlling exec behavior.
#[derive(Debug, Clone, Default)]
pub struct ExecOpts {
    /// Kill the command if it runs longer than this.
    pub timeout: Option<Duration>,
}

/// Resolve `name` on `PATH` (or accept it as-is when it is already a path).
pub fn find_program(name: &str) -> Result<PathBuf> {
    which::which(name).with_context(|| format!("executable not found: {name}"))
}

/// Run `program` with `args`, feeding `input` on its stdin.
///
/// Stdin is written from a separate task while stdout and stderr are
/// collected, so large inputs cannot deadlock on full pipe buffers. The
/// writer is joined before returning: when this returns `Ok`, the whole input
/// was delivered (or the child closed its stdin early, which is reported
/// through its exit code).
pub async fn exec_with_stdin(
    program: &str,
    args: &[String],
    input: Vec<u8>,
    opts: &ExecOpts,
) -> Result<ExecResult> {
    debug!(program, ?args, input_len = input.len(), "exec_with_stdin");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;
    let mut stdin = child.stdin.take().context("failed to capture stdin")?;

    let writer = tokio::spawn(async move {
        stdin.write_all(&input).await?;
        stdin.shutdown().await
    });

    let output = match opts.timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(res) => res,
            Err(_) => {
                writer.abort();
                warn!(program, "exec timeout");
                bail!("{program} timed out after {}s", limit.as_secs());
            },
        },
        None => child.wait_with_output().await,
    }
    .with_context(|| format!("failed to run {program}"))?;

    let write_result = writer.await.context("stdin writer task panicked")?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let exit_code = output.status.code().unwrap_or(-1);
    debug!(
        exit_code,
        stdout_len = stdout.len(),
        stderr_len = stderr.len(),
        "exec done"
    );

    // A broken pipe only means the child stopped reading; its exit status
    // tells the real story.
    if let Err(e) = write_result
        && e.kind() != std::io::ErrorKind::BrokenPipe
    {
        bail!("failed to write stdin of {program}: {e}");
    }

    Ok(ExecResult {
        stdout,
        stderr,
        exit_code,
    })
}
