//! Running an executable with its stdout and stderr interleaved.

use std::ffi::OsStr;
use std::io::SeekFrom;
use std::path::Path;
use std::process::Stdio;

use pipeline::CommandOutput;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

/// Why an executable produced no [`CommandOutput`].
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The process could not be started.
    #[error("failed to start process: {0}")]
    Spawn(#[source] std::io::Error),

    /// Feeding stdin, waiting, or reading back the output failed.
    #[error("process I/O failed: {0}")]
    Io(#[source] std::io::Error),
}

/// Runs `program` with `args`, writing `stdin` to it, and returns the exit
/// status together with everything it printed.
///
/// Stdout and stderr share one anonymous temporary file, so the captured text
/// keeps the order in which the process wrote it. A non-zero exit is not an
/// error here; callers inspect [`CommandOutput::success`].
pub async fn run_combined<I, S>(
    program: &OsStr,
    args: I,
    working_dir: Option<&Path>,
    stdin: Option<&[u8]>,
) -> Result<CommandOutput, RunError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let capture = tempfile::tempfile().map_err(RunError::Io)?;
    let stdout = capture.try_clone().map_err(RunError::Io)?;
    let stderr = capture.try_clone().map_err(RunError::Io)?;

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(RunError::Spawn)?;
    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input).await.map_err(RunError::Io)?;
        pipe.shutdown().await.map_err(RunError::Io)?;
    }
    let status = child.wait().await.map_err(RunError::Io)?;

    let mut capture = tokio::fs::File::from_std(capture);
    capture.seek(SeekFrom::Start(0)).await.map_err(RunError::Io)?;
    let mut raw = Vec::new();
    capture.read_to_end(&mut raw).await.map_err(RunError::Io)?;

    debug!(exit_code = ?status.code(), bytes = raw.len(), "process finished");
    Ok(CommandOutput {
        success: status.success(),
        exit_code: status.code(),
        output: String::from_utf8_lossy(&raw).into_owned(),
    })
}
