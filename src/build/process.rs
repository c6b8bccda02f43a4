//! Subprocess execution with live output.

use crate::cli::RuntimeConfig;
use crate::error::{ReleaseError, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Timeout for a single build tool invocation (60 minutes).
/// A cold Gradle build downloads its whole dependency graph.
pub const BUILD_TIMEOUT: Duration = Duration::from_secs(3600);

/// Runs `program` with `args` in `cwd`, streaming both output streams.
///
/// Only the program and its first argument are logged or reported; later
/// arguments may carry credentials. A non-zero exit status or a timeout is
/// returned as [`ReleaseError::BuildFailed`].
pub async fn run_streaming(
    program: &Path,
    args: &[String],
    cwd: &Path,
    runtime_config: &RuntimeConfig,
) -> Result<()> {
    run_streaming_with_timeout(program, args, cwd, runtime_config, BUILD_TIMEOUT).await
}

/// [`run_streaming`] with an explicit deadline.
///
/// The deadline covers the whole run, including draining output, so a child
/// that keeps its pipes open without exiting is still killed.
pub async fn run_streaming_with_timeout(
    program: &Path,
    args: &[String],
    cwd: &Path,
    runtime_config: &RuntimeConfig,
    timeout: Duration,
) -> Result<()> {
    let command_line = format!(
        "{} {}",
        program.display(),
        args.first().map(String::as_str).unwrap_or_default()
    );
    log::info!("Running {}", command_line);

    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ReleaseError::execution(command_line.clone(), e.to_string()))?;

    // Drain both pipes concurrently so neither can fill up and block the child
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let streamed = async {
        tokio::join!(
            async {
                if let Some(stdout) = stdout {
                    let mut lines = BufReader::new(stdout).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        runtime_config.indent(&line);
                    }
                }
            },
            async {
                if let Some(stderr) = stderr {
                    let mut lines = BufReader::new(stderr).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        runtime_config.indent(&line);
                    }
                }
            }
        );
        child.wait().await
    };
    let result = tokio::time::timeout(timeout, streamed).await;

    let status = match result {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => return Err(ReleaseError::execution(command_line, e.to_string())),
        Err(_elapsed) => {
            runtime_config.warn(&format!(
                "{} timed out after {:?}, terminating...",
                command_line, timeout
            ));
            if let Err(e) = child.kill().await {
                log::warn!("Failed to kill {}: {}", program.display(), e);
            }
            return Err(ReleaseError::BuildFailed {
                command: command_line,
                code: None,
            });
        }
    };

    if !status.success() {
        return Err(ReleaseError::BuildFailed {
            command: command_line,
            code: status.code(),
        });
    }

    Ok(())
}
