use std::process::Output;

use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("command failed ({command}): {stderr}")]
    CommandFailure {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

pub type ExecResult<T> = Result<T, ExecError>;

/// Seam between the pipeline and the operating system: production code uses
/// [`SystemCommandRunner`], tests substitute fakes returning canned output.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &mut Command) -> std::io::Result<Output>;
}

#[derive(Debug, Default)]
pub struct SystemCommandRunner;

#[async_trait::async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, command: &mut Command) -> std::io::Result<Output> {
        command.output().await
    }
}

/// Runs `program` with `args` to completion, capturing both output streams.
/// Returns stdout as text on success; a non-zero exit becomes a
/// [`ExecError::CommandFailure`] carrying the rendered command line and the
/// captured stderr. No retries and no timeout: a hanging tool blocks the
/// calling request.
pub async fn run_capture(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
) -> ExecResult<String> {
    let mut command = Command::new(program);
    command.kill_on_drop(true);
    for arg in args {
        command.arg(arg);
    }
    let output = runner
        .run(&mut command)
        .await
        .map_err(|source| ExecError::Spawn {
            program: program.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(ExecError::CommandFailure {
            command: format!("{} {}", program, args.join(" ")),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
