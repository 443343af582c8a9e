//! Subprocess invocation shared by the git and npm clients.

use crate::errors::ToolError;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured output of a command that exited successfully.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `program args..` in `cwd` and wait for it to exit.
///
/// A non-zero exit becomes [`ToolError::NonZeroExit`] carrying the trimmed
/// stderr, so callers can inspect it for known conditions.
pub async fn run(program: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput, ToolError> {
    let command = command_line(program, args);
    debug!(command = %command, cwd = %cwd.display(), "spawning");

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let code = output.status.code().unwrap_or(-1);
    debug!(command = %command, code, "exited");

    if !output.status.success() {
        return Err(ToolError::NonZeroExit {
            command,
            code,
            stderr,
        });
    }

    Ok(CommandOutput { stdout, stderr })
}

pub fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}
