use std::path::Path;
use std::process::Stdio;

use crate::exec::ExecError;

/// Abstraction over external command execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait CommandExecutor: Send + Sync {
    /// Execute a command and capture stdout.
    async fn exec(&self, program: &str, args: &[String]) -> Result<String, ExecError>;

    /// Execute a command from `cwd`, streaming its output to stderr.
    ///
    /// Used for build procedures, whose output is for humans; stdout stays
    /// reserved for imprint's own results.
    async fn exec_streaming(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<(), ExecError>;
}

/// Real process executor.
pub struct RealExecutor;

impl CommandExecutor for RealExecutor {
    async fn exec(&self, program: &str, args: &[String]) -> Result<String, ExecError> {
        tracing::debug!(program, ?args, "exec");
        let output = tokio::process::Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ExecError::NotFound {
                program: program.to_owned(),
                source: e,
            })?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| ExecError::InvalidUtf8 {
                program: program.to_owned(),
                source: e,
            })
        } else {
            Err(ExecError::CommandFailed {
                program: program.to_owned(),
                args: args.to_vec(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }

    async fn exec_streaming(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<(), ExecError> {
        tracing::debug!(program, ?args, cwd = %cwd.display(), "exec (streaming)");
        let status = tokio::process::Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdout(std::io::stderr())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| ExecError::NotFound {
                program: program.to_owned(),
                source: e,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ExecError::CommandFailed {
                program: program.to_owned(),
                args: args.to_vec(),
                status: status.code(),
                stderr: String::new(),
            })
        }
    }
}
