//! Structured external-tool invocation
//!
//! Every ffmpeg/ffprobe call is an explicit argument vector handed straight to
//! the process spawner. Nothing is ever parsed by a shell, so file names are
//! opaque values no matter what characters they contain.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Default ceiling for a single tool invocation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Why a tool invocation produced no exit status
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {}s", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },
}

/// Captured result of a finished tool invocation
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// One external-tool call: program, argv, working directory and time limit
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ToolCommand {
    /// Start building a call to `program`
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            current_dir: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Run the tool from `dir`
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Kill the tool if it runs longer than `timeout`
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program being invoked
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments as display strings (lossy), for logs and assertions
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Run to completion and capture stdout/stderr
    ///
    /// A process that outlives the timeout is killed when its handle drops.
    pub async fn output(&self) -> Result<CommandOutput, ToolError> {
        let program = self.program.display().to_string();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        debug!("Running {} with args: {:?}", program, self.argv());

        let child = cmd.spawn().map_err(|source| ToolError::Io {
            program: program.clone(),
            source,
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ToolError::Io {
                program: program.clone(),
                source,
            })?,
            Err(_) => {
                return Err(ToolError::TimedOut {
                    program,
                    timeout: self.timeout,
                })
            }
        };

        Ok(CommandOutput {
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Check whether the program starts and exits cleanly with `args`
    pub async fn probe_available(program: impl AsRef<Path>, args: &[&str]) -> bool {
        Command::new(program.as_ref())
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_stay_separate_values() {
        let cmd = ToolCommand::new("ffmpeg")
            .arg("-i")
            .arg("my file; rm -rf ~.jpg")
            .args(["-y", "out $(whoami).mp4"]);

        assert_eq!(
            cmd.argv(),
            vec!["-i", "my file; rm -rf ~.jpg", "-y", "out $(whoami).mp4"]
        );
        assert_eq!(cmd.program(), Path::new("ffmpeg"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_and_success() {
        let out = ToolCommand::new("sh")
            .args(["-c", "printf '%s' \"$1\"", "sh", "a b;c"])
            .output()
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.exit_code, Some(0));
        assert_eq!(out.stdout, "a b;c");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reports_nonzero_exit_with_stderr() {
        let out = ToolCommand::new("sh")
            .args(["-c", "echo boom >&2; exit 3"])
            .output()
            .await
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stderr.trim(), "boom");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_in_requested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = ToolCommand::new("pwd")
            .current_dir(dir.path())
            .output()
            .await
            .unwrap();
        let reported = PathBuf::from(out.stdout.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kills_tool_after_timeout() {
        let err = ToolCommand::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(100))
            .output()
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_io_error() {
        let err = ToolCommand::new("/nonexistent/slidecast-tool")
            .output()
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Io { .. }));
        assert!(!ToolCommand::probe_available("/nonexistent/slidecast-tool", &["-version"]).await);
    }
}
