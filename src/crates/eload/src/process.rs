//! External process invocation
//!
//! Commands are structured argument lists handed straight to the OS; no shell
//! is involved, so accessions and paths are never re-parsed. Standard output
//! and standard error go to a log file that stays behind for diagnosis.

use crate::error::{EloadError, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// A fully described external process run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Short human description, used in logs
    pub description: String,
    pub program: OsString,
    pub args: Vec<OsString>,
    /// Extra environment variables for the child only
    pub env: Vec<(String, String)>,
    pub working_dir: Option<PathBuf>,
    /// File receiving both stdout and stderr
    pub log_path: PathBuf,
}

impl Invocation {
    pub fn new(description: impl Into<String>, program: impl Into<OsString>, log_path: impl Into<PathBuf>) -> Self {
        Self {
            description: description.into(),
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            working_dir: None,
            log_path: log_path.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Arguments as lossy strings, for logs and assertions
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Command line for display only; never executed through a shell
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How an external process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code, or `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl ProcessOutcome {
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external processes to completion
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the process and wait for it. An `Err` means it could not be started.
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutcome>;
}

/// Runs processes on the local machine with `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

async fn open_log(path: &Path, invocation: &Invocation) -> Result<(std::fs::File, std::fs::File)> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| EloadError::io(parent, e))?;
    }
    let mut log = tokio::fs::File::create(path)
        .await
        .map_err(|e| EloadError::io(path, e))?;
    let header = format!("# {}\n# {}\n", invocation.description, invocation.display_command());
    log.write_all(header.as_bytes())
        .await
        .map_err(|e| EloadError::io(path, e))?;
    log.flush().await.map_err(|e| EloadError::io(path, e))?;

    let stdout = log.into_std().await;
    let stderr = stdout.try_clone().map_err(|e| EloadError::io(path, e))?;
    Ok((stdout, stderr))
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutcome> {
        let (stdout, stderr) = open_log(&invocation.log_path, invocation).await?;

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        info!(
            process = %invocation.description,
            command = %invocation.display_command(),
            log = %invocation.log_path.display(),
            "Starting external process"
        );

        let status = command
            .status()
            .await
            .map_err(|e| EloadError::io(PathBuf::from(&invocation.program), e))?;

        let outcome = ProcessOutcome {
            exit_code: status.code(),
        };
        debug!(process = %invocation.description, exit_code = ?outcome.exit_code, "External process finished");
        Ok(outcome)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_output_is_captured_to_log() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("logs").join("echo.log");
        let invocation = Invocation::new("echo test", "sh", &log)
            .arg("-c")
            .arg("echo to-stdout; echo to-stderr >&2");

        let outcome = SystemProcessRunner::new().run(&invocation).await.unwrap();

        assert!(outcome.success());
        let captured = std::fs::read_to_string(&log).unwrap();
        assert!(captured.contains("to-stdout"));
        assert!(captured.contains("to-stderr"));
        assert!(captured.starts_with("# echo test"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported() {
        let temp = TempDir::new().unwrap();
        let invocation = Invocation::new("fail", "sh", temp.path().join("fail.log"))
            .args(["-c", "exit 3"]);

        let outcome = SystemProcessRunner::new().run(&invocation).await.unwrap();

        assert_eq!(outcome.exit_code, Some(3));
        assert!(!outcome.success());
    }

    #[tokio::test]
    async fn test_arguments_are_not_shell_interpreted() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("printf.log");
        let invocation = Invocation::new("printf", "printf", &log)
            .args(["%s\\n", "PRJEB1; rm -rf /tmp/x $(id)"]);

        let outcome = SystemProcessRunner::new().run(&invocation).await.unwrap();

        assert!(outcome.success());
        let captured = std::fs::read_to_string(&log).unwrap();
        assert!(captured.contains("PRJEB1; rm -rf /tmp/x $(id)"));
    }

    #[tokio::test]
    async fn test_child_environment_and_working_dir() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("env.log");
        let invocation = Invocation::new("env", "sh", &log)
            .args(["-c", "echo $NXF_OPTS; pwd"])
            .env("NXF_OPTS", "-Xms1g -Xmx8g")
            .current_dir(temp.path());

        SystemProcessRunner::new().run(&invocation).await.unwrap();

        let captured = std::fs::read_to_string(&log).unwrap();
        assert!(captured.contains("-Xms1g -Xmx8g"));
        assert!(std::env::var("NXF_OPTS").map(|v| v != "-Xms1g -Xmx8g").unwrap_or(true));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_concurrent_runs_share_one_runtime_thread() {
        let temp = TempDir::new().unwrap();
        let first = Invocation::new("first", "sh", temp.path().join("a").join("first.log"))
            .args(["-c", "echo one"]);
        let second = Invocation::new("second", "sh", temp.path().join("b").join("second.log"))
            .args(["-c", "echo two"]);
        let runner = SystemProcessRunner::new();

        let (a, b) = tokio::join!(runner.run(&first), runner.run(&second));

        assert!(a.unwrap().success());
        assert!(b.unwrap().success());
        let first_log = std::fs::read_to_string(&first.log_path).unwrap();
        assert!(first_log.starts_with("# first\n# sh -c echo one\n"), "{}", first_log);
        assert!(first_log.contains("one"));
        let second_log = std::fs::read_to_string(&second.log_path).unwrap();
        assert!(second_log.starts_with("# second"), "{}", second_log);
    }

    #[tokio::test]
    async fn test_unwritable_log_location_is_an_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("logs");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let invocation = Invocation::new("blocked", "sh", blocker.join("blocked.log")).args(["-c", "exit 0"]);

        let err = SystemProcessRunner::new().run(&invocation).await.unwrap_err();

        assert!(matches!(err, EloadError::Io { .. }), "{}", err);
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let temp = TempDir::new().unwrap();
        let invocation = Invocation::new("missing", "/nonexistent/bin/tool", temp.path().join("m.log"));

        let err = SystemProcessRunner::new().run(&invocation).await.unwrap_err();
        assert!(matches!(err, EloadError::Io { .. }));
    }

    #[test]
    fn test_display_command() {
        let invocation = Invocation::new("x", "nextflow", "x.log").args(["run.nf", "-params-file", "p.yaml"]);
        assert_eq!(invocation.display_command(), "nextflow run.nf -params-file p.yaml");
    }
}
