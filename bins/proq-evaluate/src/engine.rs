//! Process Engine - Running Build and Run Commands
//!
//! **Core Responsibility:**
//! Launch a command as a child process, feed it standard input, wait for it and
//! hand back its exit status plus captured output.
//!
//! **Critical Architectural Boundary:**
//! - Engine knows HOW to run a command (local processes, no shell)
//! - Engine does NOT compare outputs
//! - Engine does NOT decide verdicts
//! - A nonzero exit is a normal result; only failing to run at all is an error
//!
//! **Capture Policies:**
//! - `Separate` (builds): stdout and stderr captured apart, reported stderr first
//! - `Merged` (runs): stderr shares the stdout pipe, so crash text interleaves with
//!   regular output and is compared as part of the actual output

use crate::error::InvokeError;
use async_trait::async_trait;
use proq_common::types::{CommandLine, ExecutionResult};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePolicy {
    /// Capture both streams apart; report `stderr + stdout`
    Separate,
    /// Redirect stderr into the stdout stream
    Merged,
}

/// Swappable execution backend
///
/// `working_dir` becomes the child's current directory; the evaluator never
/// changes the process-wide one.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn invoke(
        &self,
        working_dir: &Path,
        command: &CommandLine,
        stdin: &str,
        policy: CapturePolicy,
    ) -> Result<ExecutionResult, InvokeError>;
}

/// Runs commands as local child processes with the same privileges as the evaluator
#[derive(Debug, Clone, Default)]
pub struct ProcessEngine;

impl ProcessEngine {
    pub fn new() -> Self {
        Self
    }

    async fn run_separate(
        &self,
        working_dir: &Path,
        command: &CommandLine,
        stdin: &str,
    ) -> Result<ExecutionResult, InvokeError> {
        let mut child = Command::new(resolve_program(working_dir, command.program()))
            .args(command.args())
            .current_dir(working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(command.program(), e))?;

        let pipe = child.stdin.take();
        let (fed, output) = tokio::join!(feed_stdin(pipe, stdin), child.wait_with_output());
        fed.map_err(|source| io_error(command.program(), source))?;
        let output = output.map_err(|source| io_error(command.program(), source))?;

        let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stdout));

        Ok(ExecutionResult {
            success: output.status.success(),
            output: text,
        })
    }

    async fn run_merged(
        &self,
        working_dir: &Path,
        command: &CommandLine,
        stdin: &str,
    ) -> Result<ExecutionResult, InvokeError> {
        let program = command.program();
        let (reader, writer) = io::pipe().map_err(|source| io_error(program, source))?;
        let writer_for_stderr = writer
            .try_clone()
            .map_err(|source| io_error(program, source))?;

        // The Command holds the parent's copies of the write end; it must be
        // dropped before reading or the reader never sees EOF.
        let mut child = {
            let mut cmd = Command::new(resolve_program(working_dir, program));
            cmd.args(command.args())
                .current_dir(working_dir)
                .stdin(Stdio::piped())
                .stdout(writer)
                .stderr(writer_for_stderr)
                .kill_on_drop(true);
            cmd.spawn().map_err(|e| spawn_error(program, e))?
        };

        let pipe = child.stdin.take();
        let (fed, status, collected) = tokio::join!(
            feed_stdin(pipe, stdin),
            child.wait(),
            read_merged(reader)
        );
        fed.map_err(|source| io_error(program, source))?;
        let status = status.map_err(|source| io_error(program, source))?;
        let bytes = collected.map_err(|source| io_error(program, source))?;

        Ok(ExecutionResult {
            success: status.success(),
            output: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

#[async_trait]
impl ExecutionEngine for ProcessEngine {
    async fn invoke(
        &self,
        working_dir: &Path,
        command: &CommandLine,
        stdin: &str,
        policy: CapturePolicy,
    ) -> Result<ExecutionResult, InvokeError> {
        let start = Instant::now();
        let result = match policy {
            CapturePolicy::Separate => self.run_separate(working_dir, command, stdin).await,
            CapturePolicy::Merged => self.run_merged(working_dir, command, stdin).await,
        };

        if let Ok(ref r) = result {
            debug!(
                command = %command,
                policy = ?policy,
                success = r.success,
                output_bytes = r.output.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Process finished"
            );
        }
        result
    }
}

/// Bounded-wait decorator around any engine
///
/// On expiry the inner invocation future is dropped, which kills the child
/// (`kill_on_drop`), and a `TimedOut` error is returned in place of a result.
pub struct TimeoutEngine<E> {
    inner: E,
    limit: Option<Duration>,
}

impl<E> TimeoutEngine<E> {
    pub fn new(inner: E, limit: Option<Duration>) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl<E: ExecutionEngine> ExecutionEngine for TimeoutEngine<E> {
    async fn invoke(
        &self,
        working_dir: &Path,
        command: &CommandLine,
        stdin: &str,
        policy: CapturePolicy,
    ) -> Result<ExecutionResult, InvokeError> {
        let Some(limit) = self.limit else {
            return self.inner.invoke(working_dir, command, stdin, policy).await;
        };

        match tokio::time::timeout(limit, self.inner.invoke(working_dir, command, stdin, policy)).await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    command = %command,
                    timeout_ms = limit.as_millis() as u64,
                    "Process timed out; killed"
                );
                Err(InvokeError::TimedOut {
                    program: command.program().to_string(),
                    after: limit,
                })
            }
        }
    }
}

/// Write all of stdin then close the pipe
///
/// A child that exits without reading its input is not an error.
async fn feed_stdin(pipe: Option<ChildStdin>, input: &str) -> io::Result<()> {
    let Some(mut pipe) = pipe else {
        return Ok(());
    };

    match pipe.write_all(input.as_bytes()).await {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

/// Drain the shared output pipe until every writer has closed it
///
/// The read is registered with the runtime, so dropping the invocation future
/// (on timeout) releases the pipe even while a grandchild still holds the write end.
#[cfg(unix)]
async fn read_merged(reader: io::PipeReader) -> io::Result<Vec<u8>> {
    use std::os::fd::OwnedFd;
    use tokio::io::AsyncReadExt;
    use tokio::net::unix::pipe::Receiver;

    let mut receiver = Receiver::from_file(std::fs::File::from(OwnedFd::from(reader)))?;
    let mut buf = Vec::new();
    receiver.read_to_end(&mut buf).await?;
    Ok(buf)
}

#[cfg(not(unix))]
async fn read_merged(mut reader: io::PipeReader) -> io::Result<Vec<u8>> {
    use std::io::Read;

    tokio::task::spawn_blocking(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).map(|_| buf)
    })
    .await
    .map_err(io::Error::other)?
}

/// Relative paths with a separator (`./main`, `bin/run`) name files in the
/// working directory; bare names are looked up on `PATH`
fn resolve_program(working_dir: &Path, program: &str) -> PathBuf {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        working_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

fn spawn_error(program: &str, source: io::Error) -> InvokeError {
    if source.kind() == io::ErrorKind::NotFound {
        InvokeError::NotFound {
            program: program.to_string(),
        }
    } else {
        InvokeError::Spawn {
            program: program.to_string(),
            source,
        }
    }
}

fn io_error(program: &str, source: io::Error) -> InvokeError {
    InvokeError::Io {
        program: program.to_string(),
        source,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn cmd(raw: &str) -> CommandLine {
        CommandLine::parse(raw).unwrap()
    }

    fn script_dir(script: &str) -> TempDir {
        let dir = TempDir::new().expect("failed to create temp dir");
        fs::write(dir.path().join("script.sh"), script).unwrap();
        dir
    }

    #[test]
    fn test_resolve_program() {
        let wd = Path::new("/work");
        assert_eq!(resolve_program(wd, "./main"), PathBuf::from("/work/./main"));
        assert_eq!(resolve_program(wd, "bin/run"), PathBuf::from("/work/bin/run"));
        assert_eq!(resolve_program(wd, "python3"), PathBuf::from("python3"));
        assert_eq!(resolve_program(wd, "/usr/bin/env"), PathBuf::from("/usr/bin/env"));
    }

    #[tokio::test]
    async fn test_separate_policy_reports_stderr_first() {
        let dir = script_dir("echo out\necho err 1>&2\n");
        let result = ProcessEngine::new()
            .invoke(dir.path(), &cmd("sh script.sh"), "", CapturePolicy::Separate)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output, "err\nout\n");
    }

    #[tokio::test]
    async fn test_merged_policy_interleaves_streams() {
        let dir = script_dir("echo one\necho two 1>&2\necho three\n");
        let result = ProcessEngine::new()
            .invoke(dir.path(), &cmd("sh script.sh"), "", CapturePolicy::Merged)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output, "one\ntwo\nthree\n");
    }

    #[tokio::test]
    async fn test_stdin_is_fed_to_child() {
        let dir = TempDir::new().unwrap();
        let result = ProcessEngine::new()
            .invoke(dir.path(), &cmd("cat"), "hello\nworld", CapturePolicy::Merged)
            .await
            .unwrap();

        assert_eq!(result.output, "hello\nworld");
    }

    #[tokio::test]
    async fn test_child_ignoring_stdin_is_fine() {
        let dir = script_dir("echo ignored\n");
        let big_input = "x".repeat(1 << 20);
        let result = ProcessEngine::new()
            .invoke(dir.path(), &cmd("sh script.sh"), &big_input, CapturePolicy::Merged)
            .await
            .unwrap();

        assert_eq!(result.output, "ignored\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_a_result_not_an_error() {
        let dir = script_dir("echo partial\necho boom 1>&2\nexit 3\n");
        let result = ProcessEngine::new()
            .invoke(dir.path(), &cmd("sh script.sh"), "", CapturePolicy::Merged)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.output, "partial\nboom\n");
    }

    #[tokio::test]
    async fn test_runs_inside_working_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("marker.txt"), "").unwrap();
        let result = ProcessEngine::new()
            .invoke(dir.path(), &cmd("ls"), "", CapturePolicy::Separate)
            .await
            .unwrap();

        assert!(result.output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_missing_executable_is_not_a_nonzero_exit() {
        let dir = TempDir::new().unwrap();
        let err = ProcessEngine::new()
            .invoke(
                dir.path(),
                &cmd("proq-no-such-interpreter-for-tests"),
                "",
                CapturePolicy::Merged,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, InvokeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_runaway_process() {
        let dir = TempDir::new().unwrap();
        let engine = TimeoutEngine::new(ProcessEngine::new(), Some(Duration::from_millis(200)));

        let start = Instant::now();
        let err = engine
            .invoke(dir.path(), &cmd("sleep 10"), "", CapturePolicy::Separate)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_timed_out_run_does_not_outlive_its_limit() {
        // `sleep` survives the kill of `sh` and keeps the output pipe open
        let dir = script_dir("sleep 5\necho late\n");
        let engine = TimeoutEngine::new(ProcessEngine::new(), Some(Duration::from_millis(200)));

        let start = Instant::now();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = runtime
            .block_on(engine.invoke(dir.path(), &cmd("sh script.sh"), "", CapturePolicy::Merged))
            .unwrap_err();
        drop(runtime);

        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_no_limit_passes_through() {
        let dir = script_dir("echo done\n");
        let engine = TimeoutEngine::new(ProcessEngine::new(), None);
        let result = engine
            .invoke(dir.path(), &cmd("sh script.sh"), "", CapturePolicy::Merged)
            .await
            .unwrap();

        assert_eq!(result.output, "done\n");
    }
}
