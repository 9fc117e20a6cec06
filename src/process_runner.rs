//! # External Process Execution Module
//!
//! This module owns the lifecycle of every external process the pipeline
//! spawns (ffprobe and ffmpeg invocations).
//!
//! ## Responsibilities:
//! - Spawns one process at a time and resolves to a `RunOutcome`
//! - Streams diagnostic (stderr) lines to an optional caller callback
//! - Registers every spawned process in a shared `ProcessRegistry`
//! - Terminates all registered processes on a hard-stop request
//!
//! ## Outcome model:
//! A run never returns a `Result`; callers always branch on the outcome:
//! - `Exited`: the process ran and exited (any code), with captured output
//! - `SpawnFailed`: the process could not be started (tool missing,
//!   permission denied), carrying the underlying error text
//! - `Terminated`: the process was killed by `ProcessRegistry::terminate_all`
//!
//! ## Registry invariant:
//! An entry is added the instant a process is spawned and removed the
//! instant it exits, whatever the exit reason. A stale handle would make a
//! cancellation request silently miss that process.
//!
//! No retries at this layer; retry policy belongs to the caller.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader, Lines};
use tokio::process::{ChildStderr, Command};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Outcome of one external process invocation
#[derive(Debug)]
pub enum RunOutcome {
    /// Process ran to completion (with any exit code)
    Exited {
        code: i32,
        stdout: String,
        stderr: String,
    },
    /// Process could not be started
    SpawnFailed { error: String },
    /// Process was killed by a termination request
    Terminated,
}

impl RunOutcome {
    /// True only for a zero exit code
    pub fn is_clean(&self) -> bool {
        matches!(self, RunOutcome::Exited { code: 0, .. })
    }
}

/// Process-wide registry of currently running external processes.
///
/// Used only for forced termination on cancellation or shutdown. Cheap to
/// clone; all clones share the same underlying set.
#[derive(Clone, Default)]
pub struct ProcessRegistry {
    inner: Arc<Mutex<HashMap<u64, Arc<Notify>>>>,
    next_id: Arc<AtomicU64>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self) -> (u64, Arc<Notify>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = Arc::new(Notify::new());
        self.inner
            .lock()
            .expect("process registry lock poisoned")
            .insert(id, cancel.clone());
        (id, cancel)
    }

    fn unregister(&self, id: u64) {
        self.inner
            .lock()
            .expect("process registry lock poisoned")
            .remove(&id);
    }

    /// Number of processes currently running
    pub fn running_count(&self) -> usize {
        self.inner
            .lock()
            .expect("process registry lock poisoned")
            .len()
    }

    /// Send a termination signal to every registered process and drain the
    /// registry. In-flight `run` calls for killed processes resolve with
    /// `RunOutcome::Terminated` instead of hanging.
    pub fn terminate_all(&self) {
        let drained: Vec<(u64, Arc<Notify>)> = self
            .inner
            .lock()
            .expect("process registry lock poisoned")
            .drain()
            .collect();

        if !drained.is_empty() {
            warn!("Terminating {} running process(es)", drained.len());
        }

        for (_, cancel) in drained {
            // notify_one stores a permit, so a run task that has not yet
            // reached its select point still observes the termination
            cancel.notify_one();
        }
    }
}

/// Runs external processes with cancellation support
pub struct ProcessRunner {
    registry: ProcessRegistry,
}

impl ProcessRunner {
    pub fn new(registry: ProcessRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Run a process to completion, capturing stdout and stderr.
    pub async fn run(&self, program: &Path, args: &[String]) -> RunOutcome {
        self.run_with_line_handler(program, args, |_| {}).await
    }

    /// Run a process, invoking `on_stderr_line` for every diagnostic line as
    /// it arrives. The full stderr text is still captured in the outcome.
    pub async fn run_with_line_handler<F>(
        &self,
        program: &Path,
        args: &[String],
        mut on_stderr_line: F,
    ) -> RunOutcome
    where
        F: FnMut(&str),
    {
        debug!("Spawning: {} {}", program.display(), args.join(" "));

        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn {}: {}", program.display(), e);
                return RunOutcome::SpawnFailed {
                    error: format!("{}: {}", program.display(), e),
                };
            }
        };

        let (id, cancel) = self.registry.register();

        // Drain stdout on a separate task so the child never blocks on a
        // full pipe while we follow stderr line by line.
        let stdout_pipe = child.stdout.take();
        let stdout_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut out) = stdout_pipe {
                let _ = out.read_to_string(&mut buf).await;
            }
            buf
        });

        let mut stderr_lines = child.stderr.take().map(|s| BufReader::new(s).lines());
        let mut stderr_buf = String::new();
        let mut exit_code: Option<i32> = None;
        let mut terminated = false;

        while exit_code.is_none() || stderr_lines.is_some() {
            tokio::select! {
                _ = cancel.notified(), if exit_code.is_none() && !terminated => {
                    terminated = true;
                    if let Err(e) = child.start_kill() {
                        warn!("Failed to kill process {}: {}", program.display(), e);
                    }
                    // keep looping so the child is reaped and stderr drained
                }
                line = next_line(&mut stderr_lines), if stderr_lines.is_some() => {
                    match line {
                        Some(line) => {
                            on_stderr_line(&line);
                            stderr_buf.push_str(&line);
                            stderr_buf.push('\n');
                        }
                        None => stderr_lines = None,
                    }
                }
                status = child.wait(), if exit_code.is_none() => {
                    exit_code = Some(match status {
                        Ok(status) => status.code().unwrap_or(-1),
                        Err(e) => {
                            warn!("Failed to wait for {}: {}", program.display(), e);
                            -1
                        }
                    });
                }
            }
        }

        self.registry.unregister(id);

        let stdout = stdout_task.await.unwrap_or_default();

        if terminated {
            debug!("Process terminated: {}", program.display());
            return RunOutcome::Terminated;
        }

        let code = exit_code.unwrap_or(-1);
        debug!("Process exited: {} (code {})", program.display(), code);

        RunOutcome::Exited {
            code,
            stdout,
            stderr: stderr_buf,
        }
    }
}

async fn next_line(lines: &mut Option<Lines<BufReader<ChildStderr>>>) -> Option<String> {
    match lines {
        Some(reader) => reader.next_line().await.ok().flatten(),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn sh() -> PathBuf {
        PathBuf::from("/bin/sh")
    }

    fn args(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_exit_code_and_output_captured() {
        let runner = ProcessRunner::new(ProcessRegistry::new());
        let outcome = runner
            .run(&sh(), &args("echo out; echo err 1>&2; exit 3"))
            .await;

        match outcome {
            RunOutcome::Exited {
                code,
                stdout,
                stderr,
            } => {
                assert_eq!(code, 3);
                assert!(stdout.contains("out"));
                assert!(stderr.contains("err"));
            }
            other => panic!("expected Exited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clean_exit() {
        let runner = ProcessRunner::new(ProcessRegistry::new());
        let outcome = runner.run(&sh(), &args("exit 0")).await;
        assert!(outcome.is_clean());
    }

    #[tokio::test]
    async fn test_spawn_failure_resolves_without_error() {
        let runner = ProcessRunner::new(ProcessRegistry::new());
        let outcome = runner
            .run(Path::new("/nonexistent/tool/binary"), &[])
            .await;

        match outcome {
            RunOutcome::SpawnFailed { error } => {
                assert!(error.contains("/nonexistent/tool/binary"));
            }
            other => panic!("expected SpawnFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stderr_lines_streamed() {
        let runner = ProcessRunner::new(ProcessRegistry::new());
        let mut seen = Vec::new();
        let outcome = runner
            .run_with_line_handler(&sh(), &args("echo one 1>&2; echo two 1>&2"), |line| {
                seen.push(line.to_string())
            })
            .await;

        assert!(outcome.is_clean());
        assert_eq!(seen, vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn test_terminate_all_resolves_in_flight_run() {
        let registry = ProcessRegistry::new();
        let runner = ProcessRunner::new(registry.clone());

        let kill_task = {
            let registry = registry.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                registry.terminate_all();
            })
        };

        let outcome = runner.run(&sh(), &args("sleep 30")).await;
        kill_task.await.unwrap();

        assert!(matches!(outcome, RunOutcome::Terminated));
        assert_eq!(registry.running_count(), 0);
    }

    #[tokio::test]
    async fn test_registry_empty_after_normal_exit() {
        let registry = ProcessRegistry::new();
        let runner = ProcessRunner::new(registry.clone());

        let _ = runner.run(&sh(), &args("exit 0")).await;
        assert_eq!(registry.running_count(), 0);
    }
}
