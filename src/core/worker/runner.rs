use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{WorkerError, WorkerInvocation, WorkerOutcome};

/// Grace period for the output readers once the process itself has exited.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

#[async_trait]
pub trait WorkerRunner: Send + Sync {
    /// Runs one invocation to completion. A nonzero exit is still an
    /// `Ok(outcome)`; errors cover only launch, timeout and cancellation.
    async fn run(
        &self,
        invocation: &WorkerInvocation,
        cancel: CancellationToken,
    ) -> Result<WorkerOutcome, WorkerError>;
}

/// Runs worker scripts as child processes of the configured interpreter.
///
/// stdout and stderr are read line by line as they arrive and folded into a
/// single transcript. The child is killed on timeout, on cancellation, and if
/// the calling future is dropped.
pub struct ProcessRunner {
    interpreter: String,
    timeout: Duration,
    credential_env: String,
}

impl ProcessRunner {
    pub fn new(interpreter: String, timeout: Duration, credential_env: String) -> Self {
        Self {
            interpreter,
            timeout,
            credential_env,
        }
    }

    fn command(&self, invocation: &WorkerInvocation) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&invocation.script)
            .args(invocation.argv())
            .current_dir(&invocation.working_dir)
            .env(&self.credential_env, &invocation.credential)
            .env("PYTHONUNBUFFERED", "1")
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

async fn forward_lines<R>(pipe: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                if tx.send(line).is_err() {
                    break;
                }
            }
        }
    }
}

fn append_line(output: &mut String, worker: &str, line: String) {
    debug!(worker, "{}", line);
    output.push_str(&line);
    output.push('\n');
}

#[async_trait]
impl WorkerRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: &WorkerInvocation,
        cancel: CancellationToken,
    ) -> Result<WorkerOutcome, WorkerError> {
        let worker = invocation.worker.as_str();
        let start = Instant::now();
        info!(worker, script = %invocation.script.display(), "Launching worker");

        let mut child = self
            .command(invocation)
            .spawn()
            .map_err(|source| WorkerError::Launch {
                worker: worker.to_string(),
                source,
            })?;

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut output = String::new();
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let status = loop {
            tokio::select! {
                Some(line) = rx.recv() => append_line(&mut output, worker, line),
                status = child.wait() => break status,
                () = &mut deadline => {
                    if let Err(e) = child.kill().await {
                        warn!(worker, "Failed to kill timed-out worker: {}", e);
                    }
                    warn!(worker, timeout_secs = self.timeout.as_secs(), "Worker timed out");
                    return Err(WorkerError::Timeout {
                        worker: worker.to_string(),
                        after: self.timeout,
                        output,
                    });
                }
                () = cancel.cancelled() => {
                    if let Err(e) = child.kill().await {
                        warn!(worker, "Failed to kill cancelled worker: {}", e);
                    }
                    warn!(worker, "Worker cancelled");
                    return Err(WorkerError::Cancelled {
                        worker: worker.to_string(),
                    });
                }
            }
        };

        let status = status.map_err(|source| WorkerError::Launch {
            worker: worker.to_string(),
            source,
        })?;

        // A grandchild holding the pipes open must not stall the response.
        let drained = tokio::time::timeout(DRAIN_GRACE, async {
            while let Some(line) = rx.recv().await {
                append_line(&mut output, worker, line);
            }
        })
        .await;
        if drained.is_err() {
            warn!(worker, "Output pipes still open after exit; transcript may be partial");
        }

        let exit_code = status.code().unwrap_or(-1);
        let outcome = WorkerOutcome::finish(worker, exit_code, output, start.elapsed());
        info!(
            worker,
            exit_code,
            duration_ms = u64::try_from(outcome.duration.as_millis()).unwrap_or(u64::MAX),
            extracted = outcome.extracted.as_ref().map(|e| e.strategy.as_str()),
            "Worker finished"
        );
        Ok(outcome)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_script(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    fn invocation(dir: &Path, script: &str, args: &[&str]) -> WorkerInvocation {
        WorkerInvocation {
            worker: script.trim_end_matches(".sh").to_string(),
            script: dir.join(script),
            args: args.iter().map(|a| a.to_string()).collect(),
            working_dir: dir.to_path_buf(),
            credential: "tok-123".to_string(),
        }
    }

    fn runner(timeout: Duration) -> ProcessRunner {
        ProcessRunner::new("sh".to_string(), timeout, "TEST_ACCESS_TOKEN".to_string())
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr_with_exit_code() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(
            tmp.path(),
            "mixed.sh",
            "echo 'log line'\necho 'warning' >&2\necho '{\"success\":true,\"id\":\"42\"}'\nexit 0\n",
        );
        let outcome = runner(Duration::from_secs(10))
            .run(&invocation(tmp.path(), "mixed.sh", &[]), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.output.contains("log line"));
        assert!(outcome.output.contains("warning"));
        assert_eq!(outcome.result().unwrap()["id"], "42");
    }

    #[tokio::test]
    async fn passes_args_credential_env_and_working_dir() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(
            tmp.path(),
            "echo_args.sh",
            "echo \"args=$*\"\necho \"env=$TEST_ACCESS_TOKEN\"\necho \"cwd=$(pwd)\"\n",
        );
        let outcome = runner(Duration::from_secs(10))
            .run(
                &invocation(tmp.path(), "echo_args.sh", &["--caption", "hello"]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(outcome.output.contains("args=--caption hello tok-123"));
        assert!(outcome.output.contains("env=tok-123"));
        let cwd = tmp.path().canonicalize().unwrap();
        assert!(outcome.output.contains(&format!("cwd={}", cwd.display())));
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_outcome_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(tmp.path(), "fail.sh", "echo 'boom' >&2\nexit 3\n");
        let outcome = runner(Duration::from_secs(10))
            .run(&invocation(tmp.path(), "fail.sh", &[]), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, 3);
        assert!(outcome.extracted.is_none());
        assert!(matches!(
            outcome.settle(),
            Err(WorkerError::Exit { code: 3, .. })
        ));
    }

    #[tokio::test]
    async fn outcome_records_how_long_the_worker_ran() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(tmp.path(), "nap.sh", "sleep 0.3\necho '{\"success\":true}'\n");
        let outcome = runner(Duration::from_secs(10))
            .run(&invocation(tmp.path(), "nap.sh", &[]), CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.duration >= Duration::from_millis(300));
        assert!(outcome.duration < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn missing_interpreter_is_a_launch_error() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(
            "/nonexistent/interpreter".to_string(),
            Duration::from_secs(5),
            "TEST_ACCESS_TOKEN".to_string(),
        );
        let err = runner
            .run(&invocation(tmp.path(), "x.sh", &[]), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Launch { .. }));
    }

    #[tokio::test]
    async fn hung_worker_times_out_with_partial_output() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(tmp.path(), "hang.sh", "echo 'started'\nsleep 30\n");
        let err = runner(Duration::from_millis(500))
            .run(&invocation(tmp.path(), "hang.sh", &[]), CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            WorkerError::Timeout { output, .. } => assert!(output.contains("started")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_stops_the_worker() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(tmp.path(), "slow.sh", "sleep 30\n");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });
        let started = Instant::now();
        let err = runner(Duration::from_secs(60))
            .run(&invocation(tmp.path(), "slow.sh", &[]), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn concurrent_runs_keep_separate_transcripts() {
        let tmp = tempfile::tempdir().unwrap();
        write_script(tmp.path(), "say.sh", "sleep 0.2\necho \"{\\\"who\\\":\\\"$1\\\"}\"\n");
        let runner = std::sync::Arc::new(runner(Duration::from_secs(10)));
        let a = invocation(tmp.path(), "say.sh", &["a"]);
        let b = invocation(tmp.path(), "say.sh", &["b"]);
        let (ra, rb) = tokio::join!(
            runner.run(&a, CancellationToken::new()),
            runner.run(&b, CancellationToken::new())
        );
        assert_eq!(ra.unwrap().result().unwrap()["who"], "a");
        assert_eq!(rb.unwrap().result().unwrap()["who"], "b");
    }
}
