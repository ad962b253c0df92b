//! Scripted in-memory runner for exercising the pipeline without processes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{WorkerError, WorkerInvocation, WorkerOutcome, WorkerRunner};

#[derive(Clone)]
enum Script {
    Exit {
        code: i32,
        output: String,
        delay: Duration,
    },
    LaunchFailure,
    Timeout,
}

#[derive(Default)]
pub(crate) struct FakeRunner {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<WorkerInvocation>>,
}

impl FakeRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, worker: &str, code: i32, output: &str) -> Self {
        self.respond_after(worker, code, output, Duration::ZERO)
    }

    pub(crate) fn respond_after(
        self,
        worker: &str,
        code: i32,
        output: &str,
        delay: Duration,
    ) -> Self {
        self.scripts.lock().unwrap().insert(
            worker.to_string(),
            Script::Exit {
                code,
                output: output.to_string(),
                delay,
            },
        );
        self
    }

    pub(crate) fn fail_launch(self, worker: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(worker.to_string(), Script::LaunchFailure);
        self
    }

    pub(crate) fn time_out(self, worker: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(worker.to_string(), Script::Timeout);
        self
    }

    pub(crate) fn calls(&self) -> Vec<WorkerInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self, worker: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.worker == worker)
            .count()
    }
}

#[async_trait]
impl WorkerRunner for FakeRunner {
    async fn run(
        &self,
        invocation: &WorkerInvocation,
        cancel: CancellationToken,
    ) -> Result<WorkerOutcome, WorkerError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&invocation.worker)
            .cloned()
            .unwrap_or(Script::Exit {
                code: 0,
                output: "{\"success\":true}".to_string(),
                delay: Duration::ZERO,
            });

        match script {
            Script::LaunchFailure => Err(WorkerError::Launch {
                worker: invocation.worker.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such interpreter"),
            }),
            Script::Timeout => Err(WorkerError::Timeout {
                worker: invocation.worker.clone(),
                after: Duration::from_secs(300),
                output: "[DEBUG] waiting for container\n".to_string(),
            }),
            Script::Exit {
                code,
                output,
                delay,
            } => {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = cancel.cancelled() => {
                        return Err(WorkerError::Cancelled { worker: invocation.worker.clone() });
                    }
                }
                Ok(WorkerOutcome::finish(
                    &invocation.worker,
                    code,
                    output,
                    delay,
                ))
            }
        }
    }
}
