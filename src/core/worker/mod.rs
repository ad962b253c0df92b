//! External worker processes: identities, invocations, outcomes, errors.
//!
//! A worker is a script run by the configured interpreter with a fixed
//! argument contract (`--flag value ...` followed by the credential) and the
//! script's own directory as working directory. It reports back through its
//! exit code and a JSON object somewhere in its combined output.

pub mod runner;
#[cfg(test)]
pub(crate) mod testing;

use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::core::extract::{self, Extracted};
pub use runner::{ProcessRunner, WorkerRunner};

/// Workers the publishing pipeline knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerId {
    PublishImage,
    PublishImageScheduled,
    PublishVideo,
    PublishVideoScheduled,
    PublishStory,
    PublishStoryScheduled,
    PublishCarousel,
    PublishCarouselScheduled,
    PublishMixedCarousel,
    PublishMixedCarouselScheduled,
    AutoScheduler,
    ValidateToken,
}

impl WorkerId {
    pub const ALL: [WorkerId; 12] = [
        WorkerId::PublishImage,
        WorkerId::PublishImageScheduled,
        WorkerId::PublishVideo,
        WorkerId::PublishVideoScheduled,
        WorkerId::PublishStory,
        WorkerId::PublishStoryScheduled,
        WorkerId::PublishCarousel,
        WorkerId::PublishCarouselScheduled,
        WorkerId::PublishMixedCarousel,
        WorkerId::PublishMixedCarouselScheduled,
        WorkerId::AutoScheduler,
        WorkerId::ValidateToken,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WorkerId::PublishImage => "create_instagram_post",
            WorkerId::PublishImageScheduled => "create_instagram_post_scheduled",
            WorkerId::PublishVideo => "create_instagram_video",
            WorkerId::PublishVideoScheduled => "create_instagram_video_scheduled",
            WorkerId::PublishStory => "create_instagram_story",
            WorkerId::PublishStoryScheduled => "create_instagram_story_scheduled",
            WorkerId::PublishCarousel => "create_instagram_carousel",
            WorkerId::PublishCarouselScheduled => "create_instagram_carousel_scheduled",
            WorkerId::PublishMixedCarousel => "create_instagram_mixed_carousel",
            WorkerId::PublishMixedCarouselScheduled => {
                "create_instagram_mixed_carousel_scheduled"
            }
            WorkerId::AutoScheduler => "auto_scheduler",
            WorkerId::ValidateToken => "validate_token",
        }
    }

    pub fn script(self) -> String {
        format!("{}.py", self.name())
    }

    /// Scheduling workers only register a post; the auto-scheduler must run
    /// after each of them succeeds.
    pub fn is_scheduling(self) -> bool {
        matches!(
            self,
            WorkerId::PublishImageScheduled
                | WorkerId::PublishVideoScheduled
                | WorkerId::PublishStoryScheduled
                | WorkerId::PublishCarouselScheduled
                | WorkerId::PublishMixedCarouselScheduled
        )
    }
}

/// One launch of one worker. Built per request and never mutated.
#[derive(Clone)]
pub struct WorkerInvocation {
    pub worker: String,
    pub script: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub credential: String,
}

impl WorkerInvocation {
    /// The full argument list: worker flags, then the trailing credential.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.args.clone();
        argv.push(self.credential.clone());
        argv
    }
}

impl fmt::Debug for WorkerInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerInvocation")
            .field("worker", &self.worker)
            .field("script", &self.script)
            .field("args", &self.args)
            .field("working_dir", &self.working_dir)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// What a finished worker left behind.
#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub worker: String,
    pub exit_code: i32,
    pub output: String,
    pub extracted: Option<Extracted>,
    pub duration: Duration,
}

impl WorkerOutcome {
    pub fn finish(worker: &str, exit_code: i32, output: String, duration: Duration) -> Self {
        let extracted = extract::extract(&output);
        Self {
            worker: worker.to_string(),
            exit_code,
            output,
            extracted,
            duration,
        }
    }

    pub fn result(&self) -> Option<&Value> {
        self.extracted.as_ref().map(|e| &e.value)
    }

    /// Strict reading used by publish-type workers: zero exit, a result, and
    /// no `success: false` in it.
    pub fn settle(self) -> Result<Value, WorkerError> {
        let summary = self.result().and_then(extract::error_message);
        if self.exit_code != 0 {
            return Err(WorkerError::Exit {
                worker: self.worker,
                code: self.exit_code,
                summary,
                output: self.output,
            });
        }
        let Some(extracted) = self.extracted else {
            return Err(WorkerError::Extraction {
                worker: self.worker,
                output: self.output,
            });
        };
        if extract::reported_success(&extracted.value) == Some(false) {
            return Err(WorkerError::Reported {
                worker: self.worker,
                message: summary.unwrap_or_else(|| "worker reported failure".to_string()),
                output: self.output,
            });
        }
        Ok(extracted.value)
    }

    /// Lenient reading used by data-collection workers, which write their
    /// documents to disk and often print no JSON at all.
    pub fn settle_exit(self) -> Result<Option<Value>, WorkerError> {
        if self.exit_code != 0 {
            let summary = self.result().and_then(extract::error_message);
            return Err(WorkerError::Exit {
                worker: self.worker,
                code: self.exit_code,
                summary,
                output: self.output,
            });
        }
        match self.extracted {
            Some(e) if extract::reported_success(&e.value) == Some(false) => {
                Err(WorkerError::Reported {
                    message: extract::error_message(&e.value)
                        .unwrap_or_else(|| "worker reported failure".to_string()),
                    worker: self.worker,
                    output: self.output,
                })
            }
            other => Ok(other.map(|e| e.value)),
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to launch worker {worker}: {source}")]
    Launch {
        worker: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker {worker} exited with code {code}{}", .summary.as_deref().map(|s| format!(": {s}")).unwrap_or_default())]
    Exit {
        worker: String,
        code: i32,
        summary: Option<String>,
        output: String,
    },

    #[error("worker {worker} finished without a parseable result")]
    Extraction { worker: String, output: String },

    #[error("worker {worker} reported failure: {message}")]
    Reported {
        worker: String,
        message: String,
        output: String,
    },

    #[error("worker {worker} timed out after {}s", .after.as_secs())]
    Timeout {
        worker: String,
        after: Duration,
        output: String,
    },

    #[error("worker {worker} was cancelled")]
    Cancelled { worker: String },
}

impl WorkerError {
    /// Captured worker text for operator debugging, when there is any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            WorkerError::Exit { output, .. }
            | WorkerError::Extraction { output, .. }
            | WorkerError::Reported { output, .. }
            | WorkerError::Timeout { output, .. } => {
                Some(output.as_str()).filter(|o| !o.trim().is_empty())
            }
            WorkerError::Launch { .. } | WorkerError::Cancelled { .. } => None,
        }
    }

    /// Short human-readable summary suitable for a dashboard message.
    pub fn summary(&self) -> String {
        match self {
            WorkerError::Exit {
                summary: Some(s), ..
            } => s.clone(),
            WorkerError::Reported { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Shared handle to the worker directory and the runner that launches
/// scripts from it. Cheap to clone.
#[derive(Clone)]
pub struct Workers {
    runner: Arc<dyn WorkerRunner>,
    dir: PathBuf,
}

impl Workers {
    pub fn new(runner: Arc<dyn WorkerRunner>, dir: PathBuf) -> Self {
        Self { runner, dir }
    }

    pub fn invocation(
        &self,
        worker: &str,
        script: &str,
        args: Vec<String>,
        credential: &str,
    ) -> WorkerInvocation {
        WorkerInvocation {
            worker: worker.to_string(),
            script: self.dir.join(script),
            args,
            working_dir: self.dir.clone(),
            credential: credential.to_string(),
        }
    }

    pub fn invocation_for(
        &self,
        id: WorkerId,
        args: Vec<String>,
        credential: &str,
    ) -> WorkerInvocation {
        self.invocation(id.name(), &id.script(), args, credential)
    }

    pub async fn run(
        &self,
        invocation: &WorkerInvocation,
        cancel: CancellationToken,
    ) -> Result<WorkerOutcome, WorkerError> {
        self.runner.run(invocation, cancel).await
    }
}
