//! Publish and schedule pipeline: classify, run one worker, settle its
//! result, and run the auto-scheduler after every successful schedule.

pub mod classify;
pub mod request;

use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::extract;
use crate::core::worker::{WorkerError, WorkerId, Workers};
use classify::classify;
pub use request::{ContentKind, Mode, PublishBody, PublishRequest, ValidationError};

/// What the dashboard gets back from a successful publish or schedule.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub worker: WorkerId,
    pub id: Option<String>,
    pub scheduled_time: Option<i64>,
    pub result: Value,
}

#[derive(Debug, Error)]
#[error("auto-scheduler run failed: {0}")]
pub struct ChainError(#[from] pub WorkerError);

/// Runs the auto-scheduler once a post has been registered for later.
#[derive(Clone)]
pub struct ChainTrigger {
    workers: Workers,
}

impl ChainTrigger {
    pub fn new(workers: Workers) -> Self {
        Self { workers }
    }

    pub async fn after_schedule(
        &self,
        credential: &str,
        cancel: CancellationToken,
    ) -> Result<(), ChainError> {
        let invocation = self
            .workers
            .invocation_for(WorkerId::AutoScheduler, Vec::new(), credential);
        self.workers
            .run(&invocation, cancel)
            .await?
            .settle_exit()?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Publisher {
    workers: Workers,
    chain: ChainTrigger,
}

impl Publisher {
    pub fn new(workers: Workers) -> Self {
        Self {
            chain: ChainTrigger::new(workers.clone()),
            workers,
        }
    }

    pub async fn publish(
        &self,
        request: PublishRequest,
        cancel: CancellationToken,
    ) -> Result<PublishOutcome, WorkerError> {
        let job = classify(&request);
        info!(
            kind = request.content.kind().as_str(),
            worker = job.worker.name(),
            scheduled = request.scheduled_at.is_some(),
            "Dispatching publish job"
        );

        let invocation = self
            .workers
            .invocation_for(job.worker, job.args, &request.credential);
        let result = self
            .workers
            .run(&invocation, cancel.clone())
            .await?
            .settle()?;

        if job.worker.is_scheduling() {
            // The response waits for the chained run but never depends on it.
            if let Err(e) = self.chain.after_schedule(&request.credential, cancel).await {
                warn!(worker = job.worker.name(), "{}", e);
            }
        }

        let scheduled_time = request
            .scheduled_at
            .or_else(|| result.get("scheduled_time").and_then(Value::as_i64));
        Ok(PublishOutcome {
            worker: job.worker,
            id: extract::created_id(&result),
            scheduled_time,
            result,
        })
    }

    /// Asks the token worker whether a credential is usable. A clean
    /// rejection is a normal result, not an error.
    pub async fn validate_token(
        &self,
        credential: &str,
        cancel: CancellationToken,
    ) -> Result<Value, WorkerError> {
        let invocation = self
            .workers
            .invocation_for(WorkerId::ValidateToken, Vec::new(), credential);
        let outcome = self.workers.run(&invocation, cancel).await?;
        if let Some(result) = outcome.result().filter(|r| r.get("valid").is_some()) {
            return Ok(result.clone());
        }
        outcome.settle()
    }
}
