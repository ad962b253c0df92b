//! Dashboard refresh: every data-collection worker runs at once and the
//! caller hears back only after all of them have settled.

use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::config::RefreshSourceConfig;
use crate::core::worker::{WorkerError, Workers};

#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
    pub details: Option<String>,
}

/// Every branch that failed, in configured source order.
#[derive(Debug, Error)]
#[error("{} of {total} refresh sources failed", failures.len())]
pub struct JoinError {
    pub failures: Vec<SourceFailure>,
    pub total: usize,
}

impl JoinError {
    pub fn messages(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|f| format!("{}: {}", f.source, f.error))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct RefreshSummary {
    pub sources: Vec<String>,
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    workers: Workers,
    sources: Vec<RefreshSourceConfig>,
}

impl RefreshCoordinator {
    pub fn new(workers: Workers, sources: Vec<RefreshSourceConfig>) -> Self {
        Self { workers, sources }
    }

    pub async fn refresh(
        &self,
        credential: &str,
        cancel: CancellationToken,
    ) -> Result<RefreshSummary, JoinError> {
        let started = Instant::now();
        let total = self.sources.len();
        let mut set = JoinSet::new();
        let mut positions = HashMap::new();

        for (position, source) in self.sources.iter().enumerate() {
            let workers = self.workers.clone();
            let invocation =
                workers.invocation(&source.name, &source.script, Vec::new(), credential);
            let cancel = cancel.child_token();
            let handle = set.spawn(async move {
                workers
                    .run(&invocation, cancel)
                    .await
                    .and_then(|outcome| outcome.settle_exit())
            });
            positions.insert(handle.id(), position);
        }

        let mut failures: Vec<(usize, SourceFailure)> = Vec::new();
        while let Some(joined) = set.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result.map(|_| ()).map_err(Failure::Worker)),
                Err(e) => (e.id(), Err(Failure::Panicked(e.to_string()))),
            };
            let Some(&position) = positions.get(&id) else {
                continue;
            };
            let source = &self.sources[position];
            match result {
                Ok(()) => info!(source = %source.name, "Refresh source completed"),
                Err(failure) => {
                    let failure = failure.into_source_failure(&source.name);
                    warn!(source = %source.name, error = %failure.error, "Refresh source failed");
                    failures.push((position, failure));
                }
            }
        }

        info!(
            total,
            failed = failures.len(),
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Refresh finished"
        );

        if failures.is_empty() {
            Ok(RefreshSummary {
                sources: self.sources.iter().map(|s| s.name.clone()).collect(),
            })
        } else {
            failures.sort_by_key(|(position, _)| *position);
            Err(JoinError {
                failures: failures.into_iter().map(|(_, f)| f).collect(),
                total,
            })
        }
    }
}

enum Failure {
    Worker(WorkerError),
    Panicked(String),
}

impl Failure {
    fn into_source_failure(self, source: &str) -> SourceFailure {
        match self {
            Failure::Worker(e) => SourceFailure {
                source: source.to_string(),
                error: e.summary(),
                details: e.diagnostics().map(str::to_string),
            },
            Failure::Panicked(message) => SourceFailure {
                source: source.to_string(),
                error: format!("refresh task panicked: {message}"),
                details: None,
            },
        }
    }
}
