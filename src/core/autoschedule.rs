//! Periodic auto-scheduler pass, independent of any dashboard request.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::publish::ChainTrigger;

#[derive(Clone)]
pub struct AutoScheduler {
    chain: ChainTrigger,
    credential: String,
    running: Arc<Mutex<()>>,
}

impl AutoScheduler {
    pub fn new(chain: ChainTrigger, credential: String) -> Self {
        Self {
            chain,
            credential,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// One pass. Skipped when the previous pass is still running.
    pub async fn run_once(&self) -> bool {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Previous auto-scheduler pass still running, skipping");
            return false;
        };
        match self
            .chain
            .after_schedule(&self.credential, CancellationToken::new())
            .await
        {
            Ok(()) => {
                info!("Auto-scheduler pass completed");
                true
            }
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    pub async fn register(&self, scheduler: &JobScheduler, cron: &str) -> Result<()> {
        let this = self.clone();
        let job = Job::new_async(cron, move |_uuid, _lock| {
            let this = this.clone();
            Box::pin(async move {
                this.run_once().await;
            })
        })
        .with_context(|| format!("invalid auto_scheduler cron expression: {cron}"))?;
        scheduler
            .add(job)
            .await
            .context("registering auto-scheduler job")?;
        info!(cron, "Auto-scheduler registered");
        Ok(())
    }
}
