use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::ServeFlags;
use crate::core::autoschedule::AutoScheduler;
use crate::core::config::AppConfig;
use crate::core::lifecycle::LifecycleManager;
use crate::core::publish::{ChainTrigger, Publisher};
use crate::core::refresh::RefreshCoordinator;
use crate::core::store::DocumentStore;
use crate::core::terminal;
use crate::core::worker::{ProcessRunner, Workers};
use crate::interfaces::web::{ApiServer, ApiServerConfig};
use crate::logging;

pub async fn run(flags: ServeFlags) -> Result<()> {
    let mut config = AppConfig::load(flags.config.as_deref()).await?;
    flags.apply(&mut config);

    let (log_tx, _) = tokio::sync::broadcast::channel::<String>(logging::LOG_CHANNEL_CAPACITY);
    logging::init(config.max_log_level(), log_tx.clone());
    terminal::print_banner();

    let worker_dir = config.worker_dir();
    let store_dir = config.store_dir();
    if !worker_dir.is_dir() {
        warn!(
            "Worker directory {} does not exist; worker launches will fail. Run `postdeck doctor`.",
            worker_dir.display()
        );
    }

    let runner = Arc::new(ProcessRunner::new(
        config.workers.interpreter.clone(),
        config.worker_timeout(),
        config.workers.credential_env.clone(),
    ));
    let workers = Workers::new(runner, worker_dir.clone());
    let publisher = Publisher::new(workers.clone());
    let refresh = RefreshCoordinator::new(workers.clone(), config.refresh.sources.clone());
    let store = DocumentStore::new(store_dir.clone());

    let mut lifecycle = LifecycleManager::new().await?;

    match (&config.auto_scheduler.cron, &config.auto_scheduler.credential) {
        (Some(cron), Some(credential)) => {
            AutoScheduler::new(ChainTrigger::new(workers.clone()), credential.clone())
                .register(&lifecycle.scheduler, cron)
                .await?;
        }
        (Some(_), None) => warn!(
            "auto_scheduler.cron is set but no credential is configured (POSTDECK_ACCESS_TOKEN); periodic runs are disabled"
        ),
        (None, _) => info!("Periodic auto-scheduler disabled"),
    }

    let api = ApiServer::new(ApiServerConfig {
        publisher,
        refresh,
        store,
        log_tx,
        host: config.server.host.clone(),
        port: config.server.port,
        cors_origins: config.server.cors_origins.clone(),
    });
    lifecycle.attach(Arc::new(Mutex::new(api)));
    lifecycle.start().await?;

    terminal::print_link(
        "API",
        &format!("http://{}:{}", config.server.host, config.server.port),
    );
    terminal::print_status("Workers", &worker_dir.display().to_string());
    terminal::print_status("Data", &store_dir.display().to_string());
    terminal::print_status("Interpreter", &config.workers.interpreter);
    println!("\n  Press Ctrl+C to stop.\n");

    tokio::signal::ctrl_c().await?;
    lifecycle.shutdown().await?;
    terminal::print_success("postdeck stopped.");
    Ok(())
}
