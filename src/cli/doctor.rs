use anyhow::Result;
use std::path::Path;

use crate::core::config::AppConfig;
use crate::core::terminal::{print_error, print_status, print_success, print_warn};
use crate::core::worker::WorkerId;

/// Checks everything a worker launch depends on. Returns `true` when no
/// blocking problem was found.
pub async fn run(config_path: Option<&Path>) -> Result<bool> {
    let config = AppConfig::load(config_path).await?;
    let mut healthy = true;

    let interpreter = &config.workers.interpreter;
    match std::process::Command::new(interpreter)
        .args(["-c", ""])
        .output()
    {
        Ok(out) if out.status.success() => {
            print_success(&format!("Interpreter is available: {interpreter}"));
        }
        _ => {
            print_error(&format!("Interpreter not runnable: {interpreter}"));
            healthy = false;
        }
    }

    let worker_dir = config.worker_dir();
    if !worker_dir.is_dir() {
        print_error(&format!(
            "Worker directory does not exist: {}",
            worker_dir.display()
        ));
        return Ok(false);
    }
    print_status("Workers", &worker_dir.display().to_string());

    let scripts = WorkerId::ALL
        .iter()
        .map(|w| w.script())
        .chain(config.refresh.sources.iter().map(|s| s.script.clone()));
    let missing: Vec<String> = scripts
        .filter(|script| !worker_dir.join(script).is_file())
        .collect();
    if missing.is_empty() {
        print_success("All worker scripts are present.");
    } else {
        for script in &missing {
            print_error(&format!("Missing worker script: {script}"));
        }
        healthy = false;
    }

    let store_dir = config.store_dir();
    if store_dir.is_dir() {
        print_status("Data", &store_dir.display().to_string());
    } else {
        print_warn(&format!(
            "Data directory {} does not exist yet; /data requests will return 404.",
            store_dir.display()
        ));
    }

    match (&config.auto_scheduler.cron, &config.auto_scheduler.credential) {
        (Some(cron), Some(_)) => print_status("Auto-scheduler", cron),
        (Some(_), None) => {
            print_warn("auto_scheduler.cron is set but no credential is configured.")
        }
        (None, _) => print_status("Auto-scheduler", "disabled"),
    }

    if healthy {
        print_success("postdeck is ready to serve.");
    }
    Ok(healthy)
}
