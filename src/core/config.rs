use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::platform::{NativePlatform, Platform};

pub const DEFAULT_CONFIG_FILE: &str = "postdeck.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub workers: WorkersConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub auto_scheduler: AutoSchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Dashboard origins allowed by CORS.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkersConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Directory holding the worker scripts; also their working directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Environment variable the credential is exported under for each child.
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoreConfig {
    /// Defaults to the worker directory, where workers write their documents.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_sources")]
    pub sources: Vec<RefreshSourceConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RefreshSourceConfig {
    pub name: String,
    pub script: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AutoSchedulerConfig {
    /// Six-field cron expression (with seconds). Unset disables the periodic pass.
    #[serde(default)]
    pub cron: Option<String>,

    #[serde(default)]
    pub credential: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3001
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
        "http://localhost:3000".to_string(),
    ]
}
fn default_interpreter() -> String {
    NativePlatform::default_interpreter().to_string()
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_credential_env() -> String {
    "INSTAGRAM_ACCESS_TOKEN".to_string()
}
fn default_refresh_sources() -> Vec<RefreshSourceConfig> {
    [
        ("demographics", "track_demographics.py"),
        ("insights", "save_follower_insights.py"),
        ("details", "save_instagram_details.py"),
    ]
    .into_iter()
    .map(|(name, script)| RefreshSourceConfig {
        name: name.to_string(),
        script: script.to_string(),
    })
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerConfig::default(),
            workers: WorkersConfig::default(),
            store: StoreConfig::default(),
            refresh: RefreshConfig::default(),
            auto_scheduler: AutoSchedulerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            dir: None,
            timeout_secs: default_timeout_secs(),
            credential_env: default_credential_env(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            sources: default_refresh_sources(),
        }
    }
}

impl AppConfig {
    /// Loads the config from `path`, or `./postdeck.toml` when none is given.
    /// A missing file yields the defaults; environment overrides apply either way.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| format!("reading {}", config_path.display()))?;
            let parsed: AppConfig = toml::from_str(&content)
                .with_context(|| format!("parsing {}", config_path.display()))?;
            info!("Loaded config from {}", config_path.display());
            parsed
        } else {
            if path.is_some() {
                anyhow::bail!("config file not found: {}", config_path.display());
            }
            info!("No {} found, using defaults.", DEFAULT_CONFIG_FILE);
            AppConfig::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("POSTDECK_HOST").filter(|h| !h.trim().is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = lookup("POSTDECK_PORT").and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Some(dir) = lookup("POSTDECK_WORKER_DIR").filter(|d| !d.trim().is_empty()) {
            self.workers.dir = Some(PathBuf::from(dir));
        }
        if let Some(token) = lookup("POSTDECK_ACCESS_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.auto_scheduler.credential = Some(token);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.workers.timeout_secs == 0 {
            anyhow::bail!("workers.timeout_secs must be greater than zero");
        }
        if self.workers.interpreter.trim().is_empty() {
            anyhow::bail!("workers.interpreter must not be empty");
        }
        let mut seen = std::collections::HashSet::new();
        for source in &self.refresh.sources {
            if source.name.trim().is_empty() || source.script.trim().is_empty() {
                anyhow::bail!("refresh sources need both a name and a script");
            }
            if !seen.insert(source.name.as_str()) {
                anyhow::bail!("duplicate refresh source: {}", source.name);
            }
        }
        Ok(())
    }

    pub fn worker_dir(&self) -> PathBuf {
        self.workers
            .dir
            .clone()
            .unwrap_or_else(|| NativePlatform::data_dir().join("workers"))
    }

    pub fn store_dir(&self) -> PathBuf {
        self.store.dir.clone().unwrap_or_else(|| self.worker_dir())
    }

    pub fn worker_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.workers.timeout_secs)
    }

    pub fn max_log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}
