mod error;
mod handlers;
mod router;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use std::convert::Infallible;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::lifecycle::LifecycleComponent;
use crate::core::publish::Publisher;
use crate::core::refresh::RefreshCoordinator;
use crate::core::store::DocumentStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) publisher: Publisher,
    pub(crate) refresh: RefreshCoordinator,
    pub(crate) store: DocumentStore,
    pub(crate) log_tx: broadcast::Sender<String>,
    pub(crate) cors_origins: Vec<String>,
}

pub struct ApiServerConfig {
    pub publisher: Publisher,
    pub refresh: RefreshCoordinator,
    pub store: DocumentStore,
    pub log_tx: broadcast::Sender<String>,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

pub struct ApiServer {
    state: AppState,
    host: String,
    port: u16,
    shutdown: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig) -> Self {
        Self {
            state: AppState {
                publisher: config.publisher,
                refresh: config.refresh,
                store: config.store,
                log_tx: config.log_tx,
                cors_origins: config.cors_origins,
            },
            host: config.host,
            port: config.port,
            shutdown: CancellationToken::new(),
        }
    }
}

// --- SSE logs and health (used by router) ---

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(line) => Ok(Event::default().data(line)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn health_endpoint() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[async_trait]
impl LifecycleComponent for ApiServer {
    fn name(&self) -> &'static str {
        "api-server"
    }

    async fn on_init(&mut self) -> Result<()> {
        info!("API server initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding API server to {addr}"))?;
        let app = router::build_api_router(self.state.clone());
        let shutdown = self.shutdown.clone();

        info!("API server running at http://{addr}");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
            {
                tracing::error!("API server crashed: {}", e);
            }
        });
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API server shutting down...");
        self.shutdown.cancel();
        Ok(())
    }
}
