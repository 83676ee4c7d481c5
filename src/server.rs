//! Gateway assembly and the HTTP server loop.

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cache::{spawn_sweeper, ResultCache};
use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::gate::AccessGate;
use crate::routes::{app_router, AppState, ErrorPages};
use crate::tunnel::{PrefixTunnel, Tunnel};
use crate::{engines, GatewayError, HttpFetcher, Result, SearchPipeline};

/// A fully wired gateway, ready to serve.
pub struct Gateway {
    config: GatewayConfig,
    pipeline: Arc<SearchPipeline>,
    gate: Arc<AccessGate>,
    tunnel: Arc<dyn Tunnel>,
    pages: Arc<ErrorPages>,
}

impl Gateway {
    /// Builds every component from configuration.
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        let engine = engines::by_shortcut(&config.engine)
            .ok_or_else(|| GatewayError::Other(format!("Unknown engine: {}", config.engine)))?;
        let fetcher = HttpFetcher::new(&config.user_agent, config.fetch_timeout())?;
        let cache = Arc::new(ResultCache::new(config.eviction_policy()));
        let pipeline = SearchPipeline::new(engine, Arc::new(fetcher), cache)
            .with_dedupe(config.dedupe_inflight);

        let mut tunnel = PrefixTunnel::new(config.tunnel.prefix.clone());
        if let Some(upstream) = &config.tunnel.upstream {
            tunnel = tunnel.with_upstream(upstream)?;
        }

        Ok(Self {
            gate: Arc::new(AccessGate::new(&config.auth)),
            pages: Arc::new(ErrorPages::load(&config.static_dir)),
            pipeline: Arc::new(pipeline),
            tunnel: Arc::new(tunnel),
            config,
        })
    }

    /// Replaces the tunnel collaborator.
    pub fn with_tunnel(mut self, tunnel: Arc<dyn Tunnel>) -> Self {
        self.tunnel = tunnel;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        self.pipeline.cache()
    }

    /// The complete router: tunnel dispatch in front of the application.
    pub fn router(&self) -> Router {
        let state = AppState {
            pipeline: Arc::clone(&self.pipeline),
            static_dir: self.config.static_dir.clone(),
            pages: Arc::clone(&self.pages),
        };
        let app = app_router(state, Arc::clone(&self.gate));
        Dispatcher::new(Arc::clone(&self.tunnel), app).into_router()
    }

    /// Binds the configured address and serves until Ctrl-C.
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr).await?;

        let sweeper = self
            .config
            .sweep_interval()
            .map(|every| spawn_sweeper(Arc::clone(self.cache()), every));

        info!(
            "Gateway listening on http://{} (engine: {}, static: {})",
            listener.local_addr()?,
            self.pipeline.engine().name(),
            self.config.static_dir.display()
        );
        info!("Tunnel reserved under {}", self.config.tunnel.prefix);
        if self.gate.is_enabled() {
            info!(
                "Credential challenge enabled for users: {}",
                self.gate.usernames().join(", ")
            );
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Some(handle) = sweeper {
            handle.abort();
        }
        info!("Gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
