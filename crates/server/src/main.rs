//! careline server entry point

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use careline_agent::{ChatEngine, EngineComponents};
use careline_config::{load_settings, Settings};
use careline_llm::LlmFactory;
use careline_persistence::{PersistenceLayer, ScyllaConfig};
use careline_server::{create_router, init_metrics, AppState, WhatsAppMessenger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env} > config/default > defaults
    let env = std::env::var("CARELINE_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => {
            // Tracing is not initialized yet
            eprintln!(
                "Loaded configuration from files (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        }
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&config);
    config.validate().context("invalid configuration")?;

    tracing::info!("Starting careline v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        config_path = env.as_deref().unwrap_or("default"),
        "Configuration loaded"
    );

    let stores = init_persistence(&config).await;

    let llm = LlmFactory::from_settings(&config.llm, Duration::from_secs(config.timeouts.llm_secs))
        .context("failed to create LLM backend")?;
    tracing::info!(provider = ?config.llm.provider, model = %config.llm.model, "LLM backend ready");

    let whatsapp = Arc::new(
        WhatsAppMessenger::new(
            &config.whatsapp,
            Duration::from_secs(config.timeouts.outbound_secs),
        )
        .context("failed to create WhatsApp client")?,
    );

    let components = EngineComponents::new(&config, stores, llm, whatsapp.clone());
    let engine = ChatEngine::new(&config, components).context("failed to build chat engine")?;

    let mut state = AppState::new(config.clone(), engine, whatsapp);
    if config.observability.metrics_enabled {
        if let Some(handle) = init_metrics() {
            tracing::info!("Prometheus metrics at /metrics");
            state = state.with_metrics(handle);
        }
    }

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// ScyllaDB when enabled and reachable, in-memory otherwise
async fn init_persistence(config: &Settings) -> PersistenceLayer {
    if !config.persistence.enabled {
        tracing::info!("Persistence disabled, using in-memory stores");
        return PersistenceLayer::in_memory();
    }

    let scylla_config = ScyllaConfig {
        hosts: config.persistence.hosts.clone(),
        keyspace: config.persistence.keyspace.clone(),
        replication_factor: config.persistence.replication_factor,
    };

    match careline_persistence::init(scylla_config).await {
        Ok(layer) => {
            tracing::info!(
                hosts = ?config.persistence.hosts,
                keyspace = %config.persistence.keyspace,
                "ScyllaDB persistence initialized"
            );
            layer
        }
        Err(e) => {
            tracing::error!("Failed to initialize ScyllaDB: {}. Falling back to in-memory.", e);
            PersistenceLayer::in_memory()
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("careline={},tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
