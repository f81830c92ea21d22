//! LessonGrader - Application Entry Point
//!
//! This is the main entry point for the grading server.

use std::net::SocketAddr;
use std::sync::Arc;

use bollard::Docker;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lessongrader::{
    config::{BackendKind, Config, ServerConfig},
    handlers,
    sandbox::{ContainerManager, DockerRuntime, ExecutionBackend, SubprocessManager},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.rust_log.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(backend = %config.grader.backend, "Starting LessonGrader server...");

    let backend: Arc<dyn ExecutionBackend> = match config.grader.backend {
        BackendKind::Docker => {
            tracing::info!("Connecting to Docker...");
            let docker = match &config.docker.socket_path {
                Some(path) => Docker::connect_with_socket(path, 120, bollard::API_DEFAULT_VERSION)?,
                None => Docker::connect_with_socket_defaults()?,
            };

            // Verify Docker connection
            let docker_info = docker.version().await?;
            tracing::info!(
                "Connected to Docker version: {}",
                docker_info.version.unwrap_or_default()
            );

            Arc::new(ContainerManager::new(
                DockerRuntime::new(docker),
                config.grader.clone(),
                config.docker.clone(),
            ))
        }
        BackendKind::Subprocess => Arc::new(SubprocessManager::new(
            config.local.clone(),
            config.grader.clone(),
        )),
    };

    tracing::info!(backend = backend.name(), "Provisioning execution backend...");
    let served = match backend.startup().await {
        Ok(()) => serve(&config.server, Arc::clone(&backend)).await,
        Err(e) => Err(e.into()),
    };

    tracing::info!("Shutting down execution backend...");
    if let Err(e) = backend.shutdown().await {
        tracing::error!(error = %e, "Backend shutdown failed");
    }

    served
}

/// Serve the API until a shutdown signal arrives
async fn serve(server: &ServerConfig, backend: Arc<dyn ExecutionBackend>) -> anyhow::Result<()> {
    let app = handlers::app(AppState::new(backend));

    // Start the server
    let addr = SocketAddr::new(server.host.parse()?, server.port);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
