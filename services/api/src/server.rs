use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryCollaborator};
use crate::routes::{collaborator_router, with_service_routes};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use placement_pipeline::config::AppConfig;
use placement_pipeline::error::AppError;
use placement_pipeline::telemetry;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = with_service_routes(InMemoryCollaborator::seeded())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "placement collaborator stub ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Serves the collaborator routes on an ephemeral loopback port.
pub(crate) async fn spawn_ephemeral(
    collaborator: InMemoryCollaborator,
) -> Result<(SocketAddr, JoinHandle<()>), AppError> {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await?;
    let addr = listener.local_addr()?;
    let app = collaborator_router(collaborator);

    let task = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!(error = %err, "ephemeral collaborator stopped");
        }
    });
    Ok((addr, task))
}
