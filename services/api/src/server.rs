use crate::cli::ServeArgs;
use crate::infra::{portal_service, AppState};
use crate::routes::with_portal_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use job_portal::config::AppConfig;
use job_portal::error::AppError;
use job_portal::portal::{InMemoryPortalRepository, PortalRepository, SqlitePortalRepository};
use job_portal::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(database) = args.database.take() {
        config.storage.database_path = Some(database);
    }

    telemetry::init(&config.telemetry)?;

    match config.storage.database_path.clone() {
        Some(path) => {
            let repository = SqlitePortalRepository::open(&path)?;
            info!(path = %path.display(), "using sqlite store");
            serve(config, repository).await
        }
        None => {
            info!("using in-memory store");
            serve(config, InMemoryPortalRepository::new()).await
        }
    }
}

async fn serve<R>(config: AppConfig, repository: R) -> Result<(), AppError>
where
    R: PortalRepository + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = portal_service(repository, config.portal);
    let app = with_portal_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        default_role = %config.portal.default_role,
        "job portal ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
