use job_portal::error::AppError;
use job_portal::portal::{PortalRepository, PortalService, PortalSettings, SqlitePortalRepository};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn portal_service<R>(repository: R, settings: PortalSettings) -> Arc<PortalService<R>>
where
    R: PortalRepository + 'static,
{
    Arc::new(PortalService::new(Arc::new(repository), settings))
}

/// Open the database file, creating its tables when missing.
pub(crate) fn init_database(path: &Path) -> Result<(), AppError> {
    let repository = SqlitePortalRepository::open(path)?;
    repository.init()?;
    println!("Database ready at {}", path.display());
    Ok(())
}
