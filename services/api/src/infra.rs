use admissions::admissions::{AdmissionsService, SpreadsheetExporter, SqliteAdmissionsStore};
use admissions::config::StorageConfig;
use admissions::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type AdminService = AdmissionsService<SqliteAdmissionsStore>;

/// Open the configured database and wire the service around it.
///
/// The returned store handle is the one to close at shutdown, once the service is dropped.
pub(crate) fn open_service(
    storage: &StorageConfig,
) -> Result<(SqliteAdmissionsStore, Arc<AdminService>), AppError> {
    let store = SqliteAdmissionsStore::open(&storage.database_path)?;
    info!(
        database = %storage.database_path.display(),
        exports = %storage.export_dir.display(),
        "admissions store opened"
    );
    let service = AdmissionsService::new(
        Arc::new(store.clone()),
        SpreadsheetExporter::new(storage.export_dir.clone()),
    );
    Ok((store, Arc::new(service)))
}

pub(crate) fn close_store(store: SqliteAdmissionsStore) {
    match store.close() {
        Ok(()) => info!("admissions store closed"),
        Err(err) => warn!(error = %err, "admissions store did not close cleanly"),
    }
}
