//! Shared state for the API layer.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::config::AppConfig;
use crate::uploads::UploadStore;

/// Shared context for all API routes: the database handle, runtime
/// configuration and the upload store. Cheap to clone.
///
/// SQLite serializes writers anyway, so a single mutex-guarded connection is
/// the whole concurrency story; handlers keep lock scopes tight and never
/// hold the guard across an await.
#[derive(Clone)]
pub struct ApiContext {
    db: Arc<Mutex<Connection>>,
    pub config: Arc<AppConfig>,
    pub uploads: Arc<UploadStore>,
}

impl ApiContext {
    pub fn new(conn: Connection, config: AppConfig, uploads: UploadStore) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
            uploads: Arc::new(uploads),
        }
    }

    /// Lock the database connection.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".into()))
    }
}
