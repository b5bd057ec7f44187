use std::sync::Arc;
use std::time::Duration;

use tripflow_core::config::UploadConfig;
use tripflow_core::notifications::Notifier;
use tripflow_core::submissions::SubmissionGuard;
use tripflow_db::repositories::{
    RequestRepository, SqlRequestRepository, SqlUserRepository, SqlVisaDocumentRepository,
    UserRepository, VisaDocumentRepository,
};
use tripflow_db::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub requests: Arc<dyn RequestRepository>,
    pub users: Arc<dyn UserRepository>,
    pub documents: Arc<dyn VisaDocumentRepository>,
    pub notifier: Arc<dyn Notifier>,
    pub submissions: Arc<SubmissionGuard>,
    pub uploads: Arc<UploadConfig>,
}

impl AppState {
    pub fn new(
        db_pool: DbPool,
        notifier: Arc<dyn Notifier>,
        uploads: UploadConfig,
        dedup_window: Duration,
    ) -> Self {
        Self {
            requests: Arc::new(SqlRequestRepository::new(db_pool.clone())),
            users: Arc::new(SqlUserRepository::new(db_pool.clone())),
            documents: Arc::new(SqlVisaDocumentRepository::new(db_pool.clone())),
            db_pool,
            notifier,
            submissions: Arc::new(SubmissionGuard::new(dedup_window)),
            uploads: Arc::new(uploads),
        }
    }
}
