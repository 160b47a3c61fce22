use crate::reconcile::Reconciler;
use crate::registry::RepositoryRegistry;
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<Reconciler>,
    pub registry: Arc<RepositoryRegistry>,
    pub refresh_notify: Arc<Notify>,
    /// Whether `start_monitor_loop` is running and listening on `refresh_notify`.
    pub periodic_refresh: bool,
}
