use crate::state::AppState;
use std::time::Duration as StdDuration;
use tokio::time::sleep;
use tracing::{error, info};

/// Force-refresh every registered repository once. Returns how many succeeded.
pub async fn refresh_all(state: &AppState) -> usize {
    let mut ok = 0;
    for repository in state.registry.repositories() {
        match state.reconciler.refresh(repository).await {
            Ok(()) => ok += 1,
            Err(e) => error!("Periodic refresh of {} failed: {}", repository, e),
        }
    }
    ok
}

/// Refresh on a fixed interval, or sooner when `refresh_notify` fires.
pub async fn start_monitor_loop(state: AppState, interval: StdDuration) {
    loop {
        let total = state.registry.repositories().len();
        info!("Starting refresh cycle for {} repositories", total);
        let ok = refresh_all(&state).await;
        info!(
            "Refresh cycle complete ({}/{} ok). Next refresh in {} seconds.",
            ok,
            total,
            interval.as_secs()
        );

        tokio::select! {
            _ = sleep(interval) => {}
            _ = state.refresh_notify.notified() => {
                info!("Received force refresh signal.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositoriesConfig;
    use crate::github::Upstream;
    use crate::github_types::{RawDeployment, RawJob, RawWorkflowRun};
    use crate::reconcile::Reconciler;
    use crate::registry::RepositoryRegistry;
    use crate::store::RecordStore;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Empty history for every repository except `broken/repo`, which errors.
    struct PartialUpstream;

    #[async_trait]
    impl Upstream for PartialUpstream {
        async fn list_runs(&self, repository: &str) -> Result<Vec<RawWorkflowRun>> {
            if repository == "broken/repo" {
                bail!("GitHub HTTP Error 500");
            }
            Ok(Vec::new())
        }

        async fn get_run(&self, _repository: &str, _run_id: u64) -> Result<Option<RawWorkflowRun>> {
            Ok(None)
        }

        async fn list_jobs(&self, _repository: &str, _run_id: u64) -> Result<Vec<RawJob>> {
            Ok(Vec::new())
        }

        async fn list_deployments(&self, _repository: &str, _environment: &str) -> Result<Vec<RawDeployment>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn one_failing_repository_does_not_stop_the_cycle() {
        let store = Arc::new(RecordStore::new());
        let registry = RepositoryRegistry::from_config(&RepositoriesConfig {
            available: vec!["broken/repo".to_string(), "good/repo".to_string()],
            default: "good/repo".to_string(),
        })
        .unwrap();
        let state = AppState {
            reconciler: Arc::new(Reconciler::new(
                store.clone(),
                Arc::new(PartialUpstream),
                "github-pages".to_string(),
                StdDuration::from_secs(60),
                10,
            )),
            registry: Arc::new(registry),
            refresh_notify: Arc::new(Notify::new()),
            periodic_refresh: false,
        };

        assert_eq!(refresh_all(&state).await, 1);
        let stats = store.get_stats("good/repo").unwrap();
        assert_eq!(stats.record.total_runs, 0);
        assert_eq!(store.list_activity("good/repo", 7).len(), 7);
        assert!(store.get_stats("broken/repo").is_none());
    }
}
