use crate::aggregate::{self, local_today};
use crate::error::{DashboardError, DashboardResult};
use crate::github::Upstream;
use crate::models::{
    Conclusion, DeploymentStatus, FailedStep, FailureReport, JobDetail, RunDetails, RunStatus,
    RunsPage, Pagination, SortOrder, StatsView, Stored, StatusFilter, SuccessfulDeployment,
    WorkflowActivity, WorkflowRun,
};
use crate::store::RecordStore;
use chrono::Utc;
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RunsQuery {
    pub repository: String,
    pub page: usize,
    pub per_page: usize,
    pub status: StatusFilter,
    pub sort: SortOrder,
    pub force_refresh: bool,
}

/// Serializes refreshes of one repository. `generation` counts completed refreshes.
#[derive(Default)]
struct RefreshSlot {
    lock: Mutex<()>,
    generation: AtomicU64,
}

/// Decides per request whether to answer from the store or refresh it from upstream first.
pub struct Reconciler {
    store: Arc<RecordStore>,
    upstream: Arc<dyn Upstream>,
    pages_environment: String,
    slots: Mutex<HashMap<String, Arc<RefreshSlot>>>,
    // jobs of completed runs never change upstream
    jobs_cache: Cache<(String, u64), Arc<Vec<JobDetail>>>,
}

pub fn is_test_workflow(name: &str) -> bool {
    name.to_ascii_lowercase().contains("test")
}

impl Reconciler {
    pub fn new(
        store: Arc<RecordStore>,
        upstream: Arc<dyn Upstream>,
        pages_environment: String,
        jobs_ttl: Duration,
        jobs_capacity: u64,
    ) -> Self {
        Self {
            store,
            upstream,
            pages_environment,
            slots: Mutex::new(HashMap::new()),
            jobs_cache: Cache::builder()
                .time_to_live(jobs_ttl)
                .max_capacity(jobs_capacity)
                .build(),
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    async fn slot(&self, repository: &str) -> Arc<RefreshSlot> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(repository.to_string()).or_default())
    }

    /// Re-fetch the run list and rewrite runs, stats and activity for `repository`.
    ///
    /// At most one fetch per repository runs at a time. A caller that waited on a
    /// refresh which then succeeded returns without fetching again.
    pub async fn refresh(&self, repository: &str) -> DashboardResult<()> {
        let slot = self.slot(repository).await;
        let seen = slot.generation.load(Ordering::Acquire);
        let _guard = slot.lock.lock().await;
        if slot.generation.load(Ordering::Acquire) != seen {
            debug!("refresh of {} satisfied by a concurrent refresh", repository);
            return Ok(());
        }

        self.refresh_locked(repository).await?;
        slot.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }

    async fn refresh_locked(&self, repository: &str) -> DashboardResult<()> {
        // nothing is written until the whole list has been fetched and parsed
        let raw = self.upstream.list_runs(repository).await?;
        let runs: Vec<WorkflowRun> = raw.iter().map(|r| r.normalize(repository)).collect();

        for run in &runs {
            self.store.put_run(run.clone());
        }
        self.store
            .put_stats(aggregate::compute_stats(&runs, repository, Utc::now()));
        for bucket in aggregate::compute_activity(&runs, repository, local_today()) {
            self.store.put_activity(repository, bucket.date, bucket.run_count);
        }

        info!("Refreshed {}: {} runs", repository, runs.len());
        Ok(())
    }

    pub async fn fetch_runs(&self, query: &RunsQuery) -> DashboardResult<RunsPage> {
        let offset = (query.page.saturating_sub(1)) * query.per_page;

        // single runs stored by a details lookup don't count as a refreshed list
        let refreshed = self.store.get_stats(&query.repository).is_some();
        if query.force_refresh || !refreshed || self.store.count_runs(&query.repository) == 0 {
            debug!("runs cache miss for {}", query.repository);
            self.refresh(&query.repository).await?;
        }

        let mut runs = self.store.list_runs(&query.repository, query.per_page, offset);
        runs.retain(|r| query.status.matches(&r.record));
        query.sort.apply(&mut runs);

        let has_more = runs.len() == query.per_page;
        Ok(RunsPage {
            workflow_runs: runs,
            pagination: Pagination {
                page: query.page,
                per_page: query.per_page,
                has_more,
            },
        })
    }

    pub async fn fetch_stats(&self, repository: &str, force_refresh: bool) -> DashboardResult<StatsView> {
        if force_refresh || self.store.get_stats(repository).is_none() {
            debug!("stats cache miss for {}", repository);
            self.refresh(repository).await?;
        }

        self.store
            .get_stats(repository)
            .map(StatsView::from)
            .ok_or_else(|| DashboardError::NotFound(format!("no stats for {}", repository)))
    }

    pub async fn fetch_activity(
        &self,
        repository: &str,
        days: usize,
        force_refresh: bool,
    ) -> DashboardResult<Vec<Stored<WorkflowActivity>>> {
        let cached = self.store.list_activity(repository, days);
        let stale = cached.last().map_or(true, |a| a.record.date < local_today());
        if force_refresh || cached.len() < days || stale {
            debug!("activity cache miss for {} ({} days)", repository, days);
            self.refresh(repository).await?;
        }

        Ok(self.store.list_activity(repository, days))
    }

    /// Always asks upstream; deployment freshness matters more than call volume.
    pub async fn deployment_status(&self, repository: &str) -> DashboardResult<DeploymentStatus> {
        let deployments = self
            .upstream
            .list_deployments(repository, &self.pages_environment)
            .await?;
        let last_successful_run_id = self
            .store
            .get_stats(repository)
            .and_then(|s| s.record.last_successful_run_id);

        let (owner, name) = repository.split_once('/').unwrap_or((repository, ""));
        let latest = deployments.into_iter().next();

        Ok(DeploymentStatus {
            is_active: latest.is_some(),
            environment: latest
                .as_ref()
                .map(|d| d.environment.clone())
                .unwrap_or_else(|| self.pages_environment.clone()),
            last_deployed_at: latest.as_ref().map(|d| d.created_at),
            creator: latest.and_then(|d| d.creator),
            url: format!("https://{}.github.io/{}/", owner, name),
            deployment_source: "main branch".to_string(),
            last_successful_run_id,
        })
    }

    pub async fn successful_deployments(&self, repository: &str) -> DashboardResult<Vec<SuccessfulDeployment>> {
        let raw = self.upstream.list_runs(repository).await?;
        let runs: Vec<WorkflowRun> = raw.iter().map(|r| r.normalize(repository)).collect();
        Ok(aggregate::compute_deployments(&runs, repository, local_today()))
    }

    /// Upstream first, falling back to the store only when upstream has no such run.
    async fn lookup_run(&self, repository: &str, run_id: u64) -> DashboardResult<WorkflowRun> {
        if let Some(raw) = self.upstream.get_run(repository, run_id).await? {
            return Ok(self.store.put_run(raw.normalize(repository)).record);
        }
        self.store
            .get_run(run_id)
            .map(|s| s.record)
            .filter(|r| r.repository == repository)
            .ok_or_else(|| DashboardError::NotFound(format!("run {} in {}", run_id, repository)))
    }

    async fn jobs(&self, repository: &str, run: &WorkflowRun) -> DashboardResult<Arc<Vec<JobDetail>>> {
        let key = (repository.to_string(), run.run_id);
        if let Some(jobs) = self.jobs_cache.get(&key) {
            return Ok(jobs);
        }

        let raw = self.upstream.list_jobs(repository, run.run_id).await?;
        let jobs = Arc::new(raw.iter().map(|j| j.to_job_detail()).collect::<Vec<_>>());
        if run.status == RunStatus::Completed {
            self.jobs_cache.insert(key, jobs.clone()).await;
        }
        Ok(jobs)
    }

    pub async fn run_details(
        &self,
        repository: &str,
        run_id: Option<u64>,
        include_jobs: bool,
    ) -> DashboardResult<RunDetails> {
        let run_id = run_id.ok_or_else(|| DashboardError::InvalidRequest("Run ID is required".to_string()))?;
        let run = self.lookup_run(repository, run_id).await?;
        let is_test_workflow = is_test_workflow(&run.name);

        let jobs = if is_test_workflow || include_jobs {
            (*self.jobs(repository, &run).await?).clone()
        } else {
            Vec::new()
        };
        let failure_details = (is_test_workflow && run.conclusion == Some(Conclusion::Failure))
            .then(|| failure_report(repository, &run, &jobs));

        Ok(RunDetails {
            repository: repository.to_string(),
            run_id,
            name: run.name,
            status: run.status,
            conclusion: run.conclusion,
            created_at: run.created_at,
            updated_at: run.updated_at,
            jobs_count: jobs.len(),
            jobs,
            failure_details,
            is_test_workflow,
        })
    }

    pub async fn run_failures(&self, repository: &str, run_id: Option<u64>) -> DashboardResult<FailureReport> {
        let run_id = run_id.ok_or_else(|| DashboardError::InvalidRequest("Run ID is required".to_string()))?;
        let run = self.lookup_run(repository, run_id).await?;
        if run.conclusion != Some(Conclusion::Failure) {
            return Ok(failure_report(repository, &run, &[]));
        }
        let jobs = self.jobs(repository, &run).await?;
        Ok(failure_report(repository, &run, &jobs))
    }
}

/// Failing steps of a failed run, read from its jobs.
pub fn failure_report(repository: &str, run: &WorkflowRun, jobs: &[JobDetail]) -> FailureReport {
    let is_test_run = is_test_workflow(&run.name);
    let empty = |summary: &str| FailureReport {
        repository: repository.to_string(),
        run_id: run.run_id,
        summary: summary.to_string(),
        failed_steps: Vec::new(),
        is_test_run,
    };
    if run.conclusion != Some(Conclusion::Failure) {
        return empty("No failure details available");
    }

    let mut failed_steps = Vec::new();
    for job in jobs.iter().filter(|j| j.conclusion == Some(Conclusion::Failure)) {
        let failing: Vec<_> = job
            .steps
            .iter()
            .filter(|s| s.conclusion == Some(Conclusion::Failure))
            .collect();
        if failing.is_empty() {
            failed_steps.push(FailedStep {
                job: job.job_name.clone(),
                step: String::new(),
                message: format!("job '{}' failed without a failing step", job.job_name),
            });
        }
        for step in failing {
            failed_steps.push(FailedStep {
                job: job.job_name.clone(),
                step: step.name.clone(),
                message: format!("step {} '{}' failed", step.number, step.name),
            });
        }
    }

    if failed_steps.is_empty() {
        return empty("Run failed; no failing jobs reported");
    }
    let kind = if is_test_run { "test" } else { "workflow" };
    FailureReport {
        summary: format!("{} {} failure(s) detected", failed_steps.len(), kind),
        failed_steps,
        ..empty("")
    }
}
