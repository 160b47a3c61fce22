use crate::error::{DashboardError, DashboardResult};
use crate::monitor;
use crate::models::{
    DeploymentStatus, FailureReport, RunDetails, RunsPage, SortOrder, StatsView, StatusFilter,
    Stored, SuccessfulDeployment, WorkflowActivity,
};
use crate::reconcile::RunsQuery;
use crate::registry::RepositoryRegistry;
use crate::state::AppState;
use crate::aggregate::WINDOW_DAYS;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;

const MAX_PER_PAGE: usize = 100;
const MAX_DAYS: usize = 31;

#[derive(Deserialize, Clone, Debug, Default)]
pub struct RunsParams {
    repo: Option<String>,
    page: Option<String>,
    per_page: Option<String>,
    status: Option<String>,
    sort: Option<String>,
    refresh: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct RepoParams {
    repo: Option<String>,
    days: Option<String>,
    refresh: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunParams {
    repo: Option<String>,
    run_id: Option<String>,
    include_jobs: Option<String>,
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/api/workflow-runs", get(list_runs))
        .route("/api/workflow-runs/:run_id", delete(delete_run))
        .route("/api/workflow-stats", get(get_stats))
        .route("/api/workflow-activity", get(get_activity))
        .route("/api/deployment-status", get(get_deployment_status))
        .route("/api/successful-deployments", get(get_successful_deployments))
        .route("/api/workflow-details", get(get_run_details))
        .route("/api/workflow-failures", get(get_run_failures))
        .route("/api/repositories", get(list_repositories))
        .route("/api/refresh", post(trigger_refresh))
        .with_state(state)
}

fn flag(value: &Option<String>) -> bool {
    value.as_deref() == Some("true")
}

/// Parse a positive integer query parameter bounded by `max`.
fn bounded(name: &str, value: &Option<String>, default: usize, max: usize) -> DashboardResult<usize> {
    let Some(raw) = value.as_deref() else {
        return Ok(default);
    };
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 && n <= max => Ok(n),
        _ => Err(DashboardError::InvalidRequest(format!(
            "{} must be an integer between 1 and {}",
            name, max
        ))),
    }
}

fn run_id(value: &Option<String>) -> DashboardResult<Option<u64>> {
    match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| DashboardError::InvalidRequest(format!("invalid run id '{}'", raw))),
    }
}

fn runs_query(registry: &RepositoryRegistry, params: &RunsParams) -> DashboardResult<RunsQuery> {
    let status = match params.status.as_deref() {
        None | Some("") => StatusFilter::All,
        Some(s) => s.parse::<StatusFilter>().map_err(DashboardError::InvalidRequest)?,
    };
    let sort = match params.sort.as_deref() {
        None | Some("") => SortOrder::Recent,
        Some(s) => s.parse::<SortOrder>().map_err(DashboardError::InvalidRequest)?,
    };

    Ok(RunsQuery {
        repository: registry.resolve(params.repo.as_deref())?,
        page: bounded("page", &params.page, 1, usize::MAX / MAX_PER_PAGE)?,
        per_page: bounded("per_page", &params.per_page, 10, MAX_PER_PAGE)?,
        status,
        sort,
        force_refresh: flag(&params.refresh),
    })
}

async fn list_runs(
    State(state): State<AppState>,
    Query(params): Query<RunsParams>,
) -> DashboardResult<Json<RunsPage>> {
    let query = runs_query(&state.registry, &params)?;
    Ok(Json(state.reconciler.fetch_runs(&query).await?))
}

async fn delete_run(
    State(state): State<AppState>,
    Path(run_id): Path<u64>,
) -> DashboardResult<StatusCode> {
    if state.reconciler.store().delete_run(run_id) {
        tracing::info!("Deleted run {}", run_id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(DashboardError::NotFound(format!("run {}", run_id)))
    }
}

async fn get_stats(
    State(state): State<AppState>,
    Query(params): Query<RepoParams>,
) -> DashboardResult<Json<StatsView>> {
    let repository = state.registry.resolve(params.repo.as_deref())?;
    Ok(Json(state.reconciler.fetch_stats(&repository, flag(&params.refresh)).await?))
}

async fn get_activity(
    State(state): State<AppState>,
    Query(params): Query<RepoParams>,
) -> DashboardResult<Json<Vec<Stored<WorkflowActivity>>>> {
    let repository = state.registry.resolve(params.repo.as_deref())?;
    let days = bounded("days", &params.days, WINDOW_DAYS, MAX_DAYS)?;
    Ok(Json(
        state
            .reconciler
            .fetch_activity(&repository, days, flag(&params.refresh))
            .await?,
    ))
}

async fn get_deployment_status(
    State(state): State<AppState>,
    Query(params): Query<RepoParams>,
) -> DashboardResult<Json<DeploymentStatus>> {
    let repository = state.registry.resolve(params.repo.as_deref())?;
    Ok(Json(state.reconciler.deployment_status(&repository).await?))
}

async fn get_successful_deployments(
    State(state): State<AppState>,
    Query(params): Query<RepoParams>,
) -> DashboardResult<Json<Vec<SuccessfulDeployment>>> {
    let repository = state.registry.resolve(params.repo.as_deref())?;
    Ok(Json(state.reconciler.successful_deployments(&repository).await?))
}

async fn get_run_details(
    State(state): State<AppState>,
    Query(params): Query<RunParams>,
) -> DashboardResult<Json<RunDetails>> {
    let repository = state.registry.resolve(params.repo.as_deref())?;
    let run_id = run_id(&params.run_id)?;
    Ok(Json(
        state
            .reconciler
            .run_details(&repository, run_id, flag(&params.include_jobs))
            .await?,
    ))
}

async fn get_run_failures(
    State(state): State<AppState>,
    Query(params): Query<RunParams>,
) -> DashboardResult<Json<FailureReport>> {
    let repository = state.registry.resolve(params.repo.as_deref())?;
    let run_id = run_id(&params.run_id)?;
    Ok(Json(state.reconciler.run_failures(&repository, run_id).await?))
}

async fn list_repositories(State(state): State<AppState>) -> Json<RepositoryRegistry> {
    Json(state.registry.as_ref().clone())
}

async fn trigger_refresh(State(state): State<AppState>) -> (StatusCode, Json<JsonValue>) {
    if state.periodic_refresh {
        state.refresh_notify.notify_one();
    } else {
        // no monitor loop is waiting on the notify, so run the cycle here
        tokio::spawn(async move {
            let ok = monitor::refresh_all(&state).await;
            info!("Manual refresh complete ({}/{} ok)", ok, state.registry.repositories().len());
        });
    }
    (StatusCode::ACCEPTED, Json(json!({ "message": "refresh scheduled" })))
}
