use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Waiting,
    Requested,
    Pending,
    ActionRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Neutral,
    Skipped,
    TimedOut,
    ActionRequired,
    Stale,
    StartupFailure,
}

/// One execution of a CI workflow, keyed by the upstream `run_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub run_id: u64,
    pub name: String,
    pub status: RunStatus,
    pub conclusion: Option<Conclusion>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub triggered_by: String,
    pub head_sha: String,
    pub run_number: u64,
    pub run_attempt: u32,
    pub duration_in_seconds: Option<i64>,
    pub repository: String,
}

/// A record as held by the store: the payload plus its store-assigned surrogate id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: u64,
    #[serde(flatten)]
    pub record: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStats {
    pub repository: String,
    pub total_runs: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_successful_run_id: Option<u64>,
    pub last_updated: DateTime<Utc>,
}

impl WorkflowStats {
    /// Integer percentage of successful runs, 0 when there are no runs.
    pub fn success_rate(&self) -> u32 {
        if self.total_runs == 0 {
            return 0;
        }
        (self.success_count as f64 / self.total_runs as f64 * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    #[serde(flatten)]
    pub stats: Stored<WorkflowStats>,
    pub success_rate: u32,
}

impl From<Stored<WorkflowStats>> for StatsView {
    fn from(stats: Stored<WorkflowStats>) -> Self {
        let success_rate = stats.record.success_rate();
        Self { stats, success_rate }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowActivity {
    pub repository: String,
    pub date: NaiveDate,
    pub run_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessfulDeployment {
    pub repository: String,
    pub date: NaiveDate,
    pub success_count: u32,
    pub failure_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentCreator {
    pub login: String,
    pub id: Option<u64>,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    pub is_active: bool,
    pub environment: String,
    pub last_deployed_at: Option<DateTime<Utc>>,
    pub creator: Option<DeploymentCreator>,
    pub url: String,
    pub deployment_source: String,
    pub last_successful_run_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Completed,
    InProgress,
    Failed,
}

impl StatusFilter {
    pub fn matches(&self, run: &WorkflowRun) -> bool {
        match self {
            Self::All => true,
            Self::Completed => run.status == RunStatus::Completed,
            Self::InProgress => run.status == RunStatus::InProgress,
            Self::Failed => run.conclusion == Some(Conclusion::Failure),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "completed" => Ok(Self::Completed),
            "in_progress" => Ok(Self::InProgress),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown status filter '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Recent,
    Duration,
}

impl SortOrder {
    pub fn apply(&self, runs: &mut [Stored<WorkflowRun>]) {
        match self {
            Self::Recent => runs.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at)),
            Self::Duration => runs.sort_by(|a, b| {
                let da = a.record.duration_in_seconds.unwrap_or(0);
                let db = b.record.duration_in_seconds.unwrap_or(0);
                db.cmp(&da)
            }),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recent" => Ok(Self::Recent),
            "duration" => Ok(Self::Duration),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunsPage {
    pub workflow_runs: Vec<Stored<WorkflowRun>>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDetail {
    pub name: String,
    pub status: RunStatus,
    pub conclusion: Option<Conclusion>,
    pub number: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub job_id: u64,
    pub job_name: String,
    pub status: RunStatus,
    pub conclusion: Option<Conclusion>,
    pub steps: Vec<StepDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedStep {
    pub job: String,
    pub step: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub repository: String,
    pub run_id: u64,
    pub summary: String,
    pub failed_steps: Vec<FailedStep>,
    pub is_test_run: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDetails {
    pub repository: String,
    pub run_id: u64,
    pub name: String,
    pub status: RunStatus,
    pub conclusion: Option<Conclusion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub jobs_count: usize,
    pub jobs: Vec<JobDetail>,
    pub failure_details: Option<FailureReport>,
    pub is_test_workflow: bool,
}
