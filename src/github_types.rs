use crate::models::{
    Conclusion, DeploymentCreator, JobDetail, RunStatus, StepDetail, WorkflowRun,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Body of `GET /repos/{repo}/actions/runs`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunsResponse {
    pub workflow_runs: Vec<RawWorkflowRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkflowRun {
    pub id: u64,
    pub name: Option<String>,
    pub workflow_name: Option<String>,
    pub status: RunStatus,
    pub conclusion: Option<Conclusion>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub event: Option<String>,
    pub head_branch: Option<String>,
    pub head_sha: String,
    pub run_number: u64,
    pub run_attempt: Option<u32>,
}

impl RawWorkflowRun {
    pub fn normalize(&self, repository: &str) -> WorkflowRun {
        let mut triggered_by = self.event.as_deref().unwrap_or("unknown").to_string();
        if let Some(branch) = self.head_branch.as_deref().filter(|b| !b.is_empty()) {
            triggered_by.push_str(" to ");
            triggered_by.push_str(branch);
        }

        // duration only makes sense once the run is done
        let duration_in_seconds = match (self.status, self.updated_at) {
            (RunStatus::Completed, Some(updated)) => {
                Some((updated - self.created_at).num_milliseconds().div_euclid(1000))
            }
            _ => None,
        };

        let name = self
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| self.workflow_name.clone().filter(|n| !n.is_empty()))
            .unwrap_or_else(|| "Workflow".to_string());

        WorkflowRun {
            run_id: self.id,
            name,
            status: self.status,
            conclusion: self.conclusion,
            html_url: self.html_url.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at.unwrap_or(self.created_at),
            triggered_by,
            head_sha: self.head_sha.clone(),
            run_number: self.run_number,
            run_attempt: self.run_attempt.unwrap_or(1),
            duration_in_seconds,
            repository: repository.to_string(),
        }
    }
}

/// Body of `GET /repos/{repo}/actions/runs/{id}/jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsResponse {
    pub jobs: Vec<RawJob>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawJob {
    pub id: u64,
    pub name: String,
    pub status: RunStatus,
    pub conclusion: Option<Conclusion>,
    #[serde(default)]
    pub steps: Vec<RawStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStep {
    pub name: String,
    pub status: RunStatus,
    pub conclusion: Option<Conclusion>,
    pub number: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RawJob {
    pub fn to_job_detail(&self) -> JobDetail {
        let steps = self
            .steps
            .iter()
            .map(|s| {
                let duration = match (s.started_at, s.completed_at) {
                    (Some(start), Some(end)) => {
                        Some(((end - start).num_milliseconds() as f64 / 1000.0).round() as i64)
                    }
                    _ => None,
                };
                StepDetail {
                    name: s.name.clone(),
                    status: s.status,
                    conclusion: s.conclusion,
                    number: s.number,
                    started_at: s.started_at,
                    completed_at: s.completed_at,
                    duration,
                }
            })
            .collect();

        JobDetail {
            job_id: self.id,
            job_name: self.name.clone(),
            status: self.status,
            conclusion: self.conclusion,
            steps,
        }
    }
}

/// One entry of `GET /repos/{repo}/deployments`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDeployment {
    pub environment: String,
    pub created_at: DateTime<Utc>,
    pub creator: Option<DeploymentCreator>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawWorkflowRun {
        serde_json::from_value(value).unwrap()
    }

    fn base() -> serde_json::Value {
        json!({
            "id": 42,
            "name": "CI",
            "workflow_name": "Build",
            "status": "completed",
            "conclusion": "success",
            "html_url": "https://github.com/A/B/actions/runs/42",
            "created_at": "2026-10-01T10:00:00Z",
            "updated_at": "2026-10-01T11:00:00Z",
            "event": "push",
            "head_branch": "main",
            "head_sha": "deadbeef",
            "run_number": 7,
            "run_attempt": 1
        })
    }

    #[test]
    fn normalizes_completed_run() {
        let run = raw(base()).normalize("A/B");
        assert_eq!(run.run_id, 42);
        assert_eq!(run.name, "CI");
        assert_eq!(run.triggered_by, "push to main");
        assert_eq!(run.duration_in_seconds, Some(3600));
        assert_eq!(run.conclusion, Some(Conclusion::Success));
        assert_eq!(run.repository, "A/B");
    }

    #[test]
    fn duration_absent_until_completed() {
        let mut v = base();
        v["status"] = json!("in_progress");
        v["conclusion"] = json!(null);
        let run = raw(v).normalize("A/B");
        assert_eq!(run.duration_in_seconds, None);
        assert_eq!(run.conclusion, None);
    }

    #[test]
    fn duration_floors_partial_seconds() {
        let mut v = base();
        v["updated_at"] = json!("2026-10-01T10:00:01.900Z");
        assert_eq!(raw(v).normalize("A/B").duration_in_seconds, Some(1));
    }

    #[test]
    fn falls_back_on_missing_name_and_event() {
        let mut v = base();
        v["name"] = json!(null);
        v["event"] = json!(null);
        v["head_branch"] = json!(null);
        let run = raw(v.clone()).normalize("A/B");
        assert_eq!(run.name, "Build");
        assert_eq!(run.triggered_by, "unknown");

        v["workflow_name"] = json!(null);
        assert_eq!(raw(v).normalize("A/B").name, "Workflow");
    }

    #[test]
    fn rejects_unexpected_shapes() {
        let mut v = base();
        v["status"] = json!("exploded");
        assert!(serde_json::from_value::<RawWorkflowRun>(v).is_err());

        let mut v = base();
        v.as_object_mut().unwrap().remove("created_at");
        assert!(serde_json::from_value::<RawWorkflowRun>(v).is_err());
    }

    #[test]
    fn step_duration_is_rounded_seconds() {
        let job: RawJob = serde_json::from_value(json!({
            "id": 1,
            "name": "pytest",
            "status": "completed",
            "conclusion": "failure",
            "steps": [
                {
                    "name": "Run tests",
                    "status": "completed",
                    "conclusion": "failure",
                    "number": 3,
                    "started_at": "2026-10-01T10:00:00Z",
                    "completed_at": "2026-10-01T10:00:02.600Z"
                },
                {
                    "name": "Post",
                    "status": "queued",
                    "conclusion": null,
                    "number": 4,
                    "started_at": null,
                    "completed_at": null
                }
            ]
        }))
        .unwrap();
        let detail = job.to_job_detail();
        assert_eq!(detail.steps[0].duration, Some(3));
        assert_eq!(detail.steps[1].duration, None);
    }
}
