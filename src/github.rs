use crate::config::GithubConfig;
use crate::github_types::{JobsResponse, RawDeployment, RawJob, RawWorkflowRun, RunsResponse};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

/// Read-only view of the CI provider.
///
/// Transport failures come back as `Err`; a missing single resource is `Ok(None)`.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn list_runs(&self, repository: &str) -> Result<Vec<RawWorkflowRun>>;
    async fn get_run(&self, repository: &str, run_id: u64) -> Result<Option<RawWorkflowRun>>;
    async fn list_jobs(&self, repository: &str, run_id: u64) -> Result<Vec<RawJob>>;
    async fn list_deployments(&self, repository: &str, environment: &str) -> Result<Vec<RawDeployment>>;
}

#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    per_page: u32,
}

impl GithubClient {
    pub fn new(cfg: &GithubConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_seconds.unwrap_or(30)))
            .user_agent(cfg.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: cfg.api_url.trim_end_matches('/').to_string(),
            token: cfg.token.clone().filter(|t| !t.is_empty()),
            per_page: cfg.per_page.unwrap_or(100).clamp(1, 100),
        })
    }

    /// GET `/repos/{repository}{endpoint}`. `None` on 404.
    async fn get_json<T: DeserializeOwned>(&self, repository: &str, endpoint: &str) -> Result<Option<T>> {
        let url = format!("{}/repos/{}{}", self.base_url, repository, endpoint);
        tracing::debug!("GET {}", url);

        let mut req = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("GitHub HTTP Error {} for {}: {}", status, endpoint, text);
        }

        let body = resp
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;
        let parsed = serde_json::from_slice(&body)
            .with_context(|| format!("Unexpected payload from {}", endpoint))?;
        Ok(Some(parsed))
    }

    async fn get_required<T: DeserializeOwned>(&self, repository: &str, endpoint: &str) -> Result<T> {
        match self.get_json(repository, endpoint).await? {
            Some(v) => Ok(v),
            None => bail!("GitHub returned 404 for {}{}", repository, endpoint),
        }
    }
}

#[async_trait]
impl Upstream for GithubClient {
    async fn list_runs(&self, repository: &str) -> Result<Vec<RawWorkflowRun>> {
        let endpoint = format!("/actions/runs?per_page={}", self.per_page);
        let body: RunsResponse = self.get_required(repository, &endpoint).await?;
        Ok(body.workflow_runs)
    }

    async fn get_run(&self, repository: &str, run_id: u64) -> Result<Option<RawWorkflowRun>> {
        self.get_json(repository, &format!("/actions/runs/{}", run_id)).await
    }

    async fn list_jobs(&self, repository: &str, run_id: u64) -> Result<Vec<RawJob>> {
        let endpoint = format!("/actions/runs/{}/jobs", run_id);
        let body: JobsResponse = self.get_required(repository, &endpoint).await?;
        Ok(body.jobs)
    }

    async fn list_deployments(&self, repository: &str, environment: &str) -> Result<Vec<RawDeployment>> {
        let endpoint = format!("/deployments?environment={}", environment);
        self.get_required(repository, &endpoint).await
    }
}
