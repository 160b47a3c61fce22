use crate::config::RepositoriesConfig;
use crate::error::{DashboardError, DashboardResult};
use anyhow::{bail, Result};
use regex::Regex;
use serde::Serialize;

const REPOSITORY_PATTERN: &str = r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$";

/// Fixed set of `owner/name` repositories the dashboard serves.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryRegistry {
    repositories: Vec<String>,
    default: String,
}

impl RepositoryRegistry {
    pub fn from_config(cfg: &RepositoriesConfig) -> Result<Self> {
        let re = Regex::new(REPOSITORY_PATTERN)?;
        for repo in &cfg.available {
            if !re.is_match(repo) {
                bail!("Invalid repository '{}': expected owner/name", repo);
            }
        }
        if !cfg.available.contains(&cfg.default) {
            bail!("Default repository '{}' is not in the available list", cfg.default);
        }

        Ok(Self {
            repositories: cfg.available.clone(),
            default: cfg.default.clone(),
        })
    }

    pub fn repositories(&self) -> &[String] {
        &self.repositories
    }

    /// The requested repository, or the default when none was given.
    pub fn resolve(&self, requested: Option<&str>) -> DashboardResult<String> {
        match requested.map(str::trim).filter(|r| !r.is_empty()) {
            None => Ok(self.default.clone()),
            Some(repo) if self.repositories.iter().any(|r| r == repo) => Ok(repo.to_string()),
            Some(repo) => Err(DashboardError::InvalidRequest(format!(
                "repository '{}' is not tracked",
                repo
            ))),
        }
    }
}
