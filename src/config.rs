use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub github: GithubConfig,
    pub poller: PollerConfig,
    pub repositories: RepositoriesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub user_agent: String,
    pub timeout_seconds: Option<u64>,
    pub per_page: Option<u32>,
    pub pages_environment: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollerConfig {
    /// 0 disables the periodic refresher.
    pub interval_seconds: u64,
    pub details_ttl_seconds: Option<u64>,
    pub details_capacity: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepositoriesConfig {
    pub available: Vec<String>,
    pub default: String,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        let s = ConfigLoader::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("github.api_url", "https://api.github.com")?
            .set_default("github.user_agent", "GitHub-Actions-Tracker")?
            .set_default("github.pages_environment", "github-pages")?
            .set_default("poller.interval_seconds", 0)?
            .set_default(
                "repositories.available",
                vec![
                    "Lucas-Song-Dev/Personal-Website",
                    "Lucas-Song-Dev/RedditPainpoint",
                ],
            )?
            .set_default("repositories.default", "Lucas-Song-Dev/RedditPainpoint")?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("DASHBOARD")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("repositories.available")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}
