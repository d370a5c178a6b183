use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::pr::{parse_repo_name, PrError, RepoName};

/// Config file looked up in the current directory when --config is not given.
pub const DEFAULT_CONFIG_FILE: &str = ".prs-notifier.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid repository in config: {0}")]
    Repo(#[from] PrError),
}

/// Top-level configuration.
///
/// Everything has a built-in default; the TOML file and the environment
/// only override.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub notify: NotifyConfig,
    pub webhook: WebhookConfig,
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// REST API base URL
    pub api_url: String,
    /// Fetch commit/comment counts (one extra request per PR)
    pub fetch_counts: bool,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.github.com".to_string(),
            fetch_counts: true,
        }
    }
}

/// What to poll and how the message looks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Repositories to poll, `owner/name`
    pub repos: Vec<String>,
    /// Logins of interest (reserved for author filtering, not applied)
    #[allow(dead_code)]
    pub users: Vec<String>,
    /// First line of every message
    pub title: String,
    pub new_header: String,
    pub updated_header: String,
    /// Extra sections listing every open PR carrying a label
    pub label_sections: Vec<LabelSection>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            repos: vec!["gh_user/repo".to_string()],
            users: vec!["gh_user".to_string()],
            title: "\u{1F916} Github Bobby:".to_string(),
            new_header: "\u{1F92F} New PRS:".to_string(),
            updated_header: "\u{1F4AA} updated PRS:".to_string(),
            label_sections: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelSection {
    pub label: String,
    pub header: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub url: String,
    /// Print the message to stdout instead of posting it
    pub test_mode: bool,
    /// Total delivery attempts, including the first
    pub attempts: u32,
    /// Fixed pause between attempts
    pub backoff_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: "https://hooks.slack.com/workflows/...".to_string(),
            test_mode: false,
            attempts: 5,
            backoff_secs: 5,
        }
    }
}

impl WebhookConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("prs.json"),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from .prs-notifier.toml in the
    /// current directory. A missing default file means built-in defaults;
    /// an explicitly requested file must exist.
    /// Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from(default_path)?
                } else {
                    Config::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply HOOK_URL, GITHUB_TOKEN and PRS_TEST.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("HOOK_URL").filter(|u| !u.trim().is_empty()) {
            self.webhook.url = url;
        }
        if self.github.token.is_none() {
            self.github.token = var("GITHUB_TOKEN");
        }
        if var("PRS_TEST").is_some_and(|v| is_truthy(&v)) {
            self.webhook.test_mode = true;
        }
    }

    /// Resolved token; empty means anonymous.
    pub fn github_token(&self) -> String {
        self.github.token.clone().unwrap_or_default()
    }

    pub fn repositories(&self) -> Result<Vec<RepoName>, ConfigError> {
        let repos = self
            .notify
            .repos
            .iter()
            .map(|r| parse_repo_name(r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(repos)
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && !["0", "false", "no", "off"]
            .iter()
            .any(|falsy| value.eq_ignore_ascii_case(falsy))
}
