pub mod diff;
pub mod types;

pub use types::{PullRequestRecord, PullRequestSnapshot, RepoName};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

use crate::config::GitHubConfig;

/// Page size used when listing pull requests (GitHub's maximum).
const PER_PAGE: usize = 100;

#[derive(Debug, Error)]
pub enum PrError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("Invalid repository name: {0}")]
    InvalidRepo(String),
}

/// Parse a repository identifier.
///
/// Accepts `owner/name` or `https://github.com/owner/name`.
/// Returns PrError::InvalidRepo for anything else.
pub fn parse_repo_name(input: &str) -> Result<RepoName, PrError> {
    let invalid = || PrError::InvalidRepo(input.to_string());

    let path = if input.contains("://") {
        let parsed = reqwest::Url::parse(input).map_err(|_| invalid())?;
        if parsed.host_str() != Some("github.com") {
            return Err(invalid());
        }
        parsed.path().to_string()
    } else {
        input.trim().to_string()
    };

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [owner, name] if !has_whitespace(owner) && !has_whitespace(name) => Ok(RepoName {
            owner: owner.to_string(),
            name: name.trim_end_matches(".git").to_string(),
        }),
        _ => Err(invalid()),
    }
}

fn has_whitespace(segment: &str) -> bool {
    segment.contains(char::is_whitespace)
}

/// Something that can list the open pull requests of a repository.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    async fn open_pull_requests(&self, repo: &RepoName) -> Result<Vec<PullRequestRecord>, PrError>;
}

/// Queries every configured repository and returns all open PRs,
/// ascending by `updated_at`.
pub struct Collector<S> {
    source: S,
    repos: Vec<RepoName>,
}

impl<S: PullRequestSource> Collector<S> {
    pub fn new(source: S, repos: Vec<RepoName>) -> Self {
        Self { source, repos }
    }

    /// Any failing repository aborts the whole fetch.
    #[instrument(skip(self), fields(repos = self.repos.len()))]
    pub async fn fetch(&self) -> Result<Vec<PullRequestRecord>, PrError> {
        let mut all = Vec::new();
        for repo in &self.repos {
            info!(repo = %repo, "checking repository");
            let prs = self.source.open_pull_requests(repo).await?;
            info!(repo = %repo, count = prs.len(), "fetched pull requests");
            all.extend(prs);
        }
        all.sort_by_key(|pr| pr.updated_at);
        for (number, count) in repeated_numbers(&all) {
            warn!(
                number,
                count,
                "PR number seen in several repositories, only one will be tracked"
            );
        }
        Ok(all)
    }
}

/// PR numbers occurring more than once, with their counts. Snapshots are
/// keyed by number alone, so repeats across repositories collide.
pub fn repeated_numbers(prs: &[PullRequestRecord]) -> Vec<(u64, usize)> {
    let mut counts = BTreeMap::new();
    for pr in prs {
        *counts.entry(pr.number).or_insert(0_usize) += 1;
    }
    counts.into_iter().filter(|&(_, count)| count > 1).collect()
}

#[derive(Deserialize)]
struct User {
    login: String,
}

#[derive(Deserialize)]
struct Label {
    name: String,
}

#[derive(Deserialize)]
struct PullSummary {
    number: u64,
    title: String,
    html_url: String,
    updated_at: DateTime<Utc>,
    user: Option<User>,
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Deserialize)]
struct PullDetail {
    commits: Option<u32>,
    comments: Option<u32>,
}

/// GitHub REST client for the pull request endpoints.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    fetch_counts: bool,
}

impl GitHubClient {
    /// An empty token means anonymous access.
    pub fn new(config: &GitHubConfig, token: String) -> Result<Self, PrError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("prs-notifier/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token,
            fetch_counts: config.fetch_counts,
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        }
    }

    async fn list_open(&self, repo: &RepoName) -> Result<Vec<PullSummary>, PrError> {
        let url = format!("{}/repos/{}/{}/pulls", self.api_url, repo.owner, repo.name);
        let mut pulls = Vec::new();
        for page in 1.. {
            let batch = self
                .get(&url)
                .query(&[
                    ("state", "open".to_string()),
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await?
                .error_for_status()?
                .json::<Vec<PullSummary>>()
                .await?;
            debug!(page, items = batch.len(), "received pull request page");
            let last = batch.len() < PER_PAGE;
            pulls.extend(batch);
            if last {
                break;
            }
        }
        Ok(pulls)
    }

    /// The list endpoint omits commit and comment counts; only the
    /// single-PR endpoint carries them.
    async fn counts(&self, repo: &RepoName, number: u64) -> Result<PullDetail, PrError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.api_url, repo.owner, repo.name, number
        );
        let detail = self
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<PullDetail>()
            .await?;
        Ok(detail)
    }
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn open_pull_requests(&self, repo: &RepoName) -> Result<Vec<PullRequestRecord>, PrError> {
        let summaries = self.list_open(repo).await?;
        let mut records = Vec::with_capacity(summaries.len());
        for pr in summaries {
            let (commits, comments) = if self.fetch_counts {
                let detail = self.counts(repo, pr.number).await?;
                (detail.commits, detail.comments)
            } else {
                (None, None)
            };
            records.push(PullRequestRecord {
                number: pr.number,
                updated_at: pr.updated_at,
                commits,
                comments,
                author: pr.user.map_or_else(|| "ghost".to_string(), |u| u.login),
                title: pr.title,
                url: pr.html_url,
                labels: pr.labels.into_iter().map(|l| l.name).collect(),
            });
        }
        Ok(records)
    }
}
