use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An open pull request as observed on GitHub during this run.
/// Built from the REST API response in pr/mod.rs; API shapes stop there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRecord {
    /// PR number, unique within its repository
    pub number: u64,
    /// Last time GitHub saw activity on the PR
    pub updated_at: DateTime<Utc>,
    /// Commit count (None when not fetched)
    pub commits: Option<u32>,
    /// Issue comment count (None when not fetched)
    pub comments: Option<u32>,
    /// Author's GitHub login
    pub author: String,
    /// PR title
    pub title: String,
    /// HTML URL for the browser
    pub url: String,
    /// Label names
    pub labels: Vec<String>,
}

impl PullRequestRecord {
    /// The minimal projection persisted between runs.
    pub fn snapshot(&self) -> PullRequestSnapshot {
        PullRequestSnapshot {
            number: self.number,
            updated_at: self.updated_at,
            commits: self.commits,
            comments: self.comments,
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// What the snapshot file remembers about a PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSnapshot {
    pub number: u64,
    pub updated_at: DateTime<Utc>,
    pub commits: Option<u32>,
    pub comments: Option<u32>,
}

/// A repository to poll, parsed from `owner/name` or a github.com URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoName {
    pub owner: String,
    pub name: String,
}

impl std::fmt::Display for RepoName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
