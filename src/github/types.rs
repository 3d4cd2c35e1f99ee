use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the GitHub REST client. Upstream failures keep their HTTP
/// status so callers can pass it through to their own clients.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("No GITHUB_TOKEN configured")]
    MissingToken,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("GitHub API error: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("invalid base64 in contents response: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// One side of a pull request as the pulls API reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    pub label: String,
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub title: String,
    pub html_url: String,
    pub base: GitRef,
    pub head: GitRef,
}

/// Changed file from the compare API. Missing counters default to zero.
#[derive(Debug, Clone, Deserialize)]
pub struct CompareFile {
    pub filename: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

fn default_status() -> String {
    "modified".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentAuthor {
    pub login: String,
}

/// Review comment as returned by the pulls comments API.
#[derive(Debug, Clone, Deserialize)]
pub struct PullComment {
    pub id: u64,
    pub body: String,
    pub user: CommentAuthor,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub path: String,
}

/// Flattened comment shape served to review clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    pub body: String,
    pub user: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub html_url: String,
}

impl From<PullComment> for ReviewComment {
    fn from(c: PullComment) -> Self {
        Self {
            id: c.id,
            body: c.body,
            user: c.user.login,
            created_at: c.created_at,
            updated_at: c.updated_at,
            html_url: c.html_url,
        }
    }
}

/// One changed PNG in a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub path: String,
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
}

impl From<CompareFile> for ImageEntry {
    fn from(f: CompareFile) -> Self {
        Self {
            path: f.filename,
            status: f.status,
            additions: f.additions,
            deletions: f.deletions,
        }
    }
}

/// Everything a review client needs to start comparing a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageListing {
    pub pr_number: u64,
    pub images: Vec<ImageEntry>,
    pub base_ref: String,
    pub head_ref: String,
    pub base_label: String,
    pub head_label: String,
    pub pr_title: String,
    pub pr_url: String,
}

impl ImageListing {
    /// Fold PR metadata and the compare file list into a listing, keeping
    /// only PNG paths (extension matched case-insensitively).
    pub fn assemble(number: u64, pr: PullRequest, files: Vec<CompareFile>) -> Self {
        let images = files
            .into_iter()
            .filter(|f| f.filename.to_lowercase().ends_with(".png"))
            .map(ImageEntry::from)
            .collect();
        Self {
            pr_number: number,
            images,
            base_ref: pr.base.sha,
            head_ref: pr.head.sha,
            base_label: pr.base.label,
            head_label: pr.head.label,
            pr_title: pr.title,
            pr_url: pr.html_url,
        }
    }
}

/// Comment totals per file path. Comments without a path are skipped.
pub fn count_by_path(comments: &[PullComment]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for c in comments {
        if !c.path.is_empty() {
            *counts.entry(c.path.clone()).or_insert(0) += 1;
        }
    }
    counts
}
