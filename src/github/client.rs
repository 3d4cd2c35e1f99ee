use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use reqwest::header;
use serde::Deserialize;
use tracing::{info, warn};

use super::types::{CompareFile, GitHubError, PullComment, PullRequest};

/// Production API root. Tests point clients at a local stub instead.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

const API_TIMEOUT: Duration = Duration::from_secs(30); // PR metadata and image fetches
const COMMENT_TIMEOUT: Duration = Duration::from_secs(15); // comment listing and creation
const USER_AGENT: &str = concat!("visual-review/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct CompareResponse {
    #[serde(default)]
    files: Vec<CompareFile>,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// Thin async client for the handful of GitHub REST v3 endpoints the
/// review flow needs. Every call requires a token; GitHub rejects
/// anonymous API traffic too aggressively for review use.
pub struct GitHubClient {
    http: reqwest::Client,
    token: Option<String>,
    api_base: String,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self, GitHubError> {
        Self::with_api_base(token, GITHUB_API_BASE)
    }

    pub fn with_api_base(
        token: Option<String>,
        api_base: impl Into<String>,
    ) -> Result<Self, GitHubError> {
        let token = token.filter(|t| !t.is_empty());
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(API_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            token,
            api_base: api_base.into(),
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, GitHubError> {
        self.decorate(self.http.get(url))
    }

    fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, GitHubError> {
        self.decorate(self.http.post(url))
    }

    fn decorate(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, GitHubError> {
        let token = self.token.as_deref().ok_or(GitHubError::MissingToken)?;
        Ok(builder
            .header(header::AUTHORIZATION, format!("token {token}"))
            .header(header::ACCEPT, "application/vnd.github.v3+json"))
    }

    /// Pull request metadata: title, URL, and both refs with their shas.
    pub async fn pull_request(&self, repo: &str, number: u64) -> Result<PullRequest, GitHubError> {
        let url = format!("{}/repos/{}/pulls/{}", self.api_base, repo, number);
        let resp = self.get(&url)?.send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            return Err(GitHubError::Status(status));
        }
        Ok(resp.json().await?)
    }

    /// Changed files between two commits via the compare API.
    pub async fn compare_files(
        &self,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<Vec<CompareFile>, GitHubError> {
        let url = format!("{}/repos/{}/compare/{}...{}", self.api_base, repo, base, head);
        let resp = self.get(&url)?.send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            return Err(GitHubError::Status(status));
        }
        let compared: CompareResponse = resp.json().await?;
        Ok(compared.files)
    }

    /// Raw bytes of a file at a ref, or `None` when GitHub has nothing
    /// retrievable. Small files arrive inline from the contents API;
    /// larger ones go through the blob API, and the download URL is the
    /// last resort.
    pub async fn image_bytes(
        &self,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<Option<Bytes>, GitHubError> {
        let url = format!("{}/repos/{}/contents/{}", self.api_base, repo, path);
        let resp = self.get(&url)?.query(&[("ref", git_ref)]).send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            warn!("GitHub contents API returned {} for {}", status, path);
            return Err(GitHubError::Status(status));
        }
        let data: ContentsResponse = resp.json().await?;

        if data.encoding.as_deref() == Some("base64") {
            if let Some(content) = &data.content {
                return Ok(Some(decode_content(content)?));
            }
        }

        if let Some(sha) = &data.sha {
            let blob_url = format!("{}/repos/{}/git/blobs/{}", self.api_base, repo, sha);
            let blob_resp = self.get(&blob_url)?.send().await?;
            if blob_resp.status().as_u16() == 200 {
                let blob: BlobResponse = blob_resp.json().await?;
                if blob.encoding.as_deref() == Some("base64") {
                    if let Some(content) = &blob.content {
                        return Ok(Some(decode_content(content)?));
                    }
                }
            }
        }

        if let Some(download_url) = &data.download_url {
            info!(
                "falling back to download_url for {} (size {:?})",
                path, data.size
            );
            let img_resp = self.http.get(download_url).send().await?;
            if img_resp.status().as_u16() == 200 {
                return Ok(Some(img_resp.bytes().await?));
            }
        }

        warn!("could not retrieve {} at {}", path, git_ref);
        Ok(None)
    }

    /// All review comments on a pull request (first page of 100).
    pub async fn review_comments(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<PullComment>, GitHubError> {
        let url = format!("{}/repos/{}/pulls/{}/comments", self.api_base, repo, number);
        let resp = self
            .get(&url)?
            .query(&[("per_page", "100")])
            .timeout(COMMENT_TIMEOUT)
            .send()
            .await?;
        let status = resp.status().as_u16();
        if status != 200 {
            return Err(GitHubError::Status(status));
        }
        Ok(resp.json().await?)
    }

    /// Post a file-level review comment against the current head commit.
    pub async fn create_file_comment(
        &self,
        repo: &str,
        number: u64,
        path: &str,
        body: &str,
    ) -> Result<PullComment, GitHubError> {
        let head_sha = self.pull_request(repo, number).await?.head.sha;

        let url = format!("{}/repos/{}/pulls/{}/comments", self.api_base, repo, number);
        let payload = serde_json::json!({
            "body": body,
            "commit_id": head_sha,
            "path": path,
            "subject_type": "file",
        });
        let resp = self
            .post(&url)?
            .timeout(COMMENT_TIMEOUT)
            .json(&payload)
            .send()
            .await?;
        let status = resp.status().as_u16();
        if status == 200 || status == 201 {
            Ok(resp.json().await?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(GitHubError::Rejected { status, body })
        }
    }
}

/// GitHub wraps base64 payloads at 60 columns; the newlines have to go
/// before decoding.
fn decode_content(content: &str) -> Result<Bytes, GitHubError> {
    let compact = content.replace(['\n', '\r'], "");
    Ok(Bytes::from(BASE64.decode(compact.as_bytes())?))
}
