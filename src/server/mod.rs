//! HTTP proxy between review clients and the GitHub API. Browsers cannot
//! call GitHub with a token from a canvas context, so every image and
//! comment round-trips through here.

mod routes;

pub use routes::build_router;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::github::{GitHubClient, ImageListing};

const LISTING_TTL: Duration = Duration::from_secs(120); // keyed on head SHA, invalidates on force-push
const LISTING_CAPACITY: u64 = 256;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub token: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    github: Arc<GitHubClient>,
    listings: moka::sync::Cache<String, ImageListing>,
}

impl AppState {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        let listings = moka::sync::Cache::builder()
            .max_capacity(LISTING_CAPACITY)
            .time_to_live(LISTING_TTL)
            .build();
        Self { github, listings }
    }
}

pub async fn run(config: ServerConfig) -> Result<()> {
    let github = Arc::new(GitHubClient::new(config.token)?);
    if !github.has_token() {
        tracing::warn!("no GITHUB_TOKEN configured; API routes will return errors");
    }
    let app = build_router(AppState::new(github));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("listening on http://{}", config.bind);
    info!(
        "review url: http://{}/{{owner}}/{{repo}}/pr/{{number}}",
        config.bind
    );
    axum::serve(listener, app)
        .await
        .context("Server terminated")?;
    Ok(())
}
