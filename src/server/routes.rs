use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use super::AppState;
use crate::github::{count_by_path, GitHubError, ImageListing, ReviewComment};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(root))
        .route("/:owner/:repo/pr/:number", get(review_page))
        .route("/api/:owner/:repo/pr/:number/images", get(pr_images))
        .route("/api/:owner/:repo/pr/:number/image", get(pr_image))
        .route(
            "/api/:owner/:repo/pr/:number/comments",
            get(pr_comments).post(post_pr_comment),
        )
        .route(
            "/api/:owner/:repo/pr/:number/comment-counts",
            get(pr_comment_counts),
        )
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Listing responses always carry no-store; freshness is handled by the
/// server-side TTL cache, not the browser.
fn no_store<T: serde::Serialize>(value: T) -> Response {
    (
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        Json(value),
    )
        .into_response()
}

fn images_error(message: String) -> Response {
    no_store(json!({"error": message, "images": []}))
}

async fn health() -> Response {
    Json(json!({"status": "ok"})).into_response()
}

async fn root() -> Response {
    Json(json!({
        "app": "Visual Review",
        "usage": "Navigate to /{owner}/{repo}/pr/{number} to review a PR's visual changes.",
    }))
    .into_response()
}

/// List all changed PNG files in a PR.
async fn pr_images(
    State(state): State<AppState>,
    AxumPath((owner, repo, number)): AxumPath<(String, String, u64)>,
) -> Response {
    let github_repo = format!("{owner}/{repo}");
    if !state.github.has_token() {
        return images_error("No GITHUB_TOKEN configured".to_string());
    }

    let pr = match state.github.pull_request(&github_repo, number).await {
        Ok(pr) => pr,
        Err(GitHubError::Status(code)) => {
            return images_error(format!("PR not found: HTTP {code}"));
        }
        Err(err) => return images_error(err.to_string()),
    };

    let cache_key = format!("pr_images:{github_repo}:{number}:{}", pr.head.sha);
    if let Some(listing) = state.listings.get(&cache_key) {
        return no_store(listing);
    }

    let files = match state
        .github
        .compare_files(&github_repo, &pr.base.sha, &pr.head.sha)
        .await
    {
        Ok(files) => files,
        Err(GitHubError::Status(code)) => {
            return images_error(format!("Compare failed: HTTP {code}"));
        }
        Err(err) => return images_error(err.to_string()),
    };

    let listing = ImageListing::assemble(number, pr, files);
    state.listings.insert(cache_key, listing.clone());
    no_store(listing)
}

#[derive(Deserialize)]
struct ImageQuery {
    path: String,
    #[serde(rename = "ref")]
    git_ref: String,
}

/// Proxy image content from a specific git ref.
async fn pr_image(
    State(state): State<AppState>,
    AxumPath((owner, repo, _number)): AxumPath<(String, String, u64)>,
    Query(query): Query<ImageQuery>,
) -> Response {
    let github_repo = format!("{owner}/{repo}");
    if !state.github.has_token() {
        error!("pr_image: no GITHUB_TOKEN configured");
        return (StatusCode::INTERNAL_SERVER_ERROR, "No GitHub token").into_response();
    }

    match state
        .github
        .image_bytes(&github_repo, &query.path, &query.git_ref)
        .await
    {
        Ok(Some(bytes)) => (
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
                (
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("public, max-age=300"),
                ),
            ],
            bytes,
        )
            .into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Could not retrieve image").into_response(),
        // Upstream status codes pass through unchanged
        Err(GitHubError::Status(code)) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, format!("GitHub API error: HTTP {code}")).into_response()
        }
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

#[derive(Deserialize)]
struct CommentsQuery {
    path: String,
}

/// Review comments for one file path in a PR.
async fn pr_comments(
    State(state): State<AppState>,
    AxumPath((owner, repo, number)): AxumPath<(String, String, u64)>,
    Query(query): Query<CommentsQuery>,
) -> Response {
    let github_repo = format!("{owner}/{repo}");
    if !state.github.has_token() {
        return Json(json!({"error": "No GITHUB_TOKEN configured", "comments": []}))
            .into_response();
    }

    match state.github.review_comments(&github_repo, number).await {
        Ok(all) => {
            let comments: Vec<ReviewComment> = all
                .into_iter()
                .filter(|c| c.path == query.path)
                .map(ReviewComment::from)
                .collect();
            Json(json!({"comments": comments})).into_response()
        }
        Err(err) => {
            Json(json!({"error": err.to_string(), "comments": []})).into_response()
        }
    }
}

/// Comment counts grouped by file path; failures degrade to an empty map.
async fn pr_comment_counts(
    State(state): State<AppState>,
    AxumPath((owner, repo, number)): AxumPath<(String, String, u64)>,
) -> Response {
    let github_repo = format!("{owner}/{repo}");
    if !state.github.has_token() {
        return Json(json!({"counts": {}})).into_response();
    }

    match state.github.review_comments(&github_repo, number).await {
        Ok(all) => Json(json!({"counts": count_by_path(&all)})).into_response(),
        Err(_) => Json(json!({"counts": {}})).into_response(),
    }
}

/// Post a new file-level review comment on a PR.
async fn post_pr_comment(
    State(state): State<AppState>,
    AxumPath((owner, repo, number)): AxumPath<(String, String, u64)>,
    body: Bytes,
) -> Response {
    let github_repo = format!("{owner}/{repo}");
    if !state.github.has_token() {
        return Json(json!({"error": "No GITHUB_TOKEN configured"})).into_response();
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return Json(json!({"error": "Invalid JSON body"})).into_response(),
    };
    let path = payload
        .get("path")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim();
    let comment_body = payload
        .get("body")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim();
    if path.is_empty() || comment_body.is_empty() {
        return Json(json!({"error": "Both 'path' and 'body' are required"})).into_response();
    }

    match state
        .github
        .create_file_comment(&github_repo, number, path, comment_body)
        .await
    {
        Ok(c) => Json(json!({
            "ok": true,
            "comment": {
                "id": c.id,
                "body": c.body,
                "user": c.user.login,
                "created_at": c.created_at,
                "html_url": c.html_url,
            },
        }))
        .into_response(),
        Err(GitHubError::Status(code)) => {
            Json(json!({"error": format!("PR not found: HTTP {code}")})).into_response()
        }
        Err(err) => Json(json!({"error": err.to_string()})).into_response(),
    }
}

/// Landing page for a PR review: the API map plus the terminal client
/// invocation, since the comparison itself runs client-side.
async fn review_page(
    AxumPath((owner, repo, number)): AxumPath<(String, String, u64)>,
) -> Html<String> {
    let html = format!(
        r##"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8"/>
  <meta name="viewport" content="width=device-width, initial-scale=1"/>
  <title>Visual Review - {owner}/{repo} #{number}</title>
  <style>
    html, body {{ margin: 0; font-family: ui-sans-serif, system-ui, -apple-system, sans-serif; background: #111; color: #eee; }}
    main {{ max-width: 720px; margin: 48px auto; padding: 0 16px; }}
    code, pre {{ background: #1c1c22; border-radius: 6px; padding: 2px 6px; font-size: 14px; }}
    pre {{ padding: 12px; overflow-x: auto; }}
    a {{ color: #7ab7ff; }}
    li {{ margin: 6px 0; }}
  </style>
</head>
<body>
  <main>
    <h1>Visual Review</h1>
    <p>Pull request <a href="https://github.com/{owner}/{repo}/pull/{number}">{owner}/{repo}#{number}</a>.</p>
    <p>Compare the changed PNGs in your terminal:</p>
    <pre>visual-review review {owner}/{repo} {number}</pre>
    <p>Or use the JSON API directly:</p>
    <ul>
      <li><code>GET /api/{owner}/{repo}/pr/{number}/images</code></li>
      <li><code>GET /api/{owner}/{repo}/pr/{number}/image?path=&amp;ref=</code></li>
      <li><code>GET /api/{owner}/{repo}/pr/{number}/comments?path=</code></li>
      <li><code>GET /api/{owner}/{repo}/pr/{number}/comment-counts</code></li>
      <li><code>POST /api/{owner}/{repo}/pr/{number}/comments</code></li>
    </ul>
  </main>
</body>
</html>"##
    );
    Html(html)
}
