use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use visual_review::github::GitHubClient;
use visual_review::server::{build_router, AppState};

// Stand-in image body; the proxy never inspects the bytes it relays
const PNG_BYTES: &[u8] = b"pretend-png-payload";

async fn bind() -> Result<(tokio::net::TcpListener, String)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    Ok((listener, format!("http://{addr}")))
}

fn spawn(listener: tokio::net::TcpListener, app: Router) {
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
}

async fn serve(app: Router) -> Result<String> {
    let (listener, url) = bind().await?;
    spawn(listener, app);
    Ok(url)
}

/// Proxy wired to a GitHub stub, with a token so requests reach upstream.
async fn proxy_for(stub: Router) -> Result<String> {
    let upstream = serve(stub).await?;
    let client = GitHubClient::with_api_base(Some("test-token".to_string()), upstream)?;
    serve(build_router(AppState::new(Arc::new(client)))).await
}

async fn tokenless_proxy() -> Result<String> {
    let client = GitHubClient::new(None)?;
    serve(build_router(AppState::new(Arc::new(client)))).await
}

fn stub_pull() -> Value {
    json!({
        "title": "Tune button colors",
        "html_url": "https://github.com/acme/widgets/pull/7",
        "base": {"label": "acme:main", "sha": "basesha"},
        "head": {"label": "acme:feature", "sha": "headsha"},
    })
}

fn stub_files() -> Value {
    json!({
        "files": [
            {"filename": "assets/button.png", "status": "modified", "additions": 0, "deletions": 0},
            {"filename": "src/lib.rs", "status": "modified", "additions": 10, "deletions": 2},
            {"filename": "assets/Icon.PNG", "status": "added", "additions": 0, "deletions": 0},
        ]
    })
}

#[tokio::test]
async fn test_health_and_root() -> Result<()> {
    let url = tokenless_proxy().await?;

    let health: Value = reqwest::get(format!("{url}/health")).await?.json().await?;
    assert_eq!(health, json!({"status": "ok"}));

    let root: Value = reqwest::get(format!("{url}/")).await?.json().await?;
    assert_eq!(root["app"], "Visual Review");
    assert!(root["usage"].as_str().unwrap_or("").contains("/pr/"));

    Ok(())
}

#[tokio::test]
async fn test_routes_without_a_token_degrade_gracefully() -> Result<()> {
    let url = tokenless_proxy().await?;

    let images: Value = reqwest::get(format!("{url}/api/acme/widgets/pr/7/images"))
        .await?
        .json()
        .await?;
    assert_eq!(
        images,
        json!({"error": "No GITHUB_TOKEN configured", "images": []})
    );

    let resp = reqwest::get(format!(
        "{url}/api/acme/widgets/pr/7/image?path=a.png&ref=headsha"
    ))
    .await?;
    assert_eq!(resp.status().as_u16(), 500);
    assert_eq!(resp.text().await?, "No GitHub token");

    let comments: Value = reqwest::get(format!(
        "{url}/api/acme/widgets/pr/7/comments?path=a.png"
    ))
    .await?
    .json()
    .await?;
    assert_eq!(comments["error"], "No GITHUB_TOKEN configured");
    assert_eq!(comments["comments"], json!([]));

    let counts: Value = reqwest::get(format!("{url}/api/acme/widgets/pr/7/comment-counts"))
        .await?
        .json()
        .await?;
    assert_eq!(counts, json!({"counts": {}}));

    let posted: Value = reqwest::Client::new()
        .post(format!("{url}/api/acme/widgets/pr/7/comments"))
        .json(&json!({"path": "a.png", "body": "hello"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(posted, json!({"error": "No GITHUB_TOKEN configured"}));

    Ok(())
}

#[tokio::test]
async fn test_image_listing_filters_pngs_and_caches_by_head_sha() -> Result<()> {
    let compare_hits = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&compare_hits);
    let stub = Router::new()
        .route(
            "/repos/acme/widgets/pulls/7",
            get(|| async { Json(stub_pull()) }),
        )
        .route(
            "/repos/acme/widgets/compare/:range",
            get(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(stub_files())
                }
            }),
        );
    let url = proxy_for(stub).await?;

    let resp = reqwest::get(format!("{url}/api/acme/widgets/pr/7/images")).await?;
    assert_eq!(resp.headers()[reqwest::header::CACHE_CONTROL], "no-store");
    let listing: Value = resp.json().await?;

    assert_eq!(listing["pr_number"], 7);
    assert_eq!(listing["base_ref"], "basesha");
    assert_eq!(listing["head_ref"], "headsha");
    assert_eq!(listing["base_label"], "acme:main");
    assert_eq!(listing["head_label"], "acme:feature");
    assert_eq!(listing["pr_title"], "Tune button colors");
    assert_eq!(
        listing["pr_url"],
        "https://github.com/acme/widgets/pull/7"
    );

    // Non-PNG files are dropped; the uppercase extension survives
    let images = listing["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["path"], "assets/button.png");
    assert_eq!(images[0]["status"], "modified");
    assert_eq!(images[1]["path"], "assets/Icon.PNG");
    assert_eq!(images[1]["status"], "added");

    // Second call is served from the listing cache
    let again: Value = reqwest::get(format!("{url}/api/acme/widgets/pr/7/images"))
        .await?
        .json()
        .await?;
    assert_eq!(again, listing);
    assert_eq!(compare_hits.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_listing_errors_name_the_upstream_status() -> Result<()> {
    let stub = Router::new().route(
        "/repos/acme/widgets/pulls/7",
        get(|| async { (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))) }),
    );
    let url = proxy_for(stub).await?;
    let listing: Value = reqwest::get(format!("{url}/api/acme/widgets/pr/7/images"))
        .await?
        .json()
        .await?;
    assert_eq!(
        listing,
        json!({"error": "PR not found: HTTP 404", "images": []})
    );

    let stub = Router::new()
        .route(
            "/repos/acme/widgets/pulls/7",
            get(|| async { Json(stub_pull()) }),
        )
        .route(
            "/repos/acme/widgets/compare/:range",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
    let url = proxy_for(stub).await?;
    let listing: Value = reqwest::get(format!("{url}/api/acme/widgets/pr/7/images"))
        .await?
        .json()
        .await?;
    assert_eq!(
        listing,
        json!({"error": "Compare failed: HTTP 500", "images": []})
    );

    Ok(())
}

#[tokio::test]
async fn test_image_decodes_wrapped_contents_payloads() -> Result<()> {
    let raw = BASE64.encode(PNG_BYTES);
    // GitHub wraps inline base64 bodies in newlines
    let wrapped = format!("{}\n{}\n", &raw[..8], &raw[8..]);

    let stub = Router::new().route(
        "/repos/acme/widgets/contents/assets/button.png",
        get(move || {
            let content = wrapped.clone();
            async move {
                Json(json!({
                    "encoding": "base64",
                    "content": content,
                    "sha": "blobsha",
                    "size": 19,
                }))
            }
        }),
    );
    let url = proxy_for(stub).await?;

    let resp = reqwest::get(format!(
        "{url}/api/acme/widgets/pr/7/image?path=assets/button.png&ref=headsha"
    ))
    .await?;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.headers()[reqwest::header::CONTENT_TYPE], "image/png");
    assert_eq!(
        resp.headers()[reqwest::header::CACHE_CONTROL],
        "public, max-age=300"
    );
    assert_eq!(&resp.bytes().await?[..], PNG_BYTES);

    Ok(())
}

#[tokio::test]
async fn test_image_falls_back_to_the_blob_api() -> Result<()> {
    // Large files come back from the contents API without inline content
    let stub = Router::new()
        .route(
            "/repos/acme/widgets/contents/assets/button.png",
            get(|| async {
                Json(json!({
                    "encoding": "none",
                    "content": null,
                    "sha": "blobsha",
                    "size": 2_097_152,
                }))
            }),
        )
        .route(
            "/repos/acme/widgets/git/blobs/blobsha",
            get(|| async {
                Json(json!({
                    "encoding": "base64",
                    "content": BASE64.encode(PNG_BYTES),
                }))
            }),
        );
    let url = proxy_for(stub).await?;

    let resp = reqwest::get(format!(
        "{url}/api/acme/widgets/pr/7/image?path=assets/button.png&ref=headsha"
    ))
    .await?;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(&resp.bytes().await?[..], PNG_BYTES);

    Ok(())
}

#[tokio::test]
async fn test_image_falls_back_to_the_download_url() -> Result<()> {
    // The stub needs its own address inside a response body, so bind first
    let (listener, upstream) = bind().await?;
    let download_url = format!("{upstream}/raw/button.png");

    let stub = Router::new()
        .route(
            "/repos/acme/widgets/contents/assets/button.png",
            get(move || {
                let download_url = download_url.clone();
                async move {
                    Json(json!({
                        "encoding": "none",
                        "content": null,
                        "sha": null,
                        "download_url": download_url,
                        "size": 2_097_152,
                    }))
                }
            }),
        )
        .route("/raw/button.png", get(|| async { PNG_BYTES }));
    spawn(listener, stub);

    let client = GitHubClient::with_api_base(Some("test-token".to_string()), upstream)?;
    let url = serve(build_router(AppState::new(Arc::new(client)))).await?;

    let resp = reqwest::get(format!(
        "{url}/api/acme/widgets/pr/7/image?path=assets/button.png&ref=headsha"
    ))
    .await?;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(&resp.bytes().await?[..], PNG_BYTES);

    Ok(())
}

#[tokio::test]
async fn test_image_with_nothing_retrievable_is_a_404() -> Result<()> {
    let stub = Router::new().route(
        "/repos/acme/widgets/contents/assets/button.png",
        get(|| async { Json(json!({})) }),
    );
    let url = proxy_for(stub).await?;

    let resp = reqwest::get(format!(
        "{url}/api/acme/widgets/pr/7/image?path=assets/button.png&ref=headsha"
    ))
    .await?;
    assert_eq!(resp.status().as_u16(), 404);
    assert_eq!(resp.text().await?, "Could not retrieve image");

    Ok(())
}

#[tokio::test]
async fn test_image_errors_pass_the_upstream_status_through() -> Result<()> {
    let stub = Router::new().route(
        "/repos/acme/widgets/contents/assets/button.png",
        get(|| async { (StatusCode::FORBIDDEN, "rate limited") }),
    );
    let url = proxy_for(stub).await?;

    let resp = reqwest::get(format!(
        "{url}/api/acme/widgets/pr/7/image?path=assets/button.png&ref=headsha"
    ))
    .await?;
    assert_eq!(resp.status().as_u16(), 403);
    assert_eq!(resp.text().await?, "GitHub API error: HTTP 403");

    Ok(())
}

fn stub_comments() -> Value {
    json!([
        {
            "id": 1,
            "body": "first",
            "user": {"login": "reviewer"},
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T11:00:00Z",
            "html_url": "https://github.com/acme/widgets/pull/7#discussion_r1",
            "path": "assets/button.png",
        },
        {
            "id": 2,
            "body": "second",
            "user": {"login": "drive-by"},
            "created_at": "2024-05-02T09:00:00Z",
            "path": "assets/button.png",
        },
        {
            "id": 3,
            "body": "elsewhere",
            "user": {"login": "reviewer"},
            "created_at": "2024-05-02T09:30:00Z",
            "path": "assets/Icon.PNG",
        },
    ])
}

#[tokio::test]
async fn test_comments_filter_on_the_exact_path() -> Result<()> {
    let stub = Router::new().route(
        "/repos/acme/widgets/pulls/7/comments",
        get(|| async { Json(stub_comments()) }),
    );
    let url = proxy_for(stub).await?;

    let body: Value = reqwest::get(format!(
        "{url}/api/acme/widgets/pr/7/comments?path=assets/button.png"
    ))
    .await?
    .json()
    .await?;

    let comments = body["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["id"], 1);
    assert_eq!(comments[0]["user"], "reviewer");
    assert_eq!(comments[0]["updated_at"], "2024-05-01T11:00:00Z");
    assert_eq!(comments[1]["id"], 2);
    // Missing optional fields settle on their defaults
    assert_eq!(comments[1]["updated_at"], Value::Null);
    assert_eq!(comments[1]["html_url"], "");

    Ok(())
}

#[tokio::test]
async fn test_comment_counts_group_by_path() -> Result<()> {
    let stub = Router::new().route(
        "/repos/acme/widgets/pulls/7/comments",
        get(|| async { Json(stub_comments()) }),
    );
    let url = proxy_for(stub).await?;

    let body: Value = reqwest::get(format!("{url}/api/acme/widgets/pr/7/comment-counts"))
        .await?
        .json()
        .await?;
    assert_eq!(
        body,
        json!({"counts": {"assets/button.png": 2, "assets/Icon.PNG": 1}})
    );

    Ok(())
}

#[tokio::test]
async fn test_comment_counts_degrade_to_empty_on_failure() -> Result<()> {
    let stub = Router::new().route(
        "/repos/acme/widgets/pulls/7/comments",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let url = proxy_for(stub).await?;

    let body: Value = reqwest::get(format!("{url}/api/acme/widgets/pr/7/comment-counts"))
        .await?
        .json()
        .await?;
    assert_eq!(body, json!({"counts": {}}));

    Ok(())
}

#[tokio::test]
async fn test_posting_a_comment_targets_the_head_commit() -> Result<()> {
    let recorded: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&recorded);

    let stub = Router::new()
        .route(
            "/repos/acme/widgets/pulls/7",
            get(|| async { Json(stub_pull()) }),
        )
        .route(
            "/repos/acme/widgets/pulls/7/comments",
            axum::routing::post(move |Json(payload): Json<Value>| {
                let slot = Arc::clone(&slot);
                async move {
                    *slot.lock().unwrap() = Some(payload);
                    (
                        StatusCode::CREATED,
                        Json(json!({
                            "id": 99,
                            "body": "Looks sharper",
                            "user": {"login": "reviewer"},
                            "created_at": "2024-05-03T08:00:00Z",
                            "html_url": "https://github.com/acme/widgets/pull/7#discussion_r99",
                        })),
                    )
                }
            }),
        );
    let url = proxy_for(stub).await?;

    let body: Value = reqwest::Client::new()
        .post(format!("{url}/api/acme/widgets/pr/7/comments"))
        .json(&json!({"path": "assets/button.png", "body": "Looks sharper"}))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body["ok"], true);
    assert_eq!(body["comment"]["id"], 99);
    assert_eq!(body["comment"]["user"], "reviewer");
    assert_eq!(body["comment"]["html_url"].as_str().unwrap_or(""), "https://github.com/acme/widgets/pull/7#discussion_r99");

    // The upstream payload pins the comment to the PR head and the file
    let payload = recorded.lock().unwrap().clone().unwrap();
    assert_eq!(payload["body"], "Looks sharper");
    assert_eq!(payload["commit_id"], "headsha");
    assert_eq!(payload["path"], "assets/button.png");
    assert_eq!(payload["subject_type"], "file");

    Ok(())
}

#[tokio::test]
async fn test_posting_validates_before_calling_github() -> Result<()> {
    // No stub routes: validation failures must never reach upstream
    let url = proxy_for(Router::new()).await?;
    let client = reqwest::Client::new();

    let body: Value = client
        .post(format!("{url}/api/acme/widgets/pr/7/comments"))
        .body("not json at all")
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body, json!({"error": "Invalid JSON body"}));

    let body: Value = client
        .post(format!("{url}/api/acme/widgets/pr/7/comments"))
        .json(&json!({"path": "assets/button.png"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body, json!({"error": "Both 'path' and 'body' are required"}));

    let body: Value = client
        .post(format!("{url}/api/acme/widgets/pr/7/comments"))
        .json(&json!({"path": "  ", "body": "text"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body, json!({"error": "Both 'path' and 'body' are required"}));

    Ok(())
}

#[tokio::test]
async fn test_posting_surfaces_github_rejections() -> Result<()> {
    let stub = Router::new().route(
        "/repos/acme/widgets/pulls/7",
        get(|| async { StatusCode::NOT_FOUND }),
    );
    let url = proxy_for(stub).await?;

    let body: Value = reqwest::Client::new()
        .post(format!("{url}/api/acme/widgets/pr/7/comments"))
        .json(&json!({"path": "assets/button.png", "body": "hello"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body, json!({"error": "PR not found: HTTP 404"}));

    let stub = Router::new()
        .route(
            "/repos/acme/widgets/pulls/7",
            get(|| async { Json(stub_pull()) }),
        )
        .route(
            "/repos/acme/widgets/pulls/7/comments",
            axum::routing::post(|| async {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    r#"{"message":"Validation Failed"}"#,
                )
            }),
        );
    let url = proxy_for(stub).await?;

    let body: Value = reqwest::Client::new()
        .post(format!("{url}/api/acme/widgets/pr/7/comments"))
        .json(&json!({"path": "assets/button.png", "body": "hello"}))
        .send()
        .await?
        .json()
        .await?;
    let message = body["error"].as_str().unwrap_or("");
    assert!(
        message.starts_with("GitHub API error: HTTP 422:"),
        "unexpected error: {message}"
    );
    assert!(message.contains("Validation Failed"));

    Ok(())
}

#[tokio::test]
async fn test_review_page_links_the_pr_and_the_client() -> Result<()> {
    let url = tokenless_proxy().await?;

    let resp = reqwest::get(format!("{url}/acme/widgets/pr/7")).await?;
    assert_eq!(resp.status().as_u16(), 200);
    let html = resp.text().await?;
    assert!(html.contains("https://github.com/acme/widgets/pull/7"));
    assert!(html.contains("visual-review review acme/widgets 7"));
    assert!(html.contains("/api/acme/widgets/pr/7/images"));

    Ok(())
}
