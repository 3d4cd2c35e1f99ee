//! Review session state: one pull request, a walk over its changed PNGs,
//! and the background loads that feed the viewer.

mod loader;

pub use loader::{ComparisonLoader, ImageSource, LoadOutcome, LoadResult, SideFailure};

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use tokio::runtime::Handle;

use crate::compare::{CompareConfig, Comparison, DiffRegion};
use crate::github::{
    count_by_path, GitHubClient, GitHubError, ImageEntry, ImageListing, ReviewComment,
};
use crate::view::ComparisonState;

/// Production image source: bytes come through the GitHub contents/blob
/// chain. A 404 from the contents API means the file has no content at
/// that ref, which is normal for added and deleted files.
pub struct GitHubReviewSource {
    client: Arc<GitHubClient>,
    repo: String,
}

impl GitHubReviewSource {
    pub fn new(client: Arc<GitHubClient>, repo: impl Into<String>) -> Self {
        Self {
            client,
            repo: repo.into(),
        }
    }
}

#[async_trait::async_trait]
impl ImageSource for GitHubReviewSource {
    async fn fetch_image(&self, path: &str, git_ref: &str) -> Result<Option<Bytes>> {
        match self.client.image_bytes(&self.repo, path, git_ref).await {
            Ok(bytes) => Ok(bytes),
            Err(GitHubError::Status(404)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// What the viewer should currently draw for the selected file.
#[derive(Debug)]
pub enum LoadState {
    /// The listing has no images at all.
    Empty,
    Loading,
    Done(LoadOutcome),
}

enum CommentEvent {
    Listed {
        generation: u64,
        result: Result<Vec<ReviewComment>, String>,
    },
    Counts(BTreeMap<String, u64>),
    Posted(Result<ReviewComment, String>),
}

struct CommentRemote {
    client: Arc<GitHubClient>,
    repo: String,
    number: u64,
    tx: Sender<CommentEvent>,
    rx: Receiver<CommentEvent>,
}

/// One review sitting: the PR's image listing, the selected file, its load
/// state, the view state, and the file's review comments.
pub struct ReviewSession {
    listing: ImageListing,
    selected: usize,
    loader: ComparisonLoader,
    load: LoadState,
    pub state: ComparisonState,
    handle: Handle,
    remote: Option<CommentRemote>,
    comments: Vec<ReviewComment>,
    counts: BTreeMap<String, u64>,
    comment_generation: u64,
    comment_error: Option<String>,
    posting: bool,
}

impl ReviewSession {
    pub fn new(
        listing: ImageListing,
        source: Arc<dyn ImageSource>,
        config: CompareConfig,
        handle: Handle,
    ) -> Self {
        let loader = ComparisonLoader::new(source, config, handle.clone());
        let mut session = Self {
            listing,
            selected: 0,
            loader,
            load: LoadState::Empty,
            state: ComparisonState::new(),
            handle,
            remote: None,
            comments: Vec::new(),
            counts: BTreeMap::new(),
            comment_generation: 0,
            comment_error: None,
            posting: false,
        };
        session.request_current();
        session
    }

    /// Wire up comment reads and writes. Without this the comment pane
    /// stays empty and posting is disabled.
    pub fn attach_comments(&mut self, client: Arc<GitHubClient>, repo: impl Into<String>) {
        let (tx, rx) = mpsc::channel();
        self.remote = Some(CommentRemote {
            client,
            repo: repo.into(),
            number: self.listing.pr_number,
            tx,
            rx,
        });
        self.refresh_counts();
        self.refresh_comments();
    }

    pub fn listing(&self) -> &ImageListing {
        &self.listing
    }

    pub fn files(&self) -> &[ImageEntry] {
        &self.listing.images
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn current_file(&self) -> Option<&ImageEntry> {
        self.listing.images.get(self.selected)
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    pub fn comparison(&self) -> Option<&Comparison> {
        match &self.load {
            LoadState::Done(LoadOutcome::Compared(c)) => Some(c),
            _ => None,
        }
    }

    pub fn region_count(&self) -> usize {
        self.comparison().map_or(0, |c| c.regions.len())
    }

    pub fn selected_region(&self) -> Option<DiffRegion> {
        let index = self.state.cursor.selected()?;
        self.comparison()?.regions.get(index).copied()
    }

    pub fn comments(&self) -> &[ReviewComment] {
        &self.comments
    }

    pub fn comment_count(&self, path: &str) -> u64 {
        self.counts.get(path).copied().unwrap_or(0)
    }

    pub fn comment_error(&self) -> Option<&str> {
        self.comment_error.as_deref()
    }

    pub fn can_comment(&self) -> bool {
        self.remote.is_some() && !self.posting
    }

    pub fn posting(&self) -> bool {
        self.posting
    }

    /// File navigation is bounded: stepping past either end stays put.
    pub fn next_file(&mut self) {
        self.select_file(self.selected + 1);
    }

    pub fn prev_file(&mut self) {
        if self.selected > 0 {
            self.select_file(self.selected - 1);
        }
    }

    pub fn select_file(&mut self, index: usize) {
        if self.listing.images.is_empty() {
            return;
        }
        let index = index.min(self.listing.images.len() - 1);
        if index == self.selected {
            return;
        }
        self.selected = index;
        self.state.reset_for_file();
        self.request_current();
        self.refresh_comments();
    }

    /// Re-fetch the selected file pair, keeping the view state.
    pub fn reload(&mut self) {
        self.request_current();
        self.refresh_comments();
    }

    fn request_current(&mut self) {
        if let Some(entry) = self.listing.images.get(self.selected) {
            self.loader
                .request(&entry.path, &self.listing.base_ref, &self.listing.head_ref);
            self.load = LoadState::Loading;
        }
    }

    /// Drain finished background work into the session. Returns true when
    /// anything visible changed.
    pub fn tick(&mut self) -> bool {
        let mut changed = false;
        if let Some(result) = self.loader.poll() {
            self.load = LoadState::Done(result.outcome);
            changed = true;
        }

        let mut events = Vec::new();
        if let Some(remote) = &self.remote {
            while let Ok(event) = remote.rx.try_recv() {
                events.push(event);
            }
        }
        for event in events {
            changed = true;
            self.apply(event);
        }
        changed
    }

    fn apply(&mut self, event: CommentEvent) {
        match event {
            CommentEvent::Listed { generation, result } => {
                if generation == self.comment_generation {
                    match result {
                        Ok(list) => {
                            self.comments = list;
                            self.comment_error = None;
                        }
                        Err(e) => self.comment_error = Some(e),
                    }
                }
            }
            CommentEvent::Counts(counts) => self.counts = counts,
            CommentEvent::Posted(result) => {
                self.posting = false;
                match result {
                    Ok(comment) => {
                        self.comments.push(comment);
                        self.comment_error = None;
                        self.refresh_counts();
                    }
                    Err(e) => self.comment_error = Some(e),
                }
            }
        }
    }

    /// Post a file-level comment. A selected region adds a pixel-box
    /// prefix so the annotation stays anchored on github.com.
    pub fn post_comment(&mut self, body: &str) {
        let body = body.trim();
        if body.is_empty() || self.posting {
            return;
        }
        let text = match self.selected_region() {
            Some(r) => format!(
                "[region r{}:c{}–r{}:c{}]\n\n{}",
                r.min_row, r.min_col, r.max_row, r.max_col, body
            ),
            None => body.to_string(),
        };

        let Some(remote) = &self.remote else { return };
        let Some(entry) = self.listing.images.get(self.selected) else {
            return;
        };
        let client = Arc::clone(&remote.client);
        let repo = remote.repo.clone();
        let number = remote.number;
        let tx = remote.tx.clone();
        let path = entry.path.clone();

        self.posting = true;
        self.comment_error = None;
        self.handle.spawn(async move {
            let result = client
                .create_file_comment(&repo, number, &path, &text)
                .await
                .map(ReviewComment::from)
                .map_err(|e| e.to_string());
            let _ = tx.send(CommentEvent::Posted(result));
        });
    }

    fn refresh_comments(&mut self) {
        self.comments.clear();
        let Some(remote) = &self.remote else { return };
        let Some(entry) = self.listing.images.get(self.selected) else {
            return;
        };
        let client = Arc::clone(&remote.client);
        let repo = remote.repo.clone();
        let number = remote.number;
        let tx = remote.tx.clone();
        let path = entry.path.clone();

        self.comment_generation += 1;
        let generation = self.comment_generation;
        self.handle.spawn(async move {
            let result = match client.review_comments(&repo, number).await {
                Ok(all) => Ok(all
                    .into_iter()
                    .filter(|c| c.path == path)
                    .map(ReviewComment::from)
                    .collect()),
                Err(e) => Err(e.to_string()),
            };
            let _ = tx.send(CommentEvent::Listed { generation, result });
        });
    }

    fn refresh_counts(&mut self) {
        let Some(remote) = &self.remote else { return };
        let client = Arc::clone(&remote.client);
        let repo = remote.repo.clone();
        let number = remote.number;
        let tx = remote.tx.clone();

        self.handle.spawn(async move {
            // Count failures degrade to an empty map, never an error
            let counts = match client.review_comments(&repo, number).await {
                Ok(all) => count_by_path(&all),
                Err(_) => BTreeMap::new(),
            };
            let _ = tx.send(CommentEvent::Counts(counts));
        });
    }
}
