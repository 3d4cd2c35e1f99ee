use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use tokio::runtime::Handle;

use crate::compare::{compare, Bitmap, CompareConfig, Comparison};
use crate::view::Side;

/// Where image bytes come from. The TUI plugs in a GitHub-backed source;
/// tests substitute in-memory fixtures.
#[async_trait::async_trait]
pub trait ImageSource: Send + Sync + 'static {
    /// Bytes of `path` at `git_ref`, or `None` when the file does not
    /// exist at that ref (added and deleted files have only one side).
    async fn fetch_image(&self, path: &str, git_ref: &str) -> Result<Option<Bytes>>;
}

/// Why one side of a comparison could not be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideFailure {
    /// The file does not exist at that ref.
    Missing,
    /// Bytes arrived but did not decode as a PNG.
    Decode(String),
    /// The fetch itself failed.
    Fetch(String),
}

impl SideFailure {
    pub fn describe(&self) -> String {
        match self {
            SideFailure::Missing => "not present at this ref".to_string(),
            SideFailure::Decode(e) => format!("decode failed: {e}"),
            SideFailure::Fetch(e) => format!("fetch failed: {e}"),
        }
    }
}

/// What a finished load produced.
#[derive(Debug)]
pub enum LoadOutcome {
    /// Both sides decoded; the full comparison is ready.
    Compared(Comparison),
    /// Only one side was usable; show it alone with a note about the other.
    SingleSide {
        side: Side,
        bitmap: Bitmap,
        other: SideFailure,
    },
    /// Neither side was usable.
    Unavailable {
        base: SideFailure,
        current: SideFailure,
    },
}

#[derive(Debug)]
pub struct LoadResult {
    pub generation: u64,
    pub path: String,
    pub outcome: LoadOutcome,
}

/// Background loader for one file pair at a time. Each `request` stamps a
/// new generation; results from superseded requests are dropped on arrival
/// so a fast file switch never shows a stale comparison.
pub struct ComparisonLoader {
    source: Arc<dyn ImageSource>,
    config: CompareConfig,
    handle: Handle,
    tx: Sender<LoadResult>,
    rx: Receiver<LoadResult>,
    generation: u64,
}

impl ComparisonLoader {
    pub fn new(source: Arc<dyn ImageSource>, config: CompareConfig, handle: Handle) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            source,
            config,
            handle,
            tx,
            rx,
            generation: 0,
        }
    }

    /// Start loading both sides of a file. Returns the request's generation.
    pub fn request(&mut self, path: &str, base_ref: &str, head_ref: &str) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        let source = Arc::clone(&self.source);
        let config = self.config;
        let tx = self.tx.clone();
        let path = path.to_string();
        let base_ref = base_ref.to_string();
        let head_ref = head_ref.to_string();

        self.handle.spawn(async move {
            let outcome = load_pair(source, &path, &base_ref, &head_ref, config).await;
            // Receiver gone means the session is shutting down
            let _ = tx.send(LoadResult {
                generation,
                path,
                outcome,
            });
        });
        generation
    }

    /// Latest finished load for the current generation, if any. Stale
    /// generations are discarded here.
    pub fn poll(&mut self) -> Option<LoadResult> {
        let mut latest = None;
        while let Ok(result) = self.rx.try_recv() {
            if result.generation == self.generation {
                latest = Some(result);
            }
        }
        latest
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

async fn load_pair(
    source: Arc<dyn ImageSource>,
    path: &str,
    base_ref: &str,
    head_ref: &str,
    config: CompareConfig,
) -> LoadOutcome {
    let (base, current) = tokio::join!(
        source.fetch_image(path, base_ref),
        source.fetch_image(path, head_ref),
    );

    // Decode and compare off the async threads as a single unit; both
    // sides land together or not at all.
    let compared = tokio::task::spawn_blocking(move || {
        match (decode_side(base), decode_side(current)) {
            (Ok(b), Ok(c)) => LoadOutcome::Compared(compare(&b, &c, &config)),
            (Ok(b), Err(other)) => LoadOutcome::SingleSide {
                side: Side::Base,
                bitmap: b,
                other,
            },
            (Err(other), Ok(c)) => LoadOutcome::SingleSide {
                side: Side::Current,
                bitmap: c,
                other,
            },
            (Err(base), Err(current)) => LoadOutcome::Unavailable { base, current },
        }
    })
    .await;

    match compared {
        Ok(outcome) => outcome,
        Err(e) => {
            let failure = SideFailure::Fetch(e.to_string());
            LoadOutcome::Unavailable {
                base: failure.clone(),
                current: failure,
            }
        }
    }
}

fn decode_side(fetched: Result<Option<Bytes>>) -> Result<Bitmap, SideFailure> {
    match fetched {
        Ok(Some(bytes)) => Bitmap::decode(&bytes).map_err(|e| SideFailure::Decode(e.to_string())),
        Ok(None) => Err(SideFailure::Missing),
        Err(e) => Err(SideFailure::Fetch(e.to_string())),
    }
}
