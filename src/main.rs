use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::runtime::Handle;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use visual_review::compare::{CompareConfig, DEFAULT_DIFF_THRESHOLD, DEFAULT_MIN_REGION_PIXELS};
use visual_review::server::{self, ServerConfig};
use visual_review::tui::{self, TuiOptions};

#[derive(Parser)]
#[command(
    name = "visual-review",
    version,
    about = "Visual review of PNG changes in GitHub pull requests"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the browser review proxy
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0:8000")]
        bind: String,
    },
    /// Review a pull request's images in the terminal
    Review {
        /// Repository as owner/name
        repo: String,
        /// Pull request number
        number: u64,
        /// Per-channel tolerance before a pixel counts as changed
        #[arg(long, default_value_t = DEFAULT_DIFF_THRESHOLD)]
        threshold: u8,
        /// Smallest changed-pixel cluster kept as a region
        #[arg(long, default_value_t = DEFAULT_MIN_REGION_PIXELS)]
        min_region: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let token = std::env::var("GITHUB_TOKEN").ok();

    match cli.command {
        Command::Serve { bind } => {
            init_logging();
            info!("Starting visual-review proxy...");
            server::run(ServerConfig { bind, token }).await
        }
        Command::Review {
            repo,
            number,
            threshold,
            min_region,
        } => {
            // Tracing stays uninitialized here: the alternate screen owns
            // stdout for the whole run.
            let options = TuiOptions {
                repo,
                number,
                token,
                compare: CompareConfig {
                    threshold,
                    min_region_pixels: min_region,
                },
            };
            let handle = Handle::current();
            tokio::task::spawn_blocking(move || tui::run(options, handle))
                .await
                .context("Reviewer thread panicked")?
        }
    }
}

fn init_logging() {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
