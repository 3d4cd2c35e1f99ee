pub mod compare;
pub mod github;
pub mod server;
pub mod session;
pub mod tui;
pub mod view;

// Re-export commonly used types
pub use compare::{compare, Bitmap, CompareConfig, Comparison, DiffRegion};
pub use github::{GitHubClient, ImageListing};
pub use server::ServerConfig;
pub use session::ReviewSession;
pub use view::{ComparisonState, ViewMode};
