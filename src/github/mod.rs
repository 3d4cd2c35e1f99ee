//! GitHub REST API access for pull request review data.

mod client;
mod types;

pub use client::{GitHubClient, GITHUB_API_BASE};
pub use types::{
    count_by_path, CommentAuthor, CompareFile, GitHubError, GitRef, ImageEntry, ImageListing,
    PullComment, PullRequest, ReviewComment,
};
