mod client;
pub mod comment;
mod pr;
mod remote;

pub use client::GhError;
pub use comment::{CommentDraft, ReviewComment, Side};
pub use pr::{fetch_pr, Branch, PullRequest, User};
pub use remote::{CommentClient, GhCommentClient, RemoteError};
