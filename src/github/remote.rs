use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;

use super::client::GhError;
use super::comment::{self, CommentDraft, ReviewComment};
use super::pr;
use crate::context::PullRequestContext;

/// Failure of a remote comment operation, ready for display
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The proxy exited non-zero. Holds its combined output.
    #[error("{0}")]
    CommandFailed(String),
    #[error("Failed to run gh: {0}")]
    Spawn(String),
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl From<GhError> for RemoteError {
    fn from(err: GhError) -> Self {
        match err {
            GhError::Failed { output, status } => {
                if output.is_empty() {
                    Self::CommandFailed(format!("gh exited with {}", status))
                } else {
                    Self::CommandFailed(output)
                }
            }
            GhError::Spawn(msg) | GhError::Join(msg) => Self::Spawn(msg),
            GhError::InvalidUtf8 => Self::Decode("gh output contains invalid UTF-8".to_string()),
            GhError::Json(e) => Self::Decode(e.to_string()),
        }
    }
}

/// Review comment operations against a pull request.
///
/// async-trait keeps this dyn-compatible so the controller can hold
/// `Arc<dyn CommentClient>` and tests can swap in a fake.
#[async_trait]
pub trait CommentClient: Send + Sync {
    /// All pages, flattened. Malformed items are dropped.
    async fn list_comments(
        &self,
        pr: &PullRequestContext,
    ) -> Result<Vec<ReviewComment>, RemoteError>;

    async fn create_comment(
        &self,
        pr: &PullRequestContext,
        draft: &CommentDraft,
    ) -> Result<ReviewComment, RemoteError>;

    /// Full-body replace
    async fn update_comment(
        &self,
        pr: &PullRequestContext,
        id: u64,
        body: &str,
    ) -> Result<ReviewComment, RemoteError>;

    async fn delete_comment(&self, pr: &PullRequestContext, id: u64) -> Result<(), RemoteError>;

    async fn reply_to_comment(
        &self,
        pr: &PullRequestContext,
        root_id: u64,
        body: &str,
    ) -> Result<ReviewComment, RemoteError>;
}

/// `CommentClient` backed by `gh api`
#[derive(Default)]
pub struct GhCommentClient {
    /// PR head sha, required as `commit_id` when creating comments
    head_sha: OnceCell<String>,
}

impl GhCommentClient {
    pub fn new() -> Self {
        Self::default()
    }

    async fn head_sha(&self, pr: &PullRequestContext) -> Result<&str, RemoteError> {
        let sha = self
            .head_sha
            .get_or_try_init(|| async {
                let fetched = pr::fetch_pr(&pr.repo, pr.number).await?;
                Ok::<_, RemoteError>(fetched.head.sha)
            })
            .await?;
        Ok(sha.as_str())
    }
}

fn decode_comment(json: serde_json::Value) -> Result<ReviewComment, RemoteError> {
    serde_json::from_value(json).map_err(|e| RemoteError::Decode(e.to_string()))
}

#[async_trait]
impl CommentClient for GhCommentClient {
    async fn list_comments(
        &self,
        pr: &PullRequestContext,
    ) -> Result<Vec<ReviewComment>, RemoteError> {
        Ok(comment::fetch_review_comments(&pr.repo, pr.number).await?)
    }

    async fn create_comment(
        &self,
        pr: &PullRequestContext,
        draft: &CommentDraft,
    ) -> Result<ReviewComment, RemoteError> {
        let commit_id = self.head_sha(pr).await?;
        let json = comment::create_review_comment(&pr.repo, pr.number, commit_id, draft).await?;
        decode_comment(json)
    }

    async fn update_comment(
        &self,
        pr: &PullRequestContext,
        id: u64,
        body: &str,
    ) -> Result<ReviewComment, RemoteError> {
        let json = comment::update_review_comment(&pr.repo, id, body).await?;
        decode_comment(json)
    }

    async fn delete_comment(&self, pr: &PullRequestContext, id: u64) -> Result<(), RemoteError> {
        Ok(comment::delete_review_comment(&pr.repo, id).await?)
    }

    async fn reply_to_comment(
        &self,
        pr: &PullRequestContext,
        root_id: u64,
        body: &str,
    ) -> Result<ReviewComment, RemoteError> {
        let json = comment::create_reply_comment(&pr.repo, pr.number, root_id, body).await?;
        decode_comment(json)
    }
}
