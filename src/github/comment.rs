use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::client::{gh_api_json, gh_api_paginate_raw, gh_api_send, FieldValue, GhError, Method};
use super::pr::User;

/// Which half of the diff a comment targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Base (original) version
    Left,
    /// Head (modified) version
    Right,
}

impl Side {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

/// Inline review comment (or reply) on a pull request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    pub path: String,
    /// `null` for outdated comments
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub side: Option<Side>,
    pub body: String,
    pub user: User,
    pub created_at: String,
    #[serde(default)]
    pub in_reply_to_id: Option<u64>,
}

impl ReviewComment {
    pub fn is_reply(&self) -> bool {
        self.in_reply_to_id.is_some()
    }

    pub fn author(&self) -> &str {
        &self.user.login
    }

    /// 1行目を最大 `max_chars` 文字に切り詰めたプレビュー
    pub fn preview(&self, max_chars: usize) -> String {
        let first = self.body.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        let first = first.trim();
        if first.chars().count() > max_chars {
            let truncated: String = first.chars().take(max_chars).collect();
            format!("{}...", truncated)
        } else {
            first.to_string()
        }
    }
}

/// Flatten a `--paginate --slurp` response (array of pages) into comments.
///
/// Pages that are not arrays are ignored. Items without a numeric `id`, or
/// that fail to decode for any other reason, are dropped. Relative order of
/// the surviving items is preserved.
pub fn flatten_comment_pages(pages: serde_json::Value) -> Vec<ReviewComment> {
    let serde_json::Value::Array(pages) = pages else {
        return Vec::new();
    };

    let mut comments = Vec::new();
    for page in pages {
        let serde_json::Value::Array(items) = page else {
            continue;
        };
        for item in items {
            if !item.get("id").is_some_and(|id| id.is_u64()) {
                debug!("Dropping review comment without id");
                continue;
            }
            match serde_json::from_value::<ReviewComment>(item) {
                Ok(comment) => comments.push(comment),
                Err(e) => debug!("Dropping malformed review comment: {}", e),
            }
        }
    }
    comments
}

/// Decode raw paginated output. Undecodable output counts as "no data".
pub fn parse_comment_pages(raw: &str) -> Vec<ReviewComment> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(pages) => flatten_comment_pages(pages),
        Err(e) => {
            debug!("Review comment response is not JSON: {}", e);
            Vec::new()
        }
    }
}

/// Parameters for a new root comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDraft {
    pub path: String,
    pub side: Side,
    pub start_line: u32,
    pub end_line: u32,
    pub body: String,
}

impl CommentDraft {
    pub fn is_multi_line(&self) -> bool {
        self.start_line != self.end_line
    }
}

pub async fn fetch_review_comments(
    repo: &str,
    pr_number: u32,
) -> Result<Vec<ReviewComment>, GhError> {
    let endpoint = format!("repos/{}/pulls/{}/comments?per_page=100", repo, pr_number);
    let raw = gh_api_paginate_raw(&endpoint).await?;
    Ok(parse_comment_pages(&raw))
}

pub async fn create_review_comment(
    repo: &str,
    pr_number: u32,
    commit_id: &str,
    draft: &CommentDraft,
) -> Result<serde_json::Value, GhError> {
    let endpoint = format!("repos/{}/pulls/{}/comments", repo, pr_number);
    let line_str = draft.end_line.to_string();
    let start_line_str = draft.start_line.to_string();
    let side = draft.side.as_api_str();

    let mut fields = vec![
        ("body", FieldValue::String(&draft.body)),
        ("commit_id", FieldValue::String(commit_id)),
        ("path", FieldValue::String(&draft.path)),
        ("line", FieldValue::Raw(&line_str)),
        ("side", FieldValue::String(side)),
    ];
    // start_side は常に side と同じ（hunk を跨ぐ範囲は未対応）
    if draft.is_multi_line() {
        fields.push(("start_line", FieldValue::Raw(&start_line_str)));
        fields.push(("start_side", FieldValue::String(side)));
    }

    gh_api_json(Method::Post, &endpoint, &fields).await
}

pub async fn update_review_comment(
    repo: &str,
    comment_id: u64,
    body: &str,
) -> Result<serde_json::Value, GhError> {
    let endpoint = format!("repos/{}/pulls/comments/{}", repo, comment_id);
    gh_api_json(Method::Patch, &endpoint, &[("body", FieldValue::String(body))]).await
}

pub async fn delete_review_comment(repo: &str, comment_id: u64) -> Result<(), GhError> {
    let endpoint = format!("repos/{}/pulls/comments/{}", repo, comment_id);
    gh_api_send(Method::Delete, &endpoint, &[]).await?;
    Ok(())
}

pub async fn create_reply_comment(
    repo: &str,
    pr_number: u32,
    comment_id: u64,
    body: &str,
) -> Result<serde_json::Value, GhError> {
    let endpoint = format!(
        "repos/{}/pulls/{}/comments/{}/replies",
        repo, pr_number, comment_id
    );
    gh_api_json(Method::Post, &endpoint, &[("body", FieldValue::String(body))]).await
}
