//! Per-file and per-line views derived from the comment cache.
//!
//! Only root comments anchor a thread. Replies are reached through their
//! root and never contribute a line of their own.

use std::collections::{BTreeSet, HashMap};

use crate::github::{ReviewComment, Side};

/// Threads anchored to one (file, line, side)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineThreads {
    /// Each root followed by its replies, roots in cache order
    pub all: Vec<ReviewComment>,
    pub roots: Vec<ReviewComment>,
    /// Root id -> replies in cache order
    pub replies_by_root: HashMap<u64, Vec<ReviewComment>>,
}

impl LineThreads {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn replies(&self, root_id: u64) -> &[ReviewComment] {
        self.replies_by_root
            .get(&root_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn is_root_at(comment: &ReviewComment, path: &str, line: u32, side: Side) -> bool {
    !comment.is_reply()
        && comment.path == path
        && comment.line == Some(line)
        && comment.side == Some(side)
}

pub fn comments_for_file<'a>(comments: &'a [ReviewComment], path: &str) -> Vec<&'a ReviewComment> {
    comments.iter().filter(|c| c.path == path).collect()
}

pub fn comments_on_line(
    comments: &[ReviewComment],
    path: &str,
    line: u32,
    side: Side,
) -> LineThreads {
    let roots: Vec<ReviewComment> = comments
        .iter()
        .filter(|c| is_root_at(c, path, line, side))
        .cloned()
        .collect();

    let mut replies_by_root: HashMap<u64, Vec<ReviewComment>> =
        roots.iter().map(|r| (r.id, Vec::new())).collect();
    for comment in comments.iter().filter(|c| c.path == path) {
        // 別の行の root への返信はここで落ちる（orphan 扱い）
        if let Some(replies) = comment
            .in_reply_to_id
            .and_then(|parent| replies_by_root.get_mut(&parent))
        {
            replies.push(comment.clone());
        }
    }

    let mut all = Vec::with_capacity(roots.len());
    for root in &roots {
        all.push(root.clone());
        if let Some(replies) = replies_by_root.get(&root.id) {
            all.extend(replies.iter().cloned());
        }
    }

    LineThreads {
        all,
        roots,
        replies_by_root,
    }
}

/// Anchored (side, line) pairs of root comments on `path`
pub fn anchors_for_file(comments: &[ReviewComment], path: &str) -> BTreeSet<(Side, u32)> {
    comments
        .iter()
        .filter(|c| !c.is_reply() && c.path == path)
        .filter_map(|c| Some((c.side?, c.line?)))
        .collect()
}

/// Sorted, deduplicated lines with a root comment on `side`
pub fn commented_lines(comments: &[ReviewComment], path: &str, side: Side) -> Vec<u32> {
    anchors_for_file(comments, path)
        .into_iter()
        .filter(|(s, _)| *s == side)
        .map(|(_, line)| line)
        .collect()
}

/// Next commented line after `cursor`, wrapping to the first
pub fn next_line(lines: &[u32], cursor: u32) -> Option<u32> {
    lines
        .iter()
        .copied()
        .find(|l| *l > cursor)
        .or_else(|| lines.first().copied())
}

/// Previous commented line before `cursor`, wrapping to the last
pub fn previous_line(lines: &[u32], cursor: u32) -> Option<u32> {
    lines
        .iter()
        .rev()
        .copied()
        .find(|l| *l < cursor)
        .or_else(|| lines.last().copied())
}
