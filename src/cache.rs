//! Session-scoped review comment cache.
//!
//! One cache per (repo, PR) for the lifetime of the process. Nothing is
//! written to disk; a refresh simply forgets everything and the next read
//! triggers a full fetch.

use tracing::{debug, warn};

use crate::github::ReviewComment;

/// Mutation that landed while the cache was absent and a fetch was in flight
#[derive(Debug, Clone)]
enum Deferred {
    Insert(ReviewComment),
    Update(u64, ReviewComment),
    Remove(u64),
}

#[derive(Debug, Default)]
pub struct CommentCache {
    /// `None` until the first full fetch completes (or after `invalidate`)
    comments: Option<Vec<ReviewComment>>,
    /// A full fetch is in flight
    fetch_pending: bool,
    /// Replayed over the next `replace_all`. The fetched list may predate them.
    deferred: Vec<Deferred>,
}

impl CommentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, or `None` if not fetched yet
    pub fn get(&self) -> Option<&[ReviewComment]> {
        self.comments.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.comments.is_some()
    }

    pub fn replace_all(&mut self, comments: Vec<ReviewComment>) {
        debug!("Comment cache replaced: {} comments", comments.len());
        self.comments = Some(comments);
        for mutation in std::mem::take(&mut self.deferred) {
            debug!("Replaying deferred mutation {:?}", mutation);
            self.apply(mutation);
        }
    }

    fn apply(&mut self, mutation: Deferred) {
        let Some(comments) = self.comments.as_mut() else {
            return;
        };
        match mutation {
            // 取得結果に既に含まれていれば置き換える
            Deferred::Insert(comment) => match comments.iter_mut().find(|c| c.id == comment.id) {
                Some(existing) => *existing = comment,
                None => comments.push(comment),
            },
            Deferred::Update(id, comment) => {
                if let Some(existing) = comments.iter_mut().find(|c| c.id == id) {
                    *existing = comment;
                }
            }
            Deferred::Remove(id) => comments.retain(|c| c.id != id),
        }
    }

    /// Hold a mutation for replay if a fetch is in flight. Returns `true`
    /// when the cache is absent (the mutation must not be applied now).
    fn defer_if_absent(&mut self, mutation: impl FnOnce() -> Deferred) -> bool {
        if self.comments.is_some() {
            return false;
        }
        if self.fetch_pending {
            let mutation = mutation();
            debug!("Cache not loaded, deferring {:?}", mutation);
            self.deferred.push(mutation);
        } else {
            debug!("Cache not loaded and no fetch in flight, mutation dropped");
        }
        true
    }

    pub fn invalidate(&mut self) {
        debug!("Comment cache invalidated");
        self.comments = None;
    }

    /// Append a comment. Ids are server-assigned, so a duplicate means a
    /// tracking bug upstream.
    pub fn insert(&mut self, comment: ReviewComment) {
        if self.defer_if_absent(|| Deferred::Insert(comment.clone())) {
            return;
        }
        let Some(comments) = self.comments.as_mut() else {
            return;
        };
        let duplicate = comments.iter().position(|c| c.id == comment.id);
        debug_assert!(duplicate.is_none(), "duplicate comment id {}", comment.id);
        match duplicate {
            Some(idx) => {
                warn!("Duplicate comment id {} on insert, replacing", comment.id);
                comments[idx] = comment;
            }
            None => comments.push(comment),
        }
    }

    /// Replace in place. Unknown ids are ignored.
    pub fn update(&mut self, id: u64, comment: ReviewComment) {
        if self.defer_if_absent(|| Deferred::Update(id, comment.clone())) {
            return;
        }
        let Some(comments) = self.comments.as_mut() else {
            return;
        };
        match comments.iter_mut().find(|c| c.id == id) {
            Some(existing) => *existing = comment,
            None => warn!("Update of unknown comment {} ignored", id),
        }
    }

    /// Remove in place. Unknown ids are ignored.
    pub fn remove(&mut self, id: u64) {
        if self.defer_if_absent(|| Deferred::Remove(id)) {
            return;
        }
        let Some(comments) = self.comments.as_mut() else {
            return;
        };
        let before = comments.len();
        comments.retain(|c| c.id != id);
        if comments.len() == before {
            debug!("Remove of unknown comment {} ignored", id);
        }
    }

    /// Mark a full fetch as started. Returns `false` if one is already in
    /// flight, in which case the caller must not issue another.
    pub fn begin_fetch(&mut self) -> bool {
        if self.fetch_pending {
            debug!("Comment fetch already in flight, coalescing");
            return false;
        }
        self.fetch_pending = true;
        true
    }

    pub fn finish_fetch(&mut self) {
        self.fetch_pending = false;
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_pending
    }
}
