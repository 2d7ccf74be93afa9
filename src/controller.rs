//! Review comment flows driven by editor events and user commands.
//!
//! The controller owns the comment cache. Remote calls run as tokio tasks and
//! report back through a channel; `poll` applies their results on the task
//! that owns the controller, so the cache never needs a lock.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::CommentCache;
use crate::context::PullRequestContext;
use crate::github::{CommentClient, CommentDraft, RemoteError, ReviewComment};
use crate::host::{
    ConfirmRequest, DiffContext, EditorHost, LineMenu, MenuAction, NotifyLevel, PendingEdit,
    ScratchRequest, SessionId,
};
use crate::index;
use crate::signs::SignProjector;

/// Preview length used in delete confirmations and menu labels
pub const PREVIEW_CHARS: usize = 40;

/// Result of one remote call, delivered back to the owning loop
#[derive(Debug)]
pub enum Completion {
    Fetched(Result<Vec<ReviewComment>, RemoteError>),
    Created(Result<ReviewComment, RemoteError>),
    Replied(Result<ReviewComment, RemoteError>),
    Updated {
        id: u64,
        result: Result<ReviewComment, RemoteError>,
    },
    Deleted {
        id: u64,
        result: Result<(), RemoteError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Only an explicit yes proceeds
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Wrap selected lines in a GitHub suggestion block
pub fn suggestion_block(lines: &[String]) -> String {
    format!("```suggestion\n{}\n```", lines.join("\n"))
}

pub struct ReviewController {
    pr: PullRequestContext,
    client: Arc<dyn CommentClient>,
    cache: CommentCache,
    projector: SignProjector,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl ReviewController {
    pub fn new(pr: PullRequestContext, client: Arc<dyn CommentClient>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            pr,
            client,
            cache: CommentCache::new(),
            projector: SignProjector,
            tx,
            rx,
        }
    }

    pub fn pr(&self) -> &PullRequestContext {
        &self.pr
    }

    pub fn comments(&self) -> Option<&[ReviewComment]> {
        self.cache.get()
    }

    pub fn is_fetching(&self) -> bool {
        self.cache.is_fetching()
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            // receiver は controller と同寿命。閉じていれば結果は捨てる
            let _ = tx.send(task.await);
        });
    }

    /// Issue a full fetch unless one is already in flight
    pub fn request_fetch(&mut self) -> bool {
        if !self.cache.begin_fetch() {
            return false;
        }
        let client = Arc::clone(&self.client);
        let pr = self.pr.clone();
        self.spawn(async move { Completion::Fetched(client.list_comments(&pr).await) });
        true
    }

    // ==================== Events ====================

    pub fn on_diff_opened<H: EditorHost + ?Sized>(&mut self, host: &mut H, session: SessionId) {
        if self.cache.is_loaded() {
            self.render_session(host, session, None);
        } else {
            // 取得完了時にアクティブなファイルへ描画する
            self.request_fetch();
        }
    }

    pub fn on_file_selected<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        session: SessionId,
        path: &str,
    ) {
        if self.cache.is_loaded() {
            self.render_session(host, session, Some(path));
        }
    }

    fn render_session<H: EditorHost + ?Sized>(
        &self,
        host: &mut H,
        session: SessionId,
        path: Option<&str>,
    ) {
        let (Some(view), Some(comments)) = (host.session_view(session), self.cache.get()) else {
            return;
        };
        let path = path.unwrap_or(&view.path);
        self.projector
            .render_signs_for_file(host, view.buffers, path, comments);
    }

    /// Re-project signs for the file in the active diff session
    pub fn resync<H: EditorHost + ?Sized>(&self, host: &mut H) {
        let (Some(ctx), Some(comments)) = (host.diff_context(), self.cache.get()) else {
            return;
        };
        let placed = self
            .projector
            .render_signs_for_file(host, ctx.buffers, &ctx.path, comments);
        debug!("Resynced {} signs for {}", placed, ctx.path);
    }

    // ==================== Commands ====================

    fn require_context<H: EditorHost + ?Sized>(host: &mut H) -> Option<DiffContext> {
        let ctx = host.diff_context();
        if ctx.is_none() {
            host.notify(NotifyLevel::Warn, "No active diff session");
        }
        ctx
    }

    fn require_comments<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        if self.cache.is_loaded() {
            return true;
        }
        host.notify(NotifyLevel::Info, "Comments are still loading");
        self.request_fetch();
        false
    }

    /// Forget the cache and fetch everything again. Signs are cleared until
    /// the new fetch lands.
    pub fn refresh<H: EditorHost + ?Sized>(&mut self, host: &mut H) {
        self.cache.invalidate();
        if let Some(ctx) = host.diff_context() {
            self.projector.clear(host, ctx.buffers);
        }
        if self.request_fetch() {
            host.notify(NotifyLevel::Info, "Refreshing comments...");
        }
    }

    /// Start a new comment on a (possibly reversed) line range
    pub fn comment_on_range<H: EditorHost + ?Sized>(&mut self, host: &mut H, start: u32, end: u32) {
        let Some(ctx) = Self::require_context(host) else {
            return;
        };
        let (start, end) = (start.min(end), start.max(end));
        host.open_scratch(ScratchRequest {
            title: range_title(&ctx.path, start, end),
            initial_text: String::new(),
            edit: PendingEdit::NewComment {
                path: ctx.path,
                side: ctx.side,
                start_line: start,
                end_line: end,
            },
        });
    }

    /// Same as `comment_on_range`, pre-filled with a suggestion block
    pub fn suggest_change<H: EditorHost + ?Sized>(&mut self, host: &mut H, start: u32, end: u32) {
        let Some(ctx) = Self::require_context(host) else {
            return;
        };
        let (start, end) = (start.min(end), start.max(end));
        let selected = host.buffer_lines(ctx.buffers.for_side(ctx.side), start, end);
        host.open_scratch(ScratchRequest {
            title: format!("Suggest change: {}", range_title(&ctx.path, start, end)),
            initial_text: suggestion_block(&selected),
            edit: PendingEdit::NewComment {
                path: ctx.path,
                side: ctx.side,
                start_line: start,
                end_line: end,
            },
        });
    }

    /// Show threads and actions for the cursor line
    pub fn open_menu<H: EditorHost + ?Sized>(&mut self, host: &mut H) {
        let Some(ctx) = Self::require_context(host) else {
            return;
        };
        if !self.require_comments(host) {
            return;
        }
        let comments = self.cache.get().unwrap_or(&[]);
        let threads = index::comments_on_line(comments, &ctx.path, ctx.cursor_line, ctx.side);

        let mut actions = vec![(MenuAction::Comment, "New comment".to_string())];
        for root in &threads.roots {
            actions.push((
                MenuAction::Reply { root_id: root.id },
                format!("Reply to @{}: {}", root.author(), root.preview(PREVIEW_CHARS)),
            ));
        }
        for comment in &threads.all {
            actions.push((
                MenuAction::Update { id: comment.id },
                format!("Edit @{}: {}", comment.author(), comment.preview(PREVIEW_CHARS)),
            ));
        }
        for comment in &threads.all {
            actions.push((
                MenuAction::Delete { id: comment.id },
                format!("Delete @{}: {}", comment.author(), comment.preview(PREVIEW_CHARS)),
            ));
        }
        actions.push((MenuAction::NextComment, "Next comment".to_string()));
        actions.push((MenuAction::PreviousComment, "Previous comment".to_string()));

        host.show_menu(LineMenu {
            path: ctx.path,
            line: ctx.cursor_line,
            side: ctx.side,
            threads,
            actions,
        });
    }

    pub fn menu_action<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        menu: &LineMenu,
        action: &MenuAction,
    ) {
        match action {
            MenuAction::Comment => host.open_scratch(ScratchRequest {
                title: range_title(&menu.path, menu.line, menu.line),
                initial_text: String::new(),
                edit: PendingEdit::NewComment {
                    path: menu.path.clone(),
                    side: menu.side,
                    start_line: menu.line,
                    end_line: menu.line,
                },
            }),
            MenuAction::Reply { root_id } => {
                let title = match menu.comment(*root_id) {
                    Some(root) => format!("Reply to @{}", root.author()),
                    None => "Reply".to_string(),
                };
                host.open_scratch(ScratchRequest {
                    title,
                    initial_text: String::new(),
                    edit: PendingEdit::Reply { root_id: *root_id },
                });
            }
            MenuAction::Update { id } => {
                let Some(comment) = menu.comment(*id) else {
                    return;
                };
                host.open_scratch(ScratchRequest {
                    title: format!("Edit comment by @{}", comment.author()),
                    initial_text: comment.body.clone(),
                    edit: PendingEdit::Update { id: *id },
                });
            }
            MenuAction::Delete { id } => {
                let Some(comment) = menu.comment(*id) else {
                    return;
                };
                host.confirm(ConfirmRequest {
                    prompt: format!(
                        "Delete comment by @{}: \"{}\"? [y/N]",
                        comment.author(),
                        comment.preview(PREVIEW_CHARS)
                    ),
                    delete_id: *id,
                });
            }
            MenuAction::NextComment => self.navigate(host, Direction::Next),
            MenuAction::PreviousComment => self.navigate(host, Direction::Previous),
        }
    }

    /// Jump to the next/previous commented line on the current side, wrapping
    pub fn navigate<H: EditorHost + ?Sized>(&mut self, host: &mut H, direction: Direction) {
        let Some(ctx) = Self::require_context(host) else {
            return;
        };
        if !self.require_comments(host) {
            return;
        }
        let comments = self.cache.get().unwrap_or(&[]);
        let lines = index::commented_lines(comments, &ctx.path, ctx.side);
        let target = match direction {
            Direction::Next => index::next_line(&lines, ctx.cursor_line),
            Direction::Previous => index::previous_line(&lines, ctx.cursor_line),
        };
        match target {
            Some(line) => host.jump_to_line(line),
            None => host.notify(
                NotifyLevel::Info,
                &format!("No comments on the {} side of {}", ctx.side, ctx.path),
            ),
        }
    }

    /// Submit the text of a scratch region. Blank text is discarded.
    pub fn submit_scratch<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        edit: PendingEdit,
        text: &str,
    ) -> bool {
        let body = text.trim();
        if body.is_empty() {
            host.notify(NotifyLevel::Info, "Empty comment discarded");
            return false;
        }
        let body = body.to_string();
        let client = Arc::clone(&self.client);
        let pr = self.pr.clone();

        match edit {
            PendingEdit::NewComment {
                path,
                side,
                start_line,
                end_line,
            } => {
                let draft = CommentDraft {
                    path,
                    side,
                    start_line,
                    end_line,
                    body,
                };
                self.spawn(async move {
                    Completion::Created(client.create_comment(&pr, &draft).await)
                });
            }
            PendingEdit::Reply { root_id } => {
                self.spawn(async move {
                    Completion::Replied(client.reply_to_comment(&pr, root_id, &body).await)
                });
            }
            PendingEdit::Update { id } => {
                self.spawn(async move {
                    let result = client.update_comment(&pr, id, &body).await;
                    Completion::Updated { id, result }
                });
            }
        }
        true
    }

    pub fn cancel_scratch<H: EditorHost + ?Sized>(&mut self, _host: &mut H, edit: PendingEdit) {
        debug!("Scratch region cancelled: {:?}", edit);
    }

    /// Answer to a delete confirmation
    pub fn resolve_confirm<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        request: ConfirmRequest,
        answer: &str,
    ) -> bool {
        if !is_affirmative(answer) {
            host.notify(NotifyLevel::Info, "Delete cancelled");
            return false;
        }
        let id = request.delete_id;
        let client = Arc::clone(&self.client);
        let pr = self.pr.clone();
        self.spawn(async move {
            let result = client.delete_comment(&pr, id).await;
            Completion::Deleted { id, result }
        });
        true
    }

    // ==================== Completions ====================

    /// Apply every completion that has arrived. Returns how many were handled.
    pub fn poll<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> usize {
        let mut handled = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.handle_completion(host, completion);
            handled += 1;
        }
        handled
    }

    /// Wait for the next completion without applying it
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.rx.recv().await
    }

    /// Apply one completion. Returns `true` when the cache changed and signs
    /// were resynced.
    pub fn handle_completion<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        completion: Completion,
    ) -> bool {
        match completion {
            Completion::Fetched(result) => {
                self.cache.finish_fetch();
                match result {
                    Ok(comments) => {
                        info!("Fetched {} review comments", comments.len());
                        self.cache.replace_all(comments);
                    }
                    Err(e) => return self.report_failure(host, "fetch comments", &e),
                }
            }
            Completion::Created(result) => match result {
                Ok(comment) => {
                    self.cache.insert(comment);
                    host.notify(NotifyLevel::Info, "Comment posted");
                }
                Err(e) => return self.report_failure(host, "post comment", &e),
            },
            Completion::Replied(result) => match result {
                Ok(comment) => {
                    self.cache.insert(comment);
                    host.notify(NotifyLevel::Info, "Reply posted");
                }
                Err(e) => return self.report_failure(host, "post reply", &e),
            },
            Completion::Updated { id, result } => match result {
                Ok(comment) => {
                    self.cache.update(id, comment);
                    host.notify(NotifyLevel::Info, "Comment updated");
                }
                Err(e) => return self.report_failure(host, "update comment", &e),
            },
            Completion::Deleted { id, result } => match result {
                Ok(()) => {
                    self.cache.remove(id);
                    host.notify(NotifyLevel::Info, "Comment deleted");
                }
                Err(e) => return self.report_failure(host, "delete comment", &e),
            },
        }
        self.resync(host);
        true
    }

    fn report_failure<H: EditorHost + ?Sized>(
        &self,
        host: &mut H,
        action: &str,
        err: &RemoteError,
    ) -> bool {
        warn!("Failed to {}: {}", action, err);
        host.notify(NotifyLevel::Error, &format!("Failed to {}: {}", action, err));
        false
    }
}

fn range_title(path: &str, start: u32, end: u32) -> String {
    if start == end {
        format!("{}:{}", path, start)
    } else {
        format!("{}:{}-{}", path, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{Side, User};
    use crate::host::{BufferId, SessionBuffers, SessionView};
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    const LEFT: BufferId = BufferId(10);
    const RIGHT: BufferId = BufferId(11);
    const SESSION: SessionId = SessionId(1);

    fn comment(id: u64, line: u32, side: Side, parent: Option<u64>) -> ReviewComment {
        ReviewComment {
            id,
            path: "src/lib.rs".to_string(),
            line: Some(line),
            side: Some(side),
            body: format!("body {}", id),
            user: User {
                login: "octocat".to_string(),
            },
            created_at: "2024-01-01T00:00:00Z".to_string(),
            in_reply_to_id: parent,
        }
    }

    // ==================== Fakes ====================

    #[derive(Default)]
    struct FakeClient {
        listed: Vec<ReviewComment>,
        fail_with: Option<String>,
        next_id: AtomicU64,
        calls: Mutex<Vec<String>>,
    }

    impl FakeClient {
        fn with_comments(listed: Vec<ReviewComment>) -> Self {
            Self {
                listed,
                next_id: AtomicU64::new(100),
                ..Default::default()
            }
        }

        fn failing(output: &str) -> Self {
            Self {
                fail_with: Some(output.to_string()),
                ..Default::default()
            }
        }

        fn record(&self, call: String) -> Result<(), RemoteError> {
            self.calls.lock().unwrap().push(call);
            match &self.fail_with {
                Some(output) => Err(RemoteError::CommandFailed(output.clone())),
                None => Ok(()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommentClient for FakeClient {
        async fn list_comments(
            &self,
            _pr: &PullRequestContext,
        ) -> Result<Vec<ReviewComment>, RemoteError> {
            self.record("list".to_string())?;
            Ok(self.listed.clone())
        }

        async fn create_comment(
            &self,
            _pr: &PullRequestContext,
            draft: &CommentDraft,
        ) -> Result<ReviewComment, RemoteError> {
            self.record(format!(
                "create {}:{}-{} {} {}",
                draft.path, draft.start_line, draft.end_line, draft.side, draft.body
            ))?;
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let mut created = comment(id, draft.end_line, draft.side, None);
            created.path = draft.path.clone();
            created.body = draft.body.clone();
            Ok(created)
        }

        async fn update_comment(
            &self,
            _pr: &PullRequestContext,
            id: u64,
            body: &str,
        ) -> Result<ReviewComment, RemoteError> {
            self.record(format!("update {} {}", id, body))?;
            let mut updated = self
                .listed
                .iter()
                .find(|c| c.id == id)
                .cloned()
                .unwrap_or_else(|| comment(id, 1, Side::Right, None));
            updated.body = body.to_string();
            Ok(updated)
        }

        async fn delete_comment(
            &self,
            _pr: &PullRequestContext,
            id: u64,
        ) -> Result<(), RemoteError> {
            self.record(format!("delete {}", id))
        }

        async fn reply_to_comment(
            &self,
            _pr: &PullRequestContext,
            root_id: u64,
            body: &str,
        ) -> Result<ReviewComment, RemoteError> {
            self.record(format!("reply {} {}", root_id, body))?;
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let root = self.listed.iter().find(|c| c.id == root_id);
            let (line, side) = root
                .and_then(|r| Some((r.line?, r.side?)))
                .unwrap_or((1, Side::Right));
            let mut reply = comment(id, line, side, Some(root_id));
            reply.body = body.to_string();
            Ok(reply)
        }
    }

    struct FakeHost {
        context: Option<DiffContext>,
        left_lines: Vec<String>,
        right_lines: Vec<String>,
        signs: BTreeSet<(BufferId, u32)>,
        clears: usize,
        notifications: Vec<(NotifyLevel, String)>,
        scratch: Option<ScratchRequest>,
        confirm: Option<ConfirmRequest>,
        menu: Option<LineMenu>,
        jumped_to: Option<u32>,
    }

    impl FakeHost {
        fn new(side: Side, cursor_line: u32) -> Self {
            Self {
                context: Some(DiffContext {
                    session: SESSION,
                    path: "src/lib.rs".to_string(),
                    buffers: SessionBuffers {
                        left: LEFT,
                        right: RIGHT,
                    },
                    side,
                    cursor_line,
                }),
                left_lines: (1..=30).map(|i| format!("old {}", i)).collect(),
                right_lines: (1..=30).map(|i| format!("new {}", i)).collect(),
                signs: BTreeSet::new(),
                clears: 0,
                notifications: Vec::new(),
                scratch: None,
                confirm: None,
                menu: None,
                jumped_to: None,
            }
        }

        fn without_session() -> Self {
            Self {
                context: None,
                ..Self::new(Side::Right, 1)
            }
        }

        fn last_notification(&self) -> Option<&(NotifyLevel, String)> {
            self.notifications.last()
        }

        fn lines(&self, buffer: BufferId) -> &[String] {
            if buffer == LEFT {
                &self.left_lines
            } else {
                &self.right_lines
            }
        }
    }

    impl EditorHost for FakeHost {
        fn diff_context(&self) -> Option<DiffContext> {
            self.context.clone()
        }

        fn session_view(&self, session: SessionId) -> Option<SessionView> {
            self.context
                .as_ref()
                .filter(|c| c.session == session)
                .map(|c| SessionView {
                    path: c.path.clone(),
                    buffers: c.buffers,
                })
        }

        fn line_count(&self, buffer: BufferId) -> usize {
            self.lines(buffer).len()
        }

        fn buffer_lines(&self, buffer: BufferId, start: u32, end: u32) -> Vec<String> {
            self.lines(buffer)
                .iter()
                .skip(start.saturating_sub(1) as usize)
                .take((end - start + 1) as usize)
                .cloned()
                .collect()
        }

        fn clear_signs(&mut self, buffer: BufferId) {
            self.clears += 1;
            self.signs.retain(|(b, _)| *b != buffer);
        }

        fn place_sign(&mut self, buffer: BufferId, line: u32) {
            self.signs.insert((buffer, line));
        }

        fn notify(&mut self, level: NotifyLevel, message: &str) {
            self.notifications.push((level, message.to_string()));
        }

        fn open_scratch(&mut self, request: ScratchRequest) {
            self.scratch = Some(request);
        }

        fn confirm(&mut self, request: ConfirmRequest) {
            self.confirm = Some(request);
        }

        fn show_menu(&mut self, menu: LineMenu) {
            self.menu = Some(menu);
        }

        fn jump_to_line(&mut self, line: u32) {
            self.jumped_to = Some(line);
        }
    }

    fn controller(client: Arc<FakeClient>) -> ReviewController {
        ReviewController::new(PullRequestContext::new(7, "octo/repo"), client)
    }

    /// Fetch the fake's comments into the cache
    async fn loaded(client: Arc<FakeClient>, host: &mut FakeHost) -> ReviewController {
        let mut ctrl = controller(client);
        ctrl.on_diff_opened(host, SESSION);
        let completion = ctrl.next_completion().await.unwrap();
        assert!(ctrl.handle_completion(host, completion));
        ctrl
    }

    async fn settle(ctrl: &mut ReviewController, host: &mut FakeHost) -> bool {
        let completion = ctrl.next_completion().await.unwrap();
        ctrl.handle_completion(host, completion)
    }

    // ==================== Tests ====================

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative(" YES \n"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("yep"));
        assert!(!is_affirmative("y es"));
    }

    #[test]
    fn test_suggestion_block() {
        let lines = vec!["let a = 1;".to_string(), "let b = 2;".to_string()];
        insta::assert_snapshot!(suggestion_block(&lines), @r"
        ```suggestion
        let a = 1;
        let b = 2;
        ```
        ");
    }

    #[tokio::test]
    async fn test_diff_opened_fetches_then_renders() {
        let client = Arc::new(FakeClient::with_comments(vec![
            comment(1, 5, Side::Right, None),
            comment(2, 5, Side::Right, Some(1)),
            comment(3, 2, Side::Left, None),
        ]));
        let mut host = FakeHost::new(Side::Right, 1);
        let ctrl = loaded(client, &mut host).await;

        assert_eq!(ctrl.comments().map(|c| c.len()), Some(3));
        assert_eq!(host.signs, BTreeSet::from([(LEFT, 2), (RIGHT, 5)]));
        assert!(!ctrl.is_fetching());
    }

    #[tokio::test]
    async fn test_concurrent_fetch_is_coalesced() {
        let client = Arc::new(FakeClient::with_comments(vec![]));
        let mut ctrl = controller(Arc::clone(&client));
        assert!(ctrl.request_fetch());
        assert!(!ctrl.request_fetch());

        let mut host = FakeHost::new(Side::Right, 1);
        settle(&mut ctrl, &mut host).await;
        assert_eq!(client.calls(), vec!["list"]);
        assert!(ctrl.request_fetch());
    }

    #[tokio::test]
    async fn test_file_selected_without_cache_does_nothing() {
        let client = Arc::new(FakeClient::with_comments(vec![comment(1, 5, Side::Right, None)]));
        let mut ctrl = controller(Arc::clone(&client));
        let mut host = FakeHost::new(Side::Right, 1);
        ctrl.on_file_selected(&mut host, SESSION, "src/lib.rs");
        assert_eq!(host.clears, 0);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_file_selected_renders_given_path() {
        let mut listed = vec![comment(1, 5, Side::Right, None)];
        let mut other = comment(2, 9, Side::Right, None);
        other.path = "src/other.rs".to_string();
        listed.push(other);
        let client = Arc::new(FakeClient::with_comments(listed));
        let mut host = FakeHost::new(Side::Right, 1);
        let mut ctrl = loaded(client, &mut host).await;

        ctrl.on_file_selected(&mut host, SESSION, "src/other.rs");
        assert_eq!(host.signs, BTreeSet::from([(RIGHT, 9)]));
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_cache_absent() {
        let client = Arc::new(FakeClient::failing("HTTP 401: Bad credentials"));
        let mut ctrl = controller(client);
        let mut host = FakeHost::new(Side::Right, 1);
        ctrl.on_diff_opened(&mut host, SESSION);
        assert!(!settle(&mut ctrl, &mut host).await);

        assert!(ctrl.comments().is_none());
        assert!(!ctrl.is_fetching());
        let (level, msg) = host.last_notification().unwrap();
        assert_eq!(*level, NotifyLevel::Error);
        assert!(msg.contains("HTTP 401: Bad credentials"));
    }

    #[tokio::test]
    async fn test_new_comment_normalizes_range_and_posts() {
        let client = Arc::new(FakeClient::with_comments(vec![]));
        let mut host = FakeHost::new(Side::Right, 1);
        let mut ctrl = loaded(Arc::clone(&client), &mut host).await;

        ctrl.comment_on_range(&mut host, 12, 10);
        let request = host.scratch.take().unwrap();
        assert_eq!(request.title, "src/lib.rs:10-12");
        assert_eq!(
            request.edit,
            PendingEdit::NewComment {
                path: "src/lib.rs".to_string(),
                side: Side::Right,
                start_line: 10,
                end_line: 12,
            }
        );

        assert!(ctrl.submit_scratch(&mut host, request.edit, "  looks off  \n"));
        assert!(settle(&mut ctrl, &mut host).await);

        assert_eq!(client.calls().last().unwrap(), "create src/lib.rs:10-12 RIGHT looks off");
        assert_eq!(ctrl.comments().unwrap().len(), 1);
        assert!(host.signs.contains(&(RIGHT, 12)));
    }

    #[tokio::test]
    async fn test_blank_submit_is_discarded() {
        let client = Arc::new(FakeClient::with_comments(vec![]));
        let mut host = FakeHost::new(Side::Right, 1);
        let mut ctrl = loaded(Arc::clone(&client), &mut host).await;

        ctrl.comment_on_range(&mut host, 3, 3);
        let request = host.scratch.take().unwrap();
        assert!(!ctrl.submit_scratch(&mut host, request.edit, " \n\t"));
        assert_eq!(client.calls(), vec!["list"]);
    }

    #[tokio::test]
    async fn test_suggest_change_prefills_selected_lines() {
        let client = Arc::new(FakeClient::with_comments(vec![]));
        let mut host = FakeHost::new(Side::Left, 1);
        let mut ctrl = controller(client);

        ctrl.suggest_change(&mut host, 3, 2);
        let request = host.scratch.take().unwrap();
        assert_eq!(request.initial_text, "```suggestion\nold 2\nold 3\n```");
        assert!(matches!(
            request.edit,
            PendingEdit::NewComment {
                side: Side::Left,
                start_line: 2,
                end_line: 3,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_create_failure_keeps_cache_and_signs() {
        let client = Arc::new(FakeClient::failing("HTTP 422: line must be part of the diff"));
        let mut host = FakeHost::new(Side::Right, 4);
        let mut ctrl = controller(client);
        // 失敗するクライアントなので手動で読み込み済みにする
        ctrl.cache.replace_all(vec![comment(1, 4, Side::Right, None)]);
        ctrl.resync(&mut host);
        let clears_before = host.clears;
        let signs_before = host.signs.clone();

        ctrl.comment_on_range(&mut host, 4, 4);
        let request = host.scratch.take().unwrap();
        ctrl.submit_scratch(&mut host, request.edit, "nit");
        assert!(!settle(&mut ctrl, &mut host).await);

        assert_eq!(ctrl.comments().unwrap().len(), 1);
        assert_eq!(host.clears, clears_before);
        assert_eq!(host.signs, signs_before);
        let (level, msg) = host.last_notification().unwrap();
        assert_eq!(*level, NotifyLevel::Error);
        assert!(msg.contains("line must be part of the diff"));
    }

    #[tokio::test]
    async fn test_menu_lists_thread_actions() {
        let client = Arc::new(FakeClient::with_comments(vec![
            comment(1, 5, Side::Right, None),
            comment(2, 5, Side::Right, Some(1)),
            comment(3, 6, Side::Right, None),
        ]));
        let mut host = FakeHost::new(Side::Right, 5);
        let mut ctrl = loaded(client, &mut host).await;

        ctrl.open_menu(&mut host);
        let menu = host.menu.take().unwrap();
        assert_eq!(menu.line, 5);
        let actions: Vec<MenuAction> = menu.actions.iter().map(|(a, _)| a.clone()).collect();
        assert_eq!(
            actions,
            vec![
                MenuAction::Comment,
                MenuAction::Reply { root_id: 1 },
                MenuAction::Update { id: 1 },
                MenuAction::Update { id: 2 },
                MenuAction::Delete { id: 1 },
                MenuAction::Delete { id: 2 },
                MenuAction::NextComment,
                MenuAction::PreviousComment,
            ]
        );
        assert_eq!(menu.actions[1].1, "Reply to @octocat: body 1");
    }

    #[tokio::test]
    async fn test_menu_before_load_requests_fetch() {
        let client = Arc::new(FakeClient::with_comments(vec![]));
        let mut host = FakeHost::new(Side::Right, 5);
        let mut ctrl = controller(Arc::clone(&client));

        ctrl.open_menu(&mut host);
        assert!(host.menu.is_none());
        assert!(ctrl.is_fetching());
        assert_eq!(host.last_notification().unwrap().1, "Comments are still loading");
    }

    #[tokio::test]
    async fn test_reply_appends_to_thread() {
        let client = Arc::new(FakeClient::with_comments(vec![comment(1, 5, Side::Right, None)]));
        let mut host = FakeHost::new(Side::Right, 5);
        let mut ctrl = loaded(Arc::clone(&client), &mut host).await;

        ctrl.open_menu(&mut host);
        let menu = host.menu.take().unwrap();
        ctrl.menu_action(&mut host, &menu, &MenuAction::Reply { root_id: 1 });
        let request = host.scratch.take().unwrap();
        assert_eq!(request.title, "Reply to @octocat");

        ctrl.submit_scratch(&mut host, request.edit, "agreed");
        assert!(settle(&mut ctrl, &mut host).await);

        let threads = index::comments_on_line(ctrl.comments().unwrap(), "src/lib.rs", 5, Side::Right);
        assert_eq!(threads.all.len(), 2);
        assert_eq!(threads.replies(1)[0].body, "agreed");
    }

    #[tokio::test]
    async fn test_update_prefills_and_replaces_body() {
        let client = Arc::new(FakeClient::with_comments(vec![comment(1, 5, Side::Right, None)]));
        let mut host = FakeHost::new(Side::Right, 5);
        let mut ctrl = loaded(Arc::clone(&client), &mut host).await;

        ctrl.open_menu(&mut host);
        let menu = host.menu.take().unwrap();
        ctrl.menu_action(&mut host, &menu, &MenuAction::Update { id: 1 });
        let request = host.scratch.take().unwrap();
        assert_eq!(request.initial_text, "body 1");

        ctrl.submit_scratch(&mut host, request.edit, "body 1 (edited)");
        assert!(settle(&mut ctrl, &mut host).await);
        assert_eq!(ctrl.comments().unwrap()[0].body, "body 1 (edited)");
    }

    #[tokio::test]
    async fn test_delete_requires_explicit_yes() {
        let client = Arc::new(FakeClient::with_comments(vec![comment(1, 5, Side::Right, None)]));
        let mut host = FakeHost::new(Side::Right, 5);
        let mut ctrl = loaded(Arc::clone(&client), &mut host).await;

        ctrl.open_menu(&mut host);
        let menu = host.menu.take().unwrap();
        ctrl.menu_action(&mut host, &menu, &MenuAction::Delete { id: 1 });
        let request = host.confirm.take().unwrap();
        assert_eq!(request.prompt, "Delete comment by @octocat: \"body 1\"? [y/N]");

        assert!(!ctrl.resolve_confirm(&mut host, request.clone(), "maybe"));
        assert_eq!(client.calls(), vec!["list"]);

        assert!(ctrl.resolve_confirm(&mut host, request, "y"));
        assert!(settle(&mut ctrl, &mut host).await);
        assert!(ctrl.comments().unwrap().is_empty());
        assert!(host.signs.is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_id_still_completes() {
        let client = Arc::new(FakeClient::with_comments(vec![comment(1, 5, Side::Right, None)]));
        let mut host = FakeHost::new(Side::Right, 5);
        let mut ctrl = loaded(Arc::clone(&client), &mut host).await;
        let before = ctrl.comments().unwrap().to_vec();

        let request = ConfirmRequest {
            prompt: String::new(),
            delete_id: 999,
        };
        ctrl.resolve_confirm(&mut host, request, "yes");
        assert!(settle(&mut ctrl, &mut host).await);

        assert_eq!(ctrl.comments().unwrap(), before.as_slice());
        assert_eq!(host.last_notification().unwrap().1, "Comment deleted");
    }

    #[tokio::test]
    async fn test_navigation_wraps_around() {
        let client = Arc::new(FakeClient::with_comments(vec![
            comment(1, 3, Side::Right, None),
            comment(2, 7, Side::Right, None),
            comment(3, 12, Side::Right, None),
            comment(4, 20, Side::Left, None),
        ]));
        let mut host = FakeHost::new(Side::Right, 12);
        let mut ctrl = loaded(client, &mut host).await;

        ctrl.navigate(&mut host, Direction::Next);
        assert_eq!(host.jumped_to, Some(3));

        host.context.as_mut().unwrap().cursor_line = 1;
        ctrl.navigate(&mut host, Direction::Previous);
        assert_eq!(host.jumped_to, Some(12));
    }

    #[tokio::test]
    async fn test_navigation_without_comments_notifies() {
        let client = Arc::new(FakeClient::with_comments(vec![comment(1, 3, Side::Left, None)]));
        let mut host = FakeHost::new(Side::Right, 1);
        let mut ctrl = loaded(client, &mut host).await;

        ctrl.navigate(&mut host, Direction::Next);
        assert_eq!(host.jumped_to, None);
        assert_eq!(
            host.last_notification().unwrap().1,
            "No comments on the RIGHT side of src/lib.rs"
        );
    }

    #[tokio::test]
    async fn test_commands_without_session_report_context_error() {
        let client = Arc::new(FakeClient::with_comments(vec![]));
        let mut host = FakeHost::without_session();
        let mut ctrl = controller(client);

        ctrl.comment_on_range(&mut host, 1, 2);
        ctrl.open_menu(&mut host);
        assert!(host.scratch.is_none());
        assert!(host.menu.is_none());
        assert_eq!(host.notifications.len(), 2);
        assert!(host
            .notifications
            .iter()
            .all(|(level, msg)| *level == NotifyLevel::Warn && msg == "No active diff session"));
    }

    #[tokio::test]
    async fn test_create_landing_before_first_fetch_survives() {
        let client = Arc::new(FakeClient::with_comments(vec![]));
        let mut host = FakeHost::new(Side::Right, 1);
        let mut ctrl = controller(client);
        assert!(ctrl.request_fetch());

        // 一覧取得より先に作成が完了する
        let created = comment(42, 3, Side::Right, None);
        ctrl.handle_completion(&mut host, Completion::Created(Ok(created)));
        assert!(ctrl.comments().is_none());

        assert!(settle(&mut ctrl, &mut host).await);
        let ids: Vec<u64> = ctrl.comments().unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![42]);
        assert!(host.signs.contains(&(RIGHT, 3)));
    }

    #[tokio::test]
    async fn test_refresh_refetches() {
        let client = Arc::new(FakeClient::with_comments(vec![comment(1, 3, Side::Right, None)]));
        let mut host = FakeHost::new(Side::Right, 1);
        let mut ctrl = loaded(Arc::clone(&client), &mut host).await;

        ctrl.refresh(&mut host);
        assert!(ctrl.comments().is_none());
        assert!(host.signs.is_empty());
        assert!(settle(&mut ctrl, &mut host).await);
        assert_eq!(ctrl.comments().map(|c| c.len()), Some(1));
        assert_eq!(client.calls(), vec!["list", "list"]);
    }

    #[tokio::test]
    async fn test_poll_applies_arrived_completions() {
        let client = Arc::new(FakeClient::with_comments(vec![comment(1, 3, Side::Right, None)]));
        let mut host = FakeHost::new(Side::Right, 1);
        let mut ctrl = controller(client);
        ctrl.on_diff_opened(&mut host, SESSION);

        let mut handled = 0;
        while handled == 0 {
            tokio::task::yield_now().await;
            handled = ctrl.poll(&mut host);
        }
        assert_eq!(handled, 1);
        assert!(host.signs.contains(&(RIGHT, 3)));
    }
}
