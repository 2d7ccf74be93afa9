//! Capabilities the review controller needs from the editor hosting the diff.
//!
//! The controller and sign projector only talk to this trait. The terminal
//! viewer in `app` is one implementation; tests use a recording fake.

use crate::github::{ReviewComment, Side};
use crate::index::LineThreads;

/// Opaque handle of a buffer in the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Opaque handle of a diff session (one tab comparing two buffers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u32);

/// The two buffers of a diff session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionBuffers {
    pub left: BufferId,
    pub right: BufferId,
}

impl SessionBuffers {
    pub fn for_side(&self, side: Side) -> BufferId {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// File shown by a diff session and its two buffers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub path: String,
    pub buffers: SessionBuffers,
}

/// Where the user currently is inside the active diff session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffContext {
    pub session: SessionId,
    pub path: String,
    pub buffers: SessionBuffers,
    /// Side of the focused pane
    pub side: Side,
    /// 1-based
    pub cursor_line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warn,
    Error,
}

/// What a scratch region's text will be used for once submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingEdit {
    NewComment {
        path: String,
        side: Side,
        start_line: u32,
        end_line: u32,
    },
    Reply {
        root_id: u64,
    },
    Update {
        id: u64,
    },
}

/// Request to open an editable text region. The host calls back
/// `ReviewController::submit_scratch` or `cancel_scratch` with `edit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchRequest {
    pub title: String,
    pub initial_text: String,
    pub edit: PendingEdit,
}

/// Yes/no question. The host answers via `ReviewController::resolve_confirm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmRequest {
    pub prompt: String,
    pub delete_id: u64,
}

/// Entries of the per-line action menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    Comment,
    Reply { root_id: u64 },
    Update { id: u64 },
    Delete { id: u64 },
    NextComment,
    PreviousComment,
}

/// Thread view plus the actions offered for one line
#[derive(Debug, Clone, PartialEq)]
pub struct LineMenu {
    pub path: String,
    pub line: u32,
    pub side: Side,
    pub threads: LineThreads,
    pub actions: Vec<(MenuAction, String)>,
}

impl LineMenu {
    pub fn comment(&self, id: u64) -> Option<&ReviewComment> {
        self.threads.all.iter().find(|c| c.id == id)
    }
}

pub trait EditorHost {
    /// Active diff session and cursor position, if any
    fn diff_context(&self) -> Option<DiffContext>;
    /// File and buffers of a (possibly inactive) session
    fn session_view(&self, session: SessionId) -> Option<SessionView>;
    fn line_count(&self, buffer: BufferId) -> usize;
    /// Lines `start..=end` (1-based) of a buffer
    fn buffer_lines(&self, buffer: BufferId, start: u32, end: u32) -> Vec<String>;
    fn clear_signs(&mut self, buffer: BufferId);
    fn place_sign(&mut self, buffer: BufferId, line: u32);
    fn notify(&mut self, level: NotifyLevel, message: &str);
    fn open_scratch(&mut self, request: ScratchRequest);
    fn confirm(&mut self, request: ConfirmRequest);
    fn show_menu(&mut self, menu: LineMenu);
    fn jump_to_line(&mut self, line: u32);
}
