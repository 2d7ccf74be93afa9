use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::collections::BTreeSet;
use std::io::Stdout;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::controller::{Direction, ReviewController};
use crate::diff::{DiffFile, DiffSource};
use crate::editor;
use crate::github::Side;
use crate::host::{
    BufferId, ConfirmRequest, DiffContext, EditorHost, LineMenu, NotifyLevel, PendingEdit,
    ScratchRequest, SessionBuffers, SessionId, SessionView,
};
use crate::keybinding::{Action, KeyBinding, KeyResult, SequenceState};
use crate::ui;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const LEFT_BUFFER: BufferId = BufferId(1);
const RIGHT_BUFFER: BufferId = BufferId(2);

/// One side of the split view
#[derive(Debug, Clone)]
pub struct Pane {
    pub buffer: BufferId,
    pub lines: Vec<String>,
    pub signs: BTreeSet<u32>,
    /// 1-based
    pub cursor: u32,
    /// 0-based index of the first visible line
    pub scroll: usize,
}

impl Pane {
    fn new(buffer: BufferId) -> Self {
        Self {
            buffer,
            lines: Vec::new(),
            signs: BTreeSet::new(),
            cursor: 1,
            scroll: 0,
        }
    }

    fn load(&mut self, lines: Vec<String>) {
        self.lines = lines;
        self.signs.clear();
        self.cursor = 1;
        self.scroll = 0;
    }

    fn last_line(&self) -> u32 {
        (self.lines.len() as u32).max(1)
    }

    fn move_to(&mut self, line: u32) {
        self.cursor = line.clamp(1, self.last_line());
    }

    fn move_by(&mut self, delta: i64) {
        let target = (self.cursor as i64 + delta).clamp(1, self.last_line() as i64);
        self.cursor = target as u32;
    }

    /// Keep the cursor inside a viewport of `height` lines
    pub fn adjust_scroll(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        let cursor = self.cursor as usize - 1;
        if cursor < self.scroll {
            self.scroll = cursor;
        }
        if cursor >= self.scroll + height {
            self.scroll = cursor + 1 - height;
        }
    }
}

/// Split diff view hosting the review controller
/// Edited text waiting for an explicit submit after the editor closed
#[derive(Debug, Clone)]
pub struct CommentPreview {
    pub title: String,
    pub body: String,
    pub edit: PendingEdit,
}

#[derive(Debug)]
pub struct DiffView {
    pub session: SessionId,
    pub path: Option<String>,
    pub left: Pane,
    pub right: Pane,
    pub focus: Side,
    pub notification: Option<(NotifyLevel, String)>,
    pub pending_scratch: Option<ScratchRequest>,
    pub pending_preview: Option<CommentPreview>,
    pub pending_confirm: Option<ConfirmRequest>,
    pub confirm_input: String,
    pub pending_menu: Option<LineMenu>,
    pub menu_selected: usize,
    /// Body height of the panes at the last draw
    pub viewport: usize,
}

impl Default for DiffView {
    fn default() -> Self {
        Self {
            session: SessionId(1),
            path: None,
            left: Pane::new(LEFT_BUFFER),
            right: Pane::new(RIGHT_BUFFER),
            focus: Side::Right,
            notification: None,
            pending_scratch: None,
            pending_preview: None,
            pending_confirm: None,
            confirm_input: String::new(),
            pending_menu: None,
            menu_selected: 0,
            viewport: 20,
        }
    }
}

impl DiffView {
    pub fn load_file(&mut self, file: DiffFile) {
        self.left.load(file.left);
        self.right.load(file.right);
        self.path = Some(file.path);
        self.pending_menu = None;
    }

    pub fn pane(&self, side: Side) -> &Pane {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn pane_mut(&mut self, side: Side) -> &mut Pane {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    fn pane_by_buffer(&self, buffer: BufferId) -> Option<&Pane> {
        [&self.left, &self.right]
            .into_iter()
            .find(|p| p.buffer == buffer)
    }

    fn pane_by_buffer_mut(&mut self, buffer: BufferId) -> Option<&mut Pane> {
        [&mut self.left, &mut self.right]
            .into_iter()
            .find(|p| p.buffer == buffer)
    }

    pub fn focused(&self) -> &Pane {
        self.pane(self.focus)
    }

    fn buffers(&self) -> SessionBuffers {
        SessionBuffers {
            left: self.left.buffer,
            right: self.right.buffer,
        }
    }

    fn switch_focus(&mut self) {
        self.focus = match self.focus {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        };
    }
}

impl EditorHost for DiffView {
    fn diff_context(&self) -> Option<DiffContext> {
        let path = self.path.clone()?;
        Some(DiffContext {
            session: self.session,
            path,
            buffers: self.buffers(),
            side: self.focus,
            cursor_line: self.focused().cursor,
        })
    }

    fn session_view(&self, session: SessionId) -> Option<SessionView> {
        if session != self.session {
            return None;
        }
        Some(SessionView {
            path: self.path.clone()?,
            buffers: self.buffers(),
        })
    }

    fn line_count(&self, buffer: BufferId) -> usize {
        self.pane_by_buffer(buffer).map_or(0, |p| p.lines.len())
    }

    fn buffer_lines(&self, buffer: BufferId, start: u32, end: u32) -> Vec<String> {
        let Some(pane) = self.pane_by_buffer(buffer) else {
            return Vec::new();
        };
        let start = (start.max(1) - 1) as usize;
        let end = (end as usize).min(pane.lines.len());
        pane.lines.get(start..end).map(<[String]>::to_vec).unwrap_or_default()
    }

    fn clear_signs(&mut self, buffer: BufferId) {
        if let Some(pane) = self.pane_by_buffer_mut(buffer) {
            pane.signs.clear();
        }
    }

    fn place_sign(&mut self, buffer: BufferId, line: u32) {
        if let Some(pane) = self.pane_by_buffer_mut(buffer) {
            pane.signs.insert(line);
        }
    }

    fn notify(&mut self, level: NotifyLevel, message: &str) {
        debug!("notify {:?}: {}", level, message);
        self.notification = Some((level, message.to_string()));
    }

    fn open_scratch(&mut self, request: ScratchRequest) {
        self.pending_menu = None;
        self.pending_scratch = Some(request);
    }

    fn confirm(&mut self, request: ConfirmRequest) {
        self.pending_menu = None;
        self.confirm_input.clear();
        self.pending_confirm = Some(request);
    }

    fn show_menu(&mut self, menu: LineMenu) {
        self.menu_selected = 0;
        self.pending_menu = Some(menu);
    }

    fn jump_to_line(&mut self, line: u32) {
        let height = self.viewport;
        let pane = self.pane_mut(self.focus);
        pane.move_to(line);
        pane.adjust_scroll(height);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// Line-wise selection started at `anchor`
    Visual { anchor: u32 },
}

pub struct App {
    pub config: Config,
    pub view: DiffView,
    pub controller: Option<ReviewController>,
    /// Why PR features are unavailable, when `controller` is `None`
    pub disabled_reason: Option<String>,
    source: Option<DiffSource>,
    pub files: Vec<String>,
    pub selected_file: usize,
    pub mode: Mode,
    keys: SequenceState,
    session_opened: bool,
    pub should_quit: bool,
    spinner_frame: usize,
}

impl App {
    pub fn new(
        config: Config,
        source: Option<DiffSource>,
        files: Vec<String>,
        controller: Result<ReviewController, String>,
    ) -> Self {
        let (controller, disabled_reason) = match controller {
            Ok(c) => (Some(c), None),
            Err(reason) => (None, Some(reason)),
        };
        Self {
            config,
            view: DiffView::default(),
            controller,
            disabled_reason,
            source,
            files,
            selected_file: 0,
            mode: Mode::Normal,
            keys: SequenceState::default(),
            session_opened: false,
            should_quit: false,
            spinner_frame: 0,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut terminal = ui::setup_terminal()?;

        if let Some(reason) = self.disabled_reason.clone() {
            self.view.notify(
                NotifyLevel::Warn,
                &format!("PR features disabled: {}", reason),
            );
        }
        if self.files.is_empty() {
            self.view.notify(NotifyLevel::Info, "No changed files");
        } else {
            self.open_file(0).await;
        }

        while !self.should_quit {
            self.poll_completions();
            self.run_pending_scratch(&mut terminal)?;
            self.spinner_frame = self.spinner_frame.wrapping_add(1);
            terminal.draw(|frame| ui::render(frame, self))?;
            self.handle_input().await?;
        }

        ui::restore_terminal(&mut terminal)?;
        Ok(())
    }

    pub fn spinner_char(&self) -> &'static str {
        SPINNER[self.spinner_frame % SPINNER.len()]
    }

    pub fn comments_loading(&self) -> bool {
        self.controller.as_ref().is_some_and(|c| c.is_fetching())
    }

    /// バックグラウンドの API 結果を反映
    fn poll_completions(&mut self) {
        if let Some(controller) = self.controller.as_mut() {
            controller.poll(&mut self.view);
        }
    }

    /// Open the file at `index` and raise the matching controller event
    pub async fn open_file(&mut self, index: usize) {
        let Some(path) = self.files.get(index).cloned() else {
            return;
        };
        let file = match &self.source {
            Some(source) => source.load(&path).await,
            None => DiffFile {
                path: path.clone(),
                ..Default::default()
            },
        };
        self.selected_file = index;
        self.mode = Mode::Normal;
        self.view.load_file(file);

        let session = self.view.session;
        if let Some(controller) = self.controller.as_mut() {
            if self.session_opened {
                controller.on_file_selected(&mut self.view, session, &path);
            } else {
                controller.on_diff_opened(&mut self.view, session);
            }
        }
        self.session_opened = true;
    }

    /// Suspend the TUI and run the external editor for a pending scratch request
    fn run_pending_scratch(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> Result<()> {
        let Some(request) = self.view.pending_scratch.take() else {
            return Ok(());
        };

        ui::restore_terminal(terminal)?;
        let result = editor::open_scratch_editor(
            self.config.editor.as_deref(),
            &request.title,
            &request.initial_text,
        );
        *terminal = ui::setup_terminal()?;

        self.finish_scratch(request, result);
        Ok(())
    }

    fn finish_scratch(&mut self, request: ScratchRequest, result: Result<Option<String>>) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        match result {
            // 事前入力から変更がなければ投稿しない
            Ok(Some(text)) if text.trim() == request.initial_text.trim() => {
                self.view
                    .notify(NotifyLevel::Info, "No changes, comment discarded");
                controller.cancel_scratch(&mut self.view, request.edit);
            }
            Ok(Some(text)) => {
                self.view.pending_preview = Some(CommentPreview {
                    title: request.title,
                    body: text,
                    edit: request.edit,
                });
            }
            Ok(None) => controller.cancel_scratch(&mut self.view, request.edit),
            Err(e) => {
                warn!("Editor failed: {:#}", e);
                self.view
                    .notify(NotifyLevel::Error, &format!("Editor failed: {}", e));
                controller.cancel_scratch(&mut self.view, request.edit);
            }
        }
    }

    async fn handle_input(&mut self) -> Result<()> {
        self.keys.check_timeout();
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    self.handle_key(key).await;
                }
            }
        }
        Ok(())
    }

    pub async fn handle_key(&mut self, key: KeyEvent) {
        if self.view.pending_preview.is_some() {
            self.handle_preview_key(key);
            return;
        }
        if self.view.pending_confirm.is_some() {
            self.handle_confirm_key(key);
            return;
        }
        if self.view.pending_menu.is_some() {
            self.handle_menu_key(key);
            return;
        }
        if key.code == KeyCode::Esc && !self.keys.is_pending() {
            self.mode = Mode::Normal;
            return;
        }

        let Some(binding) = KeyBinding::from_event(&key) else {
            return;
        };
        if let KeyResult::Action(action) = self.keys.feed(binding, &self.config.keybindings) {
            self.dispatch(action).await;
        }
    }

    fn handle_preview_key(&mut self, key: KeyEvent) {
        if !matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            return;
        }
        let Some(preview) = self.view.pending_preview.take() else {
            return;
        };
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        if key.code == KeyCode::Enter {
            controller.submit_scratch(&mut self.view, preview.edit, &preview.body);
        } else {
            controller.cancel_scratch(&mut self.view, preview.edit);
            self.view.notify(NotifyLevel::Info, "Comment discarded");
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) => self.view.confirm_input.push(c),
            KeyCode::Backspace => {
                self.view.confirm_input.pop();
            }
            KeyCode::Enter | KeyCode::Esc => {
                let answer = if key.code == KeyCode::Esc {
                    String::new()
                } else {
                    std::mem::take(&mut self.view.confirm_input)
                };
                let Some(request) = self.view.pending_confirm.take() else {
                    return;
                };
                if let Some(controller) = self.controller.as_mut() {
                    controller.resolve_confirm(&mut self.view, request, &answer);
                }
            }
            _ => {}
        }
    }

    fn handle_menu_key(&mut self, key: KeyEvent) {
        let action_count = self
            .view
            .pending_menu
            .as_ref()
            .map_or(0, |m| m.actions.len());
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if action_count > 0 {
                    self.view.menu_selected = (self.view.menu_selected + 1).min(action_count - 1);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.view.menu_selected = self.view.menu_selected.saturating_sub(1);
            }
            KeyCode::Char('q') | KeyCode::Esc => self.view.pending_menu = None,
            KeyCode::Enter => {
                let Some(menu) = self.view.pending_menu.take() else {
                    return;
                };
                let Some((action, _)) = menu.actions.get(self.view.menu_selected) else {
                    return;
                };
                if let Some(controller) = self.controller.as_mut() {
                    controller.menu_action(&mut self.view, &menu, action);
                }
            }
            _ => {}
        }
    }

    /// Selected range for comment commands: the visual selection, or the cursor line
    fn selection(&self) -> (u32, u32) {
        let cursor = self.view.focused().cursor;
        match self.mode {
            Mode::Visual { anchor } => (anchor.min(cursor), anchor.max(cursor)),
            Mode::Normal => (cursor, cursor),
        }
    }

    async fn dispatch(&mut self, action: Action) {
        let page = (self.view.viewport / 2).max(1) as i64;
        match action {
            Action::Quit => match self.mode {
                Mode::Visual { .. } => self.mode = Mode::Normal,
                Mode::Normal => self.should_quit = true,
            },
            Action::Down => self.move_cursor(1),
            Action::Up => self.move_cursor(-1),
            Action::PageDown => self.move_cursor(page),
            Action::PageUp => self.move_cursor(-page),
            Action::Top => self.view.jump_to_line(1),
            Action::Bottom => {
                let last = self.view.focused().last_line();
                self.view.jump_to_line(last);
            }
            Action::SwitchPane => {
                self.mode = Mode::Normal;
                self.view.switch_focus();
            }
            Action::NextFile => {
                if self.selected_file + 1 < self.files.len() {
                    self.open_file(self.selected_file + 1).await;
                }
            }
            Action::PrevFile => {
                if self.selected_file > 0 {
                    self.open_file(self.selected_file - 1).await;
                }
            }
            Action::Visual => {
                self.mode = match self.mode {
                    Mode::Normal => Mode::Visual {
                        anchor: self.view.focused().cursor,
                    },
                    Mode::Visual { .. } => Mode::Normal,
                };
            }
            Action::Comment | Action::Suggest => {
                let (start, end) = self.selection();
                self.mode = Mode::Normal;
                self.with_controller(|controller, view| {
                    if action == Action::Comment {
                        controller.comment_on_range(view, start, end);
                    } else {
                        controller.suggest_change(view, start, end);
                    }
                });
            }
            Action::Menu => self.with_controller(|controller, view| controller.open_menu(view)),
            Action::Refresh => self.with_controller(|controller, view| controller.refresh(view)),
            Action::NextComment => {
                self.with_controller(|controller, view| controller.navigate(view, Direction::Next))
            }
            Action::PrevComment => self.with_controller(|controller, view| {
                controller.navigate(view, Direction::Previous)
            }),
        }
    }

    fn move_cursor(&mut self, delta: i64) {
        let height = self.view.viewport;
        let pane = self.view.pane_mut(self.view.focus);
        pane.move_by(delta);
        pane.adjust_scroll(height);
    }

    /// Run `f` against the controller, or warn when PR features are disabled
    fn with_controller(&mut self, f: impl FnOnce(&mut ReviewController, &mut DiffView)) {
        match self.controller.as_mut() {
            Some(controller) => f(controller, &mut self.view),
            None => {
                let reason = self.disabled_reason.as_deref().unwrap_or("no pull request");
                let message = format!("PR features disabled: {}", reason);
                self.view.notify(NotifyLevel::Warn, &message);
            }
        }
    }

    #[cfg(test)]
    pub fn new_for_test() -> Self {
        Self::new(
            Config::default(),
            None,
            vec!["src/lib.rs".to_string()],
            Err("no pull request".to_string()),
        )
    }
}
