use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthChar;

use super::footer;
use crate::app::{App, Mode, Pane};
use crate::github::Side;

/// Columns reserved for the sign gutter
const SIGN_WIDTH: usize = 2;

/// Truncate/pad `text` to exactly `width` display columns
fn fit_width(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push_str(&" ".repeat(width - used));
    out
}

/// Visible lines of a pane: sign gutter, line number, content
pub fn build_pane_lines(
    pane: &Pane,
    sign_text: &str,
    focused: bool,
    selection: Option<(u32, u32)>,
    height: usize,
) -> Vec<Line<'static>> {
    let number_width = pane.lines.len().to_string().len().max(3);
    let sign = fit_width(sign_text, SIGN_WIDTH);
    let blank_sign = " ".repeat(SIGN_WIDTH);

    pane.lines
        .iter()
        .enumerate()
        .skip(pane.scroll)
        .take(height)
        .map(|(i, content)| {
            let line_no = i as u32 + 1;
            let selected = selection.is_some_and(|(start, end)| (start..=end).contains(&line_no));
            let style = if focused && selected {
                Style::default().bg(Color::Blue)
            } else if focused && line_no == pane.cursor {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };

            let gutter = if pane.signs.contains(&line_no) {
                Span::styled(sign.clone(), Style::default().fg(Color::Yellow))
            } else {
                Span::raw(blank_sign.clone())
            };
            Line::from(vec![
                gutter,
                Span::styled(
                    format!("{:>width$} ", line_no, width = number_width),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(content.replace('\t', "    ")),
            ])
            .style(style)
        })
        .collect()
}

pub fn render(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(0),    // Panes
            Constraint::Length(1), // Footer
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    // 左右 50% ずつ
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);

    let height = panes[0].height.saturating_sub(2) as usize;
    app.view.viewport = height;
    app.view.left.adjust_scroll(height);
    app.view.right.adjust_scroll(height);

    render_pane(frame, app, Side::Left, panes[0]);
    render_pane(frame, app, Side::Right, panes[1]);

    let help = footer::build_help_text(&app.config.keybindings);
    let footer = Paragraph::new(footer::build_footer_line(app, &help));
    frame.render_widget(footer, chunks[2]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let pr_info = match &app.controller {
        Some(controller) => format!("PR #{} {}", controller.pr().number, controller.pr().repo),
        None => "local diff".to_string(),
    };
    let file_info = match &app.view.path {
        Some(path) => format!("{} ({}/{})", path, app.selected_file + 1, app.files.len()),
        None => "no file".to_string(),
    };
    let header = Line::from(vec![
        Span::styled(
            "prsign",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" │ {} │ {}", pr_info, file_info)),
    ]);
    frame.render_widget(Paragraph::new(header), area);
}

fn render_pane(frame: &mut Frame, app: &App, side: Side, area: Rect) {
    let focused = app.view.focus == side;
    let border_color = if focused {
        Color::Yellow
    } else {
        Color::DarkGray
    };
    let title = match side {
        Side::Left => " LEFT (base) ",
        Side::Right => " RIGHT (working tree) ",
    };
    let selection = match app.mode {
        Mode::Visual { anchor } => {
            let cursor = app.view.pane(side).cursor;
            Some((anchor.min(cursor), anchor.max(cursor)))
        }
        Mode::Normal => None,
    };

    let lines = build_pane_lines(
        app.view.pane(side),
        &app.config.signs.text,
        focused,
        selection,
        area.height.saturating_sub(2) as usize,
    );
    let pane = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .title(title),
    );
    frame.render_widget(pane, area);
}
