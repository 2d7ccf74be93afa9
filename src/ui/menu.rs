use chrono::DateTime;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthChar;

use crate::github::ReviewComment;
use crate::host::LineMenu;
use crate::index::LineThreads;

/// Wrap text to fit within the specified width, handling multibyte characters
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_width = 0;

    for ch in text.chars() {
        let char_width = ch.width().unwrap_or(1);
        if current_width + char_width > max_width {
            lines.push(std::mem::take(&mut current_line));
            current_width = 0;
        }
        current_line.push(ch);
        current_width += char_width;
    }

    if !current_line.is_empty() || lines.is_empty() {
        lines.push(current_line);
    }
    lines
}

/// "2024-03-05T09:07:00Z" -> "2024-03-05 09:07". Unparseable values are shown as is.
pub fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn push_comment(lines: &mut Vec<Line<'static>>, comment: &ReviewComment, indent: usize, width: usize) {
    let header_indent = indent.saturating_sub(2);
    let marker = if indent > 2 { "↳ " } else { "" };
    lines.push(Line::from(vec![
        Span::raw(format!("{}{}", " ".repeat(header_indent), marker)),
        Span::styled(
            format!("@{}", comment.author()),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            format!(" · {}", format_timestamp(&comment.created_at)),
            Style::default().fg(Color::DarkGray),
        ),
    ]));

    let body_width = width.saturating_sub(indent);
    for body_line in comment.body.lines() {
        for wrapped in wrap_text(body_line, body_width) {
            lines.push(Line::from(format!("{}{}", " ".repeat(indent), wrapped)));
        }
    }
}

/// Thread view: each root with its replies indented below it
pub fn build_thread_lines(threads: &LineThreads, width: usize) -> Vec<Line<'static>> {
    if threads.is_empty() {
        return vec![Line::from(Span::styled(
            "No comments on this line",
            Style::default().fg(Color::DarkGray),
        ))];
    }

    let mut lines = Vec::new();
    for (i, root) in threads.roots.iter().enumerate() {
        if i > 0 {
            lines.push(Line::from(""));
        }
        push_comment(&mut lines, root, 2, width);
        for reply in threads.replies(root.id) {
            push_comment(&mut lines, reply, 4, width);
        }
    }
    lines
}

pub fn render(frame: &mut Frame, menu: &LineMenu, selected: usize) {
    let area = frame.area();
    let modal_width = (area.width as f32 * 0.8) as u16;
    let modal_height = (area.height as f32 * 0.7) as u16;
    let modal_area = Rect::new(
        area.width.saturating_sub(modal_width) / 2,
        area.height.saturating_sub(modal_height) / 2,
        modal_width,
        modal_height,
    );
    frame.render_widget(Clear, modal_area);

    let title = format!(" {}:{} ({}) ", menu.path, menu.line, menu.side);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(title);
    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);

    let actions_height = (menu.actions.len() as u16 + 1).min(inner.height / 2);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(actions_height)])
        .split(inner);

    let thread = Paragraph::new(build_thread_lines(&menu.threads, inner.width as usize));
    frame.render_widget(thread, chunks[0]);

    // 選択行が見えるように先頭をずらす
    let visible = chunks[1].height.saturating_sub(1) as usize;
    let skip = (selected + 1).saturating_sub(visible);
    let items: Vec<ListItem> = menu
        .actions
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(i, (_, label))| {
            if i == selected {
                ListItem::new(format!("> {}", label)).style(
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                ListItem::new(format!("  {}", label))
            }
        })
        .collect();
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    frame.render_widget(list, chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{Side, User};
    use crate::index;
    use insta::assert_snapshot;

    fn comment(id: u64, login: &str, body: &str, at: &str, parent: Option<u64>) -> ReviewComment {
        ReviewComment {
            id,
            path: "src/lib.rs".to_string(),
            line: Some(12),
            side: Some(Side::Right),
            body: body.to_string(),
            user: User {
                login: login.to_string(),
            },
            created_at: at.to_string(),
            in_reply_to_id: parent,
        }
    }

    fn to_text(lines: &[Line]) -> String {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_wrap_text_multibyte() {
        assert_eq!(wrap_text("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap_text("日本語です", 4), vec!["日本", "語で", "す"]);
        assert_eq!(wrap_text("", 4), vec![""]);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp("2024-03-05T09:07:00Z"), "2024-03-05 09:07");
        assert_eq!(format_timestamp("yesterday"), "yesterday");
    }

    #[test]
    fn test_thread_lines() {
        let comments = vec![
            comment(
                1,
                "alice",
                "Looks off by one.\nShould be `<=`.",
                "2024-03-05T09:07:00Z",
                None,
            ),
            comment(2, "bob", "Good catch", "2024-03-05T10:00:00Z", Some(1)),
            comment(3, "carol", "Also rename this", "2024-03-06T08:30:00Z", None),
        ];
        let threads = index::comments_on_line(&comments, "src/lib.rs", 12, Side::Right);
        let text = to_text(&build_thread_lines(&threads, 40));
        assert_snapshot!(text, @r"
        @alice · 2024-03-05 09:07
          Looks off by one.
          Should be `<=`.
          ↳ @bob · 2024-03-05 10:00
            Good catch

        @carol · 2024-03-06 08:30
          Also rename this
        ");
    }

    #[test]
    fn test_empty_thread() {
        let text = to_text(&build_thread_lines(&LineThreads::default(), 40));
        assert_eq!(text, "No comments on this line");
    }
}
