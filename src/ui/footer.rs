use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};

use crate::app::App;
use crate::host::NotifyLevel;
use crate::keybinding::Keybindings;

/// One-line key hints built from the active keybindings
pub fn build_help_text(keys: &Keybindings) -> String {
    format!(
        "{}/{}: move | {}: visual | {}: comment | {}: suggest | {}: menu | {}/{}: comments | {}/{}: files | {}: refresh | {}: quit",
        keys.down.display(),
        keys.up.display(),
        keys.visual.display(),
        keys.comment.display(),
        keys.suggest.display(),
        keys.menu.display(),
        keys.next_comment.display(),
        keys.prev_comment.display(),
        keys.next_file.display(),
        keys.prev_file.display(),
        keys.refresh.display(),
        keys.quit.display(),
    )
}

/// Build footer line content based on app state.
///
/// A pending delete confirmation or comment preview takes the whole line.
/// Otherwise the help text is followed by the loading indicator and the last
/// notification.
pub fn build_footer_line<'a>(app: &'a App, help_text: &'a str) -> Line<'a> {
    if let Some(request) = &app.view.pending_confirm {
        return Line::from(vec![
            Span::styled(request.prompt.as_str(), Style::default().fg(Color::Yellow)),
            Span::raw(" "),
            Span::raw(app.view.confirm_input.as_str()),
        ]);
    }

    if app.view.pending_preview.is_some() {
        return Line::from(Span::styled(
            "Enter: submit comment | Esc: discard",
            Style::default().fg(Color::Green),
        ));
    }

    let mut spans = vec![Span::raw(help_text)];
    if app.comments_loading() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("{} Loading comments...", app.spinner_char()),
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some((level, message)) = &app.view.notification {
        let (icon, color) = match level {
            NotifyLevel::Info => ("\u{2713}", Color::Green),
            NotifyLevel::Warn => ("!", Color::Yellow),
            NotifyLevel::Error => ("\u{2717}", Color::Red),
        };
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("{} {}", icon, message),
            Style::default().fg(color),
        ));
    }
    Line::from(spans)
}
