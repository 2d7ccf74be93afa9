use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::CommentPreview;

pub fn render(frame: &mut Frame, preview: &CommentPreview) {
    let area = frame.area();
    let modal_width = (area.width as f32 * 0.7) as u16;
    let modal_height = (area.height as f32 * 0.5) as u16;
    let modal_area = Rect::new(
        area.width.saturating_sub(modal_width) / 2,
        area.height.saturating_sub(modal_height) / 2,
        modal_width,
        modal_height,
    );
    frame.render_widget(Clear, modal_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green))
        .title(format!(" {} ", preview.title))
        .title_bottom(" Enter: submit | Esc: discard ");
    let body = Paragraph::new(preview.body.as_str())
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(body, modal_area);
}
