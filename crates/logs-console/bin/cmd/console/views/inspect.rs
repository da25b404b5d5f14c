use logs_console::RenderedLine;
use ratatui::{
    layout::Rect,
    style::Stylize,
    symbols::border,
    text::Line,
    widgets::{Block, Clear, Paragraph, Wrap},
    Frame,
};

use crate::cmd::console::widgets::formatters::styled_line;

/// Renders a centered popup with the raw line, its styling and its HTML item
pub(crate) fn render_inspect_popup(index: usize, line: &RenderedLine, area: Rect, frame: &mut Frame) {
    // Center the popup at 80% of screen size
    let popup_width = (area.width as f32 * 0.8) as u16;
    let popup_height = (area.height as f32 * 0.8) as u16;
    let x = (area.width.saturating_sub(popup_width)) / 2;
    let y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect {
        x: area.x + x,
        y: area.y + y,
        width: popup_width,
        height: popup_height,
    };

    frame.render_widget(Clear, popup_area);

    let block = Block::bordered()
        .title(format!(" Log Line (Index: {}) ", index))
        .border_set(border::DOUBLE);

    let inner_area = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let text_lines = vec![
        Line::from("Raw").yellow().bold(),
        Line::from(line.raw.clone()),
        Line::from(""),
        Line::from("Rendered").yellow().bold(),
        styled_line(&line.formatted, usize::MAX),
        Line::from(""),
        Line::from("HTML").yellow().bold(),
        Line::from(line.to_html()),
    ];

    let paragraph = Paragraph::new(text_lines).wrap(Wrap { trim: false });

    frame.render_widget(paragraph, inner_area);
}
