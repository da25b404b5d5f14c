use crate::cmd::console::widgets::formatters::styled_line;
use logs_console::RenderTarget;
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    symbols::border,
    text::Text,
    widgets::{Block, Cell, HighlightSpacing, Row, Table, TableState},
    Frame,
};

/// Renders a placeholder when no logs are available
pub(crate) fn render_logs_placeholder(label: &str, message: &str, area: Rect, frame: &mut Frame) {
    let block = Block::bordered()
        .title(format!(" {} ", label))
        .border_set(border::THICK);

    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let message_width = message.len() as u16;
    let x = inner_area.x + (inner_area.width.saturating_sub(message_width)) / 2;
    let y = inner_area.y + inner_area.height / 2;

    if x < inner_area.x + inner_area.width && y < inner_area.y + inner_area.height {
        frame
            .buffer_mut()
            .set_string(x, y, message, Style::default().fg(Color::DarkGray));
    }
}

/// Renders the rendered lines of a target. Unless focused, the panel follows
/// the newest lines.
pub(crate) fn render_logs_panel(
    target: &RenderTarget,
    label: &str,
    area: Rect,
    frame: &mut Frame,
    table_state: &mut TableState,
    is_focused: bool,
) {
    let border_set = if is_focused {
        border::THICK
    } else {
        border::PLAIN
    };

    let block = Block::bordered()
        .title(format!(" {} ", label))
        .border_set(border_set)
        .style(if is_focused {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        });

    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let msg_width = (inner_area.width.saturating_sub(10) as usize).max(20);

    let header_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let header = Row::new(vec!["#", "Line"]).style(header_style).height(1);

    let rows: Vec<Row> = target
        .lines()
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let row = Row::new(vec![
                Cell::from(index.to_string()),
                Cell::from(styled_line(&line.formatted, msg_width)),
            ]);

            if !is_focused {
                row.style(Style::default().fg(Color::DarkGray))
            } else {
                row
            }
        })
        .collect();

    if !is_focused {
        let visible_rows = inner_area.height.saturating_sub(1) as usize;
        *table_state.offset_mut() = rows.len().saturating_sub(visible_rows);
    }

    let widths = [Constraint::Length(6), Constraint::Min(20)];

    let selected_row_style = Style::default()
        .add_modifier(Modifier::REVERSED)
        .bg(Color::DarkGray);

    let table = Table::new(rows, widths)
        .header(header)
        .row_highlight_style(selected_row_style)
        .highlight_symbol(Text::from(">"))
        .highlight_spacing(HighlightSpacing::Always);

    frame.render_stateful_widget(table, inner_area, table_state);
}
