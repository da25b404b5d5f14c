use crate::cmd::console::state::{Focus, TargetEntry};
use crate::cmd::console::widgets::formatters::{
    format_updated, poll_label, status_style, truncate_left,
};
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    symbols::border,
    text::Text,
    widgets::{Block, Cell, HighlightSpacing, Row, Table, TableState},
    Frame,
};
use std::sync::PoisonError;

/// Renders the targets table with the state of each polled log
pub(crate) fn render_targets_panel(
    targets: &[TargetEntry],
    area: Rect,
    frame: &mut Frame,
    table_state: &mut TableState,
    show_logs: bool,
    focus: Focus,
) {
    let available_width = area.width.saturating_sub(10);
    let label_width = ((available_width as f32 * 0.4) as usize).max(16);

    let header_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let header = Row::new(vec![
        Cell::from("Target"),
        Cell::from("Status"),
        Cell::from("Lines"),
        Cell::from("Poll"),
        Cell::from("Updated"),
    ])
    .style(header_style)
    .height(1);

    let rows: Vec<Row> = targets
        .iter()
        .map(|entry| {
            let rendered = entry
                .target()
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len();
            let lines = match &entry.listed {
                Some(feed) if feed.logs_count != rendered => {
                    format!("{}/{}", rendered, feed.logs_count)
                }
                _ => rendered.to_string(),
            };

            let status = entry.display_status();
            let status_cell = match (&entry.error, status) {
                (Some(_), _) => Cell::from("⚠ unreachable").style(Style::default().fg(Color::Red)),
                (None, Some(status)) => {
                    Cell::from(status.to_string()).style(status_style(Some(status)))
                }
                (None, None) => Cell::from("-"),
            };

            let row = Row::new(vec![
                Cell::from(truncate_left(&entry.label, label_width)),
                status_cell,
                Cell::from(lines),
                Cell::from(poll_label(
                    entry.poll_state(),
                    entry.ended.as_ref(),
                    entry.is_polling(),
                )),
                Cell::from(format_updated(entry.last_update.as_ref())),
            ]);

            // Dim the row if logs are shown and targets table is not focused
            if show_logs && !matches!(focus, Focus::Targets) {
                row.style(Style::default().fg(Color::DarkGray))
            } else {
                row
            }
        })
        .collect();

    let widths = [
        Constraint::Percentage(40), // Target
        Constraint::Percentage(18), // Status
        Constraint::Percentage(12), // Lines
        Constraint::Percentage(14), // Poll
        Constraint::Percentage(16), // Updated
    ];

    let selected_row_style = Style::default()
        .add_modifier(Modifier::REVERSED)
        .bg(Color::DarkGray);

    let position = table_state.selected().map(|i| i + 1).unwrap_or(0);
    let title = format!(" [{}/{}] ", position, targets.len());

    let table_block = if show_logs {
        let border_set = if focus == Focus::Targets {
            border::THICK
        } else {
            border::PLAIN
        };
        Block::bordered()
            .title(title)
            .border_set(border_set)
            .style(if focus == Focus::Targets {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            })
    } else {
        Block::bordered().title(title).border_set(border::THICK)
    };

    let table = Table::new(rows, widths)
        .header(header)
        .block(table_block)
        .column_spacing(1)
        .row_highlight_style(selected_row_style)
        .highlight_symbol(Text::from(">"))
        .highlight_spacing(HighlightSpacing::Always);

    frame.render_stateful_widget(table, area, table_state);
}
