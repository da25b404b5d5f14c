use chrono::{DateTime, Local};
use logs_console::{Emphasis, FormattedLine, Outcome, PollState, SessionEnd, TestStatus};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

pub(crate) fn truncate_left(s: &str, max_len: usize) -> String {
    let len = s.chars().count();
    if len <= max_len {
        s.to_string()
    } else {
        let keep = max_len.saturating_sub(3);
        let tail: String = s.chars().skip(len - keep).collect();
        format!("...{}", tail)
    }
}

pub(crate) fn truncate_message(msg: &str, max_len: usize) -> String {
    if msg.chars().count() <= max_len {
        msg.to_string()
    } else {
        let truncated: String = msg.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

pub(crate) fn status_style(status: Option<&TestStatus>) -> Style {
    let color = match status {
        Some(TestStatus::Success) => Color::Green,
        Some(TestStatus::Failed) | Some(TestStatus::Error) => Color::Red,
        Some(TestStatus::Running) => Color::Blue,
        Some(TestStatus::Queued) => Color::Yellow,
        Some(TestStatus::Other(_)) | None => return Style::default(),
    };
    Style::default().fg(color)
}

/// Short description of where a target's session stands
pub(crate) fn poll_label(state: PollState, ended: Option<&SessionEnd>, polling: bool) -> String {
    match ended {
        Some(SessionEnd::Terminated(_)) => "done".to_string(),
        Some(SessionEnd::Completed) => "completed".to_string(),
        Some(SessionEnd::Cancelled) => "paused".to_string(),
        None if polling => state.to_string(),
        None => "-".to_string(),
    }
}

/// Formats an arrival time as HH:MM:SS
pub(crate) fn format_updated(at: Option<&DateTime<Local>>) -> String {
    at.map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Terminal styling of a classified log line, truncated to `max_len` per run
pub(crate) fn styled_line(line: &FormattedLine, max_len: usize) -> Line<'static> {
    let span = |text: &str, style: Style| Span::styled(truncate_message(text, max_len), style);

    match line {
        FormattedLine::Empty => Line::default(),
        FormattedLine::Plain(text) => Line::from(span(text, Style::default())),
        FormattedLine::Emphasis(emphasis, text) => {
            let modifier = match emphasis {
                Emphasis::Underline => Modifier::UNDERLINED,
                Emphasis::Bold => Modifier::BOLD,
                Emphasis::Italic => Modifier::ITALIC,
            };
            Line::from(span(text, Style::default().add_modifier(modifier)))
        }
        FormattedLine::Verbose(runs) => {
            let style = Style::default().fg(Color::DarkGray);
            let mut spans = Vec::with_capacity(runs.len() * 2);
            for (i, run) in runs.iter().enumerate() {
                if i > 0 {
                    spans.push(Span::styled(" · ", style));
                }
                spans.push(span(run, style));
            }
            Line::from(spans)
        }
        FormattedLine::Status(outcome, text) => {
            let color = match outcome {
                Outcome::Success => Color::Green,
                Outcome::Failure => Color::Red,
            };
            Line::from(span(text, Style::default().fg(color)))
        }
    }
}
