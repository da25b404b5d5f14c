use clap::Parser;
use colored::Colorize;
use crossbeam_channel::unbounded;
use eyre::{eyre, Result, WrapErr};
use logs_console::{
    spawn, Dialect, Emphasis, Format, FormattedLine, Outcome, PollEvent, RenderedLine,
    ResyncReason, SessionEnd, SessionSummary, TestStatus,
};
use std::sync::{Arc, PoisonError};
use tracing::info;

use super::{http_poller, init_tracing, poller_config};

#[derive(Debug, Parser)]
pub struct TailArgs {
    /// Log endpoint, e.g. http://127.0.0.1:6780/feeds/demo/logs
    pub url: String,

    /// Seconds between polls (defaults to LOGS_CONSOLE_POLL_INTERVAL or 10)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Wire dialect of the endpoint: status or done-flag
    #[arg(long, default_value = "status")]
    pub dialect: Dialect,

    /// Maximum number of lines per request
    #[arg(long)]
    pub limit: Option<usize>,

    /// Print rendered <li> items instead of styled text
    #[arg(long)]
    pub html: bool,

    /// Summary format: table, json or json-pretty
    #[arg(long, default_value = "table")]
    pub format: Format,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl TailArgs {
    pub fn run(&self) -> Result<()> {
        init_tracing(self.verbose);

        let config = poller_config(self.interval, self.dialect, self.limit);
        info!(url = %self.url, interval = ?config.interval, dialect = ?config.dialect, "tailing");
        let poller = http_poller(&self.url, config);
        let target = poller.target();

        let (events_tx, events_rx) = unbounded();
        let handle = spawn(Arc::clone(&poller), Some(events_tx))
            .wrap_err("Failed to start the poll thread")?;
        let mut summary = SessionSummary::new(&self.url);

        for event in events_rx.iter() {
            summary.record(&event);
            match &event {
                // Printed from the event, the target may already be rebuilt.
                PollEvent::Appended { lines, .. } => {
                    for raw in lines {
                        self.print_line(&RenderedLine::new(raw.as_str()));
                    }
                }
                PollEvent::Resynced { reason, lines } => {
                    let notice = match reason {
                        ResyncReason::Completed => format!("-- log completed, {} lines --", lines),
                        ResyncReason::Transport(_) => format!("-- reloaded {} lines --", lines),
                    };
                    eprintln!("{}", notice.yellow());
                    let target = target.read().unwrap_or_else(PoisonError::into_inner);
                    for line in target.lines() {
                        self.print_line(line);
                    }
                }
                PollEvent::ResyncFailed(err) => {
                    eprintln!("{}", format!("-- reload failed: {} --", err).red());
                }
                PollEvent::Finished(_) => break,
            }
        }

        let end = handle.join();
        summary.print(self.format);

        match end {
            SessionEnd::Terminated(Some(status)) if status != TestStatus::Success => {
                Err(eyre!("Test run ended with status {}", status))
            }
            _ => Ok(()),
        }
    }

    fn print_line(&self, line: &RenderedLine) {
        if self.html {
            println!("{}", line.to_html());
        } else {
            println!("{}", styled(&line.formatted));
        }
    }
}

/// Terminal rendering of a classified line.
fn styled(line: &FormattedLine) -> String {
    match line {
        FormattedLine::Empty => String::new(),
        FormattedLine::Plain(text) => text.clone(),
        FormattedLine::Emphasis(Emphasis::Underline, text) => text.underline().to_string(),
        FormattedLine::Emphasis(Emphasis::Bold, text) => text.bold().to_string(),
        FormattedLine::Emphasis(Emphasis::Italic, text) => text.italic().to_string(),
        FormattedLine::Verbose(runs) => runs
            .iter()
            .map(|run| format!("  {}", run.dimmed()))
            .collect::<Vec<_>>()
            .join("\n"),
        FormattedLine::Status(Outcome::Success, text) => text.green().to_string(),
        FormattedLine::Status(Outcome::Failure, text) => text.red().to_string(),
    }
}
