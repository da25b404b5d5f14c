use chrono::Local;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use eyre::Result;
use logs_console::{get_feed_port, Dialect, PollerConfig, RenderedLine, Toggle};
use ratatui::{
    layout::{Constraint, Layout},
    style::Stylize,
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Paragraph, TableState},
    DefaultTerminal, Frame,
};
use std::io;
use std::path::PathBuf;
use std::sync::PoisonError;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::http::{feed_logs_url, fetch_feeds};
use super::state::{Focus, TargetEntry};
use super::views::inspect::render_inspect_popup;
use super::views::logs::{render_logs_panel, render_logs_placeholder};
use super::views::targets::render_targets_panel;
use crate::cmd::{init_file_tracing, poller_config};

#[derive(Debug, Parser)]
pub struct ConsoleArgs {
    /// Log endpoints to watch
    pub urls: Vec<String>,

    /// Feed server whose /feeds listing is watched. Defaults to
    /// http://127.0.0.1:<LOGS_CONSOLE_PORT> when no URL is given
    #[arg(long)]
    pub server: Option<String>,

    /// Seconds between polls (defaults to LOGS_CONSOLE_POLL_INTERVAL or 10)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Wire dialect of the endpoints: status or done-flag
    #[arg(long, default_value = "status")]
    pub dialect: Dialect,

    /// Maximum number of lines per request
    #[arg(long)]
    pub limit: Option<usize>,

    /// Write logs to this file, nothing is logged otherwise
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub(crate) struct App {
    targets: Vec<TargetEntry>,
    config: PollerConfig,
    server: Option<String>,
    agent: ureq::Agent,
    error: Option<String>,
    exit: bool,
    last_refresh: Instant,
    last_successful_fetch: Option<Instant>,
    last_render_duration: Duration,
    table_state: TableState,
    logs_table_state: TableState,
    focus: Focus,
    inspected: Option<(usize, RenderedLine)>,
}

impl ConsoleArgs {
    pub fn run(&self) -> Result<()> {
        if let Some(path) = &self.log_file {
            init_file_tracing(path, self.verbose)?;
        }

        let config = poller_config(self.interval, self.dialect, self.limit);
        let server = match &self.server {
            Some(server) => Some(server.clone()),
            None if self.urls.is_empty() => Some(format!("http://127.0.0.1:{}", get_feed_port())),
            None => None,
        };
        info!(urls = ?self.urls, server = ?server, interval = ?config.interval, "console started");

        let targets: Vec<TargetEntry> = self
            .urls
            .iter()
            .map(|url| TargetEntry::new(url.as_str(), url.as_str(), config.clone()))
            .collect();
        let selected = (!targets.is_empty()).then_some(0);

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_millis(1500)))
            .build()
            .into();

        let mut app = App {
            targets,
            config,
            server,
            agent,
            error: None,
            exit: false,
            last_refresh: Instant::now(),
            last_successful_fetch: None,
            last_render_duration: Duration::from_millis(0),
            table_state: TableState::default().with_selected(selected),
            logs_table_state: TableState::default(),
            focus: Focus::Targets,
            inspected: None,
        };

        let mut terminal = ratatui::init();
        let app_result = app.run(&mut terminal);
        ratatui::restore();
        app_result.map_err(|e| eyre::eyre!("TUI error: {}", e))
    }
}

impl App {
    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> io::Result<()> {
        const LISTING_INTERVAL: Duration = Duration::from_millis(1000);

        self.refresh_listing();

        while !self.exit {
            if self.last_refresh.elapsed() >= LISTING_INTERVAL {
                self.refresh_listing();
            }
            for entry in &mut self.targets {
                entry.drain_events();
            }

            let render_start = Instant::now();
            terminal.draw(|frame| self.draw(frame))?;
            self.last_render_duration = render_start.elapsed();

            self.handle_events()?;
        }
        Ok(())
    }

    /// Picks up feeds published on the watched server.
    fn refresh_listing(&mut self) {
        let Some(server) = self.server.clone() else {
            return;
        };

        match fetch_feeds(&self.agent, &server) {
            Ok(feeds) => {
                for feed in feeds {
                    let url = feed_logs_url(&server, &feed.id);
                    match self.targets.iter_mut().find(|entry| entry.url == url) {
                        Some(entry) => entry.listed = Some(feed),
                        None => {
                            debug!(id = %feed.id, "feed discovered");
                            let mut entry =
                                TargetEntry::new(feed.id.as_str(), url, self.config.clone());
                            entry.listed = Some(feed);
                            self.targets.push(entry);
                        }
                    }
                }
                self.error = None;
                self.last_successful_fetch = Some(Instant::now());

                if self.table_state.selected().is_none() && !self.targets.is_empty() {
                    self.table_state.select(Some(0));
                }
            }
            Err(e) => {
                warn!(server = %server, error = %e, "feed listing failed");
                self.error = Some(format!("Failed to fetch feeds: {}", e));
            }
        }
        self.last_refresh = Instant::now();
    }

    fn draw(&mut self, frame: &mut Frame) {
        self.render_ui(frame);
    }

    fn handle_events(&mut self) -> io::Result<()> {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press {
                    self.handle_key_event(key_event);
                }
            }
        }
        Ok(())
    }

    fn handle_key_event(&mut self, key_event: KeyEvent) {
        match key_event.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => self.exit(),
            KeyCode::Char('o') | KeyCode::Char('O') => match self.focus {
                Focus::Inspect => self.close_inspect_and_hide_logs(),
                Focus::Logs | Focus::Targets => self.toggle_logs(),
            },
            KeyCode::Char('p') | KeyCode::Char('P') => self.toggle_polling(),
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('H') => {
                if self.focus == Focus::Inspect {
                    self.close_inspect_only();
                } else {
                    self.focus_targets();
                }
            }
            KeyCode::Right | KeyCode::Char('l') => self.focus_logs(),
            KeyCode::Char('i') | KeyCode::Char('I') => self.toggle_inspect(),
            KeyCode::Up | KeyCode::Char('k') => match self.focus {
                Focus::Targets => self.select_previous_target(),
                Focus::Logs | Focus::Inspect => self.select_previous_log(),
            },
            KeyCode::Down | KeyCode::Char('j') => match self.focus {
                Focus::Targets => self.select_next_target(),
                Focus::Logs | Focus::Inspect => self.select_next_log(),
            },
            _ => {}
        }
    }

    fn selected_index(&self) -> Option<usize> {
        self.table_state
            .selected()
            .filter(|&i| i < self.targets.len())
    }

    fn selected_entry(&self) -> Option<&TargetEntry> {
        self.selected_index().and_then(|i| self.targets.get(i))
    }

    /// Whether the selected target's logs are on screen.
    fn show_logs(&self) -> bool {
        self.selected_entry()
            .map(|entry| {
                entry
                    .target()
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_visible()
            })
            .unwrap_or(false)
    }

    fn selected_log_count(&self) -> usize {
        self.selected_entry()
            .map(|entry| {
                entry
                    .target()
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .len()
            })
            .unwrap_or(0)
    }

    fn selected_log(&self, index: usize) -> Option<RenderedLine> {
        let entry = self.selected_entry()?;
        let target = entry.target();
        let target = target.read().unwrap_or_else(PoisonError::into_inner);
        target.lines().get(index).cloned()
    }

    fn select_previous_target(&mut self) {
        if !self.targets.is_empty() {
            let i = match self.table_state.selected() {
                Some(i) => i.saturating_sub(1),
                None => 0,
            };
            self.table_state.select(Some(i));
            self.logs_table_state = TableState::default();
        }
    }

    fn select_next_target(&mut self) {
        if !self.targets.is_empty() {
            let i = match self.table_state.selected() {
                Some(i) => (i + 1).min(self.targets.len() - 1),
                None => 0,
            };
            self.table_state.select(Some(i));
            self.logs_table_state = TableState::default();
        }
    }

    /// Loads the selected target's log on first use and starts polling it,
    /// afterwards shows or hides it.
    fn toggle_logs(&mut self) {
        let Some(i) = self.selected_index() else {
            return;
        };
        let entry = &mut self.targets[i];

        match entry.poller.start_or_toggle() {
            Ok(Toggle::Loaded(lines)) => {
                debug!(url = %entry.url, lines, "log loaded");
                entry.last_update = Some(Local::now());
                entry.error = None;
                if let Err(e) = entry.start_session() {
                    self.error = Some(format!("Failed to start polling: {}", e));
                }
            }
            Ok(Toggle::Shown) => {}
            Ok(Toggle::Hidden) => {
                self.focus = Focus::Targets;
                self.logs_table_state = TableState::default();
            }
            Err(e) => {
                warn!(url = %entry.url, error = %e, "log load failed");
                entry.error = Some(e.to_string());
            }
        }
    }

    fn toggle_polling(&mut self) {
        let Some(i) = self.selected_index() else {
            return;
        };
        let entry = &mut self.targets[i];

        if entry.is_polling() {
            entry.stop_session();
        } else if let Err(e) = entry.start_session() {
            self.error = Some(format!("Failed to start polling: {}", e));
        }
    }

    fn focus_targets(&mut self) {
        self.focus = Focus::Targets;
        // Clear logs table selection when not focused
        self.logs_table_state.select(None);
    }

    fn focus_logs(&mut self) {
        // Only allow focus if there are actual logs to display
        if self.show_logs() && self.selected_log_count() > 0 {
            self.focus = Focus::Logs;
            if self.logs_table_state.selected().is_none() {
                let last = self.selected_log_count() - 1;
                self.logs_table_state.select(Some(last));
            }
        }
    }

    fn select_previous_log(&mut self) {
        if self.selected_log_count() > 0 {
            let i = match self.logs_table_state.selected() {
                Some(i) => i.saturating_sub(1),
                None => 0,
            };
            self.logs_table_state.select(Some(i));
            self.refresh_inspected(i);
        }
    }

    fn select_next_log(&mut self) {
        let log_count = self.selected_log_count();
        if log_count > 0 {
            let i = match self.logs_table_state.selected() {
                Some(i) => (i + 1).min(log_count - 1),
                None => 0,
            };
            self.logs_table_state.select(Some(i));
            self.refresh_inspected(i);
        }
    }

    /// Keeps the inspect popup on the selected line while it is open.
    fn refresh_inspected(&mut self, index: usize) {
        if self.focus == Focus::Inspect {
            if let Some(line) = self.selected_log(index) {
                self.inspected = Some((index, line));
            }
        }
    }

    fn toggle_inspect(&mut self) {
        if self.focus == Focus::Inspect {
            self.focus = Focus::Logs;
            self.inspected = None;
        } else if self.focus == Focus::Logs {
            if let Some(selected) = self.logs_table_state.selected() {
                if let Some(line) = self.selected_log(selected) {
                    self.inspected = Some((selected, line));
                    self.focus = Focus::Inspect;
                }
            }
        }
    }

    fn close_inspect_and_hide_logs(&mut self) {
        self.inspected = None;
        self.toggle_logs();
        self.focus_targets();
    }

    fn close_inspect_only(&mut self) {
        self.inspected = None;
        self.focus_targets();
    }

    fn exit(&mut self) {
        for entry in &self.targets {
            entry.stop_session();
        }
        self.exit = true;
    }
}

impl App {
    fn render_ui(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let title = Line::from(" Logs Console ".bold());

        let refresh_status = match self.last_successful_fetch {
            Some(last_fetch) if self.server.is_some() => {
                let seconds = last_fetch.elapsed().as_secs();
                if self.error.is_some() {
                    format!("⚠ {}s ", seconds)
                } else {
                    format!("🔄 {}s ", seconds)
                }
            }
            _ => String::new(),
        };

        let mut controls: Vec<Span> = match self.focus {
            Focus::Targets => vec![
                " Quit ".into(),
                "<q> ".blue().bold(),
                " | ".into(),
                "<↑↓←→/jkhl> ".blue().bold(),
                " | Logs ".into(),
                "<o> ".blue().bold(),
                " | Poll ".into(),
                "<p> ".blue().bold(),
            ],
            Focus::Logs => vec![
                " Quit ".into(),
                "<q> ".blue().bold(),
                " | ".into(),
                "<↑↓←→/jkhl> ".blue().bold(),
                " | Inspect ".into(),
                "<i> ".blue().bold(),
                " | Poll ".into(),
                "<p> ".blue().bold(),
            ],
            Focus::Inspect => vec![
                " Quit ".into(),
                "<q> ".blue().bold(),
                " | ".into(),
                "<↑↓/jk> ".blue().bold(),
                " | Close ".into(),
                "<i/o/h> ".blue().bold(),
            ],
        };
        if !refresh_status.is_empty() {
            controls.push(" | ".into());
            controls.push(refresh_status.yellow());
        }
        let bottom_line = Line::from(controls);

        #[cfg(feature = "dev")]
        let block = {
            let render_time_ms = self.last_render_duration.as_millis();
            let render_time_text = if render_time_ms < 10 {
                format!("  {}ms ", render_time_ms)
            } else {
                format!(" {}ms ", render_time_ms)
            };

            Block::bordered()
                .title(title.centered())
                .title_bottom(bottom_line.centered())
                .title_bottom(Line::from(render_time_text).cyan().right_aligned())
                .border_set(border::THICK)
        };

        #[cfg(not(feature = "dev"))]
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(bottom_line.centered())
            .border_set(border::THICK);

        if self.targets.is_empty() {
            let text = match (&self.error, &self.server) {
                (Some(error_msg), Some(server)) => vec![
                    Line::from(""),
                    Line::from("Error").red().bold().centered(),
                    Line::from(""),
                    Line::from(error_msg.as_str()).red().centered(),
                    Line::from(""),
                    Line::from(format!(
                        "Make sure the feed server is running on {}",
                        server
                    ))
                    .yellow()
                    .centered(),
                ],
                _ => vec![
                    Line::from(""),
                    Line::from("No log feeds found").yellow().centered(),
                    Line::from(""),
                    Line::from("Pass log URLs or publish a feed with `logs-console serve`")
                        .centered(),
                ],
            };

            frame.render_widget(Paragraph::new(text).block(block), area);
            return;
        }

        let inner_area = block.inner(area);
        frame.render_widget(block, area);

        let show_logs = self.show_logs();

        // Split the inner area if logs are being shown
        let (table_area, logs_area) = if show_logs {
            let chunks = Layout::default()
                .direction(ratatui::layout::Direction::Horizontal)
                .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
                .split(inner_area);
            (chunks[0], Some(chunks[1]))
        } else {
            (inner_area, None)
        };

        render_targets_panel(
            &self.targets,
            table_area,
            frame,
            &mut self.table_state,
            show_logs,
            self.focus,
        );

        if let Some(logs_area) = logs_area {
            let selected = self.selected_index().and_then(|i| self.targets.get(i));
            if let Some(entry) = selected {
                let label = match entry.display_status() {
                    Some(status) => format!("{} ({})", entry.label, status),
                    None => entry.label.clone(),
                };
                let target = entry.target();
                let target = target.read().unwrap_or_else(PoisonError::into_inner);

                if target.is_empty() {
                    let message = if entry.error.is_some() {
                        "(cannot fetch new data)"
                    } else {
                        "(no lines yet)"
                    };
                    render_logs_placeholder(&label, message, logs_area, frame);
                } else {
                    render_logs_panel(
                        &target,
                        &label,
                        logs_area,
                        frame,
                        &mut self.logs_table_state,
                        self.focus != Focus::Targets,
                    );
                }
            }
        }

        // Render inspect popup on top of everything if open
        if self.focus == Focus::Inspect {
            if let Some((index, ref line)) = self.inspected {
                render_inspect_popup(index, line, area, frame);
            }
        }
    }
}
