use crate::format::{classify, FormattedLine};
use std::sync::{Arc, RwLock};

/// Target shared between a polling session and its host.
pub type SharedTarget = Arc<RwLock<RenderTarget>>;

/// A raw log line together with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    pub raw: String,
    pub formatted: FormattedLine,
}

impl RenderedLine {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let formatted = classify(&raw);
        Self { raw, formatted }
    }

    /// The `<li>` item for this line. Multi-run verbose lines nest their runs
    /// so that one log line is always one item.
    pub fn to_html(&self) -> String {
        if self.formatted.is_list() {
            format!(
                "<li><ol class=\"verbose\">{}</ol></li>",
                self.formatted.to_html()
            )
        } else {
            format!("<li>{}</li>", self.formatted.to_html())
        }
    }
}

/// Ordered, append-only list of rendered log lines.
#[derive(Debug, Clone, Default)]
pub struct RenderTarget {
    lines: Vec<RenderedLine>,
    attached: bool,
    visible: bool,
}

impl RenderTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedTarget {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Number of rendered lines, which is also the next fetch offset.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[RenderedLine] {
        &self.lines
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Renders and appends lines in order, returning how many were added.
    pub fn append<I, S>(&mut self, lines: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.lines.len();
        self.lines.extend(lines.into_iter().map(RenderedLine::new));
        self.lines.len() - before
    }

    /// Marks the `<ol class="logs">` as created and shows it.
    pub fn attach(&mut self) {
        self.attached = true;
        self.visible = true;
    }

    /// Flips visibility and returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.visible = !self.visible;
        self.visible
    }

    /// List items for the lines starting at `from`, as appended to an
    /// existing list by an incremental update.
    pub fn items_html(&self, from: usize) -> String {
        self.lines
            .iter()
            .skip(from)
            .map(RenderedLine::to_html)
            .collect()
    }

    /// The full ordered list.
    pub fn to_html(&self) -> String {
        format!("<ol class=\"logs\">{}</ol>", self.items_html(0))
    }
}
