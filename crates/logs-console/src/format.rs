use regex::Regex;
use std::sync::LazyLock;

const UNDERLINE_PREFIX: &str = ">>> ";
const BOLD_PREFIX: &str = ">>>> ";
const ITALIC_PREFIX: &str = ">>>>> ";
const VERBOSE_PREFIX: &str = ">>>>>> ";
const SUCCESS_PREFIX: &str = "[success]";
const FAILURE_PREFIX: &str = "[failure]";

/// Splits a verbose line into the runs started by each embedded marker.
static RE_VERBOSE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*>{6} ").expect("verbose marker pattern is valid"));

/// Inline emphasis selected by the number of leading chevrons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    Underline,
    Bold,
    Italic,
}

impl Emphasis {
    pub fn tag(&self) -> &'static str {
        match self {
            Emphasis::Underline => "u",
            Emphasis::Bold => "b",
            Emphasis::Italic => "i",
        }
    }
}

/// Outcome marker carried by `[success]` / `[failure]` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A raw log line after prefix classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormattedLine {
    Empty,
    Plain(String),
    Emphasis(Emphasis, String),
    /// One entry per verbose run found in the line, never empty.
    Verbose(Vec<String>),
    Status(Outcome, String),
}

impl FormattedLine {
    /// Renders the line as an HTML fragment.
    ///
    /// Unmatched text is returned verbatim, it is not escaped.
    pub fn to_html(&self) -> String {
        match self {
            FormattedLine::Empty => String::new(),
            FormattedLine::Plain(text) => text.clone(),
            FormattedLine::Emphasis(emphasis, text) => {
                format!("<{tag}>{text}</{tag}>", tag = emphasis.tag())
            }
            FormattedLine::Verbose(runs) => match runs.as_slice() {
                [single] => verbose_span(single),
                runs => runs
                    .iter()
                    .map(|run| format!("<li>{}</li>", verbose_span(run)))
                    .collect(),
            },
            FormattedLine::Status(outcome, text) => {
                format!("<span class='{}'>{}</span>", outcome, text)
            }
        }
    }

    /// Whether the HTML is a sequence of `<li>` items rather than inline content.
    pub fn is_list(&self) -> bool {
        matches!(self, FormattedLine::Verbose(runs) if runs.len() > 1)
    }
}

fn verbose_span(text: &str) -> String {
    format!("<span class='verbose'>{}</span>", text)
}

/// Classifies a raw line by its prefix. The first matching rule wins.
pub fn classify(line: &str) -> FormattedLine {
    if line.is_empty() {
        return FormattedLine::Empty;
    }

    if let Some(rest) = line.strip_prefix(VERBOSE_PREFIX) {
        return FormattedLine::Verbose(verbose_runs(rest));
    }
    if let Some(rest) = line.strip_prefix(ITALIC_PREFIX) {
        return FormattedLine::Emphasis(Emphasis::Italic, rest.to_string());
    }
    if let Some(rest) = line.strip_prefix(BOLD_PREFIX) {
        return FormattedLine::Emphasis(Emphasis::Bold, rest.to_string());
    }
    if let Some(rest) = line.strip_prefix(UNDERLINE_PREFIX) {
        return FormattedLine::Emphasis(Emphasis::Underline, rest.to_string());
    }
    if let Some(rest) = line.strip_prefix(SUCCESS_PREFIX) {
        return FormattedLine::Status(Outcome::Success, rest.to_string());
    }
    if let Some(rest) = line.strip_prefix(FAILURE_PREFIX) {
        return FormattedLine::Status(Outcome::Failure, rest.to_string());
    }

    FormattedLine::Plain(line.to_string())
}

fn verbose_runs(rest: &str) -> Vec<String> {
    let runs: Vec<String> = RE_VERBOSE_MARKER
        .split(rest)
        .filter(|run| !run.is_empty())
        .map(str::to_string)
        .collect();

    if runs.is_empty() {
        vec![String::new()]
    } else {
        runs
    }
}

/// Formats one raw log line as an HTML fragment. Absent lines format to `""`.
pub fn format_log<'a>(line: impl Into<Option<&'a str>>) -> String {
    match line.into() {
        Some(line) => classify(line).to_html(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_absent() {
        assert_eq!(format_log(""), "");
        assert_eq!(format_log(None), "");
    }

    #[test]
    fn test_chevron_emphasis() {
        assert_eq!(format_log(">>> abc"), "<u>abc</u>");
        assert_eq!(format_log(">>>> abc"), "<b>abc</b>");
        assert_eq!(format_log(">>>>> abc"), "<i>abc</i>");
    }

    #[test]
    fn test_status_markers() {
        assert_eq!(
            format_log("[success]ok"),
            "<span class='success'>ok</span>"
        );
        assert_eq!(
            format_log("[failure]bad"),
            "<span class='failure'>bad</span>"
        );
    }

    #[test]
    fn test_unmatched_is_identity() {
        let inputs = [
            "plain text",
            ">>>no space",
            ">>>>>>>> seven and more",
            " >>> leading space",
            "[succes] typo",
            "<b>already html</b>",
            "[SUCCESS] upper case",
        ];
        for input in inputs {
            assert_eq!(format_log(input), input, "input: {input}");
        }
    }

    #[test]
    fn test_only_the_prefix_is_stripped() {
        assert_eq!(format_log(">>> a >>> b"), "<u>a >>> b</u>");
        assert_eq!(
            format_log("[failure][failure]x"),
            "<span class='failure'>[failure]x</span>"
        );
    }

    #[test]
    fn test_single_verbose_run() {
        assert_eq!(
            format_log(">>>>>> DTD error"),
            "<span class='verbose'>DTD error</span>"
        );
        assert!(!classify(">>>>>> DTD error").is_list());
    }

    #[test]
    fn test_multiple_verbose_runs_become_list_items() {
        let line = ">>>>>> first error >>>>>> second error";
        assert_eq!(
            classify(line),
            FormattedLine::Verbose(vec!["first error".into(), "second error".into()])
        );
        assert_eq!(
            format_log(line),
            "<li><span class='verbose'>first error</span></li>\
             <li><span class='verbose'>second error</span></li>"
        );
        assert!(classify(line).is_list());
    }

    #[test]
    fn test_verbose_marker_alone() {
        assert_eq!(format_log(">>>>>> "), "<span class='verbose'></span>");
        assert_eq!(
            format_log(">>>>>> >>>>>> x"),
            "<span class='verbose'>x</span>"
        );
    }

    #[test]
    fn test_matching_is_repeatable() {
        let line = ">>>>>> a >>>>>> b >>>>>> c";
        let first = format_log(line);
        let second = format_log(line);
        assert_eq!(first, second);
        assert_eq!(first.matches("<li>").count(), 3);
    }
}
