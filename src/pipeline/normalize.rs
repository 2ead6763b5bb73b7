//! Text normalisation: strip document-format artefacts into clean lines.
//!
//! Text extracted from a PDF or DOCX carries noise that has nothing to do
//! with the screenplay: running headers with the title and draft date, page
//! numbers, `(MORE)` / `(CONTINUED)` markers at page breaks, zero-width
//! characters, words hyphenated across line wraps. Left in, these become
//! bogus scenes or bogus entities further down the pipeline.
//!
//! ## Rule Order
//!
//! Pages are split before header detection, since a running header is only
//! recognisable by recurring at the same edge of many pages. Hyphenation is
//! repaired before whitespace collapsing so the blank-line pass cannot
//! separate the two halves of a word.

use crate::config::ExtractionConfig;
use crate::pipeline::segment::parse_slugline;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// The normalised document: a sequence of logical lines.
///
/// Blank lines are kept (at most one in a row) since they separate dialogue
/// blocks from action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText {
    lines: Vec<String>,
}

impl NormalizedText {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The text as one string, every line terminated by `\n`.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Apply all normalisation rules to raw extracted text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF/CR → LF)
/// 2. Split into pages on form feed
/// 3. Remove running headers/footers and bare page numbers at page edges
/// 4. Drop `(MORE)` / `(CONTINUED)` pagination lines
/// 5. Strip control and invisible characters, tabs become spaces
/// 6. Join words hyphenated across a line wrap
/// 7. Collapse whitespace and blank-line runs, trim the ends
///
/// Never fails: empty input gives an empty [`NormalizedText`].
pub fn normalize(raw: &str, config: &ExtractionConfig) -> NormalizedText {
    let s = normalise_line_endings(raw);
    let pages = split_pages(&s);
    let page_count = pages.len();
    let pages = remove_page_furniture(
        pages,
        config.header_footer_ratio,
        config.min_pages_for_headers,
    );
    let mut lines: Vec<String> = pages.into_iter().flatten().collect();
    if config.strip_continuations {
        lines.retain(|l| !RE_CONTINUATION.is_match(l));
    }
    let lines: Vec<String> = lines.iter().map(|l| strip_control_chars(l)).collect();
    let lines = join_hyphenated(lines);
    let lines = collapse_whitespace(lines);

    debug!(
        "Normalised {} bytes across {} page(s) into {} lines",
        raw.len(),
        page_count,
        lines.len()
    );
    NormalizedText { lines }
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Split pages ─────────────────────────────────────────────────────

fn split_pages(input: &str) -> Vec<Vec<String>> {
    input
        .split('\u{000C}')
        .map(|page| page.split('\n').map(str::to_string).collect())
        .collect()
}

// ── Rule 3: Headers, footers and page numbers ───────────────────────────────

static RE_PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:-\s*\d+\s*-|\d+\.?|(?:page|p\.|стр\.?|страница)\s*\d+(?:\s*(?:of|из)\s*\d+)?)$")
        .unwrap()
});

/// Indices of the first and last non-blank line of a page.
fn edge_indices(page: &[String]) -> Vec<usize> {
    let first = page.iter().position(|l| !l.trim().is_empty());
    let last = page.iter().rposition(|l| !l.trim().is_empty());
    match (first, last) {
        (Some(f), Some(l)) if f != l => vec![f, l],
        (Some(f), _) => vec![f],
        _ => vec![],
    }
}

fn remove_page_furniture(
    mut pages: Vec<Vec<String>>,
    ratio: f64,
    min_pages: usize,
) -> Vec<Vec<String>> {
    if pages.len() < min_pages.max(2) {
        return pages;
    }

    // Count pages on which each trimmed line sits at an edge. Sluglines
    // never count: returning to a location is not a running header.
    let mut counts: HashMap<String, usize> = HashMap::new();
    for page in &pages {
        let seen: HashSet<&str> = edge_indices(page)
            .into_iter()
            .map(|i| page[i].trim())
            .filter(|line| parse_slugline(line).is_none())
            .collect();
        for line in seen {
            *counts.entry(line.to_string()).or_default() += 1;
        }
    }
    let total = pages.len() as f64;
    let recurring: HashSet<String> = counts
        .into_iter()
        .filter(|(_, n)| *n as f64 / total > ratio)
        .map(|(line, _)| line)
        .collect();

    let is_furniture = |line: &str| {
        let line = line.trim();
        (recurring.contains(line) || RE_PAGE_NUMBER.is_match(line)) && parse_slugline(line).is_none()
    };

    for page in &mut pages {
        // A header is often followed by a page number; peel at most two
        // furniture lines off each edge.
        for _ in 0..2 {
            match page.iter().position(|l| !l.trim().is_empty()) {
                Some(i) if is_furniture(&page[i]) => {
                    page.remove(i);
                }
                _ => break,
            }
        }
        for _ in 0..2 {
            match page.iter().rposition(|l| !l.trim().is_empty()) {
                Some(i) if is_furniture(&page[i]) => {
                    page.remove(i);
                }
                _ => break,
            }
        }
    }
    pages
}

// ── Rule 4: Pagination markers ──────────────────────────────────────────────

static RE_CONTINUATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:\(\s*more\s*\)|\(\s*continued\s*\)|continued:?(?:\s*\(\d+\))?|\(?\s*cont'd\s*\)?|\(\s*продолжение\s*\)|продолжение:?)\s*$",
    )
    .unwrap()
});

// ── Rule 5: Control and invisible characters ────────────────────────────────

fn strip_control_chars(line: &str) -> String {
    line.chars()
        .filter_map(|c| match c {
            '\t' => Some(' '),
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

// ── Rule 6: Hyphenated line wraps ───────────────────────────────────────────

fn ends_with_wrap_hyphen(line: &str) -> bool {
    let mut rev = line.trim_end().chars().rev();
    matches!(
        (rev.next(), rev.next()),
        (Some('-'), Some(c)) if c.is_alphabetic()
    )
}

fn starts_lowercase(line: &str) -> bool {
    line.trim_start()
        .chars()
        .next()
        .is_some_and(|c| c.is_lowercase())
}

fn join_hyphenated(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        if let Some(prev) = out.last_mut() {
            if ends_with_wrap_hyphen(prev) && starts_lowercase(&line) {
                let keep = prev.trim_end().len() - 1;
                prev.truncate(keep);
                prev.push_str(line.trim_start());
                continue;
            }
        }
        out.push(line);
    }
    out
}

// ── Rule 7: Whitespace ──────────────────────────────────────────────────────

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").unwrap());

fn collapse_whitespace(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        let line = RE_SPACES.replace_all(line.trim(), " ").into_owned();
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out
}
