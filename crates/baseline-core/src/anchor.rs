//! Locating anchors inside file content.
//!
//! An anchor is a literal string, a regex pattern, or a literal start/end
//! marker pair. Matching never normalizes whitespace and never retries: if
//! an earlier step removed the anchor, lookup fails.

use std::fmt;
use std::path::Path;

use regex::Regex;

use crate::error::{BaselineError, Result};

/// Which match to take when an anchor occurs more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Exactly one match is required.
    #[default]
    Unique,
    First,
    Last,
}

#[derive(Debug, Clone)]
enum AnchorKind {
    Literal(String),
    Pattern(Regex),
    Span { start: String, end: String },
}

/// Byte range of a match within the content it was located in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Why an anchor lookup failed, before a file path is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
    NotFound,
    Ambiguous(usize),
}

#[derive(Debug, Clone)]
pub struct Anchor {
    kind: AnchorKind,
    mode: MatchMode,
}

impl Anchor {
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            kind: AnchorKind::Literal(text.into()),
            mode: MatchMode::Unique,
        }
    }

    /// A regex anchor. Use `(?s)` or `(?m)` for multi-line spans.
    pub fn pattern(pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern).map_err(|source| BaselineError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            kind: AnchorKind::Pattern(re),
            mode: MatchMode::Unique,
        })
    }

    /// Everything from `start` through the next `end` after it, inclusive.
    pub fn span(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            kind: AnchorKind::Span {
                start: start.into(),
                end: end.into(),
            },
            mode: MatchMode::Unique,
        }
    }

    pub fn first(mut self) -> Self {
        self.mode = MatchMode::First;
        self
    }

    pub fn last(mut self) -> Self {
        self.mode = MatchMode::Last;
        self
    }

    /// Every non-overlapping match, in content order.
    pub fn matches(&self, content: &str) -> Vec<Span> {
        match &self.kind {
            AnchorKind::Literal(text) => {
                if text.is_empty() {
                    return Vec::new();
                }
                content
                    .match_indices(text.as_str())
                    .map(|(start, m)| Span {
                        start,
                        end: start + m.len(),
                    })
                    .collect()
            }
            AnchorKind::Pattern(re) => re
                .find_iter(content)
                .map(|m| Span {
                    start: m.start(),
                    end: m.end(),
                })
                .collect(),
            AnchorKind::Span { start, end } => marker_spans(content, start, end),
        }
    }

    /// Resolve the anchor to a single span according to its match mode.
    pub fn locate(&self, content: &str) -> std::result::Result<Span, Miss> {
        let found = self.matches(content);
        match (self.mode, found.len()) {
            (_, 0) => Err(Miss::NotFound),
            (MatchMode::Unique, 1) | (MatchMode::First, _) => Ok(found[0]),
            (MatchMode::Unique, n) => Err(Miss::Ambiguous(n)),
            (MatchMode::Last, n) => Ok(found[n - 1]),
        }
    }

    /// Like [`Anchor::locate`], with the miss turned into an error naming `path`.
    pub fn locate_in(&self, content: &str, path: &Path) -> Result<Span> {
        self.locate(content).map_err(|miss| self.miss_error(miss, path))
    }

    pub fn miss_error(&self, miss: Miss, path: &Path) -> BaselineError {
        match miss {
            Miss::NotFound => BaselineError::AnchorNotFound {
                path: path.to_path_buf(),
                anchor: self.to_string(),
            },
            Miss::Ambiguous(count) => BaselineError::AnchorAmbiguous {
                path: path.to_path_buf(),
                anchor: self.to_string(),
                count,
            },
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AnchorKind::Literal(text) => write!(f, "{text:?}"),
            AnchorKind::Pattern(re) => write!(f, "/{}/", re.as_str()),
            AnchorKind::Span { start, end } => write!(f, "{start:?}..{end:?}"),
        }
    }
}

fn marker_spans(content: &str, start: &str, end: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    if start.is_empty() || end.is_empty() {
        return spans;
    }
    let mut from = 0;
    while let Some(offset) = content[from..].find(start) {
        let start_pos = from + offset;
        let search_from = start_pos + start.len();
        let Some(end_offset) = content[search_from..].find(end) else {
            break;
        };
        let end_pos = search_from + end_offset + end.len();
        spans.push(Span {
            start: start_pos,
            end: end_pos,
        });
        from = end_pos;
    }
    spans
}
