//! File mutation primitives over a project tree.
//!
//! Every primitive computes the complete new content before touching disk
//! and then writes it with [`io::atomic_write`], so a failing primitive
//! never leaves its target half-written. The content transforms are exposed
//! as pure functions so they can be exercised on plain strings.

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::anchor::{Anchor, Miss};
use crate::error::{BaselineError, Result};
use crate::io;
use crate::template::{Context, TemplateStore};

/// Whether a primitive changed the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Written,
    Unchanged,
}

/// Splice `text` immediately before the anchor.
///
/// Returns `None` when `text` already sits directly before the anchor, so
/// re-applying an injection is a no-op.
pub fn inject_before(content: &str, anchor: &Anchor, text: &str) -> std::result::Result<Option<String>, Miss> {
    let span = anchor.locate(content)?;
    if content[..span.start].ends_with(text) {
        return Ok(None);
    }
    Ok(Some(splice(content, span.start, text)))
}

/// Splice `text` immediately after the anchor.
///
/// Returns `None` when `text` already follows the anchor.
pub fn inject_after(content: &str, anchor: &Anchor, text: &str) -> std::result::Result<Option<String>, Miss> {
    let span = anchor.locate(content)?;
    if content[span.end..].starts_with(text) {
        return Ok(None);
    }
    Ok(Some(splice(content, span.end, text)))
}

fn splice(content: &str, at: usize, text: &str) -> String {
    let mut out = String::with_capacity(content.len() + text.len());
    out.push_str(&content[..at]);
    out.push_str(text);
    out.push_str(&content[at..]);
    out
}

#[derive(Debug, Clone)]
enum Find {
    Literal(String),
    Pattern(Regex),
}

/// A search-and-replace edit.
///
/// Replaces every match unless [`Replacement::first`] is set. Zero matches
/// is a no-op unless [`Replacement::required`] is set, in which case it
/// fails with `AnchorNotFound`.
#[derive(Debug, Clone)]
pub struct Replacement {
    find: Find,
    with: String,
    all: bool,
    require_match: bool,
}

impl Replacement {
    pub fn literal(find: impl Into<String>, with: impl Into<String>) -> Self {
        Self {
            find: Find::Literal(find.into()),
            with: with.into(),
            all: true,
            require_match: false,
        }
    }

    /// Regex replacement; `$1` and `${name}` in `with` expand to captures.
    pub fn pattern(pattern: &str, with: impl Into<String>) -> Result<Self> {
        let re = Regex::new(pattern).map_err(|source| BaselineError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            find: Find::Pattern(re),
            with: with.into(),
            all: true,
            require_match: false,
        })
    }

    pub fn first(mut self) -> Self {
        self.all = false;
        self
    }

    pub fn required(mut self) -> Self {
        self.require_match = true;
        self
    }

    pub fn is_required(&self) -> bool {
        self.require_match
    }

    /// New content and the number of replacements made.
    pub fn apply(&self, content: &str) -> (String, usize) {
        match &self.find {
            Find::Literal(find) => {
                if find.is_empty() {
                    return (content.to_string(), 0);
                }
                let found = content.matches(find.as_str()).count();
                if self.all {
                    (content.replace(find.as_str(), &self.with), found)
                } else {
                    (content.replacen(find.as_str(), &self.with, 1), found.min(1))
                }
            }
            Find::Pattern(re) => {
                let found = re.find_iter(content).count();
                if self.all {
                    (re.replace_all(content, self.with.as_str()).into_owned(), found)
                } else {
                    (re.replace(content, self.with.as_str()).into_owned(), found.min(1))
                }
            }
        }
    }
}

impl fmt::Display for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.find {
            Find::Literal(text) => write!(f, "{text:?}"),
            Find::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// The on-disk file set being transformed. Holds no content of its own:
/// every primitive reads the current file state and writes the new one.
#[derive(Debug, Clone)]
pub struct ProjectTree {
    root: PathBuf,
}

impl ProjectTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    pub fn copy(
        &self,
        store: &TemplateStore,
        template: &str,
        dest: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<Change> {
        let target = self.writable_target(dest.as_ref(), overwrite)?;
        let content = store.load(template)?;
        io::atomic_write(&target, content.as_bytes())?;
        Ok(Change::Written)
    }

    pub fn render(
        &self,
        store: &TemplateStore,
        template: &str,
        ctx: &Context,
        dest: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<Change> {
        let target = self.writable_target(dest.as_ref(), overwrite)?;
        let content = store.render(template, ctx)?;
        io::atomic_write(&target, content.as_bytes())?;
        Ok(Change::Written)
    }

    /// Write `text` as the whole content of `rel`.
    pub fn write(&self, rel: impl AsRef<Path>, text: &str, overwrite: bool) -> Result<Change> {
        let target = self.writable_target(rel.as_ref(), overwrite)?;
        if target.is_file() && io::read_existing(&target)? == text {
            return Ok(Change::Unchanged);
        }
        io::atomic_write(&target, text.as_bytes())?;
        Ok(Change::Written)
    }

    /// Copy every template under `dir` to the same relative layout below `dest`.
    /// Destinations are all checked before anything is written.
    pub fn copy_dir(
        &self,
        store: &TemplateStore,
        dir: &str,
        dest: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<Change> {
        let dest = dest.as_ref();
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let mut plan = Vec::new();
        for name in store.list(dir)? {
            let rel = name.strip_prefix(&prefix).unwrap_or(&name);
            let target = self.writable_target(&dest.join(rel), overwrite)?;
            plan.push((name.clone(), target));
        }
        let mut loaded = Vec::with_capacity(plan.len());
        for (name, target) in plan {
            loaded.push((store.load(&name)?, target));
        }
        for (content, target) in loaded {
            io::atomic_write(&target, content.as_bytes())?;
        }
        Ok(Change::Written)
    }

    pub fn inject_before(&self, rel: impl AsRef<Path>, anchor: &Anchor, text: &str) -> Result<Change> {
        let path = self.path(rel);
        let content = io::read_existing(&path)?;
        let updated = inject_before(&content, anchor, text).map_err(|miss| anchor.miss_error(miss, &path))?;
        self.write_if_changed(&path, updated)
    }

    pub fn inject_after(&self, rel: impl AsRef<Path>, anchor: &Anchor, text: &str) -> Result<Change> {
        let path = self.path(rel);
        let content = io::read_existing(&path)?;
        let updated = inject_after(&content, anchor, text).map_err(|miss| anchor.miss_error(miss, &path))?;
        self.write_if_changed(&path, updated)
    }

    pub fn replace(&self, rel: impl AsRef<Path>, replacement: &Replacement) -> Result<Change> {
        let path = self.path(rel);
        let content = io::read_existing(&path)?;
        let (updated, count) = replacement.apply(&content);
        if count == 0 {
            if replacement.is_required() {
                return Err(BaselineError::AnchorNotFound {
                    path,
                    anchor: replacement.to_string(),
                });
            }
            tracing::warn!(path = %path.display(), pattern = %replacement, "no matches to replace");
            return Ok(Change::Unchanged);
        }
        tracing::debug!(path = %path.display(), count, "replaced matches");
        self.write_if_changed(&path, Some(updated))
    }

    /// Append `text` unless the file already ends with it.
    pub fn append(&self, rel: impl AsRef<Path>, text: &str) -> Result<Change> {
        let path = self.path(rel);
        let content = io::read_existing(&path)?;
        if !text.is_empty() && content.ends_with(text) {
            return Ok(Change::Unchanged);
        }
        let mut updated = content;
        updated.push_str(text);
        self.write_if_changed(&path, Some(updated))
    }

    /// Delete a file. Absent files are not an error.
    pub fn remove(&self, rel: impl AsRef<Path>) -> Result<Change> {
        let path = self.path(rel);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(Change::Written),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Change::Unchanged),
            Err(e) => Err(e.into()),
        }
    }

    pub fn create_dir(&self, rel: impl AsRef<Path>) -> Result<Change> {
        let path = self.path(rel);
        if path.is_dir() {
            return Ok(Change::Unchanged);
        }
        io::ensure_dir(&path)?;
        Ok(Change::Written)
    }

    /// Create a directory holding an empty `.keep` so it survives version control.
    pub fn create_dir_with_keep(&self, rel: impl AsRef<Path>) -> Result<Change> {
        let keep = self.path(rel).join(".keep");
        if keep.is_file() {
            return Ok(Change::Unchanged);
        }
        io::atomic_write(&keep, b"")?;
        Ok(Change::Written)
    }

    fn writable_target(&self, rel: &Path, overwrite: bool) -> Result<PathBuf> {
        let target = self.path(rel);
        if target.exists() && !overwrite {
            return Err(BaselineError::DestinationExistsNotOverwritable(target));
        }
        Ok(target)
    }

    fn write_if_changed(&self, path: &Path, updated: Option<String>) -> Result<Change> {
        match updated {
            Some(content) => {
                io::atomic_write(path, content.as_bytes())?;
                Ok(Change::Written)
            }
            None => Ok(Change::Unchanged),
        }
    }
}
