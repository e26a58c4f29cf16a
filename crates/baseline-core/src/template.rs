//! Template lookup and rendering.
//!
//! Templates are rendered with minijinja: `{{ name }}` placeholders and
//! `{% if NAME %} ... {% endif %}` blocks. Any reference to an unbound name
//! that is actually evaluated fails with `UndefinedVariable`. Rendering is a
//! pure function of template text and context.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use minijinja::{AutoEscape, Environment, UndefinedBehavior};

use crate::error::{BaselineError, Result};

/// Bindings available to a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    values: BTreeMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// True when `key` is bound to a non-empty value.
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_empty())
    }

    /// A new context with `overlay` taking precedence over `self`.
    pub fn merged(&self, overlay: &Context) -> Context {
        let mut values = self.values.clone();
        values.extend(overlay.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        Context { values }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = Context::new();
        for (k, v) in iter {
            ctx.insert(k, v);
        }
        ctx
    }
}

fn environment<'source>() -> Environment<'source> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_trim_blocks(true);
    env.set_keep_trailing_newline(true);
    env
}

/// Render `text` with `ctx`. `name` only appears in diagnostics.
pub fn render(name: &str, text: &str, ctx: &Context) -> Result<String> {
    let env = environment();
    let template = env
        .template_from_named_str(name, text)
        .map_err(|e| invalid_template(name, &e))?;

    template.render(&ctx.values).map_err(|e| {
        if e.kind() != minijinja::ErrorKind::UndefinedError {
            return invalid_template(name, &e);
        }
        // minijinja does not name the missing value; recover it from the
        // names the template reads that the context does not bind.
        match template
            .undeclared_variables(false)
            .into_iter()
            .filter(|var| !ctx.values.contains_key(var))
            .min()
        {
            Some(variable) => BaselineError::UndefinedVariable {
                template: name.to_string(),
                variable,
            },
            None => invalid_template(name, &e),
        }
    })
}

fn invalid_template(name: &str, err: &minijinja::Error) -> BaselineError {
    BaselineError::InvalidTemplate {
        template: name.to_string(),
        reason: err.to_string(),
    }
}

/// Text a step splices into a file: inline template text or a named template.
/// Both are rendered with the step's context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Inline(String),
    Template(String),
}

impl Fragment {
    pub fn inline(text: impl Into<String>) -> Self {
        Fragment::Inline(text.into())
    }

    pub fn template(name: impl Into<String>) -> Self {
        Fragment::Template(name.into())
    }

    pub fn resolve(&self, store: &TemplateStore, ctx: &Context) -> Result<String> {
        match self {
            Fragment::Inline(text) => render("<inline>", text, ctx),
            Fragment::Template(name) => store.render(name, ctx),
        }
    }
}

/// Somewhere templates can be looked up by logical name.
pub trait TemplateSource {
    /// Human-readable origin, used in logs.
    fn describe(&self) -> String;

    /// Template text, or `None` if this source does not have `name`.
    fn read(&self, name: &str) -> Result<Option<String>>;

    /// Names of all templates under the directory `dir`, as full logical names.
    fn list(&self, dir: &str) -> Result<Vec<String>>;
}

/// Templates stored as plain files beneath a directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateSource for DirSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn read(&self, name: &str) -> Result<Option<String>> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn list(&self, dir: &str) -> Result<Vec<String>> {
        let base = self.root.join(dir);
        let mut names = Vec::new();
        if base.is_dir() {
            collect_files(&self.root, &base, &mut names)?;
        }
        names.sort();
        Ok(names)
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(name);
        }
    }
    Ok(())
}

/// Ordered template search path. The first source holding a name wins.
#[derive(Default)]
pub struct TemplateStore {
    sources: Vec<Box<dyn TemplateSource>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl TemplateSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn with_dir(self, root: impl Into<PathBuf>) -> Self {
        self.with_source(DirSource::new(root))
    }

    pub fn load(&self, name: &str) -> Result<String> {
        for source in &self.sources {
            if let Some(text) = source.read(name)? {
                tracing::debug!(template = name, source = %source.describe(), "resolved template");
                return Ok(text);
            }
        }
        Err(BaselineError::TemplateNotFound(name.to_string()))
    }

    pub fn render(&self, name: &str, ctx: &Context) -> Result<String> {
        let text = self.load(name)?;
        render(name, &text, ctx)
    }

    /// Every template under `dir` across all sources, sorted and deduplicated.
    pub fn list(&self, dir: &str) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        for source in &self.sources {
            names.extend(source.list(dir)?);
        }
        if names.is_empty() {
            return Err(BaselineError::TemplateNotFound(format!("{dir}/")));
        }
        Ok(names.into_iter().collect())
    }
}
