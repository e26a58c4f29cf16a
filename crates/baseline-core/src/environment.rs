//! Per-environment edits.
//!
//! The same logical edit is applied to each environment's configuration
//! file in a fixed, declared order, with that environment's own bindings.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::anchor::Anchor;
use crate::error::{BaselineError, Result};
use crate::mutation::ProjectTree;
use crate::template::{Context, Fragment, TemplateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl Environment {
    /// Declaration order, used wherever an edit targets every environment.
    pub const ALL: [Environment; 4] = [
        Environment::Development,
        Environment::Test,
        Environment::Staging,
        Environment::Production,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Prefix for settings keys such as `STAGING_HOST`.
    pub fn settings_prefix(self) -> &'static str {
        match self {
            Environment::Development => "DEVELOPMENT",
            Environment::Test => "TEST",
            Environment::Staging => "STAGING",
            Environment::Production => "PRODUCTION",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bindings for each environment, layered over the pipeline context.
pub type EnvironmentContexts = BTreeMap<Environment, Context>;

/// Where an environment edit lands in its target file.
#[derive(Debug, Clone)]
pub enum Placement {
    InjectBefore(Anchor),
    InjectAfter(Anchor),
    Append,
    /// Write the rendered fragment as the whole file.
    Write { overwrite: bool },
}

/// One logical edit applied per environment.
#[derive(Debug, Clone)]
pub struct EnvironmentEdit {
    fragment: Fragment,
    placement: Placement,
    target: String,
}

/// Default target: each environment's Rails-style config file.
pub const DEFAULT_TARGET: &str = "config/environments/{env}.rb";

impl EnvironmentEdit {
    pub fn new(fragment: Fragment, placement: Placement) -> Self {
        Self {
            fragment,
            placement,
            target: DEFAULT_TARGET.to_string(),
        }
    }

    /// Target path pattern; `{env}` is replaced by the environment name.
    pub fn target(mut self, pattern: impl Into<String>) -> Self {
        self.target = pattern.into();
        self
    }

    pub fn target_for(&self, env: Environment) -> PathBuf {
        PathBuf::from(self.target.replace("{env}", env.name()))
    }

    pub fn target_pattern(&self) -> &str {
        &self.target
    }

    fn apply(
        &self,
        tree: &ProjectTree,
        store: &TemplateStore,
        env: Environment,
        ctx: &Context,
    ) -> Result<()> {
        let text = self.fragment.resolve(store, ctx)?;
        let target = self.target_for(env);
        let change = match &self.placement {
            Placement::InjectBefore(anchor) => tree.inject_before(&target, anchor, &text)?,
            Placement::InjectAfter(anchor) => tree.inject_after(&target, anchor, &text)?,
            Placement::Append => tree.append(&target, &text)?,
            Placement::Write { overwrite } => tree.write(&target, &text, *overwrite)?,
        };
        tracing::debug!(environment = %env, target = %target.display(), ?change, "applied environment edit");
        Ok(())
    }
}

/// Apply `edit` to each environment in `environments`, in order.
///
/// Each environment renders with `base` overlaid by its entry in
/// `contexts` (plus an `environment` binding holding its name). Stops at
/// the first failing environment; later environments are left untouched.
pub fn apply_across_environments(
    tree: &ProjectTree,
    store: &TemplateStore,
    base: &Context,
    edit: &EnvironmentEdit,
    environments: &[Environment],
    contexts: &EnvironmentContexts,
) -> Result<()> {
    for &env in environments {
        let mut ctx = base.clone().with("environment", env.name());
        if let Some(overlay) = contexts.get(&env) {
            ctx = ctx.merged(overlay);
        }
        edit.apply(tree, store, env, &ctx)
            .map_err(|source| BaselineError::EnvironmentFailed {
                environment: env,
                source: Box::new(source),
            })?;
    }
    Ok(())
}
