//! Steps and the operations they are made of.
//!
//! A step is a named, fixed list of operations. Steps carry no dependency
//! information: their position in the declared list is the only ordering.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::action::{ActionRunner, ExternalAction};
use crate::anchor::Anchor;
use crate::environment::{apply_across_environments, Environment, EnvironmentContexts, EnvironmentEdit};
use crate::error::Result;
use crate::mutation::{Change, ProjectTree, Replacement};
use crate::template::{Context, Fragment, TemplateStore};

/// One primitive, external action, or per-environment edit.
#[derive(Debug, Clone)]
pub enum Operation {
    Copy {
        template: String,
        dest: PathBuf,
        overwrite: bool,
    },
    CopyDir {
        dir: String,
        dest: PathBuf,
        overwrite: bool,
    },
    Render {
        template: String,
        dest: PathBuf,
        overwrite: bool,
    },
    InjectBefore {
        path: PathBuf,
        anchor: Anchor,
        text: Fragment,
    },
    InjectAfter {
        path: PathBuf,
        anchor: Anchor,
        text: Fragment,
    },
    Replace {
        path: PathBuf,
        replacement: Replacement,
    },
    Append {
        path: PathBuf,
        text: Fragment,
    },
    Remove {
        path: PathBuf,
    },
    CreateDir {
        path: PathBuf,
        keep: bool,
    },
    Invoke(ExternalAction),
    AcrossEnvironments {
        edit: EnvironmentEdit,
        environments: Vec<Environment>,
        contexts: EnvironmentContexts,
    },
}

/// What an operation needs to run.
pub struct Workspace<'a> {
    pub tree: &'a ProjectTree,
    pub templates: &'a TemplateStore,
    pub context: &'a Context,
    pub runner: &'a dyn ActionRunner,
}

impl Operation {
    pub fn apply(&self, ws: &Workspace<'_>) -> Result<Change> {
        let tree = ws.tree;
        match self {
            Operation::Copy {
                template,
                dest,
                overwrite,
            } => tree.copy(ws.templates, template, dest, *overwrite),
            Operation::CopyDir {
                dir,
                dest,
                overwrite,
            } => tree.copy_dir(ws.templates, dir, dest, *overwrite),
            Operation::Render {
                template,
                dest,
                overwrite,
            } => tree.render(ws.templates, template, ws.context, dest, *overwrite),
            Operation::InjectBefore { path, anchor, text } => {
                let text = text.resolve(ws.templates, ws.context)?;
                tree.inject_before(path, anchor, &text)
            }
            Operation::InjectAfter { path, anchor, text } => {
                let text = text.resolve(ws.templates, ws.context)?;
                tree.inject_after(path, anchor, &text)
            }
            Operation::Replace { path, replacement } => tree.replace(path, replacement),
            Operation::Append { path, text } => {
                let text = text.resolve(ws.templates, ws.context)?;
                tree.append(path, &text)
            }
            Operation::Remove { path } => tree.remove(path),
            Operation::CreateDir { path, keep: true } => tree.create_dir_with_keep(path),
            Operation::CreateDir { path, keep: false } => tree.create_dir(path),
            Operation::Invoke(action) => {
                let outcome = action.run(ws.runner, tree.root())?;
                tracing::debug!(action = %action, stdout_len = outcome.stdout.len(), "external action succeeded");
                Ok(Change::Written)
            }
            Operation::AcrossEnvironments {
                edit,
                environments,
                contexts,
            } => {
                apply_across_environments(tree, ws.templates, ws.context, edit, environments, contexts)?;
                Ok(Change::Written)
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Copy { template, dest, .. } => write!(f, "copy {template} -> {}", dest.display()),
            Operation::CopyDir { dir, dest, .. } => write!(f, "copy directory {dir}/ -> {}", dest.display()),
            Operation::Render { template, dest, .. } => write!(f, "render {template} -> {}", dest.display()),
            Operation::InjectBefore { path, anchor, .. } => {
                write!(f, "inject into {} before {anchor}", path.display())
            }
            Operation::InjectAfter { path, anchor, .. } => {
                write!(f, "inject into {} after {anchor}", path.display())
            }
            Operation::Replace { path, replacement } => {
                write!(f, "replace {replacement} in {}", path.display())
            }
            Operation::Append { path, .. } => write!(f, "append to {}", path.display()),
            Operation::Remove { path } => write!(f, "remove {}", path.display()),
            Operation::CreateDir { path, .. } => write!(f, "create directory {}", path.display()),
            Operation::Invoke(action) => write!(f, "run `{action}`"),
            Operation::AcrossEnvironments { edit, environments, .. } => {
                let names: Vec<&str> = environments.iter().map(|e| e.name()).collect();
                write!(f, "edit {} for [{}]", edit.target_pattern(), names.join(", "))
            }
        }
    }
}

/// A named, ordered unit of work. Built once and then only read.
#[derive(Debug, Clone)]
pub struct Step {
    name: String,
    operations: Vec<Operation>,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn then(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    pub fn copy(self, template: &str, dest: impl AsRef<Path>) -> Self {
        self.then(Operation::Copy {
            template: template.to_string(),
            dest: dest.as_ref().to_path_buf(),
            overwrite: false,
        })
    }

    pub fn copy_forced(self, template: &str, dest: impl AsRef<Path>) -> Self {
        self.then(Operation::Copy {
            template: template.to_string(),
            dest: dest.as_ref().to_path_buf(),
            overwrite: true,
        })
    }

    pub fn copy_dir(self, dir: &str, dest: impl AsRef<Path>) -> Self {
        self.then(Operation::CopyDir {
            dir: dir.to_string(),
            dest: dest.as_ref().to_path_buf(),
            overwrite: true,
        })
    }

    pub fn render(self, template: &str, dest: impl AsRef<Path>) -> Self {
        self.then(Operation::Render {
            template: template.to_string(),
            dest: dest.as_ref().to_path_buf(),
            overwrite: false,
        })
    }

    pub fn render_forced(self, template: &str, dest: impl AsRef<Path>) -> Self {
        self.then(Operation::Render {
            template: template.to_string(),
            dest: dest.as_ref().to_path_buf(),
            overwrite: true,
        })
    }

    pub fn inject_before(self, path: impl AsRef<Path>, anchor: Anchor, text: Fragment) -> Self {
        self.then(Operation::InjectBefore {
            path: path.as_ref().to_path_buf(),
            anchor,
            text,
        })
    }

    pub fn inject_after(self, path: impl AsRef<Path>, anchor: Anchor, text: Fragment) -> Self {
        self.then(Operation::InjectAfter {
            path: path.as_ref().to_path_buf(),
            anchor,
            text,
        })
    }

    pub fn replace(self, path: impl AsRef<Path>, replacement: Replacement) -> Self {
        self.then(Operation::Replace {
            path: path.as_ref().to_path_buf(),
            replacement,
        })
    }

    pub fn append(self, path: impl AsRef<Path>, text: Fragment) -> Self {
        self.then(Operation::Append {
            path: path.as_ref().to_path_buf(),
            text,
        })
    }

    pub fn remove(self, path: impl AsRef<Path>) -> Self {
        self.then(Operation::Remove {
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn create_dir(self, path: impl AsRef<Path>) -> Self {
        self.then(Operation::CreateDir {
            path: path.as_ref().to_path_buf(),
            keep: false,
        })
    }

    pub fn create_dir_with_keep(self, path: impl AsRef<Path>) -> Self {
        self.then(Operation::CreateDir {
            path: path.as_ref().to_path_buf(),
            keep: true,
        })
    }

    pub fn invoke(self, action: ExternalAction) -> Self {
        self.then(Operation::Invoke(action))
    }

    pub fn across_environments(
        self,
        edit: EnvironmentEdit,
        environments: &[Environment],
        contexts: EnvironmentContexts,
    ) -> Self {
        self.then(Operation::AcrossEnvironments {
            edit,
            environments: environments.to_vec(),
            contexts,
        })
    }
}
