use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::environment::Environment;

#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("anchor not found in {path}: {anchor}")]
    AnchorNotFound { path: PathBuf, anchor: String },

    #[error("anchor is ambiguous in {path}: {anchor} matches {count} times")]
    AnchorAmbiguous {
        path: PathBuf,
        anchor: String,
        count: usize,
    },

    #[error("destination exists and overwrite is off: {0}")]
    DestinationExistsNotOverwritable(PathBuf),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("template not found in any search path: {0}")]
    TemplateNotFound(String),

    #[error("undefined variable '{variable}' in template {template}")]
    UndefinedVariable { template: String, variable: String },

    #[error("invalid template {template}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("external action '{command}' failed with exit code {exit_code}")]
    ExternalActionFailed {
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("external action '{command}' could not be started: {reason}")]
    ActionSpawnFailed { command: String, reason: String },

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("environment '{environment}' failed: {source}")]
    EnvironmentFailed {
        environment: Environment,
        #[source]
        source: Box<BaselineError>,
    },

    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Flat classification of a [`BaselineError`], independent of any wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AnchorNotFound,
    AnchorAmbiguous,
    DestinationExistsNotOverwritable,
    FileNotFound,
    TemplateNotFound,
    UndefinedVariable,
    InvalidTemplate,
    ExternalActionFailed,
    ActionSpawnFailed,
    InvalidPattern,
    ConfigNotFound,
    Io,
    Yaml,
}

impl BaselineError {
    /// The underlying error kind. Environment failures report the kind of
    /// the edit that failed.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AnchorNotFound { .. } => ErrorKind::AnchorNotFound,
            Self::AnchorAmbiguous { .. } => ErrorKind::AnchorAmbiguous,
            Self::DestinationExistsNotOverwritable(_) => {
                ErrorKind::DestinationExistsNotOverwritable
            }
            Self::FileNotFound(_) => ErrorKind::FileNotFound,
            Self::TemplateNotFound(_) => ErrorKind::TemplateNotFound,
            Self::UndefinedVariable { .. } => ErrorKind::UndefinedVariable,
            Self::InvalidTemplate { .. } => ErrorKind::InvalidTemplate,
            Self::ExternalActionFailed { .. } => ErrorKind::ExternalActionFailed,
            Self::ActionSpawnFailed { .. } => ErrorKind::ActionSpawnFailed,
            Self::InvalidPattern { .. } => ErrorKind::InvalidPattern,
            Self::EnvironmentFailed { source, .. } => source.kind(),
            Self::ConfigNotFound(_) => ErrorKind::ConfigNotFound,
            Self::Io(_) => ErrorKind::Io,
            Self::Yaml(_) => ErrorKind::Yaml,
        }
    }

    /// The environment a failure belongs to, if it came out of a
    /// per-environment edit.
    pub fn environment(&self) -> Option<Environment> {
        match self {
            Self::EnvironmentFailed { environment, .. } => Some(*environment),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BaselineError>;
