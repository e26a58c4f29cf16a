use crate::environment::Environment;
use crate::error::{BaselineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "baseline.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Defaults to the target directory name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    #[serde(default = "default_ruby_version")]
    pub ruby_version: String,

    /// Searched in order before the built-in templates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_paths: Vec<PathBuf>,

    /// Per-environment hostname overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hosts: BTreeMap<Environment, String>,

    /// Directories searched for external commands before `PATH`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_path: Vec<PathBuf>,
}

fn default_ruby_version() -> String {
    "2.1.2".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            app_name: None,
            ruby_version: default_ruby_version(),
            template_paths: Vec::new(),
            hosts: BTreeMap::new(),
            action_path: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Load an explicitly requested config file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BaselineError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: PipelineConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// The configured app name, or the last component of `root`.
    pub fn app_name_for(&self, root: &Path) -> String {
        self.app_name.clone().unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "app".to_string())
        })
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if let Some(name) = &self.app_name {
            if name.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "app_name is empty".to_string(),
                });
            }
        }

        for path in &self.template_paths {
            if !path.is_dir() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("template path '{}' is not a directory", path.display()),
                });
            }
        }

        for (env, host) in &self.hosts {
            if host.trim().is_empty() || host.contains(char::is_whitespace) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("host for {env} is not a valid hostname: '{host}'"),
                });
            }
        }

        for path in &self.action_path {
            if !path.is_dir() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("action path '{}' is not a directory", path.display()),
                });
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_file_absent() {
        let dir = TempDir::new().unwrap();
        let cfg = PipelineConfig::load_or_default(&dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(cfg.ruby_version, "2.1.2");
        assert!(cfg.template_paths.is_empty());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = PipelineConfig::load(&dir.path().join("custom.yaml")).unwrap_err();
        assert!(matches!(err, BaselineError::ConfigNotFound(_)));
    }

    #[test]
    fn parses_hosts_by_environment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &path,
            "app_name: shop\nhosts:\n  staging: qa.shop.io\n  production: shop.io\n",
        )
        .unwrap();
        let cfg = PipelineConfig::load(&path).unwrap();
        assert_eq!(cfg.app_name.as_deref(), Some("shop"));
        assert_eq!(cfg.hosts.get(&Environment::Staging).map(String::as_str), Some("qa.shop.io"));
        assert_eq!(cfg.hosts.get(&Environment::Production).map(String::as_str), Some("shop.io"));
        assert!(cfg.hosts.get(&Environment::Test).is_none());
    }

    #[test]
    fn unknown_environment_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "hosts:\n  qa: qa.shop.io\n").unwrap();
        assert!(matches!(PipelineConfig::load(&path), Err(BaselineError::Yaml(_))));
    }

    #[test]
    fn loads_app_name_and_hosts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "app_name: shop\nhosts:\n  development: shop.test\n").unwrap();
        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded.app_name.as_deref(), Some("shop"));
        assert_eq!(loaded.ruby_version, "2.1.2");
        assert_eq!(loaded.hosts[&Environment::Development], "shop.test");
    }

    #[test]
    fn app_name_falls_back_to_directory() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.app_name_for(Path::new("/work/storefront")), "storefront");
    }

    #[test]
    fn validate_flags_bad_paths_and_hosts() {
        let mut cfg = PipelineConfig::default();
        cfg.template_paths.push(PathBuf::from("/definitely/not/here"));
        cfg.hosts.insert(Environment::Test, "bad host".into());
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.message.contains("not a directory")));
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("test")));
    }

    #[test]
    fn validate_default_config_no_warnings() {
        assert!(PipelineConfig::default().validate().is_empty());
    }
}
