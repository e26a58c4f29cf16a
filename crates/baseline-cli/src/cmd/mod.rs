pub mod run;
pub mod steps;

use anyhow::Context;
use baseline_cli::catalog::{self, CatalogInput};
use baseline_core::config::{PipelineConfig, WarnLevel, DEFAULT_CONFIG_FILE};
use baseline_core::settings::Settings;
use baseline_core::step::Step;
use std::path::Path;

/// Everything a command needs: the loaded config, catalog input, and steps.
pub struct Plan {
    pub config: PipelineConfig,
    pub input: CatalogInput,
    pub steps: Vec<Step>,
}

/// Load config (explicit path must exist; the default file is optional),
/// reject config errors, and build the catalog for `root`.
pub fn plan(root: &Path, config_path: Option<&Path>) -> anyhow::Result<Plan> {
    let config = match config_path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => PipelineConfig::load_or_default(Path::new(DEFAULT_CONFIG_FILE))
            .with_context(|| format!("failed to load {DEFAULT_CONFIG_FILE}"))?,
    };

    for warning in config.validate() {
        match warning.level {
            WarnLevel::Error => anyhow::bail!("invalid config: {}", warning.message),
            WarnLevel::Warning => tracing::warn!("{}", warning.message),
        }
    }

    let app_name = config.app_name_for(root);
    let input = CatalogInput::new(&app_name, &config, Settings::from_env());
    tracing::info!(
        app = %app_name,
        providers = ?input.settings.enabled_providers(),
        "oauth providers enabled"
    );
    let steps = catalog::steps(&input).context("failed to build step catalog")?;
    Ok(Plan {
        config,
        input,
        steps,
    })
}
