use std::path::PathBuf;

use baseline_core::template::{TemplateSource, TemplateStore};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "$CARGO_MANIFEST_DIR/templates/"]
struct BuiltinTemplates;

/// The templates compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedSource;

impl TemplateSource for EmbeddedSource {
    fn describe(&self) -> String {
        "<built-in>".to_string()
    }

    fn read(&self, name: &str) -> baseline_core::Result<Option<String>> {
        Ok(<BuiltinTemplates as Embed>::get(name)
            .map(|file| String::from_utf8_lossy(&file.data).into_owned()))
    }

    fn list(&self, dir: &str) -> baseline_core::Result<Vec<String>> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let mut names: Vec<String> = <BuiltinTemplates as Embed>::iter()
            .filter(|name| name.starts_with(&prefix))
            .map(|name| name.into_owned())
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Configured template directories first, then the built-ins.
pub fn template_store(template_paths: &[PathBuf]) -> TemplateStore {
    template_paths
        .iter()
        .fold(TemplateStore::new(), |store, dir| store.with_dir(dir.clone()))
        .with_source(EmbeddedSource)
}
