//! Key-value inputs read from the process environment.
//!
//! Only recognized keys are picked up: credential pairs per OAuth provider
//! and a hostname per environment.

use std::collections::BTreeMap;

use crate::environment::Environment;
use crate::template::Context;

/// OAuth providers whose `<PROVIDER>_KEY` / `<PROVIDER>_SECRET` pairs are read.
pub const PROVIDERS: [&str; 4] = ["GITHUB", "TWITTER", "FACEBOOK", "GOOGLE"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    pub fn recognized_keys() -> Vec<String> {
        let mut keys = Vec::new();
        for provider in PROVIDERS {
            keys.push(format!("{provider}_KEY"));
            keys.push(format!("{provider}_SECRET"));
        }
        for env in Environment::ALL {
            keys.push(host_key(env));
        }
        keys
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Collect recognized keys from `lookup`; anything else is ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let values = Self::recognized_keys()
            .into_iter()
            .filter_map(|key| lookup(&key).map(|value| (key, value)))
            .collect();
        Self { values }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let pairs: BTreeMap<&str, &str> = pairs.into_iter().collect();
        Self::from_lookup(|key| pairs.get(key).map(|v| v.to_string()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn host(&self, env: Environment) -> Option<&str> {
        self.get(&host_key(env)).filter(|h| !h.is_empty())
    }

    /// Providers whose key is present and non-empty.
    pub fn enabled_providers(&self) -> Vec<&'static str> {
        PROVIDERS
            .into_iter()
            .filter(|p| self.get(&format!("{p}_KEY")).is_some_and(|v| !v.is_empty()))
            .collect()
    }

    /// Credential bindings, so templates can gate provider blocks on them.
    /// Every provider key is bound; unset ones are empty and test false.
    pub fn credentials_context(&self) -> Context {
        PROVIDERS
            .into_iter()
            .flat_map(|p| [format!("{p}_KEY"), format!("{p}_SECRET")])
            .map(|key| {
                let value = self.get(&key).unwrap_or_default().to_string();
                (key, value)
            })
            .collect()
    }
}

fn host_key(env: Environment) -> String {
    format!("{}_HOST", env.settings_prefix())
}
