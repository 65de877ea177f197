//! Configuration loader (§4.I)
//!
//! Reads the YAML configuration file, merges process-environment overrides
//! on top via `figment`, deserializes into `Config`, then walks every string
//! field substituting `<ENV.NAME>` placeholders. Grounded on the loader
//! shape in `mcb-infrastructure`'s `config::loader` (explicit path override,
//! a `load()` entry point, warnings through the logging layer on recoverable
//! problems) adapted from that crate's bare `serde_yaml::from_str` to
//! `figment`'s layered providers, since this crate also needs environment
//! overrides of arbitrary nested keys, not just placeholder substitution.

use std::path::PathBuf;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;

use crate::config::model::{ClusterEntry, Config, HostField, Node, PathField};
use crate::error::{EngineError, Result};

pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Load, merge, deserialize, and resolve `<ENV.NAME>` placeholders.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Err(EngineError::Configuration(format!(
                "configuration file not found: {}",
                self.config_path.display()
            )));
        }

        let figment = Figment::new()
            .merge(Yaml::file(&self.config_path))
            .merge(Env::prefixed("SFORGE_").split("__"));

        let mut config: Config = figment.extract().map_err(|e| {
            EngineError::Configuration(format!(
                "failed to parse {}: {e}",
                self.config_path.display()
            ))
        })?;

        resolve_placeholders(&mut config);
        Ok(config)
    }
}

/// Walk every string field in the configuration that can carry a
/// `<ENV.NAME>` placeholder, substituting the looked-up environment
/// variable, or an empty string plus a `tracing::warn!` when it is unset.
fn resolve_placeholders(config: &mut Config) {
    for entry in config.clusters.values_mut() {
        match entry {
            ClusterEntry::Single(node) => resolve_node(node),
            ClusterEntry::Many(nodes) => nodes.iter_mut().for_each(resolve_node),
        }
    }

    for alias in config.custom_fields.values_mut() {
        if let Some(default) = &mut alias.default {
            *default = resolve_string(default);
        }
    }

    if let Some(seed_path) = &mut config.seed_path {
        *seed_path = resolve_string(seed_path);
    }
}

fn resolve_node(node: &mut Node) {
    node.host = match &node.host {
        HostField::Single(h) => HostField::Single(resolve_string(h)),
        HostField::Many(hs) => HostField::Many(hs.iter().map(|h| resolve_string(h)).collect()),
    };
    node.user = resolve_string(&node.user);
    node.pass = resolve_string(&node.pass);
    node.name = resolve_string(&node.name);
    if let Some(path) = &node.path {
        node.path = Some(match path {
            PathField::Single(p) => PathField::Single(resolve_string(p)),
            PathField::Many(ps) => PathField::Many(ps.iter().map(|p| resolve_string(p)).collect()),
        });
    }
}

/// Substitute every `<ENV.NAME>` occurrence in `value`. A value with no
/// placeholder is returned unchanged (the common case, so this avoids
/// allocating when there is nothing to do).
fn resolve_string(value: &str) -> String {
    if !value.contains("<ENV.") {
        return value.to_string();
    }

    let mut result = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("<ENV.") {
        result.push_str(&rest[..start]);
        let after_marker = &rest[start + "<ENV.".len()..];
        match after_marker.find('>') {
            Some(end) => {
                let name = &after_marker[..end];
                match std::env::var(name) {
                    Ok(v) => result.push_str(&v),
                    Err(_) => {
                        tracing::warn!(variable = name, "environment variable not set for <ENV.{}> placeholder", name);
                    }
                }
                rest = &after_marker[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_string_passthrough_without_placeholder() {
        assert_eq!(resolve_string("localhost"), "localhost");
    }

    #[test]
    fn test_resolve_string_substitutes_set_variable() {
        std::env::set_var("SFORGE_TEST_HOST", "db.internal");
        assert_eq!(resolve_string("<ENV.SFORGE_TEST_HOST>"), "db.internal");
        std::env::remove_var("SFORGE_TEST_HOST");
    }

    #[test]
    fn test_resolve_string_missing_variable_yields_empty() {
        std::env::remove_var("SFORGE_DEFINITELY_UNSET");
        assert_eq!(resolve_string("<ENV.SFORGE_DEFINITELY_UNSET>"), "");
    }

    #[test]
    fn test_resolve_string_mixed_literal_and_placeholder() {
        std::env::set_var("SFORGE_TEST_PORT", "5433");
        assert_eq!(
            resolve_string("postgres:<ENV.SFORGE_TEST_PORT>/db"),
            "postgres:5433/db"
        );
        std::env::remove_var("SFORGE_TEST_PORT");
    }

    #[test]
    fn test_load_missing_file_is_configuration_error() {
        let loader = ConfigLoader::new("/nonexistent/path/to/config.yaml");
        let err = loader.load().unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_load_and_resolve_placeholder_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sforge.yaml");
        std::env::set_var("SFORGE_TEST_PASS", "s3cret");
        std::fs::write(
            &path,
            r#"
clusters:
  main:
    name: app
    host: localhost
    port: 5432
    user: app
    pass: "<ENV.SFORGE_TEST_PASS>"
"#,
        )
        .unwrap();

        let config = ConfigLoader::new(&path).load().unwrap();
        assert_eq!(config.clusters["main"].primary_node().pass, "s3cret");
        std::env::remove_var("SFORGE_TEST_PASS");
    }
}
