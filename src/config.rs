use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "wtx.yaml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub test: TestConfig,
    pub product_groups: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TestConfig {
    /// Whitespace-separated product or group names eligible for editable
    /// installs.
    pub editable_product_dependencies: String,
}

impl Config {
    /// Loads `wtx.yaml` from the workspace root. A missing file is not an
    /// error; every key has a default.
    pub fn load(workspace: &Path) -> Result<Self> {
        let path = workspace.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid YAML in {}", path.display()))?;

        Ok(config)
    }

    pub fn editable_product_dependencies(&self) -> Vec<String> {
        self.test
            .editable_product_dependencies
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Replaces configured group names with their member products; other
    /// names pass through unchanged. Duplicates keep their first position.
    pub fn expand_product_groups(&self, names: &[String]) -> Vec<String> {
        let mut expanded = Vec::new();
        for name in names {
            match self.product_groups.get(name) {
                Some(members) => expanded.extend(members.iter().cloned()),
                None => expanded.push(name.clone()),
            }
        }

        let mut seen = HashSet::new();
        expanded.retain(|name| seen.insert(name.clone()));
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(raw: &str) -> Config {
        serde_yaml::from_str(raw).expect("parse config")
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load(dir.path()).expect("load");
        assert!(config.editable_product_dependencies().is_empty());
        assert!(config.product_groups.is_empty());
    }

    #[test]
    fn splits_editable_dependencies_on_whitespace() {
        let config = config_from("test:\n  editable_product_dependencies: \"liba  libb\\tlibc\"\n");
        assert_eq!(
            config.editable_product_dependencies(),
            vec!["liba", "libb", "libc"]
        );
    }

    #[test]
    fn expands_groups_and_passes_plain_names_through() {
        let config = config_from(
            "product_groups:\n  client-libs: [liba, libb]\n",
        );
        let expanded = config.expand_product_groups(&[
            "client-libs".to_string(),
            "libz".to_string(),
        ]);
        assert_eq!(expanded, vec!["liba", "libb", "libz"]);
    }

    #[test]
    fn expansion_deduplicates_keeping_first_position() {
        let config = config_from(
            "product_groups:\n  core: [liba, libb]\n  extra: [libb, libc]\n",
        );
        let expanded = config.expand_product_groups(&[
            "core".to_string(),
            "extra".to_string(),
            "liba".to_string(),
        ]);
        assert_eq!(expanded, vec!["liba", "libb", "libc"]);
    }
}
