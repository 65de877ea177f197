//! The configuration record (§6).
//!
//! Deserialized directly off the merged YAML+env document by
//! `config::loader`; by the time an `Engine` sees a `Config`, every
//! `<ENV.NAME>` placeholder has already been resolved.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// `host` may be written as a single string or a list (read-replica
/// fan-out); both forms normalize to a `Vec<String>` with at least one
/// entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostField {
    Single(String),
    Many(Vec<String>),
}

impl HostField {
    pub fn hosts(&self) -> Vec<String> {
        match self {
            HostField::Single(h) => vec![h.clone()],
            HostField::Many(hs) => hs.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Write,
    Read,
}

/// `path` may be one declaration directory or several, searched in the
/// order given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathField {
    Single(String),
    Many(Vec<String>),
}

impl PathField {
    pub fn paths(&self) -> Vec<String> {
        match self {
            PathField::Single(p) => vec![p.clone()],
            PathField::Many(ps) => ps.clone(),
        }
    }
}

/// One connection target inside a cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub host: HostField,
    pub port: u16,
    pub user: String,
    pub pass: String,
    #[serde(rename = "type")]
    pub role: Option<NodeRole>,
    pub pref: Option<String>,
    pub path: Option<PathField>,
    #[serde(rename = "tenantKeys")]
    pub tenant_keys: Option<Vec<String>>,
    #[serde(rename = "poolMax")]
    pub pool_max: Option<u32>,
}

/// A cluster entry: either one node, or an ordered list (first write-role
/// node found is the write target; the rest are read replicas).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClusterEntry {
    Single(Node),
    Many(Vec<Node>),
}

impl ClusterEntry {
    pub fn nodes(&self) -> Vec<&Node> {
        match self {
            ClusterEntry::Single(n) => vec![n],
            ClusterEntry::Many(ns) => ns.iter().collect(),
        }
    }

    /// The node to migrate/reflect against: the first node tagged
    /// `type: write`, or the first node if none is tagged.
    pub fn primary_node(&self) -> &Node {
        let nodes = self.nodes();
        nodes
            .iter()
            .find(|n| n.role == Some(NodeRole::Write))
            .copied()
            .unwrap_or(nodes[0])
    }
}

/// One entry of `config.customFields`: a named shortcut for a column type
/// plus optional default/key/extra.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomFieldAlias {
    #[serde(rename = "type")]
    pub field_type: Option<String>,
    pub key: Option<String>,
    pub default: Option<String>,
    pub extra: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Table,
    Json,
}

/// The top-level configuration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub clusters: IndexMap<String, ClusterEntry>,
    #[serde(default, rename = "customFields")]
    pub custom_fields: IndexMap<String, CustomFieldAlias>,
    #[serde(rename = "seedPath")]
    pub seed_path: Option<String>,
    #[serde(rename = "seedSuffix")]
    pub seed_suffix: Option<String>,
    #[serde(default, rename = "displayMode")]
    pub display_mode: DisplayMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_node_cluster_round_trips_through_yaml() {
        let yaml = r#"
clusters:
  main:
    name: app_db
    host: localhost
    port: 5432
    user: app
    pass: secret
customFields:
  id:
    type: serial
    key: PRIMARY
seedPath: seeds
seedSuffix: .seed.yml
displayMode: json
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.clusters.len(), 1);
        let entry = &config.clusters["main"];
        assert_eq!(entry.nodes().len(), 1);
        assert_eq!(entry.primary_node().name, "app_db");
        assert_eq!(entry.primary_node().host.hosts(), vec!["localhost".to_string()]);
        assert_eq!(config.display_mode, DisplayMode::Json);
        assert_eq!(config.custom_fields["id"].field_type.as_deref(), Some("serial"));
    }

    #[test]
    fn test_multi_node_cluster_prefers_write_role() {
        let yaml = r#"
clusters:
  main:
    - name: app_db
      host: replica1
      port: 5432
      user: app
      pass: secret
      type: read
    - name: app_db
      host: primary
      port: 5432
      user: app
      pass: secret
      type: write
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let entry = &config.clusters["main"];
        assert_eq!(entry.nodes().len(), 2);
        assert_eq!(entry.primary_node().host.hosts(), vec!["primary".to_string()]);
    }
}
