//! Declaration and seed file discovery (§6)
//!
//! Non-recursive, `.yml`/`.yaml` only, lexicographic enumeration order. The
//! teacher has no filesystem layer of its own (db-hive's schema comes from
//! Tauri commands talking directly to the connected database), so this is
//! grounded on the plain `std::fs` idiom the rest of the pack uses for
//! config/data discovery rather than on anything in `db-hive` itself.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{EngineError, Result};

/// One parsed declaration file: table name -> raw field map, in file order.
#[derive(Debug, Clone)]
pub struct DeclarationFile {
    pub path: PathBuf,
    pub tables: IndexMap<String, IndexMap<String, String>>,
}

/// One parsed seed file: table name -> ordered row list, each row a
/// column-name -> value map.
#[derive(Debug, Clone)]
pub struct SeedFile {
    pub path: PathBuf,
    pub tables: IndexMap<String, Vec<IndexMap<String, serde_yaml::Value>>>,
}

/// List `.yml`/`.yaml` files directly inside `dir`, lexicographically by
/// file name. Non-recursive: a directory given in `path` is a leaf, not a
/// tree to walk.
pub fn list_yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        EngineError::Configuration(format!("cannot read declaration directory {}: {e}", dir.display()))
    })?;

    let mut by_name: BTreeMap<String, PathBuf> = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            EngineError::Configuration(format!("cannot read entry in {}: {e}", dir.display()))
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"))
            .unwrap_or(false);
        if is_yaml {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                by_name.insert(name.to_string(), path);
            }
        }
    }

    Ok(by_name.into_values().collect())
}

/// Parse a declaration file. A table whose value contains a truthy
/// `~ignore` key is still returned (the caller, per the orchestrator's
/// contract, is responsible for skipping it) so the parse step itself
/// stays a pure file-to-structure transform.
pub fn load_declaration_file(path: &Path) -> Result<DeclarationFile> {
    let content = std::fs::read_to_string(path).map_err(|e| EngineError::Parse {
        file: path.display().to_string(),
        message: e.to_string(),
    })?;

    let tables: IndexMap<String, IndexMap<String, String>> =
        serde_yaml::from_str(&content).map_err(|e| EngineError::Parse {
            file: path.display().to_string(),
            message: e.to_string(),
        })?;

    Ok(DeclarationFile {
        path: path.to_path_buf(),
        tables,
    })
}

/// Whether a declaration's raw field map carries a truthy `~ignore` entry.
pub fn is_ignored(fields: &IndexMap<String, String>) -> bool {
    fields
        .get("~ignore")
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

pub fn load_seed_file(path: &Path) -> Result<SeedFile> {
    let content = std::fs::read_to_string(path).map_err(|e| EngineError::Parse {
        file: path.display().to_string(),
        message: e.to_string(),
    })?;

    let tables: IndexMap<String, Vec<IndexMap<String, serde_yaml::Value>>> =
        serde_yaml::from_str(&content).map_err(|e| EngineError::Parse {
            file: path.display().to_string(),
            message: e.to_string(),
        })?;

    Ok(SeedFile {
        path: path.to_path_buf(),
        tables,
    })
}

/// Apply a cluster table-name prefix, rewriting only names that don't
/// already carry it (§4.H step 1).
pub fn apply_prefix(prefix: Option<&str>, table_name: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() && !table_name.starts_with(p) => format!("{p}{table_name}"),
        _ => table_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_yaml_files_is_lexicographic_and_filters_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "").unwrap();
        std::fs::write(dir.path().join("a.yml"), "").unwrap();
        std::fs::write(dir.path().join("c.txt"), "").unwrap();

        let files = list_yaml_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.yml".to_string(), "b.yaml".to_string()]);
    }

    #[test]
    fn test_load_declaration_file_preserves_table_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.yml");
        std::fs::write(
            &path,
            "users:\n  user_id: id\n  user_name: str required\nsessions:\n  session_id: id\n",
        )
        .unwrap();

        let file = load_declaration_file(&path).unwrap();
        assert_eq!(
            file.tables.keys().collect::<Vec<_>>(),
            vec!["users", "sessions"]
        );
    }

    #[test]
    fn test_is_ignored_accepts_truthy_variants() {
        let mut fields = IndexMap::new();
        fields.insert("~ignore".to_string(), "true".to_string());
        assert!(is_ignored(&fields));

        let mut fields2 = IndexMap::new();
        fields2.insert("~ignore".to_string(), "false".to_string());
        assert!(!is_ignored(&fields2));

        assert!(!is_ignored(&IndexMap::new()));
    }

    #[test]
    fn test_apply_prefix() {
        assert_eq!(apply_prefix(Some("tenant_"), "users"), "tenant_users");
        assert_eq!(apply_prefix(Some("tenant_"), "tenant_users"), "tenant_users");
        assert_eq!(apply_prefix(None, "users"), "users");
    }

    #[test]
    fn test_load_seed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.seed.yml");
        std::fs::write(&path, "users:\n  - id: 1\n    name: Alice\n  - id: 2\n    name: Bob\n").unwrap();

        let file = load_seed_file(&path).unwrap();
        assert_eq!(file.tables["users"].len(), 2);
    }
}
