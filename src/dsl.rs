//! DSL parser (§4.C)
//!
//! Consumes a raw `fields: mapping<string, string>` (as loaded from YAML by
//! `files::load_declaration_file`) plus a `customFieldAliases` mapping, and
//! produces a `ParsedSchema`. Pure: no network, no filesystem.

use indexmap::IndexMap;

use crate::config::model::CustomFieldAlias;
use crate::error::{EngineError, Result};
use crate::model::{FieldDefinition, KeyKind, Nullability, ParsedSchema};
use crate::types;

/// Parse one table's raw field map into a `ParsedSchema`.
///
/// `table` is only used for error context; meta-keys (`~`-prefixed) are the
/// caller's concern (`~ignore` table skip, prefix rewrite) — this function
/// only skips `~`-prefixed field entries, per §3 invariants.
pub fn parse_fields(
    table: &str,
    fields: &IndexMap<String, String>,
    aliases: &IndexMap<String, CustomFieldAlias>,
) -> Result<ParsedSchema> {
    let mut schema = ParsedSchema::new();

    for (name, raw_value) in fields {
        if name.starts_with('~') {
            continue;
        }

        let field = parse_field_value(table, name, raw_value, aliases)?;

        match field.key {
            KeyKind::None => {}
            KeyKind::Primary => {
                if schema.primary_key_column().is_some() {
                    return Err(EngineError::Parse {
                        file: table.to_string(),
                        message: format!(
                            "table {table} declares more than one PRIMARY column"
                        ),
                    });
                }
            }
            KeyKind::UniqueSingle => {}
        }

        let modifiers = tokenize(raw_value);
        apply_index_modifiers(&mut schema, name, &modifiers);

        schema.fields.insert(name.clone(), field);
    }

    Ok(schema)
}

fn tokenize(raw_value: &str) -> Vec<String> {
    raw_value
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

fn apply_index_modifiers(schema: &mut ParsedSchema, column: &str, modifiers: &[String]) {
    for token in modifiers.iter().skip(1) {
        let (head, rest) = split_once_slash(token);
        match head.as_str() {
            "index" => match rest {
                None => {
                    if !schema.individual_indexes.iter().any(|c| c == column) {
                        schema.individual_indexes.push(column.to_string());
                    }
                }
                Some(groups) => {
                    for group in groups.split(',') {
                        let entry = schema
                            .composite_indexes
                            .entry(group.to_string())
                            .or_default();
                        if !entry.iter().any(|c| c == column) {
                            entry.push(column.to_string());
                        }
                    }
                }
            },
            "unique" => {
                if let Some(groups) = rest {
                    for group in groups.split(',') {
                        let entry = schema
                            .composite_unique_indexes
                            .entry(group.to_string())
                            .or_default();
                        if !entry.iter().any(|c| c == column) {
                            entry.push(column.to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn split_once_slash(token: &str) -> (String, Option<String>) {
    match token.split_once('/') {
        Some((head, rest)) => (head.to_string(), Some(rest.to_string())),
        None => (token.to_string(), None),
    }
}

/// Parse one `"type[/len] modifier1 modifier2 …"` value into a
/// `FieldDefinition`.
fn parse_field_value(
    table: &str,
    name: &str,
    raw_value: &str,
    aliases: &IndexMap<String, CustomFieldAlias>,
) -> Result<FieldDefinition> {
    let tokens = tokenize(raw_value);
    let type_spec = tokens.first().ok_or_else(|| EngineError::Parse {
        file: table.to_string(),
        message: format!("column {name} has an empty type spec"),
    })?;

    let (alias_head, length_override) = split_once_slash(type_spec);
    let alias = aliases.get(&alias_head);

    let resolved_head = alias
        .and_then(|a| a.field_type.as_deref())
        .unwrap_or(&alias_head);

    // The alias's own `Type` may itself be written in `alias[/length]` form
    // (e.g. `str: { type: "varchar/64" }`): split it the same way the user's
    // type spec is split, so the column's `/64` survives into the
    // parenthesized form instead of being passed through as a literal `/`.
    let (resolved_head, alias_length) = split_once_slash(resolved_head);
    let length = length_override.or(alias_length);

    let mut field_type = resolve_type(&resolved_head, length.as_deref());

    let is_serial = types::is_serial_head(first_word(&field_type));

    let mut nullable = Nullability::Null;
    let mut key = KeyKind::None;
    let mut default_raw: Option<String> = alias.and_then(|a| a.default.clone());
    let mut extra = String::new();

    for token in tokens.iter().skip(1) {
        let (head, rest) = split_once_slash(token);
        match head.as_str() {
            "required" => nullable = Nullability::NotNull,
            "unique" => {
                if rest.is_none() {
                    key = KeyKind::UniqueSingle;
                }
            }
            "index" => {}
            "default" => {
                if let Some(value) = rest {
                    default_raw = Some(unescape_token(&value));
                }
            }
            _ => {}
        }
    }

    // Alias Key overrides a plain `unique` modifier; modifiers are applied
    // first and the alias second, per the explicit ordering in the open
    // questions.
    if let Some(alias) = alias {
        if let Some(alias_key) = &alias.key {
            key = match alias_key.to_uppercase().as_str() {
                "PRIMARY" => KeyKind::Primary,
                "UNIQUE" => KeyKind::UniqueSingle,
                _ => key,
            };
        }
        if let Some(alias_extra) = &alias.extra {
            extra = alias_extra.to_uppercase();
        }
    }

    if is_serial {
        nullable = Nullability::Unspecified;
        default_raw = None;
    }

    field_type = field_type.to_uppercase();

    Ok(FieldDefinition {
        name: name.to_string(),
        field_type,
        nullable,
        key,
        default_raw,
        extra,
    })
}

fn first_word(s: &str) -> &str {
    s.split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or(s)
}

fn unescape_token(value: &str) -> String {
    value.replace("\\/", "/").replace("\\ ", " ")
}

/// Resolve `head` (possibly a custom alias name) plus an optional
/// `length_override` of the form `N` or `P,S` into a catalog-ready type
/// string, e.g. `resolve_type("varchar", Some("64"))` -> `VARCHAR(64)`.
///
/// `FieldDefinition::field_type` keeps the head the user wrote (or the
/// alias's `Type`), not the type dictionary's wire form: `VARCHAR(64)`, not
/// `CHARACTER VARYING(64)`. The dictionary (`types::wire_form`) is only
/// consulted by the diff engine, when comparing against the reflected
/// `data_type` the catalog actually reports.
fn resolve_type(head: &str, length_override: Option<&str>) -> String {
    let (bare_head, existing_len) = split_paren(head);
    let display_head = bare_head.to_uppercase();

    let length = length_override.or(existing_len.as_deref());

    match length {
        Some(len) => format!("{display_head}({len})"),
        None => display_head,
    }
}

fn split_paren(head: &str) -> (String, Option<String>) {
    if let Some(start) = head.find('(') {
        if let Some(end) = head.rfind(')') {
            if end > start {
                return (head[..start].to_string(), Some(head[start + 1..end].to_string()));
            }
        }
    }
    (head.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_aliases() -> IndexMap<String, CustomFieldAlias> {
        IndexMap::new()
    }

    #[test]
    fn test_fresh_table_scenario_from_spec() {
        let mut fields = IndexMap::new();
        fields.insert("user_id".to_string(), "id".to_string());
        fields.insert(
            "user_name".to_string(),
            "str required".to_string(),
        );
        fields.insert(
            "user_email".to_string(),
            "email unique index".to_string(),
        );

        let mut aliases = IndexMap::new();
        aliases.insert(
            "id".to_string(),
            CustomFieldAlias {
                field_type: Some("serial".to_string()),
                key: Some("PRIMARY".to_string()),
                default: None,
                extra: None,
            },
        );
        aliases.insert(
            "str".to_string(),
            CustomFieldAlias {
                field_type: Some("varchar/64".to_string()),
                key: None,
                default: None,
                extra: None,
            },
        );
        aliases.insert(
            "email".to_string(),
            CustomFieldAlias {
                field_type: Some("varchar/128".to_string()),
                key: None,
                default: None,
                extra: None,
            },
        );

        let schema = parse_fields("users", &fields, &aliases).unwrap();

        let id = &schema.fields["user_id"];
        assert_eq!(id.field_type, "SERIAL");
        assert_eq!(id.key, KeyKind::Primary);
        assert_eq!(id.nullable, Nullability::Unspecified);

        let name = &schema.fields["user_name"];
        assert_eq!(name.field_type, "VARCHAR(64)");
        assert_eq!(name.nullable, Nullability::NotNull);

        let email = &schema.fields["user_email"];
        assert_eq!(email.field_type, "VARCHAR(128)");
        assert_eq!(email.key, KeyKind::UniqueSingle);
        assert_eq!(schema.individual_indexes, vec!["user_email".to_string()]);
    }

    #[test]
    fn test_composite_unique_group() {
        let mut fields = IndexMap::new();
        fields.insert("tenant_id".to_string(), "integer unique/tenant_slug".to_string());
        fields.insert("slug".to_string(), "varchar/64 unique/tenant_slug".to_string());

        let schema = parse_fields("t", &fields, &no_aliases()).unwrap();
        assert_eq!(
            schema.composite_unique_indexes.get("tenant_slug").unwrap(),
            &vec!["tenant_id".to_string(), "slug".to_string()]
        );
    }

    #[test]
    fn test_tilde_fields_are_skipped() {
        let mut fields = IndexMap::new();
        fields.insert("id".to_string(), "serial".to_string());
        fields.insert("~ignore".to_string(), "true".to_string());

        let schema = parse_fields("t", &fields, &no_aliases()).unwrap();
        assert_eq!(schema.fields.len(), 1);
        assert!(schema.fields.contains_key("id"));
    }

    #[test]
    fn test_default_modifier() {
        let mut fields = IndexMap::new();
        fields.insert("status".to_string(), "varchar/32 default/active".to_string());

        let schema = parse_fields("t", &fields, &no_aliases()).unwrap();
        assert_eq!(schema.fields["status"].default_raw.as_deref(), Some("active"));
    }

    #[test]
    fn test_duplicate_primary_key_is_rejected() {
        let mut fields = IndexMap::new();
        fields.insert("a".to_string(), "serial".to_string());
        fields.insert("b".to_string(), "serial".to_string());

        let mut aliases = IndexMap::new();
        aliases.insert(
            "serial".to_string(),
            CustomFieldAlias {
                field_type: Some("serial".to_string()),
                key: Some("PRIMARY".to_string()),
                default: None,
                extra: None,
            },
        );

        let err = parse_fields("t", &fields, &aliases).unwrap_err();
        assert!(matches!(err, EngineError::Parse { .. }));
    }

    #[test]
    fn test_numeric_precision_scale() {
        let mut fields = IndexMap::new();
        fields.insert("amount".to_string(), "numeric/10,2".to_string());
        let schema = parse_fields("t", &fields, &no_aliases()).unwrap();
        assert_eq!(schema.fields["amount"].field_type, "NUMERIC(10,2)");
    }
}
