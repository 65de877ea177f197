//! Type dictionary (§4.A)
//!
//! A static, case-insensitive map from DSL type heads to the wire form
//! `information_schema.columns.data_type` reports back. Unknown heads map to
//! their lower-case identity, so a custom Postgres type (an enum, a domain)
//! still round-trips through the diff engine without special-casing.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static DICTIONARY: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();

    m.insert("SERIAL", "integer");
    m.insert("SERIAL4", "integer");
    m.insert("SMALLSERIAL", "smallint");
    m.insert("SERIAL2", "smallint");
    m.insert("BIGSERIAL", "bigint");
    m.insert("SERIAL8", "bigint");

    m.insert("VARCHAR", "character varying");
    m.insert("CHAR", "character");
    m.insert("INT", "integer");
    m.insert("INTEGER", "integer");
    m.insert("INT4", "integer");
    m.insert("INT2", "smallint");
    m.insert("SMALLINT", "smallint");
    m.insert("INT8", "bigint");
    m.insert("BIGINT", "bigint");
    m.insert("REAL", "real");
    m.insert("FLOAT4", "real");
    m.insert("DOUBLE", "double precision");
    m.insert("FLOAT", "double precision");
    m.insert("FLOAT8", "double precision");
    m.insert("NUMERIC", "numeric");
    m.insert("DECIMAL", "numeric");
    m.insert("TIMESTAMP", "timestamp without time zone");
    m.insert("TIMESTAMPTZ", "timestamp with time zone");
    m.insert("DATE", "date");
    m.insert("TIME", "time without time zone");
    m.insert("TIMETZ", "time with time zone");
    m.insert("BOOLEAN", "boolean");
    m.insert("BOOL", "boolean");
    m.insert("JSON", "json");
    m.insert("JSONB", "jsonb");
    m.insert("UUID", "uuid");
    m.insert("VARBIT", "bit varying");

    m
});

/// The family of SERIAL-like aliases. A column whose resolved type head is
/// one of these implies NOT NULL and must never emit a DEFAULT clause (§3
/// invariants).
const SERIAL_HEADS: &[&str] = &[
    "SERIAL",
    "SERIAL4",
    "SMALLSERIAL",
    "SERIAL2",
    "BIGSERIAL",
    "SERIAL8",
];

/// Resolve a DSL type head (the part of the type spec before an optional
/// `(N)`/`(P,S)`) to its catalog wire form. Case-insensitive; unknown heads
/// fall back to their lower-cased identity.
pub fn wire_form(head: &str) -> String {
    let upper = head.to_uppercase();
    DICTIONARY
        .get(upper.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| head.to_lowercase())
}

/// Whether `head` (case-insensitive) is one of the SERIAL aliases.
pub fn is_serial_head(head: &str) -> bool {
    let upper = head.to_uppercase();
    SERIAL_HEADS.contains(&upper.as_str())
}
