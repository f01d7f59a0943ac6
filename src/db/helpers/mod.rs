use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_document(raw: &str, collection: &str, id: &str) -> Result<Value> {
    serde_json::from_str(raw)
        .with_context(|| format!("document {collection}/{id} is not valid JSON"))
}

/// Top-level merge: keys in `patch` replace keys in `target`.
pub fn merge_shallow(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}

/// Value at a dotted path, e.g. `profile.fullName`.
pub fn field<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
}
