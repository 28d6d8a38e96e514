//! Template variable resolver — `{{identifier}}` substitution over JSON values.
//!
//! This is the engine's only inter-step data-flow mechanism. It is textual:
//! every string leaf of the input is scanned for `{{identifier}}` and each
//! occurrence is replaced with the string form of `context[identifier.trim()]`.
//!
//! In [`ResolveMode::Lenient`] (the default) a missing key becomes the empty
//! string. [`ResolveMode::Strict`] collects every missing key and fails.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::workflow::schema::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    #[default]
    Lenient,
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unresolved template variables: {}", .missing.join(", "))]
pub struct ResolveError {
    pub missing: Vec<String>,
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("placeholder regex is valid"))
}

/// String form of a context value used for substitution.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Resolve a single template string against the context.
pub fn resolve_str(template: &str, context: &Context, mode: ResolveMode) -> Result<String, ResolveError> {
    let mut missing = BTreeSet::new();
    let resolved = substitute(template, context, &mut missing);
    finish(resolved, missing, mode)
}

/// Resolve every string leaf of `input` against the context.
///
/// Arrays and objects are rebuilt with the same shape; object keys are left
/// untouched and non-string scalars pass through unchanged.
pub fn resolve_value(input: &Value, context: &Context, mode: ResolveMode) -> Result<Value, ResolveError> {
    let mut missing = BTreeSet::new();
    let resolved = walk(input, context, &mut missing);
    finish(resolved, missing, mode)
}

fn finish<T>(resolved: T, missing: BTreeSet<String>, mode: ResolveMode) -> Result<T, ResolveError> {
    if mode == ResolveMode::Strict && !missing.is_empty() {
        return Err(ResolveError {
            missing: missing.into_iter().collect(),
        });
    }
    Ok(resolved)
}

fn walk(value: &Value, context: &Context, missing: &mut BTreeSet<String>) -> Value {
    match value {
        Value::String(s) => Value::String(substitute(s, context, missing)),
        Value::Array(items) => Value::Array(items.iter().map(|v| walk(v, context, missing)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), walk(v, context, missing)))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

fn substitute(template: &str, context: &Context, missing: &mut BTreeSet<String>) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }

    placeholder_re()
        .replace_all(template, |caps: &Captures| {
            let key = caps[1].trim();
            match context.get(key) {
                Some(value) => stringify(value),
                None => {
                    missing.insert(key.to_string());
                    String::new()
                }
            }
        })
        .into_owned()
}
