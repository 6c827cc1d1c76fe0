// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! JSONPath adapter.
//!
//! Programs arrive in kubectl template form (`{.spec.containers[*].name}`,
//! possibly several `{…}` groups) or as bare queries (`.spec.replicas`,
//! `$.spec.replicas`). Each group is normalized to an RFC 9535 query and
//! run over the input value; the matches of all groups are flattened
//! into one sequence. A key that matches nothing contributes an empty
//! match set rather than an error.

use anyhow::{Context, Result};
use serde_json::Value;
use serde_json_path::JsonPath;

pub fn run(program: &str, input: &Value) -> Result<Value> {
    let mut matches = Vec::new();

    for query in queries(program) {
        let path = JsonPath::parse(&query)
            .with_context(|| format!("jsonpath error in {program:?}"))?;
        matches.extend(path.query(input).all().into_iter().cloned());
    }

    Ok(Value::Array(matches))
}

/// Split a template into its queries: the content of each `{…}` group,
/// or the whole program when no braces are present.
fn queries(program: &str) -> Vec<String> {
    let trimmed = program.trim();
    if !trimmed.contains('{') {
        return vec![normalize(trimmed)];
    }

    let mut out = Vec::new();
    let mut rest = trimmed;
    while let Some(open) = rest.find('{') {
        match rest[open..].find('}') {
            Some(offset) => {
                let close = open + offset;
                out.push(normalize(&rest[open + 1..close]));
                rest = &rest[close + 1..];
            }
            None => {
                // unbalanced group; let the engine report it
                out.push(normalize(&rest[open + 1..]));
                break;
            }
        }
    }
    out
}

/// Root a relative query at `$`.
fn normalize(query: &str) -> String {
    let query = query.trim();
    if query.starts_with('$') {
        query.to_string()
    } else if query.is_empty() {
        "$".to_string()
    } else if query.starts_with('.') || query.starts_with('[') {
        format!("${query}")
    } else {
        format!("$.{query}")
    }
}
