//! Query - Mongo-style filters over JSON documents
//!
//! A filter is a JSON object. Plain fields match by equality (an array
//! field also matches if it contains the value); a field may instead map to
//! an operator object:
//!
//! | Operator | Meaning |
//! |---|---|
//! | `$eq` `$ne` | equal / not equal |
//! | `$gt` `$gte` `$lt` `$lte` | ordered comparison of numbers or strings |
//! | `$in` `$nin` | value in / not in the given array |
//! | `$exists` | field present (`true`) or absent (`false`) |
//! | `$not` | negates an operator object |
//!
//! At the top level `$and` and `$or` take arrays of filters and `$not` a
//! filter. Field names may be dotted paths into nested objects.

use serde_json::{Map, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    filter: Value,
}

impl Default for Query {
    fn default() -> Self {
        Self::all()
    }
}

impl From<Value> for Query {
    fn from(filter: Value) -> Self {
        Self::new(filter)
    }
}

impl Query {
    pub fn new(filter: Value) -> Self {
        Self { filter }
    }

    /// Match every document.
    pub fn all() -> Self {
        Self { filter: Value::Object(Map::new()) }
    }

    pub fn filter(&self) -> &Value {
        &self.filter
    }

    pub fn matches(&self, doc: &Value) -> bool {
        match_filter(&self.filter, doc)
    }
}

fn match_filter(filter: &Value, doc: &Value) -> bool {
    let Some(clauses) = filter.as_object() else {
        return false;
    };
    clauses.iter().all(|(key, cond)| match key.as_str() {
        "$and" => cond.as_array().is_some_and(|fs| fs.iter().all(|f| match_filter(f, doc))),
        "$or" => cond.as_array().is_some_and(|fs| fs.iter().any(|f| match_filter(f, doc))),
        "$not" => !match_filter(cond, doc),
        path => match_field(lookup(doc, path), cond),
    })
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn is_operator_object(cond: &Value) -> bool {
    cond.as_object()
        .is_some_and(|m| !m.is_empty() && m.keys().all(|k| k.starts_with('$')))
}

fn match_field(field: Option<&Value>, cond: &Value) -> bool {
    if !is_operator_object(cond) {
        return equals(field, cond);
    }
    let Some(ops) = cond.as_object() else {
        return false;
    };
    ops.iter().all(|(op, arg)| match op.as_str() {
        "$eq" => equals(field, arg),
        "$ne" => !equals(field, arg),
        "$gt" => compare(field, arg) == Some(Ordering::Greater),
        "$gte" => matches!(compare(field, arg), Some(Ordering::Greater | Ordering::Equal)),
        "$lt" => compare(field, arg) == Some(Ordering::Less),
        "$lte" => matches!(compare(field, arg), Some(Ordering::Less | Ordering::Equal)),
        "$in" => arg.as_array().is_some_and(|vs| vs.iter().any(|v| equals(field, v))),
        "$nin" => arg.as_array().is_some_and(|vs| !vs.iter().any(|v| equals(field, v))),
        "$exists" => arg.as_bool().is_some_and(|want| field.is_some() == want),
        "$not" => !match_field(field, arg),
        _ => false,
    })
}

fn equals(field: Option<&Value>, expected: &Value) -> bool {
    match field {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => items.iter().any(|v| same(v, expected)),
        Some(value) => same(value, expected),
    }
}

/// JSON equality with numbers compared by value (`1` equals `1.0`).
fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(field: Option<&Value>, arg: &Value) -> Option<Ordering> {
    match (field?, arg) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
