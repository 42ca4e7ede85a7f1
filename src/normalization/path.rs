//! Tolerant lookups into provider JSON.
//!
//! Every accessor walks a key path and falls back to an empty default on any missing or
//! mistyped segment, so callers never branch on intermediate levels. Numeric segments index
//! into arrays.

use serde_json::Value;

pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, seg| match node {
        Value::Object(map) => map.get(*seg),
        Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// First path that resolves to a non-null value.
pub fn lookup_any<'a>(root: &'a Value, paths: &[&[&str]]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|p| lookup(root, p))
        .find(|v| !v.is_null())
}

/// String at `path`, or `""`.
pub fn str_or_default(root: &Value, path: &[&str]) -> String {
    lookup(root, path)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Strings and numbers rendered as text; anything else is `None`.
pub fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer from a number (truncating floats) or a numeric string.
pub fn as_i64_lenient(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(f) = v.as_f64() {
        return Some(f as i64);
    }
    v.as_str().and_then(|s| s.trim().parse::<i64>().ok())
}

pub fn i64_or_default(root: &Value, path: &[&str]) -> i64 {
    lookup(root, path).and_then(as_i64_lenient).unwrap_or(0)
}

pub fn bool_or_default(root: &Value, path: &[&str]) -> bool {
    lookup(root, path).and_then(Value::as_bool).unwrap_or(false)
}

/// Array at `path`, or an empty slice.
pub fn array_or_empty<'a>(root: &'a Value, path: &[&str]) -> &'a [Value] {
    lookup(root, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// String elements of the array at `path`, in source order; non-strings are skipped.
pub fn strings_or_empty(root: &Value, path: &[&str]) -> Vec<String> {
    array_or_empty(root, path)
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_segments_fall_back_to_defaults() {
        let v = json!({"a": {"b": {"c": 7}}});
        assert_eq!(i64_or_default(&v, &["a", "b", "c"]), 7);
        assert_eq!(i64_or_default(&v, &["a", "x", "c"]), 0);
        assert_eq!(str_or_default(&v, &["a", "b"]), "");
        assert!(array_or_empty(&v, &["nope"]).is_empty());
        assert!(!bool_or_default(&v, &["a"]));
    }

    #[test]
    fn numeric_segments_index_arrays() {
        let v = json!({"items": [{"name": "x"}, {"name": "y"}]});
        assert_eq!(str_or_default(&v, &["items", "1", "name"]), "y");
        assert_eq!(str_or_default(&v, &["items", "5", "name"]), "");
    }

    #[test]
    fn lookup_any_skips_nulls() {
        let v = json!({"a": null, "b": "hit"});
        assert_eq!(lookup_any(&v, &[&["a"], &["b"]]), Some(&json!("hit")));
    }

    #[test]
    fn lenient_scalars() {
        assert_eq!(as_i64_lenient(&json!("42")), Some(42));
        assert_eq!(as_i64_lenient(&json!(1609459200000.0)), Some(1609459200000));
        assert_eq!(scalar_string(&json!(-7608764736147602991i64)).as_deref(), Some("-7608764736147602991"));
        assert_eq!(scalar_string(&json!("  ")), None);
    }

    #[test]
    fn string_lists_keep_order_and_skip_non_strings() {
        let v = json!({"terms": ["b", 1, "a", null]});
        assert_eq!(strings_or_empty(&v, &["terms"]), vec!["b", "a"]);
    }
}
