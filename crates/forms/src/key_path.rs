use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::errors::FormError;

/// Dotted path into a JSON object (`"connection.host"` -> `["connection", "host"]`).
///
/// The lens helpers (`get`, `set`, `remove`) never mutate their input; `set`
/// and `remove` return a new value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(pub Vec<String>);

impl KeyPath {
    pub fn new(parts: impl Into<Vec<String>>) -> Self {
        KeyPath(parts.into())
    }

    pub fn from_slice(parts: &[&str]) -> Self {
        KeyPath(parts.iter().map(|s| s.to_string()).collect())
    }

    pub fn push(&mut self, part: impl Into<String>) {
        self.0.push(part.into());
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read the value at this path.
    pub fn get<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(value, |current, part| current.as_object()?.get(part))
    }

    /// True if every segment of the path exists (a JSON `null` leaf counts).
    pub fn exists(&self, value: &Value) -> bool {
        self.get(value).is_some()
    }

    /// Return a copy of `value` with `new_value` stored at this path.
    ///
    /// Missing intermediate objects are created; non-object intermediates are
    /// replaced by objects.
    pub fn set(&self, value: &Value, new_value: Value) -> Value {
        let mut out = value.clone();
        set_in(&mut out, &self.0, new_value);
        out
    }

    /// Return a copy of `value` without the entry at this path.
    pub fn remove(&self, value: &Value) -> Value {
        let mut out = value.clone();
        if let Some((last, parents)) = self.0.split_last() {
            let parent = parents
                .iter()
                .try_fold(&mut out, |current, part| current.as_object_mut()?.get_mut(part));
            if let Some(Value::Object(map)) = parent {
                map.remove(last);
            }
        }
        out
    }

    /// All leaf paths of an object (non-object values are leaves).
    pub fn leaves(value: &Value) -> Vec<KeyPath> {
        let mut out = Vec::new();
        collect_leaves(value, &mut KeyPath::default(), &mut out);
        out
    }
}

fn set_in(target: &mut Value, parts: &[String], new_value: Value) {
    match parts.split_first() {
        None => *target = new_value,
        Some((head, rest)) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(map) = target {
                let child = map.entry(head.clone()).or_insert(Value::Null);
                set_in(child, rest, new_value);
            }
        }
    }
}

fn collect_leaves(value: &Value, prefix: &mut KeyPath, out: &mut Vec<KeyPath>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                prefix.push(key.clone());
                collect_leaves(child, prefix, out);
                prefix.0.pop();
            }
        }
        _ if !prefix.is_empty() => out.push(prefix.clone()),
        _ => {}
    }
}

impl FromStr for KeyPath {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.split('.').any(|part| part.trim().is_empty()) {
            return Err(FormError::InvalidKeyPath(s.to_string()));
        }
        Ok(KeyPath(s.split('.').map(str::to_string).collect()))
    }
}

impl From<&str> for KeyPath {
    /// Infallible conversion for literals; empty segments are dropped.
    fn from(s: &str) -> Self {
        KeyPath(
            s.split('.')
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn get_reads_nested_values() {
        let data = json!({"a": {"b": {"c": 3}}, "x": 1});
        assert_eq!(KeyPath::from("a.b.c").get(&data), Some(&json!(3)));
        assert_eq!(KeyPath::from("x").get(&data), Some(&json!(1)));
        assert_eq!(KeyPath::from("a.missing").get(&data), None);
        assert_eq!(KeyPath::from("x.y").get(&data), None);
    }

    #[test]
    fn set_returns_new_value_and_leaves_input_untouched() {
        let data = json!({"a": {"b": 1}});
        let updated = KeyPath::from("a.c.d").set(&data, json!("v"));
        assert_eq!(data, json!({"a": {"b": 1}}));
        assert_eq!(updated, json!({"a": {"b": 1, "c": {"d": "v"}}}));
    }

    #[test]
    fn set_replaces_scalar_intermediates() {
        let data = json!({"a": 5});
        let updated = KeyPath::from("a.b").set(&data, json!(true));
        assert_eq!(updated, json!({"a": {"b": true}}));
    }

    #[test]
    fn remove_drops_only_the_leaf() {
        let data = json!({"a": {"b": 1, "c": 2}});
        let updated = KeyPath::from("a.b").remove(&data);
        assert_eq!(updated, json!({"a": {"c": 2}}));
        assert_eq!(KeyPath::from("zzz.b").remove(&data), data);
    }

    #[test]
    fn leaves_lists_every_scalar_path() {
        let data = json!({"a": {"b": 1, "c": {}}, "d": null});
        let mut leaves: Vec<String> = KeyPath::leaves(&data)
            .iter()
            .map(|p| p.to_string())
            .collect();
        leaves.sort();
        assert_eq!(leaves, vec!["a.b", "a.c", "d"]);
    }

    #[test]
    fn parse_rejects_empty_segments() {
        assert!("a..b".parse::<KeyPath>().is_err());
        assert!("".parse::<KeyPath>().is_err());
        assert_eq!("a.b".parse::<KeyPath>().unwrap(), KeyPath::from_slice(&["a", "b"]));
    }
}
