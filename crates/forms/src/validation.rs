//! Validation map + reusable rules.
//!
//! A validation map holds one entry per validated field: `None` means the
//! field is valid, `Some(message)` carries the message shown inline. A form
//! is submittable iff no entry is `Some`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FIELD_REQUIRED: &str = "This field is required";
pub const NAN: &str = "This field must contain a numeric value";
pub const DECIMAL: &str = "This field must not contain decimal values";
pub const INVALID_URI: &str = "This field must contain a valid URI";
pub const INVALID_NAME_CHARS: &str =
    "Only letters, digits, underscores(_), hyphens(-), and dots(.) are allowed and may not start with underscore or dot.";
pub const PRISTINE_TOOLTIP: &str = "There are no changes";
pub const INVALID_TOOLTIP: &str = "Validation errors are present";

pub fn min_message(min: f64) -> String {
    format!("The minimum value for this field is {}", trim_number(min))
}

pub fn max_message(max: f64) -> String {
    format!("The maximum value for this field is {}", trim_number(max))
}

fn trim_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

static URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z]*:.+$").expect("static URI pattern"));
static NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9\-]{1}[a-zA-Z0-9_\-\.]*$").expect("static name pattern")
});
static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]*$").expect("static integer pattern"));

/// Per-field validation result, ordered by field path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Option<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, error: Option<String>) {
        self.0.insert(field.into(), error);
    }

    /// Record an error, keeping an earlier one for the same field.
    pub fn reject(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let entry = self.0.entry(field.into()).or_insert(None);
        if entry.is_none() {
            *entry = Some(message.into());
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|e| e.as_deref())
    }

    /// True if any entry carries a message.
    pub fn is_invalid(&self) -> bool {
        self.0.values().any(Option::is_some)
    }

    /// Only the failing entries.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|msg| (k.as_str(), msg)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<String>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Option<String>)> for ValidationErrors {
    fn from_iter<T: IntoIterator<Item = (String, Option<String>)>>(iter: T) -> Self {
        ValidationErrors(iter.into_iter().collect())
    }
}

/// Blank = missing, `null`, or a string of only whitespace.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

pub fn not_blank(value: Option<&Value>) -> bool {
    !is_blank(value)
}

pub fn is_uri(s: &str) -> bool {
    URI.is_match(s)
}

pub fn is_name(s: &str) -> bool {
    NAME.is_match(s)
}

/// Numeric range check. Blank values pass (pair with a requirement rule).
pub fn in_range(
    value: &Value,
    min: Option<f64>,
    max: Option<f64>,
    allow_decimals: bool,
) -> Option<String> {
    let (number, text) = match value {
        Value::Null => return None,
        Value::Number(n) => (n.as_f64(), n.to_string()),
        Value::String(s) if s.trim().is_empty() => return None,
        Value::String(s) => (s.trim().parse::<f64>().ok(), s.trim().to_string()),
        _ => (None, String::new()),
    };
    let Some(number) = number else {
        return Some(NAN.to_string());
    };
    if !allow_decimals && (!INTEGER.is_match(&text) || number.fract() != 0.0) {
        return Some(DECIMAL.to_string());
    }
    if let Some(min) = min.filter(|min| number < *min) {
        return Some(min_message(min));
    }
    if let Some(max) = max.filter(|max| number > *max) {
        return Some(max_message(max));
    }
    None
}

/// Reason the save action is disabled, if any.
pub fn save_tooltip(is_pristine: bool, is_invalid: bool) -> Option<&'static str> {
    if is_pristine {
        Some(PRISTINE_TOOLTIP)
    } else if is_invalid {
        Some(INVALID_TOOLTIP)
    } else {
        None
    }
}
