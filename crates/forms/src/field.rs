//! Field kinds and per-field rules.
//!
//! Rules receive the whole form `data` next to the field value so that a
//! requirement can depend on sibling fields (a realm that is only required
//! for some authentication schemes, group settings that only apply when
//! groups are mapped, ...).

use std::fmt;

use serde_json::Value;

use crate::key_path::KeyPath;

pub type Predicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;
pub type Rule = Box<dyn Fn(&Value, &Value) -> Result<(), String> + Send + Sync>;

/// A single form field kind.
///
/// Secret values are kept in plain text in the form data; masking is the
/// renderer's job.
#[derive(Debug, Clone, PartialEq)]
pub enum FormFieldKind {
    Text,
    Secret,
    Number,
    Bool,
    Select { options: Vec<String> },
}

pub enum Requirement {
    Optional,
    Always,
    /// Required only while the predicate holds for the current data.
    When(Predicate),
}

impl Requirement {
    pub fn applies(&self, data: &Value) -> bool {
        match self {
            Requirement::Optional => false,
            Requirement::Always => true,
            Requirement::When(pred) => pred(data),
        }
    }
}

impl fmt::Debug for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Optional => write!(f, "Optional"),
            Requirement::Always => write!(f, "Always"),
            Requirement::When(_) => write!(f, "When(..)"),
        }
    }
}

/// Declarative description of a form field.
pub struct FormField {
    pub key: KeyPath,
    pub label: String,
    pub kind: FormFieldKind,
    pub help: Option<String>,
    /// Value of the blank initial state.
    pub default: Value,
    pub requirement: Requirement,
    pub validator: Option<Rule>,
}

impl FormField {
    /// Create a new field definition with a kind-appropriate blank default.
    pub fn new(key: impl Into<KeyPath>, label: impl Into<String>, kind: FormFieldKind) -> Self {
        let default = match &kind {
            FormFieldKind::Bool => Value::Bool(false),
            FormFieldKind::Number => Value::Null,
            FormFieldKind::Select { options } => options
                .first()
                .map(|o| Value::String(o.clone()))
                .unwrap_or(Value::Null),
            FormFieldKind::Text | FormFieldKind::Secret => Value::String(String::new()),
        };
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            help: None,
            default,
            requirement: Requirement::Optional,
            validator: None,
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.requirement = Requirement::Always;
        self
    }

    pub fn required_when(mut self, pred: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.requirement = Requirement::When(Box::new(pred));
        self
    }

    /// Attach a rule; it only runs for non-blank values.
    pub fn validator(
        mut self,
        f: impl Fn(&Value, &Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Box::new(f));
        self
    }

    pub fn is_secret(&self) -> bool {
        matches!(self.kind, FormFieldKind::Secret)
    }
}

impl fmt::Debug for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormField")
            .field("key", &self.key.to_string())
            .field("kind", &self.kind)
            .field("requirement", &self.requirement)
            .finish_non_exhaustive()
    }
}
