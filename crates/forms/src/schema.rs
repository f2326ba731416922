use serde_json::Value;

use crate::errors::FormError;
use crate::field::{FormField, FormFieldKind};
use crate::key_path::KeyPath;
use crate::validation::{self, ValidationErrors};

/// Ordered collection of fields for one wizard step.
///
/// `validate` is the step's validator: a pure function of `data` that yields
/// one entry per field.
#[derive(Debug)]
pub struct FormSchema {
    pub title: String,
    pub fields: Vec<FormField>,
}

impl FormSchema {
    pub fn new(title: impl Into<String>, fields: Vec<FormField>) -> Self {
        Self {
            title: title.into(),
            fields,
        }
    }

    pub fn field_by_key(&self, key: &KeyPath) -> Option<&FormField> {
        self.fields.iter().find(|f| &f.key == key)
    }

    pub fn require_field(&self, key: &KeyPath) -> Result<&FormField, FormError> {
        self.field_by_key(key)
            .ok_or_else(|| FormError::UnknownField(key.to_string()))
    }

    /// The blank initial state of the form.
    pub fn defaults(&self) -> Value {
        self.fields
            .iter()
            .fold(Value::Object(Default::default()), |acc, f| {
                f.key.set(&acc, f.default.clone())
            })
    }

    pub fn validate(&self, data: &Value) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for f in &self.fields {
            let name = f.key.to_string();
            errors.insert(name.clone(), None);

            let value = f.key.get(data);
            if validation::is_blank(value) {
                if f.requirement.applies(data) {
                    errors.reject(name, validation::FIELD_REQUIRED);
                }
                continue;
            }
            let value = value.unwrap_or(&Value::Null);

            // Built-in sanity check for numeric fields
            if matches!(f.kind, FormFieldKind::Number) {
                if let Some(msg) = validation::in_range(value, None, None, true) {
                    errors.reject(name.clone(), msg);
                }
            }

            if let Some(rule) = &f.validator {
                if let Err(msg) = rule(value, data) {
                    errors.reject(name, msg);
                }
            }
        }
        errors
    }

    /// Paths of all secret fields.
    pub fn secret_keys(&self) -> impl Iterator<Item = &KeyPath> {
        self.fields.iter().filter(|f| f.is_secret()).map(|f| &f.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{FIELD_REQUIRED, NAN};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> FormSchema {
        FormSchema::new(
            "Connection",
            vec![
                FormField::new("host", "Host", FormFieldKind::Text).required(),
                FormField::new("port", "Port", FormFieldKind::Number)
                    .required()
                    .validator(|v, _| {
                        match validation::in_range(v, Some(1.0), Some(65535.0), false) {
                            Some(msg) => Err(msg),
                            None => Ok(()),
                        }
                    }),
                FormField::new(
                    "scheme",
                    "Scheme",
                    FormFieldKind::Select {
                        options: vec!["NONE".into(), "DIGEST_MD5".into()],
                    },
                ),
                FormField::new("realm", "Realm", FormFieldKind::Text)
                    .required_when(|data| data["scheme"] == "DIGEST_MD5"),
            ],
        )
    }

    #[test]
    fn defaults_build_blank_state() {
        assert_eq!(
            schema().defaults(),
            json!({"host": "", "port": null, "scheme": "NONE", "realm": ""})
        );
    }

    #[test]
    fn required_fields_are_reported() {
        let errors = schema().validate(&json!({"host": "", "port": 389, "scheme": "NONE"}));
        assert_eq!(errors.get("host"), Some(FIELD_REQUIRED));
        assert_eq!(errors.get("port"), None);
        assert_eq!(errors.get("realm"), None);
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn conditional_requirement_follows_siblings() {
        let s = schema();
        let plain = json!({"host": "h", "port": 389, "scheme": "NONE", "realm": ""});
        assert!(!s.validate(&plain).is_invalid());
        let digest = json!({"host": "h", "port": 389, "scheme": "DIGEST_MD5", "realm": ""});
        assert_eq!(s.validate(&digest).get("realm"), Some(FIELD_REQUIRED));
    }

    #[test]
    fn number_fields_get_a_sanity_check() {
        let errors = schema().validate(&json!({"host": "h", "port": "abc"}));
        assert_eq!(errors.get("port"), Some(NAN));
    }

    #[test]
    fn validation_is_deterministic() {
        let s = schema();
        let data = json!({"host": "", "port": 0, "scheme": "DIGEST_MD5"});
        assert_eq!(s.validate(&data), s.validate(&data));
    }
}
