//! Form runtime state.
//!
//! `FormContext` holds the current editing state of one wizard step:
//!   * `data` / `pristine_data` (JSON objects addressed by key paths)
//!   * the validation map produced by the step's schema
//!   * touched flags and the errors returned by the last failed save
//!
//! All mutation goes through the methods below so that `is_pristine` and
//! `validation_errors` never drift from `data`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use tracing::debug;

use crate::key_path::KeyPath;
use crate::schema::FormSchema;
use crate::validation::{self, ValidationErrors};

/// What happens to fields when a second template is applied.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TemplatePolicy {
    /// Template fields are replaced, hand-edited fields are kept.
    #[default]
    PreserveEdits,
    /// Every template field is replaced, edits included.
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormContext {
    pub data: Value,
    pub pristine_data: Value,
    pub validation_errors: ValidationErrors,
    pub is_pristine: bool,
    pub is_edit: bool,
    /// Paths changed through `update` since the last reset/save.
    pub is_touched: BTreeSet<String>,
    pub save_error: Option<String>,
    pub save_errors: BTreeMap<String, String>,
    /// Snapshot of `data` taken when `save_errors` were recorded.
    pub save_error_data: Value,
    /// Paths written by the most recent template.
    pub template_keys: BTreeSet<String>,
}

impl FormContext {
    pub fn new(schema: &FormSchema, data: Value, is_edit: bool) -> Self {
        let mut ctx = Self {
            pristine_data: data.clone(),
            data,
            validation_errors: ValidationErrors::new(),
            is_pristine: true,
            is_edit,
            is_touched: BTreeSet::new(),
            save_error: None,
            save_errors: BTreeMap::new(),
            save_error_data: Value::Null,
            template_keys: BTreeSet::new(),
        };
        ctx.revalidate(schema);
        ctx
    }

    /// Set a single field, mark it touched and revalidate.
    pub fn update(&mut self, schema: &FormSchema, path: &KeyPath, value: Value) {
        self.data = path.set(&self.data, value);
        let name = path.to_string();
        if self
            .save_errors
            .get(&name)
            .is_some_and(|_| path.get(&self.save_error_data) != path.get(&self.data))
        {
            self.save_errors.remove(&name);
        }
        self.is_touched.insert(name);
        self.revalidate(schema);
    }

    pub fn revalidate(&mut self, schema: &FormSchema) {
        self.validation_errors = schema.validate(&self.data);
        self.is_pristine = self.data == self.pristine_data;
    }

    /// Discard edits since the last load/save.
    pub fn reset(&mut self, schema: &FormSchema) {
        self.data = self.pristine_data.clone();
        self.is_touched.clear();
        self.clear_save_error();
        self.revalidate(schema);
    }

    /// Current data becomes the new pristine baseline.
    pub fn mark_saved(&mut self) {
        self.pristine_data = self.data.clone();
        self.is_pristine = true;
        self.is_touched.clear();
        self.clear_save_error();
    }

    pub fn set_save_error(
        &mut self,
        message: Option<String>,
        field_errors: BTreeMap<String, String>,
    ) {
        self.save_error = message;
        self.save_errors = field_errors;
        self.save_error_data = self.data.clone();
    }

    pub fn clear_save_error(&mut self) {
        self.save_error = None;
        self.save_errors.clear();
        self.save_error_data = Value::Null;
    }

    /// Write template values into `data` according to `policy`.
    ///
    /// Fields the previous template set but `template` does not define go
    /// back to their blank default. Under `PreserveEdits` touched fields are
    /// never written.
    pub fn apply_template(
        &mut self,
        schema: &FormSchema,
        template: &Value,
        policy: TemplatePolicy,
    ) {
        let incoming: BTreeSet<String> = KeyPath::leaves(template)
            .iter()
            .map(ToString::to_string)
            .collect();
        let keep = |ctx: &Self, name: &str| {
            policy == TemplatePolicy::PreserveEdits && ctx.is_touched.contains(name)
        };

        let stale: Vec<String> = self.template_keys.difference(&incoming).cloned().collect();
        for name in stale {
            if keep(&*self, &name) {
                continue;
            }
            let path = KeyPath::from(name.as_str());
            self.data = match schema.field_by_key(&path) {
                Some(field) => path.set(&self.data, field.default.clone()),
                None => path.remove(&self.data),
            };
        }

        for path in KeyPath::leaves(template) {
            let name = path.to_string();
            if keep(&*self, &name) {
                continue;
            }
            if let Some(value) = path.get(template) {
                self.data = path.set(&self.data, value.clone());
            }
            if policy == TemplatePolicy::Overwrite {
                self.is_touched.remove(&name);
            }
        }

        debug!(%policy, fields = incoming.len(), "template applied");
        self.template_keys = incoming;
        self.revalidate(schema);
    }

    pub fn can_submit(&self) -> bool {
        !self.validation_errors.is_invalid()
    }

    pub fn can_save(&self) -> bool {
        !self.is_pristine && self.can_submit()
    }

    pub fn save_tooltip(&self) -> Option<&'static str> {
        validation::save_tooltip(self.is_pristine, self.validation_errors.is_invalid())
    }

    /// Inline error for a field: validation first, then the last save error.
    pub fn field_error(&self, name: &str) -> Option<&str> {
        self.validation_errors
            .get(name)
            .or_else(|| self.save_errors.get(name).map(String::as_str))
    }
}
