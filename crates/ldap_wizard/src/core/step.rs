//! Single wizard step: form editing plus remote verification.
//!
//! ```text
//!   Idle --Verify(op) [form valid]--> Verifying{gen, op}
//!   Verifying --VerifyResolved{gen == current}--> Idle (status attached)
//!   Verifying --Verify(op)--> Verifying{gen + 1, op}   (older result is dropped)
//! ```
//!
//! The step never changes `data` in response to a verification and never
//! moves to another step; it only reports what happened through `StepEmit`.

use std::sync::Arc;

use forms::{FormContext, FormSchema, KeyPath, TemplatePolicy};
use serde::Serialize;
use serde_json::Value;
use strum::AsRefStr;
use tracing::{debug, info};

use crate::config::Messages;
use crate::core::gate::redact;
use crate::core::verifier::{OperationId, VerificationResult};
use crate::errors::WizardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(tag = "state", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepState {
    Idle,
    Verifying {
        generation: u64,
        operation: OperationId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum StepStatus {
    Success(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepContext {
    pub form: FormContext,
    pub status: Option<StepStatus>,
    /// Data returned by the last successful verification (e.g. mapped users).
    pub result: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    Update { path: KeyPath, value: Value },
    Verify(OperationId),
    VerifyResolved {
        generation: u64,
        result: VerificationResult,
    },
    Reset,
}

/// Typed notifications for the owning orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEmit {
    VerifyRequested {
        generation: u64,
        operation: OperationId,
    },
    VerifyApplied {
        operation: OperationId,
        success: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSnapshot {
    pub index: usize,
    pub title: String,
    pub value: StepState,
    pub context: StepContext,
}

pub struct WizardStepMachine {
    index: usize,
    schema: Arc<FormSchema>,
    messages: Arc<Messages>,
    state: StepState,
    context: StepContext,
    generation: u64,
}

impl WizardStepMachine {
    pub fn new(
        index: usize,
        schema: Arc<FormSchema>,
        messages: Arc<Messages>,
        form: FormContext,
    ) -> Self {
        Self {
            index,
            schema,
            messages,
            state: StepState::Idle,
            context: StepContext {
                form,
                status: None,
                result: None,
            },
            generation: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn context(&self) -> &StepContext {
        &self.context
    }

    pub fn form(&self) -> &FormContext {
        &self.context.form
    }

    pub fn data(&self) -> &Value {
        &self.context.form.data
    }

    /// True when `Verify`, `Next` and `Save` are enabled.
    pub fn can_submit(&self) -> bool {
        self.context.form.can_submit()
    }

    pub fn is_verifying(&self) -> bool {
        matches!(self.state, StepState::Verifying { .. })
    }

    pub fn send(&mut self, event: StepEvent) -> Vec<StepEmit> {
        match event {
            StepEvent::Update { path, value } => {
                if let Err(e) = self.schema.require_field(&path) {
                    debug!(step = self.index, "update ignored: {e}");
                    return Vec::new();
                }
                self.context.form.update(&self.schema, &path, value);
                Vec::new()
            }
            StepEvent::Verify(operation) => {
                // Validierung immer vor dem Netzwerk
                self.context.form.revalidate(&self.schema);
                if !self.can_submit() {
                    debug!(step = self.index, %operation, "verify blocked by validation errors");
                    return Vec::new();
                }
                self.generation += 1;
                self.state = StepState::Verifying {
                    generation: self.generation,
                    operation,
                };
                self.context.status = None;
                vec![StepEmit::VerifyRequested {
                    generation: self.generation,
                    operation,
                }]
            }
            StepEvent::VerifyResolved { generation, result } => self.resolve(generation, result),
            StepEvent::Reset => {
                self.context.form.reset(&self.schema);
                self.context.status = None;
                self.context.result = None;
                Vec::new()
            }
        }
    }

    fn resolve(&mut self, generation: u64, result: VerificationResult) -> Vec<StepEmit> {
        let StepState::Verifying {
            generation: current,
            operation,
        } = self.state
        else {
            debug!(step = self.index, generation, "result arrived while idle, dropped");
            return Vec::new();
        };
        if current != generation {
            debug!(step = self.index, generation, current, "stale verification result dropped");
            return Vec::new();
        }

        self.state = StepState::Idle;
        let success = result.is_success();
        match result {
            VerificationResult::Success(data) => {
                info!(step = self.index, %operation, "verification succeeded");
                self.context.status = Some(StepStatus::Success(
                    self.messages.success_for(operation).to_string(),
                ));
                self.context.result = Some(data);
            }
            VerificationResult::Failure(reason) => {
                let error = WizardError::from(reason);
                info!(step = self.index, %operation, %error, "verification failed");
                let message = match error {
                    WizardError::RemoteRejection { message, .. } if !message.is_empty() => message,
                    WizardError::RemoteRejection { .. } => self.messages.rejected.clone(),
                    _ => self.messages.network_failure.clone(),
                };
                self.context.status = Some(StepStatus::Error(message));
            }
        }
        vec![StepEmit::VerifyApplied { operation, success }]
    }

    /// Drop any in-flight verification; its result will be ignored.
    pub fn abandon(&mut self) {
        self.generation += 1;
        self.state = StepState::Idle;
    }

    pub fn apply_template(&mut self, template: &Value, policy: TemplatePolicy) {
        self.context.form.apply_template(&self.schema, template, policy);
    }

    pub fn form_mut(&mut self) -> &mut FormContext {
        &mut self.context.form
    }

    /// Secret fields that hold a value are masked.
    pub fn snapshot(&self) -> StepSnapshot {
        let mut context = self.context.clone();
        let form = &mut context.form;
        for data in [&mut form.data, &mut form.pristine_data, &mut form.save_error_data] {
            *data = redact(&self.schema, data);
        }
        StepSnapshot {
            index: self.index,
            title: self.schema.title.clone(),
            value: self.state,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gate::REDACTED;
    use crate::core::verifier::FailureReason;
    use forms::validation::FIELD_REQUIRED;
    use forms::{FormField, FormFieldKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn machine(data: Value) -> WizardStepMachine {
        let schema = Arc::new(FormSchema::new(
            "Connection",
            vec![
                FormField::new("host", "Host", FormFieldKind::Text).required(),
                FormField::new("port", "Port", FormFieldKind::Number).required(),
            ],
        ));
        let form = FormContext::new(&schema, data, false);
        WizardStepMachine::new(0, schema, Arc::new(Messages::default()), form)
    }

    fn ok() -> VerificationResult {
        VerificationResult::Success(json!(null))
    }

    fn rejected(msg: &str) -> VerificationResult {
        VerificationResult::Failure(FailureReason::ApplicationRejection {
            message: msg.into(),
            field_errors: BTreeMap::new(),
        })
    }

    #[test]
    fn verify_is_blocked_while_invalid() {
        let mut step = machine(json!({"host": "", "port": 389}));
        assert_eq!(step.form().validation_errors.get("host"), Some(FIELD_REQUIRED));
        assert!(step.send(StepEvent::Verify(OperationId::VerifyConnection)).is_empty());
        assert_eq!(step.state(), StepState::Idle);
    }

    #[test]
    fn success_keeps_data_and_sets_status() {
        let data = json!({"host": "ldap.example.com", "port": 389});
        let mut step = machine(data.clone());
        let emits = step.send(StepEvent::Verify(OperationId::VerifyConnection));
        assert_eq!(
            emits,
            vec![StepEmit::VerifyRequested {
                generation: 1,
                operation: OperationId::VerifyConnection
            }]
        );
        step.send(StepEvent::VerifyResolved {
            generation: 1,
            result: ok(),
        });
        assert_eq!(step.state(), StepState::Idle);
        assert_eq!(step.data(), &data);
        assert_eq!(
            step.context().status,
            Some(StepStatus::Success(Messages::default().verify_connection_success))
        );
    }

    #[test]
    fn last_request_wins() {
        let mut step = machine(json!({"host": "h", "port": 389}));
        step.send(StepEvent::Verify(OperationId::VerifyConnection));
        step.send(StepEvent::Verify(OperationId::VerifyConnection));

        let applied = step.send(StepEvent::VerifyResolved {
            generation: 2,
            result: rejected("Invalid credentials"),
        });
        assert_eq!(applied.len(), 1);
        let stale = step.send(StepEvent::VerifyResolved {
            generation: 1,
            result: ok(),
        });
        assert!(stale.is_empty());
        assert_eq!(
            step.context().status,
            Some(StepStatus::Error("Invalid credentials".into()))
        );
    }

    #[test]
    fn failure_leaves_form_editable() {
        let mut step = machine(json!({"host": "h", "port": 389}));
        step.send(StepEvent::Verify(OperationId::VerifyConnection));
        step.send(StepEvent::VerifyResolved {
            generation: 1,
            result: VerificationResult::Failure(FailureReason::NetworkFailure {
                detail: "connection reset".into(),
            }),
        });
        assert_eq!(
            step.context().status,
            Some(StepStatus::Error(Messages::default().network_failure))
        );
        step.send(StepEvent::Update {
            path: "host".into(),
            value: json!("other"),
        });
        assert_eq!(step.data()["host"], json!("other"));
        assert_eq!(step.send(StepEvent::Verify(OperationId::VerifyConnection)).len(), 1);
    }

    #[test]
    fn unknown_paths_and_abandoned_results_are_ignored() {
        let mut step = machine(json!({"host": "h", "port": 389}));
        step.send(StepEvent::Update {
            path: "nope".into(),
            value: json!(1),
        });
        assert!(step.form().is_pristine);

        step.send(StepEvent::Verify(OperationId::VerifyConnection));
        step.abandon();
        assert!(step
            .send(StepEvent::VerifyResolved {
                generation: 1,
                result: ok()
            })
            .is_empty());
        assert_eq!(step.context().status, None);
    }

    #[test]
    fn snapshot_masks_secret_fields() {
        let schema = Arc::new(FormSchema::new(
            "Connection",
            vec![
                FormField::new("host", "Host", FormFieldKind::Text),
                FormField::new("password", "Password", FormFieldKind::Secret),
            ],
        ));
        let form = FormContext::new(&schema, json!({"host": "h", "password": ""}), false);
        let mut step = WizardStepMachine::new(0, schema, Arc::new(Messages::default()), form);
        step.send(StepEvent::Update {
            path: "password".into(),
            value: json!("hunter2"),
        });

        let snapshot = step.snapshot();
        assert_eq!(snapshot.context.form.data["password"], json!(REDACTED));
        assert_eq!(snapshot.context.form.pristine_data["password"], json!(""));
        assert_eq!(step.data()["password"], json!("hunter2"));
    }

    #[test]
    fn reset_clears_status() {
        let mut step = machine(json!({"host": "h", "port": 389}));
        step.send(StepEvent::Update {
            path: "host".into(),
            value: json!("x"),
        });
        step.send(StepEvent::Reset);
        assert_eq!(step.data()["host"], json!("h"));
        assert!(step.form().is_pristine);
    }
}
