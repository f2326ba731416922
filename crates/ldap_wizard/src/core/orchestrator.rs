//! Wizard orchestrator.
//!
//! Composes the connection step and the user/group mapping step into one
//! flow and owns the shared `WizardContext`:
//!
//! ```text
//!   Loading --Loaded--> Step(0) --Next--> Step(1) --Save--> Saving --> Done
//!      |                   ^  <--Back--     |                  |
//!      +--> LoadError      |                +-- (gate) --------+
//!           --Retry--> Loading               failure -> Step(1) with save error
//!
//!   Cancel (any non-terminal state) --> Cancelled
//!   Delete (edit mode)              --> Deleting --> Done
//! ```
//!
//! While the credential gate is open the only accepted events are
//! `SubmitSecret` and `Cancel`; nothing in `WizardContext` changes until the
//! gated operation actually resumes.

use std::collections::BTreeMap;
use std::sync::Arc;

use forms::field::Predicate;
use forms::merge::{layered, MergeFrom};
use forms::{FormContext, FormSchema, KeyPath};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum::AsRefStr;
use tracing::{debug, info, warn};

use crate::config::WizardSettings;
use crate::core::effects::{
    Effect, InternalEvent, PersistRequest, TaskKind, TaskResultKind, WizardOutput,
};
use crate::core::gate::{
    redact, Continuation, CredentialGate, CredentialRequest, GateState, Secret,
};
use crate::core::step::{StepEmit, StepEvent, StepSnapshot, WizardStepMachine};
use crate::core::verifier::{OperationId, VerificationResult};
use crate::errors::WizardError;

pub const CONNECTION_STEP: usize = 0;
pub const MAPPING_STEP: usize = 1;
const STEP_COUNT: usize = 2;

/// Read-only host context: permissions and feature flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Context {
    pub can_create: bool,
    pub can_update: bool,
    pub can_delete: bool,
    pub features: BTreeMap<String, bool>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            can_create: true,
            can_update: true,
            can_delete: true,
            features: BTreeMap::new(),
        }
    }
}

/// Named set of values for the mapping step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepTemplate {
    pub name: String,
    pub values: Value,
}

/// Everything domain specific the orchestrator needs.
pub struct WizardDefinition {
    pub connection: Arc<FormSchema>,
    pub mapping: Arc<FormSchema>,
    pub templates: Vec<StepTemplate>,
    /// Where a re-entered secret goes in outgoing payloads.
    pub secret_path: KeyPath,
    /// True if the merged values need a secret the form does not carry.
    pub requires_secret: Predicate,
}

impl WizardDefinition {
    pub fn template(&self, name: &str) -> Option<&StepTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    fn schema(&self, step: usize) -> &Arc<FormSchema> {
        if step == CONNECTION_STEP {
            &self.connection
        } else {
            &self.mapping
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WizardState {
    Loading,
    LoadError,
    Step(usize),
    Saving,
    Deleting,
    Done,
    Cancelled,
}

impl WizardState {
    /// Label used in snapshots (`step1`, `step2`, `saving`, ...).
    pub fn label(&self) -> String {
        match self {
            WizardState::Step(n) => format!("step{}", n + 1),
            other => other.as_ref().to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WizardState::Done | WizardState::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WizardContext {
    pub active_step_index: usize,
    pub connection_data: Value,
    pub mapping_data: Value,
    /// Re-entered secret, held only until it is placed into a payload.
    pub credential: Option<Secret>,
    pub is_edit: bool,
    pub entity_id: Option<String>,
    pub template: Option<String>,
    pub load_error: Option<String>,
}

impl WizardContext {
    fn new(is_edit: bool, entity_id: Option<String>) -> Self {
        Self {
            active_step_index: 0,
            connection_data: json!({}),
            mapping_data: json!({}),
            credential: None,
            is_edit,
            entity_id,
            template: None,
            load_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent {
    Update { path: KeyPath, value: Value },
    Verify(OperationId),
    /// Try a login with a test user against the current configuration.
    VerifyLogin { username: String, password: Secret },
    Next,
    Back,
    Save,
    Delete,
    Cancel,
    Retry,
    Reset,
    ApplyTemplate(String),
    SubmitSecret(Secret),
    Internal(InternalEvent),
}

/// Readable state for the UI boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub value: String,
    pub context: WizardContext,
    pub step: Option<StepSnapshot>,
    pub gate: GateState,
    pub gate_error: Option<String>,
}

pub struct WizardOrchestrator {
    definition: Arc<WizardDefinition>,
    env: Context,
    settings: Arc<WizardSettings>,
    state: WizardState,
    context: WizardContext,
    steps: Vec<Option<WizardStepMachine>>,
    gate: CredentialGate,
    /// Generation of the authoritative load/save/delete call.
    generation: u64,
    login: Option<(String, Secret)>,
}

impl WizardOrchestrator {
    /// Wizard for a new entity, starting on the connection step.
    pub fn create(
        definition: Arc<WizardDefinition>,
        env: Context,
        settings: Arc<WizardSettings>,
    ) -> Self {
        let context = WizardContext::new(false, None);
        let mut this = Self::with_context(definition, env, settings, context);
        this.enter_step(CONNECTION_STEP);
        this
    }

    /// Wizard for an existing entity; `start` issues the load.
    pub fn edit(
        definition: Arc<WizardDefinition>,
        env: Context,
        settings: Arc<WizardSettings>,
        id: impl Into<String>,
    ) -> Self {
        let mut this = Self::with_context(
            definition,
            env,
            settings,
            WizardContext::new(true, Some(id.into())),
        );
        this.state = WizardState::Loading;
        this
    }

    fn with_context(
        definition: Arc<WizardDefinition>,
        env: Context,
        settings: Arc<WizardSettings>,
        context: WizardContext,
    ) -> Self {
        Self {
            definition,
            env,
            settings,
            state: WizardState::Step(CONNECTION_STEP),
            context,
            steps: (0..STEP_COUNT).map(|_| None).collect(),
            gate: CredentialGate::new(),
            generation: 0,
            login: None,
        }
    }

    /// Effects needed right after construction (the edit-mode load).
    pub fn start(&mut self) -> Vec<Effect> {
        if self.state == WizardState::Loading {
            self.load()
        } else {
            Vec::new()
        }
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn context(&self) -> &WizardContext {
        &self.context
    }

    pub fn gate(&self) -> &CredentialGate {
        &self.gate
    }

    pub fn env(&self) -> &Context {
        &self.env
    }

    pub fn active_step(&self) -> Option<&WizardStepMachine> {
        match self.state {
            WizardState::Step(n) => self.steps.get(n).and_then(Option::as_ref),
            WizardState::Saving | WizardState::Deleting => self
                .steps
                .get(self.context.active_step_index)
                .and_then(Option::as_ref),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            value: self.state.label(),
            context: WizardContext {
                connection_data: redact(&self.definition.connection, &self.context.connection_data),
                mapping_data: redact(&self.definition.mapping, &self.context.mapping_data),
                ..self.context.clone()
            },
            step: self.active_step().map(WizardStepMachine::snapshot),
            gate: self.gate.state().clone(),
            gate_error: self.gate.error().map(str::to_string),
        }
    }

    pub fn send(&mut self, event: WizardEvent) -> Vec<Effect> {
        if let WizardEvent::Internal(internal) = event {
            return self.on_internal(internal);
        }
        if self.state.is_terminal() {
            debug!(state = %self.state.label(), ?event, "event after completion ignored");
            return Vec::new();
        }
        if event == WizardEvent::Cancel {
            return self.cancel();
        }
        match self.state {
            WizardState::LoadError if event == WizardEvent::Retry => {
                self.state = WizardState::Loading;
                self.context.load_error = None;
                self.load()
            }
            WizardState::Step(n) if !self.gate.is_closed() => self.on_gated_event(n, event),
            WizardState::Step(n) => self.on_step_event(n, event),
            state => {
                debug!(state = %state.label(), ?event, "event not accepted in this state");
                Vec::new()
            }
        }
    }

    fn on_gated_event(&mut self, _step: usize, event: WizardEvent) -> Vec<Effect> {
        match event {
            WizardEvent::SubmitSecret(secret) => match self.gate.submit(&secret) {
                Some(request) => {
                    self.context.credential = Some(secret);
                    self.resume(request)
                }
                None => Vec::new(),
            },
            other => {
                debug!(event = ?other, "credential gate open, event ignored");
                Vec::new()
            }
        }
    }

    fn on_step_event(&mut self, n: usize, event: WizardEvent) -> Vec<Effect> {
        match event {
            WizardEvent::Update { path, value } => {
                self.step_send(n, StepEvent::Update { path, value });
                Vec::new()
            }
            WizardEvent::Reset => {
                self.step_send(n, StepEvent::Reset);
                Vec::new()
            }
            WizardEvent::Verify(operation) => self.request_verify(n, operation),
            WizardEvent::VerifyLogin { username, password } if n == MAPPING_STEP => {
                self.login = Some((username, password));
                self.request_verify(n, OperationId::VerifyLogin)
            }
            WizardEvent::Next if n + 1 < STEP_COUNT => {
                if !self.step_valid(n) {
                    debug!(step = n, "next blocked by validation errors");
                    return Vec::new();
                }
                self.merge_step(n);
                self.enter_step(n + 1);
                Vec::new()
            }
            WizardEvent::Back if n > 0 => {
                self.merge_step(n);
                self.enter_step(n - 1);
                Vec::new()
            }
            WizardEvent::Save if n == MAPPING_STEP => self.request_save(),
            WizardEvent::Delete => self.request_delete(),
            WizardEvent::ApplyTemplate(name) => {
                self.apply_template(&name);
                Vec::new()
            }
            other => {
                debug!(step = n, event = ?other, "event not accepted on this step");
                Vec::new()
            }
        }
    }

    fn step_send(&mut self, n: usize, event: StepEvent) -> Vec<StepEmit> {
        match self.steps.get_mut(n).and_then(Option::as_mut) {
            Some(step) => step.send(event),
            None => Vec::new(),
        }
    }

    fn step_valid(&mut self, n: usize) -> bool {
        let Some(step) = self.steps.get_mut(n).and_then(Option::as_mut) else {
            return false;
        };
        let schema = Arc::clone(self.definition.schema(n));
        step.form_mut().revalidate(&schema);
        step.can_submit()
    }

    fn enter_step(&mut self, n: usize) {
        if self.steps[n].is_none() {
            let schema = Arc::clone(self.definition.schema(n));
            let (template, known) = if n == CONNECTION_STEP {
                (None, &self.context.connection_data)
            } else {
                let template = self
                    .context
                    .template
                    .as_deref()
                    .and_then(|name| self.definition.template(name));
                (template, &self.context.mapping_data)
            };
            let blank = schema.defaults();
            let empty = json!({});
            let template_values = template.map(|t| &t.values).unwrap_or(&empty);
            let seed = layered([&blank, template_values, known]);

            let mut form = FormContext::new(&schema, seed, self.context.is_edit);
            form.template_keys = KeyPath::leaves(template_values)
                .iter()
                .map(ToString::to_string)
                .collect();
            self.steps[n] = Some(WizardStepMachine::new(
                n,
                schema,
                Arc::new(self.settings.messages.clone()),
                form,
            ));
        }
        info!(step = n, "entering step");
        self.state = WizardState::Step(n);
        self.context.active_step_index = n;
    }

    fn merge_step(&mut self, n: usize) {
        let Some(step) = self.steps.get(n).and_then(Option::as_ref) else {
            return;
        };
        let target = if n == CONNECTION_STEP {
            &mut self.context.connection_data
        } else {
            &mut self.context.mapping_data
        };
        target.merge_from(step.data());
    }

    /// Step data overlaid on the shared context, without mutating either.
    fn current_values(&self, operation: OperationId) -> Value {
        let live = |n: usize, fallback: &Value| -> Value {
            let mut out = fallback.clone();
            if let Some(step) = self.steps.get(n).and_then(Option::as_ref) {
                out.merge_from(step.data());
            }
            out
        };
        let connection = live(CONNECTION_STEP, &self.context.connection_data);
        if operation == OperationId::VerifyConnection {
            return connection;
        }
        let mapping = live(MAPPING_STEP, &self.context.mapping_data);
        layered([&connection, &mapping])
    }

    fn needs_secret(&self) -> bool {
        let values = self.current_values(OperationId::Save);
        CredentialGate::required(
            self.context.is_edit,
            self.context.credential.is_some(),
            (self.definition.requires_secret)(&values),
        )
    }

    fn open_gate(&mut self, request: CredentialRequest) {
        let reason = WizardError::CredentialRequired(request.for_operation);
        info!(%reason, "asking for the secret");
        self.gate.open(request);
    }

    fn with_secret(&self, payload: Value, secret: Option<&Secret>) -> Value {
        match secret {
            Some(secret) => self
                .definition
                .secret_path
                .set(&payload, Value::String(secret.expose().to_string())),
            None => payload,
        }
    }

    fn request_verify(&mut self, n: usize, operation: OperationId) -> Vec<Effect> {
        if !self.step_valid(n) {
            debug!(step = n, %operation, "verify blocked by validation errors");
            self.login = None;
            return Vec::new();
        }
        if self.needs_secret() {
            self.open_gate(CredentialRequest {
                for_operation: operation,
                continuation: Continuation::Verify { step: n, operation },
            });
            return Vec::new();
        }
        self.issue_verify(n, operation, None)
    }

    fn issue_verify(
        &mut self,
        n: usize,
        operation: OperationId,
        secret: Option<Secret>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        for emit in self.step_send(n, StepEvent::Verify(operation)) {
            let StepEmit::VerifyRequested {
                generation,
                operation,
            } = emit
            else {
                continue;
            };
            let mut payload = self.with_secret(self.current_values(operation), secret.as_ref());
            if operation == OperationId::VerifyLogin {
                if let Some((username, password)) = self.login.take() {
                    payload = KeyPath::from("login").set(
                        &payload,
                        json!({ "username": username, "password": password.expose() }),
                    );
                }
            }
            effects.push(Effect::async_task(TaskKind::Verify {
                generation,
                step: n,
                operation,
                payload,
            }));
        }
        effects
    }

    fn resume(&mut self, request: CredentialRequest) -> Vec<Effect> {
        info!(operation = %request.for_operation, "resuming with supplied secret");
        let effects = match request.continuation {
            Continuation::Verify { step, operation } => {
                let secret = self.context.credential.take();
                self.issue_verify(step, operation, secret)
            }
            Continuation::Save => {
                let secret = self.context.credential.clone();
                self.issue_verify(MAPPING_STEP, OperationId::VerifyConnection, secret)
            }
        };
        let issued = effects.iter().find_map(|effect| match effect {
            Effect::Async(TaskKind::Verify {
                step, generation, ..
            }) => Some((*step, *generation)),
            _ => None,
        });
        match issued {
            Some((step, generation)) => self.gate.issued(step, generation),
            None => {
                self.gate.finish();
                self.context.credential = None;
            }
        }
        effects
    }

    fn request_save(&mut self) -> Vec<Effect> {
        let permitted = if self.context.is_edit {
            self.env.can_update
        } else {
            self.env.can_create
        };
        if !permitted {
            debug!(is_edit = self.context.is_edit, "save not permitted");
            return Vec::new();
        }
        if !self.step_valid(MAPPING_STEP) || !self.step_valid(CONNECTION_STEP) {
            debug!("save blocked by validation errors");
            return Vec::new();
        }
        if self.needs_secret() {
            self.open_gate(CredentialRequest {
                for_operation: OperationId::Save,
                continuation: Continuation::Save,
            });
            return Vec::new();
        }
        self.persist(None)
    }

    fn persist(&mut self, secret: Option<Secret>) -> Vec<Effect> {
        self.merge_step(CONNECTION_STEP);
        self.merge_step(MAPPING_STEP);
        let entity = self.with_secret(
            layered([&self.context.connection_data, &self.context.mapping_data]),
            secret.as_ref(),
        );
        if let Some(step) = self.steps[MAPPING_STEP].as_mut() {
            step.form_mut().clear_save_error();
        }
        self.generation += 1;
        self.state = WizardState::Saving;
        info!(generation = self.generation, edit = self.context.is_edit, "saving");
        let request = match &self.context.entity_id {
            Some(id) => PersistRequest::Update {
                id: id.clone(),
                entity,
            },
            None => PersistRequest::Create { entity },
        };
        vec![Effect::async_task(TaskKind::Persist {
            generation: self.generation,
            request,
        })]
    }

    fn request_delete(&mut self) -> Vec<Effect> {
        let allowed = self.context.is_edit && self.env.can_delete;
        let (true, Some(id)) = (allowed, self.context.entity_id.clone()) else {
            debug!("delete not available");
            return Vec::new();
        };
        self.generation += 1;
        self.state = WizardState::Deleting;
        info!(%id, "deleting");
        vec![Effect::async_task(TaskKind::Persist {
            generation: self.generation,
            request: PersistRequest::Delete { id },
        })]
    }

    fn load(&mut self) -> Vec<Effect> {
        let Some(id) = self.context.entity_id.clone() else {
            return Vec::new();
        };
        self.generation += 1;
        vec![Effect::async_task(TaskKind::Load {
            generation: self.generation,
            id,
        })]
    }

    fn apply_template(&mut self, name: &str) {
        let Some(template) = self.definition.template(name) else {
            debug!(template = name, "unknown template ignored");
            return;
        };
        let values = template.values.clone();
        self.context.template = Some(name.to_string());
        let policy = self.settings.template_policy;
        if let Some(step) = self.steps[MAPPING_STEP].as_mut() {
            step.apply_template(&values, policy);
        }
        info!(template = name, %policy, "template selected");
    }

    fn cancel(&mut self) -> Vec<Effect> {
        if !self.gate.is_closed() {
            let was_resuming = self.gate.resuming().is_some();
            self.gate.cancel();
            if was_resuming {
                self.context.credential = None;
                let n = self.context.active_step_index;
                if let Some(step) = self.steps[n].as_mut() {
                    step.abandon();
                }
            }
            self.login = None;
            info!("credential prompt cancelled");
            return Vec::new();
        }
        self.generation += 1;
        self.steps.iter_mut().for_each(|s| *s = None);
        self.context = WizardContext::new(self.context.is_edit, None);
        self.login = None;
        self.state = WizardState::Cancelled;
        info!("wizard cancelled");
        vec![Effect::Output(WizardOutput::Cancelled)]
    }

    fn on_internal(&mut self, event: InternalEvent) -> Vec<Effect> {
        let (id, result) = match event {
            InternalEvent::TaskStarted { id, label } => {
                debug!(task = id, %label, "task started");
                return Vec::new();
            }
            InternalEvent::TaskFinished { id, result } => (id, result),
        };
        match result {
            TaskResultKind::Verified {
                generation,
                step,
                operation,
                result,
            } => self.on_verified(step, generation, operation, result),
            TaskResultKind::Persisted { generation, result } if generation == self.generation => {
                self.on_persisted(result)
            }
            TaskResultKind::Loaded { generation, result }
                if generation == self.generation && self.state == WizardState::Loading =>
            {
                self.on_loaded(result);
                Vec::new()
            }
            other => {
                debug!(task = id, result = ?other, "stale task result dropped");
                Vec::new()
            }
        }
    }

    fn on_verified(
        &mut self,
        step: usize,
        generation: u64,
        operation: OperationId,
        result: VerificationResult,
    ) -> Vec<Effect> {
        if !matches!(self.state, WizardState::Step(_)) {
            debug!(%operation, "verification result after leaving the steps dropped");
            return Vec::new();
        }
        let emits = self.step_send(step, StepEvent::VerifyResolved { generation, result });
        let Some(success) = emits.iter().find_map(|e| match e {
            StepEmit::VerifyApplied { success, .. } => Some(*success),
            _ => None,
        }) else {
            return Vec::new();
        };
        // nur das Ergebnis, das der Resume ausgelöst hat, setzt fort
        let Some(request) = self.gate.finish_issued(step, generation) else {
            return Vec::new();
        };
        match request.continuation {
            Continuation::Save if success => {
                let secret = self.context.credential.take();
                self.persist(secret)
            }
            _ => {
                self.context.credential = None;
                Vec::new()
            }
        }
    }

    fn on_persisted(&mut self, result: VerificationResult) -> Vec<Effect> {
        let deleting = match self.state {
            WizardState::Saving => false,
            WizardState::Deleting => true,
            state => {
                debug!(state = %state.label(), "persist result in unexpected state dropped");
                return Vec::new();
            }
        };
        match result {
            VerificationResult::Success(data) => {
                self.state = WizardState::Done;
                let output = if deleting {
                    info!("entity deleted");
                    WizardOutput::Deleted {
                        id: self.context.entity_id.clone().unwrap_or_default(),
                    }
                } else {
                    info!("entity saved");
                    for step in self.steps.iter_mut().flatten() {
                        step.form_mut().mark_saved();
                    }
                    let entity = if data.is_null() {
                        self.definition.secret_path.remove(&layered([
                            &self.context.connection_data,
                            &self.context.mapping_data,
                        ]))
                    } else {
                        data
                    };
                    WizardOutput::Saved {
                        id: self.context.entity_id.clone(),
                        entity,
                    }
                };
                vec![Effect::Output(output)]
            }
            VerificationResult::Failure(reason) => {
                let error = WizardError::from(reason);
                warn!(%error, deleting, "persist call failed");
                let messages = &self.settings.messages;
                let (message, field_errors) = match error {
                    WizardError::RemoteRejection {
                        message,
                        field_errors,
                    } if message.is_empty() => (messages.rejected.clone(), field_errors),
                    WizardError::RemoteRejection {
                        message,
                        field_errors,
                    } => (message, field_errors),
                    _ => (messages.network_failure.clone(), BTreeMap::new()),
                };
                let n = if deleting {
                    self.context.active_step_index
                } else {
                    MAPPING_STEP
                };
                if let Some(step) = self.steps[n].as_mut() {
                    step.form_mut().set_save_error(Some(message), field_errors);
                }
                self.state = WizardState::Step(n);
                self.context.active_step_index = n;
                Vec::new()
            }
        }
    }

    fn on_loaded(&mut self, result: VerificationResult) {
        match result {
            VerificationResult::Success(entity) => {
                let pick = |schema: &FormSchema| {
                    schema.fields.iter().fold(json!({}), |acc, f| match f.key.get(&entity) {
                        Some(v) => f.key.set(&acc, v.clone()),
                        None => acc,
                    })
                };
                self.context.connection_data = pick(&*self.definition.connection);
                self.context.mapping_data = pick(&*self.definition.mapping);
                info!(id = ?self.context.entity_id, "entity loaded");
                self.enter_step(CONNECTION_STEP);
            }
            VerificationResult::Failure(reason) => {
                let error = WizardError::from(reason);
                warn!(%error, "load failed");
                self.context.load_error = Some(match error {
                    WizardError::RemoteRejection { message, .. } if !message.is_empty() => message,
                    _ => self.settings.messages.load_failure.clone(),
                });
                self.state = WizardState::LoadError;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::verifier::FailureReason;
    use forms::{FormField, FormFieldKind};
    use pretty_assertions::assert_eq;

    fn definition() -> Arc<WizardDefinition> {
        Arc::new(WizardDefinition {
            connection: Arc::new(FormSchema::new(
                "Connection",
                vec![
                    FormField::new("host", "Host", FormFieldKind::Text).required(),
                    FormField::new("password", "Password", FormFieldKind::Secret),
                ],
            )),
            mapping: Arc::new(FormSchema::new(
                "Mapping",
                vec![
                    FormField::new("objectClass", "Object class", FormFieldKind::Text).required(),
                    FormField::new("filter", "Filter", FormFieldKind::Text),
                ],
            )),
            templates: vec![StepTemplate {
                name: "people".into(),
                values: json!({"objectClass": "person"}),
            }],
            secret_path: KeyPath::from("password"),
            requires_secret: Box::new(|v| forms::validation::is_blank(v.get("password"))),
        })
    }

    fn update(path: &str, value: Value) -> WizardEvent {
        WizardEvent::Update {
            path: path.into(),
            value,
        }
    }

    fn create() -> WizardOrchestrator {
        WizardOrchestrator::create(definition(), Context::default(), Arc::default())
    }

    #[test]
    fn next_requires_a_valid_step() {
        let mut wizard = create();
        assert_eq!(wizard.state().label(), "step1");
        wizard.send(WizardEvent::Next);
        assert_eq!(wizard.state(), WizardState::Step(0));

        wizard.send(update("host", json!("ldap.example.com")));
        wizard.send(WizardEvent::Next);
        assert_eq!(wizard.state(), WizardState::Step(1));
        assert_eq!(wizard.context().connection_data["host"], json!("ldap.example.com"));
    }

    #[test]
    fn save_is_only_legal_on_the_last_step() {
        let mut wizard = create();
        wizard.send(update("host", json!("h")));
        assert!(wizard.send(WizardEvent::Save).is_empty());
        assert_eq!(wizard.state(), WizardState::Step(0));
    }

    #[test]
    fn template_seeds_the_mapping_step_below_known_data() {
        let mut wizard = create();
        wizard.send(WizardEvent::ApplyTemplate("people".into()));
        wizard.send(update("host", json!("h")));
        wizard.send(WizardEvent::Next);
        let step = wizard.active_step().unwrap();
        assert_eq!(step.data()["objectClass"], json!("person"));

        wizard.send(update("objectClass", json!("user")));
        wizard.send(WizardEvent::Back);
        wizard.send(WizardEvent::Next);
        assert_eq!(wizard.active_step().unwrap().data()["objectClass"], json!("user"));
    }

    #[test]
    fn create_mode_saves_without_the_gate() {
        let mut wizard = create();
        wizard.send(update("host", json!("h")));
        wizard.send(WizardEvent::Next);
        wizard.send(update("objectClass", json!("person")));
        let effects = wizard.send(WizardEvent::Save);
        assert_eq!(wizard.state(), WizardState::Saving);
        assert!(matches!(
            effects.as_slice(),
            [Effect::Async(TaskKind::Persist {
                request: PersistRequest::Create { .. },
                ..
            })]
        ));
    }

    #[test]
    fn save_rejection_keeps_fields() {
        let mut wizard = create();
        wizard.send(update("host", json!("h")));
        wizard.send(WizardEvent::Next);
        wizard.send(update("objectClass", json!("person")));
        let effects = wizard.send(WizardEvent::Save);
        let generation = match &effects[0] {
            Effect::Async(task) => task.generation(),
            other => panic!("unexpected effect {other:?}"),
        };
        wizard.send(WizardEvent::Internal(InternalEvent::TaskFinished {
            id: 1,
            result: TaskResultKind::Persisted {
                generation,
                result: VerificationResult::Failure(FailureReason::ApplicationRejection {
                    message: "Name already in use".into(),
                    field_errors: BTreeMap::from([("objectClass".into(), "bad".into())]),
                }),
            },
        }));
        assert_eq!(wizard.state(), WizardState::Step(1));
        let form = wizard.active_step().unwrap().form();
        assert_eq!(form.save_error.as_deref(), Some("Name already in use"));
        assert_eq!(form.field_error("objectClass"), Some("bad"));
        assert_eq!(form.data["objectClass"], json!("person"));
    }

    #[test]
    fn cancel_discards_everything() {
        let mut wizard = create();
        wizard.send(update("host", json!("h")));
        let effects = wizard.send(WizardEvent::Cancel);
        assert_eq!(effects, vec![Effect::Output(WizardOutput::Cancelled)]);
        assert_eq!(wizard.state(), WizardState::Cancelled);
        assert_eq!(wizard.context().connection_data, json!({}));
        assert!(wizard.send(WizardEvent::Next).is_empty());
    }

    #[test]
    fn snapshot_serializes_without_secrets() {
        let mut wizard = create();
        wizard.context.credential = Some(Secret::new("hunter2"));
        let json = serde_json::to_string(&wizard.snapshot()).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("\"value\":\"step1\""));
    }

    #[test]
    fn snapshot_masks_merged_step_data() {
        let mut wizard = create();
        wizard.send(update("host", json!("h")));
        wizard.send(update("password", json!("hunter2")));
        wizard.send(WizardEvent::Next);

        let snapshot = wizard.snapshot();
        assert_eq!(snapshot.context.connection_data["password"], json!("********"));
        assert_eq!(snapshot.context.connection_data["host"], json!("h"));
        assert!(!serde_json::to_string(&snapshot).unwrap().contains("hunter2"));
        assert_eq!(wizard.context().connection_data["password"], json!("hunter2"));
    }
}
