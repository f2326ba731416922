//! Credential gate.
//!
//! Pauses an operation that needs a secret the wizard does not hold (edit
//! mode without a re-entered password) and resumes it once the secret is
//! supplied. The gate itself never touches the wizard context; it only
//! remembers which operation is waiting, how to continue it, and which
//! verification the resume issued.
//!
//! `redact` masks secret fields wherever form data leaves the core.

use std::fmt;

use forms::validation::is_blank;
use forms::FormSchema;
use serde::{Serialize, Serializer};
use serde_json::Value;
use strum::AsRefStr;
use tracing::debug;

use crate::core::verifier::OperationId;

pub(crate) const REDACTED: &str = "********";

/// A password or other secret. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    /// Plain value, for placing into an outgoing payload.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({REDACTED})")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

/// Copy of `data` with every non-blank secret field of `schema` masked.
pub fn redact(schema: &FormSchema, data: &Value) -> Value {
    schema.secret_keys().fold(data.clone(), |acc, key| {
        if is_blank(key.get(&acc)) {
            acc
        } else {
            key.set(&acc, Value::String(REDACTED.to_string()))
        }
    })
}

/// How to pick up the paused operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Continuation {
    /// Re-issue a verification on the given step.
    Verify { step: usize, operation: OperationId },
    /// Verify the connection with the secret, then persist.
    Save,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CredentialRequest {
    pub for_operation: OperationId,
    pub continuation: Continuation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(tag = "state", content = "request", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GateState {
    #[default]
    Closed,
    AwaitingSecret(CredentialRequest),
    Resuming(CredentialRequest),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CredentialGate {
    state: GateState,
    /// Inline error shown in the secret prompt.
    error: Option<String>,
    /// Step and generation of the verification issued on resume.
    #[serde(skip)]
    issued: Option<(usize, u64)>,
}

impl CredentialGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard for gated operations.
    pub fn required(is_edit: bool, has_cached_secret: bool, requires_secret: bool) -> bool {
        is_edit && !has_cached_secret && requires_secret
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, GateState::Closed)
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, GateState::AwaitingSecret(_))
    }

    /// The request currently being resumed, if any.
    pub fn resuming(&self) -> Option<&CredentialRequest> {
        match &self.state {
            GateState::Resuming(req) => Some(req),
            _ => None,
        }
    }

    /// Pause `request`. Returns false if another request already holds the gate.
    pub fn open(&mut self, request: CredentialRequest) -> bool {
        if !self.is_closed() {
            debug!(?request, "gate already open, ignoring");
            return false;
        }
        debug!(operation = %request.for_operation, "credential gate opened");
        self.state = GateState::AwaitingSecret(request);
        self.error = None;
        true
    }

    /// Accept a secret. Blank secrets keep the gate waiting with an inline error.
    pub fn submit(&mut self, secret: &Secret) -> Option<CredentialRequest> {
        let GateState::AwaitingSecret(request) = self.state else {
            debug!("secret submitted while no operation is waiting");
            return None;
        };
        if secret.is_blank() {
            self.error = Some(forms::validation::FIELD_REQUIRED.to_string());
            return None;
        }
        self.error = None;
        self.state = GateState::Resuming(request);
        Some(request)
    }

    /// Remember which verification carries the resumed operation.
    pub fn issued(&mut self, step: usize, generation: u64) {
        if self.resuming().is_some() {
            self.issued = Some((step, generation));
        }
    }

    /// Abandon the waiting (or resuming) operation.
    pub fn cancel(&mut self) -> Option<CredentialRequest> {
        let previous = std::mem::take(&mut self.state);
        self.error = None;
        self.issued = None;
        match previous {
            GateState::AwaitingSecret(req) | GateState::Resuming(req) => Some(req),
            GateState::Closed => None,
        }
    }

    /// The resumed operation has been applied (or could not be issued).
    pub fn finish(&mut self) -> Option<CredentialRequest> {
        match self.state {
            GateState::Resuming(req) => {
                self.state = GateState::Closed;
                self.issued = None;
                Some(req)
            }
            _ => None,
        }
    }

    /// Close the gate only for the result of the verification issued on
    /// resume. Any other result leaves the gate as it is.
    pub fn finish_issued(&mut self, step: usize, generation: u64) -> Option<CredentialRequest> {
        if self.issued != Some((step, generation)) {
            return None;
        }
        self.finish()
    }
}
