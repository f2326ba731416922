//! Remote verification + persistence collaborators.
//!
//! The wizard never talks to the network directly. It hands an operation
//! name and a JSON payload to a [`Transport`] and classifies what comes back:
//!
//! - transport error                 -> `FailureReason::NetworkFailure`
//! - `{ "success": false, "error" }` -> `FailureReason::ApplicationRejection`
//! - `{ "success": true, "data" }`   -> `VerificationResult::Success`
//!
//! One call per invocation, no retries. Retrying is a fresh user action.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::OperationNames;

/// Operations that may be gated behind a secret.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationId {
    VerifyConnection,
    VerifyUserMapping,
    VerifyLogin,
    Save,
}

/// Reply shape shared by every remote operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawReply", into = "RawReply")]
pub enum TransportReply {
    Success(Value),
    Failure(Value),
}

#[derive(Serialize, Deserialize)]
struct RawReply {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<Value>,
}

impl TryFrom<RawReply> for TransportReply {
    type Error = String;

    fn try_from(raw: RawReply) -> Result<Self, Self::Error> {
        match raw {
            RawReply {
                success: true,
                data,
                ..
            } => Ok(TransportReply::Success(data.unwrap_or(Value::Null))),
            RawReply {
                success: false,
                error: Some(error),
                ..
            } => Ok(TransportReply::Failure(error)),
            RawReply {
                success: false,
                error: None,
                ..
            } => {
                Err("failed reply without an `error` member".to_string())
            }
        }
    }
}

impl From<TransportReply> for RawReply {
    fn from(reply: TransportReply) -> Self {
        match reply {
            TransportReply::Success(data) => RawReply {
                success: true,
                data: Some(data),
                error: None,
            },
            TransportReply::Failure(error) => RawReply {
                success: false,
                data: None,
                error: Some(error),
            },
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("unreachable: {0}")]
    Unreachable(String),
    #[error("malformed reply: {0}")]
    Malformed(String),
}

pub type TransportFuture = BoxFuture<'static, Result<TransportReply, TransportError>>;

/// Opaque async call into the backend.
pub trait Transport: Send + Sync {
    fn call(&self, operation: &str, payload: Value) -> TransportFuture;
}

/// CRUD collaborator used by save/delete and edit-mode loading.
pub trait PersistenceService: Send + Sync {
    fn create(&self, entity: Value) -> TransportFuture;
    fn update(&self, id: &str, entity: Value) -> TransportFuture;
    fn delete(&self, id: &str) -> TransportFuture;
    fn read(&self, id: &str) -> TransportFuture;
}

/// Persistence on top of a [`Transport`], using the configured operation names.
pub struct RemotePersistence {
    transport: Arc<dyn Transport>,
    operations: OperationNames,
}

impl RemotePersistence {
    pub fn new(transport: Arc<dyn Transport>, operations: OperationNames) -> Self {
        Self {
            transport,
            operations,
        }
    }
}

impl PersistenceService for RemotePersistence {
    fn create(&self, entity: Value) -> TransportFuture {
        self.transport.call(&self.operations.create, entity)
    }

    fn update(&self, id: &str, entity: Value) -> TransportFuture {
        self.transport
            .call(&self.operations.update, json!({ "id": id, "entity": entity }))
    }

    fn delete(&self, id: &str) -> TransportFuture {
        self.transport.call(&self.operations.delete, json!({ "id": id }))
    }

    fn read(&self, id: &str) -> TransportFuture {
        self.transport.call(&self.operations.read, json!({ "id": id }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    NetworkFailure {
        detail: String,
    },
    ApplicationRejection {
        message: String,
        field_errors: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum VerificationResult {
    Success(Value),
    Failure(FailureReason),
}

impl VerificationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationResult::Success(_))
    }
}

/// Fold a raw transport outcome into a [`VerificationResult`].
pub fn classify(reply: Result<TransportReply, TransportError>) -> VerificationResult {
    match reply {
        Ok(TransportReply::Success(data)) => VerificationResult::Success(data),
        Ok(TransportReply::Failure(error)) => {
            let (message, field_errors) = extract_errors(&error);
            VerificationResult::Failure(FailureReason::ApplicationRejection {
                message: message.unwrap_or_default(),
                field_errors,
            })
        }
        Err(e) => {
            warn!("transport call failed: {e}");
            VerificationResult::Failure(FailureReason::NetworkFailure {
                detail: e.to_string(),
            })
        }
    }
}

/// Split a server `error` member into a form-level message and per-field errors.
///
/// Accepted shapes: a plain string, `{id, message}`, or an array of those.
/// An `id` of `"*"` addresses the whole form.
pub fn extract_errors(error: &Value) -> (Option<String>, BTreeMap<String, String>) {
    let mut message = None;
    let mut fields = BTreeMap::new();
    let mut visit = |item: &Value| match item {
        Value::String(s) => {
            message.get_or_insert_with(|| s.clone());
        }
        Value::Object(obj) => {
            let text = obj
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            match obj.get("id").and_then(Value::as_str) {
                None | Some("*") => {
                    message.get_or_insert(text);
                }
                Some(id) => {
                    fields.insert(strip_field_prefix(id).to_string(), text);
                }
            }
        }
        other => debug!("ignoring unexpected error member: {other}"),
    };
    match error {
        Value::Array(items) => items.iter().for_each(&mut visit),
        single => visit(single),
    }
    (message, fields)
}

fn strip_field_prefix(id: &str) -> &str {
    let id = id.strip_prefix("FIELD ").unwrap_or(id);
    let id = id.strip_prefix("PARAMETER ").unwrap_or(id);
    id.strip_prefix("HelperBean.").unwrap_or(id)
}

/// Runs exactly one transport call per `verify`.
pub struct RemoteVerifier {
    transport: Arc<dyn Transport>,
    operations: OperationNames,
}

impl RemoteVerifier {
    pub fn new(transport: Arc<dyn Transport>, operations: OperationNames) -> Self {
        Self {
            transport,
            operations,
        }
    }

    pub async fn verify(&self, operation: OperationId, payload: Value) -> VerificationResult {
        let name = self.operations.name_for(operation);
        debug!(%operation, name, "verify");
        classify(self.transport.call(name, payload).await)
    }
}
