//! In-memory backend answering from queued replies.
//!
//! Used by `ldap-wizard replay` and by the integration tests. Every call is
//! recorded; each operation pops the next queued reply or succeeds with
//! `null` once its queue is empty.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::core::verifier::{Transport, TransportError, TransportFuture, TransportReply};

/// One queued answer.
///
/// Wire shape: `{ success: true, data }`, `{ success: false, error }` or
/// `{ unreachable: "reason" }`, each with an optional `delay_ms`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScriptedReply {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub unreachable: Option<String>,
    #[serde(default)]
    pub delay_ms: u64,
}

impl ScriptedReply {
    pub fn ok(data: Value) -> Self {
        Self {
            success: Some(true),
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn rejected(error: Value) -> Self {
        Self {
            success: Some(false),
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            unreachable: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn delayed(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    fn into_reply(self) -> Result<TransportReply, TransportError> {
        if let Some(reason) = self.unreachable {
            return Err(TransportError::Unreachable(reason));
        }
        match (self.success, self.error) {
            (Some(false), Some(error)) => Ok(TransportReply::Failure(error)),
            (Some(false), None) => Err(TransportError::Malformed(
                "failed reply without an `error` member".into(),
            )),
            _ => Ok(TransportReply::Success(self.data.unwrap_or(Value::Null))),
        }
    }
}

/// A call as the backend saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub operation: String,
    pub payload: Value,
}

#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<BTreeMap<String, VecDeque<ScriptedReply>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: BTreeMap<String, Vec<ScriptedReply>>) -> Self {
        let backend = Self::new();
        for (operation, queue) in replies {
            for reply in queue {
                backend.push(&operation, reply);
            }
        }
        backend
    }

    /// Queue a reply for `operation`.
    pub fn push(&self, operation: &str, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(operation.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Operation names only, in call order.
    pub fn operations(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.operation).collect()
    }
}

impl Transport for ScriptedBackend {
    fn call(&self, operation: &str, payload: Value) -> TransportFuture {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                operation: operation.to_string(),
                payload,
            });
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| ScriptedReply::ok(Value::Null));
        debug!(operation, delay_ms = reply.delay_ms, "scripted reply");

        async move {
            if reply.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(reply.delay_ms)).await;
            }
            reply.into_reply()
        }
        .boxed()
    }
}
