/*!
Effect & task model.

Reducers (`WizardStepMachine::send`, `WizardOrchestrator::send`) stay pure:
they mutate their own state and return `Vec<Effect>`. Everything that needs
the outside world is described here and interpreted by the session loop:

- `Effect::Async(TaskKind)` is handed to the `TaskExecutor`
- `Effect::Output(WizardOutput)` is the typed event for the hosting parent

Task completion re-enters the orchestrator as `InternalEvent::TaskFinished`.
Every task carries the generation it was issued under; results from older
generations are discarded by the receiver.
*/

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::core::verifier::{OperationId, VerificationResult};

/// Declarative instruction emitted by a reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Schedule an asynchronous task.
    Async(TaskKind),
    /// Notify the owner of the wizard.
    Output(WizardOutput),
}

impl Effect {
    pub fn async_task(kind: TaskKind) -> Self {
        Effect::Async(kind)
    }
}

/// What a finished wizard reports to its parent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WizardOutput {
    Saved { id: Option<String>, entity: Value },
    Deleted { id: String },
    Cancelled,
}

#[derive(Clone, PartialEq)]
pub enum PersistRequest {
    Create { entity: Value },
    Update { id: String, entity: Value },
    Delete { id: String },
}

/// Asynchronous work units. Each variant holds everything needed to run it.
#[derive(Clone, PartialEq)]
pub enum TaskKind {
    Verify {
        generation: u64,
        step: usize,
        operation: OperationId,
        payload: Value,
    },
    Persist {
        generation: u64,
        request: PersistRequest,
    },
    Load {
        generation: u64,
        id: String,
    },
}

impl TaskKind {
    pub fn generation(&self) -> u64 {
        match self {
            TaskKind::Verify { generation, .. }
            | TaskKind::Persist { generation, .. }
            | TaskKind::Load { generation, .. } => *generation,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Verify {
                generation,
                step,
                operation,
                ..
            } => write!(f, "Verify({operation}, step={step}, gen={generation})"),
            TaskKind::Persist {
                generation,
                request,
            } => write!(f, "Persist({request:?}, gen={generation})"),
            TaskKind::Load { generation, id } => write!(f, "Load(id={id}, gen={generation})"),
        }
    }
}

// Payloads may carry the secret, so Debug never prints them.
impl fmt::Debug for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Debug for PersistRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistRequest::Create { .. } => write!(f, "Create"),
            PersistRequest::Update { id, .. } => write!(f, "Update(id={id})"),
            PersistRequest::Delete { id } => write!(f, "Delete(id={id})"),
        }
    }
}

/// Results produced by the `TaskExecutor`.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResultKind {
    Verified {
        generation: u64,
        step: usize,
        operation: OperationId,
        result: VerificationResult,
    },
    Persisted {
        generation: u64,
        result: VerificationResult,
    },
    Loaded {
        generation: u64,
        result: VerificationResult,
    },
}

/// Executor lifecycle callbacks, fed back into the owning machine.
#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    TaskStarted { id: u64, label: String },
    TaskFinished { id: u64, result: TaskResultKind },
}
