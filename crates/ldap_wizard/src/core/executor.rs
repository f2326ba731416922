/*!
Task executor.

Interprets `Effect::Async(TaskKind)` outside the reducers:

1. The session forwards each `TaskKind` to `TaskExecutor::spawn`.
2. The worker runs it against the `RemoteVerifier` / `PersistenceService`.
3. Completion comes back as `InternalEvent::TaskFinished` on the channel
   handed to `TaskExecutor::new`.

Every task runs in its own Tokio task, so completions may arrive in any
order. Ordering is the receiver's problem (generation checks). The executor
never panics; a closed result channel only produces a warning.
*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{info, warn};
use tokio::sync::mpsc;

use crate::core::effects::{InternalEvent, PersistRequest, TaskKind, TaskResultKind};
use crate::core::verifier::{classify, PersistenceService, RemoteVerifier};

/// Monotonic task identifier type.
pub type TaskId = u64;

/// Public handle for scheduling background tasks.
///
/// Cloneable & cheap: internally only wraps an `mpsc::UnboundedSender`.
#[derive(Clone)]
pub struct TaskExecutor {
    tx: mpsc::UnboundedSender<Dispatch>,
}

/// Internal dispatch envelope.
struct Dispatch {
    id: TaskId,
    kind: TaskKind,
}

impl TaskExecutor {
    /// Create a new executor and spawn its worker loop. Requires a Tokio runtime.
    pub fn new(
        verifier: Arc<RemoteVerifier>,
        persistence: Arc<dyn PersistenceService>,
        event_tx: mpsc::UnboundedSender<InternalEvent>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Dispatch>();
        Worker {
            rx,
            services: Arc::new(Services {
                verifier,
                persistence,
                event_tx,
            }),
        }
        .spawn();
        Self { tx }
    }

    /// Schedule a new asynchronous task and return its id.
    pub fn spawn(&self, kind: TaskKind) -> TaskId {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.tx.send(Dispatch { id, kind }) {
            warn!("TaskExecutor channel closed; failed to schedule task: {}", e.0.kind);
        }
        id
    }
}

struct Services {
    verifier: Arc<RemoteVerifier>,
    persistence: Arc<dyn PersistenceService>,
    event_tx: mpsc::UnboundedSender<InternalEvent>,
}

impl Services {
    fn emit(&self, event: InternalEvent) {
        if self.event_tx.send(event).is_err() {
            warn!("task result dropped: receiver gone");
        }
    }

    async fn run(&self, id: TaskId, kind: TaskKind) -> TaskResultKind {
        match kind {
            TaskKind::Verify {
                generation,
                step,
                operation,
                payload,
            } => TaskResultKind::Verified {
                generation,
                step,
                operation,
                result: self.verifier.verify(operation, payload).await,
            },
            TaskKind::Persist {
                generation,
                request,
            } => {
                let reply = match request {
                    PersistRequest::Create { entity } => self.persistence.create(entity).await,
                    PersistRequest::Update { id: entity_id, entity } => {
                        self.persistence.update(&entity_id, entity).await
                    }
                    PersistRequest::Delete { id: entity_id } => {
                        self.persistence.delete(&entity_id).await
                    }
                };
                info!("[task:{id}] persist call finished (transport ok={})", reply.is_ok());
                TaskResultKind::Persisted {
                    generation,
                    result: classify(reply),
                }
            }
            TaskKind::Load { generation, id: entity_id } => TaskResultKind::Loaded {
                generation,
                result: classify(self.persistence.read(&entity_id).await),
            },
        }
    }
}

/// Receives dispatches and fans each one out onto its own Tokio task.
struct Worker {
    rx: mpsc::UnboundedReceiver<Dispatch>,
    services: Arc<Services>,
}

impl Worker {
    fn spawn(mut self) {
        tokio::spawn(async move {
            while let Some(Dispatch { id, kind }) = self.rx.recv().await {
                let services = Arc::clone(&self.services);
                services.emit(InternalEvent::TaskStarted {
                    id,
                    label: kind.to_string(),
                });
                tokio::spawn(async move {
                    let result = services.run(id, kind).await;
                    services.emit(InternalEvent::TaskFinished { id, result });
                });
            }
            // Channel closed: executor is shutting down.
            info!("TaskExecutor worker stopped (channel closed)");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperationNames;
    use crate::core::verifier::{
        OperationId, Transport, TransportFuture, TransportReply, VerificationResult,
        RemotePersistence,
    };
    use futures::FutureExt;
    use serde_json::{json, Value};

    struct Echo;

    impl Transport for Echo {
        fn call(&self, operation: &str, payload: Value) -> TransportFuture {
            let op = operation.to_string();
            async move {
                Ok(TransportReply::Success(
                    json!({ "op": op, "payload": payload }),
                ))
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn executor_reports_started_and_finished() {
        let transport: Arc<dyn Transport> = Arc::new(Echo);
        let verifier = Arc::new(RemoteVerifier::new(transport.clone(), OperationNames::default()));
        let persistence = Arc::new(RemotePersistence::new(transport, OperationNames::default()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let exec = TaskExecutor::new(verifier, persistence, tx);

        let id = exec.spawn(TaskKind::Verify {
            generation: 7,
            step: 0,
            operation: OperationId::VerifyConnection,
            payload: json!({"host": "h"}),
        });
        assert!(id > 0);

        let started = rx.recv().await.unwrap();
        assert!(matches!(
            started,
            InternalEvent::TaskStarted { id: started_id, .. } if started_id == id
        ));
        match rx.recv().await.unwrap() {
            InternalEvent::TaskFinished {
                result:
                    TaskResultKind::Verified {
                        generation, result, ..
                    },
                ..
            } => {
                assert_eq!(generation, 7);
                assert_eq!(
                    result,
                    VerificationResult::Success(json!({
                        "op": "ldap_LdapServer.verifyConnection",
                        "payload": {"host": "h"}
                    }))
                );
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
