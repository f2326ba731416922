use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::OperationNames;
use crate::core::effects::{Effect, InternalEvent, WizardOutput};
use crate::core::executor::TaskExecutor;
use crate::core::orchestrator::{StateSnapshot, WizardEvent, WizardOrchestrator};
use crate::core::verifier::{PersistenceService, RemoteVerifier, Transport};

/// Event loop around a [`WizardOrchestrator`].
///
/// `send` reduces an event and schedules the resulting tasks; `pump` waits
/// for the next task completion and feeds it back. Outputs for the parent
/// are collected in order.
pub struct WizardSession {
    orchestrator: WizardOrchestrator,
    executor: TaskExecutor,
    events: mpsc::UnboundedReceiver<InternalEvent>,
    outputs: Vec<WizardOutput>,
    in_flight: usize,
}

impl WizardSession {
    /// Must be called inside a Tokio runtime.
    pub fn new(
        orchestrator: WizardOrchestrator,
        transport: Arc<dyn Transport>,
        persistence: Arc<dyn PersistenceService>,
        operations: OperationNames,
    ) -> Self {
        let (event_tx, events) = mpsc::unbounded_channel();
        let verifier = Arc::new(RemoteVerifier::new(transport, operations));
        let mut session = Self {
            orchestrator,
            executor: TaskExecutor::new(verifier, persistence, event_tx),
            events,
            outputs: Vec::new(),
            in_flight: 0,
        };
        let effects = session.orchestrator.start();
        session.run_effects(effects);
        session
    }

    pub fn send(&mut self, event: WizardEvent) {
        let effects = self.orchestrator.send(event);
        self.run_effects(effects);
    }

    pub fn state(&self) -> StateSnapshot {
        self.orchestrator.snapshot()
    }

    pub fn orchestrator(&self) -> &WizardOrchestrator {
        &self.orchestrator
    }

    pub fn outputs(&self) -> &[WizardOutput] {
        &self.outputs
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Apply the next executor event. Returns false when nothing is pending.
    pub async fn pump(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        let Some(event) = self.events.recv().await else {
            return false;
        };
        if matches!(event, InternalEvent::TaskFinished { .. }) {
            self.in_flight -= 1;
        }
        self.send(WizardEvent::Internal(event));
        true
    }

    /// Pump until every scheduled task has reported back.
    pub async fn settle(&mut self) {
        while self.pump().await {}
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Async(kind) => {
                    let generation = kind.generation();
                    let id = self.executor.spawn(kind);
                    self.in_flight += 1;
                    debug!(task = id, generation, "scheduled");
                }
                Effect::Output(output) => {
                    info!(?output, "wizard output");
                    self.outputs.push(output);
                }
            }
        }
    }
}
