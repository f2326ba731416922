//! Multi-step LDAP server configuration wizard.
//!
//! The core (`core`) is UI agnostic: hosts feed [`WizardEvent`]s into a
//! [`WizardSession`] (or drive a [`WizardOrchestrator`] with their own loop)
//! and render the returned [`StateSnapshot`]. `domain` holds the LDAP forms.

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod replay;
pub mod scripted;

pub use crate::core::effects::WizardOutput;
pub use crate::core::gate::Secret;
pub use crate::core::orchestrator::{
    Context, StateSnapshot, WizardEvent, WizardOrchestrator, WizardState,
};
pub use crate::core::session::WizardSession;
pub use crate::core::verifier::{OperationId, PersistenceService, Transport, TransportReply};
pub use crate::errors::WizardError;
