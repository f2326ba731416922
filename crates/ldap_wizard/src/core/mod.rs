//! Wizard core.
//!
//! Layers, leaf first:
//!   * `verifier`     : transport/persistence collaborators + result classification
//!   * `effects`      : declarative effects, task kinds and task results
//!   * `step`         : single step machine (form + verification)
//!   * `gate`         : credential gate and `Secret`
//!   * `orchestrator` : multi-step flow owning the wizard context
//!   * `executor`     : Tokio task executor for `Effect::Async`
//!   * `session`      : event loop tying orchestrator and executor together
pub mod effects;
pub mod executor;
pub mod gate;
pub mod orchestrator;
pub mod session;
pub mod step;
pub mod verifier;
