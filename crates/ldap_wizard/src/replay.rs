//! Scripted sessions: a list of wizard events run against a [`ScriptedBackend`].
//!
//! ```json5
//! {
//!   edit: "ldap-1",                      // optional, edit mode
//!   context: { can_delete: false },      // optional host permissions
//!   replies: {
//!     "ldap_LdapServer.verifyConnection": [{ success: true, data: {} }],
//!   },
//!   events: [
//!     { type: "update", path: "host", value: "ldap.example.com" },
//!     { type: "verify", operation: "verify_connection" },
//!     { type: "settle" },
//!   ],
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use forms::KeyPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::WizardSettings;
use crate::core::effects::WizardOutput;
use crate::core::gate::Secret;
use crate::core::orchestrator::{Context, StateSnapshot, WizardEvent, WizardOrchestrator};
use crate::core::session::WizardSession;
use crate::core::verifier::{OperationId, PersistenceService, RemotePersistence, Transport};
use crate::domain;
use crate::errors::WizardError;
use crate::scripted::{ScriptedBackend, ScriptedReply};

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub edit: Option<String>,
    #[serde(default)]
    pub context: Context,
    #[serde(default)]
    pub replies: BTreeMap<String, Vec<ScriptedReply>>,
    pub events: Vec<ScriptStep>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptStep {
    Update { path: String, value: Value },
    Verify { operation: OperationId },
    VerifyLogin { username: String, password: String },
    Next,
    Back,
    Save,
    Delete,
    Cancel,
    Retry,
    Reset,
    ApplyTemplate { name: String },
    SubmitSecret { secret: String },
    /// Wait until every in-flight call has been answered.
    Settle,
}

impl ScriptStep {
    /// `None` for `Settle`, which is not a wizard event.
    pub fn into_event(self) -> Result<Option<WizardEvent>, WizardError> {
        let event = match self {
            ScriptStep::Update { path, value } => WizardEvent::Update {
                path: path.parse::<KeyPath>()?,
                value,
            },
            ScriptStep::Verify { operation } => WizardEvent::Verify(operation),
            ScriptStep::VerifyLogin { username, password } => WizardEvent::VerifyLogin {
                username,
                password: Secret::new(password),
            },
            ScriptStep::Next => WizardEvent::Next,
            ScriptStep::Back => WizardEvent::Back,
            ScriptStep::Save => WizardEvent::Save,
            ScriptStep::Delete => WizardEvent::Delete,
            ScriptStep::Cancel => WizardEvent::Cancel,
            ScriptStep::Retry => WizardEvent::Retry,
            ScriptStep::Reset => WizardEvent::Reset,
            ScriptStep::ApplyTemplate { name } => WizardEvent::ApplyTemplate(name),
            ScriptStep::SubmitSecret { secret } => WizardEvent::SubmitSecret(Secret::new(secret)),
            ScriptStep::Settle => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// What a replay produced. Call payloads are left out since they may carry
/// the bind password.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub snapshots: Vec<StateSnapshot>,
    pub outputs: Vec<WizardOutput>,
    pub calls: Vec<String>,
}

/// Run `script` to completion. `edit` overrides the script's own entity id.
pub async fn run(
    script: Script,
    edit: Option<String>,
    settings: WizardSettings,
) -> Result<ReplayReport, WizardError> {
    let entity_id = edit.or(script.edit);
    let definition = Arc::new(domain::definition(entity_id.is_some()));
    let settings = Arc::new(settings);
    let orchestrator = match entity_id {
        Some(id) => WizardOrchestrator::edit(definition, script.context, Arc::clone(&settings), id),
        None => WizardOrchestrator::create(definition, script.context, Arc::clone(&settings)),
    };

    let backend = Arc::new(ScriptedBackend::with_replies(script.replies));
    let transport: Arc<dyn Transport> = backend.clone();
    let persistence: Arc<dyn PersistenceService> =
        Arc::new(RemotePersistence::new(Arc::clone(&transport), settings.operations.clone()));
    let mut session = WizardSession::new(
        orchestrator,
        transport,
        persistence,
        settings.operations.clone(),
    );
    session.settle().await;

    let mut snapshots = vec![session.state()];
    for step in script.events {
        match step.into_event()? {
            Some(event) => session.send(event),
            None => session.settle().await,
        }
        snapshots.push(session.state());
    }
    session.settle().await;
    snapshots.push(session.state());

    info!(events = snapshots.len() - 2, calls = backend.calls().len(), "replay finished");
    Ok(ReplayReport {
        snapshots,
        outputs: session.outputs().to_vec(),
        calls: backend.operations(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn steps_parse_and_convert() {
        let steps: Vec<ScriptStep> = json5::from_str(
            r#"[
                { type: "update", path: "host", value: "h" },
                { type: "verify", operation: "verify_user_mapping" },
                { type: "submit_secret", secret: "pw" },
                { type: "settle" },
            ]"#,
        )
        .unwrap();
        let events: Vec<Option<WizardEvent>> = steps
            .into_iter()
            .map(|s| s.into_event().unwrap())
            .collect();
        assert_eq!(
            events,
            vec![
                Some(WizardEvent::Update {
                    path: KeyPath::from("host"),
                    value: json!("h")
                }),
                Some(WizardEvent::Verify(OperationId::VerifyUserMapping)),
                Some(WizardEvent::SubmitSecret(Secret::new("pw"))),
                None,
            ]
        );
    }

    #[tokio::test]
    async fn cancel_script_reports_the_output() {
        let script: Script = json5::from_str(r#"{ events: [{ type: "cancel" }] }"#).unwrap();
        let report = run(script, None, WizardSettings::default()).await.unwrap();
        assert_eq!(report.outputs, vec![WizardOutput::Cancelled]);
        assert_eq!(report.snapshots.last().unwrap().value, "cancelled");
        assert!(report.calls.is_empty());
    }
}
