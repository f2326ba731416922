use std::collections::BTreeMap;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::error;

use crate::core::verifier::{FailureReason, OperationId};

/// Error taxonomy of the wizard.
///
/// `RemoteRejection` and `TransportFailure` never escape the orchestrator;
/// they are folded into step/form context. `CredentialRequired` is the branch
/// into the credential gate, not a failure; it only shows up in the log.
#[derive(Error, Debug)]
pub enum WizardError {
    #[error("{0} field(s) failed validation")]
    Validation(usize),

    #[error("{message}")]
    RemoteRejection {
        message: String,
        field_errors: BTreeMap<String, String>,
    },

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("a secret is required to {0}")]
    CredentialRequired(OperationId),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Json5(#[from] json5::Error),

    #[error(transparent)]
    KeyPath(#[from] forms::FormError),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

impl From<FailureReason> for WizardError {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::NetworkFailure { detail } => WizardError::TransportFailure(detail),
            FailureReason::ApplicationRejection {
                message,
                field_errors,
            } => WizardError::RemoteRejection {
                message,
                field_errors,
            },
        }
    }
}

static INIT: OnceLock<()> = OnceLock::new();

/// Install color-eyre and the panic hook. Safe to call more than once.
pub fn init() -> color_eyre::Result<()> {
    // idempotent: wenn schon initialisiert, tue nichts
    if INIT.get().is_some() {
        return Ok(());
    }

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default()
        .panic_section(format!(
            "This is a bug. Consider reporting it at {}",
            env!("CARGO_PKG_NAME")
        ))
        .capture_span_trace_by_default(false)
        .display_location_section(false)
        .display_env_section(false)
        .try_into_hooks()?;
    eyre_hook.install()?;

    std::panic::set_hook(Box::new(move |panic_info| {
        #[cfg(not(debug_assertions))]
        {
            use human_panic::{handle_dump, metadata, print_msg};
            let metadata = metadata!();
            let file_path = handle_dump(&metadata, panic_info);
            if print_msg(file_path, &metadata).is_err() {
                eprintln!("{}", panic_hook.panic_report(panic_info));
            }
        }
        let msg = format!("{}", panic_hook.panic_report(panic_info));
        error!("Error: {}", strip_ansi_escapes::strip_str(msg));

        #[cfg(debug_assertions)]
        {
            better_panic::Settings::auto()
                .most_recent_first(false)
                .lineno_suffix(true)
                .verbosity(better_panic::Verbosity::Full)
                .create_panic_handler()(panic_info);
        }

        std::process::exit(libc::EXIT_FAILURE);
    }));

    let _ = INIT.set(());
    Ok(())
}
