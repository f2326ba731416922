// src/cli.rs
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use forms::merge::layered;
use forms::FormSchema;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::config::Config;
use crate::domain;
use crate::errors::WizardError;
use crate::replay::{self, Script};

#[derive(Parser)]
#[command(name = "ldap-wizard", version, about = "LDAP server configuration wizard")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// List the user and group templates
    Templates {
        /// Print the template values as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay a scripted session and print the state snapshots as JSON
    Replay {
        /// JSON5 script
        script: PathBuf,
        /// Run in edit mode for this server id
        #[arg(long)]
        edit: Option<String>,
    },
    /// Run both step validators over a JSON payload
    Validate {
        file: PathBuf,
        /// Validate as an existing server (password not required)
        #[arg(long)]
        edit: bool,
    },
}

impl Cli {
    pub async fn run(self, config: Config) -> Result<(), WizardError> {
        match self.cmd {
            Cmd::Templates { json } => templates(json),
            Cmd::Replay { script, edit } => {
                let script: Script = json5::from_str(&fs::read_to_string(&script)?)?;
                let report = replay::run(script, edit, config.wizard).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(())
            }
            Cmd::Validate { file, edit } => validate(&file, edit),
        }
    }
}

fn templates(as_json: bool) -> Result<(), WizardError> {
    let templates = domain::templates::builtin();
    if as_json {
        println!("{}", serde_json::to_string_pretty(&templates)?);
    } else {
        for t in &templates {
            println!("{}", t.name);
        }
    }
    Ok(())
}

/// Invalid fields only, keyed by path.
fn invalid_fields(schema: &FormSchema, data: &Value) -> Map<String, Value> {
    let data = layered([&schema.defaults(), data]);
    schema
        .validate(&data)
        .errors()
        .map(|(field, message)| (field.to_string(), Value::String(message.to_string())))
        .collect()
}

fn validate(file: &Path, is_edit: bool) -> Result<(), WizardError> {
    let data: Value = json5::from_str(&fs::read_to_string(file)?)?;
    let definition = domain::definition(is_edit);
    let connection = invalid_fields(&definition.connection, &data);
    let mapping = invalid_fields(&definition.mapping, &data);
    let count = connection.len() + mapping.len();

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "connection": connection, "mapping": mapping }))?
    );
    info!(file = %file.display(), count, "validated");
    if count > 0 {
        return Err(WizardError::Validation(count));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn replay_takes_an_optional_edit_id() {
        let cli =
            Cli::try_parse_from(["ldap-wizard", "replay", "s.json5", "--edit", "ldap-1"]).unwrap();
        match cli.cmd {
            Cmd::Replay { script, edit } => {
                assert_eq!(script, PathBuf::from("s.json5"));
                assert_eq!(edit.as_deref(), Some("ldap-1"));
            }
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn blank_payload_reports_required_fields() {
        let definition = domain::definition(false);
        let errors = invalid_fields(&definition.connection, &json!({}));
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("host"));
        assert!(!errors.contains_key("authPassword"));
    }
}
