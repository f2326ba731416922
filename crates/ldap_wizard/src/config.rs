use std::fs;
use std::{env, path::PathBuf};

use directories::ProjectDirs;
use forms::TemplatePolicy;
use lazy_static::lazy_static;
use serde::Deserialize;
use tracing::warn;

use crate::core::verifier::OperationId;
use crate::errors::WizardError;

/// Backend operation names handed to the transport.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OperationNames {
    pub verify_connection: String,
    pub verify_user_mapping: String,
    pub verify_login: String,
    pub create: String,
    pub update: String,
    pub delete: String,
    pub read: String,
}

impl Default for OperationNames {
    fn default() -> Self {
        Self {
            verify_connection: "ldap_LdapServer.verifyConnection".into(),
            verify_user_mapping: "ldap_LdapServer.verifyUserMapping".into(),
            verify_login: "ldap_LdapServer.verifyLogin".into(),
            create: "ldap_LdapServer.create".into(),
            update: "ldap_LdapServer.update".into(),
            delete: "ldap_LdapServer.remove".into(),
            read: "ldap_LdapServer.read".into(),
        }
    }
}

impl OperationNames {
    pub fn name_for(&self, operation: OperationId) -> &str {
        match operation {
            OperationId::VerifyConnection => &self.verify_connection,
            OperationId::VerifyUserMapping => &self.verify_user_mapping,
            OperationId::VerifyLogin => &self.verify_login,
            OperationId::Save => &self.update,
        }
    }
}

/// User-facing status texts.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Messages {
    pub verify_connection_success: String,
    pub verify_user_mapping_success: String,
    pub verify_login_success: String,
    pub network_failure: String,
    pub rejected: String,
    pub load_failure: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            verify_connection_success: "Connection to LDAP server verified".into(),
            verify_user_mapping_success: "LDAP user mapping verified".into(),
            verify_login_success: "LDAP login completed successfully".into(),
            network_failure: "Unable to reach the server, please try again".into(),
            rejected: "The server rejected the request".into(),
            load_failure: "An error occurred while loading the LDAP server".into(),
        }
    }
}

impl Messages {
    pub fn success_for(&self, operation: OperationId) -> &str {
        match operation {
            OperationId::VerifyConnection | OperationId::Save => &self.verify_connection_success,
            OperationId::VerifyUserMapping => &self.verify_user_mapping_success,
            OperationId::VerifyLogin => &self.verify_login_success,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WizardSettings {
    pub template_policy: TemplatePolicy,
    pub operations: OperationNames,
    pub messages: Messages,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub config_dir: PathBuf,
    #[serde(default)]
    pub log_filter: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default, flatten)]
    pub config: AppConfig,
    #[serde(default)]
    pub wizard: WizardSettings,
}

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
    pub static ref DATA_FOLDER: Option<PathBuf> =
        env::var(format!("{}_DATA", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
    pub static ref CONFIG_FOLDER: Option<PathBuf> =
        env::var(format!("{}_CONFIG", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
}

impl Config {
    /// Defaults, then `config.json5` / `config.toml`, then `LDAP_WIZARD__*` variables.
    pub fn new() -> Result<Self, WizardError> {
        let data_dir = get_data_dir();
        let config_dir = get_config_dir();
        let mut builder = config::Config::builder()
            .set_default("data_dir", data_dir.to_string_lossy().to_string())?
            .set_default("config_dir", config_dir.to_string_lossy().to_string())?;

        let config_files = [
            ("config.json5", config::FileFormat::Json5),
            ("config.toml", config::FileFormat::Toml),
        ];
        let mut found_config = false;
        for (file, format) in &config_files {
            let source = config::File::from(config_dir.join(file))
                .format(*format)
                .required(false);
            builder = builder.add_source(source);
            if config_dir.join(file).exists() {
                found_config = true
            }
        }
        if !found_config {
            warn!("No configuration file found, using built-in defaults");
        }

        builder = builder.add_source(
            config::Environment::with_prefix(PROJECT_NAME.as_str())
                .prefix_separator("__")
                .separator("__"),
        );

        let cfg: Self = builder.build()?.try_deserialize()?;
        Ok(cfg)
    }
}

pub fn get_data_dir() -> PathBuf {
    if let Some(s) = DATA_FOLDER.clone() {
        s
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

pub fn get_config_dir() -> PathBuf {
    if let Some(s) = CONFIG_FOLDER.clone() {
        s
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.config_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".config")
    }
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "chicken105", env!("CARGO_PKG_NAME"))
}

pub fn ensure_data_and_config_dirs_exist() -> std::io::Result<()> {
    for dir in [get_data_dir(), get_config_dir()] {
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
    }
    Ok(())
}
