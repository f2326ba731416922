//! LDAP server configuration: the two step schemas and the mapping templates.

pub mod connection;
pub mod mapping;
pub mod templates;

use std::sync::Arc;

use forms::KeyPath;

use crate::core::orchestrator::WizardDefinition;

/// Wizard definition for creating (`is_edit == false`) or editing a server.
pub fn definition(is_edit: bool) -> WizardDefinition {
    WizardDefinition {
        connection: Arc::new(connection::schema(is_edit)),
        mapping: Arc::new(mapping::schema()),
        templates: templates::builtin(),
        secret_path: KeyPath::from(connection::PASSWORD),
        requires_secret: Box::new(connection::requires_secret),
    }
}
